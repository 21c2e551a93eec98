//! HTML fragments built from niche configuration and department membership.
//!
//! Niche text is authored markup and is inserted as is. Text that comes from
//! the locality dataset is escaped.

use std::fmt::Write;

use html_escape::{encode_double_quoted_attribute as attr, encode_text as text};

use crate::error::Result;
use crate::data::NicheConfig;
use crate::links::{Hub, Silo};
use crate::output::{Layout, PagePath};
use crate::template::{Mode, PageContext, Template};

/// Niche-wide fragments, built once per run.
#[derive(Debug)]
pub struct NicheFragments {
    fixed: Vec<(&'static str, String)>,
    title: Template,
    faq: Vec<(Template, Template)>,
    globals: Vec<(String, Template)>,
}

impl NicheFragments {
    pub fn new(niche: &NicheConfig) -> NicheFragments {
        let faq = niche.faq.iter()
            .enumerate()
            .map(|(i, faq)| (
                Template::parse(format!("faq[{i}].q"), &faq.q),
                Template::parse(format!("faq[{i}].a"), &faq.a),
            ))
            .collect();

        let globals = niche.globals.iter()
            .map(|(key, value)| (key.clone(), Template::parse(format!("globals.{key}"), value)))
            .collect();

        let fixed = crate::pairs! {
            "niche_name" => niche.name,
            "domain" => niche.domain,
            "base_path" => niche.base_path,
            "telephone" => niche.contact.phone,
            "email" => niche.contact.email,
            "adresse" => niche.contact.address,
            "services_html" => services_html(niche),
            "process_html" => process_html(niche),
            "pricing_html" => pricing_html(niche),
            "words_json" => niche.words_json(),
        };

        NicheFragments {
            fixed,
            title: Template::parse("patterns.page_title", &niche.patterns.page_title),
            faq,
            globals,
        }
    }

    /// Values identical on every page.
    pub fn fixed(&self) -> &[(&'static str, String)] {
        &self.fixed
    }

    /// Values that reference the page's own fields: the page title, the FAQ
    /// block, and the configured globals.
    pub fn per_page(&self, context: &PageContext, mode: Mode) -> Result<Vec<(String, String)>> {
        let mut faq_html = String::new();
        for (q, a) in &self.faq {
            let _ = write!(faq_html, r#"
                <div class="faq-item">
                    <button class="faq-btn">
                        {}
                        <i data-lucide="chevron-down" class="faq-icon"></i>
                    </button>
                    <div class="faq-content">
                        <p>{}</p>
                    </div>
                </div>"#, q.render(context, mode)?, a.render(context, mode)?);
        }

        let mut pairs = vec![
            ("page_title".to_string(), self.title.render(context, mode)?),
            ("faq_html".to_string(), faq_html),
        ];

        for (key, template) in &self.globals {
            pairs.push((key.clone(), template.render(context, mode)?));
        }

        Ok(pairs)
    }
}

fn badge(badge: Option<&str>, style: &str) -> String {
    match badge {
        Some(badge) => format!(r#"<div class="card-badge"{style}>{badge}</div>"#),
        None => String::new(),
    }
}

fn services_html(niche: &NicheConfig) -> String {
    let mut html = String::new();
    for s in &niche.services {
        let _ = write!(html, r#"
                <div class="service-card reveal">
                    {}
                    <div class="service-icon"><i data-lucide="{}"></i></div>
                    <h3>{}</h3>
                    <p>{}</p>
                    <div class="service-price">{}</div>
                </div>"#, badge(s.badge.as_deref(), ""), s.icon.to_lowercase(), s.title, s.description, s.price);
    }

    html
}

fn process_html(niche: &NicheConfig) -> String {
    let mut html = String::new();
    for p in &niche.process {
        let _ = write!(html, r#"
                <div class="process-step reveal">
                    <div class="step-num">{}</div>
                    <div class="step-content">
                        <h4>{}</h4>
                        <p>{}</p>
                    </div>
                </div>"#, p.step, p.title, p.text);
    }

    html
}

fn pricing_html(niche: &NicheConfig) -> String {
    let phone: String = niche.contact.phone.chars().filter(|c| !c.is_whitespace()).collect();
    let mut html = String::new();
    for tier in &niche.pricing {
        let (card, button) = match tier.is_featured() {
            true => ("price-card featured", "btn btn-primary"),
            false => ("price-card", "btn"),
        };

        let features: String = tier.features.iter()
            .map(|f| format!(r#"<li><i data-lucide="check-circle"></i> {f}</li>"#))
            .collect();

        let _ = write!(html, r#"
                <div class="{card} reveal">
                    {}
                    <div class="price-name">{}</div>
                    <div class="price-value">{}</div>
                    <div class="price-for">{}</div>
                    <ul class="price-features">{features}</ul>
                    <a href="tel:{}" class="{button}">Choisir</a>
                </div>"#,
            badge(tier.badge.as_deref(), r#" style="top:25px; right:-25px;""#),
            tier.name, tier.price, tier.audience, attr(&phone));
    }

    html
}

/// The city-card grid of a department hub, one card per member locality in
/// name order, each linking to the locality's silo URL.
pub fn hub_cards(silo: &Silo<'_>, hub: &Hub<'_>, layout: &Layout) -> String {
    let mut html = String::new();
    for &i in &hub.members {
        let placement = &silo.placements()[i];
        let record = placement.record;
        let url = layout.url(&placement.page());
        let audience = record.get_non_blank("gentile").unwrap_or("les professionnels");
        let _ = write!(html, r#"
            <div class="city-card">
                <h3>{name}</h3>
                <p>Expertise web locale pour {audience} de {name}.</p>
                <a href="{url}"><i data-lucide="external-link" size="16"></i> Voir l'offre</a>
            </div>"#,
            name = text(&record.name),
            audience = text(audience),
            url = attr(url.as_str()));
    }

    html
}

/// The fixed values of a hub page, without its rendered metadata.
pub fn hub_pairs(silo: &Silo<'_>, hub: &Hub<'_>, layout: &Layout) -> Vec<(&'static str, String)> {
    crate::pairs! {
        "departement_nom" => hub.record.name,
        "departement_code" => hub.record.code,
        "dept_slug" => hub.record.slug,
        "url_page" => layout.url(&PagePath::hub(&hub.record.slug)),
        "nb_villes" => hub.members.len(),
        "villes_maillage" => hub_cards(silo, hub, layout),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::data::{Faq, Service, Step, Tier};
    use crate::template::Layer;

    fn niche() -> NicheConfig {
        let mut niche = NicheConfig {
            name: "Agence Web".into(),
            domain: "agence-web-locale.fr".into(),
            ..Default::default()
        };

        niche.contact.phone = "05 61 00 00 00".into();
        niche.services.push(Service { title: "Vitrine".into(), icon: "Globe".into(), badge: Some("NOUVEAU".into()), ..Default::default() });
        niche.process.push(Step { step: "1".into(), title: "Audit".into(), text: "On écoute.".into() });
        niche.pricing.push(Tier { name: "Pro".into(), badge: Some("POPULAIRE".into()), features: vec!["SSL".into()], ..Default::default() });
        niche.pricing.push(Tier { name: "Base".into(), ..Default::default() });
        niche.faq.push(Faq { q: "Un site à {{ville}} ?".into(), a: "Oui, à {{ville}}.".into() });
        niche.globals.insert("faq_6_question".into(), "Le site m'appartient-il à {{ville}} ?".into());
        niche
    }

    #[test]
    fn fixed_fragments() {
        let fragments = NicheFragments::new(&niche());
        let get = |key: &str| fragments.fixed().iter().find(|(k, _)| *k == key).unwrap().1.clone();

        assert!(get("services_html").contains(r#"<div class="card-badge">NOUVEAU</div>"#));
        assert!(get("services_html").contains(r#"data-lucide="globe""#));
        assert!(get("process_html").contains("<h4>Audit</h4>"));

        let pricing = get("pricing_html");
        assert_eq!(pricing.matches("price-card featured").count(), 1);
        assert!(pricing.contains(r#"href="tel:0561000000""#));
        assert_eq!(get("words_json"), "[]");
    }

    #[test]
    fn faq_and_globals_expand_per_page() {
        let fragments = NicheFragments::new(&niche());
        let mut context = PageContext::new();
        context.insert(Layer::Normalized, "ville", "Albi")
            .insert(Layer::Normalized, "code_postal", "81000")
            .insert(Layer::Globals, "domain", "agence-web-locale.fr");

        let pairs = fragments.per_page(&context, Mode::Strict).unwrap();
        assert_eq!(pairs[0].1, "Agence Web Albi (81000) - Création Site Internet Premium - agence-web-locale.fr");
        assert!(pairs[1].1.contains("Un site à Albi ?"));
        assert!(pairs[1].1.contains("<p>Oui, à Albi.</p>"));
        assert_eq!(pairs[2], ("faq_6_question".to_string(), "Le site m'appartient-il à Albi ?".to_string()));
    }

    #[test]
    fn faq_with_unknown_keys_fails_when_strict() {
        let fragments = NicheFragments::new(&niche());
        let context = PageContext::new();
        assert!(fragments.per_page(&context, Mode::Strict).is_err());
    }
}
