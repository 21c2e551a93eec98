use std::collections::BTreeMap;
use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::error::Result;
use crate::data::{Format, Json, Toml};

/// Site-wide configuration shared identically by every page of a niche.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct NicheConfig {
    #[serde(alias = "niche_name")]
    pub name: String,
    pub domain: String,
    pub base_path: String,
    pub contact: Contact,
    pub hero: Hero,
    pub services: Vec<Service>,
    pub process: Vec<Step>,
    pub pricing: Vec<Tier>,
    pub faq: Vec<Faq>,
    /// Extra page variables. Values may reference record fields, as in
    /// `"Pourquoi un site à {{ville}} ?"`.
    pub globals: BTreeMap<String, String>,
    pub patterns: Patterns,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Contact {
    pub phone: String,
    pub email: String,
    pub address: String,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Hero {
    pub words: Vec<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Service {
    pub title: String,
    pub description: String,
    pub price: String,
    pub icon: String,
    pub badge: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Step {
    #[serde(deserialize_with = "crate::data::lenient_string")]
    pub step: String,
    pub title: String,
    pub text: String,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Tier {
    pub name: String,
    pub price: String,
    #[serde(rename = "for")]
    pub audience: String,
    pub features: Vec<String>,
    pub badge: Option<String>,
}

impl Tier {
    pub const FEATURED_BADGE: &'static str = "POPULAIRE";

    pub fn is_featured(&self) -> bool {
        self.badge.as_deref() == Some(Self::FEATURED_BADGE)
    }
}

/// A question/answer pair. Both may reference record fields.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Faq {
    pub q: String,
    pub a: String,
}

/// Placeholder patterns for derived strings: page titles, link labels, and
/// hub metadata.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Patterns {
    pub page_title: String,
    pub link_label: String,
    pub hub_title: String,
    pub hub_description: String,
}

impl Default for Patterns {
    fn default() -> Self {
        Patterns {
            page_title: "Agence Web {{ville}} ({{code_postal}}) - Création Site Internet Premium - {{domain}}".into(),
            link_label: "Expert Web {{ville}}".into(),
            hub_title: "Création de Site Internet en {{departement_nom}} ({{departement_code}}) | Agence Web Locale".into(),
            hub_description: "Besoin d'un site web professionnel en {{departement_nom}} ? Nous créons des sites \
                optimisés pour les TPE et artisans de toutes les communes du département {{departement_code}}.".into(),
        }
    }
}

impl NicheConfig {
    /// Reads a niche configuration, as TOML if `path` ends in `.toml` and as
    /// JSON otherwise.
    pub fn load(path: &Path) -> Result<NicheConfig> {
        let is_toml = path.extension().is_some_and(|ext| ext.eq_ignore_ascii_case("toml"));
        if is_toml { Toml::read(path) } else { Json::read(path) }
    }

    /// The hero words as a JSON array, for inline scripts.
    pub fn words_json(&self) -> String {
        serde_json::to_string(&self.hero.words).unwrap_or_else(|_| "[]".into())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const NICHE_JSON: &str = r#"{
        "niche_name": "Agence Web",
        "domain": "agence-web-locale.fr",
        "base_path": "/agence",
        "contact": {"phone": "05 61 00 00 00"},
        "hero": {"words": ["visible", "rentable"]},
        "services": [{"title": "Site vitrine", "description": "5 pages", "price": "990 €", "icon": "Globe"}],
        "process": [{"step": 1, "title": "Audit", "text": "On écoute."}],
        "pricing": [
            {"name": "Essentiel", "price": "49 €/mois", "for": "Artisans", "features": ["SSL"]},
            {"name": "Pro", "price": "89 €/mois", "for": "PME", "features": [], "badge": "POPULAIRE"}
        ],
        "faq": [{"q": "Un site à {{ville}} ?", "a": "Oui."}]
    }"#;

    #[test]
    fn json_config_parses() {
        let niche: NicheConfig = serde_json::from_str(NICHE_JSON).unwrap();
        assert_eq!(niche.name, "Agence Web");
        assert_eq!(niche.process[0].step, "1");
        assert_eq!(niche.pricing[0].audience, "Artisans");
        assert!(!niche.pricing[0].is_featured());
        assert!(niche.pricing[1].is_featured());
        assert_eq!(niche.contact.email, "");
        assert_eq!(niche.words_json(), r#"["visible","rentable"]"#);
        assert_eq!(niche.patterns, Patterns::default());
    }

    #[test]
    fn toml_config_parses() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("niche.toml");
        std::fs::write(&path, r#"
            name = "Sites Santé"
            domain = "sites-sante.fr"

            [globals]
            faq_7_question = "L'hébergement est-il inclus ?"

            [patterns]
            link_label = "Site santé {{ville}}"
        "#).unwrap();

        let niche = NicheConfig::load(&path).unwrap();
        assert_eq!(niche.domain, "sites-sante.fr");
        assert_eq!(niche.globals["faq_7_question"], "L'hébergement est-il inclus ?");
        assert_eq!(niche.patterns.link_label, "Site santé {{ville}}");
        assert_eq!(niche.patterns.hub_title, Patterns::default().hub_title);
    }
}
