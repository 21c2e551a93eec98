//! The internal link network ("maillage").
//!
//! Every locality is placed in its department's silo. A locality page links
//! to a bounded, deterministic sample of its siblings and to the department
//! hubs. The footer lists the same hubs in department-list order.

use std::cmp::Ordering;

use rustc_hash::FxHashMap;

use crate::data::{Dataset, DepartmentRecord, LocalityRecord, Resolution};
use crate::enrich::{Enricher, Purpose};
use crate::output::{Layout, PagePath};
use crate::template::{Layer, Mode, PageContext, Template};

/// Sibling link bound used when none is configured.
pub const DEFAULT_BOUND: usize = 12;

/// One locality and the department directory it resolved to.
#[derive(Debug, Clone)]
pub struct Placement<'d> {
    pub record: &'d LocalityRecord,
    pub department: Resolution<'d>,
}

impl Placement<'_> {
    pub fn page(&self) -> PagePath {
        PagePath::locality(self.department.slug(), &self.record.slug)
    }
}

/// A department with at least one locality.
#[derive(Debug, Clone)]
pub struct Hub<'d> {
    pub record: &'d DepartmentRecord,
    /// Indices into [`Silo::placements()`], sorted by locality name.
    pub members: Vec<usize>,
}

/// Localities grouped by department, with link selection.
#[derive(Debug)]
pub struct Silo<'d> {
    dataset: &'d Dataset,
    placements: Vec<Placement<'d>>,
    members: FxHashMap<String, Vec<usize>>,
    bound: usize,
}

fn by_name(a: &LocalityRecord, b: &LocalityRecord) -> Ordering {
    a.name.cmp(&b.name).then_with(|| a.slug.cmp(&b.slug))
}

impl<'d> Silo<'d> {
    pub fn new(dataset: &'d Dataset, bound: usize) -> Silo<'d> {
        let placements: Vec<Placement<'d>> = dataset.localities.iter()
            .map(|record| Placement { record, department: dataset.departments.resolve(&record.department) })
            .collect();

        let mut members: FxHashMap<String, Vec<usize>> = FxHashMap::default();
        for (i, placement) in placements.iter().enumerate() {
            members.entry(placement.department.slug().to_string()).or_default().push(i);
        }

        for indices in members.values_mut() {
            indices.sort_by(|&a, &b| by_name(placements[a].record, placements[b].record));
        }

        Silo { dataset, placements, members, bound }
    }

    pub fn placements(&self) -> &[Placement<'d>] {
        &self.placements
    }

    pub fn bound(&self) -> usize {
        self.bound
    }

    /// All localities in the department `slug`, sorted by name.
    pub fn members(&self, slug: &str) -> impl Iterator<Item = &Placement<'d>> {
        self.members.get(slug)
            .into_iter()
            .flatten()
            .map(|&i| &self.placements[i])
    }

    /// Known departments with at least one locality, sorted by name.
    pub fn hubs(&self) -> Vec<Hub<'d>> {
        let mut hubs: Vec<Hub<'d>> = self.dataset.departments.iter()
            .filter_map(|record| {
                let members = self.members.get(&record.slug)?;
                Some(Hub { record, members: members.clone() })
            })
            .collect();

        hubs.sort_by(|a, b| a.record.name.cmp(&b.record.name));
        hubs
    }

    /// Up to [`Silo::bound()`] siblings of `placement`, never including
    /// itself, sorted by name.
    ///
    /// When the department has more siblings than the bound, the sample is
    /// drawn from a generator seeded by the locality's slug and the current
    /// time bucket: stable for a page, different between pages.
    pub fn siblings(&self, placement: &Placement<'d>, enricher: &Enricher) -> Vec<&Placement<'d>> {
        let candidates: Vec<usize> = self.members.get(placement.department.slug())
            .map(|members| members.iter()
                .copied()
                .filter(|&i| self.placements[i].record.slug != placement.record.slug)
                .collect())
            .unwrap_or_default();

        if candidates.len() <= self.bound {
            return candidates.into_iter().map(|i| &self.placements[i]).collect();
        }

        let mut rng = enricher.rng(&placement.record.slug, Purpose::Links);
        let mut picked = rand::seq::index::sample(&mut rng, candidates.len(), self.bound).into_vec();
        picked.sort_unstable();
        picked.into_iter().map(|k| &self.placements[candidates[k]]).collect()
    }
}

/// Renders link lists as HTML fragments.
#[derive(Debug)]
pub struct LinkRenderer {
    layout: Layout,
    label: Template,
    department_index: String,
    footer: String,
}

impl LinkRenderer {
    pub fn new(silo: &Silo<'_>, layout: Layout) -> LinkRenderer {
        let niche = &silo.dataset.niche;
        let hub_link = |record: &DepartmentRecord| format!(
            r#"<a href="{}">{}</a>"#,
            html_escape::encode_double_quoted_attribute(layout.url(&PagePath::hub(&record.slug)).as_str()),
            html_escape::encode_text(&record.name),
        );

        let department_index = silo.hubs().iter()
            .map(|hub| format!("<li>{}</li>", hub_link(hub.record)))
            .collect::<Vec<_>>()
            .join("");

        let footer = silo.dataset.departments.iter()
            .filter(|record| silo.members.contains_key(&record.slug))
            .map(hub_link)
            .collect::<Vec<_>>()
            .join(" ");

        LinkRenderer {
            label: Template::parse("link_label", &niche.patterns.link_label),
            department_index: format!(r#"<ul class="departements">{department_index}</ul>"#),
            footer,
            layout,
        }
    }

    /// `<a>` links to `siblings`, labelled with the niche's link pattern.
    pub fn siblings(&self, siblings: &[&Placement<'_>]) -> String {
        let links: Vec<String> = siblings.iter()
            .map(|sibling| {
                let mut context = PageContext::new();
                context.extend(Layer::Normalized, sibling.record.fields.iter().map(|(k, v)| (k.as_str(), v.as_str())));
                let label = self.label.render(&context, Mode::Lenient).unwrap_or_else(|_| sibling.record.name.clone());
                format!(
                    r#"<a href="{}">{}</a>"#,
                    html_escape::encode_double_quoted_attribute(self.layout.url(&sibling.page()).as_str()),
                    html_escape::encode_text(&label),
                )
            })
            .collect();

        links.join(" ")
    }

    /// All link fragments for one locality page.
    pub fn locality_links<'d>(
        &self,
        silo: &Silo<'d>,
        placement: &Placement<'d>,
        enricher: &Enricher,
    ) -> Vec<(&'static str, String)> {
        let siblings = silo.siblings(placement, enricher);
        crate::pairs! {
            "maillage_interne" => self.siblings(&siblings),
            "maillage_departements" => self.department_index,
            "maillage_footer_france" => self.footer,
        }
    }

    pub fn department_index(&self) -> &str {
        &self.department_index
    }

    pub fn footer(&self) -> &str {
        &self.footer
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::data::{Departments, Fields, NicheConfig, Schema};
    use crate::enrich::{Bucket, RunClock};

    fn dataset(rows: &[(&str, &str)]) -> Dataset {
        let departments = Departments::new(vec![
            DepartmentRecord { name: "Alpha".into(), slug: "alpha".into(), code: "01".into() },
            DepartmentRecord { name: "Beta".into(), slug: "beta".into(), code: "02".into() },
            DepartmentRecord { name: "Gamma".into(), slug: "gamma".into(), code: "03".into() },
        ]).unwrap();

        let localities = rows.iter()
            .map(|(name, department)| {
                let raw: Fields = [("ville", *name), ("departement_nom", *department)].into_iter()
                    .map(|(k, v)| (k.to_string(), v.to_string()))
                    .collect();

                LocalityRecord::from_row(raw, &Schema::standard()).unwrap()
            })
            .collect();

        Dataset::from_parts(localities, departments, NicheConfig::default())
    }

    fn enricher() -> Enricher {
        Enricher::new(RunClock::on(2026, 10, 18).unwrap(), Bucket::Month)
    }

    #[test]
    fn large_departments_are_sampled() {
        let names: Vec<String> = (0..31).map(|i| format!("Ville {i:02}")).collect();
        let rows: Vec<(&str, &str)> = names.iter().map(|n| (n.as_str(), "Alpha")).collect();
        let dataset = dataset(&rows);
        let silo = Silo::new(&dataset, 12);
        let enricher = enricher();

        let me = &silo.placements()[7];
        let first: Vec<&str> = silo.siblings(me, &enricher).iter().map(|p| p.record.slug.as_str()).collect();
        let second: Vec<&str> = silo.siblings(me, &enricher).iter().map(|p| p.record.slug.as_str()).collect();

        assert_eq!(first.len(), 12);
        assert_eq!(first, second);
        assert!(!first.contains(&me.record.slug.as_str()));

        let mut distinct = first.clone();
        distinct.dedup();
        assert_eq!(distinct.len(), 12);
        assert!(first.windows(2).all(|w| w[0] < w[1]));

        let other = &silo.placements()[8];
        let theirs: Vec<&str> = silo.siblings(other, &enricher).iter().map(|p| p.record.slug.as_str()).collect();
        assert_ne!(first, theirs);
    }

    #[test]
    fn small_departments_link_everyone_else() {
        let dataset = dataset(&[("Cordes", "Alpha"), ("Albi", "Alpha"), ("Rodez", "Beta")]);
        let silo = Silo::new(&dataset, 12);
        let cordes = &silo.placements()[0];
        let siblings = silo.siblings(cordes, &enricher());
        assert_eq!(siblings.len(), 1);
        assert_eq!(siblings[0].record.slug, "albi");
    }

    #[test]
    fn hubs_skip_empty_departments() {
        let dataset = dataset(&[("Rodez", "Beta"), ("Cordes", "Alpha"), ("Albi", "Alpha")]);
        let silo = Silo::new(&dataset, 12);
        let hubs = silo.hubs();
        let names: Vec<&str> = hubs.iter().map(|h| h.record.name.as_str()).collect();
        assert_eq!(names, ["Alpha", "Beta"]);

        let members: Vec<&str> = silo.members("alpha").map(|p| p.record.name.as_str()).collect();
        assert_eq!(members, ["Albi", "Cordes"]);
    }

    #[test]
    fn fragments_link_to_silo_urls() {
        let dataset = dataset(&[("Albi", "Alpha"), ("Cordes-sur-Ciel", "Alpha")]);
        let silo = Silo::new(&dataset, 12);
        let links = LinkRenderer::new(&silo, Layout::default());

        let pairs = links.locality_links(&silo, &silo.placements()[0], &enricher());
        assert_eq!(pairs[0], ("maillage_interne", r#"<a href="/alpha/cordes-sur-ciel">Expert Web Cordes-sur-Ciel</a>"#.to_string()));
        assert!(links.department_index().contains(r#"<a href="/departement/alpha/">Alpha</a>"#));
        assert!(!links.department_index().contains("gamma"));
        assert_eq!(links.footer(), r#"<a href="/departement/alpha/">Alpha</a>"#);
    }
}
