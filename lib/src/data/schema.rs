use std::sync::Arc;

use crate::data::Fields;

/// Canonical names of the identifying locality fields.
pub mod keys {
    pub const NAME: &str = "ville";
    pub const SLUG: &str = "slug";
    pub const DEPARTMENT: &str = "departement_nom";
    pub const POSTAL_CODE: &str = "code_postal";
    pub const POPULATION: &str = "population";
    pub const FIRST_NAME: &str = "temoignage_prenom";
}

/// One canonical field and the source headers it may arrive under.
///
/// Sources are consulted in order; the first non-blank value wins. Unless the
/// canonical name is itself listed among the sources, it is consulted first.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Alias {
    pub canonical: Arc<str>,
    pub sources: Vec<Arc<str>>,
}

/// A mapping table from heterogeneous dataset headers to canonical fields.
///
/// New dataset shapes are supported by adding a table, either a built-in one
/// or one read from configuration with [`Schema::with_aliases()`].
#[derive(Debug, Clone, Default)]
pub struct Schema {
    pub name: String,
    aliases: Vec<Alias>,
}

const IDENTITY: &[(&str, &[&str])] = &[
    (keys::NAME, &["ville", "Ville", "nom", "name", "city"]),
    (keys::SLUG, &["slug", "Slug"]),
    (keys::DEPARTMENT, &["departement_nom", "Departement", "Département", "departement", "department"]),
    (keys::POSTAL_CODE, &["code_postal", "Code Postal", "cp", "postal_code"]),
    (keys::POPULATION, &["population", "Population"]),
];

const LEGACY_CSV: &[(&str, &[&str])] = &[
    ("accroche_hero", &["Accroche Hero"]),
    ("sous_titre_hero", &["Sous Titre Hero"]),
    ("description_p1", &["Description P1"]),
    ("description_p2", &["Description P2"]),
    ("quartiers", &["Quartiers"]),
    ("fait_local", &["Fait Local"]),
    ("temoignage_texte", &["Temoignage Texte"]),
    (keys::FIRST_NAME, &["Temoignage Prenom", "Prénom Aléatoire"]),
    ("temoignage_metier", &["Temoignage Metier", "Métier Aléatoire"]),
    ("temoignage_quartier", &["Temoignage Quartier"]),
    ("url_resto", &["url_resto_complete", "url_resto"]),
    ("url_artisan", &["url_artisan_complete", "url_artisan"]),
    ("url_beaute", &["url_beaute_complete", "url_beaute"]),
    ("url_immo", &["url_immo_complete", "url_immo"]),
    ("url_avocat", &["url_avocat_complete", "url_avocat"]),
    ("url_sante", &["url_sante_complete", "url_sante"]),
];

impl Schema {
    pub fn new<S: Into<String>>(name: S) -> Schema {
        Schema { name: name.into(), aliases: vec![] }
    }

    /// The built-in table for `version`: `v1` for the legacy CSV headers,
    /// `v2` for datasets whose headers are already canonical.
    pub fn builtin(version: &str) -> Option<Schema> {
        match version {
            "v1" => Some(Schema::standard()),
            "v2" => Some(Schema::new("v2").with_table(IDENTITY)),
            _ => None,
        }
    }

    /// The table used when no version is configured: `v1`, a superset of `v2`.
    pub fn standard() -> Schema {
        Schema::new("v1").with_table(IDENTITY).with_table(LEGACY_CSV)
    }

    fn with_table(self, table: &[(&str, &[&str])]) -> Schema {
        self.with_aliases(table.iter().map(|(canonical, sources)| (*canonical, sources.iter().copied())))
    }

    /// Adds alias entries. An entry for an existing canonical field appends
    /// its sources after the existing ones.
    pub fn with_aliases<I, K, S, V>(mut self, aliases: I) -> Schema
        where I: IntoIterator<Item = (K, S)>,
              K: Into<Arc<str>>,
              S: IntoIterator<Item = V>,
              V: Into<Arc<str>>,
    {
        for (canonical, sources) in aliases {
            let canonical = canonical.into();
            let sources = sources.into_iter().map(Into::into);
            match self.aliases.iter_mut().find(|a| a.canonical == canonical) {
                Some(existing) => {
                    for source in sources {
                        if !existing.sources.contains(&source) {
                            existing.sources.push(source);
                        }
                    }
                }
                None => self.aliases.push(Alias { canonical, sources: sources.collect() }),
            }
        }

        self
    }

    pub fn aliases(&self) -> &[Alias] {
        &self.aliases
    }

    /// Resolves every canonical field this schema knows about from `raw`.
    /// Fields with no non-blank source are absent from the result.
    pub fn normalize(&self, raw: &Fields) -> Fields {
        let mut normalized = Fields::new();
        for alias in &self.aliases {
            let implicit = (!alias.sources.contains(&alias.canonical)).then_some(&alias.canonical);
            let value = implicit.into_iter()
                .chain(alias.sources.iter())
                .filter_map(|source| raw.get(&**source))
                .map(|value| value.trim())
                .find(|value| !value.is_empty());

            if let Some(value) = value {
                normalized.insert(alias.canonical.to_string(), value.to_string());
            }
        }

        normalized
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn row(pairs: &[(&str, &str)]) -> Fields {
        pairs.iter().map(|(k, v)| (k.to_string(), v.to_string())).collect()
    }

    #[test]
    fn first_non_blank_alias_wins() {
        let schema = Schema::builtin("v1").unwrap();
        let raw = row(&[
            ("Ville", "Albi"),
            ("Temoignage Prenom", "  "),
            ("Prénom Aléatoire", "Julie"),
            ("Accroche Hero", "Le web à Albi"),
            ("accroche_hero", ""),
        ]);

        let fields = schema.normalize(&raw);
        assert_eq!(fields[keys::NAME], "Albi");
        assert_eq!(fields[keys::FIRST_NAME], "Julie");
        assert_eq!(fields["accroche_hero"], "Le web à Albi");
        assert!(!fields.contains_key("quartiers"));
    }

    #[test]
    fn canonical_name_is_consulted_first() {
        let schema = Schema::builtin("v1").unwrap();
        let raw = row(&[("Accroche Hero", "legacy"), ("accroche_hero", "canonical")]);
        assert_eq!(schema.normalize(&raw)["accroche_hero"], "canonical");
    }

    #[test]
    fn complete_urls_take_priority() {
        let schema = Schema::builtin("v1").unwrap();
        let raw = row(&[
            ("url_resto", "https://short.link/x"),
            ("url_resto_complete", "https://la-table.sites-restaurants.fr"),
        ]);

        assert_eq!(schema.normalize(&raw)["url_resto"], "https://la-table.sites-restaurants.fr");
    }

    #[test]
    fn configured_tables_extend_builtins() {
        let schema = Schema::builtin("v2").unwrap()
            .with_aliases([("accroche_hero", ["Hero Tagline", "Tagline"])])
            .with_aliases([(keys::NAME, ["Commune"])]);

        let raw = row(&[("Commune", "Rodez"), ("Tagline", "Aveyron first")]);
        let fields = schema.normalize(&raw);
        assert_eq!(fields[keys::NAME], "Rodez");
        assert_eq!(fields["accroche_hero"], "Aveyron first");

        let name = schema.aliases().iter().find(|a| &*a.canonical == keys::NAME).unwrap();
        assert_eq!(&*name.sources[name.sources.len() - 1], "Commune");
    }
}
