use crate::data::{Fields, Schema, keys};
use crate::template::is_token_name;
use crate::util::slugify;

/// One locality ("ville"): the record that drives one generated page.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LocalityRecord {
    pub name: String,
    /// Primary key. Unique within a run and always in slug form.
    pub slug: String,
    pub department: String,
    pub postal_code: String,
    pub population: String,
    /// Fields as they arrived from the dataset. Columns whose header can't
    /// name a placeholder, such as the blank header of a trailing comma, are
    /// dropped.
    pub raw: Fields,
    /// Canonical fields, resolved through the schema's alias tables.
    pub fields: Fields,
}

impl LocalityRecord {
    /// Normalizes one dataset row. Returns `None` when the row has neither a
    /// slug nor a name to derive one from.
    pub fn from_row(mut raw: Fields, schema: &Schema) -> Option<LocalityRecord> {
        raw.retain(|key, _| is_token_name(key));
        let fields = schema.normalize(&raw);
        let field = |key: &str| fields.get(key).cloned().unwrap_or_default();

        let name = field(keys::NAME);
        let slug = match fields.get(keys::SLUG) {
            Some(slug) => slugify(slug),
            None => slugify(&name),
        };

        if slug.is_empty() {
            return None;
        }

        Some(LocalityRecord {
            department: field(keys::DEPARTMENT),
            postal_code: field(keys::POSTAL_CODE),
            population: field(keys::POPULATION),
            name,
            slug,
            raw,
            fields,
        })
    }

    /// The canonical value for `key`, falling back to the raw value, or `""`.
    pub fn get(&self, key: &str) -> &str {
        self.fields.get(key)
            .or_else(|| self.raw.get(key))
            .map(|v| v.as_str())
            .unwrap_or("")
    }

    /// The value for `key` if it is present and not blank.
    pub fn get_non_blank(&self, key: &str) -> Option<&str> {
        Some(self.get(key).trim()).filter(|v| !v.is_empty())
    }

    /// The population as a number; unparseable values count as zero.
    pub fn population(&self) -> u64 {
        let digits: String = self.population.chars().filter(|c| c.is_ascii_digit()).collect();
        digits.parse().unwrap_or(0)
    }

    /// The outbound URL for the niche whose dataset column is `column`, as in
    /// `url_<column>`.
    pub fn niche_url(&self, column: &str) -> Option<&str> {
        self.get_non_blank(&format!("url_{column}"))
    }
}
