use std::path::Path;

use rustc_hash::FxHashMap;
use serde::{Deserialize, Serialize};

use crate::error::Result;
use crate::data::{Format, Json};
use crate::util::slugify;

/// Directory used for localities whose department name is blank.
pub const UNCLASSIFIED: &str = "sans-departement";

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DepartmentRecord {
    #[serde(alias = "nom")]
    pub name: String,
    #[serde(default)]
    pub slug: String,
    #[serde(default, deserialize_with = "crate::data::lenient_string")]
    pub code: String,
}

/// Department lookup table, read-only once built.
#[derive(Debug, Default)]
pub struct Departments {
    records: Vec<DepartmentRecord>,
    by_name: FxHashMap<String, usize>,
    by_slug: FxHashMap<String, usize>,
    /// Keyed by the slugified name, which need not equal the record's slug.
    by_name_slug: FxHashMap<String, usize>,
}

/// The outcome of resolving a locality's department name.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Resolution<'a> {
    /// The name matched a record, exactly or through its slug.
    Known(&'a DepartmentRecord),
    /// No record matched; the slug was computed locally.
    Orphan { slug: String },
}

impl Resolution<'_> {
    pub fn slug(&self) -> &str {
        match self {
            Resolution::Known(record) => &record.slug,
            Resolution::Orphan { slug } => slug,
        }
    }

    pub fn code(&self) -> &str {
        match self {
            Resolution::Known(record) => &record.code,
            Resolution::Orphan { .. } => "",
        }
    }

    pub fn record(&self) -> Option<&DepartmentRecord> {
        match self {
            Resolution::Known(record) => Some(record),
            Resolution::Orphan { .. } => None,
        }
    }
}

impl Departments {
    /// Builds the table. Blank slugs are derived from the name and every slug
    /// is passed through [`slugify()`] so that the orphan fallback computes the
    /// same slug a canonical record would carry.
    pub fn new(records: Vec<DepartmentRecord>) -> Result<Departments> {
        let mut departments = Departments::default();
        for mut record in records {
            let source = if record.slug.trim().is_empty() { &record.name } else { &record.slug };
            record.slug = slugify(source);
            if record.slug.is_empty() {
                return err! {
                    "department record has neither a name nor a slug",
                    "code" => record.code,
                };
            }

            let i = departments.records.len();
            if let Some(&existing) = departments.by_name.get(&record.name) {
                return err! {
                    "duplicate department name",
                    "name" => record.name,
                    "first code" => departments.records[existing].code,
                    "second code" => record.code,
                };
            }

            if let Some(&existing) = departments.by_slug.get(&record.slug) {
                return err! {
                    "duplicate department slug",
                    "slug" => record.slug,
                    "first name" => departments.records[existing].name,
                    "second name" => record.name,
                };
            }

            departments.by_name.insert(record.name.clone(), i);
            departments.by_slug.insert(record.slug.clone(), i);
            departments.by_name_slug.entry(slugify(&record.name)).or_insert(i);
            departments.records.push(record);
        }

        Ok(departments)
    }

    pub fn load(path: &Path) -> Result<Departments> {
        Departments::new(Json::read(path)?)
    }

    pub fn resolve(&self, name: &str) -> Resolution<'_> {
        if let Some(&i) = self.by_name.get(name) {
            return Resolution::Known(&self.records[i]);
        }

        let slug = slugify(name);
        match self.by_slug.get(&slug).or_else(|| self.by_name_slug.get(&slug)) {
            Some(&i) => Resolution::Known(&self.records[i]),
            None if slug.is_empty() => Resolution::Orphan { slug: UNCLASSIFIED.into() },
            None => Resolution::Orphan { slug },
        }
    }

    pub fn iter(&self) -> impl Iterator<Item = &DepartmentRecord> {
        self.records.iter()
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }
}
