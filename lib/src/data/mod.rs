//! Loading and normalizing the run's inputs.
//!
//! A run consumes three inputs: a locality dataset (CSV or JSON rows), a
//! department list (JSON), and a niche configuration (JSON or TOML). Rows are
//! normalized through a [`Schema`] into [`LocalityRecord`]s.

mod format;
mod schema;
mod record;
mod department;
mod niche;

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use rustc_hash::FxHashMap;
use serde::{Deserialize, Deserializer};
use tracing::{info, warn};

use crate::error::{Result, Chainable};

pub use format::*;
pub use schema::*;
pub use record::*;
pub use department::*;
pub use niche::*;

/// A flat row of string fields.
pub type Fields = BTreeMap<String, String>;

/// Where a run's inputs live.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Sources {
    pub localities: PathBuf,
    pub departments: PathBuf,
    pub niche: PathBuf,
}

/// Everything a run reads, held in memory and shared read-only by workers.
#[derive(Debug)]
pub struct Dataset {
    pub localities: Vec<LocalityRecord>,
    pub departments: Departments,
    pub niche: NicheConfig,
}

impl Dataset {
    /// Loads all inputs.
    ///
    /// A missing locality dataset is not an error: it is logged and yields an
    /// empty run. Missing department or niche data aborts the run since no
    /// page could be rendered without it.
    pub fn load(sources: &Sources, schema: &Schema) -> Result<Dataset> {
        for (what, path) in [("department list", &sources.departments), ("niche config", &sources.niche)] {
            if !path.exists() {
                return err! {
                    format!("required {what} is missing"),
                    "path" => path.display(),
                };
            }
        }

        let departments = Departments::load(&sources.departments)?;
        let niche = NicheConfig::load(&sources.niche)?;
        let localities = load_localities(&sources.localities, schema)?;
        info!(localities = localities.len(), departments = departments.len(), niche = %niche.name, "loaded dataset");
        Ok(Dataset { localities, departments, niche })
    }

    pub fn from_parts(localities: Vec<LocalityRecord>, departments: Departments, niche: NicheConfig) -> Dataset {
        Dataset { localities, departments, niche }
    }
}

/// Reads raw dataset rows, detecting the format from the extension.
pub fn read_rows(path: &Path) -> Result<Vec<Fields>> {
    let Some(format) = Tabular::detect(path) else {
        return err! {
            "unsupported locality dataset format",
            "path" => path.display(),
            "expected" => "a .csv or .json file",
        };
    };

    format.read_rows(path)
}

/// Reads and normalizes the locality dataset at `path`.
///
/// Rows without a usable slug are skipped with a warning. Two rows with the
/// same slug are an error: they would be written to the same page.
pub fn load_localities(path: &Path, schema: &Schema) -> Result<Vec<LocalityRecord>> {
    if !path.exists() {
        warn!(path = %path.display(), "locality dataset not found: nothing to generate");
        return Ok(vec![]);
    }

    let rows = read_rows(path)?;
    let mut seen: FxHashMap<String, usize> = FxHashMap::default();
    let mut localities = Vec::with_capacity(rows.len());
    for (i, row) in rows.into_iter().enumerate() {
        let Some(record) = LocalityRecord::from_row(row, schema) else {
            warn!(path = %path.display(), row = i + 1, "skipping locality without a name or slug");
            continue;
        };

        if let Some(first) = seen.insert(record.slug.clone(), i + 1) {
            return err! {
                "duplicate locality slug",
                "slug" => record.slug,
                "first row" => first,
                "second row" => i + 1,
            }.chain_with(|| error!("invalid locality dataset", "path" => path.display()));
        }

        localities.push(record);
    }

    Ok(localities)
}

/// Rewrites the locality dataset at `input` as a JSON array at `output`.
///
/// Each row keeps its original fields and gains the canonical fields `schema`
/// resolves, so the result loads identically under any schema. Returns the
/// number of rows written.
pub fn convert(input: &Path, output: &Path, schema: &Schema) -> Result<usize> {
    let rows: Vec<Fields> = read_rows(input)?
        .into_iter()
        .map(|mut row| {
            let normalized = schema.normalize(&row);
            row.extend(normalized);
            row
        })
        .collect();

    let json = serde_json::to_string_pretty(&rows)?;
    std::fs::write(output, json).chain_with(|| error! {
        "failed to write converted dataset",
        "path" => output.display(),
    })?;

    info!(rows = rows.len(), from = %input.display(), to = %output.display(), "converted dataset");
    Ok(rows.len())
}

/// Accepts strings, numbers, and `null` (as `""`) alike.
pub(crate) fn lenient_string<'de, D: Deserializer<'de>>(de: D) -> Result<String, D::Error> {
    Ok(match serde_json::Value::deserialize(de)? {
        serde_json::Value::String(s) => s,
        serde_json::Value::Null => String::new(),
        other => other.to_string(),
    })
}
