use std::fs;
use std::path::Path;

use serde::de::DeserializeOwned;
use tracing::warn;

use crate::error::{ErrorDetail, Result, Chainable};
use crate::data::Fields;

/// A structured data format that deserializes whole documents.
pub trait Format: Sized {
    /// The data format's error type.
    type Error: ErrorDetail + 'static;

    /// Parses `string` as the data format `Self` as a `T` or returns an error
    /// if the `string` is an invalid `T`.
    fn from_str<T: DeserializeOwned>(string: &str) -> Result<T, Self::Error>;

    fn read<T: DeserializeOwned>(path: &Path) -> Result<T> {
        let string = read_to_string(path)?;
        Self::from_str(&string).chain_with(|| error! {
            "failed to parse data file",
            "path" => path.display(),
        })
    }
}

macro_rules! impl_format {
    ($name:ident : $func:expr, $E:ty) => (
        #[derive(Debug, Clone, Copy)]
        pub struct $name;

        impl Format for $name {
            type Error = $E;

            fn from_str<T: DeserializeOwned>(s: &str) -> Result<T, $E> {
                $func(s)
            }
        }
    );
}

impl_format!(Toml: toml::from_str, toml::de::Error);
impl_format!(Json: serde_json::from_str, serde_json::Error);

pub fn read_to_string(path: &Path) -> Result<String> {
    fs::read_to_string(path).chain_with(|| error! {
        "failed to read file",
        "path" => path.display(),
    })
}

/// A row-oriented locality dataset format.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Tabular {
    /// Comma-separated values with a header row.
    Csv,
    /// A JSON array of flat objects.
    Json,
}

impl Tabular {
    pub fn detect(path: &Path) -> Option<Tabular> {
        let ext = path.extension()?.to_str()?;
        if ext.eq_ignore_ascii_case("csv") {
            Some(Tabular::Csv)
        } else if ext.eq_ignore_ascii_case("json") {
            Some(Tabular::Json)
        } else {
            None
        }
    }

    pub fn read_rows(self, path: &Path) -> Result<Vec<Fields>> {
        match self {
            Tabular::Csv => read_csv_rows(path),
            Tabular::Json => read_json_rows(path),
        }
    }
}

fn read_csv_rows(path: &Path) -> Result<Vec<Fields>> {
    let mut reader = csv::ReaderBuilder::new()
        .flexible(true)
        .from_path(path)
        .chain_with(|| error!("failed to open CSV dataset", "path" => path.display()))?;

    let headers: Vec<String> = reader.headers()?
        .iter()
        .map(|h| h.trim_start_matches('\u{feff}').trim().to_string())
        .collect();

    let mut rows = Vec::new();
    for (i, record) in reader.records().enumerate() {
        let record = match record {
            Ok(record) => record,
            Err(e) => {
                warn!(path = %path.display(), line = i + 2, error = %e, "skipping unreadable CSV row");
                continue;
            }
        };

        let row = headers.iter()
            .zip(record.iter())
            .map(|(header, value)| (header.clone(), value.to_string()))
            .collect();

        rows.push(row);
    }

    Ok(rows)
}

fn read_json_rows(path: &Path) -> Result<Vec<Fields>> {
    use serde_json::{Map, Value};

    let objects: Vec<Map<String, Value>> = Json::read(path)?;
    let rows = objects.into_iter()
        .map(|object| object.into_iter()
            .map(|(key, value)| {
                let value = match value {
                    Value::String(s) => s,
                    Value::Null => String::new(),
                    other => other.to_string(),
                };

                (key, value)
            })
            .collect())
        .collect();

    Ok(rows)
}

#[cfg(test)]
mod tests {
    use std::path::Path;

    use super::*;

    #[test]
    fn csv_rows_keep_quoted_commas() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("villes.csv");
        std::fs::write(&path, "\u{feff}ville,slug,Accroche Hero\n\
            Toulouse,toulouse,\"Rose, brique et web\"\n\
            Albi,albi\n").unwrap();

        let rows = Tabular::detect(&path).unwrap().read_rows(&path).unwrap();
        assert_eq!(rows.len(), 2);
        assert_eq!(rows[0]["ville"], "Toulouse");
        assert_eq!(rows[0]["Accroche Hero"], "Rose, brique et web");
        assert!(!rows[1].contains_key("Accroche Hero"));
    }

    #[test]
    fn json_rows_stringify_scalars() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("villes.json");
        std::fs::write(&path, r#"[{"ville": "Albi", "population": 49000, "note": null}]"#).unwrap();

        let rows = Tabular::Json.read_rows(&path).unwrap();
        assert_eq!(rows[0]["population"], "49000");
        assert_eq!(rows[0]["note"], "");
    }

    #[test]
    fn detect_by_extension() {
        assert_eq!(Tabular::detect(Path::new("a/villes.CSV")), Some(Tabular::Csv));
        assert_eq!(Tabular::detect(Path::new("villes.json")), Some(Tabular::Json));
        assert_eq!(Tabular::detect(Path::new("villes.xlsx")), None);
        assert_eq!(Tabular::detect(Path::new("villes")), None);
    }
}
