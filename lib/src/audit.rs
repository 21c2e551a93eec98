//! Post-run checks of a generated output tree.

use std::fs;
use std::path::{Path, PathBuf};

use rayon::prelude::*;
use rustc_hash::FxHashSet;
use tracing::{info, warn};

use crate::error::{Error, Result, Chainable};
use crate::output::Layout;
use crate::sitemap::{self, Sitemap};
use crate::template::{residual_placeholders, ResidualPlaceholders};
use crate::url::UrlBuf;

/// What an audit found.
#[derive(Debug, Default, Clone, PartialEq)]
pub struct Report {
    /// The number of `.html` files checked.
    pub pages: usize,
    /// The number of `<loc>` entries across all sitemaps.
    pub locs: usize,
    /// Pages containing `{{`, with the residual tokens, sorted by path.
    pub residues: Vec<(PathBuf, Vec<String>)>,
    /// Sitemap locations with no page on disk.
    pub missing: Vec<String>,
    /// Pages listed in no sitemap.
    pub unlisted: Vec<PathBuf>,
}

impl Report {
    pub fn is_clean(&self) -> bool {
        self.residues.is_empty() && self.missing.is_empty() && self.unlisted.is_empty()
    }

    /// `Ok(self)` if the tree is clean, and otherwise an error listing every
    /// problem.
    pub fn into_result(self) -> Result<Report> {
        if self.is_clean() {
            return Ok(self);
        }

        let mut e = error!("output audit failed",
            "residues" => self.residues.len(),
            "missing" => self.missing.len(),
            "unlisted" => self.unlisted.len());

        for (path, tokens) in &self.residues {
            e = e.with(ResidualPlaceholders { source: path.display().to_string(), tokens: tokens.clone() });
        }

        for loc in &self.missing {
            e = e.with(format!("sitemap entry has no page: {loc}"));
        }

        for path in &self.unlisted {
            e = e.with(format!("page is in no sitemap: {}", path.display()));
        }

        Err(e)
    }
}

/// The page file, relative to the output root, that a `<loc>` read from the
/// sitemap at `partition` points to.
///
/// ```rust
/// use silo::audit::loc_to_file;
///
/// assert_eq!(loc_to_file("sitemap.xml", "https://agence.fr/tarn/albi"), "tarn/albi.html");
/// assert_eq!(loc_to_file("sitemap.xml", "https://agence.fr/departement/tarn/"), "departement/tarn/index.html");
/// assert_eq!(loc_to_file("sitemap.xml", "https://agence.fr/"), "index.html");
/// assert_eq!(loc_to_file("sitemaps/sitemap-sante.xml", "https://sites-sante.fr/sante/cabinet/"),
///     "demos/sante/cabinet/index.html");
/// ```
pub fn loc_to_file(partition: &str, loc: &str) -> String {
    let url = UrlBuf::from(loc);
    let path = url.path().trim_start_matches('/');
    let mut file = match partition == Sitemap::GLOBAL {
        true => String::new(),
        false => format!("{}/", Layout::DEMO_DIR),
    };

    file.push_str(path);
    if file.is_empty() || file.ends_with('/') {
        file.push_str("index.html");
    } else if !path.rsplit('/').next().is_some_and(|name| name.contains('.')) {
        file.push_str(".html");
    }

    file
}

fn sitemap_files(root: &Path) -> Vec<(String, PathBuf)> {
    let mut found = vec![];
    let global = root.join(Sitemap::GLOBAL);
    if global.is_file() {
        found.push((Sitemap::GLOBAL.to_string(), global));
    }

    if let Ok(entries) = fs::read_dir(root.join("sitemaps")) {
        for entry in entries.filter_map(|entry| entry.ok()) {
            let path = entry.path();
            if path.extension().is_some_and(|ext| ext == "xml") {
                let name = format!("sitemaps/{}", entry.file_name().to_string_lossy());
                found.push((name, path));
            }
        }
    }

    found.sort();
    found
}

/// Walks every `.html` file under `root`, checking for unresolved
/// placeholders, and cross-checks the files against the sitemap locations.
pub fn audit(root: &Path) -> Result<Report> {
    if !root.is_dir() {
        return err!("output directory does not exist", "path" => root.display());
    }

    let mut pages: Vec<PathBuf> = jwalk::WalkDir::new(root)
        .sort(true)
        .into_iter()
        .filter_map(|entry| entry.ok())
        .filter(|entry| entry.file_type().is_file())
        .map(|entry| entry.path())
        .filter(|path| path.extension().is_some_and(|ext| ext == "html"))
        .collect();

    pages.sort();
    let mut residues: Vec<(PathBuf, Vec<String>)> = pages.par_iter()
        .map(|path| -> Result<Option<(PathBuf, Vec<String>)>> {
            let html = fs::read_to_string(path).chain_with(|| error!("failed to read page", "path" => path.display()))?;
            let tokens = residual_placeholders(&html);
            Ok((!tokens.is_empty()).then(|| (relative(root, path), tokens)))
        })
        .filter_map(|result| result.transpose())
        .collect::<Result<_, Error>>()?;

    residues.sort();

    let mut listed = FxHashSet::default();
    let mut missing = vec![];
    let mut locs = 0;
    for (partition, path) in sitemap_files(root) {
        let xml = fs::read_to_string(&path)?;
        let entries = sitemap::read_locs(&xml).chain_with(|| error!("invalid sitemap", "path" => path.display()))?;
        locs += entries.len();
        for loc in entries {
            let file = PathBuf::from(loc_to_file(&partition, &loc));
            if root.join(&file).is_file() {
                listed.insert(file);
            } else {
                missing.push(loc);
            }
        }
    }

    let unlisted: Vec<PathBuf> = pages.iter()
        .map(|path| relative(root, path))
        .filter(|file| !listed.contains(file))
        .collect();

    let report = Report { pages: pages.len(), locs, residues, missing, unlisted };
    match report.is_clean() {
        true => info!(pages = report.pages, locs = report.locs, "output audit passed"),
        false => warn!(
            residues = report.residues.len(),
            missing = report.missing.len(),
            unlisted = report.unlisted.len(),
            "output audit found problems"
        ),
    }

    Ok(report)
}

fn relative(root: &Path, path: &Path) -> PathBuf {
    path.strip_prefix(root).unwrap_or(path).to_path_buf()
}
