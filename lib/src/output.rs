//! Writing pages into the silo directory tree.

use std::fmt;
use std::fs;
use std::path::{Path, PathBuf};

use dashmap::DashSet;

use crate::error::{ErrorDetail, Result, Chainable};
use crate::url::UrlBuf;

/// The position of a page in the output hierarchy.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum PagePath {
    /// `<department>/<prefix><slug>.html`
    Locality { department: String, slug: String },
    /// `departement/<department>/index.html`
    Hub { department: String },
    /// `demos/<niche>/<brand>/index.html`
    Demo { niche: String, brand: String },
    /// `index.html`
    Home,
}

impl PagePath {
    pub fn locality<D: Into<String>, S: Into<String>>(department: D, slug: S) -> PagePath {
        PagePath::Locality { department: department.into(), slug: slug.into() }
    }

    pub fn hub<D: Into<String>>(department: D) -> PagePath {
        PagePath::Hub { department: department.into() }
    }

    pub fn demo<N: Into<String>, B: Into<String>>(niche: N, brand: B) -> PagePath {
        PagePath::Demo { niche: niche.into(), brand: brand.into() }
    }
}

impl fmt::Display for PagePath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PagePath::Locality { department, slug } => write!(f, "locality {department}/{slug}"),
            PagePath::Hub { department } => write!(f, "hub {department}"),
            PagePath::Demo { niche, brand } => write!(f, "demo {niche}/{brand}"),
            PagePath::Home => write!(f, "home"),
        }
    }
}

/// Maps page positions to files and canonical URL paths.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Layout {
    /// Prepended to locality file names, as in `creation-site-internet-`.
    pub page_prefix: String,
    /// Whether locality URLs omit the `.html` extension.
    pub clean_urls: bool,
}

impl Default for Layout {
    fn default() -> Self {
        Layout { page_prefix: String::new(), clean_urls: true }
    }
}

impl Layout {
    pub const HUB_DIR: &'static str = "departement";
    pub const DEMO_DIR: &'static str = "demos";

    /// The file `page` is written to, relative to the output root.
    pub fn file(&self, page: &PagePath) -> PathBuf {
        match page {
            PagePath::Locality { department, slug } => {
                Path::new(department).join(format!("{}{slug}.html", self.page_prefix))
            }
            PagePath::Hub { department } => Path::new(Self::HUB_DIR).join(department).join("index.html"),
            PagePath::Demo { niche, brand } => Path::new(Self::DEMO_DIR).join(niche).join(brand).join("index.html"),
            PagePath::Home => PathBuf::from("index.html"),
        }
    }

    /// The canonical URL path of `page`, relative to the origin it is served
    /// from. Demo pages are served from their niche's own domain.
    ///
    /// ```rust
    /// use silo::output::{Layout, PagePath};
    ///
    /// let layout = Layout { page_prefix: "creation-site-internet-".into(), clean_urls: true };
    /// let page = PagePath::locality("haute-garonne", "toulouse");
    /// assert_eq!(layout.url(&page).as_str(), "/haute-garonne/creation-site-internet-toulouse");
    /// assert_eq!(layout.url(&PagePath::hub("tarn")).as_str(), "/departement/tarn/");
    /// assert_eq!(layout.url(&PagePath::demo("sante", "cabinet-albi")).as_str(), "/sante/cabinet-albi/");
    /// ```
    pub fn url(&self, page: &PagePath) -> UrlBuf {
        match page {
            PagePath::Locality { department, slug } => {
                let extension = if self.clean_urls { "" } else { ".html" };
                UrlBuf::from(format!("/{department}/{}{slug}{extension}", self.page_prefix))
            }
            PagePath::Hub { department } => UrlBuf::from(format!("/{}/{department}/", Self::HUB_DIR)),
            PagePath::Demo { niche, brand } => UrlBuf::from(format!("/{niche}/{brand}/")),
            PagePath::Home => UrlBuf::from("/"),
        }
    }
}

/// A page that has been written.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Emitted {
    pub page: PagePath,
    /// Relative to the output root.
    pub file: PathBuf,
    pub url: UrlBuf,
}

/// Two pages mapped to the same output file.
#[derive(Debug)]
pub struct DuplicateOutput {
    pub file: PathBuf,
    pub page: PagePath,
}

impl fmt::Display for DuplicateOutput {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "two pages map to the same output file")
    }
}

impl ErrorDetail for DuplicateOutput {
    fn context(&self) -> Vec<(Option<String>, String)> {
        vec![
            (Some("file".into()), self.file.display().to_string()),
            (Some("second page".into()), self.page.to_string()),
        ]
    }
}

/// Persists pages under an output root. Safe to share between workers.
pub struct OutputWriter {
    root: PathBuf,
    layout: Layout,
    dirs: DashSet<PathBuf>,
    files: DashSet<PathBuf>,
    emitted: boxcar::Vec<Emitted>,
}

impl OutputWriter {
    pub fn new<P: Into<PathBuf>>(root: P, layout: Layout) -> OutputWriter {
        OutputWriter {
            root: root.into(),
            layout,
            dirs: DashSet::new(),
            files: DashSet::new(),
            emitted: boxcar::Vec::new(),
        }
    }

    /// Writes `contents` as `page`, replacing any file left by a previous
    /// run, and returns the page's canonical URL path.
    ///
    /// Fails if another page of this run was already written to the same
    /// file.
    pub fn write(&self, page: PagePath, contents: &str) -> Result<UrlBuf> {
        let file = self.layout.file(&page);
        if !self.files.insert(file.clone()) {
            return Err(DuplicateOutput { file, page }.into());
        }

        let path = self.root.join(&file);
        if let Some(parent) = path.parent() {
            self.ensure_dir(parent)?;
        }

        fs::write(&path, contents).chain_with(|| error! {
            "failed to write page",
            "path" => path.display(),
        })?;

        let url = self.layout.url(&page);
        self.emitted.push(Emitted { page, file, url: url.clone() });
        Ok(url)
    }

    /// Creates `dir` and its parents unless this writer already did.
    pub fn ensure_dir(&self, dir: &Path) -> Result<()> {
        if self.dirs.contains(dir) {
            return Ok(());
        }

        fs::create_dir_all(dir).chain_with(|| error! {
            "failed to create output directory",
            "path" => dir.display(),
        })?;

        self.dirs.insert(dir.to_path_buf());
        Ok(())
    }

    /// Every page written so far, in completion order.
    pub fn emitted(&self) -> impl Iterator<Item = &Emitted> {
        self.emitted.iter().map(|(_, emitted)| emitted)
    }

    pub fn len(&self) -> usize {
        self.emitted.count()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    static_assertions::assert_impl_all!(OutputWriter: Send, Sync);

    #[test]
    fn layout_paths() {
        let layout = Layout { page_prefix: "creation-site-internet-".into(), clean_urls: false };
        let page = PagePath::locality("tarn", "albi");
        assert_eq!(layout.file(&page), Path::new("tarn/creation-site-internet-albi.html"));
        assert_eq!(layout.url(&page).as_str(), "/tarn/creation-site-internet-albi.html");
        assert_eq!(layout.file(&PagePath::hub("tarn")), Path::new("departement/tarn/index.html"));
        assert_eq!(layout.file(&PagePath::demo("sante", "cabinet")), Path::new("demos/sante/cabinet/index.html"));
        assert_eq!(layout.file(&PagePath::Home), Path::new("index.html"));
    }

    #[test]
    fn writes_create_directories_and_overwrite() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::create_dir_all(dir.path().join("tarn")).unwrap();
        std::fs::write(dir.path().join("tarn/albi.html"), "stale").unwrap();

        let writer = OutputWriter::new(dir.path(), Layout::default());
        let url = writer.write(PagePath::locality("tarn", "albi"), "fresh").unwrap();
        writer.write(PagePath::locality("tarn", "castres"), "fresh").unwrap();
        writer.write(PagePath::hub("tarn"), "hub").unwrap();

        assert_eq!(url.as_str(), "/tarn/albi");
        assert_eq!(std::fs::read_to_string(dir.path().join("tarn/albi.html")).unwrap(), "fresh");
        assert!(dir.path().join("departement/tarn/index.html").is_file());
        assert_eq!(writer.len(), 3);

        let mut files: Vec<_> = writer.emitted().map(|emitted| emitted.file.clone()).collect();
        files.sort();
        assert_eq!(files, [
            PathBuf::from("departement/tarn/index.html"),
            PathBuf::from("tarn/albi.html"),
            PathBuf::from("tarn/castres.html"),
        ]);
    }

    #[test]
    fn duplicate_files_are_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let writer = OutputWriter::new(dir.path(), Layout::default());
        writer.write(PagePath::demo("resto", "la-table"), "a").unwrap();

        let e = writer.write(PagePath::demo("resto", "la-table"), "b").unwrap_err();
        assert!(e.to_string().contains("two pages map to the same output file"));
        assert_eq!(writer.len(), 1);
    }
}
