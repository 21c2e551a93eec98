//! Sitemap protocol documents.
//!
//! Entries are collected from every worker into named partitions and written
//! once all pages are done. Each partition is sorted by URL before it is
//! written, so the output doesn't depend on worker scheduling.

use std::fs;
use std::path::{Path, PathBuf};

use parking_lot::Mutex;
use quick_xml::events::{BytesDecl, BytesEnd, BytesStart, BytesText, Event};
use quick_xml::{Reader, Writer};
use rustc_hash::FxHashMap;

use crate::error::{Result, Chainable};
use crate::output::PagePath;
use crate::url::UrlBuf;

pub const NAMESPACE: &str = "http://www.sitemaps.org/schemas/sitemap/0.9";

/// One `<url>` element.
#[derive(Debug, Clone, PartialEq)]
pub struct SitemapEntry {
    pub url: UrlBuf,
    pub lastmod: Option<String>,
    pub priority: Option<f32>,
}

impl SitemapEntry {
    pub fn new<U: Into<UrlBuf>>(url: U) -> SitemapEntry {
        SitemapEntry { url: url.into(), lastmod: None, priority: None }
    }

    pub fn lastmod<S: Into<String>>(mut self, date: S) -> Self {
        self.lastmod = Some(date.into());
        self
    }

    pub fn priority(mut self, priority: Option<f32>) -> Self {
        self.priority = priority;
        self
    }
}

/// The declared priority of a page: home above hubs above localities.
/// Demo pages declare none.
pub fn priority(page: &PagePath) -> Option<f32> {
    match page {
        PagePath::Home => Some(1.0),
        PagePath::Hub { .. } => Some(0.9),
        PagePath::Locality { .. } => Some(0.8),
        PagePath::Demo { .. } => None,
    }
}

/// Collected sitemap entries, keyed by partition file name.
#[derive(Debug, Default)]
pub struct Sitemap {
    partitions: Mutex<FxHashMap<String, Vec<SitemapEntry>>>,
}

impl Sitemap {
    /// The site-wide partition.
    pub const GLOBAL: &'static str = "sitemap.xml";

    pub fn new() -> Sitemap {
        Sitemap::default()
    }

    /// The partition for the demo pages of `niche`.
    pub fn niche_partition(niche: &str) -> String {
        format!("sitemaps/sitemap-{niche}.xml")
    }

    pub fn push(&self, partition: &str, entry: SitemapEntry) {
        let mut partitions = self.partitions.lock();
        match partitions.get_mut(partition) {
            Some(entries) => entries.push(entry),
            None => {
                partitions.insert(partition.to_string(), vec![entry]);
            }
        }
    }

    /// The total number of entries across partitions.
    pub fn len(&self) -> usize {
        self.partitions.lock().values().map(|v| v.len()).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Partition names, sorted.
    pub fn partitions(&self) -> Vec<String> {
        let mut names: Vec<String> = self.partitions.lock().keys().cloned().collect();
        names.sort();
        names
    }

    /// Writes every partition under `root`, returning each written file and
    /// its entry count. The site-wide partition is always written, empty if
    /// no page was pushed to it, so a sitemap from an earlier run can't
    /// survive.
    pub fn flush(&self, root: &Path) -> Result<Vec<(PathBuf, usize)>> {
        let mut partitions: Vec<(String, Vec<SitemapEntry>)> = self.partitions.lock()
            .iter()
            .map(|(name, entries)| (name.clone(), entries.clone()))
            .collect();

        if !partitions.iter().any(|(name, _)| name == Self::GLOBAL) {
            partitions.push((Self::GLOBAL.to_string(), vec![]));
        }

        partitions.sort_by(|a, b| a.0.cmp(&b.0));
        let mut written = Vec::with_capacity(partitions.len());
        for (name, mut entries) in partitions {
            entries.sort_by(|a, b| a.url.cmp(&b.url));
            let xml = to_xml(&entries)?;
            let path = root.join(&name);
            if let Some(parent) = path.parent() {
                fs::create_dir_all(parent)?;
            }

            fs::write(&path, xml).chain_with(|| error! {
                "failed to write sitemap",
                "path" => path.display(),
            })?;

            written.push((path, entries.len()));
        }

        Ok(written)
    }
}

/// Serializes `entries` as a `<urlset>` document. URLs and dates are escaped.
pub fn to_xml(entries: &[SitemapEntry]) -> Result<String> {
    type WriteResult = std::result::Result<(), Box<dyn std::error::Error + Send + Sync>>;

    fn text(writer: &mut Writer<Vec<u8>>, tag: &str, value: &str) -> WriteResult {
        writer.write_event(Event::Start(BytesStart::new(tag)))?;
        writer.write_event(Event::Text(BytesText::new(value)))?;
        writer.write_event(Event::End(BytesEnd::new(tag)))?;
        Ok(())
    }

    let write = |writer: &mut Writer<Vec<u8>>| -> WriteResult {
        writer.write_event(Event::Decl(BytesDecl::new("1.0", Some("UTF-8"), None)))?;
        writer.write_event(Event::Start(BytesStart::new("urlset").with_attributes([("xmlns", NAMESPACE)])))?;
        for entry in entries {
            writer.write_event(Event::Start(BytesStart::new("url")))?;
            text(writer, "loc", entry.url.as_str())?;
            if let Some(lastmod) = &entry.lastmod {
                text(writer, "lastmod", lastmod)?;
            }

            if let Some(priority) = entry.priority {
                text(writer, "priority", &format!("{priority:.1}"))?;
            }

            writer.write_event(Event::End(BytesEnd::new("url")))?;
        }

        writer.write_event(Event::End(BytesEnd::new("urlset")))?;
        Ok(())
    };

    let mut writer = Writer::new_with_indent(Vec::new(), b' ', 2);
    write(&mut writer).chain(error!("failed to serialize sitemap"))?;
    let mut xml = String::from_utf8(writer.into_inner()).map_err(|e| error!("sitemap is not UTF-8", e))?;
    xml.push('\n');
    Ok(xml)
}

/// Every `<loc>` in a sitemap document, unescaped, in document order.
pub fn read_locs(xml: &str) -> Result<Vec<String>> {
    let mut reader = Reader::from_str(xml);
    reader.config_mut().trim_text(true);

    let mut locs = vec![];
    let mut in_loc = false;
    let mut buf = Vec::new();
    loop {
        match reader.read_event_into(&mut buf) {
            Ok(Event::Start(ref e)) if e.name().as_ref() == b"loc" => in_loc = true,
            Ok(Event::End(ref e)) if e.name().as_ref() == b"loc" => in_loc = false,
            Ok(Event::Text(ref e)) if in_loc => {
                let loc = e.unescape().map_err(|e| error!("invalid escape in sitemap <loc>", e))?;
                locs.push(loc.into_owned());
            }
            Ok(Event::Eof) => break,
            Err(e) => return err!("malformed sitemap", "position" => reader.buffer_position(), e),
            _ => {}
        }

        buf.clear();
    }

    Ok(locs)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn urls_are_escaped() {
        let entries = [SitemapEntry::new("https://agence.fr/?a=1&b=<2>").lastmod("2026-10-18").priority(Some(0.8))];
        let xml = to_xml(&entries).unwrap();

        assert!(xml.starts_with(r#"<?xml version="1.0" encoding="UTF-8"?>"#));
        assert!(xml.contains(NAMESPACE));
        assert!(xml.contains("<loc>https://agence.fr/?a=1&amp;b=&lt;2&gt;</loc>"));
        assert!(xml.contains("<lastmod>2026-10-18</lastmod>"));
        assert!(xml.contains("<priority>0.8</priority>"));
        assert_eq!(read_locs(&xml).unwrap(), ["https://agence.fr/?a=1&b=<2>"]);
    }

    #[test]
    fn partitions_are_sorted_and_separate() {
        let dir = tempfile::tempdir().unwrap();
        let sitemap = Sitemap::new();
        sitemap.push(Sitemap::GLOBAL, SitemapEntry::new("https://agence.fr/tarn/castres"));
        sitemap.push(Sitemap::GLOBAL, SitemapEntry::new("https://agence.fr/tarn/albi"));
        sitemap.push(&Sitemap::niche_partition("sante"), SitemapEntry::new("https://sites-sante.fr/sante/cabinet/"));

        assert_eq!(sitemap.len(), 3);
        assert_eq!(sitemap.partitions(), ["sitemap.xml", "sitemaps/sitemap-sante.xml"]);

        let written = sitemap.flush(dir.path()).unwrap();
        assert_eq!(written, [
            (dir.path().join("sitemap.xml"), 2),
            (dir.path().join("sitemaps/sitemap-sante.xml"), 1),
        ]);

        let global = std::fs::read_to_string(dir.path().join("sitemap.xml")).unwrap();
        assert_eq!(read_locs(&global).unwrap(), ["https://agence.fr/tarn/albi", "https://agence.fr/tarn/castres"]);
        assert_eq!(global.matches("<url>").count(), 2);
    }

    #[test]
    fn empty_runs_replace_the_global_sitemap() {
        let dir = tempfile::tempdir().unwrap();
        let sitemap = Sitemap::new();
        sitemap.push(Sitemap::GLOBAL, SitemapEntry::new("https://agence.fr/tarn/albi"));
        sitemap.flush(dir.path()).unwrap();

        let written = Sitemap::new().flush(dir.path()).unwrap();
        assert_eq!(written, [(dir.path().join("sitemap.xml"), 0)]);

        let global = std::fs::read_to_string(dir.path().join("sitemap.xml")).unwrap();
        assert!(global.contains("<urlset"));
        assert!(read_locs(&global).unwrap().is_empty());
    }

    #[test]
    fn priorities_follow_hierarchy() {
        assert_eq!(priority(&PagePath::Home), Some(1.0));
        assert!(priority(&PagePath::hub("tarn")) > priority(&PagePath::locality("tarn", "albi")));
        assert_eq!(priority(&PagePath::demo("sante", "cabinet")), None);
    }

    #[test]
    fn malformed_documents_are_rejected() {
        assert!(read_locs("<urlset><url><loc>x</url></urlset>").is_err());
    }
}
