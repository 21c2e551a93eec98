//! A full generation run.
//!
//! Stages are called in process and share typed data: the dataset is loaded
//! once, every page is rendered and written on a worker pool, and the
//! sitemaps are flushed once all workers are done.

mod demo;

use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::{Duration, Instant};

use rayon::prelude::*;
use rustc_hash::FxHashSet;
use tracing::{debug, info, warn};

use crate::error::{Result, Chainable};
use crate::time;
use crate::data::{Dataset, keys};
use crate::enrich::{Bucket, Enricher, RunClock};
use crate::fragments::{self, NicheFragments};
use crate::links::{self, Hub, LinkRenderer, Placement, Silo};
use crate::output::{Layout, OutputWriter, PagePath};
use crate::sitemap::{self, Sitemap, SitemapEntry};
use crate::template::{Layer, Mode, PageContext, Template};
use crate::url::UrlBuf;

pub use demo::*;

/// Pages are logged in batches of this many.
const PROGRESS_EVERY: usize = 100;

/// Run-wide settings.
#[derive(Debug, Clone)]
pub struct Options {
    /// The origin locality, hub, and home URLs are served from.
    pub base_url: UrlBuf,
    pub layout: Layout,
    pub link_bound: usize,
    pub bucket: Bucket,
    pub mode: Mode,
    /// Worker count. `None` uses one worker per core.
    pub jobs: Option<usize>,
}

impl Default for Options {
    fn default() -> Self {
        Options {
            base_url: UrlBuf::from("https://agence-web-locale.fr"),
            layout: Layout::default(),
            link_bound: links::DEFAULT_BOUND,
            bucket: Bucket::default(),
            mode: Mode::Strict,
            jobs: None,
        }
    }
}

/// The templates of a run, one per generation mode. A mode without a
/// template is skipped.
#[derive(Debug, Default)]
pub struct Templates {
    pub locality: Option<Template>,
    pub department: Option<Template>,
    pub home: Option<Template>,
    pub demos: Vec<(DemoNiche, Template)>,
}

impl Templates {
    /// Loads the template at `path` for the mode `mode`. A missing file is
    /// logged and yields `None`.
    pub fn load_optional(mode: &str, path: Option<&Path>) -> Result<Option<Template>> {
        let Some(path) = path else {
            debug!(mode, "no template configured");
            return Ok(None);
        };

        if !path.exists() {
            warn!(mode, path = %path.display(), "template not found: skipping these pages");
            return Ok(None);
        }

        Template::load(path).map(Some)
    }
}

/// What a run produced.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Summary {
    pub localities: usize,
    pub hubs: usize,
    pub demos: usize,
    pub home: bool,
    pub sitemaps: Vec<(PathBuf, usize)>,
    pub elapsed: Duration,
}

impl Summary {
    pub fn pages(&self) -> usize {
        self.localities + self.hubs + self.demos + self.home as usize
    }
}

struct Run<'a> {
    dataset: &'a Dataset,
    options: &'a Options,
    silo: Silo<'a>,
    enricher: Enricher,
    links: LinkRenderer,
    fragments: NicheFragments,
    hub_title: Template,
    hub_description: Template,
    writer: OutputWriter,
    sitemap: Sitemap,
    done: AtomicUsize,
}

/// Generates every page of `dataset` into `output`.
pub fn generate(
    dataset: &Dataset,
    templates: &Templates,
    options: &Options,
    clock: RunClock,
    output: &Path,
) -> Result<Summary> {
    let start = Instant::now();
    let pool = rayon::ThreadPoolBuilder::new()
        .num_threads(options.jobs.unwrap_or(0))
        .build()
        .chain(error!("failed to start worker pool"))?;

    let silo = Silo::new(dataset, options.link_bound);
    let patterns = &dataset.niche.patterns;
    let run = Run {
        dataset,
        options,
        enricher: Enricher::new(clock, options.bucket),
        links: LinkRenderer::new(&silo, options.layout.clone()),
        fragments: NicheFragments::new(&dataset.niche),
        hub_title: Template::parse("patterns.hub_title", &patterns.hub_title),
        hub_description: Template::parse("patterns.hub_description", &patterns.hub_description),
        writer: OutputWriter::new(output, options.layout.clone()),
        sitemap: Sitemap::new(),
        done: AtomicUsize::new(0),
        silo,
    };

    run.writer.ensure_dir(output)?;
    if dataset.localities.is_empty() {
        warn!("no localities: only the home page can be generated");
    }

    let mut summary = Summary::default();
    pool.install(|| -> Result<()> {
        let hubs = run.silo.hubs();
        let (localities, departments) = rayon::join(
            || match &templates.locality {
                Some(template) => time!("localities", run.localities(template)),
                None => Ok(0),
            },
            || match &templates.department {
                Some(template) => time!("hubs", run.hubs(template, &hubs)),
                None => Ok(0),
            },
        );

        (summary.localities, summary.hubs) = match (localities, departments) {
            (Ok(l), Ok(h)) => (l, h),
            (Ok(_), Err(e)) | (Err(e), Ok(_)) => return Err(e),
            (Err(e1), Err(e2)) => return Err(e1.chain(e2)),
        };

        for (niche, template) in &templates.demos {
            summary.demos += time!("demos", run.demos(niche, template))?;
        }

        Ok(())
    })?;

    if let Some(template) = &templates.home {
        run.home(template)?;
        summary.home = true;
    }

    check_listed(&run.writer, &run.sitemap)?;
    summary.sitemaps = run.sitemap.flush(output)?;
    summary.elapsed = start.elapsed();
    info!(
        localities = summary.localities,
        hubs = summary.hubs,
        demos = summary.demos,
        sitemaps = summary.sitemaps.len(),
        elapsed_ms = summary.elapsed.as_millis() as u64,
        "generation complete"
    );

    Ok(summary)
}

/// Every written page must have exactly one sitemap entry.
fn check_listed(writer: &OutputWriter, sitemap: &Sitemap) -> Result<()> {
    let (pages, entries) = (writer.len(), sitemap.len());
    if pages != entries {
        return err! {
            "sitemap does not match the written pages",
            "pages" => pages,
            "entries" => entries,
        };
    }

    Ok(())
}

impl<'a> Run<'a> {
    fn mode(&self) -> Mode {
        self.options.mode
    }

    fn absolute(&self, path: &UrlBuf) -> UrlBuf {
        self.options.base_url.join(path)
    }

    fn progress(&self) {
        let done = self.done.fetch_add(1, Ordering::Relaxed) + 1;
        if done % PROGRESS_EVERY == 0 {
            info!(pages = done, "pages generated");
        }
    }

    fn emit(&self, page: PagePath, html: &str, partition: &str, origin: Option<&str>) -> Result<()> {
        let priority = sitemap::priority(&page);
        let path = self.writer.write(page, html)?;
        let url = match origin {
            Some(origin) => UrlBuf::from(origin).join(&path),
            None => self.absolute(&path),
        };

        let entry = SitemapEntry::new(url)
            .lastmod(self.enricher.freshness().date.clone())
            .priority(priority);

        self.sitemap.push(partition, entry);
        self.progress();
        Ok(())
    }

    fn localities(&self, template: &Template) -> Result<usize> {
        self.silo.placements()
            .par_iter()
            .try_for_each(|placement| self.locality(template, placement))?;

        Ok(self.silo.placements().len())
    }

    /// Builds the page context of `placement`, layer by layer.
    pub(crate) fn locality_context(&self, placement: &Placement<'a>) -> Result<PageContext> {
        let record = placement.record;
        let page = placement.page();
        let path = self.options.layout.url(&page);
        let department = &placement.department;

        let mut context = PageContext::new();
        context.extend(Layer::Record, record.raw.iter().map(|(k, v)| (k.as_str(), v.as_str())));
        context.extend(Layer::Normalized, record.fields.iter().map(|(k, v)| (k.as_str(), v.as_str())));
        context.extend(Layer::Normalized, crate::pairs! {
            keys::NAME => record.name,
            keys::SLUG => record.slug,
            keys::DEPARTMENT => record.department,
            keys::POSTAL_CODE => record.postal_code,
            keys::POPULATION => record.population,
        });

        context.extend(Layer::Enrichment, self.enricher.enrich(record));
        context.extend(Layer::Links, self.links.locality_links(&self.silo, placement, &self.enricher));
        context.extend(Layer::Globals, self.fragments.fixed().iter().map(|(k, v)| (*k, v.as_str())));
        context.extend(Layer::Globals, crate::pairs! {
            "slug_departement" => department.slug(),
            "departement_code" => department.code(),
            "url_departement" => self.options.layout.url(&PagePath::hub(department.slug())),
            "page_url" => path,
            "canonical_url" => self.absolute(&path),
            "image_url" => self.absolute(&UrlBuf::from(format!("/assets/hero-{}.jpg", record.slug))),
        });

        let per_page = self.fragments.per_page(&context, self.mode())?;
        context.extend(Layer::Globals, per_page);
        Ok(context)
    }

    fn locality(&self, template: &Template, placement: &Placement<'a>) -> Result<()> {
        if placement.department.record().is_none() {
            warn!(slug = %placement.record.slug, department = %placement.record.department,
                dir = placement.department.slug(), "unknown department: using a locally computed slug");
        }

        let context = self.locality_context(placement)?;
        let html = template.render(&context, self.mode())
            .chain_with(|| error!("failed to render locality page", "slug" => &placement.record.slug))?;

        self.emit(placement.page(), &html, Sitemap::GLOBAL, None)
    }

    fn hubs(&self, template: &Template, hubs: &[Hub<'a>]) -> Result<usize> {
        hubs.par_iter().try_for_each(|hub| self.hub(template, hub))?;
        Ok(hubs.len())
    }

    fn hub(&self, template: &Template, hub: &Hub<'a>) -> Result<()> {
        let layout = &self.options.layout;
        let mut context = PageContext::new();
        context.extend(Layer::Normalized, fragments::hub_pairs(&self.silo, hub, layout));
        context.extend(Layer::Links, crate::pairs! {
            "maillage_departements" => self.links.department_index(),
            "maillage_footer_france" => self.links.footer(),
        });

        context.extend(Layer::Enrichment, self.enricher.freshness().pairs());
        context.extend(Layer::Globals, self.fragments.fixed().iter().map(|(k, v)| (*k, v.as_str())));
        let meta = crate::pairs! {
            "meta_title" => self.hub_title.render(&context, self.mode())?,
            "meta_description" => self.hub_description.render(&context, self.mode())?,
            "canonical_url" => self.absolute(&layout.url(&PagePath::hub(&hub.record.slug))),
        };

        context.extend(Layer::Globals, meta);

        let html = template.render(&context, self.mode())
            .chain_with(|| error!("failed to render department hub", "department" => &hub.record.name))?;

        self.emit(PagePath::hub(&hub.record.slug), &html, Sitemap::GLOBAL, None)
    }

    /// Assigns every locality a unique brand slug within `niche`, in dataset
    /// order. A brand already taken is suffixed with the locality's slug.
    fn plan_demos(&self, niche: &DemoNiche) -> Vec<(usize, String, String)> {
        let mut taken = FxHashSet::default();
        let mut plan = Vec::with_capacity(self.silo.placements().len());
        for (i, placement) in self.silo.placements().iter().enumerate() {
            let brand = brand_name(placement.record, niche);
            let mut slug = crate::util::slugify(&brand);
            if slug.is_empty() || taken.contains(&slug) {
                slug = match slug.is_empty() {
                    true => placement.record.slug.clone(),
                    false => format!("{slug}-{}", placement.record.slug),
                };
            }

            if !taken.insert(slug.clone()) {
                warn!(niche = %niche.key, brand = %slug, "duplicate demo brand: skipping");
                continue;
            }

            plan.push((i, brand, slug));
        }

        plan
    }

    fn demos(&self, niche: &DemoNiche, template: &Template) -> Result<usize> {
        let plan = self.plan_demos(niche);
        let partition = Sitemap::niche_partition(&niche.key);
        let origin = niche.origin();
        plan.par_iter().try_for_each(|(i, brand, slug)| {
            let placement = &self.silo.placements()[*i];
            let record = placement.record;
            let mut context = PageContext::new();
            context.extend(Layer::Record, record.raw.iter().map(|(k, v)| (k.as_str(), v.as_str())));
            context.extend(Layer::Normalized, record.fields.iter().map(|(k, v)| (k.as_str(), v.as_str())));
            context.extend(Layer::Normalized, crate::pairs! {
                keys::NAME => record.name,
                keys::DEPARTMENT => record.department,
            });

            context.extend(Layer::Enrichment, professional_data(record, niche, brand, &self.enricher));
            context.extend(Layer::Enrichment, self.enricher.freshness().pairs());
            context.extend(Layer::Globals, crate::pairs! {
                "ville_slug" => record.slug,
                "departement_slug" => placement.department.slug(),
                "demo_domain" => niche.domain,
                "demo_url" => UrlBuf::from(origin.as_str()).join(format!("/{}/{slug}/", niche.key)),
            });

            let html = template.render(&context, self.mode())
                .chain_with(|| error!("failed to render demo page", "niche" => &niche.key, "brand" => slug))?;

            self.emit(PagePath::demo(&niche.key, slug), &html, &partition, Some(&origin))
        })?;

        Ok(plan.len())
    }

    fn home(&self, template: &Template) -> Result<()> {
        let mut context = PageContext::new();
        context.extend(Layer::Enrichment, self.enricher.freshness().pairs());
        context.extend(Layer::Links, crate::pairs! {
            "maillage_departements" => self.links.department_index(),
            "maillage_footer_france" => self.links.footer(),
        });

        context.extend(Layer::Globals, self.fragments.fixed().iter().map(|(k, v)| (*k, v.as_str())));
        context.extend(Layer::Globals, crate::pairs! {
            "nb_villes" => self.dataset.localities.len(),
            "canonical_url" => self.absolute(&UrlBuf::from("/")),
        });

        let html = template.render(&context, self.mode()).chain(error!("failed to render home page"))?;
        self.emit(PagePath::Home, &html, Sitemap::GLOBAL, None)
    }
}
