#![doc = svgbobdoc::transform!(
//! A library for generating locality landing-page silos.
//!
//! # Overview
//!
//! Silo turns a dataset of localities, a list of departments, and a niche
//! configuration into a static site: one landing page per locality, one hub
//! page per department, optional brand demo pages, and the sitemaps that list
//! them. Pages are flat `{{token}}` templates filled from a per-page context.
//!
//! ```svgbob
//!   +------------+   +-------------+   +-----------+
//!   | localities |   | departments |   |   niche   |
//!   +-----+------+   +------+------+   +-----+-----+
//!         |                 |                |
//!         +--------+--------+--------+-------+
//!                  |                 |
//!                  v                 v
//!            +-----------+     +-----------+
//!            |  enrich   |     |   links   |
//!            +-----+-----+     +-----+-----+
//!                  |                 |
//!                  +--------+--------+
//!                           |
//!                           v
//!                    +-------------+
//!                    |  template   |
//!                    +------+------+
//!                           |
//!               +-----------+-----------+
//!               v                       v
//!        +-------------+         +-------------+
//!        |   output    |         |   sitemap   |
//!        +-------------+         +-------------+
//! ```
//!
//! In words, a run:
//!
//!   1. Loads the [`Dataset`](data::Dataset): locality records normalized
//!      through a [`Schema`](data::Schema), the department list, and the
//!      niche configuration.
//!   2. Places every locality in its department's silo and picks a bounded,
//!      seeded sample of sibling links for it ([`links`]).
//!   3. Builds a layered [`PageContext`](template::PageContext) per page:
//!      record fields, normalized identifiers, seeded [`enrich`]ment values,
//!      link fragments, and niche-wide globals.
//!   4. Renders each template, failing on unresolved placeholders, and writes
//!      the page through an [`OutputWriter`](output::OutputWriter) that
//!      refuses to write two pages to the same file.
//!   5. Collects every page into its sitemap partition and writes the
//!      sitemaps once all pages are done.
//!
//! Steps 2 through 4 run in parallel on a `rayon` pool. Enrichment values are
//! seeded by the locality's slug and a time bucket, so two runs in the same
//! bucket produce identical pages. See [`generator::generate()`].
//!
//! After a run, [`audit`] checks the output tree and [`index`] rations the
//! site's URLs out to an indexing service.
)]

#[macro_use]
pub mod error;
pub mod util;
pub mod url;
pub mod data;
pub mod enrich;
pub mod template;
pub mod links;
pub mod fragments;
pub mod output;
pub mod sitemap;
pub mod generator;
pub mod audit;
pub mod index;

pub use rayon;

#[doc(hidden)]
pub use tracing;
