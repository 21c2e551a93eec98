//! Deterministic, time-bucketed display values.
//!
//! Every value is drawn from a generator built for one call from
//! `hash(slug, purpose, bucket)`. Values are therefore stable for a locality
//! until the time bucket rolls over, distinct purposes never share a stream,
//! and no generator state is shared between pages.

mod avatar;
mod freshness;

use std::hash::{Hash, Hasher};
use std::str::FromStr;

use chrono::{Datelike, Local, NaiveDate, NaiveDateTime};
use rand::{Rng, SeedableRng, rngs::StdRng};
use rustc_hash::FxHasher;
use serde::{Deserialize, Serialize};

use crate::error::Error;
use crate::data::{LocalityRecord, keys};

pub use avatar::*;
pub use freshness::*;

/// How long enrichment values stay stable.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Bucket {
    /// Calendar month: `2026-10`.
    #[default]
    Month,
    /// Two ISO weeks, counted from week 1: `2026-f20`.
    Fortnight,
    /// Calendar day: `2026-10-18`.
    Day,
}

impl FromStr for Bucket {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "month" => Ok(Bucket::Month),
            "fortnight" => Ok(Bucket::Fortnight),
            "day" => Ok(Bucket::Day),
            _ => err!("unknown time bucket", "bucket" => s, "expected" => "month, fortnight, or day"),
        }
    }
}

/// The instant a run started at. Captured once and passed to every stage.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RunClock {
    now: NaiveDateTime,
}

impl RunClock {
    pub fn system() -> RunClock {
        RunClock { now: Local::now().naive_local() }
    }

    pub fn fixed(now: NaiveDateTime) -> RunClock {
        RunClock { now }
    }

    /// Noon on the given day, or `None` if the date is invalid.
    pub fn on(year: i32, month: u32, day: u32) -> Option<RunClock> {
        let now = NaiveDate::from_ymd_opt(year, month, day)?.and_hms_opt(12, 0, 0)?;
        Some(RunClock { now })
    }

    pub fn now(&self) -> NaiveDateTime {
        self.now
    }

    pub fn date(&self) -> NaiveDate {
        self.now.date()
    }

    pub fn bucket_key(&self, bucket: Bucket) -> String {
        let date = self.date();
        match bucket {
            Bucket::Month => date.format("%Y-%m").to_string(),
            Bucket::Fortnight => {
                let week = date.iso_week();
                format!("{}-f{:02}", week.year(), (week.week() - 1) / 2)
            }
            Bucket::Day => date.format("%Y-%m-%d").to_string(),
        }
    }
}

/// What a generated value is for. Each purpose salts its seed differently.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Purpose {
    Reviews,
    Portfolio,
    Rating,
    Scarcity,
    Slot,
    Availability,
    Links,
    Demo,
}

impl Purpose {
    fn salt(self) -> &'static str {
        match self {
            Purpose::Reviews => "nb_avis",
            Purpose::Portfolio => "nb_sites_realises",
            Purpose::Rating => "note_google",
            Purpose::Scarcity => "places_restantes",
            Purpose::Slot => "prochain_creneau",
            Purpose::Availability => "prochaine_dispo",
            Purpose::Links => "maillage",
            Purpose::Demo => "demo",
        }
    }
}

/// The seed for `key`'s `purpose` values during `bucket_key`.
pub fn seed(key: &str, purpose: Purpose, bucket_key: &str) -> u64 {
    let mut hasher = FxHasher::default();
    key.hash(&mut hasher);
    purpose.salt().hash(&mut hasher);
    bucket_key.hash(&mut hasher);
    hasher.finish()
}

const DEFAULT_REVIEWS: i64 = 127;
const DEFAULT_PORTFOLIO: i64 = 47;

/// Derives enrichment values for localities.
#[derive(Debug, Clone)]
pub struct Enricher {
    clock: RunClock,
    bucket_key: String,
    freshness: Freshness,
}

impl Enricher {
    pub fn new(clock: RunClock, bucket: Bucket) -> Enricher {
        Enricher {
            bucket_key: clock.bucket_key(bucket),
            freshness: Freshness::at(clock),
            clock,
        }
    }

    pub fn clock(&self) -> RunClock {
        self.clock
    }

    pub fn bucket_key(&self) -> &str {
        &self.bucket_key
    }

    pub fn freshness(&self) -> &Freshness {
        &self.freshness
    }

    /// A fresh generator for `key`'s `purpose` in the current bucket.
    pub fn rng(&self, key: &str, purpose: Purpose) -> StdRng {
        StdRng::seed_from_u64(seed(key, purpose, &self.bucket_key))
    }

    /// All enrichment values for `record`, keyed by placeholder name.
    pub fn enrich(&self, record: &LocalityRecord) -> Vec<(&'static str, String)> {
        let slug = &record.slug;
        let base = |key: &str, default: i64| record.get(key).trim().parse().unwrap_or(default);

        let reviews = base("nb_avis", DEFAULT_REVIEWS)
            .saturating_add(self.rng(slug, Purpose::Reviews).random_range(-10..=30));
        let portfolio = base("nb_sites_realises", DEFAULT_PORTFOLIO)
            .saturating_add(self.rng(slug, Purpose::Portfolio).random_range(-5..=15));
        let rating: u32 = self.rng(slug, Purpose::Rating).random_range(47..=50);
        let places: u32 = self.rng(slug, Purpose::Scarcity).random_range(2..=5);
        let next_slot: u32 = self.rng(slug, Purpose::Slot).random_range(3..=12);

        let mut availability = self.rng(slug, Purpose::Availability);
        let hour: u32 = availability.random_range(8..=22);
        let minute: u32 = availability.random_range(10..=55);

        let first_name = record.get_non_blank(keys::FIRST_NAME).unwrap_or(DEFAULT_FIRST_NAME);
        let avatar = Avatar::for_first_name(first_name);

        let mut pairs = crate::pairs! {
            keys::FIRST_NAME => first_name,
            "nb_avis" => reviews,
            "nb_sites_realises" => portfolio,
            "note_google" => format!("{}.{}", rating / 10, rating % 10),
            "places_restantes" => places,
            "prochain_creneau_jours" => next_slot,
            "prochaine_dispo" => format!("aujourd'hui à {hour}h{minute:02}"),
            "avatar_url" => avatar.url(),
            "avatar_initiales" => avatar.initials,
        };

        pairs.extend(self.freshness.pairs());
        pairs
    }
}
