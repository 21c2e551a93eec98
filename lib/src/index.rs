//! Search-engine indexing submissions.
//!
//! Submissions are rationed by a daily quota and recorded in a persisted
//! [`IndexState`] so that a URL is only ever submitted once. The transport is
//! abstracted behind [`Submitter`]: this crate provides none.

use std::fs;
use std::path::Path;

use chrono::NaiveDate;
use rustc_hash::FxHashSet;
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use crate::error::{Result, Chainable};
use crate::sitemap::{self, Sitemap};

/// The default number of submissions allowed per day.
pub const DAILY_QUOTA: usize = 199;

/// Submission history, persisted as JSON between runs.
#[derive(Debug, Default, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct IndexState {
    /// Every URL submitted so far, in submission order.
    pub submitted: Vec<String>,
    /// The ISO date of the last run, or empty.
    pub last_run: String,
    /// Submissions made on `last_run`.
    pub today_count: usize,
}

impl IndexState {
    /// Reads the state at `path`. A missing file is a fresh state.
    pub fn load(path: &Path) -> Result<IndexState> {
        if !path.exists() {
            debug!(path = %path.display(), "no indexing state: starting fresh");
            return Ok(IndexState::default());
        }

        let json = fs::read_to_string(path)?;
        serde_json::from_str(&json).chain_with(|| error! {
            "invalid indexing state",
            "path" => path.display(),
        })
    }

    pub fn save(&self, path: &Path) -> Result<()> {
        let json = serde_json::to_string_pretty(self)?;
        fs::write(path, json).chain_with(|| error!("failed to save indexing state", "path" => path.display()))
    }

    /// Resets the daily count if `today` is not the day of the last run.
    pub fn roll_over(&mut self, today: NaiveDate) {
        let today = today.format("%Y-%m-%d").to_string();
        if self.last_run != today {
            debug!(previous = %self.last_run, today = %today, "new day: resetting submission count");
            self.last_run = today;
            self.today_count = 0;
        }
    }

    pub fn remaining(&self, quota: usize) -> usize {
        quota.saturating_sub(self.today_count)
    }

    /// The URLs of `urls` that would be submitted today: those never
    /// submitted, in order, up to the remaining quota. Call
    /// [`IndexState::roll_over()`] first.
    pub fn plan<'u>(&self, urls: &'u [String], quota: usize) -> Vec<&'u str> {
        let submitted: FxHashSet<&str> = self.submitted.iter().map(|s| s.as_str()).collect();
        let mut seen = FxHashSet::default();
        urls.iter()
            .map(|url| url.as_str())
            .filter(|url| !submitted.contains(url) && seen.insert(*url))
            .take(self.remaining(quota))
            .collect()
    }

    fn record(&mut self, url: &str) {
        self.submitted.push(url.to_string());
        self.today_count += 1;
    }
}

/// The response to one submission.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Outcome {
    Submitted,
    /// The service's own quota is exhausted: nothing more can be sent today.
    RateLimited,
    /// The credentials have expired.
    Unauthorized,
    Failed(String),
}

/// A client of an indexing service.
pub trait Submitter {
    fn submit(&mut self, url: &str) -> Outcome;

    /// Renews expired credentials.
    fn refresh(&mut self) -> Result<()>;
}

/// What one call to [`submit_pending()`] did.
#[derive(Debug, Default, Clone, PartialEq)]
pub struct Batch {
    pub submitted: Vec<String>,
    pub failed: Vec<String>,
    pub rate_limited: bool,
}

/// Submits today's share of `urls` through `submitter`, recording successes
/// in `state`.
///
/// An `Unauthorized` response refreshes credentials and retries that URL
/// once. `RateLimited` ends the batch. Failed URLs are left unrecorded so a
/// later run will retry them.
pub fn submit_pending<S: Submitter>(
    state: &mut IndexState,
    submitter: &mut S,
    urls: &[String],
    today: NaiveDate,
    quota: usize,
) -> Result<Batch> {
    state.roll_over(today);
    let plan: Vec<String> = state.plan(urls, quota).into_iter().map(String::from).collect();
    if plan.is_empty() {
        info!(today = state.today_count, quota, "nothing to submit");
        return Ok(Batch::default());
    }

    let mut batch = Batch::default();
    for url in plan {
        let outcome = match submitter.submit(&url) {
            Outcome::Unauthorized => {
                warn!("credentials expired: refreshing");
                submitter.refresh()?;
                submitter.submit(&url)
            }
            outcome => outcome,
        };

        match outcome {
            Outcome::Submitted => {
                debug!(url = %url, "submitted");
                state.record(&url);
                batch.submitted.push(url);
            }
            Outcome::RateLimited => {
                warn!(url = %url, "service quota reached: stopping");
                batch.rate_limited = true;
                break;
            }
            Outcome::Unauthorized => {
                warn!(url = %url, "still unauthorized after refresh");
                batch.failed.push(url);
            }
            Outcome::Failed(reason) => {
                warn!(url = %url, reason = %reason, "submission failed");
                batch.failed.push(url);
            }
        }
    }

    info!(
        submitted = batch.submitted.len(),
        failed = batch.failed.len(),
        total = state.submitted.len(),
        "indexing batch complete"
    );

    Ok(batch)
}

/// Every `<loc>` of the site-wide sitemap under `root`.
pub fn sitemap_urls(root: &Path) -> Result<Vec<String>> {
    let path = root.join(Sitemap::GLOBAL);
    let xml = fs::read_to_string(&path).chain_with(|| error!("failed to read sitemap", "path" => path.display()))?;
    sitemap::read_locs(&xml)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Default)]
    struct Mock {
        script: Vec<Outcome>,
        sent: Vec<String>,
        refreshes: usize,
    }

    impl Submitter for Mock {
        fn submit(&mut self, url: &str) -> Outcome {
            self.sent.push(url.to_string());
            match self.script.is_empty() {
                true => Outcome::Submitted,
                false => self.script.remove(0),
            }
        }

        fn refresh(&mut self) -> Result<()> {
            self.refreshes += 1;
            Ok(())
        }
    }

    fn urls(n: usize) -> Vec<String> {
        (0..n).map(|i| format!("https://agence.fr/tarn/ville-{i}")).collect()
    }

    fn day(d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(2026, 10, d).unwrap()
    }

    #[test]
    fn quota_resets_daily() {
        let mut state = IndexState { last_run: "2026-10-18".into(), today_count: 190, ..Default::default() };
        let urls = urls(20);

        state.roll_over(day(18));
        assert_eq!(state.plan(&urls, DAILY_QUOTA).len(), 9);

        state.roll_over(day(19));
        assert_eq!(state.last_run, "2026-10-19");
        assert_eq!(state.plan(&urls, DAILY_QUOTA).len(), 20);
    }

    #[test]
    fn submitted_urls_are_skipped() {
        let mut state = IndexState::default();
        let urls = urls(5);
        let mut mock = Mock::default();

        let batch = submit_pending(&mut state, &mut mock, &urls, day(18), 3).unwrap();
        assert_eq!(batch.submitted, &urls[..3]);
        assert_eq!(state.today_count, 3);

        let batch = submit_pending(&mut state, &mut mock, &urls, day(18), 3).unwrap();
        assert!(batch.submitted.is_empty());

        let batch = submit_pending(&mut state, &mut mock, &urls, day(19), 3).unwrap();
        assert_eq!(batch.submitted, &urls[3..]);
        assert_eq!(state.submitted, urls);
    }

    #[test]
    fn unauthorized_retries_once() {
        let mut state = IndexState::default();
        let mut mock = Mock {
            script: vec![Outcome::Unauthorized, Outcome::Submitted, Outcome::Unauthorized, Outcome::Unauthorized],
            ..Default::default()
        };

        let batch = submit_pending(&mut state, &mut mock, &urls(3), day(18), DAILY_QUOTA).unwrap();
        assert_eq!(mock.refreshes, 2);
        assert_eq!(mock.sent.len(), 5);
        assert_eq!(batch.submitted, [urls(3)[0].clone(), urls(3)[2].clone()]);
        assert_eq!(batch.failed, [urls(3)[1].clone()]);
        assert_eq!(state.submitted.len(), 2);
    }

    #[test]
    fn rate_limits_stop_the_batch() {
        let mut state = IndexState::default();
        let mut mock = Mock {
            script: vec![Outcome::Failed("500".into()), Outcome::Submitted, Outcome::RateLimited],
            ..Default::default()
        };

        let batch = submit_pending(&mut state, &mut mock, &urls(10), day(18), DAILY_QUOTA).unwrap();
        assert!(batch.rate_limited);
        assert_eq!(mock.sent.len(), 3);
        assert_eq!(state.submitted, [urls(10)[1].clone()]);
        assert_eq!(state.today_count, 1);
    }

    #[test]
    fn state_persists() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("indexing_state.json");
        assert_eq!(IndexState::load(&path).unwrap(), IndexState::default());

        let state = IndexState { submitted: urls(2), last_run: "2026-10-18".into(), today_count: 2 };
        state.save(&path).unwrap();
        assert_eq!(IndexState::load(&path).unwrap(), state);

        fs::write(&path, r#"{"submitted": ["https://agence.fr/"]}"#).unwrap();
        assert_eq!(IndexState::load(&path).unwrap().submitted, ["https://agence.fr/"]);
    }
}
