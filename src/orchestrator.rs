//! One search pass for one keyword across every configured platform.
//!
//! A pass is a sequence of platform *turns*. A turn reads the platform's
//! watermark, searches for results newer than it, stores and announces each
//! result not seen before, then moves the watermark to the time the turn
//! began. Nothing that fails inside a turn stops the pass: storage, search
//! and notification errors are logged and counted in the [`RunSummary`].
//!
//! ## For contributors
//!
//! Turns run strictly one after another in configuration order, and results
//! are handled in the order the searcher returned them. The store assumes a
//! single orchestrator at a time.

use std::fmt;
use std::sync::Arc;

use crate::notify::Notifier;
use crate::search::{SearchResult, Searcher};
use crate::storage::Storer;

/// Source of the wall-clock time recorded as a platform's watermark.
pub trait Clock: Send + Sync {
    /// Current time in epoch seconds.
    fn now(&self) -> i64;
}

pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> i64 {
        chrono::Utc::now().timestamp()
    }
}

/// How a platform turn ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TurnOutcome {
    /// The search ran and the watermark was advanced.
    Searched,
    /// The search failed; the watermark was still advanced.
    SearchFailed,
    /// The watermark could not be read, so the platform was not searched.
    WatermarkUnavailable,
}

/// Counters for one platform turn.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PlatformSummary {
    pub platform: &'static str,
    pub outcome: TurnOutcome,
    /// Whether the advanced watermark was written. Always `false` when the
    /// watermark could not be read.
    pub watermark_saved: bool,
    /// Results stored for the first time (and handed to the notifiers).
    pub new: usize,
    /// Results already present in the store.
    pub duplicate: usize,
    /// Results whose presence could not be checked.
    pub skipped: usize,
    /// Results that could not be saved.
    pub failed: usize,
    /// Individual notifier calls that returned an error.
    pub notify_failures: usize,
}

impl PlatformSummary {
    fn new(platform: &'static str) -> Self {
        Self {
            platform,
            outcome: TurnOutcome::Searched,
            watermark_saved: false,
            new: 0,
            duplicate: 0,
            skipped: 0,
            failed: 0,
            notify_failures: 0,
        }
    }
}

/// What one [`Orchestrator::run`] did, platform by platform.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RunSummary {
    pub keyword: String,
    pub platforms: Vec<PlatformSummary>,
}

impl RunSummary {
    pub fn total_new(&self) -> usize {
        self.platforms.iter().map(|p| p.new).sum()
    }

    #[cfg(test)]
    pub fn platform(&self, platform: &str) -> Option<&PlatformSummary> {
        self.platforms.iter().find(|p| p.platform == platform)
    }
}

impl fmt::Display for RunSummary {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:?}:", self.keyword)?;
        for p in &self.platforms {
            write!(
                f,
                " {}[{:?} new={} dup={} skipped={} failed={} notify_failures={}",
                p.platform, p.outcome, p.new, p.duplicate, p.skipped, p.failed, p.notify_failures
            )?;
            if p.outcome != TurnOutcome::WatermarkUnavailable && !p.watermark_saved {
                write!(f, " watermark_not_saved")?;
            }
            write!(f, "]")?;
        }
        Ok(())
    }
}

pub struct Orchestrator {
    searchers: Vec<Box<dyn Searcher>>,
    storer: Arc<dyn Storer>,
    notifiers: Vec<Box<dyn Notifier>>,
    clock: Arc<dyn Clock>,
}

impl Orchestrator {
    pub fn new(
        searchers: Vec<Box<dyn Searcher>>,
        storer: Arc<dyn Storer>,
        notifiers: Vec<Box<dyn Notifier>>,
    ) -> Self {
        Self {
            searchers,
            storer,
            notifiers,
            clock: Arc::new(SystemClock),
        }
    }

    #[cfg(test)]
    pub fn with_clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }

    /// Search every platform for `keyword`, in configuration order.
    pub async fn run(&self, keyword: &str) -> RunSummary {
        let mut platforms = Vec::with_capacity(self.searchers.len());
        for searcher in &self.searchers {
            platforms.push(self.turn(searcher.as_ref(), keyword).await);
        }
        RunSummary {
            keyword: keyword.to_string(),
            platforms,
        }
    }

    async fn turn(&self, searcher: &dyn Searcher, keyword: &str) -> PlatformSummary {
        let platform = searcher.platform();
        let mut summary = PlatformSummary::new(platform);
        let turn_start = self.clock.now();

        let watermark = match self.storer.get_last_search_time(platform).await {
            Ok(w) => w,
            Err(e) => {
                tracing::error!(platform, error = %e, "Could not read last search time, skipping platform");
                summary.outcome = TurnOutcome::WatermarkUnavailable;
                return summary;
            }
        };

        tracing::info!(platform, keyword, since = watermark, "Searching");
        match searcher.search(keyword, watermark).await {
            Ok(results) => {
                tracing::debug!(platform, count = results.len(), "Search returned");
                for result in &results {
                    self.process(result, &mut summary).await;
                }
            }
            Err(e) => {
                tracing::error!(platform, keyword, error = %e, "Search failed");
                summary.outcome = TurnOutcome::SearchFailed;
            }
        }

        let next = turn_start.max(watermark);
        match self.storer.set_last_search_time(platform, next).await {
            Ok(()) => summary.watermark_saved = true,
            Err(e) => tracing::error!(platform, error = %e, "Could not save last search time"),
        }

        summary
    }

    async fn process(&self, result: &SearchResult, summary: &mut PlatformSummary) {
        let platform = summary.platform;

        // Checked under the same key `save` writes.
        match self.storer.exists(&result.platform, &result.url).await {
            Ok(false) => {}
            Ok(true) => {
                tracing::debug!(platform, url = %result.url, "Already seen");
                summary.duplicate += 1;
                return;
            }
            Err(e) => {
                tracing::error!(platform, url = %result.url, error = %e, "Could not check result");
                summary.skipped += 1;
                return;
            }
        }

        if let Err(e) = self.storer.save(result).await {
            tracing::error!(platform, url = %result.url, error = %e, "Could not save result");
            summary.failed += 1;
            return;
        }

        tracing::info!(platform, title = %result.title, url = %result.url, "New result");
        summary.new += 1;
        summary.notify_failures += self.fan_out(result).await;
    }

    /// Hand `result` to every notifier. Returns how many of them failed.
    async fn fan_out(&self, result: &SearchResult) -> usize {
        let mut failures = 0;
        for notifier in &self.notifiers {
            if let Err(e) = notifier.notify(result).await {
                tracing::error!(
                    notifier = notifier.name(),
                    platform = %result.platform,
                    url = %result.url,
                    error = %e,
                    "Notification failed"
                );
                failures += 1;
            }
        }
        failures
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
