//! The common shape every platform adapter normalizes into.
//!
//! `SearchResult` represents a single post found on any platform (Hacker
//! News, Reddit, Bluesky, ...). Every searcher converts its native format into
//! `SearchResult`s so that storage and notification stay platform-agnostic.
//!
//! ## For contributors
//!
//! If you are adding a new searcher you do **not** need to modify this file.
//! Build values with [`SearchResult::new`] inside your searcher's parsing
//! function.

use chrono::{DateTime, Utc};

/// A single post, normalized from any platform.
///
/// `(platform, url)` is the natural key: storage uses it to recognise a post
/// it has already seen, so a searcher must produce the same URL for the same
/// post on every run.
#[derive(Debug, Clone, Eq, PartialEq)]
pub struct SearchResult {
    /// Stable platform identifier, identical to the producing searcher's
    /// [`platform()`](super::Searcher::platform).
    pub platform: String,

    /// The keyword this result was found for.
    pub keyword: String,

    /// Human-readable headline (post title, or "Post by ..." for platforms
    /// without titles).
    pub title: String,

    /// Canonical, clickable URL of the post on its platform.
    pub url: String,

    /// Publication time in epoch seconds.
    pub timestamp: i64,

    /// Plain-text body, empty when the platform provides none.
    pub content: String,
}

impl SearchResult {
    pub fn new(
        platform: &str,
        keyword: &str,
        title: impl Into<String>,
        url: impl Into<String>,
        timestamp: i64,
    ) -> Self {
        Self {
            platform: platform.to_string(),
            keyword: keyword.to_string(),
            title: title.into(),
            url: url.into(),
            timestamp,
            content: String::new(),
        }
    }

    pub fn with_content(mut self, content: impl Into<String>) -> Self {
        self.content = content.into();
        self
    }

    /// Publication time as a UTC datetime, `None` if the timestamp is out of
    /// chrono's representable range.
    pub fn published(&self) -> Option<DateTime<Utc>> {
        DateTime::from_timestamp(self.timestamp, 0)
    }

    /// Human-readable publication time used by chat notifiers,
    /// e.g. `01/02/2024 03:04 PM`.
    pub fn published_display(&self) -> String {
        self.published()
            .map(|dt| dt.format("%m/%d/%Y %I:%M %p").to_string())
            .unwrap_or_else(|| "unknown date".into())
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn new_starts_with_empty_content() {
        let r = SearchResult::new("HackerNews", "rust", "Title", "https://x/1", 10);
        assert_eq!(r.platform, "HackerNews");
        assert_eq!(r.keyword, "rust");
        assert!(r.content.is_empty());

        let r = r.with_content("body");
        assert_eq!(r.content, "body");
    }

    #[test]
    fn published_converts_epoch_seconds() {
        let ts = Utc.with_ymd_and_hms(2024, 1, 2, 15, 4, 0).unwrap();
        let r = SearchResult::new("p", "k", "t", "u", ts.timestamp());
        assert_eq!(r.published(), Some(ts));
        assert_eq!(r.published_display(), "01/02/2024 03:04 PM");
    }

    #[test]
    fn out_of_range_timestamp_has_placeholder_display() {
        let r = SearchResult::new("p", "k", "t", "u", i64::MAX);
        assert!(r.published().is_none());
        assert_eq!(r.published_display(), "unknown date");
    }
}
