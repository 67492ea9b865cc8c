//! Platform searchers.
//!
//! This module defines the [`Searcher`] trait and the common
//! [`SearchResult`] type. Each platform lives in its own sub-module and keeps
//! all of its request building and JSON parsing to itself.
//!
//! ## For contributors: adding a new platform
//!
//! 1. Create a new file in this directory (e.g. `lemmy.rs`).
//! 2. Define a struct (e.g. `LemmySearcher`) and implement [`Searcher`] for
//!    it. Keep response parsing in a plain function so it can be tested
//!    against a fixture without the network.
//! 3. Add `mod lemmy;` below and re-export your struct.
//! 4. Add a variant to `SearcherKind` in `cli.rs` and construct it in
//!    `main.rs`.
//!
//! Deduplication, watermarks and notifications are handled by the
//! orchestrator; a searcher only has to return results strictly newer than
//! the `since` value it is given.

mod bluesky;
mod fediverse;
mod hackernews;
mod reddit;
pub mod retry;
mod rss;
mod search_result;
mod youtube;

pub use bluesky::BlueskySearcher;
pub use fediverse::FediverseSearcher;
pub use hackernews::HackerNewsSearcher;
pub use reddit::RedditSearcher;
pub use rss::RssSearcher;
pub use search_result::SearchResult;
pub use youtube::YouTubeSearcher;

use std::sync::LazyLock;

use async_trait::async_trait;
use regex::Regex;
use reqwest::{Response, StatusCode};

use crate::error::UpstreamError;

/// Trait that every platform searcher must implement.
///
/// ## Contract
///
/// * [`platform()`](Searcher::platform) never changes for a given searcher;
///   it keys both deduplication and the watermark.
/// * [`search()`](Searcher::search) returns only results with
///   `timestamp > since`.
/// * A rate-limited search returns `Ok(vec![])` rather than an error, so
///   the orchestrator's loop carries on.
#[async_trait]
pub trait Searcher: Send + Sync {
    /// Stable platform identifier, e.g. `"HackerNews"`.
    fn platform(&self) -> &'static str;

    /// Find posts matching `keyword` published after `since` (epoch
    /// seconds).
    async fn search(&self, keyword: &str, since: i64) -> Result<Vec<SearchResult>, UpstreamError>;
}

/// Turn a non-success response into an [`UpstreamError`], classifying 429 as
/// a rate limit.
pub(crate) async fn check_status(resp: Response) -> Result<Response, UpstreamError> {
    let status = resp.status();
    if status.is_success() {
        return Ok(resp);
    }
    if status == StatusCode::TOO_MANY_REQUESTS {
        return Err(UpstreamError::RateLimited {
            status: status.as_u16(),
        });
    }
    let message = resp.text().await.unwrap_or_default();
    Err(UpstreamError::Api {
        status: status.as_u16(),
        message,
    })
}

/// Absorb a rate limit into an empty result set; pass everything else
/// through.
pub(crate) fn degrade_rate_limit(
    platform: &'static str,
    outcome: Result<Vec<SearchResult>, UpstreamError>,
) -> Result<Vec<SearchResult>, UpstreamError> {
    match outcome {
        Err(err) if err.is_rate_limited() => {
            tracing::warn!(platform, error = %err, "Rate limited, returning no results this run");
            Ok(Vec::new())
        }
        other => other,
    }
}

static BREAKING_TAG: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?is)<\s*(br|/p|/div|/li)\b[^>]*>").unwrap());
/// Only tag-shaped markup: a `<` followed by a letter or `/letter`, or a
/// comment. A bare `<` in text is left for html2text.
static HTML_TAG: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?s)<!--.*?-->|</?[A-Za-z][^>]*>").unwrap());

/// Strip tags and decode entities from a fragment of post HTML.
pub(crate) fn html_to_text(html: &str) -> String {
    // Tags are removed first so links don't turn into footnotes.
    let spaced = BREAKING_TAG.replace_all(html, " ");
    let without_tags = HTML_TAG.replace_all(&spaced, "");
    let text = html2text::from_read(without_tags.as_bytes(), 1_000).unwrap_or_default();
    text.split_whitespace().collect::<Vec<_>>().join(" ")
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
