//! Keyword search over a fixed list of RSS feeds.
//!
//! RSS has no search endpoint, so every configured feed is fetched and its
//! items are matched locally: an item matches when its title or description
//! contains the keyword, ignoring case.
//!
//! ## For contributors
//!
//! [`RssSearcher::parse_channel`] is a pure function (no I/O) so tests can
//! exercise matching and date handling without hitting the network. Use it
//! as the template when adding another feed format.

use async_trait::async_trait;
use chrono::DateTime;
use reqwest::Client;

use super::{check_status, degrade_rate_limit, html_to_text, SearchResult, Searcher};
use crate::config::RssConfig;
use crate::error::UpstreamError;

const PLATFORM: &str = "RSS";

/// Searches the items of one or more RSS 2.0 feeds.
pub struct RssSearcher {
    client: Client,
    /// The feed URLs to poll, in order.
    feeds: Vec<String>,
}

impl RssSearcher {
    pub fn new(client: Client, config: &RssConfig) -> Self {
        Self {
            client,
            feeds: config.feeds.clone(),
        }
    }

    /// Match an already-fetched [`rss::Channel`] against `keyword`.
    ///
    /// Items without a parseable `<pubDate>` are skipped: without a date
    /// they can never be placed relative to the watermark.
    pub fn parse_channel(channel: &rss::Channel, keyword: &str, since: i64) -> Vec<SearchResult> {
        let needle = keyword.to_lowercase();

        channel
            .items()
            .iter()
            .filter_map(|item| {
                let title = item.title().unwrap_or("(untitled)");
                let description = item.description().map(html_to_text).unwrap_or_default();

                if !title.to_lowercase().contains(&needle)
                    && !description.to_lowercase().contains(&needle)
                {
                    return None;
                }

                // Prefer <link>, fall back to <guid>.
                let url = item
                    .link()
                    .map(String::from)
                    .or_else(|| item.guid().map(|g| g.value().to_string()))?;

                // Parse RFC-2822 date; items we cannot date are dropped.
                let published = item
                    .pub_date()
                    .and_then(|d| DateTime::parse_from_rfc2822(d).ok())?
                    .timestamp();
                if published <= since {
                    return None;
                }

                Some(SearchResult::new(PLATFORM, keyword, title, url, published).with_content(description))
            })
            .collect()
    }

    async fn fetch_feed(&self, url: &str, keyword: &str, since: i64) -> Result<Vec<SearchResult>, UpstreamError> {
        let resp = self.client.get(url).send().await?;
        let body = check_status(resp).await?.bytes().await?;
        let channel = rss::Channel::read_from(body.as_ref())
            .map_err(|e| UpstreamError::Parse(format!("{url}: {e}")))?;
        Ok(Self::parse_channel(&channel, keyword, since))
    }
}

#[async_trait]
impl Searcher for RssSearcher {
    fn platform(&self) -> &'static str {
        PLATFORM
    }

    async fn search(&self, keyword: &str, since: i64) -> Result<Vec<SearchResult>, UpstreamError> {
        let mut results: Vec<SearchResult> = Vec::new();

        for feed in &self.feeds {
            match degrade_rate_limit(PLATFORM, self.fetch_feed(feed, keyword, since).await) {
                Ok(found) => {
                    for result in found {
                        if !results.iter().any(|r| r.url == result.url) {
                            results.push(result);
                        }
                    }
                }
                Err(err) => {
                    tracing::warn!(platform = PLATFORM, feed = %feed, error = %err, "Feed fetch failed, skipping it");
                }
            }
        }

        Ok(results)
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
