//! Hacker News search through the Algolia `search_by_date` API.
//!
//! No credentials are needed. Stories and comments are both returned; a
//! comment takes the title of the story it belongs to. Results always link to
//! the Hacker News item page rather than the submitted URL, so a story and its
//! discussion are one dedup key.

use async_trait::async_trait;
use reqwest::Client;
use serde::Deserialize;

use super::{check_status, degrade_rate_limit, html_to_text, SearchResult, Searcher};
use crate::error::UpstreamError;

const PLATFORM: &str = "HackerNews";
const API_URL: &str = "https://hn.algolia.com/api/v1";
const ITEM_URL: &str = "https://news.ycombinator.com/item?id=";

pub struct HackerNewsSearcher {
    client: Client,
}

#[derive(Debug, Deserialize)]
struct SearchResponse {
    #[serde(default)]
    hits: Vec<Hit>,
}

#[derive(Debug, Deserialize)]
struct Hit {
    #[serde(rename = "objectID")]
    object_id: Option<String>,
    title: Option<String>,
    story_title: Option<String>,
    story_text: Option<String>,
    comment_text: Option<String>,
    created_at_i: Option<i64>,
}

impl HackerNewsSearcher {
    pub fn new(client: Client) -> Self {
        Self { client }
    }

    /// Convert an Algolia response into results newer than `since`.
    fn parse_response(body: SearchResponse, keyword: &str, since: i64) -> Vec<SearchResult> {
        body.hits
            .into_iter()
            .filter_map(|hit| {
                let title = hit
                    .title
                    .filter(|t| !t.is_empty())
                    .or(hit.story_title.filter(|t| !t.is_empty()));

                let (Some(object_id), Some(title), Some(created)) =
                    (hit.object_id, title, hit.created_at_i)
                else {
                    tracing::debug!(platform = PLATFORM, "Skipping hit with missing id, title or timestamp");
                    return None;
                };

                if created <= since {
                    return None;
                }

                let content = hit
                    .comment_text
                    .or(hit.story_text)
                    .map(|html| html_to_text(&html))
                    .unwrap_or_default();

                Some(
                    SearchResult::new(PLATFORM, keyword, title, format!("{ITEM_URL}{object_id}"), created)
                        .with_content(content),
                )
            })
            .collect()
    }

    async fn fetch(&self, keyword: &str, since: i64) -> Result<Vec<SearchResult>, UpstreamError> {
        let url = format!("{API_URL}/search_by_date");
        let filter = format!("created_at_i>{since}");
        let resp = self
            .client
            .get(&url)
            .query(&[
                ("query", keyword),
                ("tags", "(story,comment)"),
                ("numericFilters", filter.as_str()),
            ])
            .send()
            .await?;

        let body: SearchResponse = check_status(resp).await?.json().await?;
        Ok(Self::parse_response(body, keyword, since))
    }
}

#[async_trait]
impl Searcher for HackerNewsSearcher {
    fn platform(&self) -> &'static str {
        PLATFORM
    }

    async fn search(&self, keyword: &str, since: i64) -> Result<Vec<SearchResult>, UpstreamError> {
        degrade_rate_limit(PLATFORM, self.fetch(keyword, since).await)
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    fn parse(json: &str, since: i64) -> Vec<SearchResult> {
        let body: SearchResponse = serde_json::from_str(json).unwrap();
        HackerNewsSearcher::parse_response(body, "rust", since)
    }

    #[test]
    fn parses_stories_and_comments() {
        let json = r#"{
            "hits": [
                {"objectID": "100", "title": "Show HN: a rust thing", "url": "https://example.com",
                 "created_at_i": 2000, "story_text": null},
                {"objectID": "101", "title": null, "story_title": "Parent story",
                 "comment_text": "<p>I like <i>rust</i> &amp; more</p>", "created_at_i": 2001}
            ]
        }"#;

        let results = parse(json, 1000);
        assert_eq!(results.len(), 2);

        assert_eq!(results[0].platform, "HackerNews");
        assert_eq!(results[0].keyword, "rust");
        assert_eq!(results[0].title, "Show HN: a rust thing");
        assert_eq!(results[0].url, "https://news.ycombinator.com/item?id=100");
        assert_eq!(results[0].timestamp, 2000);
        assert!(results[0].content.is_empty());

        assert_eq!(results[1].title, "Parent story");
        assert_eq!(results[1].content, "I like rust & more");
    }

    #[test]
    fn filters_strictly_newer_than_since() {
        let json = r#"{"hits": [
            {"objectID": "1", "title": "old", "created_at_i": 900},
            {"objectID": "2", "title": "boundary", "created_at_i": 1000},
            {"objectID": "3", "title": "new", "created_at_i": 1100}
        ]}"#;

        let results = parse(json, 1000);
        assert_eq!(results.len(), 1);
        assert_eq!(results[0].title, "new");
    }

    #[test]
    fn skips_hits_missing_required_fields() {
        let json = r#"{"hits": [
            {"objectID": "1", "title": "", "created_at_i": 2000},
            {"title": "no id", "created_at_i": 2000},
            {"objectID": "3", "title": "no time"}
        ]}"#;

        assert!(parse(json, 0).is_empty());
    }

    #[test]
    fn missing_hits_array_is_empty() {
        assert!(parse("{}", 0).is_empty());
    }

    #[test]
    fn platform_is_stable() {
        let searcher = HackerNewsSearcher::new(Client::new());
        assert_eq!(searcher.platform(), "HackerNews");
    }
}
