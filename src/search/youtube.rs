//! YouTube Data API v3 video search.
//!
//! Authenticates with an API key, so there is no session to establish. Quota
//! exhaustion comes back as `403` with a `quotaExceeded` or
//! `rateLimitExceeded` reason; both are treated like a `429`.

use async_trait::async_trait;
use chrono::{DateTime, SecondsFormat, Utc};
use reqwest::{Client, StatusCode};
use serde::Deserialize;

use super::{check_status, degrade_rate_limit, SearchResult, Searcher};
use crate::config::YouTubeConfig;
use crate::error::UpstreamError;

const PLATFORM: &str = "YouTube";
const API_URL: &str = "https://www.googleapis.com/youtube/v3/search";
const WATCH_URL: &str = "https://www.youtube.com/watch?v=";

pub struct YouTubeSearcher {
    client: Client,
    api_key: String,
}

#[derive(Debug, Deserialize)]
struct SearchResponse {
    #[serde(default)]
    items: Vec<Item>,
}

#[derive(Debug, Deserialize)]
struct Item {
    id: ItemId,
    snippet: Snippet,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ItemId {
    video_id: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct Snippet {
    title: String,
    published_at: String,
    #[serde(default)]
    description: String,
}

fn is_quota_error(status: StatusCode, body: &str) -> bool {
    status == StatusCode::FORBIDDEN
        && (body.contains("quotaExceeded") || body.contains("rateLimitExceeded"))
}

impl YouTubeSearcher {
    pub fn new(client: Client, config: &YouTubeConfig) -> Self {
        Self {
            client,
            api_key: config.api_key.clone(),
        }
    }

    fn parse_response(body: SearchResponse, keyword: &str, since: i64) -> Vec<SearchResult> {
        body.items
            .into_iter()
            .filter_map(|item| {
                let video_id = item.id.video_id?;
                let published = DateTime::parse_from_rfc3339(&item.snippet.published_at)
                    .ok()?
                    .timestamp();
                if published <= since {
                    return None;
                }
                Some(
                    SearchResult::new(
                        PLATFORM,
                        keyword,
                        item.snippet.title,
                        format!("{WATCH_URL}{video_id}"),
                        published,
                    )
                    .with_content(item.snippet.description),
                )
            })
            .collect()
    }

    async fn fetch(&self, keyword: &str, since: i64) -> Result<Vec<SearchResult>, UpstreamError> {
        let mut request = self.client.get(API_URL).query(&[
            ("part", "snippet"),
            ("q", keyword),
            ("type", "video"),
            ("order", "date"),
            ("maxResults", "50"),
            ("key", self.api_key.as_str()),
        ]);
        if let Some(after) = DateTime::<Utc>::from_timestamp(since, 0) {
            request = request.query(&[("publishedAfter", after.to_rfc3339_opts(SecondsFormat::Secs, true))]);
        }

        let resp = request.send().await?;
        let status = resp.status();
        if status == StatusCode::FORBIDDEN {
            let body = resp.text().await.unwrap_or_default();
            if is_quota_error(status, &body) {
                return Err(UpstreamError::RateLimited {
                    status: status.as_u16(),
                });
            }
            return Err(UpstreamError::Api {
                status: status.as_u16(),
                message: body,
            });
        }

        let body: SearchResponse = check_status(resp).await?.json().await?;
        Ok(Self::parse_response(body, keyword, since))
    }
}

#[async_trait]
impl Searcher for YouTubeSearcher {
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

    #[test]
    fn parses_videos_newer_than_since() {
        let json = r#"{
            "kind": "youtube#searchListResponse",
            "items": [
                {"id": {"kind": "youtube#video", "videoId": "abc123"},
                 "snippet": {"title": "Rust in 100 seconds", "publishedAt": "2024-06-01T08:00:00Z",
                             "description": "A quick tour"}},
                {"id": {"kind": "youtube#video", "videoId": "old1"},
                 "snippet": {"title": "Old video", "publishedAt": "2019-06-01T08:00:00Z"}},
                {"id": {"kind": "youtube#channel"},
                 "snippet": {"title": "A channel", "publishedAt": "2024-06-01T08:00:00Z"}}
            ]
        }"#;

        let body: SearchResponse = serde_json::from_str(json).unwrap();
        let since = DateTime::parse_from_rfc3339("2020-01-01T00:00:00Z").unwrap().timestamp();
        let results = YouTubeSearcher::parse_response(body, "rust", since);

        assert_eq!(results.len(), 1);
        assert_eq!(results[0].url, "https://www.youtube.com/watch?v=abc123");
        assert_eq!(results[0].title, "Rust in 100 seconds");
        assert_eq!(results[0].content, "A quick tour");
    }

    #[test]
    fn quota_errors_are_rate_limits() {
        let body = r#"{"error": {"errors": [{"reason": "quotaExceeded"}]}}"#;
        assert!(is_quota_error(StatusCode::FORBIDDEN, body));
        assert!(!is_quota_error(StatusCode::FORBIDDEN, r#"{"error": "forbidden"}"#));
        assert!(!is_quota_error(StatusCode::BAD_REQUEST, body));
    }
}
