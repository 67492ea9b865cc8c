//! Bluesky search via the AT Protocol XRPC API.
//!
//! `com.atproto.server.createSession` is called once at construction under
//! the retry/degrade policy; the resulting JWT authorises
//! `app.bsky.feed.searchPosts`. Post URIs (`at://did/collection/rkey`) are
//! rewritten to their clickable `bsky.app` form.

use async_trait::async_trait;
use chrono::DateTime;
use reqwest::Client;
use serde::{Deserialize, Serialize};

use super::retry::{establish, Retry, Session};
use super::{check_status, degrade_rate_limit, SearchResult, Searcher};
use crate::config::BlueskyConfig;
use crate::error::{ConstructionError, UpstreamError};

const PLATFORM: &str = "Bluesky";

pub struct BlueskySearcher {
    client: Client,
    service_url: String,
    session: Session<String>,
}

#[derive(Debug, Serialize)]
struct CreateSession<'a> {
    identifier: &'a str,
    password: &'a str,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct SessionResponse {
    access_jwt: String,
}

#[derive(Debug, Deserialize)]
struct SearchResponse {
    #[serde(default)]
    posts: Vec<Post>,
}

#[derive(Debug, Deserialize)]
struct Post {
    uri: String,
    author: Author,
    record: Record,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct Author {
    handle: String,
    display_name: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct Record {
    created_at: Option<String>,
    #[serde(default)]
    text: String,
}

/// `at://did:plc:xyz/app.bsky.feed.post/3k2a` →
/// `https://bsky.app/profile/did:plc:xyz/post/3k2a`. Unexpected shapes are
/// returned unchanged.
fn at_uri_to_https(uri: &str) -> String {
    let parts: Vec<&str> = uri.split('/').collect();
    if parts.len() < 5 {
        return uri.to_string();
    }
    format!("https://bsky.app/profile/{}/post/{}", parts[2], parts[4])
}

async fn create_session(client: &Client, config: &BlueskyConfig) -> Result<String, UpstreamError> {
    let resp = client
        .post(format!("{}/xrpc/com.atproto.server.createSession", config.service_url))
        .json(&CreateSession {
            identifier: &config.identifier,
            password: &config.password,
        })
        .send()
        .await?;

    let session: SessionResponse = check_status(resp).await?.json().await?;
    Ok(session.access_jwt)
}

impl BlueskySearcher {
    pub async fn connect(
        client: Client,
        config: &BlueskyConfig,
        retry: &Retry,
    ) -> Result<Self, ConstructionError> {
        let session = establish(retry, PLATFORM, || create_session(&client, config))
            .await
            .map_err(|source| ConstructionError::Auth {
                platform: PLATFORM,
                source,
            })?;

        Ok(Self {
            client,
            service_url: config.service_url.clone(),
            session,
        })
    }

    #[cfg(test)]
    fn is_degraded(&self) -> bool {
        self.session.is_degraded()
    }

    fn parse_response(body: SearchResponse, keyword: &str, since: i64) -> Vec<SearchResult> {
        body.posts
            .into_iter()
            .filter_map(|post| {
                let Some(created_at) = post.record.created_at.as_deref() else {
                    tracing::debug!(platform = PLATFORM, uri = %post.uri, "Skipping post without createdAt");
                    return None;
                };
                let created = match DateTime::parse_from_rfc3339(created_at) {
                    Ok(dt) => dt.timestamp(),
                    Err(_) => {
                        tracing::debug!(platform = PLATFORM, created_at, "Skipping post with invalid createdAt");
                        return None;
                    }
                };
                if created <= since {
                    return None;
                }

                let author = post
                    .author
                    .display_name
                    .filter(|n| !n.is_empty())
                    .unwrap_or(post.author.handle);

                Some(
                    SearchResult::new(
                        PLATFORM,
                        keyword,
                        format!("Post by {author}"),
                        at_uri_to_https(&post.uri),
                        created,
                    )
                    .with_content(post.record.text),
                )
            })
            .collect()
    }

    async fn fetch(&self, token: &str, keyword: &str, since: i64) -> Result<Vec<SearchResult>, UpstreamError> {
        let resp = self
            .client
            .get(format!("{}/xrpc/app.bsky.feed.searchPosts", self.service_url))
            .bearer_auth(token)
            .query(&[("q", keyword), ("sort", "latest"), ("limit", "100")])
            .send()
            .await?;

        let body: SearchResponse = check_status(resp).await?.json().await?;
        Ok(Self::parse_response(body, keyword, since))
    }
}

#[async_trait]
impl Searcher for BlueskySearcher {
    fn platform(&self) -> &'static str {
        PLATFORM
    }

    async fn search(&self, keyword: &str, since: i64) -> Result<Vec<SearchResult>, UpstreamError> {
        let Some(token) = self.session.active() else {
            tracing::debug!(platform = PLATFORM, "Searcher is degraded, skipping search");
            return Ok(Vec::new());
        };
        degrade_rate_limit(PLATFORM, self.fetch(token, keyword, since).await)
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use crate::search::retry::tests::instant_retry;
    use crate::testing::{test_client, StubServer};

    const SEARCH_BODY: &str = r#"{
        "posts": [
            {
                "uri": "at://did:plc:abc123/app.bsky.feed.post/3kxyz",
                "author": {"handle": "alice.bsky.social", "displayName": "Alice"},
                "record": {"createdAt": "2024-05-01T12:00:00.000Z", "text": "loving rust today"}
            },
            {
                "uri": "at://did:plc:def456/app.bsky.feed.post/3kold",
                "author": {"handle": "bob.bsky.social"},
                "record": {"createdAt": "2020-01-01T00:00:00Z", "text": "old"}
            },
            {
                "uri": "at://did:plc:ghi789/app.bsky.feed.post/3knodate",
                "author": {"handle": "carol.bsky.social", "displayName": ""},
                "record": {"text": "no date"}
            }
        ]
    }"#;

    fn config(service_url: &str) -> BlueskyConfig {
        BlueskyConfig {
            identifier: "me.bsky.social".into(),
            password: "app-password".into(),
            service_url: service_url.into(),
        }
    }

    #[test]
    fn converts_at_uris() {
        assert_eq!(
            at_uri_to_https("at://did:plc:abc123/app.bsky.feed.post/3kxyz"),
            "https://bsky.app/profile/did:plc:abc123/post/3kxyz"
        );
        assert_eq!(at_uri_to_https("at://short"), "at://short");
    }

    #[test]
    fn parses_posts_newer_than_since() {
        let body: SearchResponse = serde_json::from_str(SEARCH_BODY).unwrap();
        let since = DateTime::parse_from_rfc3339("2023-01-01T00:00:00Z").unwrap().timestamp();
        let results = BlueskySearcher::parse_response(body, "rust", since);

        assert_eq!(results.len(), 1);
        assert_eq!(results[0].title, "Post by Alice");
        assert_eq!(results[0].url, "https://bsky.app/profile/did:plc:abc123/post/3kxyz");
        assert_eq!(results[0].content, "loving rust today");
        assert_eq!(results[0].platform, "Bluesky");
    }

    #[tokio::test]
    async fn rate_limited_login_degrades_instead_of_failing() {
        let server = StubServer::start(vec![(429, r#"{"error":"RateLimitExceeded"}"#)]).await;
        let (retry, sleeper) = instant_retry(3);

        let searcher = BlueskySearcher::connect(test_client(), &config(&server.url), &retry)
            .await
            .unwrap();

        assert!(searcher.is_degraded());
        assert_eq!(server.requests().len(), 3, "one request per attempt");
        assert_eq!(sleeper.delays.lock().unwrap().len(), 2);

        let results = searcher.search("rust", 0).await.unwrap();
        assert!(results.is_empty());
        assert_eq!(server.requests().len(), 3, "degraded search makes no request");
    }

    #[tokio::test]
    async fn rejected_credentials_are_a_construction_error() {
        let server = StubServer::start(vec![(401, r#"{"error":"AuthenticationRequired"}"#)]).await;
        let (retry, _) = instant_retry(3);

        let result = BlueskySearcher::connect(test_client(), &config(&server.url), &retry).await;

        assert!(matches!(
            result,
            Err(ConstructionError::Auth { platform: "Bluesky", .. })
        ));
        assert_eq!(server.requests().len(), 1);
    }

    #[tokio::test]
    async fn logs_in_then_searches_with_bearer_token() {
        let server = StubServer::start(vec![
            (200, r#"{"accessJwt": "jwt-123", "did": "did:plc:me"}"#),
            (200, SEARCH_BODY),
        ])
        .await;
        let (retry, _) = instant_retry(3);

        let searcher = BlueskySearcher::connect(test_client(), &config(&server.url), &retry)
            .await
            .unwrap();
        let results = searcher.search("rust", 0).await.unwrap();

        assert_eq!(results.len(), 2, "undated post is skipped");

        let requests = server.requests();
        assert_eq!(requests[0].method, "POST");
        assert!(requests[0].path.ends_with("/xrpc/com.atproto.server.createSession"));
        assert!(requests[0].body.contains("me.bsky.social"));
        assert!(requests[1].path.starts_with("/xrpc/app.bsky.feed.searchPosts?q=rust"));
        assert_eq!(requests[1].header("authorization"), Some("Bearer jwt-123"));
    }

    #[tokio::test]
    async fn rate_limited_search_returns_empty() {
        let server = StubServer::start(vec![
            (200, r#"{"accessJwt": "jwt-123"}"#),
            (429, "{}"),
        ])
        .await;
        let (retry, _) = instant_retry(3);

        let searcher = BlueskySearcher::connect(test_client(), &config(&server.url), &retry)
            .await
            .unwrap();

        assert!(searcher.search("rust", 0).await.unwrap().is_empty());
    }
}
