//! Reddit search over the OAuth API.
//!
//! A password-grant token is fetched once at construction, under the shared
//! retry/degrade policy. Results link to the post's permalink, never to the
//! submitted URL.

use async_trait::async_trait;
use reqwest::Client;
use serde::Deserialize;

use super::retry::{establish, Retry, Session};
use super::{check_status, degrade_rate_limit, SearchResult, Searcher};
use crate::config::{RedditConfig, USER_AGENT};
use crate::error::{ConstructionError, UpstreamError};

const PLATFORM: &str = "Reddit";
const SITE_URL: &str = "https://www.reddit.com";

pub struct RedditSearcher {
    client: Client,
    api_url: String,
    session: Session<String>,
}

#[derive(Debug, Deserialize)]
struct TokenResponse {
    access_token: String,
}

#[derive(Debug, Deserialize)]
struct Listing {
    data: ListingData,
}

#[derive(Debug, Deserialize)]
struct ListingData {
    #[serde(default)]
    children: Vec<Child>,
}

#[derive(Debug, Deserialize)]
struct Child {
    data: Post,
}

#[derive(Debug, Deserialize)]
struct Post {
    title: String,
    permalink: String,
    created_utc: f64,
    #[serde(default)]
    selftext: String,
}

async fn authenticate(client: &Client, config: &RedditConfig) -> Result<String, UpstreamError> {
    let resp = client
        .post(&config.auth_url)
        .basic_auth(&config.client_id, Some(&config.client_secret))
        .header(reqwest::header::USER_AGENT, USER_AGENT)
        .form(&[
            ("grant_type", "password"),
            ("username", config.username.as_str()),
            ("password", config.password.as_str()),
        ])
        .send()
        .await?;

    let token: TokenResponse = check_status(resp).await?.json().await?;
    Ok(token.access_token)
}

impl RedditSearcher {
    /// Log in to Reddit. Repeated rate limiting yields a degraded searcher;
    /// any other authentication failure is an error.
    pub async fn connect(
        client: Client,
        config: &RedditConfig,
        retry: &Retry,
    ) -> Result<Self, ConstructionError> {
        let session = establish(retry, PLATFORM, || authenticate(&client, config))
            .await
            .map_err(|source| ConstructionError::Auth {
                platform: PLATFORM,
                source,
            })?;

        Ok(Self {
            client,
            api_url: config.api_url.trim_end_matches('/').to_string(),
            session,
        })
    }

    fn parse_listing(listing: Listing, keyword: &str, since: i64) -> Vec<SearchResult> {
        listing
            .data
            .children
            .into_iter()
            .map(|child| child.data)
            .filter(|post| (post.created_utc as i64) > since)
            .map(|post| {
                SearchResult::new(
                    PLATFORM,
                    keyword,
                    post.title,
                    format!("{SITE_URL}{}", post.permalink),
                    post.created_utc as i64,
                )
                .with_content(post.selftext)
            })
            .collect()
    }

    async fn fetch(&self, token: &str, keyword: &str, since: i64) -> Result<Vec<SearchResult>, UpstreamError> {
        let resp = self
            .client
            .get(format!("{}/search", self.api_url))
            .bearer_auth(token)
            .header(reqwest::header::USER_AGENT, USER_AGENT)
            .query(&[("q", keyword), ("sort", "new"), ("limit", "100")])
            .send()
            .await?;

        let listing: Listing = check_status(resp).await?.json().await?;
        Ok(Self::parse_listing(listing, keyword, since))
    }
}

#[async_trait]
impl Searcher for RedditSearcher {
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
