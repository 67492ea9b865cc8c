//! Fediverse search across one or more Mastodon-compatible instances.
//!
//! Every instance carries its own credentials (see
//! [`FediverseConfig`](crate::config::FediverseConfig)). Instances configured
//! with client credentials exchange them for a token at construction, each
//! under its own retry/degrade policy, so one rate-limited instance does not
//! take the others down with it.
//!
//! Search never fails as a whole: an instance that errors is logged and
//! skipped, and the results of the remaining instances are returned.

use std::collections::HashSet;

use async_trait::async_trait;
use chrono::DateTime;
use reqwest::Client;
use serde::Deserialize;

use super::retry::{establish, Retry, Session};
use super::{check_status, html_to_text, SearchResult, Searcher};
use crate::config::{FediverseConfig, FediverseInstance, InstanceAuth};
use crate::error::{ConstructionError, UpstreamError};

const PLATFORM: &str = "Fediverse";

struct InstanceSession {
    url: String,
    session: Session<String>,
}

pub struct FediverseSearcher {
    client: Client,
    instances: Vec<InstanceSession>,
}

#[derive(Debug, Deserialize)]
struct TokenResponse {
    access_token: String,
}

#[derive(Debug, Deserialize)]
struct SearchResponse {
    #[serde(default)]
    statuses: Vec<Status>,
}

#[derive(Debug, Deserialize)]
struct Status {
    uri: String,
    url: Option<String>,
    created_at: String,
    #[serde(default)]
    content: String,
    account: Account,
}

#[derive(Debug, Deserialize)]
struct Account {
    #[serde(default)]
    display_name: String,
    acct: String,
}

async fn request_token(
    client: &Client,
    instance_url: &str,
    client_id: &str,
    client_secret: &str,
) -> Result<String, UpstreamError> {
    let resp = client
        .post(format!("{instance_url}/oauth/token"))
        .form(&[
            ("client_id", client_id),
            ("client_secret", client_secret),
            ("grant_type", "client_credentials"),
            ("scope", "read"),
        ])
        .send()
        .await?;

    let token: TokenResponse = check_status(resp).await?.json().await?;
    Ok(token.access_token)
}

impl FediverseSearcher {
    pub async fn connect(
        client: Client,
        config: &FediverseConfig,
        retry: &Retry,
    ) -> Result<Self, ConstructionError> {
        let mut instances = Vec::new();
        let mut last_error = None;

        for FediverseInstance { url, auth } in &config.instances {
            let session = match auth {
                InstanceAuth::Token(token) => Session::Active(token.clone()),
                InstanceAuth::ClientCredentials {
                    client_id,
                    client_secret,
                } => {
                    let outcome = establish(retry, PLATFORM, || {
                        request_token(&client, url, client_id, client_secret)
                    })
                    .await;
                    match outcome {
                        Ok(session) => session,
                        Err(err) => {
                            tracing::error!(platform = PLATFORM, instance = %url, error = %err, "Failed to obtain access token, dropping instance");
                            last_error = Some(err);
                            continue;
                        }
                    }
                }
            };

            if session.is_degraded() {
                tracing::warn!(platform = PLATFORM, instance = %url, "Instance is degraded until next start");
            }
            instances.push(InstanceSession {
                url: url.clone(),
                session,
            });
        }

        if instances.is_empty() {
            if let Some(source) = last_error {
                return Err(ConstructionError::Auth {
                    platform: PLATFORM,
                    source,
                });
            }
        }

        Ok(Self { client, instances })
    }

    #[cfg(test)]
    fn instance_count(&self) -> usize {
        self.instances.len()
    }

    fn parse_response(body: SearchResponse, keyword: &str, since: i64) -> Vec<SearchResult> {
        body.statuses
            .into_iter()
            .filter_map(|status| {
                let created = match DateTime::parse_from_rfc3339(&status.created_at) {
                    Ok(dt) => dt.timestamp(),
                    Err(_) => {
                        tracing::debug!(platform = PLATFORM, created_at = %status.created_at, "Skipping status with invalid created_at");
                        return None;
                    }
                };
                if created <= since {
                    return None;
                }

                let title = format!(
                    "Post by {} (@{})",
                    status.account.display_name, status.account.acct
                );
                let url = status.url.unwrap_or(status.uri);

                Some(
                    SearchResult::new(PLATFORM, keyword, title, url, created)
                        .with_content(html_to_text(&status.content)),
                )
            })
            .collect()
    }

    async fn search_instance(
        &self,
        instance_url: &str,
        token: &str,
        keyword: &str,
        since: i64,
    ) -> Result<Vec<SearchResult>, UpstreamError> {
        let resp = self
            .client
            .get(format!("{instance_url}/api/v2/search"))
            .bearer_auth(token)
            .query(&[
                ("q", keyword),
                ("type", "statuses"),
                ("resolve", "true"),
                ("limit", "40"),
            ])
            .send()
            .await?;

        let body: SearchResponse = check_status(resp).await?.json().await?;
        Ok(Self::parse_response(body, keyword, since))
    }
}

#[async_trait]
impl Searcher for FediverseSearcher {
    fn platform(&self) -> &'static str {
        PLATFORM
    }

    async fn search(&self, keyword: &str, since: i64) -> Result<Vec<SearchResult>, UpstreamError> {
        let mut seen = HashSet::new();
        let mut results = Vec::new();

        for instance in &self.instances {
            let Some(token) = instance.session.active() else {
                continue;
            };

            match self.search_instance(&instance.url, token, keyword, since).await {
                Ok(found) => {
                    // The same remote status can be federated to several instances.
                    results.extend(found.into_iter().filter(|r| seen.insert(r.url.clone())));
                }
                Err(err) if err.is_rate_limited() => {
                    tracing::warn!(platform = PLATFORM, instance = %instance.url, "Rate limited, skipping instance this run");
                }
                Err(err) => {
                    tracing::warn!(platform = PLATFORM, instance = %instance.url, error = %err, "Instance search failed, skipping it");
                }
            }
        }

        Ok(results)
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
