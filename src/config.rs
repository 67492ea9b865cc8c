//! Credential and endpoint records for every searcher and notifier.
//!
//! All environment access happens here, once, before any component is built.
//! Each record has a `from_lookup` constructor taking a key → value function
//! so tests can supply a map instead of the process environment; `main` passes
//! [`env_lookup`].
//!
//! Only the records for components selected on the command line are loaded,
//! so an unused platform never needs credentials.

use crate::error::ConstructionError;

pub const DEFAULT_BLUESKY_SERVICE: &str = "https://bsky.social";
pub const DEFAULT_REDDIT_AUTH_URL: &str = "https://www.reddit.com/api/v1/access_token";
pub const DEFAULT_REDDIT_API_URL: &str = "https://oauth.reddit.com";
pub const USER_AGENT: &str = concat!("mention-watch/", env!("CARGO_PKG_VERSION"));

/// Read a variable from the process environment.
pub fn env_lookup(key: &str) -> Option<String> {
    std::env::var(key).ok()
}

fn optional<L>(lookup: &L, key: &str) -> Option<String>
where
    L: Fn(&str) -> Option<String>,
{
    lookup(key)
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}

fn required<L>(lookup: &L, key: &str) -> Result<String, ConstructionError>
where
    L: Fn(&str) -> Option<String>,
{
    optional(lookup, key).ok_or_else(|| ConstructionError::MissingCredential(key.to_string()))
}

fn split_list(raw: &str) -> Vec<String> {
    raw.split(',')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(String::from)
        .collect()
}

#[derive(Clone)]
pub struct RedditConfig {
    pub client_id: String,
    pub client_secret: String,
    pub username: String,
    pub password: String,
    pub auth_url: String,
    pub api_url: String,
}

impl RedditConfig {
    pub fn from_lookup<L>(lookup: &L) -> Result<Self, ConstructionError>
    where
        L: Fn(&str) -> Option<String>,
    {
        Ok(Self {
            client_id: required(lookup, "REDDIT_CLIENT_ID")?,
            client_secret: required(lookup, "REDDIT_CLIENT_SECRET")?,
            username: required(lookup, "REDDIT_USERNAME")?,
            password: required(lookup, "REDDIT_PASSWORD")?,
            auth_url: DEFAULT_REDDIT_AUTH_URL.to_string(),
            api_url: DEFAULT_REDDIT_API_URL.to_string(),
        })
    }
}

#[derive(Clone)]
pub struct BlueskyConfig {
    pub identifier: String,
    pub password: String,
    /// PDS base URL, `https://bsky.social` unless `BSKY_SERVICE_URL` is set.
    pub service_url: String,
}

impl BlueskyConfig {
    pub fn from_lookup<L>(lookup: &L) -> Result<Self, ConstructionError>
    where
        L: Fn(&str) -> Option<String>,
    {
        Ok(Self {
            identifier: required(lookup, "BSKY_USERNAME")?,
            password: required(lookup, "BSKY_PASSWORD")?,
            service_url: optional(lookup, "BSKY_SERVICE_URL")
                .unwrap_or_else(|| DEFAULT_BLUESKY_SERVICE.to_string())
                .trim_end_matches('/')
                .to_string(),
        })
    }
}

/// How to authenticate against one Fediverse instance.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum InstanceAuth {
    /// A pre-issued access token, used as-is.
    Token(String),
    /// OAuth client credentials exchanged for a token at startup.
    ClientCredentials {
        client_id: String,
        client_secret: String,
    },
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct FediverseInstance {
    /// Base URL, always with a scheme and without a trailing slash.
    pub url: String,
    pub auth: InstanceAuth,
}

impl FediverseInstance {
    /// Variable prefix for an instance: `https://mastodon.social` →
    /// `MASTODON_SOCIAL`.
    pub fn env_prefix(url: &str) -> String {
        url.trim_start_matches("https://")
            .trim_start_matches("http://")
            .trim_end_matches('/')
            .replace(['.', '-', ':'], "_")
            .to_uppercase()
    }

    fn normalize_url(raw: &str) -> String {
        let url = raw.trim().trim_end_matches('/');
        if url.starts_with("http://") || url.starts_with("https://") {
            url.to_string()
        } else {
            format!("https://{url}")
        }
    }
}

#[derive(Clone, Debug)]
pub struct FediverseConfig {
    pub instances: Vec<FediverseInstance>,
}

impl FediverseConfig {
    /// Reads `FEDIVERSE_INSTANCES` (comma separated) and, for each instance,
    /// `<PREFIX>_ACCESS_TOKEN` or `<PREFIX>_CLIENT_ID` + `<PREFIX>_CLIENT_SECRET`.
    /// Instances without usable credentials are skipped with a warning.
    pub fn from_lookup<L>(lookup: &L) -> Result<Self, ConstructionError>
    where
        L: Fn(&str) -> Option<String>,
    {
        let raw = required(lookup, "FEDIVERSE_INSTANCES")?;

        let mut instances = Vec::new();
        for entry in split_list(&raw) {
            let url = FediverseInstance::normalize_url(&entry);
            let prefix = FediverseInstance::env_prefix(&url);

            let auth = if let Some(token) = optional(lookup, &format!("{prefix}_ACCESS_TOKEN")) {
                InstanceAuth::Token(token)
            } else {
                match (
                    optional(lookup, &format!("{prefix}_CLIENT_ID")),
                    optional(lookup, &format!("{prefix}_CLIENT_SECRET")),
                ) {
                    (Some(client_id), Some(client_secret)) => InstanceAuth::ClientCredentials {
                        client_id,
                        client_secret,
                    },
                    _ => {
                        tracing::warn!(
                            instance = %url,
                            prefix = %prefix,
                            "No access token or client credentials for instance, skipping it"
                        );
                        continue;
                    }
                }
            };

            instances.push(FediverseInstance { url, auth });
        }

        if instances.is_empty() {
            return Err(ConstructionError::InvalidConfig(
                "FEDIVERSE_INSTANCES lists no instance with credentials".into(),
            ));
        }

        Ok(Self { instances })
    }
}

#[derive(Clone)]
pub struct YouTubeConfig {
    pub api_key: String,
}

impl YouTubeConfig {
    pub fn from_lookup<L>(lookup: &L) -> Result<Self, ConstructionError>
    where
        L: Fn(&str) -> Option<String>,
    {
        Ok(Self {
            api_key: required(lookup, "YOUTUBE_API_KEY")?,
        })
    }
}

#[derive(Clone, Debug)]
pub struct RssConfig {
    pub feeds: Vec<String>,
}

impl RssConfig {
    pub fn from_lookup<L>(lookup: &L) -> Result<Self, ConstructionError>
    where
        L: Fn(&str) -> Option<String>,
    {
        let feeds = split_list(&required(lookup, "RSS_FEEDS")?);
        if feeds.is_empty() {
            return Err(ConstructionError::InvalidConfig("RSS_FEEDS is empty".into()));
        }
        Ok(Self { feeds })
    }
}

#[derive(Clone)]
pub struct SlackConfig {
    pub token: String,
    pub channel_id: String,
}

impl SlackConfig {
    pub fn from_lookup<L>(lookup: &L) -> Result<Self, ConstructionError>
    where
        L: Fn(&str) -> Option<String>,
    {
        Ok(Self {
            token: required(lookup, "SLACK_BOT_TOKEN")?,
            channel_id: required(lookup, "SLACK_CHANNEL_ID")?,
        })
    }
}

#[derive(Clone)]
pub struct DiscordConfig {
    pub token: String,
    pub channel_id: String,
}

impl DiscordConfig {
    pub fn from_lookup<L>(lookup: &L) -> Result<Self, ConstructionError>
    where
        L: Fn(&str) -> Option<String>,
    {
        Ok(Self {
            token: required(lookup, "DISCORD_BOT_TOKEN")?,
            channel_id: required(lookup, "DISCORD_CHANNEL_ID")?,
        })
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
