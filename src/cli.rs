//! Command-line flags.
//!
//! Credentials never appear here; they are read from the environment (or a
//! `.env` file) into the records in `config.rs`.

use std::time::Duration;

use clap::{Parser, ValueEnum};

use crate::search::retry::RetryPolicy;

/// Search social platforms for keywords and announce posts not seen before.
#[derive(Debug, Parser)]
#[command(name = "mention-watch")]
#[command(author, version, about, long_about = None)]
pub struct Cli {
    /// Storage backend for seen results and watermarks.
    #[arg(long, value_enum, default_value = "sqlite")]
    pub db: StorageKind,

    /// Keyword to search for. Repeat for several; each gets its own pass.
    #[arg(long = "keyword", required = true)]
    pub keywords: Vec<String>,

    /// Notification sink. Repeat to fan out to several.
    #[arg(long = "bot", value_enum)]
    pub bots: Vec<NotifierKind>,

    /// Platform to search. Repeat for several; they run in the order given.
    #[arg(long = "searchers", value_enum)]
    pub searchers: Vec<SearcherKind>,

    /// SQLite file stem or DynamoDB table name.
    #[arg(long, env = "SOCIAL_SEARCH_TABLE_NAME", default_value = "mention-watch")]
    pub table_name: String,

    /// Login attempts per platform before it is marked degraded.
    #[arg(long, default_value_t = crate::search::retry::DEFAULT_MAX_ATTEMPTS)]
    pub auth_max_attempts: u32,

    /// Base wait between rate-limited login attempts, multiplied by the
    /// attempt number.
    #[arg(long, default_value_t = crate::search::retry::DEFAULT_BACKOFF_BASE.as_secs())]
    pub auth_backoff_secs: u64,

    /// Log line format.
    #[arg(long, value_enum, default_value = "text")]
    pub log_format: LogFormat,
}

impl Cli {
    pub fn retry_policy(&self) -> RetryPolicy {
        RetryPolicy {
            base: Duration::from_secs(self.auth_backoff_secs),
            max_attempts: self.auth_max_attempts,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum StorageKind {
    Sqlite,
    #[value(name = "dynamodb")]
    DynamoDb,
    /// Nothing is remembered between runs.
    Memory,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum NotifierKind {
    Print,
    Discord,
    Slack,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum SearcherKind {
    #[value(name = "hackernews")]
    HackerNews,
    Reddit,
    Bluesky,
    Fediverse,
    #[value(name = "youtube")]
    YouTube,
    Rss,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, ValueEnum)]
pub enum LogFormat {
    #[default]
    Text,
    Json,
}
