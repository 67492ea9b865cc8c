//! mention-watch: search social platforms for keywords and announce posts
//! that have not been seen before.
//!
//! Meant to run from cron or a scheduled job. Each invocation does one pass
//! per `--keyword` and exits.
//!
//! ## Architecture overview
//!
//! ```text
//!                    ┌───────────────┐
//!   search()  ┌────► │   search/     │  one Searcher per platform
//!             │      └───────────────┘
//! ┌──────────────┐   ┌───────────────┐
//! │orchestrator  │──►│   storage/    │  dedup index + watermarks
//! └──────────────┘   └───────────────┘
//!             │      ┌───────────────┐
//!   notify()  └────► │   notify/     │  print, Slack, Discord
//!                    └───────────────┘
//! ```
//!
//! * **`search/`**: the `Searcher` trait, one module per platform, and the
//!   retry-then-degrade login helper.
//! * **`storage/`**: the `Storer` trait with SQLite, DynamoDB and in-memory
//!   backends.
//! * **`notify/`**: the `Notifier` trait and its sinks.
//! * **`orchestrator`**: the per-platform turn (watermark, search, dedup,
//!   save, notify, advance watermark).
//! * **`config`**: credentials and endpoints read from the environment.
//! * **`cli`**: command-line flags.
//! * **`main`**: wires everything together and runs each keyword.

mod cli;
mod config;
mod error;
mod notify;
mod orchestrator;
mod search;
mod storage;
#[cfg(test)]
mod testing;

use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use clap::Parser;
use reqwest::Client;
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use cli::{Cli, LogFormat, NotifierKind, SearcherKind, StorageKind};
use config::{
    env_lookup, BlueskyConfig, DiscordConfig, FediverseConfig, RedditConfig, RssConfig, SlackConfig,
    YouTubeConfig,
};
use error::ConstructionError;
use notify::{DiscordNotifier, Notifier, PrintNotifier, SlackNotifier};
use orchestrator::Orchestrator;
use search::retry::Retry;
use search::{
    BlueskySearcher, FediverseSearcher, HackerNewsSearcher, RedditSearcher, RssSearcher, Searcher,
    YouTubeSearcher,
};
use storage::{DynamoDbStorer, MemoryStorer, SqliteStorer, Storer};

const HTTP_TIMEOUT: Duration = Duration::from_secs(30);

fn init_logging(format: LogFormat) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    match format {
        LogFormat::Json => tracing_subscriber::registry()
            .with(filter)
            .with(fmt::layer().json())
            .init(),
        LogFormat::Text => tracing_subscriber::registry()
            .with(filter)
            .with(fmt::layer().with_target(false))
            .init(),
    }
}

async fn build_searchers(
    kinds: &[SearcherKind],
    client: &Client,
    retry: &Retry,
) -> Result<Vec<Box<dyn Searcher>>, ConstructionError> {
    let mut searchers: Vec<Box<dyn Searcher>> = Vec::with_capacity(kinds.len());
    for kind in kinds {
        let searcher: Box<dyn Searcher> = match kind {
            SearcherKind::HackerNews => Box::new(HackerNewsSearcher::new(client.clone())),
            SearcherKind::Reddit => {
                let config = RedditConfig::from_lookup(&env_lookup)?;
                Box::new(RedditSearcher::connect(client.clone(), &config, retry).await?)
            }
            SearcherKind::Bluesky => {
                let config = BlueskyConfig::from_lookup(&env_lookup)?;
                Box::new(BlueskySearcher::connect(client.clone(), &config, retry).await?)
            }
            SearcherKind::Fediverse => {
                let config = FediverseConfig::from_lookup(&env_lookup)?;
                Box::new(FediverseSearcher::connect(client.clone(), &config, retry).await?)
            }
            SearcherKind::YouTube => {
                let config = YouTubeConfig::from_lookup(&env_lookup)?;
                Box::new(YouTubeSearcher::new(client.clone(), &config))
            }
            SearcherKind::Rss => {
                let config = RssConfig::from_lookup(&env_lookup)?;
                Box::new(RssSearcher::new(client.clone(), &config))
            }
        };
        tracing::debug!(platform = searcher.platform(), "Searcher ready");
        searchers.push(searcher);
    }
    Ok(searchers)
}

/// The SQLite handle is returned separately so `main` can close its pool.
async fn build_storer(
    kind: StorageKind,
    namespace: &str,
) -> Result<(Arc<dyn Storer>, Option<Arc<SqliteStorer>>), ConstructionError> {
    let storer: Arc<dyn Storer> = match kind {
        StorageKind::Sqlite => {
            let store = Arc::new(SqliteStorer::open(namespace).await?);
            tracing::debug!(file = %format!("{namespace}.db"), "Using SQLite storage");
            let shared: Arc<dyn Storer> = store.clone();
            return Ok((shared, Some(store)));
        }
        StorageKind::DynamoDb => Arc::new(DynamoDbStorer::connect(namespace).await?),
        StorageKind::Memory => {
            tracing::info!("Using in-memory storage; nothing will be remembered after this run");
            Arc::new(MemoryStorer::new())
        }
    };
    Ok((storer, None))
}

fn build_notifiers(
    kinds: &[NotifierKind],
    client: &Client,
) -> Result<Vec<Box<dyn Notifier>>, ConstructionError> {
    kinds
        .iter()
        .map(|kind| -> Result<Box<dyn Notifier>, ConstructionError> {
            Ok(match kind {
                NotifierKind::Print => Box::new(PrintNotifier::new()),
                NotifierKind::Slack => {
                    Box::new(SlackNotifier::new(client.clone(), &SlackConfig::from_lookup(&env_lookup)?))
                }
                NotifierKind::Discord => Box::new(DiscordNotifier::new(
                    client.clone(),
                    &DiscordConfig::from_lookup(&env_lookup)?,
                )),
            })
        })
        .collect()
}

#[tokio::main]
async fn main() -> Result<()> {
    // Read before logging is set up so RUST_LOG can come from the file.
    let dotenv = dotenvy::dotenv();

    let cli = Cli::parse();
    init_logging(cli.log_format);

    if let Err(e) = dotenv {
        tracing::info!(error = %e, "No .env file loaded; using the process environment");
    }

    // -- clients and components ---------------------------------------------
    let client = Client::builder()
        .user_agent(config::USER_AGENT)
        .timeout(HTTP_TIMEOUT)
        .build()
        .context("failed to build HTTP client")?;
    let retry = Retry::new(cli.retry_policy());

    let searchers = build_searchers(&cli.searchers, &client, &retry)
        .await
        .context("failed to initialise searchers")?;

    let (storer, sqlite) = build_storer(cli.db, &cli.table_name)
        .await
        .context("failed to initialise storage")?;

    let notifiers = build_notifiers(&cli.bots, &client).context("failed to initialise notifiers")?;

    // -- one pass per keyword -----------------------------------------------
    let orchestrator = Orchestrator::new(searchers, storer, notifiers);
    for keyword in &cli.keywords {
        tracing::info!(keyword = %keyword, "Running search");
        let summary = orchestrator.run(keyword).await;
        tracing::info!(keyword = %keyword, new = summary.total_new(), "Run finished: {summary}");
    }

    if let Some(store) = sqlite {
        store.close().await;
    }
    Ok(())
}
