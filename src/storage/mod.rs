//! Persistence of seen results and per-platform watermarks.
//!
//! Every backend stores two logical tables:
//!
//! * a dedup index keyed by `(platform, url)` holding the result's platform,
//!   keyword, title, url, timestamp and content;
//! * a watermark index keyed by `platform` holding one epoch-seconds value.
//!
//! Backends:
//!
//! * [`SqliteStorer`]: a local `{namespace}.db` file (the default).
//! * [`DynamoDbStorer`]: a DynamoDB table named after the namespace.
//! * [`MemoryStorer`]: process-local maps, for dry runs and tests.

mod dynamodb;
mod memory;
mod sqlite;

pub use dynamodb::DynamoDbStorer;
pub use memory::MemoryStorer;
pub use sqlite::SqliteStorer;

use async_trait::async_trait;

use crate::error::StorageError;
use crate::search::SearchResult;

/// Trait that every storage backend must implement.
#[async_trait]
pub trait Storer: Send + Sync {
    /// Whether a result with this dedup key has been saved before.
    async fn exists(&self, platform: &str, url: &str) -> Result<bool, StorageError>;

    /// Persist a result. Saving a key that is already present succeeds and
    /// leaves a single record.
    async fn save(&self, result: &SearchResult) -> Result<(), StorageError>;

    /// The platform's watermark, `0` when none has been recorded.
    async fn get_last_search_time(&self, platform: &str) -> Result<i64, StorageError>;

    /// Create or replace the platform's watermark.
    async fn set_last_search_time(&self, platform: &str, epoch: i64) -> Result<(), StorageError>;
}
