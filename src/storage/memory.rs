//! In-memory storer.
//!
//! Nothing survives the process, so `--db memory` turns a run into a dry run:
//! everything found is treated as new and notified.

use std::collections::HashMap;
use std::sync::Mutex;

use async_trait::async_trait;

use super::Storer;
use crate::error::StorageError;
use crate::search::SearchResult;

#[derive(Default)]
pub struct MemoryStorer {
    /// Saved results keyed by `(platform, url)`.
    results: Mutex<HashMap<(String, String), SearchResult>>,
    watermarks: Mutex<HashMap<String, i64>>,
}

impl MemoryStorer {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of saved results across all platforms.
    #[cfg(test)]
    pub fn len(&self) -> usize {
        self.results.lock().map(|r| r.len()).unwrap_or(0)
    }

    #[cfg(test)]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

fn poisoned<T>(_: T) -> StorageError {
    StorageError::Unavailable("memory store lock poisoned".into())
}

#[async_trait]
impl Storer for MemoryStorer {
    async fn exists(&self, platform: &str, url: &str) -> Result<bool, StorageError> {
        let results = self.results.lock().map_err(poisoned)?;
        Ok(results.contains_key(&(platform.to_string(), url.to_string())))
    }

    async fn save(&self, result: &SearchResult) -> Result<(), StorageError> {
        let mut results = self.results.lock().map_err(poisoned)?;
        results
            .entry((result.platform.clone(), result.url.clone()))
            .or_insert_with(|| result.clone());
        Ok(())
    }

    async fn get_last_search_time(&self, platform: &str) -> Result<i64, StorageError> {
        let watermarks = self.watermarks.lock().map_err(poisoned)?;
        Ok(watermarks.get(platform).copied().unwrap_or(0))
    }

    async fn set_last_search_time(&self, platform: &str, epoch: i64) -> Result<(), StorageError> {
        let mut watermarks = self.watermarks.lock().map_err(poisoned)?;
        watermarks.insert(platform.to_string(), epoch);
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    fn result(url: &str) -> SearchResult {
        SearchResult::new("HackerNews", "rust", "title", url, 100)
    }

    #[tokio::test]
    async fn save_then_exists() {
        let store = MemoryStorer::new();
        assert!(!store.exists("HackerNews", "https://a").await.unwrap());

        store.save(&result("https://a")).await.unwrap();

        assert!(store.exists("HackerNews", "https://a").await.unwrap());
        assert!(!store.exists("Reddit", "https://a").await.unwrap(), "key includes platform");
    }

    #[tokio::test]
    async fn save_is_idempotent() {
        let store = MemoryStorer::new();
        store.save(&result("https://a")).await.unwrap();
        store.save(&result("https://a")).await.unwrap();
        assert_eq!(store.len(), 1);
    }

    #[tokio::test]
    async fn watermark_defaults_to_zero_and_upserts() {
        let store = MemoryStorer::new();
        assert_eq!(store.get_last_search_time("Reddit").await.unwrap(), 0);

        store.set_last_search_time("Reddit", 10).await.unwrap();
        store.set_last_search_time("Reddit", 20).await.unwrap();

        assert_eq!(store.get_last_search_time("Reddit").await.unwrap(), 20);
        assert_eq!(store.get_last_search_time("Bluesky").await.unwrap(), 0);
    }
}
