//! DynamoDB storage backend.
//!
//! One table holds both logical indexes. The partition key `Platform` is the
//! platform id; the sort key `SortKey` is the result URL for dedup records
//! and the literal `LastSearchTime` for the platform's watermark item, whose
//! value lives in the numeric `Timestamp` attribute.
//!
//! Credentials and region come from the standard AWS provider chain.

use std::collections::HashMap;

use async_trait::async_trait;
use aws_config::{BehaviorVersion, SdkConfig};
use aws_credential_types::provider::ProvideCredentials;
use aws_sdk_dynamodb::error::DisplayErrorContext;
use aws_sdk_dynamodb::types::AttributeValue;
use aws_sdk_dynamodb::Client;

use super::Storer;
use crate::error::{ConstructionError, StorageError};
use crate::search::SearchResult;

const PARTITION_KEY: &str = "Platform";
const SORT_KEY: &str = "SortKey";
const WATERMARK_SORT_KEY: &str = "LastSearchTime";
const TIMESTAMP: &str = "Timestamp";

type Item = HashMap<String, AttributeValue>;

pub struct DynamoDbStorer {
    client: Client,
    table_name: String,
}

fn dynamo_error<E: std::error::Error + 'static>(err: E) -> StorageError {
    StorageError::DynamoDb(DisplayErrorContext(err).to_string())
}

fn key(platform: &str, sort_key: &str) -> Item {
    HashMap::from([
        (PARTITION_KEY.to_string(), AttributeValue::S(platform.to_string())),
        (SORT_KEY.to_string(), AttributeValue::S(sort_key.to_string())),
    ])
}

/// Key of a result record. A URL equal to the watermark sort key would
/// overwrite the watermark item, so it is refused.
fn result_key(platform: &str, url: &str) -> Result<Item, StorageError> {
    if url == WATERMARK_SORT_KEY {
        return Err(StorageError::Corrupt(format!(
            "result url {url:?} collides with the watermark item"
        )));
    }
    Ok(key(platform, url))
}

fn result_item(result: &SearchResult) -> Result<Item, StorageError> {
    let mut item = result_key(&result.platform, &result.url)?;
    item.insert("Keyword".into(), AttributeValue::S(result.keyword.clone()));
    item.insert("Title".into(), AttributeValue::S(result.title.clone()));
    item.insert("Url".into(), AttributeValue::S(result.url.clone()));
    item.insert(TIMESTAMP.into(), AttributeValue::N(result.timestamp.to_string()));
    if !result.content.is_empty() {
        item.insert("Content".into(), AttributeValue::S(result.content.clone()));
    }
    Ok(item)
}

fn watermark_item(platform: &str, epoch: i64) -> Item {
    let mut item = key(platform, WATERMARK_SORT_KEY);
    item.insert(TIMESTAMP.into(), AttributeValue::N(epoch.to_string()));
    item
}

fn parse_watermark(item: &Item) -> Result<i64, StorageError> {
    let raw = item
        .get(TIMESTAMP)
        .and_then(|v| v.as_n().ok())
        .ok_or_else(|| StorageError::Corrupt("watermark item has no numeric Timestamp".into()))?;
    raw.parse::<i64>()
        .map_err(|e| StorageError::Corrupt(format!("watermark {raw:?} is not an integer: {e}")))
}

/// The default provider chain is always installed, so credentials are only
/// known to be missing once it has been asked for them.
async fn check_config(config: &SdkConfig) -> Result<(), ConstructionError> {
    if config.region().is_none() {
        return Err(ConstructionError::MissingCredential("AWS_REGION".into()));
    }

    let missing = || ConstructionError::MissingCredential("AWS credentials".into());
    let provider = config.credentials_provider().ok_or_else(missing)?;
    if let Err(e) = provider.provide_credentials().await {
        tracing::debug!(error = %DisplayErrorContext(&e), "No AWS credentials resolved");
        return Err(missing());
    }
    Ok(())
}

impl DynamoDbStorer {
    pub fn new(client: Client, table_name: impl Into<String>) -> Self {
        Self {
            client,
            table_name: table_name.into(),
        }
    }

    /// Load AWS configuration from the environment. Missing credentials or
    /// region abort startup.
    pub async fn connect(table_name: &str) -> Result<Self, ConstructionError> {
        let config = aws_config::load_defaults(BehaviorVersion::latest()).await;
        check_config(&config).await?;

        tracing::debug!(table = table_name, "Using DynamoDB storage");
        Ok(Self::new(Client::new(&config), table_name))
    }

    async fn get(&self, key: Item) -> Result<Option<Item>, StorageError> {
        let output = self
            .client
            .get_item()
            .table_name(&self.table_name)
            .set_key(Some(key))
            .send()
            .await
            .map_err(dynamo_error)?;
        Ok(output.item().cloned())
    }

    async fn put(&self, item: Item) -> Result<(), StorageError> {
        self.client
            .put_item()
            .table_name(&self.table_name)
            .set_item(Some(item))
            .send()
            .await
            .map_err(dynamo_error)?;
        Ok(())
    }
}

#[async_trait]
impl Storer for DynamoDbStorer {
    async fn exists(&self, platform: &str, url: &str) -> Result<bool, StorageError> {
        Ok(self.get(result_key(platform, url)?).await?.is_some())
    }

    async fn save(&self, result: &SearchResult) -> Result<(), StorageError> {
        // PutItem replaces an item with the same key, so a repeat save leaves
        // one record.
        self.put(result_item(result)?).await
    }

    async fn get_last_search_time(&self, platform: &str) -> Result<i64, StorageError> {
        match self.get(key(platform, WATERMARK_SORT_KEY)).await? {
            Some(item) => parse_watermark(&item),
            None => Ok(0),
        }
    }

    async fn set_last_search_time(&self, platform: &str, epoch: i64) -> Result<(), StorageError> {
        self.put(watermark_item(platform, epoch)).await
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use aws_credential_types::provider::error::CredentialsError;
    use aws_credential_types::provider::{future, SharedCredentialsProvider};
    use aws_credential_types::Credentials;
    use aws_sdk_dynamodb::config::Region;

    use super::*;

    #[test]
    fn result_item_is_keyed_by_platform_and_url() {
        let r = SearchResult::new("Reddit", "rust", "Title", "https://reddit/x", 1234);
        let item = result_item(&r).unwrap();

        assert_eq!(item.get("Platform"), Some(&AttributeValue::S("Reddit".into())));
        assert_eq!(item.get("SortKey"), Some(&AttributeValue::S("https://reddit/x".into())));
        assert_eq!(item.get("Keyword"), Some(&AttributeValue::S("rust".into())));
        assert_eq!(item.get("Timestamp"), Some(&AttributeValue::N("1234".into())));
        assert!(!item.contains_key("Content"), "empty strings are not stored");
    }

    #[test]
    fn watermark_item_roundtrips() {
        let item = watermark_item("Bluesky", 1_700_000_000);
        assert_eq!(item.get("SortKey"), Some(&AttributeValue::S("LastSearchTime".into())));
        assert_eq!(parse_watermark(&item).unwrap(), 1_700_000_000);
    }

    #[test]
    fn malformed_watermark_is_corrupt() {
        let mut item = key("Bluesky", WATERMARK_SORT_KEY);
        assert!(matches!(parse_watermark(&item), Err(StorageError::Corrupt(_))));

        item.insert(TIMESTAMP.into(), AttributeValue::N("12.5".into()));
        assert!(matches!(parse_watermark(&item), Err(StorageError::Corrupt(_))));

        item.insert(TIMESTAMP.into(), AttributeValue::S("100".into()));
        assert!(matches!(parse_watermark(&item), Err(StorageError::Corrupt(_))));
    }

    #[test]
    fn url_matching_the_watermark_key_is_refused() {
        let r = SearchResult::new("RSS", "rust", "Title", "LastSearchTime", 1);

        assert!(matches!(result_item(&r), Err(StorageError::Corrupt(_))));
        assert!(matches!(result_key("RSS", "LastSearchTime"), Err(StorageError::Corrupt(_))));
        assert!(result_key("RSS", "https://example.com/LastSearchTime").is_ok());
    }

    #[derive(Debug)]
    struct NoCredentials;

    impl ProvideCredentials for NoCredentials {
        fn provide_credentials<'a>(&'a self) -> future::ProvideCredentials<'a>
        where
            Self: 'a,
        {
            future::ProvideCredentials::ready(Err(CredentialsError::not_loaded("empty environment")))
        }
    }

    fn sdk_config(provider: Option<SharedCredentialsProvider>) -> SdkConfig {
        let mut builder = SdkConfig::builder()
            .behavior_version(BehaviorVersion::latest())
            .region(Region::new("us-east-1"));
        builder.set_credentials_provider(provider);
        builder.build()
    }

    #[tokio::test]
    async fn unresolvable_credentials_abort_startup() {
        let config = sdk_config(Some(SharedCredentialsProvider::new(NoCredentials)));

        assert!(matches!(
            check_config(&config).await,
            Err(ConstructionError::MissingCredential(name)) if name == "AWS credentials"
        ));
    }

    #[tokio::test]
    async fn missing_provider_aborts_startup() {
        assert!(matches!(
            check_config(&sdk_config(None)).await,
            Err(ConstructionError::MissingCredential(_))
        ));
    }

    #[tokio::test]
    async fn missing_region_aborts_startup() {
        let config = SdkConfig::builder()
            .behavior_version(BehaviorVersion::latest())
            .credentials_provider(SharedCredentialsProvider::new(Credentials::new(
                "AKID", "secret", None, None, "test",
            )))
            .build();

        assert!(matches!(
            check_config(&config).await,
            Err(ConstructionError::MissingCredential(name)) if name == "AWS_REGION"
        ));
    }

    #[tokio::test]
    async fn resolvable_credentials_pass() {
        let provider = SharedCredentialsProvider::new(Credentials::new("AKID", "secret", None, None, "test"));

        assert!(check_config(&sdk_config(Some(provider))).await.is_ok());
    }
}
