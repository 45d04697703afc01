//! DynamoDB store.
//!
//! Items carry three attributes: `Key` (string, partition key), `Value`
//! (string) and `Expiration` (number, Unix seconds). DynamoDB's own TTL
//! sweep is lazy and may lag for hours, so reads check `Expiration` by hand.

use std::collections::HashMap;
use std::time::Duration;

use async_trait::async_trait;
use aws_config::BehaviorVersion;
use aws_credential_types::Credentials;
use aws_sdk_dynamodb::config::{Builder as DynamoConfigBuilder, Region};
use aws_sdk_dynamodb::types::AttributeValue;
use aws_sdk_dynamodb::Client;
use tracing::{debug, info, warn};

use crate::cache::entry::unix_now;
use crate::cache::{CacheStore, Driver, Entry};
use crate::config::DynamoDbConfig;
use crate::error::{CacheError, Result};

const KEY_ATTR: &str = "Key";
const VALUE_ATTR: &str = "Value";
const EXPIRATION_ATTR: &str = "Expiration";

/// DynamoDB-backed cache store.
pub struct DynamoDbStore {
    client: Client,
    table: String,
}

impl DynamoDbStore {
    /// Builds a client from explicit credentials and checks the table exists.
    ///
    /// Missing credentials fail before any network call. Gives up after
    /// `timeout`; every failure is reported as unavailable.
    pub async fn connect(config: &DynamoDbConfig, timeout: Duration) -> Result<Self> {
        let (Some(access_key_id), Some(secret_access_key)) =
            (&config.access_key_id, &config.secret_access_key)
        else {
            return Err(CacheError::unavailable(
                Driver::DynamoDb,
                "AWS_ACCESS_KEY_ID and AWS_SECRET_ACCESS_KEY must both be set",
            ));
        };
        if config.table.trim().is_empty() {
            return Err(CacheError::unavailable(
                Driver::DynamoDb,
                "DYNAMODB_CACHE_TABLE is empty",
            ));
        }

        let credentials = Credentials::new(
            access_key_id,
            secret_access_key,
            None,
            None,
            "jazz-cache",
        );

        let mut dynamo_config = DynamoConfigBuilder::new()
            .behavior_version(BehaviorVersion::latest())
            .region(Region::new(config.region.clone()))
            .credentials_provider(credentials);

        // Local emulators such as DynamoDB Local
        if let Some(endpoint) = &config.endpoint {
            dynamo_config = dynamo_config.endpoint_url(endpoint);
        }

        let client = Client::from_conf(dynamo_config.build());

        let check = client.describe_table().table_name(&config.table).send();
        tokio::time::timeout(timeout, check)
            .await
            .map_err(|_| {
                CacheError::unavailable(
                    Driver::DynamoDb,
                    format!("no answer within {:?}", timeout),
                )
            })?
            .map_err(|e| CacheError::unavailable(Driver::DynamoDb, describe(&e)))?;

        info!(
            "Connected to DynamoDB table '{}' in {}",
            config.table, config.region
        );
        Ok(Self {
            client,
            table: config.table.clone(),
        })
    }

    /// Deletes `key` only while its stored expiration has passed.
    async fn forget_expired(&self, key: &str) -> Result<()> {
        let result = self
            .client
            .delete_item()
            .table_name(&self.table)
            .key(KEY_ATTR, AttributeValue::S(key.to_string()))
            .condition_expression("#exp <= :now")
            .expression_attribute_names("#exp", EXPIRATION_ATTR)
            .expression_attribute_values(":now", AttributeValue::N(unix_now().to_string()))
            .send()
            .await;

        match result {
            Ok(_) => Ok(()),
            // A fresh write landed in between; leave it alone
            Err(e)
                if e.as_service_error()
                    .map(|se| se.is_conditional_check_failed_exception())
                    .unwrap_or(false) =>
            {
                Ok(())
            }
            Err(e) => Err(CacheError::storage("dynamodb DeleteItem failed", describe(&e))),
        }
    }
}

#[async_trait]
impl CacheStore for DynamoDbStore {
    fn driver(&self) -> Driver {
        Driver::DynamoDb
    }

    async fn put(&self, key: &str, payload: String, ttl: Duration) -> Result<()> {
        let item = item_for(key, Entry::persisted(payload, ttl));

        self.client
            .put_item()
            .table_name(&self.table)
            .set_item(Some(item))
            .send()
            .await
            .map_err(|e| CacheError::storage("dynamodb PutItem failed", describe(&e)))?;
        Ok(())
    }

    async fn fetch(&self, key: &str) -> Result<Option<String>> {
        let output = self
            .client
            .get_item()
            .table_name(&self.table)
            .key(KEY_ATTR, AttributeValue::S(key.to_string()))
            .consistent_read(true)
            .send()
            .await
            .map_err(|e| CacheError::storage("dynamodb GetItem failed", describe(&e)))?;

        let Some(item) = output.item() else {
            debug!(key = %key, "dynamodb cache miss");
            return Ok(None);
        };

        match entry_from_item(item) {
            Some(entry) if !entry.is_expired() => Ok(Some(entry.payload)),
            Some(_) => {
                debug!(key = %key, "dynamodb cache entry expired");
                self.forget_expired(key).await?;
                Ok(None)
            }
            None => {
                warn!(key = %key, "malformed dynamodb cache item, removing");
                self.forget(key).await?;
                Ok(None)
            }
        }
    }

    async fn forget(&self, key: &str) -> Result<()> {
        self.client
            .delete_item()
            .table_name(&self.table)
            .key(KEY_ATTR, AttributeValue::S(key.to_string()))
            .send()
            .await
            .map_err(|e| CacheError::storage("dynamodb DeleteItem failed", describe(&e)))?;
        Ok(())
    }
}

/// Builds the `Key` / `Value` / `Expiration` item written by `put`.
fn item_for(key: &str, entry: Entry) -> HashMap<String, AttributeValue> {
    let expires_at = entry.expires_at_unix();
    HashMap::from([
        (KEY_ATTR.to_string(), AttributeValue::S(key.to_string())),
        (VALUE_ATTR.to_string(), AttributeValue::S(entry.payload)),
        (EXPIRATION_ATTR.to_string(), AttributeValue::N(expires_at.to_string())),
    ])
}

/// Reads the `Value` and `Expiration` attributes of an item.
///
/// Returns None for a missing attribute or an out-of-range expiration.
fn entry_from_item(item: &HashMap<String, AttributeValue>) -> Option<Entry> {
    let payload = item.get(VALUE_ATTR)?.as_s().ok()?;
    let expires_at = item.get(EXPIRATION_ATTR)?.as_n().ok()?.parse::<i64>().ok()?;
    Entry::from_unix(payload.clone(), expires_at)
}

/// SDK errors only print their kind through `Display`; the source chain has
/// the service message.
fn describe(err: &(dyn std::error::Error + 'static)) -> String {
    let mut message = err.to_string();
    let mut source = err.source();
    while let Some(cause) = source {
        message.push_str(": ");
        message.push_str(&cause.to_string());
        source = cause.source();
    }
    message
}
