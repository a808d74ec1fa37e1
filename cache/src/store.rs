//! Redis-backed registry store.
//!
//! Each entry is a single JSON document stored under the device's encoded
//! cache key; its `credentials` field holds the credential array. All five
//! facade operations map to one atomic Redis command:
//!
//! - `add_device` → `SET NX GET` (put-if-absent, previous value returned)
//! - `update_device` / `set_credentials` → `SET XX GET` (replace-if-present)
//! - `remove_device` → `DEL`
//! - `get_credentials` → `GET`

use device_registry_core::{
    CredentialRecord, CredentialSet, DeviceKey, DeviceRegistry, RegistryError, Result,
};
use redis::aio::ConnectionManager;
use redis::{AsyncCommands, Client, ExistenceCheck, SetOptions};

/// Redis-based device registry store.
///
/// Connection pooling via `ConnectionManager`; safe to clone and share.
#[derive(Clone)]
pub struct RedisDeviceStore {
    /// Connection manager for connection pooling.
    conn_manager: ConnectionManager,
}

impl RedisDeviceStore {
    /// Create a new Redis registry store.
    ///
    /// # Arguments
    ///
    /// * `redis_url` - Redis connection URL (e.g., "redis://127.0.0.1:6379")
    ///
    /// # Errors
    ///
    /// Returns error if connection to Redis fails.
    pub async fn new(redis_url: &str) -> Result<Self> {
        let client = Client::open(redis_url)
            .map_err(|e| RegistryError::Cache(format!("Failed to create Redis client: {e}")))?;

        let conn_manager = ConnectionManager::new(client).await.map_err(|e| {
            RegistryError::Cache(format!("Failed to create Redis connection manager: {e}"))
        })?;

        Ok(Self { conn_manager })
    }

    /// Put-if-absent with the previous value returned.
    async fn put_if_absent(&self, cache_key: &str, value: &str) -> Result<Option<String>> {
        let mut conn = self.conn_manager.clone();
        let options = SetOptions::default()
            .conditional_set(ExistenceCheck::NX)
            .get(true);

        conn.set_options(cache_key, value, options)
            .await
            .map_err(|e| RegistryError::Cache(format!("Failed to create entry: {e}")))
    }

    /// Replace-if-present with the previous value returned.
    async fn replace(&self, cache_key: &str, value: &str) -> Result<Option<String>> {
        let mut conn = self.conn_manager.clone();
        let options = SetOptions::default()
            .conditional_set(ExistenceCheck::XX)
            .get(true);

        conn.set_options(cache_key, value, options)
            .await
            .map_err(|e| RegistryError::Cache(format!("Failed to replace entry: {e}")))
    }
}

impl DeviceRegistry for RedisDeviceStore {
    #[tracing::instrument(
        name = "registry.get_credentials",
        skip_all,
        fields(tenant_id = %key.tenant_id, device_id = %key.device_id)
    )]
    async fn get_credentials(&self, key: &DeviceKey) -> Result<CredentialSet> {
        let mut conn = self.conn_manager.clone();

        let raw: Option<String> = conn
            .get(key.cache_key())
            .await
            .map_err(|e| RegistryError::Cache(format!("Failed to read entry: {e}")))?;

        match raw {
            Some(raw) => {
                let credentials = decode_entry_credentials(&raw)?;
                tracing::debug!(rows = credentials.len(), "Read credentials");
                // No version token in this backend.
                Ok(CredentialSet {
                    credentials,
                    version: None,
                })
            }
            None => {
                tracing::debug!(class = "not_found", "Entry absent");
                Err(RegistryError::NotFound)
            }
        }
    }

    /// Replaces the whole entry document wholesale; `expected_version` is
    /// ignored, as this backend carries no version tokens.
    #[tracing::instrument(
        name = "registry.set_credentials",
        skip_all,
        fields(tenant_id = %key.tenant_id, device_id = %key.device_id)
    )]
    async fn set_credentials(
        &self,
        key: &DeviceKey,
        credentials: &[CredentialRecord],
        _expected_version: Option<&str>,
    ) -> Result<()> {
        let complete: Vec<&CredentialRecord> =
            credentials.iter().filter(|c| c.is_complete()).collect();
        let value = encode_entry_credentials(&complete)?;

        match self.replace(&key.cache_key(), &value).await? {
            Some(_) => {
                metrics::counter!("registry.credentials.replaced", "backend" => "redis")
                    .increment(1);
                Ok(())
            }
            None => {
                tracing::debug!(class = "not_found", "Entry absent");
                Err(RegistryError::NotFound)
            }
        }
    }

    #[tracing::instrument(
        name = "registry.add_device",
        skip_all,
        fields(tenant_id = %key.tenant_id, device_id = %key.device_id)
    )]
    async fn add_device(&self, key: &DeviceKey, payload: &serde_json::Value) -> Result<()> {
        let value = encode_payload(payload)?;

        match self.put_if_absent(&key.cache_key(), &value).await? {
            // A previous value means another writer already created the entry.
            Some(_) => {
                tracing::debug!(class = "conflict", "Entry already exists");
                Err(RegistryError::AlreadyExists)
            }
            None => {
                metrics::counter!("registry.devices.created", "backend" => "redis").increment(1);
                tracing::debug!("Device created");
                Ok(())
            }
        }
    }

    #[tracing::instrument(
        name = "registry.update_device",
        skip_all,
        fields(tenant_id = %key.tenant_id, device_id = %key.device_id)
    )]
    async fn update_device(&self, key: &DeviceKey, payload: &serde_json::Value) -> Result<()> {
        let value = encode_payload(payload)?;

        match self.replace(&key.cache_key(), &value).await? {
            Some(_) => {
                tracing::debug!("Device updated");
                Ok(())
            }
            None => {
                tracing::debug!(class = "not_found", "Entry absent");
                Err(RegistryError::NotFound)
            }
        }
    }

    #[tracing::instrument(
        name = "registry.remove_device",
        skip_all,
        fields(tenant_id = %key.tenant_id, device_id = %key.device_id)
    )]
    async fn remove_device(&self, key: &DeviceKey) -> Result<()> {
        let mut conn = self.conn_manager.clone();

        let removed: i64 = conn
            .del(key.cache_key())
            .await
            .map_err(|e| RegistryError::Cache(format!("Failed to remove entry: {e}")))?;

        if removed == 0 {
            tracing::debug!(class = "not_found", "Entry absent");
            return Err(RegistryError::NotFound);
        }

        metrics::counter!("registry.devices.removed", "backend" => "redis").increment(1);
        tracing::debug!("Device removed");
        Ok(())
    }
}

/// Encode a registration payload as the entry document.
fn encode_payload(payload: &serde_json::Value) -> Result<String> {
    serde_json::to_string(payload)
        .map_err(|e| RegistryError::Serialization(format!("Failed to encode entry: {e}")))
}

/// Encode an entry document holding only a credential array.
fn encode_entry_credentials(credentials: &[&CredentialRecord]) -> Result<String> {
    serde_json::to_string(&serde_json::json!({ "credentials": credentials }))
        .map_err(|e| RegistryError::Serialization(format!("Failed to encode entry: {e}")))
}

/// Decode the credential array out of an entry document.
///
/// An entry without a `credentials` field decodes to an empty set; the
/// payload's other fields are opaque to this backend.
fn decode_entry_credentials(raw: &str) -> Result<Vec<CredentialRecord>> {
    let entry: serde_json::Value = serde_json::from_str(raw)
        .map_err(|e| RegistryError::Serialization(format!("Failed to decode entry: {e}")))?;

    match entry.get("credentials") {
        Some(credentials) => serde_json::from_value(credentials.clone())
            .map_err(|e| RegistryError::Serialization(format!("Failed to decode credentials: {e}"))),
        None => Ok(Vec::new()),
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use serde_json::json;

    // Note: the #[ignore]d tests require a running Redis instance.
    // Run with: docker run -d -p 6379:6379 redis:7-alpine

    fn psk_credential(secret: &str) -> CredentialRecord {
        CredentialRecord::new("psk", "dev1@tenantA", json!({"key": secret}))
    }

    #[test]
    fn entry_codec_round_trips() {
        let records = vec![psk_credential("abc"), psk_credential("xyz")];
        let refs: Vec<&CredentialRecord> = records.iter().collect();

        let encoded = encode_entry_credentials(&refs).unwrap();
        let decoded = decode_entry_credentials(&encoded).unwrap();

        assert_eq!(decoded, records);
    }

    #[test]
    fn entry_without_credentials_decodes_empty() {
        let decoded = decode_entry_credentials(r#"{"enabled": true}"#).unwrap();
        assert!(decoded.is_empty());
    }

    #[test]
    fn garbage_entry_is_a_serialization_error() {
        assert!(matches!(
            decode_entry_credentials("not json"),
            Err(RegistryError::Serialization(_))
        ));
    }

    #[tokio::test]
    #[ignore] // Requires Redis running
    async fn add_twice_conflicts() {
        let store = RedisDeviceStore::new("redis://127.0.0.1:6379").await.unwrap();
        let key = DeviceKey::new("tenantA", format!("dup-{}", uuid_like())).unwrap();

        store.add_device(&key, &json!({})).await.unwrap();
        let second = store.add_device(&key, &json!({"via": "retry"})).await;
        assert_eq!(second, Err(RegistryError::AlreadyExists));

        store.remove_device(&key).await.unwrap();
    }

    #[tokio::test]
    #[ignore] // Requires Redis running
    async fn lifecycle_without_version_tokens() {
        let store = RedisDeviceStore::new("redis://127.0.0.1:6379").await.unwrap();
        let key = DeviceKey::new("tenantA", format!("life-{}", uuid_like())).unwrap();

        store.add_device(&key, &json!({"enabled": true})).await.unwrap();

        store
            .set_credentials(&key, &[psk_credential("abc")], None)
            .await
            .unwrap();

        let set = store.get_credentials(&key).await.unwrap();
        assert_eq!(set.credentials, vec![psk_credential("abc")]);
        assert_eq!(set.version, None);

        store.remove_device(&key).await.unwrap();
        assert_eq!(
            store.get_credentials(&key).await,
            Err(RegistryError::NotFound)
        );
    }

    #[tokio::test]
    #[ignore] // Requires Redis running
    async fn update_and_set_require_presence() {
        let store = RedisDeviceStore::new("redis://127.0.0.1:6379").await.unwrap();
        let key = DeviceKey::new("tenantA", format!("ghost-{}", uuid_like())).unwrap();

        assert_eq!(
            store.update_device(&key, &json!({})).await,
            Err(RegistryError::NotFound)
        );
        assert_eq!(
            store.set_credentials(&key, &[psk_credential("abc")], None).await,
            Err(RegistryError::NotFound)
        );
    }

    #[tokio::test]
    #[ignore] // Requires Redis running
    async fn remove_is_idempotent_on_absence() {
        let store = RedisDeviceStore::new("redis://127.0.0.1:6379").await.unwrap();
        let key = DeviceKey::new("tenantA", format!("gone-{}", uuid_like())).unwrap();

        store.add_device(&key, &json!({})).await.unwrap();
        store.remove_device(&key).await.unwrap();

        assert_eq!(store.remove_device(&key).await, Err(RegistryError::NotFound));
        assert_eq!(store.remove_device(&key).await, Err(RegistryError::NotFound));
    }

    /// Unique-enough suffix so reruns against a shared Redis don't collide.
    fn uuid_like() -> String {
        device_registry_core::next_version()
    }
}
