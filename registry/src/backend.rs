//! Backend selection facade.

use device_registry_cache::RedisDeviceStore;
use device_registry_core::{
    CredentialRecord, CredentialSet, DeviceKey, DeviceRegistry, Result,
};
use device_registry_postgres::PostgresDeviceStore;

use crate::config::{BackendConfig, RegistryConfig};

/// The configured registry backend.
///
/// A closed set of variants rather than a trait object: the backend is
/// chosen once at startup and every operation dispatches with a plain
/// match, no dynamic allocation per call.
#[derive(Clone)]
pub enum RegistryBackend {
    /// Relational store with row locking and optimistic version tokens.
    Postgres(PostgresDeviceStore),
    /// Key-value store with atomic conditional single-entry operations.
    Cache(RedisDeviceStore),
}

impl RegistryBackend {
    /// Connect the backend named by `config`.
    ///
    /// For the relational variant this also validates every configured
    /// statement template, so a bad deployment fails here rather than on
    /// the first request.
    ///
    /// # Errors
    ///
    /// Returns error if the connection fails or a configured statement is
    /// invalid.
    pub async fn from_config(config: &RegistryConfig) -> Result<Self> {
        match &config.backend {
            BackendConfig::Postgres { url, statements } => {
                let store = PostgresDeviceStore::connect(url, statements).await?;
                tracing::info!(backend = "postgres", "Registry backend ready");
                Ok(Self::Postgres(store))
            }
            BackendConfig::Cache { url } => {
                let store = RedisDeviceStore::new(url).await?;
                tracing::info!(backend = "redis", "Registry backend ready");
                Ok(Self::Cache(store))
            }
        }
    }
}

impl DeviceRegistry for RegistryBackend {
    async fn get_credentials(&self, key: &DeviceKey) -> Result<CredentialSet> {
        match self {
            Self::Postgres(store) => store.get_credentials(key).await,
            Self::Cache(store) => store.get_credentials(key).await,
        }
    }

    async fn set_credentials(
        &self,
        key: &DeviceKey,
        credentials: &[CredentialRecord],
        expected_version: Option<&str>,
    ) -> Result<()> {
        match self {
            Self::Postgres(store) => store.set_credentials(key, credentials, expected_version).await,
            Self::Cache(store) => store.set_credentials(key, credentials, expected_version).await,
        }
    }

    async fn add_device(&self, key: &DeviceKey, payload: &serde_json::Value) -> Result<()> {
        match self {
            Self::Postgres(store) => store.add_device(key, payload).await,
            Self::Cache(store) => store.add_device(key, payload).await,
        }
    }

    async fn update_device(&self, key: &DeviceKey, payload: &serde_json::Value) -> Result<()> {
        match self {
            Self::Postgres(store) => store.update_device(key, payload).await,
            Self::Cache(store) => store.update_device(key, payload).await,
        }
    }

    async fn remove_device(&self, key: &DeviceKey) -> Result<()> {
        match self {
            Self::Postgres(store) => store.remove_device(key).await,
            Self::Cache(store) => store.remove_device(key).await,
        }
    }
}
