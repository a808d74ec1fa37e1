//! Mock registry implementation for testing.
//!
//! [`MockDeviceRegistry`] implements the full facade semantics, version
//! conflicts included, against an in-memory map, so facade-level behavior
//! can be tested at memory speed without a database or cache.

use crate::credentials::{CredentialRecord, CredentialSet, next_version};
use crate::error::{RegistryError, Result};
use crate::key::DeviceKey;
use crate::registry::DeviceRegistry;
use std::collections::HashMap;
use std::sync::{Arc, Mutex};

/// One in-memory registry entry.
#[derive(Debug, Clone)]
struct MockEntry {
    payload: serde_json::Value,
    credentials: Vec<CredentialRecord>,
    version: String,
}

/// Mock device registry.
///
/// Uses in-memory storage; safe to clone and share across tasks.
#[derive(Debug, Clone, Default)]
pub struct MockDeviceRegistry {
    entries: Arc<Mutex<HashMap<DeviceKey, MockEntry>>>,
}

impl MockDeviceRegistry {
    /// Create an empty mock registry.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> Result<std::sync::MutexGuard<'_, HashMap<DeviceKey, MockEntry>>> {
        self.entries
            .lock()
            .map_err(|_| RegistryError::Internal("Mutex poisoned".to_string()))
    }
}

impl DeviceRegistry for MockDeviceRegistry {
    async fn get_credentials(&self, key: &DeviceKey) -> Result<CredentialSet> {
        let entries = self.lock()?;
        let entry = entries.get(key).ok_or(RegistryError::NotFound)?;

        Ok(CredentialSet {
            credentials: entry.credentials.clone(),
            version: Some(entry.version.clone()),
        })
    }

    async fn set_credentials(
        &self,
        key: &DeviceKey,
        credentials: &[CredentialRecord],
        expected_version: Option<&str>,
    ) -> Result<()> {
        let mut entries = self.lock()?;
        let entry = entries.get_mut(key).ok_or(RegistryError::NotFound)?;

        if let Some(expected) = expected_version {
            if expected != entry.version {
                return Err(RegistryError::VersionMismatch);
            }
        }

        entry.credentials = credentials
            .iter()
            .filter(|c| c.is_complete())
            .cloned()
            .collect();
        entry.version = next_version();

        Ok(())
    }

    async fn add_device(&self, key: &DeviceKey, payload: &serde_json::Value) -> Result<()> {
        let mut entries = self.lock()?;

        if entries.contains_key(key) {
            return Err(RegistryError::AlreadyExists);
        }

        entries.insert(
            key.clone(),
            MockEntry {
                payload: payload.clone(),
                credentials: Vec::new(),
                version: next_version(),
            },
        );

        Ok(())
    }

    async fn update_device(&self, key: &DeviceKey, payload: &serde_json::Value) -> Result<()> {
        let mut entries = self.lock()?;
        let entry = entries.get_mut(key).ok_or(RegistryError::NotFound)?;

        entry.payload = payload.clone();
        entry.version = next_version();

        Ok(())
    }

    async fn remove_device(&self, key: &DeviceKey) -> Result<()> {
        let mut entries = self.lock()?;

        entries
            .remove(key)
            .map(|_| ())
            .ok_or(RegistryError::NotFound)
    }
}
