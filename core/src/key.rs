//! Device identity keys.

use crate::error::{RegistryError, Result};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Immutable compound key identifying one registry entry.
///
/// Equality and hashing are structural; both backends use the key (or its
/// [`cache_key`](DeviceKey::cache_key) encoding) as the storage key.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct DeviceKey {
    /// Tenant that owns the device.
    pub tenant_id: String,
    /// Device identifier, unique within its tenant.
    pub device_id: String,
}

impl DeviceKey {
    /// Create a key from its two components.
    ///
    /// # Errors
    ///
    /// Returns [`RegistryError::InvalidInput`] if either component is empty;
    /// a key is never null-partial.
    pub fn new(tenant_id: impl Into<String>, device_id: impl Into<String>) -> Result<Self> {
        let tenant_id = tenant_id.into();
        let device_id = device_id.into();

        if tenant_id.is_empty() {
            return Err(RegistryError::InvalidInput(
                "tenant_id must not be empty".to_string(),
            ));
        }
        if device_id.is_empty() {
            return Err(RegistryError::InvalidInput(
                "device_id must not be empty".to_string(),
            ));
        }

        Ok(Self {
            tenant_id,
            device_id,
        })
    }

    /// Stable, collision-free cache key for this device.
    ///
    /// Components are percent-encoded before joining, so the separator can
    /// never appear inside a component: two keys encode to the same string
    /// exactly when they are structurally equal.
    #[must_use]
    pub fn cache_key(&self) -> String {
        format!(
            "device:{}/{}",
            urlencoding::encode(&self.tenant_id),
            urlencoding::encode(&self.device_id)
        )
    }
}

impl fmt::Display for DeviceKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.tenant_id, self.device_id)
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn rejects_empty_components() {
        assert!(matches!(
            DeviceKey::new("", "dev1"),
            Err(RegistryError::InvalidInput(_))
        ));
        assert!(matches!(
            DeviceKey::new("tenantA", ""),
            Err(RegistryError::InvalidInput(_))
        ));
        assert!(DeviceKey::new("tenantA", "dev1").is_ok());
    }

    #[test]
    fn cache_key_is_collision_free() {
        // Naive concatenation would make these two keys collide.
        let a = DeviceKey::new("tenant/a", "dev").unwrap();
        let b = DeviceKey::new("tenant", "a/dev").unwrap();
        assert_ne!(a.cache_key(), b.cache_key());
    }

    #[test]
    fn cache_key_mirrors_equality() {
        let a = DeviceKey::new("tenantA", "dev1").unwrap();
        let b = DeviceKey::new("tenantA", "dev1").unwrap();
        let c = DeviceKey::new("tenantA", "dev2").unwrap();

        assert_eq!(a, b);
        assert_eq!(a.cache_key(), b.cache_key());
        assert_ne!(a, c);
        assert_ne!(a.cache_key(), c.cache_key());
    }
}
