//! # Device Registry Core
//!
//! Core types and the backend-agnostic operation surface for a multi-tenant
//! IoT device registry: identity keys, typed credential records with their
//! storage codec, the failure taxonomy, and the [`DeviceRegistry`] facade
//! trait implemented by the relational (`device-registry-postgres`) and cache
//! (`device-registry-cache`) backends.
//!
//! The registry stores credential material and routing metadata; it does not
//! verify credentials, provision tenants, or span transactions across device
//! keys.
//!
//! # Example
//!
//! ```
//! use device_registry_core::{CredentialRecord, DeviceKey, DeviceRegistry};
//! use device_registry_core::mocks::MockDeviceRegistry;
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let registry = MockDeviceRegistry::new();
//! let key = DeviceKey::new("tenantA", "dev1")?;
//!
//! registry.add_device(&key, &serde_json::json!({})).await?;
//! registry
//!     .set_credentials(
//!         &key,
//!         &[CredentialRecord::new("psk", "dev1@tenantA", serde_json::json!({"key": "abc"}))],
//!         None,
//!     )
//!     .await?;
//!
//! let set = registry.get_credentials(&key).await?;
//! assert_eq!(set.credentials.len(), 1);
//! # Ok(())
//! # }
//! ```

#![forbid(unsafe_code)]
#![warn(missing_docs)]

pub mod credentials;
pub mod error;
pub mod key;
pub mod registry;

#[cfg(feature = "test-utils")]
pub mod mocks;

pub use credentials::{
    CredentialRecord, CredentialSet, decode_credentials, encode_credentials, next_version,
};
pub use error::{ErrorClass, RegistryError, Result};
pub use key::DeviceKey;
pub use registry::DeviceRegistry;
