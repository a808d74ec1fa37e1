//! Multi-tenant device registry over interchangeable storage backends.
//!
//! This crate ties the registry together: it re-exports the storage
//! contract from `device-registry-core` and selects one of the two
//! backend implementations at startup from configuration. Callers hold a
//! [`RegistryBackend`] and speak only the [`DeviceRegistry`] trait; which
//! store answers is a deployment decision, not a code path.
//!
//! - `postgres`: relational store, row locking plus optimistic version
//!   tokens, configurable statement templates
//! - `cache`: key-value store, atomic conditional operations on a single
//!   entry per device, no version tokens
//!
//! # Example
//!
//! ```no_run
//! use device_registry::{DeviceKey, DeviceRegistry, RegistryBackend, RegistryConfig};
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let config = RegistryConfig::postgres("postgres://localhost/registry");
//! let registry = RegistryBackend::from_config(&config).await?;
//!
//! let key = DeviceKey::new("tenantA", "dev1")?;
//! let set = registry.get_credentials(&key).await?;
//! println!("{} credential(s)", set.credentials.len());
//! # Ok(())
//! # }
//! ```

#![forbid(unsafe_code)]
#![warn(missing_docs)]

pub mod backend;
pub mod config;

pub use backend::RegistryBackend;
pub use config::{BackendConfig, RegistryConfig};
pub use device_registry_core::{
    CredentialRecord, CredentialSet, DeviceKey, DeviceRegistry, ErrorClass, RegistryError, Result,
};
