//! Distributed key-value device registry backend.
//!
//! This crate provides the cache implementation of the `DeviceRegistry`
//! trait from `device-registry-core`, built on Redis. There is no explicit
//! version token here: concurrency relies on the cache's atomic conditional
//! primitives (put-if-absent, replace-if-present, remove), each a single
//! O(1) round-trip on one key. The trade-off (no partial updates, no
//! optimistic tokens) fits deployments where credential sets are small and
//! always replaced wholesale.
//!
//! # Example
//!
//! ```no_run
//! use device_registry_cache::RedisDeviceStore;
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let store = RedisDeviceStore::new("redis://127.0.0.1:6379").await?;
//! # Ok(())
//! # }
//! ```

#![forbid(unsafe_code)]
#![warn(missing_docs)]

pub mod store;

pub use store::RedisDeviceStore;
