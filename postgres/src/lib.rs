//! `PostgreSQL` device registry backend.
//!
//! This crate provides the relational implementation of the `DeviceRegistry`
//! trait from `device-registry-core`. It uses sqlx with externally configured
//! statement templates and supports:
//!
//! - Whole-set credential replacement under row locking with optimistic
//!   version tokens
//! - Startup-time validation of every configured statement's parameter names
//! - Connection pooling; one connection per transactional scope, released on
//!   every exit path
//! - Schema migrations via `sqlx::migrate!`
//!
//! # Example
//!
//! ```no_run
//! use device_registry_postgres::{PostgresDeviceStore, StatementConfig};
//!
//! async fn example() -> Result<(), Box<dyn std::error::Error>> {
//!     let store =
//!         PostgresDeviceStore::connect("postgres://localhost/registry", &StatementConfig::default())
//!             .await?;
//!     store.migrate().await?;
//!     Ok(())
//! }
//! ```

#![forbid(unsafe_code)]
#![warn(missing_docs)]

pub mod statement;
pub mod store;

pub use statement::{Statement, StatementConfig};
pub use store::PostgresDeviceStore;
