//! Backend-agnostic registry operation surface.

use crate::credentials::{CredentialRecord, CredentialSet};
use crate::error::Result;
use crate::key::DeviceKey;
use std::future::Future;

/// Registry facade.
///
/// Protocol adapters and management APIs call only these operations; they
/// never see backend-specific types. Every operation is scoped to exactly one
/// device key and returns a typed outcome or a failure classified per
/// [`RegistryError`](crate::error::RegistryError). Operations never block the
/// calling thread; suspension happens only at backend I/O boundaries.
///
/// Operations on the same key are not ordered by submission time; the backend
/// detects conflicting writers instead (row lock plus version check, or
/// atomic conditional cache operations). The facade never retries on
/// conflict; that is a caller policy decision, since a blind retry could
/// mask a legitimate concurrent intent conflict.
pub trait DeviceRegistry: Send + Sync {
    /// Read the credential set last committed for `key`, including its
    /// version token where the backend has one.
    ///
    /// # Errors
    ///
    /// Returns error if:
    /// - No entry exists for the key → `RegistryError::NotFound`
    /// - The backend fails → re-classified per the error taxonomy
    fn get_credentials(
        &self,
        key: &DeviceKey,
    ) -> impl Future<Output = Result<CredentialSet>> + Send;

    /// Replace the entire credential set for `key` atomically.
    ///
    /// When `expected_version` is supplied, the replacement happens only if
    /// the stored version token still matches. Records missing a type or
    /// auth-id are tolerated and skipped, never inserted.
    ///
    /// # Errors
    ///
    /// Returns error if:
    /// - No entry exists for the key → `RegistryError::NotFound`
    /// - Another writer won, or the supplied token is stale →
    ///   `RegistryError::VersionMismatch`
    /// - The backend fails → re-classified per the error taxonomy
    fn set_credentials(
        &self,
        key: &DeviceKey,
        credentials: &[CredentialRecord],
        expected_version: Option<&str>,
    ) -> impl Future<Output = Result<()>> + Send;

    /// Create the registry entry for `key` with its initial registration
    /// payload.
    ///
    /// # Errors
    ///
    /// Returns error if:
    /// - An entry already exists → `RegistryError::AlreadyExists`
    /// - The backend fails → re-classified per the error taxonomy
    fn add_device(
        &self,
        key: &DeviceKey,
        payload: &serde_json::Value,
    ) -> impl Future<Output = Result<()>> + Send;

    /// Replace the registration payload for `key`.
    ///
    /// # Errors
    ///
    /// Returns error if:
    /// - No entry exists for the key → `RegistryError::NotFound`
    /// - The backend fails → re-classified per the error taxonomy
    fn update_device(
        &self,
        key: &DeviceKey,
        payload: &serde_json::Value,
    ) -> impl Future<Output = Result<()>> + Send;

    /// Destroy the registry entry for `key`, credentials included.
    ///
    /// Removing an already-absent key returns `NotFound`, not a hard error:
    /// calling it twice in sequence never panics.
    ///
    /// # Errors
    ///
    /// Returns error if:
    /// - No entry exists for the key → `RegistryError::NotFound`
    /// - The backend fails → re-classified per the error taxonomy
    fn remove_device(&self, key: &DeviceKey) -> impl Future<Output = Result<()>> + Send;
}
