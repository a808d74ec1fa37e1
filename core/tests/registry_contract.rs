//! Facade contract tests against the in-memory mock registry.
//!
//! These exercise the behavior every backend must provide (lifecycle,
//! optimistic-version conflicts, idempotent absence) at memory speed.

#![allow(clippy::unwrap_used)]

use device_registry_core::mocks::MockDeviceRegistry;
use device_registry_core::{CredentialRecord, DeviceKey, DeviceRegistry, RegistryError};
use serde_json::json;

fn psk_credential(secret: &str) -> CredentialRecord {
    CredentialRecord::new("psk", "dev1@tenantA", json!({"key": secret}))
}

#[tokio::test]
async fn full_lifecycle_with_version_tokens() {
    let registry = MockDeviceRegistry::new();
    let key = DeviceKey::new("tenantA", "dev1").unwrap();

    // Create, then install the first credential set.
    registry.add_device(&key, &json!({})).await.unwrap();
    registry
        .set_credentials(&key, &[psk_credential("abc")], None)
        .await
        .unwrap();

    let first = registry.get_credentials(&key).await.unwrap();
    let first_version = first.version.clone().unwrap();
    assert_eq!(first.credentials, vec![psk_credential("abc")]);

    // Conditional replace with the current token succeeds and bumps it.
    registry
        .set_credentials(&key, &[psk_credential("xyz")], Some(&first_version))
        .await
        .unwrap();

    let second = registry.get_credentials(&key).await.unwrap();
    assert_eq!(second.credentials, vec![psk_credential("xyz")]);
    assert_ne!(second.version.as_deref(), Some(first_version.as_str()));

    // Replaying the same call with the stale token is a conflict.
    let stale = registry
        .set_credentials(&key, &[psk_credential("xyz")], Some(&first_version))
        .await;
    assert_eq!(stale, Err(RegistryError::VersionMismatch));

    // The losing write changed nothing.
    let after = registry.get_credentials(&key).await.unwrap();
    assert_eq!(after.credentials, second.credentials);
    assert_eq!(after.version, second.version);
}

#[tokio::test]
async fn add_twice_conflicts() {
    let registry = MockDeviceRegistry::new();
    let key = DeviceKey::new("tenantA", "dev1").unwrap();

    registry.add_device(&key, &json!({})).await.unwrap();
    let second = registry.add_device(&key, &json!({"via": "retry"})).await;

    assert_eq!(second, Err(RegistryError::AlreadyExists));
    assert!(second.unwrap_err().is_conflict());
}

#[tokio::test]
async fn unknown_key_is_not_found() {
    let registry = MockDeviceRegistry::new();
    let key = DeviceKey::new("tenantA", "ghost").unwrap();

    assert_eq!(
        registry.get_credentials(&key).await,
        Err(RegistryError::NotFound)
    );
    assert_eq!(
        registry.update_device(&key, &json!({})).await,
        Err(RegistryError::NotFound)
    );
    assert_eq!(
        registry.set_credentials(&key, &[], None).await,
        Err(RegistryError::NotFound)
    );
}

#[tokio::test]
async fn remove_is_idempotent_on_absence() {
    let registry = MockDeviceRegistry::new();
    let key = DeviceKey::new("tenantA", "dev1").unwrap();

    registry.add_device(&key, &json!({})).await.unwrap();
    registry.remove_device(&key).await.unwrap();

    // Removing again reports absence; it never panics or corrupts state.
    assert_eq!(
        registry.remove_device(&key).await,
        Err(RegistryError::NotFound)
    );
    assert_eq!(
        registry.remove_device(&key).await,
        Err(RegistryError::NotFound)
    );
}

#[tokio::test]
async fn incomplete_records_are_skipped() {
    let registry = MockDeviceRegistry::new();
    let key = DeviceKey::new("tenantA", "dev1").unwrap();

    registry.add_device(&key, &json!({})).await.unwrap();
    registry
        .set_credentials(
            &key,
            &[
                psk_credential("abc"),
                CredentialRecord::new("", "orphan", json!({})),
                CredentialRecord::new("psk", "", json!({})),
            ],
            None,
        )
        .await
        .unwrap();

    let set = registry.get_credentials(&key).await.unwrap();
    assert_eq!(set.credentials, vec![psk_credential("abc")]);
}

#[tokio::test]
async fn concurrent_conditional_writes_have_one_winner() {
    let registry = MockDeviceRegistry::new();
    let key = DeviceKey::new("tenantA", "dev1").unwrap();

    registry.add_device(&key, &json!({})).await.unwrap();
    let version = registry
        .get_credentials(&key)
        .await
        .unwrap()
        .version
        .unwrap();

    let creds_a = [psk_credential("writer-a")];
    let creds_b = [psk_credential("writer-b")];
    let (a, b) = tokio::join!(
        registry.set_credentials(&key, &creds_a, Some(&version)),
        registry.set_credentials(&key, &creds_b, Some(&version)),
    );

    // Exactly one writer wins; the other sees the conflict.
    assert!(a.is_ok() ^ b.is_ok());
    let loser = if a.is_ok() { b.clone() } else { a.clone() };
    assert_eq!(loser, Err(RegistryError::VersionMismatch));

    // The visible rows are exactly the winner's input, never a mixture.
    let set = registry.get_credentials(&key).await.unwrap();
    let winner = if a.is_ok() { "writer-a" } else { "writer-b" };
    assert_eq!(set.credentials, vec![psk_credential(winner)]);
}
