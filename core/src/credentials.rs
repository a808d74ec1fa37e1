//! Credential records, credential sets and their storage codec.
//!
//! Credentials are stored in a storage-neutral JSON encoding: a record is a
//! JSON object with `type`, `auth-id` and an opaque `data` payload, a set is
//! a JSON array of records. The codec round-trips losslessly; encoding is
//! explicit and hand-written, no reflection involved.

use crate::error::{RegistryError, Result};
use serde::{Deserialize, Serialize};

/// One authentication credential owned by a device.
///
/// Uniqueness is keyed by `(type, auth-id)` within a device, but the data
/// model does not enforce it; that is the caller's responsibility.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct CredentialRecord {
    /// Credential type (e.g. `psk`, `hashed-password`, `x509-cert`).
    #[serde(rename = "type", default)]
    pub credential_type: String,

    /// Authentication identity this credential belongs to.
    #[serde(rename = "auth-id", default)]
    pub auth_id: String,

    /// Opaque credential payload. The registry stores it; verification is an
    /// external concern.
    #[serde(default)]
    pub data: serde_json::Value,
}

impl CredentialRecord {
    /// Create a record from its three parts.
    #[must_use]
    pub fn new(
        credential_type: impl Into<String>,
        auth_id: impl Into<String>,
        data: serde_json::Value,
    ) -> Self {
        Self {
            credential_type: credential_type.into(),
            auth_id: auth_id.into(),
            data,
        }
    }

    /// Whether both identifying fields are present.
    ///
    /// Records failing this check are tolerated on writes but skipped, never
    /// inserted.
    #[must_use]
    pub fn is_complete(&self) -> bool {
        !self.credential_type.is_empty() && !self.auth_id.is_empty()
    }
}

/// The full credential collection for one device key.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct CredentialSet {
    /// Credential records last committed for the key.
    pub credentials: Vec<CredentialRecord>,

    /// Opaque version token for optimistic concurrency. Changes on every
    /// successful mutating write. `None` for backends without version tokens.
    pub version: Option<String>,
}

/// Encode a credential list to its JSON array form.
///
/// # Errors
///
/// Returns [`RegistryError::Serialization`] if encoding fails.
pub fn encode_credentials(credentials: &[CredentialRecord]) -> Result<String> {
    serde_json::to_string(credentials)
        .map_err(|e| RegistryError::Serialization(format!("Failed to encode credentials: {e}")))
}

/// Decode a credential list from its JSON array form.
///
/// # Errors
///
/// Returns [`RegistryError::Serialization`] if the input is not a valid
/// credential array.
pub fn decode_credentials(raw: &str) -> Result<Vec<CredentialRecord>> {
    serde_json::from_str(raw)
        .map_err(|e| RegistryError::Serialization(format!("Failed to decode credentials: {e}")))
}

/// Generate a fresh opaque version token.
#[must_use]
pub fn next_version() -> String {
    uuid::Uuid::new_v4().to_string()
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use proptest::prelude::*;
    use serde_json::json;

    #[test]
    fn wire_field_names() {
        let record = CredentialRecord::new("psk", "dev1@tenantA", json!({"key": "abc"}));
        let encoded = serde_json::to_value(&record).unwrap();

        assert_eq!(encoded["type"], "psk");
        assert_eq!(encoded["auth-id"], "dev1@tenantA");
        assert_eq!(encoded["data"]["key"], "abc");
    }

    #[test]
    fn decode_tolerates_missing_fields() {
        // Entries lacking type or auth-id still decode; they are skipped
        // later, at insert time.
        let records = decode_credentials(r#"[{"auth-id": "dev1"}, {"type": "psk"}]"#).unwrap();

        assert_eq!(records.len(), 2);
        assert!(!records[0].is_complete());
        assert!(!records[1].is_complete());
    }

    #[test]
    fn completeness_requires_both_fields() {
        assert!(CredentialRecord::new("psk", "dev1", json!({})).is_complete());
        assert!(!CredentialRecord::new("", "dev1", json!({})).is_complete());
        assert!(!CredentialRecord::new("psk", "", json!({})).is_complete());
    }

    #[test]
    fn version_tokens_are_unique() {
        assert_ne!(next_version(), next_version());
    }

    fn arb_record() -> impl Strategy<Value = CredentialRecord> {
        ("[a-z-]{0,10}", "[a-z0-9@.]{0,16}", any::<u32>()).prop_map(|(t, a, n)| {
            CredentialRecord::new(t, a, json!({"key": n.to_string(), "enabled": n % 2 == 0}))
        })
    }

    proptest! {
        #[test]
        fn codec_round_trips(records in prop::collection::vec(arb_record(), 0..8)) {
            let encoded = encode_credentials(&records).unwrap();
            let decoded = decode_credentials(&encoded).unwrap();
            prop_assert_eq!(records, decoded);
        }
    }
}
