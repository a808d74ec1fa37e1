//! Error taxonomy for registry storage operations.

use thiserror::Error;

/// Result type alias for registry operations.
pub type Result<T> = std::result::Result<T, RegistryError>;

/// Failure taxonomy shared by every registry backend.
///
/// Backends catch their internal failures (SQL errors, cache command errors,
/// decode errors) at the store boundary and re-classify them into these
/// variants before they reach a caller. Only the [`ErrorClass::Unexpected`]
/// variants carry the original cause for diagnostics.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum RegistryError {
    /// Registry entry absent. Recoverable by the caller (e.g. create instead
    /// of update).
    #[error("Device not found")]
    NotFound,

    /// Create collided with an existing entry for the same key.
    #[error("Device already exists")]
    AlreadyExists,

    /// Conditional replace lost against a concurrent writer, or the caller
    /// supplied a stale version token.
    #[error("Optimistic locking conflict: version mismatch")]
    VersionMismatch,

    /// Relational backend failure (connectivity, SQL error).
    #[error("Database error: {0}")]
    Database(String),

    /// Cache backend failure (connectivity, command error).
    #[error("Cache error: {0}")]
    Cache(String),

    /// Credential or payload (de)serialization failure.
    #[error("Serialization error: {0}")]
    Serialization(String),

    /// Invalid configuration, detected at store construction time.
    #[error("Configuration error: {0}")]
    Configuration(String),

    /// Invalid caller input (empty key component and the like).
    #[error("Invalid input: {0}")]
    InvalidInput(String),

    /// Internal invariant failure that fits no other variant.
    #[error("Internal error: {0}")]
    Internal(String),
}

/// Coarse outcome classification used for uniform handling and span tagging.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorClass {
    /// Entity absent; recoverable by the caller.
    NotFound,
    /// Already-exists or version-mismatch; caller should retry with a fresh
    /// read or fail its own request.
    Conflict,
    /// Everything else; not retried automatically, surfaced as-is.
    Unexpected,
}

impl ErrorClass {
    /// Stable string form, used as a span/metric label.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::NotFound => "not_found",
            Self::Conflict => "conflict",
            Self::Unexpected => "unexpected",
        }
    }
}

impl RegistryError {
    /// Classify this error into the three-way taxonomy.
    #[must_use]
    pub const fn class(&self) -> ErrorClass {
        match self {
            Self::NotFound => ErrorClass::NotFound,
            Self::AlreadyExists | Self::VersionMismatch => ErrorClass::Conflict,
            Self::Database(_)
            | Self::Cache(_)
            | Self::Serialization(_)
            | Self::Configuration(_)
            | Self::InvalidInput(_)
            | Self::Internal(_) => ErrorClass::Unexpected,
        }
    }

    /// Whether this error is a conflict (already-exists or version-mismatch).
    #[must_use]
    pub const fn is_conflict(&self) -> bool {
        matches!(self.class(), ErrorClass::Conflict)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn classification_covers_taxonomy() {
        assert_eq!(RegistryError::NotFound.class(), ErrorClass::NotFound);
        assert_eq!(RegistryError::AlreadyExists.class(), ErrorClass::Conflict);
        assert_eq!(RegistryError::VersionMismatch.class(), ErrorClass::Conflict);
        assert_eq!(
            RegistryError::Database("boom".to_string()).class(),
            ErrorClass::Unexpected
        );
        assert_eq!(
            RegistryError::Serialization("bad json".to_string()).class(),
            ErrorClass::Unexpected
        );
    }

    #[test]
    fn conflict_predicate() {
        assert!(RegistryError::AlreadyExists.is_conflict());
        assert!(RegistryError::VersionMismatch.is_conflict());
        assert!(!RegistryError::NotFound.is_conflict());
        assert!(!RegistryError::Cache("down".to_string()).is_conflict());
    }

    #[test]
    fn class_labels_are_stable() {
        assert_eq!(ErrorClass::NotFound.as_str(), "not_found");
        assert_eq!(ErrorClass::Conflict.as_str(), "conflict");
        assert_eq!(ErrorClass::Unexpected.as_str(), "unexpected");
    }
}
