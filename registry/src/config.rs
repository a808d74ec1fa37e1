//! Registry configuration.
//!
//! Backend selection and connection settings are provided by the
//! application, not hardcoded. Both variants deserialize from the same
//! tagged shape, so a deployment switches backends by editing one field.

use device_registry_postgres::StatementConfig;
use serde::Deserialize;

/// Storage backend selection with its connection settings.
#[derive(Debug, Clone, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum BackendConfig {
    /// Relational backend with row locking and optimistic version tokens.
    Postgres {
        /// Connection URL (e.g., "postgres://localhost/registry").
        url: String,
        /// Statement template overrides.
        ///
        /// The defaults fit the shipped schema; override individual
        /// statements to adapt to an external one.
        #[serde(default)]
        statements: StatementConfig,
    },
    /// Distributed key-value backend with atomic conditional operations.
    Cache {
        /// Connection URL (e.g., "redis://127.0.0.1:6379").
        url: String,
    },
}

/// Top-level registry configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct RegistryConfig {
    /// The backend serving all registry operations.
    pub backend: BackendConfig,
}

impl RegistryConfig {
    /// Configuration for the relational backend with default statements.
    #[must_use]
    pub fn postgres(url: impl Into<String>) -> Self {
        Self {
            backend: BackendConfig::Postgres {
                url: url.into(),
                statements: StatementConfig::default(),
            },
        }
    }

    /// Configuration for the cache backend.
    #[must_use]
    pub fn cache(url: impl Into<String>) -> Self {
        Self {
            backend: BackendConfig::Cache { url: url.into() },
        }
    }

    /// Replace the statement templates of a relational configuration.
    ///
    /// No effect on the cache variant, which has no statements.
    #[must_use]
    pub fn with_statements(mut self, config: StatementConfig) -> Self {
        if let BackendConfig::Postgres { statements, .. } = &mut self.backend {
            *statements = config;
        }
        self
    }
}
