//! Configured SQL statement templates.
//!
//! Statement templates use named `:param` placeholders and are parsed once,
//! at store construction. Every required parameter name must be present in
//! each configured statement; the check runs at startup, so a misconfigured
//! deployment fails before it serves a single request.

use device_registry_core::{RegistryError, Result};
use serde::Deserialize;
use sqlx::Postgres;
use sqlx::postgres::PgArguments;
use sqlx::query::Query;

/// A parsed SQL statement template.
///
/// Named `:param` placeholders are rewritten to Postgres positional
/// placeholders (`$1`, `$2`, …); the parameter names are kept in placeholder
/// order so values can be bound by name at execution time. A repeated name
/// reuses its placeholder. `::type` casts pass through untouched.
#[derive(Debug, Clone)]
pub struct Statement {
    sql: String,
    fields: Vec<String>,
}

impl Statement {
    /// Parse a template with named `:param` placeholders.
    ///
    /// # Errors
    ///
    /// Returns [`RegistryError::Configuration`] if the template is empty.
    pub fn parse(template: &str) -> Result<Self> {
        if template.trim().is_empty() {
            return Err(RegistryError::Configuration(
                "Statement template must not be empty".to_string(),
            ));
        }

        let mut sql = String::with_capacity(template.len());
        let mut fields: Vec<String> = Vec::new();
        let mut chars = template.chars().peekable();

        while let Some(c) = chars.next() {
            if c != ':' {
                sql.push(c);
                continue;
            }

            match chars.peek() {
                // `::` is a Postgres cast, not a parameter.
                Some(':') => {
                    sql.push_str("::");
                    chars.next();
                }
                Some(&next) if next.is_ascii_alphabetic() || next == '_' => {
                    let mut name = String::new();
                    while let Some(&c2) = chars.peek() {
                        if c2.is_ascii_alphanumeric() || c2 == '_' {
                            name.push(c2);
                            chars.next();
                        } else {
                            break;
                        }
                    }
                    let index = fields.iter().position(|f| *f == name).map_or_else(
                        || {
                            fields.push(name.clone());
                            fields.len()
                        },
                        |i| i + 1,
                    );
                    sql.push('$');
                    sql.push_str(&index.to_string());
                }
                _ => sql.push(':'),
            }
        }

        Ok(Self { sql, fields })
    }

    /// Check that every required parameter name appears in this statement.
    ///
    /// # Errors
    ///
    /// Returns [`RegistryError::Configuration`] naming the first missing
    /// parameter.
    pub fn validate_parameters(self, required: &[&str]) -> Result<Self> {
        for name in required {
            if !self.fields.iter().any(|f| f == name) {
                return Err(RegistryError::Configuration(format!(
                    "Statement is missing required parameter `{name}`: {}",
                    self.sql
                )));
            }
        }
        Ok(self)
    }

    /// Bind named values and produce an executable query.
    ///
    /// # Errors
    ///
    /// Returns [`RegistryError::Configuration`] if a placeholder has no value
    /// in `params`.
    pub fn expand<'q>(
        &'q self,
        params: &[(&str, &'q str)],
    ) -> Result<Query<'q, Postgres, PgArguments>> {
        let mut query = sqlx::query(self.sql.as_str());
        for field in &self.fields {
            let value = params
                .iter()
                .find(|(name, _)| *name == field.as_str())
                .map(|(_, value)| *value)
                .ok_or_else(|| {
                    RegistryError::Configuration(format!(
                        "No value supplied for statement parameter `{field}`"
                    ))
                })?;
            query = query.bind(value);
        }
        Ok(query)
    }

    /// The rewritten SQL with positional placeholders.
    #[must_use]
    pub fn sql(&self) -> &str {
        &self.sql
    }

    /// Parameter names in placeholder order.
    #[must_use]
    pub fn fields(&self) -> &[String] {
        &self.fields
    }
}

/// Named statement templates for the relational backend.
///
/// The defaults target the schema shipped in `migrations/`; individual
/// statements can be overridden for a different table layout. Whatever the
/// templates look like, the store validates the required parameter set of
/// each one at construction.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct StatementConfig {
    /// Locked read of the device row (`FOR UPDATE`).
    pub read_for_update: String,
    /// Locked read additionally filtered by an expected version token.
    pub read_for_update_versioned: String,
    /// Read all credential rows for a device.
    pub read_credentials: String,
    /// Insert one credential row.
    pub insert_credential_entry: String,
    /// Delete all credential rows for a device.
    pub delete_all_credentials: String,
    /// Conditional version bump on the device row.
    pub update_device_version: String,
}

impl Default for StatementConfig {
    fn default() -> Self {
        Self {
            read_for_update: "SELECT version FROM devices \
                 WHERE tenant_id = :tenant_id AND device_id = :device_id \
                 FOR UPDATE"
                .to_string(),
            read_for_update_versioned: "SELECT version FROM devices \
                 WHERE tenant_id = :tenant_id AND device_id = :device_id \
                 AND version = :expected_version \
                 FOR UPDATE"
                .to_string(),
            read_credentials: "SELECT data FROM device_credentials \
                 WHERE tenant_id = :tenant_id AND device_id = :device_id"
                .to_string(),
            insert_credential_entry: "INSERT INTO device_credentials \
                 (tenant_id, device_id, type, auth_id, data) \
                 VALUES (:tenant_id, :device_id, :type, :auth_id, :data)"
                .to_string(),
            delete_all_credentials: "DELETE FROM device_credentials \
                 WHERE tenant_id = :tenant_id AND device_id = :device_id"
                .to_string(),
            update_device_version: "UPDATE devices SET version = :next_version \
                 WHERE tenant_id = :tenant_id AND device_id = :device_id \
                 AND version = :expected_version"
                .to_string(),
        }
    }
}

impl StatementConfig {
    /// Override the locked-read statement.
    #[must_use]
    pub fn with_read_for_update(mut self, template: impl Into<String>) -> Self {
        self.read_for_update = template.into();
        self
    }

    /// Override the versioned locked-read statement.
    #[must_use]
    pub fn with_read_for_update_versioned(mut self, template: impl Into<String>) -> Self {
        self.read_for_update_versioned = template.into();
        self
    }

    /// Override the credential read statement.
    #[must_use]
    pub fn with_read_credentials(mut self, template: impl Into<String>) -> Self {
        self.read_credentials = template.into();
        self
    }

    /// Override the credential insert statement.
    #[must_use]
    pub fn with_insert_credential_entry(mut self, template: impl Into<String>) -> Self {
        self.insert_credential_entry = template.into();
        self
    }

    /// Override the credential delete statement.
    #[must_use]
    pub fn with_delete_all_credentials(mut self, template: impl Into<String>) -> Self {
        self.delete_all_credentials = template.into();
        self
    }

    /// Override the version bump statement.
    #[must_use]
    pub fn with_update_device_version(mut self, template: impl Into<String>) -> Self {
        self.update_device_version = template.into();
        self
    }
}

/// The six statements after parsing and parameter validation.
#[derive(Debug, Clone)]
pub(crate) struct Statements {
    pub read_for_update: Statement,
    pub read_for_update_versioned: Statement,
    pub read_credentials: Statement,
    pub insert_credential_entry: Statement,
    pub delete_all_credentials: Statement,
    pub update_device_version: Statement,
}

impl Statements {
    /// Parse and validate every configured statement.
    pub fn from_config(config: &StatementConfig) -> Result<Self> {
        Ok(Self {
            read_for_update: Statement::parse(&config.read_for_update)?
                .validate_parameters(&["tenant_id", "device_id"])?,
            read_for_update_versioned: Statement::parse(&config.read_for_update_versioned)?
                .validate_parameters(&["tenant_id", "device_id", "expected_version"])?,
            read_credentials: Statement::parse(&config.read_credentials)?
                .validate_parameters(&["tenant_id", "device_id"])?,
            insert_credential_entry: Statement::parse(&config.insert_credential_entry)?
                .validate_parameters(&["tenant_id", "device_id", "type", "auth_id", "data"])?,
            delete_all_credentials: Statement::parse(&config.delete_all_credentials)?
                .validate_parameters(&["tenant_id", "device_id"])?,
            update_device_version: Statement::parse(&config.update_device_version)?
                .validate_parameters(&[
                    "tenant_id",
                    "device_id",
                    "next_version",
                    "expected_version",
                ])?,
        })
    }
}
