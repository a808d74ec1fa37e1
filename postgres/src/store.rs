//! Relational registry backend.
//!
//! `set_credentials` replaces the whole credential set for a device inside
//! one database transaction: a locked read of the device row (`FOR UPDATE`),
//! deletion of the old credential rows, insertion of the new ones, then a
//! version bump conditioned on the version read under the lock. Concurrent
//! writers on the same key either block at the row lock or fail the version
//! check; writers on different keys never contend. The read-lock-then-
//! conditional-update pattern makes each key's read-modify-write sequence
//! serializable without database-level SERIALIZABLE isolation.
//!
//! Every operation acquires one pooled connection for its whole transactional
//! scope; dropping an uncommitted sqlx transaction rolls it back and returns
//! the connection to the pool, so release runs on every exit path.

use crate::statement::{StatementConfig, Statements};
use device_registry_core::{
    CredentialRecord, CredentialSet, DeviceKey, DeviceRegistry, RegistryError, Result,
    next_version,
};
use sqlx::postgres::PgPoolOptions;
use sqlx::{PgPool, Postgres, Row, Transaction};

/// `PostgreSQL` device registry store.
///
/// # Example
///
/// ```no_run
/// use device_registry_postgres::{PostgresDeviceStore, StatementConfig};
///
/// # async fn example() -> Result<(), Box<dyn std::error::Error>> {
/// let store =
///     PostgresDeviceStore::connect("postgresql://localhost/registry", &StatementConfig::default())
///         .await?;
/// store.migrate().await?;
/// # Ok(())
/// # }
/// ```
#[derive(Clone)]
pub struct PostgresDeviceStore {
    /// `PostgreSQL` connection pool, shared across all operations.
    pool: PgPool,
    /// Parsed and validated statement templates.
    statements: Statements,
}

impl PostgresDeviceStore {
    /// Create a store over an existing pool.
    ///
    /// Parses every configured statement and checks its required parameter
    /// names; a misconfigured statement fails here, at startup.
    ///
    /// # Errors
    ///
    /// Returns [`RegistryError::Configuration`] if a statement is missing a
    /// required parameter name.
    pub fn new(pool: PgPool, config: &StatementConfig) -> Result<Self> {
        Ok(Self {
            pool,
            statements: Statements::from_config(config)?,
        })
    }

    /// Connect to `database_url` and create a store with the given statement
    /// templates.
    ///
    /// # Errors
    ///
    /// Returns error if the connection fails or a statement is invalid.
    pub async fn connect(database_url: &str, config: &StatementConfig) -> Result<Self> {
        let pool = PgPoolOptions::new()
            .max_connections(16)
            .connect(database_url)
            .await
            .map_err(|e| RegistryError::Database(format!("Failed to connect: {e}")))?;

        Self::new(pool, config)
    }

    /// Run database migrations.
    ///
    /// # Errors
    ///
    /// Returns error if migrations fail.
    pub async fn migrate(&self) -> Result<()> {
        sqlx::migrate!("./migrations")
            .run(&self.pool)
            .await
            .map_err(|e| RegistryError::Database(format!("Migration failed: {e}")))?;
        Ok(())
    }

    /// Locked read of the device row, returning its current version token.
    ///
    /// With a pinned version the versioned statement is tried first; a miss
    /// falls back to the unversioned locked read to distinguish a stale token
    /// (row exists at another version → conflict) from an absent device.
    async fn read_version_for_update(
        &self,
        tx: &mut Transaction<'_, Postgres>,
        key: &DeviceKey,
        expected_version: Option<&str>,
    ) -> Result<String> {
        if let Some(expected) = expected_version {
            let row = self
                .statements
                .read_for_update_versioned
                .expand(&[
                    ("tenant_id", key.tenant_id.as_str()),
                    ("device_id", key.device_id.as_str()),
                    ("expected_version", expected),
                ])?
                .fetch_optional(&mut **tx)
                .await
                .map_err(|e| map_db_error("Locked read failed", e))?;

            if let Some(row) = row {
                return extract_version(&row);
            }
        }

        let row = self
            .statements
            .read_for_update
            .expand(&[
                ("tenant_id", key.tenant_id.as_str()),
                ("device_id", key.device_id.as_str()),
            ])?
            .fetch_optional(&mut **tx)
            .await
            .map_err(|e| map_db_error("Locked read failed", e))?;

        match row {
            // The row exists but not at the pinned version.
            Some(_) if expected_version.is_some() => Err(RegistryError::VersionMismatch),
            Some(row) => extract_version(&row),
            None => Err(RegistryError::NotFound),
        }
    }

    /// The write phase of `set_credentials`, between locked read and commit.
    async fn replace_credentials(
        &self,
        tx: &mut Transaction<'_, Postgres>,
        key: &DeviceKey,
        credentials: &[CredentialRecord],
        expected_version: Option<&str>,
        next: &str,
    ) -> Result<()> {
        let current = self
            .read_version_for_update(tx, key, expected_version)
            .await?;

        self.statements
            .delete_all_credentials
            .expand(&[
                ("tenant_id", key.tenant_id.as_str()),
                ("device_id", key.device_id.as_str()),
            ])?
            .execute(&mut **tx)
            .await
            .map_err(|e| map_db_error("Failed to delete credentials", e))?;

        for (index, record) in credentials.iter().enumerate() {
            if !record.is_complete() {
                // Tolerated: entries without a type or auth-id are dropped.
                tracing::debug!(index, "Skipping credential entry without type or auth-id");
                continue;
            }

            let data = serde_json::to_string(record).map_err(|e| {
                RegistryError::Serialization(format!("Failed to encode credential: {e}"))
            })?;

            self.statements
                .insert_credential_entry
                .expand(&[
                    ("tenant_id", key.tenant_id.as_str()),
                    ("device_id", key.device_id.as_str()),
                    ("type", record.credential_type.as_str()),
                    ("auth_id", record.auth_id.as_str()),
                    ("data", data.as_str()),
                ])?
                .execute(&mut **tx)
                .await
                .map_err(|e| map_db_error("Failed to insert credential", e))?;
        }

        let updated = self
            .statements
            .update_device_version
            .expand(&[
                ("tenant_id", key.tenant_id.as_str()),
                ("device_id", key.device_id.as_str()),
                ("next_version", next),
                ("expected_version", current.as_str()),
            ])?
            .execute(&mut **tx)
            .await
            .map_err(|e| map_db_error("Failed to bump version", e))?;

        if updated.rows_affected() == 0 {
            // Another writer changed the row between our read and the bump.
            return Err(RegistryError::VersionMismatch);
        }

        Ok(())
    }
}

impl DeviceRegistry for PostgresDeviceStore {
    #[tracing::instrument(
        name = "registry.get_credentials",
        skip_all,
        fields(tenant_id = %key.tenant_id, device_id = %key.device_id)
    )]
    async fn get_credentials(&self, key: &DeviceKey) -> Result<CredentialSet> {
        let mut tx = self
            .pool
            .begin()
            .await
            .map_err(|e| map_db_error("Failed to begin transaction", e))?;

        let result = async {
            let version = self.read_version_for_update(&mut tx, key, None).await?;

            let rows = self
                .statements
                .read_credentials
                .expand(&[
                    ("tenant_id", key.tenant_id.as_str()),
                    ("device_id", key.device_id.as_str()),
                ])?
                .fetch_all(&mut *tx)
                .await
                .map_err(|e| map_db_error("Failed to read credentials", e))?;

            let mut credentials = Vec::with_capacity(rows.len());
            for row in &rows {
                let raw: String = row
                    .try_get("data")
                    .map_err(|e| map_db_error("Missing data column", e))?;
                let record: CredentialRecord = serde_json::from_str(&raw).map_err(|e| {
                    RegistryError::Serialization(format!("Failed to decode credential: {e}"))
                })?;
                credentials.push(record);
            }

            tracing::debug!(rows = credentials.len(), "Read credentials");

            Ok(CredentialSet {
                credentials,
                version: Some(version),
            })
        }
        .await;

        match result {
            Ok(set) => {
                tx.commit()
                    .await
                    .map_err(|e| map_db_error("Commit failed", e))?;
                Ok(set)
            }
            Err(err) => {
                // Dropping the transaction rolls back and releases the connection.
                drop(tx);
                log_failure("get_credentials", &err);
                Err(err)
            }
        }
    }

    #[tracing::instrument(
        name = "registry.set_credentials",
        skip_all,
        fields(tenant_id = %key.tenant_id, device_id = %key.device_id)
    )]
    async fn set_credentials(
        &self,
        key: &DeviceKey,
        credentials: &[CredentialRecord],
        expected_version: Option<&str>,
    ) -> Result<()> {
        let next = next_version();

        let mut tx = self
            .pool
            .begin()
            .await
            .map_err(|e| map_db_error("Failed to begin transaction", e))?;

        let result = self
            .replace_credentials(&mut tx, key, credentials, expected_version, &next)
            .await;

        match result {
            Ok(()) => {
                tx.commit()
                    .await
                    .map_err(|e| map_db_error("Commit failed", e))?;

                tracing::debug!(version = %next, "Replaced credential set");
                metrics::counter!("registry.credentials.replaced").increment(1);
                Ok(())
            }
            Err(err) => {
                drop(tx);
                if err.is_conflict() {
                    metrics::counter!("registry.credentials.conflicts").increment(1);
                }
                log_failure("set_credentials", &err);
                Err(err)
            }
        }
    }

    #[tracing::instrument(
        name = "registry.add_device",
        skip_all,
        fields(tenant_id = %key.tenant_id, device_id = %key.device_id)
    )]
    async fn add_device(&self, key: &DeviceKey, payload: &serde_json::Value) -> Result<()> {
        let version = next_version();

        sqlx::query(
            r"
            INSERT INTO devices (tenant_id, device_id, version, data)
            VALUES ($1, $2, $3, $4)
            ",
        )
        .bind(&key.tenant_id)
        .bind(&key.device_id)
        .bind(&version)
        .bind(payload)
        .execute(&self.pool)
        .await
        .map_err(|e| {
            let err = map_db_error("Failed to create device", e);
            log_failure("add_device", &err);
            err
        })?;

        tracing::debug!(version = %version, "Device created");
        metrics::counter!("registry.devices.created").increment(1);
        Ok(())
    }

    #[tracing::instrument(
        name = "registry.update_device",
        skip_all,
        fields(tenant_id = %key.tenant_id, device_id = %key.device_id)
    )]
    async fn update_device(&self, key: &DeviceKey, payload: &serde_json::Value) -> Result<()> {
        let version = next_version();

        let result = sqlx::query(
            r"
            UPDATE devices
            SET data = $3, version = $4
            WHERE tenant_id = $1 AND device_id = $2
            ",
        )
        .bind(&key.tenant_id)
        .bind(&key.device_id)
        .bind(payload)
        .bind(&version)
        .execute(&self.pool)
        .await
        .map_err(|e| {
            let err = map_db_error("Failed to update device", e);
            log_failure("update_device", &err);
            err
        })?;

        if result.rows_affected() == 0 {
            log_failure("update_device", &RegistryError::NotFound);
            return Err(RegistryError::NotFound);
        }

        tracing::debug!(version = %version, "Device updated");
        Ok(())
    }

    #[tracing::instrument(
        name = "registry.remove_device",
        skip_all,
        fields(tenant_id = %key.tenant_id, device_id = %key.device_id)
    )]
    async fn remove_device(&self, key: &DeviceKey) -> Result<()> {
        // Credential rows go with the device row via the cascading FK.
        let result = sqlx::query(
            r"
            DELETE FROM devices
            WHERE tenant_id = $1 AND device_id = $2
            ",
        )
        .bind(&key.tenant_id)
        .bind(&key.device_id)
        .execute(&self.pool)
        .await
        .map_err(|e| {
            let err = map_db_error("Failed to remove device", e);
            log_failure("remove_device", &err);
            err
        })?;

        if result.rows_affected() == 0 {
            log_failure("remove_device", &RegistryError::NotFound);
            return Err(RegistryError::NotFound);
        }

        tracing::debug!("Device removed");
        metrics::counter!("registry.devices.removed").increment(1);
        Ok(())
    }
}

/// Pull the version token out of a device row.
fn extract_version(row: &sqlx::postgres::PgRow) -> Result<String> {
    row.try_get("version")
        .map_err(|e| map_db_error("Missing version column", e))
}

/// Classify a sqlx failure into the registry taxonomy.
fn map_db_error(context: &str, e: sqlx::Error) -> RegistryError {
    if let sqlx::Error::Database(db) = &e {
        match db.code().as_deref() {
            // unique_violation: the key already has a row
            Some("23505") => return RegistryError::AlreadyExists,
            // lock timeout on a contended key, surfaced as a conflict
            Some("55P03") => return RegistryError::VersionMismatch,
            _ => {}
        }
    }
    RegistryError::Database(format!("{context}: {e}"))
}

/// Record a failed operation on the current span's target.
fn log_failure(operation: &str, err: &RegistryError) {
    tracing::debug!(
        operation,
        class = err.class().as_str(),
        error = %err,
        "Registry operation failed"
    );
}
