//! Core `SQLite` storage implementation.
//!
//! This module provides the main [`SqliteStorage`] struct, connection setup
//! and migrations.

#![allow(clippy::missing_errors_doc)]

use crate::error::StorageError;
use chrono::{DateTime, Utc};
use sqlx::sqlite::{SqliteConnectOptions, SqliteJournalMode, SqlitePool, SqlitePoolOptions};
use std::path::Path;
use std::str::FromStr;
use std::time::Duration;

/// How long a writer waits on a locked database before failing.
const BUSY_TIMEOUT: Duration = Duration::from_secs(5);

/// `SQLite` storage backend for metric snapshots.
///
/// File-backed instances use WAL so readers never block the single-row
/// append path. In-memory instances hold exactly one connection for their
/// whole lifetime, since every `SQLite` memory connection is its own database.
#[derive(Debug, Clone)]
pub struct SqliteStorage {
    pub(crate) pool: SqlitePool,
}

impl SqliteStorage {
    /// Get a clone of the connection pool.
    #[must_use]
    pub fn get_pool(&self) -> SqlitePool {
        self.pool.clone()
    }

    /// Create a new file-backed `SQLite` storage instance.
    ///
    /// # Arguments
    ///
    /// * `database_path` - Path to the `SQLite` database file
    ///
    /// # Errors
    ///
    /// Returns [`StorageError::ConnectionFailed`] if the connection fails.
    pub async fn new(database_path: impl AsRef<Path>) -> Result<Self, StorageError> {
        let path = database_path.as_ref();

        // Create parent directories if they don't exist
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent).map_err(|e| StorageError::ConnectionFailed {
                message: format!("Failed to create database directory: {e}"),
            })?;
        }

        let options =
            SqliteConnectOptions::from_str(&format!("sqlite://{}?mode=rwc", path.display()))
                .map_err(|e| StorageError::ConnectionFailed {
                    message: format!("Invalid database path: {e}"),
                })?
                .journal_mode(SqliteJournalMode::Wal)
                .busy_timeout(BUSY_TIMEOUT)
                .foreign_keys(true)
                .create_if_missing(true);

        let pool = SqlitePoolOptions::new()
            .max_connections(5)
            .connect_with(options)
            .await
            .map_err(|e| StorageError::ConnectionFailed {
                message: format!("Failed to connect to database: {e}"),
            })?;

        let storage = Self { pool };
        storage.run_migrations().await?;

        tracing::debug!(path = %path.display(), "Opened metric store");
        Ok(storage)
    }

    /// Create a new in-memory `SQLite` storage instance.
    ///
    /// Behaves identically to a file-backed store for the lifetime of the
    /// process; used for hermetic tests.
    ///
    /// # Errors
    ///
    /// Returns [`StorageError::ConnectionFailed`] if the connection fails.
    pub async fn new_in_memory() -> Result<Self, StorageError> {
        let options = SqliteConnectOptions::from_str("sqlite::memory:")
            .map_err(|e| StorageError::ConnectionFailed {
                message: format!("Invalid memory database options: {e}"),
            })?
            .foreign_keys(true);

        let pool = SqlitePoolOptions::new()
            .min_connections(1)
            .max_connections(1)
            .idle_timeout(None)
            .max_lifetime(None)
            .connect_with(options)
            .await
            .map_err(|e| StorageError::ConnectionFailed {
                message: format!("Failed to create in-memory database: {e}"),
            })?;

        let storage = Self { pool };
        storage.run_migrations().await?;

        Ok(storage)
    }

    /// Run database migrations.
    ///
    /// Each migration is idempotent (uses IF NOT EXISTS).
    pub(crate) async fn run_migrations(&self) -> Result<(), StorageError> {
        let schema_001 = include_str!("../../migrations/001_metric_snapshots.sql");
        sqlx::query(schema_001)
            .execute(&self.pool)
            .await
            .map_err(|e| StorageError::MigrationFailed {
                version: "001".to_string(),
                message: format!("Failed to run migration 001: {e}"),
            })?;

        Ok(())
    }

    /// Encode a timestamp as stored (microseconds since the Unix epoch).
    pub(crate) fn to_micros(ts: DateTime<Utc>) -> i64 {
        ts.timestamp_micros()
    }

    /// Decode a stored timestamp.
    pub(crate) fn from_micros(micros: i64) -> Result<DateTime<Utc>, StorageError> {
        DateTime::from_timestamp_micros(micros).ok_or_else(|| StorageError::Internal {
            message: format!("Timestamp out of range: {micros}"),
        })
    }

    /// Create a query error with the given query name and message.
    pub(crate) fn query_error(query: &str, message: String) -> StorageError {
        StorageError::QueryFailed {
            query: query.to_string(),
            message,
        }
    }
}
