//! Version bookkeeping over the `schema_migrations` table
//!
//! One row per applied migration, `schema_migrations(version INTEGER UNIQUE
//! NOT NULL)` — no timestamps, no other columns. Insertion order is
//! irrelevant; set membership is what matters. Rows are written by the
//! runner after each successful migration and never updated or deleted by
//! this crate.

use rusqlite::Connection;
use std::collections::BTreeSet;

use crate::error::MigrateError;

/// DDL for the bookkeeping table
const MIGRATIONS_TABLE: &str =
    "CREATE TABLE IF NOT EXISTS schema_migrations (version INTEGER UNIQUE NOT NULL)";

/// Repository for applied-version bookkeeping
///
/// Borrows the live connection; all operations are single statements
/// against the `schema_migrations` table.
pub struct VersionStore<'a> {
    conn: &'a Connection,
}

impl<'a> VersionStore<'a> {
    /// Create a store over the given connection
    pub fn new(conn: &'a Connection) -> Self {
        Self { conn }
    }

    /// Create the bookkeeping table if it does not exist
    ///
    /// Idempotent; safe to call before every run.
    pub fn ensure_migrations_table(&self) -> Result<(), MigrateError> {
        self.conn
            .execute(MIGRATIONS_TABLE, [])
            .map_err(|e| MigrateError::Storage(format!("failed to create schema_migrations: {}", e)))?;
        Ok(())
    }

    /// Whether the bookkeeping table exists
    ///
    /// Pure existence check with no side effects.
    pub fn has_migrations_table(&self) -> Result<bool, MigrateError> {
        let count: i32 = self
            .conn
            .query_row(
                "SELECT COUNT(*) FROM sqlite_master WHERE type='table' AND name='schema_migrations'",
                [],
                |row| row.get(0),
            )
            .map_err(|e| MigrateError::Storage(format!("failed to check schema_migrations: {}", e)))?;
        Ok(count > 0)
    }

    /// The set of applied migration versions
    ///
    /// An absent or empty table yields an empty set, not an error.
    pub fn applied_versions(&self) -> Result<BTreeSet<u64>, MigrateError> {
        if !self.has_migrations_table()? {
            return Ok(BTreeSet::new());
        }

        let mut stmt = self
            .conn
            .prepare("SELECT version FROM schema_migrations")
            .map_err(|e| MigrateError::Storage(format!("failed to query applied versions: {}", e)))?;
        let rows = stmt
            .query_map([], |row| row.get::<_, u64>(0))
            .map_err(|e| MigrateError::Storage(format!("failed to query applied versions: {}", e)))?;

        let mut versions = BTreeSet::new();
        for row in rows {
            let version = row.map_err(|e| {
                MigrateError::Storage(format!("failed to read applied version: {}", e))
            })?;
            versions.insert(version);
        }
        Ok(versions)
    }

    /// The lowest applied version — the database's schema-creation snapshot point
    ///
    /// `None` when nothing has been applied (or the table is absent).
    pub fn origin_version(&self) -> Result<Option<u64>, MigrateError> {
        self.min_max("MIN")
    }

    /// The highest applied version — the database's present schema marker
    ///
    /// `None` when nothing has been applied (or the table is absent).
    pub fn current_version(&self) -> Result<Option<u64>, MigrateError> {
        self.min_max("MAX")
    }

    fn min_max(&self, func: &str) -> Result<Option<u64>, MigrateError> {
        if !self.has_migrations_table()? {
            return Ok(None);
        }

        // MIN/MAX over an empty table returns a NULL row.
        let query = format!("SELECT {}(version) FROM schema_migrations", func);
        self.conn
            .query_row(&query, [], |row| row.get::<_, Option<u64>>(0))
            .map_err(|e| MigrateError::Storage(format!("failed to query {} version: {}", func, e)))
    }

    /// Record one applied migration version
    ///
    /// A duplicate insert violates the UNIQUE constraint and surfaces as a
    /// storage error; it indicates a resolver/runner invariant breach and
    /// does not occur in normal operation.
    pub fn record_applied(&self, version: u64) -> Result<(), MigrateError> {
        self.conn
            .execute(
                "INSERT INTO schema_migrations (version) VALUES (?1)",
                [version],
            )
            .map_err(|e| {
                MigrateError::Storage(format!("failed to record version {}: {}", version, e))
            })?;
        Ok(())
    }
}
