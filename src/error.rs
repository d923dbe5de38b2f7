//! Error types for migration resolution and application
//!
//! Every failure mode of the engine maps onto one variant here, with enough
//! context (failing version, name, underlying cause) to diagnose without
//! re-running. Filenames that simply do not look like migration files are not
//! errors and never surface here.

use std::fmt;

/// Errors produced by catalog resolution, version bookkeeping, and migration runs
#[derive(Debug)]
pub enum MigrateError {
    /// The bookkeeping table could not be created or queried
    ///
    /// Indicates the underlying database is unreachable or the DDL/query
    /// failed for a reason other than "already exists".
    Storage(String),

    /// Two migrations in the catalog share the same version
    ///
    /// This is a catalog integrity violation and is fatal: the authoring
    /// problem must be fixed before any migration can be applied.
    DuplicateVersion {
        /// The version claimed by both migrations
        version: u64,
        /// Description of the first migration claiming the version
        first: String,
        /// Description of the second migration claiming the version
        second: String,
    },

    /// A specific migration's SQL or code action failed
    ///
    /// The run halts at this migration; previously committed migrations stay
    /// committed.
    MigrationFailed {
        /// Version of the failing migration
        version: u64,
        /// Descriptive name of the failing migration, if it has one
        name: Option<String>,
        /// The underlying failure
        source: anyhow::Error,
    },

    /// A cooperative stop was requested between migrations
    ///
    /// Not a failure of any migration. Migrations applied before the stop
    /// remain committed.
    Cancelled {
        /// Number of pending migrations applied before the stop
        applied: usize,
        /// Number of migrations pending when the run started
        total: usize,
    },
}

impl fmt::Display for MigrateError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            MigrateError::Storage(msg) => write!(f, "storage error: {}", msg),
            MigrateError::DuplicateVersion {
                version,
                first,
                second,
            } => write!(
                f,
                "duplicate migration version {}: {} and {}",
                version, first, second
            ),
            MigrateError::MigrationFailed {
                version,
                name,
                source,
            } => match name {
                Some(name) => write!(
                    f,
                    "migration {} ({}) failed: {}",
                    version, name, source
                ),
                None => write!(f, "migration {} failed: {}", version, source),
            },
            MigrateError::Cancelled { applied, total } => write!(
                f,
                "migration run cancelled after {} of {} migrations",
                applied, total
            ),
        }
    }
}

impl std::error::Error for MigrateError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            MigrateError::MigrationFailed { source, .. } => Some(source.as_ref()),
            _ => None,
        }
    }
}
