//! Transactional migration application
//!
//! The runner ties the pieces together: it resolves the pending set from the
//! catalog and the bookkeeping table, then applies each pending migration in
//! ascending version order inside its own transaction, recording the version
//! before the commit. Progress is reported through a callback and a
//! cooperative cancellation flag is checked at migration boundaries.
//!
//! Each migration's transaction is independent. Failure or cancellation
//! stops the run but never undoes previously committed migrations — partial
//! application is a valid terminal state, and a later run picks up where
//! this one stopped.
//!
//! A run is sequential; the caller is responsible for not overlapping runs
//! against the same database. The progress callback and cancel flag are the
//! only cross-thread signals and both are safe to share with another thread.
//!
//! # Example
//!
//! ```rust
//! use rusqlite::Connection;
//! use sqlstep::{MigrationRunner, MigrationSource, SqlFile};
//!
//! # fn main() -> Result<(), Box<dyn std::error::Error>> {
//! let conn = Connection::open_in_memory()?;
//!
//! let mut source = MigrationSource::new();
//! source.add_sql_files([SqlFile::new(
//!     "1_create_users.sql",
//!     "CREATE TABLE users (id INTEGER PRIMARY KEY, name TEXT NOT NULL)",
//! )]);
//!
//! let runner = MigrationRunner::new(&conn, source);
//! runner.migrate_all(None, None)?;
//!
//! assert_eq!(runner.current_version()?, Some(1));
//! # Ok(())
//! # }
//! ```

use anyhow::anyhow;
use rusqlite::Connection;
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tracing::{debug, info, warn};

use crate::error::MigrateError;
use crate::migration::{Migration, MigrationAction};
use crate::resolver;
use crate::source::MigrationSource;
use crate::store::VersionStore;

// =============================================================================
// Progress Tracking Types
// =============================================================================

/// Progress information for a migration run
#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum MigrateProgress {
    /// The run has started with a non-empty pending set
    Started {
        /// Number of migrations pending at the start of the run
        total: usize,
    },
    /// One migration was applied and committed
    Applied {
        /// Version of the migration just applied
        version: u64,
        /// Descriptive name of the migration, if any
        #[serde(skip_serializing_if = "Option::is_none")]
        name: Option<String>,
        /// Migrations applied so far in this run
        completed: usize,
        /// Migrations pending at the start of the run
        total: usize,
        /// Fraction complete, `completed / total`
        fraction: f64,
    },
    /// The run finished with every pending migration applied
    Completed {
        /// Number of migrations applied in this run
        applied: usize,
    },
}

/// Type alias for progress callback function
///
/// The callback receives [`MigrateProgress`] updates and can be used to
/// drive progress bars, logs, or UI updates from another thread.
pub type MigrateProgressCallback = Arc<dyn Fn(MigrateProgress) + Send + Sync>;

// =============================================================================
// Status Report
// =============================================================================

/// Read-only summary of a database's migration state
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MigrateStatus {
    /// Whether the bookkeeping table exists
    pub has_table: bool,
    /// Lowest applied version (the schema-creation snapshot point)
    pub origin_version: Option<u64>,
    /// Highest applied version (the present schema marker)
    pub current_version: Option<u64>,
    /// Number of applied migrations
    pub applied_count: usize,
    /// Versions still pending, ascending
    pub pending_versions: Vec<u64>,
}

// =============================================================================
// Runner
// =============================================================================

/// Applies pending migrations in order, one transaction per migration
pub struct MigrationRunner<'a> {
    conn: &'a Connection,
    source: MigrationSource,
}

impl<'a> MigrationRunner<'a> {
    /// Create a runner over the given connection and migration source
    pub fn new(conn: &'a Connection, source: MigrationSource) -> Self {
        Self { conn, source }
    }

    /// Apply all pending migrations up to and including `to_version`
    ///
    /// Ensures the bookkeeping table exists, resolves the pending set, and
    /// applies each pending migration in ascending version order inside its
    /// own transaction. After each successful transaction the applied
    /// version is recorded and a progress event is emitted.
    ///
    /// The cancel flag is checked once per migration boundary, never
    /// mid-transaction. On cancellation or failure, previously committed
    /// migrations stay committed and the run returns
    /// [`MigrateError::Cancelled`] or [`MigrateError::MigrationFailed`].
    /// An empty pending set is a successful no-op.
    pub fn migrate(
        &self,
        to_version: u64,
        progress: Option<MigrateProgressCallback>,
        cancel: Option<Arc<AtomicBool>>,
    ) -> Result<(), MigrateError> {
        let store = VersionStore::new(self.conn);
        store.ensure_migrations_table()?;

        let catalog = self.source.all_migrations()?;
        let applied = store.applied_versions()?;
        let origin = store.origin_version()?;
        let pending = resolver::pending_up_to(catalog, &applied, origin, to_version);

        let total = pending.len();
        if total == 0 {
            debug!("no pending migrations, nothing to do");
            if let Some(cb) = &progress {
                cb(MigrateProgress::Completed { applied: 0 });
            }
            return Ok(());
        }

        info!("migration run started: {} pending", total);
        if let Some(cb) = &progress {
            cb(MigrateProgress::Started { total });
        }

        for (completed, migration) in pending.into_iter().enumerate() {
            if let Some(flag) = &cancel {
                if flag.load(Ordering::SeqCst) {
                    info!(
                        "migration run cancelled after {} of {} migrations",
                        completed, total
                    );
                    return Err(MigrateError::Cancelled {
                        applied: completed,
                        total,
                    });
                }
            }

            self.apply_one(&store, &migration)?;

            let completed = completed + 1;
            if let Some(cb) = &progress {
                cb(MigrateProgress::Applied {
                    version: migration.version(),
                    name: migration.name().map(str::to_string),
                    completed,
                    total,
                    fraction: completed as f64 / total as f64,
                });
            }
        }

        info!("migration run complete: {} applied", total);
        if let Some(cb) = &progress {
            cb(MigrateProgress::Completed { applied: total });
        }
        Ok(())
    }

    /// Apply all pending migrations with no version bound
    pub fn migrate_all(
        &self,
        progress: Option<MigrateProgressCallback>,
        cancel: Option<Arc<AtomicBool>>,
    ) -> Result<(), MigrateError> {
        self.migrate(u64::MAX, progress, cancel)
    }

    /// Apply a single migration inside its own transaction
    ///
    /// The bookkeeping row is written through the same transaction (the
    /// store shares this connection), so the migration and its record commit
    /// or roll back together. Dropping the transaction on an early return
    /// rolls it back.
    fn apply_one(&self, store: &VersionStore<'_>, migration: &Migration) -> Result<(), MigrateError> {
        info!("applying migration {}", migration.describe());

        let tx = self.conn.unchecked_transaction().map_err(|e| {
            MigrateError::Storage(format!(
                "failed to begin transaction for migration {}: {}",
                migration.version(),
                e
            ))
        })?;

        let result = match migration.action() {
            MigrationAction::Sql(sql) => tx.execute_batch(sql).map_err(|e| anyhow!(e)),
            MigrationAction::Code(code) => code.apply(&tx),
        };

        if let Err(cause) = result {
            if let Err(e) = tx.rollback() {
                warn!(
                    "rollback after failed migration {} also failed: {}",
                    migration.version(),
                    e
                );
            }
            return Err(MigrateError::MigrationFailed {
                version: migration.version(),
                name: migration.name().map(str::to_string),
                source: cause,
            });
        }

        store.record_applied(migration.version())?;

        tx.commit().map_err(|e| {
            MigrateError::Storage(format!(
                "failed to commit migration {}: {}",
                migration.version(),
                e
            ))
        })?;

        Ok(())
    }

    // =========================================================================
    // Introspection (read-only, side-effect-free)
    // =========================================================================

    /// Whether the bookkeeping table exists
    pub fn has_migrations_table(&self) -> Result<bool, MigrateError> {
        VersionStore::new(self.conn).has_migrations_table()
    }

    /// Lowest applied version, `None` when nothing has been applied
    pub fn origin_version(&self) -> Result<Option<u64>, MigrateError> {
        VersionStore::new(self.conn).origin_version()
    }

    /// Highest applied version, `None` when nothing has been applied
    pub fn current_version(&self) -> Result<Option<u64>, MigrateError> {
        VersionStore::new(self.conn).current_version()
    }

    /// The set of applied versions
    pub fn applied_versions(&self) -> Result<BTreeSet<u64>, MigrateError> {
        VersionStore::new(self.conn).applied_versions()
    }

    /// The full validated catalog, ascending by version
    pub fn all_migrations(&self) -> Result<Vec<Migration>, MigrateError> {
        self.source.all_migrations()
    }

    /// Versions still pending for this database, ascending
    pub fn pending_versions(&self) -> Result<Vec<u64>, MigrateError> {
        let store = VersionStore::new(self.conn);
        let catalog = self.source.all_migrations()?;
        let applied = store.applied_versions()?;
        let origin = store.origin_version()?;
        let pending = resolver::pending_migrations(catalog, &applied, origin);
        Ok(pending.into_iter().map(|m| m.version()).collect())
    }

    /// Summary of the database's migration state
    pub fn status(&self) -> Result<MigrateStatus, MigrateError> {
        let store = VersionStore::new(self.conn);
        let applied = store.applied_versions()?;
        Ok(MigrateStatus {
            has_table: store.has_migrations_table()?,
            origin_version: applied.first().copied(),
            current_version: applied.last().copied(),
            applied_count: applied.len(),
            pending_versions: self.pending_versions()?,
        })
    }
}
