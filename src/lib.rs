#![deny(clippy::unwrap_used)]
#![deny(clippy::expect_used)]

//! sqlstep - versioned SQL schema migrations
//!
//! sqlstep tracks and applies versioned schema migrations to a SQLite
//! database. It resolves the catalog of known migrations from two origins
//! (filename-encoded SQL scripts and explicitly registered code migrations),
//! computes which of them are still pending for a given database, and
//! applies the pending ones in ascending version order, one transaction per
//! migration, with progress reporting and cooperative cancellation.
//!
//! # Architecture
//!
//! - **[`source`]**: catalog resolution — filename grammar parsing, the
//!   code-migration registry, duplicate-version validation
//! - **[`store`]**: bookkeeping over the `schema_migrations` table
//!   (applied set, origin/current version)
//! - **[`resolver`]**: pure pending-set computation with the origin-version
//!   cutoff and target bound
//! - **[`runner`]**: transactional application, progress events,
//!   cancellation, and the read-only introspection surface
//! - **[`migration`]**: the migration entity and the [`CodeMigration`]
//!   capability trait
//! - **[`error`]**: the [`MigrateError`] taxonomy
//!
//! # Quick Start
//!
//! ```rust
//! use rusqlite::Connection;
//! use sqlstep::{MigrationRunner, MigrationSource, SqlFile};
//!
//! # fn main() -> Result<(), Box<dyn std::error::Error>> {
//! let conn = Connection::open_in_memory()?;
//!
//! // Filenames come from an external enumerator (directory scan, embedded
//! // bundle, ...); sqlstep only looks at the flat names.
//! let mut source = MigrationSource::new();
//! source.add_sql_files([
//!     SqlFile::new(
//!         "1_create_users.sql",
//!         "CREATE TABLE users (id INTEGER PRIMARY KEY, name TEXT NOT NULL)",
//!     ),
//!     SqlFile::new(
//!         "2_add_email.sql",
//!         "ALTER TABLE users ADD COLUMN email TEXT",
//!     ),
//! ]);
//!
//! let runner = MigrationRunner::new(&conn, source);
//! runner.migrate_all(None, None)?;
//!
//! assert_eq!(runner.current_version()?, Some(2));
//! # Ok(())
//! # }
//! ```
//!
//! # Progress and cancellation
//!
//! ```rust
//! use std::sync::atomic::AtomicBool;
//! use std::sync::Arc;
//! use rusqlite::Connection;
//! use sqlstep::{MigrateProgress, MigrateProgressCallback, MigrationRunner, MigrationSource};
//!
//! # fn main() -> Result<(), Box<dyn std::error::Error>> {
//! let conn = Connection::open_in_memory()?;
//! let runner = MigrationRunner::new(&conn, MigrationSource::new());
//!
//! let progress: MigrateProgressCallback = Arc::new(|event| {
//!     if let MigrateProgress::Applied { version, fraction, .. } = event {
//!         println!("applied {} ({:.0}%)", version, fraction * 100.0);
//!     }
//! });
//! let cancel = Arc::new(AtomicBool::new(false));
//!
//! // The flag is checked between migrations, never mid-transaction.
//! runner.migrate_all(Some(progress), Some(cancel))?;
//! # Ok(())
//! # }
//! ```

pub mod error;
pub mod migration;
pub mod resolver;
pub mod runner;
pub mod source;
pub mod store;

pub use error::MigrateError;
pub use migration::{CodeMigration, CodeMigrationRegistry, Migration, MigrationAction};
pub use runner::{MigrateProgress, MigrateProgressCallback, MigrateStatus, MigrationRunner};
pub use source::{parse_migration_filename, MigrationSource, SqlFile};
pub use store::VersionStore;
