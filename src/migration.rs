//! Migration entity and code-migration registry
//!
//! A [`Migration`] is the unit of work the engine applies: a version, an
//! optional descriptive name, and an action. The action is either raw SQL
//! text executed verbatim or a registered [`CodeMigration`] implementation
//! invoked against the live connection.

use anyhow::Result;
use rusqlite::Connection;
use std::fmt;
use std::sync::Arc;

/// A schema change that runs as Rust code instead of a SQL script
///
/// Implementations are registered explicitly into a [`CodeMigrationRegistry`]
/// at startup. Each contributes one catalog entry alongside the file-based
/// SQL migrations and is applied inside the same per-migration transaction
/// discipline.
///
/// # Example
///
/// ```rust
/// use anyhow::Result;
/// use rusqlite::Connection;
/// use sqlstep::CodeMigration;
///
/// struct BackfillSlugs;
///
/// impl CodeMigration for BackfillSlugs {
///     fn name(&self) -> &str {
///         "backfill_slugs"
///     }
///
///     fn version(&self) -> u64 {
///         20240105
///     }
///
///     fn apply(&self, conn: &Connection) -> Result<()> {
///         conn.execute("UPDATE posts SET slug = lower(title)", [])?;
///         Ok(())
///     }
/// }
/// ```
pub trait CodeMigration: Send + Sync {
    /// Descriptive name of this migration
    fn name(&self) -> &str;

    /// Version of this migration (unique across the whole catalog)
    fn version(&self) -> u64;

    /// Apply the migration against the live database handle
    ///
    /// Runs inside a transaction scoped to this migration; returning an
    /// error rolls that transaction back.
    fn apply(&self, conn: &Connection) -> Result<()>;
}

/// Explicit registry of code-based migrations
///
/// Replaces runtime discovery: every code migration is registered here by
/// the embedding application before a run starts.
#[derive(Default)]
pub struct CodeMigrationRegistry {
    entries: Vec<Arc<dyn CodeMigration>>,
}

impl CodeMigrationRegistry {
    /// Create an empty registry
    pub fn new() -> Self {
        Self {
            entries: Vec::new(),
        }
    }

    /// Register a code migration
    pub fn register(&mut self, migration: Arc<dyn CodeMigration>) -> &mut Self {
        self.entries.push(migration);
        self
    }

    /// Registered migrations, in registration order
    pub fn entries(&self) -> &[Arc<dyn CodeMigration>] {
        &self.entries
    }

    /// Number of registered migrations
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Whether the registry is empty
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

impl fmt::Debug for CodeMigrationRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CodeMigrationRegistry")
            .field("len", &self.entries.len())
            .finish()
    }
}

/// The executable action of a migration
#[derive(Clone)]
pub enum MigrationAction {
    /// Raw SQL text, executed verbatim as a batch
    Sql(String),

    /// A registered code migration, invoked against the live connection
    Code(Arc<dyn CodeMigration>),
}

impl fmt::Debug for MigrationAction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            MigrationAction::Sql(sql) => f.debug_tuple("Sql").field(&sql.len()).finish(),
            MigrationAction::Code(m) => f.debug_tuple("Code").field(&m.name()).finish(),
        }
    }
}

/// One versioned unit of schema change
///
/// Immutable once constructed at catalog-resolution time. Identity is the
/// version; two migrations sharing a version is a catalog error caught
/// during resolution.
#[derive(Debug, Clone)]
pub struct Migration {
    version: u64,
    name: Option<String>,
    action: MigrationAction,
}

impl Migration {
    /// Create a SQL migration from a parsed filename and its script text
    pub fn sql(version: u64, name: Option<String>, sql: String) -> Self {
        Self {
            version,
            name,
            action: MigrationAction::Sql(sql),
        }
    }

    /// Create a migration backed by a registered code implementation
    pub fn code(migration: Arc<dyn CodeMigration>) -> Self {
        Self {
            version: migration.version(),
            name: Some(migration.name().to_string()),
            action: MigrationAction::Code(migration),
        }
    }

    /// The migration's version (its identity)
    pub fn version(&self) -> u64 {
        self.version
    }

    /// The migration's descriptive name, if any
    pub fn name(&self) -> Option<&str> {
        self.name.as_deref()
    }

    /// The migration's executable action
    pub fn action(&self) -> &MigrationAction {
        &self.action
    }

    /// Human-readable label for logs and error messages
    pub fn describe(&self) -> String {
        match &self.name {
            Some(name) if !name.is_empty() => format!("{} ({})", self.version, name),
            _ => self.version.to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct Noop {
        version: u64,
    }

    impl CodeMigration for Noop {
        fn name(&self) -> &str {
            "noop"
        }

        fn version(&self) -> u64 {
            self.version
        }

        fn apply(&self, _conn: &Connection) -> Result<()> {
            Ok(())
        }
    }

    #[test]
    fn test_sql_migration_fields() {
        let m = Migration::sql(7, Some("create_users".to_string()), "CREATE TABLE users (id INTEGER)".to_string());
        assert_eq!(m.version(), 7);
        assert_eq!(m.name(), Some("create_users"));
        assert!(matches!(m.action(), MigrationAction::Sql(_)));
    }

    #[test]
    fn test_code_migration_takes_identity_from_impl() {
        let m = Migration::code(Arc::new(Noop { version: 12 }));
        assert_eq!(m.version(), 12);
        assert_eq!(m.name(), Some("noop"));
        assert!(matches!(m.action(), MigrationAction::Code(_)));
    }

    #[test]
    fn test_registry_register_and_enumerate() {
        let mut registry = CodeMigrationRegistry::new();
        assert!(registry.is_empty());

        registry.register(Arc::new(Noop { version: 1 }));
        registry.register(Arc::new(Noop { version: 2 }));

        assert_eq!(registry.len(), 2);
        let versions: Vec<u64> = registry.entries().iter().map(|m| m.version()).collect();
        assert_eq!(versions, vec![1, 2]);
    }

    #[test]
    fn test_describe() {
        let named = Migration::sql(3, Some("add_index".to_string()), String::new());
        assert_eq!(named.describe(), "3 (add_index)");

        let anonymous = Migration::sql(4, None, String::new());
        assert_eq!(anonymous.describe(), "4");
    }
}
