//! Migration catalog resolution
//!
//! The catalog of known migrations comes from two origins: SQL scripts whose
//! filenames encode their version, and code migrations registered explicitly
//! by the embedding application. This module parses the filename grammar,
//! runs both discovery passes, and validates that no version is claimed
//! twice.
//!
//! # Filename grammar
//!
//! `^(\d+)(?:_(.*))?\.sql$` — a mandatory leading decimal version, an
//! optional `_`-delimited descriptive name, and a mandatory `.sql` suffix.
//! Filenames that do not match are silently skipped: they are not migration
//! files, and skipping them is expected behavior rather than an error.

use std::collections::BTreeMap;
use std::sync::Arc;
use tracing::debug;

use crate::error::MigrateError;
use crate::migration::{CodeMigration, CodeMigrationRegistry, Migration};

/// A candidate SQL migration file supplied by an external enumerator
///
/// Only the flat file name is inspected; directory structure is the
/// enumerator's concern.
#[derive(Debug, Clone)]
pub struct SqlFile {
    /// Flat file name, e.g. `"20240105_create_users.sql"`
    pub file_name: String,
    /// The script text, executed verbatim when the migration applies
    pub sql: String,
}

impl SqlFile {
    /// Convenience constructor
    pub fn new(file_name: impl Into<String>, sql: impl Into<String>) -> Self {
        Self {
            file_name: file_name.into(),
            sql: sql.into(),
        }
    }
}

/// Parse a migration filename into its version and optional name
///
/// Returns `None` when the name does not match the grammar: no `.sql`
/// suffix, no leading digits, or a version that overflows `u64`. An empty
/// descriptive name (`"7_.sql"`) is kept as `Some("")`, matching the grammar
/// capture exactly.
pub fn parse_migration_filename(file_name: &str) -> Option<(u64, Option<String>)> {
    let stem = file_name.strip_suffix(".sql")?;

    let digits_end = stem
        .char_indices()
        .find(|(_, c)| !c.is_ascii_digit())
        .map(|(i, _)| i)
        .unwrap_or(stem.len());
    if digits_end == 0 {
        return None;
    }

    // Overflow disqualifies the file rather than erroring.
    let version: u64 = stem[..digits_end].parse().ok()?;

    let rest = &stem[digits_end..];
    let name = if rest.is_empty() {
        None
    } else if let Some(name) = rest.strip_prefix('_') {
        Some(name.to_string())
    } else {
        // Digits followed by something other than `_` (e.g. "12abc.sql")
        return None;
    };

    Some((version, name))
}

/// Resolves the full catalog of known migrations
///
/// Holds the SQL file list and the code-migration registry, and produces the
/// validated, version-sorted catalog on demand.
#[derive(Debug, Default)]
pub struct MigrationSource {
    sql_files: Vec<SqlFile>,
    registry: CodeMigrationRegistry,
}

impl MigrationSource {
    /// Create an empty source
    pub fn new() -> Self {
        Self {
            sql_files: Vec::new(),
            registry: CodeMigrationRegistry::new(),
        }
    }

    /// Add candidate SQL migration files
    ///
    /// Non-matching filenames are skipped at resolution time; adding them
    /// here is harmless.
    pub fn add_sql_files(&mut self, files: impl IntoIterator<Item = SqlFile>) -> &mut Self {
        self.sql_files.extend(files);
        self
    }

    /// Register a code migration
    pub fn register_code(&mut self, migration: Arc<dyn CodeMigration>) -> &mut Self {
        self.registry.register(migration);
        self
    }

    /// Discovery pass over the SQL file list
    ///
    /// One [`Migration`] per filename matching the grammar; the rest are
    /// skipped with a debug trace.
    pub fn discover_sql_migrations(&self) -> Vec<Migration> {
        let mut found = Vec::new();
        for file in &self.sql_files {
            match parse_migration_filename(&file.file_name) {
                Some((version, name)) => {
                    found.push(Migration::sql(version, name, file.sql.clone()));
                }
                None => {
                    debug!(
                        "skipping '{}': not a migration filename",
                        file.file_name
                    );
                }
            }
        }
        found
    }

    /// Discovery pass over the code-migration registry
    pub fn discover_code_migrations(&self) -> Vec<Migration> {
        self.registry
            .entries()
            .iter()
            .map(|m| Migration::code(m.clone()))
            .collect()
    }

    /// The full catalog: both discovery passes, sorted ascending by version
    ///
    /// Fails with [`MigrateError::DuplicateVersion`] when two migrations
    /// (from either origin, or one from each) claim the same version.
    pub fn all_migrations(&self) -> Result<Vec<Migration>, MigrateError> {
        let mut by_version: BTreeMap<u64, Migration> = BTreeMap::new();

        let discovered = self
            .discover_sql_migrations()
            .into_iter()
            .chain(self.discover_code_migrations());

        for migration in discovered {
            let version = migration.version();
            if let Some(existing) = by_version.get(&version) {
                return Err(MigrateError::DuplicateVersion {
                    version,
                    first: existing.describe(),
                    second: migration.describe(),
                });
            }
            by_version.insert(version, migration);
        }

        Ok(by_version.into_values().collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use anyhow::Result;
    use rusqlite::Connection;

    struct Stub {
        name: &'static str,
        version: u64,
    }

    impl CodeMigration for Stub {
        fn name(&self) -> &str {
            self.name
        }

        fn version(&self) -> u64 {
            self.version
        }

        fn apply(&self, _conn: &Connection) -> Result<()> {
            Ok(())
        }
    }

    #[test]
    fn test_parse_version_only() {
        assert_eq!(parse_migration_filename("1.sql"), Some((1, None)));
    }

    #[test]
    fn test_parse_version_and_name() {
        assert_eq!(
            parse_migration_filename("201406063106474_create_schema.sql"),
            Some((201406063106474, Some("create_schema".to_string())))
        );
    }

    #[test]
    fn test_parse_name_with_underscores() {
        assert_eq!(
            parse_migration_filename("42_add_user_email_index.sql"),
            Some((42, Some("add_user_email_index".to_string())))
        );
    }

    #[test]
    fn test_parse_empty_name_kept() {
        assert_eq!(
            parse_migration_filename("7_.sql"),
            Some((7, Some(String::new())))
        );
    }

    #[test]
    fn test_parse_rejects_non_numeric_prefix() {
        assert_eq!(parse_migration_filename("not_a_number.sql"), None);
    }

    #[test]
    fn test_parse_rejects_missing_suffix() {
        assert_eq!(parse_migration_filename("9999_ChangeFormat"), None);
    }

    #[test]
    fn test_parse_rejects_digits_glued_to_text() {
        assert_eq!(parse_migration_filename("12abc.sql"), None);
    }

    #[test]
    fn test_parse_rejects_overflow() {
        // One past u64::MAX
        assert_eq!(parse_migration_filename("18446744073709551616.sql"), None);
    }

    #[test]
    fn test_parse_accepts_u64_max() {
        assert_eq!(
            parse_migration_filename("18446744073709551615.sql"),
            Some((u64::MAX, None))
        );
    }

    #[test]
    fn test_parse_rejects_uppercase_suffix() {
        assert_eq!(parse_migration_filename("1.SQL"), None);
    }

    #[test]
    fn test_discovery_skips_non_matching_files() {
        let mut source = MigrationSource::new();
        source.add_sql_files([
            SqlFile::new("1_init.sql", "CREATE TABLE a (id INTEGER)"),
            SqlFile::new("README.md", "# not sql"),
            SqlFile::new("helper.sql", "-- shared helper, no version"),
        ]);

        let found = source.discover_sql_migrations();
        assert_eq!(found.len(), 1);
        assert_eq!(found[0].version(), 1);
    }

    #[test]
    fn test_all_migrations_sorted_across_origins() {
        let mut source = MigrationSource::new();
        source.add_sql_files([
            SqlFile::new("3_third.sql", ""),
            SqlFile::new("1_first.sql", ""),
        ]);
        source.register_code(Arc::new(Stub {
            name: "second",
            version: 2,
        }));

        let catalog = source.all_migrations().unwrap();
        let versions: Vec<u64> = catalog.iter().map(|m| m.version()).collect();
        assert_eq!(versions, vec![1, 2, 3]);
    }

    #[test]
    fn test_duplicate_version_within_files() {
        let mut source = MigrationSource::new();
        source.add_sql_files([
            SqlFile::new("42_a.sql", ""),
            SqlFile::new("42_b.sql", ""),
        ]);

        let err = source.all_migrations().unwrap_err();
        assert!(matches!(
            err,
            MigrateError::DuplicateVersion { version: 42, .. }
        ));
    }

    #[test]
    fn test_duplicate_version_across_origins() {
        let mut source = MigrationSource::new();
        source.add_sql_files([SqlFile::new("42_file.sql", "")]);
        source.register_code(Arc::new(Stub {
            name: "code",
            version: 42,
        }));

        let err = source.all_migrations().unwrap_err();
        match err {
            MigrateError::DuplicateVersion {
                version,
                first,
                second,
            } => {
                assert_eq!(version, 42);
                assert!(first.contains("file"));
                assert!(second.contains("code"));
            }
            other => panic!("expected DuplicateVersion, got {}", other),
        }
    }
}
