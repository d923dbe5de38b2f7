//! Pending-set computation
//!
//! Pure functions from the catalog and the applied-version set to the
//! ordered list of migrations still to run. Nothing here touches the
//! database.

use std::collections::BTreeSet;

use crate::migration::Migration;

/// Compute the pending migrations for a database
///
/// Starting from the full catalog:
/// 1. When `origin` is present, any catalog migration whose version is
///    strictly below it is discarded. Such migrations predate the database's
///    own creation point and are presumed already reflected in the schema
///    snapshot it was created from — this keeps merged branches from
///    retroactively demanding old migrations of newer databases.
/// 2. Migrations whose version is already in `applied` are removed.
/// 3. The remainder is sorted ascending by version.
///
/// The origin cutoff is applied exactly as stated: if the database's lowest
/// recorded version is itself a gap (the first recorded migration is not the
/// earliest authored one), older unapplied migrations stay hidden. Consumers
/// depend on this for branch-merge workflows, so it is not second-guessed
/// here.
pub fn pending_migrations(
    catalog: Vec<Migration>,
    applied: &BTreeSet<u64>,
    origin: Option<u64>,
) -> Vec<Migration> {
    pending_up_to(catalog, applied, origin, u64::MAX)
}

/// Pending migrations bounded by a target version
///
/// Same as [`pending_migrations`], additionally discarding migrations with
/// version above `up_to`. Passing `u64::MAX` means "migrate fully"; lower
/// targets support staged rollout and testing against an intermediate
/// schema.
pub fn pending_up_to(
    catalog: Vec<Migration>,
    applied: &BTreeSet<u64>,
    origin: Option<u64>,
    up_to: u64,
) -> Vec<Migration> {
    let mut pending: Vec<Migration> = catalog
        .into_iter()
        .filter(|m| origin.map_or(true, |o| m.version() >= o))
        .filter(|m| !applied.contains(&m.version()))
        .filter(|m| m.version() <= up_to)
        .collect();
    pending.sort_by_key(|m| m.version());
    pending
}

#[cfg(test)]
mod tests {
    use super::*;

    fn catalog(versions: &[u64]) -> Vec<Migration> {
        versions
            .iter()
            .map(|&v| Migration::sql(v, None, String::new()))
            .collect()
    }

    fn versions_of(pending: &[Migration]) -> Vec<u64> {
        pending.iter().map(|m| m.version()).collect()
    }

    #[test]
    fn test_no_origin_is_plain_set_difference() {
        let applied = BTreeSet::from([2, 4]);
        let pending = pending_migrations(catalog(&[1, 2, 3, 4, 5]), &applied, None);
        assert_eq!(versions_of(&pending), vec![1, 3, 5]);
    }

    #[test]
    fn test_output_sorted_regardless_of_catalog_order() {
        let applied = BTreeSet::new();
        let pending = pending_migrations(catalog(&[3, 1, 2]), &applied, None);
        assert_eq!(versions_of(&pending), vec![1, 2, 3]);
    }

    #[test]
    fn test_origin_cutoff_excludes_older_versions() {
        // Version 1 predates the database's origin and is never demanded,
        // applied or not.
        let applied = BTreeSet::from([2]);
        let pending = pending_migrations(catalog(&[1, 2, 3]), &applied, Some(2));
        assert_eq!(versions_of(&pending), vec![3]);
    }

    #[test]
    fn test_origin_gap_hides_unapplied_older_migration() {
        // Documented behavior: origin 5 hides version 3 even though 3 was
        // never recorded as applied.
        let applied = BTreeSet::from([5]);
        let pending = pending_migrations(catalog(&[3, 5, 7]), &applied, Some(5));
        assert_eq!(versions_of(&pending), vec![7]);
    }

    #[test]
    fn test_origin_boundary_is_inclusive() {
        let applied = BTreeSet::new();
        let pending = pending_migrations(catalog(&[4, 5, 6]), &applied, Some(5));
        assert_eq!(versions_of(&pending), vec![5, 6]);
    }

    #[test]
    fn test_up_to_bounds_the_target() {
        let applied = BTreeSet::new();
        let pending = pending_up_to(catalog(&[1, 2, 3, 4]), &applied, None, 2);
        assert_eq!(versions_of(&pending), vec![1, 2]);
    }

    #[test]
    fn test_up_to_max_means_fully() {
        let applied = BTreeSet::new();
        let pending = pending_up_to(catalog(&[1, u64::MAX]), &applied, None, u64::MAX);
        assert_eq!(versions_of(&pending), vec![1, u64::MAX]);
    }

    #[test]
    fn test_everything_applied_yields_empty() {
        let applied = BTreeSet::from([1, 2, 3]);
        let pending = pending_migrations(catalog(&[1, 2, 3]), &applied, None);
        assert!(pending.is_empty());
    }
}
