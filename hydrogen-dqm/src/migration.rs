use std::collections::BTreeMap;

/// One migration's payloads. `reverse_sql` is absent for a migration that
/// was never given a rollback: not every id carries both.
#[derive(Clone, Debug)]
pub struct MigrationRecord {
    pub migration_id: i64,
    pub forward_sql: String,
    pub reverse_sql: Option<String>,
}

/// The migration content cache, keyed by migration id. Ids below 1000 are
/// reserved; 1000 is the conventional bootstrap entry.
#[derive(Default)]
pub struct MigrationCache {
    records: BTreeMap<i64, MigrationRecord>,
}

impl MigrationCache {
    pub fn new() -> Self {
        MigrationCache::default()
    }

    pub fn insert(&mut self, record: MigrationRecord) {
        self.records.insert(record.migration_id, record);
    }

    pub fn get(&self, id: i64) -> Option<&MigrationRecord> {
        self.records.get(&id)
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    /// `AVAILABLE`: the maximum forward migration id in the cache, or 0 if
    /// empty.
    pub fn available(&self) -> i64 {
        self.records.keys().next_back().copied().unwrap_or(0)
    }

    /// `query_cache_destroy`: releases every cached blob.
    pub fn destroy(&mut self) {
        self.records.clear();
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum MigrationAction {
    None,
    Load,
    Apply,
}

/// The reserved first-migration id; below this a database has never been
/// initialized.
pub const BOOTSTRAP_MIGRATION_ID: i64 = 1000;

/// The migration decision table, a pure function of the three counters.
/// `available`/`loaded`/`applied` are never negative in practice but the
/// table is defined over the full `i64` domain to keep the function total.
pub fn determine_migration_action(available: i64, loaded: i64, applied: i64) -> MigrationAction {
    if available == applied {
        return MigrationAction::None;
    }
    if available >= BOOTSTRAP_MIGRATION_ID && loaded < available.min(BOOTSTRAP_MIGRATION_ID) {
        return MigrationAction::Load;
    }
    if available >= BOOTSTRAP_MIGRATION_ID && loaded < available {
        return MigrationAction::Load;
    }
    if loaded > applied {
        return MigrationAction::Apply;
    }
    MigrationAction::None
}

/// Greatest `APPLIED` id whose reverse form exists in the cache, or 0 if the
/// cache is absent or nothing has been applied yet.
pub fn find_next_reverse_migration_to_apply(cache: Option<&MigrationCache>, applied: i64) -> i64 {
    let Some(cache) = cache else {
        return 0;
    };
    if applied <= 0 {
        return 0;
    }
    for id in (1..=applied).rev() {
        if let Some(record) = cache.get(id) {
            if record.reverse_sql.is_some() {
                return id;
            }
        }
    }
    0
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn migration_action_truth_table() {
        assert_eq!(determine_migration_action(1000, 1000, 1000), MigrationAction::None);
        assert_eq!(determine_migration_action(1000, 0, 0), MigrationAction::Load);
        assert_eq!(determine_migration_action(2000, 1000, 1000), MigrationAction::Load);
        assert_eq!(determine_migration_action(1000, 1000, 0), MigrationAction::Apply);
        assert_eq!(determine_migration_action(500, 500, 500), MigrationAction::None);
    }

    #[test]
    fn decision_is_deterministic_across_repeated_calls() {
        for &(a, l, p) in &[(1000, 1000, 1000), (1000, 0, 0), (2000, 1500, 1000)] {
            let first = determine_migration_action(a, l, p);
            let second = determine_migration_action(a, l, p);
            assert_eq!(first, second);
        }
    }

    #[test]
    fn reverse_lookup_skips_ids_without_a_reverse_payload() {
        let mut cache = MigrationCache::new();
        cache.insert(MigrationRecord {
            migration_id: 1000,
            forward_sql: "create table t (id int)".into(),
            reverse_sql: Some("drop table t".into()),
        });
        cache.insert(MigrationRecord {
            migration_id: 1001,
            forward_sql: "alter table t add column c int".into(),
            reverse_sql: None,
        });
        assert_eq!(find_next_reverse_migration_to_apply(Some(&cache), 1001), 1000);
    }

    #[test]
    fn reverse_lookup_is_zero_with_no_cache_or_nothing_applied() {
        assert_eq!(find_next_reverse_migration_to_apply(None, 500), 0);
        let cache = MigrationCache::new();
        assert_eq!(find_next_reverse_migration_to_apply(Some(&cache), 0), 0);
    }
}
