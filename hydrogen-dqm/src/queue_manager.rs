use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, RwLock};
use std::time::Duration;

use hydrogen_db_core::HydrogenError;

use crate::database_queue::DatabaseQueue;

/// Per-database counters maintained under the manager's lock.
#[derive(Default)]
struct QueueStats {
    selection_count: AtomicU64,
    submitted: AtomicU64,
}

/// Process-wide index of Database Queues keyed by database name, plus
/// aggregate totals. `increment_queue_selection` is a bounds-checked no-op
/// out of range, with the bound simply `queues.len()` since the index is a
/// `Vec`, not a fixed-size array.
pub struct QueueManager {
    queues: RwLock<Vec<(Arc<DatabaseQueue>, QueueStats)>>,
    total_submitted: AtomicU64,
    total_completed: AtomicU64,
    total_failed: AtomicU64,
    total_timeouts: AtomicU64,
}

impl Default for QueueManager {
    fn default() -> Self {
        QueueManager {
            queues: RwLock::new(Vec::new()),
            total_submitted: AtomicU64::new(0),
            total_completed: AtomicU64::new(0),
            total_failed: AtomicU64::new(0),
            total_timeouts: AtomicU64::new(0),
        }
    }
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct QueueManagerAggregates {
    pub total_submitted: u64,
    pub total_completed: u64,
    pub total_failed: u64,
    pub total_timeouts: u64,
}

impl QueueManager {
    pub fn new() -> Self {
        QueueManager::default()
    }

    /// `add(queue)`: rejects a duplicate `database_name`.
    pub fn add(&self, queue: Arc<DatabaseQueue>) -> Result<usize, HydrogenError> {
        let mut queues = self.queues.write().expect("queue manager lock poisoned");
        if queues.iter().any(|(q, _)| q.database_name() == queue.database_name()) {
            return Err(HydrogenError::invalid_argument(format!(
                "database already registered: {}",
                queue.database_name()
            )));
        }
        queues.push((queue, QueueStats::default()));
        Ok(queues.len() - 1)
    }

    /// `get(name)`: linear scan by name.
    pub fn get(&self, name: &str) -> Option<Arc<DatabaseQueue>> {
        self.queues
            .read()
            .expect("queue manager lock poisoned")
            .iter()
            .find(|(q, _)| q.database_name() == name)
            .map(|(q, _)| q.clone())
    }

    pub fn len(&self) -> usize {
        self.queues.read().expect("queue manager lock poisoned").len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// A snapshot of every registered queue, for callers (the launch/landing
    /// gate's Database subsystem) that need to scan all of them rather than
    /// look one up by name.
    pub fn all(&self) -> Vec<Arc<DatabaseQueue>> {
        self.queues
            .read()
            .expect("queue manager lock poisoned")
            .iter()
            .map(|(q, _)| q.clone())
            .collect()
    }

    /// Out-of-range `idx` is a silent no-op.
    pub fn increment_queue_selection(&self, idx: usize) {
        let queues = self.queues.read().expect("queue manager lock poisoned");
        if let Some((_, stats)) = queues.get(idx) {
            stats.selection_count.fetch_add(1, Ordering::SeqCst);
            stats.submitted.fetch_add(1, Ordering::SeqCst);
            self.total_submitted.fetch_add(1, Ordering::SeqCst);
        }
    }

    pub fn selection_count(&self, idx: usize) -> u64 {
        self.queues
            .read()
            .expect("queue manager lock poisoned")
            .get(idx)
            .map(|(_, stats)| stats.selection_count.load(Ordering::SeqCst))
            .unwrap_or(0)
    }

    pub fn record_completed(&self) {
        self.total_completed.fetch_add(1, Ordering::SeqCst);
    }

    pub fn record_failed(&self) {
        self.total_failed.fetch_add(1, Ordering::SeqCst);
    }

    pub fn record_timeout(&self) {
        self.total_timeouts.fetch_add(1, Ordering::SeqCst);
    }

    /// `init_stats`: zeros every aggregate and per-queue counter.
    pub fn init_stats(&self) {
        self.total_submitted.store(0, Ordering::SeqCst);
        self.total_completed.store(0, Ordering::SeqCst);
        self.total_failed.store(0, Ordering::SeqCst);
        self.total_timeouts.store(0, Ordering::SeqCst);
        for (_, stats) in self.queues.read().expect("queue manager lock poisoned").iter() {
            stats.selection_count.store(0, Ordering::SeqCst);
            stats.submitted.store(0, Ordering::SeqCst);
        }
    }

    pub fn aggregates(&self) -> QueueManagerAggregates {
        QueueManagerAggregates {
            total_submitted: self.total_submitted.load(Ordering::SeqCst),
            total_completed: self.total_completed.load(Ordering::SeqCst),
            total_failed: self.total_failed.load(Ordering::SeqCst),
            total_timeouts: self.total_timeouts.load(Ordering::SeqCst),
        }
    }

    /// Scans every registered queue's oldest in-flight query age: each
    /// queue reports the age of whatever it most recently dequeued relative
    /// to `now`, and the manager reduces those to a maximum. Returns zero if
    /// no queue is registered.
    pub fn find_max_query_age_across_queues(&self) -> Duration {
        let queues = self.queues.read().expect("queue manager lock poisoned");
        queues
            .iter()
            .filter_map(|(q, _)| q.oldest_in_flight_query_age())
            .max()
            .unwrap_or_default()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pool::ConnectionPool;
    use hydrogen_db_core::test_support::MockAdapter;
    use hydrogen_db_core::{ConnectionConfig, EngineAdapter, EngineKind};
    use std::time::Duration as StdDuration;

    fn queue(name: &str) -> Arc<DatabaseQueue> {
        let adapter: Arc<dyn EngineAdapter> = Arc::new(MockAdapter::new(EngineKind::Sqlite));
        let pool = Arc::new(ConnectionPool::new(name, adapter, ConnectionConfig::default(), 2));
        Arc::new(DatabaseQueue::new_lead(name, ":memory:", 4, StdDuration::from_secs(30), pool))
    }

    #[test]
    fn add_rejects_duplicate_database_names() {
        let mgr = QueueManager::new();
        mgr.add(queue("primary")).unwrap();
        assert!(mgr.add(queue("primary")).is_err());
    }

    #[test]
    fn get_returns_none_for_unknown_name() {
        let mgr = QueueManager::new();
        mgr.add(queue("primary")).unwrap();
        assert!(mgr.get("secondary").is_none());
        assert!(mgr.get("primary").is_some());
    }

    #[test]
    fn out_of_range_selection_increment_is_a_no_op() {
        let mgr = QueueManager::new();
        mgr.add(queue("primary")).unwrap();
        mgr.increment_queue_selection(50);
        assert_eq!(mgr.aggregates().total_submitted, 0);
        mgr.increment_queue_selection(0);
        assert_eq!(mgr.aggregates().total_submitted, 1);
        assert_eq!(mgr.selection_count(0), 1);
    }

    #[test]
    fn init_stats_zeros_everything() {
        let mgr = QueueManager::new();
        mgr.add(queue("primary")).unwrap();
        mgr.increment_queue_selection(0);
        mgr.record_completed();
        mgr.init_stats();
        assert_eq!(mgr.aggregates(), QueueManagerAggregates::default());
        assert_eq!(mgr.selection_count(0), 0);
    }

    #[test]
    fn all_returns_every_registered_queue() {
        let mgr = QueueManager::new();
        mgr.add(queue("primary")).unwrap();
        mgr.add(queue("secondary")).unwrap();
        let names: Vec<String> = mgr.all().iter().map(|q| q.database_name().to_owned()).collect();
        assert_eq!(names, vec!["primary".to_owned(), "secondary".to_owned()]);
    }

    #[test]
    fn max_query_age_is_zero_with_no_queues() {
        let mgr = QueueManager::new();
        assert_eq!(mgr.find_max_query_age_across_queues(), Duration::default());
    }
}
