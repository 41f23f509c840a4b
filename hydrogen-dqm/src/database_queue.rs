use std::sync::atomic::{AtomicBool, AtomicI64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, TryLockError, Weak};
use std::time::{Duration, Instant};

use hydrogen_common::{Metrics, ShutdownToken};
use hydrogen_db_core::{
    ConnectionHandle, DatabaseQuery, HydrogenError, HydrogenErrorKind, HydrogenResult, QueueClass,
};
use slog_scope::{error, info, warn};
use time::OffsetDateTime;

use crate::migration::{determine_migration_action, MigrationAction, MigrationCache};
use crate::pool::ConnectionPool;
use crate::query_queue::QueryQueue;
use crate::queue_manager::QueueManager;

/// What happened on one pass of the worker loop; tests drive `tick()`
/// directly instead of spinning a real thread, so the loop body stays
/// observable without timing-dependent assertions.
#[derive(Debug, PartialEq, Eq)]
pub enum TickOutcome {
    ProcessedQuery,
    Heartbeat,
    ShuttingDown,
}

struct MigrationCounters {
    available: AtomicI64,
    loaded: AtomicI64,
    applied: AtomicI64,
}

impl Default for MigrationCounters {
    fn default() -> Self {
        MigrationCounters {
            available: AtomicI64::new(0),
            loaded: AtomicI64::new(0),
            applied: AtomicI64::new(0),
        }
    }
}

/// A named worker thread, its input queue, and (for a Lead) the database's
/// persistent connection plus migration counters and child queues. Worker
/// and Lead share this type; `is_lead` and `can_spawn_queues` distinguish
/// the roles instead of splitting into two structs that would otherwise
/// duplicate nearly every field.
pub struct DatabaseQueue {
    database_name: String,
    is_lead: bool,
    queue_type: QueueClass,
    tag: char,
    queue_number: Mutex<i64>,
    queries: QueryQueue,
    shutdown: ShutdownToken,
    worker_thread_started: AtomicBool,
    heartbeat_interval: Duration,
    last_heartbeat: Mutex<Option<OffsetDateTime>>,
    last_connection_attempt: Mutex<Option<OffsetDateTime>>,
    is_connected: AtomicBool,
    persistent_connection: Mutex<Option<ConnectionHandle>>,
    connection_string: String,
    pool: Arc<ConnectionPool>,
    can_spawn_queues: bool,
    max_child_queues: u32,
    child_queues: Mutex<Vec<Arc<DatabaseQueue>>>,
    idle_since: Mutex<Option<Instant>>,
    in_flight_since: Mutex<Option<Instant>>,
    migration_counters: MigrationCounters,
    manager_link: Mutex<Option<(Weak<QueueManager>, usize)>>,
    metrics: Mutex<Metrics>,
}

/// A held reservation of the Lead's persistent-connection lock, obtained via
/// [`DatabaseQueue::acquire_migration_connection`]. Dropping it is the
/// release: the RAII guard makes "exactly one release per acquire"
/// structurally true instead of caller-enforced.
pub struct MigrationConnectionGuard<'a> {
    guard: MutexGuard<'a, Option<ConnectionHandle>>,
}

impl<'a> MigrationConnectionGuard<'a> {
    pub fn connection(&self) -> Option<&ConnectionHandle> {
        self.guard.as_ref()
    }
}

impl DatabaseQueue {
    fn new(
        database_name: impl Into<String>,
        connection_string: impl Into<String>,
        queue_type: QueueClass,
        is_lead: bool,
        max_child_queues: u32,
        heartbeat_interval: Duration,
        pool: Arc<ConnectionPool>,
    ) -> Self {
        DatabaseQueue {
            database_name: database_name.into(),
            is_lead,
            queue_type,
            tag: queue_type.tag(),
            queue_number: Mutex::new(-1),
            queries: QueryQueue::new(256),
            shutdown: ShutdownToken::new(),
            worker_thread_started: AtomicBool::new(false),
            heartbeat_interval,
            last_heartbeat: Mutex::new(None),
            last_connection_attempt: Mutex::new(None),
            is_connected: AtomicBool::new(false),
            persistent_connection: Mutex::new(None),
            connection_string: connection_string.into(),
            pool,
            can_spawn_queues: is_lead,
            max_child_queues,
            child_queues: Mutex::new(Vec::new()),
            idle_since: Mutex::new(None),
            in_flight_since: Mutex::new(None),
            migration_counters: MigrationCounters::default(),
            manager_link: Mutex::new(None),
            metrics: Mutex::new(Metrics::noop()),
        }
    }

    /// The Lead queue for a database: the only queue permitted to spawn
    /// children and run migrations.
    pub fn new_lead(
        database_name: impl Into<String>,
        connection_string: impl Into<String>,
        max_child_queues: u32,
        heartbeat_interval: Duration,
        pool: Arc<ConnectionPool>,
    ) -> Self {
        DatabaseQueue::new(
            database_name,
            connection_string,
            QueueClass::Medium,
            true,
            max_child_queues,
            heartbeat_interval,
            pool,
        )
    }

    /// A non-Lead queue that cannot spawn children, numbered `-1` until the
    /// manager assigns it one.
    pub fn create_worker(
        database_name: impl Into<String>,
        connection_string: impl Into<String>,
        class: QueueClass,
        heartbeat_interval: Duration,
        pool: Arc<ConnectionPool>,
    ) -> Self {
        DatabaseQueue::new(
            database_name,
            connection_string,
            class,
            false,
            0,
            heartbeat_interval,
            pool,
        )
    }

    pub fn database_name(&self) -> &str {
        &self.database_name
    }

    pub fn is_lead(&self) -> bool {
        self.is_lead
    }

    pub fn can_spawn_queues(&self) -> bool {
        self.can_spawn_queues
    }

    pub fn queue_type(&self) -> QueueClass {
        self.queue_type
    }

    pub fn tag(&self) -> char {
        self.tag
    }

    pub fn queue_number(&self) -> i64 {
        *self.queue_number.lock().expect("queue_number mutex poisoned")
    }

    pub fn set_queue_number(&self, n: i64) {
        *self.queue_number.lock().expect("queue_number mutex poisoned") = n;
    }

    pub fn queries(&self) -> &QueryQueue {
        &self.queries
    }

    pub fn shutdown_token(&self) -> &ShutdownToken {
        &self.shutdown
    }

    pub fn request_shutdown(&self) {
        self.shutdown.trip();
    }

    pub fn is_connected(&self) -> bool {
        self.is_connected.load(Ordering::SeqCst)
    }

    pub fn child_queue_count(&self) -> usize {
        self.child_queues.lock().expect("child_queues mutex poisoned").len()
    }

    pub fn migration_counters(&self) -> (i64, i64, i64) {
        (
            self.migration_counters.available.load(Ordering::SeqCst),
            self.migration_counters.loaded.load(Ordering::SeqCst),
            self.migration_counters.applied.load(Ordering::SeqCst),
        )
    }

    pub fn set_available_migration(&self, available: i64) {
        self.migration_counters.available.store(available, Ordering::SeqCst);
    }

    /// Links this queue back to the manager slot it was registered under
    /// (the index `QueueManager::add` returned), so `submit` and the worker
    /// loop can report into the manager's aggregate counters. A `Weak`
    /// reference: the manager owns the queue via `Arc`, so a strong
    /// back-reference here would leak both.
    pub fn attach_to_manager(&self, manager: &Arc<QueueManager>, idx: usize) {
        *self.manager_link.lock().expect("manager_link mutex poisoned") =
            Some((Arc::downgrade(manager), idx));
    }

    fn manager(&self) -> Option<(Arc<QueueManager>, usize)> {
        let link = self.manager_link.lock().expect("manager_link mutex poisoned");
        let (weak, idx) = link.as_ref()?;
        Some((weak.upgrade()?, *idx))
    }

    /// Points this queue's counters at a real statsd client instead of the
    /// no-op default; called once at `Runtime` assembly.
    pub fn attach_metrics(&self, metrics: Metrics) {
        *self.metrics.lock().expect("metrics mutex poisoned") = metrics;
    }

    fn metrics(&self) -> Metrics {
        self.metrics.lock().expect("metrics mutex poisoned").clone()
    }

    /// Routes a query, executing it inline if this queue has no spare child
    /// of the requested class: the *queue's own* type governs processing,
    /// not the query's hint.
    pub fn submit(&self, query: DatabaseQuery) -> HydrogenResult<()> {
        if self.shutdown.is_tripped() {
            return Err(HydrogenError::shutdown());
        }
        self.queries.submit(query)?;
        if let Some((manager, idx)) = self.manager() {
            manager.increment_queue_selection(idx);
        }
        self.metrics()
            .incr_with_tags("db.queries.submitted", &[("database", &self.database_name)]);
        Ok(())
    }

    /// One iteration of the worker loop. Processes a single query if one is
    /// waiting (within `heartbeat_interval`), else performs the heartbeat
    /// tick and, for a Lead, child-queue management and migration progress.
    pub fn tick(&self) -> TickOutcome {
        if self.shutdown.is_tripped() {
            return TickOutcome::ShuttingDown;
        }
        match self.queries.dequeue(self.heartbeat_interval) {
            Some(query) => {
                self.process_single_query(query);
                *self.idle_since.lock().expect("idle_since mutex poisoned") = None;
                TickOutcome::ProcessedQuery
            }
            None => {
                self.heartbeat();
                if self.is_lead {
                    self.manage_child_queues();
                    self.run_migration_if_needed();
                }
                TickOutcome::Heartbeat
            }
        }
    }

    /// Executes through the persistent connection when one is live; a
    /// Cache-class queue tolerates a missing connection and serves a
    /// synthetic empty result instead of failing the query.
    fn process_single_query(&self, mut query: DatabaseQuery) {
        *self.in_flight_since.lock().expect("in_flight_since mutex poisoned") = Some(Instant::now());
        let mut guard = self
            .persistent_connection
            .lock()
            .expect("persistent_connection mutex poisoned");
        let result = match guard.as_ref() {
            Some(conn) => conn.execute(&query.query_template, &query.parameters_json),
            None if self.queue_type == QueueClass::Cache => {
                Ok(hydrogen_db_core::ExecuteOutcome::default())
            }
            None => Err(HydrogenError::not_initialized(
                "no live connection for this queue",
            )),
        };
        drop(guard);
        query.processed_at = Some(OffsetDateTime::now_utc());
        let manager = self.manager();
        let metrics = self.metrics();
        let tag_str = self.tag.to_string();
        let tags: [(&str, &str); 2] = [("database", &self.database_name), ("queue_tag", &tag_str)];
        match result {
            Ok(_) => {
                info!("query processed"; "database" => %self.database_name, "queue_tag" => %self.tag);
                if let Some((manager, _)) = &manager {
                    manager.record_completed();
                }
                metrics.incr_with_tags("db.queries.completed", &tags);
            }
            Err(e) => {
                query.retry_count += 1;
                query.error_message = Some(e.kind().to_string());
                warn!("query failed"; "database" => %self.database_name, "queue_tag" => %self.tag, "error" => %e.kind());
                // No live connection reads as the query having waited past
                // its window rather than the engine rejecting it.
                if matches!(e.kind(), HydrogenErrorKind::NotInitialized(_)) {
                    if let Some((manager, _)) = &manager {
                        manager.record_timeout();
                    }
                    metrics.incr_with_tags("db.queries.timeout", &tags);
                } else {
                    if let Some((manager, _)) = &manager {
                        manager.record_failed();
                    }
                    metrics.incr_with_tags("db.queries.failed", &tags);
                }
            }
        }
        *self.in_flight_since.lock().expect("in_flight_since mutex poisoned") = None;
    }

    /// Age of the query currently being processed, if any; used by
    /// [`crate::queue_manager::QueueManager::find_max_query_age_across_queues`].
    pub fn oldest_in_flight_query_age(&self) -> Option<Duration> {
        self.in_flight_since
            .lock()
            .expect("in_flight_since mutex poisoned")
            .map(|since| since.elapsed())
    }

    /// One heartbeat tick: re-checks the live connection, reconnecting
    /// through the pool if it's gone or was never established.
    fn heartbeat(&self) {
        *self.last_heartbeat.lock().expect("last_heartbeat mutex poisoned") = Some(OffsetDateTime::now_utc());

        let mut guard = self
            .persistent_connection
            .lock()
            .expect("persistent_connection mutex poisoned");
        if let Some(conn) = guard.as_ref() {
            if conn.health_check() {
                self.is_connected.store(true, Ordering::SeqCst);
                return;
            }
            *guard = None;
            self.is_connected.store(false, Ordering::SeqCst);
        }
        drop(guard);

        *self
            .last_connection_attempt
            .lock()
            .expect("last_connection_attempt mutex poisoned") = Some(OffsetDateTime::now_utc());
        match self.pool.acquire() {
            Ok(handle) => {
                *self
                    .persistent_connection
                    .lock()
                    .expect("persistent_connection mutex poisoned") = Some(handle);
                self.is_connected.store(true, Ordering::SeqCst);
            }
            Err(e) => {
                warn!("reconnect attempt failed"; "database" => %self.database_name, "error" => %e.kind());
            }
        }
    }

    /// Lead-only child-queue auto-scaling: spawns a child of class `X` when
    /// that class's queue is saturated and there's spawn headroom; retires
    /// children idle past the cool-down, never dropping below one child per
    /// class that was ever spawned.
    fn manage_child_queues(&self) {
        if !self.can_spawn_queues {
            return;
        }
        let mut children = self.child_queues.lock().expect("child_queues mutex poisoned");
        for class in QueueClass::ALL {
            let saturated = children
                .iter()
                .filter(|c| c.queue_type == class)
                .all(|c| c.queries.depth() > 0);
            let has_demand = children.iter().any(|c| c.queue_type == class && c.queries.depth() > 0);
            if has_demand && saturated && children.len() < self.max_child_queues as usize {
                let child = Arc::new(DatabaseQueue::create_worker(
                    self.database_name.clone(),
                    self.connection_string.clone(),
                    class,
                    self.heartbeat_interval,
                    self.pool.clone(),
                ));
                info!("spawning child queue"; "database" => %self.database_name, "class" => %class, "tag" => %child.tag);
                children.push(child);
            }
        }
    }

    /// Per-tick migration progress. One cycle performs one *kind* of work --
    /// ingesting every available-but-unloaded migration, or executing every
    /// loaded-but-unapplied one -- so a handful of cycles always suffices to
    /// converge, matching `max_cycles` being a small bound rather than one
    /// step per migration id.
    fn run_migration_if_needed(&self) {
        self.run_migration_if_needed_against(None);
    }

    fn run_migration_if_needed_against(&self, cache: Option<&MigrationCache>) {
        if let Some(guard) = self.acquire_migration_connection("migration-tick") {
            let (available, loaded, applied) = self.migration_counters();
            match determine_migration_action(available, loaded, applied) {
                MigrationAction::None => {}
                MigrationAction::Load => {
                    self.migration_counters.loaded.store(available, Ordering::SeqCst);
                }
                MigrationAction::Apply => {
                    if let Some(conn) = guard.connection() {
                        for id in (applied + 1)..=loaded {
                            let sql = cache
                                .and_then(|c| c.get(id))
                                .map(|r| r.forward_sql.as_str())
                                .unwrap_or("select 1");
                            if let Err(e) = conn.execute(sql, &serde_json::Value::Null) {
                                error!("migration apply failed"; "database" => %self.database_name, "migration_id" => id, "error" => %e.kind());
                                return;
                            }
                        }
                    }
                    self.migration_counters.applied.store(loaded, Ordering::SeqCst);
                }
            }
        }
    }

    /// A non-blocking try-lock of the Lead's persistent-connection mutex.
    /// `None` if the lock is contended or no persistent connection exists
    /// yet.
    pub fn acquire_migration_connection(&self, _label: &str) -> Option<MigrationConnectionGuard<'_>> {
        if !self.is_lead {
            return None;
        }
        match self.persistent_connection.try_lock() {
            Ok(guard) if guard.is_some() => Some(MigrationConnectionGuard { guard }),
            Ok(_) => None,
            Err(TryLockError::WouldBlock) => None,
            Err(TryLockError::Poisoned(_)) => None,
        }
    }

    pub fn run_migration(&self, cache: &MigrationCache, auto_migration: bool, max_cycles: u32) -> HydrogenResult<()> {
        if !auto_migration {
            return Ok(());
        }
        if !self.is_lead {
            return Err(HydrogenError::invalid_argument(
                "run_migration is only valid on a Lead queue",
            ));
        }
        self.migration_counters
            .available
            .store(cache.available(), Ordering::SeqCst);
        for _ in 0..max_cycles.max(1) {
            let (available, loaded, applied) = self.migration_counters();
            if determine_migration_action(available, loaded, applied) == MigrationAction::None {
                break;
            }
            self.run_migration_if_needed_against(Some(cache));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use hydrogen_db_core::test_support::MockAdapter;
    use hydrogen_db_core::{ConnectionConfig, EngineAdapter, EngineKind};

    fn lead_with_pool(capacity: usize) -> (DatabaseQueue, Arc<ConnectionPool>) {
        let adapter: Arc<dyn EngineAdapter> = Arc::new(MockAdapter::new(EngineKind::Sqlite));
        let pool = Arc::new(ConnectionPool::new("testdb", adapter, ConnectionConfig::default(), capacity));
        let lead = DatabaseQueue::new_lead("testdb", ":memory:", 4, Duration::from_millis(20), pool.clone());
        (lead, pool)
    }

    #[test]
    fn worker_construction_tags_match_class() {
        let adapter: Arc<dyn EngineAdapter> = Arc::new(MockAdapter::new(EngineKind::Sqlite));
        let pool = Arc::new(ConnectionPool::new("testdb", adapter, ConnectionConfig::default(), 4));
        for (class, expected_tag) in [
            (QueueClass::Slow, 'S'),
            (QueueClass::Medium, 'M'),
            (QueueClass::Fast, 'F'),
            (QueueClass::Cache, 'C'),
        ] {
            let worker = DatabaseQueue::create_worker(
                "testdb",
                "sqlite:///tmp/test.db",
                class,
                Duration::from_secs(30),
                pool.clone(),
            );
            assert!(!worker.is_lead());
            assert!(!worker.can_spawn_queues());
            assert_eq!(worker.queue_type(), class);
            assert_eq!(worker.tag(), expected_tag);
            assert_eq!(worker.queue_number(), -1);
        }
    }

    #[test]
    fn tick_without_work_runs_the_heartbeat_branch() {
        let (lead, _pool) = lead_with_pool(2);
        let outcome = lead.tick();
        assert_eq!(outcome, TickOutcome::Heartbeat);
        assert!(lead.is_connected());
    }

    #[test]
    fn tick_processes_a_submitted_query() {
        let (lead, _pool) = lead_with_pool(2);
        lead.tick();
        lead.submit(DatabaseQuery::new("select 1", None).unwrap()).unwrap();
        let outcome = lead.tick();
        assert_eq!(outcome, TickOutcome::ProcessedQuery);
    }

    #[test]
    fn shutdown_short_circuits_ticks() {
        let (lead, _pool) = lead_with_pool(2);
        lead.request_shutdown();
        assert_eq!(lead.tick(), TickOutcome::ShuttingDown);
    }

    #[test]
    fn migration_connection_guard_is_none_without_a_live_connection() {
        let (lead, _pool) = lead_with_pool(2);
        assert!(lead.acquire_migration_connection("test").is_none());
        lead.tick();
        assert!(lead.acquire_migration_connection("test").is_some());
    }

    #[test]
    fn run_migration_converges_to_applied_equals_available() {
        let (lead, _pool) = lead_with_pool(2);
        lead.tick();
        let mut cache = MigrationCache::new();
        cache.insert(crate::migration::MigrationRecord {
            migration_id: 1000,
            forward_sql: "create table t (id int)".into(),
            reverse_sql: Some("drop table t".into()),
        });
        lead.run_migration(&cache, true, 8).unwrap();
        let (available, loaded, applied) = lead.migration_counters();
        assert_eq!(available, 1000);
        assert_eq!(loaded, applied);
        assert_eq!(applied, 1000);
    }

    #[test]
    fn run_migration_is_a_noop_when_auto_migration_is_disabled() {
        let (lead, _pool) = lead_with_pool(2);
        let cache = MigrationCache::new();
        lead.run_migration(&cache, false, 8).unwrap();
        assert_eq!(lead.migration_counters(), (0, 0, 0));
    }

    #[test]
    fn run_migration_rejects_non_lead_queues() {
        let adapter: Arc<dyn EngineAdapter> = Arc::new(MockAdapter::new(EngineKind::Sqlite));
        let pool = Arc::new(ConnectionPool::new("testdb", adapter, ConnectionConfig::default(), 2));
        let worker = DatabaseQueue::create_worker("testdb", ":memory:", QueueClass::Medium, Duration::from_secs(1), pool);
        let cache = MigrationCache::new();
        assert!(worker.run_migration(&cache, true, 4).is_err());
    }

    #[test]
    fn submit_and_process_report_into_the_attached_manager() {
        let (lead, _pool) = lead_with_pool(2);
        let lead = Arc::new(lead);
        let manager = Arc::new(QueueManager::new());
        let idx = manager.add(lead.clone()).unwrap();
        lead.attach_to_manager(&manager, idx);

        lead.tick(); // establishes the persistent connection
        lead.submit(DatabaseQuery::new("select 1", None).unwrap()).unwrap();
        assert_eq!(manager.aggregates().total_submitted, 1);
        assert_eq!(manager.selection_count(idx), 1);

        lead.tick(); // processes the submitted query
        assert_eq!(manager.aggregates().total_completed, 1);
    }

    #[test]
    fn attaching_metrics_does_not_disrupt_normal_processing() {
        let (lead, _pool) = lead_with_pool(2);
        lead.attach_metrics(hydrogen_common::Metrics::noop());
        lead.tick();
        lead.submit(DatabaseQuery::new("select 1", None).unwrap()).unwrap();
        assert_eq!(lead.tick(), TickOutcome::ProcessedQuery);
    }

    #[test]
    fn a_detached_queue_does_not_touch_any_manager() {
        let (lead, _pool) = lead_with_pool(2);
        lead.tick();
        lead.submit(DatabaseQuery::new("select 1", None).unwrap()).unwrap();
        lead.tick();
        // No panics, no manager attached: nothing to assert beyond "it ran".
    }
}
