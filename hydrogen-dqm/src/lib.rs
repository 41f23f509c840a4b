//! The Database Queue Manager: connection pooling, query queues, the
//! Lead/Worker queue topology, the process-wide queue index, and the
//! migration decision engine.

pub mod database_queue;
pub mod migration;
pub mod pool;
pub mod query_queue;
pub mod queue_manager;

pub use database_queue::{DatabaseQueue, MigrationConnectionGuard, TickOutcome};
pub use migration::{determine_migration_action, find_next_reverse_migration_to_apply, MigrationAction, MigrationCache, MigrationRecord, BOOTSTRAP_MIGRATION_ID};
pub use pool::{ConnectionPool, GlobalPoolManager, PoolStats};
pub use query_queue::QueryQueue;
pub use queue_manager::{QueueManager, QueueManagerAggregates};
