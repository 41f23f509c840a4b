//! Assembles every subsystem crate into one process-wide value: a single
//! `Runtime`, created at launch, passed into every subsystem, and torn down
//! in landing order, rather than shared mutable globals.

use std::sync::Arc;
use std::time::Duration;

use hydrogen_common::{Metrics, ShutdownToken};
use hydrogen_db_core::{ConnectionConfig, EngineKind, HydrogenError, HydrogenResult};
use hydrogen_dqm::{DatabaseQueue, GlobalPoolManager, QueueManager};
use hydrogen_engines::EngineRegistry;
use hydrogen_gate::SubsystemReadiness;
use hydrogen_settings::{AppConfig, DatabaseSettings};
use slog_scope::info;

use crate::subsystems::build_registry;

pub struct Runtime {
    pub config: AppConfig,
    pub engines: Arc<EngineRegistry>,
    pub pools: Arc<GlobalPoolManager>,
    pub queues: Arc<QueueManager>,
    pub metrics: Metrics,
    pub gate_registry: Vec<Arc<dyn SubsystemReadiness>>,
    pub shutdown: ShutdownToken,
}

impl Runtime {
    /// Builds every Lead queue named in `config.databases`, registers each
    /// with the `QueueManager`, and assembles the gate's subsystem registry
    /// around it. Returns `InvalidArgument` for an unrecognized engine name
    /// rather than panicking -- `AppConfig::validate` should already have
    /// caught this, but a `Runtime` must not trust its caller blindly.
    pub fn assemble(config: AppConfig) -> HydrogenResult<Self> {
        let engines = Arc::new(EngineRegistry::with_compiled_in_adapters());
        let pools = Arc::new(GlobalPoolManager::new());
        let queues = Arc::new(QueueManager::new());
        let shutdown = ShutdownToken::new();
        let metrics = Metrics::from_opts(&config.statsd_label, config.statsd_host.as_deref(), config.statsd_port)
            .unwrap_or_else(|_| Metrics::noop());

        for db in &config.databases {
            let lead = Arc::new(build_lead_queue(db, &engines, &pools)?);
            lead.attach_metrics(metrics.clone());
            info!("database lead queue registered"; "database" => %db.name, "engine" => %db.engine);
            let idx = queues.add(lead.clone()).map_err(|_| {
                HydrogenError::invalid_argument(format!("duplicate database name: {}", db.name))
            })?;
            lead.attach_to_manager(&queues, idx);
        }

        let gate_registry = build_registry(queues.clone());

        Ok(Runtime {
            config,
            engines,
            pools,
            queues,
            metrics,
            gate_registry,
            shutdown,
        })
    }
}

fn build_lead_queue(
    db: &DatabaseSettings,
    engines: &EngineRegistry,
    pools: &GlobalPoolManager,
) -> HydrogenResult<DatabaseQueue> {
    let kind = EngineKind::parse(&db.engine)
        .ok_or_else(|| HydrogenError::invalid_argument(format!("unrecognized engine: {}", db.engine)))?;
    let adapter = engines
        .get(kind)
        .ok_or_else(|| HydrogenError::invalid_argument(format!("engine not compiled in: {}", db.engine)))?;

    let config = ConnectionConfig {
        connection_string: db.connection_string.clone(),
        host: db.host.clone(),
        port: db.port,
        database: db.database.clone(),
        username: db.username.clone(),
        password: db.password.clone(),
        prepared_statement_cache_size: Some(db.workers.prepared_statement_cache_size),
    };
    let capacity = (db.workers.max_child_queues + 1) as usize;
    let pool = pools.init(db.name.clone(), adapter.clone(), config.clone(), capacity);
    let connection_string = adapter.build_connection_string(&config);

    Ok(DatabaseQueue::new_lead(
        db.name.clone(),
        connection_string,
        db.workers.max_child_queues,
        Duration::from_secs(db.workers.heartbeat_interval_seconds),
        pool,
    ))
}
