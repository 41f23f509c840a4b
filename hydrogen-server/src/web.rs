//! The thin `/__heartbeat__` / `/__lbheartbeat__` dockerflow surface,
//! reporting DQM/gate state instead of a single storage pool's health.

use std::collections::HashMap;
use std::sync::Arc;

use actix_web::{web::Data, HttpResponse};
use serde_json::Value;
use slog_scope::error;

use crate::runtime::Runtime;

pub struct ServerState {
    pub runtime: Arc<Runtime>,
}

/// Runs the gate's launch check against every registered subsystem and
/// reports `Ok` only if every database lead is fully migrated and
/// connected, returning `ServiceUnavailable` on a failed check.
pub async fn heartbeat(state: Data<ServerState>) -> HttpResponse {
    let mut checklist: HashMap<String, Value> = HashMap::new();
    checklist.insert(
        "version".to_owned(),
        Value::String(env!("CARGO_PKG_VERSION").to_owned()),
    );

    let results = hydrogen_gate::run_launch_sequence(&state.runtime.gate_registry);
    let mut subsystems = serde_json::Map::new();
    for report in &results.reports {
        subsystems.insert(
            report.subsystem.registry_name().to_owned(),
            Value::String(if report.ready { "Ok".to_owned() } else { "Err".to_owned() }),
        );
    }
    checklist.insert("subsystems".to_owned(), Value::Object(subsystems));

    let queue_depths: serde_json::Map<String, Value> = state
        .runtime
        .queues
        .all()
        .iter()
        .map(|q| (q.database_name().to_owned(), Value::from(q.queries().depth())))
        .collect();
    checklist.insert("queue_depth".to_owned(), Value::Object(queue_depths));

    if results.any_ready {
        checklist.insert("status".to_owned(), Value::from("Ok"));
        HttpResponse::Ok().json(checklist)
    } else {
        error!("heartbeat: no subsystem reported ready");
        checklist.insert("status".to_owned(), Value::from("Err"));
        HttpResponse::ServiceUnavailable().json(checklist)
    }
}

/// The load-balancer probe: cheap liveness only, no subsystem scanning.
pub async fn lbheartbeat() -> HttpResponse {
    HttpResponse::Ok().finish()
}
