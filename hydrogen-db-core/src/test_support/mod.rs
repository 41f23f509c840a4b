//! In-process test doubles for `EngineAdapter`: dependency-injected mocks
//! behind the same trait every real adapter implements, rather than
//! weak-symbol overrides of a compiled driver library.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Mutex;

use serde_json::Value;

use crate::adapter::{EngineAdapter, EnginePrivate, ExecuteOutcome};
use crate::connection_config::ConnectionConfig;
use crate::engine_kind::EngineKind;
use crate::error::{HydrogenError, HydrogenResult};
use crate::prepared_statement::EngineStmtHandle;

struct MockConnState {
    prepared: Vec<String>,
}

/// A fully in-memory stand-in for a real driver. Every knob defaults to the
/// "happy path"; tests flip `set_healthy`/`fail_connect`/`fail_disconnect` to
/// exercise failure branches without a real database.
pub struct MockAdapter {
    kind: EngineKind,
    healthy: AtomicBool,
    fail_connect: AtomicBool,
    fail_disconnect: AtomicBool,
    connect_calls: Mutex<u64>,
}

impl MockAdapter {
    pub fn new(kind: EngineKind) -> Self {
        MockAdapter {
            kind,
            healthy: AtomicBool::new(true),
            fail_connect: AtomicBool::new(false),
            fail_disconnect: AtomicBool::new(false),
            connect_calls: Mutex::new(0),
        }
    }

    pub fn set_healthy(&self, healthy: bool) {
        self.healthy.store(healthy, Ordering::SeqCst);
    }

    pub fn fail_connect(&self) {
        self.fail_connect.store(true, Ordering::SeqCst);
    }

    pub fn fail_disconnect(&self) {
        self.fail_disconnect.store(true, Ordering::SeqCst);
    }

    pub fn connect_calls(&self) -> u64 {
        *self.connect_calls.lock().expect("mock mutex poisoned")
    }
}

impl EngineAdapter for MockAdapter {
    fn kind(&self) -> EngineKind {
        self.kind
    }

    fn engine_version(&self) -> &'static str {
        "mock-0.0"
    }

    fn engine_description(&self) -> &'static str {
        "in-process test double"
    }

    fn engine_is_available(&self) -> bool {
        self.kind != EngineKind::Ai
    }

    fn validate_connection_string(&self, s: &str) -> bool {
        !s.is_empty()
    }

    fn connect(&self, config: &ConnectionConfig) -> HydrogenResult<EnginePrivate> {
        *self.connect_calls.lock().expect("mock mutex poisoned") += 1;
        if self.fail_connect.load(Ordering::SeqCst) {
            return Err(HydrogenError::engine_error(self.kind, "mock connect failure"));
        }
        let _ = self.build_connection_string(config);
        Ok(EnginePrivate::new(
            self.kind,
            MockConnState {
                prepared: Vec::new(),
            },
        ))
    }

    fn disconnect(&self, conn: &mut EnginePrivate) -> HydrogenResult<()> {
        if self.fail_disconnect.load(Ordering::SeqCst) {
            return Err(HydrogenError::engine_error(self.kind, "mock disconnect failure"));
        }
        let _ = conn.downcast_mut::<MockConnState>(self.kind);
        Ok(())
    }

    fn health_check(&self, conn: &EnginePrivate) -> bool {
        conn.downcast_ref::<MockConnState>(self.kind).is_some() && self.healthy.load(Ordering::SeqCst)
    }

    fn prepare(
        &self,
        conn: &EnginePrivate,
        name: &str,
        _sql: &str,
    ) -> HydrogenResult<EngineStmtHandle> {
        conn.downcast_ref::<MockConnState>(self.kind)
            .ok_or_else(|| HydrogenError::not_initialized("wrong engine-private kind"))?;
        Ok(Box::new(name.to_owned()))
    }

    fn unprepare(&self, conn: &EnginePrivate, _stmt: &mut EngineStmtHandle) -> HydrogenResult<()> {
        conn.downcast_ref::<MockConnState>(self.kind)
            .ok_or_else(|| HydrogenError::not_initialized("wrong engine-private kind"))?;
        Ok(())
    }

    fn execute(
        &self,
        conn: &EnginePrivate,
        _stmt: Option<&EngineStmtHandle>,
        _sql: &str,
        _params: &Value,
    ) -> HydrogenResult<ExecuteOutcome> {
        conn.downcast_ref::<MockConnState>(self.kind)
            .ok_or_else(|| HydrogenError::not_initialized("wrong engine-private kind"))?;
        Ok(ExecuteOutcome {
            rows_affected: 1,
            rows: Vec::new(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn downcast_refuses_mismatched_kind() {
        let adapter = MockAdapter::new(EngineKind::Sqlite);
        let conn = adapter.connect(&ConnectionConfig::default()).unwrap();
        assert!(conn.downcast_ref::<MockConnState>(EngineKind::MySql).is_none());
        assert!(conn.downcast_ref::<MockConnState>(EngineKind::Sqlite).is_some());
    }

    #[test]
    fn ai_engine_is_never_available() {
        let adapter = MockAdapter::new(EngineKind::Ai);
        assert!(!adapter.engine_is_available());
    }
}
