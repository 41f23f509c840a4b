use std::any::Any;

use serde_json::Value;

use crate::connection_config::ConnectionConfig;
use crate::engine_kind::EngineKind;
use crate::error::HydrogenResult;
use crate::prepared_statement::EngineStmtHandle;

/// Engine-private connection state, tagged by the `EngineKind` that created
/// it: a tagged variant rather than an opaque `void*`, so a connection can
/// never be handed to the wrong adapter's methods. Every `EngineAdapter`
/// method that touches the private state must downcast through
/// [`Self::downcast_ref`] or [`Self::downcast_mut`], which refuse to hand
/// back a reference unless the tag matches the caller's expectation.
pub struct EnginePrivate {
    kind: EngineKind,
    inner: Box<dyn Any + Send>,
}

impl EnginePrivate {
    pub fn new<T: Send + 'static>(kind: EngineKind, inner: T) -> Self {
        EnginePrivate {
            kind,
            inner: Box::new(inner),
        }
    }

    pub fn kind(&self) -> EngineKind {
        self.kind
    }

    pub fn downcast_ref<T: 'static>(&self, expected: EngineKind) -> Option<&T> {
        if self.kind != expected {
            return None;
        }
        self.inner.downcast_ref::<T>()
    }

    pub fn downcast_mut<T: 'static>(&mut self, expected: EngineKind) -> Option<&mut T> {
        if self.kind != expected {
            return None;
        }
        self.inner.downcast_mut::<T>()
    }
}

/// The result of a non-prepared-statement `execute` call: row count plus an
/// optional materialized row set. The DQM core treats rows as opaque JSON --
/// there's no query planner here to decode a typed schema against.
#[derive(Clone, Debug, Default)]
pub struct ExecuteOutcome {
    pub rows_affected: u64,
    pub rows: Vec<serde_json::Map<String, Value>>,
}

/// The contract every storage-engine adapter implements. Implementations
/// live in `hydrogen-engines`, one per `EngineKind`, each gated behind a
/// Cargo feature: a static registry of adapters chosen at build time, rather
/// than a runtime symbol lookup against a dynamically loaded driver library.
pub trait EngineAdapter: Send + Sync {
    fn kind(&self) -> EngineKind;

    fn engine_version(&self) -> &'static str;

    fn engine_description(&self) -> &'static str;

    /// Whether this adapter's backing library was successfully probed at
    /// registry init. `Ai` implementations always return `false`.
    fn engine_is_available(&self) -> bool;

    fn validate_connection_string(&self, s: &str) -> bool;

    fn build_connection_string(&self, config: &ConnectionConfig) -> String {
        crate::connection_config::build_connection_string(self.kind(), config)
    }

    fn connect(&self, config: &ConnectionConfig) -> HydrogenResult<EnginePrivate>;

    fn disconnect(&self, conn: &mut EnginePrivate) -> HydrogenResult<()>;

    fn health_check(&self, conn: &EnginePrivate) -> bool;

    fn prepare(
        &self,
        conn: &EnginePrivate,
        name: &str,
        sql: &str,
    ) -> HydrogenResult<EngineStmtHandle>;

    fn unprepare(&self, conn: &EnginePrivate, stmt: &mut EngineStmtHandle) -> HydrogenResult<()>;

    fn execute(
        &self,
        conn: &EnginePrivate,
        stmt: Option<&EngineStmtHandle>,
        sql: &str,
        params: &Value,
    ) -> HydrogenResult<ExecuteOutcome>;
}
