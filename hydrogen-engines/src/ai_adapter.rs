use serde_json::Value;

use hydrogen_db_core::{
    ConnectionConfig, EngineAdapter, EngineKind, EnginePrivate, EngineStmtHandle, ExecuteOutcome,
    HydrogenError, HydrogenResult,
};

/// Reserved engine slot. Spec.md names `AI` in the engine-kind tag set but
/// never defines its wire protocol; the registry carries it so
/// `EngineKind::ALL` stays exhaustive, but every operation here refuses with
/// `EngineError`, and `engine_is_available()` is permanently `false`.
#[derive(Default)]
pub struct AiAdapter;

impl EngineAdapter for AiAdapter {
    fn kind(&self) -> EngineKind {
        EngineKind::Ai
    }

    fn engine_version(&self) -> &'static str {
        "unimplemented"
    }

    fn engine_description(&self) -> &'static str {
        "reserved engine slot; not implemented"
    }

    fn engine_is_available(&self) -> bool {
        false
    }

    fn validate_connection_string(&self, _s: &str) -> bool {
        false
    }

    fn connect(&self, _config: &ConnectionConfig) -> HydrogenResult<EnginePrivate> {
        Err(HydrogenError::engine_error(
            EngineKind::Ai,
            "the AI engine is reserved and not implemented",
        ))
    }

    fn disconnect(&self, _conn: &mut EnginePrivate) -> HydrogenResult<()> {
        Err(HydrogenError::engine_error(EngineKind::Ai, "not implemented"))
    }

    fn health_check(&self, _conn: &EnginePrivate) -> bool {
        false
    }

    fn prepare(
        &self,
        _conn: &EnginePrivate,
        _name: &str,
        _sql: &str,
    ) -> HydrogenResult<EngineStmtHandle> {
        Err(HydrogenError::engine_error(EngineKind::Ai, "not implemented"))
    }

    fn unprepare(&self, _conn: &EnginePrivate, _stmt: &mut EngineStmtHandle) -> HydrogenResult<()> {
        Err(HydrogenError::engine_error(EngineKind::Ai, "not implemented"))
    }

    fn execute(
        &self,
        _conn: &EnginePrivate,
        _stmt: Option<&EngineStmtHandle>,
        _sql: &str,
        _params: &Value,
    ) -> HydrogenResult<ExecuteOutcome> {
        Err(HydrogenError::engine_error(EngineKind::Ai, "not implemented"))
    }
}
