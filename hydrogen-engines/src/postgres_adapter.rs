use std::sync::Mutex;

use bytes::BytesMut;
use postgres::types::{to_sql_checked, IsNull, ToSql, Type};
use postgres::{Client, NoTls, Statement};
use serde_json::Value;

use hydrogen_db_core::{
    ConnectionConfig, EngineAdapter, EngineKind, EnginePrivate, EngineStmtHandle, ExecuteOutcome,
    HydrogenError, HydrogenResult,
};

struct PostgresConn {
    client: Mutex<Client>,
}

/// Binds a single JSON scalar as whatever Postgres type the server asks for.
/// `hydrogen-engines` has no static schema to bind against, so this accepts
/// any declared `Type` and lets the wire encoding for the matching Rust type
/// do the conversion -- the same trick `tokio-postgres`'s own `Json<T>`
/// wrapper uses, just dispatched over the JSON scalar variants instead of a
/// single serializable type.
#[derive(Debug)]
struct JsonParam<'a>(&'a Value);

impl ToSql for JsonParam<'_> {
    fn to_sql(
        &self,
        ty: &Type,
        out: &mut BytesMut,
    ) -> Result<IsNull, Box<dyn std::error::Error + Sync + Send>> {
        match self.0 {
            Value::Null => Ok(IsNull::Yes),
            Value::Bool(b) => b.to_sql(ty, out),
            Value::Number(n) => {
                if let Some(i) = n.as_i64() {
                    i.to_sql(ty, out)
                } else if let Some(f) = n.as_f64() {
                    f.to_sql(ty, out)
                } else {
                    Err("numeric bind parameter is not representable".into())
                }
            }
            Value::String(s) => s.to_sql(ty, out),
            Value::Array(_) | Value::Object(_) => {
                Err("nested json parameters are not supported".into())
            }
        }
    }

    fn accepts(_ty: &Type) -> bool {
        true
    }

    to_sql_checked!();
}

/// Postgres has no named-parameter placeholders (`$1`, `$2`, ...), so
/// `parameters_json` must be a JSON array here.
fn json_array_params(params: &Value) -> HydrogenResult<Vec<JsonParam<'_>>> {
    match params {
        Value::Null => Ok(Vec::new()),
        Value::Object(map) if map.is_empty() => Ok(Vec::new()),
        Value::Array(items) => Ok(items.iter().map(JsonParam).collect()),
        _ => Err(HydrogenError::engine_error(
            EngineKind::PostgreSql,
            "postgres bind parameters must be a JSON array of positional values",
        )),
    }
}

pub struct PostgresAdapter;

impl PostgresAdapter {
    pub fn new() -> Self {
        PostgresAdapter
    }
}

impl Default for PostgresAdapter {
    fn default() -> Self {
        Self::new()
    }
}

impl EngineAdapter for PostgresAdapter {
    fn kind(&self) -> EngineKind {
        EngineKind::PostgreSql
    }

    fn engine_version(&self) -> &'static str {
        env!("CARGO_PKG_VERSION")
    }

    fn engine_description(&self) -> &'static str {
        "PostgreSQL (postgres crate, synchronous client)"
    }

    fn engine_is_available(&self) -> bool {
        true
    }

    fn validate_connection_string(&self, s: &str) -> bool {
        s.parse::<postgres::Config>().is_ok()
    }

    fn connect(&self, config: &ConnectionConfig) -> HydrogenResult<EnginePrivate> {
        let url = self.build_connection_string(config);
        let client = Client::connect(&url, NoTls)
            .map_err(|e| HydrogenError::engine_error(EngineKind::PostgreSql, e.to_string()))?;
        Ok(EnginePrivate::new(
            EngineKind::PostgreSql,
            PostgresConn {
                client: Mutex::new(client),
            },
        ))
    }

    fn disconnect(&self, conn: &mut EnginePrivate) -> HydrogenResult<()> {
        conn.downcast_ref::<PostgresConn>(EngineKind::PostgreSql)
            .ok_or_else(|| HydrogenError::not_initialized("not a postgres connection"))?;
        Ok(())
    }

    fn health_check(&self, conn: &EnginePrivate) -> bool {
        let Some(state) = conn.downcast_ref::<PostgresConn>(EngineKind::PostgreSql) else {
            return false;
        };
        let mut guard = match state.client.lock() {
            Ok(guard) => guard,
            Err(_) => return false,
        };
        guard.batch_execute("select 1").is_ok()
    }

    fn prepare(
        &self,
        conn: &EnginePrivate,
        _name: &str,
        sql: &str,
    ) -> HydrogenResult<EngineStmtHandle> {
        let state = conn
            .downcast_ref::<PostgresConn>(EngineKind::PostgreSql)
            .ok_or_else(|| HydrogenError::not_initialized("not a postgres connection"))?;
        let mut guard = state.client.lock().map_err(|_| {
            HydrogenError::engine_error(EngineKind::PostgreSql, "connection lock poisoned")
        })?;
        let stmt: Statement = guard
            .prepare(sql)
            .map_err(|e| HydrogenError::engine_error(EngineKind::PostgreSql, e.to_string()))?;
        Ok(Box::new(stmt))
    }

    fn unprepare(&self, conn: &EnginePrivate, stmt: &mut EngineStmtHandle) -> HydrogenResult<()> {
        conn.downcast_ref::<PostgresConn>(EngineKind::PostgreSql)
            .ok_or_else(|| HydrogenError::not_initialized("not a postgres connection"))?;
        // `postgres::Statement` closes its server-side handle when its last
        // clone is dropped; there is no explicit close call to make here.
        let _ = stmt.downcast_mut::<Statement>();
        Ok(())
    }

    fn execute(
        &self,
        conn: &EnginePrivate,
        stmt: Option<&EngineStmtHandle>,
        sql: &str,
        params: &Value,
    ) -> HydrogenResult<ExecuteOutcome> {
        let state = conn
            .downcast_ref::<PostgresConn>(EngineKind::PostgreSql)
            .ok_or_else(|| HydrogenError::not_initialized("not a postgres connection"))?;
        let mut guard = state.client.lock().map_err(|_| {
            HydrogenError::engine_error(EngineKind::PostgreSql, "connection lock poisoned")
        })?;
        let bound = json_array_params(params)?;
        let refs: Vec<&(dyn ToSql + Sync)> = bound.iter().map(|p| p as &(dyn ToSql + Sync)).collect();
        let rows_affected = match stmt.and_then(|s| s.downcast_ref::<Statement>()) {
            Some(prepared) => guard
                .execute(prepared, &refs)
                .map_err(|e| HydrogenError::engine_error(EngineKind::PostgreSql, e.to_string()))?,
            None => guard
                .execute(sql, &refs)
                .map_err(|e| HydrogenError::engine_error(EngineKind::PostgreSql, e.to_string()))?,
        };
        Ok(ExecuteOutcome {
            rows_affected,
            rows: Vec::new(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn connection_string_composition_matches_core_builder() {
        let adapter = PostgresAdapter::new();
        let cfg = ConnectionConfig::default();
        assert_eq!(
            adapter.build_connection_string(&cfg),
            "postgresql://:@localhost:5432/"
        );
    }

    #[test]
    fn rejects_an_unparsable_connection_string() {
        let adapter = PostgresAdapter::new();
        assert!(!adapter.validate_connection_string("not a config string!!"));
    }

    #[test]
    fn absent_parameters_bind_as_empty() {
        assert!(json_array_params(&Value::Null).unwrap().is_empty());
    }

    #[test]
    fn array_parameters_bind_positionally() {
        let params = serde_json::json!(["alice", 42, true]);
        assert_eq!(json_array_params(&params).unwrap().len(), 3);
    }

    #[test]
    fn object_parameters_are_rejected() {
        let params = serde_json::json!({"name": "alice"});
        assert!(json_array_params(&params).is_err());
    }
}
