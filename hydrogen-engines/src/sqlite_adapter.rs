use std::sync::Mutex;

use rusqlite::types::{ToSqlOutput, Value as SqliteValue};
use rusqlite::{Connection, ToSql};
use serde_json::Value;

use hydrogen_db_core::{
    ConnectionConfig, EngineAdapter, EngineKind, EnginePrivate, EngineStmtHandle, ExecuteOutcome,
    HydrogenError, HydrogenResult,
};

struct SqliteConn {
    conn: Mutex<Connection>,
}

struct JsonParam<'a>(&'a Value);

impl ToSql for JsonParam<'_> {
    fn to_sql(&self) -> rusqlite::Result<ToSqlOutput<'_>> {
        Ok(ToSqlOutput::Owned(match self.0 {
            Value::Null => SqliteValue::Null,
            Value::Bool(b) => SqliteValue::Integer(*b as i64),
            Value::Number(n) => {
                if let Some(i) = n.as_i64() {
                    SqliteValue::Integer(i)
                } else if let Some(f) = n.as_f64() {
                    SqliteValue::Real(f)
                } else {
                    return Err(rusqlite::Error::ToSqlConversionFailure(
                        "numeric bind parameter is not representable".into(),
                    ));
                }
            }
            Value::String(s) => SqliteValue::Text(s.clone()),
            Value::Array(_) | Value::Object(_) => {
                return Err(rusqlite::Error::ToSqlConversionFailure(
                    "nested json parameters are not supported".into(),
                ))
            }
        }))
    }
}

enum BoundParams<'a> {
    Positional(Vec<JsonParam<'a>>),
    Named(Vec<(String, JsonParam<'a>)>),
}

/// `parameters_json` carries a JSON array for `?`-style positional markers
/// or a JSON object whose keys are the exact `:name`/`@name`/`$name`
/// placeholders used in the SQL text.
fn decode_params(params: &Value) -> HydrogenResult<BoundParams<'_>> {
    match params {
        Value::Null => Ok(BoundParams::Positional(Vec::new())),
        Value::Array(items) => Ok(BoundParams::Positional(items.iter().map(JsonParam).collect())),
        Value::Object(map) => Ok(BoundParams::Named(
            map.iter().map(|(k, v)| (k.clone(), JsonParam(v))).collect(),
        )),
        _ => Err(HydrogenError::engine_error(
            EngineKind::Sqlite,
            "bind parameters must be a JSON array or object",
        )),
    }
}

/// `rusqlite::Statement` borrows from its owning `Connection`, so it can't
/// live inside the `'static` `EngineStmtHandle` the way `mysql`/`postgres`
/// statements can. This adapter's `prepare` only validates the SQL once;
/// `execute` re-prepares from `sql` on every call -- "prepared" in name
/// only, the accepted trade for any adapter whose driver can't hand back an
/// owned statement handle.
pub struct SqliteAdapter;

impl SqliteAdapter {
    pub fn new() -> Self {
        SqliteAdapter
    }
}

impl Default for SqliteAdapter {
    fn default() -> Self {
        Self::new()
    }
}

impl EngineAdapter for SqliteAdapter {
    fn kind(&self) -> EngineKind {
        EngineKind::Sqlite
    }

    fn engine_version(&self) -> &'static str {
        rusqlite::version()
    }

    fn engine_description(&self) -> &'static str {
        "SQLite (rusqlite, bundled)"
    }

    fn engine_is_available(&self) -> bool {
        true
    }

    fn validate_connection_string(&self, s: &str) -> bool {
        !s.is_empty()
    }

    fn connect(&self, config: &ConnectionConfig) -> HydrogenResult<EnginePrivate> {
        let path = self.build_connection_string(config);
        let conn = Connection::open(&path)
            .map_err(|e| HydrogenError::engine_error(EngineKind::Sqlite, e.to_string()))?;
        Ok(EnginePrivate::new(
            EngineKind::Sqlite,
            SqliteConn {
                conn: Mutex::new(conn),
            },
        ))
    }

    fn disconnect(&self, conn: &mut EnginePrivate) -> HydrogenResult<()> {
        conn.downcast_ref::<SqliteConn>(EngineKind::Sqlite)
            .ok_or_else(|| HydrogenError::not_initialized("not a sqlite connection"))?;
        Ok(())
    }

    fn health_check(&self, conn: &EnginePrivate) -> bool {
        let Some(state) = conn.downcast_ref::<SqliteConn>(EngineKind::Sqlite) else {
            return false;
        };
        let guard = match state.conn.lock() {
            Ok(guard) => guard,
            Err(_) => return false,
        };
        guard.execute_batch("select 1").is_ok()
    }

    fn prepare(
        &self,
        conn: &EnginePrivate,
        _name: &str,
        sql: &str,
    ) -> HydrogenResult<EngineStmtHandle> {
        let state = conn
            .downcast_ref::<SqliteConn>(EngineKind::Sqlite)
            .ok_or_else(|| HydrogenError::not_initialized("not a sqlite connection"))?;
        let guard = state
            .conn
            .lock()
            .map_err(|_| HydrogenError::engine_error(EngineKind::Sqlite, "connection lock poisoned"))?;
        guard
            .prepare(sql)
            .map_err(|e| HydrogenError::engine_error(EngineKind::Sqlite, e.to_string()))?;
        Ok(Box::new(sql.to_owned()))
    }

    fn unprepare(&self, _conn: &EnginePrivate, _stmt: &mut EngineStmtHandle) -> HydrogenResult<()> {
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
            .downcast_ref::<SqliteConn>(EngineKind::Sqlite)
            .ok_or_else(|| HydrogenError::not_initialized("not a sqlite connection"))?;
        let sql_text = match stmt.and_then(|s| s.downcast_ref::<String>()) {
            Some(cached) => cached.as_str(),
            None => sql,
        };
        let guard = state
            .conn
            .lock()
            .map_err(|_| HydrogenError::engine_error(EngineKind::Sqlite, "connection lock poisoned"))?;
        let rows_affected = match decode_params(params)? {
            BoundParams::Positional(values) => {
                let refs: Vec<&dyn ToSql> = values.iter().map(|v| v as &dyn ToSql).collect();
                guard
                    .execute(sql_text, refs.as_slice())
                    .map_err(|e| HydrogenError::engine_error(EngineKind::Sqlite, e.to_string()))?
            }
            BoundParams::Named(pairs) => {
                let refs: Vec<(&str, &dyn ToSql)> =
                    pairs.iter().map(|(k, v)| (k.as_str(), v as &dyn ToSql)).collect();
                guard
                    .execute(sql_text, refs.as_slice())
                    .map_err(|e| HydrogenError::engine_error(EngineKind::Sqlite, e.to_string()))?
            }
        };
        Ok(ExecuteOutcome {
            rows_affected: rows_affected as u64,
            rows: Vec::new(),
        })
    }
}
