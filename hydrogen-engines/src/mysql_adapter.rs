use std::sync::Mutex;

use mysql::prelude::Queryable;
use mysql::{Conn, Opts, Params, Statement, Value as MysqlValue};
use serde_json::Value;

use hydrogen_db_core::{
    ConnectionConfig, EngineAdapter, EngineKind, EnginePrivate, EngineStmtHandle, ExecuteOutcome,
    HydrogenError, HydrogenResult,
};

struct MysqlConn {
    conn: Mutex<Conn>,
}

fn json_scalar_to_mysql(value: &Value) -> HydrogenResult<MysqlValue> {
    Ok(match value {
        Value::Null => MysqlValue::NULL,
        Value::Bool(b) => MysqlValue::Int(*b as i64),
        Value::Number(n) => {
            if let Some(i) = n.as_i64() {
                MysqlValue::Int(i)
            } else if let Some(u) = n.as_u64() {
                MysqlValue::UInt(u)
            } else if let Some(f) = n.as_f64() {
                MysqlValue::Double(f)
            } else {
                return Err(HydrogenError::engine_error(
                    EngineKind::MySql,
                    "numeric bind parameter is not representable",
                ));
            }
        }
        Value::String(s) => MysqlValue::Bytes(s.clone().into_bytes()),
        Value::Array(_) | Value::Object(_) => {
            return Err(HydrogenError::engine_error(
                EngineKind::MySql,
                "nested arrays/objects are not valid bind parameters",
            ))
        }
    })
}

/// `parameters_json` carries either a JSON array (positional `?` markers) or
/// a JSON object (named `:name` markers); either maps onto `mysql::Params`.
fn json_to_mysql_params(params: &Value) -> HydrogenResult<Params> {
    match params {
        Value::Null => Ok(Params::Empty),
        Value::Object(map) if map.is_empty() => Ok(Params::Empty),
        Value::Object(map) => {
            let mut pairs = Vec::with_capacity(map.len());
            for (key, value) in map {
                pairs.push((key.clone(), json_scalar_to_mysql(value)?));
            }
            Ok(Params::from(pairs))
        }
        Value::Array(items) if items.is_empty() => Ok(Params::Empty),
        Value::Array(items) => {
            let values = items
                .iter()
                .map(json_scalar_to_mysql)
                .collect::<HydrogenResult<Vec<_>>>()?;
            Ok(Params::from(values))
        }
        _ => Err(HydrogenError::engine_error(
            EngineKind::MySql,
            "bind parameters must be a JSON array or object",
        )),
    }
}

pub struct MysqlAdapter;

impl MysqlAdapter {
    pub fn new() -> Self {
        MysqlAdapter
    }
}

impl Default for MysqlAdapter {
    fn default() -> Self {
        Self::new()
    }
}

impl EngineAdapter for MysqlAdapter {
    fn kind(&self) -> EngineKind {
        EngineKind::MySql
    }

    fn engine_version(&self) -> &'static str {
        env!("CARGO_PKG_VERSION")
    }

    fn engine_description(&self) -> &'static str {
        "MySQL/MariaDB (mysql crate, pure-Rust client)"
    }

    fn engine_is_available(&self) -> bool {
        true
    }

    fn validate_connection_string(&self, s: &str) -> bool {
        Opts::from_url(s).is_ok()
    }

    fn connect(&self, config: &ConnectionConfig) -> HydrogenResult<EnginePrivate> {
        let url = self.build_connection_string(config);
        let opts = Opts::from_url(&url)
            .map_err(|e| HydrogenError::engine_error(EngineKind::MySql, e.to_string()))?;
        let conn = Conn::new(opts)
            .map_err(|e| HydrogenError::engine_error(EngineKind::MySql, e.to_string()))?;
        Ok(EnginePrivate::new(
            EngineKind::MySql,
            MysqlConn {
                conn: Mutex::new(conn),
            },
        ))
    }

    fn disconnect(&self, conn: &mut EnginePrivate) -> HydrogenResult<()> {
        conn.downcast_ref::<MysqlConn>(EngineKind::MySql)
            .ok_or_else(|| HydrogenError::not_initialized("not a mysql connection"))?;
        Ok(())
    }

    fn health_check(&self, conn: &EnginePrivate) -> bool {
        let Some(state) = conn.downcast_ref::<MysqlConn>(EngineKind::MySql) else {
            return false;
        };
        let mut guard = match state.conn.lock() {
            Ok(guard) => guard,
            Err(_) => return false,
        };
        guard.ping()
    }

    fn prepare(
        &self,
        conn: &EnginePrivate,
        _name: &str,
        sql: &str,
    ) -> HydrogenResult<EngineStmtHandle> {
        let state = conn
            .downcast_ref::<MysqlConn>(EngineKind::MySql)
            .ok_or_else(|| HydrogenError::not_initialized("not a mysql connection"))?;
        let mut guard = state
            .conn
            .lock()
            .map_err(|_| HydrogenError::engine_error(EngineKind::MySql, "connection lock poisoned"))?;
        let stmt: Statement = guard
            .prep(sql)
            .map_err(|e| HydrogenError::engine_error(EngineKind::MySql, e.to_string()))?;
        Ok(Box::new(stmt))
    }

    fn unprepare(&self, conn: &EnginePrivate, stmt: &mut EngineStmtHandle) -> HydrogenResult<()> {
        let state = conn
            .downcast_ref::<MysqlConn>(EngineKind::MySql)
            .ok_or_else(|| HydrogenError::not_initialized("not a mysql connection"))?;
        if let Some(stmt) = stmt.downcast_mut::<Statement>() {
            let mut guard = state.conn.lock().map_err(|_| {
                HydrogenError::engine_error(EngineKind::MySql, "connection lock poisoned")
            })?;
            guard
                .close(stmt.clone())
                .map_err(|e| HydrogenError::engine_error(EngineKind::MySql, e.to_string()))?;
        }
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
            .downcast_ref::<MysqlConn>(EngineKind::MySql)
            .ok_or_else(|| HydrogenError::not_initialized("not a mysql connection"))?;
        let mut guard = state
            .conn
            .lock()
            .map_err(|_| HydrogenError::engine_error(EngineKind::MySql, "connection lock poisoned"))?;
        let bound = json_to_mysql_params(params)?;
        let affected = match stmt.and_then(|s| s.downcast_ref::<Statement>()) {
            Some(prepared) => guard
                .exec_drop(prepared, bound)
                .map(|_| guard.affected_rows())
                .map_err(|e| HydrogenError::engine_error(EngineKind::MySql, e.to_string()))?,
            None => guard
                .exec_drop(sql, bound)
                .map(|_| guard.affected_rows())
                .map_err(|e| HydrogenError::engine_error(EngineKind::MySql, e.to_string()))?,
        };
        Ok(ExecuteOutcome {
            rows_affected: affected,
            rows: Vec::new(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn connection_string_composition_matches_core_builder() {
        let adapter = MysqlAdapter::new();
        let cfg = ConnectionConfig {
            host: Some("db.internal".to_owned()),
            database: Some("hydrogen".to_owned()),
            ..Default::default()
        };
        assert_eq!(
            adapter.build_connection_string(&cfg),
            "mysql://:@db.internal:3306/hydrogen"
        );
    }

    #[test]
    fn rejects_an_unparsable_url() {
        let adapter = MysqlAdapter::new();
        assert!(!adapter.validate_connection_string("not-a-url"));
    }

    #[test]
    fn null_parameters_bind_as_empty() {
        assert!(matches!(
            json_to_mysql_params(&Value::Null).unwrap(),
            Params::Empty
        ));
    }

    #[test]
    fn array_parameters_bind_positionally() {
        let params = serde_json::json!(["alice", 42]);
        assert!(matches!(
            json_to_mysql_params(&params).unwrap(),
            Params::Positional(_)
        ));
    }

    #[test]
    fn object_parameters_bind_by_name() {
        let params = serde_json::json!({"name": "alice", "age": 42});
        assert!(matches!(
            json_to_mysql_params(&params).unwrap(),
            Params::Named(_)
        ));
    }

    #[test]
    fn nested_parameters_are_rejected() {
        let params = serde_json::json!([["nested"]]);
        assert!(json_to_mysql_params(&params).is_err());
    }
}
