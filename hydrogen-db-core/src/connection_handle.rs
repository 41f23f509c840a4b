use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex};

use serde_json::Value;

use crate::adapter::{EnginePrivate, EngineAdapter, ExecuteOutcome};
use crate::connection_config::ConnectionConfig;
use crate::engine_kind::EngineKind;
use crate::error::{HydrogenError, HydrogenResult};
use crate::prepared_statement::{LruTicketSource, PreparedStatementCache};

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ConnectionStatus {
    Connected,
    Disconnected,
    Error,
}

/// A live engine connection plus its prepared-statement cache, guarded by a
/// single per-handle mutex so engine calls are always serialized: no lock is
/// ever held across an engine-library call other than this one.
pub struct ConnectionHandle {
    id: u64,
    engine_type: EngineKind,
    designator: String,
    adapter: Arc<dyn EngineAdapter>,
    inner: Mutex<Inner>,
}

fn next_handle_id() -> u64 {
    static NEXT: AtomicU64 = AtomicU64::new(1);
    NEXT.fetch_add(1, Ordering::Relaxed)
}

struct Inner {
    status: ConnectionStatus,
    engine_private: Option<EnginePrivate>,
    cache: PreparedStatementCache,
    /// Statements prepared with `add_to_cache = false`: tracked so a later
    /// `execute`/`unprepare` by name still works, but exempt from LRU
    /// eviction bookkeeping.
    scratch: PreparedStatementCache,
    tickets: LruTicketSource,
}

/// An opaque reference to a prepared statement returned from
/// [`ConnectionHandle::prepare`]. Carries nothing engine-specific; the real
/// state lives in the connection's cache.
#[derive(Clone, Debug)]
pub struct StatementToken {
    pub name: String,
    cached: bool,
}

impl ConnectionHandle {
    /// Opens a new connection via `adapter.connect`. `designator` must be
    /// non-empty.
    pub fn connect(
        adapter: Arc<dyn EngineAdapter>,
        designator: impl Into<String>,
        config: &ConnectionConfig,
    ) -> HydrogenResult<Self> {
        let designator = designator.into();
        if designator.is_empty() {
            return Err(HydrogenError::invalid_argument(
                "connection designator must not be empty",
            ));
        }
        let engine_private = adapter.connect(config)?;
        let cache_size = config.cache_size();
        Ok(ConnectionHandle {
            id: next_handle_id(),
            engine_type: adapter.kind(),
            designator,
            adapter,
            inner: Mutex::new(Inner {
                status: ConnectionStatus::Connected,
                engine_private: Some(engine_private),
                cache: PreparedStatementCache::new(cache_size),
                scratch: PreparedStatementCache::new(u32::MAX),
                tickets: LruTicketSource::default(),
            }),
        })
    }

    /// A process-unique identity, stable for this handle's lifetime. Pools
    /// use it to verify a released handle is one they actually issued
    /// before accepting it back into the idle set.
    pub fn id(&self) -> u64 {
        self.id
    }

    pub fn engine_type(&self) -> EngineKind {
        self.engine_type
    }

    pub fn designator(&self) -> &str {
        &self.designator
    }

    pub fn status(&self) -> ConnectionStatus {
        self.inner.lock().expect("connection mutex poisoned").status
    }

    pub fn is_connected(&self) -> bool {
        self.status() == ConnectionStatus::Connected
    }

    /// If `add_to_cache` and the bounded cache is full, evicts the LRU
    /// entry first and finalizes its engine-private handle.
    pub fn prepare(
        &self,
        name: &str,
        sql: &str,
        add_to_cache: bool,
    ) -> HydrogenResult<StatementToken> {
        if name.is_empty() || sql.is_empty() {
            return Err(HydrogenError::invalid_argument(
                "prepare requires a non-empty name and sql",
            ));
        }
        let mut inner = self.inner.lock().expect("connection mutex poisoned");
        let Inner {
            status,
            engine_private,
            cache,
            scratch,
            tickets,
        } = &mut *inner;
        if *status != ConnectionStatus::Connected {
            return Err(HydrogenError::not_initialized(
                "connection is not live; cannot prepare a statement",
            ));
        }
        let conn = engine_private
            .as_ref()
            .ok_or_else(|| HydrogenError::not_initialized("connection has no live handle"))?;

        let target = if add_to_cache { cache } else { scratch };
        if target.contains(name) {
            target.touch(name, tickets);
            return Ok(StatementToken {
                name: name.to_owned(),
                cached: add_to_cache,
            });
        }
        if add_to_cache && target.is_full() {
            if let Some(mut evicted) = target.evict_lru() {
                if let Some(mut handle) = evicted.engine_specific_handle.take() {
                    // Best-effort: an eviction failure at the engine level
                    // doesn't block admitting the new statement.
                    let _ = self.adapter.unprepare(conn, &mut handle);
                }
            }
        }
        let handle = match self.adapter.prepare(conn, name, sql) {
            Ok(handle) => handle,
            Err(e) => return Err(e),
        };
        target.insert(name.to_owned(), sql.to_owned(), tickets);
        if let Some(entry) = target.get_mut(name) {
            entry.engine_specific_handle = Some(handle);
        }
        Ok(StatementToken {
            name: name.to_owned(),
            cached: add_to_cache,
        })
    }

    /// Bumps usage count and LRU ticket, then delegates to the adapter.
    pub fn execute_prepared(
        &self,
        token: &StatementToken,
        params: &Value,
    ) -> HydrogenResult<ExecuteOutcome> {
        let mut inner = self.inner.lock().expect("connection mutex poisoned");
        let Inner {
            status,
            engine_private,
            cache,
            scratch,
            tickets,
        } = &mut *inner;
        if *status != ConnectionStatus::Connected {
            return Err(HydrogenError::not_initialized(
                "connection is not live; cannot execute a prepared statement",
            ));
        }
        let conn = engine_private
            .as_ref()
            .ok_or_else(|| HydrogenError::not_initialized("connection has no live handle"))?;
        let target = if token.cached { cache } else { &mut *scratch };
        target.touch(&token.name, tickets);
        let entry = target
            .get(&token.name)
            .ok_or_else(|| HydrogenError::not_found(format!("no such statement: {}", token.name)))?;
        let stmt_handle = entry.engine_specific_handle.as_ref();
        self.adapter
            .execute(conn, stmt_handle, &entry.sql_template, params)
    }

    /// Removes from whichever cache holds it and finalizes the
    /// engine-private handle.
    pub fn unprepare(&self, token: StatementToken) -> HydrogenResult<()> {
        let mut inner = self.inner.lock().expect("connection mutex poisoned");
        let Inner {
            engine_private,
            cache,
            scratch,
            ..
        } = &mut *inner;
        let target = if token.cached { cache } else { &mut *scratch };
        let Some(mut entry) = target.remove(&token.name) else {
            return Err(HydrogenError::not_found(format!(
                "no such statement: {}",
                token.name
            )));
        };
        if let (Some(conn), Some(mut handle)) = (
            engine_private.as_ref(),
            entry.engine_specific_handle.take(),
        ) {
            self.adapter.unprepare(conn, &mut handle)?;
        }
        Ok(())
    }

    /// Runs an ad-hoc (non-prepared) statement directly.
    pub fn execute(&self, sql: &str, params: &Value) -> HydrogenResult<ExecuteOutcome> {
        let inner = self.inner.lock().expect("connection mutex poisoned");
        if inner.status != ConnectionStatus::Connected {
            return Err(HydrogenError::not_initialized(
                "connection is not live; cannot execute",
            ));
        }
        let conn = inner
            .engine_private
            .as_ref()
            .ok_or_else(|| HydrogenError::not_initialized("connection has no live handle"))?;
        self.adapter.execute(conn, None, sql, params)
    }

    /// Performs one health check. Returns `true` and leaves the connection
    /// live on success; on failure flips status to `Disconnected` and drops
    /// the engine-private state so the next heartbeat tick takes the
    /// reconnect branch.
    pub fn health_check(&self) -> bool {
        let mut inner = self.inner.lock().expect("connection mutex poisoned");
        let healthy = match &inner.engine_private {
            Some(conn) => self.adapter.health_check(conn),
            None => false,
        };
        if !healthy {
            inner.status = ConnectionStatus::Disconnected;
            inner.engine_private = None;
        } else {
            inner.status = ConnectionStatus::Connected;
        }
        healthy
    }

    /// Engine-level `disconnect`: sets status, then frees the cache, then
    /// the engine-private state, then (by consuming `self`) the designator.
    /// Always returns success even if the underlying engine reported an
    /// error -- the handle is already unusable at that point.
    pub fn disconnect(self) -> HydrogenResult<()> {
        let mut inner = self.inner.lock().expect("connection mutex poisoned");
        inner.status = ConnectionStatus::Disconnected;
        inner.cache = PreparedStatementCache::new(1);
        inner.scratch = PreparedStatementCache::new(1);
        if let Some(mut conn) = inner.engine_private.take() {
            let _ = self.adapter.disconnect(&mut conn);
        }
        drop(inner);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::MockAdapter;

    fn handle(kind: EngineKind) -> ConnectionHandle {
        let adapter: Arc<dyn EngineAdapter> = Arc::new(MockAdapter::new(kind));
        ConnectionHandle::connect(adapter, "test-designator", &ConnectionConfig::default()).unwrap()
    }

    #[test]
    fn rejects_empty_designator() {
        let adapter: Arc<dyn EngineAdapter> = Arc::new(MockAdapter::new(EngineKind::Sqlite));
        let err =
            ConnectionHandle::connect(adapter, "", &ConnectionConfig::default()).unwrap_err();
        assert!(matches!(
            err.kind(),
            crate::error::HydrogenErrorKind::InvalidArgument(_)
        ));
    }

    #[test]
    fn prepare_then_execute_bumps_usage_count() {
        let h = handle(EngineKind::Sqlite);
        let token = h.prepare("stmt1", "select 1", true).unwrap();
        h.execute_prepared(&token, &Value::Null).unwrap();
        h.execute_prepared(&token, &Value::Null).unwrap();
        let inner = h.inner.lock().unwrap();
        assert_eq!(inner.cache.get("stmt1").unwrap().usage_count, 2);
    }

    #[test]
    fn duplicate_prepare_does_not_grow_cache() {
        let h = handle(EngineKind::Sqlite);
        h.prepare("stmt1", "select 1", true).unwrap();
        h.prepare("stmt1", "select 1", true).unwrap();
        let inner = h.inner.lock().unwrap();
        assert_eq!(inner.cache.len(), 1);
    }

    #[test]
    fn eviction_happens_when_cache_is_full() {
        let adapter: Arc<dyn EngineAdapter> = Arc::new(MockAdapter::new(EngineKind::Sqlite));
        let config = ConnectionConfig {
            prepared_statement_cache_size: Some(1),
            ..Default::default()
        };
        let h = ConnectionHandle::connect(adapter, "d", &config).unwrap();
        h.prepare("a", "select 1", true).unwrap();
        h.prepare("b", "select 2", true).unwrap();
        let inner = h.inner.lock().unwrap();
        assert_eq!(inner.cache.len(), 1);
        assert!(inner.cache.contains("b"));
        assert!(!inner.cache.contains("a"));
    }

    #[test]
    fn health_check_failure_drops_the_connection() {
        let adapter = Arc::new(MockAdapter::new(EngineKind::Sqlite));
        adapter.set_healthy(false);
        let h = ConnectionHandle::connect(
            adapter.clone() as Arc<dyn EngineAdapter>,
            "d",
            &ConnectionConfig::default(),
        )
        .unwrap();
        assert!(!h.health_check());
        assert_eq!(h.status(), ConnectionStatus::Disconnected);
    }

    #[test]
    fn disconnect_always_succeeds_even_on_engine_error() {
        let adapter = Arc::new(MockAdapter::new(EngineKind::Sqlite));
        adapter.fail_disconnect();
        let h = ConnectionHandle::connect(
            adapter as Arc<dyn EngineAdapter>,
            "d",
            &ConnectionConfig::default(),
        )
        .unwrap();
        assert!(h.disconnect().is_ok());
    }
}
