use std::collections::HashMap;
use std::sync::{Arc, Mutex, RwLock};

use hydrogen_db_core::{
    ConnectionConfig, ConnectionHandle, EngineAdapter, EngineKind, HydrogenError, HydrogenResult,
};

/// A per-connection-string bounded pool, synchronous and hand-rolled: the
/// idle/busy split and "no blocking wait" acquire rule don't map onto a
/// generic async pool crate's acquire-and-await contract.
pub struct ConnectionPool {
    designator: String,
    engine_type: EngineKind,
    capacity: usize,
    adapter: Arc<dyn EngineAdapter>,
    config: ConnectionConfig,
    state: Mutex<PoolState>,
}

#[derive(Default)]
struct PoolState {
    idle: Vec<ConnectionHandle>,
    /// Ids of handles currently checked out. The handles themselves are
    /// owned by whichever caller is holding them; the pool only remembers
    /// which ids it issued, so `release` can verify provenance.
    busy_ids: Vec<u64>,
}

/// A read-only accounting snapshot, exposed for metrics/heartbeat reporting.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct PoolStats {
    pub idle: usize,
    pub busy: usize,
    pub capacity: usize,
}

impl ConnectionPool {
    pub fn new(
        designator: impl Into<String>,
        adapter: Arc<dyn EngineAdapter>,
        config: ConnectionConfig,
        capacity: usize,
    ) -> Self {
        ConnectionPool {
            designator: designator.into(),
            engine_type: adapter.kind(),
            capacity: capacity.max(1),
            adapter,
            config,
            state: Mutex::new(PoolState::default()),
        }
    }

    pub fn designator(&self) -> &str {
        &self.designator
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    pub fn engine_type(&self) -> EngineKind {
        self.engine_type
    }

    pub fn stats(&self) -> PoolStats {
        let state = self.state.lock().expect("pool mutex poisoned");
        PoolStats {
            idle: state.idle.len(),
            busy: state.busy_ids.len(),
            capacity: self.capacity,
        }
    }

    /// Reuse an idle handle, else synthesize a new one if under capacity,
    /// else fail without blocking. The returned handle is tracked in `busy`
    /// by id until it comes back through [`Self::release`].
    pub fn acquire(&self) -> HydrogenResult<ConnectionHandle> {
        let mut state = self.state.lock().expect("pool mutex poisoned");
        let handle = if let Some(handle) = state.idle.pop() {
            handle
        } else if state.idle.len() + state.busy_ids.len() < self.capacity {
            ConnectionHandle::connect(self.adapter.clone(), self.designator.clone(), &self.config)?
        } else {
            return Err(HydrogenError::resource_exhausted(format!(
                "pool {} is at capacity ({})",
                self.designator, self.capacity
            )));
        };
        state.busy_ids.push(handle.id());
        Ok(handle)
    }

    /// The handle must currently be tracked as busy; otherwise this is a
    /// no-op that returns `false`.
    pub fn release(&self, handle: ConnectionHandle) -> bool {
        let mut state = self.state.lock().expect("pool mutex poisoned");
        match state.busy_ids.iter().position(|&id| id == handle.id()) {
            Some(pos) => {
                state.busy_ids.remove(pos);
                state.idle.push(handle);
                true
            }
            None => false,
        }
    }
}

/// A singleton registry: designator -> pool, guarded by one lock. `init` is
/// idempotent: a second call with the pool already present is a no-op that
/// returns the existing pool.
#[derive(Default)]
pub struct GlobalPoolManager {
    pools: RwLock<HashMap<String, Arc<ConnectionPool>>>,
}

impl GlobalPoolManager {
    pub fn new() -> Self {
        GlobalPoolManager::default()
    }

    pub fn init(
        &self,
        designator: impl Into<String>,
        adapter: Arc<dyn EngineAdapter>,
        config: ConnectionConfig,
        capacity: usize,
    ) -> Arc<ConnectionPool> {
        let designator = designator.into();
        {
            let pools = self.pools.read().expect("pool manager lock poisoned");
            if let Some(existing) = pools.get(&designator) {
                return existing.clone();
            }
        }
        let mut pools = self.pools.write().expect("pool manager lock poisoned");
        pools
            .entry(designator.clone())
            .or_insert_with(|| Arc::new(ConnectionPool::new(designator, adapter, config, capacity)))
            .clone()
    }

    pub fn get(&self, designator: &str) -> Option<Arc<ConnectionPool>> {
        self.pools
            .read()
            .expect("pool manager lock poisoned")
            .get(designator)
            .cloned()
    }

    pub fn len(&self) -> usize {
        self.pools.read().expect("pool manager lock poisoned").len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use hydrogen_db_core::test_support::MockAdapter;

    fn pool(capacity: usize) -> ConnectionPool {
        let adapter: Arc<dyn EngineAdapter> = Arc::new(MockAdapter::new(EngineKind::Sqlite));
        ConnectionPool::new("testdb", adapter, ConnectionConfig::default(), capacity)
    }

    #[test]
    fn acquire_respects_capacity() {
        let p = pool(1);
        let h1 = p.acquire().unwrap();
        assert!(p.acquire().is_err());
        let stats = p.stats();
        assert_eq!(stats.busy, 1);
        assert_eq!(stats.idle, 0);
        assert!(p.release(h1));
    }

    #[test]
    fn release_of_unknown_handle_is_a_no_op() {
        let p = pool(2);
        let foreign_adapter: Arc<dyn EngineAdapter> = Arc::new(MockAdapter::new(EngineKind::Sqlite));
        let foreign = ConnectionHandle::connect(foreign_adapter, "other", &ConnectionConfig::default()).unwrap();
        assert!(!p.release(foreign));
    }

    #[test]
    fn acquire_then_release_reuses_the_idle_handle() {
        let p = pool(1);
        let h = p.acquire().unwrap();
        let id = h.id();
        assert!(p.release(h));
        let h2 = p.acquire().unwrap();
        assert_eq!(h2.id(), id);
    }

    #[test]
    fn init_is_idempotent() {
        let mgr = GlobalPoolManager::new();
        let adapter: Arc<dyn EngineAdapter> = Arc::new(MockAdapter::new(EngineKind::Sqlite));
        let a = mgr.init("testdb", adapter.clone(), ConnectionConfig::default(), 4);
        let b = mgr.init("testdb", adapter, ConnectionConfig::default(), 99);
        assert!(Arc::ptr_eq(&a, &b));
        assert_eq!(a.capacity(), 4);
        assert_eq!(mgr.len(), 1);
    }
}
