use std::any::Any;
use std::collections::HashMap;

use time::OffsetDateTime;

/// Engine-specific prepared-statement state. Concrete adapters downcast this
/// back to their own handle type; `hydrogen-db-core` never needs to know
/// what's inside.
pub type EngineStmtHandle = Box<dyn Any + Send>;

/// A single named prepared statement. Identity is `(owning connection, name)`;
/// the owning connection is implicit (whichever `PreparedStatementCache`
/// holds it).
pub struct PreparedStatement {
    pub name: String,
    pub sql_template: String,
    pub usage_count: u64,
    pub engine_specific_handle: Option<EngineStmtHandle>,
    pub created_at: OffsetDateTime,
    lru_ticket: u64,
}

impl PreparedStatement {
    pub fn lru_ticket(&self) -> u64 {
        self.lru_ticket
    }
}

/// Hands out strictly increasing tickets, one per connection. Tickets are
/// never reused, so the oldest live ticket always identifies the least
/// recently used entry.
#[derive(Default)]
pub struct LruTicketSource(u64);

impl LruTicketSource {
    pub fn next(&mut self) -> u64 {
        self.0 += 1;
        self.0
    }
}

/// Bounded cache of named prepared statements, keyed by name, with LRU
/// eviction when full. A single map rather than a name/id pair of
/// collections, since eviction needs by-ticket scanning rather than a
/// stable id<->name lookup.
pub struct PreparedStatementCache {
    capacity: u32,
    entries: HashMap<String, PreparedStatement>,
}

impl PreparedStatementCache {
    pub fn new(capacity: u32) -> Self {
        PreparedStatementCache {
            capacity: capacity.max(1),
            entries: HashMap::new(),
        }
    }

    pub fn capacity(&self) -> u32 {
        self.capacity
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn is_full(&self) -> bool {
        self.entries.len() as u32 >= self.capacity
    }

    pub fn contains(&self, name: &str) -> bool {
        self.entries.contains_key(name)
    }

    pub fn get(&self, name: &str) -> Option<&PreparedStatement> {
        self.entries.get(name)
    }

    pub fn get_mut(&mut self, name: &str) -> Option<&mut PreparedStatement> {
        self.entries.get_mut(name)
    }

    /// Bumps usage and refreshes the LRU ticket. Returns `false` if `name`
    /// isn't present.
    pub fn touch(&mut self, name: &str, tickets: &mut LruTicketSource) -> bool {
        match self.entries.get_mut(name) {
            Some(entry) => {
                entry.usage_count += 1;
                entry.lru_ticket = tickets.next();
                true
            }
            None => false,
        }
    }

    /// Inserts a freshly-prepared statement, stamping it with a new ticket.
    /// A duplicate name is idempotent: the existing entry's ticket is
    /// refreshed and `count` is left untouched.
    pub fn insert(&mut self, name: String, sql_template: String, tickets: &mut LruTicketSource) {
        if self.touch(&name, tickets) {
            return;
        }
        self.entries.insert(
            name.clone(),
            PreparedStatement {
                name,
                sql_template,
                usage_count: 0,
                engine_specific_handle: None,
                created_at: OffsetDateTime::now_utc(),
                lru_ticket: tickets.next(),
            },
        );
    }

    pub fn remove(&mut self, name: &str) -> Option<PreparedStatement> {
        self.entries.remove(name)
    }

    /// Removes and returns the entry with the minimum LRU ticket, i.e. the
    /// least-recently-referenced one. `None` if the cache is empty.
    pub fn evict_lru(&mut self) -> Option<PreparedStatement> {
        let victim = self
            .entries
            .values()
            .min_by_key(|entry| entry.lru_ticket)
            .map(|entry| entry.name.clone())?;
        self.entries.remove(&victim)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn duplicate_insert_is_idempotent_on_count() {
        let mut cache = PreparedStatementCache::new(10);
        let mut tickets = LruTicketSource::default();
        cache.insert("a".into(), "select 1".into(), &mut tickets);
        cache.insert("a".into(), "select 1".into(), &mut tickets);
        assert_eq!(cache.len(), 1);
    }

    #[test]
    fn tickets_are_strictly_increasing() {
        let mut cache = PreparedStatementCache::new(10);
        let mut tickets = LruTicketSource::default();
        cache.insert("a".into(), "select 1".into(), &mut tickets);
        cache.insert("b".into(), "select 2".into(), &mut tickets);
        let a = cache.get("a").unwrap().lru_ticket();
        let b = cache.get("b").unwrap().lru_ticket();
        assert!(b > a);
        cache.touch("a", &mut tickets);
        assert!(cache.get("a").unwrap().lru_ticket() > b);
    }

    #[test]
    fn eviction_picks_minimum_ticket() {
        let mut cache = PreparedStatementCache::new(2);
        let mut tickets = LruTicketSource::default();
        cache.insert("a".into(), "select 1".into(), &mut tickets);
        cache.insert("b".into(), "select 2".into(), &mut tickets);
        assert!(cache.is_full());
        cache.touch("b", &mut tickets);
        let evicted = cache.evict_lru().unwrap();
        assert_eq!(evicted.name, "a");
    }

    #[test]
    fn cache_size_floor_is_one() {
        let cache = PreparedStatementCache::new(0);
        assert_eq!(cache.capacity(), 1);
    }
}
