use ahash::AHashMap;
use parking_lot::RwLock;

use crate::descriptor::Ordering;

/// Shape of an enumeration statement. Predicate values are bound at execute
/// time, so one cached SQL string serves every request with the same shape.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub(crate) struct StatementKey {
    pub table: &'static str,
    pub ordering: Ordering,
    pub graph_scoped: bool,
    pub with_marker: bool,
    pub count: bool,
}

#[derive(Default)]
pub(crate) struct StatementCache {
    inner: RwLock<AHashMap<StatementKey, String>>,
}

impl StatementCache {
    pub fn new() -> Self {
        Self {
            inner: RwLock::new(AHashMap::new()),
        }
    }

    pub fn get(&self, key: &StatementKey) -> Option<String> {
        self.inner.read().get(key).cloned()
    }

    pub fn insert(&self, key: StatementKey, sql: String) {
        self.inner.write().insert(key, sql);
    }
}
