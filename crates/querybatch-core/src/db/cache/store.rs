use crate::{
    db::cache::{CacheKey, StorePolicy},
    error::InternalError,
    value::Row,
};
use std::{cell::RefCell, collections::HashMap};

///
/// CachedRows
///
/// Rows stored for one command, stamped with the session timestamp at which
/// they were written. The timestamp is compared against query-space update
/// timestamps to reject stale entries.
///

#[derive(Clone, Debug, PartialEq)]
pub struct CachedRows {
    pub rows: Vec<Row>,
    pub timestamp: u64,
}

///
/// CacheStore
///
/// Physical result cache. The batch only ever calls `get` and `put`.
///

pub trait CacheStore {
    fn get(&self, key: &CacheKey) -> Result<Option<CachedRows>, InternalError>;

    /// Store `entry` under `key`. Returns whether a write happened.
    fn put(
        &self,
        key: &CacheKey,
        entry: CachedRows,
        policy: StorePolicy,
    ) -> Result<bool, InternalError>;
}

///
/// MemoryCacheStore
///
/// Single-threaded in-memory store.
///

#[derive(Debug, Default)]
pub struct MemoryCacheStore {
    entries: RefCell<HashMap<CacheKey, CachedRows>>,
}

impl MemoryCacheStore {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.borrow().len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.borrow().is_empty()
    }

    pub fn clear(&self) {
        self.entries.borrow_mut().clear();
    }

    /// Drop every entry of one region.
    pub fn evict_region(&self, region: &str) {
        self.entries
            .borrow_mut()
            .retain(|key, _| key.region() != region);
    }
}

impl CacheStore for MemoryCacheStore {
    fn get(&self, key: &CacheKey) -> Result<Option<CachedRows>, InternalError> {
        Ok(self.entries.borrow().get(key).cloned())
    }

    fn put(
        &self,
        key: &CacheKey,
        entry: CachedRows,
        policy: StorePolicy,
    ) -> Result<bool, InternalError> {
        let mut entries = self.entries.borrow_mut();
        if policy.minimal_puts
            && entries
                .get(key)
                .is_some_and(|existing| existing.timestamp >= entry.timestamp)
        {
            return Ok(false);
        }
        entries.insert(key.clone(), entry);

        Ok(true)
    }
}
