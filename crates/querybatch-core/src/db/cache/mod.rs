//! Result caching: keys, per-command caching information, and the store
//! contract the batch reads from and writes back to.

mod info;
mod key;
mod store;

pub use info::{CacheMode, CachingInformation, StorePolicy};
pub use key::CacheKey;
pub use store::{CacheStore, CachedRows, MemoryCacheStore};
