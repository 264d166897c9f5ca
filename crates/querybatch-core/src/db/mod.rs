//! Batching engine: commands, cursors, caching, collaborator contracts and
//! the batch orchestrator.

pub mod batch;
pub mod cache;
pub mod command;
pub mod cursor;
pub mod session;

// re-exports
pub use batch::{
    AfterLoadCallback, BatchItem, BatchReport, BatchState, DispatchPath, ItemHandle, QueryBatch,
    QueryItem, RowMapper, TypedBatchItem,
};
pub use cache::{
    CacheKey, CacheMode, CacheStore, CachedRows, CachingInformation, MemoryCacheStore, StorePolicy,
};
pub use command::SqlCommand;
pub use cursor::{MemoryCursor, ResultCursor, read_result_set};
pub use session::{CommandProvider, Session};
