//! Core runtime for querybatch: query items, result caching, and the batch
//! orchestrator that runs heterogeneous queries in one round trip.
#![warn(unreachable_pub)]

pub mod config;
pub mod db;
pub mod error;
pub mod obs;
pub mod value;

// test
#[cfg(test)]
pub(crate) mod test_support;

///
/// Prelude
///
/// Prelude contains only the vocabulary needed to build and run batches.
///

pub mod prelude {
    pub use crate::{
        config::BatchConfig,
        db::{
            BatchItem, CacheMode, QueryBatch, QueryItem, Session, SqlCommand, TypedBatchItem,
        },
        value::{Row, Value},
    };
}
