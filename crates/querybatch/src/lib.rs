//! ## Crate layout
//! - `core`: query items, result caching, cursors and the batch orchestrator.
//! - `db`: public batch facade that reports `querybatch::Error`.
//! - `error`: public error taxonomy.
//!
//! The `prelude` module exposes what a caller needs to build and run batches.

pub use querybatch_core as core;

pub mod db;
pub mod error;

//
// Consts
//

/// Workspace version re-export for downstream tooling/tests.
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

pub use error::Error;

///
/// Prelude
/// using _ brings traits into scope and avoids name conflicts
///

pub mod prelude {
    pub use crate::{
        core::{
            config::BatchConfig,
            db::{
                BatchItem as _, CacheMode, CommandProvider, ItemHandle, QueryItem, ResultCursor,
                Session, SqlCommand, TypedBatchItem as _,
            },
            row,
            value::{Row, Value},
        },
        db::Batch,
        error::Error,
    };
}
