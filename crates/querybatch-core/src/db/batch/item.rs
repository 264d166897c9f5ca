use crate::{
    db::{
        cache::CachingInformation,
        command::SqlCommand,
        cursor::{AlignedCursor, ResultCursor, ScopedCursor},
        session::Session,
    },
    error::InternalError,
    value::Row,
};
use std::{collections::BTreeSet, time::Duration};

/// Post-processing hook run once, right after an item's results are final.
pub type AfterLoadCallback<T> = Box<dyn FnOnce(&[T])>;

///
/// BatchItem
///
/// Object-safe contract between one logical query and the batch that drives
/// it. The batch calls, in order: `init`, `query_spaces`,
/// `caching_information`, `apply_cache_hit` (per hit), `commands`,
/// `process_results_set` (once per returned command, or
/// `fetch_non_batched` instead), then `process_results` exactly once.
///

pub trait BatchItem {
    /// Delayed initialization against the owning session.
    /// Must be called once, before any other operation.
    fn init(&mut self, session: &dyn Session) -> Result<(), InternalError>;

    /// Tables or entity spaces read by the query. Stable after `init`.
    fn query_spaces(&self) -> &BTreeSet<String>;

    /// One entry per physical command, in command order, or none at all when
    /// the item does not take part in result caching.
    fn caching_information(&self) -> &[CachingInformation];

    /// Satisfy command `index` from the cache. The command is then excluded
    /// from `commands` and its rows are merged in `process_results`.
    fn apply_cache_hit(&mut self, index: usize, rows: Vec<Row>) -> Result<(), InternalError>;

    /// Commands still to run, excluding cache hits. May be empty.
    fn commands(&self) -> Vec<SqlCommand>;

    /// Consume the result set of the next pending command and leave the
    /// cursor on the following result set. Returns the rows consumed.
    fn process_results_set(&mut self, cursor: &mut dyn ResultCursor)
    -> Result<usize, InternalError>;

    /// Merge cached and fetched rows into the final typed results and fire the
    /// after-load callback.
    fn process_results(&mut self) -> Result<(), InternalError>;

    /// Run each pending command in its own round trip and consume its single
    /// result set. Does not finalize. Returns the rows read per command.
    fn fetch_non_batched(
        &mut self,
        session: &dyn Session,
        timeout: Option<Duration>,
    ) -> Result<Vec<usize>, InternalError> {
        let mut rows = Vec::new();
        for command in self.commands() {
            let mut cursor = ScopedCursor::new(session.provider().execute(&command, timeout)?);
            let mut aligned = AlignedCursor::new(cursor.as_dyn());
            rows.push(self.process_results_set(&mut aligned)?);
            aligned.expect_aligned(1, 1)?;
        }

        Ok(rows)
    }

    /// Run the pending commands standalone and finalize, leaving the item in
    /// the same state `process_results` would. Returns the rows fetched.
    fn execute_non_batched(
        &mut self,
        session: &dyn Session,
        timeout: Option<Duration>,
    ) -> Result<usize, InternalError> {
        let rows = self.fetch_non_batched(session, timeout)?;
        self.process_results()?;

        Ok(rows.iter().sum())
    }

    /// Freshly fetched rows eligible for cache write-back, keyed by caching
    /// information index.
    fn results_to_cache(&self) -> Vec<(usize, Vec<Row>)>;

    /// Short name used in logs.
    fn label(&self) -> &str {
        "query"
    }
}

///
/// TypedBatchItem
///
/// Typed view of a batch item's finalized results.
///

pub trait TypedBatchItem: BatchItem {
    type Output;

    /// Finalized results. Fails before `process_results`.
    fn results(&self) -> Result<&[Self::Output], InternalError>;

    /// Move the finalized results out of the item.
    fn take_results(&mut self) -> Result<Vec<Self::Output>, InternalError>;

    fn set_after_load_callback(&mut self, callback: AfterLoadCallback<Self::Output>);
}
