use crate::{
    db::{cache::CacheStore, command::SqlCommand, cursor::ResultCursor},
    error::InternalError,
};
use std::{collections::BTreeSet, time::Duration};

///
/// CommandProvider
///
/// Connection-level executor for physical commands. Execution is blocking
/// from the caller's point of view and never retried here.
///

pub trait CommandProvider {
    /// Whether several commands can be submitted as one unit.
    fn supports_batching(&self) -> bool;

    /// Execute `commands` in one round trip. The returned cursor yields one
    /// result set per command, in submission order.
    fn execute_batch(
        &self,
        commands: &[SqlCommand],
        timeout: Option<Duration>,
    ) -> Result<Box<dyn ResultCursor>, InternalError>;

    /// Execute one command standalone.
    fn execute(
        &self,
        command: &SqlCommand,
        timeout: Option<Duration>,
    ) -> Result<Box<dyn ResultCursor>, InternalError>;
}

///
/// Session
///
/// Unit-of-work collaborator owning flush decisions, the cache store and the
/// connection. The batch calls `auto_flush` once per execution.
///

pub trait Session {
    /// Flush pending changes touching `query_spaces`.
    /// Returns whether anything was flushed.
    fn auto_flush(&self, query_spaces: &BTreeSet<String>) -> Result<bool, InternalError>;

    /// Result cache, if the session has one configured.
    fn cache_store(&self) -> Option<&dyn CacheStore>;

    fn provider(&self) -> &dyn CommandProvider;

    /// Whether data cached at `timestamp` is still current for `query_spaces`.
    fn is_up_to_date(&self, query_spaces: &BTreeSet<String>, timestamp: u64) -> bool {
        let _ = (query_spaces, timestamp);
        true
    }

    /// Timestamp stamped onto entries written to the cache.
    fn timestamp(&self) -> u64;
}
