//! Query batching: several heterogeneous queries, one round trip.
//!
//! Collection order is the single source of truth for command submission,
//! cursor demultiplexing and the non-batched fallback.

mod item;
mod query_item;


use crate::{
    config::BatchConfig,
    db::{
        cache::{CacheStore, CachedRows, CachingInformation},
        command::CommandSet,
        cursor::{AlignedCursor, ScopedCursor},
        session::Session,
    },
    error::InternalError,
    obs::sink::{
        BatchSpan, CacheOutcome, DispatchKind, MetricsEvent, MetricsSink, record,
        with_metrics_sink,
    },
    value::Row,
};
use std::{
    any::{Any, type_name},
    collections::{BTreeMap, BTreeSet},
    fmt,
    marker::PhantomData,
};
use tracing::{debug, warn};

// re-exports
pub use item::{AfterLoadCallback, BatchItem, TypedBatchItem};
pub use query_item::{QueryItem, RowMapper};

///
/// ErasedItem
///
/// Batch-internal view of an enrolled item: the object-safe contract plus
/// downcasting for typed result retrieval.
///

trait ErasedItem: BatchItem {
    fn as_any(&self) -> &dyn Any;
    fn as_any_mut(&mut self) -> &mut dyn Any;
}

impl<I: BatchItem + 'static> ErasedItem for I {
    fn as_any(&self) -> &dyn Any {
        self
    }

    fn as_any_mut(&mut self) -> &mut dyn Any {
        self
    }
}

///
/// ItemHandle
///
/// Typed position of one item inside the batch that returned it.
///

pub struct ItemHandle<I> {
    index: usize,
    _marker: PhantomData<fn() -> I>,
}

impl<I> ItemHandle<I> {
    const fn new(index: usize) -> Self {
        Self {
            index,
            _marker: PhantomData,
        }
    }

    #[must_use]
    pub const fn index(&self) -> usize {
        self.index
    }
}

impl<I> Clone for ItemHandle<I> {
    fn clone(&self) -> Self {
        *self
    }
}

impl<I> Copy for ItemHandle<I> {}

impl<I> fmt::Debug for ItemHandle<I> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("ItemHandle").field(&self.index).finish()
    }
}

///
/// BatchState
///

#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum BatchState {
    /// Accepting items; not executed yet.
    Collecting,
    /// Executed successfully; results are retrievable.
    Executed,
    /// Execution failed; results are withheld and re-execution is rejected.
    Failed,
}

///
/// DispatchPath
///

#[derive(Clone, Copy, Debug, Default, Eq, PartialEq)]
pub enum DispatchPath {
    /// Nothing to run and nothing cached.
    #[default]
    Empty,
    /// Every command was satisfied by the cache.
    CacheOnly,
    /// All pending commands went out as one unit.
    Batched,
    /// The provider cannot batch; each item ran standalone.
    NonBatched,
}

///
/// BatchReport
///
/// Execution summary returned by `QueryBatch::execute`.
///

#[derive(Clone, Debug, Default, Eq, PartialEq)]
pub struct BatchReport {
    pub items: usize,
    pub commands: usize,
    pub round_trips: usize,
    pub cache_hits: usize,
    pub cache_misses: usize,
    pub rows: usize,
    pub path: DispatchPath,
}

///
/// QueryBatch
///
/// Orchestrates one execution of an ordered set of query items against a
/// session. Single use: a batch executes at most once.
///

pub struct QueryBatch<'s> {
    session: &'s dyn Session,
    config: BatchConfig,
    metrics: Option<&'static dyn MetricsSink>,
    items: Vec<Box<dyn ErasedItem>>,
    keys: BTreeMap<String, usize>,
    state: BatchState,
}

impl<'s> QueryBatch<'s> {
    #[must_use]
    pub fn new(session: &'s dyn Session) -> Self {
        Self {
            session,
            config: BatchConfig::default(),
            metrics: None,
            items: Vec::new(),
            keys: BTreeMap::new(),
            state: BatchState::Collecting,
        }
    }

    #[must_use]
    pub fn with_config(mut self, config: BatchConfig) -> Self {
        self.config = config;
        self
    }

    /// Route this batch's metrics events to `sink` while it executes.
    #[must_use]
    pub fn metrics_sink(mut self, sink: &'static dyn MetricsSink) -> Self {
        self.metrics = Some(sink);
        self
    }

    #[must_use]
    pub const fn config(&self) -> &BatchConfig {
        &self.config
    }

    #[must_use]
    pub const fn state(&self) -> BatchState {
        self.state
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.items.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    // ---------------------------------------------------------------------
    // Collection
    // ---------------------------------------------------------------------

    /// Append an item. Its position is its place in every later step.
    pub fn add<I>(&mut self, item: I) -> Result<ItemHandle<I>, InternalError>
    where
        I: BatchItem + 'static,
    {
        if self.state != BatchState::Collecting {
            return Err(InternalError::batch_invariant(
                "cannot add items to a batch that was already executed",
            ));
        }

        self.items.push(Box::new(item));

        Ok(ItemHandle::new(self.items.len() - 1))
    }

    /// Append an item and register it under `key` for later lookup.
    pub fn add_keyed<I>(
        &mut self,
        key: impl Into<String>,
        item: I,
    ) -> Result<ItemHandle<I>, InternalError>
    where
        I: BatchItem + 'static,
    {
        let key = key.into();
        if self.keys.contains_key(&key) {
            return Err(InternalError::item_key_conflict(&key));
        }

        let handle = self.add(item)?;
        self.keys.insert(key, handle.index());

        Ok(handle)
    }

    // ---------------------------------------------------------------------
    // Execution
    // ---------------------------------------------------------------------

    /// Execute every item in one round trip when the provider allows it.
    /// A batch executes at most once; a second call is a protocol error.
    pub fn execute(&mut self) -> Result<BatchReport, InternalError> {
        match self.state {
            BatchState::Collecting => {}
            BatchState::Executed | BatchState::Failed => {
                return Err(InternalError::batch_invariant(format!(
                    "batch cannot be executed twice (state {:?})",
                    self.state
                )));
            }
        }

        // Poisoned until the whole protocol completes.
        self.state = BatchState::Failed;

        let metrics = self.metrics;
        let report = match metrics {
            Some(sink) => with_metrics_sink(sink, || self.execute_inner()),
            None => self.execute_inner(),
        }?;
        self.state = BatchState::Executed;

        Ok(report)
    }

    fn execute_inner(&mut self) -> Result<BatchReport, InternalError> {
        let mut span = BatchSpan::new(self.items.len());
        let mut report = BatchReport {
            items: self.items.len(),
            ..BatchReport::default()
        };

        self.initialize()?;
        self.resolve_cache(&mut report)?;

        let commands = self.collect_commands();
        report.commands = commands.len();

        self.dispatch(&commands, &mut report)?;
        self.write_back_cache();
        self.finalize()?;

        debug!(
            items = report.items,
            commands = report.commands,
            round_trips = report.round_trips,
            cache_hits = report.cache_hits,
            rows = report.rows,
            path = ?report.path,
            "query batch executed"
        );
        span.add_rows(report.rows);
        span.succeed();

        Ok(report)
    }

    // Init every item, then flush the union of their query spaces so cache
    // checks and execution observe the current persisted state.
    fn initialize(&mut self) -> Result<(), InternalError> {
        let mut query_spaces = BTreeSet::new();
        for item in &mut self.items {
            item.init(self.session)?;
            query_spaces.extend(item.query_spaces().iter().cloned());
        }

        if self.config.auto_flush && !query_spaces.is_empty() {
            let flushed = self.session.auto_flush(&query_spaces)?;
            debug!(spaces = query_spaces.len(), flushed, "auto-flush before batch");
        }

        Ok(())
    }

    fn resolve_cache(&mut self, report: &mut BatchReport) -> Result<(), InternalError> {
        let session = self.session;
        let strict = self.config.strict_caching_arity;
        let store = session.cache_store();

        for (position, item) in self.items.iter_mut().enumerate() {
            let command_count = item.commands().len();
            let info_count = item.caching_information().len();
            check_caching_arity(position, item.label(), info_count, command_count, strict)?;

            let Some(store) = store else {
                continue;
            };

            let mut hits = Vec::new();
            for (index, info) in item.caching_information().iter().enumerate() {
                if !info.can_get_from_cache() {
                    continue;
                }
                match lookup(session, store, info) {
                    Some(rows) => hits.push((index, rows)),
                    None => report.cache_misses += 1,
                }
            }

            report.cache_hits += hits.len();
            for (index, rows) in hits {
                item.apply_cache_hit(index, rows)?;
            }
        }

        Ok(())
    }

    fn collect_commands(&self) -> CommandSet {
        let mut commands = CommandSet::default();
        for item in &self.items {
            commands.push_item(item.commands());
        }

        commands
    }

    // Fills every item's pending result sets. No item is finalized here, so
    // a failure on any item leaves every accumulator unexposed.
    fn dispatch(
        &mut self,
        commands: &CommandSet,
        report: &mut BatchReport,
    ) -> Result<(), InternalError> {
        if commands.is_empty() {
            report.path = if report.cache_hits > 0 {
                DispatchPath::CacheOnly
            } else {
                DispatchPath::Empty
            };
            return Ok(());
        }

        let session = self.session;
        let provider = session.provider();
        let timeout = self.config.timeout();
        let total = commands.len();

        if provider.supports_batching() {
            report.path = DispatchPath::Batched;
            report.round_trips = 1;
            record(MetricsEvent::Dispatch {
                kind: DispatchKind::Batched,
                commands: total as u64,
            });
            debug!(commands = total, "dispatching combined commands");

            let mut cursor =
                ScopedCursor::new(provider.execute_batch(commands.commands(), timeout)?);
            let mut position = 0;
            for (item, &count) in self.items.iter_mut().zip(commands.per_item()) {
                for _ in 0..count {
                    position += 1;
                    let mut aligned = AlignedCursor::new(cursor.as_dyn());
                    let rows = item.process_results_set(&mut aligned)?;
                    aligned.expect_aligned(position, total)?;

                    record(MetricsEvent::ResultsSet { rows: rows as u64 });
                    report.rows += rows;
                }
            }
        } else {
            report.path = DispatchPath::NonBatched;
            debug!(
                commands = total,
                "provider cannot batch; executing items standalone"
            );

            for (item, &count) in self.items.iter_mut().zip(commands.per_item()) {
                if count == 0 {
                    continue;
                }
                record(MetricsEvent::Dispatch {
                    kind: DispatchKind::NonBatched,
                    commands: count as u64,
                });

                let sets = item.fetch_non_batched(session, timeout)?;
                if sets.len() != count {
                    return Err(InternalError::batch_invariant(format!(
                        "item '{}' fetched {} result sets for {count} pending commands",
                        item.label(),
                        sets.len()
                    )));
                }
                for rows in sets {
                    record(MetricsEvent::ResultsSet { rows: rows as u64 });
                    report.rows += rows;
                }
                report.round_trips += count;
            }
        }

        Ok(())
    }

    // Cache write failures are logged and dropped.
    fn write_back_cache(&self) {
        let Some(store) = self.session.cache_store() else {
            return;
        };
        let timestamp = self.session.timestamp();

        for item in &self.items {
            for (index, rows) in item.results_to_cache() {
                let Some(info) = item.caching_information().get(index) else {
                    continue;
                };
                let region = info.key().region();
                let entry = CachedRows { rows, timestamp };

                let policy = info.store_policy(self.config.minimal_puts);
                match store.put(info.key(), entry, policy) {
                    Ok(written) => record(MetricsEvent::CachePut { region, written }),
                    Err(err) => warn!(
                        item = item.label(),
                        key = %info.key(),
                        error = %err,
                        "cache put failed; result not cached"
                    ),
                }
            }
        }
    }

    fn finalize(&mut self) -> Result<(), InternalError> {
        for item in &mut self.items {
            item.process_results()?;
        }

        Ok(())
    }

    // ---------------------------------------------------------------------
    // Results
    // ---------------------------------------------------------------------

    /// Finalized results of the item behind `handle`.
    pub fn results<I>(&self, handle: &ItemHandle<I>) -> Result<&[I::Output], InternalError>
    where
        I: TypedBatchItem + 'static,
    {
        self.item(handle)?.results()
    }

    /// Finalized results of the item registered under `key`.
    pub fn results_by_key<I>(&self, key: &str) -> Result<&[I::Output], InternalError>
    where
        I: TypedBatchItem + 'static,
    {
        let index = *self
            .keys
            .get(key)
            .ok_or_else(|| InternalError::item_key_not_found(key))?;

        self.item(&ItemHandle::<I>::new(index))?.results()
    }

    /// Move the results of the item behind `handle` out of the batch.
    pub fn take_results<I>(
        &mut self,
        handle: ItemHandle<I>,
    ) -> Result<Vec<I::Output>, InternalError>
    where
        I: TypedBatchItem + 'static,
    {
        self.ensure_executed()?;

        self.items
            .get_mut(handle.index())
            .ok_or_else(|| handle_out_of_range(handle.index()))?
            .as_any_mut()
            .downcast_mut::<I>()
            .ok_or_else(|| handle_type_mismatch::<I>(handle.index()))?
            .take_results()
    }

    /// Typed access to an executed item.
    pub fn item<I>(&self, handle: &ItemHandle<I>) -> Result<&I, InternalError>
    where
        I: BatchItem + 'static,
    {
        self.ensure_executed()?;

        self.items
            .get(handle.index())
            .ok_or_else(|| handle_out_of_range(handle.index()))?
            .as_any()
            .downcast_ref::<I>()
            .ok_or_else(|| handle_type_mismatch::<I>(handle.index()))
    }

    fn ensure_executed(&self) -> Result<(), InternalError> {
        match self.state {
            BatchState::Executed => Ok(()),
            BatchState::Collecting => Err(InternalError::batch_invariant(
                "batch results requested before execute",
            )),
            BatchState::Failed => Err(InternalError::batch_invariant(
                "batch execution failed; results are unavailable",
            )),
        }
    }
}

impl fmt::Debug for QueryBatch<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("QueryBatch")
            .field("items", &self.items.len())
            .field("keys", &self.keys)
            .field("state", &self.state)
            .field("config", &self.config)
            .finish_non_exhaustive()
    }
}

// A count larger than the command count can never be matched. A smaller
// non-zero count is only tolerated outside strict mode, where the unmatched
// trailing commands are always fetched.
fn check_caching_arity(
    position: usize,
    label: &str,
    info_count: usize,
    command_count: usize,
    strict: bool,
) -> Result<(), InternalError> {
    if info_count == 0 || info_count == command_count {
        return Ok(());
    }

    if info_count > command_count || strict {
        return Err(InternalError::batch_invariant(format!(
            "item {position} ('{label}') yields {info_count} caching entries for {command_count} commands"
        )));
    }

    warn!(
        item = label,
        info_count,
        command_count,
        "caching information shorter than command list; unmatched commands always miss"
    );

    Ok(())
}

// Store failures and stale entries both degrade to a miss.
fn lookup(
    session: &dyn Session,
    store: &dyn CacheStore,
    info: &CachingInformation,
) -> Option<Vec<Row>> {
    let region = info.key().region();

    let (outcome, rows) = match store.get(info.key()) {
        Ok(Some(entry)) if session.is_up_to_date(info.query_spaces(), entry.timestamp) => {
            (CacheOutcome::Hit, Some(entry.rows))
        }
        Ok(Some(_)) => (CacheOutcome::Stale, None),
        Ok(None) => (CacheOutcome::Miss, None),
        Err(err) => {
            warn!(key = %info.key(), error = %err, "cache lookup failed; treating as miss");
            (CacheOutcome::Error, None)
        }
    };

    debug!(key = %info.key(), ?outcome, "cache lookup");
    record(MetricsEvent::CacheLookup { region, outcome });

    rows
}

fn handle_out_of_range(index: usize) -> InternalError {
    InternalError::batch_invariant(format!("item handle {index} does not belong to this batch"))
}

fn handle_type_mismatch<I>(index: usize) -> InternalError {
    InternalError::batch_invariant(format!("item {index} is not a {}", type_name::<I>()))
}
