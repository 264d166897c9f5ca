//! Scripted collaborators for batch tests.

use crate::{
    db::{
        cache::{CacheKey, CacheStore, CachedRows, MemoryCacheStore, StorePolicy},
        command::SqlCommand,
        cursor::ResultCursor,
        session::{CommandProvider, Session},
    },
    error::InternalError,
    value::Row,
};
use std::{
    cell::{Cell, RefCell},
    collections::{BTreeMap, BTreeSet, HashMap},
    rc::Rc,
    time::Duration,
};

///
/// ProviderCall
///

#[derive(Clone, Debug, Eq, PartialEq)]
pub(crate) enum ProviderCall {
    Batch(Vec<String>),
    Single(String),
}

///
/// ScriptedProvider
///
/// Answers each command with the rows registered for its SQL text (an empty
/// result set when nothing is registered) and records every call.
///

#[derive(Default)]
pub(crate) struct ScriptedProvider {
    batching: bool,
    responses: HashMap<String, Vec<Row>>,
    fail_execute: BTreeSet<String>,
    fail_reading: BTreeSet<String>,
    missing_sets: usize,
    extra_sets: usize,
    calls: RefCell<Vec<ProviderCall>>,
    cursor_closes: Rc<Cell<usize>>,
}

impl ScriptedProvider {
    pub(crate) fn batching() -> Self {
        Self {
            batching: true,
            ..Self::default()
        }
    }

    pub(crate) fn non_batching() -> Self {
        Self::default()
    }

    pub(crate) fn respond(mut self, sql: &str, rows: Vec<Row>) -> Self {
        self.responses.insert(sql.to_string(), rows);
        self
    }

    /// Fail the execution call that includes `sql`.
    pub(crate) fn fail_execute(mut self, sql: &str) -> Self {
        self.fail_execute.insert(sql.to_string());
        self
    }

    /// Fail while reading the result set produced by `sql`.
    pub(crate) fn fail_reading(mut self, sql: &str) -> Self {
        self.fail_reading.insert(sql.to_string());
        self
    }

    /// Drop the last `n` result sets from every cursor.
    pub(crate) const fn missing_sets(mut self, n: usize) -> Self {
        self.missing_sets = n;
        self
    }

    /// Append `n` empty result sets to every cursor.
    pub(crate) const fn extra_sets(mut self, n: usize) -> Self {
        self.extra_sets = n;
        self
    }

    pub(crate) fn calls(&self) -> Vec<ProviderCall> {
        self.calls.borrow().clone()
    }

    pub(crate) fn submitted(&self) -> Vec<String> {
        self.calls
            .borrow()
            .iter()
            .flat_map(|call| match call {
                ProviderCall::Batch(sql) => sql.clone(),
                ProviderCall::Single(sql) => vec![sql.clone()],
            })
            .collect()
    }

    pub(crate) fn cursor_closes(&self) -> usize {
        self.cursor_closes.get()
    }

    fn check_execute(&self, command: &SqlCommand) -> Result<(), InternalError> {
        if self.fail_execute.contains(command.sql()) {
            return Err(InternalError::provider_execution(format!(
                "scripted execution failure: {}",
                command.sql()
            )));
        }

        Ok(())
    }

    fn cursor_for(&self, commands: &[SqlCommand]) -> Box<dyn ResultCursor> {
        let mut sets = commands
            .iter()
            .map(|command| ScriptedSet {
                rows: self
                    .responses
                    .get(command.sql())
                    .cloned()
                    .unwrap_or_default(),
                fail: self.fail_reading.contains(command.sql()),
            })
            .collect::<Vec<_>>();
        sets.truncate(sets.len().saturating_sub(self.missing_sets));
        sets.extend((0..self.extra_sets).map(|_| ScriptedSet {
            rows: Vec::new(),
            fail: false,
        }));

        Box::new(ScriptedCursor {
            sets,
            set: 0,
            row: 0,
            closes: Rc::clone(&self.cursor_closes),
            closed: false,
        })
    }
}

impl CommandProvider for ScriptedProvider {
    fn supports_batching(&self) -> bool {
        self.batching
    }

    fn execute_batch(
        &self,
        commands: &[SqlCommand],
        _timeout: Option<Duration>,
    ) -> Result<Box<dyn ResultCursor>, InternalError> {
        self.calls.borrow_mut().push(ProviderCall::Batch(
            commands.iter().map(|c| c.sql().to_string()).collect(),
        ));
        for command in commands {
            self.check_execute(command)?;
        }

        Ok(self.cursor_for(commands))
    }

    fn execute(
        &self,
        command: &SqlCommand,
        _timeout: Option<Duration>,
    ) -> Result<Box<dyn ResultCursor>, InternalError> {
        self.calls
            .borrow_mut()
            .push(ProviderCall::Single(command.sql().to_string()));
        self.check_execute(command)?;

        Ok(self.cursor_for(std::slice::from_ref(command)))
    }
}

struct ScriptedSet {
    rows: Vec<Row>,
    fail: bool,
}

struct ScriptedCursor {
    sets: Vec<ScriptedSet>,
    set: usize,
    row: usize,
    closes: Rc<Cell<usize>>,
    closed: bool,
}

impl ResultCursor for ScriptedCursor {
    fn next_row(&mut self) -> Result<Option<Row>, InternalError> {
        let Some(set) = self.sets.get(self.set) else {
            return Ok(None);
        };
        if set.fail {
            return Err(InternalError::cursor_execution("scripted read failure"));
        }

        let row = set.rows.get(self.row).cloned();
        if row.is_some() {
            self.row += 1;
        }

        Ok(row)
    }

    fn next_result(&mut self) -> Result<bool, InternalError> {
        self.set += 1;
        self.row = 0;

        Ok(self.set < self.sets.len())
    }

    fn close(&mut self) {
        if !self.closed {
            self.closed = true;
            self.closes.set(self.closes.get() + 1);
        }
    }
}

///
/// FailingCacheStore
///
/// Cache store whose every operation fails.
///

#[derive(Default)]
pub(crate) struct FailingCacheStore {
    pub(crate) gets: Cell<usize>,
    pub(crate) puts: Cell<usize>,
}

impl CacheStore for FailingCacheStore {
    fn get(&self, _key: &CacheKey) -> Result<Option<CachedRows>, InternalError> {
        self.gets.set(self.gets.get() + 1);
        Err(InternalError::cache_internal("cache backend unavailable"))
    }

    fn put(
        &self,
        _key: &CacheKey,
        _entry: CachedRows,
        _policy: StorePolicy,
    ) -> Result<bool, InternalError> {
        self.puts.set(self.puts.get() + 1);
        Err(InternalError::cache_internal("cache backend unavailable"))
    }
}

///
/// TestSession
///

pub(crate) struct TestSession {
    pub(crate) provider: ScriptedProvider,
    cache: Option<Box<dyn CacheStore>>,
    flushes: RefCell<Vec<BTreeSet<String>>>,
    fail_flush: bool,
    clock: Cell<u64>,
    space_updates: RefCell<BTreeMap<String, u64>>,
}

impl TestSession {
    pub(crate) fn new(provider: ScriptedProvider) -> Self {
        Self {
            provider,
            cache: None,
            flushes: RefCell::new(Vec::new()),
            fail_flush: false,
            clock: Cell::new(100),
            space_updates: RefCell::new(BTreeMap::new()),
        }
    }

    pub(crate) fn with_memory_cache(self) -> Self {
        self.with_cache(MemoryCacheStore::new())
    }

    pub(crate) fn with_cache(mut self, store: impl CacheStore + 'static) -> Self {
        self.cache = Some(Box::new(store));
        self
    }

    pub(crate) const fn failing_flush(mut self) -> Self {
        self.fail_flush = true;
        self
    }

    pub(crate) fn flushes(&self) -> Vec<BTreeSet<String>> {
        self.flushes.borrow().clone()
    }

    pub(crate) fn advance_clock(&self, by: u64) {
        self.clock.set(self.clock.get() + by);
    }

    /// Record a write to `space` at the current clock.
    pub(crate) fn touch_space(&self, space: &str) {
        self.space_updates
            .borrow_mut()
            .insert(space.to_string(), self.clock.get());
    }

    pub(crate) fn store(&self) -> &dyn CacheStore {
        self.cache
            .as_deref()
            .expect("test session should have a cache store")
    }
}

impl Session for TestSession {
    fn auto_flush(&self, query_spaces: &BTreeSet<String>) -> Result<bool, InternalError> {
        if self.fail_flush {
            return Err(InternalError::session_execution("scripted flush failure"));
        }
        self.flushes.borrow_mut().push(query_spaces.clone());

        Ok(false)
    }

    fn cache_store(&self) -> Option<&dyn CacheStore> {
        self.cache.as_deref()
    }

    fn provider(&self) -> &dyn CommandProvider {
        &self.provider
    }

    fn is_up_to_date(&self, query_spaces: &BTreeSet<String>, timestamp: u64) -> bool {
        let updates = self.space_updates.borrow();
        query_spaces
            .iter()
            .all(|space| updates.get(space).is_none_or(|&updated| updated < timestamp))
    }

    fn timestamp(&self) -> u64 {
        self.clock.get()
    }
}
