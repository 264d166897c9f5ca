use serde::Serialize;
use std::{
    cell::RefCell,
    collections::BTreeMap,
    time::{SystemTime, UNIX_EPOCH},
};

///
/// EventState
/// Ephemeral, in-memory counters for batch execution.
///

#[derive(Clone, Debug, Serialize)]
pub struct EventState {
    pub ops: EventOps,
    pub cache: CacheCounters,
    pub regions: BTreeMap<String, RegionCounters>,
    pub since_ms: u64,
}

impl Default for EventState {
    fn default() -> Self {
        Self {
            ops: EventOps::default(),
            cache: CacheCounters::default(),
            regions: BTreeMap::new(),
            since_ms: now_millis(),
        }
    }
}

///
/// EventOps
///

#[derive(Clone, Debug, Default, Serialize)]
pub struct EventOps {
    // Batch entrypoints
    pub batches: u64,
    pub batch_failures: u64,
    pub items: u64,

    // Dispatch
    pub commands: u64,
    pub round_trips: u64,
    pub non_batched_executions: u64,

    // Rows read from cursors
    pub rows: u64,
    pub result_sets: u64,
}

///
/// CacheCounters
///

#[derive(Clone, Debug, Default, Serialize)]
pub struct CacheCounters {
    pub hits: u64,
    pub misses: u64,
    pub stale: u64,
    pub errors: u64,
    pub puts: u64,
    pub puts_skipped: u64,
}

///
/// RegionCounters
///

#[derive(Clone, Debug, Default, Serialize)]
pub struct RegionCounters {
    pub hits: u64,
    pub misses: u64,
    pub puts: u64,
}

/// Point-in-time snapshot handed to callers.
pub type EventReport = EventState;

thread_local! {
    static EVENT_STATE: RefCell<EventState> = RefCell::new(EventState::default());
}

#[expect(clippy::cast_possible_truncation)]
fn now_millis() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map_or(0, |d| d.as_millis() as u64)
}

/// Borrow metrics immutably.
pub(crate) fn with_state<R>(f: impl FnOnce(&EventState) -> R) -> R {
    EVENT_STATE.with(|m| f(&m.borrow()))
}

/// Borrow metrics mutably.
pub(crate) fn with_state_mut<R>(f: impl FnOnce(&mut EventState) -> R) -> R {
    EVENT_STATE.with(|m| f(&mut m.borrow_mut()))
}

/// Reset all counters (useful in tests).
pub(crate) fn reset_all() {
    with_state_mut(|m| *m = EventState::default());
}

/// Snapshot all counters.
pub(crate) fn report() -> EventReport {
    with_state(Clone::clone)
}
