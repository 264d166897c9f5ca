//! Metrics sink boundary.
//!
//! Batch execution never touches `obs::metrics` directly.
//! All instrumentation flows through `MetricsEvent` and `MetricsSink`.
use crate::obs::metrics;
use std::cell::Cell;

thread_local! {
    static SINK_OVERRIDE: Cell<Option<&'static dyn MetricsSink>> = const { Cell::new(None) };
}

///
/// DispatchKind
///

#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum DispatchKind {
    Batched,
    NonBatched,
}

///
/// CacheOutcome
///

#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum CacheOutcome {
    Hit,
    Miss,
    Stale,
    Error,
}

///
/// MetricsEvent
///

#[derive(Clone, Copy, Debug)]
pub enum MetricsEvent<'a> {
    BatchStart {
        items: u64,
    },
    BatchFinish {
        ok: bool,
        rows: u64,
    },
    CacheLookup {
        region: &'a str,
        outcome: CacheOutcome,
    },
    CachePut {
        region: &'a str,
        written: bool,
    },
    Dispatch {
        kind: DispatchKind,
        commands: u64,
    },
    ResultsSet {
        rows: u64,
    },
}

///
/// MetricsSink
///

pub trait MetricsSink {
    fn record(&self, event: MetricsEvent<'_>);
}

/// GlobalMetricsSink
/// Default thread-local sink that writes into global metrics state.
/// Acts as the concrete sink when no scoped override is installed.

pub(crate) struct GlobalMetricsSink;

impl MetricsSink for GlobalMetricsSink {
    fn record(&self, event: MetricsEvent<'_>) {
        match event {
            MetricsEvent::BatchStart { items } => metrics::with_state_mut(|m| {
                m.ops.batches = m.ops.batches.saturating_add(1);
                m.ops.items = m.ops.items.saturating_add(items);
            }),

            MetricsEvent::BatchFinish { ok, .. } => {
                if !ok {
                    metrics::with_state_mut(|m| {
                        m.ops.batch_failures = m.ops.batch_failures.saturating_add(1);
                    });
                }
            }

            MetricsEvent::CacheLookup { region, outcome } => metrics::with_state_mut(|m| {
                let counter = match outcome {
                    CacheOutcome::Hit => &mut m.cache.hits,
                    CacheOutcome::Miss => &mut m.cache.misses,
                    CacheOutcome::Stale => &mut m.cache.stale,
                    CacheOutcome::Error => &mut m.cache.errors,
                };
                *counter = counter.saturating_add(1);

                let entry = m.regions.entry(region.to_string()).or_default();
                if outcome == CacheOutcome::Hit {
                    entry.hits = entry.hits.saturating_add(1);
                } else {
                    entry.misses = entry.misses.saturating_add(1);
                }
            }),

            MetricsEvent::CachePut { region, written } => metrics::with_state_mut(|m| {
                if written {
                    m.cache.puts = m.cache.puts.saturating_add(1);
                    let entry = m.regions.entry(region.to_string()).or_default();
                    entry.puts = entry.puts.saturating_add(1);
                } else {
                    m.cache.puts_skipped = m.cache.puts_skipped.saturating_add(1);
                }
            }),

            MetricsEvent::Dispatch { kind, commands } => metrics::with_state_mut(|m| {
                m.ops.commands = m.ops.commands.saturating_add(commands);
                match kind {
                    DispatchKind::Batched => {
                        m.ops.round_trips = m.ops.round_trips.saturating_add(1);
                    }
                    DispatchKind::NonBatched => {
                        m.ops.round_trips = m.ops.round_trips.saturating_add(commands);
                        m.ops.non_batched_executions =
                            m.ops.non_batched_executions.saturating_add(1);
                    }
                }
            }),

            MetricsEvent::ResultsSet { rows } => metrics::with_state_mut(|m| {
                m.ops.result_sets = m.ops.result_sets.saturating_add(1);
                m.ops.rows = m.ops.rows.saturating_add(rows);
            }),
        }
    }
}

pub(crate) const GLOBAL_METRICS_SINK: GlobalMetricsSink = GlobalMetricsSink;

pub(crate) fn record(event: MetricsEvent<'_>) {
    match SINK_OVERRIDE.with(Cell::get) {
        Some(sink) => sink.record(event),
        None => GLOBAL_METRICS_SINK.record(event),
    }
}

/// Snapshot the current metrics state for endpoint/test plumbing.
#[must_use]
pub fn metrics_report() -> metrics::EventReport {
    metrics::report()
}

/// Reset all metrics state.
pub fn metrics_reset_all() {
    metrics::reset_all();
}

/// Run a closure with a temporary metrics sink override.
/// The previous sink is restored on every exit, including unwind.
pub(crate) fn with_metrics_sink<T>(sink: &'static dyn MetricsSink, f: impl FnOnce() -> T) -> T {
    struct Guard(Option<&'static dyn MetricsSink>);

    impl Drop for Guard {
        fn drop(&mut self) {
            SINK_OVERRIDE.with(|cell| cell.set(self.0));
        }
    }

    let prev = SINK_OVERRIDE.with(|cell| cell.replace(Some(sink)));
    let _guard = Guard(prev);

    f()
}

///
/// BatchSpan
///
/// RAII guard emitting start/finish events for one batch execution.
/// A span dropped without `succeed` reports a failed batch.
///

pub(crate) struct BatchSpan {
    rows: u64,
    ok: bool,
}

impl BatchSpan {
    #[must_use]
    pub(crate) fn new(items: usize) -> Self {
        record(MetricsEvent::BatchStart {
            items: items as u64,
        });

        Self { rows: 0, ok: false }
    }

    pub(crate) const fn add_rows(&mut self, rows: usize) {
        self.rows = self.rows.saturating_add(rows as u64);
    }

    pub(crate) const fn succeed(&mut self) {
        self.ok = true;
    }
}

impl Drop for BatchSpan {
    fn drop(&mut self) {
        record(MetricsEvent::BatchFinish {
            ok: self.ok,
            rows: self.rows,
        });
    }
}
