//! Observability: runtime telemetry (metrics) and sink abstractions.
//!
//! Structured logs go through `tracing`; counters go through the sink.

pub(crate) mod metrics;
pub(crate) mod sink;

// re-exports
pub use metrics::{CacheCounters, EventOps, EventReport, EventState, RegionCounters};
pub use sink::{
    CacheOutcome, DispatchKind, MetricsEvent, MetricsSink, metrics_report, metrics_reset_all,
};
