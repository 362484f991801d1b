//! Vendor-agnostic metrics collection via a pluggable sink.
//!
//! Every enforcement decision made by a [`crate::ClaimEnforcer`] is reported
//! to the installed [`MetricsSink`], along with the watch events it emits
//! after translation. Nothing here ties the crate to a metrics backend;
//! implement the trait and forward to Prometheus, OpenTelemetry or anything
//! else.
//!
//! **Note:** This module is only available when the `observability` feature is enabled.
//!
//! ## Usage
//!
//! ```ignore
//! use claimview_core::metrics::{DecisionStats, MetricsSink};
//! use std::sync::atomic::{AtomicU64, Ordering};
//! use std::sync::Arc;
//!
//! struct DenyCounter {
//!     denied: AtomicU64,
//! }
//!
//! impl MetricsSink for DenyCounter {
//!     fn on_decision(&self, stats: &DecisionStats) {
//!         if !stats.allowed {
//!             self.denied.fetch_add(1, Ordering::Relaxed);
//!         }
//!     }
//! }
//!
//! claimview_core::metrics::set_sink(Arc::new(DenyCounter { denied: AtomicU64::new(0) }));
//! ```

use once_cell::sync::Lazy;
use serde::Serialize;
use std::sync::{Arc, RwLock};
use std::time::Duration;
use tracing::warn;

use crate::types::{Verb, WatchEventType};

/// Snapshot of one enforcement decision, passed to [`MetricsSink::on_decision`].
///
/// For list and delete-collection a decision is recorded per request, with
/// `allowed` set when the request succeeded; the per-object filtering is
/// not reported.
#[derive(Debug, Clone, Serialize)]
pub struct DecisionStats {
    pub verb: Verb,
    /// Group-resource in its display form, e.g. `configmaps`.
    pub group_resource: String,
    pub consumer: String,
    pub allowed: bool,
    /// Time from request entry to decision, including backend calls.
    pub duration: Duration,
}

/// One watch event after claim translation.
#[derive(Debug, Clone, Serialize)]
pub struct WatchStats {
    pub group_resource: String,
    pub upstream: WatchEventType,
    pub emitted: WatchEventType,
}

/// Consumer of enforcement metrics.
///
/// Called synchronously on the request path; implementations must be
/// thread-safe and should not block.
pub trait MetricsSink: Send + Sync {
    fn on_decision(&self, stats: &DecisionStats);

    /// Called for each translated watch event. Default: no-op.
    fn on_watch_event(&self, _stats: &WatchStats) {}
}

/// Default sink; drops everything.
struct NoOpSink;

impl MetricsSink for NoOpSink {
    fn on_decision(&self, _stats: &DecisionStats) {}
}

static SINK: Lazy<RwLock<Arc<dyn MetricsSink>>> = Lazy::new(|| RwLock::new(Arc::new(NoOpSink)));

fn sink() -> Arc<dyn MetricsSink> {
    match SINK.read() {
        Ok(guard) => Arc::clone(&guard),
        Err(poisoned) => Arc::clone(&poisoned.into_inner()),
    }
}

/// Install the global metrics sink, replacing the previous one.
///
/// Call at startup, before the first request; requests already in flight
/// may still report to the previous sink.
pub fn set_sink(new_sink: Arc<dyn MetricsSink>) {
    match SINK.write() {
        Ok(mut guard) => *guard = new_sink,
        Err(poisoned) => {
            warn!("Metrics sink lock was poisoned; installing the new sink anyway.");
            *poisoned.into_inner() = new_sink;
        }
    }
}

pub(crate) fn record_decision(
    verb: Verb,
    group_resource: String,
    consumer: String,
    allowed: bool,
    duration: Duration,
) {
    sink().on_decision(&DecisionStats {
        verb,
        group_resource,
        consumer,
        allowed,
        duration,
    });
}

pub(crate) fn record_watch_event(
    group_resource: String,
    upstream: WatchEventType,
    emitted: WatchEventType,
) {
    sink().on_watch_event(&WatchStats {
        group_resource,
        upstream,
        emitted,
    });
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_decision_stats_serialization() {
        let stats = DecisionStats {
            verb: Verb::Create,
            group_resource: "configmaps".to_string(),
            consumer: "root:org:consumer".to_string(),
            allowed: false,
            duration: Duration::from_millis(3),
        };
        let value = serde_json::to_value(&stats).unwrap();
        assert_eq!(value["verb"], "create");
        assert_eq!(value["allowed"], false);
    }

    #[test]
    fn test_record_with_no_op_sink() {
        let sink = NoOpSink;
        sink.on_watch_event(&WatchStats {
            group_resource: "configmaps".to_string(),
            upstream: WatchEventType::Modified,
            emitted: WatchEventType::Deleted,
        });
        record_decision(
            Verb::Get,
            "configmaps".to_string(),
            "root:org:consumer".to_string(),
            true,
            Duration::from_micros(10),
        );
    }
}
