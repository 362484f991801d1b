//! Timing for enforcement decisions.
//!
//! A [`DecisionTimer`] starts when a verb enters the enforcer and reports
//! when dropped, so early returns through `?` are timed as well.

use std::time::{Duration, Instant};

use tracing::debug;

use crate::types::{GroupResource, Verb};

/// RAII timer for one request through a claimed view.
///
/// Only a request whose outcome was set with [`DecisionTimer::allow`] or
/// [`DecisionTimer::deny`] is reported; backend failures that never reach a
/// decision are not.
///
/// ```rust,ignore
/// let mut timer = DecisionTimer::start(Verb::Get, &gr, "root:org:consumer");
/// let object = accessor.get(&gr, ns, name).await?;
/// timer.allow();
/// ```
pub struct DecisionTimer {
    start: Instant,
    verb: Verb,
    group_resource: String,
    consumer: String,
    allowed: Option<bool>,
}

impl DecisionTimer {
    pub fn start(verb: Verb, group_resource: &GroupResource, consumer: &str) -> Self {
        Self {
            start: Instant::now(),
            verb,
            group_resource: group_resource.to_string(),
            consumer: consumer.to_string(),
            allowed: None,
        }
    }

    pub fn allow(&mut self) {
        self.allowed = Some(true);
    }

    pub fn deny(&mut self) {
        self.allowed = Some(false);
    }

    pub fn elapsed(&self) -> Duration {
        self.start.elapsed()
    }
}

impl Drop for DecisionTimer {
    fn drop(&mut self) {
        let Some(allowed) = self.allowed else {
            return;
        };
        let elapsed = self.start.elapsed();
        debug!(
            event = "Decision",
            phase = "Timing",
            verb = %self.verb,
            group_resource = %self.group_resource,
            consumer = %self.consumer,
            allowed,
            elapsed_us = elapsed.as_micros() as u64
        );

        #[cfg(feature = "observability")]
        crate::metrics::record_decision(
            self.verb,
            std::mem::take(&mut self.group_resource),
            std::mem::take(&mut self.consumer),
            allowed,
            elapsed,
        );
    }
}
