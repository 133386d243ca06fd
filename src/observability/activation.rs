//! Outstanding-work gauge fed by the activation handler.
//!
//! A handle becomes *active* when it gains its first pending continuation and
//! stops being active when it settles, is cancelled, or falls out of scope.
//! [`ActivationGauge`] keeps the running sum of those deltas, which is the
//! number of handles something is still waiting on. A host can poll
//! [`ActivationGauge::is_quiescent`] to learn when all chained work is done.

use crate::context::Context;
use core::fmt;
use serde::Serialize;
use std::cell::Cell;
use std::rc::Rc;

/// A point-in-time copy of an [`ActivationGauge`].
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct ActivationSnapshot {
    /// Handles currently active.
    pub current: i64,
    /// Highest value `current` has reached.
    pub peak: i64,
    /// Number of `+1` deltas received.
    pub activations: u64,
    /// Number of `-1` deltas received.
    pub deactivations: u64,
}

/// Counts active handles.
///
/// Clones share the same counters, so one clone can be installed as the
/// activation handler while another is read.
#[derive(Clone)]
pub struct ActivationGauge {
    name: Rc<str>,
    state: Rc<Cell<ActivationSnapshot>>,
}

impl ActivationGauge {
    /// Creates a gauge at zero.
    #[must_use]
    pub fn new(name: impl Into<String>) -> Self {
        let name: String = name.into();
        Self {
            name: Rc::from(name),
            state: Rc::new(Cell::new(ActivationSnapshot::default())),
        }
    }

    /// Creates a gauge and installs it as the activation handler of `ctx`.
    ///
    /// Replaces whatever activation handler was installed before.
    #[must_use]
    pub fn installed(name: impl Into<String>, ctx: &Context) -> Self {
        let gauge = Self::new(name);
        gauge.install(ctx);
        gauge
    }

    /// Installs this gauge as the activation handler of `ctx`.
    pub fn install(&self, ctx: &Context) {
        let sink = self.clone();
        ctx.set_activation_handler(move |delta| sink.record(delta));
    }

    /// Applies one activation delta.
    pub fn record(&self, delta: i32) {
        let mut snap = self.state.get();
        snap.current = snap.current.saturating_add(i64::from(delta));
        if delta > 0 {
            snap.activations += 1;
            snap.peak = snap.peak.max(snap.current);
        } else if delta < 0 {
            snap.deactivations += 1;
        }
        if snap.current < 0 {
            tracing::warn!(gauge = %self.name, current = snap.current, "activation gauge went negative");
        }
        self.state.set(snap);
    }

    /// Returns the gauge name.
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Returns the number of active handles.
    #[must_use]
    pub fn value(&self) -> i64 {
        self.state.get().current
    }

    /// Returns the highest value seen.
    #[must_use]
    pub fn peak(&self) -> i64 {
        self.state.get().peak
    }

    /// Returns true when no handle is waiting on a continuation.
    #[must_use]
    pub fn is_quiescent(&self) -> bool {
        self.value() == 0
    }

    /// Returns a copy of the counters.
    #[must_use]
    pub fn snapshot(&self) -> ActivationSnapshot {
        self.state.get()
    }

    /// Resets every counter to zero.
    pub fn reset(&self) {
        self.state.set(ActivationSnapshot::default());
    }
}

impl fmt::Debug for ActivationGauge {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ActivationGauge")
            .field("name", &self.name)
            .field("state", &self.state.get())
            .finish()
    }
}

impl fmt::Display for ActivationGauge {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}={}", self.name, self.value())
    }
}
