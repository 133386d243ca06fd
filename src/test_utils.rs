//! Test utilities for the deferred engine.
//!
//! This module provides shared helpers for unit and integration tests:
//! - Consistent tracing-based logging initialization
//! - Phase/section macros for readable test output
//! - A recorder for asserting continuation order
//! - Contexts pre-wired with an activation gauge
//!
//! # Example
//! ```
//! use deferred::test_utils::{CallLog, init_test_logging};
//! use deferred::{Deferred, Next};
//!
//! init_test_logging();
//! let log = CallLog::new();
//! let unit: Deferred<u8, ()> = Deferred::new();
//! let l = log.clone();
//! let _ = unit.promise().then(move |v| {
//!     l.push(format!("got {v}"));
//!     Next::Resolve(v)
//! });
//! unit.resolve(1);
//! assert_eq!(log.entries(), vec!["got 1"]);
//! ```

use crate::context::Context;
use crate::observability::ActivationGauge;
use std::cell::RefCell;
use std::rc::Rc;
use std::sync::Once;
use tracing_subscriber::fmt::format::FmtSpan;

static INIT_LOGGING: Once = Once::new();

/// Initialize test logging with trace-level output.
///
/// Safe to call multiple times; only initializes once.
pub fn init_test_logging() {
    init_test_logging_with_level(tracing::Level::TRACE);
}

/// Initialize test logging with a custom level.
///
/// The first call wins; later calls are no-ops.
pub fn init_test_logging_with_level(level: tracing::Level) {
    INIT_LOGGING.call_once(|| {
        let _ = tracing_subscriber::fmt()
            .with_max_level(level)
            .with_test_writer()
            .with_file(true)
            .with_line_number(true)
            .with_target(true)
            .with_span_events(FmtSpan::CLOSE)
            .with_ansi(false)
            .try_init();
    });
}

/// A fresh context with tracing of transitions enabled and an activation
/// gauge installed.
#[must_use]
pub fn traced_context(name: &str) -> (Context, ActivationGauge) {
    let config = crate::config::DeferredConfig::default().trace_transitions(true);
    let ctx = Context::with_config(config);
    let gauge = ActivationGauge::installed(name, &ctx);
    (ctx, gauge)
}

/// Records labelled calls in order.
///
/// Clones share the same log, so one clone can move into each continuation.
#[derive(Debug, Clone, Default)]
pub struct CallLog {
    entries: Rc<RefCell<Vec<String>>>,
}

impl CallLog {
    /// Creates an empty log.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Appends an entry.
    pub fn push(&self, entry: impl Into<String>) {
        let entry = entry.into();
        tracing::trace!(entry = %entry, "call recorded");
        self.entries.borrow_mut().push(entry);
    }

    /// Returns a copy of all entries.
    #[must_use]
    pub fn entries(&self) -> Vec<String> {
        self.entries.borrow().clone()
    }

    /// Returns the number of entries.
    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.borrow().len()
    }

    /// Returns true if nothing was recorded.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.borrow().is_empty()
    }

    /// Removes all entries.
    pub fn clear(&self) {
        self.entries.borrow_mut().clear();
    }
}

/// Log a test phase transition with a visual separator.
#[macro_export]
macro_rules! test_phase {
    ($name:expr) => {
        tracing::info!(phase = %$name, "========================================");
        tracing::info!(phase = %$name, "TEST PHASE: {}", $name);
        tracing::info!(phase = %$name, "========================================");
    };
}

/// Log a section within a test phase.
#[macro_export]
macro_rules! test_section {
    ($name:expr) => {
        tracing::debug!(section = %$name, "--- {} ---", $name);
    };
}

/// Log test completion with summary.
#[macro_export]
macro_rules! test_complete {
    ($name:expr) => {
        tracing::info!(test = %$name, "test completed successfully: {}", $name);
    };
    ($name:expr, $($key:ident = $value:expr),* $(,)?) => {
        tracing::info!(
            test = %$name,
            $($key = %$value,)*
            "test completed successfully: {}",
            $name
        );
    };
}

/// Log before assertions for context.
#[macro_export]
macro_rules! assert_with_log {
    ($cond:expr, $msg:expr, $expected:expr, $actual:expr) => {
        tracing::debug!(
            expected = ?$expected,
            actual = ?$actual,
            "Asserting: {}",
            $msg
        );
        assert!($cond, "{}: expected {:?}, got {:?}", $msg, $expected, $actual);
    };
}
