//! The engine root shared by a family of units.
//!
//! A [`Context`] owns the mutable handler slot, the engine configuration and
//! the FIFO work queue through which derived units are settled. Every unit
//! keeps a reference to the context it was created in and reads the handlers
//! at the moment it needs them, so a setter takes effect for all units,
//! including ones settling further up the current call stack.
//!
//! Each thread has a default context returned by [`Context::current`]; units
//! created with [`Deferred::new`](crate::Deferred::new) belong to it.
//!
//! # Work queue
//!
//! Firing a unit's continuations produces settlements for their child units.
//! Those settlements are queued rather than performed recursively, and the
//! outermost settlement on the call stack drains the queue before it returns.
//! A chain of any length therefore settles with a bounded native stack, and
//! everything is still settled by the time the triggering call returns when
//! the outcome handler is synchronous.

pub mod handlers;

pub use handlers::{ActivationHandler, ExceptionHandler, Handlers, Job, OutcomeHandler};

use crate::config::DeferredConfig;
use crate::error::DeferredError;
use crate::types::UnitId;
use core::fmt;
use std::cell::{Cell, RefCell};
use std::collections::VecDeque;
use std::rc::Rc;

thread_local! {
    static DEFAULT_CONTEXT: Context = Context::new();
}

struct ContextInner {
    handlers: RefCell<Handlers>,
    config: Cell<DeferredConfig>,
    queue: RefCell<VecDeque<Job>>,
    draining: Cell<bool>,
}

/// Shared engine state for a family of units.
#[derive(Clone)]
pub struct Context {
    inner: Rc<ContextInner>,
}

/// Clears the draining flag even if a job panics.
struct DrainGuard<'a>(&'a Cell<bool>);

impl Drop for DrainGuard<'_> {
    fn drop(&mut self) {
        self.0.set(false);
    }
}

impl Context {
    /// Creates a context with default handlers and configuration.
    #[must_use]
    pub fn new() -> Self {
        Self::with_parts(Handlers::default(), DeferredConfig::default())
    }

    /// Creates a context with the given configuration.
    #[must_use]
    pub fn with_config(config: DeferredConfig) -> Self {
        Self::with_parts(Handlers::default(), config)
    }

    /// Creates a context with explicit handlers and configuration.
    #[must_use]
    pub fn with_parts(handlers: Handlers, config: DeferredConfig) -> Self {
        Self {
            inner: Rc::new(ContextInner {
                handlers: RefCell::new(handlers),
                config: Cell::new(config),
                queue: RefCell::new(VecDeque::new()),
                draining: Cell::new(false),
            }),
        }
    }

    /// Returns this thread's default context.
    #[must_use]
    pub fn current() -> Self {
        DEFAULT_CONTEXT.with(Clone::clone)
    }

    /// Returns true if both values refer to the same context.
    #[must_use]
    pub fn ptr_eq(&self, other: &Self) -> bool {
        Rc::ptr_eq(&self.inner, &other.inner)
    }

    /// Returns a snapshot of the installed handlers.
    #[must_use]
    pub fn handlers(&self) -> Handlers {
        self.inner.handlers.borrow().clone()
    }

    /// Replaces all three handlers.
    pub fn set_handlers(&self, handlers: Handlers) {
        *self.inner.handlers.borrow_mut() = handlers;
    }

    /// Restores the default handlers.
    pub fn reset_handlers(&self) {
        self.set_handlers(Handlers::default());
    }

    /// Replaces the outcome handler.
    pub fn set_outcome_handler(&self, handler: impl Fn(Job) + 'static) {
        self.inner.handlers.borrow_mut().outcome = Rc::new(handler);
    }

    /// Replaces the exception handler.
    pub fn set_exception_handler(
        &self,
        handler: impl Fn(DeferredError) -> Result<(), DeferredError> + 'static,
    ) {
        self.inner.handlers.borrow_mut().exception = Rc::new(handler);
    }

    /// Replaces the activation handler.
    pub fn set_activation_handler(&self, handler: impl Fn(i32) + 'static) {
        self.inner.handlers.borrow_mut().activation = Rc::new(handler);
    }

    /// Returns the engine configuration.
    #[must_use]
    pub fn config(&self) -> DeferredConfig {
        self.inner.config.get()
    }

    /// Replaces the engine configuration.
    pub fn set_config(&self, config: DeferredConfig) {
        self.inner.config.set(config);
    }

    /// Returns the number of queued settlements not yet drained.
    #[must_use]
    pub fn queued(&self) -> usize {
        self.inner.queue.borrow().len()
    }

    /// Hands a job to the outcome handler.
    ///
    /// The handler is cloned out of its slot first so it may itself replace
    /// handlers or settle units.
    pub(crate) fn run_outcome(&self, job: Job) {
        let outcome = Rc::clone(&self.inner.handlers.borrow().outcome);
        outcome(job);
    }

    /// Routes misuse through the exception handler.
    pub(crate) fn raise(&self, err: DeferredError) -> Result<(), DeferredError> {
        tracing::debug!(error = %err, "deferred misuse reported");
        let exception = Rc::clone(&self.inner.handlers.borrow().exception);
        exception(err)
    }

    /// Reports an activation delta.
    pub(crate) fn activation(&self, unit: UnitId, delta: i32) {
        if self.config().trace_transitions {
            tracing::trace!(unit = %unit, delta, "activation");
        }
        let activation = Rc::clone(&self.inner.handlers.borrow().activation);
        activation(delta);
    }

    /// Logs an operation that was ignored because the unit was cancelled.
    pub(crate) fn warn_ignored(&self, unit: UnitId, op: &'static str, reason: &'static str) {
        if self.config().warn_ignored {
            tracing::warn!(unit = %unit, op, "{op}: {reason}");
        }
    }

    /// Records a state transition at trace level.
    pub(crate) fn transition(&self, unit: UnitId, what: &'static str) {
        if self.config().trace_transitions {
            tracing::trace!(unit = %unit, transition = what, "unit transition");
        }
    }

    /// Runs `f` as part of a batch: queued settlements are drained after `f`
    /// returns, unless an enclosing batch is already draining.
    pub(crate) fn batch<R>(&self, f: impl FnOnce() -> R) -> R {
        if self.inner.draining.get() {
            return f();
        }
        self.inner.draining.set(true);
        let _guard = DrainGuard(&self.inner.draining);
        let result = f();
        self.drain_queue();
        result
    }

    /// Queues a settlement, draining immediately if nothing else is.
    pub(crate) fn enqueue(&self, job: Job) {
        self.inner.queue.borrow_mut().push_back(job);
        if !self.inner.draining.get() {
            self.batch(|| ());
        }
    }

    fn drain_queue(&self) {
        let mut drained = 0usize;
        loop {
            let next = self.inner.queue.borrow_mut().pop_front();
            let Some(job) = next else { break };
            job();
            drained += 1;
        }
        if drained > 0 && self.config().trace_transitions {
            tracing::trace!(drained, "work queue drained");
        }
    }
}

/// Replaces the outcome handler of this thread's default context.
pub fn set_outcome_handler(handler: impl Fn(Job) + 'static) {
    Context::current().set_outcome_handler(handler);
}

/// Replaces the exception handler of this thread's default context.
pub fn set_exception_handler(
    handler: impl Fn(DeferredError) -> Result<(), DeferredError> + 'static,
) {
    Context::current().set_exception_handler(handler);
}

/// Replaces the activation handler of this thread's default context.
pub fn set_activation_handler(handler: impl Fn(i32) + 'static) {
    Context::current().set_activation_handler(handler);
}

impl Default for Context {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Debug for Context {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Context")
            .field("config", &self.config())
            .field("queued", &self.queued())
            .field("draining", &self.inner.draining.get())
            .finish_non_exhaustive()
    }
}
