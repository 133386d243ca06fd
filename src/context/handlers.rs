//! Pluggable handlers consulted by every unit of a context.
//!
//! - The **outcome handler** wraps the invocation of fired continuations. The
//!   default runs the job immediately; a host may defer it to a later tick.
//! - The **exception handler** receives programmer misuse. The default hands
//!   the error back so the calling operation returns `Err`.
//! - The **activation handler** receives `+1`/`-1` whenever a handle gains its
//!   first pending continuation or stops having any.

use crate::error::DeferredError;
use core::fmt;
use std::rc::Rc;

/// A unit of work handed to the outcome handler.
pub type Job = Box<dyn FnOnce()>;

/// Wraps the invocation of fired continuations.
pub type OutcomeHandler = Rc<dyn Fn(Job)>;

/// Receives programmer misuse. Returning `Err` re-raises to the caller.
pub type ExceptionHandler = Rc<dyn Fn(DeferredError) -> Result<(), DeferredError>>;

/// Receives activation deltas.
pub type ActivationHandler = Rc<dyn Fn(i32)>;

/// The three handlers, replaced wholesale by the context setters.
#[derive(Clone)]
pub struct Handlers {
    /// Outcome handler.
    pub outcome: OutcomeHandler,
    /// Exception handler.
    pub exception: ExceptionHandler,
    /// Activation handler.
    pub activation: ActivationHandler,
}

impl Handlers {
    /// Returns the default outcome handler: call the job directly.
    #[must_use]
    pub fn direct_outcome() -> OutcomeHandler {
        Rc::new(|job: Job| job())
    }

    /// Returns the default exception handler: re-raise.
    #[must_use]
    pub fn reraise() -> ExceptionHandler {
        Rc::new(|err: DeferredError| -> Result<(), DeferredError> { Err(err) })
    }

    /// Returns the default activation handler: ignore.
    #[must_use]
    pub fn ignore_activation() -> ActivationHandler {
        Rc::new(|_: i32| {})
    }

    /// Replaces the outcome handler.
    #[must_use]
    pub fn with_outcome(mut self, handler: impl Fn(Job) + 'static) -> Self {
        self.outcome = Rc::new(handler);
        self
    }

    /// Replaces the exception handler.
    #[must_use]
    pub fn with_exception(
        mut self,
        handler: impl Fn(DeferredError) -> Result<(), DeferredError> + 'static,
    ) -> Self {
        self.exception = Rc::new(handler);
        self
    }

    /// Replaces the activation handler.
    #[must_use]
    pub fn with_activation(mut self, handler: impl Fn(i32) + 'static) -> Self {
        self.activation = Rc::new(handler);
        self
    }
}

impl Default for Handlers {
    fn default() -> Self {
        Self {
            outcome: Self::direct_outcome(),
            exception: Self::reraise(),
            activation: Self::ignore_activation(),
        }
    }
}

impl fmt::Debug for Handlers {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Handlers").finish_non_exhaustive()
    }
}
