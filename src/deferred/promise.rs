//! The observation handle and continuation results.

use super::redirect;
use super::slot::{
    Dispatch, FailureFn, OnFailure, OnSuccess, Pair, PairedFailure, PairedSuccess, SuccessFn,
};
use super::tree;
use super::{Deferred, Unit};
use crate::context::Context;
use crate::types::{Kind, Liveness, Settlement, State, UnitId};
use core::fmt;
use std::rc::Rc;

/// What a continuation hands to its child unit.
pub enum Next<T, E> {
    /// Resolve the child with this value.
    Resolve(T),
    /// Fail the child with this value.
    Fail(E),
    /// Settle the child with whatever this handle settles with.
    Defer(Promise<T, E>),
}

impl<T, E> From<Result<T, E>> for Next<T, E> {
    fn from(result: Result<T, E>) -> Self {
        match result {
            Ok(value) => Self::Resolve(value),
            Err(err) => Self::Fail(err),
        }
    }
}

impl<T, E> From<Promise<T, E>> for Next<T, E> {
    fn from(promise: Promise<T, E>) -> Self {
        Self::Defer(promise)
    }
}

impl<T: fmt::Debug, E: fmt::Debug> fmt::Debug for Next<T, E> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Resolve(value) => f.debug_tuple("Resolve").field(value).finish(),
            Self::Fail(err) => f.debug_tuple("Fail").field(err).finish(),
            Self::Defer(promise) => f.debug_tuple("Defer").field(&promise.unit.id).finish(),
        }
    }
}

/// The consumer side of a one-shot result.
///
/// Every registration returns a new handle for the derived child unit. Calls
/// on a cancelled handle are refused with a warning and return a detached
/// handle that is already cancelled.
pub struct Promise<T, E> {
    unit: Rc<Unit<T, E>>,
}

impl<T, E> Clone for Promise<T, E> {
    fn clone(&self) -> Self {
        Self {
            unit: Rc::clone(&self.unit),
        }
    }
}

impl<T, E> Promise<T, E>
where
    T: Clone + 'static,
    E: Clone + 'static,
{
    pub(super) fn from_unit(unit: Rc<Unit<T, E>>) -> Self {
        Self { unit }
    }

    pub(super) fn unit(&self) -> &Rc<Unit<T, E>> {
        &self.unit
    }

    /// Registers a success continuation.
    ///
    /// A failure passes through to the returned handle unchanged.
    pub fn then<U, F>(&self, on_success: F) -> Promise<U, E>
    where
        U: Clone + 'static,
        F: FnOnce(T) -> Next<U, E> + 'static,
    {
        if self.unit.refuses("Promise::then") {
            return Deferred::detached_cancelled(&self.unit.ctx).promise();
        }
        let child: Deferred<U, E> = Deferred::child_of(&self.unit);
        let handle = child.promise();
        let run: SuccessFn<T, U, E> = Box::new(on_success);
        self.unit
            .attach(Kind::Success, Box::new(OnSuccess::new(run, child)));
        handle
    }

    /// Registers a failure continuation.
    ///
    /// A success value passes through to the returned handle unchanged.
    /// Returning [`Next::Resolve`] recovers from the failure.
    pub fn otherwise<F>(&self, on_failure: F) -> Self
    where
        F: FnOnce(E) -> Next<T, E> + 'static,
    {
        if self.unit.refuses("Promise::otherwise") {
            return Deferred::detached_cancelled(&self.unit.ctx).promise();
        }
        let child: Deferred<T, E> = Deferred::child_of(&self.unit);
        let handle = child.promise();
        let run: FailureFn<T, E> = Box::new(on_failure);
        self.unit
            .attach(Kind::Failure, Box::new(OnFailure::new(run, child)));
        handle
    }

    /// Registers a linked success/failure pair.
    ///
    /// The returned handle follows the success continuation. If it returns a
    /// handle that later fails, `on_failure` is invoked with that failure.
    /// If `on_failure` recovers while the returned handle is still pending,
    /// the recovered value settles it.
    pub fn then_or<U, F, G>(&self, on_success: F, on_failure: G) -> Promise<U, E>
    where
        U: Clone + 'static,
        F: FnOnce(T) -> Next<U, E> + 'static,
        G: FnOnce(E) -> Next<U, E> + 'static,
    {
        if self.unit.refuses("Promise::then_or") {
            return Deferred::detached_cancelled(&self.unit.ctx).promise();
        }
        let success_child: Deferred<U, E> = Deferred::child_of(&self.unit);
        let failure_child: Deferred<U, E> = Deferred::child_of(&self.unit);
        let handle = success_child.promise();
        let run_success: SuccessFn<T, U, E> = Box::new(on_success);
        let run_failure: FailureFn<U, E> = Box::new(on_failure);
        let pair = Pair::new(run_success, run_failure, success_child, failure_child);
        self.unit
            .attach(Kind::Success, Box::new(PairedSuccess(Rc::clone(&pair))));
        self.unit.attach(Kind::Failure, Box::new(PairedFailure(pair)));
        handle
    }

    /// Runs `observer` with the outcome, whichever it is.
    ///
    /// The returned handle settles with the same outcome once `observer` has
    /// run.
    pub fn always<F>(&self, observer: F) -> Self
    where
        F: FnOnce(Settlement<T, E>) + 'static,
    {
        if self.unit.refuses("Promise::always") {
            return Deferred::detached_cancelled(&self.unit.ctx).promise();
        }
        let mirror: Deferred<T, E> = Deferred::child_of(&self.unit);
        let handle = mirror.promise();
        redirect::observe(self, move |outcome| {
            observer(outcome.clone());
            redirect::settle(&mirror, outcome, Dispatch::Queued);
        });
        handle
    }

    /// Cancels the underlying unit and every unit connected to it.
    pub fn cancel(&self) {
        tree::cancel_wave(Rc::clone(&self.unit) as tree::NodeRef);
    }

    /// Returns the settlement state.
    #[must_use]
    pub fn state(&self) -> State {
        self.unit.state()
    }

    /// Returns true while unsettled.
    #[must_use]
    pub fn is_pending(&self) -> bool {
        self.state() == State::Pending
    }

    /// Returns true once resolved.
    #[must_use]
    pub fn is_resolved(&self) -> bool {
        self.state() == State::Resolved
    }

    /// Returns true once failed.
    #[must_use]
    pub fn is_failed(&self) -> bool {
        self.state() == State::Failed
    }

    /// Returns true if the unit was cancelled or its branch deactivated.
    #[must_use]
    pub fn is_cancelled(&self) -> bool {
        self.liveness().is_cancelled()
    }

    /// Returns the liveness of the unit.
    #[must_use]
    pub fn liveness(&self) -> Liveness {
        self.unit.liveness_now()
    }

    /// Returns a copy of the stored outcome, if settled.
    #[must_use]
    pub fn settlement(&self) -> Option<Settlement<T, E>> {
        self.unit.settlement()
    }

    /// Returns the success value, if resolved.
    #[must_use]
    pub fn value(&self) -> Option<T> {
        match self.settlement()? {
            Settlement::Resolved(value) => Some(value),
            Settlement::Failed(_) => None,
        }
    }

    /// Returns the failure value, if failed.
    #[must_use]
    pub fn error(&self) -> Option<E> {
        match self.settlement()? {
            Settlement::Resolved(_) => None,
            Settlement::Failed(err) => Some(err),
        }
    }

    /// Returns the number of pending success and failure continuations.
    #[must_use]
    pub fn continuation_counts(&self) -> (usize, usize) {
        let core = self.unit.core.borrow();
        (core.on_success.len(), core.on_failure.len())
    }

    /// Returns the number of child units derived from this one.
    #[must_use]
    pub fn child_count(&self) -> usize {
        self.unit.children.borrow().len()
    }

    /// Returns the unit identifier.
    #[must_use]
    pub fn id(&self) -> UnitId {
        self.unit.id
    }

    /// Returns the context the unit belongs to.
    #[must_use]
    pub fn context(&self) -> &Context {
        &self.unit.ctx
    }

    /// Returns true if both handles observe the same unit.
    #[must_use]
    pub fn ptr_eq(&self, other: &Self) -> bool {
        Rc::ptr_eq(&self.unit, &other.unit)
    }
}

impl<T, E> fmt::Debug for Promise<T, E> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let core = self.unit.core.borrow();
        f.debug_struct("Promise")
            .field("id", &self.unit.id)
            .field(
                "state",
                &core
                    .settlement
                    .as_ref()
                    .map_or(State::Pending, Settlement::state),
            )
            .field("liveness", &core.liveness)
            .finish_non_exhaustive()
    }
}
