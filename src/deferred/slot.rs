//! Continuation records.
//!
//! A registered continuation is stored as a [`Slot`]: the user callback plus
//! the child unit created for it. When the parent settles, each slot is told
//! the outcome. Matching slots run their callback; the others pass the
//! outcome through to their child unchanged, which is how a chain with a
//! missing handler redirects the outcome to the nearest one downstream.
//!
//! `then_or` registers two slots that share a [`Pair`], so that each side can
//! reach the other's child when an outcome crosses over.

use super::redirect;
use super::tree::{self, NodeRef};
use super::{Deferred, Next};
use crate::types::Settlement;
use std::cell::Cell;
use std::rc::Rc;

/// How a slot hands its result to the child unit.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Dispatch {
    /// Through the context work queue. Used while a parent is firing.
    Queued,
    /// Right away. Used for registration on an already settled parent.
    Immediate,
}

/// A pending continuation on a unit with success type `T`.
pub(crate) trait Slot<T, E> {
    /// The unit created for this continuation.
    fn child(&self) -> NodeRef;

    fn resolved(self: Box<Self>, value: T, dispatch: Dispatch);

    fn failed(self: Box<Self>, err: E, dispatch: Dispatch);
}

pub(crate) type SuccessFn<T, U, E> = Box<dyn FnOnce(T) -> Next<U, E>>;
pub(crate) type FailureFn<U, E> = Box<dyn FnOnce(E) -> Next<U, E>>;

/// Delivers a stored outcome to a slot.
pub(crate) fn deliver<T, E>(slot: Box<dyn Slot<T, E>>, outcome: Settlement<T, E>, dispatch: Dispatch) {
    match outcome {
        Settlement::Resolved(value) => slot.resolved(value, dispatch),
        Settlement::Failed(err) => slot.failed(err, dispatch),
    }
}

/// Success continuation registered with `then`.
pub(crate) struct OnSuccess<T, U, E> {
    run: SuccessFn<T, U, E>,
    child: Deferred<U, E>,
}

impl<T, U, E> OnSuccess<T, U, E> {
    pub(crate) fn new(run: SuccessFn<T, U, E>, child: Deferred<U, E>) -> Self {
        Self { run, child }
    }
}

impl<T, U, E> Slot<T, E> for OnSuccess<T, U, E>
where
    U: Clone + 'static,
    E: Clone + 'static,
{
    fn child(&self) -> NodeRef {
        self.child.node()
    }

    fn resolved(self: Box<Self>, value: T, dispatch: Dispatch) {
        let next = (self.run)(value);
        redirect::apply(&self.child, next, dispatch);
    }

    fn failed(self: Box<Self>, err: E, dispatch: Dispatch) {
        redirect::settle(&self.child, Settlement::Failed(err), dispatch);
    }
}

/// Failure continuation registered with `otherwise`.
pub(crate) struct OnFailure<T, E> {
    run: FailureFn<T, E>,
    child: Deferred<T, E>,
}

impl<T, E> OnFailure<T, E> {
    pub(crate) fn new(run: FailureFn<T, E>, child: Deferred<T, E>) -> Self {
        Self { run, child }
    }
}

impl<T, E> Slot<T, E> for OnFailure<T, E>
where
    T: Clone + 'static,
    E: Clone + 'static,
{
    fn child(&self) -> NodeRef {
        self.child.node()
    }

    fn resolved(self: Box<Self>, value: T, dispatch: Dispatch) {
        redirect::settle(&self.child, Settlement::Resolved(value), dispatch);
    }

    fn failed(self: Box<Self>, err: E, dispatch: Dispatch) {
        let next = (self.run)(err);
        redirect::apply(&self.child, next, dispatch);
    }
}

/// State shared by the two halves of a `then_or` registration.
///
/// `success_child` is the visible chain returned to the caller.
/// `failure_child` carries the errback's own outcome when it cannot be
/// routed into the visible chain.
pub(crate) struct Pair<T, U, E> {
    pub(super) on_success: Cell<Option<SuccessFn<T, U, E>>>,
    pub(super) on_failure: Cell<Option<FailureFn<U, E>>>,
    pub(super) success_child: Deferred<U, E>,
    pub(super) failure_child: Deferred<U, E>,
}

impl<T, U, E> Pair<T, U, E> {
    pub(crate) fn new(
        on_success: SuccessFn<T, U, E>,
        on_failure: FailureFn<U, E>,
        success_child: Deferred<U, E>,
        failure_child: Deferred<U, E>,
    ) -> Rc<Self> {
        Rc::new(Self {
            on_success: Cell::new(Some(on_success)),
            on_failure: Cell::new(Some(on_failure)),
            success_child,
            failure_child,
        })
    }

    /// Returns true until the errback has been taken to run.
    pub(crate) fn errback_pending(&self) -> bool {
        let errback = self.on_failure.take();
        let pending = errback.is_some();
        self.on_failure.set(errback);
        pending
    }
}

/// Success half of a `then_or` pair.
pub(crate) struct PairedSuccess<T, U, E>(pub(crate) Rc<Pair<T, U, E>>);

impl<T, U, E> Slot<T, E> for PairedSuccess<T, U, E>
where
    T: 'static,
    U: Clone + 'static,
    E: Clone + 'static,
{
    fn child(&self) -> NodeRef {
        self.0.success_child.node()
    }

    fn resolved(self: Box<Self>, value: T, dispatch: Dispatch) {
        let Some(run) = self.0.on_success.take() else {
            return;
        };
        match run(value) {
            Next::Defer(nested) => redirect::intercept(&self.0, &nested),
            next => redirect::apply(&self.0.success_child, next, dispatch),
        }
    }

    // Only reached when registering on an already failed unit. The errback
    // still owns the visible chain, exactly as when the failure arrives later.
    fn failed(self: Box<Self>, err: E, dispatch: Dispatch) {
        if self.0.errback_pending() {
            tree::deactivate([self.0.success_child.node()]);
            return;
        }
        redirect::settle(&self.0.success_child, Settlement::Failed(err), dispatch);
    }
}

/// Failure half of a `then_or` pair.
pub(crate) struct PairedFailure<T, U, E>(pub(crate) Rc<Pair<T, U, E>>);

impl<T, U, E> Slot<T, E> for PairedFailure<T, U, E>
where
    T: 'static,
    U: Clone + 'static,
    E: Clone + 'static,
{
    fn child(&self) -> NodeRef {
        self.0.failure_child.node()
    }

    // A success value of the parent's type cannot flow into a `U` chain, and
    // the success half already carries it, so this branch is out of scope.
    fn resolved(self: Box<Self>, _value: T, _dispatch: Dispatch) {
        tree::deactivate([self.0.failure_child.node()]);
    }

    fn failed(self: Box<Self>, err: E, dispatch: Dispatch) {
        let Some(run) = self.0.on_failure.take() else {
            return;
        };
        match run(err) {
            Next::Resolve(value) => redirect::recover(&self.0, value, dispatch),
            Next::Fail(err) => {
                redirect::settle(&self.0.failure_child, Settlement::Failed(err), dispatch);
            }
            Next::Defer(nested) => redirect::recover_from(&self.0, &nested),
        }
    }
}
