//! Routing continuation results into child units.
//!
//! A continuation produces a [`Next`]: a plain value, a failure, or another
//! handle to wait on. The helpers here settle the child accordingly, and
//! implement the cross-over rules of a `then_or` pair:
//!
//! 1. A callback whose returned handle resolves settles the visible chain.
//! 2. A callback whose returned handle fails invokes the paired errback with
//!    that failure. The callback's subtree is deactivated, the errback's
//!    subtree is reactivated, and the errback's result settles its own child.
//! 3. An errback that recovers settles the visible chain if it is still
//!    pending, reviving it first. Otherwise the errback's own child takes it.

use super::slot::{Dispatch, Pair};
use super::tree;
use super::{Deferred, Next, Promise};
use crate::types::{Liveness, Settlement, State};
use std::cell::Cell;
use std::rc::Rc;

/// Settles `target` now or through its context queue.
pub(crate) fn settle<U, E>(target: &Deferred<U, E>, outcome: Settlement<U, E>, dispatch: Dispatch)
where
    U: Clone + 'static,
    E: Clone + 'static,
{
    match dispatch {
        Dispatch::Immediate => target.settle(outcome),
        Dispatch::Queued => {
            let unit = target.clone();
            target
                .context()
                .enqueue(Box::new(move || unit.settle(outcome)));
        }
    }
}

/// Settles `target` from a continuation result.
pub(crate) fn apply<U, E>(target: &Deferred<U, E>, next: Next<U, E>, dispatch: Dispatch)
where
    U: Clone + 'static,
    E: Clone + 'static,
{
    match next {
        Next::Resolve(value) => settle(target, Settlement::Resolved(value), dispatch),
        Next::Fail(err) => settle(target, Settlement::Failed(err), dispatch),
        Next::Defer(source) => forward(&source, target.clone()),
    }
}

/// Settles `target` with whatever `source` eventually settles with.
pub(crate) fn forward<U, E>(source: &Promise<U, E>, target: Deferred<U, E>)
where
    U: Clone + 'static,
    E: Clone + 'static,
{
    observe(source, move |outcome| settle(&target, outcome, Dispatch::Queued));
}

/// Runs `on_settled` once with the outcome of `source`.
///
/// Implemented with an ordinary `then`/`otherwise` pair, so the observation
/// counts as a continuation of `source` and is cancelled along with it.
pub(crate) fn observe<U, E>(source: &Promise<U, E>, on_settled: impl FnOnce(Settlement<U, E>) + 'static)
where
    U: Clone + 'static,
    E: Clone + 'static,
{
    let shared: Rc<Cell<Option<Box<dyn FnOnce(Settlement<U, E>)>>>> =
        Rc::new(Cell::new(Some(Box::new(on_settled))));
    let on_resolved = Rc::clone(&shared);
    source.then(move |value: U| {
        if let Some(f) = on_resolved.take() {
            f(Settlement::Resolved(value.clone()));
        }
        Next::Resolve(value)
    });
    source.otherwise(move |err: E| {
        if let Some(f) = shared.take() {
            f(Settlement::Failed(err.clone()));
        }
        Next::Fail(err)
    });
}

/// Waits on the handle a paired callback returned.
pub(crate) fn intercept<T, U, E>(pair: &Rc<Pair<T, U, E>>, nested: &Promise<U, E>)
where
    T: 'static,
    U: Clone + 'static,
    E: Clone + 'static,
{
    let pair = Rc::clone(pair);
    observe(nested, move |outcome| match outcome {
        Settlement::Resolved(value) => {
            settle(&pair.success_child, Settlement::Resolved(value), Dispatch::Queued);
        }
        Settlement::Failed(err) => redirect_failure(pair, err),
    });
}

fn redirect_failure<T, U, E>(pair: Rc<Pair<T, U, E>>, err: E)
where
    T: 'static,
    U: Clone + 'static,
    E: Clone + 'static,
{
    let cancelled = |d: &Deferred<U, E>| d.promise().liveness() == Liveness::Cancelled;
    if cancelled(&pair.success_child) || cancelled(&pair.failure_child) {
        return;
    }
    let Some(errback) = pair.on_failure.take() else {
        settle(&pair.success_child, Settlement::Failed(err), Dispatch::Queued);
        return;
    };
    let ctx = pair.success_child.context().clone();
    ctx.enqueue(Box::new(move || {
        tree::deactivate([pair.success_child.node()]);
        tree::reactivate([pair.failure_child.node()]);
        let next = errback(err);
        apply(&pair.failure_child, next, Dispatch::Immediate);
    }));
}

/// Routes a recovered value from a paired errback.
pub(crate) fn recover<T, U, E>(pair: &Rc<Pair<T, U, E>>, value: U, dispatch: Dispatch)
where
    T: 'static,
    U: Clone + 'static,
    E: Clone + 'static,
{
    let ctx = pair.success_child.context().clone();
    let pair = Rc::clone(pair);
    let job = move || {
        let visible = &pair.success_child;
        let promise = visible.promise();
        if promise.state() == State::Pending && promise.liveness() != Liveness::Cancelled {
            tree::reactivate([visible.node()]);
            visible.settle(Settlement::Resolved(value));
        } else {
            pair.failure_child.settle(Settlement::Resolved(value));
        }
    };
    match dispatch {
        Dispatch::Immediate => job(),
        Dispatch::Queued => ctx.enqueue(Box::new(job)),
    }
}

/// Waits on the handle a paired errback returned.
pub(crate) fn recover_from<T, U, E>(pair: &Rc<Pair<T, U, E>>, nested: &Promise<U, E>)
where
    T: 'static,
    U: Clone + 'static,
    E: Clone + 'static,
{
    let pair = Rc::clone(pair);
    observe(nested, move |outcome| match outcome {
        Settlement::Resolved(value) => recover(&pair, value, Dispatch::Queued),
        Settlement::Failed(err) => {
            settle(&pair.failure_child, Settlement::Failed(err), Dispatch::Queued);
        }
    });
}
