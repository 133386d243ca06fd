//! Aggregate a sequence of handles into one.
//!
//! The aggregate resolves with every value in input order once all inputs
//! have resolved, regardless of the order they settle in. When an input
//! fails, the aggregate fails with the positional slots recorded so far:
//! immediately under [`AllPolicy::FailEarly`], or once every input has
//! settled under [`AllPolicy::FailLate`].
//!
//! # Example
//!
//! ```
//! use deferred::{Deferred, Next, combinator};
//!
//! let a: Deferred<u8, ()> = Deferred::new();
//! let b: Deferred<u8, ()> = Deferred::new();
//! let both = combinator::all([a.promise(), b.promise()]).unwrap();
//! b.resolve(2);
//! a.resolve(1);
//! assert_eq!(both.value(), Some(vec![1, 2]));
//! ```

use crate::context::Context;
use crate::deferred::{Deferred, Next, Promise};
use crate::error::DeferredError;
use crate::types::Settlement;
use std::cell::RefCell;
use std::rc::Rc;

/// Positional outcomes reported when an aggregate fails.
///
/// `None` marks inputs that had not settled when the aggregate failed.
pub type AllFailure<T, E> = Vec<Option<Settlement<T, E>>>;

/// Handle for an aggregate of handles.
pub type AllPromise<T, E> = Promise<Vec<T>, AllFailure<T, E>>;

/// When an aggregate reports a failure.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash)]
pub enum AllPolicy {
    /// Fail as soon as any input fails.
    #[default]
    FailEarly,
    /// Fail only after every input has settled.
    FailLate,
}

impl AllPolicy {
    /// Maps a `fail_late` flag to a policy.
    #[must_use]
    pub const fn from_fail_late(fail_late: bool) -> Self {
        if fail_late {
            Self::FailLate
        } else {
            Self::FailEarly
        }
    }

    /// Returns true if a single failure settles the aggregate.
    #[must_use]
    pub const fn fails_early(self) -> bool {
        matches!(self, Self::FailEarly)
    }
}

struct Aggregate<T, E> {
    slots: AllFailure<T, E>,
    completed: usize,
    failed: bool,
    policy: AllPolicy,
}

impl<T: Clone, E: Clone> Aggregate<T, E> {
    fn new(total: usize, policy: AllPolicy) -> Self {
        Self {
            slots: vec![None; total],
            completed: 0,
            failed: false,
            policy,
        }
    }

    /// Records one input's outcome. Returns the aggregate outcome once it is
    /// decided.
    fn record(
        &mut self,
        index: usize,
        outcome: Settlement<T, E>,
    ) -> Option<Settlement<Vec<T>, AllFailure<T, E>>> {
        if matches!(outcome, Settlement::Failed(_)) {
            self.failed = true;
        }
        self.slots[index] = Some(outcome);
        self.completed += 1;

        let all_settled = self.completed == self.slots.len();
        if self.failed && (all_settled || self.policy.fails_early()) {
            return Some(Settlement::Failed(self.slots.clone()));
        }
        if all_settled {
            let values = self
                .slots
                .iter()
                .filter_map(|slot| slot.as_ref().and_then(Settlement::resolved).cloned())
                .collect();
            return Some(Settlement::Resolved(values));
        }
        None
    }
}

/// Aggregates `handles` with [`AllPolicy::FailEarly`].
///
/// # Errors
///
/// See [`all_with`].
pub fn all<T, E, I>(handles: I) -> Result<AllPromise<T, E>, DeferredError>
where
    T: Clone + 'static,
    E: Clone + 'static,
    I: IntoIterator<Item = Promise<T, E>>,
{
    all_with(handles, AllPolicy::FailEarly)
}

/// Aggregates `handles` under `policy`.
///
/// The aggregate belongs to the context of the first handle, or to this
/// thread's default context when `handles` is empty.
///
/// # Errors
///
/// A handle from a different context is reported as
/// [`DeferredError::ContextMismatch`] through the exception handler. If the
/// handler swallows it, that input's slot is never filled, so the aggregate
/// can only settle by failing early.
pub fn all_with<T, E, I>(handles: I, policy: AllPolicy) -> Result<AllPromise<T, E>, DeferredError>
where
    T: Clone + 'static,
    E: Clone + 'static,
    I: IntoIterator<Item = Promise<T, E>>,
{
    const OP: &str = "combinator::all";
    let handles: Vec<Promise<T, E>> = handles.into_iter().collect();
    let ctx = handles
        .first()
        .map_or_else(Context::current, |first| first.context().clone());
    let target: Deferred<Vec<T>, AllFailure<T, E>> = Deferred::in_context(&ctx);

    if handles.is_empty() {
        target.resolve(Vec::new());
        return Ok(target.promise());
    }

    let mut accepted = Vec::with_capacity(handles.len());
    for (index, handle) in handles.iter().enumerate() {
        if handle.context().ptr_eq(&ctx) {
            accepted.push(index);
        } else {
            ctx.raise(DeferredError::ContextMismatch {
                op: OP,
                unit: handle.id(),
            })?;
            tracing::debug!(index, unit = %handle.id(), "skipping handle from another context");
        }
    }

    tracing::trace!(
        aggregate = %target.id(),
        inputs = handles.len(),
        ?policy,
        "aggregating handles"
    );
    let state = Rc::new(RefCell::new(Aggregate::new(handles.len(), policy)));
    for index in accepted {
        let handle = &handles[index];

        let on_resolved = Rc::clone(&state);
        let sink = target.clone();
        handle.then(move |value: T| {
            let decided = on_resolved
                .borrow_mut()
                .record(index, Settlement::Resolved(value.clone()));
            if let Some(outcome) = decided {
                sink.settle(outcome);
            }
            Next::Resolve(value)
        });

        let on_failed = Rc::clone(&state);
        let sink = target.clone();
        handle.otherwise(move |err: E| {
            let decided = on_failed
                .borrow_mut()
                .record(index, Settlement::Failed(err.clone()));
            if let Some(outcome) = decided {
                sink.settle(outcome);
            }
            Next::Fail(err)
        });
    }
    Ok(target.promise())
}
