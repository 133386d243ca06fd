//! Settlement units and their observation handles.
//!
//! A [`Deferred`] is the producer side of a one-shot asynchronous result: it
//! is resolved or failed exactly once. Its [`Promise`] is the consumer side,
//! on which continuations are registered. Registering a continuation creates
//! a child unit whose outcome is derived from the continuation's result, so
//! chains of any length can be built by calling [`Promise::then`] on the
//! handle returned by the previous call.
//!
//! # Lifecycle
//!
//! Settlement is one-shot: the first `resolve`/`fail` wins and later calls are
//! ignored. Cancellation is orthogonal: [`Deferred::cancel`] or
//! [`Promise::cancel`] cancels every unit connected to this one, after which
//! settlement and registration are refused with a warning.
//!
//! # Example
//!
//! ```
//! use deferred::{Deferred, Next};
//!
//! let unit: Deferred<u32, String> = Deferred::new();
//! let doubled = unit.promise().then(|v| Next::Resolve(v * 2));
//! unit.resolve(21);
//! assert_eq!(doubled.value(), Some(42));
//! ```

mod promise;
mod redirect;
mod slot;
pub(crate) mod tree;

pub use promise::{Next, Promise};

use crate::context::Context;
use crate::error::DeferredError;
use crate::types::{Kind, Liveness, Settlement, State, UnitId};
use core::fmt;
use slot::{Dispatch, Slot};
use smallvec::SmallVec;
use std::cell::RefCell;
use std::mem;
use std::rc::{Rc, Weak};
use tree::{Node, NodeRef};

type SlotList<T, E> = SmallVec<[Box<dyn Slot<T, E>>; 2]>;

struct Core<T, E> {
    settlement: Option<Settlement<T, E>>,
    liveness: Liveness,
    on_success: SlotList<T, E>,
    on_failure: SlotList<T, E>,
}

impl<T, E> Core<T, E> {
    fn has_continuations(&self) -> bool {
        !self.on_success.is_empty() || !self.on_failure.is_empty()
    }

    fn slot_children(&self) -> Vec<NodeRef> {
        self.on_success
            .iter()
            .chain(self.on_failure.iter())
            .map(|slot| slot.child())
            .collect()
    }
}

/// Shared state behind a [`Deferred`] and its [`Promise`].
pub(crate) struct Unit<T, E> {
    id: UnitId,
    ctx: Context,
    parent: Option<Weak<dyn Node>>,
    children: RefCell<Vec<NodeRef>>,
    core: RefCell<Core<T, E>>,
}

impl<T, E> Unit<T, E>
where
    T: Clone + 'static,
    E: Clone + 'static,
{
    fn create(ctx: Context, parent: Option<Weak<dyn Node>>, liveness: Liveness) -> Rc<Self> {
        let unit = Rc::new(Self {
            id: UnitId::next(),
            ctx,
            parent,
            children: RefCell::new(Vec::new()),
            core: RefCell::new(Core {
                settlement: None,
                liveness,
                on_success: SmallVec::new(),
                on_failure: SmallVec::new(),
            }),
        });
        unit.ctx.transition(unit.id, "created");
        unit
    }

    fn state(&self) -> State {
        self.core
            .borrow()
            .settlement
            .as_ref()
            .map_or(State::Pending, Settlement::state)
    }

    fn settlement(&self) -> Option<Settlement<T, E>> {
        self.core.borrow().settlement.clone()
    }

    fn liveness_now(&self) -> Liveness {
        self.core.borrow().liveness
    }

    /// Warns and returns true if the unit no longer accepts registrations.
    fn refuses(&self, op: &'static str) -> bool {
        if self.liveness_now().is_cancelled() {
            self.ctx
                .warn_ignored(self.id, op, "cannot add callback as promise has been cancelled");
            return true;
        }
        false
    }

    fn adopt(&self, child: NodeRef) {
        self.children.borrow_mut().push(child);
    }

    /// Adds a continuation, or delivers the stored outcome if already settled.
    fn attach(self: &Rc<Self>, kind: Kind, slot: Box<dyn Slot<T, E>>) {
        let mut core = self.core.borrow_mut();
        if let Some(outcome) = core.settlement.clone() {
            drop(core);
            self.deliver_late(kind, slot, outcome);
            return;
        }
        let first = !core.has_continuations();
        match kind {
            Kind::Success => core.on_success.push(slot),
            Kind::Failure => core.on_failure.push(slot),
        }
        drop(core);
        if first {
            self.ctx.activation(self.id, 1);
        }
    }

    /// Hands a stored outcome to a continuation registered after settlement.
    fn deliver_late(
        self: &Rc<Self>,
        kind: Kind,
        slot: Box<dyn Slot<T, E>>,
        outcome: Settlement<T, E>,
    ) {
        let matches = kind == outcome.kind();
        let unit = Rc::clone(self);
        let job = move || {
            if unit.liveness_now() == Liveness::Cancelled {
                return;
            }
            unit.ctx.batch(|| slot::deliver(slot, outcome, Dispatch::Immediate));
        };
        if matches {
            self.ctx.run_outcome(Box::new(job));
        } else {
            job();
        }
    }

    /// Stores the outcome and fires the continuations.
    fn settle(self: &Rc<Self>, outcome: Settlement<T, E>, op: &'static str) {
        let (success, failure) = {
            let mut core = self.core.borrow_mut();
            if core.liveness.is_cancelled() {
                drop(core);
                self.ctx.warn_ignored(
                    self.id,
                    op,
                    "cannot resolve/fail as promise has been cancelled",
                );
                return;
            }
            if core.settlement.is_some() {
                return;
            }
            core.settlement = Some(outcome.clone());
            (mem::take(&mut core.on_success), mem::take(&mut core.on_failure))
        };
        let had_continuations = !success.is_empty() || !failure.is_empty();
        self.ctx.transition(
            self.id,
            match outcome.state() {
                State::Resolved => "resolved",
                _ => "failed",
            },
        );

        let (matching, opposite) = match outcome.kind() {
            Kind::Success => (success, failure),
            Kind::Failure => (failure, success),
        };
        if matching.is_empty() {
            // Nothing handles this outcome here; pass it down every branch.
            self.ctx.batch(|| {
                for slot in opposite {
                    slot::deliver(slot, outcome.clone(), Dispatch::Queued);
                }
            });
        } else {
            let unit = Rc::clone(self);
            self.ctx.run_outcome(Box::new(move || {
                unit.ctx.batch(|| unit.fire(matching, &opposite, &outcome));
            }));
        }

        if had_continuations {
            self.ctx.activation(self.id, -1);
        }
    }

    /// Runs the matching continuations in registration order, then takes the
    /// other branch out of scope.
    ///
    /// Stops at the first slot found after a cancellation; the remaining
    /// slots are dropped without running. The outcome handler may run this
    /// long after `settle` returned, so the check is made per slot.
    fn fire(
        &self,
        matching: SlotList<T, E>,
        opposite: &SlotList<T, E>,
        outcome: &Settlement<T, E>,
    ) {
        for slot in matching {
            if self.liveness_now() == Liveness::Cancelled {
                self.ctx.transition(self.id, "firing stopped by cancel");
                return;
            }
            slot::deliver(slot, outcome.clone(), Dispatch::Queued);
        }
        tree::deactivate(opposite.iter().map(|slot| slot.child()));
    }
}

impl<T, E> Node for Unit<T, E>
where
    T: 'static,
    E: 'static,
{
    fn unit_id(&self) -> UnitId {
        self.id
    }

    fn liveness(&self) -> Liveness {
        self.core.borrow().liveness
    }

    fn cancel_node(&self) -> Vec<NodeRef> {
        let (was_counted, dropped) = {
            let mut core = self.core.borrow_mut();
            if core.liveness == Liveness::Cancelled {
                return Vec::new();
            }
            let was_counted = core.liveness == Liveness::Active && core.has_continuations();
            core.liveness = Liveness::Cancelled;
            let dropped = (mem::take(&mut core.on_success), mem::take(&mut core.on_failure));
            (was_counted, dropped)
        };
        // Continuations are released outside the borrow; their captures may
        // hold other units.
        drop(dropped);
        if was_counted {
            self.ctx.activation(self.id, -1);
        }
        self.ctx.transition(self.id, "cancelled");

        let mut next: Vec<NodeRef> = Vec::new();
        if let Some(parent) = self.parent.as_ref().and_then(Weak::upgrade) {
            next.push(parent);
        }
        next.extend(self.children.borrow().iter().cloned());
        next.retain(|node| node.liveness() != Liveness::Cancelled);
        next
    }

    fn deactivate_node(&self) -> Vec<NodeRef> {
        let children = {
            let mut core = self.core.borrow_mut();
            if core.liveness != Liveness::Active {
                return Vec::new();
            }
            core.liveness = Liveness::Dormant;
            core.slot_children()
        };
        if !children.is_empty() {
            self.ctx.activation(self.id, -1);
        }
        self.ctx.transition(self.id, "deactivated");
        children
    }

    fn reactivate_node(&self) -> Vec<NodeRef> {
        let children = {
            let mut core = self.core.borrow_mut();
            if core.liveness != Liveness::Dormant || core.settlement.is_some() {
                return Vec::new();
            }
            core.liveness = Liveness::Active;
            core.slot_children()
        };
        if !children.is_empty() {
            self.ctx.activation(self.id, 1);
        }
        self.ctx.transition(self.id, "reactivated");
        children
    }

    fn release(&self) -> Vec<NodeRef> {
        let dropped = {
            let mut core = self.core.borrow_mut();
            (mem::take(&mut core.on_success), mem::take(&mut core.on_failure))
        };
        drop(dropped);
        mem::take(&mut *self.children.borrow_mut())
    }
}

impl<T, E> Drop for Unit<T, E> {
    fn drop(&mut self) {
        let core = self.core.get_mut();
        drop((mem::take(&mut core.on_success), mem::take(&mut core.on_failure)));
        tree::release_all(mem::take(self.children.get_mut()));
    }
}

/// The producer side of a one-shot result.
///
/// Cloning a `Deferred` yields another reference to the same unit.
pub struct Deferred<T, E> {
    unit: Rc<Unit<T, E>>,
}

impl<T, E> Clone for Deferred<T, E> {
    fn clone(&self) -> Self {
        Self {
            unit: Rc::clone(&self.unit),
        }
    }
}

impl<T, E> Deferred<T, E>
where
    T: Clone + 'static,
    E: Clone + 'static,
{
    /// Creates a pending unit in this thread's default context.
    #[must_use]
    pub fn new() -> Self {
        Self::in_context(&Context::current())
    }

    /// Creates a pending unit in `ctx`.
    #[must_use]
    pub fn in_context(ctx: &Context) -> Self {
        Self {
            unit: Unit::create(ctx.clone(), None, Liveness::Active),
        }
    }

    /// Creates a pending unit as a child of `parent`.
    ///
    /// The new unit shares the parent's context and takes part in the
    /// parent's cancellation wave.
    #[must_use]
    pub fn with_parent<P, F>(parent: &Deferred<P, F>) -> Self
    where
        P: Clone + 'static,
        F: Clone + 'static,
    {
        Self::child_of(&parent.unit)
    }

    pub(crate) fn child_of<P, F>(parent: &Rc<Unit<P, F>>) -> Self
    where
        P: Clone + 'static,
        F: Clone + 'static,
    {
        let parent_node: NodeRef = Rc::clone(parent) as NodeRef;
        let weak = Rc::downgrade(&parent_node);
        let unit = Unit::create(parent.ctx.clone(), Some(weak), Liveness::Active);
        parent.adopt(Rc::clone(&unit) as NodeRef);
        Self { unit }
    }

    /// A unit with no parent that is cancelled from the start.
    pub(crate) fn detached_cancelled(ctx: &Context) -> Self {
        Self {
            unit: Unit::create(ctx.clone(), None, Liveness::Cancelled),
        }
    }

    /// Returns the observation handle for this unit.
    #[must_use]
    pub fn promise(&self) -> Promise<T, E> {
        Promise::from_unit(Rc::clone(&self.unit))
    }

    /// Resolves the unit with `value`.
    ///
    /// Ignored if the unit is already settled; ignored with a warning if it
    /// has been cancelled.
    pub fn resolve(&self, value: T) {
        self.unit.settle(Settlement::Resolved(value), "Deferred::resolve");
    }

    /// Fails the unit with `err`.
    ///
    /// Ignored if the unit is already settled; ignored with a warning if it
    /// has been cancelled.
    pub fn fail(&self, err: E) {
        self.unit.settle(Settlement::Failed(err), "Deferred::fail");
    }

    /// Resolves or fails the unit according to `outcome`.
    pub fn settle(&self, outcome: Settlement<T, E>) {
        let op = match outcome {
            Settlement::Resolved(_) => "Deferred::resolve",
            Settlement::Failed(_) => "Deferred::fail",
        };
        self.unit.settle(outcome, op);
    }

    /// Settles this unit with whatever `source` eventually settles with.
    ///
    /// # Errors
    ///
    /// Following the unit's own handle is reported as
    /// [`DeferredError::SelfFollow`]; a handle from another context as
    /// [`DeferredError::ContextMismatch`]. Both go through the exception
    /// handler first, and this returns whatever it returns.
    pub fn follow(&self, source: &Promise<T, E>) -> Result<(), DeferredError> {
        const OP: &str = "Deferred::follow";
        if Rc::ptr_eq(&self.unit, source.unit()) {
            return self.unit.ctx.raise(DeferredError::SelfFollow {
                op: OP,
                unit: self.id(),
            });
        }
        if !source.context().ptr_eq(&self.unit.ctx) {
            return self.unit.ctx.raise(DeferredError::ContextMismatch {
                op: OP,
                unit: source.id(),
            });
        }
        redirect::forward(source, self.clone());
        Ok(())
    }

    /// Cancels this unit and every unit connected to it.
    pub fn cancel(&self) {
        tree::cancel_wave(self.node());
    }

    /// Returns the unit identifier.
    #[must_use]
    pub fn id(&self) -> UnitId {
        self.unit.id
    }

    /// Returns the settlement state.
    #[must_use]
    pub fn state(&self) -> State {
        self.unit.state()
    }

    /// Returns true if the unit has been cancelled or deactivated.
    #[must_use]
    pub fn is_cancelled(&self) -> bool {
        self.unit.liveness_now().is_cancelled()
    }

    /// Returns the context this unit belongs to.
    #[must_use]
    pub fn context(&self) -> &Context {
        &self.unit.ctx
    }

    pub(crate) fn node(&self) -> NodeRef {
        Rc::clone(&self.unit) as NodeRef
    }
}

impl<T, E> Default for Deferred<T, E>
where
    T: Clone + 'static,
    E: Clone + 'static,
{
    fn default() -> Self {
        Self::new()
    }
}

impl<T, E> fmt::Debug for Deferred<T, E> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let core = self.unit.core.borrow();
        f.debug_struct("Deferred")
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

impl Context {
    /// Creates a pending unit in this context.
    #[must_use]
    pub fn deferred<T, E>(&self) -> Deferred<T, E>
    where
        T: Clone + 'static,
        E: Clone + 'static,
    {
        Deferred::in_context(self)
    }
}
