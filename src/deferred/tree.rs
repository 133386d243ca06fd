//! Tree walks over the unit graph.
//!
//! Units form a tree: a parent owns its children, a child keeps a weak link
//! back to its parent. Three walks run over that tree:
//!
//! - **cancel** spreads in both directions until every reachable unit is
//!   cancelled, producing one connected cancellation wave;
//! - **deactivate** marks a subtree dormant when its branch falls out of
//!   scope, without touching anything upward;
//! - **reactivate** revives a dormant subtree when a redirect routes an
//!   outcome into it.
//!
//! All three use an explicit worklist so tree depth never translates into
//! native stack depth. Each walk reports activation deltas for nodes that had
//! pending continuations.

use crate::types::{Liveness, UnitId};
use std::rc::Rc;

/// A type-erased reference to a unit in the tree.
pub(crate) type NodeRef = Rc<dyn Node>;

/// Per-unit operations the walks need, independent of value types.
pub(crate) trait Node {
    fn unit_id(&self) -> UnitId;

    fn liveness(&self) -> Liveness;

    /// Cancels this unit alone. Returns the neighbours the wave continues to,
    /// or nothing if the unit was already cancelled.
    fn cancel_node(&self) -> Vec<NodeRef>;

    /// Marks this unit dormant. Returns the children of its pending
    /// continuations.
    fn deactivate_node(&self) -> Vec<NodeRef>;

    /// Revives a dormant, unsettled unit. Returns the children of its pending
    /// continuations.
    fn reactivate_node(&self) -> Vec<NodeRef>;

    /// Drops pending continuations and hands back the owned children, so a
    /// long chain can be torn down without recursing through `Drop`.
    fn release(&self) -> Vec<NodeRef>;
}

/// Drops `orphans` and every subtree only they keep alive.
pub(crate) fn release_all(mut orphans: Vec<NodeRef>) {
    while let Some(node) = orphans.pop() {
        if Rc::strong_count(&node) == 1 {
            orphans.extend(node.release());
        }
    }
}

/// Cancels `start` and everything connected to it.
pub(crate) fn cancel_wave(start: NodeRef) {
    tracing::debug!(unit = %start.unit_id(), "cancellation wave");
    let mut pending = vec![start];
    while let Some(node) = pending.pop() {
        pending.extend(node.cancel_node());
    }
}

/// Deactivates each root and its pending subtree.
pub(crate) fn deactivate(roots: impl IntoIterator<Item = NodeRef>) {
    let mut pending: Vec<NodeRef> = roots.into_iter().collect();
    while let Some(node) = pending.pop() {
        pending.extend(node.deactivate_node());
    }
}

/// Reactivates each dormant root and its pending subtree.
pub(crate) fn reactivate(roots: impl IntoIterator<Item = NodeRef>) {
    let mut pending: Vec<NodeRef> = roots.into_iter().collect();
    while let Some(node) = pending.pop() {
        pending.extend(node.reactivate_node());
    }
}
