//! Undo Trail.
//!
//! Every state mutation appends a record here; `pop` replays the trail in
//! reverse down to a saved scope mark. Records are small and `Copy` so the
//! replay loop can dispatch on a local copy while mutating the engine.

use crate::enode::EnodeId;
use crate::theory::{TheoryId, TheoryVar};

/// One undoable state change.
#[derive(Debug, Clone, Copy)]
pub(crate) enum UndoRecord {
    /// A node was created. Undo tears down the newest node: removes it from
    /// the congruence table and from its arguments' parent lists, and unmaps
    /// its term.
    NodeAdded,
    /// The merge-enabled bit of a node was flipped.
    ToggleMergeEnabled(EnodeId),
    /// Two classes were merged: `r1` was the losing root, `n1` the node that
    /// received the new proof-forest edge, `r2_num_parents` the winner's
    /// parent count before the loser's parents were appended.
    MergeClasses {
        r1: EnodeId,
        n1: EnodeId,
        r2_num_parents: usize,
    },
    /// A theory variable was attached to `node`.
    ThVarAdded { node: EnodeId, theory: TheoryId },
    /// The theory variable of `node` was replaced; `old_var` restores it.
    ThVarReplaced {
        node: EnodeId,
        theory: TheoryId,
        old_var: TheoryVar,
    },
    /// A literal was appended to the propagation queue.
    LitEnqueued,
    /// A theory equality or disequality was appended to its queue.
    ThEqEnqueued,
    /// Saved consumer position of the literal queue at scope entry.
    LitQueueHead(usize),
    /// Saved consumer position of the theory-event queue at scope entry.
    ThEqQueueHead(usize),
    /// The inconsistency flag was raised; holds the previous value.
    InconsistentSet(bool),
}
