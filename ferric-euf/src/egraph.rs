//! E-Graph Engine.
//!
//! Maintains the partition of interned terms into equivalence classes,
//! closed under congruence: `f(a1, .., an) = f(b1, .., bn)` whenever each
//! `ai` is equal to `bi`. Supports backtrackable merges (push/pop scopes),
//! proof-producing explanations, theory-variable notifications, and conflict
//! detection when two distinct interpreted constants are forced equal.
//!
//! The engine is single-threaded and synchronous. Long propagation loops
//! poll a [`ResourceManager`] so callers can bound or cancel work; an
//! interrupted propagation leaves every invariant intact and can be resumed
//! by calling [`Egraph::propagate`] again.

use ferric_core::ast::{DeclId, TermId, TermKind, TermManager};
use ferric_core::error::{FerricError, Result};
use ferric_core::resource::ResourceManager;
use ferric_core::sort::SortId;
use rustc_hash::FxHashMap;
use smallvec::SmallVec;
use tracing::trace;

use crate::enode::{ENode, EnodeId};
use crate::etable::{CongruenceTable, Signature};
use crate::justification::Justification;
use crate::theory::TheoryEvent;
use crate::trail::UndoRecord;

/// Counters maintained by the engine.
#[derive(Debug, Clone, Default)]
pub struct EgraphStats {
    /// Class merges performed (including those that hit a conflict).
    pub num_merges: u64,
    /// Conflicts between interpreted constants.
    pub num_conflicts: u64,
    /// Propagated literals that are not equality atoms.
    pub num_literals: u64,
    /// Propagated equality atoms.
    pub num_eqs: u64,
    /// Theory equality notifications.
    pub num_th_eqs: u64,
    /// Theory disequality notifications.
    pub num_th_diseqs: u64,
}

/// A literal handed to the external Boolean engine.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PropagatedLiteral {
    /// The atom to assign true.
    pub node: EnodeId,
    /// Whether the atom is an equality whose sides became equal (as opposed
    /// to a term congruence-merged into a Boolean constant).
    pub is_equality: bool,
}

/// The congruence-closure engine.
///
/// `J` is the opaque payload of external justifications; explanations
/// collect clones of these payloads into the caller's output vector.
pub struct Egraph<J> {
    pub(crate) nodes: Vec<ENode<J>>,
    pub(crate) expr2node: FxHashMap<TermId, EnodeId>,
    pub(crate) table: CongruenceTable,
    pub(crate) updates: Vec<UndoRecord>,
    pub(crate) scopes: Vec<usize>,
    pub(crate) pending_scopes: usize,
    pub(crate) worklist: Vec<EnodeId>,
    pub(crate) new_lits: Vec<PropagatedLiteral>,
    pub(crate) new_lits_qhead: usize,
    pub(crate) new_th_eqs: Vec<TheoryEvent>,
    pub(crate) new_th_eqs_qhead: usize,
    pub(crate) th_diseq_theories: Vec<bool>,
    pub(crate) inconsistent: bool,
    pub(crate) conflict: Option<(EnodeId, EnodeId, Justification<J>)>,
    pub(crate) todo: Vec<EnodeId>,
    pub(crate) limit: ResourceManager,
    pub(crate) stats: EgraphStats,
    pub(crate) used_cc: Option<Box<dyn FnMut(TermId, TermId)>>,
    pub(crate) used_eq: Option<Box<dyn FnMut(TermId, TermId, TermId)>>,
}

impl<J> Egraph<J> {
    /// Create an empty engine with no resource limits.
    pub fn new() -> Self {
        Self {
            nodes: Vec::new(),
            expr2node: FxHashMap::default(),
            table: CongruenceTable::new(),
            updates: Vec::new(),
            scopes: Vec::new(),
            pending_scopes: 0,
            worklist: Vec::new(),
            new_lits: Vec::new(),
            new_lits_qhead: 0,
            new_th_eqs: Vec::new(),
            new_th_eqs_qhead: 0,
            th_diseq_theories: Vec::new(),
            inconsistent: false,
            conflict: None,
            todo: Vec::new(),
            limit: ResourceManager::unlimited(),
            stats: EgraphStats::default(),
            used_cc: None,
            used_eq: None,
        }
    }

    #[inline]
    pub(crate) fn node(&self, id: EnodeId) -> &ENode<J> {
        &self.nodes[id.index()]
    }

    #[inline]
    pub(crate) fn node_mut(&mut self, id: EnodeId) -> &mut ENode<J> {
        &mut self.nodes[id.index()]
    }

    /// The node a term is interned as, if any.
    #[must_use]
    pub fn find(&self, t: TermId) -> Option<EnodeId> {
        self.expr2node.get(&t).copied()
    }

    /// Representative of a node's equivalence class.
    #[must_use]
    pub fn root(&self, n: EnodeId) -> EnodeId {
        self.node(n).root
    }

    /// The term a node was interned from.
    #[must_use]
    pub fn term(&self, n: EnodeId) -> TermId {
        self.node(n).term
    }

    /// Check if two nodes are in the same equivalence class.
    #[must_use]
    pub fn are_equal(&self, a: EnodeId, b: EnodeId) -> bool {
        self.node(a).root == self.node(b).root
    }

    /// Size of a node's equivalence class.
    #[must_use]
    pub fn class_size(&self, n: EnodeId) -> usize {
        self.node(self.node(n).root).class_size as usize
    }

    /// All members of a node's equivalence class.
    #[must_use]
    pub fn class(&self, n: EnodeId) -> Vec<EnodeId> {
        let mut members = Vec::with_capacity(self.class_size(n));
        let mut c = n;
        loop {
            members.push(c);
            c = self.node(c).next;
            if c == n {
                break;
            }
        }
        members
    }

    /// Number of interned nodes.
    #[must_use]
    pub fn num_nodes(&self) -> usize {
        self.nodes.len()
    }

    /// Number of congruence-table entries.
    #[must_use]
    pub fn num_table_entries(&self) -> usize {
        self.table.len()
    }

    /// Current scope depth (including scopes not yet materialized).
    #[must_use]
    pub fn num_scopes(&self) -> usize {
        self.scopes.len() + self.pending_scopes
    }

    /// Whether a conflict has been latched.
    #[must_use]
    pub fn inconsistent(&self) -> bool {
        self.inconsistent
    }

    /// Engine counters.
    #[must_use]
    pub fn stats(&self) -> &EgraphStats {
        &self.stats
    }

    /// Install a resource manager polled by propagation.
    pub fn set_resource_manager(&mut self, limit: ResourceManager) {
        self.limit = limit;
    }

    /// The installed resource manager.
    #[must_use]
    pub fn resource(&self) -> &ResourceManager {
        &self.limit
    }

    // ------------------------------------------------------------------
    // Interning

    /// Intern a term, creating e-nodes for it and its subterms as needed.
    /// Interning the same term twice returns the same node.
    ///
    /// Creating an application may already trigger a congruence merge; the
    /// caller should run [`Egraph::propagate`] before reading the queues.
    pub fn intern(&mut self, t: TermId, tm: &TermManager) -> Result<EnodeId> {
        if let Some(&n) = self.expr2node.get(&t) {
            return Ok(n);
        }
        let term = tm
            .get(t)
            .ok_or_else(|| FerricError::UnknownSymbol(format!("term #{}", t.raw())))?;
        let sort = term.sort;
        let decl = match term.kind {
            TermKind::Apply(d) => Some(d),
            _ => None,
        };
        let arg_terms = term.args.clone();
        let mut args = SmallVec::<[EnodeId; 2]>::new();
        for &a in &arg_terms {
            args.push(self.intern(a, tm)?);
        }
        self.force_push();
        let n = self.mk_enode(t, tm, sort, decl, args);
        if self.node(n).args.is_empty() {
            return Ok(n);
        }
        if self.node(n).is_equality {
            self.update_children(n);
            self.reinsert_equality(n);
            return Ok(n);
        }
        let sig = self.signature(n);
        let n2 = self.table.insert(sig, n);
        if n2 == n {
            self.update_children(n);
        } else {
            let commutative = self.node(n).commutative;
            self.merge(n, n2, Justification::Congruence { commutative });
        }
        Ok(n)
    }

    fn mk_enode(
        &mut self,
        t: TermId,
        tm: &TermManager,
        sort: SortId,
        decl: Option<DeclId>,
        args: SmallVec<[EnodeId; 2]>,
    ) -> EnodeId {
        let id = EnodeId::new(self.nodes.len() as u32);
        let mut node = ENode::new(id, t, sort, decl, args);
        node.is_equality = tm.is_eq(t);
        node.is_true_const = tm.is_true(t);
        node.is_false_const = tm.is_false(t);
        node.interpreted = node.args.is_empty() && tm.is_value(t);
        node.commutative = tm.is_commutative(t);
        let arg_ids = node.args.clone();
        self.nodes.push(node);
        self.expr2node.insert(t, id);
        self.updates.push(UndoRecord::NodeAdded);
        for &a in &arg_ids {
            self.set_merge_enabled(a, true);
        }
        id
    }

    fn update_children(&mut self, n: EnodeId) {
        for i in 0..self.node(n).args.len() {
            let a = self.node(n).args[i];
            let r = self.node(a).root;
            self.node_mut(r).parents.push(n);
        }
        self.node_mut(n).children_registered = true;
    }

    /// Congruence-table key of an application, under current roots.
    pub(crate) fn signature(&self, n: EnodeId) -> Signature {
        let node = self.node(n);
        let decl = node.decl.expect("congruence signature of a non-application");
        let mut args: SmallVec<[EnodeId; 2]> =
            node.args.iter().map(|&a| self.node(a).root).collect();
        if node.commutative && args.len() == 2 && args[0] > args[1] {
            args.swap(0, 1);
        }
        Signature { decl, args }
    }

    // ------------------------------------------------------------------
    // Merging

    /// Merge the classes of `a` and `b` with justification `j`.
    ///
    /// A no-op when the classes coincide. Merging two distinct interpreted
    /// constants latches a conflict instead of merging.
    pub fn merge(&mut self, a: EnodeId, b: EnodeId, j: Justification<J>) {
        let mut n1 = a;
        let mut n2 = b;
        let mut r1 = self.node(n1).root;
        let mut r2 = self.node(n2).root;
        if r1 == r2 {
            return;
        }
        debug_assert_eq!(
            self.node(n1).sort,
            self.node(n2).sort,
            "merging nodes of different sorts"
        );
        trace!(n1 = n1.raw(), n2 = n2.raw(), "merge");
        self.force_push();
        self.stats.num_merges += 1;
        if self.node(r1).interpreted && self.node(r2).interpreted {
            self.set_conflict(n1, n2, j);
            return;
        }
        // keep the larger class, and always keep an interpreted root
        if (self.node(r1).class_size > self.node(r2).class_size && !self.node(r2).interpreted)
            || self.node(r1).interpreted
        {
            std::mem::swap(&mut r1, &mut r2);
            std::mem::swap(&mut n1, &mut n2);
        }
        // r1 is folded into r2 from here on
        if (self.node(r2).is_true_const || self.node(r2).is_false_const) && j.is_congruence() {
            self.add_literal(n1, false);
        }
        if self.node(r2).is_false_const && self.node(n1).is_equality {
            self.new_diseq(n1);
        }
        // parents of the losing root are about to change keys
        self.remove_parents(r1);
        let r2_num_parents = self.node(r2).parents.len();
        self.updates.push(UndoRecord::MergeClasses {
            r1,
            n1,
            r2_num_parents,
        });
        self.merge_justification(n1, n2, j);
        let mut c = n1;
        loop {
            self.node_mut(c).root = r2;
            c = self.node(c).next;
            if c == n1 {
                break;
            }
        }
        let r1_next = self.node(r1).next;
        let r2_next = self.node(r2).next;
        self.node_mut(r1).next = r2_next;
        self.node_mut(r2).next = r1_next;
        let r1_size = self.node(r1).class_size;
        self.node_mut(r2).class_size += r1_size;
        let appended = self.node(r1).parents.clone();
        self.node_mut(r2).parents.extend_from_slice(&appended);
        self.merge_th_eq(r1, r2);
        self.worklist.push(r2);
    }

    fn remove_parents(&mut self, r: EnodeId) {
        for i in 0..self.node(r).parents.len() {
            let p = self.node(r).parents[i];
            if self.node(p).is_equality {
                continue;
            }
            let sig = self.signature(p);
            self.table.erase(&sig, p);
        }
    }

    /// Re-orient the proof-forest path so `n1` becomes the sub-tree root,
    /// then hang it below `n2`.
    fn merge_justification(&mut self, n1: EnodeId, n2: EnodeId, j: Justification<J>) {
        self.reverse_justification(n1);
        self.node_mut(n1).target = Some(n2);
        self.node_mut(n1).justification = j;
    }

    pub(crate) fn reverse_justification(&mut self, n: EnodeId) {
        let mut curr = Some(n);
        let mut prev: Option<EnodeId> = None;
        let mut just = Justification::Axiom;
        while let Some(c) = curr {
            let next = self.node(c).target;
            let node = self.node_mut(c);
            let next_just = std::mem::replace(&mut node.justification, just);
            node.target = prev;
            just = next_just;
            prev = Some(c);
            curr = next;
        }
    }

    fn unmerge_justification(&mut self, n1: EnodeId) {
        self.node_mut(n1).target = None;
        self.node_mut(n1).justification = Justification::Axiom;
        let r = self.node(n1).root;
        self.reverse_justification(r);
    }

    pub(crate) fn add_literal(&mut self, n: EnodeId, is_equality: bool) {
        trace!(node = n.raw(), is_equality, "propagated literal");
        self.new_lits.push(PropagatedLiteral {
            node: n,
            is_equality,
        });
        self.updates.push(UndoRecord::LitEnqueued);
        if is_equality {
            self.stats.num_eqs += 1;
        } else {
            self.stats.num_literals += 1;
        }
    }

    /// Equality atoms stay out of the congruence table; when both sides
    /// share a root and the atom is not already merged with `true`, the
    /// external Boolean engine is told to assign it.
    pub(crate) fn reinsert_equality(&mut self, p: EnodeId) {
        debug_assert!(self.node(p).is_equality);
        let a0 = self.node(p).args[0];
        let a1 = self.node(p).args[1];
        if self.node(a0).root == self.node(a1).root
            && !self.node(self.node(p).root).is_true_const
        {
            self.add_literal(p, true);
        }
    }

    fn set_conflict(&mut self, n1: EnodeId, n2: EnodeId, j: Justification<J>) {
        self.stats.num_conflicts += 1;
        if self.inconsistent {
            return;
        }
        trace!(n1 = n1.raw(), n2 = n2.raw(), "conflict");
        self.inconsistent = true;
        self.updates.push(UndoRecord::InconsistentSet(false));
        self.conflict = Some((n1, n2, j));
    }

    // ------------------------------------------------------------------
    // Propagation

    /// Drive congruence closure to fixpoint.
    ///
    /// Returns true iff new propagations (literals or theory events) or an
    /// inconsistency were produced. May return early when the resource
    /// manager trips; re-entering after clearing the limit resumes cleanly.
    pub fn propagate(&mut self) -> bool {
        let mut head = 0;
        let mut tail = self.worklist.len();
        while head < tail && self.limit.inc() && !self.inconsistent {
            let mut i = head;
            while i < tail && !self.inconsistent {
                let n = {
                    let w = self.worklist[i];
                    self.node(w).root
                };
                if !self.node(n).mark1 {
                    self.node_mut(n).mark1 = true;
                    self.worklist[i] = n;
                    self.reinsert(n);
                }
                i += 1;
            }
            for j in head..tail {
                let w = self.worklist[j];
                self.node_mut(w).mark1 = false;
            }
            head = tail;
            tail = self.worklist.len();
        }
        if head < self.worklist.len() && !self.inconsistent {
            // resource limit tripped: keep the unprocessed tail so the
            // caller can re-enter propagation after clearing the limit
            self.worklist.drain(..head);
        } else {
            self.worklist.clear();
        }
        self.force_push();
        self.new_lits_qhead < self.new_lits.len()
            || self.new_th_eqs_qhead < self.new_th_eqs.len()
            || self.inconsistent
    }

    /// Re-key the parents of a root whose class grew.
    fn reinsert(&mut self, n: EnodeId) {
        let num_parents = self.node(n).parents.len();
        for i in 0..num_parents {
            let p = self.node(n).parents[i];
            if self.node(p).is_equality {
                self.reinsert_equality(p);
            } else if self.node(p).merge_enabled {
                let sig = self.signature(p);
                let other = self.table.insert(sig, p);
                if other != p {
                    let commutative = self.node(p).commutative;
                    self.merge(other, p, Justification::Congruence { commutative });
                    if self.inconsistent {
                        break;
                    }
                }
            }
        }
    }

    /// Toggle whether a node participates in congruence closure. Disabling
    /// an application removes it from the congruence table; re-enabling
    /// re-keys it and merges any congruence that reveals.
    pub fn set_merge_enabled(&mut self, n: EnodeId, enabled: bool) {
        if enabled != self.node(n).merge_enabled {
            self.force_push();
            self.updates.push(UndoRecord::ToggleMergeEnabled(n));
            self.toggle_merge_enabled(n, false);
        }
    }

    fn toggle_merge_enabled(&mut self, n: EnodeId, backtracking: bool) {
        let enabled = !self.node(n).merge_enabled;
        self.node_mut(n).merge_enabled = enabled;
        if self.node(n).args.is_empty() || self.node(n).is_equality {
            return;
        }
        let sig = self.signature(n);
        if enabled {
            let other = self.table.insert(sig, n);
            if other != n && !backtracking {
                let commutative = self.node(n).commutative;
                self.merge(other, n, Justification::Congruence { commutative });
            }
        } else {
            self.table.erase(&sig, n);
        }
    }

    // ------------------------------------------------------------------
    // Output queues

    /// Next unconsumed propagated literal. The consumer position is
    /// scope-aware: popping a scope rewinds it.
    pub fn next_literal(&mut self) -> Option<PropagatedLiteral> {
        if self.new_lits_qhead < self.new_lits.len() {
            let lit = self.new_lits[self.new_lits_qhead];
            self.new_lits_qhead += 1;
            Some(lit)
        } else {
            None
        }
    }

    /// Next unconsumed theory event.
    pub fn next_theory_event(&mut self) -> Option<TheoryEvent> {
        if self.new_th_eqs_qhead < self.new_th_eqs.len() {
            let ev = self.new_th_eqs[self.new_th_eqs_qhead];
            self.new_th_eqs_qhead += 1;
            Some(ev)
        } else {
            None
        }
    }

    /// Number of literals not yet consumed.
    #[must_use]
    pub fn num_pending_literals(&self) -> usize {
        self.new_lits.len() - self.new_lits_qhead
    }

    /// Number of theory events not yet consumed.
    #[must_use]
    pub fn num_pending_theory_events(&self) -> usize {
        self.new_th_eqs.len() - self.new_th_eqs_qhead
    }

    /// Total literals ever queued in live scopes.
    #[must_use]
    pub fn num_literals(&self) -> usize {
        self.new_lits.len()
    }

    /// Total theory events ever queued in live scopes.
    #[must_use]
    pub fn num_theory_events(&self) -> usize {
        self.new_th_eqs.len()
    }

    // ------------------------------------------------------------------
    // Scopes

    /// Open `num_scopes` backtracking scopes. Scope creation is lazy: no
    /// state is touched until the next mutation.
    pub fn push(&mut self, num_scopes: usize) {
        self.pending_scopes += num_scopes;
    }

    /// Materialize pending scopes before a mutation that must be undoable.
    /// Each scope records the queue consumer positions right after its mark
    /// so that popping it rewinds the heads.
    pub(crate) fn force_push(&mut self) {
        for _ in 0..self.pending_scopes {
            self.scopes.push(self.updates.len());
            self.updates
                .push(UndoRecord::ThEqQueueHead(self.new_th_eqs_qhead));
            self.updates
                .push(UndoRecord::LitQueueHead(self.new_lits_qhead));
        }
        self.pending_scopes = 0;
    }

    /// Close `num_scopes` scopes, replaying the trail in reverse.
    pub fn pop(&mut self, mut num_scopes: usize) {
        if num_scopes <= self.pending_scopes {
            self.pending_scopes -= num_scopes;
            return;
        }
        num_scopes -= self.pending_scopes;
        self.pending_scopes = 0;
        debug_assert!(num_scopes <= self.scopes.len(), "pop below the bottom scope");
        let num_scopes = num_scopes.min(self.scopes.len());
        if num_scopes == 0 {
            return;
        }
        let old_lim = self.scopes.len() - num_scopes;
        let num_updates = self.scopes[old_lim];
        trace!(num_scopes, num_updates, "pop");
        for i in (num_updates..self.updates.len()).rev() {
            let record = self.updates[i];
            match record {
                UndoRecord::NodeAdded => self.undo_node(),
                UndoRecord::ToggleMergeEnabled(n) => self.toggle_merge_enabled(n, true),
                UndoRecord::MergeClasses {
                    r1,
                    n1,
                    r2_num_parents,
                } => self.undo_eq(r1, n1, r2_num_parents),
                UndoRecord::ThVarAdded { node, theory } => self.undo_add_th_var(node, theory),
                UndoRecord::ThVarReplaced {
                    node,
                    theory,
                    old_var,
                } => {
                    self.node_mut(node).replace_th_var(theory, old_var);
                }
                UndoRecord::LitEnqueued => {
                    self.new_lits.pop();
                }
                UndoRecord::ThEqEnqueued => {
                    self.new_th_eqs.pop();
                }
                UndoRecord::LitQueueHead(prev) => self.new_lits_qhead = prev,
                UndoRecord::ThEqQueueHead(prev) => self.new_th_eqs_qhead = prev,
                UndoRecord::InconsistentSet(prev) => self.inconsistent = prev,
            }
        }
        self.updates.truncate(num_updates);
        self.scopes.truncate(old_lim);
        self.worklist.clear();
        debug_assert!(self.new_lits_qhead <= self.new_lits.len());
        debug_assert!(self.new_th_eqs_qhead <= self.new_th_eqs.len());
    }

    /// Tear down the newest node. By the time this runs, every record
    /// younger than the node's creation has been undone, so the node sits at
    /// the tail of each argument root's parent list.
    fn undo_node(&mut self) {
        debug_assert!(!self.nodes.is_empty());
        let id = EnodeId::new(self.nodes.len() as u32 - 1);
        let term = self.node(id).term;
        if !self.node(id).args.is_empty() && !self.node(id).is_equality {
            let sig = self.signature(id);
            self.table.erase(&sig, id);
        }
        if self.node(id).children_registered {
            for i in (0..self.node(id).args.len()).rev() {
                let a = self.node(id).args[i];
                let r = self.node(a).root;
                let popped = self.node_mut(r).parents.pop();
                debug_assert_eq!(popped, Some(id));
            }
        }
        self.expr2node.remove(&term);
        self.nodes.pop();
    }

    /// Undo one class merge: split the spliced `next` cycles, restore the
    /// loser's roots, re-key the parents that were appended to the winner,
    /// and re-orient the proof forest.
    fn undo_eq(&mut self, r1: EnodeId, n1: EnodeId, r2_num_parents: usize) {
        let r2 = self.node(r1).root;
        debug_assert_ne!(r1, r2);
        let r1_size = self.node(r1).class_size;
        self.node_mut(r2).class_size -= r1_size;
        let r1_next = self.node(r1).next;
        let r2_next = self.node(r2).next;
        self.node_mut(r1).next = r2_next;
        self.node_mut(r2).next = r1_next;
        for i in r2_num_parents..self.node(r2).parents.len() {
            let p = self.node(r2).parents[i];
            if self.node(p).is_equality {
                continue;
            }
            let sig = self.signature(p);
            self.table.erase(&sig, p);
        }
        let mut c = r1;
        loop {
            self.node_mut(c).root = r1;
            c = self.node(c).next;
            if c == r1 {
                break;
            }
        }
        for i in r2_num_parents..self.node(r2).parents.len() {
            let p = self.node(r2).parents[i];
            if self.node(p).is_equality || !self.node(p).merge_enabled {
                continue;
            }
            let sig = self.signature(p);
            self.table.insert(sig, p);
        }
        self.node_mut(r2).parents.truncate(r2_num_parents);
        self.unmerge_justification(n1);
    }

    // ------------------------------------------------------------------
    // Copying

    /// Clone an engine across a term-manager translation: every term is
    /// re-interned into `dst_tm` and the proof-forest edges are replayed as
    /// merges. Theory variables do not survive the copy. Both engines must
    /// be at scope depth zero.
    pub fn copy_from(
        src: &Egraph<J>,
        src_tm: &TermManager,
        dst_tm: &mut TermManager,
        mut copy_justification: impl FnMut(&J) -> J,
    ) -> Result<Self> {
        debug_assert!(src.scopes.is_empty() && src.pending_scopes == 0);
        let mut dst = Self::new();
        let mut map: Vec<EnodeId> = Vec::with_capacity(src.nodes.len());
        for node in &src.nodes {
            debug_assert!(
                node.th_vars.is_empty(),
                "theory variables do not survive engine copies"
            );
            let t = dst_tm.translate(node.term, src_tm)?;
            map.push(dst.intern(t, dst_tm)?);
        }
        for (i, node) in src.nodes.iter().enumerate() {
            if let Some(target) = node.target {
                let a = map[i];
                let b = map[target.index()];
                if dst.node(a).root != dst.node(b).root {
                    let j = node.justification.map(&mut copy_justification);
                    dst.merge(a, b, j);
                }
            }
        }
        dst.propagate();
        Ok(dst)
    }

    // ------------------------------------------------------------------
    // Diagnostics

    /// Render the engine state, one node per line.
    #[must_use]
    pub fn display(&self, tm: &TermManager) -> String {
        use std::fmt::Write;
        let mut out = String::new();
        let _ = writeln!(
            out,
            "nodes: {} table: {} updates: {} scopes: {}",
            self.nodes.len(),
            self.table.len(),
            self.updates.len(),
            self.num_scopes()
        );
        for (i, node) in self.nodes.iter().enumerate() {
            let _ = write!(out, "#{i} := {}", tm.display(node.term));
            if node.root.index() != i {
                let _ = write!(out, " [r #{}]", node.root.raw());
            }
            if !node.parents.is_empty() {
                let _ = write!(out, " [p");
                for p in &node.parents {
                    let _ = write!(out, " #{}", p.raw());
                }
                let _ = write!(out, "]");
            }
            if !node.th_vars.is_empty() {
                let _ = write!(out, " [t");
                for e in &node.th_vars {
                    let _ = write!(out, " {}:{}", e.theory, e.var);
                }
                let _ = write!(out, "]");
            }
            if let Some(t) = node.target {
                let _ = write!(out, " [j #{}]", t.raw());
            }
            let _ = writeln!(out);
        }
        out
    }

    /// Check the engine's structural invariants, returning a description of
    /// the first violation found. Intended for tests and debug builds.
    pub fn check_invariants(&self) -> std::result::Result<(), String> {
        for (i, node) in self.nodes.iter().enumerate() {
            let r = node.root;
            if self.node(r).root != r {
                return Err(format!("root of node {i} is not idempotent"));
            }
            if node.mark1 || node.mark2 {
                return Err(format!("node {i} has a transient mark set"));
            }
        }
        // next cycles partition the nodes; class_size is exact on roots
        let mut seen = vec![false; self.nodes.len()];
        for i in 0..self.nodes.len() {
            let id = EnodeId::new(i as u32);
            if self.node(id).root != id {
                continue;
            }
            let mut count = 0usize;
            let mut c = id;
            loop {
                if seen[c.index()] {
                    return Err(format!("node {} appears in two class cycles", c.raw()));
                }
                seen[c.index()] = true;
                if self.node(c).root != id {
                    return Err(format!(
                        "node {} in the cycle of {} has root {}",
                        c.raw(),
                        id.raw(),
                        self.node(c).root.raw()
                    ));
                }
                count += 1;
                if count > self.nodes.len() {
                    return Err(format!("next cycle of node {} does not close", id.raw()));
                }
                c = self.node(c).next;
                if c == id {
                    break;
                }
            }
            if count != self.node(id).class_size as usize {
                return Err(format!(
                    "class_size of node {} is {} but the cycle has {} members",
                    id.raw(),
                    self.node(id).class_size,
                    count
                ));
            }
        }
        if let Some(i) = seen.iter().position(|&s| !s) {
            return Err(format!("node {i} is not on any root's cycle"));
        }
        // the proof forest is acyclic, stays within classes, and each class
        // has exactly one forest root
        let mut forest_roots: FxHashMap<EnodeId, usize> = FxHashMap::default();
        for i in 0..self.nodes.len() {
            let id = EnodeId::new(i as u32);
            match self.node(id).target {
                Some(t) => {
                    if self.node(t).root != self.node(id).root {
                        return Err(format!("proof edge of node {i} leaves its class"));
                    }
                }
                None => {
                    *forest_roots.entry(self.node(id).root).or_insert(0) += 1;
                }
            }
            let mut steps = 0usize;
            let mut c = id;
            while let Some(t) = self.node(c).target {
                steps += 1;
                if steps > self.nodes.len() {
                    return Err(format!("proof forest has a cycle through node {i}"));
                }
                c = t;
            }
        }
        for (r, count) in &forest_roots {
            if *count != 1 {
                return Err(format!(
                    "class of node {} has {} proof-forest roots",
                    r.raw(),
                    count
                ));
            }
        }
        // table entries are keyed by current roots
        for (sig, n) in self.table.iter() {
            if self.node(n).is_equality {
                return Err(format!("equality atom {} in the congruence table", n.raw()));
            }
            if self.signature(n) != *sig {
                return Err(format!("stale congruence key for node {}", n.raw()));
            }
        }
        // when quiescent, every merge-enabled application is congruent to a
        // table resident with the same key
        if self.worklist.is_empty() && !self.inconsistent {
            for i in 0..self.nodes.len() {
                let id = EnodeId::new(i as u32);
                let node = self.node(id);
                if node.args.is_empty() || node.is_equality || !node.merge_enabled {
                    continue;
                }
                let sig = self.signature(id);
                match self.table.find(&sig) {
                    Some(m) if self.node(m).root == node.root => {}
                    Some(m) => {
                        return Err(format!(
                            "table resident {} for the key of {} is not congruent to it",
                            m.raw(),
                            i
                        ));
                    }
                    None => {
                        return Err(format!("application {i} missing from the congruence table"));
                    }
                }
            }
        }
        Ok(())
    }
}

impl<J> Default for Egraph<J> {
    fn default() -> Self {
        Self::new()
    }
}
