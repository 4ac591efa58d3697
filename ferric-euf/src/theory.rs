//! Theory-Variable Layer.
//!
//! External theory solvers (arithmetic, arrays, bit-vectors) track terms
//! through theory variables attached to e-nodes. The engine notifies them
//! when their variables land in one class ([`TheoryEvent::Equal`]) and, for
//! theories that opt in, when two classes carrying their variables are
//! separated by an equality atom merged with `false`
//! ([`TheoryEvent::Disequal`]).
//!
//! A class carries at most one variable per theory, held at the root's view;
//! duplicates discovered while merging are reported as equalities.

use ferric_core::ast::TermId;
use tracing::trace;

use crate::egraph::Egraph;
use crate::enode::{EnodeId, ThVarEntry};
use crate::trail::UndoRecord;

/// Identifier of a theory solver.
pub type TheoryId = u32;

/// A theory solver's handle for a term.
pub type TheoryVar = u32;

/// Notification delivered to a theory solver.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TheoryEvent {
    /// Two variables of one theory now label the same class.
    Equal {
        /// The theory both variables belong to.
        theory: TheoryId,
        /// Variable already visible at the root.
        v1: TheoryVar,
        /// Variable merged in or freshly attached.
        v2: TheoryVar,
        /// Node carrying `v2`.
        child: EnodeId,
        /// Representative of the merged class.
        root: EnodeId,
    },
    /// The classes of two variables are known disequal: an equality atom
    /// over them is merged with `false`.
    Disequal {
        /// The theory both variables belong to.
        theory: TheoryId,
        /// Variable on one side.
        v1: TheoryVar,
        /// Variable on the other side.
        v2: TheoryVar,
        /// The witnessing equality atom.
        eq: TermId,
    },
}

impl<J> Egraph<J> {
    /// Opt a theory into disequality propagation.
    pub fn set_th_propagates_diseqs(&mut self, theory: TheoryId) {
        let idx = theory as usize;
        if idx >= self.th_diseq_theories.len() {
            self.th_diseq_theories.resize(idx + 1, false);
        }
        self.th_diseq_theories[idx] = true;
    }

    pub(crate) fn th_propagates_diseqs(&self, theory: TheoryId) -> bool {
        self.th_diseq_theories
            .get(theory as usize)
            .copied()
            .unwrap_or(false)
    }

    /// Attach a theory variable to a node. Re-attaching for the same theory
    /// replaces the variable and reports the old and new one equal.
    pub fn attach_th_var(&mut self, n: EnodeId, theory: TheoryId, v: TheoryVar) {
        self.force_push();
        let r = self.node(n).root;
        match self.node(n).th_var(theory) {
            None => {
                self.node_mut(n).th_vars.push(ThVarEntry { theory, var: v });
                self.updates.push(UndoRecord::ThVarAdded { node: n, theory });
                if r != n {
                    match self.node(r).th_var(theory) {
                        None => {
                            self.node_mut(r).th_vars.push(ThVarEntry { theory, var: v });
                            self.add_th_diseqs(theory, v, r);
                        }
                        Some(u) => self.add_th_eq(theory, v, u, n, r),
                    }
                } else {
                    self.add_th_diseqs(theory, v, r);
                }
            }
            Some(w) => {
                debug_assert_ne!(w, v, "re-attaching the same theory variable");
                let u = self.node(r).th_var(theory);
                if let Some(old_var) = self.node_mut(n).replace_th_var(theory, v) {
                    self.updates.push(UndoRecord::ThVarReplaced {
                        node: n,
                        theory,
                        old_var,
                    });
                }
                if let Some(u) = u {
                    self.add_th_eq(theory, v, u, n, r);
                }
            }
        }
    }

    pub(crate) fn undo_add_th_var(&mut self, n: EnodeId, theory: TheoryId) {
        let Some(v) = self.node_mut(n).remove_th_var(theory) else {
            debug_assert!(false, "undo of a missing theory variable");
            return;
        };
        let r = self.node(n).root;
        if r != n && self.node(r).th_var(theory) == Some(v) {
            self.node_mut(r).remove_th_var(theory);
        }
    }

    /// Carry the losing root's theory variables over to the winner: copies
    /// for theories the winner lacks (scanning for standing disequalities),
    /// equality notifications for duplicates.
    pub(crate) fn merge_th_eq(&mut self, n: EnodeId, root: EnodeId) {
        debug_assert_ne!(n, root);
        for i in 0..self.node(n).th_vars.len() {
            let entry = self.node(n).th_vars[i];
            match self.node(root).th_var(entry.theory) {
                None => {
                    self.node_mut(root).th_vars.push(entry);
                    self.updates.push(UndoRecord::ThVarAdded {
                        node: root,
                        theory: entry.theory,
                    });
                    self.add_th_diseqs(entry.theory, entry.var, root);
                }
                Some(v) => self.add_th_eq(entry.theory, v, entry.var, n, root),
            }
        }
    }

    fn add_th_eq(&mut self, theory: TheoryId, v1: TheoryVar, v2: TheoryVar, child: EnodeId, root: EnodeId) {
        trace!(theory, v1, v2, "theory equality");
        self.new_th_eqs.push(TheoryEvent::Equal {
            theory,
            v1,
            v2,
            child,
            root,
        });
        self.updates.push(UndoRecord::ThEqEnqueued);
        self.stats.num_th_eqs += 1;
    }

    fn add_th_diseq(&mut self, theory: TheoryId, v1: TheoryVar, v2: TheoryVar, eq: TermId) {
        if !self.th_propagates_diseqs(theory) {
            return;
        }
        trace!(theory, v1, v2, "theory disequality");
        self.new_th_eqs.push(TheoryEvent::Disequal { theory, v1, v2, eq });
        self.updates.push(UndoRecord::ThEqEnqueued);
        self.stats.num_th_diseqs += 1;
    }

    /// Scan the parents of root `r` for equality atoms merged with `false`;
    /// each one separates `v1`'s class from the class on the atom's other
    /// side. Fired when a theory variable becomes newly visible on `r`.
    pub(crate) fn add_th_diseqs(&mut self, theory: TheoryId, v1: TheoryVar, r: EnodeId) {
        if !self.th_propagates_diseqs(theory) {
            return;
        }
        for i in 0..self.node(r).parents.len() {
            let p = self.node(r).parents[i];
            if !self.node(p).is_equality {
                continue;
            }
            let p_root = self.node(p).root;
            if !self.node(p_root).is_false_const {
                continue;
            }
            let a0 = self.node(p).args[0];
            let a1 = self.node(p).args[1];
            let other = if self.node(a0).root == r { a1 } else { a0 };
            let other_root = self.node(other).root;
            if let Some(v2) = self.get_closest_th_var(other_root, theory) {
                let eq = self.node(p).term;
                self.add_th_diseq(theory, v1, v2, eq);
            }
        }
    }

    /// Notify theories that an equality atom has been merged with `false`:
    /// its two sides are now known disequal.
    pub fn new_diseq(&mut self, n: EnodeId) {
        debug_assert!(self.node(n).is_equality, "new_diseq on a non-equality");
        self.force_push();
        let a1 = self.node(n).args[0];
        let a2 = self.node(n).args[1];
        let r1 = self.node(a1).root;
        let r2 = self.node(a2).root;
        if r1 == r2 {
            return;
        }
        if self.node(r1).th_vars.is_empty() || self.node(r2).th_vars.is_empty() {
            return;
        }
        let eq = self.node(n).term;
        // single shared theory: report the variables closest to the atom's
        // own arguments in the proof forest
        if self.node(r1).th_vars.len() == 1
            && self.node(r2).th_vars.len() == 1
            && self.node(r1).th_vars[0].theory == self.node(r2).th_vars[0].theory
        {
            let theory = self.node(r1).th_vars[0].theory;
            if !self.th_propagates_diseqs(theory) {
                return;
            }
            if let (Some(v1), Some(v2)) = (
                self.get_closest_th_var(a1, theory),
                self.get_closest_th_var(a2, theory),
            ) {
                self.add_th_diseq(theory, v1, v2, eq);
            }
            return;
        }
        let vars1 = self.node(r1).th_vars.clone();
        let vars2 = self.node(r2).th_vars.clone();
        for p in &vars1 {
            if !self.th_propagates_diseqs(p.theory) {
                continue;
            }
            for q in &vars2 {
                if p.theory == q.theory {
                    self.add_th_diseq(p.theory, p.var, q.var, eq);
                }
            }
        }
    }

    /// The variable for `theory` on `n` or the nearest node along its
    /// proof-forest chain.
    pub(crate) fn get_closest_th_var(&self, n: EnodeId, theory: TheoryId) -> Option<TheoryVar> {
        let mut c = n;
        loop {
            if let Some(v) = self.node(c).th_var(theory) {
                return Some(v);
            }
            c = self.node(c).target?;
        }
    }

    /// The theory variable visible for `theory` on `n`'s class, if any.
    #[must_use]
    pub fn th_var(&self, n: EnodeId, theory: TheoryId) -> Option<TheoryVar> {
        self.node(self.node(n).root).th_var(theory)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::justification::Justification;
    use ferric_core::ast::TermManager;

    type G = Egraph<u32>;

    const T: TheoryId = 0;

    #[test]
    fn test_attach_and_lookup() {
        let mut tm = TermManager::new();
        let mut g = G::new();
        let a = tm.mk_var("a", tm.sorts.int_sort);
        let na = g.intern(a, &tm).unwrap();
        g.attach_th_var(na, T, 11);
        assert_eq!(g.th_var(na, T), Some(11));
        assert_eq!(g.th_var(na, 1), None);
    }

    #[test]
    fn test_merge_reports_theory_eq() {
        let mut tm = TermManager::new();
        let mut g = G::new();
        let int = tm.sorts.int_sort;
        let a = tm.mk_var("a", int);
        let b = tm.mk_var("b", int);
        let na = g.intern(a, &tm).unwrap();
        let nb = g.intern(b, &tm).unwrap();
        g.attach_th_var(na, T, 1);
        g.attach_th_var(nb, T, 2);
        g.merge(na, nb, Justification::External(0));
        g.propagate();
        let ev = g.next_theory_event().unwrap();
        assert_eq!(
            ev,
            TheoryEvent::Equal {
                theory: T,
                v1: 2,
                v2: 1,
                child: na,
                root: nb,
            }
        );
        assert_eq!(g.next_theory_event(), None);
    }

    #[test]
    fn test_attach_to_merged_class_reports_eq() {
        let mut tm = TermManager::new();
        let mut g = G::new();
        let int = tm.sorts.int_sort;
        let a = tm.mk_var("a", int);
        let b = tm.mk_var("b", int);
        let na = g.intern(a, &tm).unwrap();
        let nb = g.intern(b, &tm).unwrap();
        g.merge(na, nb, Justification::External(0));
        g.propagate();
        g.attach_th_var(nb, T, 2); // nb is the root
        g.attach_th_var(na, T, 1); // attaches below the root
        let ev = g.next_theory_event().unwrap();
        assert_eq!(
            ev,
            TheoryEvent::Equal {
                theory: T,
                v1: 1,
                v2: 2,
                child: na,
                root: nb,
            }
        );
    }

    #[test]
    fn test_replace_reports_eq() {
        let mut tm = TermManager::new();
        let mut g = G::new();
        let a = tm.mk_var("a", tm.sorts.int_sort);
        let na = g.intern(a, &tm).unwrap();
        g.attach_th_var(na, T, 1);
        g.attach_th_var(na, T, 2);
        assert_eq!(g.th_var(na, T), Some(2));
        let ev = g.next_theory_event().unwrap();
        assert!(matches!(ev, TheoryEvent::Equal { v1: 2, v2: 1, .. }));
    }

    #[test]
    fn test_attach_undone_by_pop() {
        let mut tm = TermManager::new();
        let mut g = G::new();
        let a = tm.mk_var("a", tm.sorts.int_sort);
        let na = g.intern(a, &tm).unwrap();
        g.push(1);
        g.attach_th_var(na, T, 7);
        assert_eq!(g.th_var(na, T), Some(7));
        g.pop(1);
        assert_eq!(g.th_var(na, T), None);
        g.check_invariants().unwrap();
    }

    #[test]
    fn test_diseq_requires_opt_in() {
        let mut tm = TermManager::new();
        let mut g = G::new();
        let int = tm.sorts.int_sort;
        let a = tm.mk_var("a", int);
        let b = tm.mk_var("b", int);
        let eq = tm.mk_eq(a, b).unwrap();
        let fls = tm.mk_false();
        let neq = g.intern(eq, &tm).unwrap();
        let nf = g.intern(fls, &tm).unwrap();
        let na = g.find(a).unwrap();
        let nb = g.find(b).unwrap();
        g.attach_th_var(na, T, 1);
        g.attach_th_var(nb, T, 2);
        // without opt-in nothing is reported
        g.merge(neq, nf, Justification::External(0));
        g.propagate();
        assert_eq!(g.next_theory_event(), None);
    }

    #[test]
    fn test_diseq_on_false_equality() {
        let mut tm = TermManager::new();
        let mut g = G::new();
        let int = tm.sorts.int_sort;
        let a = tm.mk_var("a", int);
        let b = tm.mk_var("b", int);
        let eq = tm.mk_eq(a, b).unwrap();
        let fls = tm.mk_false();
        let neq = g.intern(eq, &tm).unwrap();
        let nf = g.intern(fls, &tm).unwrap();
        let na = g.find(a).unwrap();
        let nb = g.find(b).unwrap();
        g.set_th_propagates_diseqs(T);
        g.attach_th_var(na, T, 1);
        g.attach_th_var(nb, T, 2);
        g.merge(neq, nf, Justification::External(0));
        g.propagate();
        let ev = g.next_theory_event().unwrap();
        assert!(matches!(
            ev,
            TheoryEvent::Disequal { theory: T, v1: 1, v2: 2, .. }
                | TheoryEvent::Disequal { theory: T, v1: 2, v2: 1, .. }
        ));
    }

    #[test]
    fn test_diseq_on_late_attach() {
        // the equality is already false when the variables arrive
        let mut tm = TermManager::new();
        let mut g = G::new();
        let int = tm.sorts.int_sort;
        let a = tm.mk_var("a", int);
        let b = tm.mk_var("b", int);
        let eq = tm.mk_eq(a, b).unwrap();
        let fls = tm.mk_false();
        let neq = g.intern(eq, &tm).unwrap();
        let nf = g.intern(fls, &tm).unwrap();
        let na = g.find(a).unwrap();
        let nb = g.find(b).unwrap();
        g.set_th_propagates_diseqs(T);
        g.merge(neq, nf, Justification::External(0));
        g.propagate();
        g.attach_th_var(na, T, 1);
        assert_eq!(g.next_theory_event(), None); // other side has no var yet
        g.attach_th_var(nb, T, 2);
        let ev = g.next_theory_event().unwrap();
        assert!(matches!(ev, TheoryEvent::Disequal { theory: T, v1: 2, v2: 1, .. }));
    }
}
