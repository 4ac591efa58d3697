//! Explanation Engine.
//!
//! Walks the proof forest to extract the external justifications proving
//! two nodes equal. Each pair of nodes in one class has a least common
//! ancestor along the `target` chains; only the edges up to the LCA are
//! needed. Congruence edges expand recursively into explanations for each
//! argument pair (crosswise for commutative heads when the arguments match
//! that way).
//!
//! A todo list accumulates nodes whose outgoing edge still needs expansion;
//! `mark1` guards against expanding a node twice, `mark2` is used only
//! during LCA discovery. Both marks are clear again on every exit path.

use ferric_core::ast::TermId;

use crate::egraph::Egraph;
use crate::enode::EnodeId;
use crate::justification::Justification;

impl<J> Egraph<J> {
    /// Register a hook fired for every non-commutative congruence used in an
    /// explanation. Proof recorders use this to emit congruence lemmas.
    pub fn set_used_cc(&mut self, f: impl FnMut(TermId, TermId) + 'static) {
        self.used_cc = Some(Box::new(f));
    }

    /// Register a hook fired for every equality walked by the explanation
    /// engine, with the terms of both nodes and of their LCA.
    pub fn set_used_eq(&mut self, f: impl FnMut(TermId, TermId, TermId) + 'static) {
        self.used_eq = Some(Box::new(f));
    }

    /// Least common ancestor of two nodes of one class in the proof forest.
    fn find_lca(&mut self, a: EnodeId, b: EnodeId) -> EnodeId {
        debug_assert_eq!(self.node(a).root, self.node(b).root);
        let mut n = Some(a);
        while let Some(c) = n {
            self.node_mut(c).mark2 = true;
            n = self.node(c).target;
        }
        let mut lca = b;
        while !self.node(lca).mark2 {
            lca = self
                .node(lca)
                .target
                .expect("proof-forest chains of one class must meet");
        }
        let mut n = Some(a);
        while let Some(c) = n {
            self.node_mut(c).mark2 = false;
            n = self.node(c).target;
        }
        lca
    }

    /// Queue every edge from `n` up to (excluding) `lca` for expansion.
    fn push_to_lca(&mut self, n: EnodeId, lca: EnodeId) {
        let mut c = n;
        while c != lca {
            self.todo.push(c);
            c = self
                .node(c)
                .target
                .expect("LCA must be an ancestor in the proof forest");
        }
    }

    fn push_lca(&mut self, a: EnodeId, b: EnodeId) {
        let lca = self.find_lca(a, b);
        self.push_to_lca(a, lca);
        self.push_to_lca(b, lca);
    }

    /// Queue the full chain from `n` to its proof-forest root.
    fn push_todo_chain(&mut self, n: EnodeId) {
        let mut c = n;
        loop {
            self.todo.push(c);
            match self.node(c).target {
                Some(t) => c = t,
                None => break,
            }
        }
    }

    /// Expand a congruence between two applications of the same head into
    /// argument-pair explanations up to the respective LCAs.
    fn push_congruence(&mut self, n1: EnodeId, n2: EnodeId, commutative: bool) {
        debug_assert_eq!(self.node(n1).decl, self.node(n2).decl);
        if !commutative && self.used_cc.is_some() {
            let t1 = self.node(n1).term;
            let t2 = self.node(n2).term;
            if let Some(f) = self.used_cc.as_mut() {
                f(t1, t2);
            }
        }
        if commutative {
            let a0 = self.node(n1).args[0];
            let a1 = self.node(n1).args[1];
            let b0 = self.node(n2).args[0];
            let b1 = self.node(n2).args[1];
            if self.node(a0).root == self.node(b1).root && self.node(a1).root == self.node(b0).root
            {
                self.push_lca(a0, b1);
                self.push_lca(a1, b0);
                return;
            }
        }
        for i in 0..self.node(n1).args.len() {
            let a = self.node(n1).args[i];
            let b = self.node(n2).args[i];
            self.push_lca(a, b);
        }
    }

    fn end_explain(&mut self) {
        while let Some(n) = self.todo.pop() {
            self.node_mut(n).mark1 = false;
        }
        #[cfg(debug_assertions)]
        for node in &self.nodes {
            debug_assert!(!node.mark1 && !node.mark2, "mark left set after explanation");
        }
    }
}

impl<J: Clone> Egraph<J> {
    /// Collect the external justifications proving `a` and `b` equal. The
    /// nodes must be in one class.
    pub fn explain_eq(&mut self, a: EnodeId, b: EnodeId, out: &mut Vec<J>) {
        debug_assert!(self.todo.is_empty());
        let lca = self.find_lca(a, b);
        self.push_to_lca(a, lca);
        self.push_to_lca(b, lca);
        if self.used_eq.is_some() {
            let t1 = self.node(a).term;
            let t2 = self.node(b).term;
            let tl = self.node(lca).term;
            if let Some(f) = self.used_eq.as_mut() {
                f(t1, t2, tl);
            }
        }
        self.explain_todo(out);
        self.end_explain();
    }

    /// Collect the external justifications behind the latched conflict: the
    /// proofs that both conflicting nodes equal their (distinct interpreted)
    /// roots, plus the justification of the offending merge.
    pub fn explain_conflict(&mut self, out: &mut Vec<J>) {
        debug_assert!(self.inconsistent, "no conflict to explain");
        debug_assert!(self.todo.is_empty());
        let Some((n1, n2, j)) = self.conflict.clone() else {
            return;
        };
        self.push_todo_chain(n1);
        self.push_todo_chain(n2);
        self.explain_justified(out, n1, n2, j);
        self.explain_todo(out);
        self.end_explain();
    }

    fn explain_justified(&mut self, out: &mut Vec<J>, a: EnodeId, b: EnodeId, j: Justification<J>) {
        match j {
            Justification::Axiom => {}
            Justification::Congruence { commutative } => self.push_congruence(a, b, commutative),
            Justification::External(payload) => out.push(payload),
        }
    }

    /// Expand queued nodes until the todo list is exhausted. Expansion may
    /// queue further nodes; `mark1` keeps each node expanded at most once.
    fn explain_todo(&mut self, out: &mut Vec<J>) {
        let mut i = 0;
        while i < self.todo.len() {
            let n = self.todo[i];
            i += 1;
            if self.node(n).mark1 {
                continue;
            }
            let Some(t) = self.node(n).target else {
                continue;
            };
            self.node_mut(n).mark1 = true;
            let j = self.node(n).justification.clone();
            self.explain_justified(out, n, t, j);
        }
    }
}
