//! Ferric EUF - Congruence-Closure Engine.
//!
//! The e-graph at the heart of the Ferric solver: it decides the theory of
//! equality with uninterpreted functions and serves as the shared term
//! representation for cooperating theory solvers.
//!
//! - Backtrackable merges with lazy push and trail-replay pop
//! - Proof-producing explanations of any derived equality
//! - Theory-variable attachment with equality/disequality notifications
//! - Conflict detection when distinct interpreted constants collide
//!
//! # Examples
//!
//! ```
//! use ferric_core::ast::TermManager;
//! use ferric_euf::{Egraph, Justification};
//!
//! let mut tm = TermManager::new();
//! let int = tm.sorts.int_sort;
//! let f = tm.declare_fun("f", &[int], int).unwrap();
//! let a = tm.mk_var("a", int);
//! let b = tm.mk_var("b", int);
//! let fa = tm.mk_app(f, &[a]).unwrap();
//! let fb = tm.mk_app(f, &[b]).unwrap();
//!
//! let mut egraph: Egraph<u32> = Egraph::new();
//! let nfa = egraph.intern(fa, &tm).unwrap();
//! let nfb = egraph.intern(fb, &tm).unwrap();
//! let na = egraph.find(a).unwrap();
//! let nb = egraph.find(b).unwrap();
//!
//! egraph.merge(na, nb, Justification::External(1));
//! egraph.propagate();
//! assert!(egraph.are_equal(nfa, nfb));
//!
//! let mut reasons = Vec::new();
//! egraph.explain_eq(nfa, nfb, &mut reasons);
//! assert_eq!(reasons, vec![1]);
//! ```

#![deny(unsafe_code)]
#![warn(missing_docs)]

mod egraph;
mod enode;
mod etable;
mod explain;
mod justification;
mod theory;
mod trail;

pub use egraph::{Egraph, EgraphStats, PropagatedLiteral};
pub use enode::EnodeId;
pub use justification::Justification;
pub use theory::{TheoryEvent, TheoryId, TheoryVar};
