//! Ferric Core - Terms, Sorts, and Resource Management.
//!
//! This crate provides the foundational types for the Ferric SMT solver:
//! - Hash-consed terms with lightweight [`TermId`] references
//! - Sort registry with built-in `Bool`/`Int` sorts
//! - Uninterpreted function declarations, with commutativity flags
//! - Resource limits polled by long-running engine loops
//!
//! # Examples
//!
//! ```
//! use ferric_core::ast::TermManager;
//!
//! let mut tm = TermManager::new();
//! let int = tm.sorts.int_sort;
//! let f = tm.declare_fun("f", &[int], int).unwrap();
//! let a = tm.mk_var("a", int);
//! let fa = tm.mk_app(f, &[a]).unwrap();
//! let eq = tm.mk_eq(fa, a).unwrap();
//! assert_eq!(tm.display(eq), "(= a (f a))");
//! ```

#![deny(unsafe_code)]
#![warn(missing_docs)]

pub mod ast;
pub mod error;
pub mod resource;
pub mod sort;

pub use ast::{DeclId, FuncDecl, Term, TermId, TermKind, TermManager};
pub use error::{FerricError, Result};
pub use resource::{LimitStatus, ResourceLimits, ResourceManager};
pub use sort::{Sort, SortId, SortRegistry};
