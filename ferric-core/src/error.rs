//! Error Types for Ferric.

use thiserror::Error;

/// Errors produced when building or translating terms.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum FerricError {
    /// Two sorts were expected to match but do not.
    #[error("sort mismatch: expected {expected}, found {found}")]
    SortMismatch {
        /// The sort required at this position.
        expected: String,
        /// The sort actually supplied.
        found: String,
    },

    /// A function was applied to the wrong number of arguments.
    #[error("arity mismatch: {name} expects {expected} arguments, got {found}")]
    ArityMismatch {
        /// Function name.
        name: String,
        /// Declared arity.
        expected: usize,
        /// Number of arguments supplied.
        found: usize,
    },

    /// A symbol or term id is not known to this manager.
    #[error("unknown symbol: {0}")]
    UnknownSymbol(String),

    /// A name was redeclared with a different signature.
    #[error("redeclaration of {0} with a different signature")]
    Redeclaration(String),
}

/// Result type used throughout Ferric.
pub type Result<T> = std::result::Result<T, FerricError>;
