//! Congruence Table.
//!
//! Hash table of non-equality applications keyed by head declaration and the
//! current roots of the arguments. Two applications colliding on a key are
//! congruent and must be merged. Because keys depend on roots, entries are
//! erased before any representative change and re-inserted afterwards; the
//! table itself never recomputes keys.
//!
//! Equality atoms are never stored here; they get fast-path treatment in the
//! engine.

use ferric_core::ast::DeclId;
use rustc_hash::FxHashMap;
use smallvec::SmallVec;

use crate::enode::EnodeId;

/// Congruence key: head declaration plus argument class representatives.
/// For commutative heads the two argument roots are stored in sorted order.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub(crate) struct Signature {
    pub decl: DeclId,
    pub args: SmallVec<[EnodeId; 2]>,
}

/// The congruence table.
#[derive(Debug, Default)]
pub(crate) struct CongruenceTable {
    entries: FxHashMap<Signature, EnodeId>,
}

impl CongruenceTable {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert `n` under `sig`. Returns the resident node: `n` itself if the
    /// slot was free, or the previously inserted congruent node. An occupied
    /// slot is never overwritten.
    pub fn insert(&mut self, sig: Signature, n: EnodeId) -> EnodeId {
        *self.entries.entry(sig).or_insert(n)
    }

    /// Remove the entry under `sig`, but only if it is `n` itself. A node
    /// that lost a congruence collision was never the resident entry and
    /// must not evict the winner.
    pub fn erase(&mut self, sig: &Signature, n: EnodeId) -> bool {
        if self.entries.get(sig) == Some(&n) {
            self.entries.remove(sig);
            true
        } else {
            false
        }
    }

    /// Look up the resident node for a key.
    pub fn find(&self, sig: &Signature) -> Option<EnodeId> {
        self.entries.get(sig).copied()
    }

    /// Number of resident entries.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Iterate over all entries.
    pub fn iter(&self) -> impl Iterator<Item = (&Signature, EnodeId)> {
        self.entries.iter().map(|(sig, &n)| (sig, n))
    }
}
