//! Hash-Consed Terms for the Ferric Solver.
//!
//! The [`TermManager`] owns every term and guarantees structural sharing:
//! building the same term twice yields the same [`TermId`]. Terms are
//! immutable once created; the engine layers (congruence closure, theory
//! solvers) refer to them only by id.

use lasso::{Rodeo, Spur};
use num_bigint::BigInt;
use rustc_hash::FxHashMap;
use smallvec::SmallVec;

use crate::error::{FerricError, Result};
use crate::sort::{SortId, SortRegistry};

/// A term identifier.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct TermId(u32);

impl TermId {
    /// Create a term id from a raw index.
    #[must_use]
    pub const fn new(raw: u32) -> Self {
        Self(raw)
    }

    /// Get the raw index.
    #[must_use]
    pub const fn raw(self) -> u32 {
        self.0
    }
}

/// A function declaration identifier.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct DeclId(u32);

impl DeclId {
    /// Create a declaration id from a raw index.
    #[must_use]
    pub const fn new(raw: u32) -> Self {
        Self(raw)
    }

    /// Get the raw index.
    #[must_use]
    pub const fn raw(self) -> u32 {
        self.0
    }
}

/// An uninterpreted function declaration.
#[derive(Debug, Clone)]
pub struct FuncDecl {
    /// Interned function name.
    pub name: Spur,
    /// Argument sorts.
    pub domain: Vec<SortId>,
    /// Result sort.
    pub range: SortId,
    /// Whether the function is declared commutative (binary only).
    pub commutative: bool,
}

/// The kind of a term.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum TermKind {
    /// The Boolean constant `true`.
    True,
    /// The Boolean constant `false`.
    False,
    /// An integer numeral.
    IntConst(BigInt),
    /// A named constant (free variable).
    Var(Spur),
    /// An equality atom between two terms of the same sort.
    Eq,
    /// An application of an uninterpreted function.
    Apply(DeclId),
}

/// A term: kind, sort, and ordered children.
#[derive(Debug, Clone)]
pub struct Term {
    /// What the term is.
    pub kind: TermKind,
    /// The term's sort.
    pub sort: SortId,
    /// Ordered children.
    pub args: SmallVec<[TermId; 2]>,
}

/// Hash-consing key: structural identity of a term.
#[derive(Clone, PartialEq, Eq, Hash)]
struct TermKey {
    kind: TermKind,
    sort: SortId,
    args: SmallVec<[TermId; 2]>,
}

/// Owner of all terms, declarations, and sorts.
pub struct TermManager {
    /// Sorts known to this manager.
    pub sorts: SortRegistry,
    terms: Vec<Term>,
    cons: FxHashMap<TermKey, TermId>,
    decls: Vec<FuncDecl>,
    decl_index: FxHashMap<Spur, DeclId>,
    names: Rodeo,
    true_term: TermId,
    false_term: TermId,
}

impl TermManager {
    /// Create a manager with `true` and `false` pre-interned.
    pub fn new() -> Self {
        let mut tm = Self {
            sorts: SortRegistry::new(),
            terms: Vec::new(),
            cons: FxHashMap::default(),
            decls: Vec::new(),
            decl_index: FxHashMap::default(),
            names: Rodeo::default(),
            true_term: TermId::new(0),
            false_term: TermId::new(0),
        };
        let bool_sort = tm.sorts.bool_sort;
        tm.true_term = tm.intern(TermKind::True, bool_sort, SmallVec::new());
        tm.false_term = tm.intern(TermKind::False, bool_sort, SmallVec::new());
        tm
    }

    fn intern(&mut self, kind: TermKind, sort: SortId, args: SmallVec<[TermId; 2]>) -> TermId {
        let key = TermKey { kind, sort, args };
        if let Some(&id) = self.cons.get(&key) {
            return id;
        }
        let id = TermId::new(self.terms.len() as u32);
        self.terms.push(Term {
            kind: key.kind.clone(),
            sort: key.sort,
            args: key.args.clone(),
        });
        self.cons.insert(key, id);
        id
    }

    /// The constant `true`.
    #[must_use]
    pub fn mk_true(&self) -> TermId {
        self.true_term
    }

    /// The constant `false`.
    #[must_use]
    pub fn mk_false(&self) -> TermId {
        self.false_term
    }

    /// Make an integer numeral.
    pub fn mk_int(&mut self, value: impl Into<BigInt>) -> TermId {
        let sort = self.sorts.int_sort;
        self.intern(TermKind::IntConst(value.into()), sort, SmallVec::new())
    }

    /// Make a named constant of the given sort.
    pub fn mk_var(&mut self, name: &str, sort: SortId) -> TermId {
        let key = self.names.get_or_intern(name);
        self.intern(TermKind::Var(key), sort, SmallVec::new())
    }

    /// Make an equality atom. Arguments are ordered by id so `a = b` and
    /// `b = a` intern to the same term.
    pub fn mk_eq(&mut self, lhs: TermId, rhs: TermId) -> Result<TermId> {
        let ls = self.sort_of(lhs)?;
        let rs = self.sort_of(rhs)?;
        if ls != rs {
            return Err(FerricError::SortMismatch {
                expected: self.sorts.name(ls).to_string(),
                found: self.sorts.name(rs).to_string(),
            });
        }
        let (a, b) = if lhs.raw() <= rhs.raw() { (lhs, rhs) } else { (rhs, lhs) };
        let sort = self.sorts.bool_sort;
        Ok(self.intern(TermKind::Eq, sort, SmallVec::from_slice(&[a, b])))
    }

    /// Declare an uninterpreted function. Declaring the same name with the
    /// same signature returns the existing declaration.
    pub fn declare_fun(&mut self, name: &str, domain: &[SortId], range: SortId) -> Result<DeclId> {
        self.declare(name, domain, range, false)
    }

    /// Declare a binary commutative function over a single argument sort.
    pub fn declare_fun_commutative(
        &mut self,
        name: &str,
        arg: SortId,
        range: SortId,
    ) -> Result<DeclId> {
        self.declare(name, &[arg, arg], range, true)
    }

    fn declare(
        &mut self,
        name: &str,
        domain: &[SortId],
        range: SortId,
        commutative: bool,
    ) -> Result<DeclId> {
        let key = self.names.get_or_intern(name);
        if let Some(&id) = self.decl_index.get(&key) {
            let existing = &self.decls[id.raw() as usize];
            if existing.domain == domain
                && existing.range == range
                && existing.commutative == commutative
            {
                return Ok(id);
            }
            return Err(FerricError::Redeclaration(name.to_string()));
        }
        let id = DeclId::new(self.decls.len() as u32);
        self.decls.push(FuncDecl {
            name: key,
            domain: domain.to_vec(),
            range,
            commutative,
        });
        self.decl_index.insert(key, id);
        Ok(id)
    }

    /// Apply an uninterpreted function to arguments.
    pub fn mk_app(&mut self, decl: DeclId, args: &[TermId]) -> Result<TermId> {
        let d = self
            .decls
            .get(decl.raw() as usize)
            .ok_or_else(|| FerricError::UnknownSymbol(format!("decl #{}", decl.raw())))?;
        if d.domain.len() != args.len() {
            return Err(FerricError::ArityMismatch {
                name: self.names.resolve(&d.name).to_string(),
                expected: d.domain.len(),
                found: args.len(),
            });
        }
        let range = d.range;
        let domain = d.domain.clone();
        for (i, &arg) in args.iter().enumerate() {
            let s = self.sort_of(arg)?;
            if s != domain[i] {
                return Err(FerricError::SortMismatch {
                    expected: self.sorts.name(domain[i]).to_string(),
                    found: self.sorts.name(s).to_string(),
                });
            }
        }
        Ok(self.intern(TermKind::Apply(decl), range, SmallVec::from_slice(args)))
    }

    /// Get a term by id.
    #[must_use]
    pub fn get(&self, id: TermId) -> Option<&Term> {
        self.terms.get(id.raw() as usize)
    }

    fn sort_of(&self, id: TermId) -> Result<SortId> {
        self.get(id)
            .map(|t| t.sort)
            .ok_or_else(|| FerricError::UnknownSymbol(format!("term #{}", id.raw())))
    }

    /// Get a term's sort.
    #[must_use]
    pub fn sort(&self, id: TermId) -> Option<SortId> {
        self.get(id).map(|t| t.sort)
    }

    /// Get a declaration by id.
    #[must_use]
    pub fn decl(&self, id: DeclId) -> Option<&FuncDecl> {
        self.decls.get(id.raw() as usize)
    }

    /// Check if a term is an equality atom.
    #[must_use]
    pub fn is_eq(&self, id: TermId) -> bool {
        self.get(id).is_some_and(|t| t.kind == TermKind::Eq)
    }

    /// Check if a term is the constant `true`.
    #[must_use]
    pub fn is_true(&self, id: TermId) -> bool {
        id == self.true_term
    }

    /// Check if a term is the constant `false`.
    #[must_use]
    pub fn is_false(&self, id: TermId) -> bool {
        id == self.false_term
    }

    /// Check if a term denotes a unique interpreted value (`true`, `false`,
    /// or a numeral).
    #[must_use]
    pub fn is_value(&self, id: TermId) -> bool {
        self.get(id).is_some_and(|t| {
            matches!(t.kind, TermKind::True | TermKind::False | TermKind::IntConst(_))
        })
    }

    /// Check if a term is an application of a commutative function.
    #[must_use]
    pub fn is_commutative(&self, id: TermId) -> bool {
        match self.get(id).map(|t| &t.kind) {
            Some(TermKind::Apply(d)) => self.decl(*d).is_some_and(|d| d.commutative),
            _ => false,
        }
    }

    /// Number of terms interned so far.
    #[must_use]
    pub fn num_terms(&self) -> usize {
        self.terms.len()
    }

    /// Render a term as an s-expression.
    #[must_use]
    pub fn display(&self, id: TermId) -> String {
        let Some(term) = self.get(id) else {
            return format!("#{}", id.raw());
        };
        match &term.kind {
            TermKind::True => "true".to_string(),
            TermKind::False => "false".to_string(),
            TermKind::IntConst(v) => v.to_string(),
            TermKind::Var(name) => self.names.resolve(name).to_string(),
            TermKind::Eq => {
                format!("(= {} {})", self.display(term.args[0]), self.display(term.args[1]))
            }
            TermKind::Apply(d) => {
                let name = self
                    .decl(*d)
                    .map_or("?", |decl| self.names.resolve(&decl.name));
                if term.args.is_empty() {
                    name.to_string()
                } else {
                    let args: Vec<String> =
                        term.args.iter().map(|&a| self.display(a)).collect();
                    format!("({} {})", name, args.join(" "))
                }
            }
        }
    }

    /// Re-intern a term from another manager into this one, translating
    /// sorts and declarations by name.
    pub fn translate(&mut self, id: TermId, src: &TermManager) -> Result<TermId> {
        let mut cache = FxHashMap::default();
        self.translate_rec(id, src, &mut cache)
    }

    fn translate_rec(
        &mut self,
        id: TermId,
        src: &TermManager,
        cache: &mut FxHashMap<TermId, TermId>,
    ) -> Result<TermId> {
        if let Some(&t) = cache.get(&id) {
            return Ok(t);
        }
        let term = src
            .get(id)
            .ok_or_else(|| FerricError::UnknownSymbol(format!("term #{}", id.raw())))?;
        let kind = term.kind.clone();
        let src_args = term.args.clone();
        let src_sort = term.sort;
        let mut args = SmallVec::<[TermId; 2]>::new();
        for &a in &src_args {
            args.push(self.translate_rec(a, src, cache)?);
        }
        let result = match kind {
            TermKind::True => self.mk_true(),
            TermKind::False => self.mk_false(),
            TermKind::IntConst(v) => self.mk_int(v),
            TermKind::Var(name) => {
                let sort = self.translate_sort(src_sort, src);
                let name = src.names.resolve(&name).to_string();
                self.mk_var(&name, sort)
            }
            TermKind::Eq => self.mk_eq(args[0], args[1])?,
            TermKind::Apply(d) => {
                let decl = self.translate_decl(d, src)?;
                self.mk_app(decl, &args)?
            }
        };
        cache.insert(id, result);
        Ok(result)
    }

    fn translate_sort(&mut self, sort: SortId, src: &TermManager) -> SortId {
        self.sorts.declare(src.sorts.name(sort))
    }

    fn translate_decl(&mut self, decl: DeclId, src: &TermManager) -> Result<DeclId> {
        let d = src
            .decl(decl)
            .ok_or_else(|| FerricError::UnknownSymbol(format!("decl #{}", decl.raw())))?;
        let name = src.names.resolve(&d.name).to_string();
        let domain: Vec<SortId> = d
            .domain
            .iter()
            .map(|&s| self.translate_sort(s, src))
            .collect();
        let range = self.translate_sort(d.range, src);
        self.declare(&name, &domain, range, d.commutative)
    }
}

impl Default for TermManager {
    fn default() -> Self {
        Self::new()
    }
}
