//! EUF Engine Integration Tests.
//!
//! End-to-end scenarios exercising congruence closure, equality-atom
//! propagation, conflict handling, theory notifications, scoped
//! backtracking, engine copying, and resource interruption.

use ferric_core::ast::{TermId, TermManager};
use ferric_core::resource::{ResourceLimits, ResourceManager};
use ferric_euf::{Egraph, EnodeId, Justification, TheoryEvent};

type G = Egraph<u32>;

fn ax(n: u32) -> Justification<u32> {
    Justification::External(n)
}

/// Observable engine state, for before/after comparisons around push/pop.
#[derive(Debug, PartialEq, Eq)]
struct Snapshot {
    num_nodes: usize,
    num_table_entries: usize,
    num_literals: usize,
    num_theory_events: usize,
    pending_literals: usize,
    pending_theory_events: usize,
    inconsistent: bool,
    classes: Vec<(EnodeId, usize, Vec<EnodeId>)>,
}

fn snapshot(g: &G) -> Snapshot {
    let mut classes = Vec::new();
    for i in 0..g.num_nodes() {
        let n = EnodeId::new(i as u32);
        let mut members = g.class(n);
        members.sort_unstable();
        classes.push((g.root(n), g.class_size(n), members));
    }
    Snapshot {
        num_nodes: g.num_nodes(),
        num_table_entries: g.num_table_entries(),
        num_literals: g.num_literals(),
        num_theory_events: g.num_theory_events(),
        pending_literals: g.num_pending_literals(),
        pending_theory_events: g.num_pending_theory_events(),
        inconsistent: g.inconsistent(),
        classes,
    }
}

/// Merging two constants merges every application built over them, and the
/// explanation is exactly the asserted axiom.
#[test]
fn test_basic_congruence() {
    let mut tm = TermManager::new();
    let mut g = G::new();
    let int = tm.sorts.int_sort;
    let f = tm.declare_fun("f", &[int], int).unwrap();
    let a = tm.mk_var("a", int);
    let b = tm.mk_var("b", int);
    let fa = tm.mk_app(f, &[a]).unwrap();
    let fb = tm.mk_app(f, &[b]).unwrap();

    let nfa = g.intern(fa, &tm).unwrap();
    let nfb = g.intern(fb, &tm).unwrap();
    let na = g.find(a).unwrap();
    let nb = g.find(b).unwrap();
    assert!(!g.are_equal(nfa, nfb));

    g.merge(na, nb, ax(1));
    // structural merges alone produce no queue output
    assert!(!g.propagate());
    assert!(g.are_equal(nfa, nfb));

    let mut reasons = Vec::new();
    g.explain_eq(nfa, nfb, &mut reasons);
    assert_eq!(reasons, vec![1]);
    g.check_invariants().unwrap();
}

/// With a declared-commutative head, `g(a, b)` and `g(b, a)` coincide by
/// congruence alone; no merge is ever asserted.
#[test]
fn test_commutative_congruence() {
    let mut tm = TermManager::new();
    let mut g = G::new();
    let int = tm.sorts.int_sort;
    let gf = tm.declare_fun_commutative("g", int, int).unwrap();
    let a = tm.mk_var("a", int);
    let b = tm.mk_var("b", int);
    let gab = tm.mk_app(gf, &[a, b]).unwrap();
    let gba = tm.mk_app(gf, &[b, a]).unwrap();

    let n1 = g.intern(gab, &tm).unwrap();
    let n2 = g.intern(gba, &tm).unwrap();
    let na = g.find(a).unwrap();

    // merging a node with itself does nothing
    g.merge(na, na, ax(0));
    assert_eq!(g.stats().num_merges, 0);

    g.propagate();
    assert!(g.are_equal(n1, n2));
    // both crosswise argument pairs already share roots, so the
    // explanation is empty
    let mut reasons = Vec::new();
    g.explain_eq(n1, n2, &mut reasons);
    assert!(reasons.is_empty());
    g.check_invariants().unwrap();
}

/// When both sides of an interned equality atom fall into one class, the
/// atom is handed to the Boolean engine as a true literal.
#[test]
fn test_equality_propagation() {
    let mut tm = TermManager::new();
    let mut g = G::new();
    let int = tm.sorts.int_sort;
    let a = tm.mk_var("a", int);
    let b = tm.mk_var("b", int);
    let eq = tm.mk_eq(a, b).unwrap();

    let neq = g.intern(eq, &tm).unwrap();
    let na = g.find(a).unwrap();
    let nb = g.find(b).unwrap();

    g.merge(na, nb, ax(1));
    assert!(g.propagate());

    let lit = g.next_literal().expect("a literal must be propagated");
    assert_eq!(lit.node, neq);
    assert!(lit.is_equality);
    // the atom may be revisited through both parent lists; every
    // emission names the same atom
    while let Some(l) = g.next_literal() {
        assert_eq!(l.node, neq);
        assert!(l.is_equality);
    }
    g.check_invariants().unwrap();
}

/// Two distinct interpreted constants cannot be merged: the engine latches
/// a conflict and explains it with the asserted axiom.
#[test]
fn test_conflict_on_interpreted() {
    let tm = TermManager::new();
    let mut g = G::new();
    let t = tm.mk_true();
    let f = tm.mk_false();
    let nt = g.intern(t, &tm).unwrap();
    let nf = g.intern(f, &tm).unwrap();

    g.merge(nt, nf, ax(3));
    assert!(g.inconsistent());
    assert!(!g.are_equal(nt, nf));

    let mut reasons = Vec::new();
    g.explain_conflict(&mut reasons);
    assert_eq!(reasons, vec![3]);

    // further merges keep the earliest conflict
    g.merge(nt, nf, ax(4));
    let mut reasons = Vec::new();
    g.explain_conflict(&mut reasons);
    assert_eq!(reasons, vec![3]);
}

/// Everything observable is restored by `pop`: classes, the congruence
/// table, the queues and their consumer positions.
#[test]
fn test_push_pop_roundtrip() {
    let mut tm = TermManager::new();
    let mut g = G::new();
    let int = tm.sorts.int_sort;
    let f = tm.declare_fun("f", &[int], int).unwrap();
    let a = tm.mk_var("a", int);
    let b = tm.mk_var("b", int);
    let c = tm.mk_var("c", int);
    let d = tm.mk_var("d", int);
    let fa = tm.mk_app(f, &[a]).unwrap();
    let fb = tm.mk_app(f, &[b]).unwrap();
    let eq = tm.mk_eq(c, d).unwrap();

    g.intern(fa, &tm).unwrap();
    g.intern(fb, &tm).unwrap();
    g.intern(eq, &tm).unwrap();
    g.propagate();

    let before = snapshot(&g);
    g.push(1);
    let na = g.find(a).unwrap();
    let nb = g.find(b).unwrap();
    let nc = g.find(c).unwrap();
    let nd = g.find(d).unwrap();
    g.merge(na, nb, ax(1));
    g.merge(nc, nd, ax(2));
    g.propagate();
    assert_ne!(snapshot(&g), before);

    g.pop(1);
    assert_eq!(snapshot(&g), before);
    g.check_invariants().unwrap();

    // the state is fully usable after the round trip
    g.merge(na, nb, ax(5));
    g.propagate();
    assert!(g.are_equal(g.find(fa).unwrap(), g.find(fb).unwrap()));
}

/// Theory variables on merged classes produce an equality notification
/// carrying both variables and the witnessing nodes.
#[test]
fn test_theory_eq_emission() {
    let mut tm = TermManager::new();
    let mut g = G::new();
    let int = tm.sorts.int_sort;
    let a = tm.mk_var("a", int);
    let b = tm.mk_var("b", int);
    let na = g.intern(a, &tm).unwrap();
    let nb = g.intern(b, &tm).unwrap();

    const T: u32 = 3;
    g.attach_th_var(na, T, 10);
    g.attach_th_var(nb, T, 20);
    assert_eq!(g.num_pending_theory_events(), 0);

    g.merge(na, nb, ax(1));
    assert!(g.propagate());

    match g.next_theory_event().expect("a theory equality must be emitted") {
        TheoryEvent::Equal {
            theory,
            v1,
            v2,
            child,
            root,
        } => {
            assert_eq!(theory, T);
            assert_eq!((v1, v2), (20, 10));
            assert_eq!(child, na);
            assert_eq!(root, nb);
        }
        other => panic!("expected an equality event, got {other:?}"),
    }
    assert_eq!(g.next_theory_event(), None);
}

/// Disequality notifications flow to opted-in theories when an equality
/// atom over their classes is merged with `false`.
#[test]
fn test_theory_diseq_emission() {
    let mut tm = TermManager::new();
    let mut g = G::new();
    let int = tm.sorts.int_sort;
    let a = tm.mk_var("a", int);
    let b = tm.mk_var("b", int);
    let eq = tm.mk_eq(a, b).unwrap();
    let neq = g.intern(eq, &tm).unwrap();
    let nf = g.intern(tm.mk_false(), &tm).unwrap();
    let na = g.find(a).unwrap();
    let nb = g.find(b).unwrap();

    const T: u32 = 0;
    g.set_th_propagates_diseqs(T);
    g.attach_th_var(na, T, 1);
    g.attach_th_var(nb, T, 2);

    g.merge(neq, nf, ax(1));
    g.propagate();

    match g.next_theory_event().expect("a disequality must be emitted") {
        TheoryEvent::Disequal { theory, v1, v2, eq: witness } => {
            assert_eq!(theory, T);
            assert_eq!((v1, v2), (1, 2));
            assert_eq!(witness, eq);
        }
        other => panic!("expected a disequality event, got {other:?}"),
    }
}

/// A directly asserted disequality notifies theories without any merge.
#[test]
fn test_new_diseq_direct() {
    let mut tm = TermManager::new();
    let mut g = G::new();
    let int = tm.sorts.int_sort;
    let a = tm.mk_var("a", int);
    let b = tm.mk_var("b", int);
    let eq = tm.mk_eq(a, b).unwrap();
    let neq = g.intern(eq, &tm).unwrap();
    let na = g.find(a).unwrap();
    let nb = g.find(b).unwrap();

    const T: u32 = 0;
    g.set_th_propagates_diseqs(T);
    g.attach_th_var(na, T, 1);
    g.attach_th_var(nb, T, 2);

    g.new_diseq(neq);
    assert!(matches!(
        g.next_theory_event(),
        Some(TheoryEvent::Disequal { v1: 1, v2: 2, .. })
    ));
}

/// Consumed queue positions are scope-aware: a pop rewinds both the queue
/// and its consumer.
#[test]
fn test_queue_heads_rewind_on_pop() {
    let mut tm = TermManager::new();
    let mut g = G::new();
    let int = tm.sorts.int_sort;
    let a = tm.mk_var("a", int);
    let b = tm.mk_var("b", int);
    let eq = tm.mk_eq(a, b).unwrap();
    let neq = g.intern(eq, &tm).unwrap();
    let na = g.find(a).unwrap();
    let nb = g.find(b).unwrap();

    g.push(1);
    g.merge(na, nb, ax(1));
    g.propagate();
    assert!(g.num_pending_literals() > 0);
    let lit = g.next_literal().unwrap();
    assert_eq!(lit.node, neq);

    g.pop(1);
    assert_eq!(g.num_literals(), 0);
    assert_eq!(g.num_pending_literals(), 0);

    // redoing the merge re-delivers the literal
    g.merge(na, nb, ax(1));
    g.propagate();
    assert_eq!(g.next_literal().unwrap().node, neq);
}

/// A node with merging disabled stays out of congruence closure until the
/// bit is flipped back; the toggle is undone by pop.
#[test]
fn test_merge_enabled_toggle() {
    let mut tm = TermManager::new();
    let mut g = G::new();
    let int = tm.sorts.int_sort;
    let f = tm.declare_fun("f", &[int], int).unwrap();
    let a = tm.mk_var("a", int);
    let b = tm.mk_var("b", int);
    let fa = tm.mk_app(f, &[a]).unwrap();
    let fb = tm.mk_app(f, &[b]).unwrap();
    let nfa = g.intern(fa, &tm).unwrap();
    let nfb = g.intern(fb, &tm).unwrap();
    let na = g.find(a).unwrap();
    let nb = g.find(b).unwrap();

    g.push(1);
    g.set_merge_enabled(nfb, false);
    g.merge(na, nb, ax(1));
    g.propagate();
    // the disabled application is not re-keyed, so no congruence fires
    assert!(!g.are_equal(nfa, nfb));

    g.pop(1);
    g.merge(na, nb, ax(1));
    g.propagate();
    assert!(g.are_equal(nfa, nfb));
    g.check_invariants().unwrap();
}

/// An engine is cloned across a term-manager translation by re-interning
/// every node and replaying the proof forest.
#[test]
fn test_copy_from() {
    let mut src_tm = TermManager::new();
    let mut src: G = Egraph::new();
    let elem = src_tm.sorts.declare("Elem");
    let f = src_tm.declare_fun("f", &[elem], elem).unwrap();
    let a = src_tm.mk_var("a", elem);
    let b = src_tm.mk_var("b", elem);
    let fa = src_tm.mk_app(f, &[a]).unwrap();
    let fb = src_tm.mk_app(f, &[b]).unwrap();
    let nfa = src.intern(fa, &src_tm).unwrap();
    let nfb = src.intern(fb, &src_tm).unwrap();
    let na = src.find(a).unwrap();
    let nb = src.find(b).unwrap();
    src.merge(na, nb, ax(17));
    src.propagate();
    assert!(src.are_equal(nfa, nfb));

    let mut dst_tm = TermManager::new();
    let mut dst = Egraph::copy_from(&src, &src_tm, &mut dst_tm, |&j| j + 100).unwrap();
    assert_eq!(dst.num_nodes(), src.num_nodes());

    // hash-consing maps the same constructions onto the copied terms
    let elem2 = dst_tm.sorts.declare("Elem");
    let f2 = dst_tm.declare_fun("f", &[elem2], elem2).unwrap();
    let a2 = dst_tm.mk_var("a", elem2);
    let b2 = dst_tm.mk_var("b", elem2);
    let fa2 = dst_tm.mk_app(f2, &[a2]).unwrap();
    let fb2 = dst_tm.mk_app(f2, &[b2]).unwrap();
    let na2 = dst.find(a2).expect("a must be interned in the copy");
    let nfa2 = dst.find(fa2).unwrap();
    let nfb2 = dst.find(fb2).unwrap();
    assert_eq!(dst.class_size(na2), 2);
    assert!(dst.are_equal(nfa2, nfb2));

    // external payloads went through the supplied copier
    let mut reasons = Vec::new();
    dst.explain_eq(nfa2, nfb2, &mut reasons);
    assert_eq!(reasons, vec![117]);
    dst.check_invariants().unwrap();
}

/// A tripped resource limit interrupts propagation without losing pending
/// work; clearing the limit and re-entering finishes the closure.
#[test]
fn test_resource_limit_interrupts_propagation() {
    let mut tm = TermManager::new();
    let mut g = G::new();
    let int = tm.sorts.int_sort;
    let f = tm.declare_fun("f", &[int], int).unwrap();
    let a = tm.mk_var("a", int);
    let b = tm.mk_var("b", int);
    let mut lhs = a;
    let mut rhs = b;
    // a chain of nested applications forces one propagation round per level
    for _ in 0..4 {
        lhs = tm.mk_app(f, &[lhs]).unwrap();
        rhs = tm.mk_app(f, &[rhs]).unwrap();
    }
    let top_l = g.intern(lhs, &tm).unwrap();
    let top_r = g.intern(rhs, &tm).unwrap();
    let na = g.find(a).unwrap();
    let nb = g.find(b).unwrap();

    g.set_resource_manager(ResourceManager::new(ResourceLimits {
        max_steps: Some(1),
        time_limit: None,
    }));
    g.merge(na, nb, ax(1));
    g.propagate();
    assert!(!g.are_equal(top_l, top_r));
    g.check_invariants().unwrap();

    g.set_resource_manager(ResourceManager::unlimited());
    g.propagate();
    assert!(g.are_equal(top_l, top_r));
    g.check_invariants().unwrap();
}

/// Congruence merges triggered inside a deep scope unwind cleanly across
/// several pops.
#[test]
fn test_nested_scopes() {
    let mut tm = TermManager::new();
    let mut g = G::new();
    let int = tm.sorts.int_sort;
    let f = tm.declare_fun("f", &[int, int], int).unwrap();
    let a = tm.mk_var("a", int);
    let b = tm.mk_var("b", int);
    let c = tm.mk_var("c", int);
    let fab = tm.mk_app(f, &[a, b]).unwrap();
    let fbc = tm.mk_app(f, &[b, c]).unwrap();
    g.intern(fab, &tm).unwrap();
    g.intern(fbc, &tm).unwrap();
    g.propagate();
    let base = snapshot(&g);

    let na = g.find(a).unwrap();
    let nb = g.find(b).unwrap();
    let nc = g.find(c).unwrap();

    g.push(1);
    g.merge(na, nb, ax(1));
    g.propagate();
    let after_first = snapshot(&g);

    g.push(2);
    g.merge(nb, nc, ax(2));
    g.propagate();
    assert!(g.are_equal(g.find(fab).unwrap(), g.find(fbc).unwrap()));

    g.pop(2);
    assert_eq!(snapshot(&g), after_first);
    g.pop(1);
    assert_eq!(snapshot(&g), base);
    g.check_invariants().unwrap();
}

/// Interning new applications inside a scope interacts correctly with
/// merges when both are popped together.
#[test]
fn test_pop_across_intern_and_merge() {
    let mut tm = TermManager::new();
    let mut g = G::new();
    let int = tm.sorts.int_sort;
    let f = tm.declare_fun("f", &[int], int).unwrap();
    let a = tm.mk_var("a", int);
    let b = tm.mk_var("b", int);
    let fa = tm.mk_app(f, &[a]).unwrap();
    g.intern(fa, &tm).unwrap();
    g.intern(b, &tm).unwrap();
    g.propagate();
    let base = snapshot(&g);

    g.push(1);
    let na = g.find(a).unwrap();
    let nb = g.find(b).unwrap();
    g.merge(na, nb, ax(1));
    g.propagate();
    // f(b) collides with f(a) the moment it is created
    let fb = tm.mk_app(f, &[b]).unwrap();
    let nfb = g.intern(fb, &tm).unwrap();
    assert!(g.are_equal(nfb, g.find(fa).unwrap()));
    g.propagate();
    g.check_invariants().unwrap();

    g.pop(1);
    assert_eq!(snapshot(&g), base);
    assert_eq!(g.find(fb), None);
    g.check_invariants().unwrap();
}

/// Explanations replay: asserting exactly the returned justifications in a
/// fresh engine reproduces the explained equality.
#[test]
fn test_explanation_replay() {
    let mut tm = TermManager::new();
    let mut g = G::new();
    let int = tm.sorts.int_sort;
    let f = tm.declare_fun("f", &[int], int).unwrap();
    let vars: Vec<TermId> = ["a", "b", "c", "d", "e"]
        .iter()
        .map(|n| tm.mk_var(n, int))
        .collect();
    let apps: Vec<TermId> = vars
        .iter()
        .map(|&v| tm.mk_app(f, &[v]).unwrap())
        .collect();
    for &t in &apps {
        g.intern(t, &tm).unwrap();
    }
    // the payload i records "merge vars[i] with vars[i+1]"
    let merges: Vec<(TermId, TermId)> = vars.windows(2).map(|w| (w[0], w[1])).collect();
    for (i, &(x, y)) in merges.iter().enumerate() {
        let nx = g.find(x).unwrap();
        let ny = g.find(y).unwrap();
        g.merge(nx, ny, ax(i as u32));
    }
    g.propagate();

    let target_l = g.find(apps[0]).unwrap();
    let target_r = g.find(apps[4]).unwrap();
    assert!(g.are_equal(target_l, target_r));
    let mut reasons = Vec::new();
    g.explain_eq(target_l, target_r, &mut reasons);

    let mut replay = G::new();
    for &t in &apps {
        replay.intern(t, &tm).unwrap();
    }
    for &i in &reasons {
        let (x, y) = merges[i as usize];
        let nx = replay.find(x).unwrap();
        let ny = replay.find(y).unwrap();
        replay.merge(nx, ny, ax(i));
    }
    replay.propagate();
    assert!(replay.are_equal(replay.find(apps[0]).unwrap(), replay.find(apps[4]).unwrap()));
}
