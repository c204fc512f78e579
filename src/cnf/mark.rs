//! Selection of the nodes which become CNF variables.
//!
//! A node is marked when it gets its own SAT variable. Every other and gate is folded into
//! the cut of the marked nodes using it. The marking guarantees that the cut of every marked
//! node (collected with [`collect_super`], crossing complemented edges) either has at most six
//! leaves, in which case its clauses are derived from a truth table, or is a plain multi-input
//! and, in which case no complemented edge to an unmarked node remains inside it.

use log::{debug, warn};

use crate::{
    Aig, AigEdge, NodeId,
    aig::travid::TravIds,
    cnf::cut::{MAX_TRUTH_LEAVES, collect_super, collect_volume},
};

fn mark_co_drivers(aig: &Aig, marks: &mut [bool]) {
    for co in aig.get_cos() {
        marks[aig.node(co).fanin0().get_node_id()] = true;
    }
}

/// Computes the marking of the whole AIG, indexed by node id.
pub fn mark_nodes(aig: &Aig) -> Vec<bool> {
    let n = aig.n_nodes();
    let mut marks = vec![false; n];
    // And gates absorbed by the mux or xor they belong to
    let mut internal = vec![false; n];

    for ci in aig.get_cis() {
        marks[ci] = true;
    }
    mark_co_drivers(aig, &mut marks);

    let mut n_muxes = 0;
    for id in aig.and_nodes() {
        let Some((ctrl, then, els)) = aig.recognize_mux(id) else {
            continue;
        };
        let node = aig.node(id);
        let (f0, f1) = (node.fanin0().get_node_id(), node.fanin1().get_node_id());
        if internal[f0] || aig.get_refs(f0) > 1 || internal[f1] || aig.get_refs(f1) > 1 {
            continue;
        }
        marks[id] = true;
        internal[f0] = true;
        internal[f1] = true;
        for e in [ctrl, then, els] {
            marks[e.get_node_id()] = true;
        }
        n_muxes += 1;
    }

    for id in aig.and_nodes() {
        if aig.get_refs(id) > 1 {
            marks[id] = true;
        }
        for fanin in aig.node(id).get_fanins() {
            if fanin.get_complement() && !internal[fanin.get_node_id()] {
                marks[fanin.get_node_id()] = true;
            }
        }
    }

    // Gates whose both fanins have a variable are cheap to fold into their fanouts
    for id in aig.and_nodes() {
        let node = aig.node(id);
        if marks[id] && marks[node.fanin0().get_node_id()] && marks[node.fanin1().get_node_id()] {
            marks[id] = false;
        }
    }
    mark_co_drivers(aig, &mut marks);

    let closure = mark_more(aig, &mut marks);
    debug!(
        "marking: {} muxes, {} nodes added by the closure, {} marked nodes",
        n_muxes,
        closure,
        marks.iter().filter(|&&m| m).count()
    );
    marks
}

/// Unmarked targets of the complemented edges inside `volume`.
fn unmarked_complements(aig: &Aig, marks: &[bool], volume: &[NodeId]) -> Vec<NodeId> {
    let mut targets = Vec::new();
    for &v in volume {
        for fanin in aig.node(v).get_fanins() {
            let id = fanin.get_node_id();
            if fanin.get_complement() && !marks[id] && !targets.contains(&id) {
                targets.push(id);
            }
        }
    }
    targets
}

/// Closes an existing marking: every marked node whose cut is too large for a truth table gets
/// the targets of the complemented edges inside its cut marked, until nothing changes.
///
/// Returns the number of nodes marked by this call, 0 when `marks` is already closed.
pub fn mark_more(aig: &Aig, marks: &mut [bool]) -> usize {
    let mut trav = TravIds::new(aig.n_nodes());
    let mut added = 0;
    let mut sweeps = 0;
    loop {
        let mut changes = 0;
        for id in aig.and_nodes() {
            if !marks[id] {
                continue;
            }
            let leaves = collect_super(aig, marks, id, false);
            if leaves.len() <= MAX_TRUTH_LEAVES {
                continue;
            }
            let volume = collect_volume(aig, &mut trav, id, &leaves);
            for target in unmarked_complements(aig, marks, &volume) {
                marks[target] = true;
                changes += 1;
            }
        }
        sweeps += 1;
        added += changes;
        if changes == 0 {
            break;
        }
    }
    debug!("marking closure: {} nodes in {} sweeps", added, sweeps);
    added
}

/// Counts the violations of the marking contract: combinational output drivers without a
/// variable, and large cuts which are not plain multi-input ands.
///
/// This is a diagnostic, a non-zero count is reported as a warning.
pub fn verify_marking(aig: &Aig, marks: &[bool]) -> usize {
    let mut trav = TravIds::new(aig.n_nodes());
    let mut violations = 0;
    for co in aig.get_cos() {
        let driver: AigEdge = aig.node(co).fanin0();
        if aig.node(driver.get_node_id()).is_and() && !marks[driver.get_node_id()] {
            violations += 1;
        }
    }
    for id in aig.and_nodes() {
        if !marks[id] {
            continue;
        }
        let leaves = collect_super(aig, marks, id, false);
        if leaves.len() <= MAX_TRUTH_LEAVES {
            continue;
        }
        let volume = collect_volume(aig, &mut trav, id, &leaves);
        if !unmarked_complements(aig, marks, &volume).is_empty() {
            violations += 1;
        }
    }
    if violations > 0 {
        warn!("marking verification: {} violations", violations);
    }
    violations
}
