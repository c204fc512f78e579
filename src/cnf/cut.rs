//! Supergates, cut volumes and cut truth tables.

use std::collections::HashMap;

use crate::{Aig, AigEdge, NodeId, aig::travid::TravIds};

/// Truth tables of the six elementary variables.
pub const ELEMENTARY: [u64; 6] = [
    0xAAAA_AAAA_AAAA_AAAA,
    0xCCCC_CCCC_CCCC_CCCC,
    0xF0F0_F0F0_F0F0_F0F0,
    0xFF00_FF00_FF00_FF00,
    0xFFFF_0000_FFFF_0000,
    0xFFFF_FFFF_0000_0000,
];

/// Largest cut handled with a truth table.
pub const MAX_TRUTH_LEAVES: usize = 6;

/// Collects the leaves of the supergate rooted at `root`.
///
/// The descent stops at any node other than `root` which is marked, or which is not an and gate.
/// With `stop_compl`, it also stops at complemented edges and the leaves keep their polarity;
/// otherwise complemented edges are crossed and the leaves are regular.
///
/// Each leaf appears once, in the order of a left-first depth-first traversal.
pub fn collect_super(aig: &Aig, marks: &[bool], root: NodeId, stop_compl: bool) -> Vec<AigEdge> {
    assert!(aig.node(root).is_and(), "supergate root {} is not an and gate", root);
    let mut leaves: Vec<AigEdge> = Vec::new();
    let mut stack = vec![AigEdge::new(root, false)];
    while let Some(edge) = stack.pop() {
        let id = edge.get_node_id();
        let is_leaf = id != root
            && (marks[id] || (stop_compl && edge.get_complement()) || !aig.node(id).is_and());
        if is_leaf {
            let leaf = if stop_compl { edge } else { edge.regular() };
            if !leaves.contains(&leaf) {
                leaves.push(leaf);
            }
            continue;
        }
        let node = aig.node(id);
        // Reversed so that fanin0 is explored first
        let (f0, f1) = (node.fanin0(), node.fanin1());
        if stop_compl {
            stack.push(f1);
            stack.push(f0);
        } else {
            stack.push(f1.regular());
            stack.push(f0.regular());
        }
    }
    leaves
}

/// Collects the and gates between `leaves` and `root`, in topological order. `root` comes last.
pub fn collect_volume(
    aig: &Aig,
    trav: &mut TravIds,
    root: NodeId,
    leaves: &[AigEdge],
) -> Vec<NodeId> {
    trav.increment();
    for leaf in leaves {
        trav.set_current(leaf.get_node_id());
    }
    let mut volume = Vec::new();
    // (node, fanins already pushed)
    let mut stack = vec![(root, false)];
    while let Some((id, expanded)) = stack.pop() {
        if expanded {
            volume.push(id);
            continue;
        }
        if !trav.visit(id) {
            continue;
        }
        let node = aig.node(id);
        assert!(node.is_and(), "node {} inside a cut is not an and gate", id);
        stack.push((id, true));
        stack.push((node.fanin1().get_node_id(), false));
        stack.push((node.fanin0().get_node_id(), false));
    }
    volume
}

/// Truth table of the cut root as a function of its leaves (at most six).
///
/// Leaf `i` is the elementary variable `i`; the polarity of the leaves is ignored,
/// the table is expressed in terms of the leaf nodes.
pub fn derive_truth(aig: &Aig, leaves: &[AigEdge], volume: &[NodeId]) -> u64 {
    assert!(
        leaves.len() <= MAX_TRUTH_LEAVES,
        "cut with {} leaves does not fit a truth table",
        leaves.len()
    );
    let mut tables: HashMap<NodeId, u64> = HashMap::with_capacity(leaves.len() + volume.len());
    for (i, leaf) in leaves.iter().enumerate() {
        tables.insert(leaf.get_node_id(), ELEMENTARY[i]);
    }
    let table_of = |tables: &HashMap<NodeId, u64>, e: AigEdge| -> u64 {
        let t = tables[&e.get_node_id()];
        if e.get_complement() { !t } else { t }
    };
    let mut truth = 0;
    for &id in volume {
        let node = aig.node(id);
        truth = table_of(&tables, node.fanin0()) & table_of(&tables, node.fanin1());
        tables.insert(id, truth);
    }
    truth
}

#[cfg(test)]
mod test {
    use super::*;
    use test_log::test;

    /// Simulates the whole AIG on the 64 patterns given to the cut leaves,
    /// other inputs being fixed to `background`.
    fn simulate_cut(aig: &Aig, leaves: &[AigEdge], background: u64) -> Vec<u64> {
        let words: Vec<u64> = aig
            .get_cis()
            .iter()
            .map(|ci| {
                leaves
                    .iter()
                    .position(|l| l.get_node_id() == *ci)
                    .map(|i| ELEMENTARY[i])
                    .unwrap_or(background)
            })
            .collect();
        aig.simulate_words(&words)
    }

    #[test]
    fn collect_super_test() {
        let mut aig = Aig::new();
        let a = aig.add_input();
        let b = aig.add_input();
        let c = aig.add_input();
        let ab = aig.and(a, b);
        let x = aig.and(!ab, c);
        let mut marks = vec![false; aig.n_nodes()];
        for ci in aig.get_cis() {
            marks[ci] = true;
        }

        let mut leaves = collect_super(&aig, &marks, x.get_node_id(), false);
        leaves.sort();
        assert_eq!(leaves, vec![a, b, c]);
        let leaves = collect_super(&aig, &marks, x.get_node_id(), true);
        assert_eq!(leaves, vec![!ab, c]);

        marks[ab.get_node_id()] = true;
        let leaves = collect_super(&aig, &marks, x.get_node_id(), false);
        assert_eq!(leaves, vec![ab, c]);
    }

    #[test]
    fn collect_volume_test() {
        let mut aig = Aig::new();
        let a = aig.add_input();
        let b = aig.add_input();
        let c = aig.add_input();
        let ab = aig.and(a, b);
        let bc = aig.and(b, c);
        let x = aig.and(ab, !bc);
        let mut trav = TravIds::new(aig.n_nodes());
        let mut volume = collect_volume(&aig, &mut trav, x.get_node_id(), &[a, b, c]);
        assert_eq!(volume.last(), Some(&x.get_node_id()));
        volume.sort();
        assert_eq!(
            volume,
            vec![ab.get_node_id(), bc.get_node_id(), x.get_node_id()]
        );
        let volume = collect_volume(&aig, &mut trav, x.get_node_id(), &[ab, b, c]);
        assert_eq!(volume, vec![bc.get_node_id(), x.get_node_id()]);
    }

    #[test]
    fn cut_soundness_test() {
        // Mixed and/xor/mux logic over six inputs
        let mut aig = Aig::new();
        let ins: Vec<AigEdge> = (0..6).map(|_| aig.add_input()).collect();
        let x = aig.xor(ins[0], ins[1]);
        let m = aig.mux(ins[2], x, ins[3]);
        let o = aig.or(m, ins[4]);
        let root = aig.and(o, !ins[5]);
        aig.add_output(!root);

        let mut marks = vec![false; aig.n_nodes()];
        for ci in aig.get_cis() {
            marks[ci] = true;
        }
        let mut trav = TravIds::new(aig.n_nodes());
        let leaves = collect_super(&aig, &marks, root.get_node_id(), false);
        assert_eq!(leaves.len(), 6);
        let volume = collect_volume(&aig, &mut trav, root.get_node_id(), &leaves);
        assert_eq!(volume.last(), Some(&root.get_node_id()));
        let truth = derive_truth(&aig, &leaves, &volume);
        let values = simulate_cut(&aig, &leaves, 0);
        assert_eq!(truth, values[root.get_node_id()]);

        // Cuts at internal nodes too
        for id in [x.get_node_id(), m.get_node_id(), o.get_node_id()] {
            let leaves = collect_super(&aig, &marks, id, false);
            let volume = collect_volume(&aig, &mut trav, id, &leaves);
            let truth = derive_truth(&aig, &leaves, &volume);
            for background in [0, !0] {
                let values = simulate_cut(&aig, &leaves, background);
                assert_eq!(truth, values[id]);
            }
        }
    }
}
