//! Building derived AIGs: combinational cones, abstractions and unrollings.
//!
//! All of them are built with [`Aig::and`], so the copies are structurally hashed and
//! simplified on the fly.

use crate::{Aig, AigEdge, AigNode, NodeId};

/// An abstracted copy of a sequential AIG, see [`Aig::dup_abstraction`].
#[derive(Debug, Clone)]
pub struct Abstraction {
    /// The abstracted AIG. Its inputs are the real inputs followed by the pseudo-inputs.
    pub aig: Aig,
    /// Original node standing behind each pseudo-input.
    pub ppis: Vec<NodeId>,
    /// Original index of each latch kept in the abstraction.
    pub latches: Vec<usize>,
}

impl Abstraction {
    pub fn n_real_inputs(&self) -> usize {
        self.aig.n_inputs() - self.ppis.len()
    }
}

/// A flat unrolling of a sequential AIG, see [`Aig::unroll_pba`].
#[derive(Debug, Clone)]
pub struct Unrolling {
    /// The combinational unrolled AIG, with a single output.
    pub aig: Aig,
    /// Activation input of each latch.
    pub acts: Vec<NodeId>,
    /// `inputs[k][i]` is the copy of input `i` at frame `k`.
    pub inputs: Vec<Vec<NodeId>>,
    /// `frees[k][i]` is the free value latch `i` takes at frame `k` when deactivated.
    pub frees: Vec<Vec<NodeId>>,
    /// `regs[k][i]` is the value of latch `i` at frame `k` in the unrolling.
    pub regs: Vec<Vec<AigEdge>>,
}

/// Gate description handed to [`Aig::dup_abstraction`]: the boundary the gate depends on,
/// and the and gates between that boundary and the gate, in topological order.
#[derive(Debug, Clone, Default)]
pub struct GateCone {
    pub leaves: Vec<NodeId>,
    pub volume: Vec<NodeId>,
}

fn map_edge(map: &[Option<AigEdge>], edge: AigEdge) -> AigEdge {
    map[edge.node]
        .unwrap_or_else(|| panic!("node {} copied before its fanin", edge.node))
        .not_if(edge.complement)
}

impl Aig {
    /// Copies the transitive fanin of `roots` into a fresh combinational AIG.
    ///
    /// The inputs of the copy are the combinational inputs `roots` depend on (ascending ids),
    /// they are returned alongside the copy. The outputs of the copy are the roots, in order.
    pub fn dup_cone(&self, roots: &[AigEdge]) -> (Aig, Vec<NodeId>) {
        let mut aig = Aig::new();
        let mut map: Vec<Option<AigEdge>> = vec![None; self.nodes.len()];
        map[0] = Some(aig.get_const_true());

        let support = self.collect_support(roots);
        for &ci in &support {
            map[ci] = Some(aig.add_input());
        }
        for id in self.collect_cone(roots) {
            let (f0, f1) = (self.nodes[id].fanin0(), self.nodes[id].fanin1());
            map[id] = Some(aig.and(map_edge(&map, f0), map_edge(&map, f1)));
        }
        for &root in roots {
            aig.add_output(map_edge(&map, root));
        }
        (aig, support)
    }

    /// Builds the abstraction made of the `gates` (and gates or latch outputs) of this AIG.
    ///
    /// `cone_of` describes each included and gate. Every leaf of an included gate which is neither
    /// included, nor a real input, nor the constant, becomes a pseudo-input of the abstraction.
    /// The next-state function of an included latch is a leaf of that latch.
    ///
    /// The only primary output of the abstraction is `property`, and real inputs are all kept
    /// (in order) so that counter-examples of the abstraction can be replayed on this AIG.
    pub fn dup_abstraction(
        &self,
        gates: &[NodeId],
        mut cone_of: impl FnMut(NodeId) -> GateCone,
        property: AigEdge,
    ) -> Abstraction {
        let mut included = vec![false; self.nodes.len()];
        let mut gates = gates.to_vec();
        gates.sort_unstable();
        gates.dedup();
        for &g in &gates {
            included[g] = true;
        }

        let mut cones = Vec::with_capacity(gates.len());
        let mut boundary = vec![property.node];
        for &g in &gates {
            match self.nodes[g] {
                AigNode::And { .. } => {
                    let cone = cone_of(g);
                    boundary.extend(&cone.leaves);
                    cones.push(cone);
                }
                AigNode::Latch { .. } => {
                    boundary.push(self.get_latch_next(self.io_index[g]).node);
                    cones.push(GateCone::default());
                }
                _ => cones.push(GateCone::default()),
            }
        }
        let mut ppis: Vec<NodeId> = boundary
            .into_iter()
            .filter(|&n| !included[n] && !self.nodes[n].is_input() && !self.nodes[n].is_const())
            .collect();
        ppis.sort_unstable();
        ppis.dedup();

        let mut aig = Aig::new();
        let mut map: Vec<Option<AigEdge>> = vec![None; self.nodes.len()];
        map[0] = Some(aig.get_const_true());
        for &pi in &self.inputs {
            map[pi] = Some(aig.add_input());
        }
        for &ppi in &ppis {
            map[ppi] = Some(aig.add_input());
        }
        let mut latches = Vec::new();
        for &g in &gates {
            if let AigNode::Latch { init } = self.nodes[g] {
                map[g] = Some(aig.add_latch(init));
                latches.push(self.io_index[g]);
            }
        }

        for (&g, cone) in gates.iter().zip(&cones) {
            if !self.nodes[g].is_and() {
                continue;
            }
            // Interior nodes may be shared between several cones, so they are copied per gate
            let mut local = map.clone();
            for &v in &cone.volume {
                let (f0, f1) = (self.nodes[v].fanin0(), self.nodes[v].fanin1());
                local[v] = Some(aig.and(map_edge(&local, f0), map_edge(&local, f1)));
            }
            map[g] = local[g];
        }

        aig.add_output(map_edge(&map, property));
        for (k, &latch) in latches.iter().enumerate() {
            let next = map_edge(&map, self.get_latch_next(latch));
            aig.link_latch_next(k, next);
        }

        Abstraction { aig, ppis, latches }
    }

    /// Flop-level abstraction: the latches not listed in `flops` become pseudo-inputs.
    /// All primary outputs are kept.
    pub fn dup_flop_abstraction(&self, flops: &[usize]) -> Abstraction {
        let mut kept = vec![false; self.latches.len()];
        for &f in flops {
            kept[f] = true;
        }

        let mut aig = Aig::new();
        let mut map: Vec<Option<AigEdge>> = vec![None; self.nodes.len()];
        map[0] = Some(aig.get_const_true());
        for &pi in &self.inputs {
            map[pi] = Some(aig.add_input());
        }
        let mut ppis = Vec::new();
        for (k, &ro) in self.latches.iter().enumerate() {
            if !kept[k] {
                map[ro] = Some(aig.add_input());
                ppis.push(ro);
            }
        }
        let mut latches = Vec::new();
        for (k, &ro) in self.latches.iter().enumerate() {
            if kept[k] {
                map[ro] = Some(aig.add_latch(self.get_latch_init(k)));
                latches.push(k);
            }
        }
        for id in self.and_nodes() {
            let (f0, f1) = (self.nodes[id].fanin0(), self.nodes[id].fanin1());
            map[id] = Some(aig.and(map_edge(&map, f0), map_edge(&map, f1)));
        }
        for o in 0..self.outputs.len() {
            let driver = map_edge(&map, self.get_output_driver(o));
            aig.add_output(driver);
        }
        for (k, &latch) in latches.iter().enumerate() {
            let next = map_edge(&map, self.get_latch_next(latch));
            aig.link_latch_next(k, next);
        }

        Abstraction { aig, ppis, latches }
    }

    /// Unrolls `n_frames` frames of this AIG into a combinational AIG whose only output is true
    /// iff primary output `property` is true in one of the frames.
    ///
    /// Each latch gets an activation input: when the activation is true the latch behaves
    /// normally (initial value, then next-state function), when it is false the latch takes a
    /// fresh free value at every frame. The inputs of the unrolling are the activations, then,
    /// frame by frame, the copies of the primary inputs followed by the free latch values.
    pub fn unroll_pba(&self, n_frames: usize, property: usize) -> Unrolling {
        let mut aig = Aig::new();
        let acts: Vec<AigEdge> = (0..self.latches.len()).map(|_| aig.add_input()).collect();
        let mut inputs = Vec::with_capacity(n_frames);
        let mut frees = Vec::with_capacity(n_frames);
        let mut regs = Vec::with_capacity(n_frames);
        let mut prev: Option<Vec<Option<AigEdge>>> = None;
        let mut fails = !aig.get_const_true();

        for _ in 0..n_frames {
            let mut map: Vec<Option<AigEdge>> = vec![None; self.nodes.len()];
            map[0] = Some(aig.get_const_true());
            let frame_inputs: Vec<AigEdge> = self.inputs.iter().map(|_| aig.add_input()).collect();
            let frame_frees: Vec<AigEdge> = self.latches.iter().map(|_| aig.add_input()).collect();
            for (k, &pi) in self.inputs.iter().enumerate() {
                map[pi] = Some(frame_inputs[k]);
            }
            let mut frame_regs = Vec::with_capacity(self.latches.len());
            for (k, &ro) in self.latches.iter().enumerate() {
                let real = match &prev {
                    None => match self.get_latch_init(k) {
                        Some(v) => aig.get_const_true().not_if(!v),
                        None => frame_frees[k],
                    },
                    Some(prev) => map_edge(prev, self.get_latch_next(k)),
                };
                let value = aig.mux(acts[k], real, frame_frees[k]);
                map[ro] = Some(value);
                frame_regs.push(value);
            }
            for id in self.and_nodes() {
                let (f0, f1) = (self.nodes[id].fanin0(), self.nodes[id].fanin1());
                map[id] = Some(aig.and(map_edge(&map, f0), map_edge(&map, f1)));
            }
            let bad = map_edge(&map, self.get_output_driver(property));
            fails = aig.or(fails, bad);

            inputs.push(frame_inputs.iter().map(|e| e.node).collect());
            frees.push(frame_frees.iter().map(|e| e.node).collect());
            regs.push(frame_regs);
            prev = Some(map);
        }
        aig.add_output(fails);

        Unrolling {
            aig,
            acts: acts.iter().map(|e| e.node).collect(),
            inputs,
            frees,
            regs,
        }
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use test_log::test;

    fn toggle() -> Aig {
        // Latch toggles when enabled, output is the latch value
        let mut aig = Aig::new();
        let en = aig.add_input();
        let l = aig.add_latch(Some(false));
        let n = aig.xor(l, en);
        aig.set_latch_next(0, n).unwrap();
        aig.add_output(l);
        aig
    }

    #[test]
    fn dup_cone_test() {
        let mut aig = Aig::new();
        let a = aig.add_input();
        let b = aig.add_input();
        let c = aig.add_input();
        let ab = aig.and(a, b);
        let x = aig.and(ab, !c);
        let _unused = aig.and(b, c);
        let (cone, support) = aig.dup_cone(&[!x]);
        assert_eq!(
            support,
            vec![a.get_node_id(), b.get_node_id(), c.get_node_id()]
        );
        assert_eq!(cone.n_ands(), 2);
        assert_eq!(cone.n_outputs(), 1);
        assert!(cone.get_output_driver(0).get_complement());
        assert!(cone.check_integrity().is_ok());

        for pattern in 0..8u32 {
            let vals: Vec<bool> = (0..3).map(|i| pattern >> i & 1 != 0).collect();
            let orig = aig.simulate_comb(&vals);
            let copy = cone.simulate_comb(&vals);
            assert_eq!(
                Aig::eval_edge(&orig, !x),
                Aig::eval_edge(&copy, cone.get_output_driver(0))
            );
        }
    }

    #[test]
    fn dup_abstraction_test() {
        let aig = toggle();
        let l = aig.get_latches()[0];
        let n = aig.get_latch_next(0).get_node_id();
        let property = aig.get_output_driver(0);

        // Nothing included: the latch is a pseudo-input
        let abs = aig.dup_abstraction(&[], |_| GateCone::default(), property);
        assert_eq!(abs.ppis, vec![l]);
        assert_eq!(abs.n_real_inputs(), 1);
        assert_eq!(abs.aig.n_latches(), 0);

        // Latch included, its next-state becomes a pseudo-input
        let abs = aig.dup_abstraction(&[l], |_| GateCone::default(), property);
        assert_eq!(abs.ppis, vec![n]);
        assert_eq!(abs.latches, vec![0]);
        assert_eq!(abs.aig.n_latches(), 1);
        assert!(abs.aig.check_integrity().is_ok());
    }

    #[test]
    fn dup_flop_abstraction_test() {
        let aig = toggle();
        let abs = aig.dup_flop_abstraction(&[]);
        assert_eq!(abs.aig.n_inputs(), 2);
        assert_eq!(abs.aig.n_latches(), 0);
        assert_eq!(abs.ppis, vec![aig.get_latches()[0]]);

        let abs = aig.dup_flop_abstraction(&[0]);
        assert_eq!(abs.aig.n_inputs(), 1);
        assert_eq!(abs.aig.n_latches(), 1);
        assert!(abs.aig.check_integrity().is_ok());
    }

    #[test]
    fn unroll_pba_test() {
        let aig = toggle();
        let unrolled = aig.unroll_pba(2, 0);
        assert_eq!(unrolled.acts.len(), 1);
        assert_eq!(unrolled.inputs.len(), 2);
        assert_eq!(unrolled.regs.len(), 2);
        assert_eq!(unrolled.aig.n_inputs(), 1 + 2 * 2);
        assert_eq!(unrolled.aig.n_outputs(), 1);
        assert!(unrolled.aig.check_integrity().is_ok());

        let out = unrolled.aig.get_outputs()[0];
        // inputs: act, en0, free0, en1, free1
        // activated latch: frame 0 is 0, frame 1 is en0
        let values = unrolled.aig.simulate_comb(&[true, true, false, false, false]);
        assert!(values[out]);
        let values = unrolled.aig.simulate_comb(&[true, false, true, false, true]);
        assert!(!values[out]);
        // deactivated latch: free values are seen
        let values = unrolled.aig.simulate_comb(&[false, false, true, false, false]);
        assert!(values[out]);
    }
}
