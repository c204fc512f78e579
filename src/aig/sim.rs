//! Two-valued, ternary and bit-parallel simulation of an AIG.
//!
//! Sequential simulation runs frame by frame: at frame 0 latches take the given initial values,
//! at frame `k > 0` they take the value of their next-state function at frame `k - 1`.

use crate::{Aig, AigEdge, AigNode};

/// Three-valued AND, `None` being the unknown value X.
pub fn and3(a: Option<bool>, b: Option<bool>) -> Option<bool> {
    match (a, b) {
        (Some(false), _) | (_, Some(false)) => Some(false),
        (Some(true), Some(true)) => Some(true),
        _ => None,
    }
}

impl Aig {
    /// Value of an edge given the values of all nodes.
    pub fn eval_edge(values: &[bool], edge: AigEdge) -> bool {
        values[edge.node] ^ edge.complement
    }

    pub fn eval_edge3(values: &[Option<bool>], edge: AigEdge) -> Option<bool> {
        values[edge.node].map(|v| v ^ edge.complement)
    }

    /// Simulates one frame given the values of the combinational inputs (primary inputs, then latches).
    pub fn simulate_comb(&self, ci_values: &[bool]) -> Vec<bool> {
        assert_eq!(ci_values.len(), self.inputs.len() + self.latches.len());
        let mut values = vec![false; self.nodes.len()];
        for (id, node) in self.nodes.iter().enumerate() {
            values[id] = match node {
                AigNode::True => true,
                AigNode::Input => ci_values[self.io_index[id]],
                AigNode::Latch { .. } => ci_values[self.inputs.len() + self.io_index[id]],
                AigNode::And { fanin0, fanin1 } => {
                    Aig::eval_edge(&values, *fanin0) && Aig::eval_edge(&values, *fanin1)
                }
                // Combinational outputs may refer to nodes created after them
                AigNode::Output { .. } | AigNode::LatchNext { .. } => false,
            };
        }
        for id in self.outputs.iter().chain(&self.latch_nexts) {
            values[*id] = Aig::eval_edge(&values, self.nodes[*id].fanin0());
        }
        values
    }

    /// Simulates `inputs.len()` frames starting from the latch values `regs`.
    /// Returns the values of every node at every frame.
    pub fn simulate(&self, regs: &[bool], inputs: &[Vec<bool>]) -> Vec<Vec<bool>> {
        assert_eq!(regs.len(), self.latches.len());
        let mut state = regs.to_vec();
        let mut frames = Vec::with_capacity(inputs.len());
        for frame_inputs in inputs {
            assert_eq!(frame_inputs.len(), self.inputs.len());
            let cis: Vec<bool> = frame_inputs.iter().chain(&state).copied().collect();
            let values = self.simulate_comb(&cis);
            state = self.latch_nexts.iter().map(|&id| values[id]).collect();
            frames.push(values);
        }
        frames
    }

    /// Ternary version of [`Aig::simulate`].
    pub fn simulate_ternary(
        &self,
        regs: &[Option<bool>],
        inputs: &[Vec<Option<bool>>],
    ) -> Vec<Vec<Option<bool>>> {
        assert_eq!(regs.len(), self.latches.len());
        let mut state = regs.to_vec();
        let mut frames = Vec::with_capacity(inputs.len());
        for frame_inputs in inputs {
            assert_eq!(frame_inputs.len(), self.inputs.len());
            let mut values = vec![None; self.nodes.len()];
            for (id, node) in self.nodes.iter().enumerate() {
                values[id] = match node {
                    AigNode::True => Some(true),
                    AigNode::Input => frame_inputs[self.io_index[id]],
                    AigNode::Latch { .. } => state[self.io_index[id]],
                    AigNode::And { fanin0, fanin1 } => and3(
                        Aig::eval_edge3(&values, *fanin0),
                        Aig::eval_edge3(&values, *fanin1),
                    ),
                    AigNode::Output { .. } | AigNode::LatchNext { .. } => None,
                };
            }
            for id in self.outputs.iter().chain(&self.latch_nexts) {
                values[*id] = Aig::eval_edge3(&values, self.nodes[*id].fanin0());
            }
            state = self.latch_nexts.iter().map(|&id| values[id]).collect();
            frames.push(values);
        }
        frames
    }

    /// Bit-parallel combinational simulation: 64 patterns at once, one word per combinational input.
    pub fn simulate_words(&self, ci_words: &[u64]) -> Vec<u64> {
        assert_eq!(ci_words.len(), self.inputs.len() + self.latches.len());
        let word = |values: &[u64], e: AigEdge| {
            if e.complement {
                !values[e.node]
            } else {
                values[e.node]
            }
        };
        let mut values = vec![0u64; self.nodes.len()];
        for (id, node) in self.nodes.iter().enumerate() {
            values[id] = match node {
                AigNode::True => !0,
                AigNode::Input => ci_words[self.io_index[id]],
                AigNode::Latch { .. } => ci_words[self.inputs.len() + self.io_index[id]],
                AigNode::And { fanin0, fanin1 } => word(&values, *fanin0) & word(&values, *fanin1),
                AigNode::Output { .. } | AigNode::LatchNext { .. } => 0,
            };
        }
        for id in self.outputs.iter().chain(&self.latch_nexts) {
            values[*id] = word(&values, self.nodes[*id].fanin0());
        }
        values
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use test_log::test;

    #[test]
    fn and3_test() {
        assert_eq!(and3(Some(false), None), Some(false));
        assert_eq!(and3(None, Some(false)), Some(false));
        assert_eq!(and3(Some(true), None), None);
        assert_eq!(and3(Some(true), Some(true)), Some(true));
    }

    #[test]
    fn simulate_counter_test() {
        // 2-bit counter, output is high when the counter reaches 3
        let mut aig = Aig::new();
        let en = aig.add_input();
        let b0 = aig.add_latch(Some(false));
        let b1 = aig.add_latch(Some(false));
        let n0 = aig.xor(b0, en);
        let carry = aig.and(b0, en);
        let n1 = aig.xor(b1, carry);
        aig.set_latch_next(0, n0).unwrap();
        aig.set_latch_next(1, n1).unwrap();
        let both = aig.and(b0, b1);
        let out = aig.add_output(both);

        let frames = aig.simulate(&[false, false], &vec![vec![true]; 4]);
        let outs: Vec<bool> = frames.iter().map(|v| v[out]).collect();
        assert_eq!(outs, vec![false, false, false, true]);

        let frames = aig.simulate_ternary(&[Some(false), Some(false)], &vec![vec![None]; 3]);
        // Frame 0 is fully known, the enable being X makes the state unknown afterwards
        assert_eq!(frames[0][out], Some(false));
        assert_eq!(frames[1][b0.get_node_id()], None);
        assert_eq!(frames[1][b1.get_node_id()], Some(false));
        assert_eq!(frames[1][out], Some(false));
        assert_eq!(frames[2][out], None);
    }

    #[test]
    fn simulate_words_test() {
        let mut aig = Aig::new();
        let a = aig.add_input();
        let b = aig.add_input();
        let x = aig.xor(a, b);
        let o = aig.add_output(x);
        let values = aig.simulate_words(&[0b1100, 0b1010]);
        assert_eq!(values[o] & 0b1111, 0b0110);
        assert_eq!(values[0], !0);
    }
}
