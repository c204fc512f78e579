//! Module defining the [`Aig`] struct, as well as [`AigNode`], [`AigEdge`] and some others relevant structs.
//!
//! To derive a CNF from an AIG, check [`crate::cnf`]. To check a property with abstraction refinement,
//! check [`crate::abs`].

pub mod dfs;
mod dup;
pub mod edge;
pub mod error;
mod integrity;
pub mod node;
mod parser;
pub mod sim;
pub mod travid;

use std::collections::HashMap;

pub use dup::{Abstraction, GateCone, Unrolling};
pub use edge::{AigEdge, FaninId};
pub use error::{AigError, ParserError, Result};
pub use node::{AigNode, NodeId};

/// A whole AIG, stored as an arena of nodes.
///
/// Node ids are indices into the arena. The constant node [`AigNode::True`] always has id 0.
/// And gates are always created after their fanins, so iterating over ascending ids visits
/// the combinational logic in topological order.
///
/// And gates are structurally hashed: asking twice for the same and gate returns the same node.
///
/// Combinational inputs (CIs) are the primary inputs followed by the latch outputs,
/// combinational outputs (COs) are the primary outputs followed by the latch next-state nodes.
/// Latch number `i` is the pair (`get_latches()[i]`, `get_latch_nexts()[i]`).
///
/// ```rust
/// use aigsat::Aig;
/// let mut aig = Aig::new();
/// let a = aig.add_input();
/// let b = aig.add_input();
/// let ab = aig.and(a, b);
/// assert_eq!(aig.and(b, a), ab); // strashed
/// assert_eq!(aig.and(a, !a), !aig.get_const_true()); // simplified
/// aig.add_output(ab);
/// assert_eq!(aig.n_ands(), 1);
/// ```
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Aig {
    nodes: Vec<AigNode>,
    /// Fanout reference counts (and gates and combinational outputs count as references).
    refs: Vec<u32>,
    /// Position of each input, latch, output and next-state node in its own list.
    io_index: Vec<usize>,
    inputs: Vec<NodeId>,
    latches: Vec<NodeId>,
    latch_nexts: Vec<NodeId>,
    outputs: Vec<NodeId>,
    strash: HashMap<(AigEdge, AigEdge), NodeId>,
}

impl Default for Aig {
    fn default() -> Self {
        Aig::new()
    }
}

impl Aig {
    /// Create a brand new AIG (constant node [`AigNode::True`] included).
    pub fn new() -> Self {
        Aig {
            nodes: vec![AigNode::True],
            refs: vec![0],
            io_index: vec![0],
            inputs: Vec::new(),
            latches: Vec::new(),
            latch_nexts: Vec::new(),
            outputs: Vec::new(),
            strash: HashMap::new(),
        }
    }

    fn push_node(&mut self, node: AigNode, io_index: usize) -> NodeId {
        let id = self.nodes.len();
        for fanin in node.get_fanins() {
            self.refs[fanin.node] += 1;
        }
        self.nodes.push(node);
        self.refs.push(0);
        self.io_index.push(io_index);
        id
    }

    /// Number of nodes in the arena (constant and combinational outputs included).
    pub fn n_nodes(&self) -> usize {
        self.nodes.len()
    }

    /// Retrieves a node from its id.
    pub fn get_node(&self, id: NodeId) -> Option<&AigNode> {
        self.nodes.get(id)
    }

    /// Retrieves a node from its id, panics if it does not exist.
    pub fn node(&self, id: NodeId) -> &AigNode {
        &self.nodes[id]
    }

    /// The regular edge to the constant node, ie the constant true signal.
    pub fn get_const_true(&self) -> AigEdge {
        AigEdge::new(0, false)
    }

    /// Number of fanouts of the node (combinational outputs included).
    pub fn get_refs(&self, id: NodeId) -> u32 {
        self.refs[id]
    }

    /// Position of an input (resp. latch, output, next-state node) within [`Aig::get_inputs`]
    /// (resp. [`Aig::get_latches`], [`Aig::get_outputs`], [`Aig::get_latch_nexts`]).
    pub fn get_io_index(&self, id: NodeId) -> usize {
        self.io_index[id]
    }

    /// Creates a new primary input.
    pub fn add_input(&mut self) -> AigEdge {
        let index = self.inputs.len();
        let id = self.push_node(AigNode::Input, index);
        self.inputs.push(id);
        AigEdge::new(id, false)
    }

    /// Creates a new latch and returns its output.
    ///
    /// Its next-state function is the constant false until [`Aig::set_latch_next`] is called.
    pub fn add_latch(&mut self, init: Option<bool>) -> AigEdge {
        let index = self.latches.len();
        let id = self.push_node(AigNode::Latch { init }, index);
        self.latches.push(id);
        let next = self.push_node(
            AigNode::LatchNext {
                latch: index,
                fanin: !self.get_const_true(),
            },
            index,
        );
        self.latch_nexts.push(next);
        AigEdge::new(id, false)
    }

    /// Replaces the next-state function of a latch.
    pub fn set_latch_next(&mut self, latch: usize, next: AigEdge) -> Result<()> {
        if latch >= self.latch_nexts.len() {
            return Err(AigError::NoSuchLatch(latch));
        }
        if next.node >= self.nodes.len() {
            return Err(AigError::NodeDoesNotExist(next.node));
        }
        self.link_latch_next(latch, next);
        Ok(())
    }

    /// Unchecked version of [`Aig::set_latch_next`], for copies built within the crate.
    fn link_latch_next(&mut self, latch: usize, next: AigEdge) {
        let id = self.latch_nexts[latch];
        let old = self.nodes[id].fanin0();
        self.refs[old.node] -= 1;
        self.refs[next.node] += 1;
        self.nodes[id] = AigNode::LatchNext { latch, fanin: next };
    }

    /// Mark an existing signal as a primary output.
    pub fn add_output(&mut self, fanin: AigEdge) -> NodeId {
        assert!(fanin.node < self.nodes.len(), "unknown node {}", fanin.node);
        let index = self.outputs.len();
        let id = self.push_node(AigNode::Output { fanin }, index);
        self.outputs.push(id);
        id
    }

    /// Create a new and gate (or retrieve it if the exact same node already exists).
    ///
    /// Trivial cases are simplified: constants, `x & x` and `x & !x` do not create any node.
    pub fn and(&mut self, fanin0: AigEdge, fanin1: AigEdge) -> AigEdge {
        assert!(fanin0.node < self.nodes.len(), "unknown node {}", fanin0.node);
        assert!(fanin1.node < self.nodes.len(), "unknown node {}", fanin1.node);
        debug_assert!(!self.nodes[fanin0.node].is_co() && !self.nodes[fanin1.node].is_co());

        if fanin0.is_cst_false() || fanin1.is_cst_false() || fanin0.is_complement_of(&fanin1) {
            return !self.get_const_true();
        }
        if fanin0.is_cst_true() || fanin0 == fanin1 {
            return fanin1;
        }
        if fanin1.is_cst_true() {
            return fanin0;
        }

        // Canonical order: larger id first, as in the AIGER format
        let (fanin0, fanin1) = if fanin0 > fanin1 {
            (fanin0, fanin1)
        } else {
            (fanin1, fanin0)
        };
        if let Some(&id) = self.strash.get(&(fanin0, fanin1)) {
            return AigEdge::new(id, false);
        }
        let id = self.push_node(AigNode::And { fanin0, fanin1 }, 0);
        self.strash.insert((fanin0, fanin1), id);
        AigEdge::new(id, false)
    }

    /// Checked version of [`Aig::and`], for fanins coming from outside the AIG.
    pub fn try_and(&mut self, fanin0: AigEdge, fanin1: AigEdge) -> Result<AigEdge> {
        for fanin in [fanin0, fanin1] {
            match self.nodes.get(fanin.node) {
                None => return Err(AigError::NodeDoesNotExist(fanin.node)),
                Some(node) if node.is_co() => {
                    return Err(AigError::InvalidState(format!(
                        "node {} is a combinational output and cannot drive a gate",
                        fanin.node
                    )));
                }
                _ => (),
            }
        }
        Ok(self.and(fanin0, fanin1))
    }

    pub fn or(&mut self, a: AigEdge, b: AigEdge) -> AigEdge {
        !self.and(!a, !b)
    }

    pub fn xor(&mut self, a: AigEdge, b: AigEdge) -> AigEdge {
        let x = self.and(a, !b);
        let y = self.and(!a, b);
        self.or(x, y)
    }

    /// `ctrl ? then : els`.
    pub fn mux(&mut self, ctrl: AigEdge, then: AigEdge, els: AigEdge) -> AigEdge {
        let x = self.and(ctrl, then);
        let y = self.and(!ctrl, els);
        self.or(x, y)
    }

    /// Primary inputs.
    pub fn get_inputs(&self) -> &[NodeId] {
        &self.inputs
    }

    /// Latch outputs.
    pub fn get_latches(&self) -> &[NodeId] {
        &self.latches
    }

    /// Latch next-state nodes.
    pub fn get_latch_nexts(&self) -> &[NodeId] {
        &self.latch_nexts
    }

    /// Primary outputs.
    pub fn get_outputs(&self) -> &[NodeId] {
        &self.outputs
    }

    /// Combinational inputs: primary inputs, then latch outputs.
    pub fn get_cis(&self) -> Vec<NodeId> {
        self.inputs.iter().chain(&self.latches).copied().collect()
    }

    /// Combinational outputs: primary outputs, then latch next-state nodes.
    pub fn get_cos(&self) -> Vec<NodeId> {
        self.outputs.iter().chain(&self.latch_nexts).copied().collect()
    }

    pub fn n_inputs(&self) -> usize {
        self.inputs.len()
    }

    pub fn n_latches(&self) -> usize {
        self.latches.len()
    }

    pub fn n_outputs(&self) -> usize {
        self.outputs.len()
    }

    pub fn n_ands(&self) -> usize {
        self.strash.len()
    }

    pub fn is_sequential(&self) -> bool {
        !self.latches.is_empty()
    }

    /// Initial value of latch `latch`.
    pub fn get_latch_init(&self, latch: usize) -> Option<bool> {
        match self.nodes[self.latches[latch]] {
            AigNode::Latch { init } => init,
            _ => unreachable!("latch list refers to a non-latch node"),
        }
    }

    /// Next-state function of latch `latch`.
    pub fn get_latch_next(&self, latch: usize) -> AigEdge {
        self.nodes[self.latch_nexts[latch]].fanin0()
    }

    /// Driver of primary output `output`.
    pub fn get_output_driver(&self, output: usize) -> AigEdge {
        self.nodes[self.outputs[output]].fanin0()
    }

    /// Ids of and gates, in topological order.
    pub fn and_nodes(&self) -> impl DoubleEndedIterator<Item = NodeId> + '_ {
        (0..self.nodes.len()).filter(|&id| self.nodes[id].is_and())
    }

    /// Returns true if the node is the root of a MUX (or XOR) structure,
    /// ie `and(!and(c, x), !and(!c, y))`.
    pub fn is_mux_type(&self, id: NodeId) -> bool {
        self.recognize_mux(id).is_some()
    }

    /// Recognizes a MUX (or XOR) rooted at node `id`.
    ///
    /// Returns `(ctrl, then, else)` such that the node computes `ctrl ? then : else`,
    /// with `ctrl` always regular.
    pub fn recognize_mux(&self, id: NodeId) -> Option<(AigEdge, AigEdge, AigEdge)> {
        let AigNode::And { fanin0, fanin1 } = self.nodes[id] else {
            return None;
        };
        if !fanin0.complement || !fanin1.complement {
            return None;
        }
        let (AigNode::And { fanin0: p, fanin1: q }, AigNode::And { fanin0: r, fanin1: s }) =
            (&self.nodes[fanin0.node], &self.nodes[fanin1.node])
        else {
            return None;
        };
        // node = !(c & x) & !(!c & y) = c ? !x : !y
        let (c, x, y) = if p.is_complement_of(r) {
            (*p, *q, *s)
        } else if p.is_complement_of(s) {
            (*p, *q, *r)
        } else if q.is_complement_of(r) {
            (*q, *p, *s)
        } else if q.is_complement_of(s) {
            (*q, *p, *r)
        } else {
            return None;
        };
        if c.complement {
            Some((c.regular(), !y, !x))
        } else {
            Some((c, !x, !y))
        }
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use test_log::test;

    #[test]
    fn and_strash_test() {
        let mut aig = Aig::new();
        let a = aig.add_input();
        let b = aig.add_input();
        let ab = aig.and(a, b);
        assert_eq!(aig.and(b, a), ab);
        assert_eq!(aig.n_ands(), 1);
        assert_eq!(aig.get_refs(a.get_node_id()), 1);
        assert_eq!(aig.get_refs(b.get_node_id()), 1);
        let nab = aig.and(!a, b);
        assert_ne!(nab, ab);
        assert_eq!(aig.n_ands(), 2);
        assert_eq!(aig.get_refs(b.get_node_id()), 2);
    }

    #[test]
    fn and_simplify_test() {
        let mut aig = Aig::new();
        let t = aig.get_const_true();
        let a = aig.add_input();
        assert_eq!(aig.and(a, t), a);
        assert_eq!(aig.and(t, !a), !a);
        assert_eq!(aig.and(a, !t), !t);
        assert_eq!(aig.and(a, a), a);
        assert_eq!(aig.and(!a, a), !t);
        assert_eq!(aig.n_ands(), 0);
    }

    #[test]
    fn try_and_test() {
        let mut aig = Aig::new();
        let a = aig.add_input();
        assert!(aig.try_and(a, AigEdge::new(42, false)).is_err());
        let o = aig.add_output(a);
        assert!(aig.try_and(a, AigEdge::new(o, false)).is_err());
        let b = aig.add_input();
        assert!(aig.try_and(a, b).is_ok());
    }

    #[test]
    fn latch_test() {
        let mut aig = Aig::new();
        let i = aig.add_input();
        let l = aig.add_latch(Some(false));
        assert_eq!(aig.get_latch_next(0), !aig.get_const_true());
        let n = aig.xor(i, l);
        aig.set_latch_next(0, n).unwrap();
        assert_eq!(aig.get_latch_next(0), n);
        assert!(matches!(
            aig.set_latch_next(1, n),
            Err(AigError::NoSuchLatch(1))
        ));
        let dangling = AigEdge::new(1000, false);
        assert!(matches!(
            aig.set_latch_next(0, dangling),
            Err(AigError::NodeDoesNotExist(1000))
        ));
        assert_eq!(aig.get_latch_next(0), n);
        assert_eq!(aig.get_latch_init(0), Some(false));
        assert_eq!(aig.get_cis(), vec![i.get_node_id(), l.get_node_id()]);
        assert_eq!(aig.get_cos(), aig.get_latch_nexts().to_vec());
        assert_eq!(aig.get_refs(0), 0);
        assert_eq!(aig.get_refs(n.get_node_id()), 1);
        assert!(aig.is_sequential());
    }

    #[test]
    fn recognize_mux_test() {
        let mut aig = Aig::new();
        let c = aig.add_input();
        let t = aig.add_input();
        let e = aig.add_input();
        let m = aig.mux(c, t, e);
        // mux returns a complemented edge (or of two ands), the node itself is !mux
        assert!(m.get_complement());
        let (ctrl, then, els) = aig.recognize_mux(m.get_node_id()).unwrap();
        assert_eq!(ctrl, c);
        assert_eq!((then, els), (!t, !e));

        let x = aig.xor(t, e);
        assert!(aig.is_mux_type(x.get_node_id()));
        let (ctrl, then, els) = aig.recognize_mux(x.get_node_id()).unwrap();
        assert!(!ctrl.get_complement());
        assert!(then.is_complement_of(&els));

        let ab = aig.and(t, e);
        assert!(!aig.is_mux_type(ab.get_node_id()));
    }
}
