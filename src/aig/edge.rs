//! An [`AigEdge`] points at an [`AigNode`] and can be complemented (indicates the presence of a NOT gate).
//!
//! [`AigNode`]: crate::AigNode

use std::ops::Not;

use crate::NodeId;

/// Unambiguous fanin selector.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FaninId {
    Fanin0,
    Fanin1,
}

impl From<bool> for FaninId {
    fn from(value: bool) -> Self {
        if value {
            FaninId::Fanin1
        } else {
            FaninId::Fanin0
        }
    }
}

impl From<usize> for FaninId {
    fn from(value: usize) -> Self {
        if value == 0 {
            FaninId::Fanin0
        } else if value == 1 {
            FaninId::Fanin1
        } else {
            panic!("could not create FaninId from value={}", value)
        }
    }
}

/// A directed edge representing a fanin for AIG nodes.
///
/// The edge only stores the id of the node it points at, the node itself lives in the
/// arena of the owning [`Aig`]. The edge can carry an inverter according to the value of `complement`.
///
/// For example:
///
/// ```rust
/// use aigsat::{Aig, AigEdge};
/// let aig = Aig::new();
/// let edge_true = aig.get_const_true();
/// let edge_false = AigEdge::new(0, true);
/// assert_eq!(edge_false, !edge_true);
/// assert!(edge_false.is_cst_false());
/// ```
///
/// [`Aig`]: crate::Aig
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct AigEdge {
    /// The node the edge is refering to.
    pub(crate) node: NodeId,
    /// Set to true if signal should be inverted.
    pub(crate) complement: bool,
}

impl Not for AigEdge {
    type Output = Self;

    fn not(mut self) -> Self::Output {
        self.complement = !self.complement;
        self
    }
}

impl From<&AigEdge> for (NodeId, bool) {
    fn from(edge: &AigEdge) -> (NodeId, bool) {
        (edge.node, edge.complement)
    }
}

impl AigEdge {
    pub fn new(node: NodeId, complement: bool) -> Self {
        AigEdge { node, complement }
    }

    pub fn get_node_id(&self) -> NodeId {
        self.node
    }

    pub fn get_complement(&self) -> bool {
        self.complement
    }

    /// The same edge without its inverter.
    pub fn regular(self) -> Self {
        AigEdge::new(self.node, false)
    }

    /// Complements the edge iff `c` is set.
    pub fn not_if(self, c: bool) -> Self {
        AigEdge::new(self.node, self.complement ^ c)
    }

    /// The constant node is the logic one, so a regular edge to node 0 is true.
    pub fn is_cst_true(&self) -> bool {
        self.node == 0 && !self.complement
    }

    pub fn is_cst_false(&self) -> bool {
        self.node == 0 && self.complement
    }

    pub fn is_const(&self) -> bool {
        self.node == 0
    }

    pub fn is_complement_of(&self, other: &AigEdge) -> bool {
        self.node == other.node && self.complement ^ other.complement
    }

    /// Packs the edge into an AIGER-like integer literal (`2 * id + complement`).
    pub fn to_packed(&self) -> usize {
        2 * self.node + self.complement as usize
    }

    pub fn from_packed(lit: usize) -> Self {
        AigEdge::new(lit >> 1, lit & 1 != 0)
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use test_log::test;

    #[test]
    fn edge_not_test() {
        let e = AigEdge::new(3, false);
        assert_eq!(!e, AigEdge::new(3, true));
        assert_eq!(!!e, e);
        assert!(e.is_complement_of(&!e));
        assert!(!e.is_complement_of(&e));
        assert_eq!((!e).regular(), e);
        assert_eq!(e.not_if(false), e);
        assert_eq!(e.not_if(true), !e);
    }

    #[test]
    fn edge_packed_test() {
        let e = AigEdge::new(21, true);
        assert_eq!(e.to_packed(), 43);
        assert_eq!(AigEdge::from_packed(43), e);
        assert!(AigEdge::from_packed(0).is_cst_true());
        assert!(AigEdge::from_packed(1).is_cst_false());
    }

    #[test]
    #[should_panic]
    fn invalid_fanin_id() {
        let _ = FaninId::from(2usize);
    }
}
