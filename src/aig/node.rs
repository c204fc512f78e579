use super::{AigEdge, FaninId};

/// A node id.
///
/// Ids are indices into the node arena of the owning [`Aig`](super::Aig).
/// The constant node [`AigNode::True`] has id 0 by convention.
pub type NodeId = usize;

/// An AIG node.
///
/// Primary inputs and latch outputs are the combinational inputs of the AIG,
/// primary outputs and latch next-state nodes are its combinational outputs.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AigNode {
    /// The constant high/true signal.
    True,
    /// A primary input.
    Input,
    /// The output of a latch (for sequential circuits). `None` means the initial value is free.
    Latch { init: Option<bool> },
    /// An AND gate with two fanins.
    And { fanin0: AigEdge, fanin1: AigEdge },
    /// A primary output.
    Output { fanin: AigEdge },
    /// The next-state input of latch number `latch`.
    LatchNext { latch: usize, fanin: AigEdge },
}

impl AigNode {
    pub fn is_const(&self) -> bool {
        matches!(self, AigNode::True)
    }

    pub fn is_input(&self) -> bool {
        matches!(self, AigNode::Input)
    }

    pub fn is_latch(&self) -> bool {
        matches!(self, AigNode::Latch { .. })
    }

    pub fn is_and(&self) -> bool {
        matches!(self, AigNode::And { .. })
    }

    pub fn is_output(&self) -> bool {
        matches!(self, AigNode::Output { .. })
    }

    pub fn is_latch_next(&self) -> bool {
        matches!(self, AigNode::LatchNext { .. })
    }

    /// Primary input or latch output.
    pub fn is_ci(&self) -> bool {
        self.is_input() || self.is_latch()
    }

    /// Primary output or latch next-state.
    pub fn is_co(&self) -> bool {
        self.is_output() || self.is_latch_next()
    }

    pub fn get_fanins(&self) -> Vec<AigEdge> {
        match self {
            AigNode::Output { fanin } | AigNode::LatchNext { fanin, .. } => vec![*fanin],
            AigNode::And { fanin0, fanin1 } => vec![*fanin0, *fanin1],
            _ => vec![],
        }
    }

    /// Returns the requested fanin, if the node has one.
    pub fn get_fanin(&self, fanin_id: FaninId) -> Option<AigEdge> {
        match (self, fanin_id) {
            (AigNode::Output { fanin }, FaninId::Fanin0) => Some(*fanin),
            (AigNode::LatchNext { fanin, .. }, FaninId::Fanin0) => Some(*fanin),
            (AigNode::And { fanin0, .. }, FaninId::Fanin0) => Some(*fanin0),
            (AigNode::And { fanin1, .. }, FaninId::Fanin1) => Some(*fanin1),
            _ => None,
        }
    }

    pub fn fanin0(&self) -> AigEdge {
        self.get_fanin(FaninId::Fanin0)
            .expect("node has no fanin0 (constant or input)")
    }

    pub fn fanin1(&self) -> AigEdge {
        self.get_fanin(FaninId::Fanin1)
            .expect("node has no fanin1 (not an and gate)")
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use test_log::test;

    #[test]
    fn fanins_test() {
        let a = AigEdge::new(1, false);
        let b = AigEdge::new(2, true);
        let and = AigNode::And {
            fanin0: a,
            fanin1: b,
        };
        assert_eq!(and.get_fanins(), vec![a, b]);
        assert_eq!(and.fanin1(), b);
        assert!(!and.is_ci() && !and.is_co());

        let out = AigNode::Output { fanin: b };
        assert_eq!(out.get_fanins(), vec![b]);
        assert!(out.is_co());
        assert!(out.get_fanin(FaninId::Fanin1).is_none());

        let next = AigNode::LatchNext { latch: 0, fanin: a };
        assert_eq!(next.fanin0(), a);
        assert!(next.is_co());

        assert!(AigNode::True.get_fanins().is_empty());
        assert!(AigNode::Input.is_ci());
        assert!(AigNode::Latch { init: None }.is_ci());
    }

    #[test]
    #[should_panic]
    fn input_has_no_fanin() {
        let _ = AigNode::Input.fanin0();
    }
}
