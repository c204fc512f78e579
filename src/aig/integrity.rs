use crate::{Aig, AigEdge, AigError, AigNode, NodeId, Result};

impl Aig {
    /// Checking if the AIG structure is correct:
    /// - only node 0 is the constant node
    /// - and gates only refer to nodes created before them, and are strashed
    /// - combinational outputs refer to existing combinational signals
    /// - input, latch and output lists agree with the nodes
    /// - fanout counts are up to date.
    ///
    /// This function was written for debug purposes, as the library is supposed to maintain
    /// integrity of the AIG at any moment.
    pub fn check_integrity(&self) -> Result<()> {
        let mut refs = vec![0u32; self.nodes.len()];

        for (id, node) in self.nodes.iter().enumerate() {
            self.check_node_integrity(id, node)?;
            for fanin in node.get_fanins() {
                refs[fanin.node] += 1;
            }
        }

        if refs != self.refs {
            return Err(AigError::InvalidState("incoherent fanout counts".to_string()));
        }

        self.check_list(&self.inputs, AigNode::is_input, "input")?;
        self.check_list(&self.latches, AigNode::is_latch, "latch")?;
        self.check_list(&self.latch_nexts, AigNode::is_latch_next, "latch next")?;
        self.check_list(&self.outputs, AigNode::is_output, "output")?;

        for (k, &id) in self.latch_nexts.iter().enumerate() {
            if let AigNode::LatchNext { latch, .. } = self.nodes[id] {
                if latch != k {
                    return Err(AigError::InvalidState(format!(
                        "next-state node {} belongs to latch {} but is registered for latch {}",
                        id, latch, k
                    )));
                }
            }
        }

        Ok(())
    }

    fn check_list(&self, list: &[NodeId], kind: fn(&AigNode) -> bool, what: &str) -> Result<()> {
        for (k, &id) in list.iter().enumerate() {
            let node = self.get_node(id).ok_or(AigError::NodeDoesNotExist(id))?;
            if !kind(node) || self.io_index[id] != k {
                return Err(AigError::InvalidState(format!(
                    "{} {} refers to node {} which is not the expected {}",
                    what, k, id, what
                )));
            }
        }
        let count = self.nodes.iter().filter(|n| kind(n)).count();
        if count != list.len() {
            return Err(AigError::InvalidState(format!(
                "{} nodes of kind {} but {} registered",
                count,
                what,
                list.len()
            )));
        }
        Ok(())
    }

    /// Check the integrity for an individual node.
    fn check_node_integrity(&self, id: NodeId, node: &AigNode) -> Result<()> {
        match node {
            AigNode::True => {
                if id != 0 {
                    return Err(AigError::InvalidState("invalid constant node".to_string()));
                }
            }
            AigNode::Input | AigNode::Latch { .. } => {
                if id == 0 {
                    return Err(AigError::InvalidState(
                        "id=0 is for the constant node only".to_string(),
                    ));
                }
            }
            AigNode::And { fanin0, fanin1 } => {
                for fanin in [fanin0, fanin1] {
                    if fanin.node >= id {
                        return Err(AigError::InvalidState(format!(
                            "id of parent {} should be strictly larger than its fanin {}",
                            id, fanin.node
                        )));
                    }
                    self.check_edge_integrity(fanin)?;
                }
                if self.strash.get(&(*fanin0, *fanin1)) != Some(&id) {
                    return Err(AigError::InvalidState(format!(
                        "and gate {} is not structurally hashed",
                        id
                    )));
                }
            }
            AigNode::Output { fanin } | AigNode::LatchNext { fanin, .. } => {
                self.check_edge_integrity(fanin)?;
            }
        }
        Ok(())
    }

    fn check_edge_integrity(&self, fanin: &AigEdge) -> Result<()> {
        let node = self
            .get_node(fanin.node)
            .ok_or(AigError::NodeDoesNotExist(fanin.node))?;
        if node.is_co() {
            return Err(AigError::InvalidState(format!(
                "edge pointing at combinational output {}",
                fanin.node
            )));
        }
        Ok(())
    }
}

#[cfg(test)]
mod test {
    use crate::{Aig, AigEdge, AigNode};
    use test_log::test;

    #[test]
    fn integrity_ok_test() {
        let mut aig = Aig::new();
        let a = aig.add_input();
        let l = aig.add_latch(None);
        let x = aig.xor(a, l);
        aig.set_latch_next(0, x).unwrap();
        aig.add_output(!x);
        assert!(aig.check_integrity().is_ok());
    }

    #[test]
    fn integrity_broken_test() {
        let mut aig = Aig::new();
        let a = aig.add_input();
        let b = aig.add_input();
        let ab = aig.and(a, b);
        aig.add_output(ab);

        // Forward reference
        let mut broken = aig.clone();
        broken.nodes[ab.get_node_id()] = AigNode::And {
            fanin0: AigEdge::new(ab.get_node_id() + 1, false),
            fanin1: a,
        };
        assert!(broken.check_integrity().is_err());

        // Stale fanout counts
        let mut broken = aig.clone();
        broken.refs[a.get_node_id()] += 1;
        assert!(broken.check_integrity().is_err());

        // Unregistered input
        let mut broken = aig.clone();
        broken.inputs.pop();
        assert!(broken.check_integrity().is_err());
    }
}
