//! Provides a DFS visitor to allow simple AIG traversal, and cone/support collection built on top of it.
//!
//! See [`Dfs`] for details.
//!
//! [`Dfs`]: Dfs

use std::collections::HashSet;

use crate::{Aig, AigEdge, NodeId};

/// A simple DFS visitor.
///
/// Nodes are yielded in preorder. You can:
/// - start a DFS from a node using [`from_node`]
/// - or visit the combinational fanin of all outputs using [`from_outputs`].
///
/// The DFS stops at combinational inputs: latch outputs are not followed to their next-state function.
///
/// [`from_node`]: Dfs::from_node
/// [`from_outputs`]: Dfs::from_outputs
///
/// Example:
///
/// ```rust
/// use aigsat::{Aig, dfs::Dfs};
/// let mut aig = Aig::new();
/// let a = aig.add_input();
/// aig.add_output(a);
/// let mut dfs = Dfs::from_outputs(&aig);
/// let mut count = 0;
/// while let Some(_id) = dfs.next(&aig) {
///     count += 1;
/// }
/// assert_eq!(count, 2); // the output node and the input
/// ```
///
/// Inspired by [petgraph DFS](https://docs.rs/petgraph/latest/petgraph/visit/struct.Dfs.html).
pub struct Dfs {
    /// Must maintain the following invariant:
    /// - all nodes on the stack have not been visited yet
    /// - their `seen` flag is set to true to avoid adding them one more time to the stack.
    stack: Vec<NodeId>,
    seen: HashSet<NodeId>,
}

impl Dfs {
    /// Create a DFS from the initial start node.
    /// You will only browse the fanin of this node.
    pub fn from_node(start: NodeId) -> Self {
        Dfs::from_nodes([start])
    }

    /// Create a DFS exploring the fanin of all given nodes.
    pub fn from_nodes(starts: impl IntoIterator<Item = NodeId>) -> Self {
        let mut dfs = Dfs {
            stack: Vec::new(),
            seen: HashSet::new(),
        };
        // Reversed so that the first start is explored first
        let starts: Vec<NodeId> = starts.into_iter().collect();
        for id in starts.into_iter().rev() {
            if dfs.seen.insert(id) {
                dfs.stack.push(id);
            }
        }
        dfs
    }

    /// Create a DFS from the combinational outputs of the given AIG.
    pub fn from_outputs(aig: &Aig) -> Self {
        Dfs::from_nodes(aig.get_cos())
    }

    /// Yield the next node of the DFS, or None if it is done.
    pub fn next(&mut self, aig: &Aig) -> Option<NodeId> {
        let id = self.stack.pop()?;
        for child in aig.node(id).get_fanins() {
            let child_id = child.get_node_id();
            if self.seen.insert(child_id) {
                self.stack.push(child_id);
            }
        }
        Some(id)
    }
}

impl Aig {
    /// Returns the and gates in the transitive fanin of `roots` (stopping at combinational inputs),
    /// in topological order.
    pub fn collect_cone(&self, roots: &[AigEdge]) -> Vec<NodeId> {
        let mut dfs = Dfs::from_nodes(roots.iter().map(|r| r.get_node_id()));
        let mut cone = Vec::new();
        while let Some(id) = dfs.next(self) {
            if self.node(id).is_and() {
                cone.push(id);
            }
        }
        cone.sort_unstable();
        cone
    }

    /// Returns the combinational inputs `roots` depend on, in ascending id order.
    pub fn collect_support(&self, roots: &[AigEdge]) -> Vec<NodeId> {
        let mut dfs = Dfs::from_nodes(roots.iter().map(|r| r.get_node_id()));
        let mut support = Vec::new();
        while let Some(id) = dfs.next(self) {
            if self.node(id).is_ci() {
                support.push(id);
            }
        }
        support.sort_unstable();
        support
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use test_log::test;

    #[test]
    fn from_node_test() {
        let mut aig = Aig::new();
        let a = aig.add_input();
        let b = aig.add_input();
        let ab = aig.and(a, b);

        let mut dfs = Dfs::from_node(ab.get_node_id());
        assert_eq!(dfs.next(&aig), Some(ab.get_node_id())); // first node is known
        let mut rest = vec![dfs.next(&aig).unwrap(), dfs.next(&aig).unwrap()];
        rest.sort();
        assert_eq!(rest, vec![a.get_node_id(), b.get_node_id()]);
        // Now there shouldn't be anything
        assert!(dfs.next(&aig).is_none());
        assert!(dfs.next(&aig).is_none());
    }

    #[test]
    fn repeated_node() {
        let mut aig = Aig::new();
        let a = aig.add_input();
        let b = aig.add_input();
        let x = aig.and(a, b);
        let y = aig.and(!a, b);
        let z = aig.and(x, !y);
        let mut dfs = Dfs::from_node(z.get_node_id());
        let mut count = 0;
        while dfs.next(&aig).is_some() {
            count += 1;
        }
        assert_eq!(count, 5);
    }

    #[test]
    fn cone_and_support_test() {
        let mut aig = Aig::new();
        let a = aig.add_input();
        let b = aig.add_input();
        let c = aig.add_input();
        let l = aig.add_latch(Some(false));
        let ab = aig.and(a, b);
        let abl = aig.and(ab, l);
        let bc = aig.and(b, c);
        aig.set_latch_next(0, bc).unwrap();
        aig.add_output(abl);

        assert_eq!(
            aig.collect_cone(&[abl]),
            vec![ab.get_node_id(), abl.get_node_id()]
        );
        assert_eq!(
            aig.collect_support(&[abl]),
            vec![a.get_node_id(), b.get_node_id(), l.get_node_id()]
        );
        // Latch outputs are not crossed
        assert_eq!(aig.collect_support(&[!l]), vec![l.get_node_id()]);
        assert_eq!(aig.collect_cone(&[bc]), vec![bc.get_node_id()]);
    }
}
