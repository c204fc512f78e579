//! Generation-stamped "visited" marks.
//!
//! Starting a new traversal is O(1): the generation counter is bumped and every node
//! whose stamp differs from the current generation counts as unvisited.

use crate::NodeId;

#[derive(Debug, Clone, Default)]
pub struct TravIds {
    stamps: Vec<u32>,
    current: u32,
}

impl TravIds {
    pub fn new(n_nodes: usize) -> Self {
        TravIds {
            stamps: vec![0; n_nodes],
            current: 0,
        }
    }

    /// Starts a new traversal, every node becomes unvisited.
    pub fn increment(&mut self) {
        if self.current == u32::MAX {
            self.stamps.fill(0);
            self.current = 0;
        }
        self.current += 1;
    }

    /// Marks the node as visited in the current traversal.
    pub fn set_current(&mut self, id: NodeId) {
        if id >= self.stamps.len() {
            self.stamps.resize(id + 1, 0);
        }
        self.stamps[id] = self.current;
    }

    pub fn is_current(&self, id: NodeId) -> bool {
        self.current != 0 && self.stamps.get(id) == Some(&self.current)
    }

    /// Marks the node and returns true if it was not visited yet.
    pub fn visit(&mut self, id: NodeId) -> bool {
        if self.is_current(id) {
            false
        } else {
            self.set_current(id);
            true
        }
    }
}
