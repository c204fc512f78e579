pub mod abs;
pub mod aig;
pub mod cex;
pub mod cnf;
pub mod sat;

// Re-exporting symbols and modules.
pub use aig::dfs;
pub use aig::{Aig, AigEdge, AigError, AigNode, NodeId, Result};
