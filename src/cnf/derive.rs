//! Clause derivation for marked nodes, and for a whole marked AIG.

use log::debug;

use crate::{
    Aig, AigEdge, NodeId,
    aig::travid::TravIds,
    cnf::{
        Cnf,
        cut::{MAX_TRUTH_LEAVES, collect_super, collect_volume, derive_truth},
        isop::{CubeLit, isop},
        lit::{Lit, Var},
    },
};

/// Clauses of a single node over local variables: [`NodeCnf::ROOT`] is the node itself,
/// local variable `i + 1` is `leaves[i]`.
///
/// The same template is instantiated for every copy of the node (one per timeframe
/// in the abstraction engine).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NodeCnf {
    pub root: NodeId,
    pub leaves: Vec<NodeId>,
    /// And gates between the leaves and the root, in topological order.
    pub volume: Vec<NodeId>,
    lits: Vec<Lit>,
    offsets: Vec<usize>,
}

impl NodeCnf {
    pub const ROOT: Var = Var(0);

    fn new(root: NodeId, leaves: Vec<NodeId>, volume: Vec<NodeId>) -> Self {
        NodeCnf {
            root,
            leaves,
            volume,
            lits: Vec::new(),
            offsets: vec![0],
        }
    }

    fn push_clause(&mut self, clause: impl IntoIterator<Item = Lit>) {
        self.lits.extend(clause);
        self.offsets.push(self.lits.len());
    }

    fn leaf_var(&self, node: NodeId) -> Var {
        let pos = self
            .leaves
            .iter()
            .position(|&l| l == node)
            .unwrap_or_else(|| panic!("node {} is not a leaf of {}", node, self.root));
        Var(pos as u32 + 1)
    }

    /// Plain Tseitin encoding of an and gate over its two fanins.
    pub fn tseitin(aig: &Aig, root: NodeId) -> Self {
        let node = aig.node(root);
        assert!(node.is_and(), "node {} is not an and gate", root);
        let (f0, f1) = (node.fanin0(), node.fanin1());
        let mut cnf = NodeCnf::new(root, vec![f0.get_node_id(), f1.get_node_id()], vec![root]);
        let a = Var(1).lit(f0.get_complement());
        let b = Var(2).lit(f1.get_complement());
        let out = NodeCnf::ROOT;
        cnf.push_clause([out.pos(), !a, !b]);
        cnf.push_clause([out.neg(), a]);
        cnf.push_clause([out.neg(), b]);
        cnf
    }

    /// Derives the clauses of a marked and gate from its cut in the marking `marks`.
    ///
    /// Cuts of at most six leaves are encoded exactly from the irredundant covers of the node
    /// function and of its complement. Larger cuts are multi-input ands and get the generalized
    /// Tseitin encoding.
    pub fn derive(aig: &Aig, marks: &[bool], trav: &mut TravIds, root: NodeId) -> Self {
        let leaves = collect_super(aig, marks, root, false);
        let volume = collect_volume(aig, trav, root, &leaves);

        if leaves.len() > MAX_TRUTH_LEAVES {
            let inputs = collect_super(aig, marks, root, true);
            let mut nodes: Vec<NodeId> = Vec::with_capacity(inputs.len());
            for e in &inputs {
                if !nodes.contains(&e.get_node_id()) {
                    nodes.push(e.get_node_id());
                }
            }
            let mut cnf = NodeCnf::new(root, nodes, volume);
            let out = NodeCnf::ROOT;
            let big: Vec<Lit> = std::iter::once(out.pos())
                .chain(inputs.iter().map(|e| cnf.leaf_var(e.get_node_id()).lit(!e.get_complement())))
                .collect();
            cnf.push_clause(big);
            for e in &inputs {
                let leaf = cnf.leaf_var(e.get_node_id()).lit(e.get_complement());
                cnf.push_clause([out.neg(), leaf]);
            }
            return cnf;
        }

        let truth = derive_truth(aig, &leaves, &volume);
        let n = leaves.len();
        let mut cnf = NodeCnf::new(root, leaves.iter().map(AigEdge::get_node_id).collect(), volume);
        let out = NodeCnf::ROOT;
        if truth == 0 || truth == !0 {
            cnf.push_clause([out.lit(truth == 0)]);
            return cnf;
        }
        for (table, out_lit) in [(truth, out.pos()), (!truth, out.neg())] {
            for cube in isop(table, n) {
                // The cube implies the output literal
                let clause: Vec<Lit> = std::iter::once(out_lit)
                    .chain((0..n).filter_map(|v| {
                        cube.lit(v)
                            .map(|l| Var(v as u32 + 1).lit(l == CubeLit::Positive))
                    }))
                    .collect();
                cnf.push_clause(clause);
            }
        }
        cnf
    }

    pub fn n_clauses(&self) -> usize {
        self.offsets.len() - 1
    }

    /// Clause `i` over local variables.
    pub fn clause(&self, i: usize) -> &[Lit] {
        &self.lits[self.offsets[i]..self.offsets[i + 1]]
    }

    pub fn clauses(&self) -> impl Iterator<Item = &[Lit]> + '_ {
        (0..self.n_clauses()).map(|i| self.clause(i))
    }

    /// Instantiates the template: local variable `v` becomes `vars[v]`.
    pub fn instantiate<'a>(&'a self, vars: &'a [Var]) -> impl Iterator<Item = Vec<Lit>> + 'a {
        debug_assert_eq!(vars.len(), self.leaves.len() + 1);
        self.clauses().map(move |clause| {
            clause
                .iter()
                .map(|l| vars[l.var().index()].lit(l.is_negated()))
                .collect()
        })
    }
}

fn var_of(var_of_node: &[Option<Var>], id: NodeId) -> Var {
    var_of_node[id].unwrap_or_else(|| panic!("node {} has no CNF variable", id))
}

/// Generates the clauses of a marked AIG.
///
/// Variable 0 is reserved. When `n_outputs > 0`, the first variables go to the designated outputs:
/// all primary outputs of a combinational AIG, or all latch next-state nodes of a sequential one.
/// Then come the marked and gates from outputs to inputs, the combinational inputs and finally
/// the constant node.
///
/// Designated outputs are tied to their driver by two clauses. The other combinational outputs
/// get a unit clause asserting their driver.
pub fn derive_clauses(aig: &Aig, marks: &[bool], n_outputs: usize) -> Cnf {
    let designated: &[NodeId] = if n_outputs == 0 {
        &[]
    } else if aig.is_sequential() {
        assert_eq!(n_outputs, aig.n_latches(), "sequential AIG designates its latch inputs");
        aig.get_latch_nexts()
    } else {
        assert_eq!(n_outputs, aig.n_outputs(), "combinational AIG designates its outputs");
        aig.get_outputs()
    };

    let mut var_of_node: Vec<Option<Var>> = vec![None; aig.n_nodes()];
    let mut n_vars = 1u32;
    let mut assign = |id: NodeId| {
        var_of_node[id] = Some(Var(n_vars));
        n_vars += 1;
    };
    for &id in designated {
        assign(id);
    }
    let ands: Vec<NodeId> = aig.and_nodes().rev().filter(|&id| marks[id]).collect();
    for &id in &ands {
        assign(id);
    }
    for ci in aig.get_cis() {
        assign(ci);
    }
    assign(0);

    let mut cnf = Cnf {
        n_vars: n_vars as usize,
        var_of_node,
        lits: Vec::new(),
        offsets: vec![0],
        n_outputs,
    };

    let mut trav = TravIds::new(aig.n_nodes());
    let mut n_wide = 0;
    for &id in &ands {
        let node_cnf = NodeCnf::derive(aig, marks, &mut trav, id);
        if node_cnf.leaves.len() > MAX_TRUTH_LEAVES {
            n_wide += 1;
        }
        let vars: Vec<Var> = std::iter::once(id)
            .chain(node_cnf.leaves.iter().copied())
            .map(|n| var_of(&cnf.var_of_node, n))
            .collect();
        for clause in node_cnf.instantiate(&vars) {
            cnf.push_clause(&clause);
        }
    }

    let cos = aig.get_cos();
    let n_free = cos.len() - designated.len();
    for (k, &co) in cos.iter().enumerate() {
        let driver_edge = aig.node(co).fanin0();
        let driver = var_of(&cnf.var_of_node, driver_edge.get_node_id())
            .lit(driver_edge.get_complement());
        if k < n_free {
            cnf.push_clause(&[driver]);
        } else {
            let out = var_of(&cnf.var_of_node, co);
            cnf.push_clause(&[out.pos(), !driver]);
            cnf.push_clause(&[out.neg(), driver]);
        }
    }
    cnf.push_clause(&[var_of(&cnf.var_of_node, 0).pos()]);

    debug!(
        "cnf: {} vars, {} clauses, {} literals, {} wide ands",
        cnf.n_vars,
        cnf.n_clauses(),
        cnf.lits.len(),
        n_wide
    );
    cnf
}
