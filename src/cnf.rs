//! Translation of an AIG into a compact CNF.
//!
//! The translation runs in two passes:
//! - [`mark_nodes`] selects the nodes which get a SAT variable: combinational inputs, output drivers,
//!   shared nodes and mux or xor roots, so that every other and gate is folded into a small cut
//! - [`derive_clauses`] emits, for each marked node, the clauses of its cut: an irredundant
//!   two-level encoding for cuts of at most six leaves, a flat multi-input and otherwise.
//!
//! [`derive_cnf`] chains both passes. The result is a [`Cnf`] buffer that can be lifted,
//! written in DIMACS format, or loaded into a [`SatSolver`].
//!
//! [`SatSolver`]: crate::sat::SatSolver

pub mod cut;
pub mod derive;
pub mod isop;
pub mod lit;
pub mod mark;

use std::io::Write;

pub use derive::{NodeCnf, derive_clauses};
pub use lit::{Lit, Var};
pub use mark::{mark_more, mark_nodes, verify_marking};

use crate::{Aig, AigEdge, NodeId, sat::SatSolver};

/// A flat clause buffer together with the variable of each AIG node.
///
/// Clause `i` occupies `lits[offsets[i]..offsets[i + 1]]`. Variable 0 is never used.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Cnf {
    pub(crate) n_vars: usize,
    pub(crate) var_of_node: Vec<Option<Var>>,
    pub(crate) lits: Vec<Lit>,
    pub(crate) offsets: Vec<usize>,
    pub(crate) n_outputs: usize,
}

/// Derives the CNF of a whole AIG, see [`derive_clauses`] for the meaning of `n_outputs`.
pub fn derive_cnf(aig: &Aig, n_outputs: usize) -> Cnf {
    let marks = mark_nodes(aig);
    verify_marking(aig, &marks);
    derive_clauses(aig, &marks, n_outputs)
}

impl Cnf {
    pub(crate) fn push_clause(&mut self, clause: &[Lit]) {
        debug_assert!(clause.iter().all(|l| l.var().index() < self.n_vars));
        self.lits.extend_from_slice(clause);
        self.offsets.push(self.lits.len());
    }

    /// Number of variables, the reserved variable 0 included.
    pub fn n_vars(&self) -> usize {
        self.n_vars
    }

    pub fn n_clauses(&self) -> usize {
        self.offsets.len() - 1
    }

    pub fn n_lits(&self) -> usize {
        self.lits.len()
    }

    /// Number of designated outputs the CNF was derived with.
    pub fn n_outputs(&self) -> usize {
        self.n_outputs
    }

    pub fn clause(&self, i: usize) -> &[Lit] {
        &self.lits[self.offsets[i]..self.offsets[i + 1]]
    }

    pub fn clauses(&self) -> impl Iterator<Item = &[Lit]> + '_ {
        (0..self.n_clauses()).map(|i| self.clause(i))
    }

    /// Variable of a node, if it has one.
    pub fn var_of(&self, id: NodeId) -> Option<Var> {
        self.var_of_node.get(id).copied().flatten()
    }

    /// Literal of an edge, if its node has a variable.
    pub fn lit_of(&self, edge: AigEdge) -> Option<Lit> {
        self.var_of(edge.get_node_id())
            .map(|v| v.lit(edge.get_complement()))
    }

    /// Shifts every variable by `k`, so that the CNF can share a solver with `k` other variables.
    pub fn lift(&mut self, k: usize) {
        assert!(self.n_vars + k <= u32::MAX as usize, "too many SAT variables");
        let k32 = k as u32;
        self.n_vars += k;
        for var in self.var_of_node.iter_mut().flatten() {
            var.0 += k32;
        }
        for lit in &mut self.lits {
            *lit = Var(lit.var().0 + k32).lit(lit.is_negated());
        }
    }

    /// Writes the CNF in DIMACS format.
    pub fn write_dimacs<W: Write>(&self, w: &mut W) -> std::io::Result<()> {
        writeln!(w, "p cnf {} {}", self.n_vars.saturating_sub(1), self.n_clauses())?;
        for clause in self.clauses() {
            for lit in clause {
                write!(w, "{} ", lit)?;
            }
            writeln!(w, "0")?;
        }
        Ok(())
    }

    /// Adds every clause to the solver, after making sure it knows all the variables.
    pub fn to_solver<S: SatSolver + ?Sized>(&self, solver: &mut S) {
        if solver.n_vars() < self.n_vars {
            solver.set_var_count(self.n_vars);
        }
        for clause in self.clauses() {
            solver.add_clause(clause);
        }
    }
}
