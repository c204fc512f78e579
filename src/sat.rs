//! Incremental SAT solving behind a small trait.
//!
//! [`CdclSolver`] is the default backend and enforces [`Limits`] during the search.
//! [`VarisatSolver`] wraps [`varisat`] and only checks the deadline between calls.

use std::time::Instant;

use log::debug;
use thiserror::Error;
use varisat::ExtendFormula;

use crate::{
    Result,
    cnf::{Lit, Var},
};

mod cdcl;

pub use cdcl::CdclSolver;

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum SatError {
    #[error("SAT backend failure: {0}")]
    Backend(String),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SolveResult {
    Sat,
    Unsat,
    /// A resource limit was hit before an answer was found.
    Undecided,
}

/// Resource limits of a single solver call. `None` means unlimited.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Limits {
    pub conflicts: Option<u64>,
    pub deadline: Option<Instant>,
}

impl Limits {
    pub fn expired(&self) -> bool {
        self.deadline.is_some_and(|d| Instant::now() >= d)
    }
}

/// An incremental SAT solver with assumptions.
///
/// Literals use the packing of [`Lit`]. Variable 0 is allocated but never used, so that
/// the variables of a [`Cnf`](crate::cnf::Cnf) can be loaded as they are.
pub trait SatSolver {
    fn new_var(&mut self) -> Var;

    /// Number of allocated variables, variable 0 included.
    fn n_vars(&self) -> usize;

    /// Makes sure variables `0..n` exist.
    fn set_var_count(&mut self, n: usize);

    fn add_clause(&mut self, clause: &[Lit]);

    fn solve(&mut self, assumptions: &[Lit], limits: &Limits) -> Result<SolveResult>;

    /// Value of a variable in the last model, `None` if it is unassigned.
    fn value(&self, var: Var) -> Option<bool>;

    fn lit_value(&self, lit: Lit) -> Option<bool> {
        self.value(lit.var()).map(|v| v != lit.is_negated())
    }

    /// After an unsatisfiable call, the subset of the assumptions used to prove unsatisfiability.
    fn final_conflict(&self) -> Vec<Lit>;
}

fn to_varisat(lit: Lit) -> varisat::Lit {
    varisat::Lit::from_index(lit.var().index(), !lit.is_negated())
}

fn from_varisat(lit: varisat::Lit) -> Lit {
    Var(lit.index() as u32).lit(lit.is_negative())
}

/// [`SatSolver`] backed by varisat.
///
/// Varisat has no conflict budget: [`Limits::conflicts`] is ignored and the deadline is only
/// checked before each call. Use [`CdclSolver`] when the limits must hold.
pub struct VarisatSolver {
    solver: varisat::Solver<'static>,
    n_vars: usize,
    model: Vec<Option<bool>>,
    core: Vec<Lit>,
    n_calls: usize,
}

impl Default for VarisatSolver {
    fn default() -> Self {
        VarisatSolver::new()
    }
}

impl VarisatSolver {
    pub fn new() -> Self {
        VarisatSolver {
            solver: varisat::Solver::new(),
            n_vars: 1,
            model: Vec::new(),
            core: Vec::new(),
            n_calls: 0,
        }
    }

    pub fn n_calls(&self) -> usize {
        self.n_calls
    }
}

impl SatSolver for VarisatSolver {
    fn new_var(&mut self) -> Var {
        let var = Var(self.n_vars as u32);
        self.n_vars += 1;
        var
    }

    fn n_vars(&self) -> usize {
        self.n_vars
    }

    fn set_var_count(&mut self, n: usize) {
        self.n_vars = self.n_vars.max(n);
    }

    fn add_clause(&mut self, clause: &[Lit]) {
        debug_assert!(clause.iter().all(|l| l.var().index() < self.n_vars));
        let lits: Vec<varisat::Lit> = clause.iter().map(|&l| to_varisat(l)).collect();
        self.solver.add_clause(&lits);
    }

    fn solve(&mut self, assumptions: &[Lit], limits: &Limits) -> Result<SolveResult> {
        self.model.clear();
        self.core.clear();
        if limits.expired() {
            return Ok(SolveResult::Undecided);
        }
        self.n_calls += 1;
        let lits: Vec<varisat::Lit> = assumptions.iter().map(|&l| to_varisat(l)).collect();
        self.solver.assume(&lits);
        let sat = self
            .solver
            .solve()
            .map_err(|e| SatError::Backend(format!("{}", e)))?;
        if sat {
            self.model = vec![None; self.n_vars];
            for lit in self.solver.model().unwrap_or_default() {
                if lit.index() >= self.model.len() {
                    self.model.resize(lit.index() + 1, None);
                }
                self.model[lit.index()] = Some(lit.is_positive());
            }
            debug!("sat call {}: SAT, {} assumptions", self.n_calls, assumptions.len());
            Ok(SolveResult::Sat)
        } else {
            self.core = self
                .solver
                .failed_core()
                .map(|core| core.iter().map(|&l| from_varisat(l)).collect())
                .unwrap_or_default();
            debug!(
                "sat call {}: UNSAT, core of {} out of {} assumptions",
                self.n_calls,
                self.core.len(),
                assumptions.len()
            );
            Ok(SolveResult::Unsat)
        }
    }

    fn value(&self, var: Var) -> Option<bool> {
        self.model.get(var.index()).copied().flatten()
    }

    fn final_conflict(&self) -> Vec<Lit> {
        self.core.clone()
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use std::time::Duration;
    use test_log::test;

    #[test]
    fn sat_unsat_test() {
        let mut solver = VarisatSolver::new();
        let a = solver.new_var();
        let b = solver.new_var();
        assert_eq!(a, Var(1));
        solver.add_clause(&[a.pos(), b.pos()]);
        solver.add_clause(&[a.neg()]);
        let limits = Limits::default();
        assert_eq!(solver.solve(&[], &limits).unwrap(), SolveResult::Sat);
        assert_eq!(solver.value(a), Some(false));
        assert_eq!(solver.value(b), Some(true));
        assert_eq!(solver.lit_value(b.neg()), Some(false));

        assert_eq!(solver.solve(&[b.neg()], &limits).unwrap(), SolveResult::Unsat);
        assert_eq!(solver.final_conflict(), vec![b.neg()]);
        // Assumptions do not stick
        assert_eq!(solver.solve(&[], &limits).unwrap(), SolveResult::Sat);
    }

    #[test]
    fn core_test() {
        let mut solver = VarisatSolver::new();
        solver.set_var_count(5);
        assert_eq!(solver.n_vars(), 5);
        let (x, y, z) = (Var(1), Var(2), Var(3));
        solver.add_clause(&[x.neg(), y.neg()]);
        let res = solver
            .solve(&[z.pos(), x.pos(), y.pos()], &Limits::default())
            .unwrap();
        assert_eq!(res, SolveResult::Unsat);
        let mut core = solver.final_conflict();
        core.sort();
        assert_eq!(core, vec![x.pos(), y.pos()]);
    }

    #[test]
    fn expired_deadline_test() {
        let mut solver = VarisatSolver::new();
        let a = solver.new_var();
        solver.add_clause(&[a.pos()]);
        let limits = Limits {
            conflicts: None,
            deadline: Some(Instant::now() - Duration::from_millis(1)),
        };
        assert_eq!(solver.solve(&[], &limits).unwrap(), SolveResult::Undecided);
        assert_eq!(solver.value(a), None);
    }
}
