//! SAT-based abstraction refinement for a single safety property.
//!
//! The property is a primary output of a sequential AIG, it fails when the output is true.
//! Three drivers are available:
//! - [`Gla`]: incremental gate-level abstraction, refined from counter-examples
//! - [`Pba`]: proof-based flop abstraction over a flat unrolling
//! - [`Window`]: backward unrolling from the property, stitched chunk by chunk
//!
//! All of them return an [`AbsResult`].

pub mod gla;
pub mod pba;
pub mod window;

use std::time::{Duration, Instant};

use thiserror::Error;

pub use gla::{CnfMode, Gla, GlaParams};
pub use pba::{Pba, PbaParams};
pub use window::{Window, WindowParams};

use crate::{Aig, NodeId, Result, cex::Cex, cnf::Lit};

/// Internal consistency failures of the abstraction drivers.
///
/// None of them is a verification result: they mean the encoding or the bookkeeping is wrong.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum AbsError {
    /// The solver proved unsatisfiability without using the property literal.
    #[error("structural clauses are unsatisfiable at frame {frame}")]
    StructuralUnsat { frame: usize },

    /// A counter-example read from the solver does not replay on the AIG it was derived for.
    #[error("counter-example of frame {frame} does not replay")]
    CexReplay { frame: usize },

    /// The property output does not exist.
    #[error("output {0} does not exist")]
    NoProperty(usize),

    /// A counter-example which does not replay on the design needs no refinement.
    #[error("spurious counter-example of frame {frame} with nothing to refine")]
    EmptyRefinement { frame: usize },
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Verdict {
    /// The property holds in frames `0..frames`, and in every frame when `unbounded`.
    Proved { frames: usize, unbounded: bool },
    /// The property fails, the counter-example replays on the design.
    Disproved(Cex),
    /// A resource limit was hit. The property holds in frames `0..frames`.
    Undecided { frames: usize },
}

impl Verdict {
    pub fn is_proved(&self) -> bool {
        matches!(self, Verdict::Proved { .. })
    }

    pub fn cex(&self) -> Option<&Cex> {
        match self {
            Verdict::Disproved(cex) => Some(cex),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct AbsStats {
    /// Frames explored.
    pub frames: usize,
    pub sat_calls: usize,
    pub refinements: usize,
    pub n_vars: usize,
    pub n_clauses: usize,
    pub elapsed: Duration,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AbsResult {
    pub verdict: Verdict,
    /// Nodes of the final abstraction, ascending.
    pub abstraction: Vec<NodeId>,
    pub stats: AbsStats,
}

pub(crate) fn deadline(time_limit: Option<Duration>) -> Option<Instant> {
    time_limit.map(|limit| Instant::now() + limit)
}

/// Makes sure an unsatisfiable answer relied on the property literal.
pub(crate) fn check_core(core: &[Lit], property: Lit, frame: usize) -> Result<()> {
    if core.contains(&property) {
        Ok(())
    } else {
        Err(AbsError::StructuralUnsat { frame }.into())
    }
}

pub(crate) fn check_property(aig: &Aig, property: usize) -> Result<()> {
    if property < aig.n_outputs() {
        Ok(())
    } else {
        Err(AbsError::NoProperty(property).into())
    }
}

#[cfg(test)]
pub(crate) mod testing {
    //! Small designs and a reference bounded model checker.

    use crate::{
        Aig, AigEdge,
        cnf::derive_cnf,
        sat::{Limits, SatSolver, SolveResult, VarisatSolver},
    };
    use test_log::test;

    /// Returns true iff output `property` can be true within the first `n_frames` frames.
    /// Solved with [`VarisatSolver`], apart from the default backend of the engines.
    pub fn bmc(aig: &Aig, n_frames: usize, property: usize) -> bool {
        let unrolled = aig.unroll_pba(n_frames, property);
        let cnf = derive_cnf(&unrolled.aig, 1);
        let mut solver = VarisatSolver::new();
        cnf.to_solver(&mut solver);
        let mut assumptions = vec![cnf.var_of(unrolled.aig.get_outputs()[0]).unwrap().pos()];
        for &act in &unrolled.acts {
            assumptions.push(cnf.var_of(act).unwrap().pos());
        }
        solver.solve(&assumptions, &Limits::default()).unwrap() == SolveResult::Sat
    }

    /// Output is constant false.
    pub fn always_false() -> Aig {
        let mut aig = Aig::new();
        let a = aig.add_input();
        let l = aig.add_latch(Some(false));
        let n = aig.xor(l, a);
        aig.set_latch_next(0, n).unwrap();
        let f = !aig.get_const_true();
        aig.add_output(f);
        aig
    }

    /// A 1-bit counter incremented when `en` is high, the output is the counter.
    pub fn counter() -> Aig {
        let mut aig = Aig::new();
        let en = aig.add_input();
        let l = aig.add_latch(Some(false));
        let n = aig.xor(l, en);
        aig.set_latch_next(0, n).unwrap();
        aig.add_output(l);
        aig
    }

    /// Shift register of `n` latches fed by an input, the output is the and of all latches.
    /// It first fails at frame `n`.
    pub fn shift_register(n: usize) -> Aig {
        let mut aig = Aig::new();
        let input = aig.add_input();
        let regs: Vec<AigEdge> = (0..n).map(|_| aig.add_latch(Some(false))).collect();
        aig.set_latch_next(0, input).unwrap();
        for k in 1..n {
            aig.set_latch_next(k, regs[k - 1]).unwrap();
        }
        let all = regs[1..].iter().fold(regs[0], |acc, r| aig.and(acc, *r));
        aig.add_output(all);
        aig
    }

    /// Two latches stuck at their reset value 0 and a free running counter.
    /// The output needs one of the stuck latches and never fails.
    pub fn stuck_with_noise() -> Aig {
        let mut aig = Aig::new();
        let en = aig.add_input();
        let x = aig.add_input();
        let s0 = aig.add_latch(Some(false));
        let s1 = aig.add_latch(Some(false));
        let c0 = aig.add_latch(Some(false));
        let c1 = aig.add_latch(Some(false));
        let hold0 = aig.and(s0, x);
        aig.set_latch_next(0, hold0).unwrap();
        let hold1 = aig.and(s1, s0);
        aig.set_latch_next(1, hold1).unwrap();
        let n0 = aig.xor(c0, en);
        let carry = aig.and(c0, en);
        let n1 = aig.xor(c1, carry);
        aig.set_latch_next(2, n0).unwrap();
        aig.set_latch_next(3, n1).unwrap();
        let noise = aig.and(c0, c1);
        let bad = aig.and(s1, noise);
        aig.add_output(bad);
        aig
    }

    #[test]
    fn bmc_test() {
        let aig = shift_register(3);
        assert!(!bmc(&aig, 3, 0));
        assert!(bmc(&aig, 4, 0));
        assert!(!bmc(&always_false(), 5, 0));
        assert!(bmc(&counter(), 2, 0));
        assert!(!bmc(&stuck_with_noise(), 6, 0));
    }
}
