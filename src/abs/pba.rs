//! Proof-based flop abstraction.
//!
//! The design is unrolled into one combinational AIG where every latch has an activation input.
//! The latches of the current abstraction are activated by assumptions, the others are free to
//! behave as the solver likes. When the property holds over the unrolling, the activations in
//! the final conflict form the abstraction. Otherwise the counter-example either replays on the
//! design, or tells which latches to add before the next round.

use std::time::{Duration, Instant};

use log::{debug, info};

use crate::{
    Aig, NodeId, Result,
    abs::{AbsError, AbsResult, AbsStats, Verdict, check_core, check_property, deadline},
    aig::{Abstraction, Unrolling},
    cex::{Cex, filter_inputs, verify_cex},
    cnf::{Cnf, Lit, Var, derive_cnf},
    sat::{CdclSolver, Limits, SatSolver, SolveResult},
};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PbaParams {
    /// Depth of the unrolling.
    pub n_frames: usize,
    pub conflict_limit: Option<u64>,
    pub time_limit: Option<Duration>,
    /// Outer rounds allowed before giving up, unlimited when `None`.
    pub max_rounds: Option<usize>,
}

impl Default for PbaParams {
    fn default() -> Self {
        PbaParams {
            n_frames: 10,
            conflict_limit: None,
            time_limit: None,
            max_rounds: None,
        }
    }
}

/// Result of one round over the unrolling.
enum Round {
    /// The property holds, with the latches of the final conflict.
    Holds(Vec<usize>),
    Fails(Cex),
    /// Latches to add to the abstraction.
    Refine(Vec<usize>),
    Undecided,
}

pub struct Pba<'a> {
    aig: &'a Aig,
    property: usize,
    params: PbaParams,
    /// Latches of the current abstraction.
    flops: Vec<usize>,
    stats: AbsStats,
}

impl<'a> Pba<'a> {
    pub fn new(aig: &'a Aig, property: usize, params: PbaParams) -> Result<Self> {
        check_property(aig, property)?;
        assert!(params.n_frames > 0, "at least one frame must be unrolled");
        let stats = AbsStats {
            frames: params.n_frames,
            ..AbsStats::default()
        };
        Ok(Pba {
            aig,
            property,
            params,
            flops: Vec::new(),
            stats,
        })
    }

    pub fn run(&mut self) -> Result<AbsResult> {
        let start = Instant::now();
        let deadline = deadline(self.params.time_limit);
        // The unrolling does not depend on the abstraction, only the assumptions do
        let unrolled = self.aig.unroll_pba(self.params.n_frames, self.property);
        let cnf = derive_cnf(&unrolled.aig, 1);
        self.stats.n_vars = cnf.n_vars();
        let mut rounds = 0;
        let verdict = loop {
            if self.params.max_rounds.is_some_and(|max| rounds >= max) {
                break Verdict::Undecided { frames: 0 };
            }
            rounds += 1;
            match self.round(&unrolled, &cnf, deadline)? {
                Round::Holds(core) => {
                    let unbounded = core.is_empty();
                    self.flops = core;
                    break Verdict::Proved {
                        frames: self.params.n_frames,
                        unbounded,
                    };
                }
                Round::Fails(cex) => break Verdict::Disproved(cex),
                Round::Undecided => break Verdict::Undecided { frames: 0 },
                Round::Refine(flops) => {
                    self.stats.refinements += 1;
                    debug!("pba: round {} adds latches {:?}", rounds, flops);
                    self.flops.extend(flops);
                    self.flops.sort_unstable();
                }
            }
        };
        self.stats.elapsed = start.elapsed();
        let abstraction: Vec<NodeId> = self
            .flops
            .iter()
            .map(|&k| self.aig.get_latches()[k])
            .collect();
        info!(
            "pba: {:?} with {} latches out of {} after {} rounds",
            verdict,
            abstraction.len(),
            self.aig.n_latches(),
            rounds
        );
        Ok(AbsResult {
            verdict,
            abstraction,
            stats: self.stats.clone(),
        })
    }

    /// Solves the unrolling from scratch under the activations of the current abstraction.
    fn round(&mut self, unrolled: &Unrolling, cnf: &Cnf, deadline: Option<Instant>) -> Result<Round> {
        let mut solver = CdclSolver::new();
        cnf.to_solver(&mut solver);
        self.stats.n_clauses += cnf.n_clauses();

        let property = var_of(cnf, unrolled.aig.get_outputs()[0]).pos();
        let acts: Vec<Lit> = self
            .flops
            .iter()
            .map(|&k| var_of(cnf, unrolled.acts[k]).pos())
            .collect();
        let assumptions: Vec<Lit> = std::iter::once(property).chain(acts.iter().copied()).collect();
        let limits = Limits {
            conflicts: self.params.conflict_limit,
            deadline,
        };
        self.stats.sat_calls += 1;
        match solver.solve(&assumptions, &limits)? {
            SolveResult::Undecided => Ok(Round::Undecided),
            SolveResult::Unsat => {
                let core = solver.final_conflict();
                check_core(&core, property, self.params.n_frames - 1)?;
                let flops = self
                    .flops
                    .iter()
                    .zip(&acts)
                    .filter(|(_, act)| core.contains(act))
                    .map(|(&k, _)| k)
                    .collect();
                Ok(Round::Holds(flops))
            }
            SolveResult::Sat => self.analyze(unrolled, cnf, &solver),
        }
    }

    /// Splits a model of the unrolling into a real counter-example or a refinement.
    fn analyze(&self, unrolled: &Unrolling, cnf: &Cnf, solver: &impl SatSolver) -> Result<Round> {
        // Every input of the unrolling has a variable, simulation recovers the rest
        let ci_values: Vec<bool> = unrolled
            .aig
            .get_inputs()
            .iter()
            .map(|&ci| {
                cnf.var_of(ci)
                    .and_then(|v| solver.value(v))
                    .unwrap_or(false)
            })
            .collect();
        let values = unrolled.aig.simulate_comb(&ci_values);
        let reg = |frame: usize, k: usize| Aig::eval_edge(&values, unrolled.regs[frame][k]);
        let input = |frame: usize, i: usize| values[unrolled.inputs[frame][i]];

        let abs = self.aig.dup_flop_abstraction(&self.flops);
        let cex = self.abstract_cex(&abs, &reg, &input)?;

        let concrete = Cex {
            po: self.property,
            frame: cex.frame,
            regs: (0..self.aig.n_latches())
                .map(|k| self.aig.get_latch_init(k).unwrap_or_else(|| reg(0, k)))
                .collect(),
            inputs: (0..=cex.frame)
                .map(|t| (0..self.aig.n_inputs()).map(|i| input(t, i)).collect())
                .collect(),
        };
        if verify_cex(self.aig, &concrete) {
            info!("pba: real counter-example at frame {}", cex.frame);
            return Ok(Round::Fails(concrete));
        }
        let needed = filter_inputs(&abs.aig, abs.n_real_inputs(), &cex);
        if needed.is_empty() {
            return Err(AbsError::EmptyRefinement { frame: cex.frame }.into());
        }
        Ok(Round::Refine(
            needed
                .into_iter()
                .map(|k| self.aig.get_io_index(abs.ppis[k]))
                .collect(),
        ))
    }

    /// Counter-example of the flop abstraction, failing at the first failing frame of the model.
    fn abstract_cex(
        &self,
        abs: &Abstraction,
        reg: &impl Fn(usize, usize) -> bool,
        input: &impl Fn(usize, usize) -> bool,
    ) -> Result<Cex> {
        let frame_inputs = |t: usize| -> Vec<bool> {
            (0..self.aig.n_inputs())
                .map(|i| input(t, i))
                .chain(abs.ppis.iter().map(|&ro| reg(t, self.aig.get_io_index(ro))))
                .collect()
        };
        let regs: Vec<bool> = abs.latches.iter().map(|&k| reg(0, k)).collect();
        let inputs: Vec<Vec<bool>> = (0..self.params.n_frames).map(frame_inputs).collect();
        let po = abs.aig.get_outputs()[self.property];
        let frames = abs.aig.simulate(&regs, &inputs);
        let Some(frame) = frames.iter().position(|values| values[po]) else {
            return Err(AbsError::CexReplay {
                frame: self.params.n_frames - 1,
            }
            .into());
        };
        let cex = Cex {
            po: self.property,
            frame,
            regs,
            inputs: inputs[..=frame].to_vec(),
        };
        if !verify_cex(&abs.aig, &cex) {
            return Err(AbsError::CexReplay { frame }.into());
        }
        Ok(cex)
    }
}

fn var_of(cnf: &Cnf, node: NodeId) -> Var {
    cnf.var_of(node)
        .unwrap_or_else(|| panic!("node {} of the unrolling has no CNF variable", node))
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::abs::testing::{always_false, bmc, counter, shift_register, stuck_with_noise};
    use test_log::test;

    fn params(n_frames: usize) -> PbaParams {
        PbaParams {
            n_frames,
            ..PbaParams::default()
        }
    }

    #[test]
    fn constant_property_test() {
        let aig = always_false();
        let result = Pba::new(&aig, 0, params(4)).unwrap().run().unwrap();
        assert_eq!(
            result.verdict,
            Verdict::Proved {
                frames: 4,
                unbounded: true
            }
        );
        assert!(result.abstraction.is_empty());
    }

    #[test]
    fn counter_test() {
        let aig = counter();
        let result = Pba::new(&aig, 0, params(3)).unwrap().run().unwrap();
        let cex = result.verdict.cex().unwrap();
        assert!(verify_cex(&aig, cex));
        assert!(cex.frame >= 1);
        assert_eq!(result.abstraction, aig.get_latches().to_vec());
    }

    #[test]
    fn shift_register_test() {
        let aig = shift_register(3);
        let result = Pba::new(&aig, 0, params(3)).unwrap().run().unwrap();
        assert_eq!(
            result.verdict,
            Verdict::Proved {
                frames: 3,
                unbounded: false
            }
        );
        assert!(!bmc(&aig, 3, 0));
        assert!(!result.abstraction.is_empty());

        let result = Pba::new(&aig, 0, params(5)).unwrap().run().unwrap();
        let cex = result.verdict.cex().unwrap();
        assert!(cex.frame >= 3);
        assert!(verify_cex(&aig, cex));
    }

    #[test]
    fn conflict_limit_test() {
        let aig = shift_register(3);
        let params = PbaParams {
            conflict_limit: Some(0),
            ..params(5)
        };
        let result = Pba::new(&aig, 0, params).unwrap().run().unwrap();
        assert_eq!(result.verdict, Verdict::Undecided { frames: 0 });
        assert_eq!(result.stats.sat_calls, 1);
    }

    #[test]
    fn stuck_latch_test() {
        let aig = stuck_with_noise();
        let result = Pba::new(&aig, 0, params(5)).unwrap().run().unwrap();
        assert!(result.verdict.is_proved());
        assert!(!bmc(&aig, 5, 0));
        // Without the second stuck latch, the counter reaches 3 within 5 frames
        assert!(result.abstraction.contains(&aig.get_latches()[1]));
    }
}
