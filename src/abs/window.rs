//! Backward unrolling from the property, one frame at a time.
//!
//! The window starts with the cone of the property and grows by one frame per step: the new chunk
//! is the cone of the next-state functions of the latches read by the previous chunk. Each chunk
//! gets its own compact CNF, lifted past the variables already in the solver, and its outputs are
//! tied to the latch variables of the previous chunk. The fully unrolled AIG is never built.
//!
//! At depth `d` two questions are asked:
//! - can the property fail at frame `d - 1` from the initial states? If so the failure is real
//! - can it fail after `d - 1` steps from any state? If not, it holds forever.

use std::time::{Duration, Instant};

use log::{debug, info};

use crate::{
    Aig, AigEdge, NodeId, Result,
    abs::{AbsError, AbsResult, AbsStats, Verdict, check_core, check_property, deadline},
    cex::{Cex, verify_cex},
    cnf::{Cnf, Lit, Var, derive_cnf},
    sat::{CdclSolver, Limits, SatSolver, SolveResult},
};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WindowParams {
    pub n_frames_max: usize,
    pub conflict_limit: Option<u64>,
    pub time_limit: Option<Duration>,
}

impl Default for WindowParams {
    fn default() -> Self {
        WindowParams {
            n_frames_max: 20,
            conflict_limit: None,
            time_limit: None,
        }
    }
}

/// Combinational inputs of one frame of the window, with their solver variable.
#[derive(Debug, Default)]
struct Chunk {
    /// `(primary input index, variable)`
    inputs: Vec<(usize, Var)>,
    /// `(latch index, variable)`
    latches: Vec<(usize, Var)>,
}

pub struct Window<'a, S: SatSolver = CdclSolver> {
    aig: &'a Aig,
    property: usize,
    params: WindowParams,
    solver: S,
    /// `chunks[0]` is the frame where the property fails, the last chunk is the earliest frame.
    chunks: Vec<Chunk>,
    property_lit: Option<Lit>,
    deadline: Option<Instant>,
    stats: AbsStats,
}

impl<'a> Window<'a, CdclSolver> {
    pub fn new(aig: &'a Aig, property: usize, params: WindowParams) -> Result<Self> {
        Window::with_solver(aig, property, params, CdclSolver::new())
    }
}

fn var_of(cnf: &Cnf, node: NodeId) -> Var {
    cnf.var_of(node)
        .unwrap_or_else(|| panic!("node {} of the chunk has no CNF variable", node))
}

impl<'a, S: SatSolver> Window<'a, S> {
    pub fn with_solver(
        aig: &'a Aig,
        property: usize,
        params: WindowParams,
        solver: S,
    ) -> Result<Self> {
        check_property(aig, property)?;
        assert!(params.n_frames_max > 0, "at least one frame must be explored");
        Ok(Window {
            aig,
            property,
            params,
            solver,
            chunks: Vec::new(),
            property_lit: None,
            deadline: None,
            stats: AbsStats::default(),
        })
    }

    fn add_clause(&mut self, clause: &[Lit]) {
        self.solver.add_clause(clause);
        self.stats.n_clauses += 1;
    }

    /// Adds the chunk of the frame before the earliest one, stitched to it.
    fn add_chunk(&mut self) {
        let (roots, targets): (Vec<AigEdge>, Vec<Var>) = match self.chunks.last() {
            None => (vec![self.aig.get_output_driver(self.property)], Vec::new()),
            Some(earliest) => earliest
                .latches
                .iter()
                .map(|&(k, var)| (self.aig.get_latch_next(k), var))
                .unzip(),
        };
        let (cone, support) = self.aig.dup_cone(&roots);
        let mut cnf = derive_cnf(&cone, cone.n_outputs());
        cnf.lift(self.solver.n_vars() - 1);
        cnf.to_solver(&mut self.solver);
        self.stats.n_clauses += cnf.n_clauses();

        let outputs: Vec<Var> = cone
            .get_outputs()
            .iter()
            .map(|&o| var_of(&cnf, o))
            .collect();
        if self.chunks.is_empty() {
            self.property_lit = Some(outputs[0].pos());
        }
        for (out, target) in outputs.into_iter().zip(targets) {
            self.add_clause(&[out.neg(), target.pos()]);
            self.add_clause(&[out.pos(), target.neg()]);
        }

        let mut chunk = Chunk::default();
        for (&ci, &input) in support.iter().zip(cone.get_inputs()) {
            let var = var_of(&cnf, input);
            let index = self.aig.get_io_index(ci);
            if self.aig.node(ci).is_latch() {
                chunk.latches.push((index, var));
            } else {
                chunk.inputs.push((index, var));
            }
        }
        debug!(
            "window: chunk {} with {} and gates, {} inputs, {} latches, {} clauses",
            self.chunks.len(),
            cone.n_ands(),
            chunk.inputs.len(),
            chunk.latches.len(),
            cnf.n_clauses()
        );
        self.chunks.push(chunk);
    }

    fn solve(&mut self, assumptions: &[Lit]) -> Result<SolveResult> {
        let limits = Limits {
            conflicts: self.params.conflict_limit,
            deadline: self.deadline,
        };
        self.stats.sat_calls += 1;
        self.solver.solve(assumptions, &limits)
    }

    pub fn run(&mut self) -> Result<AbsResult> {
        let start = Instant::now();
        self.deadline = deadline(self.params.time_limit);
        let verdict = self.explore()?;
        self.stats.elapsed = start.elapsed();
        self.stats.n_vars = self.solver.n_vars();

        let mut abstraction: Vec<NodeId> = self
            .chunks
            .iter()
            .flat_map(|c| c.latches.iter().map(|&(k, _)| self.aig.get_latches()[k]))
            .collect();
        abstraction.sort_unstable();
        abstraction.dedup();
        info!(
            "window: {:?} with {} latches in the window",
            verdict,
            abstraction.len()
        );
        Ok(AbsResult {
            verdict,
            abstraction,
            stats: self.stats.clone(),
        })
    }

    fn explore(&mut self) -> Result<Verdict> {
        for depth in 1..=self.params.n_frames_max {
            self.add_chunk();
            self.stats.frames = depth;
            let frame = depth - 1;
            let Some(property) = self.property_lit else {
                return Err(AbsError::NoProperty(self.property).into());
            };

            let mut assumptions = vec![property];
            if let Some(earliest) = self.chunks.last() {
                for &(k, var) in &earliest.latches {
                    if let Some(init) = self.aig.get_latch_init(k) {
                        assumptions.push(var.lit(!init));
                    }
                }
            }
            match self.solve(&assumptions)? {
                SolveResult::Undecided => return Ok(Verdict::Undecided { frames: frame }),
                SolveResult::Sat => {
                    let cex = self.cex(frame);
                    if !verify_cex(self.aig, &cex) {
                        return Err(AbsError::CexReplay { frame }.into());
                    }
                    info!("window: counter-example at frame {}", frame);
                    return Ok(Verdict::Disproved(cex));
                }
                SolveResult::Unsat => check_core(&self.solver.final_conflict(), property, frame)?,
            }

            match self.solve(&[property])? {
                SolveResult::Undecided => return Ok(Verdict::Undecided { frames: depth }),
                SolveResult::Unsat => {
                    check_core(&self.solver.final_conflict(), property, frame)?;
                    info!("window: no path of {} frames reaches a failure", depth);
                    return Ok(Verdict::Proved {
                        frames: depth,
                        unbounded: true,
                    });
                }
                SolveResult::Sat => debug!("window: depth {} does not block every state", depth),
            }
        }
        Ok(Verdict::Proved {
            frames: self.params.n_frames_max,
            unbounded: false,
        })
    }

    fn value(&self, var: Var) -> bool {
        self.solver.value(var).unwrap_or(false)
    }

    /// Reads the failure at `frame` from the last model. Frame 0 is the earliest chunk.
    fn cex(&self, frame: usize) -> Cex {
        let mut inputs = vec![vec![false; self.aig.n_inputs()]; frame + 1];
        for (t, chunk) in self.chunks.iter().rev().enumerate() {
            for &(i, var) in &chunk.inputs {
                inputs[t][i] = self.value(var);
            }
        }
        let mut regs: Vec<bool> = (0..self.aig.n_latches())
            .map(|k| self.aig.get_latch_init(k).unwrap_or(false))
            .collect();
        if let Some(earliest) = self.chunks.last() {
            for &(k, var) in &earliest.latches {
                if self.aig.get_latch_init(k).is_none() {
                    regs[k] = self.value(var);
                }
            }
        }
        Cex {
            po: self.property,
            frame,
            regs,
            inputs,
        }
    }
}
