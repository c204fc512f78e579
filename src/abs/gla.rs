//! Incremental gate-level abstraction.
//!
//! The engine keeps a single incremental solver holding the clauses of the included gates at
//! every frame unrolled so far. Nodes read by an included gate but not included themselves are
//! left unconstrained: they are the pseudo-inputs of the abstraction. Starting from the constant
//! alone, each frame is solved until the abstraction is strong enough to make the property hold
//! there, refining from the counter-examples found along the way.
//!
//! A refinement adds the pseudo-inputs the counter-example depends on. A latch added this way
//! brings the gates of its next-state function along, down to the combinational inputs, so
//! that the next frame sees its real transition.

use std::{
    rc::Rc,
    time::{Duration, Instant},
};

use log::{debug, info};

use crate::{
    Aig, AigNode, NodeId, Result,
    abs::{AbsError, AbsResult, AbsStats, Verdict, check_core, check_property, deadline},
    aig::{Abstraction, GateCone, travid::TravIds},
    cex::{Cex, filter_inputs, verify_cex},
    cnf::{Lit, NodeCnf, Var, mark_nodes, verify_marking},
    sat::{CdclSolver, Limits, SatSolver, SolveResult},
};

/// Clauses used for the and gates of the abstraction.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum CnfMode {
    /// Every and gate is a gate of its own, with the three Tseitin clauses over its fanins.
    Naive,
    /// Only the nodes marked for the compact CNF are gates, with the clauses of their cut.
    #[default]
    Compact,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GlaParams {
    /// Frames to unroll before stopping with a bounded proof.
    pub n_frames_max: usize,
    pub conflict_limit: Option<u64>,
    pub time_limit: Option<Duration>,
    pub cnf_mode: CnfMode,
    /// Refinements allowed before giving up, unlimited when `None`.
    pub max_refinements: Option<usize>,
}

impl Default for GlaParams {
    fn default() -> Self {
        GlaParams {
            n_frames_max: 20,
            conflict_limit: None,
            time_limit: None,
            cnf_mode: CnfMode::Compact,
            max_refinements: None,
        }
    }
}

/// Per-frame SAT variables of the nodes which have been given some.
///
/// `vars[vec_of_node[n]][f]` is the variable of node `n` at frame `f`. All vectors share the same
/// capacity, which doubles whenever a frame beyond it is needed.
#[derive(Debug)]
struct FrameVars {
    vec_of_node: Vec<Option<usize>>,
    vars: Vec<Vec<Option<Var>>>,
    assigned: Vec<NodeId>,
    capacity: usize,
}

impl FrameVars {
    fn new(n_nodes: usize) -> Self {
        FrameVars {
            vec_of_node: vec![None; n_nodes],
            vars: Vec::new(),
            assigned: Vec::new(),
            capacity: 4,
        }
    }

    fn get(&self, node: NodeId, frame: usize) -> Option<Var> {
        self.vec_of_node[node].and_then(|v| self.vars[v].get(frame).copied().flatten())
    }

    fn grow(&mut self, frame: usize) {
        if frame < self.capacity {
            return;
        }
        while self.capacity <= frame {
            self.capacity *= 2;
        }
        for vars in &mut self.vars {
            vars.resize(self.capacity, None);
        }
        debug!(
            "gla: frame capacity raised to {} for {} nodes",
            self.capacity,
            self.assigned.len()
        );
    }

    fn get_or_create<S: SatSolver>(&mut self, solver: &mut S, node: NodeId, frame: usize) -> Var {
        self.grow(frame);
        let vec = match self.vec_of_node[node] {
            Some(vec) => vec,
            None => {
                let vec = self.vars.len();
                self.vars.push(vec![None; self.capacity]);
                self.vec_of_node[node] = Some(vec);
                self.assigned.push(node);
                vec
            }
        };
        *self.vars[vec][frame].get_or_insert_with(|| solver.new_var())
    }
}

#[derive(Debug)]
enum State {
    /// Adds the clauses of every included gate at a new frame.
    Unrolling { frame: usize },
    Solving { frame: usize },
    /// The property fails in the abstraction: read and check the counter-example.
    CexFound { frame: usize },
    Refining {
        frame: usize,
        abs: Abstraction,
        cex: Cex,
    },
    Converged { frames: usize, unbounded: bool },
    Timeout { frames: usize },
    Done(Verdict),
}

/// Gate-level abstraction engine for output `property` of a sequential AIG.
///
/// ```rust
/// use aigsat::{Aig, abs::{Gla, GlaParams}};
/// let mut aig = Aig::new();
/// let en = aig.add_input();
/// let l = aig.add_latch(Some(false));
/// let next = aig.xor(l, en);
/// aig.set_latch_next(0, next).unwrap();
/// aig.add_output(l);
///
/// let result = Gla::new(&aig, 0, GlaParams::default()).unwrap().run().unwrap();
/// assert_eq!(result.verdict.cex().unwrap().frame, 1);
/// ```
pub struct Gla<'a, S: SatSolver = CdclSolver> {
    aig: &'a Aig,
    property: usize,
    params: GlaParams,
    solver: S,
    /// Compact CNF marking, empty in naive mode.
    marks: Vec<bool>,
    templates: Vec<Option<Rc<NodeCnf>>>,
    trav: TravIds,
    included: Vec<bool>,
    /// Included gates, in inclusion order.
    gates: Vec<NodeId>,
    frames: FrameVars,
    deadline: Option<Instant>,
    stats: AbsStats,
}

impl<'a> Gla<'a, CdclSolver> {
    pub fn new(aig: &'a Aig, property: usize, params: GlaParams) -> Result<Self> {
        Gla::with_solver(aig, property, params, CdclSolver::new())
    }
}

impl<'a, S: SatSolver> Gla<'a, S> {
    pub fn with_solver(aig: &'a Aig, property: usize, params: GlaParams, solver: S) -> Result<Self> {
        check_property(aig, property)?;
        assert!(params.n_frames_max > 0, "at least one frame must be explored");
        let marks = match params.cnf_mode {
            CnfMode::Compact => {
                let marks = mark_nodes(aig);
                verify_marking(aig, &marks);
                marks
            }
            CnfMode::Naive => Vec::new(),
        };
        let n = aig.n_nodes();
        let mut gla = Gla {
            aig,
            property,
            params,
            solver,
            marks,
            templates: vec![None; n],
            trav: TravIds::new(n),
            included: vec![false; n],
            gates: Vec::new(),
            frames: FrameVars::new(n),
            deadline: None,
            stats: AbsStats::default(),
        };
        gla.included[0] = true;
        gla.gates.push(0);
        Ok(gla)
    }

    /// Included gates, in inclusion order.
    pub fn included(&self) -> &[NodeId] {
        &self.gates
    }

    pub fn stats(&self) -> &AbsStats {
        &self.stats
    }

    /// Runs the refinement loop until the property is proved, disproved, or a limit is hit.
    pub fn run(&mut self) -> Result<AbsResult> {
        let start = Instant::now();
        self.deadline = deadline(self.params.time_limit);
        let mut state = State::Unrolling { frame: 0 };
        loop {
            state = match self.step(state)? {
                State::Done(verdict) => {
                    self.stats.elapsed = start.elapsed();
                    return Ok(self.result(verdict));
                }
                next => next,
            };
        }
    }

    fn step(&mut self, state: State) -> Result<State> {
        let next = match state {
            State::Unrolling { frame } => {
                for k in 0..self.gates.len() {
                    self.add_gate(self.gates[k], frame);
                }
                self.property_lit(frame);
                self.stats.frames = frame + 1;
                debug!(
                    "gla: frame {} unrolled, {} vars, {} clauses",
                    frame,
                    self.solver.n_vars(),
                    self.stats.n_clauses
                );
                State::Solving { frame }
            }
            State::Solving { frame } => {
                let property = self.property_lit(frame);
                let limits = Limits {
                    conflicts: self.params.conflict_limit,
                    deadline: self.deadline,
                };
                self.stats.sat_calls += 1;
                match self.solver.solve(&[property], &limits)? {
                    SolveResult::Sat => State::CexFound { frame },
                    SolveResult::Undecided => State::Timeout { frames: frame },
                    SolveResult::Unsat => {
                        check_core(&self.solver.final_conflict(), property, frame)?;
                        let n_latches = self.n_included_latches();
                        info!(
                            "gla: frame {} holds with {} gates, {} latches",
                            frame,
                            self.gates.len(),
                            n_latches
                        );
                        if n_latches == 0 {
                            // Every frame sees the same combinational abstraction
                            State::Converged {
                                frames: frame + 1,
                                unbounded: true,
                            }
                        } else if frame + 1 == self.params.n_frames_max {
                            State::Converged {
                                frames: frame + 1,
                                unbounded: false,
                            }
                        } else {
                            State::Unrolling { frame: frame + 1 }
                        }
                    }
                }
            }
            State::CexFound { frame } => {
                let abs = self.abstraction();
                let cex = self.abstract_cex(&abs, frame);
                if !verify_cex(&abs.aig, &cex) {
                    return Err(AbsError::CexReplay { frame }.into());
                }
                State::Refining { frame, abs, cex }
            }
            State::Refining { frame, abs, cex } => {
                let concrete = self.concrete_cex(frame);
                if verify_cex(self.aig, &concrete) {
                    info!("gla: real counter-example at frame {}", frame);
                    return Ok(State::Done(Verdict::Disproved(concrete)));
                }
                let needed = filter_inputs(&abs.aig, abs.n_real_inputs(), &cex);
                if needed.is_empty() {
                    return Err(AbsError::EmptyRefinement { frame }.into());
                }
                if self
                    .params
                    .max_refinements
                    .is_some_and(|max| self.stats.refinements >= max)
                {
                    info!("gla: refinement limit reached at frame {}", frame);
                    return Ok(State::Done(Verdict::Undecided { frames: frame }));
                }
                self.stats.refinements += 1;
                let before = self.gates.len();
                for &k in &needed {
                    let node = abs.ppis[k];
                    if self.included[node] {
                        continue;
                    }
                    self.include(node, frame);
                    if self.aig.node(node).is_latch() {
                        self.include_next_state(node, frame);
                    }
                }
                debug!(
                    "gla: refinement {} at frame {} adds {} gates for {} out of {} pseudo-inputs",
                    self.stats.refinements,
                    frame,
                    self.gates.len() - before,
                    needed.len(),
                    abs.ppis.len()
                );
                State::Solving { frame }
            }
            State::Converged { frames, unbounded } => {
                State::Done(Verdict::Proved { frames, unbounded })
            }
            State::Timeout { frames } => {
                info!("gla: resource limit hit at frame {}", frames);
                State::Done(Verdict::Undecided { frames })
            }
            State::Done(verdict) => State::Done(verdict),
        };
        Ok(next)
    }

    fn n_included_latches(&self) -> usize {
        self.gates
            .iter()
            .filter(|&&g| self.aig.node(g).is_latch())
            .count()
    }

    fn var(&mut self, node: NodeId, frame: usize) -> Var {
        self.frames.get_or_create(&mut self.solver, node, frame)
    }

    /// Literal which is true when the property fails at `frame`.
    fn property_lit(&mut self, frame: usize) -> Lit {
        let driver = self.aig.get_output_driver(self.property);
        self.var(driver.get_node_id(), frame)
            .lit(driver.get_complement())
    }

    fn add_clause(&mut self, clause: &[Lit]) {
        self.solver.add_clause(clause);
        self.stats.n_clauses += 1;
    }

    fn template(&mut self, node: NodeId) -> Rc<NodeCnf> {
        if let Some(template) = &self.templates[node] {
            return Rc::clone(template);
        }
        let template = Rc::new(match self.params.cnf_mode {
            CnfMode::Naive => NodeCnf::tseitin(self.aig, node),
            CnfMode::Compact => NodeCnf::derive(self.aig, &self.marks, &mut self.trav, node),
        });
        self.templates[node] = Some(Rc::clone(&template));
        template
    }

    /// Adds the clauses of an included gate at one frame.
    fn add_gate(&mut self, node: NodeId, frame: usize) {
        let out = self.var(node, frame);
        match *self.aig.node(node) {
            AigNode::True => self.add_clause(&[out.pos()]),
            AigNode::Latch { init } => {
                if frame == 0 {
                    if let Some(init) = init {
                        self.add_clause(&[out.lit(!init)]);
                    }
                } else {
                    let next = self.aig.get_latch_next(self.aig.get_io_index(node));
                    let prev = self
                        .var(next.get_node_id(), frame - 1)
                        .lit(next.get_complement());
                    self.add_clause(&[out.neg(), prev]);
                    self.add_clause(&[out.pos(), !prev]);
                }
            }
            AigNode::And { .. } => {
                let template = self.template(node);
                let mut vars = Vec::with_capacity(template.leaves.len() + 1);
                vars.push(out);
                for &leaf in &template.leaves {
                    vars.push(self.var(leaf, frame));
                }
                for clause in template.instantiate(&vars) {
                    self.add_clause(&clause);
                }
            }
            _ => unreachable!("node {} cannot be a gate of the abstraction", node),
        }
    }

    /// Includes a gate and adds its clauses to every frame up to `frame`.
    fn include(&mut self, node: NodeId, frame: usize) {
        debug_assert!(!self.included[node]);
        self.included[node] = true;
        self.gates.push(node);
        for k in 0..=frame {
            self.add_gate(node, k);
        }
    }

    /// Includes the gates of the next-state function of an included latch, stopping at the
    /// combinational inputs and at gates already included.
    fn include_next_state(&mut self, latch: NodeId, frame: usize) {
        let next = self.aig.get_latch_next(self.aig.get_io_index(latch));
        let mut stack = vec![next.get_node_id()];
        while let Some(node) = stack.pop() {
            if self.included[node] || !self.aig.node(node).is_and() {
                continue;
            }
            self.include(node, frame);
            stack.extend(self.template(node).leaves.iter().copied());
        }
    }

    fn abstraction(&self) -> Abstraction {
        let templates = &self.templates;
        self.aig.dup_abstraction(
            &self.gates,
            |g| {
                templates[g]
                    .as_ref()
                    .map(|t| GateCone {
                        leaves: t.leaves.clone(),
                        volume: t.volume.clone(),
                    })
                    .unwrap_or_default()
            },
            self.aig.get_output_driver(self.property),
        )
    }

    fn value(&self, node: NodeId, frame: usize) -> bool {
        self.frames
            .get(node, frame)
            .and_then(|v| self.solver.value(v))
            .unwrap_or(false)
    }

    fn initial_value(&self, latch: usize) -> bool {
        self.aig
            .get_latch_init(latch)
            .unwrap_or_else(|| self.value(self.aig.get_latches()[latch], 0))
    }

    /// Counter-example of the abstraction, read from the last model.
    fn abstract_cex(&self, abs: &Abstraction, frame: usize) -> Cex {
        let regs = abs.latches.iter().map(|&k| self.initial_value(k)).collect();
        let inputs = (0..=frame)
            .map(|t| {
                self.aig
                    .get_inputs()
                    .iter()
                    .chain(&abs.ppis)
                    .map(|&n| self.value(n, t))
                    .collect()
            })
            .collect();
        Cex {
            po: 0,
            frame,
            regs,
            inputs,
        }
    }

    /// The real input part of the last model, as a trace of the design.
    fn concrete_cex(&self, frame: usize) -> Cex {
        let regs = (0..self.aig.n_latches())
            .map(|k| self.initial_value(k))
            .collect();
        let inputs = (0..=frame)
            .map(|t| {
                self.aig
                    .get_inputs()
                    .iter()
                    .map(|&n| self.value(n, t))
                    .collect()
            })
            .collect();
        Cex {
            po: self.property,
            frame,
            regs,
            inputs,
        }
    }

    fn result(&mut self, verdict: Verdict) -> AbsResult {
        self.stats.n_vars = self.solver.n_vars();
        let mut abstraction = self.gates.clone();
        abstraction.sort_unstable();
        info!(
            "gla: {:?} with {} gates, {} refinements, {} sat calls",
            verdict,
            abstraction.len(),
            self.stats.refinements,
            self.stats.sat_calls
        );
        AbsResult {
            verdict,
            abstraction,
            stats: self.stats.clone(),
        }
    }
}
