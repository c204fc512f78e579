//! A conflict-driven clause learning solver that checks its resource limits during the search.
//!
//! Two watched literals per clause, first-UIP learning with activity-based branching, saved
//! phases and Luby restarts. Assumptions are decided first, one per decision level, and a
//! falsified assumption is explained in terms of the earlier ones.

use log::{debug, trace};

use crate::{
    Result,
    cnf::{Lit, Var},
    sat::{Limits, SatSolver, SolveResult},
};

const VAR_DECAY: f64 = 0.95;
const RESTART_BASE: u64 = 100;
/// Search steps between two readings of the clock.
const CLOCK_PERIOD: u64 = 128;

fn lit_value(assigns: &[Option<bool>], lit: Lit) -> Option<bool> {
    assigns[lit.var().index()].map(|v| v != lit.is_negated())
}

/// Element `x` of the Luby sequence 1 1 2 1 1 2 4 1 1 2 ...
fn luby(mut x: u64) -> u64 {
    let (mut size, mut seq) = (1u64, 0u32);
    while size < x + 1 {
        seq += 1;
        size = 2 * size + 1;
    }
    while size - 1 != x {
        size = (size - 1) >> 1;
        seq -= 1;
        x %= size;
    }
    1 << seq
}

/// Binary max-heap of variables, ordered by activity.
#[derive(Debug, Default)]
struct VarOrder {
    heap: Vec<usize>,
    /// Position of each variable in `heap`.
    pos: Vec<Option<usize>>,
}

impl VarOrder {
    fn grow(&mut self, n: usize) {
        if self.pos.len() < n {
            self.pos.resize(n, None);
        }
    }

    fn insert(&mut self, v: usize, activity: &[f64]) {
        if self.pos[v].is_some() {
            return;
        }
        self.pos[v] = Some(self.heap.len());
        self.heap.push(v);
        self.sift_up(self.heap.len() - 1, activity);
    }

    fn pop(&mut self, activity: &[f64]) -> Option<usize> {
        let top = *self.heap.first()?;
        let last = self.heap.pop()?;
        self.pos[top] = None;
        if !self.heap.is_empty() {
            self.heap[0] = last;
            self.pos[last] = Some(0);
            self.sift_down(0, activity);
        }
        Some(top)
    }

    fn bumped(&mut self, v: usize, activity: &[f64]) {
        if let Some(i) = self.pos[v] {
            self.sift_up(i, activity);
        }
    }

    fn sift_up(&mut self, mut i: usize, activity: &[f64]) {
        let v = self.heap[i];
        while i > 0 {
            let parent = (i - 1) / 2;
            let p = self.heap[parent];
            if activity[p] >= activity[v] {
                break;
            }
            self.heap[i] = p;
            self.pos[p] = Some(i);
            i = parent;
        }
        self.heap[i] = v;
        self.pos[v] = Some(i);
    }

    fn sift_down(&mut self, mut i: usize, activity: &[f64]) {
        let v = self.heap[i];
        let n = self.heap.len();
        loop {
            let left = 2 * i + 1;
            if left >= n {
                break;
            }
            let right = left + 1;
            let child = if right < n && activity[self.heap[right]] > activity[self.heap[left]] {
                right
            } else {
                left
            };
            if activity[self.heap[child]] <= activity[v] {
                break;
            }
            let c = self.heap[child];
            self.heap[i] = c;
            self.pos[c] = Some(i);
            i = child;
        }
        self.heap[i] = v;
        self.pos[v] = Some(i);
    }
}

/// Why a search stopped.
enum Stop {
    Sat,
    Unsat,
    Budget,
}

/// Incremental CDCL [`SatSolver`] enforcing both the conflict budget and the deadline of
/// [`Limits`] inside the search.
///
/// The conflict budget counts the conflicts of one call. The clock is read every few
/// conflicts or decisions, so a call overshoots its deadline by a handful of propagations
/// at most.
pub struct CdclSolver {
    n_vars: usize,
    /// False once the clauses are known to be unsatisfiable without assumptions.
    ok: bool,
    /// The first two literals of a clause are the watched ones. A propagated literal is
    /// always the first literal of its reason.
    clauses: Vec<Vec<Lit>>,
    /// Clauses watching each literal, indexed by [`Lit::code`].
    watches: Vec<Vec<usize>>,
    assigns: Vec<Option<bool>>,
    level: Vec<usize>,
    reason: Vec<Option<usize>>,
    trail: Vec<Lit>,
    trail_lim: Vec<usize>,
    qhead: usize,
    activity: Vec<f64>,
    var_inc: f64,
    order: VarOrder,
    /// Saved phase, true meaning the variable is next decided false.
    polarity: Vec<bool>,
    seen: Vec<bool>,
    model: Vec<Option<bool>>,
    core: Vec<Lit>,
    n_calls: usize,
    n_conflicts: u64,
    n_learnts: usize,
}

impl Default for CdclSolver {
    fn default() -> Self {
        CdclSolver::new()
    }
}

impl CdclSolver {
    pub fn new() -> Self {
        let mut solver = CdclSolver {
            n_vars: 0,
            ok: true,
            clauses: Vec::new(),
            watches: Vec::new(),
            assigns: Vec::new(),
            level: Vec::new(),
            reason: Vec::new(),
            trail: Vec::new(),
            trail_lim: Vec::new(),
            qhead: 0,
            activity: Vec::new(),
            var_inc: 1.0,
            order: VarOrder::default(),
            polarity: Vec::new(),
            seen: Vec::new(),
            model: Vec::new(),
            core: Vec::new(),
            n_calls: 0,
            n_conflicts: 0,
            n_learnts: 0,
        };
        solver.grow(1);
        solver
    }

    pub fn n_calls(&self) -> usize {
        self.n_calls
    }

    /// Conflicts met over all calls.
    pub fn n_conflicts(&self) -> u64 {
        self.n_conflicts
    }

    pub fn n_learnts(&self) -> usize {
        self.n_learnts
    }

    fn grow(&mut self, n: usize) {
        if n <= self.n_vars {
            return;
        }
        self.assigns.resize(n, None);
        self.level.resize(n, 0);
        self.reason.resize(n, None);
        self.activity.resize(n, 0.0);
        self.polarity.resize(n, true);
        self.seen.resize(n, false);
        self.watches.resize(2 * n, Vec::new());
        self.order.grow(n);
        for v in self.n_vars..n {
            self.order.insert(v, &self.activity);
        }
        self.n_vars = n;
    }

    fn decision_level(&self) -> usize {
        self.trail_lim.len()
    }

    fn value_of(&self, lit: Lit) -> Option<bool> {
        lit_value(&self.assigns, lit)
    }

    fn assign(&mut self, lit: Lit, reason: Option<usize>) {
        let v = lit.var().index();
        debug_assert!(self.assigns[v].is_none());
        self.assigns[v] = Some(!lit.is_negated());
        self.level[v] = self.decision_level();
        self.reason[v] = reason;
        self.trail.push(lit);
    }

    fn attach(&mut self, lits: Vec<Lit>) -> usize {
        let cr = self.clauses.len();
        self.watches[lits[0].code() as usize].push(cr);
        self.watches[lits[1].code() as usize].push(cr);
        self.clauses.push(lits);
        cr
    }

    fn cancel_until(&mut self, level: usize) {
        if self.decision_level() <= level {
            return;
        }
        let start = self.trail_lim[level];
        for i in (start..self.trail.len()).rev() {
            let lit = self.trail[i];
            let v = lit.var().index();
            self.polarity[v] = lit.is_negated();
            self.assigns[v] = None;
            self.reason[v] = None;
            self.order.insert(v, &self.activity);
        }
        self.trail.truncate(start);
        self.trail_lim.truncate(level);
        self.qhead = self.trail.len();
    }

    /// Unit propagation. Returns the falsified clause on a conflict.
    fn propagate(&mut self) -> Option<usize> {
        while self.qhead < self.trail.len() {
            let false_lit = !self.trail[self.qhead];
            self.qhead += 1;
            let mut watchers = std::mem::take(&mut self.watches[false_lit.code() as usize]);
            let (mut i, mut j) = (0, 0);
            let mut conflict = None;
            while i < watchers.len() {
                let cr = watchers[i];
                i += 1;
                let lits = &mut self.clauses[cr];
                if lits[0] == false_lit {
                    lits.swap(0, 1);
                }
                let first = lits[0];
                if lit_value(&self.assigns, first) == Some(true) {
                    watchers[j] = cr;
                    j += 1;
                    continue;
                }
                if let Some(k) =
                    (2..lits.len()).find(|&k| lit_value(&self.assigns, lits[k]) != Some(false))
                {
                    lits.swap(1, k);
                    self.watches[lits[1].code() as usize].push(cr);
                    continue;
                }
                watchers[j] = cr;
                j += 1;
                if lit_value(&self.assigns, first) == Some(false) {
                    conflict = Some(cr);
                    while i < watchers.len() {
                        watchers[j] = watchers[i];
                        j += 1;
                        i += 1;
                    }
                    self.qhead = self.trail.len();
                } else {
                    self.assign(first, Some(cr));
                }
            }
            watchers.truncate(j);
            self.watches[false_lit.code() as usize] = watchers;
            if conflict.is_some() {
                return conflict;
            }
        }
        None
    }

    fn bump(&mut self, v: usize) {
        self.activity[v] += self.var_inc;
        if self.activity[v] > 1e100 {
            for a in self.activity.iter_mut() {
                *a *= 1e-100;
            }
            self.var_inc *= 1e-100;
        }
        self.order.bumped(v, &self.activity);
    }

    /// First-UIP conflict analysis. Returns the learnt clause, asserting literal first and a
    /// literal of the backjump level second, and the backjump level.
    fn analyze(&mut self, mut confl: usize) -> (Vec<Lit>, usize) {
        let mut learnt = vec![Var(0).pos()];
        let mut pending = 0;
        let mut index = self.trail.len();
        let mut uip = None;
        loop {
            let start = if uip.is_none() { 0 } else { 1 };
            for k in start..self.clauses[confl].len() {
                let q = self.clauses[confl][k];
                let v = q.var().index();
                if !self.seen[v] && self.level[v] > 0 {
                    self.bump(v);
                    self.seen[v] = true;
                    if self.level[v] >= self.decision_level() {
                        pending += 1;
                    } else {
                        learnt.push(q);
                    }
                }
            }
            loop {
                index -= 1;
                if self.seen[self.trail[index].var().index()] {
                    break;
                }
            }
            let p = self.trail[index];
            let v = p.var().index();
            self.seen[v] = false;
            pending -= 1;
            uip = Some(p);
            if pending == 0 {
                break;
            }
            let Some(r) = self.reason[v] else {
                unreachable!("only the first UIP of a conflict can be a decision");
            };
            confl = r;
        }
        if let Some(p) = uip {
            learnt[0] = !p;
        }
        for lit in &learnt[1..] {
            self.seen[lit.var().index()] = false;
        }

        let mut backjump = 0;
        if learnt.len() > 1 {
            let mut max = 1;
            for k in 2..learnt.len() {
                if self.level[learnt[k].var().index()] > self.level[learnt[max].var().index()] {
                    max = k;
                }
            }
            learnt.swap(1, max);
            backjump = self.level[learnt[1].var().index()];
        }
        (learnt, backjump)
    }

    /// Explains why the assumption `p` is false, as the set of assumptions implying `!p`,
    /// `p` included.
    fn analyze_final(&mut self, p: Lit) -> Vec<Lit> {
        let mut core = vec![p];
        if self.decision_level() == 0 {
            return core;
        }
        self.seen[p.var().index()] = true;
        for i in (self.trail_lim[0]..self.trail.len()).rev() {
            let lit = self.trail[i];
            let v = lit.var().index();
            if !self.seen[v] {
                continue;
            }
            match self.reason[v] {
                // Every decision made so far is an assumption
                None => core.push(lit),
                Some(cr) => {
                    for k in 1..self.clauses[cr].len() {
                        let u = self.clauses[cr][k].var().index();
                        if self.level[u] > 0 {
                            self.seen[u] = true;
                        }
                    }
                }
            }
            self.seen[v] = false;
        }
        self.seen[p.var().index()] = false;
        core
    }

    fn pick_branch(&mut self) -> Option<Lit> {
        loop {
            let v = self.order.pop(&self.activity)?;
            if self.assigns[v].is_none() {
                return Some(Var(v as u32).lit(self.polarity[v]));
            }
        }
    }

    fn search(&mut self, assumptions: &[Lit], limits: &Limits) -> Stop {
        let mut conflicts = 0u64;
        let mut restarts = 0u64;
        let mut restart_limit = RESTART_BASE;
        let mut since_restart = 0u64;
        let mut steps = 0u64;
        loop {
            steps += 1;
            if steps % CLOCK_PERIOD == 0 && limits.expired() {
                return Stop::Budget;
            }

            if let Some(confl) = self.propagate() {
                conflicts += 1;
                since_restart += 1;
                self.n_conflicts += 1;
                if self.decision_level() == 0 {
                    self.ok = false;
                    return Stop::Unsat;
                }
                let (learnt, backjump) = self.analyze(confl);
                self.cancel_until(backjump);
                let asserting = learnt[0];
                if learnt.len() == 1 {
                    self.assign(asserting, None);
                } else {
                    let cr = self.attach(learnt);
                    self.n_learnts += 1;
                    self.assign(asserting, Some(cr));
                }
                self.var_inc /= VAR_DECAY;
                if limits.conflicts.is_some_and(|max| conflicts >= max) {
                    return Stop::Budget;
                }
                continue;
            }

            if limits.conflicts.is_some_and(|max| conflicts >= max) {
                return Stop::Budget;
            }
            if since_restart >= restart_limit {
                restarts += 1;
                since_restart = 0;
                restart_limit = luby(restarts) * RESTART_BASE;
                trace!("restart {} after {} conflicts", restarts, conflicts);
                self.cancel_until(0);
                continue;
            }

            let mut next = None;
            while self.decision_level() < assumptions.len() {
                let p = assumptions[self.decision_level()];
                match self.value_of(p) {
                    Some(true) => self.trail_lim.push(self.trail.len()),
                    Some(false) => {
                        self.core = self.analyze_final(p);
                        return Stop::Unsat;
                    }
                    None => {
                        next = Some(p);
                        break;
                    }
                }
            }
            let next = match next.or_else(|| self.pick_branch()) {
                Some(lit) => lit,
                None => return Stop::Sat,
            };
            self.trail_lim.push(self.trail.len());
            self.assign(next, None);
        }
    }
}

impl SatSolver for CdclSolver {
    fn new_var(&mut self) -> Var {
        let var = Var(self.n_vars as u32);
        self.grow(self.n_vars + 1);
        var
    }

    fn n_vars(&self) -> usize {
        self.n_vars
    }

    fn set_var_count(&mut self, n: usize) {
        self.grow(n);
    }

    fn add_clause(&mut self, clause: &[Lit]) {
        debug_assert!(clause.iter().all(|l| l.var().index() < self.n_vars));
        if let Some(max) = clause.iter().map(|l| l.var().index()).max() {
            self.grow(max + 1);
        }
        if !self.ok {
            return;
        }
        debug_assert_eq!(self.decision_level(), 0);

        let mut lits = clause.to_vec();
        lits.sort_unstable();
        lits.dedup();
        let mut kept = Vec::with_capacity(lits.len());
        for (i, &lit) in lits.iter().enumerate() {
            // A literal and its negation are adjacent once sorted
            if i > 0 && lits[i - 1] == !lit {
                return;
            }
            match self.value_of(lit) {
                Some(true) => return,
                Some(false) => (),
                None => kept.push(lit),
            }
        }
        match kept.len() {
            0 => self.ok = false,
            1 => {
                self.assign(kept[0], None);
                if self.propagate().is_some() {
                    self.ok = false;
                }
            }
            _ => {
                self.attach(kept);
            }
        }
    }

    fn solve(&mut self, assumptions: &[Lit], limits: &Limits) -> Result<SolveResult> {
        self.model.clear();
        self.core.clear();
        if limits.expired() {
            return Ok(SolveResult::Undecided);
        }
        self.n_calls += 1;
        if let Some(max) = assumptions.iter().map(|l| l.var().index()).max() {
            self.grow(max + 1);
        }
        if !self.ok {
            debug!("sat call {}: UNSAT without assumptions", self.n_calls);
            return Ok(SolveResult::Unsat);
        }

        let conflicts_before = self.n_conflicts;
        let result = match self.search(assumptions, limits) {
            Stop::Sat => {
                self.model = self.assigns.clone();
                SolveResult::Sat
            }
            Stop::Unsat => SolveResult::Unsat,
            Stop::Budget => SolveResult::Undecided,
        };
        self.cancel_until(0);
        debug!(
            "sat call {}: {:?} after {} conflicts, core of {} out of {} assumptions",
            self.n_calls,
            result,
            self.n_conflicts - conflicts_before,
            self.core.len(),
            assumptions.len()
        );
        Ok(result)
    }

    fn value(&self, var: Var) -> Option<bool> {
        self.model.get(var.index()).copied().flatten()
    }

    fn final_conflict(&self) -> Vec<Lit> {
        self.core.clone()
    }
}
