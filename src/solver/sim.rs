// src/solver/sim.rs
//
// Bundled reference backend: a deterministic depth-first branch-and-bound
// over pure-integer problems with finite variable bounds. There is no LP;
// node bounds come from best-case objective contributions, so the pseudo
// and fractional candidate sets coincide (every unfixed integer variable).
//
// This backend exists so environments can be driven end to end in tests
// and demos. It is not a production solver.

use std::collections::BTreeMap;
use std::path::Path;
use std::time::Instant;

use super::backend::{
    Callback, CallbackSpec, Decision, RowView, SolveHooks, SolverBackend, SolverView, VarView,
};
use super::problem::{ProblemData, Sense};
use super::{ParamValue, SolverError, Stage};

/// The engine's notion of infinity for objective bounds.
pub const SOLVER_INFINITY: f64 = 1e20;

const FEAS_TOL: f64 = 1e-6;

#[derive(Debug, Clone, Copy)]
struct BranchCfg {
    // The candidate sets coincide in this backend; the flag is accepted
    // for contract compatibility.
    #[allow(dead_code)]
    pseudo_candidates: bool,
}

#[derive(Debug, Clone, Copy)]
struct HeurCfg {
    trials_per_node: i32,
    depth_freq: i32,
    depth_start: i32,
    depth_stop: i32,
}

impl HeurCfg {
    fn eligible(&self, depth: i32) -> bool {
        depth >= self.depth_start
            && self.depth_freq >= 1
            && (depth - self.depth_start) % self.depth_freq == 0
            && (self.depth_stop < 0 || depth <= self.depth_stop)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Flow {
    Continue,
    Limit,
    Abort,
}

/// Deterministic depth-first branch-and-bound backend.
pub struct SimSolver {
    orig: ProblemData,
    problem: ProblemData,
    params: BTreeMap<String, ParamValue>,
    stage: Stage,
    solved: bool,
    // Node state, meaningful while a search is running.
    fixed: Vec<Option<f64>>,
    root_bound: f64,
    incumbent: Option<Vec<f64>>,
    incumbent_obj: f64,
    n_nodes: u64,
    lp_iterations: u64,
    accumulated_time: f64,
    started: Option<Instant>,
}

fn empty_problem() -> ProblemData {
    ProblemData {
        name: "Model".to_string(),
        sense: Sense::Minimize,
        variables: Vec::new(),
        constraints: Vec::new(),
    }
}

fn default_params() -> BTreeMap<String, ParamValue> {
    let mut params = BTreeMap::new();
    params.insert(
        "randomization/permutationseed".to_string(),
        ParamValue::Int(0),
    );
    params.insert(
        "randomization/randomseedshift".to_string(),
        ParamValue::Int(0),
    );
    params.insert("randomization/lpseed".to_string(), ParamValue::Int(0));
    params.insert("limits/totalnodes".to_string(), ParamValue::Int(-1));
    params.insert("presolving/maxrounds".to_string(), ParamValue::Int(-1));
    params.insert("separating/maxrounds".to_string(), ParamValue::Int(-1));
    params
}

impl SimSolver {
    pub fn new() -> Self {
        Self {
            orig: empty_problem(),
            problem: empty_problem(),
            params: default_params(),
            stage: Stage::Problem,
            solved: false,
            fixed: Vec::new(),
            root_bound: 0.0,
            incumbent: None,
            incumbent_obj: 0.0,
            n_nodes: 0,
            lp_iterations: 0,
            accumulated_time: 0.0,
            started: None,
        }
    }

    fn infinity(&self) -> f64 {
        match self.problem.sense {
            Sense::Minimize => SOLVER_INFINITY,
            Sense::Maximize => -SOLVER_INFINITY,
        }
    }

    /// Whether objective `a` is strictly better than `b` under the
    /// problem's sense.
    fn better(&self, a: f64, b: f64) -> bool {
        match self.problem.sense {
            Sense::Minimize => a < b - 1e-9,
            Sense::Maximize => a > b + 1e-9,
        }
    }

    fn node_limit(&self) -> Option<u64> {
        match self.params.get("limits/totalnodes") {
            Some(ParamValue::Int(n)) if *n >= 0 => Some(*n as u64),
            _ => None,
        }
    }

    fn int_bounds(&self, var: usize) -> (i64, i64) {
        let v = &self.problem.variables[var];
        // Bounds are validated finite at load.
        let lb = v.lower_bound.unwrap_or(0.0).ceil() as i64;
        let ub = v.upper_bound.unwrap_or(0.0).floor() as i64;
        (lb, ub)
    }

    fn unfixed_candidates(&self) -> Vec<usize> {
        (0..self.problem.variables.len())
            .filter(|&i| self.fixed.get(i).map_or(true, |f| f.is_none()))
            .collect()
    }

    fn objective_of(&self, values: &[f64]) -> f64 {
        self.problem
            .variables
            .iter()
            .zip(values)
            .map(|(v, x)| v.objective * x)
            .sum()
    }

    /// Best-case objective over the current fixings: fixed variables
    /// contribute their value, free variables their best bound.
    fn relaxation_bound(&self) -> f64 {
        let mut bound = 0.0;
        for (i, var) in self.problem.variables.iter().enumerate() {
            if let Some(v) = self.fixed.get(i).copied().flatten() {
                bound += var.objective * v;
                continue;
            }
            let lb = var.lower_bound.unwrap_or(0.0);
            let ub = var.upper_bound.unwrap_or(0.0);
            let (a, b) = (var.objective * lb, var.objective * ub);
            bound += match self.problem.sense {
                Sense::Minimize => a.min(b),
                Sense::Maximize => a.max(b),
            };
        }
        bound
    }

    fn is_feasible(&self, values: &[f64]) -> bool {
        for cons in &self.problem.constraints {
            let activity: f64 = cons
                .coefficients
                .iter()
                .map(|&(idx, coef)| coef * values[idx])
                .sum();
            if let Some(lhs) = cons.lhs {
                if activity < lhs - FEAS_TOL {
                    return false;
                }
            }
            if let Some(rhs) = cons.rhs {
                if activity > rhs + FEAS_TOL {
                    return false;
                }
            }
        }
        true
    }

    fn submit_if_improving(&mut self, values: Vec<f64>) -> bool {
        if !self.is_feasible(&values) {
            return false;
        }
        let obj = self.objective_of(&values);
        if self.incumbent.is_none() || self.better(obj, self.incumbent_obj) {
            self.incumbent_obj = obj;
            self.incumbent = Some(values);
        }
        true
    }

    /// Complete the current fixings with a partial assignment plus
    /// objective-greedy bound fixing, then check feasibility. Feasible
    /// improving completions become the incumbent.
    fn try_partial_solution(&mut self, assignment: &[(usize, f64)]) -> Result<bool, SolverError> {
        if assignment.is_empty() {
            return Ok(false);
        }
        let n = self.problem.variables.len();
        let mut values = self.fixed.clone();
        for &(idx, value) in assignment {
            if idx >= n {
                return Err(SolverError::InvalidVariable {
                    index: idx,
                    num_vars: n,
                });
            }
            if (value - value.round()).abs() > FEAS_TOL {
                return Err(SolverError::Unsupported {
                    message: format!(
                        "fractional value {} for integer variable {}",
                        value, idx
                    ),
                });
            }
            if let Some(existing) = values[idx] {
                if (existing - value).abs() > FEAS_TOL {
                    // Conflicts with a node fixing: the trial fails.
                    return Ok(false);
                }
            }
            values[idx] = Some(value);
        }
        let full: Vec<f64> = values
            .iter()
            .enumerate()
            .map(|(i, v)| match v {
                Some(x) => *x,
                None => {
                    let var = &self.problem.variables[i];
                    let lb = var.lower_bound.unwrap_or(0.0);
                    let ub = var.upper_bound.unwrap_or(0.0);
                    match self.problem.sense {
                        Sense::Minimize => {
                            if var.objective * lb <= var.objective * ub {
                                lb
                            } else {
                                ub
                            }
                        }
                        Sense::Maximize => {
                            if var.objective * lb >= var.objective * ub {
                                lb
                            } else {
                                ub
                            }
                        }
                    }
                }
            })
            .collect();
        Ok(self.submit_if_improving(full))
    }

    fn begin_solve(&mut self) {
        self.stage = Stage::Solving;
        self.fixed = vec![None; self.problem.variables.len()];
        self.root_bound = self.relaxation_bound();
        self.started = Some(Instant::now());
    }

    fn end_solve(&mut self, flow: Flow) -> Result<(), SolverError> {
        if let Some(started) = self.started.take() {
            self.accumulated_time += started.elapsed().as_secs_f64();
        }
        self.fixed = vec![None; self.problem.variables.len()];
        match flow {
            Flow::Continue => {
                self.stage = Stage::Solved;
                self.solved = true;
                Ok(())
            }
            // Limits leave the search interruptible-but-resumable.
            Flow::Limit => Ok(()),
            Flow::Abort => Err(SolverError::Interrupted),
        }
    }

    fn search(
        &mut self,
        depth: u32,
        branch: Option<BranchCfg>,
        heur: Option<HeurCfg>,
        hooks: &mut dyn SolveHooks,
    ) -> Result<Flow, SolverError> {
        if let Some(limit) = self.node_limit() {
            if self.n_nodes >= limit {
                return Ok(Flow::Limit);
            }
        }
        self.n_nodes += 1;

        let candidates = self.unfixed_candidates();
        self.lp_iterations += 1 + candidates.len() as u64;

        let bound = self.relaxation_bound();
        if self.incumbent.is_some() && !self.better(bound, self.incumbent_obj) {
            return Ok(Flow::Continue);
        }

        if let Some(h) = heur {
            if h.eligible(depth as i32) {
                let flow = self.run_heuristic(depth, h, hooks)?;
                if flow != Flow::Continue {
                    return Ok(flow);
                }
            }
        }

        let candidates = self.unfixed_candidates();
        if candidates.is_empty() {
            let values: Vec<f64> = self.fixed.iter().map(|v| v.unwrap_or(0.0)).collect();
            self.submit_if_improving(values);
            return Ok(Flow::Continue);
        }

        let var = match branch {
            Some(_) => {
                let callback = Callback::Branchrule {
                    candidates: candidates.clone(),
                };
                match hooks.on_callback(&*self, callback) {
                    Decision::BranchOn(idx) => {
                        let n = self.problem.variables.len();
                        if idx >= n || self.fixed[idx].is_some() {
                            return Err(SolverError::InvalidVariable {
                                index: idx,
                                num_vars: n,
                            });
                        }
                        idx
                    }
                    Decision::BranchDefault => candidates[0],
                    Decision::Abort => return Ok(Flow::Abort),
                    Decision::PartialSolution(_) => {
                        return Err(SolverError::UnexpectedDecision {
                            expected: "branching",
                        })
                    }
                }
            }
            None => candidates[0],
        };

        let (lb, ub) = self.int_bounds(var);
        for value in lb..=ub {
            self.fixed[var] = Some(value as f64);
            let flow = self.search(depth + 1, branch, heur, hooks)?;
            if flow != Flow::Continue {
                self.fixed[var] = None;
                return Ok(flow);
            }
        }
        self.fixed[var] = None;
        Ok(Flow::Continue)
    }

    fn run_heuristic(
        &mut self,
        depth: u32,
        cfg: HeurCfg,
        hooks: &mut dyn SolveHooks,
    ) -> Result<Flow, SolverError> {
        let mut trials = 0i64;
        loop {
            if cfg.trials_per_node >= 0 && trials >= cfg.trials_per_node as i64 {
                break;
            }
            let candidates = self.unfixed_candidates();
            if candidates.is_empty() {
                break;
            }
            let callback = Callback::Heuristic { candidates, depth };
            match hooks.on_callback(&*self, callback) {
                Decision::PartialSolution(assignment) => {
                    let found = self.try_partial_solution(&assignment)?;
                    trials += 1;
                    // With an unbounded budget, a successful trial moves
                    // the search on.
                    if cfg.trials_per_node < 0 && found {
                        break;
                    }
                }
                Decision::Abort => return Ok(Flow::Abort),
                Decision::BranchOn(_) | Decision::BranchDefault => {
                    return Err(SolverError::UnexpectedDecision {
                        expected: "partial solution",
                    })
                }
            }
        }
        Ok(Flow::Continue)
    }

    fn check_solvable(&self) -> Result<(), SolverError> {
        match self.stage {
            Stage::Problem | Stage::Transformed | Stage::Presolved | Stage::Solving => Ok(()),
            Stage::Presolving => Err(SolverError::WrongStage {
                operation: "solve",
                stage: self.stage,
            }),
            Stage::Solved => Ok(()),
        }
    }
}

impl Default for SimSolver {
    fn default() -> Self {
        Self::new()
    }
}

impl SolverView for SimSolver {
    fn name(&self) -> String {
        self.problem.name.clone()
    }

    fn stage(&self) -> Stage {
        self.stage
    }

    fn num_vars(&self) -> usize {
        self.problem.variables.len()
    }

    fn primal_bound(&self) -> f64 {
        if self.incumbent.is_some() {
            self.incumbent_obj
        } else {
            self.infinity()
        }
    }

    fn dual_bound(&self) -> f64 {
        if self.solved {
            self.primal_bound()
        } else if matches!(self.stage, Stage::Solving) {
            self.root_bound
        } else {
            -self.infinity()
        }
    }

    fn is_solved(&self) -> bool {
        self.solved
    }

    fn lp_iterations(&self) -> u64 {
        self.lp_iterations
    }

    fn n_nodes(&self) -> u64 {
        self.n_nodes
    }

    fn solving_time(&self, _wall: bool) -> f64 {
        let running = self
            .started
            .as_ref()
            .map(|s| s.elapsed().as_secs_f64())
            .unwrap_or(0.0);
        self.accumulated_time + running
    }

    fn pseudocosts(&self) -> Vec<f64> {
        self.problem
            .variables
            .iter()
            .enumerate()
            .map(|(i, var)| {
                let free = self.fixed.get(i).map_or(true, |f| f.is_none());
                if var.integral && free {
                    var.objective.abs()
                } else {
                    f64::NAN
                }
            })
            .collect()
    }

    fn variables(&self) -> Vec<VarView> {
        self.problem
            .variables
            .iter()
            .enumerate()
            .map(|(i, var)| VarView {
                name: var.name.clone(),
                objective: var.objective,
                lower_bound: var.lower_bound,
                upper_bound: var.upper_bound,
                integral: var.integral,
                fixed_value: self.fixed.get(i).copied().flatten(),
            })
            .collect()
    }

    fn rows(&self) -> Vec<RowView> {
        self.problem
            .constraints
            .iter()
            .map(|cons| RowView {
                name: cons.name.clone(),
                lhs: cons.lhs,
                rhs: cons.rhs,
                coefficients: cons.coefficients.clone(),
            })
            .collect()
    }

    fn get_param(&self, name: &str) -> Result<ParamValue, SolverError> {
        self.params
            .get(name)
            .cloned()
            .ok_or_else(|| SolverError::UnknownParam {
                name: name.to_string(),
            })
    }
}

impl SolverBackend for SimSolver {
    fn load(&mut self, data: ProblemData) -> Result<(), SolverError> {
        data.validate()
            .map_err(|message| SolverError::InvalidProblem { message })?;
        for (i, var) in data.variables.iter().enumerate() {
            if !var.integral {
                return Err(SolverError::Unsupported {
                    message: format!("variable {} is continuous", i),
                });
            }
            match (var.lower_bound, var.upper_bound) {
                (Some(lb), Some(ub)) if lb <= ub => {}
                _ => {
                    return Err(SolverError::Unsupported {
                        message: format!("variable {} needs finite ordered bounds", i),
                    })
                }
            }
        }
        self.orig = data.clone();
        self.problem = data;
        self.stage = Stage::Problem;
        self.solved = false;
        self.fixed = Vec::new();
        self.incumbent = None;
        self.incumbent_obj = 0.0;
        self.n_nodes = 0;
        self.lp_iterations = 0;
        self.accumulated_time = 0.0;
        self.started = None;
        Ok(())
    }

    fn copy_orig(&self) -> Result<Box<dyn SolverBackend>, SolverError> {
        let mut fresh = SimSolver::new();
        fresh.load(self.orig.clone())?;
        Ok(Box::new(fresh))
    }

    fn orig_problem(&self) -> ProblemData {
        self.orig.clone()
    }

    fn set_param(&mut self, name: &str, value: ParamValue) -> Result<(), SolverError> {
        match self.params.get(name) {
            Some(existing) => {
                if std::mem::discriminant(existing) != std::mem::discriminant(&value) {
                    return Err(SolverError::WrongParamType {
                        name: name.to_string(),
                        expected: existing.type_name(),
                        got: value.type_name(),
                    });
                }
                self.params.insert(name.to_string(), value);
                Ok(())
            }
            None => Err(SolverError::UnknownParam {
                name: name.to_string(),
            }),
        }
    }

    fn transform_prob(&mut self) -> Result<(), SolverError> {
        match self.stage {
            Stage::Problem => {
                self.stage = Stage::Transformed;
                Ok(())
            }
            stage => Err(SolverError::WrongStage {
                operation: "transform_prob",
                stage,
            }),
        }
    }

    fn presolve(&mut self) -> Result<(), SolverError> {
        match self.stage {
            Stage::Problem | Stage::Transformed => {
                self.stage = Stage::Presolved;
                Ok(())
            }
            stage => Err(SolverError::WrongStage {
                operation: "presolve",
                stage,
            }),
        }
    }

    fn solve_full(&mut self) -> Result<(), SolverError> {
        struct NoHooks;
        impl SolveHooks for NoHooks {
            fn on_callback(&mut self, _view: &dyn SolverView, _callback: Callback) -> Decision {
                Decision::BranchDefault
            }
        }
        self.solve(&[], &mut NoHooks)
    }

    fn solve(
        &mut self,
        specs: &[CallbackSpec],
        hooks: &mut dyn SolveHooks,
    ) -> Result<(), SolverError> {
        self.check_solvable()?;
        if self.solved {
            return Ok(());
        }
        let mut branch = None;
        let mut heur = None;
        for spec in specs {
            match *spec {
                CallbackSpec::Branchrule { pseudo_candidates } => {
                    branch = Some(BranchCfg { pseudo_candidates });
                }
                CallbackSpec::Heuristic {
                    trials_per_node,
                    depth_freq,
                    depth_start,
                    depth_stop,
                } => {
                    heur = Some(HeurCfg {
                        trials_per_node,
                        depth_freq,
                        depth_start,
                        depth_stop,
                    });
                }
            }
        }
        self.begin_solve();
        let flow = match self.search(0, branch, heur, hooks) {
            Ok(flow) => flow,
            Err(e) => {
                self.end_solve(Flow::Limit).ok();
                return Err(e);
            }
        };
        self.end_solve(flow)
    }

    fn write_problem(&self, path: &Path) -> Result<(), SolverError> {
        let text = serde_json::to_string_pretty(&self.orig).map_err(|e| SolverError::Io {
            path: path.display().to_string(),
            source: e.to_string(),
        })?;
        std::fs::write(path, text).map_err(|e| SolverError::Io {
            path: path.display().to_string(),
            source: e.to_string(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::solver::problem::ProblemBuilder;

    /// min x + 2y + 3z  s.t.  x + y >= 1, y + z >= 1, binaries.
    fn small_cover() -> ProblemData {
        let mut b = ProblemBuilder::new("cover3", Sense::Minimize);
        let x = b.add_binary("x", 1.0);
        let y = b.add_binary("y", 2.0);
        let z = b.add_binary("z", 3.0);
        b.add_constraint("c0", vec![(x, 1.0), (y, 1.0)], Some(1.0), None);
        b.add_constraint("c1", vec![(y, 1.0), (z, 1.0)], Some(1.0), None);
        b.build()
    }

    #[test]
    fn solves_small_cover_to_optimum() {
        let mut solver = SimSolver::new();
        solver.load(small_cover()).unwrap();
        solver.solve_full().unwrap();

        assert!(solver.is_solved());
        assert_eq!(solver.stage(), Stage::Solved);
        // Optimum is y = 1 alone with objective 2.
        assert!((solver.primal_bound() - 2.0).abs() < 1e-9);
        assert!((solver.dual_bound() - 2.0).abs() < 1e-9);
    }

    #[test]
    fn branch_callback_fires_and_default_decision_solves() {
        struct Counting {
            calls: usize,
        }
        impl SolveHooks for Counting {
            fn on_callback(&mut self, view: &dyn SolverView, callback: Callback) -> Decision {
                self.calls += 1;
                match callback {
                    Callback::Branchrule { candidates } => {
                        assert!(!candidates.is_empty());
                        for &c in &candidates {
                            assert!(c < view.num_vars());
                        }
                        Decision::BranchDefault
                    }
                    Callback::Heuristic { .. } => Decision::PartialSolution(Vec::new()),
                }
            }
        }

        let mut solver = SimSolver::new();
        solver.load(small_cover()).unwrap();
        let mut hooks = Counting { calls: 0 };
        solver
            .solve(
                &[CallbackSpec::Branchrule {
                    pseudo_candidates: false,
                }],
                &mut hooks,
            )
            .unwrap();

        assert!(hooks.calls > 0);
        assert!((solver.primal_bound() - 2.0).abs() < 1e-9);
    }

    #[test]
    fn node_limit_stops_the_search() {
        let mut solver = SimSolver::new();
        solver.load(small_cover()).unwrap();
        solver
            .set_param("limits/totalnodes", ParamValue::Int(1))
            .unwrap();
        solver.solve_full().unwrap();

        assert!(!solver.is_solved());
        assert!(solver.n_nodes() <= 1);
    }

    #[test]
    fn heuristic_partial_solution_sets_incumbent() {
        struct FullAssign;
        impl SolveHooks for FullAssign {
            fn on_callback(&mut self, _view: &dyn SolverView, callback: Callback) -> Decision {
                match callback {
                    Callback::Heuristic { candidates, .. } => Decision::PartialSolution(
                        candidates.iter().map(|&i| (i, 1.0)).collect(),
                    ),
                    Callback::Branchrule { .. } => Decision::BranchDefault,
                }
            }
        }

        let mut solver = SimSolver::new();
        solver.load(small_cover()).unwrap();
        solver
            .solve(
                &[CallbackSpec::Heuristic {
                    trials_per_node: 1,
                    depth_freq: 1,
                    depth_start: 0,
                    depth_stop: -1,
                }],
                &mut FullAssign,
            )
            .unwrap();

        // All-ones is feasible, so an incumbent exists and the search
        // still proves the true optimum.
        assert!((solver.primal_bound() - 2.0).abs() < 1e-9);
    }

    #[test]
    fn deterministic_across_runs() {
        let run = || {
            let mut solver = SimSolver::new();
            solver.load(small_cover()).unwrap();
            solver.solve_full().unwrap();
            (solver.n_nodes(), solver.lp_iterations(), solver.primal_bound())
        };
        assert_eq!(run(), run());
    }

    #[test]
    fn rejects_continuous_variables() {
        let mut b = ProblemBuilder::new("cont", Sense::Minimize);
        b.add_variable("x", 1.0, Some(0.0), Some(1.0), false);
        let mut solver = SimSolver::new();
        assert!(matches!(
            solver.load(b.build()),
            Err(SolverError::Unsupported { .. })
        ));
    }

    #[test]
    fn unknown_param_is_rejected() {
        let mut solver = SimSolver::new();
        assert!(matches!(
            solver.set_param("no/such/param", ParamValue::Int(1)),
            Err(SolverError::UnknownParam { .. })
        ));
        assert!(matches!(
            solver.set_param("limits/totalnodes", ParamValue::Bool(true)),
            Err(SolverError::WrongParamType { .. })
        ));
    }
}
