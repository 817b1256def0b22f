// src/solver/backend.rs
//
// The opaque solver-engine contract.
// - SolverView:    read-only queries, legal while resting or suspended
// - SolverBackend: owning operations plus the reentrant callback solve
// - CallbackSpec / Callback / Decision: the decision-point protocol
//
// Backends are driven by the Model facade in solver/mod.rs; nothing above
// that layer touches a backend directly.

use serde::{Deserialize, Serialize};

use super::problem::ProblemData;
use super::{ParamValue, SolverError, Stage};

/// Read-only view of an engine, available between transitions and at
/// decision points.
pub trait SolverView {
    fn name(&self) -> String;
    fn stage(&self) -> Stage;
    fn num_vars(&self) -> usize;
    /// Objective value of the incumbent, or the engine's infinity when no
    /// solution is known yet.
    fn primal_bound(&self) -> f64;
    /// Best proven bound on the optimal objective value.
    fn dual_bound(&self) -> f64;
    fn is_solved(&self) -> bool;
    /// Cumulative LP iteration count for the current problem.
    fn lp_iterations(&self) -> u64;
    /// Number of branch-and-bound nodes processed so far.
    fn n_nodes(&self) -> u64;
    /// Seconds spent solving. `wall` selects wall-clock measurement.
    fn solving_time(&self, wall: bool) -> f64;
    /// Per-variable pseudocosts, NaN where not applicable. Indexed by
    /// original-problem variable position.
    fn pseudocosts(&self) -> Vec<f64>;
    /// Variable view at the current point of the search.
    fn variables(&self) -> Vec<VarView>;
    /// Row view at the current point of the search.
    fn rows(&self) -> Vec<RowView>;
    fn get_param(&self, name: &str) -> Result<ParamValue, SolverError>;
}

/// Owning engine operations.
///
/// `solve` is the reentrant primitive: it runs the search and calls
/// `hooks.on_callback` at every decision point selected by `specs`,
/// applying the returned decision before resuming.
pub trait SolverBackend: SolverView + Send {
    fn load(&mut self, data: ProblemData) -> Result<(), SolverError>;
    /// A fresh backend holding a copy of the original (untouched) problem
    /// definition. Parameters are not copied.
    fn copy_orig(&self) -> Result<Box<dyn SolverBackend>, SolverError>;
    /// The original problem definition.
    fn orig_problem(&self) -> ProblemData;
    fn set_param(&mut self, name: &str, value: ParamValue) -> Result<(), SolverError>;
    fn transform_prob(&mut self) -> Result<(), SolverError>;
    fn presolve(&mut self) -> Result<(), SolverError>;
    /// Solve to completion without any callbacks installed.
    fn solve_full(&mut self) -> Result<(), SolverError>;
    /// Solve with the given callbacks installed, deferring to `hooks` at
    /// every decision point.
    fn solve(
        &mut self,
        specs: &[CallbackSpec],
        hooks: &mut dyn SolveHooks,
    ) -> Result<(), SolverError>;
    fn write_problem(&self, path: &std::path::Path) -> Result<(), SolverError>;
}

/// Receiver for engine decision points.
pub trait SolveHooks {
    fn on_callback(&mut self, view: &dyn SolverView, callback: Callback) -> Decision;
}

/// Which decision points a solve should surface.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum CallbackSpec {
    /// Install a maximal-priority branching rule.
    Branchrule {
        /// Offer the pseudo candidate set instead of the LP-fractional set.
        pseudo_candidates: bool,
    },
    /// Install a maximal-priority primal heuristic running after node
    /// processing, gated by tree depth.
    Heuristic {
        /// Trials offered per node, -1 for an unbounded budget.
        trials_per_node: i32,
        /// Depth frequency between heuristic calls.
        depth_freq: i32,
        /// Depth at which calls start.
        depth_start: i32,
        /// Depth after which calls stop, -1 for no ceiling.
        depth_stop: i32,
    },
}

/// A suspended decision point.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum Callback {
    /// Branching candidate selection. Candidates are variable indices by
    /// original-problem position, in arbitrary order.
    Branchrule { candidates: Vec<usize> },
    /// Primal-search opportunity over the outstanding discrete candidates.
    Heuristic { candidates: Vec<usize>, depth: u32 },
}

/// The caller's answer to a decision point.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum Decision {
    /// Branch on the given variable.
    BranchOn(usize),
    /// Defer to the engine's default branching rule.
    BranchDefault,
    /// Submit a partial variable-value assignment for completion. An empty
    /// assignment is a no-op trial.
    PartialSolution(Vec<(usize, f64)>),
    /// Stop the search. Used on teardown; the solve returns an
    /// interruption error.
    Abort,
}

/// Variable data exported by the engine at the current search point.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VarView {
    pub name: String,
    pub objective: f64,
    pub lower_bound: Option<f64>,
    pub upper_bound: Option<f64>,
    pub integral: bool,
    /// Value the variable is fixed to at the current node, if any.
    pub fixed_value: Option<f64>,
}

/// Row data exported by the engine at the current search point.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RowView {
    pub name: String,
    pub lhs: Option<f64>,
    pub rhs: Option<f64>,
    /// Sparse coefficients as (variable index, coefficient) pairs.
    pub coefficients: Vec<(usize, f64)>,
}
