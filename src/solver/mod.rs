// src/solver/mod.rs
//
// Model facade over an opaque solver backend.
//
// The engine's native execution model is callback-driven: it blocks inside
// `solve` and hands control to a hook at every decision point. The Model
// turns that into synchronous suspend/resume steps by running the solve on
// a dedicated worker thread and exchanging messages over blocking channels:
//
//   driver                          worker (owns the backend)
//   solve_iter(specs) ───────────►  backend.solve(specs, hooks)
//   ◄── Suspended(callback) ──────  hook blocks at a decision point
//   query(..) ──► Reply(..) ◄─────  hook answers view queries in place
//   solve_iter_continue(decision)►  hook returns the decision
//   ◄── Finished(backend, result)   solve returned, backend handed back
//
// Exactly one solve is in flight per Model. Everything else (parameters,
// presolve, full solve) requires the backend at rest.

pub mod backend;
pub mod problem;
pub mod sim;

use std::fmt;
use std::path::Path;
use std::sync::mpsc;
use std::thread::{self, JoinHandle};

use serde::{Deserialize, Serialize};

pub use backend::{
    Callback, CallbackSpec, Decision, RowView, SolveHooks, SolverBackend, SolverView, VarView,
};
pub use problem::{ConstraintData, ProblemBuilder, ProblemData, Sense, VariableData};
pub use sim::SimSolver;

/// Solve stage of a model, mirroring the engine's lifecycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Stage {
    Problem,
    Transformed,
    Presolving,
    Presolved,
    Solving,
    Solved,
}

/// Typed solver parameter value.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum ParamValue {
    Bool(bool),
    Int(i64),
    Real(f64),
    Str(String),
}

impl ParamValue {
    /// Stable name of the value's type, used in error messages.
    pub fn type_name(&self) -> &'static str {
        match self {
            ParamValue::Bool(_) => "bool",
            ParamValue::Int(_) => "int",
            ParamValue::Real(_) => "real",
            ParamValue::Str(_) => "str",
        }
    }
}

/// Errors raised by the solver layer.
#[derive(Debug, Clone)]
pub enum SolverError {
    InvalidProblem { message: String },
    UnknownParam { name: String },
    WrongParamType { name: String, expected: &'static str, got: &'static str },
    WrongStage { operation: &'static str, stage: Stage },
    /// An operation other than continue was attempted with a solve in flight.
    SolveInProgress { operation: &'static str },
    /// A continue was attempted with no solve in flight.
    NotSolving,
    /// A branching decision referenced an invalid variable.
    InvalidVariable { index: usize, num_vars: usize },
    /// The hook answered a decision point with the wrong decision kind.
    UnexpectedDecision { expected: &'static str },
    /// The search was aborted before completion.
    Interrupted,
    /// The worker thread died or broke protocol; the model is unusable.
    WorkerDied,
    /// The worker thread could not be spawned.
    Thread { source: String },
    Io { path: String, source: String },
    Parse { path: String, source: String },
    Unsupported { message: String },
}

impl fmt::Display for SolverError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SolverError::InvalidProblem { message } => {
                write!(f, "invalid problem: {}", message)
            }
            SolverError::UnknownParam { name } => {
                write!(f, "unknown solver parameter '{}'", name)
            }
            SolverError::WrongParamType { name, expected, got } => {
                write!(
                    f,
                    "parameter '{}' expects {} values, got {}",
                    name, expected, got
                )
            }
            SolverError::WrongStage { operation, stage } => {
                write!(f, "operation '{}' is illegal in stage {:?}", operation, stage)
            }
            SolverError::SolveInProgress { operation } => {
                write!(f, "operation '{}' requires the model at rest", operation)
            }
            SolverError::NotSolving => write!(f, "no solve in flight to continue"),
            SolverError::InvalidVariable { index, num_vars } => {
                write!(f, "variable index {} out of range [0, {})", index, num_vars)
            }
            SolverError::UnexpectedDecision { expected } => {
                write!(f, "decision point expected a {} decision", expected)
            }
            SolverError::Interrupted => write!(f, "solve interrupted"),
            SolverError::WorkerDied => {
                write!(f, "solver worker terminated unexpectedly; model is unusable")
            }
            SolverError::Thread { source } => {
                write!(f, "failed to spawn solver worker: {}", source)
            }
            SolverError::Io { path, source } => {
                write!(f, "failed to access '{}': {}", path, source)
            }
            SolverError::Parse { path, source } => {
                write!(f, "failed to parse problem file '{}': {}", path, source)
            }
            SolverError::Unsupported { message } => write!(f, "unsupported: {}", message),
        }
    }
}

impl std::error::Error for SolverError {}

// --- Worker protocol --------------------------------------------------------

/// Read-only queries serviced while a solve is suspended.
#[derive(Debug, Clone)]
enum Query {
    Name,
    Stage,
    NumVars,
    PrimalBound,
    DualBound,
    IsSolved,
    LpIterations,
    NNodes,
    SolvingTime { wall: bool },
    Pseudocosts,
    Variables,
    Rows,
    GetParam(String),
}

#[derive(Debug)]
enum Reply {
    Name(String),
    Stage(Stage),
    Usize(usize),
    F64(f64),
    Bool(bool),
    U64(u64),
    VecF64(Vec<f64>),
    Variables(Vec<VarView>),
    Rows(Vec<RowView>),
    Param(Result<ParamValue, SolverError>),
}

enum WorkerMsg {
    Suspended(Callback),
    Reply(Reply),
    Finished {
        backend: Box<dyn SolverBackend>,
        result: Result<(), SolverError>,
    },
}

enum DriverMsg {
    Resume(Decision),
    Query(Query),
}

fn answer<V: SolverView + ?Sized>(view: &V, query: Query) -> Reply {
    match query {
        Query::Name => Reply::Name(view.name()),
        Query::Stage => Reply::Stage(view.stage()),
        Query::NumVars => Reply::Usize(view.num_vars()),
        Query::PrimalBound => Reply::F64(view.primal_bound()),
        Query::DualBound => Reply::F64(view.dual_bound()),
        Query::IsSolved => Reply::Bool(view.is_solved()),
        Query::LpIterations => Reply::U64(view.lp_iterations()),
        Query::NNodes => Reply::U64(view.n_nodes()),
        Query::SolvingTime { wall } => Reply::F64(view.solving_time(wall)),
        Query::Pseudocosts => Reply::VecF64(view.pseudocosts()),
        Query::Variables => Reply::Variables(view.variables()),
        Query::Rows => Reply::Rows(view.rows()),
        Query::GetParam(name) => Reply::Param(view.get_param(&name)),
    }
}

/// Hook implementation living on the worker thread. Suspends each decision
/// point over the handoff channel and services view queries until resumed.
struct ChannelHooks {
    rx: mpsc::Receiver<DriverMsg>,
    tx: mpsc::Sender<WorkerMsg>,
}

impl SolveHooks for ChannelHooks {
    fn on_callback(&mut self, view: &dyn SolverView, callback: Callback) -> Decision {
        if self.tx.send(WorkerMsg::Suspended(callback)).is_err() {
            return Decision::Abort;
        }
        loop {
            match self.rx.recv() {
                Ok(DriverMsg::Resume(decision)) => return decision,
                Ok(DriverMsg::Query(query)) => {
                    if self.tx.send(WorkerMsg::Reply(answer(view, query))).is_err() {
                        return Decision::Abort;
                    }
                }
                // Driver gone: unwind the search.
                Err(_) => return Decision::Abort,
            }
        }
    }
}

struct SolveHandle {
    tx: mpsc::Sender<DriverMsg>,
    rx: mpsc::Receiver<WorkerMsg>,
    join: Option<JoinHandle<()>>,
    pending: Option<Callback>,
}

enum ModelState {
    Rest(Box<dyn SolverBackend>),
    Solving(SolveHandle),
    Poisoned,
}

/// One optimization problem plus its mutable solve state.
///
/// A Model is exclusively owned by one environment for the duration of an
/// episode and is not reentrant: exactly one suspend/resume cycle may be in
/// flight at a time.
pub struct Model {
    state: ModelState,
}

impl Model {
    /// Wrap an existing backend.
    pub fn from_backend(backend: Box<dyn SolverBackend>) -> Self {
        Self {
            state: ModelState::Rest(backend),
        }
    }

    /// Load a problem definition into the bundled backend.
    pub fn from_data(data: ProblemData) -> Result<Self, SolverError> {
        let mut backend = SimSolver::new();
        backend.load(data)?;
        Ok(Self::from_backend(Box::new(backend)))
    }

    /// Read a problem file. The path is handed to the backend; the bundled
    /// backend reads its JSON problem format.
    pub fn from_file(path: &Path) -> Result<Self, SolverError> {
        let text = std::fs::read_to_string(path).map_err(|e| SolverError::Io {
            path: path.display().to_string(),
            source: e.to_string(),
        })?;
        let data: ProblemData =
            serde_json::from_str(&text).map_err(|e| SolverError::Parse {
                path: path.display().to_string(),
                source: e.to_string(),
            })?;
        data.validate()
            .map_err(|message| SolverError::InvalidProblem { message })?;
        Self::from_data(data)
    }

    /// A new model holding a copy of this model's original (untouched)
    /// problem definition. Legal only with the backend at rest.
    pub fn copy_orig(&self) -> Result<Model, SolverError> {
        match &self.state {
            ModelState::Rest(backend) => Ok(Model::from_backend(backend.copy_orig()?)),
            ModelState::Solving(_) => Err(SolverError::SolveInProgress {
                operation: "copy_orig",
            }),
            ModelState::Poisoned => Err(SolverError::WorkerDied),
        }
    }

    fn rest_backend(&self, operation: &'static str) -> Result<&dyn SolverBackend, SolverError> {
        match &self.state {
            ModelState::Rest(backend) => Ok(backend.as_ref()),
            ModelState::Solving(_) => Err(SolverError::SolveInProgress { operation }),
            ModelState::Poisoned => Err(SolverError::WorkerDied),
        }
    }

    fn rest_backend_mut(
        &mut self,
        operation: &'static str,
    ) -> Result<&mut Box<dyn SolverBackend>, SolverError> {
        match &mut self.state {
            ModelState::Rest(backend) => Ok(backend),
            ModelState::Solving(_) => Err(SolverError::SolveInProgress { operation }),
            ModelState::Poisoned => Err(SolverError::WorkerDied),
        }
    }

    // --- Queries (legal at rest and while suspended) ------------------------

    fn query(&self, query: Query) -> Result<Reply, SolverError> {
        match &self.state {
            ModelState::Rest(backend) => Ok(answer(backend.as_ref(), query)),
            ModelState::Solving(handle) => {
                handle
                    .tx
                    .send(DriverMsg::Query(query))
                    .map_err(|_| SolverError::WorkerDied)?;
                match handle.rx.recv() {
                    Ok(WorkerMsg::Reply(reply)) => Ok(reply),
                    _ => Err(SolverError::WorkerDied),
                }
            }
            ModelState::Poisoned => Err(SolverError::WorkerDied),
        }
    }

    pub fn name(&self) -> Result<String, SolverError> {
        match self.query(Query::Name)? {
            Reply::Name(name) => Ok(name),
            _ => Err(SolverError::WorkerDied),
        }
    }

    pub fn stage(&self) -> Result<Stage, SolverError> {
        match self.query(Query::Stage)? {
            Reply::Stage(stage) => Ok(stage),
            _ => Err(SolverError::WorkerDied),
        }
    }

    pub fn num_vars(&self) -> Result<usize, SolverError> {
        match self.query(Query::NumVars)? {
            Reply::Usize(n) => Ok(n),
            _ => Err(SolverError::WorkerDied),
        }
    }

    pub fn primal_bound(&self) -> Result<f64, SolverError> {
        match self.query(Query::PrimalBound)? {
            Reply::F64(x) => Ok(x),
            _ => Err(SolverError::WorkerDied),
        }
    }

    pub fn dual_bound(&self) -> Result<f64, SolverError> {
        match self.query(Query::DualBound)? {
            Reply::F64(x) => Ok(x),
            _ => Err(SolverError::WorkerDied),
        }
    }

    pub fn is_solved(&self) -> Result<bool, SolverError> {
        match self.query(Query::IsSolved)? {
            Reply::Bool(b) => Ok(b),
            _ => Err(SolverError::WorkerDied),
        }
    }

    pub fn lp_iterations(&self) -> Result<u64, SolverError> {
        match self.query(Query::LpIterations)? {
            Reply::U64(n) => Ok(n),
            _ => Err(SolverError::WorkerDied),
        }
    }

    pub fn n_nodes(&self) -> Result<u64, SolverError> {
        match self.query(Query::NNodes)? {
            Reply::U64(n) => Ok(n),
            _ => Err(SolverError::WorkerDied),
        }
    }

    pub fn solving_time(&self, wall: bool) -> Result<f64, SolverError> {
        match self.query(Query::SolvingTime { wall })? {
            Reply::F64(x) => Ok(x),
            _ => Err(SolverError::WorkerDied),
        }
    }

    pub fn pseudocosts(&self) -> Result<Vec<f64>, SolverError> {
        match self.query(Query::Pseudocosts)? {
            Reply::VecF64(v) => Ok(v),
            _ => Err(SolverError::WorkerDied),
        }
    }

    pub fn variables(&self) -> Result<Vec<VarView>, SolverError> {
        match self.query(Query::Variables)? {
            Reply::Variables(v) => Ok(v),
            _ => Err(SolverError::WorkerDied),
        }
    }

    pub fn rows(&self) -> Result<Vec<RowView>, SolverError> {
        match self.query(Query::Rows)? {
            Reply::Rows(r) => Ok(r),
            _ => Err(SolverError::WorkerDied),
        }
    }

    pub fn get_param(&self, param_name: &str) -> Result<ParamValue, SolverError> {
        match self.query(Query::GetParam(param_name.to_string()))? {
            Reply::Param(result) => result,
            _ => Err(SolverError::WorkerDied),
        }
    }

    // --- Rest-only operations ----------------------------------------------

    pub fn set_param(&mut self, name: &str, value: ParamValue) -> Result<(), SolverError> {
        self.rest_backend_mut("set_param")?.set_param(name, value)
    }

    pub fn set_params(&mut self, params: &[(String, ParamValue)]) -> Result<(), SolverError> {
        for (name, value) in params {
            self.set_param(name, value.clone())?;
        }
        Ok(())
    }

    pub fn transform_prob(&mut self) -> Result<(), SolverError> {
        self.rest_backend_mut("transform_prob")?.transform_prob()
    }

    pub fn presolve(&mut self) -> Result<(), SolverError> {
        self.rest_backend_mut("presolve")?.presolve()
    }

    /// Solve to completion without callbacks.
    pub fn solve(&mut self) -> Result<(), SolverError> {
        self.rest_backend_mut("solve")?.solve_full()
    }

    pub fn write_problem(&self, path: &Path) -> Result<(), SolverError> {
        self.rest_backend("write_problem")?.write_problem(path)
    }

    // --- Reentrant solve ----------------------------------------------------

    /// Start solving with the given callbacks installed and run until the
    /// first decision point or completion. Returns the suspended callback,
    /// or None when the problem is solved without one.
    pub fn solve_iter(
        &mut self,
        specs: Vec<CallbackSpec>,
    ) -> Result<Option<Callback>, SolverError> {
        match &self.state {
            ModelState::Rest(_) => {}
            ModelState::Solving(_) => {
                return Err(SolverError::SolveInProgress {
                    operation: "solve_iter",
                })
            }
            ModelState::Poisoned => return Err(SolverError::WorkerDied),
        }
        let backend = match std::mem::replace(&mut self.state, ModelState::Poisoned) {
            ModelState::Rest(backend) => backend,
            _ => unreachable!("state checked above"),
        };

        let (driver_tx, driver_rx) = mpsc::channel::<DriverMsg>();
        let (worker_tx, worker_rx) = mpsc::channel::<WorkerMsg>();
        let hook_tx = worker_tx.clone();
        let join = thread::Builder::new()
            .name("mipgym-solve".to_string())
            .spawn(move || {
                let mut backend = backend;
                let mut hooks = ChannelHooks {
                    rx: driver_rx,
                    tx: hook_tx,
                };
                let result = backend.solve(&specs, &mut hooks);
                let _ = worker_tx.send(WorkerMsg::Finished { backend, result });
            })
            .map_err(|e| SolverError::Thread {
                source: e.to_string(),
            })?;

        self.state = ModelState::Solving(SolveHandle {
            tx: driver_tx,
            rx: worker_rx,
            join: Some(join),
            pending: None,
        });
        self.wait_suspension()
    }

    /// Resume a suspended solve with a decision and run until the next
    /// decision point or completion.
    pub fn solve_iter_continue(
        &mut self,
        decision: Decision,
    ) -> Result<Option<Callback>, SolverError> {
        match &mut self.state {
            ModelState::Solving(handle) => {
                handle.pending = None;
                if handle.tx.send(DriverMsg::Resume(decision)).is_err() {
                    self.state = ModelState::Poisoned;
                    return Err(SolverError::WorkerDied);
                }
            }
            ModelState::Rest(_) => return Err(SolverError::NotSolving),
            ModelState::Poisoned => return Err(SolverError::WorkerDied),
        }
        self.wait_suspension()
    }

    /// The callback of the currently suspended decision point, if any.
    pub fn pending_callback(&self) -> Option<&Callback> {
        match &self.state {
            ModelState::Solving(handle) => handle.pending.as_ref(),
            _ => None,
        }
    }

    fn wait_suspension(&mut self) -> Result<Option<Callback>, SolverError> {
        let msg = match &self.state {
            ModelState::Solving(handle) => handle.rx.recv(),
            _ => return Err(SolverError::NotSolving),
        };
        match msg {
            Ok(WorkerMsg::Suspended(callback)) => {
                if let ModelState::Solving(handle) = &mut self.state {
                    handle.pending = Some(callback.clone());
                }
                Ok(Some(callback))
            }
            Ok(WorkerMsg::Finished { backend, result }) => {
                if let ModelState::Solving(handle) = &mut self.state {
                    if let Some(join) = handle.join.take() {
                        let _ = join.join();
                    }
                }
                self.state = ModelState::Rest(backend);
                result.map(|_| None)
            }
            // A Reply with no query outstanding, or a dead channel: the
            // protocol is broken and the model cannot be trusted.
            Ok(WorkerMsg::Reply(_)) | Err(_) => {
                self.state = ModelState::Poisoned;
                Err(SolverError::WorkerDied)
            }
        }
    }
}

impl Drop for Model {
    fn drop(&mut self) {
        if let ModelState::Solving(handle) =
            std::mem::replace(&mut self.state, ModelState::Poisoned)
        {
            let SolveHandle { tx, rx, join, .. } = handle;
            // Dropping the sender unblocks the worker hook, which aborts
            // the search.
            drop(tx);
            drop(rx);
            if let Some(join) = join {
                let _ = join.join();
            }
        }
    }
}

impl fmt::Debug for Model {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let state = match &self.state {
            ModelState::Rest(_) => "rest",
            ModelState::Solving(_) => "solving",
            ModelState::Poisoned => "poisoned",
        };
        f.debug_struct("Model").field("state", &state).finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::solver::problem::{ProblemBuilder, Sense};

    /// min x + 2y + 3z  s.t.  x + y >= 1, y + z >= 1, binaries.
    fn cover_model() -> Model {
        let mut b = ProblemBuilder::new("cover3", Sense::Minimize);
        let x = b.add_binary("x", 1.0);
        let y = b.add_binary("y", 2.0);
        let z = b.add_binary("z", 3.0);
        b.add_constraint("c0", vec![(x, 1.0), (y, 1.0)], Some(1.0), None);
        b.add_constraint("c1", vec![(y, 1.0), (z, 1.0)], Some(1.0), None);
        Model::from_data(b.build()).unwrap()
    }

    fn branch_specs() -> Vec<CallbackSpec> {
        vec![CallbackSpec::Branchrule {
            pseudo_candidates: false,
        }]
    }

    #[test]
    fn solve_iter_suspends_at_the_first_branching() {
        let mut model = cover_model();
        let callback = model.solve_iter(branch_specs()).unwrap();

        match callback {
            Some(Callback::Branchrule { candidates }) => {
                assert_eq!(candidates.len(), 3);
                assert!(model.pending_callback().is_some());
            }
            other => panic!("expected a branchrule suspension, got {:?}", other),
        }
    }

    #[test]
    fn continuing_with_defaults_reaches_completion() {
        let mut model = cover_model();
        let mut callback = model.solve_iter(branch_specs()).unwrap();
        let mut rounds = 0;
        while callback.is_some() {
            callback = model.solve_iter_continue(Decision::BranchDefault).unwrap();
            rounds += 1;
            assert!(rounds < 1000, "search failed to terminate");
        }

        assert!(model.is_solved().unwrap());
        assert!((model.primal_bound().unwrap() - 2.0).abs() < 1e-9);
        assert!(model.pending_callback().is_none());
    }

    #[test]
    fn queries_are_serviced_while_suspended() {
        let mut model = cover_model();
        model.solve_iter(branch_specs()).unwrap();

        assert_eq!(model.stage().unwrap(), Stage::Solving);
        assert_eq!(model.num_vars().unwrap(), 3);
        assert_eq!(model.pseudocosts().unwrap().len(), 3);
        assert!(model.n_nodes().unwrap() >= 1);
        assert_eq!(model.variables().unwrap().len(), 3);
        assert_eq!(model.rows().unwrap().len(), 2);
        assert!(matches!(
            model.get_param("randomization/lpseed").unwrap(),
            ParamValue::Int(_)
        ));
    }

    #[test]
    fn rest_operations_are_rejected_while_suspended() {
        let mut model = cover_model();
        model.solve_iter(branch_specs()).unwrap();

        assert!(matches!(
            model.set_param("limits/totalnodes", ParamValue::Int(5)),
            Err(SolverError::SolveInProgress { .. })
        ));
        assert!(matches!(
            model.solve_iter(branch_specs()),
            Err(SolverError::SolveInProgress { .. })
        ));
        assert!(matches!(
            model.copy_orig(),
            Err(SolverError::SolveInProgress { .. })
        ));
    }

    #[test]
    fn continue_without_a_solve_in_flight_fails() {
        let mut model = cover_model();
        assert!(matches!(
            model.solve_iter_continue(Decision::BranchDefault),
            Err(SolverError::NotSolving)
        ));
    }

    #[test]
    fn invalid_branching_decisions_surface_the_engine_error() {
        let mut model = cover_model();
        model.solve_iter(branch_specs()).unwrap();

        let result = model.solve_iter_continue(Decision::BranchOn(42));
        assert!(matches!(
            result,
            Err(SolverError::InvalidVariable { index: 42, .. })
        ));
    }

    #[test]
    fn dropping_a_suspended_model_unwinds_the_worker() {
        let mut model = cover_model();
        model.solve_iter(branch_specs()).unwrap();
        // Drop joins the worker; the test passes by not hanging.
        drop(model);
    }

    #[test]
    fn copy_orig_replays_the_untouched_problem() {
        let mut model = cover_model();
        model.solve().unwrap();
        assert!(model.is_solved().unwrap());

        let copy = model.copy_orig().unwrap();
        assert!(!copy.is_solved().unwrap());
        assert_eq!(copy.stage().unwrap(), Stage::Problem);
        assert_eq!(copy.num_vars().unwrap(), 3);
    }

    #[test]
    fn problem_files_roundtrip() {
        let model = cover_model();
        let path = std::env::temp_dir().join("mipgym_cover3.json");
        model.write_problem(&path).unwrap();

        let loaded = Model::from_file(&path).unwrap();
        assert_eq!(loaded.num_vars().unwrap(), 3);
        assert_eq!(loaded.rows().unwrap(), model.rows().unwrap());
        let _ = std::fs::remove_file(&path);
    }
}
