//! mipgym core library.
//!
//! Reinforcement-learning environments over a branch-and-bound MIP solver
//! engine. Environments couple a solver's search to an external agent
//! through a synchronous reset/step interface with explicit observation,
//! reward, and action-set semantics. The solver itself sits behind the
//! `solver::SolverBackend` contract; a deterministic reference backend is
//! bundled for tests and demos.

pub mod data;
pub mod dynamics;
pub mod environment;
pub mod instance;
pub mod logging;
pub mod observation;
pub mod random;
pub mod reward;
pub mod solver;

// --- Re-exports for ergonomic external use ---------------------------------

pub use data::{parse, DataError, DataFunction, DataNode, DataSpec, DataValue};

pub use dynamics::{
    BranchingAction, BranchingDynamics, ConfiguringDynamics, Dynamics, DynamicsError,
    PrimalSearchDynamics,
};

pub use environment::{
    Branching, Configuring, EnvConfig, EnvError, Environment, Instance, PrimalSearch,
    ResetResult, StepResult,
};

pub use instance::{
    CapacitatedFacilityLocationGenerator, FacilityLocationConfig, InstanceError,
    SetCoverConfig, SetCoverGenerator,
};

pub use logging::{EpisodeSink, FileSink, NoopSink, TransitionRecord};

pub use observation::{
    CooMatrix, NodeBipartite, NodeBipartiteObs, Nothing, Pseudocosts, RowFeatures,
    VariableFeatures, OBS_VERSION,
};

pub use random::{seed, spawn_random_engine, RandomEngine};

pub use reward::RewardFunction;

pub use solver::{
    Callback, CallbackSpec, Decision, Model, ParamValue, ProblemBuilder, ProblemData, Sense,
    SimSolver, SolverBackend, SolverError, SolverView, Stage,
};
