// src/environment.rs
//
// Environment orchestrator: composes a Dynamics with reward, observation,
// and information pipelines plus a random engine, and exposes the
// reset/step episode cycle.
//
// Transition legality is tracked with a single latch: any failure inside
// reset or step forces the environment into a "must reset" condition and
// the error propagates unchanged.

use std::fmt;
use std::path::{Path, PathBuf};

use crate::data::{parse, DataError, DataNode, DataSpec, DataValue};
use crate::dynamics::{
    BranchingDynamics, ConfiguringDynamics, Dynamics, DynamicsError, PrimalSearchDynamics,
};
use crate::observation::{NodeBipartite, Nothing};
use crate::random::{spawn_random_engine, RandomEngine};
use crate::reward::RewardFunction;
use crate::solver::{Model, ParamValue, SolverError};

/// Errors raised by environment transitions.
#[derive(Debug, Clone)]
pub enum EnvError {
    /// `step` was called while the environment cannot transition; it must
    /// be reset first.
    NotTransitionable,
    Dynamics(DynamicsError),
    Data(DataError),
    Solver(SolverError),
}

impl fmt::Display for EnvError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            EnvError::NotTransitionable => {
                write!(f, "environment cannot transition and needs to be reset")
            }
            EnvError::Dynamics(e) => write!(f, "{}", e),
            EnvError::Data(e) => write!(f, "{}", e),
            EnvError::Solver(e) => write!(f, "{}", e),
        }
    }
}

impl std::error::Error for EnvError {}

impl From<DynamicsError> for EnvError {
    fn from(e: DynamicsError) -> Self {
        EnvError::Dynamics(e)
    }
}

impl From<DataError> for EnvError {
    fn from(e: DataError) -> Self {
        EnvError::Data(e)
    }
}

impl From<SolverError> for EnvError {
    fn from(e: SolverError) -> Self {
        EnvError::Solver(e)
    }
}

/// The combinatorial optimization problem an episode tackles: a problem
/// file readable by the solver, or a model whose original problem
/// definition is copied.
pub enum Instance {
    Path(PathBuf),
    Model(Model),
}

impl From<PathBuf> for Instance {
    fn from(path: PathBuf) -> Self {
        Instance::Path(path)
    }
}

impl From<&Path> for Instance {
    fn from(path: &Path) -> Self {
        Instance::Path(path.to_path_buf())
    }
}

impl From<&str> for Instance {
    fn from(path: &str) -> Self {
        Instance::Path(PathBuf::from(path))
    }
}

impl From<Model> for Instance {
    fn from(model: Model) -> Self {
        Instance::Model(model)
    }
}

/// Everything `reset` reports about the initial state.
#[derive(Debug)]
pub struct ResetResult<S> {
    /// Observation of the initial state, absent on terminal states.
    pub observation: Option<DataValue>,
    /// Legal actions for the next step, if the dynamics offers a set.
    pub action_set: Option<S>,
    /// Offset on the cumulated reward accounting for work done during
    /// reset. Not a learning signal, since no action was taken yet.
    pub reward_offset: f64,
    /// Whether the initial state is already terminal.
    pub done: bool,
    /// Environment-specific extra information.
    pub info: DataValue,
}

/// Everything `step` reports about a transition.
#[derive(Debug)]
pub struct StepResult<S> {
    /// Observation of the new state, absent on terminal states.
    pub observation: Option<DataValue>,
    /// Legal actions for the next step, if the dynamics offers a set.
    pub action_set: Option<S>,
    /// Reward for the transition.
    pub reward: f64,
    /// Whether the new state is terminal.
    pub done: bool,
    /// Environment-specific extra information.
    pub info: DataValue,
}

/// Pipeline specifications and solver parameters accepted at
/// construction. `DataSpec::Default` selects the variant's default
/// pipeline.
pub struct EnvConfig {
    pub observation: DataSpec,
    pub reward: DataSpec,
    pub information: DataSpec,
    /// Solver parameters applied to the model at the start of every
    /// episode.
    pub solver_params: Vec<(String, ParamValue)>,
}

impl Default for EnvConfig {
    fn default() -> Self {
        Self {
            observation: DataSpec::Default,
            reward: DataSpec::Default,
            information: DataSpec::Default,
            solver_params: Vec::new(),
        }
    }
}

struct PipelineDefaults {
    observation: fn() -> DataNode,
    reward: fn() -> DataNode,
    information: fn() -> DataNode,
}

fn default_node_bipartite() -> DataNode {
    DataNode::Function(Box::new(NodeBipartite::new(false)))
}

fn default_nothing() -> DataNode {
    DataNode::Function(Box::new(Nothing))
}

fn default_is_done() -> DataNode {
    DataNode::Function(Box::new(RewardFunction::is_done()))
}

/// Partially observable MDP environment over one dynamics variant.
///
/// Owns the dynamics, the three extraction pipelines, a random engine
/// spawned from the process-wide source, and (per episode) the model.
pub struct Environment<D: Dynamics> {
    dynamics: D,
    reward_function: DataNode,
    observation_function: DataNode,
    information_function: DataNode,
    solver_params: Vec<(String, ParamValue)>,
    rng: RandomEngine,
    model: Option<Model>,
    can_transition: bool,
}

impl<D: Dynamics> Environment<D> {
    fn compose(
        dynamics: D,
        config: EnvConfig,
        defaults: PipelineDefaults,
    ) -> Result<Self, EnvError> {
        let observation_default: &dyn Fn() -> DataNode = &defaults.observation;
        let reward_default: &dyn Fn() -> DataNode = &defaults.reward;
        let information_default: &dyn Fn() -> DataNode = &defaults.information;
        Ok(Self {
            dynamics,
            reward_function: parse(config.reward, Some(reward_default))?,
            observation_function: parse(config.observation, Some(observation_default))?,
            information_function: parse(config.information, Some(information_default))?,
            solver_params: config.solver_params,
            rng: spawn_random_engine(),
            model: None,
            can_transition: false,
        })
    }

    /// Start a new episode on the given instance.
    ///
    /// Can be called at any point in time; on failure the environment is
    /// unusable until the next successful reset.
    pub fn reset(
        &mut self,
        instance: impl Into<Instance>,
    ) -> Result<ResetResult<D::ActionSet>, EnvError> {
        self.can_transition = true;
        match self.try_reset(instance.into()) {
            Ok(result) => Ok(result),
            Err(e) => {
                self.can_transition = false;
                Err(e)
            }
        }
    }

    fn try_reset(&mut self, instance: Instance) -> Result<ResetResult<D::ActionSet>, EnvError> {
        let mut model = match instance {
            Instance::Path(path) => Model::from_file(&path)?,
            Instance::Model(model) => model.copy_orig()?,
        };
        model.set_params(&self.solver_params)?;

        self.dynamics
            .set_dynamics_random_state(&mut model, &mut self.rng)?;

        self.reward_function.before_reset(&model)?;
        self.observation_function.before_reset(&model)?;
        self.information_function.before_reset(&model)?;

        let (done, action_set) = self.dynamics.reset_dynamics(&mut model)?;
        self.can_transition = !done;

        let reward_offset = scalar_reward(self.reward_function.extract(&model, done)?)?;
        let observation = if done {
            None
        } else {
            Some(self.observation_function.extract(&model, done)?)
        };
        let info = self.information_function.extract(&model, done)?;

        self.model = Some(model);
        Ok(ResetResult {
            observation,
            action_set,
            reward_offset,
            done,
            info,
        })
    }

    /// Transition from the current state with one action.
    ///
    /// Illegal once a terminal state was reported or a transition failed;
    /// reset first.
    pub fn step(&mut self, action: D::Action) -> Result<StepResult<D::ActionSet>, EnvError> {
        if !self.can_transition {
            return Err(EnvError::NotTransitionable);
        }
        match self.try_step(action) {
            Ok(result) => Ok(result),
            Err(e) => {
                self.can_transition = false;
                Err(e)
            }
        }
    }

    fn try_step(&mut self, action: D::Action) -> Result<StepResult<D::ActionSet>, EnvError> {
        let model = self.model.as_mut().ok_or(EnvError::NotTransitionable)?;

        let (done, action_set) = self.dynamics.step_dynamics(model, action)?;
        self.can_transition = !done;

        let model = &*model;
        let reward = scalar_reward(self.reward_function.extract(model, done)?)?;
        let observation = if done {
            None
        } else {
            Some(self.observation_function.extract(model, done)?)
        };
        let info = self.information_function.extract(model, done)?;

        Ok(StepResult {
            observation,
            action_set,
            reward,
            done,
            info,
        })
    }

    /// Reseed the environment's random engine. Takes effect at the next
    /// reset; trajectories become deterministic from there on.
    pub fn seed(&mut self, value: u64) {
        self.rng.seed(value);
    }

    /// The dynamics configuration in use.
    pub fn dynamics(&self) -> &D {
        &self.dynamics
    }

    /// The model of the current episode, if one is loaded.
    pub fn model(&self) -> Option<&Model> {
        self.model.as_ref()
    }
}

fn scalar_reward(value: DataValue) -> Result<f64, EnvError> {
    value
        .as_scalar()
        .ok_or(EnvError::Data(DataError::ScalarExpected {
            got: value.kind(),
        }))
}

/// Branching environment: episodes walk the branch-and-bound tree one
/// candidate selection at a time.
pub type Branching = Environment<BranchingDynamics>;

impl Environment<BranchingDynamics> {
    pub fn new(config: EnvConfig) -> Result<Self, EnvError> {
        Self::with_dynamics(config, BranchingDynamics::default())
    }

    pub fn with_dynamics(
        config: EnvConfig,
        dynamics: BranchingDynamics,
    ) -> Result<Self, EnvError> {
        Self::compose(
            dynamics,
            config,
            PipelineDefaults {
                observation: default_node_bipartite,
                reward: default_is_done,
                information: default_nothing,
            },
        )
    }
}

/// Configuring environment: one-shot parameter selection followed by a
/// full solve.
pub type Configuring = Environment<ConfiguringDynamics>;

impl Environment<ConfiguringDynamics> {
    pub fn new(config: EnvConfig) -> Result<Self, EnvError> {
        Self::compose(
            ConfiguringDynamics::new(),
            config,
            PipelineDefaults {
                observation: default_nothing,
                reward: default_is_done,
                information: default_nothing,
            },
        )
    }
}

/// Primal-search environment: episodes propose partial assignments at
/// heuristic calls.
pub type PrimalSearch = Environment<PrimalSearchDynamics>;

impl Environment<PrimalSearchDynamics> {
    pub fn new(config: EnvConfig) -> Result<Self, EnvError> {
        Self::with_dynamics(config, PrimalSearchDynamics::default())
    }

    pub fn with_dynamics(
        config: EnvConfig,
        dynamics: PrimalSearchDynamics,
    ) -> Result<Self, EnvError> {
        Self::compose(
            dynamics,
            config,
            PipelineDefaults {
                observation: default_node_bipartite,
                reward: default_is_done,
                information: default_nothing,
            },
        )
    }
}
