// src/dynamics/mod.rs
//
// Dynamics drive the solver from a freshly loaded problem through repeated
// suspend/resume cycles at decision points until a terminal state.
// Variants differ in what a decision point is and what an action means;
// all share the same three-operation contract and hold no episode state.

pub mod branching;
pub mod configuring;
pub mod primal_search;

use std::fmt;

use rand::Rng;

pub use branching::{BranchingAction, BranchingDynamics};
pub use configuring::ConfiguringDynamics;
pub use primal_search::PrimalSearchDynamics;

use crate::random::RandomEngine;
use crate::solver::{Model, ParamValue, SolverError};

/// Errors raised by dynamics transitions.
#[derive(Debug, Clone)]
pub enum DynamicsError {
    /// A construction parameter is outside its documented domain.
    InvalidParameter { name: &'static str, message: String },
    /// The action does not belong to the last returned action set.
    ActionOutOfSet { action: usize },
    /// The engine suspended at a decision point this dynamics cannot
    /// answer.
    UnexpectedCallback,
    Solver(SolverError),
}

impl fmt::Display for DynamicsError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DynamicsError::InvalidParameter { name, message } => {
                write!(f, "invalid dynamics parameter '{}': {}", name, message)
            }
            DynamicsError::ActionOutOfSet { action } => {
                write!(f, "action {} is not in the current action set", action)
            }
            DynamicsError::UnexpectedCallback => {
                write!(f, "engine suspended at a decision point of the wrong kind")
            }
            DynamicsError::Solver(e) => write!(f, "dynamics transition failed: {}", e),
        }
    }
}

impl std::error::Error for DynamicsError {}

impl From<SolverError> for DynamicsError {
    fn from(e: SolverError) -> Self {
        DynamicsError::Solver(e)
    }
}

/// State-machine contract shared by all dynamics variants.
///
/// `reset_dynamics` drives a freshly loaded model to the first decision
/// point (or completion); `step_dynamics` consumes one action and resumes
/// to the next. Both report `(done, action_set)`.
pub trait Dynamics {
    type Action;
    type ActionSet;

    /// Seed the solver-internal randomness sources (permutation, LP
    /// perturbation, shift) deterministically from `rng`. Called once per
    /// episode before `reset_dynamics`.
    fn set_dynamics_random_state(
        &self,
        model: &mut Model,
        rng: &mut RandomEngine,
    ) -> Result<(), DynamicsError>;

    fn reset_dynamics(
        &self,
        model: &mut Model,
    ) -> Result<(bool, Option<Self::ActionSet>), DynamicsError>;

    fn step_dynamics(
        &self,
        model: &mut Model,
        action: Self::Action,
    ) -> Result<(bool, Option<Self::ActionSet>), DynamicsError>;
}

/// Draw solver seeds from `rng` and set the engine's randomization
/// parameters.
pub(crate) fn set_solver_seeds(
    model: &mut Model,
    rng: &mut RandomEngine,
) -> Result<(), SolverError> {
    for name in [
        "randomization/permutationseed",
        "randomization/randomseedshift",
        "randomization/lpseed",
    ] {
        let seed = rng.gen_range(RandomEngine::MIN_SEED..=RandomEngine::MAX_SEED);
        model.set_param(name, ParamValue::Int(seed))?;
    }
    Ok(())
}
