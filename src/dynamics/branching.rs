// src/dynamics/branching.rs
//
// Single-variable branching dynamics: decision points are branching
// candidate selections at search-tree nodes.

use super::{set_solver_seeds, Dynamics, DynamicsError};
use crate::random::RandomEngine;
use crate::solver::{Callback, CallbackSpec, Decision, Model};

/// Action for branching dynamics: one candidate, or deferring to the
/// engine's own branching rule.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BranchingAction {
    /// Branch on this variable (by original-problem position). Must be a
    /// member of the last returned action set.
    Candidate(usize),
    /// Let the engine pick according to its rule priorities.
    EngineDefault,
}

/// Single-variable branching dynamics.
///
/// The engine hands back control at every branching decision; the action
/// set lists the legal candidate indices.
#[derive(Debug, Clone, Copy, Default)]
pub struct BranchingDynamics {
    /// Offer the pseudo candidate set instead of the LP-fractional set.
    pub pseudo_candidates: bool,
}

impl BranchingDynamics {
    pub fn new(pseudo_candidates: bool) -> Self {
        Self { pseudo_candidates }
    }

    fn outcome(
        callback: Option<Callback>,
    ) -> Result<(bool, Option<Vec<usize>>), DynamicsError> {
        match callback {
            None => Ok((true, None)),
            Some(Callback::Branchrule { candidates }) => Ok((false, Some(candidates))),
            Some(Callback::Heuristic { .. }) => Err(DynamicsError::UnexpectedCallback),
        }
    }
}

impl Dynamics for BranchingDynamics {
    type Action = BranchingAction;
    type ActionSet = Vec<usize>;

    fn set_dynamics_random_state(
        &self,
        model: &mut Model,
        rng: &mut RandomEngine,
    ) -> Result<(), DynamicsError> {
        Ok(set_solver_seeds(model, rng)?)
    }

    /// Start solving and give back control on the first branching
    /// decision. `done` without an action set means the instance was
    /// solved before any branching, e.g. during preprocessing.
    fn reset_dynamics(
        &self,
        model: &mut Model,
    ) -> Result<(bool, Option<Vec<usize>>), DynamicsError> {
        let callback = model.solve_iter(vec![CallbackSpec::Branchrule {
            pseudo_candidates: self.pseudo_candidates,
        }])?;
        Self::outcome(callback)
    }

    /// Branch and resume solving until the next decision or completion.
    fn step_dynamics(
        &self,
        model: &mut Model,
        action: BranchingAction,
    ) -> Result<(bool, Option<Vec<usize>>), DynamicsError> {
        let decision = match action {
            BranchingAction::Candidate(index) => {
                let legal = match model.pending_callback() {
                    Some(Callback::Branchrule { candidates }) => candidates.contains(&index),
                    _ => false,
                };
                if !legal {
                    return Err(DynamicsError::ActionOutOfSet { action: index });
                }
                Decision::BranchOn(index)
            }
            BranchingAction::EngineDefault => Decision::BranchDefault,
        };
        let callback = model.solve_iter_continue(decision)?;
        Self::outcome(callback)
    }
}
