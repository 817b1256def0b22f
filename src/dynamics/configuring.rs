// src/dynamics/configuring.rs
//
// Single-shot parameter configuration dynamics, meant to be used as a
// (contextual) bandit over solver parameterizations.

use std::collections::BTreeMap;

use super::{set_solver_seeds, Dynamics, DynamicsError};
use crate::random::RandomEngine;
use crate::solver::{Model, ParamValue};

/// Single-shot solver configuration dynamics.
///
/// `reset_dynamics` does nothing; the one `step_dynamics` call applies a
/// parameter mapping, performs a full solve, and terminates the episode.
#[derive(Debug, Clone, Copy, Default)]
pub struct ConfiguringDynamics;

impl ConfiguringDynamics {
    pub fn new() -> Self {
        Self
    }
}

impl Dynamics for ConfiguringDynamics {
    type Action = BTreeMap<String, ParamValue>;
    type ActionSet = ();

    fn set_dynamics_random_state(
        &self,
        model: &mut Model,
        rng: &mut RandomEngine,
    ) -> Result<(), DynamicsError> {
        Ok(set_solver_seeds(model, rng)?)
    }

    /// Never terminal, never offers an action set.
    fn reset_dynamics(&self, _model: &mut Model) -> Result<(bool, Option<()>), DynamicsError> {
        Ok((false, None))
    }

    /// Set parameters and solve the instance to completion.
    fn step_dynamics(
        &self,
        model: &mut Model,
        action: BTreeMap<String, ParamValue>,
    ) -> Result<(bool, Option<()>), DynamicsError> {
        for (name, value) in action {
            model.set_param(&name, value)?;
        }
        model.solve()?;
        Ok((true, None))
    }
}
