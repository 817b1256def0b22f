// src/dynamics/primal_search.rs
//
// Primal-search dynamics: decision points are primal-heuristic calls,
// gated by tree depth and a per-node trial budget. Actions are partial
// assignments over the outstanding discrete candidates; the engine
// completes them by bound fixing and reports feasibility internally.

use super::{set_solver_seeds, Dynamics, DynamicsError};
use crate::random::RandomEngine;
use crate::solver::{Callback, CallbackSpec, Decision, Model};

/// Primal solution search dynamics.
///
/// The engine hands back control up to `trials_per_node` times at each
/// eligible node. An empty assignment is a no-op trial. With an unbounded
/// budget (`trials_per_node = -1`) control keeps returning at the same
/// node until a trial succeeds or the search moves on; combined with a
/// `depth_stop` that blocks every call, the heuristic simply never fires
/// and the episode completes inside `reset_dynamics`.
#[derive(Debug, Clone, Copy)]
pub struct PrimalSearchDynamics {
    trials_per_node: i32,
    depth_freq: i32,
    depth_start: i32,
    depth_stop: i32,
}

impl PrimalSearchDynamics {
    /// Create new dynamics, validating the gating parameters.
    ///
    /// `trials_per_node` must be -1 (unbounded) or positive; `depth_freq`
    /// at least 1; `depth_start` non-negative; `depth_stop` -1 (no
    /// ceiling) or non-negative.
    pub fn new(
        trials_per_node: i32,
        depth_freq: i32,
        depth_start: i32,
        depth_stop: i32,
    ) -> Result<Self, DynamicsError> {
        if trials_per_node < -1 || trials_per_node == 0 {
            return Err(DynamicsError::InvalidParameter {
                name: "trials_per_node",
                message: format!("must be -1 or positive, got {}", trials_per_node),
            });
        }
        if depth_freq < 1 {
            return Err(DynamicsError::InvalidParameter {
                name: "depth_freq",
                message: format!("must be at least 1, got {}", depth_freq),
            });
        }
        if depth_start < 0 {
            return Err(DynamicsError::InvalidParameter {
                name: "depth_start",
                message: format!("must be non-negative, got {}", depth_start),
            });
        }
        if depth_stop < -1 {
            return Err(DynamicsError::InvalidParameter {
                name: "depth_stop",
                message: format!("must be -1 or non-negative, got {}", depth_stop),
            });
        }
        Ok(Self {
            trials_per_node,
            depth_freq,
            depth_start,
            depth_stop,
        })
    }

    pub fn trials_per_node(&self) -> i32 {
        self.trials_per_node
    }

    pub fn depth_freq(&self) -> i32 {
        self.depth_freq
    }

    pub fn depth_start(&self) -> i32 {
        self.depth_start
    }

    pub fn depth_stop(&self) -> i32 {
        self.depth_stop
    }

    fn spec(&self) -> CallbackSpec {
        CallbackSpec::Heuristic {
            trials_per_node: self.trials_per_node,
            depth_freq: self.depth_freq,
            depth_start: self.depth_start,
            depth_stop: self.depth_stop,
        }
    }

    fn outcome(
        callback: Option<Callback>,
    ) -> Result<(bool, Option<Vec<usize>>), DynamicsError> {
        match callback {
            None => Ok((true, None)),
            Some(Callback::Heuristic { candidates, .. }) => Ok((false, Some(candidates))),
            Some(Callback::Branchrule { .. }) => Err(DynamicsError::UnexpectedCallback),
        }
    }
}

impl Default for PrimalSearchDynamics {
    /// One trial per node at every depth.
    fn default() -> Self {
        Self {
            trials_per_node: 1,
            depth_freq: 1,
            depth_start: 0,
            depth_stop: -1,
        }
    }
}

impl Dynamics for PrimalSearchDynamics {
    type Action = Vec<(usize, f64)>;
    type ActionSet = Vec<usize>;

    fn set_dynamics_random_state(
        &self,
        model: &mut Model,
        rng: &mut RandomEngine,
    ) -> Result<(), DynamicsError> {
        Ok(set_solver_seeds(model, rng)?)
    }

    /// Start solving and give back control on the first heuristic call.
    fn reset_dynamics(
        &self,
        model: &mut Model,
    ) -> Result<(bool, Option<Vec<usize>>), DynamicsError> {
        let callback = model.solve_iter(vec![self.spec()])?;
        Self::outcome(callback)
    }

    /// Submit a partial assignment and resume until the next heuristic
    /// call or completion.
    fn step_dynamics(
        &self,
        model: &mut Model,
        action: Vec<(usize, f64)>,
    ) -> Result<(bool, Option<Vec<usize>>), DynamicsError> {
        let callback = model.solve_iter_continue(Decision::PartialSolution(action))?;
        Self::outcome(callback)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rejects_out_of_domain_parameters() {
        assert!(PrimalSearchDynamics::new(0, 1, 0, -1).is_err());
        assert!(PrimalSearchDynamics::new(-2, 1, 0, -1).is_err());
        assert!(PrimalSearchDynamics::new(1, 0, 0, -1).is_err());
        assert!(PrimalSearchDynamics::new(1, 1, -1, -1).is_err());
        assert!(PrimalSearchDynamics::new(1, 1, 0, -2).is_err());
    }

    #[test]
    fn accepts_unbounded_trials() {
        let dynamics = PrimalSearchDynamics::new(-1, 2, 1, 4).unwrap();
        assert_eq!(dynamics.trials_per_node(), -1);
        assert_eq!(dynamics.depth_freq(), 2);
        assert_eq!(dynamics.depth_start(), 1);
        assert_eq!(dynamics.depth_stop(), 4);
    }
}
