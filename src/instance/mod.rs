// src/instance/mod.rs
//
// Random instance generators.
//
// Generators follow a pull protocol: a stateless `generate_instance`
// sampling function plus a stateful iterable form configured once with
// generation parameters and a random engine. Reseeding restarts the lazy
// sequence deterministically.

pub mod facilities;
pub mod setcover;

use std::fmt;

pub use facilities::{CapacitatedFacilityLocationGenerator, FacilityLocationConfig};
pub use setcover::{SetCoverConfig, SetCoverGenerator};

use crate::solver::SolverError;

/// Errors raised by instance generation.
#[derive(Debug, Clone)]
pub enum InstanceError {
    /// A generation parameter is outside its documented domain. Raised at
    /// construction, before any instance is sampled.
    InvalidParameter { name: &'static str, message: String },
    Solver(SolverError),
}

impl fmt::Display for InstanceError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            InstanceError::InvalidParameter { name, message } => {
                write!(f, "invalid generator parameter '{}': {}", name, message)
            }
            InstanceError::Solver(e) => write!(f, "instance construction failed: {}", e),
        }
    }
}

impl std::error::Error for InstanceError {}

impl From<SolverError> for InstanceError {
    fn from(e: SolverError) -> Self {
        InstanceError::Solver(e)
    }
}
