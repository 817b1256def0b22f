// src/solver/problem.rs
//
// Problem interchange data: the instance format handed to backends.
// Instance generators emit ProblemData; the bundled SimSolver loads it and
// uses it (via serde_json) as its on-disk problem format.

use serde::{Deserialize, Serialize};

/// Objective sense of a problem.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Sense {
    Minimize,
    Maximize,
}

/// A single decision variable.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VariableData {
    pub name: String,
    /// Objective coefficient.
    pub objective: f64,
    /// Lower bound, None for unbounded below.
    pub lower_bound: Option<f64>,
    /// Upper bound, None for unbounded above.
    pub upper_bound: Option<f64>,
    /// Whether the variable is restricted to integer values.
    pub integral: bool,
}

/// A linear constraint `lhs <= coefficients . x <= rhs`.
///
/// Either side may be absent; an equality has `lhs == rhs`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ConstraintData {
    pub name: String,
    /// Sparse coefficients as (variable index, coefficient) pairs.
    pub coefficients: Vec<(usize, f64)>,
    pub lhs: Option<f64>,
    pub rhs: Option<f64>,
}

/// Full problem definition.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProblemData {
    pub name: String,
    pub sense: Sense,
    pub variables: Vec<VariableData>,
    pub constraints: Vec<ConstraintData>,
}

impl ProblemData {
    pub fn n_variables(&self) -> usize {
        self.variables.len()
    }

    pub fn n_constraints(&self) -> usize {
        self.constraints.len()
    }

    /// Check structural consistency: every constraint coefficient must
    /// reference an existing variable.
    pub fn validate(&self) -> Result<(), String> {
        for cons in &self.constraints {
            for &(idx, _) in &cons.coefficients {
                if idx >= self.variables.len() {
                    return Err(format!(
                        "constraint '{}' references variable index {} out of {}",
                        cons.name,
                        idx,
                        self.variables.len()
                    ));
                }
            }
            if cons.lhs.is_none() && cons.rhs.is_none() {
                return Err(format!("constraint '{}' has no finite side", cons.name));
            }
        }
        Ok(())
    }
}

/// Incremental builder for problem definitions.
pub struct ProblemBuilder {
    data: ProblemData,
}

impl ProblemBuilder {
    pub fn new(name: &str, sense: Sense) -> Self {
        Self {
            data: ProblemData {
                name: name.to_string(),
                sense,
                variables: Vec::new(),
                constraints: Vec::new(),
            },
        }
    }

    /// Add a variable and return its index.
    pub fn add_variable(
        &mut self,
        name: &str,
        objective: f64,
        lower_bound: Option<f64>,
        upper_bound: Option<f64>,
        integral: bool,
    ) -> usize {
        self.data.variables.push(VariableData {
            name: name.to_string(),
            objective,
            lower_bound,
            upper_bound,
            integral,
        });
        self.data.variables.len() - 1
    }

    /// Add a binary variable and return its index.
    pub fn add_binary(&mut self, name: &str, objective: f64) -> usize {
        self.add_variable(name, objective, Some(0.0), Some(1.0), true)
    }

    pub fn add_constraint(
        &mut self,
        name: &str,
        coefficients: Vec<(usize, f64)>,
        lhs: Option<f64>,
        rhs: Option<f64>,
    ) {
        self.data.constraints.push(ConstraintData {
            name: name.to_string(),
            coefficients,
            lhs,
            rhs,
        });
    }

    pub fn build(self) -> ProblemData {
        self.data
    }
}
