// src/observation/mod.rs
//
// Observation functions extracting structured state from the model.
// - Nothing:       always extracts an absent value
// - NodeBipartite: bipartite variable/constraint graph at search nodes
// - Pseudocosts:   per-variable branching quality estimates
//
// Variable-indexed payloads are ordered by original-problem position, so
// they can be indexed directly by the branching action set.

use serde::{Deserialize, Serialize};

use crate::data::{DataError, DataFunction, DataValue};
use crate::solver::{Model, RowView, VarView};

/// Observation schema version. Increment when features change.
pub const OBS_VERSION: u32 = 1;

/// Per-variable features of the bipartite graph.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VariableFeatures {
    /// Position in the original problem.
    pub index: usize,
    /// Objective coefficient.
    pub objective: f64,
    pub is_type_binary: bool,
    pub is_type_integer: bool,
    pub is_type_continuous: bool,
    pub has_lower_bound: bool,
    pub has_upper_bound: bool,
    /// Lower bound, 0 when absent.
    pub lower_bound: f64,
    /// Upper bound, 0 when absent.
    pub upper_bound: f64,
    /// Whether the variable is fixed at the current node.
    pub is_fixed: bool,
    /// Value the variable is fixed to, NaN when free.
    pub fixed_value: f64,
}

/// Per-constraint features of the bipartite graph.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RowFeatures {
    /// Position among the problem's constraints.
    pub index: usize,
    /// Right-hand side when present, otherwise the left-hand side.
    pub bias: f64,
    /// Cosine similarity between the row and the objective.
    pub objective_cosine_similarity: f64,
    /// Fraction of variables appearing in the row.
    pub degree: f64,
}

/// Sparse constraint matrix in coordinate form: rows are constraints,
/// columns are variables.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CooMatrix {
    pub values: Vec<f64>,
    pub row_indices: Vec<usize>,
    pub col_indices: Vec<usize>,
    pub n_rows: usize,
    pub n_cols: usize,
}

impl CooMatrix {
    pub fn nnz(&self) -> usize {
        self.values.len()
    }
}

/// Bipartite graph observation for branch-and-bound nodes.
///
/// One side holds a node per variable, the other a node per constraint
/// row; an edge carries the coefficient of the variable in the row.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NodeBipartiteObs {
    pub obs_version: u32,
    pub variables: Vec<VariableFeatures>,
    pub rows: Vec<RowFeatures>,
    pub edges: CooMatrix,
}

fn variable_features(vars: &[VarView]) -> Vec<VariableFeatures> {
    vars.iter()
        .enumerate()
        .map(|(index, v)| {
            let is_binary = v.integral
                && v.lower_bound.map_or(false, |b| b == 0.0)
                && v.upper_bound.map_or(false, |b| b == 1.0);
            VariableFeatures {
                index,
                objective: v.objective,
                is_type_binary: is_binary,
                is_type_integer: v.integral && !is_binary,
                is_type_continuous: !v.integral,
                has_lower_bound: v.lower_bound.is_some(),
                has_upper_bound: v.upper_bound.is_some(),
                lower_bound: v.lower_bound.unwrap_or(0.0),
                upper_bound: v.upper_bound.unwrap_or(0.0),
                is_fixed: v.fixed_value.is_some(),
                fixed_value: v.fixed_value.unwrap_or(f64::NAN),
            }
        })
        .collect()
}

fn row_features(rows: &[RowView], vars: &[VarView]) -> Vec<RowFeatures> {
    let n_vars = vars.len().max(1);
    let obj_norm: f64 = vars
        .iter()
        .map(|v| v.objective * v.objective)
        .sum::<f64>()
        .sqrt();
    rows.iter()
        .enumerate()
        .map(|(index, row)| {
            let bias = row.rhs.or(row.lhs).unwrap_or(0.0);
            let row_norm: f64 = row
                .coefficients
                .iter()
                .map(|&(_, c)| c * c)
                .sum::<f64>()
                .sqrt();
            let dot: f64 = row
                .coefficients
                .iter()
                .map(|&(idx, c)| c * vars[idx].objective)
                .sum();
            let cosine = if row_norm > 0.0 && obj_norm > 0.0 {
                dot / (row_norm * obj_norm)
            } else {
                0.0
            };
            RowFeatures {
                index,
                bias,
                objective_cosine_similarity: cosine,
                degree: row.coefficients.len() as f64 / n_vars as f64,
            }
        })
        .collect()
}

fn edge_matrix(rows: &[RowView], n_vars: usize) -> CooMatrix {
    let mut values = Vec::new();
    let mut row_indices = Vec::new();
    let mut col_indices = Vec::new();
    for (r, row) in rows.iter().enumerate() {
        for &(c, coef) in &row.coefficients {
            values.push(coef);
            row_indices.push(r);
            col_indices.push(c);
        }
    }
    CooMatrix {
        values,
        row_indices,
        col_indices,
        n_rows: rows.len(),
        n_cols: n_vars,
    }
}

/// Observation function that always extracts an absent value.
#[derive(Debug, Default, Clone, Copy)]
pub struct Nothing;

impl DataFunction for Nothing {
    fn before_reset(&mut self, _model: &Model) -> Result<(), DataError> {
        Ok(())
    }

    fn extract(&mut self, _model: &Model, _done: bool) -> Result<DataValue, DataError> {
        Ok(DataValue::None)
    }
}

/// Bipartite graph observation function on branch-and-bound nodes.
pub struct NodeBipartite {
    cache: bool,
    cached: Option<(Vec<RowFeatures>, CooMatrix)>,
}

impl NodeBipartite {
    /// `cache` reuses row and edge data within an episode. Only safe when
    /// the row set is static, i.e. with cutting planes disabled.
    pub fn new(cache: bool) -> Self {
        Self {
            cache,
            cached: None,
        }
    }
}

impl DataFunction for NodeBipartite {
    fn before_reset(&mut self, _model: &Model) -> Result<(), DataError> {
        self.cached = None;
        Ok(())
    }

    fn extract(&mut self, model: &Model, done: bool) -> Result<DataValue, DataError> {
        if done {
            return Ok(DataValue::None);
        }
        let vars = model.variables()?;
        let (rows, edges) = match self.cached.take() {
            Some(cached) => cached,
            None => {
                let row_views = model.rows()?;
                (
                    row_features(&row_views, &vars),
                    edge_matrix(&row_views, vars.len()),
                )
            }
        };
        if self.cache {
            self.cached = Some((rows.clone(), edges.clone()));
        }
        Ok(DataValue::NodeBipartite(NodeBipartiteObs {
            obs_version: OBS_VERSION,
            variables: variable_features(&vars),
            rows,
            edges,
        }))
    }
}

/// Pseudocost observation function on branch-and-bound nodes.
///
/// Extracts one value per variable, NaN where a pseudocost is not
/// applicable.
#[derive(Debug, Default, Clone, Copy)]
pub struct Pseudocosts;

impl DataFunction for Pseudocosts {
    fn before_reset(&mut self, _model: &Model) -> Result<(), DataError> {
        Ok(())
    }

    fn extract(&mut self, model: &Model, done: bool) -> Result<DataValue, DataError> {
        if done {
            return Ok(DataValue::None);
        }
        Ok(DataValue::Array(model.pseudocosts()?))
    }
}
