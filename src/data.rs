// src/data.rs
//
// Data extraction protocol shared by observation, reward, and information
// pipelines.
// - DataFunction: the two-method contract (before_reset / extract)
// - DataSpec:     what callers hand to an environment constructor
// - DataNode:     the materialized pipeline produced by parse()
// - DataValue:    the extracted payload, shape-preserving for aggregates

use std::collections::BTreeMap;
use std::fmt;

use serde::{Deserialize, Serialize};

use crate::observation::NodeBipartiteObs;
use crate::solver::{Model, SolverError};

/// Errors raised while building or running a data pipeline.
#[derive(Debug, Clone)]
pub enum DataError {
    /// A specification referenced the environment default where none
    /// exists.
    NoDefault,
    /// A pipeline used as a reward produced a non-scalar value.
    ScalarExpected { got: &'static str },
    Solver(SolverError),
}

impl fmt::Display for DataError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DataError::NoDefault => {
                write!(f, "cannot resolve \"default\" without a default value")
            }
            DataError::ScalarExpected { got } => {
                write!(f, "expected a scalar extraction, got {}", got)
            }
            DataError::Solver(e) => write!(f, "data extraction failed: {}", e),
        }
    }
}

impl std::error::Error for DataError {}

impl From<SolverError> for DataError {
    fn from(e: SolverError) -> Self {
        DataError::Solver(e)
    }
}

/// Payload extracted from a model state.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum DataValue {
    None,
    Scalar(f64),
    Vector(Vec<DataValue>),
    Map(BTreeMap<String, DataValue>),
    /// Dense per-variable array, indexable by action-set entries.
    Array(Vec<f64>),
    NodeBipartite(NodeBipartiteObs),
}

impl DataValue {
    /// Stable name of the value's shape, used in error messages.
    pub fn kind(&self) -> &'static str {
        match self {
            DataValue::None => "none",
            DataValue::Scalar(_) => "scalar",
            DataValue::Vector(_) => "vector",
            DataValue::Map(_) => "map",
            DataValue::Array(_) => "array",
            DataValue::NodeBipartite(_) => "node bipartite graph",
        }
    }

    /// The scalar payload, if this is a scalar.
    pub fn as_scalar(&self) -> Option<f64> {
        match self {
            DataValue::Scalar(x) => Some(*x),
            _ => None,
        }
    }
}

/// Pluggable extraction strategy.
///
/// `before_reset` re-initializes per-episode state at the start of an
/// episode; `extract` produces the payload for the current model state.
pub trait DataFunction: Send {
    fn before_reset(&mut self, model: &Model) -> Result<(), DataError>;
    fn extract(&mut self, model: &Model, done: bool) -> Result<DataValue, DataError>;
}

/// Specification accepted at environment construction.
///
/// Values, sequences, and mappings are turned into constant and aggregate
/// pipelines by `parse`; `Default` resolves to the environment-specific
/// default.
pub enum DataSpec {
    None,
    Scalar(f64),
    Seq(Vec<DataSpec>),
    Map(BTreeMap<String, DataSpec>),
    Function(Box<dyn DataFunction>),
    Default,
}

impl DataSpec {
    pub fn function(func: impl DataFunction + 'static) -> Self {
        DataSpec::Function(Box::new(func))
    }
}

impl fmt::Debug for DataSpec {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DataSpec::None => write!(f, "None"),
            DataSpec::Scalar(x) => write!(f, "Scalar({})", x),
            DataSpec::Seq(children) => f.debug_tuple("Seq").field(children).finish(),
            DataSpec::Map(children) => f.debug_tuple("Map").field(children).finish(),
            DataSpec::Function(_) => write!(f, "Function(..)"),
            DataSpec::Default => write!(f, "Default"),
        }
    }
}

impl From<f64> for DataSpec {
    fn from(x: f64) -> Self {
        DataSpec::Scalar(x)
    }
}

/// A materialized extraction pipeline.
pub enum DataNode {
    None,
    Constant(f64),
    Vector(Vec<DataNode>),
    Map(BTreeMap<String, DataNode>),
    Function(Box<dyn DataFunction>),
}

impl DataNode {
    /// Fan `before_reset` out to every function in the tree.
    pub fn before_reset(&mut self, model: &Model) -> Result<(), DataError> {
        match self {
            DataNode::None | DataNode::Constant(_) => Ok(()),
            DataNode::Vector(children) => {
                for child in children {
                    child.before_reset(model)?;
                }
                Ok(())
            }
            DataNode::Map(children) => {
                for child in children.values_mut() {
                    child.before_reset(model)?;
                }
                Ok(())
            }
            DataNode::Function(func) => func.before_reset(model),
        }
    }

    /// Extract, preserving aggregate shape.
    pub fn extract(&mut self, model: &Model, done: bool) -> Result<DataValue, DataError> {
        match self {
            DataNode::None => Ok(DataValue::None),
            DataNode::Constant(x) => Ok(DataValue::Scalar(*x)),
            DataNode::Vector(children) => {
                let mut out = Vec::with_capacity(children.len());
                for child in children {
                    out.push(child.extract(model, done)?);
                }
                Ok(DataValue::Vector(out))
            }
            DataNode::Map(children) => {
                let mut out = BTreeMap::new();
                for (key, child) in children {
                    out.insert(key.clone(), child.extract(model, done)?);
                }
                Ok(DataValue::Map(out))
            }
            DataNode::Function(func) => func.extract(model, done),
        }
    }
}

impl fmt::Debug for DataNode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DataNode::None => write!(f, "None"),
            DataNode::Constant(x) => write!(f, "Constant({})", x),
            DataNode::Vector(children) => f.debug_tuple("Vector").field(children).finish(),
            DataNode::Map(children) => f.debug_tuple("Map").field(children).finish(),
            DataNode::Function(_) => write!(f, "Function(..)"),
        }
    }
}

/// Recursively resolve a specification into a pipeline.
///
/// `default` supplies the environment-specific default; every `Default`
/// occurrence materializes a fresh instance from it. A `Default` with no
/// default available is a configuration error.
pub fn parse(
    spec: DataSpec,
    default: Option<&dyn Fn() -> DataNode>,
) -> Result<DataNode, DataError> {
    match spec {
        DataSpec::Default => match default {
            Some(factory) => Ok(factory()),
            None => Err(DataError::NoDefault),
        },
        DataSpec::None => Ok(DataNode::None),
        DataSpec::Scalar(x) => Ok(DataNode::Constant(x)),
        DataSpec::Seq(specs) => {
            let mut children = Vec::with_capacity(specs.len());
            for spec in specs {
                children.push(parse(spec, default)?);
            }
            Ok(DataNode::Vector(children))
        }
        DataSpec::Map(specs) => {
            let mut children = BTreeMap::new();
            for (key, spec) in specs {
                children.insert(key, parse(spec, default)?);
            }
            Ok(DataNode::Map(children))
        }
        DataSpec::Function(func) => Ok(DataNode::Function(func)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::solver::problem::{ProblemBuilder, Sense};

    fn test_model() -> Model {
        let mut b = ProblemBuilder::new("t", Sense::Minimize);
        let x = b.add_binary("x", 1.0);
        b.add_constraint("c", vec![(x, 1.0)], Some(0.0), None);
        Model::from_data(b.build()).unwrap()
    }

    #[test]
    fn parse_aggregates_round_trip() {
        let mut inner = BTreeMap::new();
        inner.insert("a".to_string(), DataSpec::Scalar(5.0));
        let spec = DataSpec::Seq(vec![
            DataSpec::Scalar(3.0),
            DataSpec::None,
            DataSpec::Map(inner),
        ]);

        let mut node = parse(spec, None).unwrap();
        let model = test_model();

        for done in [false, true] {
            let value = node.extract(&model, done).unwrap();
            let mut expected_map = BTreeMap::new();
            expected_map.insert("a".to_string(), DataValue::Scalar(5.0));
            assert_eq!(
                value,
                DataValue::Vector(vec![
                    DataValue::Scalar(3.0),
                    DataValue::None,
                    DataValue::Map(expected_map),
                ])
            );
        }
    }

    #[test]
    fn default_without_default_is_a_configuration_error() {
        assert!(matches!(
            parse(DataSpec::Default, None),
            Err(DataError::NoDefault)
        ));
        // Nested markers fail the same way.
        assert!(matches!(
            parse(DataSpec::Seq(vec![DataSpec::Default]), None),
            Err(DataError::NoDefault)
        ));
    }

    #[test]
    fn default_resolves_against_the_supplied_factory() {
        let factory = || DataNode::Constant(7.0);
        let spec = DataSpec::Seq(vec![DataSpec::Default, DataSpec::Scalar(1.0)]);
        let mut node = parse(spec, Some(&factory)).unwrap();

        let model = test_model();
        let value = node.extract(&model, false).unwrap();
        assert_eq!(
            value,
            DataValue::Vector(vec![DataValue::Scalar(7.0), DataValue::Scalar(1.0)])
        );
    }

    #[test]
    fn functions_pass_through_unchanged() {
        struct Stamp(f64);
        impl DataFunction for Stamp {
            fn before_reset(&mut self, _model: &Model) -> Result<(), DataError> {
                Ok(())
            }
            fn extract(&mut self, _model: &Model, _done: bool) -> Result<DataValue, DataError> {
                Ok(DataValue::Scalar(self.0))
            }
        }

        let mut node = parse(DataSpec::function(Stamp(9.0)), None).unwrap();
        let model = test_model();
        assert_eq!(
            node.extract(&model, false).unwrap(),
            DataValue::Scalar(9.0)
        );
    }
}
