// src/reward/mod.rs
//
// Reward functions over solver progress.
//
// A RewardFunction is an expression tree: leaves read solver statistics
// (differenced between calls) or constants, inner nodes combine them.
// Trees are built with combinator methods and evaluated by a small
// interpreter at extract time, so composite rewards stay explicit and
// serializable in structure.

use crate::data::{DataError, DataFunction, DataValue};
use crate::solver::Model;

/// Composable reward function.
///
/// Sources hold per-episode counters that are re-initialized by
/// `before_reset` and differenced by `extract`, so each extraction reports
/// progress since the previous state.
pub struct RewardFunction {
    node: Node,
}

enum Node {
    Constant(f64),
    /// 1.0 on terminal states, 0.0 otherwise.
    IsDone,
    /// LP iterations spent since the previous extraction.
    LpIterations { last: u64 },
    /// Branch-and-bound nodes processed since the previous extraction.
    NNodes { last: u64 },
    /// Seconds of solving time spent since the previous extraction.
    SolvingTime { wall: bool, last: f64 },
    Neg(Box<Node>),
    Abs(Box<Node>),
    Exp(Box<Node>),
    Sqrt(Box<Node>),
    Log { base: f64, inner: Box<Node> },
    Pow { inner: Box<Node>, exponent: f64 },
    Add(Box<Node>, Box<Node>),
    Sub(Box<Node>, Box<Node>),
    Mul(Box<Node>, Box<Node>),
    Div(Box<Node>, Box<Node>),
    /// Running sum of the inner reward over the episode.
    CumSum { inner: Box<Node>, total: f64 },
}

impl RewardFunction {
    // ----- Sources -----

    pub fn constant(value: f64) -> Self {
        Self {
            node: Node::Constant(value),
        }
    }

    /// Single reward on terminal states.
    pub fn is_done() -> Self {
        Self { node: Node::IsDone }
    }

    /// LP iterations difference between states.
    pub fn lp_iterations() -> Self {
        Self {
            node: Node::LpIterations { last: 0 },
        }
    }

    /// Processed-node difference between states.
    pub fn n_nodes() -> Self {
        Self {
            node: Node::NNodes { last: 0 },
        }
    }

    /// Solving-time difference between states. `wall` selects wall-clock
    /// measurement over process time.
    pub fn solving_time(wall: bool) -> Self {
        Self {
            node: Node::SolvingTime { wall, last: 0.0 },
        }
    }

    // ----- Combinators -----

    pub fn add(self, other: RewardFunction) -> Self {
        Self {
            node: Node::Add(Box::new(self.node), Box::new(other.node)),
        }
    }

    pub fn sub(self, other: RewardFunction) -> Self {
        Self {
            node: Node::Sub(Box::new(self.node), Box::new(other.node)),
        }
    }

    pub fn mul(self, other: RewardFunction) -> Self {
        Self {
            node: Node::Mul(Box::new(self.node), Box::new(other.node)),
        }
    }

    pub fn div(self, other: RewardFunction) -> Self {
        Self {
            node: Node::Div(Box::new(self.node), Box::new(other.node)),
        }
    }

    /// Multiply by a constant factor.
    pub fn scale(self, factor: f64) -> Self {
        self.mul(Self::constant(factor))
    }

    pub fn neg(self) -> Self {
        Self {
            node: Node::Neg(Box::new(self.node)),
        }
    }

    pub fn abs(self) -> Self {
        Self {
            node: Node::Abs(Box::new(self.node)),
        }
    }

    pub fn exp(self) -> Self {
        Self {
            node: Node::Exp(Box::new(self.node)),
        }
    }

    pub fn sqrt(self) -> Self {
        Self {
            node: Node::Sqrt(Box::new(self.node)),
        }
    }

    pub fn log(self, base: f64) -> Self {
        Self {
            node: Node::Log {
                base,
                inner: Box::new(self.node),
            },
        }
    }

    pub fn pow(self, exponent: f64) -> Self {
        Self {
            node: Node::Pow {
                inner: Box::new(self.node),
                exponent,
            },
        }
    }

    /// Running sum of this reward over the episode.
    pub fn cumsum(self) -> Self {
        Self {
            node: Node::CumSum {
                inner: Box::new(self.node),
                total: 0.0,
            },
        }
    }

    // ----- Evaluation -----

    pub fn before_reset(&mut self, model: &Model) -> Result<(), DataError> {
        reset_node(&mut self.node, model)
    }

    pub fn extract(&mut self, model: &Model, done: bool) -> Result<f64, DataError> {
        eval_node(&mut self.node, model, done)
    }
}

fn reset_node(node: &mut Node, model: &Model) -> Result<(), DataError> {
    match node {
        Node::Constant(_) | Node::IsDone => Ok(()),
        Node::LpIterations { last } => {
            *last = model.lp_iterations()?;
            Ok(())
        }
        Node::NNodes { last } => {
            *last = model.n_nodes()?;
            Ok(())
        }
        Node::SolvingTime { wall, last } => {
            *last = model.solving_time(*wall)?;
            Ok(())
        }
        Node::Neg(inner)
        | Node::Abs(inner)
        | Node::Exp(inner)
        | Node::Sqrt(inner)
        | Node::Log { inner, .. }
        | Node::Pow { inner, .. } => reset_node(inner, model),
        Node::Add(a, b) | Node::Sub(a, b) | Node::Mul(a, b) | Node::Div(a, b) => {
            reset_node(a, model)?;
            reset_node(b, model)
        }
        Node::CumSum { inner, total } => {
            *total = 0.0;
            reset_node(inner, model)
        }
    }
}

fn eval_node(node: &mut Node, model: &Model, done: bool) -> Result<f64, DataError> {
    match node {
        Node::Constant(x) => Ok(*x),
        Node::IsDone => Ok(if done { 1.0 } else { 0.0 }),
        Node::LpIterations { last } => {
            let current = model.lp_iterations()?;
            let delta = current.saturating_sub(*last) as f64;
            *last = current;
            Ok(delta)
        }
        Node::NNodes { last } => {
            let current = model.n_nodes()?;
            let delta = current.saturating_sub(*last) as f64;
            *last = current;
            Ok(delta)
        }
        Node::SolvingTime { wall, last } => {
            let current = model.solving_time(*wall)?;
            let delta = (current - *last).max(0.0);
            *last = current;
            Ok(delta)
        }
        Node::Neg(inner) => Ok(-eval_node(inner, model, done)?),
        Node::Abs(inner) => Ok(eval_node(inner, model, done)?.abs()),
        Node::Exp(inner) => Ok(eval_node(inner, model, done)?.exp()),
        Node::Sqrt(inner) => Ok(eval_node(inner, model, done)?.sqrt()),
        Node::Log { base, inner } => Ok(eval_node(inner, model, done)?.log(*base)),
        Node::Pow { inner, exponent } => Ok(eval_node(inner, model, done)?.powf(*exponent)),
        Node::Add(a, b) => Ok(eval_node(a, model, done)? + eval_node(b, model, done)?),
        Node::Sub(a, b) => Ok(eval_node(a, model, done)? - eval_node(b, model, done)?),
        Node::Mul(a, b) => Ok(eval_node(a, model, done)? * eval_node(b, model, done)?),
        Node::Div(a, b) => Ok(eval_node(a, model, done)? / eval_node(b, model, done)?),
        Node::CumSum { inner, total } => {
            *total += eval_node(inner, model, done)?;
            Ok(*total)
        }
    }
}

impl DataFunction for RewardFunction {
    fn before_reset(&mut self, model: &Model) -> Result<(), DataError> {
        RewardFunction::before_reset(self, model)
    }

    fn extract(&mut self, model: &Model, done: bool) -> Result<DataValue, DataError> {
        Ok(DataValue::Scalar(RewardFunction::extract(
            self, model, done,
        )?))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::solver::problem::{ProblemBuilder, Sense};

    fn solved_model() -> Model {
        let mut b = ProblemBuilder::new("t", Sense::Minimize);
        let x = b.add_binary("x", 1.0);
        let y = b.add_binary("y", 2.0);
        b.add_constraint("c", vec![(x, 1.0), (y, 1.0)], Some(1.0), None);
        let mut model = Model::from_data(b.build()).unwrap();
        model.solve().unwrap();
        model
    }

    #[test]
    fn is_done_flags_terminal_states() {
        let model = solved_model();
        let mut reward = RewardFunction::is_done();
        reward.before_reset(&model).unwrap();

        assert_eq!(reward.extract(&model, false).unwrap(), 0.0);
        assert_eq!(reward.extract(&model, true).unwrap(), 1.0);
    }

    #[test]
    fn n_nodes_reports_difference_between_calls() {
        let mut b = ProblemBuilder::new("t", Sense::Minimize);
        let x = b.add_binary("x", 1.0);
        b.add_constraint("c", vec![(x, 1.0)], Some(1.0), None);
        let mut model = Model::from_data(b.build()).unwrap();

        let mut reward = RewardFunction::n_nodes();
        reward.before_reset(&model).unwrap();

        model.solve().unwrap();
        let first = reward.extract(&model, true).unwrap();
        assert!(first > 0.0);

        // No further work since the last extraction.
        assert_eq!(reward.extract(&model, true).unwrap(), 0.0);
    }

    #[test]
    fn arithmetic_composes() {
        let model = solved_model();
        let mut reward = RewardFunction::is_done()
            .scale(3.0)
            .add(RewardFunction::constant(1.0))
            .neg();
        reward.before_reset(&model).unwrap();

        assert_eq!(reward.extract(&model, true).unwrap(), -4.0);
        assert_eq!(reward.extract(&model, false).unwrap(), -1.0);
    }

    #[test]
    fn exp_and_log_transforms() {
        let model = solved_model();
        let mut reward = RewardFunction::constant(1.0).exp();
        reward.before_reset(&model).unwrap();
        assert!((reward.extract(&model, false).unwrap() - 1.0f64.exp()).abs() < 1e-12);

        let mut reward = RewardFunction::constant(8.0).log(2.0);
        reward.before_reset(&model).unwrap();
        assert!((reward.extract(&model, false).unwrap() - 3.0).abs() < 1e-12);
    }

    #[test]
    fn cumsum_accumulates_and_resets_per_episode() {
        let model = solved_model();
        let mut reward = RewardFunction::constant(2.0).cumsum();

        reward.before_reset(&model).unwrap();
        assert_eq!(reward.extract(&model, false).unwrap(), 2.0);
        assert_eq!(reward.extract(&model, false).unwrap(), 4.0);

        reward.before_reset(&model).unwrap();
        assert_eq!(reward.extract(&model, false).unwrap(), 2.0);
    }
}
