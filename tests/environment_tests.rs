// End-to-end environment tests driving the bundled backend.

use std::collections::BTreeMap;

use mipgym::{
    Branching, BranchingAction, Configuring, DataValue, DynamicsError, EnvConfig, EnvError,
    Model, ParamValue, PrimalSearch, PrimalSearchDynamics, ProblemBuilder, RandomEngine, Sense,
    SetCoverConfig, SetCoverGenerator,
};

fn small_cover_config() -> SetCoverConfig {
    SetCoverConfig {
        n_rows: 6,
        n_cols: 10,
        density: 0.3,
        max_coef: 10,
    }
}

fn small_instance(seed: u64) -> Model {
    let mut rng = RandomEngine::new(seed);
    SetCoverGenerator::generate_instance(&small_cover_config(), &mut rng).unwrap()
}

/// Three binary variables, optimum objective 2 (y alone).
fn tiny_instance() -> Model {
    let mut b = ProblemBuilder::new("tiny", Sense::Minimize);
    let x = b.add_binary("x", 1.0);
    let y = b.add_binary("y", 2.0);
    let z = b.add_binary("z", 3.0);
    b.add_constraint("c0", vec![(x, 1.0), (y, 1.0)], Some(1.0), None);
    b.add_constraint("c1", vec![(y, 1.0), (z, 1.0)], Some(1.0), None);
    Model::from_data(b.build()).unwrap()
}

#[test]
fn step_before_reset_is_a_precondition_violation() {
    let mut env = Branching::new(EnvConfig::default()).unwrap();
    let result = env.step(BranchingAction::EngineDefault);
    assert!(matches!(result, Err(EnvError::NotTransitionable)));
}

#[test]
fn branching_episode_runs_to_termination() {
    let mut env = Branching::new(EnvConfig::default()).unwrap();
    env.seed(3);

    let n_vars = 10;
    let reset = env.reset(small_instance(17)).unwrap();
    assert!(!reset.done, "small instances should reach a branching node");

    let mut action_set = reset.action_set.expect("non-terminal reset offers actions");
    assert!(!action_set.is_empty());

    let mut cumulated = reset.reward_offset;
    let mut steps = 0;
    loop {
        for &candidate in &action_set {
            assert!(candidate < n_vars, "candidate {} out of range", candidate);
        }
        let step = env.step(BranchingAction::Candidate(action_set[0])).unwrap();
        cumulated += step.reward;
        steps += 1;
        assert!(steps < 100_000, "episode failed to terminate");

        if step.done {
            assert!(step.action_set.is_none());
            assert!(step.observation.is_none());
            break;
        }
        assert!(step.observation.is_some());
        action_set = step.action_set.expect("non-terminal step offers actions");
    }

    assert!(cumulated.is_finite());
    // Terminal-indicator reward: exactly the terminal step contributes.
    assert!((cumulated - 1.0).abs() < 1e-9);

    let model = env.model().unwrap();
    assert!(model.is_solved().unwrap());
    assert!(model.primal_bound().unwrap().is_finite());
}

#[test]
fn branching_observation_is_a_bipartite_graph() {
    let mut env = Branching::new(EnvConfig::default()).unwrap();
    let reset = env.reset(small_instance(23)).unwrap();
    assert!(!reset.done);

    match reset.observation {
        Some(DataValue::NodeBipartite(obs)) => {
            assert_eq!(obs.variables.len(), 10);
            assert_eq!(obs.rows.len(), 6);
            assert!(obs.edges.nnz() > 0);
        }
        other => panic!("expected a bipartite observation, got {:?}", other),
    }
}

#[test]
fn branching_rejects_actions_outside_the_action_set() {
    let mut env = Branching::new(EnvConfig::default()).unwrap();
    let reset = env.reset(tiny_instance()).unwrap();
    assert!(!reset.done);

    let result = env.step(BranchingAction::Candidate(999));
    assert!(matches!(
        result,
        Err(EnvError::Dynamics(DynamicsError::ActionOutOfSet { .. }))
    ));

    // The environment is latched until the next reset.
    let result = env.step(BranchingAction::EngineDefault);
    assert!(matches!(result, Err(EnvError::NotTransitionable)));

    // A reset recovers.
    let reset = env.reset(tiny_instance()).unwrap();
    assert!(!reset.done);
}

#[test]
fn environment_seeding_makes_solver_seeds_reproducible() {
    let solver_seeds = |env_seed: u64| {
        let mut env = Branching::new(EnvConfig::default()).unwrap();
        env.seed(env_seed);
        env.reset(tiny_instance()).unwrap();
        let model = env.model().unwrap();
        [
            model.get_param("randomization/permutationseed").unwrap(),
            model.get_param("randomization/randomseedshift").unwrap(),
            model.get_param("randomization/lpseed").unwrap(),
        ]
    };

    assert_eq!(solver_seeds(11), solver_seeds(11));
    assert_ne!(solver_seeds(11), solver_seeds(31));
}

#[test]
fn solver_params_are_applied_at_every_reset() {
    let config = EnvConfig {
        solver_params: vec![("limits/totalnodes".to_string(), ParamValue::Int(2))],
        ..Default::default()
    };
    let mut env = Branching::new(config).unwrap();

    let mut done = env.reset(small_instance(29)).unwrap().done;
    let mut steps = 0;
    while !done {
        done = env.step(BranchingAction::EngineDefault).unwrap().done;
        steps += 1;
        assert!(steps < 10, "node limit should stop the episode quickly");
    }
    assert!(env.model().unwrap().n_nodes().unwrap() <= 2);
}

#[test]
fn configuring_episode_is_single_shot() {
    let mut env = Configuring::new(EnvConfig::default()).unwrap();
    let reset = env.reset(tiny_instance()).unwrap();

    assert!(!reset.done);
    assert!(reset.action_set.is_none());

    let mut action = BTreeMap::new();
    action.insert("limits/totalnodes".to_string(), ParamValue::Int(100_000));
    let step = env.step(action).unwrap();

    assert!(step.done);
    assert!(step.action_set.is_none());
    assert!((step.reward - 1.0).abs() < 1e-9);

    let model = env.model().unwrap();
    assert!(model.is_solved().unwrap());
    assert!((model.primal_bound().unwrap() - 2.0).abs() < 1e-9);
}

#[test]
fn failed_transition_latches_the_environment() {
    let mut env = Configuring::new(EnvConfig::default()).unwrap();
    env.reset(tiny_instance()).unwrap();

    let mut action = BTreeMap::new();
    action.insert("no/such/param".to_string(), ParamValue::Int(1));
    let result = env.step(action);
    assert!(matches!(result, Err(EnvError::Dynamics(_))));

    // No further transition is attempted without a reset.
    let result = env.step(BTreeMap::new());
    assert!(matches!(result, Err(EnvError::NotTransitionable)));
}

#[test]
fn primal_search_accepts_partial_and_empty_assignments() {
    let dynamics = PrimalSearchDynamics::new(1, 1, 0, -1).unwrap();
    let mut env = PrimalSearch::with_dynamics(EnvConfig::default(), dynamics).unwrap();

    let reset = env.reset(tiny_instance()).unwrap();
    assert!(!reset.done);
    let mut action_set = reset.action_set.expect("heuristic call offers candidates");

    // First trial is a no-op.
    let step = env.step(Vec::new()).unwrap();
    let mut done = step.done;
    if let Some(set) = step.action_set {
        action_set = set;
    }

    let mut steps = 1;
    while !done {
        // Propose the all-ones assignment over the current candidates.
        let assignment: Vec<(usize, f64)> =
            action_set.iter().map(|&idx| (idx, 1.0)).collect();
        let step = env.step(assignment).unwrap();
        done = step.done;
        if let Some(set) = step.action_set {
            action_set = set;
        }
        steps += 1;
        assert!(steps < 100_000, "episode failed to terminate");
    }

    let model = env.model().unwrap();
    assert!(model.is_solved().unwrap());
    // The all-ones proposals are feasible, so the search proves optimum 2.
    assert!((model.primal_bound().unwrap() - 2.0).abs() < 1e-9);
}

#[test]
fn primal_search_never_fires_past_the_depth_ceiling() {
    // Gating that blocks every call: the episode completes inside reset.
    let dynamics = PrimalSearchDynamics::new(-1, 1, 50, 50).unwrap();
    let mut env = PrimalSearch::with_dynamics(EnvConfig::default(), dynamics).unwrap();

    let reset = env.reset(tiny_instance()).unwrap();
    assert!(reset.done);
    assert!(reset.action_set.is_none());
    assert!(env.model().unwrap().is_solved().unwrap());
}

#[test]
fn custom_pipelines_shape_reset_outputs() {
    use mipgym::DataSpec;

    let mut inner = BTreeMap::new();
    inner.insert("constant".to_string(), DataSpec::Scalar(5.0));
    let config = EnvConfig {
        observation: DataSpec::Seq(vec![DataSpec::Scalar(3.0), DataSpec::None]),
        information: DataSpec::Map(inner),
        ..Default::default()
    };
    let mut env = Branching::new(config).unwrap();
    let reset = env.reset(tiny_instance()).unwrap();

    assert_eq!(
        reset.observation,
        Some(DataValue::Vector(vec![
            DataValue::Scalar(3.0),
            DataValue::None
        ]))
    );
    let mut expected = BTreeMap::new();
    expected.insert("constant".to_string(), DataValue::Scalar(5.0));
    assert_eq!(reset.info, DataValue::Map(expected));
}

#[test]
fn reset_from_a_solved_model_replays_the_original_problem() {
    let mut model = tiny_instance();
    model.solve().unwrap();
    assert!(model.is_solved().unwrap());

    // Resetting from a solved model copies the untouched problem.
    let mut env = Branching::new(EnvConfig::default()).unwrap();
    let reset = env.reset(model).unwrap();
    assert!(!reset.done);
    assert!(!env.model().unwrap().is_solved().unwrap());
}
