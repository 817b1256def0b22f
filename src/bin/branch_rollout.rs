// src/bin/branch_rollout.rs
//
// Research harness: roll a branching agent over generated set cover
// instances and report per-episode summaries.
//
// Run examples:
//   cargo run --bin branch_rollout -- --episodes 5 --seed 1
//   cargo run --bin branch_rollout -- --rows 8 --cols 16 --density 0.25 --log runs.jsonl
//   cargo run --bin branch_rollout -- --engine-default --episodes 3

use anyhow::{bail, Context, Result};
use clap::Parser;

use mipgym::{
    Branching, BranchingAction, EnvConfig, EpisodeSink, FileSink, NoopSink, SetCoverConfig,
    SetCoverGenerator, TransitionRecord,
};

#[derive(Debug, Parser)]
#[command(name = "branch_rollout", about = "Roll a branching agent over set cover instances")]
struct Args {
    /// Number of episodes to run.
    #[arg(long, default_value_t = 5)]
    episodes: u32,

    /// Rows of the generated set cover instances.
    #[arg(long, default_value_t = 6)]
    rows: usize,

    /// Columns (variables) of the generated instances.
    #[arg(long, default_value_t = 12)]
    cols: usize,

    /// Density of the coverage matrix.
    #[arg(long, default_value_t = 0.3)]
    density: f64,

    /// Maximum objective coefficient.
    #[arg(long, default_value_t = 20)]
    max_coef: u64,

    /// Seed for the environment and the instance stream.
    #[arg(long, default_value_t = 42)]
    seed: u64,

    /// Defer every decision to the engine's default rule instead of
    /// branching on the first candidate.
    #[arg(long)]
    engine_default: bool,

    /// Optional JSONL telemetry path.
    #[arg(long)]
    log: Option<String>,
}

fn main() -> Result<()> {
    let args = Args::parse();

    let config = SetCoverConfig {
        n_rows: args.rows,
        n_cols: args.cols,
        density: args.density,
        max_coef: args.max_coef,
    };
    let mut generator =
        SetCoverGenerator::new(config, None).context("invalid generator configuration")?;
    generator.seed(args.seed);

    let mut env = Branching::new(EnvConfig::default()).context("environment construction")?;
    env.seed(args.seed);

    let mut sink: Box<dyn EpisodeSink> = match &args.log {
        Some(path) => Box::new(
            FileSink::create(path).with_context(|| format!("cannot create '{}'", path))?,
        ),
        None => Box::new(NoopSink),
    };

    for episode in 0..args.episodes {
        let instance = match generator.next() {
            Some(instance) => instance.context("instance generation")?,
            None => bail!("instance generator is exhausted"),
        };

        let reset = env.reset(instance).context("environment reset")?;
        let mut cumulated = reset.reward_offset;
        let mut steps = 0u32;
        let mut action_set = reset.action_set;
        let mut done = reset.done;

        while !done {
            let action = match (&action_set, args.engine_default) {
                (_, true) => BranchingAction::EngineDefault,
                (Some(candidates), false) if !candidates.is_empty() => {
                    BranchingAction::Candidate(candidates[0])
                }
                _ => bail!("no action available on a non-terminal state"),
            };

            let step = env.step(action).context("environment step")?;
            steps += 1;
            cumulated += step.reward;

            let model = env.model().context("episode model missing")?;
            sink.log_transition(&TransitionRecord {
                episode,
                step: steps,
                reward: step.reward,
                done: step.done,
                action_set_size: step.action_set.as_ref().map(|s| s.len()),
                primal_bound: model.primal_bound()?,
                dual_bound: model.dual_bound()?,
                n_nodes: model.n_nodes()?,
            });

            done = step.done;
            action_set = step.action_set;
        }

        let model = env.model().context("episode model missing")?;
        println!(
            "episode={} steps={} cumulated_reward={:.3} primal_bound={:.3} n_nodes={}",
            episode,
            steps,
            cumulated,
            model.primal_bound()?,
            model.n_nodes()?,
        );
    }

    Ok(())
}
