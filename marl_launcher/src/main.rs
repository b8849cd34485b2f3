//! Thin launcher around the marl_train library.
//!
//! Builds a [`TrainingConfig`] from defaults, an optional JSON file and
//! command-line overrides (in that order), then runs the training loop on
//! the selected scenario. `inspect` prints saved learning curves.

use std::path::PathBuf;

use anyhow::Context;
use burn::backend::{Autodiff, NdArray};
use clap::{Args, Parser, Subcommand};

use marl_train::{build_trainers, MultiAgentEnv, PolicyFamily, TrainingConfig, TrainingCurves, TrainingLoop};

type Backend = Autodiff<NdArray<f32>>;

/// Reinforcement learning experiments for multiagent environments.
#[derive(Parser, Debug)]
#[command(name = "marl-train", version)]
struct Cli {
    #[command(subcommand)]
    command: Option<Command>,

    #[command(flatten)]
    run: RunArgs,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Print the saved learning curves of an experiment, one row per window.
    Inspect {
        /// JSON config file to take directories and experiment name from.
        #[arg(long)]
        config: Option<PathBuf>,
        /// Name of the experiment.
        #[arg(long)]
        exp_name: Option<String>,
        /// Directory holding the curve artifacts.
        #[arg(long)]
        plots_dir: Option<PathBuf>,
    },
}

/// Training options. Unset flags keep the config file or default value.
#[derive(Args, Debug, Default)]
struct RunArgs {
    /// JSON config file applied before the flags below.
    #[arg(long)]
    config: Option<PathBuf>,

    // Environment
    /// Name of the scenario.
    #[arg(long)]
    scenario: Option<String>,
    /// Maximum episode length.
    #[arg(long)]
    max_episode_len: Option<usize>,
    /// Number of episodes.
    #[arg(long)]
    num_episodes: Option<usize>,
    /// Number of adversaries.
    #[arg(long)]
    num_adversaries: Option<usize>,
    /// Policy for good agents (maddpg or ddpg).
    #[arg(long)]
    good_policy: Option<PolicyFamily>,
    /// Policy of adversaries (maddpg or ddpg).
    #[arg(long)]
    adv_policy: Option<PolicyFamily>,

    // Core training parameters
    /// Learning rate for Adam optimizer.
    #[arg(long)]
    lr: Option<f64>,
    /// Discount factor.
    #[arg(long)]
    gamma: Option<f32>,
    /// Number of episodes to optimize at the same time.
    #[arg(long)]
    batch_size: Option<usize>,
    /// Number of units in the mlp.
    #[arg(long)]
    num_units: Option<usize>,
    /// Seed for exploration noise and scenario spawns.
    #[arg(long)]
    seed: Option<u64>,

    // Checkpointing
    /// Name of the experiment.
    #[arg(long)]
    exp_name: Option<String>,
    /// Directory in which training state and model should be saved.
    #[arg(long)]
    save_dir: Option<PathBuf>,
    /// Save model once every time this many episodes are completed.
    #[arg(long)]
    save_rate: Option<usize>,
    /// Directory in which training state and model are loaded.
    #[arg(long)]
    load_dir: Option<PathBuf>,
    /// Checkpoints to keep on disk (0 keeps all).
    #[arg(long)]
    keep_last_checkpoints: Option<usize>,

    // Evaluation
    /// Resume from the latest checkpoint.
    #[arg(long)]
    restore: bool,
    /// Render a trained policy without training.
    #[arg(long)]
    display: bool,
    /// Record per-step benchmark info from a trained policy.
    #[arg(long)]
    benchmark: bool,
    /// Number of iterations run for benchmarking.
    #[arg(long)]
    benchmark_iters: Option<usize>,
    /// Directory where benchmark data is saved.
    #[arg(long)]
    benchmark_dir: Option<PathBuf>,
    /// Directory where plot data is saved.
    #[arg(long)]
    plots_dir: Option<PathBuf>,
    /// Directory where per-episode error and reward logs are saved.
    #[arg(long)]
    data_dir: Option<PathBuf>,
    /// Directory where the scalar telemetry stream is saved.
    #[arg(long)]
    logs_dir: Option<PathBuf>,
}

/// Start from defaults or a JSON file, then apply command-line overrides.
fn build_config(args: &RunArgs) -> anyhow::Result<TrainingConfig> {
    let mut cfg = match &args.config {
        Some(path) => TrainingConfig::from_json_file(path)?,
        None => TrainingConfig::default(),
    };

    if let Some(v) = &args.scenario {
        cfg.scenario = v.clone();
    }
    if let Some(v) = args.max_episode_len {
        cfg.max_episode_len = v;
    }
    if let Some(v) = args.num_episodes {
        cfg.num_episodes = v;
    }
    if let Some(v) = args.num_adversaries {
        cfg.num_adversaries = v;
    }
    if let Some(v) = args.good_policy {
        cfg.good_policy = v;
    }
    if let Some(v) = args.adv_policy {
        cfg.adv_policy = v;
    }
    if let Some(v) = args.lr {
        cfg.lr = v;
    }
    if let Some(v) = args.gamma {
        cfg.gamma = v;
    }
    if let Some(v) = args.batch_size {
        cfg.batch_size = v;
    }
    if let Some(v) = args.num_units {
        cfg.num_units = v;
    }
    if let Some(v) = args.seed {
        cfg.seed = v;
    }
    if let Some(v) = &args.exp_name {
        cfg.exp_name = v.clone();
    }
    if let Some(v) = &args.save_dir {
        cfg.save_dir = v.clone();
    }
    if let Some(v) = args.save_rate {
        cfg.save_rate = v;
    }
    if let Some(v) = &args.load_dir {
        cfg.load_dir = Some(v.clone());
    }
    if let Some(v) = args.keep_last_checkpoints {
        cfg.keep_last_checkpoints = v;
    }
    if let Some(v) = args.benchmark_iters {
        cfg.benchmark_iters = v;
    }
    if let Some(v) = &args.benchmark_dir {
        cfg.benchmark_dir = v.clone();
    }
    if let Some(v) = &args.plots_dir {
        cfg.plots_dir = v.clone();
    }
    if let Some(v) = &args.data_dir {
        cfg.data_dir = v.clone();
    }
    if let Some(v) = &args.logs_dir {
        cfg.logs_dir = v.clone();
    }

    // Flags only switch modes on; a config file may already have set them.
    cfg.restore |= args.restore;
    cfg.display |= args.display;
    cfg.benchmark |= args.benchmark;

    cfg.validate()?;
    Ok(cfg)
}

fn train(config: &TrainingConfig) -> anyhow::Result<()> {
    let env = encirclement::make_env(&config.scenario, config.seed)?;
    let device = Default::default();
    let trainers = build_trainers::<Backend>(&env.observation_sizes(), env.action_space(), config, &device)?;

    let mut controller = TrainingLoop::new(env, trainers, config).context("failed to start training loop")?;
    let summary = controller.run()?;

    log::info!(
        "Stopped ({:?}) after {} episodes ({} total), {} steps",
        summary.reason,
        summary.episodes,
        summary.total_episodes,
        summary.global_steps
    );
    if summary.telemetry_failures > 0 {
        log::warn!("{} telemetry records were not written", summary.telemetry_failures);
    }
    Ok(())
}

/// Render curves as a fixed-width table.
fn format_curves(curves: &TrainingCurves) -> String {
    let channels = curves.errors.first().map_or(0, Vec::len);
    let mut out = format!("{:>6} {:>12}", "window", "reward");
    for k in 0..channels {
        out.push_str(&format!(" {:>10}", format!("error_{}", k)));
    }
    out.push('\n');

    for (w, reward) in curves.rewards.iter().enumerate() {
        out.push_str(&format!("{:>6} {:>12.4}", w, reward));
        if let Some(errors) = curves.errors.get(w) {
            for value in errors {
                out.push_str(&format!(" {:>10.4}", value));
            }
        }
        out.push('\n');
    }
    out
}

fn inspect(config: Option<PathBuf>, exp_name: Option<String>, plots_dir: Option<PathBuf>) -> anyhow::Result<()> {
    let mut cfg = match config {
        Some(path) => TrainingConfig::from_json_file(path)?,
        None => TrainingConfig::default(),
    };
    if let Some(name) = exp_name {
        cfg.exp_name = name;
    }
    if let Some(dir) = plots_dir {
        cfg.plots_dir = dir;
    }

    let paths = cfg.paths();
    let curves = TrainingCurves::load(&paths)
        .with_context(|| format!("no learning curves at {}", paths.rewards_curve.display()))?;
    print!("{}", format_curves(&curves));
    Ok(())
}

fn main() -> anyhow::Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let cli = Cli::parse();
    match cli.command {
        Some(Command::Inspect {
            config,
            exp_name,
            plots_dir,
        }) => inspect(config, exp_name, plots_dir),
        None => {
            let config = build_config(&cli.run)?;
            log::debug!("{}", serde_json::to_string(&config)?);
            train(&config)
        }
    }
}
