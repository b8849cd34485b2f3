//! # MARL Train: Resumable Multi-Agent Training Loop
//!
//! Training-loop controller for multi-agent deep deterministic policy
//! gradient (MADDPG) agents sharing one simulated world. The controller
//! owns the step loop, episode bookkeeping, telemetry, checkpointing and
//! resume; learners and scenarios plug in through two traits.
//!
//! ## Architecture Overview
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────┐
//! │                          TrainingLoop                               │
//! ├─────────────────────────────────────────────────────────────────────┤
//! │   ┌──────────────┐   actions    ┌────────────────────┐              │
//! │   │ AgentTrainer │────────────► │   MultiAgentEnv    │              │
//! │   │  × n_agents  │◄──────────── │ (scenario crate)   │              │
//! │   └──────┬───────┘  experience  └────────────────────┘              │
//! │          │ update_roster (peers visible, centralised critic)        │
//! │          ▼                                                          │
//! │   ┌───────────────────┐   ┌────────────────┐   ┌────────────────┐   │
//! │   │ EpisodeAccumulator│──►│TelemetryWriter │   │CheckpointMgr   │   │
//! │   │ rewards / errors  │   │ (own thread)   │   │ checkpoint_<n> │   │
//! │   └───────────────────┘   └────────────────┘   └────────────────┘   │
//! └─────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Run modes
//!
//! | Mode      | Updates | Checkpoints | Telemetry | Render | Stops on               |
//! |-----------|---------|-------------|-----------|--------|------------------------|
//! | train     | yes     | yes         | yes       | no     | episode budget         |
//! | display   | no      | no          | no        | yes    | never                  |
//! | benchmark | no      | no          | yes       | no     | step budget + boundary |
//!
//! ## Usage
//!
//! ```rust,ignore
//! use burn::backend::{Autodiff, NdArray};
//! use marl_train::{build_trainers, TrainingConfig, TrainingLoop};
//!
//! type B = Autodiff<NdArray<f32>>;
//!
//! let config = TrainingConfig::new().with_save_rate(100).with_num_episodes(5_000);
//! let env = encirclement::make_env(&config.scenario, config.seed)?;
//! let trainers = build_trainers::<B>(
//!     &env.observation_sizes(),
//!     env.action_space(),
//!     &config,
//!     &Default::default(),
//! )?;
//!
//! let mut controller = TrainingLoop::new(env, trainers, &config)?;
//! let summary = controller.run()?;
//! ```

pub mod accumulator;
pub mod artifact;
pub mod benchmark;
pub mod checkpoint;
pub mod config;
pub mod controller;
pub mod core;
pub mod curves;
pub mod environment;
pub mod error;
pub mod policy;
pub mod telemetry;
pub mod trainer;

// Core types
pub use core::{AgentTransition, EpisodeState, RunMode};

// Configuration
pub use config::{ConfigError, ExperimentPaths, TrainingConfig};

// Environment abstraction
pub use environment::{ActionSpace, EnvError, MultiAgentEnv, MultiAgentStep};

// Trainers
pub use trainer::{
    build_trainers, update_roster, AgentTrainer, MaddpgConfig, MaddpgTrainer, Peers, PolicyFamily,
    ReplayBuffer, TrainerError,
};

// Bookkeeping and outputs
pub use accumulator::{EpisodeAccumulator, EpisodeSummary, WindowSummary};
pub use benchmark::BenchmarkLog;
pub use curves::TrainingCurves;
pub use telemetry::{TelemetryError, TelemetryWriter};

// Checkpointing
pub use checkpoint::{CheckpointError, CheckpointInfo, CheckpointManager, CheckpointManagerConfig};

// Controller
pub use controller::{RunSummary, StepOutcome, StopReason, TrainingLoop};
pub use error::LoopError;
