//! Top-level error for a training run.

use thiserror::Error;

use crate::artifact::ArtifactError;
use crate::checkpoint::CheckpointError;
use crate::config::ConfigError;
use crate::environment::EnvError;
use crate::telemetry::TelemetryError;
use crate::trainer::TrainerError;

/// Any error that stops the training loop.
#[derive(Debug, Error)]
pub enum LoopError {
    /// Invalid configuration.
    #[error("configuration: {0}")]
    Config(#[from] ConfigError),
    /// Environment failure or contract violation.
    #[error("environment: {0}")]
    Env(#[from] EnvError),
    /// Trainer failure.
    #[error("trainer: {0}")]
    Trainer(#[from] TrainerError),
    /// Checkpoint save or restore failure.
    #[error("checkpoint: {0}")]
    Checkpoint(#[from] CheckpointError),
    /// Telemetry could not be started.
    #[error("telemetry: {0}")]
    Telemetry(#[from] TelemetryError),
    /// Final artifacts could not be written.
    #[error("artifact: {0}")]
    Artifact(#[from] ArtifactError),
    /// Roster and environment disagree on the number of agents.
    #[error("roster has {actual} trainers, environment has {expected} agents")]
    RosterSize {
        /// Agents in the environment.
        expected: usize,
        /// Trainers supplied.
        actual: usize,
    },
}
