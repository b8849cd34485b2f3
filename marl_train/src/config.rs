//! Training configuration and experiment paths.
//!
//! [`TrainingConfig`] mirrors the options a training run recognises. Defaults
//! reproduce the reference encirclement experiment. Every on-disk location is
//! derived from the config by [`ExperimentPaths`], namespaced by the
//! experiment name.

use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::core::RunMode;
use crate::trainer::PolicyFamily;

/// Configuration validation error.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// Display and benchmark were both requested.
    #[error("display and benchmark modes are mutually exclusive")]
    ConflictingModes,
    /// Mode name not recognised.
    #[error("unknown run mode: {0}")]
    UnknownMode(String),
    /// Policy family name not recognised.
    #[error("unknown policy family: {0} (expected maddpg or ddpg)")]
    UnknownPolicy(String),
    /// A count parameter must be positive.
    #[error("{field} must be > 0, got {value}")]
    InvalidCount {
        /// Field name.
        field: &'static str,
        /// Offending value.
        value: usize,
    },
    /// A parameter is outside its valid range.
    #[error("{field} must be in [{min}, {max}], got {value}")]
    OutOfRange {
        /// Field name.
        field: &'static str,
        /// Offending value.
        value: f64,
        /// Inclusive lower bound.
        min: f64,
        /// Inclusive upper bound.
        max: f64,
    },
    /// Experiment name would escape the configured directories.
    #[error("invalid experiment name: {0:?}")]
    InvalidExperimentName(String),
    /// Config file could not be read.
    #[error("failed to read config file {path}: {source}")]
    Read {
        /// File path.
        path: PathBuf,
        /// Underlying error.
        source: io::Error,
    },
    /// Config file was not valid JSON for this struct.
    #[error("failed to parse config file {path}: {source}")]
    Parse {
        /// File path.
        path: PathBuf,
        /// Underlying error.
        source: serde_json::Error,
    },
}

/// Options recognised by a training run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TrainingConfig {
    // Environment
    /// Scenario name resolved by the scenario registry.
    pub scenario: String,
    /// Maximum steps per episode (TERMINAL cap).
    pub max_episode_len: usize,
    /// Episode budget for a training run.
    pub num_episodes: usize,
    /// Number of adversary agents (placed first in the roster).
    pub num_adversaries: usize,
    /// Policy family for good agents.
    pub good_policy: PolicyFamily,
    /// Policy family for adversaries.
    pub adv_policy: PolicyFamily,

    // Core training parameters
    /// Adam learning rate.
    pub lr: f64,
    /// Discount factor.
    pub gamma: f32,
    /// Replay minibatch size.
    pub batch_size: usize,
    /// Hidden units per MLP layer.
    pub num_units: usize,
    /// Seed for trainer exploration and scenario initialisation.
    pub seed: u64,

    // Checkpointing
    /// Experiment name, namespaces every output path.
    pub exp_name: String,
    /// Root directory for checkpoints.
    pub save_dir: PathBuf,
    /// Episodes between checkpoints and curve points.
    pub save_rate: usize,
    /// Directory to restore from (defaults to `save_dir/exp_name`).
    pub load_dir: Option<PathBuf>,
    /// Checkpoints to keep (0 keeps all).
    pub keep_last_checkpoints: usize,

    // Evaluation
    /// Resume training from the latest checkpoint.
    pub restore: bool,
    /// Render-only mode.
    pub display: bool,
    /// Benchmark mode.
    pub benchmark: bool,
    /// Global step budget for benchmark mode.
    pub benchmark_iters: usize,
    /// Directory for benchmark artifacts.
    pub benchmark_dir: PathBuf,
    /// Directory for training-curve artifacts.
    pub plots_dir: PathBuf,
    /// Directory for per-episode error and reward logs.
    pub data_dir: PathBuf,
    /// Directory for the scalar telemetry stream.
    pub logs_dir: PathBuf,

    // Telemetry
    /// Offset added to the x-axis of scalar telemetry points.
    pub telemetry_offset: usize,
    /// Capacity of the queue between the loop and the telemetry writer.
    pub telemetry_queue: usize,
    /// Pause after each rendered frame in display mode.
    pub display_delay_ms: u64,
}

impl Default for TrainingConfig {
    fn default() -> Self {
        Self {
            scenario: "simple_encirclement".to_string(),
            max_episode_len: 60,
            num_episodes: 100_000,
            num_adversaries: 0,
            good_policy: PolicyFamily::Maddpg,
            adv_policy: PolicyFamily::Maddpg,
            lr: 3e-3,
            gamma: 0.95,
            batch_size: 1024,
            num_units: 64,
            seed: 0,
            exp_name: "encircle".to_string(),
            save_dir: PathBuf::from("./policy/"),
            save_rate: 1000,
            load_dir: None,
            keep_last_checkpoints: 0,
            restore: false,
            display: false,
            benchmark: false,
            benchmark_iters: 100_000,
            benchmark_dir: PathBuf::from("./benchmark_files/"),
            plots_dir: PathBuf::from("./learning_curves/"),
            data_dir: PathBuf::from("./data/"),
            logs_dir: PathBuf::from("./logs/"),
            telemetry_offset: 1000,
            telemetry_queue: 1024,
            display_delay_ms: 100,
        }
    }
}

impl TrainingConfig {
    /// Create the default configuration.
    pub fn new() -> Self {
        Self::default()
    }

    /// Load a configuration from a JSON file. Missing fields take defaults.
    pub fn from_json_file(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let text = fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        serde_json::from_str(&text).map_err(|source| ConfigError::Parse {
            path: path.to_path_buf(),
            source,
        })
    }

    /// Set the scenario name.
    pub fn with_scenario(mut self, scenario: impl Into<String>) -> Self {
        self.scenario = scenario.into();
        self
    }

    /// Set the episode length cap.
    pub fn with_max_episode_len(mut self, len: usize) -> Self {
        self.max_episode_len = len;
        self
    }

    /// Set the episode budget.
    pub fn with_num_episodes(mut self, n: usize) -> Self {
        self.num_episodes = n;
        self
    }

    /// Set the number of adversaries.
    pub fn with_num_adversaries(mut self, n: usize) -> Self {
        self.num_adversaries = n;
        self
    }

    /// Set the policy families for good agents and adversaries.
    pub fn with_policies(mut self, good: PolicyFamily, adversary: PolicyFamily) -> Self {
        self.good_policy = good;
        self.adv_policy = adversary;
        self
    }

    /// Set the learning rate.
    pub fn with_lr(mut self, lr: f64) -> Self {
        self.lr = lr;
        self
    }

    /// Set the discount factor.
    pub fn with_gamma(mut self, gamma: f32) -> Self {
        self.gamma = gamma;
        self
    }

    /// Set the replay minibatch size.
    pub fn with_batch_size(mut self, batch_size: usize) -> Self {
        self.batch_size = batch_size;
        self
    }

    /// Set the hidden layer width.
    pub fn with_num_units(mut self, units: usize) -> Self {
        self.num_units = units;
        self
    }

    /// Set the seed.
    pub fn with_seed(mut self, seed: u64) -> Self {
        self.seed = seed;
        self
    }

    /// Set the experiment name.
    pub fn with_exp_name(mut self, name: impl Into<String>) -> Self {
        self.exp_name = name.into();
        self
    }

    /// Set the checkpoint root.
    pub fn with_save_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.save_dir = dir.into();
        self
    }

    /// Set the checkpoint cadence in episodes.
    pub fn with_save_rate(mut self, rate: usize) -> Self {
        self.save_rate = rate;
        self
    }

    /// Set an explicit restore directory.
    pub fn with_load_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.load_dir = Some(dir.into());
        self
    }

    /// Enable or disable resuming from the latest checkpoint.
    pub fn with_restore(mut self, restore: bool) -> Self {
        self.restore = restore;
        self
    }

    /// Enable or disable display mode.
    pub fn with_display(mut self, display: bool) -> Self {
        self.display = display;
        self
    }

    /// Enable or disable benchmark mode and set its step budget.
    pub fn with_benchmark(mut self, benchmark: bool, iters: usize) -> Self {
        self.benchmark = benchmark;
        self.benchmark_iters = iters;
        self
    }

    /// Put every output directory under a single root.
    ///
    /// Convenient for tests and throwaway runs.
    pub fn with_output_root(mut self, root: impl AsRef<Path>) -> Self {
        let root = root.as_ref();
        self.save_dir = root.join("policy");
        self.benchmark_dir = root.join("benchmark_files");
        self.plots_dir = root.join("learning_curves");
        self.data_dir = root.join("data");
        self.logs_dir = root.join("logs");
        self
    }

    /// Set the scalar telemetry x-axis offset.
    pub fn with_telemetry_offset(mut self, offset: usize) -> Self {
        self.telemetry_offset = offset;
        self
    }

    /// Set the display-mode frame delay.
    pub fn with_display_delay_ms(mut self, ms: u64) -> Self {
        self.display_delay_ms = ms;
        self
    }

    /// Run mode selected by the display/benchmark switches.
    pub fn run_mode(&self) -> Result<RunMode, ConfigError> {
        RunMode::from_flags(self.display, self.benchmark)
    }

    /// Validate the configuration.
    pub fn validate(&self) -> Result<(), ConfigError> {
        self.run_mode()?;

        for (field, value) in [
            ("max_episode_len", self.max_episode_len),
            ("num_episodes", self.num_episodes),
            ("batch_size", self.batch_size),
            ("num_units", self.num_units),
            ("save_rate", self.save_rate),
            ("telemetry_queue", self.telemetry_queue),
        ] {
            if value == 0 {
                return Err(ConfigError::InvalidCount { field, value });
            }
        }

        if !(self.lr > 0.0 && self.lr <= 1.0) {
            return Err(ConfigError::OutOfRange {
                field: "lr",
                value: self.lr,
                min: f64::MIN_POSITIVE,
                max: 1.0,
            });
        }
        if !(0.0..=1.0).contains(&self.gamma) {
            return Err(ConfigError::OutOfRange {
                field: "gamma",
                value: self.gamma as f64,
                min: 0.0,
                max: 1.0,
            });
        }

        let name = self.exp_name.as_str();
        if name.is_empty() || name.contains('/') || name.contains('\\') || name == "." || name == ".." {
            return Err(ConfigError::InvalidExperimentName(self.exp_name.clone()));
        }

        Ok(())
    }

    /// Paths derived from this configuration.
    pub fn paths(&self) -> ExperimentPaths {
        ExperimentPaths::from_config(self)
    }
}

/// Every on-disk location used by a run.
#[derive(Debug, Clone, PartialEq)]
pub struct ExperimentPaths {
    /// Where new checkpoints are written.
    pub checkpoint_dir: PathBuf,
    /// Where checkpoints are restored from.
    pub load_dir: PathBuf,
    /// Directory holding the per-agent error logs and the reward log.
    pub data_dir: PathBuf,
    /// Scalar telemetry stream.
    pub scalar_log: PathBuf,
    /// Reward-curve artifact.
    pub rewards_curve: PathBuf,
    /// Per-agent reward-curve artifact.
    pub agent_rewards_curve: PathBuf,
    /// Error-curve artifact.
    pub error_curve: PathBuf,
    /// Benchmark artifact.
    pub benchmark_file: PathBuf,
}

impl ExperimentPaths {
    /// Derive all paths from a config.
    pub fn from_config(config: &TrainingConfig) -> Self {
        let exp = config.exp_name.as_str();
        let checkpoint_dir = config.save_dir.join(exp);
        let load_dir = config
            .load_dir
            .clone()
            .unwrap_or_else(|| checkpoint_dir.clone());

        Self {
            checkpoint_dir,
            load_dir,
            data_dir: config.data_dir.join(exp),
            scalar_log: config.logs_dir.join(exp).join("scalars.csv"),
            rewards_curve: config.plots_dir.join(format!("{}_rewards.json", exp)),
            agent_rewards_curve: config.plots_dir.join(format!("{}_agrewards.json", exp)),
            error_curve: config.plots_dir.join(format!("{}_error.json", exp)),
            benchmark_file: config.benchmark_dir.join(format!("{}.json", exp)),
        }
    }

    /// Per-agent error log.
    pub fn error_log(&self, agent: usize) -> PathBuf {
        self.data_dir.join(format!("agent_error_{}.txt", agent))
    }

    /// Combined reward log.
    pub fn reward_log(&self) -> PathBuf {
        self.data_dir.join("agent_reward_all.txt")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_match_reference_experiment() {
        let config = TrainingConfig::default();
        assert_eq!(config.scenario, "simple_encirclement");
        assert_eq!(config.max_episode_len, 60);
        assert_eq!(config.num_episodes, 100_000);
        assert_eq!(config.save_rate, 1000);
        assert_eq!(config.batch_size, 1024);
        assert_eq!(config.num_units, 64);
        assert!((config.lr - 3e-3).abs() < 1e-12);
        assert!((config.gamma - 0.95).abs() < 1e-6);
        assert_eq!(config.telemetry_offset, 1000);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_builder() {
        let config = TrainingConfig::new()
            .with_max_episode_len(25)
            .with_num_episodes(10)
            .with_save_rate(5)
            .with_exp_name("ring")
            .with_policies(PolicyFamily::Maddpg, PolicyFamily::Ddpg);

        assert_eq!(config.max_episode_len, 25);
        assert_eq!(config.num_episodes, 10);
        assert_eq!(config.save_rate, 5);
        assert_eq!(config.exp_name, "ring");
        assert_eq!(config.adv_policy, PolicyFamily::Ddpg);
    }

    #[test]
    fn test_validate_rejects_zero_counts() {
        let config = TrainingConfig::new().with_save_rate(0);
        assert!(matches!(
            config.validate(),
            Err(ConfigError::InvalidCount {
                field: "save_rate",
                value: 0
            })
        ));

        let config = TrainingConfig::new().with_max_episode_len(0);
        assert!(matches!(
            config.validate(),
            Err(ConfigError::InvalidCount {
                field: "max_episode_len",
                ..
            })
        ));
    }

    #[test]
    fn test_validate_rejects_bad_ranges() {
        assert!(matches!(
            TrainingConfig::new().with_gamma(1.5).validate(),
            Err(ConfigError::OutOfRange { field: "gamma", .. })
        ));
        assert!(matches!(
            TrainingConfig::new().with_lr(0.0).validate(),
            Err(ConfigError::OutOfRange { field: "lr", .. })
        ));
    }

    #[test]
    fn test_validate_rejects_conflicting_modes() {
        let config = TrainingConfig::new()
            .with_display(true)
            .with_benchmark(true, 10);
        assert!(matches!(
            config.validate(),
            Err(ConfigError::ConflictingModes)
        ));
    }

    #[test]
    fn test_validate_rejects_path_like_experiment_names() {
        for name in ["", "a/b", "..", "."] {
            assert!(matches!(
                TrainingConfig::new().with_exp_name(name).validate(),
                Err(ConfigError::InvalidExperimentName(_))
            ));
        }
    }

    #[test]
    fn test_paths_are_namespaced_by_experiment() {
        let config = TrainingConfig::new()
            .with_exp_name("ring")
            .with_output_root("/tmp/run");
        let paths = config.paths();

        assert_eq!(paths.checkpoint_dir, PathBuf::from("/tmp/run/policy/ring"));
        assert_eq!(paths.load_dir, paths.checkpoint_dir);
        assert_eq!(
            paths.error_log(2),
            PathBuf::from("/tmp/run/data/ring/agent_error_2.txt")
        );
        assert_eq!(
            paths.reward_log(),
            PathBuf::from("/tmp/run/data/ring/agent_reward_all.txt")
        );
        assert_eq!(
            paths.rewards_curve,
            PathBuf::from("/tmp/run/learning_curves/ring_rewards.json")
        );
        assert_eq!(
            paths.benchmark_file,
            PathBuf::from("/tmp/run/benchmark_files/ring.json")
        );
    }

    #[test]
    fn test_explicit_load_dir_wins() {
        let config = TrainingConfig::new().with_load_dir("/elsewhere");
        assert_eq!(config.paths().load_dir, PathBuf::from("/elsewhere"));
    }

    #[test]
    fn test_json_file_uses_defaults_for_missing_fields() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("run.json");
        fs::write(&path, r#"{ "exp_name": "ring", "save_rate": 7, "good_policy": "ddpg" }"#).unwrap();

        let config = TrainingConfig::from_json_file(&path).unwrap();
        assert_eq!(config.exp_name, "ring");
        assert_eq!(config.save_rate, 7);
        assert_eq!(config.good_policy, PolicyFamily::Ddpg);
        assert_eq!(config.max_episode_len, 60);
    }

    #[test]
    fn test_json_file_errors() {
        let dir = tempfile::tempdir().unwrap();
        let missing = dir.path().join("missing.json");
        assert!(matches!(
            TrainingConfig::from_json_file(&missing),
            Err(ConfigError::Read { .. })
        ));

        let broken = dir.path().join("broken.json");
        fs::write(&broken, "{ not json").unwrap();
        assert!(matches!(
            TrainingConfig::from_json_file(&broken),
            Err(ConfigError::Parse { .. })
        ));
    }
}
