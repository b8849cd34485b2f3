//! Environment abstraction for multi-agent training.
//!
//! The controller drives one shared simulated world through the
//! [`MultiAgentEnv`] trait. Scenarios (dynamics, rewards, diagnostic errors,
//! rendering) live outside this crate and only need to implement the trait.

use serde::Serialize;
use thiserror::Error;

/// Action space of a single agent.
#[derive(Debug, Clone, PartialEq)]
pub enum ActionSpace {
    /// Continuous box of `dim` values, each within `[low, high]`.
    Continuous {
        /// Number of action components.
        dim: usize,
        /// Lower bound shared by all components.
        low: f32,
        /// Upper bound shared by all components.
        high: f32,
    },
    /// `n` discrete choices, encoded as a one-hot (or soft) vector of length `n`.
    Discrete(usize),
}

impl ActionSpace {
    /// Length of the action vector an agent emits for this space.
    pub fn dim(&self) -> usize {
        match self {
            ActionSpace::Continuous { dim, .. } => *dim,
            ActionSpace::Discrete(n) => *n,
        }
    }

    /// Map a squashed output in `[-1, 1]` onto this space.
    pub fn scale(&self, squashed: f32) -> f32 {
        match self {
            ActionSpace::Continuous { low, high, .. } => {
                low + (squashed.clamp(-1.0, 1.0) + 1.0) * 0.5 * (high - low)
            }
            ActionSpace::Discrete(_) => squashed,
        }
    }
}

/// Errors raised by an environment or by step-result validation.
#[derive(Debug, Error)]
pub enum EnvError {
    /// A per-agent array did not have one entry per registered agent.
    #[error("{field} has {actual} entries, expected one per agent ({expected})")]
    AgentCountMismatch {
        /// Which array was inconsistent.
        field: &'static str,
        /// Registered agent count.
        expected: usize,
        /// Entries actually returned.
        actual: usize,
    },
    /// An agent's diagnostic error vector had the wrong number of channels.
    #[error("agent {agent} reported {actual} error channels, expected {expected}")]
    ErrorChannelMismatch {
        /// Agent index.
        agent: usize,
        /// Declared channel count.
        expected: usize,
        /// Channels actually returned.
        actual: usize,
    },
    /// The action vector passed to `step` was malformed.
    #[error("invalid action for agent {agent}: {reason}")]
    InvalidAction {
        /// Agent index.
        agent: usize,
        /// What was wrong.
        reason: String,
    },
    /// Rendering failed.
    #[error("render failed: {0}")]
    Render(String),
    /// Scenario name not known to the registry.
    #[error("unknown scenario: {0}")]
    UnknownScenario(String),
}

/// Result of stepping all agents once.
#[derive(Debug, Clone)]
pub struct MultiAgentStep<I> {
    /// Observations after the step, one per agent.
    pub observations: Vec<Vec<f32>>,
    /// Rewards, one per agent.
    pub rewards: Vec<f32>,
    /// Agent-reported completion flags.
    pub dones: Vec<bool>,
    /// Auxiliary info records, one per agent.
    pub infos: Vec<I>,
    /// Diagnostic error channels, one vector of K values per agent.
    pub errors: Vec<Vec<f32>>,
    /// Reward view used for the combined reward log, one value per agent.
    pub combined_reward: Vec<f32>,
}

impl<I> MultiAgentStep<I> {
    /// Whether every agent reported done.
    pub fn all_done(&self) -> bool {
        !self.dones.is_empty() && self.dones.iter().all(|&d| d)
    }

    /// Check that every per-agent array has `n_agents` entries and every
    /// error vector has `error_channels` values.
    pub fn validate(&self, n_agents: usize, error_channels: usize) -> Result<(), EnvError> {
        check_len("observations", n_agents, self.observations.len())?;
        check_len("rewards", n_agents, self.rewards.len())?;
        check_len("dones", n_agents, self.dones.len())?;
        check_len("infos", n_agents, self.infos.len())?;
        check_len("errors", n_agents, self.errors.len())?;
        check_len("combined_reward", n_agents, self.combined_reward.len())?;

        for (agent, channels) in self.errors.iter().enumerate() {
            if channels.len() != error_channels {
                return Err(EnvError::ErrorChannelMismatch {
                    agent,
                    expected: error_channels,
                    actual: channels.len(),
                });
            }
        }
        Ok(())
    }
}

fn check_len(field: &'static str, expected: usize, actual: usize) -> Result<(), EnvError> {
    if expected == actual {
        Ok(())
    } else {
        Err(EnvError::AgentCountMismatch {
            field,
            expected,
            actual,
        })
    }
}

/// Check a freshly reset observation vector against the agent count.
pub fn validate_observations(observations: &[Vec<f32>], n_agents: usize) -> Result<(), EnvError> {
    check_len("observations", n_agents, observations.len())
}

/// A simulated world shared by `n_agents` learning agents.
///
/// Implementations are stepped synchronously by a single controller; they
/// are never called concurrently.
pub trait MultiAgentEnv {
    /// Per-agent auxiliary record returned from `step` and collected in
    /// benchmark mode.
    type Info: Clone + Serialize;

    /// Number of agents.
    fn n_agents(&self) -> usize;

    /// Action space of every agent, in agent index order.
    fn action_space(&self) -> &[ActionSpace];

    /// Observation length of every agent, in agent index order.
    fn observation_sizes(&self) -> Vec<usize>;

    /// Number of diagnostic error channels (K) reported per agent.
    fn error_channels(&self) -> usize;

    /// Start a new episode and return the initial observations.
    fn reset(&mut self) -> Result<Vec<Vec<f32>>, EnvError>;

    /// Apply one action per agent and advance the world by one step.
    fn step(&mut self, actions: &[Vec<f32>]) -> Result<MultiAgentStep<Self::Info>, EnvError>;

    /// Draw the current state.
    fn render(&mut self) -> Result<(), EnvError>;
}
