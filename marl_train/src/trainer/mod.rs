//! Per-agent learners.
//!
//! The controller only sees the [`AgentTrainer`] trait. A roster is a plain
//! `Vec<T>` indexed by agent; during an update round every trainer gets
//! mutable access to itself and shared access to its peers through
//! [`Peers`], which is what a centralised critic needs to read the other
//! agents' replay buffers and target policies.

pub mod maddpg;
pub mod replay;

use std::fmt;
use std::path::{Path, PathBuf};
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::config::ConfigError;
use crate::core::AgentTransition;

pub use maddpg::{build_trainers, MaddpgConfig, MaddpgTrainer};
pub use replay::{ReplayBatch, ReplayBuffer, StoredTransition};

/// Errors raised by a trainer.
#[derive(Debug, Error)]
pub enum TrainerError {
    /// Input did not match the dimensions the trainer was built for.
    #[error("{what}: expected length {expected}, got {actual}")]
    ShapeMismatch {
        /// Which input.
        what: &'static str,
        /// Expected length.
        expected: usize,
        /// Actual length.
        actual: usize,
    },
    /// A sampled replay index fell outside a buffer.
    #[error("replay index {index} out of range for buffer of length {len}")]
    ReplayIndex {
        /// Offending index.
        index: usize,
        /// Buffer length.
        len: usize,
    },
    /// A peer needed for a centralised update was missing.
    #[error("peer {0} missing from roster")]
    MissingPeer(usize),
    /// Reading tensor data back to the host failed.
    #[error("tensor data: {0}")]
    Tensor(String),
    /// Sampling exploration noise failed.
    #[error("noise distribution: {0}")]
    Noise(String),
    /// Reading or writing model files failed.
    #[error("model record {path}: {reason}")]
    Record {
        /// File involved.
        path: PathBuf,
        /// Underlying error.
        reason: String,
    },
    /// Filesystem error.
    #[error("io: {0}")]
    Io(#[from] std::io::Error),
}

/// Policy family used to build an agent's trainer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PolicyFamily {
    /// Centralised critic over every agent's observation and action.
    #[default]
    Maddpg,
    /// Critic over the agent's own observation and action only.
    Ddpg,
}

impl PolicyFamily {
    /// Whether the critic only sees the agent's own observation and action.
    pub fn uses_local_critic(self) -> bool {
        matches!(self, PolicyFamily::Ddpg)
    }
}

impl fmt::Display for PolicyFamily {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PolicyFamily::Maddpg => write!(f, "maddpg"),
            PolicyFamily::Ddpg => write!(f, "ddpg"),
        }
    }
}

impl FromStr for PolicyFamily {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "maddpg" => Ok(PolicyFamily::Maddpg),
            "ddpg" => Ok(PolicyFamily::Ddpg),
            other => Err(ConfigError::UnknownPolicy(other.to_string())),
        }
    }
}

/// Shared view of the rest of the roster during one agent's update.
#[derive(Debug)]
pub struct Peers<'a, T> {
    index: usize,
    before: &'a [T],
    after: &'a [T],
}

impl<'a, T> Peers<'a, T> {
    /// Build a view for agent `index` from the slices on either side of it.
    pub fn new(index: usize, before: &'a [T], after: &'a [T]) -> Self {
        Self {
            index,
            before,
            after,
        }
    }

    /// Index of the agent being updated.
    pub fn index(&self) -> usize {
        self.index
    }

    /// Size of the whole roster, the updating agent included.
    pub fn roster_len(&self) -> usize {
        self.before.len() + 1 + self.after.len()
    }

    /// Trainer of agent `j`, or `None` for the updating agent itself.
    pub fn get(&self, j: usize) -> Option<&'a T> {
        if j < self.index {
            self.before.get(j)
        } else if j == self.index {
            None
        } else {
            self.after.get(j - self.index - 1)
        }
    }

    /// Every other trainer with its roster index.
    pub fn iter(&self) -> impl Iterator<Item = (usize, &'a T)> + '_ {
        let index = self.index;
        self.before
            .iter()
            .enumerate()
            .chain(self.after.iter().enumerate().map(move |(j, t)| (j + index + 1, t)))
    }
}

/// One learning agent.
pub trait AgentTrainer: Sized {
    /// Stable name, also used as the checkpoint sub-directory.
    fn name(&self) -> &str;

    /// Choose an action for a single observation.
    fn action(&mut self, observation: &[f32]) -> Result<Vec<f32>, TrainerError>;

    /// Store one transition.
    fn experience(&mut self, transition: AgentTransition) -> Result<(), TrainerError>;

    /// Called on every trainer before any trainer's `update` in a round.
    fn preupdate(&mut self);

    /// Possibly perform a learning step. Returns the loss when one was taken.
    fn update(&mut self, peers: Peers<'_, Self>, global_step: usize) -> Result<Option<f32>, TrainerError>;

    /// Write parameters under `dir`.
    fn save(&self, dir: &Path) -> Result<(), TrainerError>;

    /// Read parameters previously written by `save`.
    fn load(&mut self, dir: &Path) -> Result<(), TrainerError>;
}

/// Run one update round: every `preupdate`, then every `update` in roster
/// order. Returns the losses of trainers that took a step.
pub fn update_roster<T: AgentTrainer>(
    trainers: &mut [T],
    global_step: usize,
) -> Result<Vec<(usize, f32)>, TrainerError> {
    for trainer in trainers.iter_mut() {
        trainer.preupdate();
    }

    let mut losses = Vec::new();
    for index in 0..trainers.len() {
        let (before, rest) = trainers.split_at_mut(index);
        if let Some((current, after)) = rest.split_first_mut() {
            let peers = Peers::new(index, &*before, &*after);
            if let Some(loss) = current.update(peers, global_step)? {
                losses.push((index, loss));
            }
        }
    }
    Ok(losses)
}

/// Split the roster size into `(adversaries, good)` with adversaries first.
pub fn roster_split(n_agents: usize, num_adversaries: usize) -> (usize, usize) {
    let adversaries = num_adversaries.min(n_agents);
    (adversaries, n_agents - adversaries)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Debug, Default)]
    struct Probe {
        name: String,
        value: usize,
        preupdated: bool,
        seen_peers: Vec<(usize, usize)>,
    }

    impl AgentTrainer for Probe {
        fn name(&self) -> &str {
            &self.name
        }

        fn action(&mut self, observation: &[f32]) -> Result<Vec<f32>, TrainerError> {
            Ok(observation.to_vec())
        }

        fn experience(&mut self, _transition: AgentTransition) -> Result<(), TrainerError> {
            Ok(())
        }

        fn preupdate(&mut self) {
            self.preupdated = true;
        }

        fn update(&mut self, peers: Peers<'_, Self>, _step: usize) -> Result<Option<f32>, TrainerError> {
            // Every peer must already have been pre-updated.
            assert!(peers.iter().all(|(_, p)| p.preupdated));
            self.seen_peers = peers.iter().map(|(j, p)| (j, p.value)).collect();
            Ok(Some(self.value as f32))
        }

        fn save(&self, _dir: &Path) -> Result<(), TrainerError> {
            Ok(())
        }

        fn load(&mut self, _dir: &Path) -> Result<(), TrainerError> {
            Ok(())
        }
    }

    fn roster(n: usize) -> Vec<Probe> {
        (0..n)
            .map(|i| Probe {
                name: format!("agent_{}", i),
                value: i * 10,
                ..Default::default()
            })
            .collect()
    }

    #[test]
    fn test_peers_get_skips_self() {
        let trainers = roster(4);
        let peers = Peers::new(2, &trainers[..2], &trainers[3..]);
        assert_eq!(peers.roster_len(), 4);
        assert_eq!(peers.get(0).map(|p| p.value), Some(0));
        assert_eq!(peers.get(1).map(|p| p.value), Some(10));
        assert!(peers.get(2).is_none());
        assert_eq!(peers.get(3).map(|p| p.value), Some(30));
        assert!(peers.get(4).is_none());
    }

    #[test]
    fn test_update_roster_sees_all_peers() {
        let mut trainers = roster(3);
        let losses = update_roster(&mut trainers, 100).unwrap();
        assert_eq!(losses, vec![(0, 0.0), (1, 10.0), (2, 20.0)]);
        assert_eq!(trainers[0].seen_peers, vec![(1, 10), (2, 20)]);
        assert_eq!(trainers[1].seen_peers, vec![(0, 0), (2, 20)]);
        assert_eq!(trainers[2].seen_peers, vec![(0, 0), (1, 10)]);
    }

    #[test]
    fn test_policy_family_parse() {
        assert_eq!("maddpg".parse::<PolicyFamily>().unwrap(), PolicyFamily::Maddpg);
        assert_eq!("DDPG".parse::<PolicyFamily>().unwrap(), PolicyFamily::Ddpg);
        assert!(matches!(
            "ppo".parse::<PolicyFamily>(),
            Err(ConfigError::UnknownPolicy(_))
        ));
        assert!(PolicyFamily::Ddpg.uses_local_critic());
        assert!(!PolicyFamily::Maddpg.uses_local_critic());
        assert_eq!(PolicyFamily::Ddpg.to_string(), "ddpg");
    }

    #[test]
    fn test_roster_split_clamps() {
        assert_eq!(roster_split(4, 1), (1, 3));
        assert_eq!(roster_split(2, 5), (2, 0));
        assert_eq!(roster_split(3, 0), (0, 3));
    }
}
