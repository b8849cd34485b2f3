//! Per-episode telemetry.
//!
//! Three append-only streams are written for every completed episode:
//!
//! - `agent_error_<i>.txt`: one line per episode with agent `i`'s K error
//!   channels, normalized by the episode length cap;
//! - `agent_reward_all.txt`: one line per episode with every agent's
//!   normalized combined reward;
//! - `scalars.csv`: one `step,tag,value` row per agent per episode, tagged
//!   `agent<i>/mean_episode_reward`.
//!
//! File I/O happens on a dedicated thread fed through a bounded queue, so
//! the step loop never waits on the disk except when it asks for a flush.

pub mod files;
pub mod writer;

use std::io;
use std::path::PathBuf;

use thiserror::Error;

pub use files::TelemetryFiles;
pub use writer::{TelemetryCommand, TelemetryWriter};

/// Errors raised while writing telemetry.
#[derive(Debug, Error)]
pub enum TelemetryError {
    /// A log file could not be opened or created.
    #[error("open {}: {source}", path.display())]
    Open {
        /// File involved.
        path: PathBuf,
        /// Underlying error.
        #[source]
        source: io::Error,
    },
    /// Appending or flushing a log file failed.
    #[error("write {}: {source}", path.display())]
    Write {
        /// File involved.
        path: PathBuf,
        /// Underlying error.
        #[source]
        source: io::Error,
    },
    /// A summary did not match the agent count the writer was opened for.
    #[error("episode summary covers {actual} agents, writer expects {expected}")]
    AgentCount {
        /// Agents the writer was opened for.
        expected: usize,
        /// Agents in the summary.
        actual: usize,
    },
    /// The writer thread could not be started.
    #[error("spawn telemetry thread: {0}")]
    Spawn(#[source] io::Error),
    /// The writer thread has exited.
    #[error("telemetry writer disconnected")]
    Disconnected,
}

/// Tag of agent `i`'s scalar stream.
pub fn scalar_tag(agent: usize) -> String {
    format!("agent{}/mean_episode_reward", agent)
}

/// Render values with four decimals, separated by single spaces.
pub fn format_values(values: &[f64]) -> String {
    values
        .iter()
        .map(|v| format!("{:.4}", v))
        .collect::<Vec<_>>()
        .join(" ")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_format_values() {
        assert_eq!(format_values(&[0.5, 1.0, -0.12345]), "0.5000 1.0000 -0.1235");
        assert_eq!(format_values(&[]), "");
    }

    #[test]
    fn test_scalar_tag() {
        assert_eq!(scalar_tag(3), "agent3/mean_episode_reward");
    }
}
