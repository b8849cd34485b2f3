//! Execution mode of a training process.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::config::ConfigError;

/// Execution mode, fixed for the lifetime of a process.
///
/// The stepping and accumulation logic is the same in every mode; the mode
/// only decides which side effects run after each step.
///
/// | Mode      | updates | checkpoints | telemetry | render | benchmark info |
/// |-----------|---------|-------------|-----------|--------|----------------|
/// | Train     | yes     | yes         | yes       | no     | no             |
/// | Display   | no      | no          | no        | yes    | no             |
/// | Benchmark | no      | no          | yes       | no     | yes            |
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RunMode {
    /// Learn, checkpoint and log until the episode budget is spent.
    #[default]
    Train,
    /// Render a restored policy forever, without learning or writing files.
    Display,
    /// Collect per-agent info records until the step budget is spent.
    Benchmark,
}

impl RunMode {
    /// Select the mode from the two command-line switches.
    pub fn from_flags(display: bool, benchmark: bool) -> Result<Self, ConfigError> {
        match (display, benchmark) {
            (false, false) => Ok(Self::Train),
            (true, false) => Ok(Self::Display),
            (false, true) => Ok(Self::Benchmark),
            (true, true) => Err(ConfigError::ConflictingModes),
        }
    }

    /// Whether policy updates and checkpoints run in this mode.
    pub fn is_training(&self) -> bool {
        matches!(self, Self::Train)
    }

    /// Whether per-episode telemetry is written in this mode.
    pub fn writes_telemetry(&self) -> bool {
        !matches!(self, Self::Display)
    }

    /// Whether trainer state must be loaded before the first action.
    ///
    /// Display and benchmark always run a previously trained policy.
    pub fn requires_restore(&self) -> bool {
        !matches!(self, Self::Train)
    }
}

impl fmt::Display for RunMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RunMode::Train => write!(f, "train"),
            RunMode::Display => write!(f, "display"),
            RunMode::Benchmark => write!(f, "benchmark"),
        }
    }
}

impl FromStr for RunMode {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "train" => Ok(Self::Train),
            "display" => Ok(Self::Display),
            "benchmark" => Ok(Self::Benchmark),
            other => Err(ConfigError::UnknownMode(other.to_string())),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_from_flags() {
        assert_eq!(RunMode::from_flags(false, false).unwrap(), RunMode::Train);
        assert_eq!(RunMode::from_flags(true, false).unwrap(), RunMode::Display);
        assert_eq!(RunMode::from_flags(false, true).unwrap(), RunMode::Benchmark);
        assert!(matches!(
            RunMode::from_flags(true, true),
            Err(ConfigError::ConflictingModes)
        ));
    }

    #[test]
    fn test_side_effect_table() {
        assert!(RunMode::Train.is_training());
        assert!(RunMode::Train.writes_telemetry());
        assert!(!RunMode::Train.requires_restore());

        assert!(!RunMode::Display.is_training());
        assert!(!RunMode::Display.writes_telemetry());
        assert!(RunMode::Display.requires_restore());

        assert!(!RunMode::Benchmark.is_training());
        assert!(RunMode::Benchmark.writes_telemetry());
        assert!(RunMode::Benchmark.requires_restore());
    }

    #[test]
    fn test_parse_round_trip() {
        for mode in [RunMode::Train, RunMode::Display, RunMode::Benchmark] {
            assert_eq!(mode.to_string().parse::<RunMode>().unwrap(), mode);
        }
        assert!("replay".parse::<RunMode>().is_err());
    }
}
