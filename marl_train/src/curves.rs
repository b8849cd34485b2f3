//! Training curves: one point per save-rate window.
//!
//! Three artifacts are kept, matching what the plotting tools read:
//! `<exp>_rewards.json` (mean episode reward per window),
//! `<exp>_agrewards.json` (per-agent means, flattened window by window) and
//! `<exp>_error.json` (mean error vector per window).

use crate::accumulator::WindowSummary;
use crate::artifact::{read_json, write_json, ArtifactError};
use crate::config::ExperimentPaths;

/// In-memory training curves.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct TrainingCurves {
    /// Mean combined episode reward per window.
    pub rewards: Vec<f64>,
    /// Per-agent mean episode reward; each window appends one value per agent.
    pub agent_rewards: Vec<f64>,
    /// Mean error vector per window.
    pub errors: Vec<Vec<f64>>,
}

impl TrainingCurves {
    /// Empty curves.
    pub fn new() -> Self {
        Self::default()
    }

    /// Append one window.
    pub fn push_window(&mut self, window: &WindowSummary) {
        self.rewards.push(window.mean_reward);
        self.agent_rewards.extend_from_slice(&window.agent_means);
        self.errors.push(window.mean_error.clone());
    }

    /// Number of windows recorded.
    pub fn windows(&self) -> usize {
        self.rewards.len()
    }

    /// Write all three artifacts.
    pub fn save(&self, paths: &ExperimentPaths) -> Result<(), ArtifactError> {
        write_json(&paths.rewards_curve, &self.rewards)?;
        write_json(&paths.agent_rewards_curve, &self.agent_rewards)?;
        write_json(&paths.error_curve, &self.errors)
    }

    /// Read all three artifacts.
    pub fn load(paths: &ExperimentPaths) -> Result<Self, ArtifactError> {
        Ok(Self {
            rewards: read_json(&paths.rewards_curve)?,
            agent_rewards: read_json(&paths.agent_rewards_curve)?,
            errors: read_json(&paths.error_curve)?,
        })
    }

    /// Read the artifacts when a previous run left all three, otherwise
    /// start empty. A partial set is discarded; the next save rewrites it.
    pub fn load_or_default(paths: &ExperimentPaths) -> Result<Self, ArtifactError> {
        let files = [&paths.rewards_curve, &paths.agent_rewards_curve, &paths.error_curve];
        let present = files.iter().filter(|p| p.exists()).count();
        if present == files.len() {
            return Self::load(paths);
        }
        if present > 0 {
            log::warn!(
                "Incomplete learning curves in {}, starting new curves",
                paths.rewards_curve.parent().unwrap_or(&paths.rewards_curve).display()
            );
        }
        Ok(Self::default())
    }
}
