//! Append-mode log files owned by the telemetry thread.

use std::fs::{self, File, OpenOptions};
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};

use super::{format_values, scalar_tag, TelemetryError};
use crate::accumulator::EpisodeSummary;
use crate::config::ExperimentPaths;

const SCALAR_HEADER: &str = "step,tag,value";

/// A buffered append-only file.
struct LogFile {
    path: PathBuf,
    writer: BufWriter<File>,
}

impl LogFile {
    fn open(path: &Path) -> Result<Self, TelemetryError> {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).map_err(|source| TelemetryError::Open {
                path: parent.to_path_buf(),
                source,
            })?;
        }
        let file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(path)
            .map_err(|source| TelemetryError::Open {
                path: path.to_path_buf(),
                source,
            })?;
        Ok(Self {
            path: path.to_path_buf(),
            writer: BufWriter::new(file),
        })
    }

    fn is_empty(&self) -> bool {
        self.writer
            .get_ref()
            .metadata()
            .map(|m| m.len() == 0)
            .unwrap_or(false)
    }

    fn write_line(&mut self, line: &str) -> Result<(), TelemetryError> {
        writeln!(self.writer, "{}", line).map_err(|source| TelemetryError::Write {
            path: self.path.clone(),
            source,
        })
    }

    fn flush(&mut self) -> Result<(), TelemetryError> {
        self.writer.flush().map_err(|source| TelemetryError::Write {
            path: self.path.clone(),
            source,
        })
    }
}

/// The full set of telemetry files for one experiment.
///
/// Files are opened once, in append mode, so a resumed run continues the
/// series written by earlier processes.
pub struct TelemetryFiles {
    errors: Vec<LogFile>,
    rewards: LogFile,
    scalars: LogFile,
}

impl TelemetryFiles {
    /// Open (creating if needed) every file for `n_agents` agents.
    pub fn open(paths: &ExperimentPaths, n_agents: usize) -> Result<Self, TelemetryError> {
        let errors = (0..n_agents)
            .map(|i| LogFile::open(&paths.error_log(i)))
            .collect::<Result<Vec<_>, _>>()?;
        let rewards = LogFile::open(&paths.reward_log())?;
        let mut scalars = LogFile::open(&paths.scalar_log)?;
        if scalars.is_empty() {
            scalars.write_line(SCALAR_HEADER)?;
        }

        Ok(Self {
            errors,
            rewards,
            scalars,
        })
    }

    /// Number of agents the files were opened for.
    pub fn n_agents(&self) -> usize {
        self.errors.len()
    }

    /// Append one completed episode at scalar step `x`.
    pub fn write_episode(&mut self, summary: &EpisodeSummary, x: usize) -> Result<(), TelemetryError> {
        let n = self.errors.len();
        if summary.errors.len() != n || summary.combined_reward.len() != n {
            return Err(TelemetryError::AgentCount {
                expected: n,
                actual: summary.errors.len().min(summary.combined_reward.len()),
            });
        }

        for (file, channels) in self.errors.iter_mut().zip(&summary.errors) {
            file.write_line(&format_values(channels))?;
        }
        self.rewards.write_line(&format_values(&summary.combined_reward))?;
        for (agent, value) in summary.combined_reward.iter().enumerate() {
            self.scalars
                .write_line(&format!("{},{},{:.4}", x, scalar_tag(agent), value))?;
        }
        Ok(())
    }

    /// Flush every buffered file.
    pub fn flush(&mut self) -> Result<(), TelemetryError> {
        for file in &mut self.errors {
            file.flush()?;
        }
        self.rewards.flush()?;
        self.scalars.flush()
    }
}

impl Drop for TelemetryFiles {
    fn drop(&mut self) {
        if let Err(e) = self.flush() {
            log::warn!("telemetry flush on close failed: {}", e);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::TrainingConfig;
    use tempfile::tempdir;

    fn summary(errors: Vec<Vec<f64>>, rewards: Vec<f64>) -> EpisodeSummary {
        EpisodeSummary {
            errors,
            combined_reward: rewards,
        }
    }

    #[test]
    fn test_writes_all_streams() {
        let dir = tempdir().unwrap();
        let paths = TrainingConfig::default().with_output_root(dir.path()).paths();

        {
            let mut files = TelemetryFiles::open(&paths, 2).unwrap();
            files
                .write_episode(
                    &summary(vec![vec![0.1, 0.2, 0.3, 0.0], vec![1.0, 0.0, 0.0, 2.0]], vec![0.25, -0.5]),
                    1001,
                )
                .unwrap();
        }

        assert_eq!(
            fs::read_to_string(paths.error_log(0)).unwrap(),
            "0.1000 0.2000 0.3000 0.0000\n"
        );
        assert_eq!(
            fs::read_to_string(paths.error_log(1)).unwrap(),
            "1.0000 0.0000 0.0000 2.0000\n"
        );
        assert_eq!(fs::read_to_string(paths.reward_log()).unwrap(), "0.2500 -0.5000\n");
        assert_eq!(
            fs::read_to_string(&paths.scalar_log).unwrap(),
            "step,tag,value\n\
             1001,agent0/mean_episode_reward,0.2500\n\
             1001,agent1/mean_episode_reward,-0.5000\n"
        );
    }

    #[test]
    fn test_reopen_appends() {
        let dir = tempdir().unwrap();
        let paths = TrainingConfig::default().with_output_root(dir.path()).paths();

        for x in [1, 2] {
            let mut files = TelemetryFiles::open(&paths, 1).unwrap();
            files
                .write_episode(&summary(vec![vec![x as f64; 4]], vec![x as f64]), x)
                .unwrap();
            files.flush().unwrap();
        }

        assert_eq!(fs::read_to_string(paths.reward_log()).unwrap(), "1.0000\n2.0000\n");
        let scalars = fs::read_to_string(&paths.scalar_log).unwrap();
        // Header only once.
        assert_eq!(scalars.matches("step,tag,value").count(), 1);
        assert_eq!(scalars.lines().count(), 3);
    }

    #[test]
    fn test_rejects_wrong_agent_count() {
        let dir = tempdir().unwrap();
        let paths = TrainingConfig::default().with_output_root(dir.path()).paths();
        let mut files = TelemetryFiles::open(&paths, 3).unwrap();
        assert!(matches!(
            files.write_episode(&summary(vec![vec![0.0; 4]], vec![0.0]), 1),
            Err(TelemetryError::AgentCount { expected: 3, actual: 1 })
        ));
    }
}
