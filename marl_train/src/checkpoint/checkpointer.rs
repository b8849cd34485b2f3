//! Roster checkpointing.
//!
//! A checkpoint is a directory named `checkpoint_<episode:08>` holding one
//! sub-directory per trainer plus a `record.json` describing the save. The
//! directory name is only the on-disk encoding; the record is the source of
//! truth and the two must agree.

use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::trainer::{AgentTrainer, TrainerError};

/// File inside every checkpoint directory describing the save.
pub const RECORD_FILE: &str = "record.json";

const PREFIX: &str = "checkpoint_";
const TMP_PREFIX: &str = ".tmp_";

/// Configuration for the checkpoint manager.
#[derive(Debug, Clone)]
pub struct CheckpointManagerConfig {
    /// Directory to store checkpoints.
    pub checkpoint_dir: PathBuf,
    /// Number of recent checkpoints to keep (0 = keep all).
    pub keep_last_n: usize,
}

impl CheckpointManagerConfig {
    /// Create a new config with specified checkpoint directory.
    pub fn new(checkpoint_dir: impl Into<PathBuf>) -> Self {
        Self {
            checkpoint_dir: checkpoint_dir.into(),
            keep_last_n: 0,
        }
    }

    /// Set the number of checkpoints to keep.
    pub fn with_keep_last_n(mut self, n: usize) -> Self {
        self.keep_last_n = n;
        self
    }
}

/// Error type for checkpointing operations.
#[derive(Debug, Error)]
pub enum CheckpointError {
    /// Resume requested but nothing to resume from.
    #[error("no checkpoints found in {}", .0.display())]
    NoCheckpoints(PathBuf),
    /// A checkpoint directory name does not embed an episode count.
    #[error("checkpoint identifier {0:?} does not embed an episode count")]
    MalformedIdentifier(String),
    /// The record inside a checkpoint disagrees with its directory name.
    #[error("checkpoint {identifier} stores episode index {stored} but its identifier embeds {embedded}")]
    DivergentEpisodeIndex {
        /// Directory name.
        identifier: String,
        /// Count parsed from the name.
        embedded: usize,
        /// Count stored in the record.
        stored: usize,
    },
    /// The checkpoint was written for a different roster size.
    #[error("checkpoint holds {actual} agents, roster has {expected}")]
    RosterMismatch {
        /// Trainers in the current roster.
        expected: usize,
        /// Agents in the checkpoint.
        actual: usize,
    },
    /// Filesystem error.
    #[error("io: {0}")]
    Io(#[from] io::Error),
    /// `record.json` could not be written or parsed.
    #[error("record {}: {source}", path.display())]
    Record {
        /// Record file.
        path: PathBuf,
        /// Serde error.
        #[source]
        source: serde_json::Error,
    },
    /// A trainer failed to save or load its parameters.
    #[error("trainer {name}: {source}")]
    Trainer {
        /// Trainer name.
        name: String,
        /// Underlying error.
        #[source]
        source: TrainerError,
    },
}

/// Structured description of one checkpoint.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CheckpointRecord {
    /// Absolute number of completed episodes at save time.
    pub episode_index: usize,
    /// Roster size.
    pub n_agents: usize,
    /// Trainer names, in roster order; each is a sub-directory.
    pub agents: Vec<String>,
}

/// A checkpoint found on disk.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CheckpointInfo {
    /// Checkpoint directory.
    pub path: PathBuf,
    /// Episode count embedded in the directory name.
    pub episode_index: usize,
}

/// Identifier of the checkpoint saved after `episode_index` episodes.
pub fn checkpoint_identifier(episode_index: usize) -> String {
    format!("{}{:08}", PREFIX, episode_index)
}

/// Extract the episode count from a checkpoint identifier.
pub fn parse_identifier(name: &str) -> Result<usize, CheckpointError> {
    name.strip_prefix(PREFIX)
        .filter(|digits| !digits.is_empty() && digits.bytes().all(|b| b.is_ascii_digit()))
        .and_then(|digits| digits.parse().ok())
        .ok_or_else(|| CheckpointError::MalformedIdentifier(name.to_string()))
}

/// List all checkpoints in `dir`, oldest first.
///
/// Any entry carrying the checkpoint prefix must parse; a malformed one is an
/// error rather than silently skipped.
pub fn list_checkpoints(dir: &Path) -> Result<Vec<CheckpointInfo>, CheckpointError> {
    if !dir.is_dir() {
        return Ok(Vec::new());
    }

    let mut checkpoints = Vec::new();
    for entry in fs::read_dir(dir)? {
        let entry = entry?;
        let name = entry.file_name();
        let Some(name) = name.to_str() else {
            continue;
        };
        if !name.starts_with(PREFIX) || !entry.path().is_dir() {
            continue;
        }
        checkpoints.push(CheckpointInfo {
            path: entry.path(),
            episode_index: parse_identifier(name)?,
        });
    }

    checkpoints.sort_by_key(|c| c.episode_index);
    Ok(checkpoints)
}

/// Find the checkpoint with the highest embedded episode count.
pub fn find_latest(dir: &Path) -> Result<CheckpointInfo, CheckpointError> {
    list_checkpoints(dir)?
        .pop()
        .ok_or_else(|| CheckpointError::NoCheckpoints(dir.to_path_buf()))
}

/// Read and validate the record of a checkpoint.
pub fn read_record(info: &CheckpointInfo) -> Result<CheckpointRecord, CheckpointError> {
    let path = info.path.join(RECORD_FILE);
    let text = fs::read_to_string(&path)?;
    let record: CheckpointRecord =
        serde_json::from_str(&text).map_err(|source| CheckpointError::Record { path, source })?;

    if record.episode_index != info.episode_index {
        return Err(CheckpointError::DivergentEpisodeIndex {
            identifier: checkpoint_identifier(info.episode_index),
            embedded: info.episode_index,
            stored: record.episode_index,
        });
    }
    Ok(record)
}

/// Episode count to resume from: the validated index of the latest checkpoint.
pub fn resolve_resume_index(dir: &Path) -> Result<usize, CheckpointError> {
    let latest = find_latest(dir)?;
    Ok(read_record(&latest)?.episode_index)
}

/// Restore every trainer from the latest checkpoint in `dir`.
pub fn load_latest<T: AgentTrainer>(
    dir: &Path,
    trainers: &mut [T],
) -> Result<CheckpointRecord, CheckpointError> {
    let latest = find_latest(dir)?;
    let record = read_record(&latest)?;

    if record.n_agents != trainers.len() || record.agents.len() != trainers.len() {
        return Err(CheckpointError::RosterMismatch {
            expected: trainers.len(),
            actual: record.n_agents,
        });
    }

    for (trainer, agent) in trainers.iter_mut().zip(&record.agents) {
        trainer
            .load(&latest.path.join(agent))
            .map_err(|source| CheckpointError::Trainer {
                name: agent.clone(),
                source,
            })?;
    }

    log::info!(
        "Restored {} trainers from {} (episode {})",
        trainers.len(),
        latest.path.display(),
        record.episode_index
    );
    Ok(record)
}

/// Writes roster checkpoints and prunes old ones.
#[derive(Debug)]
pub struct CheckpointManager {
    config: CheckpointManagerConfig,
    history: Vec<CheckpointInfo>,
}

impl CheckpointManager {
    /// Create a new manager.
    ///
    /// Creates the checkpoint directory if it doesn't exist. Checkpoints
    /// already on disk count towards retention.
    pub fn new(config: CheckpointManagerConfig) -> Result<Self, CheckpointError> {
        fs::create_dir_all(&config.checkpoint_dir)?;
        let history = list_checkpoints(&config.checkpoint_dir)?;
        Ok(Self { config, history })
    }

    /// Get the configuration.
    pub fn config(&self) -> &CheckpointManagerConfig {
        &self.config
    }

    /// Checkpoints written or found by this manager, oldest first.
    pub fn history(&self) -> &[CheckpointInfo] {
        &self.history
    }

    /// Save every trainer after `episode_index` completed episodes.
    ///
    /// The checkpoint is assembled under a temporary name and renamed into
    /// place, so a crash never leaves a half-written `checkpoint_*` directory.
    pub fn save<T: AgentTrainer>(
        &mut self,
        trainers: &[T],
        episode_index: usize,
    ) -> Result<CheckpointInfo, CheckpointError> {
        let identifier = checkpoint_identifier(episode_index);
        let path = self.config.checkpoint_dir.join(&identifier);
        let staging = self
            .config
            .checkpoint_dir
            .join(format!("{}{}", TMP_PREFIX, identifier));

        if staging.exists() {
            fs::remove_dir_all(&staging)?;
        }
        fs::create_dir_all(&staging)?;

        for trainer in trainers {
            trainer
                .save(&staging.join(trainer.name()))
                .map_err(|source| CheckpointError::Trainer {
                    name: trainer.name().to_string(),
                    source,
                })?;
        }

        let record = CheckpointRecord {
            episode_index,
            n_agents: trainers.len(),
            agents: trainers.iter().map(|t| t.name().to_string()).collect(),
        };
        let record_path = staging.join(RECORD_FILE);
        let json = serde_json::to_string_pretty(&record).map_err(|source| CheckpointError::Record {
            path: record_path.clone(),
            source,
        })?;
        fs::write(&record_path, json)?;

        if path.exists() {
            fs::remove_dir_all(&path)?;
        }
        fs::rename(&staging, &path)?;

        let info = CheckpointInfo {
            path,
            episode_index,
        };
        self.history.retain(|c| c.episode_index != episode_index);
        self.history.push(info.clone());
        self.cleanup_old_checkpoints()?;

        Ok(info)
    }

    /// Cleanup old checkpoints, keeping only the last N.
    fn cleanup_old_checkpoints(&mut self) -> Result<(), CheckpointError> {
        if self.config.keep_last_n == 0 {
            return Ok(());
        }

        while self.history.len() > self.config.keep_last_n {
            let old = self.history.remove(0);
            if old.path.exists() {
                fs::remove_dir_all(&old.path)?;
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::AgentTransition;
    use crate::trainer::Peers;
    use tempfile::tempdir;

    /// Trainer whose whole state is one number stored in `value.txt`.
    struct FileTrainer {
        name: String,
        value: u32,
    }

    impl FileTrainer {
        fn roster(values: &[u32]) -> Vec<Self> {
            values
                .iter()
                .enumerate()
                .map(|(i, &value)| Self {
                    name: format!("agent_{}", i),
                    value,
                })
                .collect()
        }
    }

    impl AgentTrainer for FileTrainer {
        fn name(&self) -> &str {
            &self.name
        }

        fn action(&mut self, _observation: &[f32]) -> Result<Vec<f32>, TrainerError> {
            Ok(vec![])
        }

        fn experience(&mut self, _transition: AgentTransition) -> Result<(), TrainerError> {
            Ok(())
        }

        fn preupdate(&mut self) {}

        fn update(&mut self, _peers: Peers<'_, Self>, _step: usize) -> Result<Option<f32>, TrainerError> {
            Ok(None)
        }

        fn save(&self, dir: &Path) -> Result<(), TrainerError> {
            fs::create_dir_all(dir)?;
            fs::write(dir.join("value.txt"), self.value.to_string())?;
            Ok(())
        }

        fn load(&mut self, dir: &Path) -> Result<(), TrainerError> {
            let text = fs::read_to_string(dir.join("value.txt"))?;
            self.value = text.trim().parse().map_err(|_| TrainerError::Record {
                path: dir.to_path_buf(),
                reason: "not a number".to_string(),
            })?;
            Ok(())
        }
    }

    #[test]
    fn test_identifier_roundtrip() {
        assert_eq!(checkpoint_identifier(1000), "checkpoint_00001000");
        assert_eq!(parse_identifier("checkpoint_00001000").unwrap(), 1000);
        assert_eq!(parse_identifier("checkpoint_123456789").unwrap(), 123_456_789);
    }

    #[test]
    fn test_parse_identifier_rejects_malformed() {
        for name in ["checkpoint_", "checkpoint_12a", "checkpoint_-1", "model_0001"] {
            assert!(matches!(
                parse_identifier(name),
                Err(CheckpointError::MalformedIdentifier(_))
            ));
        }
    }

    #[test]
    fn test_checkpoint_dir_creation() {
        let dir = tempdir().unwrap();
        let subdir = dir.path().join("nested/checkpoints");
        let _manager = CheckpointManager::new(CheckpointManagerConfig::new(&subdir)).unwrap();
        assert!(subdir.exists());
    }

    #[test]
    fn test_save_writes_record_and_agents() {
        let dir = tempdir().unwrap();
        let mut manager = CheckpointManager::new(CheckpointManagerConfig::new(dir.path())).unwrap();
        let trainers = FileTrainer::roster(&[7, 9]);

        let info = manager.save(&trainers, 40).unwrap();
        assert_eq!(info.path, dir.path().join("checkpoint_00000040"));
        assert!(info.path.join("agent_0/value.txt").exists());
        assert!(info.path.join("agent_1/value.txt").exists());

        let record = read_record(&info).unwrap();
        assert_eq!(
            record,
            CheckpointRecord {
                episode_index: 40,
                n_agents: 2,
                agents: vec!["agent_0".into(), "agent_1".into()],
            }
        );

        // No staging directory left behind.
        let leftovers: Vec<_> = fs::read_dir(dir.path())
            .unwrap()
            .filter_map(|e| e.ok())
            .filter(|e| e.file_name().to_string_lossy().starts_with(TMP_PREFIX))
            .collect();
        assert!(leftovers.is_empty());
    }

    #[test]
    fn test_latest_is_highest_embedded_count() {
        let dir = tempdir().unwrap();
        let mut manager = CheckpointManager::new(CheckpointManagerConfig::new(dir.path())).unwrap();
        let trainers = FileTrainer::roster(&[1]);
        for index in [5, 100, 20] {
            manager.save(&trainers, index).unwrap();
        }

        let listed: Vec<usize> = list_checkpoints(dir.path())
            .unwrap()
            .iter()
            .map(|c| c.episode_index)
            .collect();
        assert_eq!(listed, vec![5, 20, 100]);
        assert_eq!(find_latest(dir.path()).unwrap().episode_index, 100);
        assert_eq!(resolve_resume_index(dir.path()).unwrap(), 100);
    }

    #[test]
    fn test_resolve_without_checkpoints_fails() {
        let dir = tempdir().unwrap();
        assert!(matches!(
            resolve_resume_index(dir.path()),
            Err(CheckpointError::NoCheckpoints(_))
        ));
        assert!(matches!(
            resolve_resume_index(&dir.path().join("missing")),
            Err(CheckpointError::NoCheckpoints(_))
        ));
    }

    #[test]
    fn test_malformed_directory_is_fatal() {
        let dir = tempdir().unwrap();
        fs::create_dir_all(dir.path().join("checkpoint_latest")).unwrap();
        assert!(matches!(
            resolve_resume_index(dir.path()),
            Err(CheckpointError::MalformedIdentifier(_))
        ));
    }

    #[test]
    fn test_divergent_record_is_rejected() {
        let dir = tempdir().unwrap();
        let mut manager = CheckpointManager::new(CheckpointManagerConfig::new(dir.path())).unwrap();
        manager.save(&FileTrainer::roster(&[1]), 30).unwrap();

        // Rename the directory so the identifier no longer matches the record.
        fs::rename(dir.path().join("checkpoint_00000030"), dir.path().join("checkpoint_00000031")).unwrap();

        match resolve_resume_index(dir.path()) {
            Err(CheckpointError::DivergentEpisodeIndex { embedded, stored, .. }) => {
                assert_eq!(embedded, 31);
                assert_eq!(stored, 30);
            }
            other => panic!("expected DivergentEpisodeIndex, got {:?}", other),
        }
    }

    #[test]
    fn test_load_latest_restores_trainers() {
        let dir = tempdir().unwrap();
        let mut manager = CheckpointManager::new(CheckpointManagerConfig::new(dir.path())).unwrap();
        manager.save(&FileTrainer::roster(&[1, 2]), 10).unwrap();
        manager.save(&FileTrainer::roster(&[3, 4]), 20).unwrap();

        let mut trainers = FileTrainer::roster(&[0, 0]);
        let record = load_latest(dir.path(), &mut trainers).unwrap();
        assert_eq!(record.episode_index, 20);
        assert_eq!(trainers[0].value, 3);
        assert_eq!(trainers[1].value, 4);
    }

    #[test]
    fn test_load_latest_rejects_roster_mismatch() {
        let dir = tempdir().unwrap();
        let mut manager = CheckpointManager::new(CheckpointManagerConfig::new(dir.path())).unwrap();
        manager.save(&FileTrainer::roster(&[1, 2]), 10).unwrap();

        let mut trainers = FileTrainer::roster(&[0, 0, 0]);
        assert!(matches!(
            load_latest(dir.path(), &mut trainers),
            Err(CheckpointError::RosterMismatch { expected: 3, actual: 2 })
        ));
    }

    #[test]
    fn test_keep_last_n_prunes_oldest() {
        let dir = tempdir().unwrap();
        let config = CheckpointManagerConfig::new(dir.path()).with_keep_last_n(2);
        let mut manager = CheckpointManager::new(config).unwrap();
        let trainers = FileTrainer::roster(&[1]);
        for index in [1, 2, 3, 4] {
            manager.save(&trainers, index).unwrap();
        }

        let listed: Vec<usize> = list_checkpoints(dir.path())
            .unwrap()
            .iter()
            .map(|c| c.episode_index)
            .collect();
        assert_eq!(listed, vec![3, 4]);
        assert_eq!(manager.history().len(), 2);
    }
}
