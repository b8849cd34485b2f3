//! Per-step info capture for benchmark runs.

use std::path::Path;

use serde::Serialize;

use crate::artifact::{write_json, ArtifactError};

/// Info records grouped by episode, then agent, then step.
///
/// The last episode is always the open one; it is excluded when persisting
/// because it may be partial.
#[derive(Debug, Clone)]
pub struct BenchmarkLog<I> {
    n_agents: usize,
    episodes: Vec<Vec<Vec<I>>>,
}

impl<I> BenchmarkLog<I> {
    /// Create a log with one open, empty episode.
    pub fn new(n_agents: usize) -> Self {
        Self {
            n_agents,
            episodes: vec![Self::empty_episode(n_agents)],
        }
    }

    fn empty_episode(n_agents: usize) -> Vec<Vec<I>> {
        (0..n_agents).map(|_| Vec::new()).collect()
    }

    /// Append one step's info records, one per agent, to the open episode.
    pub fn record(&mut self, infos: &[I])
    where
        I: Clone,
    {
        if let Some(open) = self.episodes.last_mut() {
            for (slot, info) in open.iter_mut().zip(infos) {
                slot.push(info.clone());
            }
        }
    }

    /// Close the open episode and start a new one.
    pub fn open_episode(&mut self) {
        self.episodes.push(Self::empty_episode(self.n_agents));
    }

    /// Completed episodes.
    pub fn completed(&self) -> &[Vec<Vec<I>>] {
        &self.episodes[..self.episodes.len() - 1]
    }

    /// The episode currently being recorded.
    pub fn open(&self) -> &[Vec<I>] {
        self.episodes.last().map(Vec::as_slice).unwrap_or(&[])
    }

    /// Write every completed episode to `path` as JSON.
    pub fn persist(&self, path: &Path) -> Result<(), ArtifactError>
    where
        I: Serialize,
    {
        write_json(path, self.completed())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn test_records_per_agent() {
        let mut log = BenchmarkLog::new(2);
        log.record(&[1, 10]);
        log.record(&[2, 20]);
        assert_eq!(log.open(), &[vec![1, 2], vec![10, 20]]);
        assert!(log.completed().is_empty());
    }

    #[test]
    fn test_open_episode_moves_slot_to_completed() {
        let mut log = BenchmarkLog::new(1);
        log.record(&["a"]);
        log.open_episode();
        log.record(&["b"]);
        assert_eq!(log.completed(), &[vec![vec!["a"]]]);
        assert_eq!(log.open(), &[vec!["b"]]);
    }

    #[test]
    fn test_persist_excludes_open_episode() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("bench/exp.json");
        let mut log = BenchmarkLog::new(2);
        log.record(&[1, 2]);
        log.open_episode();
        log.record(&[3, 4]);
        log.persist(&path).unwrap();

        let written: Vec<Vec<Vec<i32>>> = serde_json::from_slice(&std::fs::read(&path).unwrap()).unwrap();
        assert_eq!(written, vec![vec![vec![1], vec![2]]]);
    }
}
