//! Checkpoint saving and resume resolution.
//!
//! ## Example
//!
//! ```rust,ignore
//! use marl_train::checkpoint::{CheckpointManager, CheckpointManagerConfig};
//!
//! let mut manager = CheckpointManager::new(
//!     CheckpointManagerConfig::new("./policy/encircle").with_keep_last_n(5),
//! )?;
//!
//! // On a save-rate boundary:
//! manager.save(&trainers, resume_index + episode_index)?;
//!
//! // Resume:
//! let record = marl_train::checkpoint::load_latest(load_dir, &mut trainers)?;
//! ```

pub mod checkpointer;

pub use checkpointer::{
    checkpoint_identifier, find_latest, list_checkpoints, load_latest, parse_identifier, read_record,
    resolve_resume_index, CheckpointError, CheckpointInfo, CheckpointManager, CheckpointManagerConfig,
    CheckpointRecord, RECORD_FILE,
};
