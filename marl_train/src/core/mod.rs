//! Core types shared by the controller and its collaborators.

pub mod episode_state;
pub mod run_mode;
pub mod transition;

pub use episode_state::EpisodeState;
pub use run_mode::RunMode;
pub use transition::AgentTransition;
