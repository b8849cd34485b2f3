//! Episode boundary classification.
//!
//! An episode ends in one of two ways, and the two are not exclusive:
//!
//! - **Done**: every agent reported completion from the environment itself.
//! - **Terminal**: the episode step counter reached `max_episode_len`.
//!
//! Both trigger the same reset transition in the controller. The distinction
//! is kept so callers (logging, tests) can tell which condition fired.
//!
//! # Usage
//!
//! ```ignore
//! use marl_train::core::EpisodeState;
//!
//! let state = EpisodeState::from_flags(all_done, step_index >= max_episode_len);
//! if state.is_boundary() {
//!     controller.close_episode();
//! }
//! ```

/// Classification of one step with respect to the episode boundary.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum EpisodeState {
    /// Episode continues.
    #[default]
    Running,
    /// All agents reported done before the length cap.
    Done,
    /// Length cap reached while at least one agent was still running.
    Terminal,
    /// All agents reported done on the very step that hit the length cap.
    DoneAndTerminal,
}

impl EpisodeState {
    /// Create the state from the two terminal conditions.
    #[inline]
    pub fn from_flags(done: bool, terminal: bool) -> Self {
        match (done, terminal) {
            (false, false) => Self::Running,
            (true, false) => Self::Done,
            (false, true) => Self::Terminal,
            (true, true) => Self::DoneAndTerminal,
        }
    }

    /// Whether the episode ends on this step (either condition).
    #[inline]
    pub fn is_boundary(&self) -> bool {
        !matches!(self, Self::Running)
    }

    /// Whether all agents reported done.
    #[inline]
    pub fn is_done(&self) -> bool {
        matches!(self, Self::Done | Self::DoneAndTerminal)
    }

    /// Whether the length cap was reached.
    #[inline]
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Terminal | Self::DoneAndTerminal)
    }

    /// Whether the episode is still running.
    #[inline]
    pub fn is_running(&self) -> bool {
        matches!(self, Self::Running)
    }
}
