//! One agent's view of a single environment step.

/// A transition handed to a trainer's `experience` call.
///
/// `terminal` is the episode length cap flag and is the same for every agent
/// on a given step; `done` is the agent's own completion flag.
#[derive(Debug, Clone, PartialEq)]
pub struct AgentTransition {
    /// Observation the action was chosen from.
    pub observation: Vec<f32>,
    /// Action the agent took.
    pub action: Vec<f32>,
    /// Reward the agent received.
    pub reward: f32,
    /// Observation after the step.
    pub next_observation: Vec<f32>,
    /// Agent-reported completion.
    pub done: bool,
    /// Episode length cap reached on this step.
    pub terminal: bool,
}

impl AgentTransition {
    /// Create a new transition.
    pub fn new(
        observation: Vec<f32>,
        action: Vec<f32>,
        reward: f32,
        next_observation: Vec<f32>,
        done: bool,
        terminal: bool,
    ) -> Self {
        Self {
            observation,
            action,
            reward,
            next_observation,
            done,
            terminal,
        }
    }
}
