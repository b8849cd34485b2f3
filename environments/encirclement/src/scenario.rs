//! The `simple_encirclement` environment.

use rand::rngs::StdRng;
use rand::SeedableRng;

use marl_train::{ActionSpace, EnvError, MultiAgentEnv, MultiAgentStep};

use crate::config::{EncirclementConfig, ScenarioConfigError};
use crate::render;
use crate::world::{measure, AgentBenchmark, WorldState, ERROR_CHANNELS};

/// N agents learning to circle a target at a fixed radius, evenly spaced,
/// at a reference angular rate.
///
/// Observation of agent `i` (length `4 + 2 * (n - 1)`):
/// `[rel_target_x, rel_target_y, vel_x, vel_y, (other_j - self) for j != i]`.
///
/// Action: a continuous velocity command in `[-1, 1]²`.
///
/// Reward: minus the tracking error (position, spacing and rate errors),
/// minus a penalty per collision. The combined reward view is the tracking
/// term alone.
pub struct Encirclement {
    config: EncirclementConfig,
    state: WorldState,
    spaces: Vec<ActionSpace>,
    rng: StdRng,
    steps: usize,
}

impl Encirclement {
    /// Build the scenario from a validated config.
    pub fn new(config: EncirclementConfig) -> Result<Self, ScenarioConfigError> {
        config.validate()?;
        let n = config.n_agents;
        Ok(Self {
            state: WorldState::new(n),
            spaces: vec![
                ActionSpace::Continuous {
                    dim: 2,
                    low: -1.0,
                    high: 1.0
                };
                n
            ],
            rng: StdRng::seed_from_u64(config.seed),
            steps: 0,
            config,
        })
    }

    /// Scenario parameters.
    pub fn config(&self) -> &EncirclementConfig {
        &self.config
    }

    /// Current positions and velocities.
    pub fn state(&self) -> &WorldState {
        &self.state
    }

    /// Steps since the last reset.
    pub fn steps(&self) -> usize {
        self.steps
    }

    /// The current frame as text.
    pub fn frame(&self) -> String {
        render::ascii_frame(&self.state, &self.config)
    }

    fn observe(&self, i: usize) -> Vec<f32> {
        let n = self.state.n_agents();
        let mut obs = Vec::with_capacity(4 + 2 * n.saturating_sub(1));
        obs.extend_from_slice(&self.state.relative(i, self.config.target));
        obs.push(self.state.vel_x[i]);
        obs.push(self.state.vel_y[i]);
        for j in (0..n).filter(|&j| j != i) {
            obs.push(self.state.pos_x[j] - self.state.pos_x[i]);
            obs.push(self.state.pos_y[j] - self.state.pos_y[i]);
        }
        obs
    }

    fn observe_all(&self) -> Vec<Vec<f32>> {
        (0..self.state.n_agents()).map(|i| self.observe(i)).collect()
    }
}

impl MultiAgentEnv for Encirclement {
    type Info = AgentBenchmark;

    fn n_agents(&self) -> usize {
        self.config.n_agents
    }

    fn action_space(&self) -> &[ActionSpace] {
        &self.spaces
    }

    fn observation_sizes(&self) -> Vec<usize> {
        vec![4 + 2 * (self.config.n_agents - 1); self.config.n_agents]
    }

    fn error_channels(&self) -> usize {
        ERROR_CHANNELS
    }

    fn reset(&mut self) -> Result<Vec<Vec<f32>>, EnvError> {
        self.state.spawn(self.config.spawn_spread, &mut self.rng);
        self.steps = 0;
        Ok(self.observe_all())
    }

    fn step(&mut self, actions: &[Vec<f32>]) -> Result<MultiAgentStep<AgentBenchmark>, EnvError> {
        let n = self.config.n_agents;
        if actions.len() != n {
            return Err(EnvError::AgentCountMismatch {
                field: "actions",
                expected: n,
                actual: actions.len(),
            });
        }
        for (agent, action) in actions.iter().enumerate() {
            if action.len() != 2 {
                return Err(EnvError::InvalidAction {
                    agent,
                    reason: format!("expected 2 components, got {}", action.len()),
                });
            }
            if action.iter().any(|v| !v.is_finite()) {
                return Err(EnvError::InvalidAction {
                    agent,
                    reason: "non-finite component".to_string(),
                });
            }
        }

        for (i, action) in actions.iter().enumerate() {
            self.state.apply(i, [action[0], action[1]], &self.config);
        }
        self.steps += 1;

        let metrics = measure(&self.state, &self.config);
        let combined_reward: Vec<f32> = metrics.iter().map(|m| -m.tracking_error()).collect();
        let rewards = metrics
            .iter()
            .zip(&combined_reward)
            .map(|(m, &tracking)| tracking - self.config.collision_penalty * m.collisions as f32)
            .collect();

        Ok(MultiAgentStep {
            observations: self.observe_all(),
            rewards,
            dones: (0..n)
                .map(|i| self.state.out_of_bounds(i, self.config.arena_half_width))
                .collect(),
            errors: metrics.iter().map(AgentBenchmark::channels).collect(),
            combined_reward,
            infos: metrics,
        })
    }

    fn render(&mut self) -> Result<(), EnvError> {
        println!("{}", self.frame());
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn env(n: usize) -> Encirclement {
        Encirclement::new(EncirclementConfig::new(n).with_seed(11)).unwrap()
    }

    #[test]
    fn test_shapes() {
        let mut env = env(4);
        let obs = env.reset().unwrap();
        assert_eq!(obs.len(), 4);
        assert!(obs.iter().all(|o| o.len() == 10));
        assert_eq!(env.observation_sizes(), vec![10; 4]);
        assert_eq!(env.action_space().len(), 4);
        assert_eq!(env.error_channels(), 4);

        let result = env.step(&vec![vec![0.0, 0.0]; 4]).unwrap();
        assert!(result.validate(4, 4).is_ok());
        assert_eq!(env.steps(), 1);
    }

    #[test]
    fn test_accessors_follow_world() {
        let mut env = env(3);
        assert_eq!(env.config().n_agents, 3);
        env.reset().unwrap();
        env.step(&[vec![1.0, 0.0], vec![0.0, 0.0], vec![0.0, -1.0]]).unwrap();
        assert_eq!(env.state().n_agents(), 3);
        assert_eq!(env.state().vel_x[0], env.config().max_speed);
        assert_eq!(env.state().vel_y[2], -env.config().max_speed);
    }

    #[test]
    fn test_reset_is_seeded() {
        let mut a = env(3);
        let mut b = env(3);
        let first = a.reset().unwrap();
        assert_eq!(first, b.reset().unwrap());
        // Successive resets draw new positions.
        assert_ne!(first, a.reset().unwrap());
    }

    #[test]
    fn test_reward_is_negative_error() {
        let mut env = env(2);
        env.reset().unwrap();
        let result = env.step(&vec![vec![0.3, -0.2]; 2]).unwrap();
        for i in 0..2 {
            let info = &result.infos[i];
            assert!((result.combined_reward[i] + info.tracking_error()).abs() < 1e-6);
            assert!(result.rewards[i] <= result.combined_reward[i]);
            assert_eq!(result.errors[i], info.channels());
        }
    }

    #[test]
    fn test_leaving_arena_is_done() {
        let mut env = Encirclement::new(
            EncirclementConfig::new(2)
                .with_arena_half_width(1.5)
                .with_radius(0.5)
                .with_spawn_spread(0.1)
                .with_max_speed(1.0)
                .with_dt(1.0),
        )
        .unwrap();
        env.reset().unwrap();
        let mut dones = vec![false, false];
        for _ in 0..3 {
            dones = env.step(&[vec![1.0, 0.0], vec![0.0, 0.0]]).unwrap().dones;
        }
        assert_eq!(dones, vec![true, false]);
    }

    #[test]
    fn test_rejects_malformed_actions() {
        let mut env = env(2);
        env.reset().unwrap();
        assert!(matches!(
            env.step(&[vec![0.0, 0.0]]),
            Err(EnvError::AgentCountMismatch { field: "actions", .. })
        ));
        assert!(matches!(
            env.step(&[vec![0.0, 0.0], vec![0.0]]),
            Err(EnvError::InvalidAction { agent: 1, .. })
        ));
        assert!(matches!(
            env.step(&[vec![f32::NAN, 0.0], vec![0.0, 0.0]]),
            Err(EnvError::InvalidAction { agent: 0, .. })
        ));
    }

    #[test]
    fn test_invalid_config_is_rejected() {
        assert!(Encirclement::new(EncirclementConfig::new(0)).is_err());
    }
}
