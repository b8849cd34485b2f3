//! Kinematic point agents and the encirclement error metrics.
//!
//! State is kept as struct-of-arrays, one entry per agent.

use std::f32::consts::TAU;

use rand::Rng;
use serde::{Deserialize, Serialize};

use crate::config::EncirclementConfig;

/// Number of error channels reported per agent.
pub const ERROR_CHANNELS: usize = 4;

/// Positions and velocities of every agent.
#[derive(Clone, Debug, PartialEq)]
pub struct WorldState {
    pub pos_x: Vec<f32>,
    pub pos_y: Vec<f32>,
    pub vel_x: Vec<f32>,
    pub vel_y: Vec<f32>,
}

impl WorldState {
    /// All agents at the origin, at rest.
    pub fn new(n_agents: usize) -> Self {
        Self {
            pos_x: vec![0.0; n_agents],
            pos_y: vec![0.0; n_agents],
            vel_x: vec![0.0; n_agents],
            vel_y: vec![0.0; n_agents],
        }
    }

    pub fn n_agents(&self) -> usize {
        self.pos_x.len()
    }

    /// Scatter agents uniformly and zero their velocities.
    pub fn spawn<R: Rng>(&mut self, spread: f32, rng: &mut R) {
        for i in 0..self.n_agents() {
            self.pos_x[i] = rng.gen_range(-spread..=spread);
            self.pos_y[i] = rng.gen_range(-spread..=spread);
            self.vel_x[i] = 0.0;
            self.vel_y[i] = 0.0;
        }
    }

    /// Set agent `i`'s velocity from a `[-1, 1]²` command and integrate.
    pub fn apply(&mut self, i: usize, command: [f32; 2], config: &EncirclementConfig) {
        self.vel_x[i] = command[0].clamp(-1.0, 1.0) * config.max_speed;
        self.vel_y[i] = command[1].clamp(-1.0, 1.0) * config.max_speed;
        self.pos_x[i] += self.vel_x[i] * config.dt;
        self.pos_y[i] += self.vel_y[i] * config.dt;
    }

    /// Position of agent `i` relative to the target.
    pub fn relative(&self, i: usize, target: [f32; 2]) -> [f32; 2] {
        [self.pos_x[i] - target[0], self.pos_y[i] - target[1]]
    }

    /// Whether agent `i` is outside the arena.
    pub fn out_of_bounds(&self, i: usize, half_width: f32) -> bool {
        self.pos_x[i].abs() > half_width || self.pos_y[i].abs() > half_width
    }
}

/// Per-agent diagnostics, also emitted as the benchmark info record.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct AgentBenchmark {
    /// Distance from the ring.
    pub position_error: f32,
    /// Deviation of the gap to the next agent from equal spacing (rad).
    pub orientation_error: f32,
    /// Deviation from the reference angular rate (rad/s).
    pub rate_error: f32,
    /// Other agents within collision distance.
    pub collisions: usize,
}

impl AgentBenchmark {
    /// Error channels in reporting order.
    pub fn channels(&self) -> Vec<f32> {
        vec![
            self.position_error,
            self.orientation_error,
            self.rate_error,
            self.collisions as f32,
        ]
    }

    /// Tracking error: the first three channels summed.
    pub fn tracking_error(&self) -> f32 {
        self.position_error + self.orientation_error + self.rate_error
    }
}

/// Phase angle of agent `i` around the target, in `[0, 2π)`.
pub fn phase(state: &WorldState, i: usize, target: [f32; 2]) -> f32 {
    let [x, y] = state.relative(i, target);
    y.atan2(x).rem_euclid(TAU)
}

/// Counter-clockwise angular rate of agent `i` around the target.
pub fn angular_rate(state: &WorldState, i: usize, target: [f32; 2]) -> f32 {
    let [x, y] = state.relative(i, target);
    let r2 = x * x + y * y;
    if r2 < 1e-9 {
        return 0.0;
    }
    (x * state.vel_y[i] - y * state.vel_x[i]) / r2
}

/// Counter-clockwise phase gap from agent `i` to its nearest successor.
///
/// Returns `None` for a single agent.
pub fn successor_gap(phases: &[f32], i: usize) -> Option<f32> {
    phases
        .iter()
        .enumerate()
        .filter(|&(j, _)| j != i)
        .map(|(_, &p)| (p - phases[i]).rem_euclid(TAU))
        .min_by(|a, b| a.total_cmp(b))
}

/// Compute every agent's diagnostics for the current state.
pub fn measure(state: &WorldState, config: &EncirclementConfig) -> Vec<AgentBenchmark> {
    let n = state.n_agents();
    let phases: Vec<f32> = (0..n).map(|i| phase(state, i, config.target)).collect();
    let spacing = TAU / n as f32;
    let min_dist2 = config.collision_distance * config.collision_distance;

    (0..n)
        .map(|i| {
            let [x, y] = state.relative(i, config.target);
            let collisions = (0..n)
                .filter(|&j| j != i)
                .filter(|&j| {
                    let dx = state.pos_x[i] - state.pos_x[j];
                    let dy = state.pos_y[i] - state.pos_y[j];
                    dx * dx + dy * dy < min_dist2
                })
                .count();

            AgentBenchmark {
                position_error: ((x * x + y * y).sqrt() - config.radius).abs(),
                orientation_error: successor_gap(&phases, i)
                    .map(|gap| (gap - spacing).abs())
                    .unwrap_or(0.0),
                rate_error: (angular_rate(state, i, config.target) - config.angular_rate).abs(),
                collisions,
            }
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::rngs::StdRng;
    use rand::SeedableRng;

    fn ring(n: usize, radius: f32) -> WorldState {
        let mut state = WorldState::new(n);
        for i in 0..n {
            let theta = TAU * i as f32 / n as f32;
            state.pos_x[i] = radius * theta.cos();
            state.pos_y[i] = radius * theta.sin();
        }
        state
    }

    #[test]
    fn test_perfect_ring_has_no_position_or_spacing_error() {
        let config = EncirclementConfig::new(4).with_angular_rate(0.0);
        let metrics = measure(&ring(4, 1.0), &config);
        for m in &metrics {
            assert!(m.position_error < 1e-5);
            assert!(m.orientation_error < 1e-5);
            assert!(m.rate_error < 1e-6);
            assert_eq!(m.collisions, 0);
        }
    }

    #[test]
    fn test_tangential_velocity_gives_angular_rate() {
        let mut state = WorldState::new(1);
        state.pos_x[0] = 2.0;
        state.vel_y[0] = 1.0;
        assert!((angular_rate(&state, 0, [0.0, 0.0]) - 0.5).abs() < 1e-6);

        // Radial motion does not rotate.
        state.vel_y[0] = 0.0;
        state.vel_x[0] = 1.0;
        assert_eq!(angular_rate(&state, 0, [0.0, 0.0]), 0.0);
    }

    #[test]
    fn test_successor_gap_wraps() {
        let phases = [0.1, TAU - 0.1];
        assert!((successor_gap(&phases, 1).unwrap() - 0.2).abs() < 1e-5);
        assert!((successor_gap(&phases, 0).unwrap() - (TAU - 0.2)).abs() < 1e-5);
        assert_eq!(successor_gap(&[1.0], 0), None);
    }

    #[test]
    fn test_collisions_are_counted_both_ways() {
        let config = EncirclementConfig::new(3);
        let mut state = ring(3, 1.0);
        state.pos_x[1] = state.pos_x[0] + 0.05;
        state.pos_y[1] = state.pos_y[0];
        let metrics = measure(&state, &config);
        assert_eq!(metrics[0].collisions, 1);
        assert_eq!(metrics[1].collisions, 1);
        assert_eq!(metrics[2].collisions, 0);
    }

    #[test]
    fn test_apply_clamps_and_integrates() {
        let config = EncirclementConfig::new(1).with_max_speed(2.0).with_dt(0.5);
        let mut state = WorldState::new(1);
        state.apply(0, [3.0, -0.5], &config);
        assert_eq!(state.vel_x[0], 2.0);
        assert_eq!(state.vel_y[0], -1.0);
        assert_eq!(state.pos_x[0], 1.0);
        assert_eq!(state.pos_y[0], -0.5);
    }

    #[test]
    fn test_spawn_stays_in_spread() {
        let mut state = WorldState::new(16);
        state.spawn(0.5, &mut StdRng::seed_from_u64(3));
        for i in 0..16 {
            assert!(state.pos_x[i].abs() <= 0.5 && state.pos_y[i].abs() <= 0.5);
            assert!(!state.out_of_bounds(i, 0.5));
        }
    }
}
