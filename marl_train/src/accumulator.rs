//! Per-episode and per-window reward and error bookkeeping.
//!
//! The accumulator keeps two reward series (one per agent plus a combined
//! series across agents) whose last element is always the open episode, and
//! two copies of the diagnostic error sums:
//!
//! - a per-episode sum, flushed and zeroed at every episode boundary;
//! - a long-window sum, zeroed every `save_rate` episodes.
//!
//! Both error sums receive exactly the same additions, so the per-episode sum
//! never exceeds what the window has seen since its last reset.

/// Round to four decimal places.
pub fn round4(value: f64) -> f64 {
    (value * 10_000.0).round() / 10_000.0
}

/// Values flushed when an episode closes, already divided by the episode
/// length cap and rounded to four decimals.
#[derive(Debug, Clone, PartialEq)]
pub struct EpisodeSummary {
    /// Per-agent error channels.
    pub errors: Vec<Vec<f64>>,
    /// Per-agent combined reward.
    pub combined_reward: Vec<f64>,
}

/// Statistics over the last save-rate window.
#[derive(Debug, Clone, PartialEq)]
pub struct WindowSummary {
    /// Mean combined episode reward over the window.
    pub mean_reward: f64,
    /// Mean episode reward of each agent over the window.
    pub agent_means: Vec<f64>,
    /// Mean error vector (K values) over agents, steps and episodes.
    pub mean_error: Vec<f64>,
}

/// Reward series and error sums for one training process.
#[derive(Debug, Clone)]
pub struct EpisodeAccumulator {
    n_agents: usize,
    error_channels: usize,
    episode_rewards: Vec<f64>,
    agent_rewards: Vec<Vec<f64>>,
    episode_errors: Vec<Vec<f64>>,
    window_errors: Vec<Vec<f64>>,
    episode_combined: Vec<f64>,
}

impl EpisodeAccumulator {
    /// Create an accumulator with one open zero slot per series.
    pub fn new(n_agents: usize, error_channels: usize) -> Self {
        Self {
            n_agents,
            error_channels,
            episode_rewards: vec![0.0],
            agent_rewards: vec![vec![0.0]; n_agents],
            episode_errors: vec![vec![0.0; error_channels]; n_agents],
            window_errors: vec![vec![0.0; error_channels]; n_agents],
            episode_combined: vec![0.0; n_agents],
        }
    }

    /// Number of agents.
    pub fn n_agents(&self) -> usize {
        self.n_agents
    }

    /// Number of error channels per agent.
    pub fn error_channels(&self) -> usize {
        self.error_channels
    }

    /// Add one step's rewards and errors into the open episode.
    ///
    /// Slices are expected to be validated against the agent count already;
    /// extra entries are ignored.
    pub fn record_step(&mut self, rewards: &[f32], combined: &[f32], errors: &[Vec<f32>]) {
        for (agent, &reward) in rewards.iter().enumerate().take(self.n_agents) {
            let reward = reward as f64;
            if let Some(open) = self.episode_rewards.last_mut() {
                *open += reward;
            }
            if let Some(open) = self.agent_rewards[agent].last_mut() {
                *open += reward;
            }
        }

        for (sum, &value) in self.episode_combined.iter_mut().zip(combined) {
            *sum += value as f64;
        }

        for (agent, channels) in errors.iter().enumerate().take(self.n_agents) {
            let episode = &mut self.episode_errors[agent];
            let window = &mut self.window_errors[agent];
            for (k, &value) in channels.iter().enumerate().take(self.error_channels) {
                episode[k] += value as f64;
                window[k] += value as f64;
            }
        }
    }

    /// Close the open episode.
    ///
    /// Appends a fresh zero slot to every reward series, returns the
    /// normalized per-episode values, and zeroes the per-episode sums.
    pub fn close_episode(&mut self, max_episode_len: usize) -> EpisodeSummary {
        let scale = max_episode_len.max(1) as f64;

        let summary = EpisodeSummary {
            errors: self
                .episode_errors
                .iter()
                .map(|channels| channels.iter().map(|&v| round4(v / scale)).collect())
                .collect(),
            combined_reward: self
                .episode_combined
                .iter()
                .map(|&v| round4(v / scale))
                .collect(),
        };

        self.episode_rewards.push(0.0);
        for series in &mut self.agent_rewards {
            series.push(0.0);
        }
        for channels in &mut self.episode_errors {
            channels.iter_mut().for_each(|v| *v = 0.0);
        }
        self.episode_combined.iter_mut().for_each(|v| *v = 0.0);

        summary
    }

    /// Summarise the last `save_rate` completed episodes and zero the
    /// long-window error sums.
    pub fn take_window(&mut self, save_rate: usize, max_episode_len: usize) -> WindowSummary {
        let agent_means = (0..self.n_agents)
            .map(|agent| self.recent_agent_mean(agent, save_rate))
            .collect();

        let denom = (save_rate.max(1) * max_episode_len.max(1) * self.n_agents.max(1)) as f64;
        let mean_error = (0..self.error_channels)
            .map(|k| self.window_errors.iter().map(|agent| agent[k]).sum::<f64>() / denom)
            .collect();

        for channels in &mut self.window_errors {
            channels.iter_mut().for_each(|v| *v = 0.0);
        }

        WindowSummary {
            mean_reward: self.recent_mean_reward(save_rate),
            agent_means,
            mean_error,
        }
    }

    /// Number of completed episodes (series length minus the open slot).
    pub fn completed_episodes(&self) -> usize {
        self.episode_rewards.len() - 1
    }

    /// Combined reward series, open episode last.
    pub fn episode_rewards(&self) -> &[f64] {
        &self.episode_rewards
    }

    /// Reward series of one agent, open episode last.
    pub fn agent_rewards(&self, agent: usize) -> &[f64] {
        &self.agent_rewards[agent]
    }

    /// Running per-episode error sums.
    pub fn episode_errors(&self) -> &[Vec<f64>] {
        &self.episode_errors
    }

    /// Running long-window error sums.
    pub fn window_errors(&self) -> &[Vec<f64>] {
        &self.window_errors
    }

    /// Mean combined reward over the last `window` completed episodes.
    pub fn recent_mean_reward(&self, window: usize) -> f64 {
        recent_mean(&self.episode_rewards, window)
    }

    /// Mean reward of one agent over the last `window` completed episodes.
    pub fn recent_agent_mean(&self, agent: usize, window: usize) -> f64 {
        recent_mean(&self.agent_rewards[agent], window)
    }
}

/// Mean of the last `window` closed entries of a series whose final element
/// is the open slot.
fn recent_mean(series: &[f64], window: usize) -> f64 {
    let closed = &series[..series.len().saturating_sub(1)];
    let start = closed.len().saturating_sub(window);
    let tail = &closed[start..];
    if tail.is_empty() {
        0.0
    } else {
        tail.iter().sum::<f64>() / tail.len() as f64
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn errors(n: usize, value: f32) -> Vec<Vec<f32>> {
        vec![vec![value; 4]; n]
    }

    #[test]
    fn test_new_has_one_open_slot() {
        let acc = EpisodeAccumulator::new(3, 4);
        assert_eq!(acc.episode_rewards(), &[0.0]);
        for agent in 0..3 {
            assert_eq!(acc.agent_rewards(agent), &[0.0]);
        }
        assert_eq!(acc.completed_episodes(), 0);
    }

    #[test]
    fn test_record_step_adds_into_open_slot() {
        let mut acc = EpisodeAccumulator::new(2, 4);
        acc.record_step(&[1.0, 2.0], &[1.0, 2.0], &errors(2, 0.5));
        acc.record_step(&[0.5, -1.0], &[0.5, -1.0], &errors(2, 0.5));

        assert_eq!(acc.episode_rewards(), &[2.5]);
        assert_eq!(acc.agent_rewards(0), &[1.5]);
        assert_eq!(acc.agent_rewards(1), &[1.0]);
        assert_eq!(acc.episode_errors()[0], vec![1.0; 4]);
        assert_eq!(acc.window_errors()[1], vec![1.0; 4]);
    }

    #[test]
    fn test_close_episode_appends_zero_slot_and_resets_episode_errors() {
        let mut acc = EpisodeAccumulator::new(2, 4);
        acc.record_step(&[1.0, 1.0], &[1.0, 1.0], &errors(2, 2.0));
        let summary = acc.close_episode(2);

        assert_eq!(acc.episode_rewards(), &[2.0, 0.0]);
        assert_eq!(acc.agent_rewards(0), &[1.0, 0.0]);
        assert_eq!(acc.completed_episodes(), 1);
        for channels in acc.episode_errors() {
            assert!(channels.iter().all(|&v| v == 0.0));
        }
        // Window keeps accumulating across episodes.
        assert_eq!(acc.window_errors()[0], vec![2.0; 4]);

        assert_eq!(summary.errors, vec![vec![1.0; 4]; 2]);
        assert_eq!(summary.combined_reward, vec![0.5, 0.5]);
    }

    #[test]
    fn test_summary_is_rounded_to_four_decimals() {
        let mut acc = EpisodeAccumulator::new(1, 4);
        acc.record_step(&[1.0], &[1.0], &[vec![1.0, 2.0, 0.0, 0.0]]);
        let summary = acc.close_episode(3);
        assert_eq!(summary.combined_reward, vec![0.3333]);
        assert_eq!(summary.errors[0][1], 0.6667);
    }

    #[test]
    fn test_recent_mean_excludes_open_slot() {
        let mut acc = EpisodeAccumulator::new(1, 4);
        for reward in [1.0, 2.0, 3.0] {
            acc.record_step(&[reward], &[reward], &errors(1, 0.0));
            acc.close_episode(1);
        }
        acc.record_step(&[100.0], &[100.0], &errors(1, 0.0));

        assert!((acc.recent_mean_reward(2) - 2.5).abs() < 1e-9);
        assert!((acc.recent_mean_reward(10) - 2.0).abs() < 1e-9);
        assert!((acc.recent_agent_mean(0, 1) - 3.0).abs() < 1e-9);
    }

    #[test]
    fn test_recent_mean_without_completed_episodes_is_zero() {
        let acc = EpisodeAccumulator::new(2, 4);
        assert_eq!(acc.recent_mean_reward(5), 0.0);
    }

    #[test]
    fn test_take_window_averages_and_resets() {
        let mut acc = EpisodeAccumulator::new(2, 4);
        for _ in 0..2 {
            acc.record_step(&[1.0, 3.0], &[1.0, 3.0], &[vec![4.0, 0.0, 0.0, 8.0], vec![0.0, 0.0, 0.0, 0.0]]);
            acc.close_episode(1);
        }

        let window = acc.take_window(2, 1);
        assert!((window.mean_reward - 4.0).abs() < 1e-9);
        assert_eq!(window.agent_means, vec![1.0, 3.0]);
        // 8 position units over 2 episodes * 1 step * 2 agents
        assert_eq!(window.mean_error, vec![2.0, 0.0, 0.0, 4.0]);

        for channels in acc.window_errors() {
            assert!(channels.iter().all(|&v| v == 0.0));
        }
    }

    #[test]
    fn test_episode_errors_never_exceed_window_errors() {
        let mut acc = EpisodeAccumulator::new(2, 4);
        for step in 0..20 {
            acc.record_step(&[0.0, 0.0], &[0.0, 0.0], &errors(2, 0.25));
            if step % 3 == 2 {
                acc.close_episode(3);
                // Windows only roll over on an episode boundary.
                if acc.completed_episodes() % 2 == 0 {
                    acc.take_window(2, 3);
                }
            }
            for agent in 0..2 {
                for k in 0..4 {
                    assert!(acc.episode_errors()[agent][k] <= acc.window_errors()[agent][k] + 1e-12);
                }
            }
        }
    }

    #[test]
    fn test_round4() {
        assert_eq!(round4(0.123456), 0.1235);
        assert_eq!(round4(-0.00004), -0.0);
        assert_eq!(round4(2.0), 2.0);
    }
}
