//! MADDPG / DDPG trainer.
//!
//! Each agent owns a deterministic actor and a Q critic, plus slowly moving
//! target copies of both. With a centralised critic (MADDPG) the critic sees
//! every agent's observation and action; the target action of every peer is
//! produced by that peer's own target actor. With a local critic (DDPG) the
//! critic only sees the agent's own observation and action.
//!
//! Learning starts once the replay buffer holds `batch_size * max_episode_len`
//! transitions and then runs every `update_every` global steps.

use std::path::Path;

use burn::grad_clipping::GradientClippingConfig;
use burn::module::Module;
use burn::optim::adaptor::OptimizerAdaptor;
use burn::optim::{Adam, AdamConfig, GradientsParams, Optimizer};
use burn::prelude::*;
use burn::record::{BinFileRecorder, FullPrecisionSettings};
use burn::tensor::activation::softmax;
use burn::tensor::backend::AutodiffBackend;
use burn::tensor::ElementConversion;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use rand_distr::{Distribution, Normal};

use super::replay::{ReplayBuffer, StoredTransition};
use super::{roster_split, AgentTrainer, Peers, TrainerError};
use crate::config::TrainingConfig;
use crate::core::AgentTransition;
use crate::environment::ActionSpace;
use crate::policy::{soft_update, MlpConfig, MlpModel};

const ACTOR_FILE: &str = "actor";
const CRITIC_FILE: &str = "critic";
const TARGET_ACTOR_FILE: &str = "target_actor";
const TARGET_CRITIC_FILE: &str = "target_critic";

/// Hyperparameters for one MADDPG agent.
#[derive(Debug, Clone, PartialEq)]
pub struct MaddpgConfig {
    /// Adam learning rate for actor and critic.
    pub lr: f64,
    /// Discount factor.
    pub gamma: f32,
    /// Minibatch size.
    pub batch_size: usize,
    /// Hidden layer width.
    pub num_units: usize,
    /// Episode length cap, used for the warm-up threshold.
    pub max_episode_len: usize,
    /// Polyak factor for target networks.
    pub tau: f32,
    /// Replay capacity in transitions.
    pub buffer_capacity: usize,
    /// Global steps between learning steps.
    pub update_every: usize,
    /// Std of the Gaussian exploration noise on squashed actions.
    pub exploration_std: f32,
    /// Gradient norm clip.
    pub grad_clip_norm: f32,
    /// Weight of the squared pre-activation penalty on the actor.
    pub actor_reg: f32,
    /// Seed for sampling and exploration.
    pub seed: u64,
}

impl Default for MaddpgConfig {
    fn default() -> Self {
        Self::from_training(&TrainingConfig::default())
    }
}

impl MaddpgConfig {
    /// Take the shared hyperparameters from a training configuration.
    pub fn from_training(config: &TrainingConfig) -> Self {
        Self {
            lr: config.lr,
            gamma: config.gamma,
            batch_size: config.batch_size,
            num_units: config.num_units,
            max_episode_len: config.max_episode_len,
            tau: 0.01,
            buffer_capacity: 1_000_000,
            update_every: 100,
            exploration_std: 0.1,
            grad_clip_norm: 0.5,
            actor_reg: 1e-3,
            seed: config.seed,
        }
    }

    /// Transitions required before the first learning step.
    pub fn min_replay(&self) -> usize {
        self.batch_size * self.max_episode_len
    }

    /// Set the minibatch size.
    pub fn with_batch_size(mut self, batch_size: usize) -> Self {
        self.batch_size = batch_size;
        self
    }

    /// Set the episode length cap.
    pub fn with_max_episode_len(mut self, len: usize) -> Self {
        self.max_episode_len = len;
        self
    }

    /// Set the hidden layer width.
    pub fn with_num_units(mut self, units: usize) -> Self {
        self.num_units = units;
        self
    }

    /// Set the learning-step period.
    pub fn with_update_every(mut self, steps: usize) -> Self {
        self.update_every = steps;
        self
    }

    /// Set the replay capacity.
    pub fn with_buffer_capacity(mut self, capacity: usize) -> Self {
        self.buffer_capacity = capacity;
        self
    }

    /// Set the exploration noise std.
    pub fn with_exploration_std(mut self, std: f32) -> Self {
        self.exploration_std = std;
        self
    }

    /// Set the seed.
    pub fn with_seed(mut self, seed: u64) -> Self {
        self.seed = seed;
        self
    }

    fn optimizer_config(&self) -> AdamConfig {
        AdamConfig::new().with_grad_clipping(Some(GradientClippingConfig::Norm(self.grad_clip_norm)))
    }
}

type ModelOptimizer<B> = OptimizerAdaptor<Adam, MlpModel<B>, B>;

/// One agent's actor, critic and replay buffer.
pub struct MaddpgTrainer<B: AutodiffBackend> {
    name: String,
    index: usize,
    local_critic: bool,
    observation_sizes: Vec<usize>,
    action_spaces: Vec<ActionSpace>,
    config: MaddpgConfig,
    actor: MlpModel<B>,
    critic: MlpModel<B>,
    target_actor: MlpModel<B>,
    target_critic: MlpModel<B>,
    actor_optim: ModelOptimizer<B>,
    critic_optim: ModelOptimizer<B>,
    replay: ReplayBuffer,
    sample_index: Option<Vec<usize>>,
    noise: Normal<f32>,
    rng: StdRng,
    device: B::Device,
}

impl<B: AutodiffBackend> MaddpgTrainer<B> {
    /// Build the trainer of agent `index`.
    ///
    /// `observation_sizes` and `action_spaces` describe the whole roster, in
    /// agent order.
    pub fn new(
        name: impl Into<String>,
        index: usize,
        observation_sizes: Vec<usize>,
        action_spaces: Vec<ActionSpace>,
        local_critic: bool,
        config: MaddpgConfig,
        device: &B::Device,
    ) -> Result<Self, TrainerError> {
        if action_spaces.len() != observation_sizes.len() {
            return Err(TrainerError::ShapeMismatch {
                what: "action spaces",
                expected: observation_sizes.len(),
                actual: action_spaces.len(),
            });
        }
        if index >= observation_sizes.len() {
            return Err(TrainerError::MissingPeer(index));
        }

        let obs_dim = observation_sizes[index];
        let act_dim = action_spaces[index].dim();
        let critic_input = if local_critic {
            obs_dim + act_dim
        } else {
            observation_sizes.iter().sum::<usize>() + action_spaces.iter().map(ActionSpace::dim).sum::<usize>()
        };

        let actor_config = MlpConfig::new(obs_dim, act_dim).with_num_units(config.num_units);
        let critic_config = MlpConfig::new(critic_input, 1).with_num_units(config.num_units);

        let noise = Normal::new(0.0, config.exploration_std).map_err(|e| TrainerError::Noise(e.to_string()))?;

        Ok(Self {
            name: name.into(),
            index,
            local_critic,
            actor: actor_config.init(device),
            critic: critic_config.init(device),
            target_actor: actor_config.init(device),
            target_critic: critic_config.init(device),
            actor_optim: config.optimizer_config().init(),
            critic_optim: config.optimizer_config().init(),
            replay: ReplayBuffer::new(config.buffer_capacity),
            sample_index: None,
            noise,
            rng: StdRng::seed_from_u64(config.seed),
            device: device.clone(),
            observation_sizes,
            action_spaces,
            config,
        })
    }

    /// Roster index of this agent.
    pub fn index(&self) -> usize {
        self.index
    }

    /// Whether the critic is local (DDPG) rather than centralised.
    pub fn local_critic(&self) -> bool {
        self.local_critic
    }

    /// Stored transitions.
    pub fn replay_len(&self) -> usize {
        self.replay.len()
    }

    /// Indices sampled by the last learning step of this round.
    pub fn sample_index(&self) -> Option<&[usize]> {
        self.sample_index.as_deref()
    }

    /// Hyperparameters.
    pub fn config(&self) -> &MaddpgConfig {
        &self.config
    }

    fn own_space(&self) -> &ActionSpace {
        &self.action_spaces[self.index]
    }

    /// Deterministic target-policy actions for a batch of observations.
    fn target_actions(&self, observations: Tensor<B, 2>) -> Tensor<B, 2> {
        squash(self.own_space(), self.target_actor.forward(observations)).detach()
    }

    fn critic_input(&self, observations: &[Tensor<B, 2>], actions: &[Tensor<B, 2>]) -> Tensor<B, 2> {
        if self.local_critic {
            Tensor::cat(
                vec![observations[self.index].clone(), actions[self.index].clone()],
                1,
            )
        } else {
            let parts = observations.iter().chain(actions.iter()).cloned().collect();
            Tensor::cat(parts, 1)
        }
    }

    fn check_len(what: &'static str, expected: usize, actual: usize) -> Result<(), TrainerError> {
        if expected == actual {
            Ok(())
        } else {
            Err(TrainerError::ShapeMismatch {
                what,
                expected,
                actual,
            })
        }
    }

    fn explore(&mut self, raw: Vec<f32>) -> Vec<f32> {
        match self.action_spaces[self.index].clone() {
            space @ ActionSpace::Continuous { .. } => raw
                .into_iter()
                .map(|x| {
                    let noisy = x.tanh() + self.noise.sample(&mut self.rng);
                    space.scale(noisy.clamp(-1.0, 1.0))
                })
                .collect(),
            ActionSpace::Discrete(_) => {
                // Gumbel-softmax sample over the logits.
                let perturbed: Vec<f32> = raw
                    .into_iter()
                    .map(|logit| {
                        let u: f32 = self.rng.gen_range(f32::EPSILON..1.0);
                        logit - (-u.ln()).ln()
                    })
                    .collect();
                let max = perturbed.iter().copied().fold(f32::NEG_INFINITY, f32::max);
                let exp: Vec<f32> = perturbed.iter().map(|v| (v - max).exp()).collect();
                let sum: f32 = exp.iter().sum();
                exp.into_iter().map(|v| v / sum).collect()
            }
        }
    }

    fn record_path(dir: &Path, file: &str) -> std::path::PathBuf {
        dir.join(file)
    }
}

/// Map raw network outputs into the action space of `space`.
fn squash<B: Backend>(space: &ActionSpace, raw: Tensor<B, 2>) -> Tensor<B, 2> {
    match space {
        ActionSpace::Continuous { low, high, .. } => raw
            .tanh()
            .add_scalar(1.0)
            .mul_scalar(0.5 * (high - low))
            .add_scalar(*low),
        ActionSpace::Discrete(_) => softmax(raw, 1),
    }
}

fn batch_tensor<B: Backend>(data: &[f32], rows: usize, cols: usize, device: &B::Device) -> Tensor<B, 2> {
    Tensor::<B, 1>::from_floats(data, device).reshape([rows, cols])
}

impl<B: AutodiffBackend> AgentTrainer for MaddpgTrainer<B> {
    fn name(&self) -> &str {
        &self.name
    }

    fn action(&mut self, observation: &[f32]) -> Result<Vec<f32>, TrainerError> {
        let obs_dim = self.observation_sizes[self.index];
        Self::check_len("observation", obs_dim, observation.len())?;

        let input = batch_tensor::<B>(observation, 1, obs_dim, &self.device);
        let raw = self
            .actor
            .forward(input)
            .detach()
            .into_data()
            .to_vec::<f32>()
            .map_err(|e| TrainerError::Tensor(format!("{:?}", e)))?;

        Ok(self.explore(raw))
    }

    fn experience(&mut self, transition: AgentTransition) -> Result<(), TrainerError> {
        let obs_dim = self.observation_sizes[self.index];
        Self::check_len("observation", obs_dim, transition.observation.len())?;
        Self::check_len("next observation", obs_dim, transition.next_observation.len())?;
        Self::check_len("action", self.own_space().dim(), transition.action.len())?;

        self.replay.push(StoredTransition {
            observation: transition.observation,
            action: transition.action,
            reward: transition.reward,
            next_observation: transition.next_observation,
            done: transition.done,
        });
        Ok(())
    }

    fn preupdate(&mut self) {
        self.sample_index = None;
    }

    fn update(&mut self, peers: Peers<'_, Self>, global_step: usize) -> Result<Option<f32>, TrainerError> {
        if self.replay.len() < self.config.min_replay() {
            return Ok(None);
        }
        if global_step % self.config.update_every.max(1) != 0 {
            return Ok(None);
        }

        // One shared index only works if every buffer holds the same steps.
        if let Some((_, peer)) = peers.iter().find(|(_, p)| p.replay.len() != self.replay.len()) {
            return Err(TrainerError::ShapeMismatch {
                what: "peer replay length",
                expected: self.replay.len(),
                actual: peer.replay.len(),
            });
        }

        let index = self.replay.make_index(self.config.batch_size, &mut self.rng);
        let rows = index.len();
        if rows == 0 {
            return Ok(None);
        }

        let n = peers.roster_len();
        let mut obs_n = Vec::with_capacity(n);
        let mut act_n = Vec::with_capacity(n);
        let mut next_obs_n = Vec::with_capacity(n);
        let mut target_act_n = Vec::with_capacity(n);
        let mut own = None;

        for j in 0..n {
            let trainer: &Self = if j == self.index {
                &*self
            } else {
                peers.get(j).ok_or(TrainerError::MissingPeer(j))?
            };
            let batch = trainer.replay.gather(&index)?;
            let obs_dim = self.observation_sizes[j];
            let act_dim = self.action_spaces[j].dim();

            let obs = batch_tensor::<B>(&batch.observations, rows, obs_dim, &self.device);
            let next_obs = batch_tensor::<B>(&batch.next_observations, rows, obs_dim, &self.device);
            let act = batch_tensor::<B>(&batch.actions, rows, act_dim, &self.device);

            target_act_n.push(trainer.target_actions(next_obs.clone()));
            if j == self.index {
                own = Some((
                    batch_tensor::<B>(&batch.rewards, rows, 1, &self.device),
                    batch_tensor::<B>(&batch.dones, rows, 1, &self.device),
                ));
            }
            obs_n.push(obs);
            act_n.push(act);
            next_obs_n.push(next_obs);
        }
        let (rewards, dones) = own.ok_or(TrainerError::MissingPeer(self.index))?;

        // Critic: regress Q(s, a) onto r + γ (1 - done) Q'(s', μ'(s')).
        let target_q_next = self
            .target_critic
            .forward(self.critic_input(&next_obs_n, &target_act_n))
            .detach();
        let not_done = dones.mul_scalar(-1.0).add_scalar(1.0);
        let target_q = rewards + not_done * target_q_next.mul_scalar(self.config.gamma);

        let q = self.critic.forward(self.critic_input(&obs_n, &act_n));
        let critic_loss = (q - target_q.detach()).powf_scalar(2.0).mean();
        let critic_loss_value: f32 = critic_loss.clone().into_scalar().elem();

        let grads = critic_loss.backward();
        let grads = GradientsParams::from_grads(grads, &self.critic);
        self.critic = self.critic_optim.step(self.config.lr, self.critic.clone(), grads);

        // Actor: ascend Q with this agent's action replaced by μ(s).
        let raw = self.actor.forward(obs_n[self.index].clone());
        let mut policy_act_n = act_n;
        policy_act_n[self.index] = squash(self.own_space(), raw.clone());

        let q_policy = self.critic.forward(self.critic_input(&obs_n, &policy_act_n));
        let actor_loss = q_policy.mean().mul_scalar(-1.0)
            + raw.powf_scalar(2.0).mean().mul_scalar(self.config.actor_reg);

        let grads = actor_loss.backward();
        let grads = GradientsParams::from_grads(grads, &self.actor);
        self.actor = self.actor_optim.step(self.config.lr, self.actor.clone(), grads);

        self.target_critic = soft_update::<B, _>(&self.critic, self.target_critic.clone(), self.config.tau);
        self.target_actor = soft_update::<B, _>(&self.actor, self.target_actor.clone(), self.config.tau);

        self.sample_index = Some(index);
        Ok(Some(critic_loss_value))
    }

    fn save(&self, dir: &Path) -> Result<(), TrainerError> {
        std::fs::create_dir_all(dir)?;
        let recorder = BinFileRecorder::<FullPrecisionSettings>::new();
        for (file, model) in [
            (ACTOR_FILE, &self.actor),
            (CRITIC_FILE, &self.critic),
            (TARGET_ACTOR_FILE, &self.target_actor),
            (TARGET_CRITIC_FILE, &self.target_critic),
        ] {
            let path = Self::record_path(dir, file);
            model
                .clone()
                .save_file(&path, &recorder)
                .map_err(|e| TrainerError::Record {
                    path,
                    reason: e.to_string(),
                })?;
        }
        Ok(())
    }

    fn load(&mut self, dir: &Path) -> Result<(), TrainerError> {
        let recorder = BinFileRecorder::<FullPrecisionSettings>::new();
        let load = |model: &MlpModel<B>, file: &str| {
            let path = Self::record_path(dir, file);
            model
                .clone()
                .load_file(&path, &recorder, &self.device)
                .map_err(|e| TrainerError::Record {
                    path,
                    reason: e.to_string(),
                })
        };

        let actor = load(&self.actor, ACTOR_FILE)?;
        let critic = load(&self.critic, CRITIC_FILE)?;
        let target_actor = load(&self.target_actor, TARGET_ACTOR_FILE)?;
        let target_critic = load(&self.target_critic, TARGET_CRITIC_FILE)?;

        self.actor = actor;
        self.critic = critic;
        self.target_actor = target_actor;
        self.target_critic = target_critic;
        Ok(())
    }
}

/// Build one trainer per agent, adversaries first.
///
/// The first `min(num_adversaries, n)` agents use `adv_policy`, the rest use
/// `good_policy`. Trainer `i` is named `agent_<i>`.
pub fn build_trainers<B: AutodiffBackend>(
    observation_sizes: &[usize],
    action_spaces: &[ActionSpace],
    config: &TrainingConfig,
    device: &B::Device,
) -> Result<Vec<MaddpgTrainer<B>>, TrainerError> {
    let n = observation_sizes.len();
    let (adversaries, _) = roster_split(n, config.num_adversaries);
    let base = MaddpgConfig::from_training(config);

    log::info!(
        "Using good policy {} and adv policy {}",
        config.good_policy,
        config.adv_policy
    );

    (0..n)
        .map(|i| {
            let family = if i < adversaries {
                config.adv_policy
            } else {
                config.good_policy
            };
            MaddpgTrainer::new(
                format!("agent_{}", i),
                i,
                observation_sizes.to_vec(),
                action_spaces.to_vec(),
                family.uses_local_critic(),
                base.clone().with_seed(config.seed.wrapping_add(i as u64)),
                device,
            )
        })
        .collect()
}
