//! The training loop controller.
//!
//! One [`TrainingLoop`] drives one environment and one trainer per agent
//! through global steps. Each step:
//!
//! 1. asks every trainer for an action, in agent order;
//! 2. steps the environment once with the full action vector;
//! 3. feeds rewards and errors to the accumulator and one transition to
//!    every trainer;
//! 4. on DONE or TERMINAL, closes the episode (reset, new reward slots,
//!    telemetry);
//! 5. dispatches on the run mode: BENCHMARK captures info and may stop,
//!    DISPLAY renders, TRAIN updates every trainer and may checkpoint.
//!
//! ```text
//!          ┌──────────┐  actions   ┌─────────────┐
//!          │ trainers │──────────► │ environment │
//!          └────▲─────┘            └──────┬──────┘
//!    experience │                         │ rewards, dones, errors
//!               │      ┌─────────────┐    │
//!               └──────│ controller  │◄───┘
//!                      └──┬───────┬──┘
//!            boundary     │       │ save-rate window
//!        ┌────────────────▼┐   ┌──▼──────────────────┐
//!        │ TelemetryWriter │   │ CheckpointManager   │
//!        │ (own thread)    │   │ TrainingCurves      │
//!        └─────────────────┘   └─────────────────────┘
//! ```

use std::time::{Duration, Instant};

use crate::accumulator::{EpisodeAccumulator, WindowSummary};
use crate::benchmark::BenchmarkLog;
use crate::checkpoint::{self, CheckpointInfo, CheckpointManager, CheckpointManagerConfig};
use crate::config::{ExperimentPaths, TrainingConfig};
use crate::core::{AgentTransition, EpisodeState, RunMode};
use crate::curves::TrainingCurves;
use crate::environment::{validate_observations, MultiAgentEnv};
use crate::error::LoopError;
use crate::telemetry::{TelemetryError, TelemetryWriter};
use crate::trainer::{update_roster, AgentTrainer};

/// Why the loop stopped.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StopReason {
    /// TRAIN mode completed its episode budget.
    EpisodeBudgetReached,
    /// BENCHMARK mode crossed its step budget on an episode boundary.
    BenchmarkComplete,
}

/// What happened during one global step.
#[derive(Debug, Clone, PartialEq)]
pub struct StepOutcome {
    /// Episode state produced by this step.
    pub state: EpisodeState,
    /// Global step count after this step.
    pub global_step: usize,
    /// Episodes completed in this process after this step.
    pub episode_index: usize,
    /// Losses of trainers that took a learning step, by agent index.
    pub losses: Vec<(usize, f32)>,
    /// Checkpoint written on this step.
    pub checkpoint: Option<CheckpointInfo>,
    /// Set when the loop should stop.
    pub stop: Option<StopReason>,
}

/// Totals reported when the loop stops.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RunSummary {
    /// Why the loop stopped.
    pub reason: StopReason,
    /// Episodes completed in this process.
    pub episodes: usize,
    /// Absolute completed episodes, resumed base included.
    pub total_episodes: usize,
    /// Global steps taken.
    pub global_steps: usize,
    /// Telemetry records that failed to reach disk.
    pub telemetry_failures: usize,
}

/// Loop parameters copied out of the configuration.
#[derive(Debug, Clone)]
struct LoopSettings {
    max_episode_len: usize,
    num_episodes: usize,
    save_rate: usize,
    num_adversaries: usize,
    benchmark_iters: usize,
    telemetry_offset: usize,
    display_delay: Duration,
}

impl LoopSettings {
    fn from_config(config: &TrainingConfig) -> Self {
        Self {
            max_episode_len: config.max_episode_len,
            num_episodes: config.num_episodes,
            save_rate: config.save_rate,
            num_adversaries: config.num_adversaries,
            benchmark_iters: config.benchmark_iters,
            telemetry_offset: config.telemetry_offset,
            display_delay: Duration::from_millis(config.display_delay_ms),
        }
    }
}

/// Drives the environment and the trainer roster.
pub struct TrainingLoop<E: MultiAgentEnv, T: AgentTrainer> {
    env: E,
    trainers: Vec<T>,
    mode: RunMode,
    settings: LoopSettings,
    paths: ExperimentPaths,
    n_agents: usize,
    error_channels: usize,

    observations: Vec<Vec<f32>>,
    step_index: usize,
    episode_index: usize,
    global_step: usize,
    resume_index: usize,

    accumulator: EpisodeAccumulator,
    benchmark: BenchmarkLog<E::Info>,
    curves: TrainingCurves,
    pending_window: Option<WindowSummary>,

    telemetry: Option<TelemetryWriter>,
    checkpoints: Option<CheckpointManager>,
    telemetry_failures: usize,

    window_started: Instant,
    running_time: Duration,
}

impl<E: MultiAgentEnv, T: AgentTrainer> TrainingLoop<E, T> {
    /// Validate the configuration, restore trainers when required, open the
    /// mode's outputs and reset the environment.
    pub fn new(mut env: E, mut trainers: Vec<T>, config: &TrainingConfig) -> Result<Self, LoopError> {
        config.validate()?;
        let mode = config.run_mode()?;
        let settings = LoopSettings::from_config(config);
        let paths = config.paths();

        let n_agents = env.n_agents();
        if trainers.len() != n_agents {
            return Err(LoopError::RosterSize {
                expected: n_agents,
                actual: trainers.len(),
            });
        }
        let error_channels = env.error_channels();

        // Episode numbering only continues when resuming; display and
        // benchmark load weights but count from zero.
        let resume_index = if config.restore || mode.requires_restore() {
            log::info!("Loading previous state from {}", paths.load_dir.display());
            let record = checkpoint::load_latest(&paths.load_dir, &mut trainers)?;
            if config.restore {
                record.episode_index
            } else {
                0
            }
        } else {
            0
        };

        let curves = if mode.is_training() && config.restore {
            TrainingCurves::load_or_default(&paths)?
        } else {
            TrainingCurves::new()
        };

        let telemetry = if mode.writes_telemetry() {
            Some(TelemetryWriter::spawn(&paths, n_agents, config.telemetry_queue)?)
        } else {
            None
        };

        let checkpoints = if mode.is_training() {
            let manager_config = CheckpointManagerConfig::new(&paths.checkpoint_dir)
                .with_keep_last_n(config.keep_last_checkpoints);
            Some(CheckpointManager::new(manager_config)?)
        } else {
            None
        };

        let observations = env.reset()?;
        validate_observations(&observations, n_agents)?;

        log::info!(
            "Starting iterations: mode {}, {} agents, resume index {}",
            mode,
            n_agents,
            resume_index
        );

        Ok(Self {
            env,
            trainers,
            mode,
            settings,
            paths,
            n_agents,
            error_channels,
            observations,
            step_index: 0,
            episode_index: 0,
            global_step: 0,
            resume_index,
            accumulator: EpisodeAccumulator::new(n_agents, error_channels),
            benchmark: BenchmarkLog::new(n_agents),
            curves,
            pending_window: None,
            telemetry,
            checkpoints,
            telemetry_failures: 0,
            window_started: Instant::now(),
            running_time: Duration::ZERO,
        })
    }

    /// Run one global step.
    pub fn step(&mut self) -> Result<StepOutcome, LoopError> {
        let actions = self
            .trainers
            .iter_mut()
            .zip(&self.observations)
            .map(|(trainer, obs)| trainer.action(obs))
            .collect::<Result<Vec<_>, _>>()?;

        let result = self.env.step(&actions)?;
        result.validate(self.n_agents, self.error_channels)?;

        self.step_index += 1;
        let terminal = self.step_index >= self.settings.max_episode_len;
        let state = EpisodeState::from_flags(result.all_done(), terminal);

        self.accumulator
            .record_step(&result.rewards, &result.combined_reward, &result.errors);

        let previous = std::mem::replace(&mut self.observations, result.observations.clone());
        for (i, ((trainer, obs), action)) in self.trainers.iter_mut().zip(previous).zip(actions).enumerate() {
            trainer.experience(AgentTransition::new(
                obs,
                action,
                result.rewards[i],
                result.observations[i].clone(),
                result.dones[i],
                terminal,
            ))?;
        }

        if self.mode == RunMode::Benchmark {
            self.benchmark.record(&result.infos);
        }

        if state.is_boundary() {
            self.finish_episode()?;
        }
        self.global_step += 1;

        let mut outcome = StepOutcome {
            state,
            global_step: self.global_step,
            episode_index: self.episode_index,
            losses: Vec::new(),
            checkpoint: None,
            stop: None,
        };

        match self.mode {
            RunMode::Benchmark => {
                if state.is_boundary() && self.global_step > self.settings.benchmark_iters {
                    log::info!("Finished benchmarking, now saving...");
                    self.benchmark.persist(&self.paths.benchmark_file)?;
                    self.flush_telemetry();
                    outcome.stop = Some(StopReason::BenchmarkComplete);
                }
            }
            RunMode::Display => {
                if !self.settings.display_delay.is_zero() {
                    std::thread::sleep(self.settings.display_delay);
                }
                self.env.render()?;
            }
            RunMode::Train => {
                outcome.losses = update_roster(&mut self.trainers, self.global_step)?;

                if let Some(window) = self.pending_window.take() {
                    outcome.checkpoint = self.save_window(window)?;
                }

                if self.episode_index >= self.settings.num_episodes {
                    self.curves.save(&self.paths)?;
                    self.flush_telemetry();
                    log::info!(
                        "...Finished total of {} episodes.",
                        self.resume_index + self.episode_index
                    );
                    outcome.stop = Some(StopReason::EpisodeBudgetReached);
                }
            }
        }

        Ok(outcome)
    }

    /// Step until a stop condition fires. DISPLAY mode never stops on its own.
    pub fn run(&mut self) -> Result<RunSummary, LoopError> {
        loop {
            if let Some(reason) = self.step()?.stop {
                return Ok(RunSummary {
                    reason,
                    episodes: self.episode_index,
                    total_episodes: self.resume_index + self.episode_index,
                    global_steps: self.global_step,
                    telemetry_failures: self.telemetry_failures,
                });
            }
        }
    }

    /// Episode boundary: reset, open new slots, emit telemetry, and roll the
    /// long window every `save_rate` episodes.
    fn finish_episode(&mut self) -> Result<(), LoopError> {
        let observations = self.env.reset()?;
        validate_observations(&observations, self.n_agents)?;
        self.observations = observations;
        self.step_index = 0;

        let summary = self.accumulator.close_episode(self.settings.max_episode_len);
        if self.mode == RunMode::Benchmark {
            self.benchmark.open_episode();
        }
        self.episode_index += 1;

        let x = self.resume_index + self.episode_index + self.settings.telemetry_offset;
        let sent = self.telemetry.as_ref().map(|t| t.record_episode(summary, x));
        if let Some(Err(e)) = sent {
            self.note_telemetry_failure(e);
        }
        self.collect_telemetry_failures();

        if self.episode_index % self.settings.save_rate == 0 {
            let window = self
                .accumulator
                .take_window(self.settings.save_rate, self.settings.max_episode_len);
            if self.mode.is_training() {
                self.pending_window = Some(window);
            }
        }
        Ok(())
    }

    /// Save-rate boundary in TRAIN mode: flush telemetry, checkpoint, log the
    /// window and extend the curves.
    fn save_window(&mut self, window: WindowSummary) -> Result<Option<CheckpointInfo>, LoopError> {
        self.flush_telemetry();

        let absolute = self.resume_index + self.episode_index;
        let checkpoint = match self.checkpoints.as_mut() {
            Some(manager) => {
                let info = manager.save(&self.trainers, absolute)?;
                log::debug!("Saved checkpoint {}", info.path.display());
                Some(info)
            }
            None => None,
        };

        let window_time = self.window_started.elapsed();
        self.running_time += window_time;
        self.window_started = Instant::now();

        if self.settings.num_adversaries == 0 {
            log::info!(
                "steps: {}, episodes: {}, mean episode reward: {:.2}, episode time: {:.2}, running time {:.2}",
                self.global_step,
                absolute,
                window.mean_reward,
                window_time.as_secs_f64(),
                self.running_time.as_secs_f64()
            );
        } else {
            log::info!(
                "steps: {}, episodes: {}, mean episode reward: {:.4}, agent episode reward: {:?}, time: {:.3}",
                self.global_step,
                absolute,
                window.mean_reward,
                window.agent_means,
                window_time.as_secs_f64()
            );
        }

        self.curves.push_window(&window);
        Ok(checkpoint)
    }

    fn flush_telemetry(&mut self) {
        let flushed = self.telemetry.as_ref().map(TelemetryWriter::flush);
        if let Some(Err(e)) = flushed {
            self.note_telemetry_failure(e);
        }
        self.collect_telemetry_failures();
    }

    fn collect_telemetry_failures(&mut self) {
        let failures = match &self.telemetry {
            Some(telemetry) => telemetry.take_failures(),
            None => return,
        };
        // Already logged on the writer thread.
        self.telemetry_failures += failures.len();
    }

    fn note_telemetry_failure(&mut self, error: TelemetryError) {
        log::warn!("telemetry: {}", error);
        self.telemetry_failures += 1;
    }

    /// Run mode.
    pub fn mode(&self) -> RunMode {
        self.mode
    }

    /// Steps taken in the current episode.
    pub fn step_index(&self) -> usize {
        self.step_index
    }

    /// Episodes completed in this process.
    pub fn episode_index(&self) -> usize {
        self.episode_index
    }

    /// Global steps taken.
    pub fn global_step(&self) -> usize {
        self.global_step
    }

    /// Episode count restored from the latest checkpoint.
    pub fn resume_index(&self) -> usize {
        self.resume_index
    }

    /// Reward and error bookkeeping.
    pub fn accumulator(&self) -> &EpisodeAccumulator {
        &self.accumulator
    }

    /// Training curves collected so far.
    pub fn curves(&self) -> &TrainingCurves {
        &self.curves
    }

    /// Benchmark info captured so far.
    pub fn benchmark_log(&self) -> &BenchmarkLog<E::Info> {
        &self.benchmark
    }

    /// The trainer roster.
    pub fn trainers(&self) -> &[T] {
        &self.trainers
    }

    /// The environment.
    pub fn env(&self) -> &E {
        &self.env
    }

    /// Checkpoints written or found by this run.
    pub fn checkpoint_history(&self) -> &[CheckpointInfo] {
        self.checkpoints
            .as_ref()
            .map(CheckpointManager::history)
            .unwrap_or(&[])
    }

    /// Telemetry records that failed to reach disk.
    pub fn telemetry_failures(&self) -> usize {
        self.telemetry_failures
    }

    /// Every path the run reads or writes.
    pub fn paths(&self) -> &ExperimentPaths {
        &self.paths
    }
}
