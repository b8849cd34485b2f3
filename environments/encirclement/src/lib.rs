//! Multi-Agent Encirclement Scenario
//!
//! N kinematic point agents must surround a target at a fixed radius,
//! spread evenly around it, while circling at a reference angular rate.
//! Implements [`marl_train::MultiAgentEnv`].
//!
//! # Error channels
//!
//! Every step reports four diagnostics per agent, in this order:
//!
//! | # | Channel            | Meaning                                            |
//! |---|--------------------|----------------------------------------------------|
//! | 0 | position error     | distance from the ring                             |
//! | 1 | orientation error  | gap to the next agent minus `2π / n`               |
//! | 2 | angular-rate error | angular rate around the target minus the reference |
//! | 3 | collisions         | other agents within collision distance             |
//!
//! # Example
//!
//! ```rust,ignore
//! use encirclement::make_env;
//! use marl_train::MultiAgentEnv;
//!
//! let mut env = make_env("simple_encirclement", 42)?;
//! let obs = env.reset()?;
//! let step = env.step(&vec![vec![0.0, 0.0]; env.n_agents()])?;
//! ```

pub mod config;
pub mod render;
pub mod scenario;
pub mod world;

pub use config::{EncirclementConfig, ScenarioConfigError};
pub use scenario::Encirclement;
pub use world::{AgentBenchmark, WorldState, ERROR_CHANNELS};

use marl_train::EnvError;

/// Scenario names known to [`make_env`].
pub const SCENARIOS: &[&str] = &["simple_encirclement"];

/// Build a scenario by name with its default parameters.
pub fn make_env(name: &str, seed: u64) -> Result<Encirclement, EnvError> {
    match name {
        "simple_encirclement" => {
            let config = EncirclementConfig::default().with_seed(seed);
            log::debug!("Creating {} with {} agents", name, config.n_agents);
            Encirclement::new(config).map_err(|e| EnvError::UnknownScenario(format!("{}: {}", name, e)))
        }
        _ => Err(EnvError::UnknownScenario(name.to_string())),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use marl_train::MultiAgentEnv;

    #[test]
    fn test_registry() {
        for name in SCENARIOS {
            let env = make_env(name, 0).unwrap();
            assert_eq!(env.n_agents(), 4);
        }
        assert!(matches!(
            make_env("simple_spread", 0),
            Err(EnvError::UnknownScenario(name)) if name == "simple_spread"
        ));
    }

    #[test]
    fn test_benchmark_info_serializes() {
        let mut env = make_env("simple_encirclement", 5).unwrap();
        env.reset().unwrap();
        let step = env.step(&vec![vec![0.1, 0.1]; 4]).unwrap();
        let json = serde_json::to_string(&step.infos).unwrap();
        let back: Vec<AgentBenchmark> = serde_json::from_str(&json).unwrap();
        assert_eq!(back.len(), 4);
        assert_eq!(back[2].collisions, step.infos[2].collisions);
    }
}
