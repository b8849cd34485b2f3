//! Scenario parameters and their builder.

use thiserror::Error;

/// Invalid scenario parameter.
#[derive(Debug, Error, PartialEq)]
pub enum ScenarioConfigError {
    /// A count parameter must be positive.
    #[error("{field} must be > 0, got {value}")]
    InvalidCount { field: &'static str, value: usize },
    /// A length or rate must be strictly positive and finite.
    #[error("{field} must be positive and finite, got {value}")]
    NonPositive { field: &'static str, value: f32 },
    /// The ring does not fit inside the arena.
    #[error("radius {radius} does not fit in arena half-width {half_width}")]
    RingOutsideArena { radius: f32, half_width: f32 },
}

// ============================================================================
// Encirclement Configuration
// ============================================================================

/// Configuration for the encirclement scenario.
///
/// # Example
/// ```ignore
/// let config = EncirclementConfig::new(6)
///     .with_radius(1.5)
///     .with_angular_rate(0.3)
///     .with_seed(7);
/// ```
#[derive(Clone, Debug, PartialEq)]
pub struct EncirclementConfig {
    /// Number of agents on the ring.
    pub n_agents: usize,
    /// Target position [x, y].
    pub target: [f32; 2],
    /// Desired distance from the target.
    pub radius: f32,
    /// Reference angular rate around the target (rad/s, counter-clockwise).
    pub angular_rate: f32,
    /// Integration step (s).
    pub dt: f32,
    /// Speed reached at full action.
    pub max_speed: f32,
    /// Agents leaving `[-half_width, half_width]²` around the origin are done.
    pub arena_half_width: f32,
    /// Spawn positions are uniform in `[-spawn_spread, spawn_spread]²`.
    pub spawn_spread: f32,
    /// Two agents closer than this count as colliding.
    pub collision_distance: f32,
    /// Reward penalty per collision.
    pub collision_penalty: f32,
    /// Seed for spawn positions.
    pub seed: u64,
}

impl Default for EncirclementConfig {
    fn default() -> Self {
        Self {
            n_agents: 4,
            target: [0.0, 0.0],
            radius: 1.0,
            angular_rate: 0.5,
            dt: 0.1,
            max_speed: 1.0,
            arena_half_width: 3.0,
            spawn_spread: 1.5,
            collision_distance: 0.15,
            collision_penalty: 1.0,
            seed: 0,
        }
    }
}

impl EncirclementConfig {
    /// Default parameters for `n_agents` agents.
    pub fn new(n_agents: usize) -> Self {
        Self {
            n_agents,
            ..Self::default()
        }
    }

    /// Set the target position.
    pub fn with_target(mut self, target: [f32; 2]) -> Self {
        self.target = target;
        self
    }

    /// Set the ring radius.
    pub fn with_radius(mut self, radius: f32) -> Self {
        self.radius = radius;
        self
    }

    /// Set the reference angular rate.
    pub fn with_angular_rate(mut self, rate: f32) -> Self {
        self.angular_rate = rate;
        self
    }

    /// Set the integration step.
    pub fn with_dt(mut self, dt: f32) -> Self {
        self.dt = dt;
        self
    }

    /// Set the speed reached at full action.
    pub fn with_max_speed(mut self, speed: f32) -> Self {
        self.max_speed = speed;
        self
    }

    /// Set the arena half-width.
    pub fn with_arena_half_width(mut self, half_width: f32) -> Self {
        self.arena_half_width = half_width;
        self
    }

    /// Set the spawn spread.
    pub fn with_spawn_spread(mut self, spread: f32) -> Self {
        self.spawn_spread = spread;
        self
    }

    /// Set collision distance and penalty.
    pub fn with_collisions(mut self, distance: f32, penalty: f32) -> Self {
        self.collision_distance = distance;
        self.collision_penalty = penalty;
        self
    }

    /// Set the spawn seed.
    pub fn with_seed(mut self, seed: u64) -> Self {
        self.seed = seed;
        self
    }

    /// Check the parameters.
    pub fn validate(&self) -> Result<(), ScenarioConfigError> {
        if self.n_agents == 0 {
            return Err(ScenarioConfigError::InvalidCount {
                field: "n_agents",
                value: self.n_agents,
            });
        }
        for (field, value) in [
            ("radius", self.radius),
            ("dt", self.dt),
            ("max_speed", self.max_speed),
            ("arena_half_width", self.arena_half_width),
        ] {
            if !(value.is_finite() && value > 0.0) {
                return Err(ScenarioConfigError::NonPositive { field, value });
            }
        }
        let furthest = self.target[0].abs().max(self.target[1].abs()) + self.radius;
        if furthest >= self.arena_half_width {
            return Err(ScenarioConfigError::RingOutsideArena {
                radius: self.radius,
                half_width: self.arena_half_width,
            });
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_is_valid() {
        assert!(EncirclementConfig::default().validate().is_ok());
    }

    #[test]
    fn test_rejects_bad_parameters() {
        assert_eq!(
            EncirclementConfig::new(0).validate(),
            Err(ScenarioConfigError::InvalidCount {
                field: "n_agents",
                value: 0
            })
        );
        assert!(matches!(
            EncirclementConfig::new(3).with_dt(0.0).validate(),
            Err(ScenarioConfigError::NonPositive { field: "dt", .. })
        ));
        assert!(matches!(
            EncirclementConfig::new(3).with_radius(5.0).validate(),
            Err(ScenarioConfigError::RingOutsideArena { .. })
        ));
    }
}
