use serde::{Deserialize, Serialize};
use std::time::Duration;

use crate::error::ConfigError;

/// Penalty for a single hard-constraint violation.
pub const HARD_PENALTY: u32 = 1;
/// Returned by the hard check when a lecture has no room or period yet.
pub const UNPLACED_PENALTY: u32 = u32::MAX;
/// Penalty per missing working day of a course.
pub const MIN_WORKING_DAYS_PENALTY: u32 = 5;
/// Penalty per curriculum in which a lecture has no adjacent neighbour.
pub const CURRICULUM_COMPACTNESS_PENALTY: u32 = 2;
/// Penalty per extra room used by the lectures of one course.
pub const ROOM_STABILITY_PENALTY: u32 = 1;

/// Neighbourhood weights of the hill climber, in operator order:
/// period, room, event, room stability, min working days, curriculum compactness.
pub const NEIGHBOURHOOD_WEIGHTS: [f64; 6] = [1.0, 1.0, 1.0, 0.7, 0.3, 0.7];

/// Settings of one optimizer run.
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
#[serde(rename_all = "camelCase", default)]
pub struct SolverConfig {
    /// UCT exploration constant `C`.
    pub exploration_constant: f64,
    /// Optional cap on MCTS iterations.
    pub iterations: Option<u64>,
    /// Wall-clock budget in seconds, shared with the hill climber.
    pub time_limit_secs: f64,
    /// Seed for the random generator; `None` draws one from entropy.
    pub seed: Option<u64>,
    /// Consecutive rejected hill-climbing trials before the refiner gives up.
    pub hill_climbing_idle: u32,
}

impl Default for SolverConfig {
    fn default() -> Self {
        Self {
            exploration_constant: 1.4,
            iterations: None,
            time_limit_secs: 300.0,
            seed: None,
            hill_climbing_idle: 500,
        }
    }
}

impl SolverConfig {
    pub fn with_iterations(mut self, iterations: u64) -> Self {
        self.iterations = Some(iterations);
        self
    }

    pub fn with_time_limit(mut self, limit: Duration) -> Self {
        self.time_limit_secs = limit.as_secs_f64();
        self
    }

    pub fn with_seed(mut self, seed: u64) -> Self {
        self.seed = Some(seed);
        self
    }

    /// Saturates at [`Duration::MAX`] for limits too large to represent.
    pub fn time_limit(&self) -> Duration {
        Duration::try_from_secs_f64(self.time_limit_secs).unwrap_or(Duration::MAX)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if !self.exploration_constant.is_finite() || self.exploration_constant < 0.0 {
            return Err(ConfigError::InvalidExplorationConstant(self.exploration_constant));
        }
        if !self.time_limit_secs.is_finite() || self.time_limit_secs < 0.0 {
            return Err(ConfigError::InvalidTimeLimit(self.time_limit_secs));
        }
        if self.hill_climbing_idle == 0 {
            return Err(ConfigError::ZeroIdleCap);
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_are_valid() {
        let config = SolverConfig::default();
        assert!(config.validate().is_ok());
        assert_eq!(config.time_limit(), Duration::from_secs(300));
    }

    #[test]
    fn partial_json_falls_back_to_defaults() {
        let config: SolverConfig =
            serde_json::from_str(r#"{"iterations": 50, "seed": 7}"#).unwrap();
        assert_eq!(config.iterations, Some(50));
        assert_eq!(config.seed, Some(7));
        assert_eq!(config.exploration_constant, 1.4);
        assert_eq!(config.hill_climbing_idle, 500);
    }

    #[test]
    fn rejects_bad_values() {
        let config = SolverConfig {
            exploration_constant: f64::NAN,
            ..Default::default()
        };
        assert!(matches!(
            config.validate(),
            Err(ConfigError::InvalidExplorationConstant(_))
        ));

        let config = SolverConfig {
            time_limit_secs: -1.0,
            ..Default::default()
        };
        assert!(matches!(config.validate(), Err(ConfigError::InvalidTimeLimit(_))));

        let config = SolverConfig {
            hill_climbing_idle: 0,
            ..Default::default()
        };
        assert!(matches!(config.validate(), Err(ConfigError::ZeroIdleCap)));
    }
}
