//! Configuration options for the equilibrium solver.
//!
//! This module provides the parameter struct that controls a solve, including
//! the solver mode, tolerances, direction resolution and iteration budget, and
//! the statistics collected while solving.

use std::f64::consts::PI;

use serde::{Deserialize, Serialize};

use crate::equilibrium::error::ConfigError;

/// Which constraint set the direction oracle builds.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum SolverMode {
    /// Self-generation only, no incentive constraints. Computes the
    /// feasible payoff correspondence.
    Feasible,
    /// Incentive constraints against a threat tuple that is raised after
    /// every sweep to the lowest payoff each player can still receive.
    MaxMinMax,
    /// Incentive constraints against the initial minmax threat tuple, held
    /// fixed for the whole solve.
    SelfGenerating,
}

/// How much iteration history a solve keeps.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum StoreIterations {
    /// Keep nothing but the final bounds.
    None,
    /// Keep the snapshot of the last sweep.
    Final,
    /// Keep a snapshot of every sweep.
    All,
}

/// Configuration for the solver.
///
/// # Example
/// ```
/// use sg_solver::equilibrium::{SolverConfig, SolverMode};
///
/// let config = SolverConfig::default().with_directions(64).with_mode(SolverMode::Feasible);
/// assert!(config.validate().is_ok());
/// assert_eq!(config.num_directions, 64);
/// ```
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SolverConfig {
    /// Constraint set used by the oracle.
    pub mode: SolverMode,

    /// Convergence tolerance.
    ///
    /// The solve stops when the largest movement of any hyperplane level in a
    /// full sweep falls below this value.
    pub error_tol: f64,

    /// Slack below which an LP constraint is reported as binding.
    pub pseudo_constraint_tol: f64,

    /// Movement below which a state counts as settled for regime tracking.
    ///
    /// Independent of `error_tol`. A value above `error_tol` lets states be
    /// fixed before the run converges; convergence is still only declared
    /// after a full sweep over every state.
    pub regime_change_tol: f64,

    /// Consecutive settled sweeps before a state's regime becomes fixed.
    pub regime_change_sweeps: usize,

    /// Fixed states are re-solved every this many sweeps.
    pub recheck_interval: usize,

    /// Maximum number of sweeps.
    pub max_iterations: usize,

    /// Number of directions for two-player games. Rounded up to a multiple of
    /// four so the coordinate axes are always included.
    pub num_directions: usize,

    /// Minimum angle in radians between consecutive directions.
    pub min_rotation: f64,

    /// History retention.
    pub store_iterations: StoreIterations,

    /// A new hyperplane must cut at least this far into the set to be kept.
    pub level_tol: f64,

    /// Directions closer than this are treated as the same direction.
    pub norm_tol: f64,

    /// Levels within this distance are ties in the oracle.
    pub tie_tol: f64,

    /// Stopping tolerance for the threat tuple value iteration.
    pub update_pivot_tol: f64,

    /// Maximum passes of the threat tuple value iteration.
    pub max_update_pivot_passes: usize,

    /// Worker threads for a sweep. `None` uses the global rayon pool.
    pub num_threads: Option<usize>,

    /// Wall clock budget in seconds, checked between sweeps.
    pub time_limit_secs: Option<f64>,
}

impl Default for SolverConfig {
    fn default() -> Self {
        Self {
            mode: SolverMode::MaxMinMax,
            error_tol: 1e-6,
            pseudo_constraint_tol: 1e-7,
            regime_change_tol: 1e-9,
            regime_change_sweeps: 3,
            recheck_interval: 5,
            max_iterations: 1000,
            num_directions: 200,
            min_rotation: 1e-3,
            store_iterations: StoreIterations::Final,
            level_tol: 1e-10,
            norm_tol: 1e-12,
            tie_tol: 1e-9,
            update_pivot_tol: 1e-12,
            max_update_pivot_passes: 100_000,
            num_threads: None,
            time_limit_secs: None,
        }
    }
}

impl SolverConfig {
    /// Create a new SolverConfig with default settings.
    pub fn new() -> Self {
        Self::default()
    }

    /// A coarse configuration for quick exploratory runs.
    ///
    /// Few directions and a loose tolerance.
    pub fn fast() -> Self {
        Self {
            num_directions: 32,
            error_tol: 1e-4,
            max_iterations: 200,
            ..Default::default()
        }
    }

    /// A fine configuration for final results.
    pub fn precise() -> Self {
        Self {
            num_directions: 400,
            error_tol: 1e-9,
            pseudo_constraint_tol: 1e-10,
            regime_change_tol: 1e-12,
            max_iterations: 10_000,
            store_iterations: StoreIterations::None,
            ..Default::default()
        }
    }

    /// Parse a configuration from JSON. Missing fields take default values.
    pub fn from_json_str(json: &str) -> Result<Self, ConfigError> {
        let config: Self = serde_json::from_str(json).map_err(|e| ConfigError::Parse(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    /// Builder method: set the solver mode.
    pub fn with_mode(mut self, mode: SolverMode) -> Self {
        self.mode = mode;
        self
    }

    /// Builder method: set the convergence tolerance.
    pub fn with_error_tol(mut self, tol: f64) -> Self {
        self.error_tol = tol;
        self
    }

    /// Builder method: set the number of directions.
    pub fn with_directions(mut self, num_directions: usize) -> Self {
        self.num_directions = num_directions;
        self
    }

    /// Builder method: set the iteration budget.
    pub fn with_max_iterations(mut self, max_iterations: usize) -> Self {
        self.max_iterations = max_iterations;
        self
    }

    /// Builder method: set history retention.
    pub fn with_store_iterations(mut self, store: StoreIterations) -> Self {
        self.store_iterations = store;
        self
    }

    /// Builder method: set regime tracking parameters.
    pub fn with_regime_change(mut self, tol: f64, sweeps: usize, recheck_interval: usize) -> Self {
        self.regime_change_tol = tol;
        self.regime_change_sweeps = sweeps;
        self.recheck_interval = recheck_interval;
        self
    }

    /// Builder method: set number of threads.
    pub fn with_threads(mut self, threads: usize) -> Self {
        self.num_threads = Some(threads);
        self
    }

    /// Builder method: set the wall clock budget.
    pub fn with_time_limit(mut self, seconds: f64) -> Self {
        self.time_limit_secs = Some(seconds);
        self
    }

    /// Validate the configuration and return any errors.
    pub fn validate(&self) -> Result<(), ConfigError> {
        let tolerances = [
            ("error", self.error_tol),
            ("pseudo-constraint", self.pseudo_constraint_tol),
            ("regime change", self.regime_change_tol),
            ("level", self.level_tol),
            ("norm", self.norm_tol),
            ("tie", self.tie_tol),
            ("update pivot", self.update_pivot_tol),
        ];
        for (name, value) in tolerances {
            if !value.is_finite() || value < 0.0 {
                return Err(ConfigError::InvalidTolerance(name, value));
            }
        }

        if self.num_directions < 4 {
            return Err(ConfigError::TooFewDirections(self.num_directions));
        }

        if !(self.min_rotation > 0.0 && self.min_rotation <= PI / 2.0) {
            return Err(ConfigError::InvalidRotation(self.min_rotation));
        }

        if self.max_iterations == 0 {
            return Err(ConfigError::ZeroCount("max_iterations"));
        }
        if self.regime_change_sweeps == 0 {
            return Err(ConfigError::ZeroCount("regime_change_sweeps"));
        }
        if self.recheck_interval == 0 {
            return Err(ConfigError::ZeroCount("recheck_interval"));
        }
        if self.max_update_pivot_passes == 0 {
            return Err(ConfigError::ZeroCount("max_update_pivot_passes"));
        }
        if self.num_threads == Some(0) {
            return Err(ConfigError::ZeroCount("num_threads"));
        }

        if let Some(limit) = self.time_limit_secs {
            if !limit.is_finite() || limit <= 0.0 {
                return Err(ConfigError::InvalidTimeLimit(limit));
            }
        }

        Ok(())
    }
}

/// Statistics tracked during a solve.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SolveStats {
    /// Total number of sweeps completed.
    pub iterations: usize,

    /// Total number of linear programs solved.
    pub lps_solved: usize,

    /// Total time spent solving (in seconds).
    pub elapsed_seconds: f64,

    /// Sweeps per second.
    pub sweeps_per_second: f64,

    /// Largest level movement per sweep.
    pub movement_history: Vec<MovementPoint>,
}

/// Level movement measured after one sweep.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MovementPoint {
    /// Sweep number, starting at 1.
    pub iteration: usize,
    /// Largest decrease of any level in the sweep.
    pub max_movement: f64,
    /// Whether every state was solved in the sweep.
    pub full_sweep: bool,
}

impl SolveStats {
    /// Create new empty stats.
    pub fn new() -> Self {
        Self::default()
    }

    /// Update sweeps per second based on elapsed time.
    pub fn update_rate(&mut self) {
        if self.elapsed_seconds > 0.0 {
            self.sweeps_per_second = self.iterations as f64 / self.elapsed_seconds;
        }
    }

    /// Record the movement of a finished sweep.
    pub fn record_movement(&mut self, iteration: usize, max_movement: f64, full_sweep: bool) {
        self.movement_history.push(MovementPoint {
            iteration,
            max_movement,
            full_sweep,
        });
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_is_valid() {
        assert!(SolverConfig::default().validate().is_ok());
        assert!(SolverConfig::fast().validate().is_ok());
        assert!(SolverConfig::precise().validate().is_ok());
    }

    #[test]
    fn test_rejects_negative_tolerance() {
        let config = SolverConfig::default().with_error_tol(-1.0);
        assert_eq!(config.validate(), Err(ConfigError::InvalidTolerance("error", -1.0)));
    }

    #[test]
    fn test_rejects_few_directions() {
        let config = SolverConfig::default().with_directions(3);
        assert_eq!(config.validate(), Err(ConfigError::TooFewDirections(3)));
    }

    #[test]
    fn test_rejects_zero_threads() {
        let config = SolverConfig::default().with_threads(0);
        assert_eq!(config.validate(), Err(ConfigError::ZeroCount("num_threads")));
    }

    #[test]
    fn test_parse_partial_json() {
        let config = SolverConfig::from_json_str(
            r#"{ "mode": "Feasible", "num_directions": 16, "store_iterations": "All" }"#,
        )
        .unwrap();
        assert_eq!(config.mode, SolverMode::Feasible);
        assert_eq!(config.num_directions, 16);
        assert_eq!(config.store_iterations, StoreIterations::All);
        // Unspecified fields keep their defaults
        assert_eq!(config.error_tol, 1e-6);
    }

    #[test]
    fn test_parse_rejects_invalid_values() {
        let err = SolverConfig::from_json_str(r#"{ "num_directions": 2 }"#).unwrap_err();
        assert_eq!(err, ConfigError::TooFewDirections(2));
        assert!(matches!(SolverConfig::from_json_str("{"), Err(ConfigError::Parse(_))));
    }
}
