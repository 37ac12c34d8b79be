//! Solve results and iteration history.
//!
//! A [`Solution`] is everything a caller gets back from a solve: the final
//! outer approximation of each state, the supporting policies, action
//! records, LP failures, statistics and, depending on
//! [`StoreIterations`](crate::equilibrium::StoreIterations), per-sweep
//! snapshots. Solutions serialize to JSON for downstream analysis.

use std::fs::File;
use std::io::Write;
use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::equilibrium::bounds::Hyperplane;
use crate::equilibrium::config::{SolveStats, SolverConfig};
use crate::equilibrium::error::SolveError;
use crate::equilibrium::geometry::{Point, Tuple};
use crate::equilibrium::oracle::LpFailure;
use crate::equilibrium::policy::{ActionRecord, Policy};
use crate::equilibrium::solver::{Outcome, Regime};

/// State of the solve after one sweep. Never mutated once recorded.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct IterationSnapshot {
    /// Sweep number, starting at 1.
    pub iteration: usize,
    /// `levels[state][direction]`: support in each direction after the sweep.
    pub levels: Vec<Vec<Option<f64>>>,
    /// Threat tuple used for the next sweep.
    pub threat: Tuple,
    /// Regime of every state after the sweep.
    pub regimes: Vec<Regime>,
    /// `policies[state][direction]` as of the sweep.
    pub policies: Vec<Vec<Option<Policy>>>,
    /// Largest level movement of the sweep.
    pub max_movement: f64,
    /// Whether every state was solved.
    pub full_sweep: bool,
}

/// Append-only, index-addressed arena of snapshots.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct IterationHistory {
    snapshots: Vec<IterationSnapshot>,
}

impl IterationHistory {
    /// Create an empty history.
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a snapshot and return its index.
    pub fn push(&mut self, snapshot: IterationSnapshot) -> usize {
        self.snapshots.push(snapshot);
        self.snapshots.len() - 1
    }

    /// Snapshot at `index`.
    pub fn get(&self, index: usize) -> Option<&IterationSnapshot> {
        self.snapshots.get(index)
    }

    /// Most recent snapshot.
    pub fn latest(&self) -> Option<&IterationSnapshot> {
        self.snapshots.last()
    }

    /// Number of snapshots.
    pub fn len(&self) -> usize {
        self.snapshots.len()
    }

    /// True when nothing was recorded.
    pub fn is_empty(&self) -> bool {
        self.snapshots.is_empty()
    }

    /// Iterate oldest first.
    pub fn iter(&self) -> std::slice::Iter<'_, IterationSnapshot> {
        self.snapshots.iter()
    }

    /// Drop everything but the most recent snapshot.
    pub(crate) fn keep_latest(&mut self) {
        let len = self.snapshots.len();
        if len > 1 {
            self.snapshots.drain(..len - 1);
        }
    }
}

/// Final result for one state.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StateSolution {
    /// State index.
    pub state: usize,
    /// Hyperplanes of the final outer approximation, box faces included.
    pub hyperplanes: Vec<Hyperplane>,
    /// Vertices of the final outer approximation.
    pub extreme_points: Vec<Point>,
    /// Final regime.
    pub regime: Regime,
    /// Latest supporting policy per direction.
    pub policies: Vec<Option<Policy>>,
    /// Directions that no action could support in the last sweep that
    /// visited this state.
    pub unresolved: Vec<bool>,
}

impl StateSolution {
    /// Whether `point` lies in the final approximation, up to `tol`.
    pub fn contains(&self, point: &Point, tol: f64) -> bool {
        self.hyperplanes
            .iter()
            .all(|h| h.level - point.dot(&h.direction) >= -tol)
    }

    /// Support function over the final extreme points.
    pub fn support(&self, direction: &Point) -> Option<f64> {
        self.extreme_points
            .iter()
            .map(|p| p.dot(direction))
            .reduce(f64::max)
    }
}

/// Complete result of a solve.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Solution {
    /// How the solve ended.
    pub outcome: Outcome,
    /// Parameters used.
    pub config: SolverConfig,
    /// Directions searched, indexed as in policies.
    pub directions: Vec<Point>,
    /// Per-state results.
    pub states: Vec<StateSolution>,
    /// Final threat tuple.
    pub threat: Tuple,
    /// Every action record, ordered by (state, action).
    pub action_records: Vec<ActionRecord>,
    /// Every LP that did not end optimal.
    pub failures: Vec<LpFailure>,
    /// Retained sweep snapshots.
    pub history: IterationHistory,
    /// Solve statistics.
    pub stats: SolveStats,
}

impl Solution {
    /// Whether the solve converged.
    pub fn is_converged(&self) -> bool {
        self.outcome.is_converged()
    }

    /// Result for `state`.
    pub fn state(&self, state: usize) -> &StateSolution {
        &self.states[state]
    }

    /// Serialize to pretty JSON.
    pub fn to_json(&self) -> Result<String, SolveError> {
        Ok(serde_json::to_string_pretty(self)?)
    }

    /// Parse a solution written by [`Solution::to_json`].
    pub fn from_json(json: &str) -> Result<Self, SolveError> {
        Ok(serde_json::from_str(json)?)
    }

    /// Save to JSON file.
    pub fn save_json<P: AsRef<Path>>(&self, path: P) -> Result<(), SolveError> {
        let path = path.as_ref();
        let json = self.to_json()?;
        let io_err = |source| SolveError::Io {
            context: format!("writing {}", path.display()),
            source,
        };
        let mut file = File::create(path).map_err(io_err)?;
        file.write_all(json.as_bytes()).map_err(io_err)
    }

    /// Print a short per-state summary.
    pub fn print_summary(&self) {
        println!("Outcome: {}", self.outcome);
        println!(
            "Sweeps: {}  LPs: {}  Time: {:.2}s",
            self.stats.iterations, self.stats.lps_solved, self.stats.elapsed_seconds
        );
        for state in &self.states {
            println!(
                "State {}: {:?}, {} hyperplanes, {} extreme points, threat {}",
                state.state,
                state.regime,
                state.hyperplanes.len(),
                state.extreme_points.len(),
                self.threat[state.state]
            );
        }
        if !self.failures.is_empty() {
            println!("LP failures: {}", self.failures.len());
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn snapshot(iteration: usize) -> IterationSnapshot {
        IterationSnapshot {
            iteration,
            levels: vec![vec![Some(1.0), None]],
            threat: Tuple::new(vec![Point::new(vec![0.0])]),
            regimes: vec![Regime::Recursive],
            policies: vec![vec![None, None]],
            max_movement: 0.5,
            full_sweep: true,
        }
    }

    #[test]
    fn test_history_is_index_addressed() {
        let mut history = IterationHistory::new();
        assert_eq!(history.push(snapshot(1)), 0);
        assert_eq!(history.push(snapshot(2)), 1);
        assert_eq!(history.get(1).map(|s| s.iteration), Some(2));
        assert_eq!(history.latest().map(|s| s.iteration), Some(2));

        history.keep_latest();
        assert_eq!(history.len(), 1);
        assert_eq!(history.get(0).map(|s| s.iteration), Some(2));
    }

    #[test]
    fn test_state_solution_queries() {
        let state = StateSolution {
            state: 0,
            hyperplanes: vec![
                Hyperplane::new(0, Point::new(vec![1.0]), 4.0),
                Hyperplane::new(0, Point::new(vec![-1.0]), 1.0),
            ],
            extreme_points: vec![Point::new(vec![-1.0]), Point::new(vec![4.0])],
            regime: Regime::Fixed,
            policies: Vec::new(),
            unresolved: Vec::new(),
        };
        assert!(state.contains(&Point::new(vec![0.0]), 1e-9));
        assert!(!state.contains(&Point::new(vec![5.0]), 1e-9));
        assert_eq!(state.support(&Point::new(vec![-1.0])), Some(1.0));
    }
}
