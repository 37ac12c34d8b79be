//! Outer-approximation iteration driver.
//!
//! A [`Solver`] owns a shared [`Game`] and a [`SolverConfig`]. Each call to
//! [`Solver::solve`] opens a [`SolveSession`] that holds all per-run state and
//! repeats sweeps until one of the stopping rules fires:
//!
//! - **Converged**: a sweep over every state moved no level by `error_tol`
//!   and raised no threat
//! - **MaxIterReached**: `max_iterations` sweeps ran
//! - **Infeasible**: some state resolved no direction in a sweep, or a
//!   direction was still unsupported when the bounds stopped moving
//! - **Cancelled** / **TimeLimitReached**: checked between sweeps
//!
//! A sweep solves every (active state, direction) pair in parallel against a
//! frozen [`SweepSnapshot`] and commits all results at a single barrier, so
//! every worker sees the same bounds regardless of scheduling.
//!
//! # Regimes
//!
//! A state whose bounds move less than `regime_change_tol` for
//! `regime_change_sweeps` consecutive sweeps is marked [`Regime::Fixed`] and
//! skipped. Every `recheck_interval` sweeps, and before convergence is
//! accepted, all states are solved again; a fixed state that moves reverts to
//! [`Regime::Recursive`].

use std::f64::consts::PI;
use std::fmt;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Instant;

use rayon::prelude::*;
use serde::{Deserialize, Serialize};

use crate::equilibrium::bounds::BoundingSet;
use crate::equilibrium::config::{SolveStats, SolverConfig, SolverMode, StoreIterations};
use crate::equilibrium::error::SolveError;
use crate::equilibrium::game::Game;
use crate::equilibrium::geometry::{Point, Tuple};
use crate::equilibrium::lp::{DenseSimplex, LinearProgramSolver};
use crate::equilibrium::oracle::{DirectionOracle, LpFailure, OracleResult, SweepSnapshot};
use crate::equilibrium::policy::{ActionLedger, Policy};
use crate::equilibrium::solution::{IterationHistory, IterationSnapshot, Solution, StateSolution};

/// Whether a state is still refined every sweep.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Regime {
    /// Solved every sweep.
    Recursive,
    /// Settled; solved only on re-check sweeps.
    Fixed,
}

/// How a solve ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Outcome {
    /// Movement fell below `error_tol` on a full sweep.
    Converged,
    /// The sweep budget ran out.
    MaxIterReached,
    /// A state resolved no direction in a sweep, or still had an
    /// unresolved direction when the bounds settled.
    Infeasible {
        /// First such state.
        state: usize,
    },
    /// The cancel token fired.
    Cancelled,
    /// The wall clock budget ran out.
    TimeLimitReached,
}

impl Outcome {
    /// Whether the bounds are converged rather than best effort.
    pub fn is_converged(&self) -> bool {
        matches!(self, Outcome::Converged)
    }
}

impl fmt::Display for Outcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Outcome::Converged => write!(f, "converged"),
            Outcome::MaxIterReached => write!(f, "maximum iterations reached"),
            Outcome::Infeasible { state } => write!(f, "state {} infeasible", state),
            Outcome::Cancelled => write!(f, "cancelled"),
            Outcome::TimeLimitReached => write!(f, "time limit reached"),
        }
    }
}

/// Lifecycle of a session.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Phase {
    /// Computing threats and seed boxes.
    Initializing,
    /// Running sweeps.
    Iterating,
    /// Stopped.
    Finished(Outcome),
}

/// Cloneable handle that stops a running solve at the next sweep boundary.
#[derive(Debug, Clone, Default)]
pub struct CancelToken(Arc<AtomicBool>);

impl CancelToken {
    /// Create an unfired token.
    pub fn new() -> Self {
        Self::default()
    }

    /// Request cancellation.
    pub fn cancel(&self) {
        self.0.store(true, Ordering::SeqCst);
    }

    /// Whether cancellation was requested.
    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }

    /// Clear a fired token so later solves run.
    pub fn reset(&self) {
        self.0.store(false, Ordering::SeqCst);
    }
}

/// Summary of one finished sweep.
#[derive(Debug, Clone, PartialEq)]
pub struct SweepProgress {
    /// Sweep number, starting at 1.
    pub iteration: usize,
    /// Largest level movement in the sweep.
    pub max_movement: f64,
    /// Whether every state was solved.
    pub full_sweep: bool,
    /// States solved in the sweep.
    pub active_states: usize,
    /// States currently fixed.
    pub fixed_states: usize,
    /// LPs solved in the sweep.
    pub lps_solved: usize,
    /// Seconds since the session started.
    pub elapsed_seconds: f64,
}

impl fmt::Display for SweepProgress {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "Iter: {:>5}  Err: {:.3e}  Active: {:>3}  Fixed: {:>3}  LPs: {:>6}  Time: {:.2}s{}",
            self.iteration,
            self.max_movement,
            self.active_states,
            self.fixed_states,
            self.lps_solved,
            self.elapsed_seconds,
            if self.full_sweep { "  (full)" } else { "" }
        )
    }
}

/// Stochastic game equilibrium payoff solver.
///
/// # Example
/// ```
/// use std::sync::Arc;
/// use sg_solver::equilibrium::{Game, Solver, SolverConfig};
///
/// let game = Game::new(0.9, vec![vec![1]], vec![vec![vec![1.0]]], vec![vec![vec![1.0]]]).unwrap();
/// let solver = Solver::new(Arc::new(game), SolverConfig::default()).unwrap();
/// let solution = solver.solve();
/// assert!(solution.is_converged());
/// ```
pub struct Solver {
    game: Arc<Game>,
    config: SolverConfig,
    lp_solver: Arc<dyn LinearProgramSolver>,
    cancel: CancelToken,
    pool: Option<rayon::ThreadPool>,
}

impl Solver {
    /// Create a solver using the built-in [`DenseSimplex`] backend.
    ///
    /// # Errors
    /// An invalid configuration, more than two players, or a worker pool that
    /// cannot be built.
    pub fn new(game: Arc<Game>, config: SolverConfig) -> Result<Self, SolveError> {
        config.validate()?;
        if game.num_players() > 2 {
            return Err(SolveError::UnsupportedPlayers(game.num_players()));
        }
        let pool = match config.num_threads {
            Some(threads) => Some(rayon::ThreadPoolBuilder::new().num_threads(threads).build()?),
            None => None,
        };
        Ok(Self {
            game,
            config,
            lp_solver: Arc::new(DenseSimplex::new()),
            cancel: CancelToken::new(),
            pool,
        })
    }

    /// Builder method: use another LP backend.
    pub fn with_lp_solver(mut self, lp_solver: Arc<dyn LinearProgramSolver>) -> Self {
        self.lp_solver = lp_solver;
        self
    }

    /// The game being solved.
    pub fn game(&self) -> &Game {
        &self.game
    }

    /// Solver configuration.
    pub fn config(&self) -> &SolverConfig {
        &self.config
    }

    /// Handle that cancels solves started from this solver. The token is
    /// cleared when the session it stopped is closed.
    pub fn cancel_token(&self) -> CancelToken {
        self.cancel.clone()
    }

    /// Open a session for step-by-step solving.
    pub fn session(&self) -> SolveSession<'_> {
        SolveSession::new(self)
    }

    /// Run sweeps until a stopping rule fires.
    pub fn solve(&self) -> Solution {
        self.solve_with_callback(|_| {})
    }

    /// Solve with a callback after every sweep.
    pub fn solve_with_callback<F>(&self, mut callback: F) -> Solution
    where
        F: FnMut(&SweepProgress),
    {
        let mut session = self.session();
        while let Some(progress) = session.step() {
            callback(&progress);
        }
        session.into_solution()
    }
}

/// Search directions for `num_players` players.
///
/// One player gets `+1` and `-1`. Two players get `num_directions` equally
/// spaced unit vectors, rounded up to a multiple of four so the axes are
/// included and capped so that consecutive directions are at least
/// `min_rotation` apart.
pub fn generate_directions(num_players: usize, num_directions: usize, min_rotation: f64) -> Vec<Point> {
    if num_players == 1 {
        return vec![Point::new(vec![1.0]), Point::new(vec![-1.0])];
    }

    let mut n = num_directions.div_ceil(4) * 4;
    let max_n = ((2.0 * PI / min_rotation).floor() as usize / 4 * 4).max(4);
    if n > max_n {
        log::warn!(
            "{} directions are closer than the minimum rotation {}, using {}",
            n,
            min_rotation,
            max_n
        );
        n = max_n;
    }

    let quarter = n / 4;
    let axes = [[1.0, 0.0], [0.0, 1.0], [-1.0, 0.0], [0.0, -1.0]];
    (0..n)
        .map(|k| {
            if k % quarter == 0 {
                Point::new(axes[k / quarter].to_vec())
            } else {
                Point::from_angle(2.0 * PI * k as f64 / n as f64)
            }
        })
        .collect()
}

/// Pure-strategy minmax payoff of every player in every state, when the
/// punished player's future is also evaluated at its minmax value.
///
/// Value iteration of `T_i(s) = min_{a_-i} max_{a_i} u_i(s, a) + delta E[T_i]`
/// starting from the lowest stage payoff, stopped once a pass changes no
/// value by more than `tol` or after `max_passes` passes.
pub fn minmax_threat(game: &Game, tol: f64, max_passes: usize) -> Tuple {
    let (lower, _) = game.payoff_bounds();
    let start = &lower * (1.0 / (1.0 - game.delta()));
    let mut threat = Tuple::uniform(game.num_states(), start);

    for pass in 0..max_passes {
        let mut next = threat.clone();
        let mut change: f64 = 0.0;
        for state in 0..game.num_states() {
            for player in 0..game.num_players() {
                let value = punishment(game, state, player, &threat);
                change = change.max((value - threat[state][player]).abs());
                next[state][player] = value;
            }
        }
        threat = next;
        if change < tol {
            log::debug!("minmax threat converged after {} passes", pass + 1);
            return threat;
        }
    }

    log::warn!("minmax value iteration stopped after {} passes", max_passes);
    threat
}

/// `min_{a_-i} max_{a_i}` of the player's value in one state.
fn punishment(game: &Game, state: usize, player: usize, threat: &Tuple) -> f64 {
    let delta = game.delta();
    let mut best_response = vec![f64::NEG_INFINITY; game.num_action_profiles(state)];
    for profile in 0..game.num_action_profiles(state) {
        let value = game.payoff(state, profile)[player]
            + delta * threat.expectation_coord(game.transition(state, profile), player);
        let mut actions = game.profile_to_actions(state, profile);
        actions[player] = 0;
        let key = game.actions_to_profile(state, &actions);
        best_response[key] = best_response[key].max(value);
    }
    best_response
        .into_iter()
        .filter(|v| v.is_finite())
        .fold(f64::INFINITY, f64::min)
}

/// Regime and settled-sweep count after a sweep that solved the state.
pub fn next_regime(current: Regime, settled: usize, movement: f64, config: &SolverConfig) -> (Regime, usize) {
    if movement < config.regime_change_tol {
        let settled = settled + 1;
        if settled >= config.regime_change_sweeps {
            (Regime::Fixed, settled)
        } else {
            (current, settled)
        }
    } else {
        (Regime::Recursive, 0)
    }
}

/// All mutable state of one solve.
pub struct SolveSession<'a> {
    solver: &'a Solver,
    phase: Phase,
    directions: Vec<Point>,
    bounds: Arc<Vec<BoundingSet>>,
    threat: Tuple,
    ledger: Arc<ActionLedger>,
    regimes: Vec<Regime>,
    settled: Vec<usize>,
    policies: Vec<Vec<Option<Policy>>>,
    unresolved: Vec<Vec<bool>>,
    failures: Vec<LpFailure>,
    history: IterationHistory,
    stats: SolveStats,
    iteration: usize,
    pending_recheck: bool,
    start: Instant,
}

impl<'a> SolveSession<'a> {
    fn new(solver: &'a Solver) -> Self {
        let game = &*solver.game;
        let config = &solver.config;
        let num_states = game.num_states();
        let mut session = Self {
            solver,
            phase: Phase::Initializing,
            directions: generate_directions(game.num_players(), config.num_directions, config.min_rotation),
            bounds: Arc::new(Vec::new()),
            threat: Tuple::new(Vec::new()),
            ledger: Arc::new(ActionLedger::default()),
            regimes: vec![Regime::Recursive; num_states],
            settled: vec![0; num_states],
            policies: Vec::new(),
            unresolved: Vec::new(),
            failures: Vec::new(),
            history: IterationHistory::new(),
            stats: SolveStats::new(),
            iteration: 0,
            pending_recheck: false,
            start: Instant::now(),
        };

        session.threat = minmax_threat(game, config.update_pivot_tol, config.max_update_pivot_passes);

        let scale = 1.0 / (1.0 - game.delta());
        let (lowest, highest) = game.payoff_bounds();
        let upper = &highest * scale;
        let bounds: Vec<BoundingSet> = (0..num_states)
            .map(|state| {
                let lower = match config.mode {
                    SolverMode::Feasible => &lowest * scale,
                    SolverMode::MaxMinMax | SolverMode::SelfGenerating => session.threat[state].min(&upper),
                };
                log::debug!("state {} seed box {} to {}", state, lower, upper);
                BoundingSet::from_box(state, lower, upper.clone()).with_tolerances(config.level_tol, config.norm_tol)
            })
            .collect();
        session.bounds = Arc::new(bounds);
        session.ledger = Arc::new(ActionLedger::new(game, &session.threat, config.mode));

        let num_directions = session.directions.len();
        session.policies = vec![vec![None; num_directions]; num_states];
        session.unresolved = vec![vec![false; num_directions]; num_states];
        session.phase = Phase::Iterating;

        log::info!(
            "Solving {} states, {} players, {} directions, mode {:?}",
            num_states,
            game.num_players(),
            num_directions,
            config.mode
        );
        session
    }

    /// Current phase.
    pub fn phase(&self) -> Phase {
        self.phase
    }

    /// Outcome once finished.
    pub fn outcome(&self) -> Option<Outcome> {
        match self.phase {
            Phase::Finished(outcome) => Some(outcome),
            _ => None,
        }
    }

    /// Sweeps completed.
    pub fn iteration(&self) -> usize {
        self.iteration
    }

    /// Current outer approximations.
    pub fn bounds(&self) -> &[BoundingSet] {
        &self.bounds
    }

    /// Current threat tuple.
    pub fn threat(&self) -> &Tuple {
        &self.threat
    }

    /// Current regimes.
    pub fn regimes(&self) -> &[Regime] {
        &self.regimes
    }

    /// Search directions.
    pub fn directions(&self) -> &[Point] {
        &self.directions
    }

    /// Action records.
    pub fn ledger(&self) -> &ActionLedger {
        &self.ledger
    }

    /// Run one sweep. Returns `None` without sweeping once the session has
    /// finished or a stop was requested.
    pub fn step(&mut self) -> Option<SweepProgress> {
        if self.outcome().is_some() {
            return None;
        }
        if let Some(outcome) = self.boundary_stop() {
            self.finish(outcome);
            return None;
        }

        let progress = self.sweep();
        log::info!("{}", progress);
        Some(progress)
    }

    /// Stop rules checked between sweeps.
    fn boundary_stop(&self) -> Option<Outcome> {
        if self.solver.cancel.is_cancelled() {
            return Some(Outcome::Cancelled);
        }
        if let Some(limit) = self.solver.config.time_limit_secs {
            if self.start.elapsed().as_secs_f64() >= limit {
                return Some(Outcome::TimeLimitReached);
            }
        }
        if self.iteration >= self.solver.config.max_iterations {
            return Some(Outcome::MaxIterReached);
        }
        None
    }

    fn finish(&mut self, outcome: Outcome) {
        match outcome {
            Outcome::Converged => log::info!("Converged after {} sweeps", self.iteration),
            Outcome::Infeasible { state } => {
                log::warn!("State {} left a direction unresolved in sweep {}", state, self.iteration)
            }
            other => log::info!("Stopped after {} sweeps: {}", self.iteration, other),
        }
        self.phase = Phase::Finished(outcome);
    }

    fn sweep(&mut self) -> SweepProgress {
        let solver = self.solver;
        let config = &solver.config;
        let game = &*solver.game;
        let num_states = game.num_states();

        self.iteration += 1;
        let all_fixed = self.regimes.iter().all(|r| *r == Regime::Fixed);
        let full = self.pending_recheck
            || self.iteration == 1
            || self.iteration % config.recheck_interval == 0
            || all_fixed;
        self.pending_recheck = false;

        let active: Vec<usize> = (0..num_states)
            .filter(|&s| full || self.regimes[s] == Regime::Recursive)
            .collect();
        let work: Vec<(usize, usize)> = active
            .iter()
            .flat_map(|&s| (0..self.directions.len()).map(move |d| (s, d)))
            .collect();

        let results = {
            let snapshot = SweepSnapshot {
                bounds: Arc::clone(&self.bounds),
                ledger: Arc::clone(&self.ledger),
            };
            let oracle = DirectionOracle::new(
                game,
                solver.lp_solver.as_ref(),
                config.pseudo_constraint_tol,
                config.tie_tol,
            );
            let directions = &self.directions;
            let run = || {
                work.par_iter()
                    .map(|&(s, d)| oracle.support(&snapshot, s, d, &directions[d]))
                    .collect::<Vec<OracleResult>>()
            };
            match &solver.pool {
                Some(pool) => pool.install(run),
                None => run(),
            }
        };

        self.commit(&active, results, full)
    }

    /// Apply a sweep's results, update regimes and threats, and decide
    /// whether to stop.
    fn commit(&mut self, active: &[usize], results: Vec<OracleResult>, full: bool) -> SweepProgress {
        let solver = self.solver;
        let config = &solver.config;
        let game = &*solver.game;
        let num_states = game.num_states();

        // Movement is measured against the bounds every worker saw
        let previous: Vec<Option<f64>> = results
            .iter()
            .map(|r| self.bounds[r.state].support(&self.directions[r.direction]))
            .collect();

        let mut movement = vec![0.0_f64; num_states];
        let mut resolved = vec![0_usize; num_states];
        let mut lps_solved = 0;
        {
            let bounds = Arc::make_mut(&mut self.bounds);
            let ledger = Arc::make_mut(&mut self.ledger);

            for (result, previous) in results.into_iter().zip(previous) {
                let (state, direction) = (result.state, result.direction);
                lps_solved += result.lps_solved;

                for &action in &result.infeasible_actions {
                    if ledger.mark_infeasible(state, action) {
                        log::debug!("action {} in state {} is infeasible", action, state);
                    }
                }
                self.failures.extend(result.failures);

                let Some(support) = result.support else {
                    self.unresolved[state][direction] = true;
                    continue;
                };
                resolved[state] += 1;
                self.unresolved[state][direction] = false;
                if let Some(previous) = previous {
                    movement[state] = movement[state].max(previous - support.level);
                }

                bounds[state].add_bounding_hyperplane(&self.directions[direction], support.level);
                ledger.record_support(state, support.action, support.binding, &support.continuation);
                self.policies[state][direction] = Some(Policy {
                    state,
                    direction,
                    action: support.action,
                    level: support.level,
                    binding: support.binding,
                    continuation: support.continuation,
                    min_ic_slack: Some(support.min_ic_slack).filter(|v| v.is_finite()),
                });
            }
        }

        let infeasible = active.iter().copied().find(|&s| resolved[s] == 0);

        for &state in active {
            let (regime, settled) = next_regime(self.regimes[state], self.settled[state], movement[state], config);
            if regime != self.regimes[state] {
                log::debug!(
                    "state {} is now {:?} (movement {:.3e})",
                    state,
                    regime,
                    movement[state]
                );
            }
            self.regimes[state] = regime;
            self.settled[state] = settled;
        }

        let threat_raised = config.mode == SolverMode::MaxMinMax && self.raise_threat();

        let max_movement = active.iter().map(|&s| movement[s]).fold(0.0, f64::max);
        self.stats.iterations = self.iteration;
        self.stats.lps_solved += lps_solved;
        self.stats.elapsed_seconds = self.start.elapsed().as_secs_f64();
        self.stats.update_rate();
        self.stats.record_movement(self.iteration, max_movement, full);
        self.record_history(max_movement, full);

        if let Some(state) = infeasible {
            self.finish(Outcome::Infeasible { state });
        } else if max_movement < config.error_tol {
            if full && !threat_raised {
                // A direction no action ever supported keeps its seed bound
                match self.unresolved.iter().position(|dirs| dirs.contains(&true)) {
                    Some(state) => self.finish(Outcome::Infeasible { state }),
                    None => self.finish(Outcome::Converged),
                }
            } else {
                self.pending_recheck = true;
            }
        }
        if self.outcome().is_none() && self.iteration >= config.max_iterations {
            self.finish(Outcome::MaxIterReached);
        }

        SweepProgress {
            iteration: self.iteration,
            max_movement,
            full_sweep: full,
            active_states: active.len(),
            fixed_states: self.regimes.iter().filter(|r| **r == Regime::Fixed).count(),
            lps_solved,
            elapsed_seconds: self.stats.elapsed_seconds,
        }
    }

    /// Raise each player's threat to the lowest payoff still in each state's
    /// approximation. Returns whether any threat rose.
    fn raise_threat(&mut self) -> bool {
        let config = &self.solver.config;
        let mut raised = self.threat.clone();
        for (state, set) in self.bounds.iter().enumerate() {
            let Some(minimum) = set.coordinate_minimum() else {
                continue;
            };
            if self.threat[state].strictly_less_than(&minimum, config.level_tol) {
                raised[state] = self.threat[state].max(&minimum);
            }
        }

        let num_players = self.solver.game.num_players();
        if !(0..num_players).any(|player| self.threat.strictly_less_than(&raised, player)) {
            return false;
        }
        log::debug!("threat rose by {:.3e}", Tuple::distance(&self.threat, &raised));
        self.threat = raised;
        Arc::make_mut(&mut self.ledger).update_min_ic(&self.solver.game, &self.threat, config.mode);
        true
    }

    fn record_history(&mut self, max_movement: f64, full_sweep: bool) {
        let store = self.solver.config.store_iterations;
        if store == StoreIterations::None {
            return;
        }
        let levels: Vec<Vec<Option<f64>>> = self
            .bounds
            .iter()
            .map(|set| self.directions.iter().map(|d| set.support(d)).collect())
            .collect();
        self.history.push(IterationSnapshot {
            iteration: self.iteration,
            levels,
            threat: self.threat.clone(),
            regimes: self.regimes.clone(),
            policies: self.policies.clone(),
            max_movement,
            full_sweep,
        });
        if store == StoreIterations::Final {
            self.history.keep_latest();
        }
    }

    /// Close the session and clear the solver's cancel token. A session
    /// stopped before any rule fired reports [`Outcome::Cancelled`].
    pub fn into_solution(mut self) -> Solution {
        let outcome = self.outcome().unwrap_or(Outcome::Cancelled);
        self.solver.cancel.reset();
        self.stats.elapsed_seconds = self.start.elapsed().as_secs_f64();
        self.stats.update_rate();

        let states = self
            .bounds
            .iter()
            .enumerate()
            .map(|(state, set)| StateSolution {
                state,
                hyperplanes: set.hyperplanes().to_vec(),
                extreme_points: set.extreme_points().to_vec(),
                regime: self.regimes[state],
                policies: std::mem::take(&mut self.policies[state]),
                unresolved: std::mem::take(&mut self.unresolved[state]),
            })
            .collect();

        Solution {
            outcome,
            config: self.solver.config.clone(),
            directions: self.directions,
            states,
            threat: self.threat,
            action_records: self.ledger.records(),
            failures: self.failures,
            history: self.history,
            stats: self.stats,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::equilibrium::lp::{LinearProgram, LpSolution, LpStatus};
    use crate::equilibrium::policy::BindingStatus;
    use crate::games::prisoners_dilemma;

    fn single_action() -> Game {
        Game::new(0.9, vec![vec![1]], vec![vec![vec![1.0]]], vec![vec![vec![1.0]]]).unwrap()
    }

    /// One player, three absorbing states paying 0, 1 and 0.5 per period.
    fn absorbing_chain() -> Game {
        Game::new(
            0.5,
            vec![vec![1], vec![1], vec![1]],
            vec![vec![vec![0.0]], vec![vec![1.0]], vec![vec![0.5]]],
            vec![
                vec![vec![1.0, 0.0, 0.0]],
                vec![vec![0.0, 1.0, 0.0]],
                vec![vec![0.0, 0.0, 1.0]],
            ],
        )
        .unwrap()
    }

    fn up() -> Point {
        Point::new(vec![1.0])
    }

    #[test]
    fn test_single_action_converges_in_one_sweep() {
        let solver = Solver::new(Arc::new(single_action()), SolverConfig::default()).unwrap();
        let solution = solver.solve();

        assert_eq!(solution.outcome, Outcome::Converged);
        assert_eq!(solution.stats.iterations, 1);
        let state = solution.state(0);
        assert!((state.support(&up()).unwrap() - 10.0).abs() < 1e-6);
        assert!((state.support(&Point::new(vec![-1.0])).unwrap() + 10.0).abs() < 1e-6);
    }

    #[test]
    fn test_two_state_cooperative_scenario() {
        let game = Game::new(
            0.8,
            vec![vec![1, 1], vec![1, 1]],
            vec![vec![vec![2.0, 2.0]], vec![vec![0.0, 0.0]]],
            vec![vec![vec![1.0, 0.0]], vec![vec![0.0, 1.0]]],
        )
        .unwrap();
        let config = SolverConfig::default().with_directions(16);
        let solution = Solver::new(Arc::new(game), config).unwrap().solve();
        assert!(solution.is_converged());

        // Direction 2 of 16 points into the positive quadrant at 45 degrees
        let diagonal = &solution.directions[2];
        assert!(diagonal.approx_eq(&Point::new(vec![0.5f64.sqrt(), 0.5f64.sqrt()]), 1e-12));

        let state_a = solution.state(0);
        assert!((state_a.support(diagonal).unwrap() - 20.0 / 2f64.sqrt()).abs() < 1e-6);
        assert!(state_a
            .extreme_points
            .iter()
            .all(|p| p.approx_eq(&Point::new(vec![10.0, 10.0]), 1e-6)));

        let policy = state_a.policies[2].as_ref().unwrap();
        assert_eq!(policy.binding, BindingStatus::NonBinding);
        assert_eq!(policy.min_ic_slack, None);
        assert!(policy.continuation[0].approx_eq(&Point::new(vec![10.0, 10.0]), 1e-6));
    }

    #[test]
    fn test_negative_minmax_seeds_negative_lower_bounds() {
        // Player 0 loses 1 every period whatever happens
        let game = Game::new(
            0.5,
            vec![vec![2, 2], vec![2, 2]],
            vec![
                vec![vec![-1.0, 1.0], vec![-1.0, 0.0], vec![-1.0, 2.0], vec![-1.0, 0.0]],
                vec![vec![-1.0, 0.0], vec![-1.0, 1.0], vec![-1.0, 0.0], vec![-1.0, 3.0]],
            ],
            vec![
                vec![vec![0.5, 0.5], vec![1.0, 0.0], vec![0.0, 1.0], vec![0.5, 0.5]],
                vec![vec![1.0, 0.0]; 4],
            ],
        )
        .unwrap();
        let solver = Solver::new(Arc::new(game), SolverConfig::default()).unwrap();
        let session = solver.session();

        for (state, set) in session.bounds().iter().enumerate() {
            assert!(set.lower()[0] < 0.0, "state {} lower bound {}", state, set.lower());
            assert!((session.threat()[state][0] + 2.0).abs() < 1e-9);
        }
    }

    /// Fails the upward LP of state 0 and defers everything else.
    struct FailStateZeroUp(DenseSimplex);

    impl LinearProgramSolver for FailStateZeroUp {
        fn solve(&self, lp: &LinearProgram) -> LpSolution {
            if lp.objective[0] > 0.0 {
                return LpSolution::failed(LpStatus::NumericalError);
            }
            self.0.solve(lp)
        }
    }

    #[test]
    fn test_failed_direction_keeps_bound() {
        let config = SolverConfig::default().with_max_iterations(1);
        let solver = Solver::new(Arc::new(absorbing_chain()), config)
            .unwrap()
            .with_lp_solver(Arc::new(FailStateZeroUp(DenseSimplex::new())));
        let solution = solver.solve();

        assert_eq!(solution.outcome, Outcome::MaxIterReached);
        // State 0 keeps its seed bound of 1 / (1 - 0.5)
        assert_eq!(solution.state(0).support(&up()), Some(2.0));
        assert!(solution.state(0).unresolved[0]);
        assert!(!solution.state(0).unresolved[1]);
        // State 2 still tightened to 0.5 + 0.5 * 2
        assert!((solution.state(2).support(&up()).unwrap() - 1.5).abs() < 1e-9);
        assert!(solution
            .failures
            .iter()
            .all(|f| f.state == 0 && f.direction == 0 && f.status == LpStatus::NumericalError));
    }

    #[test]
    fn test_unresolved_direction_blocks_convergence() {
        let solver = Solver::new(Arc::new(absorbing_chain()), SolverConfig::default())
            .unwrap()
            .with_lp_solver(Arc::new(FailStateZeroUp(DenseSimplex::new())));
        let solution = solver.solve();

        // Every other level settles, but state 0 never supports its upper face
        assert_eq!(solution.outcome, Outcome::Infeasible { state: 0 });
        assert!(!solution.is_converged());
        assert!(solution.state(0).unresolved[0]);
        assert!((solution.state(2).support(&up()).unwrap() - 1.0).abs() < 1e-9);
        assert!(solution.stats.movement_history.last().unwrap().full_sweep);
    }

    struct AlwaysInfeasible;

    impl LinearProgramSolver for AlwaysInfeasible {
        fn solve(&self, _lp: &LinearProgram) -> LpSolution {
            LpSolution::failed(LpStatus::Infeasible)
        }
    }

    #[test]
    fn test_unresolved_state_is_infeasible() {
        let solver = Solver::new(Arc::new(single_action()), SolverConfig::default())
            .unwrap()
            .with_lp_solver(Arc::new(AlwaysInfeasible));
        let solution = solver.solve();

        assert_eq!(solution.outcome, Outcome::Infeasible { state: 0 });
        assert!(!solution.is_converged());
        assert!(!solution.action_records[0].feasible);
    }

    #[test]
    fn test_near_tie_stays_an_outer_bound() {
        let game = Game::new(
            0.5,
            vec![vec![2]],
            vec![vec![vec![1.0], vec![1.0 + 5e-10]]],
            vec![vec![vec![1.0]; 2]],
        )
        .unwrap();
        let config = SolverConfig::default().with_mode(SolverMode::Feasible);
        let solution = Solver::new(Arc::new(game), config).unwrap().solve();

        assert!(solution.is_converged());
        // Playing action 1 forever
        let forever = Point::new(vec![(1.0 + 5e-10) / 0.5]);
        assert!(solution.state(0).contains(&forever, 1e-12));
    }

    /// Player 1 can only punish player 0 at a cost it cannot be made to bear,
    /// so the pure minmax threat of 0 rises toward 2 one sweep at a time.
    fn unenforceable_punishment() -> Game {
        Game::new(
            0.5,
            vec![vec![1, 2]],
            vec![vec![vec![1.0, 1.0], vec![0.0, -10.0]]],
            vec![vec![vec![1.0]; 2]],
        )
        .unwrap()
    }

    #[test]
    fn test_threat_raise_defers_convergence() {
        // Movement is always below this tolerance, so only the threat keeps
        // the solve going
        let config = SolverConfig::default().with_error_tol(1e6);
        let solution = Solver::new(Arc::new(unenforceable_punishment()), config)
            .unwrap()
            .solve();

        assert!(solution.is_converged());
        assert!(solution.stats.iterations > 1);
        assert!((solution.threat[0][0] - 2.0).abs() < 1e-8, "threat {}", solution.threat);
        assert!(!solution.action_records[1].feasible);
    }

    #[test]
    fn test_levels_never_increase() {
        let config = SolverConfig::default()
            .with_directions(16)
            .with_store_iterations(StoreIterations::All);
        let solution = Solver::new(Arc::new(prisoners_dilemma::game(0.5)), config)
            .unwrap()
            .solve();

        assert!(solution.is_converged());
        assert_eq!(solution.history.len(), solution.stats.iterations);
        for pair in solution.history.iter().collect::<Vec<_>>().windows(2) {
            for (before, after) in pair[0].levels.iter().flatten().zip(pair[1].levels.iter().flatten()) {
                let (before, after) = (before.unwrap(), after.unwrap());
                assert!(after <= before + 1e-9, "level rose from {} to {}", before, after);
            }
        }
    }

    #[test]
    fn test_final_history_keeps_one_snapshot() {
        let config = SolverConfig::default().with_store_iterations(StoreIterations::Final);
        let solution = Solver::new(Arc::new(absorbing_chain()), config).unwrap().solve();
        assert_eq!(solution.history.len(), 1);
        assert_eq!(
            solution.history.latest().map(|s| s.iteration),
            Some(solution.stats.iterations)
        );
    }

    #[test]
    fn test_regimes_fix_and_recheck() {
        let config = SolverConfig::default()
            .with_regime_change(1e-9, 2, 3)
            .with_store_iterations(StoreIterations::All);
        let solution = Solver::new(Arc::new(absorbing_chain()), config).unwrap().solve();
        assert!(solution.is_converged());

        // State 1 starts as a single point and never moves
        let second = solution.history.get(1).unwrap();
        assert_eq!(second.regimes[1], Regime::Fixed);
        assert_eq!(second.regimes[0], Regime::Recursive);

        let full: Vec<bool> = solution.history.iter().map(|s| s.full_sweep).collect();
        assert!(full[0]);
        assert!(!full[1]);
        assert!(full[2]);
        // Convergence is only declared on a full sweep
        assert!(*full.last().unwrap());
        assert_eq!(solution.state(1).regime, Regime::Fixed);
    }

    #[test]
    fn test_next_regime() {
        let config = SolverConfig::default().with_regime_change(1e-6, 2, 5);
        assert_eq!(next_regime(Regime::Recursive, 0, 1e-9, &config), (Regime::Recursive, 1));
        assert_eq!(next_regime(Regime::Recursive, 1, 1e-9, &config), (Regime::Fixed, 2));
        assert_eq!(next_regime(Regime::Fixed, 2, 1e-9, &config), (Regime::Fixed, 3));
        // A fixed state that moves on a re-check reverts
        assert_eq!(next_regime(Regime::Fixed, 3, 1e-3, &config), (Regime::Recursive, 0));
    }

    #[test]
    fn test_tolerances_are_independent() {
        let game = Arc::new(prisoners_dilemma::game(0.5));
        let base = SolverConfig::default().with_directions(16);
        let mut loose = base.clone().with_regime_change(1e-3, 1, 4);
        loose.pseudo_constraint_tol = 1e3;

        let reference = Solver::new(Arc::clone(&game), base).unwrap().solve();
        let relaxed = Solver::new(game, loose).unwrap().solve();
        assert!(reference.is_converged());
        assert!(relaxed.is_converged());

        // The binding threshold only changes reporting, never the bounds
        for d in &reference.directions {
            let a = reference.state(0).support(d).unwrap();
            let b = relaxed.state(0).support(d).unwrap();
            assert!((a - b).abs() < 1e-4, "{} vs {}", a, b);
        }
        for policy in relaxed.state(0).policies.iter().flatten() {
            assert_eq!(policy.binding, BindingStatus::Both);
        }
        // Early fixing does not let a partial sweep declare convergence
        assert!(relaxed.stats.movement_history.last().unwrap().full_sweep);
    }

    #[test]
    fn test_cancel_before_start() {
        let solver = Solver::new(Arc::new(single_action()), SolverConfig::default()).unwrap();
        solver.cancel_token().cancel();
        let solution = solver.solve();
        assert_eq!(solution.outcome, Outcome::Cancelled);
        assert_eq!(solution.stats.iterations, 0);
        assert!(!solution.is_converged());
    }

    #[test]
    fn test_cancel_from_callback() {
        let solver = Solver::new(Arc::new(absorbing_chain()), SolverConfig::default()).unwrap();
        let token = solver.cancel_token();
        let solution = solver.solve_with_callback(|progress| {
            if progress.iteration == 2 {
                token.cancel();
            }
        });
        assert_eq!(solution.outcome, Outcome::Cancelled);
        assert_eq!(solution.stats.iterations, 2);
    }

    #[test]
    fn test_cancel_token_clears_after_solve() {
        let solver = Solver::new(Arc::new(single_action()), SolverConfig::default()).unwrap();
        solver.cancel_token().cancel();
        assert_eq!(solver.solve().outcome, Outcome::Cancelled);
        assert!(!solver.cancel_token().is_cancelled());
        assert_eq!(solver.solve().outcome, Outcome::Converged);
    }

    #[test]
    fn test_rejects_three_players() {
        let game = Game::new(
            0.5,
            vec![vec![1, 1, 1]],
            vec![vec![vec![0.0, 0.0, 0.0]]],
            vec![vec![vec![1.0]]],
        )
        .unwrap();
        let err = Solver::new(Arc::new(game), SolverConfig::default()).err().unwrap();
        assert!(matches!(err, SolveError::UnsupportedPlayers(3)));
    }

    #[test]
    fn test_directions_include_axes() {
        let directions = generate_directions(2, 10, 1e-3);
        assert_eq!(directions.len(), 12);
        assert_eq!(directions[0], Point::new(vec![1.0, 0.0]));
        assert_eq!(directions[3], Point::new(vec![0.0, 1.0]));
        assert_eq!(directions[6], Point::new(vec![-1.0, 0.0]));
        assert_eq!(directions[9], Point::new(vec![0.0, -1.0]));
        assert!(directions.iter().all(|d| (d.norm() - 1.0).abs() < 1e-12));

        // Capped by the minimum rotation
        assert_eq!(generate_directions(2, 400, 0.1).len(), 60);
        assert_eq!(generate_directions(1, 400, 0.1).len(), 2);
    }

    #[test]
    fn test_minmax_threat_prisoners_dilemma() {
        let threat = minmax_threat(&prisoners_dilemma::game(0.5), 1e-12, 1000);
        assert!(threat[0].approx_eq(&Point::new(vec![0.0, 0.0]), 1e-9));
    }

    #[test]
    fn test_solution_json_round_trip() {
        let solution = Solver::new(Arc::new(absorbing_chain()), SolverConfig::default())
            .unwrap()
            .solve();
        let json = solution.to_json().unwrap();
        let back = Solution::from_json(&json).unwrap();
        assert_eq!(back.outcome, solution.outcome);
        assert_eq!(back.states.len(), 3);
        assert_eq!(back.state(2).extreme_points, solution.state(2).extreme_points);
        assert_eq!(back.threat, solution.threat);
    }

    #[test]
    fn test_fixed_thread_pool() {
        let config = SolverConfig::default().with_directions(8).with_threads(2);
        let solution = Solver::new(Arc::new(prisoners_dilemma::game(0.5)), config)
            .unwrap()
            .solve();
        assert!(solution.is_converged());
    }
}
