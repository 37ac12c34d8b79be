//! Direction support oracle.
//!
//! For one (state, direction) pair the oracle asks, for every candidate
//! action profile, how far in that direction a payoff can be pushed when the
//! action is played today and continuation values are drawn from the current
//! outer approximation. Each question is one linear program over the
//! continuation payoffs `w[s']` of every state:
//!
//! ```text
//! maximize    d . (u(s, a) + delta * sum_s' p(s'|s, a) w[s'])
//! subject to  e . w[s'] <= L           for every hyperplane (e, L) of state s'
//!             sum_s' p(s'|s, a) w[s'][i] >= minIC_i(s, a)   for constrained i
//! ```
//!
//! The best action over all candidates sets the new level. The oracle only
//! reads a [`SweepSnapshot`]; it never mutates solver state.

use std::sync::Arc;

use serde::{Deserialize, Serialize};

use crate::equilibrium::bounds::BoundingSet;
use crate::equilibrium::game::Game;
use crate::equilibrium::geometry::{Point, Tuple};
use crate::equilibrium::lp::{ConstraintSense, LinearProgram, LinearProgramSolver, LpStatus};
use crate::equilibrium::policy::{ActionLedger, BindingStatus};

/// Row ids at or above this value label incentive constraints; the player
/// index is the offset.
const IC_ROW_BASE: usize = usize::MAX / 2;

/// Frozen view of solver state shared by every worker of a sweep.
#[derive(Debug, Clone)]
pub struct SweepSnapshot {
    /// Outer approximation of every state.
    pub bounds: Arc<Vec<BoundingSet>>,
    /// Action feasibility and incentive thresholds.
    pub ledger: Arc<ActionLedger>,
}

/// An LP that ended with a status other than optimal.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LpFailure {
    /// State index.
    pub state: usize,
    /// Direction index.
    pub direction: usize,
    /// Direction vector.
    pub direction_vector: Point,
    /// Action profile whose LP failed.
    pub action: usize,
    /// Status reported by the backend.
    pub status: LpStatus,
}

/// Best support found for one (state, direction).
#[derive(Debug, Clone, PartialEq)]
pub struct Support {
    /// Supporting action profile.
    pub action: usize,
    /// Level to commit: the highest `d . v` over all candidates. It exceeds
    /// this action's own `d . payoff` by at most `tie_tol` when a tied action
    /// with more incentive slack was preferred.
    pub level: f64,
    /// Supporting payoff `v = u + delta * E[w]`.
    pub payoff: Point,
    /// Continuation values in every state.
    pub continuation: Tuple,
    /// Incentive constraints binding at the optimum.
    pub binding: BindingStatus,
    /// Smallest incentive slack, `+inf` when no constraint applied.
    pub min_ic_slack: f64,
}

/// Everything learned from one oracle call.
#[derive(Debug, Clone)]
pub struct OracleResult {
    /// State index.
    pub state: usize,
    /// Direction index.
    pub direction: usize,
    /// Best support, or `None` when every candidate failed.
    pub support: Option<Support>,
    /// Actions whose LP was infeasible.
    pub infeasible_actions: Vec<usize>,
    /// Every non-optimal LP.
    pub failures: Vec<LpFailure>,
    /// Number of LPs solved.
    pub lps_solved: usize,
}

/// Builds and solves the per-action programs for a (state, direction).
pub struct DirectionOracle<'a> {
    game: &'a Game,
    lp_solver: &'a dyn LinearProgramSolver,
    pseudo_constraint_tol: f64,
    tie_tol: f64,
}

impl<'a> DirectionOracle<'a> {
    /// Create an oracle.
    pub fn new(
        game: &'a Game,
        lp_solver: &'a dyn LinearProgramSolver,
        pseudo_constraint_tol: f64,
        tie_tol: f64,
    ) -> Self {
        Self {
            game,
            lp_solver,
            pseudo_constraint_tol,
            tie_tol,
        }
    }

    /// Find the best supportable level in `direction` for `state`.
    pub fn support(
        &self,
        snapshot: &SweepSnapshot,
        state: usize,
        direction_index: usize,
        direction: &Point,
    ) -> OracleResult {
        let mut result = OracleResult {
            state,
            direction: direction_index,
            support: None,
            infeasible_actions: Vec::new(),
            failures: Vec::new(),
            lps_solved: 0,
        };
        let mut highest = f64::NEG_INFINITY;

        for action in snapshot.ledger.candidates(self.game, state) {
            let min_ic = snapshot
                .ledger
                .get(state, action)
                .map(|r| r.min_ic.clone())
                .unwrap_or_default();
            let lp = self.build(&snapshot.bounds, state, action, direction, &min_ic);
            let solution = self.lp_solver.solve(&lp);
            result.lps_solved += 1;

            if !solution.is_optimal() {
                if solution.status == LpStatus::Infeasible {
                    result.infeasible_actions.push(action);
                }
                log::debug!(
                    "LP for state {} direction {} action {} ended {:?}",
                    state,
                    direction_index,
                    action,
                    solution.status
                );
                result.failures.push(LpFailure {
                    state,
                    direction: direction_index,
                    direction_vector: direction.clone(),
                    action,
                    status: solution.status,
                });
                continue;
            }

            let candidate = self.candidate(state, action, direction, &min_ic, &solution.point);
            highest = highest.max(candidate.level);
            let better = match &result.support {
                None => true,
                Some(best) => {
                    candidate.level > best.level + self.tie_tol
                        || (candidate.level >= best.level - self.tie_tol
                            && candidate.min_ic_slack > best.min_ic_slack + self.tie_tol)
                }
            };
            if better {
                result.support = Some(candidate);
            }
        }

        // A cut below any candidate would drop its payoff from the set
        if let Some(best) = result.support.as_mut() {
            best.level = best.level.max(highest);
        }
        result
    }

    /// Assemble the program for one action.
    pub fn build(
        &self,
        bounds: &[BoundingSet],
        state: usize,
        action: usize,
        direction: &Point,
        min_ic: &[Option<f64>],
    ) -> LinearProgram {
        let n = self.game.num_players();
        let num_vars = n * self.game.num_states();
        let delta = self.game.delta();
        let probs = self.game.transition(state, action);

        let mut objective = vec![0.0; num_vars];
        for (next, &p) in probs.iter().enumerate() {
            for i in 0..n {
                objective[next * n + i] = delta * p * direction[i];
            }
        }
        let mut lp = LinearProgram::new(objective);

        let mut row_id = 0;
        for (next, set) in bounds.iter().enumerate() {
            for h in set.hyperplanes() {
                let mut row = vec![0.0; num_vars];
                row[next * n..(next + 1) * n].copy_from_slice(h.direction.coords());
                lp.add_constraint(row_id, row, ConstraintSense::LessEqual, h.level);
                row_id += 1;
            }
        }

        for (player, threshold) in min_ic.iter().enumerate() {
            if let Some(threshold) = threshold {
                let mut row = vec![0.0; num_vars];
                for (next, &p) in probs.iter().enumerate() {
                    row[next * n + player] = p;
                }
                lp.add_constraint(IC_ROW_BASE + player, row, ConstraintSense::GreaterEqual, *threshold);
            }
        }

        lp
    }

    fn candidate(
        &self,
        state: usize,
        action: usize,
        direction: &Point,
        min_ic: &[Option<f64>],
        x: &[f64],
    ) -> Support {
        let n = self.game.num_players();
        let continuation = Tuple::new(x.chunks(n).map(|w| Point::new(w.to_vec())).collect());
        let probs = self.game.transition(state, action);
        let payoff = self.game.payoff(state, action) + &(continuation.expectation(probs) * self.game.delta());

        let mut binding = vec![false; n];
        let mut min_ic_slack = f64::INFINITY;
        for (player, threshold) in min_ic.iter().enumerate() {
            if let Some(threshold) = threshold {
                let slack = continuation.expectation_coord(probs, player) - threshold;
                binding[player] = slack <= self.pseudo_constraint_tol;
                min_ic_slack = min_ic_slack.min(slack);
            }
        }

        Support {
            action,
            level: payoff.dot(direction),
            payoff,
            continuation,
            binding: BindingStatus::from_flags(&binding),
            min_ic_slack,
        }
    }
}
