//! Per-action and per-direction bookkeeping.
//!
//! The [`ActionLedger`] keeps one [`ActionRecord`] per (state, action profile)
//! that may be played on the equilibrium path: whether the action is still
//! feasible, the minimum expected continuation each player must receive for
//! the action to be incentive compatible, and how it was last supported. A
//! [`Policy`] is the action that supported the bound of one (state,
//! direction) pair in the latest sweep.

use rustc_hash::FxHashMap;
use serde::{Deserialize, Serialize};

use crate::equilibrium::config::SolverMode;
use crate::equilibrium::game::Game;
use crate::equilibrium::geometry::Tuple;

/// Which incentive constraints hold with equality at a supporting point.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum BindingStatus {
    /// No incentive constraint binds.
    #[default]
    NonBinding,
    /// Player 0's constraint binds.
    Player0,
    /// Player 1's constraint binds.
    Player1,
    /// Both constraints bind.
    Both,
}

impl BindingStatus {
    /// Build from per-player binding flags. Flags past player 1 are ignored.
    pub fn from_flags(flags: &[bool]) -> Self {
        let p0 = flags.first().copied().unwrap_or(false);
        let p1 = flags.get(1).copied().unwrap_or(false);
        match (p0, p1) {
            (false, false) => BindingStatus::NonBinding,
            (true, false) => BindingStatus::Player0,
            (false, true) => BindingStatus::Player1,
            (true, true) => BindingStatus::Both,
        }
    }

    /// Whether `player`'s constraint binds.
    pub fn binds(&self, player: usize) -> bool {
        matches!(
            (self, player),
            (BindingStatus::Player0, 0) | (BindingStatus::Player1, 1) | (BindingStatus::Both, 0 | 1)
        )
    }
}

/// Minimum expected continuation value per player for `profile` in `state`
/// to be incentive compatible against `threat`.
///
/// For player `i` this is the largest, over deviations `a_i' != a_i`, of
/// `(u_i(s, a') - u_i(s, a)) / delta + E[threat_i | s, a']`. Players with a
/// single action, or marked unconstrained, get `None`.
pub fn minimum_ic(game: &Game, state: usize, profile: usize, threat: &Tuple) -> Vec<Option<f64>> {
    let actions = game.profile_to_actions(state, profile);
    let counts = game.num_actions(state);
    let delta = game.delta();

    (0..game.num_players())
        .map(|player| {
            if counts[player] < 2 || game.is_unconstrained(player) {
                return None;
            }
            let on_path = game.payoff(state, profile)[player];
            let mut deviation = actions.clone();
            (0..counts[player])
                .filter(|&a| a != actions[player])
                .map(|a| {
                    deviation[player] = a;
                    let dev = game.actions_to_profile(state, &deviation);
                    (game.payoff(state, dev)[player] - on_path) / delta
                        + threat.expectation_coord(game.transition(state, dev), player)
                })
                .reduce(f64::max)
        })
        .collect()
}

/// Bookkeeping for one (state, action profile).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ActionRecord {
    /// State index.
    pub state: usize,
    /// Action profile index.
    pub action: usize,
    /// False once some LP over this action was infeasible. Never reset.
    pub feasible: bool,
    /// Minimum expected continuation per player; `None` where no incentive
    /// constraint applies.
    pub min_ic: Vec<Option<f64>>,
    /// Binding status the last time this action supported a bound.
    pub binding: BindingStatus,
    /// Continuation tuple the last time this action supported a bound.
    pub continuation: Option<Tuple>,
}

/// Supporting action of one (state, direction) pair.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Policy {
    /// State index.
    pub state: usize,
    /// Direction index.
    pub direction: usize,
    /// Supporting action profile.
    pub action: usize,
    /// Level achieved in the direction.
    pub level: f64,
    /// Incentive constraints that bind at the supporting point.
    pub binding: BindingStatus,
    /// Continuation values in every state.
    pub continuation: Tuple,
    /// Smallest incentive constraint slack; `None` when no constraint applied.
    pub min_ic_slack: Option<f64>,
}

/// All action records of a solve.
#[derive(Debug, Clone, Default)]
pub struct ActionLedger {
    records: FxHashMap<(usize, usize), ActionRecord>,
    num_players: usize,
}

impl ActionLedger {
    /// Create records for every equilibrium action of `game`, with incentive
    /// thresholds computed against `threat` under `mode`.
    pub fn new(game: &Game, threat: &Tuple, mode: SolverMode) -> Self {
        let capacity: usize = (0..game.num_states())
            .map(|s| game.equilibrium_actions(s).len())
            .sum();
        let mut records = FxHashMap::with_capacity_and_hasher(capacity, Default::default());
        for state in 0..game.num_states() {
            for &action in game.equilibrium_actions(state) {
                records.insert(
                    (state, action),
                    ActionRecord {
                        state,
                        action,
                        feasible: true,
                        min_ic: vec![None; game.num_players()],
                        binding: BindingStatus::NonBinding,
                        continuation: None,
                    },
                );
            }
        }
        let mut ledger = Self {
            records,
            num_players: game.num_players(),
        };
        ledger.update_min_ic(game, threat, mode);
        ledger
    }

    /// Recompute incentive thresholds against a new threat tuple. In
    /// [`SolverMode::Feasible`] no thresholds apply.
    pub fn update_min_ic(&mut self, game: &Game, threat: &Tuple, mode: SolverMode) {
        for record in self.records.values_mut() {
            record.min_ic = match mode {
                SolverMode::Feasible => vec![None; self.num_players],
                SolverMode::MaxMinMax | SolverMode::SelfGenerating => {
                    minimum_ic(game, record.state, record.action, threat)
                }
            };
        }
    }

    /// Record for (state, action), if the action is on the equilibrium path.
    pub fn get(&self, state: usize, action: usize) -> Option<&ActionRecord> {
        self.records.get(&(state, action))
    }

    /// Whether the action may still support a bound.
    pub fn is_feasible(&self, state: usize, action: usize) -> bool {
        self.get(state, action).is_some_and(|r| r.feasible)
    }

    /// Feasible actions of `state`, ascending.
    pub fn candidates(&self, game: &Game, state: usize) -> Vec<usize> {
        game.equilibrium_actions(state)
            .iter()
            .copied()
            .filter(|&a| self.is_feasible(state, a))
            .collect()
    }

    /// Drop an action from later sweeps. Returns true if it was feasible.
    pub fn mark_infeasible(&mut self, state: usize, action: usize) -> bool {
        match self.records.get_mut(&(state, action)) {
            Some(record) if record.feasible => {
                record.feasible = false;
                true
            }
            _ => false,
        }
    }

    /// Store how an action last supported a bound.
    pub fn record_support(&mut self, state: usize, action: usize, binding: BindingStatus, continuation: &Tuple) {
        if let Some(record) = self.records.get_mut(&(state, action)) {
            record.binding = binding;
            record.continuation = Some(continuation.clone());
        }
    }

    /// Number of feasible records.
    pub fn num_feasible(&self) -> usize {
        self.records.values().filter(|r| r.feasible).count()
    }

    /// All records ordered by (state, action).
    pub fn records(&self) -> Vec<ActionRecord> {
        let mut records: Vec<ActionRecord> = self.records.values().cloned().collect();
        records.sort_by_key(|r| (r.state, r.action));
        records
    }
}
