//! Stochastic game model.
//!
//! A [`Game`] is the read-only input of a solve: states, players, per-state
//! action sets, stage payoffs, transition probabilities and the discount
//! factor. It is validated once at construction and never mutated, so a single
//! instance can be shared by every worker of a solve and by concurrent solves.
//!
//! Action profiles are flattened to a single index in mixed radix with player
//! 0 varying fastest: for two players, `profile = a0 + a1 * num_actions[0]`.

use serde::{Deserialize, Serialize};

use crate::equilibrium::error::GameError;
use crate::equilibrium::geometry::Point;

/// Tolerance used when checking that transition rows sum to one.
pub const PROBABILITY_TOL: f64 = 1e-9;

/// An immutable, validated stochastic game.
///
/// # Example
/// ```
/// use sg_solver::equilibrium::Game;
///
/// // One state, one player with a single action paying 1.0 forever.
/// let game = Game::new(0.9, vec![vec![1]], vec![vec![vec![1.0]]], vec![vec![vec![1.0]]]).unwrap();
/// assert_eq!(game.num_states(), 1);
/// assert_eq!(game.num_players(), 1);
/// ```
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(try_from = "GameData", into = "GameData")]
pub struct Game {
    delta: f64,
    num_players: usize,
    num_states: usize,
    num_actions: Vec<Vec<usize>>,
    num_profiles: Vec<usize>,
    payoffs: Vec<Vec<Point>>,
    probabilities: Vec<Vec<Vec<f64>>>,
    equilibrium_actions: Vec<Vec<usize>>,
    unconstrained: Vec<bool>,
}

/// Unvalidated wire form of a [`Game`].
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GameData {
    /// Discount factor.
    pub delta: f64,
    /// `num_actions[state][player]`.
    pub num_actions: Vec<Vec<usize>>,
    /// `payoffs[state][profile][player]`.
    pub payoffs: Vec<Vec<Vec<f64>>>,
    /// `probabilities[state][profile][next_state]`.
    pub probabilities: Vec<Vec<Vec<f64>>>,
    /// Profiles allowed on the equilibrium path, per state. Empty means all.
    #[serde(default)]
    pub equilibrium_actions: Vec<Vec<usize>>,
    /// Players whose incentive constraints are ignored. Empty means none.
    #[serde(default)]
    pub unconstrained: Vec<bool>,
}

impl TryFrom<GameData> for Game {
    type Error = GameError;

    fn try_from(data: GameData) -> Result<Self, GameError> {
        let mut game = Game::new(data.delta, data.num_actions, data.payoffs, data.probabilities)?;
        if !data.equilibrium_actions.is_empty() {
            game = game.with_equilibrium_actions(data.equilibrium_actions)?;
        }
        if !data.unconstrained.is_empty() {
            game = game.with_unconstrained(data.unconstrained)?;
        }
        Ok(game)
    }
}

impl From<Game> for GameData {
    fn from(game: Game) -> Self {
        GameData {
            delta: game.delta,
            num_actions: game.num_actions,
            payoffs: game
                .payoffs
                .into_iter()
                .map(|row| row.into_iter().map(Point::into_coords).collect())
                .collect(),
            probabilities: game.probabilities,
            equilibrium_actions: game.equilibrium_actions,
            unconstrained: game.unconstrained,
        }
    }
}

impl Game {
    /// Build and validate a game.
    ///
    /// # Arguments
    /// * `delta` - Discount factor in (0, 1)
    /// * `num_actions` - `num_actions[state][player]`
    /// * `payoffs` - `payoffs[state][profile][player]`
    /// * `probabilities` - `probabilities[state][profile][next_state]`
    ///
    /// # Errors
    /// Any dimension mismatch, non-finite payoff, negative probability or
    /// transition row that does not sum to one.
    pub fn new(
        delta: f64,
        num_actions: Vec<Vec<usize>>,
        payoffs: Vec<Vec<Vec<f64>>>,
        probabilities: Vec<Vec<Vec<f64>>>,
    ) -> Result<Self, GameError> {
        if !(delta > 0.0 && delta < 1.0) {
            return Err(GameError::InvalidDiscount(delta));
        }

        let num_states = num_actions.len();
        let num_players = num_actions.first().map_or(0, Vec::len);
        if num_states == 0 || num_players == 0 {
            return Err(GameError::Empty);
        }

        check_len("payoff table", 0, num_states, payoffs.len())?;
        check_len("transition table", 0, num_states, probabilities.len())?;

        let mut num_profiles = Vec::with_capacity(num_states);
        let mut points = Vec::with_capacity(num_states);

        for state in 0..num_states {
            check_len("action counts", state, num_players, num_actions[state].len())?;
            for (player, &count) in num_actions[state].iter().enumerate() {
                if count == 0 {
                    return Err(GameError::NoActions { state, player });
                }
            }

            let profiles: usize = num_actions[state].iter().product();
            check_len("payoff profiles", state, profiles, payoffs[state].len())?;
            check_len("transition profiles", state, profiles, probabilities[state].len())?;

            let mut state_points = Vec::with_capacity(profiles);
            for action in 0..profiles {
                let payoff = &payoffs[state][action];
                check_len("payoff vector", state, num_players, payoff.len())?;
                if payoff.iter().any(|x| !x.is_finite()) {
                    return Err(GameError::NonFinitePayoff { state, action });
                }
                state_points.push(Point::new(payoff.clone()));

                let row = &probabilities[state][action];
                check_len("transition row", state, num_states, row.len())?;
                for (next, &value) in row.iter().enumerate() {
                    if !value.is_finite() || value < 0.0 {
                        return Err(GameError::InvalidProbability { state, action, next, value });
                    }
                }
                let sum: f64 = row.iter().sum();
                if (sum - 1.0).abs() > PROBABILITY_TOL {
                    return Err(GameError::ProbabilitySum { state, action, sum });
                }
            }

            num_profiles.push(profiles);
            points.push(state_points);
        }

        let equilibrium_actions = num_profiles.iter().map(|&n| (0..n).collect()).collect();

        Ok(Self {
            delta,
            num_players,
            num_states,
            num_actions,
            num_profiles,
            payoffs: points,
            probabilities,
            equilibrium_actions,
            unconstrained: vec![false; num_players],
        })
    }

    /// Restrict the profiles that may be played on the equilibrium path.
    ///
    /// Deviations and punishments still range over all actions.
    pub fn with_equilibrium_actions(mut self, actions: Vec<Vec<usize>>) -> Result<Self, GameError> {
        check_len("equilibrium actions", 0, self.num_states, actions.len())?;
        let mut cleaned = Vec::with_capacity(self.num_states);
        for (state, mut list) in actions.into_iter().enumerate() {
            if let Some(&action) = list.iter().find(|&&a| a >= self.num_profiles[state]) {
                return Err(GameError::ActionOutOfRange { state, action });
            }
            list.sort_unstable();
            list.dedup();
            cleaned.push(list);
        }
        self.equilibrium_actions = cleaned;
        Ok(self)
    }

    /// Mark players whose incentive constraints are never imposed.
    pub fn with_unconstrained(mut self, unconstrained: Vec<bool>) -> Result<Self, GameError> {
        check_len("unconstrained flags", 0, self.num_players, unconstrained.len())?;
        self.unconstrained = unconstrained;
        Ok(self)
    }

    /// Discount factor.
    pub fn delta(&self) -> f64 {
        self.delta
    }

    /// Number of players.
    pub fn num_players(&self) -> usize {
        self.num_players
    }

    /// Number of states.
    pub fn num_states(&self) -> usize {
        self.num_states
    }

    /// Per-player action counts in `state`.
    pub fn num_actions(&self, state: usize) -> &[usize] {
        &self.num_actions[state]
    }

    /// Number of action profiles in `state`.
    pub fn num_action_profiles(&self, state: usize) -> usize {
        self.num_profiles[state]
    }

    /// Stage payoff of `profile` in `state`.
    pub fn payoff(&self, state: usize, profile: usize) -> &Point {
        &self.payoffs[state][profile]
    }

    /// Probability of moving to `next` after `profile` in `state`.
    pub fn probability(&self, state: usize, profile: usize, next: usize) -> f64 {
        self.probabilities[state][profile][next]
    }

    /// Full transition row after `profile` in `state`.
    pub fn transition(&self, state: usize, profile: usize) -> &[f64] {
        &self.probabilities[state][profile]
    }

    /// Profiles allowed on the equilibrium path in `state`, ascending.
    pub fn equilibrium_actions(&self, state: usize) -> &[usize] {
        &self.equilibrium_actions[state]
    }

    /// Whether `player`'s incentive constraints are ignored.
    pub fn is_unconstrained(&self, player: usize) -> bool {
        self.unconstrained[player]
    }

    /// Split a profile index into per-player actions.
    pub fn profile_to_actions(&self, state: usize, profile: usize) -> Vec<usize> {
        let mut rest = profile;
        self.num_actions[state]
            .iter()
            .map(|&n| {
                let a = rest % n;
                rest /= n;
                a
            })
            .collect()
    }

    /// Join per-player actions into a profile index.
    pub fn actions_to_profile(&self, state: usize, actions: &[usize]) -> usize {
        let mut profile = 0;
        let mut stride = 1;
        for (a, &n) in actions.iter().zip(&self.num_actions[state]) {
            profile += a * stride;
            stride *= n;
        }
        profile
    }

    /// Per-player bounds on stage payoffs over all states and profiles.
    ///
    /// # Returns
    /// `(lower, upper)` points.
    pub fn payoff_bounds(&self) -> (Point, Point) {
        let mut lower = Point::splat(self.num_players, f64::INFINITY);
        let mut upper = Point::splat(self.num_players, f64::NEG_INFINITY);
        for point in self.payoffs.iter().flatten() {
            lower = lower.min(point);
            upper = upper.max(point);
        }
        (lower, upper)
    }
}

fn check_len(what: &'static str, state: usize, expected: usize, found: usize) -> Result<(), GameError> {
    if expected != found {
        return Err(GameError::DimensionMismatch { what, state, expected, found });
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn two_by_two() -> Game {
        Game::new(
            0.5,
            vec![vec![2, 3]],
            vec![vec![
                vec![0.0, 0.0],
                vec![1.0, 0.0],
                vec![0.0, 1.0],
                vec![1.0, 1.0],
                vec![2.0, 0.0],
                vec![0.0, 2.0],
            ]],
            vec![vec![vec![1.0]; 6]],
        )
        .unwrap()
    }

    #[test]
    fn test_profile_indexing() {
        let game = two_by_two();
        assert_eq!(game.num_action_profiles(0), 6);
        for profile in 0..6 {
            let actions = game.profile_to_actions(0, profile);
            assert_eq!(game.actions_to_profile(0, &actions), profile);
        }
        // Player 0 varies fastest
        assert_eq!(game.profile_to_actions(0, 1), vec![1, 0]);
        assert_eq!(game.profile_to_actions(0, 2), vec![0, 1]);
    }

    #[test]
    fn test_payoff_bounds() {
        let (lower, upper) = two_by_two().payoff_bounds();
        assert_eq!(lower, Point::new(vec![0.0, 0.0]));
        assert_eq!(upper, Point::new(vec![2.0, 2.0]));
    }

    #[test]
    fn test_rejects_bad_discount() {
        let err = Game::new(1.0, vec![vec![1]], vec![vec![vec![0.0]]], vec![vec![vec![1.0]]]);
        assert_eq!(err.unwrap_err(), GameError::InvalidDiscount(1.0));
    }

    #[test]
    fn test_rejects_probability_sum() {
        let err = Game::new(
            0.9,
            vec![vec![1], vec![1]],
            vec![vec![vec![0.0]], vec![vec![0.0]]],
            vec![vec![vec![0.5, 0.4]], vec![vec![0.0, 1.0]]],
        )
        .unwrap_err();
        assert!(matches!(err, GameError::ProbabilitySum { state: 0, action: 0, .. }));
    }

    #[test]
    fn test_rejects_negative_probability() {
        let err = Game::new(
            0.9,
            vec![vec![1], vec![1]],
            vec![vec![vec![0.0]], vec![vec![0.0]]],
            vec![vec![vec![1.0, 0.0]], vec![vec![-0.5, 1.5]]],
        )
        .unwrap_err();
        assert!(matches!(err, GameError::InvalidProbability { state: 1, next: 0, .. }));
    }

    #[test]
    fn test_rejects_dimension_mismatch() {
        // Declares two actions but supplies one payoff row
        let err = Game::new(0.9, vec![vec![2]], vec![vec![vec![0.0]]], vec![vec![vec![1.0]; 2]])
            .unwrap_err();
        assert!(matches!(err, GameError::DimensionMismatch { what: "payoff profiles", .. }));
    }

    #[test]
    fn test_equilibrium_actions_validated() {
        let game = two_by_two();
        assert_eq!(game.equilibrium_actions(0), &[0, 1, 2, 3, 4, 5]);

        let restricted = two_by_two().with_equilibrium_actions(vec![vec![3, 0, 3]]).unwrap();
        assert_eq!(restricted.equilibrium_actions(0), &[0, 3]);

        let err = two_by_two().with_equilibrium_actions(vec![vec![6]]).unwrap_err();
        assert_eq!(err, GameError::ActionOutOfRange { state: 0, action: 6 });
    }

    #[test]
    fn test_serde_round_trip_revalidates() {
        let game = two_by_two().with_unconstrained(vec![true, false]).unwrap();
        let json = serde_json::to_string(&game).unwrap();
        let back: Game = serde_json::from_str(&json).unwrap();
        assert!(back.is_unconstrained(0));
        assert_eq!(back.payoff(0, 4), game.payoff(0, 4));

        let broken = json.replace("\"delta\":0.5", "\"delta\":1.5");
        assert!(serde_json::from_str::<Game>(&broken).is_err());
    }
}
