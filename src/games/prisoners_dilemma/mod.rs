//! Prisoners' dilemma, repeated and with two states.
//!
//! ## Stage Game
//!
//! Action 0 is Cooperate, action 1 is Defect. Player 0's action varies
//! fastest in the profile index.
//!
//! ```text
//!               P1 Cooperate   P1 Defect
//! P0 Cooperate     (2, 2)       (-1, 3)
//! P0 Defect        (3, -1)      (0, 0)
//! ```
//!
//! Mutual defection is the unique stage Nash equilibrium and gives each
//! player their minmax payoff of 0. Mutual cooperation forever, worth
//! `2 / (1 - delta)` to each player, is an equilibrium outcome once
//! `delta >= 1/3`.
//!
//! ## Two-State Variant
//!
//! State 1 adds 2 to every payoff of state 0. Matching actions switch the
//! state with probability 2/3; mismatched actions move to either state with
//! equal probability.

use crate::equilibrium::Game;

/// Cooperate.
pub const COOPERATE: usize = 0;
/// Defect.
pub const DEFECT: usize = 1;

/// Stage payoffs indexed by profile.
fn stage_payoffs(bonus: f64) -> Vec<Vec<f64>> {
    vec![
        vec![2.0 + bonus, 2.0 + bonus],
        vec![3.0 + bonus, -1.0 + bonus],
        vec![-1.0 + bonus, 3.0 + bonus],
        vec![bonus, bonus],
    ]
}

/// Profile index for a pair of actions.
pub fn profile(player0: usize, player1: usize) -> usize {
    player0 + 2 * player1
}

/// The one-state repeated prisoners' dilemma.
///
/// # Panics
/// If `delta` is outside (0, 1).
pub fn game(delta: f64) -> Game {
    match Game::new(delta, vec![vec![2, 2]], vec![stage_payoffs(0.0)], vec![vec![vec![1.0]; 4]]) {
        Ok(game) => game,
        Err(err) => panic!("invalid prisoners' dilemma: {}", err),
    }
}

/// The two-state prisoners' dilemma.
///
/// # Panics
/// If `delta` is outside (0, 1).
pub fn two_state(delta: f64) -> Game {
    let transitions = |to_first: f64, to_second: f64| -> Vec<Vec<f64>> {
        (0..4)
            .map(|p| {
                if p == profile(COOPERATE, COOPERATE) || p == profile(DEFECT, DEFECT) {
                    vec![to_first, to_second]
                } else {
                    vec![0.5, 0.5]
                }
            })
            .collect()
    };
    let state0 = transitions(1.0 / 3.0, 2.0 / 3.0);
    let state1 = transitions(2.0 / 3.0, 1.0 / 3.0);

    match Game::new(
        delta,
        vec![vec![2, 2]; 2],
        vec![stage_payoffs(0.0), stage_payoffs(2.0)],
        vec![state0, state1],
    ) {
        Ok(game) => game,
        Err(err) => panic!("invalid two-state prisoners' dilemma: {}", err),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::equilibrium::{Point, Solver, SolverConfig, SolverMode};
    use std::sync::Arc;

    fn config() -> SolverConfig {
        SolverConfig::default().with_directions(16)
    }

    #[test]
    fn test_stage_payoffs() {
        let game = game(0.5);
        assert_eq!(game.payoff(0, profile(DEFECT, COOPERATE)), &Point::new(vec![3.0, -1.0]));
        assert_eq!(game.payoff(0, profile(COOPERATE, DEFECT)), &Point::new(vec![-1.0, 3.0]));
        assert_eq!(game.profile_to_actions(0, profile(DEFECT, COOPERATE)), vec![DEFECT, COOPERATE]);
    }

    #[test]
    fn test_cooperation_is_sustained() {
        let solution = Solver::new(Arc::new(game(0.5)), config()).unwrap().solve();
        assert!(solution.is_converged());

        let state = solution.state(0);
        assert!(state.contains(&Point::new(vec![4.0, 4.0]), 1e-6));
        assert!(state.contains(&Point::new(vec![0.0, 0.0]), 1e-6));
        // Nothing beats mutual cooperation on the diagonal
        assert!(!state.contains(&Point::new(vec![4.1, 4.1]), 1e-6));
        assert!(!state.contains(&Point::new(vec![6.0, 6.0]), 1e-6));
        // Nobody gets less than their minmax payoff
        assert!(!state.contains(&Point::new(vec![-0.5, 4.0]), 1e-6));
    }

    #[test]
    fn test_patience_threshold() {
        // Below delta = 1/3 only mutual defection survives
        let solution = Solver::new(Arc::new(game(0.25)), config()).unwrap().solve();
        assert!(solution.is_converged());
        for p in &solution.state(0).extreme_points {
            assert!(p.approx_eq(&Point::new(vec![0.0, 0.0]), 1e-4), "unexpected point {}", p);
        }
    }

    #[test]
    fn test_feasible_mode_is_larger() {
        let feasible = Solver::new(Arc::new(game(0.5)), config().with_mode(SolverMode::Feasible))
            .unwrap()
            .solve();
        assert!(feasible.is_converged());
        // Feasible payoffs include the sucker outcome forever
        assert!(feasible.state(0).contains(&Point::new(vec![-2.0, 6.0]), 1e-6));
    }

    #[test]
    fn test_two_state_game() {
        let game = two_state(2.0 / 3.0);
        assert_eq!(game.num_states(), 2);
        assert_eq!(game.transition(0, profile(COOPERATE, COOPERATE)), &[1.0 / 3.0, 2.0 / 3.0]);

        let solution = Solver::new(Arc::new(game), config()).unwrap().solve();
        assert!(solution.is_converged());
        for state in &solution.states {
            assert!(!state.extreme_points.is_empty());
        }
    }
}
