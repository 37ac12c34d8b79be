//! Risk sharing between two agents with stochastic endowments.
//!
//! There is one unit of a good each period. In state `e` player 0 is endowed
//! with `E[e] = e / (n - 1)` and player 1 with the rest. Each player chooses
//! how much to hand to the other, in steps of `1 / ((n - 1) * c2e + 1)`, and
//! utility is the square root of consumption. Giving is never a stage best
//! response, so any sharing has to be sustained by the threat of reverting
//! to autarky.
//!
//! Only profiles where at most one player gives are played on the
//! equilibrium path; the others are deviations only.
//!
//! Next period's endowment is drawn around a mode with a symmetric
//! exponential kernel. The mode is either this period's consumption
//! ([`EndowmentMode::Consumption`]) or this period's endowment
//! ([`EndowmentMode::Endowment`]).

use serde::{Deserialize, Serialize};

use crate::equilibrium::{Game, GameError};

/// What the endowment distribution is centered on.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum EndowmentMode {
    /// Player 0's consumption after transfers.
    Consumption,
    /// Player 0's endowment before transfers.
    Endowment,
}

/// Parameters of the risk sharing game.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RiskSharing {
    /// Number of endowment states, at least 2.
    pub num_endowments: usize,
    /// Transfer steps per endowment step.
    pub c2e: usize,
    /// Decay of the endowment kernel. Zero gives a linear kernel.
    pub persistence: f64,
    /// Center of the kernel.
    pub mode: EndowmentMode,
}

impl Default for RiskSharing {
    fn default() -> Self {
        Self {
            num_endowments: 3,
            c2e: 1,
            persistence: 2.0,
            mode: EndowmentMode::Endowment,
        }
    }
}

impl RiskSharing {
    /// Create a parameter set.
    pub fn new(num_endowments: usize, c2e: usize, persistence: f64, mode: EndowmentMode) -> Self {
        Self {
            num_endowments,
            c2e,
            persistence,
            mode,
        }
    }

    fn endowment(&self, e: usize) -> f64 {
        e as f64 / (self.num_endowments - 1) as f64
    }

    fn consumption_step(&self) -> f64 {
        1.0 / ((self.num_endowments - 1) * self.c2e + 1) as f64
    }

    fn cdf(&self, x: f64) -> f64 {
        if self.persistence > 0.0 {
            1.0 - (-self.persistence * x.max(0.0)).exp()
        } else {
            x
        }
    }

    /// Unnormalized weight of moving to `next` from kernel center `mode`.
    fn kernel(&self, mode: f64, next: usize) -> f64 {
        let half_step = 0.5 * self.endowment(1);
        let gap = self.endowment(next) - mode;
        self.cdf(gap + half_step) - self.cdf(gap - half_step) + self.cdf(-gap + half_step)
            - self.cdf(-gap - half_step)
    }

    /// Build the game.
    ///
    /// # Errors
    /// [`GameError::InvalidParameter`] with fewer than two endowment states
    /// or a negative persistence, plus anything [`Game::new`] rejects.
    pub fn game(&self, delta: f64) -> Result<Game, GameError> {
        if self.num_endowments < 2 {
            return Err(GameError::InvalidParameter {
                name: "num_endowments",
                value: self.num_endowments as f64,
            });
        }
        if !(self.persistence >= 0.0 && self.persistence.is_finite()) {
            return Err(GameError::InvalidParameter {
                name: "persistence",
                value: self.persistence,
            });
        }

        let n = self.num_endowments;
        let step = self.consumption_step();
        let mut num_actions = Vec::with_capacity(n);
        let mut payoffs = Vec::with_capacity(n);
        let mut probabilities = Vec::with_capacity(n);
        let mut equilibrium_actions = Vec::with_capacity(n);

        for e in 0..n {
            let counts = [e * self.c2e + 1, (n - e - 1) * self.c2e + 1];
            let mut state_payoffs = Vec::with_capacity(counts[0] * counts[1]);
            let mut state_probs = Vec::with_capacity(counts[0] * counts[1]);
            let mut on_path = Vec::new();

            for a1 in 0..counts[1] {
                for a0 in 0..counts[0] {
                    let transfer = a1 as f64 - a0 as f64;
                    let c = (self.endowment(e) + transfer * step).clamp(0.0, 1.0);
                    state_payoffs.push(vec![c.sqrt(), (1.0 - c).sqrt()]);

                    let mode = match self.mode {
                        EndowmentMode::Consumption => c,
                        EndowmentMode::Endowment => self.endowment(e),
                    };
                    let weights: Vec<f64> = (0..n).map(|next| self.kernel(mode, next)).collect();
                    let total: f64 = weights.iter().sum();
                    state_probs.push(weights.iter().map(|w| w / total).collect());

                    if a0 == 0 || a1 == 0 {
                        on_path.push(a0 + a1 * counts[0]);
                    }
                }
            }

            num_actions.push(counts.to_vec());
            payoffs.push(state_payoffs);
            probabilities.push(state_probs);
            equilibrium_actions.push(on_path);
        }

        Game::new(delta, num_actions, payoffs, probabilities)?.with_equilibrium_actions(equilibrium_actions)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::equilibrium::{Solver, SolverConfig};
    use std::sync::Arc;

    #[test]
    fn test_dimensions() {
        let game = RiskSharing::default().game(0.7).unwrap();
        assert_eq!(game.num_states(), 3);
        assert_eq!(game.num_actions(0), &[1, 3]);
        assert_eq!(game.num_actions(1), &[2, 2]);
        assert_eq!(game.num_actions(2), &[3, 1]);
        // Both giving at once is never on path
        assert_eq!(game.equilibrium_actions(1), &[0, 1, 2]);
    }

    #[test]
    fn test_payoffs_share_the_good() {
        let game = RiskSharing::default().game(0.7).unwrap();
        // Middle state, nobody gives: half each
        let autarky = game.payoff(1, 0);
        assert!((autarky[0] - 0.5f64.sqrt()).abs() < 1e-12);
        assert!((autarky[1] - 0.5f64.sqrt()).abs() < 1e-12);
        // Player 1 gives one step to player 0
        let given = game.payoff(1, 2);
        assert!(given[0] > autarky[0]);
        assert!(given[1] < autarky[1]);
    }

    #[test]
    fn test_consumption_mode_moves_endowment() {
        let rs = RiskSharing::new(3, 1, 2.0, EndowmentMode::Consumption);
        let game = rs.game(0.7).unwrap();
        // Player 1 hands over everything it can in state 0
        let generous = game.transition(0, 2);
        let stingy = game.transition(0, 0);
        assert!(generous[2] > stingy[2]);
    }

    #[test]
    fn test_rejects_bad_parameters() {
        let single = RiskSharing::new(1, 1, 2.0, EndowmentMode::Endowment);
        assert!(matches!(
            single.game(0.7),
            Err(GameError::InvalidParameter { name: "num_endowments", .. })
        ));
        let negative = RiskSharing::new(3, 1, -1.0, EndowmentMode::Endowment);
        assert!(matches!(
            negative.game(0.7),
            Err(GameError::InvalidParameter { name: "persistence", .. })
        ));
    }

    #[test]
    fn test_solve_converges() {
        let game = RiskSharing::default().game(0.7).unwrap();
        let config = SolverConfig::default().with_directions(8);
        let solution = Solver::new(Arc::new(game), config).unwrap().solve();
        assert!(solution.is_converged());
        for state in &solution.states {
            assert!(!state.extreme_points.is_empty());
            // Autarky forever is an equilibrium in every state
            assert!(state.contains(&solution.threat[state.state], 1e-6));
        }
    }
}
