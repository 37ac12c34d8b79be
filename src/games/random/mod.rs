//! Randomly generated stochastic games.
//!
//! Useful for stress tests and benchmarks. Every player has the same number
//! of actions in every state, stage payoffs are uniform on `[0, 10)`,
//! transition rows are uniform draws normalized to sum to one, and the
//! discount factor is uniform on `[0.1, 0.9)` unless fixed by the caller.

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

use crate::equilibrium::{Game, GameError};

/// Shape and seed of a random game.
#[derive(Debug, Clone)]
pub struct RandomGame {
    /// Number of players.
    pub num_players: usize,
    /// Number of states.
    pub num_states: usize,
    /// Actions per player per state.
    pub num_actions: usize,
    /// Fixed discount factor; drawn when `None`.
    pub delta: Option<f64>,
    /// Random seed for reproducibility.
    pub seed: Option<u64>,
}

impl RandomGame {
    /// Create a generator with a random discount factor and no seed.
    pub fn new(num_players: usize, num_states: usize, num_actions: usize) -> Self {
        Self {
            num_players,
            num_states,
            num_actions,
            delta: None,
            seed: None,
        }
    }

    /// Builder method: fix the discount factor.
    pub fn with_delta(mut self, delta: f64) -> Self {
        self.delta = Some(delta);
        self
    }

    /// Builder method: set random seed.
    pub fn with_seed(mut self, seed: u64) -> Self {
        self.seed = Some(seed);
        self
    }

    /// Draw a game.
    pub fn generate(&self) -> Result<Game, GameError> {
        let mut rng = match self.seed {
            Some(seed) => StdRng::seed_from_u64(seed),
            None => StdRng::from_entropy(),
        };

        let delta = match self.delta {
            Some(delta) => delta,
            None => rng.gen_range(0.1..0.9),
        };
        let num_profiles = self.num_actions.pow(self.num_players as u32);

        let mut payoffs = Vec::with_capacity(self.num_states);
        let mut probabilities = Vec::with_capacity(self.num_states);
        for _ in 0..self.num_states {
            let state_payoffs: Vec<Vec<f64>> = (0..num_profiles)
                .map(|_| (0..self.num_players).map(|_| rng.gen_range(0.0..10.0)).collect())
                .collect();
            let state_probs: Vec<Vec<f64>> = (0..num_profiles)
                .map(|_| {
                    let draws: Vec<f64> = (0..self.num_states).map(|_| rng.gen::<f64>()).collect();
                    let total: f64 = draws.iter().sum();
                    if total > 0.0 {
                        draws.iter().map(|d| d / total).collect()
                    } else {
                        vec![1.0 / self.num_states as f64; self.num_states]
                    }
                })
                .collect();
            payoffs.push(state_payoffs);
            probabilities.push(state_probs);
        }

        Game::new(
            delta,
            vec![vec![self.num_actions; self.num_players]; self.num_states],
            payoffs,
            probabilities,
        )
    }
}
