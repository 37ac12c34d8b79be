//! Equilibrium payoff sets of stochastic games.
//!
//! This module computes, for every state of a discounted stochastic game, a
//! convex outer approximation of the payoffs that can be sustained by a
//! pure-strategy subgame-perfect equilibrium.
//!
//! # Overview
//!
//! The solver iterates an operator on a correspondence of sets, one per
//! state:
//! 1. Seed every state with a box between the minmax threat and the largest
//!    discounted stage payoff
//! 2. For each state and direction, find the furthest payoff that some
//!    action can generate today with continuation values taken from the
//!    current sets, subject to incentive constraints
//! 3. Cut each set with the resulting halfspaces and repeat until no level
//!    moves by more than the tolerance
//!
//! Payoffs are unnormalized: an action profile `a` with continuation `w`
//! yields `u(s, a) + delta * E[w]`.
//!
//! # Solver Modes
//!
//! - **Feasible**: self-generation only, giving the feasible payoff sets
//! - **MaxMinMax**: incentive constraints against a threat that rises with
//!   the lowest payoff left in each set
//! - **SelfGenerating**: incentive constraints against the fixed minmax threat
//!
//! # Example
//!
//! ```
//! use std::sync::Arc;
//! use sg_solver::equilibrium::{Solver, SolverConfig};
//! use sg_solver::games::prisoners_dilemma;
//!
//! let game = Arc::new(prisoners_dilemma::game(0.5));
//! let config = SolverConfig::fast().with_directions(16);
//! let solution = Solver::new(game, config).unwrap().solve();
//!
//! // Cooperating forever pays 2 / (1 - 0.5) to each player
//! let cooperate = sg_solver::equilibrium::Point::new(vec![4.0, 4.0]);
//! assert!(solution.state(0).contains(&cooperate, 1e-3));
//! ```
//!
//! # References
//!
//! - Abreu, D., Pearce, D., Stacchetti, E. "Toward a Theory of Discounted
//!   Repeated Games with Imperfect Monitoring" (1990)
//! - Judd, K., Yeltekin, S., Conklin, J. "Computing Supergame Equilibria" (2003)
//! - Abreu, D., Brooks, B., Sannikov, Y. "Algorithms for Stochastic Games
//!   with Perfect Monitoring" (2020)

pub mod bounds;
pub mod config;
pub mod error;
pub mod game;
pub mod geometry;
pub mod lp;
pub mod oracle;
pub mod policy;
pub mod solution;
pub mod solver;

// Re-export main types for convenient access
pub use bounds::{BoundingSet, Hyperplane};
pub use config::{MovementPoint, SolveStats, SolverConfig, SolverMode, StoreIterations};
pub use error::{ConfigError, GameError, SolveError};
pub use game::{Game, GameData};
pub use geometry::{Point, Tuple};
pub use lp::{
    Constraint, ConstraintSense, DenseSimplex, LinearProgram, LinearProgramSolver, LpSolution, LpStatus,
};
pub use oracle::{DirectionOracle, LpFailure, OracleResult, Support, SweepSnapshot};
pub use policy::{ActionLedger, ActionRecord, BindingStatus, Policy};
pub use solution::{IterationHistory, IterationSnapshot, Solution, StateSolution};
pub use solver::{
    generate_directions, minmax_threat, CancelToken, Outcome, Phase, Regime, SolveSession, Solver, SweepProgress,
};
