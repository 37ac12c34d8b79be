//! # SG Solver
//!
//! Outer approximations of the pure-strategy subgame-perfect equilibrium
//! payoff sets of discounted stochastic games with perfect monitoring.
//!
//! ## Features
//!
//! - **Direction Search**: one linear program per (state, direction, action)
//! - **Three Variants**: feasible sets, a rising minmax threat, or a fixed one
//! - **Parallel Sweeps**: states and directions solved under rayon against a
//!   frozen snapshot
//! - **Regime Tracking**: settled states are skipped between full re-checks
//! - **JSON Output**: solutions, configs and iteration history serialize
//!
//! ## Quick Start
//!
//! ```
//! use std::sync::Arc;
//! use sg_solver::{Solver, SolverConfig};
//! use sg_solver::games::prisoners_dilemma;
//!
//! let game = Arc::new(prisoners_dilemma::game(0.5));
//! let solver = Solver::new(game, SolverConfig::fast().with_directions(16)).unwrap();
//! let solution = solver.solve();
//! assert!(solution.is_converged());
//! ```
//!
//! ## Modules
//!
//! - [`equilibrium`]: game model, geometry, LP backend and the solver
//! - [`games`]: example games (prisoners' dilemma, risk sharing, random)
//!
//! ## Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────────┐
//! │                        Solver / Session                         │
//! │  - Threat and seed boxes   - Regime tracking                    │
//! │  - Sweep and commit        - Convergence and history            │
//! └─────────────────────────────────────────────────────────────────┘
//!                               │
//!                               │ one oracle call per (state, direction)
//!                               ▼
//!         ┌─────────────────────┼─────────────────────┐
//!         │                     │                     │
//!         ▼                     ▼                     ▼
//!    ┌─────────┐         ┌─────────────┐        ┌───────────┐
//!    │ Bounding│         │  Direction  │        │  Action   │
//!    │  Sets   │         │   Oracle    │        │  Ledger   │
//!    └─────────┘         └─────────────┘        └───────────┘
//!                               │
//!                               ▼
//!                    LinearProgramSolver (DenseSimplex)
//! ```

#![warn(missing_docs)]

/// Stochastic game model and the equilibrium payoff solver.
///
/// This is the core module containing the outer approximation algorithm.
pub mod equilibrium;

/// Example games module.
///
/// Contains games like the prisoners' dilemma for testing and validation.
pub mod games;

// Re-export commonly used types at crate root for convenience
pub use equilibrium::{Game, Outcome, Point, Solution, Solver, SolverConfig, SolverMode, Tuple};
