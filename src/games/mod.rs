//! Example stochastic games.
//!
//! These serve as:
//!
//! 1. **Validation**: games with known equilibrium payoffs (the repeated
//!    prisoners' dilemma) check that the solver is correct.
//!
//! 2. **Examples**: show how to build a [`Game`](crate::equilibrium::Game)
//!    from payoff and transition tables.
//!
//! 3. **Benchmarks**: standard inputs for performance testing and the CLI.
//!
//! ## Available Games
//!
//! - [`prisoners_dilemma`]: one- and two-state repeated prisoners' dilemma
//! - [`risk_sharing`]: two agents insuring each other against endowment shocks
//! - [`random`]: seeded random games of any shape

pub mod prisoners_dilemma;
pub mod random;
pub mod risk_sharing;
