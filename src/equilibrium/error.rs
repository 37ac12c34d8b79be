//! Error types for game construction, configuration and solving.
//!
//! Only conditions that stop a solve before it starts are errors. Per-action LP
//! failures and per-state infeasibility are recoverable and are reported as data
//! on the [`Solution`](crate::equilibrium::Solution) instead.

use thiserror::Error;

/// Errors raised while building a [`Game`](crate::equilibrium::Game).
#[derive(Debug, Clone, Error, PartialEq)]
pub enum GameError {
    /// Discount factor outside the open interval (0, 1).
    #[error("discount factor {0} is out of range (0, 1)")]
    InvalidDiscount(f64),

    /// A parameter of a generated game is out of range.
    #[error("game parameter {name} = {value} is out of range")]
    InvalidParameter {
        /// Parameter name.
        name: &'static str,
        /// Offending value.
        value: f64,
    },

    /// The game has no states or no players.
    #[error("game must have at least one state and one player")]
    Empty,

    /// A player has no actions in some state.
    #[error("player {player} has no actions in state {state}")]
    NoActions {
        /// State index.
        state: usize,
        /// Player index.
        player: usize,
    },

    /// Table sizes disagree with the declared action counts.
    #[error("dimension mismatch in {what} at state {state}: expected {expected}, found {found}")]
    DimensionMismatch {
        /// Which table is malformed.
        what: &'static str,
        /// State index.
        state: usize,
        /// Expected length.
        expected: usize,
        /// Actual length.
        found: usize,
    },

    /// A transition probability is negative or not finite.
    #[error("invalid probability {value} for state {state}, action {action}, next state {next}")]
    InvalidProbability {
        /// State index.
        state: usize,
        /// Action profile index.
        action: usize,
        /// Next state index.
        next: usize,
        /// Offending value.
        value: f64,
    },

    /// A transition row does not sum to one.
    #[error("transition probabilities for state {state}, action {action} sum to {sum}")]
    ProbabilitySum {
        /// State index.
        state: usize,
        /// Action profile index.
        action: usize,
        /// Row sum.
        sum: f64,
    },

    /// A stage payoff is not finite.
    #[error("payoff for state {state}, action {action} is not finite")]
    NonFinitePayoff {
        /// State index.
        state: usize,
        /// Action profile index.
        action: usize,
    },

    /// An equilibrium action index does not name an action profile.
    #[error("equilibrium action {action} is out of range for state {state}")]
    ActionOutOfRange {
        /// State index.
        state: usize,
        /// Action profile index.
        action: usize,
    },
}

/// Errors raised when validating a [`SolverConfig`](crate::equilibrium::SolverConfig).
#[derive(Debug, Clone, Error, PartialEq)]
pub enum ConfigError {
    /// A tolerance is negative or not finite.
    #[error("{0} tolerance {1} must be finite and non-negative")]
    InvalidTolerance(&'static str, f64),

    /// Too few directions to bound a set.
    #[error("number of directions {0} is below the minimum of 4")]
    TooFewDirections(usize),

    /// Minimum rotation outside (0, pi/2].
    #[error("minimum rotation {0} is out of range (0, pi/2]")]
    InvalidRotation(f64),

    /// A count parameter that must be positive is zero.
    #[error("{0} must be positive")]
    ZeroCount(&'static str),

    /// Time limit is negative or not finite.
    #[error("time limit {0} must be finite and positive")]
    InvalidTimeLimit(f64),

    /// The configuration could not be parsed.
    #[error("failed to parse configuration: {0}")]
    Parse(String),
}

/// Errors that abort a solve.
#[derive(Debug, Error)]
pub enum SolveError {
    /// The configuration is invalid.
    #[error("configuration error: {0}")]
    Config(#[from] ConfigError),

    /// The solver handles one or two players only.
    #[error("solver supports 1 or 2 players, game has {0}")]
    UnsupportedPlayers(usize),

    /// The worker pool could not be created.
    #[error("failed to build worker pool: {0}")]
    ThreadPool(#[from] rayon::ThreadPoolBuildError),

    /// Serializing a solution failed.
    #[error("serialization error: {0}")]
    Serialize(#[from] serde_json::Error),

    /// Writing a solution failed.
    #[error("IO error: {context}")]
    Io {
        /// What was being written.
        context: String,
        /// Underlying error.
        #[source]
        source: std::io::Error,
    },
}
