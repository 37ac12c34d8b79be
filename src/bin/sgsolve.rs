//! Solve one of the built-in stochastic games and write the solution JSON.
//!
//! Usage:
//!   sgsolve --game pd --delta 0.5 --directions 64
//!   sgsolve --game risk --delta 0.7 --mode self-generating --output risk.json
//!   sgsolve --game random --states 3 --actions 2 --seed 7 --store all
//!   RUST_LOG=debug sgsolve --game pd2 --config solver.json

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use clap::{Parser, ValueEnum};
use indicatif::{ProgressBar, ProgressStyle};

use sg_solver::equilibrium::{Game, GameError, SolveError, Solver, SolverConfig, SolverMode, StoreIterations};
use sg_solver::games::prisoners_dilemma;
use sg_solver::games::random::RandomGame;
use sg_solver::games::risk_sharing::{EndowmentMode, RiskSharing};

#[derive(Debug, Clone, Copy, ValueEnum)]
enum GameChoice {
    /// One-state prisoners' dilemma
    Pd,
    /// Prisoners' dilemma with a second, richer state
    Pd2,
    /// Risk sharing with stochastic endowments
    Risk,
    /// Seeded random game
    Random,
}

#[derive(Debug, Clone, Copy, ValueEnum)]
enum ModeChoice {
    Feasible,
    MaxMinMax,
    SelfGenerating,
}

impl From<ModeChoice> for SolverMode {
    fn from(mode: ModeChoice) -> Self {
        match mode {
            ModeChoice::Feasible => SolverMode::Feasible,
            ModeChoice::MaxMinMax => SolverMode::MaxMinMax,
            ModeChoice::SelfGenerating => SolverMode::SelfGenerating,
        }
    }
}

#[derive(Debug, Clone, Copy, ValueEnum)]
enum StoreChoice {
    None,
    Final,
    All,
}

impl From<StoreChoice> for StoreIterations {
    fn from(store: StoreChoice) -> Self {
        match store {
            StoreChoice::None => StoreIterations::None,
            StoreChoice::Final => StoreIterations::Final,
            StoreChoice::All => StoreIterations::All,
        }
    }
}

#[derive(Debug, Parser)]
#[command(name = "sgsolve", about = "Outer approximation of equilibrium payoffs in stochastic games")]
struct Args {
    /// Game to solve
    #[arg(long, value_enum, default_value = "pd")]
    game: GameChoice,

    /// Discount factor
    #[arg(long, default_value_t = 0.5)]
    delta: f64,

    /// Base solver parameters as JSON; flags below override it
    #[arg(long)]
    config: Option<PathBuf>,

    /// Number of search directions
    #[arg(long)]
    directions: Option<usize>,

    /// Solver variant
    #[arg(long, value_enum)]
    mode: Option<ModeChoice>,

    /// Sweep limit
    #[arg(long)]
    max_iterations: Option<usize>,

    /// Convergence tolerance
    #[arg(long)]
    error_tol: Option<f64>,

    /// Worker threads (rayon global pool when omitted)
    #[arg(long)]
    threads: Option<usize>,

    /// Wall-clock budget in seconds
    #[arg(long)]
    time_limit: Option<f64>,

    /// Which sweep snapshots to keep
    #[arg(long, value_enum)]
    store: Option<StoreChoice>,

    /// States of a random game / endowment states of the risk sharing game
    #[arg(long, default_value_t = 3)]
    states: usize,

    /// Actions per player of a random game
    #[arg(long, default_value_t = 2)]
    actions: usize,

    /// Seed of a random game
    #[arg(long)]
    seed: Option<u64>,

    /// Center the risk sharing endowment kernel on consumption
    #[arg(long)]
    consumption: bool,

    /// Where to write the solution
    #[arg(long, default_value = "solution.json")]
    output: PathBuf,
}

fn build_game(args: &Args) -> Result<Game, GameError> {
    match args.game {
        GameChoice::Pd => Ok(prisoners_dilemma::game(args.delta)),
        GameChoice::Pd2 => Ok(prisoners_dilemma::two_state(args.delta)),
        GameChoice::Risk => {
            let mode = if args.consumption {
                EndowmentMode::Consumption
            } else {
                EndowmentMode::Endowment
            };
            RiskSharing::new(args.states, 1, RiskSharing::default().persistence, mode).game(args.delta)
        }
        GameChoice::Random => {
            let mut generator = RandomGame::new(2, args.states, args.actions).with_delta(args.delta);
            if let Some(seed) = args.seed {
                generator = generator.with_seed(seed);
            }
            generator.generate()
        }
    }
}

fn build_config(args: &Args) -> Result<SolverConfig, Box<dyn std::error::Error>> {
    let mut config = match &args.config {
        Some(path) => SolverConfig::from_json_str(&std::fs::read_to_string(path)?)?,
        None => SolverConfig::default(),
    };
    if let Some(directions) = args.directions {
        config = config.with_directions(directions);
    }
    if let Some(mode) = args.mode {
        config = config.with_mode(mode.into());
    }
    if let Some(max_iterations) = args.max_iterations {
        config = config.with_max_iterations(max_iterations);
    }
    if let Some(tol) = args.error_tol {
        config = config.with_error_tol(tol);
    }
    if let Some(threads) = args.threads {
        config = config.with_threads(threads);
    }
    if let Some(seconds) = args.time_limit {
        config = config.with_time_limit(seconds);
    }
    if let Some(store) = args.store {
        config = config.with_store_iterations(store.into());
    }
    Ok(config)
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    env_logger::init();
    let args = Args::parse();

    println!("==============================================");
    println!("Stochastic Game Equilibrium Solver");
    println!("==============================================");
    println!();

    let game = build_game(&args)?;
    let config = build_config(&args)?;

    println!("Configuration:");
    println!("  Game: {:?}", args.game);
    println!("  Delta: {}", game.delta());
    println!("  States: {}", game.num_states());
    println!("  Players: {}", game.num_players());
    println!("  Mode: {:?}", config.mode);
    println!("  Directions: {}", config.num_directions);
    println!("  Max iterations: {}", config.max_iterations);
    println!("  Error tolerance: {:e}", config.error_tol);
    println!();

    let solver = Solver::new(Arc::new(game), config)?;

    let bar = ProgressBar::new(solver.config().max_iterations as u64);
    bar.set_style(
        ProgressStyle::with_template("{spinner} [{elapsed_precise}] {bar:40} {pos}/{len} {msg}")?
            .progress_chars("=> "),
    );
    bar.enable_steady_tick(Duration::from_millis(200));

    let solution = solver.solve_with_callback(|progress| {
        bar.set_position(progress.iteration as u64);
        bar.set_message(format!("{:.3e}", progress.max_movement));
    });
    bar.finish_and_clear();

    println!("==============================================");
    solution.print_summary();
    println!("==============================================");

    solution
        .save_json(&args.output)
        .map_err(|e: SolveError| format!("saving solution: {}", e))?;
    println!("Solution written to {}", args.output.display());

    Ok(())
}
