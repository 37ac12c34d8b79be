//! Benchmarks for the equilibrium solver.

use std::sync::Arc;

use criterion::{black_box, criterion_group, criterion_main, Criterion};
use sg_solver::equilibrium::{
    ConstraintSense, DenseSimplex, LinearProgram, LinearProgramSolver, Solver, SolverConfig,
};
use sg_solver::games::prisoners_dilemma;
use sg_solver::games::random::RandomGame;

fn pd_solve_benchmark(c: &mut Criterion) {
    let game = Arc::new(prisoners_dilemma::game(0.5));
    let config = SolverConfig::fast().with_directions(32);

    c.bench_function("pd_solve_32_directions", |b| {
        b.iter(|| {
            let solver = Solver::new(Arc::clone(&game), config.clone()).unwrap();
            black_box(solver.solve().stats.iterations)
        })
    });
}

fn random_sweep_benchmark(c: &mut Criterion) {
    let game = Arc::new(
        RandomGame::new(2, 4, 3)
            .with_delta(0.7)
            .with_seed(42)
            .generate()
            .unwrap(),
    );
    let solver = Solver::new(game, SolverConfig::default().with_directions(64)).unwrap();

    c.bench_function("random_game_single_sweep", |b| {
        b.iter(|| {
            let mut session = solver.session();
            black_box(session.step())
        })
    });
}

fn simplex_benchmark(c: &mut Criterion) {
    // Box [-1, 1]^8 cut by a diagonal plane
    let n = 8;
    let mut lp = LinearProgram::new((1..=n).map(|i| i as f64).collect());
    for i in 0..n {
        let mut row = vec![0.0; n];
        row[i] = 1.0;
        lp.add_constraint(2 * i, row.clone(), ConstraintSense::LessEqual, 1.0);
        lp.add_constraint(2 * i + 1, row, ConstraintSense::GreaterEqual, -1.0);
    }
    lp.add_constraint(2 * n, vec![1.0; n], ConstraintSense::LessEqual, 2.0);
    let simplex = DenseSimplex::new();

    c.bench_function("simplex_box_8", |b| b.iter(|| black_box(simplex.solve(black_box(&lp)))));
}

criterion_group!(benches, pd_solve_benchmark, random_sweep_benchmark, simplex_benchmark);
criterion_main!(benches);
