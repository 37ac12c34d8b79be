//! Linear program contract and a dense simplex backend.
//!
//! The direction oracle only talks to the [`LinearProgramSolver`] trait. Every
//! variable of a [`LinearProgram`] is free and the objective is always
//! maximized. Any status other than [`LpStatus::Optimal`] is a normal,
//! recoverable outcome that the caller records and moves past.
//!
//! [`DenseSimplex`] is a two-phase tableau simplex with Bland's rule. Free
//! variables are split into a positive and a negative part. It is meant for
//! the small, dense programs the oracle builds (a handful of continuation
//! variables and a few hundred halfspace rows).

use serde::{Deserialize, Serialize};

/// Comparison of a constraint row against its right-hand side.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ConstraintSense {
    /// `row . x <= rhs`
    LessEqual,
    /// `row . x >= rhs`
    GreaterEqual,
    /// `row . x == rhs`
    Equal,
}

/// One labelled constraint row.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Constraint {
    /// Caller-chosen label, reported back when the row binds.
    pub id: usize,
    /// Dense coefficients, one per variable.
    pub coefficients: Vec<f64>,
    /// Comparison.
    pub sense: ConstraintSense,
    /// Right-hand side.
    pub rhs: f64,
}

impl Constraint {
    /// Value of the row at `x`.
    pub fn activity(&self, x: &[f64]) -> f64 {
        self.coefficients.iter().zip(x).map(|(a, v)| a * v).sum()
    }

    /// Distance from violation at `x`. Negative when violated.
    pub fn slack(&self, x: &[f64]) -> f64 {
        let activity = self.activity(x);
        match self.sense {
            ConstraintSense::LessEqual => self.rhs - activity,
            ConstraintSense::GreaterEqual => activity - self.rhs,
            ConstraintSense::Equal => -(activity - self.rhs).abs(),
        }
    }
}

/// Maximize `objective . x` over free variables `x` subject to `constraints`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LinearProgram {
    /// Number of variables.
    pub num_variables: usize,
    /// Objective coefficients.
    pub objective: Vec<f64>,
    /// Constraint rows.
    pub constraints: Vec<Constraint>,
}

impl LinearProgram {
    /// An unconstrained program with the given objective.
    pub fn new(objective: Vec<f64>) -> Self {
        Self {
            num_variables: objective.len(),
            objective,
            constraints: Vec::new(),
        }
    }

    /// Append a row.
    pub fn add_constraint(&mut self, id: usize, coefficients: Vec<f64>, sense: ConstraintSense, rhs: f64) {
        debug_assert_eq!(coefficients.len(), self.num_variables);
        self.constraints.push(Constraint {
            id,
            coefficients,
            sense,
            rhs,
        });
    }
}

/// Termination status of a solve.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum LpStatus {
    /// An optimal point was found.
    Optimal,
    /// No point satisfies the constraints.
    Infeasible,
    /// The objective is unbounded above.
    Unbounded,
    /// The backend gave up, e.g. on a pivot limit or non-finite data.
    NumericalError,
}

/// Result of a solve. `objective`, `point` and `binding` are only meaningful
/// when `status` is [`LpStatus::Optimal`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LpSolution {
    /// Termination status.
    pub status: LpStatus,
    /// Optimal objective value.
    pub objective: f64,
    /// Optimal point.
    pub point: Vec<f64>,
    /// Ids of rows that hold with equality at `point`.
    pub binding: Vec<usize>,
}

impl LpSolution {
    /// A solution carrying only a non-optimal status.
    pub fn failed(status: LpStatus) -> Self {
        Self {
            status,
            objective: f64::NAN,
            point: Vec::new(),
            binding: Vec::new(),
        }
    }

    /// Whether the solve reached optimality.
    pub fn is_optimal(&self) -> bool {
        self.status == LpStatus::Optimal
    }
}

/// Anything that can solve a [`LinearProgram`].
///
/// Solvers are shared by every worker of a sweep.
pub trait LinearProgramSolver: Send + Sync {
    /// Solve `lp`. Must not panic on infeasible or unbounded input.
    fn solve(&self, lp: &LinearProgram) -> LpSolution;
}

/// Two-phase dense tableau simplex with Bland's anti-cycling rule.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DenseSimplex {
    /// Smallest magnitude accepted as a pivot element or improving cost.
    pub pivot_tol: f64,
    /// Largest phase one objective still treated as feasible.
    pub feasibility_tol: f64,
    /// Slack at or below which a row is reported as binding.
    pub binding_tol: f64,
    /// Pivot budget per phase.
    pub max_pivots: usize,
}

impl Default for DenseSimplex {
    fn default() -> Self {
        Self {
            pivot_tol: 1e-10,
            feasibility_tol: 1e-8,
            binding_tol: 1e-8,
            max_pivots: 50_000,
        }
    }
}

impl DenseSimplex {
    /// Create a backend with default tolerances.
    pub fn new() -> Self {
        Self::default()
    }
}

/// Column kinds of the standard-form tableau.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Column {
    Structural,
    Slack,
    Artificial,
}

enum PhaseEnd {
    Optimal,
    Unbounded,
    PivotLimit,
}

struct Tableau {
    /// `rows[r]` holds the constraint coefficients followed by the rhs.
    rows: Vec<Vec<f64>>,
    /// Reduced costs followed by minus the objective value.
    costs: Vec<f64>,
    basis: Vec<usize>,
    kinds: Vec<Column>,
}

impl Tableau {
    fn width(&self) -> usize {
        self.kinds.len()
    }

    /// Load objective `c` over all columns and price out the basis.
    fn price(&mut self, c: &[f64]) {
        let width = self.width();
        self.costs = c.to_vec();
        self.costs.push(0.0);
        for (r, &b) in self.basis.iter().enumerate() {
            let cb = self.costs[b];
            if cb != 0.0 {
                for j in 0..=width {
                    self.costs[j] -= cb * self.rows[r][j];
                }
            }
        }
    }

    fn pivot(&mut self, r: usize, j: usize) {
        let width = self.width();
        let inv = 1.0 / self.rows[r][j];
        for v in self.rows[r].iter_mut() {
            *v *= inv;
        }
        let pivot_row = self.rows[r].clone();
        for (i, row) in self.rows.iter_mut().enumerate() {
            if i == r {
                continue;
            }
            let factor = row[j];
            if factor != 0.0 {
                for k in 0..=width {
                    row[k] -= factor * pivot_row[k];
                }
            }
        }
        let factor = self.costs[j];
        if factor != 0.0 {
            for k in 0..=width {
                self.costs[k] -= factor * pivot_row[k];
            }
        }
        self.basis[r] = j;
    }

    /// Run simplex iterations on the current costs. Columns for which
    /// `allowed` is false never enter the basis.
    fn optimize(&mut self, allowed: impl Fn(Column) -> bool, tol: f64, max_pivots: usize) -> PhaseEnd {
        let width = self.width();
        for _ in 0..max_pivots {
            // Bland: lowest improving column enters
            let Some(j) = (0..width).find(|&j| allowed(self.kinds[j]) && self.costs[j] > tol) else {
                return PhaseEnd::Optimal;
            };

            // Bland: ties in the ratio test go to the lowest basic index
            let mut leave: Option<(usize, f64)> = None;
            for (r, row) in self.rows.iter().enumerate() {
                let a = row[j];
                if a > tol {
                    let ratio = row[width] / a;
                    leave = match leave {
                        None => Some((r, ratio)),
                        Some((best, best_ratio)) => {
                            if ratio < best_ratio - tol
                                || (ratio <= best_ratio + tol && self.basis[r] < self.basis[best])
                            {
                                Some((r, ratio))
                            } else {
                                Some((best, best_ratio))
                            }
                        }
                    };
                }
            }

            match leave {
                Some((r, _)) => self.pivot(r, j),
                None => return PhaseEnd::Unbounded,
            }
        }
        PhaseEnd::PivotLimit
    }

    fn value(&self, column: usize) -> f64 {
        let width = self.width();
        self.basis
            .iter()
            .position(|&b| b == column)
            .map_or(0.0, |r| self.rows[r][width])
    }
}

impl LinearProgramSolver for DenseSimplex {
    fn solve(&self, lp: &LinearProgram) -> LpSolution {
        let n = lp.num_variables;
        let data_ok = lp.objective.len() == n
            && lp.objective.iter().all(|v| v.is_finite())
            && lp.constraints.iter().all(|c| {
                c.coefficients.len() == n && c.rhs.is_finite() && c.coefficients.iter().all(|v| v.is_finite())
            });
        if !data_ok {
            return LpSolution::failed(LpStatus::NumericalError);
        }

        // Normalize every row to a non-negative rhs
        let rows: Vec<(Vec<f64>, ConstraintSense, f64)> = lp
            .constraints
            .iter()
            .map(|c| {
                if c.rhs < 0.0 {
                    let sense = match c.sense {
                        ConstraintSense::LessEqual => ConstraintSense::GreaterEqual,
                        ConstraintSense::GreaterEqual => ConstraintSense::LessEqual,
                        ConstraintSense::Equal => ConstraintSense::Equal,
                    };
                    (c.coefficients.iter().map(|a| -a).collect(), sense, -c.rhs)
                } else {
                    (c.coefficients.clone(), c.sense, c.rhs)
                }
            })
            .collect();

        // Column layout: split structurals, then one slack/surplus per
        // inequality, then one artificial per >= or = row
        let mut kinds = vec![Column::Structural; 2 * n];
        let mut slack_col = Vec::with_capacity(rows.len());
        for (_, sense, _) in &rows {
            match sense {
                ConstraintSense::Equal => slack_col.push(None),
                _ => {
                    slack_col.push(Some(kinds.len()));
                    kinds.push(Column::Slack);
                }
            }
        }
        let mut artificial_col = Vec::with_capacity(rows.len());
        for (_, sense, _) in &rows {
            match sense {
                ConstraintSense::LessEqual => artificial_col.push(None),
                _ => {
                    artificial_col.push(Some(kinds.len()));
                    kinds.push(Column::Artificial);
                }
            }
        }

        let width = kinds.len();
        let mut table = Vec::with_capacity(rows.len());
        let mut basis = Vec::with_capacity(rows.len());
        for (r, (coefficients, sense, rhs)) in rows.iter().enumerate() {
            let mut row = vec![0.0; width + 1];
            for (k, &a) in coefficients.iter().enumerate() {
                row[2 * k] = a;
                row[2 * k + 1] = -a;
            }
            if let Some(s) = slack_col[r] {
                row[s] = if *sense == ConstraintSense::LessEqual { 1.0 } else { -1.0 };
            }
            match artificial_col[r] {
                Some(a) => {
                    row[a] = 1.0;
                    basis.push(a);
                }
                None => basis.push(slack_col[r].unwrap_or(0)),
            }
            row[width] = *rhs;
            table.push(row);
        }

        let mut tableau = Tableau {
            rows: table,
            costs: Vec::new(),
            basis,
            kinds,
        };

        // Phase one: drive artificials to zero
        if artificial_col.iter().any(Option::is_some) {
            let phase_one: Vec<f64> = tableau
                .kinds
                .iter()
                .map(|&k| if k == Column::Artificial { -1.0 } else { 0.0 })
                .collect();
            tableau.price(&phase_one);
            match tableau.optimize(|_| true, self.pivot_tol, self.max_pivots) {
                PhaseEnd::Optimal => {}
                // Phase one is bounded by construction
                PhaseEnd::Unbounded | PhaseEnd::PivotLimit => {
                    return LpSolution::failed(LpStatus::NumericalError);
                }
            }
            let infeasibility = tableau.costs[width];
            if infeasibility > self.feasibility_tol {
                return LpSolution::failed(LpStatus::Infeasible);
            }

            // Pivot zero-level artificials out of the basis where possible
            for r in 0..tableau.rows.len() {
                if tableau.kinds[tableau.basis[r]] != Column::Artificial {
                    continue;
                }
                let entering = (0..width).find(|&j| {
                    tableau.kinds[j] != Column::Artificial && tableau.rows[r][j].abs() > self.pivot_tol
                });
                if let Some(j) = entering {
                    tableau.pivot(r, j);
                }
            }
        }

        // Phase two on the original objective
        let mut phase_two = vec![0.0; width];
        for (k, &c) in lp.objective.iter().enumerate() {
            phase_two[2 * k] = c;
            phase_two[2 * k + 1] = -c;
        }
        tableau.price(&phase_two);
        match tableau.optimize(|k| k != Column::Artificial, self.pivot_tol, self.max_pivots) {
            PhaseEnd::Optimal => {}
            PhaseEnd::Unbounded => return LpSolution::failed(LpStatus::Unbounded),
            PhaseEnd::PivotLimit => return LpSolution::failed(LpStatus::NumericalError),
        }

        let point: Vec<f64> = (0..n)
            .map(|k| tableau.value(2 * k) - tableau.value(2 * k + 1))
            .collect();
        if point.iter().any(|v| !v.is_finite()) {
            return LpSolution::failed(LpStatus::NumericalError);
        }

        let objective = lp.objective.iter().zip(&point).map(|(c, x)| c * x).sum();
        let binding = lp
            .constraints
            .iter()
            .filter(|c| c.slack(&point).abs() <= self.binding_tol || c.sense == ConstraintSense::Equal)
            .map(|c| c.id)
            .collect();

        LpSolution {
            status: LpStatus::Optimal,
            objective,
            point,
            binding,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    use ConstraintSense::*;

    #[test]
    fn test_optimal_corner() {
        // max x + y s.t. x <= 2, y <= 3, x + y <= 4
        let mut lp = LinearProgram::new(vec![1.0, 1.0]);
        lp.add_constraint(0, vec![1.0, 0.0], LessEqual, 2.0);
        lp.add_constraint(1, vec![0.0, 1.0], LessEqual, 3.0);
        lp.add_constraint(2, vec![1.0, 1.0], LessEqual, 4.0);

        let sol = DenseSimplex::new().solve(&lp);
        assert_eq!(sol.status, LpStatus::Optimal);
        assert!((sol.objective - 4.0).abs() < 1e-9);
        assert!(sol.binding.contains(&2));
    }

    #[test]
    fn test_free_variables_go_negative() {
        // max -x s.t. x >= -5
        let mut lp = LinearProgram::new(vec![-1.0]);
        lp.add_constraint(7, vec![1.0], GreaterEqual, -5.0);

        let sol = DenseSimplex::new().solve(&lp);
        assert_eq!(sol.status, LpStatus::Optimal);
        assert!((sol.point[0] + 5.0).abs() < 1e-9);
        assert_eq!(sol.binding, vec![7]);
    }

    #[test]
    fn test_equality_rows() {
        // max 2x + y s.t. x + y = 1, x <= 0.25, y <= 10
        let mut lp = LinearProgram::new(vec![2.0, 1.0]);
        lp.add_constraint(0, vec![1.0, 1.0], Equal, 1.0);
        lp.add_constraint(1, vec![1.0, 0.0], LessEqual, 0.25);
        lp.add_constraint(2, vec![0.0, 1.0], LessEqual, 10.0);

        let sol = DenseSimplex::new().solve(&lp);
        assert_eq!(sol.status, LpStatus::Optimal);
        assert!((sol.point[0] - 0.25).abs() < 1e-9);
        assert!((sol.point[1] - 0.75).abs() < 1e-9);
        assert!((sol.objective - 1.25).abs() < 1e-9);
    }

    #[test]
    fn test_infeasible() {
        let mut lp = LinearProgram::new(vec![1.0]);
        lp.add_constraint(0, vec![1.0], LessEqual, 1.0);
        lp.add_constraint(1, vec![1.0], GreaterEqual, 2.0);
        assert_eq!(DenseSimplex::new().solve(&lp).status, LpStatus::Infeasible);
    }

    #[test]
    fn test_unbounded() {
        let mut lp = LinearProgram::new(vec![1.0, 0.0]);
        lp.add_constraint(0, vec![0.0, 1.0], LessEqual, 1.0);
        assert_eq!(DenseSimplex::new().solve(&lp).status, LpStatus::Unbounded);
    }

    #[test]
    fn test_non_finite_data() {
        let mut lp = LinearProgram::new(vec![1.0]);
        lp.add_constraint(0, vec![f64::NAN], LessEqual, 1.0);
        assert_eq!(DenseSimplex::new().solve(&lp).status, LpStatus::NumericalError);
    }

    #[test]
    fn test_degenerate_polygon() {
        // Many redundant halfspaces through the same vertex (1, 1)
        let mut lp = LinearProgram::new(vec![1.0, 2.0]);
        for k in 0..12 {
            let theta = std::f64::consts::FRAC_PI_2 * k as f64 / 11.0;
            let (c, s) = (theta.cos(), theta.sin());
            lp.add_constraint(k, vec![c, s], LessEqual, c + s);
        }
        let sol = DenseSimplex::new().solve(&lp);
        assert_eq!(sol.status, LpStatus::Optimal);
        assert!((sol.objective - 3.0).abs() < 1e-8);
    }
}
