//! Halfspace outer approximations of per-state payoff sets.
//!
//! A [`BoundingSet`] is the intersection of a seed box with a list of
//! [`Hyperplane`]s. During a solve bounds only ever tighten: adding a
//! hyperplane that does not cut into the current polytope is a no-op, and a
//! hyperplane whose direction is already present replaces the old one. The
//! only way to loosen a set is [`BoundingSet::reinitialize`].
//!
//! Extreme points are computed by clipping the seed box against every
//! hyperplane (Sutherland-Hodgman in the plane, interval intersection on the
//! line) and cached until the set changes. The cache is a [`OnceLock`], so a
//! set shared between sweep workers computes its vertices at most once.

use std::sync::OnceLock;

use serde::{Deserialize, Serialize};

use crate::equilibrium::geometry::Point;

/// Consecutive clipped vertices closer than this are merged.
const VERTEX_MERGE_TOL: f64 = 1e-10;

/// The halfspace `{x : x . direction <= level}` for one state.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Hyperplane {
    /// State the bound applies to.
    pub state: usize,
    /// Outward normal.
    pub direction: Point,
    /// Upper bound on `x . direction`.
    pub level: f64,
}

impl Hyperplane {
    /// Create a hyperplane.
    pub fn new(state: usize, direction: Point, level: f64) -> Self {
        Self {
            state,
            direction,
            level,
        }
    }

    /// Signed distance of `point` inside the halfspace, scaled by the normal's
    /// length. Negative outside.
    pub fn slack(&self, point: &Point) -> f64 {
        self.level - point.dot(&self.direction)
    }
}

/// Per-state outer approximation: a seed box cut by hyperplanes.
#[derive(Debug, Clone)]
pub struct BoundingSet {
    state: usize,
    lower: Point,
    upper: Point,
    hyperplanes: Vec<Hyperplane>,
    level_tol: f64,
    norm_tol: f64,
    extreme_points: OnceLock<Vec<Point>>,
}

impl BoundingSet {
    /// Seed a set with the box `[lower, upper]`, stored as `2 * dim` axis
    /// hyperplanes.
    ///
    /// # Panics
    /// If `lower` and `upper` differ in dimension or the dimension is not 1 or
    /// 2.
    pub fn from_box(state: usize, lower: Point, upper: Point) -> Self {
        assert_eq!(lower.dim(), upper.dim(), "box corners differ in dimension");
        assert!(
            matches!(lower.dim(), 1 | 2),
            "bounding sets support one or two players, got {}",
            lower.dim()
        );
        let mut set = Self {
            state,
            hyperplanes: Vec::new(),
            lower: lower.clone(),
            upper: upper.clone(),
            level_tol: 1e-10,
            norm_tol: 1e-12,
            extreme_points: OnceLock::new(),
        };
        set.reinitialize(lower, upper);
        set
    }

    /// Builder method: set the tightening and direction matching tolerances.
    pub fn with_tolerances(mut self, level_tol: f64, norm_tol: f64) -> Self {
        self.level_tol = level_tol;
        self.norm_tol = norm_tol;
        self
    }

    /// Reset to the box `[lower, upper]`, dropping every other hyperplane.
    pub fn reinitialize(&mut self, lower: Point, upper: Point) {
        let dim = lower.dim();
        self.hyperplanes.clear();
        for axis in 0..dim {
            self.hyperplanes
                .push(Hyperplane::new(self.state, Point::axis(dim, axis, 1.0), upper[axis]));
            self.hyperplanes
                .push(Hyperplane::new(self.state, Point::axis(dim, axis, -1.0), -lower[axis]));
        }
        self.lower = lower;
        self.upper = upper;
        self.extreme_points = OnceLock::new();
    }

    /// State this set bounds.
    pub fn state(&self) -> usize {
        self.state
    }

    /// Number of players.
    pub fn dim(&self) -> usize {
        self.lower.dim()
    }

    /// Lower corner of the seed box.
    pub fn lower(&self) -> &Point {
        &self.lower
    }

    /// Upper corner of the seed box.
    pub fn upper(&self) -> &Point {
        &self.upper
    }

    /// All hyperplanes, box faces included.
    pub fn hyperplanes(&self) -> &[Hyperplane] {
        &self.hyperplanes
    }

    /// Intersect with `{x : x . direction <= level}`.
    ///
    /// Returns `false` and leaves the set untouched when the halfspace does
    /// not cut at least `level_tol` into the current polytope, or when the
    /// set is already empty. A stored hyperplane with the same direction is
    /// replaced.
    pub fn add_bounding_hyperplane(&mut self, direction: &Point, level: f64) -> bool {
        if !level.is_finite() {
            return false;
        }
        let Some(support) = self.support(direction) else {
            return false;
        };
        if level >= support - self.level_tol {
            return false;
        }

        let norm_tol = self.norm_tol;
        match self
            .hyperplanes
            .iter_mut()
            .find(|h| h.direction.approx_eq(direction, norm_tol))
        {
            Some(existing) => existing.level = level,
            None => self
                .hyperplanes
                .push(Hyperplane::new(self.state, direction.clone(), level)),
        }
        self.extreme_points = OnceLock::new();
        true
    }

    /// Bound in `direction`: the stored level when a hyperplane with this
    /// direction exists, otherwise the support function. `None` when the set
    /// is empty and nothing is stored.
    pub fn level(&self, direction: &Point) -> Option<f64> {
        self.hyperplanes
            .iter()
            .find(|h| h.direction.approx_eq(direction, self.norm_tol))
            .map(|h| h.level)
            .or_else(|| self.support(direction))
    }

    /// Support function `max { x . direction }` over the polytope.
    pub fn support(&self, direction: &Point) -> Option<f64> {
        self.extreme_points()
            .iter()
            .map(|p| p.dot(direction))
            .reduce(f64::max)
    }

    /// Coordinate-wise minimum over the polytope.
    pub fn coordinate_minimum(&self) -> Option<Point> {
        let points = self.extreme_points();
        let first = points.first()?;
        Some(points[1..].iter().fold(first.clone(), |acc, p| acc.min(p)))
    }

    /// Whether `point` satisfies every hyperplane up to `tol`.
    pub fn contains(&self, point: &Point, tol: f64) -> bool {
        self.hyperplanes.iter().all(|h| h.slack(point) >= -tol)
    }

    /// True when no point satisfies every hyperplane.
    pub fn is_empty(&self) -> bool {
        self.extreme_points().is_empty()
    }

    /// Vertices of the polytope. An interval's endpoints for one player, a
    /// counter-clockwise polygon for two. Degenerate sets yield a single
    /// point or a segment.
    pub fn extreme_points(&self) -> &[Point] {
        self.extreme_points.get_or_init(|| match self.dim() {
            1 => self.clip_interval(),
            _ => self.clip_polygon(),
        })
    }

    fn clip_interval(&self) -> Vec<Point> {
        let mut lo = f64::NEG_INFINITY;
        let mut hi = f64::INFINITY;
        for h in &self.hyperplanes {
            let d = h.direction[0];
            if d > self.norm_tol {
                hi = hi.min(h.level / d);
            } else if d < -self.norm_tol {
                lo = lo.max(h.level / d);
            } else if h.level < -self.level_tol {
                return Vec::new();
            }
        }
        if lo > hi + self.level_tol {
            Vec::new()
        } else if hi - lo <= VERTEX_MERGE_TOL {
            vec![Point::new(vec![0.5 * (lo + hi)])]
        } else {
            vec![Point::new(vec![lo]), Point::new(vec![hi])]
        }
    }

    fn clip_polygon(&self) -> Vec<Point> {
        let (lo, hi) = (&self.lower, &self.upper);
        let mut polygon = vec![
            Point::new(vec![lo[0], lo[1]]),
            Point::new(vec![hi[0], lo[1]]),
            Point::new(vec![hi[0], hi[1]]),
            Point::new(vec![lo[0], hi[1]]),
        ];
        dedup_vertices(&mut polygon);
        for h in &self.hyperplanes {
            polygon = clip(&polygon, h, self.level_tol);
            dedup_vertices(&mut polygon);
            if polygon.is_empty() {
                break;
            }
        }
        polygon
    }
}

/// Clip a convex polygon against one halfspace.
fn clip(polygon: &[Point], plane: &Hyperplane, tol: f64) -> Vec<Point> {
    let excess = |p: &Point| p.dot(&plane.direction) - plane.level;
    if polygon.len() == 1 {
        return if excess(&polygon[0]) <= tol {
            polygon.to_vec()
        } else {
            Vec::new()
        };
    }

    let mut out = Vec::with_capacity(polygon.len() + 1);
    for (i, current) in polygon.iter().enumerate() {
        let next = &polygon[(i + 1) % polygon.len()];
        let (c, n) = (excess(current), excess(next));
        let (current_in, next_in) = (c <= tol, n <= tol);

        if current_in {
            out.push(current.clone());
        }
        if current_in != next_in {
            let t = (c / (c - n)).clamp(0.0, 1.0);
            out.push(current + &((next - current) * t));
        }
    }
    out
}

fn dedup_vertices(polygon: &mut Vec<Point>) {
    polygon.dedup_by(|a, b| a.approx_eq(b, VERTEX_MERGE_TOL));
    while polygon.len() > 1 {
        let last = polygon.len() - 1;
        if polygon[last].approx_eq(&polygon[0], VERTEX_MERGE_TOL) {
            polygon.pop();
        } else {
            break;
        }
    }
}
