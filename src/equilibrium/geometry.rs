//! Payoff points and per-state tuples of points.
//!
//! A [`Point`] is a payoff vector with one coordinate per player. A [`Tuple`]
//! assigns one point to every state of the game, e.g. a continuation value
//! for each possible next state. Both are plain values: retaining one means
//! cloning it.

use std::fmt;
use std::ops::{Add, AddAssign, Index, IndexMut, Mul, Sub};

use serde::{Deserialize, Serialize};

/// A payoff vector in R^n, one coordinate per player.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Point(Vec<f64>);

impl Point {
    /// Create a point from its coordinates.
    pub fn new(coords: Vec<f64>) -> Self {
        Self(coords)
    }

    /// The origin in `dim` dimensions.
    pub fn zeros(dim: usize) -> Self {
        Self(vec![0.0; dim])
    }

    /// Every coordinate set to `value`.
    pub fn splat(dim: usize, value: f64) -> Self {
        Self(vec![value; dim])
    }

    /// Unit vector along coordinate `axis`, scaled by `sign`.
    pub fn axis(dim: usize, axis: usize, sign: f64) -> Self {
        let mut coords = vec![0.0; dim];
        coords[axis] = sign;
        Self(coords)
    }

    /// Unit direction at angle `theta` in the plane.
    pub fn from_angle(theta: f64) -> Self {
        Self(vec![theta.cos(), theta.sin()])
    }

    /// Number of coordinates.
    pub fn dim(&self) -> usize {
        self.0.len()
    }

    /// Coordinates as a slice.
    pub fn coords(&self) -> &[f64] {
        &self.0
    }

    /// Consume the point and return its coordinates.
    pub fn into_coords(self) -> Vec<f64> {
        self.0
    }

    /// Inner product with a direction.
    pub fn dot(&self, other: &Point) -> f64 {
        debug_assert_eq!(self.dim(), other.dim());
        self.0.iter().zip(&other.0).map(|(a, b)| a * b).sum()
    }

    /// Euclidean norm.
    pub fn norm(&self) -> f64 {
        self.dot(self).sqrt()
    }

    /// Rescale to unit length. Returns `None` for a (near) zero vector.
    pub fn normalized(&self, tol: f64) -> Option<Point> {
        let norm = self.norm();
        if norm <= tol {
            return None;
        }
        Some(self * (1.0 / norm))
    }

    /// Euclidean distance between two points.
    pub fn distance(a: &Point, b: &Point) -> f64 {
        (a - b).norm()
    }

    /// Equal in every coordinate up to `tol`.
    pub fn approx_eq(&self, other: &Point, tol: f64) -> bool {
        self.dim() == other.dim()
            && self.0.iter().zip(&other.0).all(|(a, b)| (a - b).abs() <= tol)
    }

    /// Pareto-dominated by `other`: weakly below everywhere and strictly
    /// below in at least one coordinate, beyond `tol`.
    pub fn strictly_less_than(&self, other: &Point, tol: f64) -> bool {
        let mut strict = false;
        for (a, b) in self.0.iter().zip(&other.0) {
            if *a > *b + tol {
                return false;
            }
            if *a < *b - tol {
                strict = true;
            }
        }
        strict
    }

    /// Coordinate-wise maximum.
    pub fn max(&self, other: &Point) -> Point {
        Point(self.0.iter().zip(&other.0).map(|(a, b)| a.max(*b)).collect())
    }

    /// Coordinate-wise minimum.
    pub fn min(&self, other: &Point) -> Point {
        Point(self.0.iter().zip(&other.0).map(|(a, b)| a.min(*b)).collect())
    }
}

impl From<Vec<f64>> for Point {
    fn from(coords: Vec<f64>) -> Self {
        Self(coords)
    }
}

impl Index<usize> for Point {
    type Output = f64;
    fn index(&self, i: usize) -> &f64 {
        &self.0[i]
    }
}

impl IndexMut<usize> for Point {
    fn index_mut(&mut self, i: usize) -> &mut f64 {
        &mut self.0[i]
    }
}

impl Add for &Point {
    type Output = Point;
    fn add(self, rhs: &Point) -> Point {
        Point(self.0.iter().zip(&rhs.0).map(|(a, b)| a + b).collect())
    }
}

impl Add for Point {
    type Output = Point;
    fn add(self, rhs: Point) -> Point {
        &self + &rhs
    }
}

impl AddAssign<&Point> for Point {
    fn add_assign(&mut self, rhs: &Point) {
        for (a, b) in self.0.iter_mut().zip(&rhs.0) {
            *a += b;
        }
    }
}

impl Sub for &Point {
    type Output = Point;
    fn sub(self, rhs: &Point) -> Point {
        Point(self.0.iter().zip(&rhs.0).map(|(a, b)| a - b).collect())
    }
}

impl Sub for Point {
    type Output = Point;
    fn sub(self, rhs: Point) -> Point {
        &self - &rhs
    }
}

impl Mul<f64> for &Point {
    type Output = Point;
    fn mul(self, rhs: f64) -> Point {
        Point(self.0.iter().map(|a| a * rhs).collect())
    }
}

impl Mul<f64> for Point {
    type Output = Point;
    fn mul(self, rhs: f64) -> Point {
        &self * rhs
    }
}

impl fmt::Display for Point {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "(")?;
        for (i, x) in self.0.iter().enumerate() {
            if i > 0 {
                write!(f, ", ")?;
            }
            write!(f, "{:.4}", x)?;
        }
        write!(f, ")")
    }
}

/// One payoff point per state.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Tuple(Vec<Point>);

impl Tuple {
    /// Build a tuple from per-state points.
    pub fn new(points: Vec<Point>) -> Self {
        Self(points)
    }

    /// The same point in every state.
    pub fn uniform(num_states: usize, point: Point) -> Self {
        Self(vec![point; num_states])
    }

    /// Number of states covered.
    pub fn len(&self) -> usize {
        self.0.len()
    }

    /// True when the tuple covers no states.
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Decompose into per-state points.
    pub fn into_points(self) -> Vec<Point> {
        self.0
    }

    /// Expected point under a distribution over states.
    pub fn expectation(&self, probabilities: &[f64]) -> Point {
        debug_assert_eq!(probabilities.len(), self.len());
        let dim = self.0.first().map_or(0, Point::dim);
        let mut out = Point::zeros(dim);
        for (p, point) in probabilities.iter().zip(&self.0) {
            if *p != 0.0 {
                out += &(point * *p);
            }
        }
        out
    }

    /// Expected value of one coordinate under a distribution over states.
    pub fn expectation_coord(&self, probabilities: &[f64], coord: usize) -> f64 {
        probabilities
            .iter()
            .zip(&self.0)
            .map(|(p, point)| p * point[coord])
            .sum()
    }

    /// In `coordinate`, weakly below `other` in every state and strictly below
    /// in at least one.
    pub fn strictly_less_than(&self, other: &Tuple, coordinate: usize) -> bool {
        debug_assert_eq!(self.len(), other.len());
        let mut strict = false;
        for (a, b) in self.0.iter().zip(&other.0) {
            if a[coordinate] > b[coordinate] {
                return false;
            }
            if a[coordinate] < b[coordinate] {
                strict = true;
            }
        }
        strict
    }

    /// Largest per-state Euclidean distance.
    pub fn distance(a: &Tuple, b: &Tuple) -> f64 {
        a.0.iter()
            .zip(&b.0)
            .map(|(p, q)| Point::distance(p, q))
            .fold(0.0, f64::max)
    }
}

impl From<Vec<Point>> for Tuple {
    fn from(points: Vec<Point>) -> Self {
        Self(points)
    }
}

impl Index<usize> for Tuple {
    type Output = Point;
    fn index(&self, state: usize) -> &Point {
        &self.0[state]
    }
}

impl IndexMut<usize> for Tuple {
    fn index_mut(&mut self, state: usize) -> &mut Point {
        &mut self.0[state]
    }
}

impl fmt::Display for Tuple {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[")?;
        for (i, p) in self.0.iter().enumerate() {
            if i > 0 {
                write!(f, ", ")?;
            }
            write!(f, "{}", p)?;
        }
        write!(f, "]")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_point_arithmetic() {
        let a = Point::new(vec![1.0, 2.0]);
        let b = Point::new(vec![3.0, -1.0]);

        assert_eq!(&a + &b, Point::new(vec![4.0, 1.0]));
        assert_eq!(&a - &b, Point::new(vec![-2.0, 3.0]));
        assert_eq!(&a * 2.0, Point::new(vec![2.0, 4.0]));
        assert_eq!(a.dot(&b), 1.0);
        assert!((Point::new(vec![3.0, 4.0]).norm() - 5.0).abs() < 1e-12);
    }

    #[test]
    fn test_strict_dominance() {
        let low = Point::new(vec![1.0, 1.0]);
        let high = Point::new(vec![1.0, 2.0]);

        assert!(low.strictly_less_than(&high, 1e-12));
        assert!(!high.strictly_less_than(&low, 1e-12));
        // Equal points never strictly dominate each other
        assert!(!low.strictly_less_than(&low.clone(), 1e-12));
        // Differences inside the tolerance do not count
        let nudged = Point::new(vec![1.0, 1.0 + 1e-14]);
        assert!(!low.strictly_less_than(&nudged, 1e-12));
    }

    #[test]
    fn test_tuple_round_trip() {
        let points = vec![
            Point::new(vec![0.1, 0.2]),
            Point::new(vec![-3.5, 7.25]),
            Point::new(vec![1e-9, 1e9]),
        ];
        let tuple = Tuple::from(points.clone());
        assert_eq!(tuple.len(), 3);
        assert_eq!(tuple.into_points(), points);
    }

    #[test]
    fn test_tuple_expectation() {
        let tuple = Tuple::new(vec![Point::new(vec![10.0, 0.0]), Point::new(vec![0.0, 4.0])]);
        let exp = tuple.expectation(&[0.25, 0.75]);
        assert!(exp.approx_eq(&Point::new(vec![2.5, 3.0]), 1e-12));
        assert!((tuple.expectation_coord(&[0.25, 0.75], 1) - 3.0).abs() < 1e-12);
    }

    #[test]
    fn test_tuple_strictly_less_than() {
        let a = Tuple::new(vec![Point::new(vec![0.0, 5.0]), Point::new(vec![1.0, 5.0])]);
        let b = Tuple::new(vec![Point::new(vec![0.0, 0.0]), Point::new(vec![2.0, 0.0])]);

        assert!(a.strictly_less_than(&b, 0));
        assert!(!b.strictly_less_than(&a, 0));
        assert!(!a.strictly_less_than(&a, 0));
        assert!(b.strictly_less_than(&a, 1));
    }

    #[test]
    fn test_tuple_distance_is_worst_state() {
        let a = Tuple::new(vec![Point::new(vec![0.0, 0.0]), Point::new(vec![1.0, 1.0])]);
        let b = Tuple::new(vec![Point::new(vec![3.0, 4.0]), Point::new(vec![1.0, 2.0])]);
        assert!((Tuple::distance(&a, &b) - 5.0).abs() < 1e-12);
        assert_eq!(Tuple::distance(&a, &a), 0.0);
    }
}
