//! Planar polygon checks for application areas.
//!
//! Coordinates are projected (ETRS-TM35FIN) so plain Euclidean arithmetic is sufficient.
//! Rings follow the GeoJSON convention: the first position is repeated as the last one.

use std::fmt;

use serde::{Deserialize, Serialize};

const EPSILON: f64 = 1e-9;

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Coordinate {
    pub x: f64,
    pub y: f64,
}

impl Coordinate {
    pub const fn new(x: f64, y: f64) -> Self {
        Self { x, y }
    }

    fn sub(self, other: Coordinate) -> Coordinate {
        Coordinate::new(self.x - other.x, self.y - other.y)
    }

    fn add_scaled(self, direction: Coordinate, t: f64) -> Coordinate {
        Coordinate::new(self.x + direction.x * t, self.y + direction.y * t)
    }

    fn cross(self, other: Coordinate) -> f64 {
        self.x * other.y - self.y * other.x
    }

    fn dot(self, other: Coordinate) -> f64 {
        self.x * other.x + self.y * other.y
    }

    fn approx_eq(self, other: Coordinate) -> bool {
        (self.x - other.x).abs() < EPSILON && (self.y - other.y).abs() < EPSILON
    }
}

impl fmt::Display for Coordinate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "({}, {})", self.x, self.y)
    }
}

/// Reason a ring is not a simple polygon, with the first position where it shows.
#[derive(Debug, Clone, PartialEq)]
pub struct GeometryDefect {
    pub reason: String,
    pub offending_point: Option<Coordinate>,
}

impl GeometryDefect {
    fn new(reason: impl Into<String>, offending_point: Option<Coordinate>) -> Self {
        Self {
            reason: reason.into(),
            offending_point,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Polygon {
    pub exterior: Vec<Coordinate>,
}

impl Polygon {
    pub fn new(exterior: Vec<Coordinate>) -> Self {
        Self { exterior }
    }

    /// Closed ring from `(x, y)` pairs; the closing position is appended when missing.
    pub fn from_points(points: &[(f64, f64)]) -> Self {
        let mut exterior: Vec<Coordinate> =
            points.iter().map(|&(x, y)| Coordinate::new(x, y)).collect();
        if let (Some(first), Some(last)) = (exterior.first().copied(), exterior.last().copied()) {
            if !first.approx_eq(last) {
                exterior.push(first);
            }
        }
        Self { exterior }
    }

    pub fn first_point(&self) -> Option<Coordinate> {
        self.exterior.first().copied()
    }

    fn edges(&self) -> impl Iterator<Item = (Coordinate, Coordinate)> + '_ {
        self.exterior.windows(2).map(|pair| (pair[0], pair[1]))
    }

    /// Returns the first defect that keeps this ring from being simple.
    pub fn simplicity_defect(&self) -> Option<GeometryDefect> {
        let ring = &self.exterior;
        let first = ring.first().copied();
        if ring.len() < 4 {
            return Some(GeometryDefect::new(
                "ring must have at least four positions",
                first,
            ));
        }

        let last = ring[ring.len() - 1];
        if let Some(first) = first {
            if !first.approx_eq(last) {
                return Some(GeometryDefect::new("ring is not closed", Some(last)));
            }
        }

        if let Some(pair) = ring[..ring.len() - 1]
            .windows(2)
            .find(|pair| pair[0].approx_eq(pair[1]))
        {
            return Some(GeometryDefect::new("repeated position", Some(pair[1])));
        }

        let edges: Vec<(Coordinate, Coordinate)> = self.edges().collect();
        let count = edges.len();

        for i in 0..count {
            let (a, b) = edges[i];
            let (_, c) = edges[(i + 1) % count];
            // Consecutive edges may only share their common vertex.
            if b.sub(a).cross(c.sub(b)).abs() < EPSILON && b.sub(a).dot(c.sub(b)) < 0.0 {
                return Some(GeometryDefect::new("ring folds back on itself", Some(b)));
            }
        }

        for i in 0..count {
            for j in (i + 2)..count {
                if i == 0 && j == count - 1 {
                    continue;
                }
                let (p1, p2) = edges[i];
                let (q1, q2) = edges[j];
                if let Some(point) = segment_intersection(p1, p2, q1, q2) {
                    return Some(GeometryDefect::new("self-intersection", Some(point)));
                }
            }
        }

        None
    }

    /// Point-in-polygon by ray casting; points on the boundary count as inside.
    pub fn contains_point(&self, point: Coordinate) -> bool {
        let mut inside = false;
        for (a, b) in self.edges() {
            if on_segment(a, b, point) {
                return true;
            }
            if (a.y > point.y) != (b.y > point.y) {
                let x_at_y = a.x + (point.y - a.y) * (b.x - a.x) / (b.y - a.y);
                if point.x < x_at_y {
                    inside = !inside;
                }
            }
        }
        inside
    }

    pub fn intersects(&self, other: &Polygon) -> bool {
        for (p1, p2) in self.edges() {
            for (q1, q2) in other.edges() {
                if segment_intersection(p1, p2, q1, q2).is_some() {
                    return true;
                }
            }
        }

        self.exterior
            .first()
            .is_some_and(|point| other.contains_point(*point))
            || other
                .exterior
                .first()
                .is_some_and(|point| self.contains_point(*point))
    }
}

fn on_segment(a: Coordinate, b: Coordinate, point: Coordinate) -> bool {
    let ab = b.sub(a);
    let ap = point.sub(a);
    if ab.cross(ap).abs() >= EPSILON {
        return false;
    }
    let t = ap.dot(ab);
    t >= -EPSILON && t <= ab.dot(ab) + EPSILON
}

/// First common point of segments `p1-p2` and `q1-q2`, if any.
fn segment_intersection(
    p1: Coordinate,
    p2: Coordinate,
    q1: Coordinate,
    q2: Coordinate,
) -> Option<Coordinate> {
    let r = p2.sub(p1);
    let s = q2.sub(q1);
    let qp = q1.sub(p1);
    let denominator = r.cross(s);

    if denominator.abs() < EPSILON {
        if qp.cross(r).abs() >= EPSILON {
            return None;
        }
        let length = r.dot(r);
        if length < EPSILON {
            return on_segment(q1, q2, p1).then_some(p1);
        }
        let t0 = qp.dot(r) / length;
        let t1 = t0 + s.dot(r) / length;
        let (low, high) = if t0 <= t1 { (t0, t1) } else { (t1, t0) };
        if high < -EPSILON || low > 1.0 + EPSILON {
            return None;
        }
        return Some(p1.add_scaled(r, low.max(0.0)));
    }

    let t = qp.cross(s) / denominator;
    let u = qp.cross(r) / denominator;
    let range = -EPSILON..=1.0 + EPSILON;
    if range.contains(&t) && range.contains(&u) {
        Some(p1.add_scaled(r, t))
    } else {
        None
    }
}
