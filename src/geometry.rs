//! 2-D geometry primitives
//!
//! Exposes only the operations the snapping and cutting stages need:
//! bounding rectangles, point-to-line distance, curvilinear projection and
//! interpolation, and cutting a polyline at one or more points. Linestrings
//! are stored as a flat `Vec<Point>`; there is no dependency on a general
//! geometry engine.

use serde::{Deserialize, Serialize};

/// A 2-D coordinate in the analysis projection (metre units).
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Point {
    pub x: f64,
    pub y: f64,
}

impl Point {
    pub fn new(x: f64, y: f64) -> Self {
        Self { x, y }
    }

    pub fn distance_to(&self, other: &Point) -> f64 {
        let dx = self.x - other.x;
        let dy = self.y - other.y;
        (dx * dx + dy * dy).sqrt()
    }
}

/// Axis-aligned bounding rectangle.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Rect {
    pub xmin: f64,
    pub ymin: f64,
    pub xmax: f64,
    pub ymax: f64,
}

impl Rect {
    pub fn from_point(p: Point) -> Self {
        Self {
            xmin: p.x,
            ymin: p.y,
            xmax: p.x,
            ymax: p.y,
        }
    }

    pub fn expand(&mut self, p: &Point) {
        self.xmin = self.xmin.min(p.x);
        self.ymin = self.ymin.min(p.y);
        self.xmax = self.xmax.max(p.x);
        self.ymax = self.ymax.max(p.y);
    }

    pub fn union(&self, other: &Rect) -> Rect {
        Rect {
            xmin: self.xmin.min(other.xmin),
            ymin: self.ymin.min(other.ymin),
            xmax: self.xmax.max(other.xmax),
            ymax: self.ymax.max(other.ymax),
        }
    }

    pub fn intersects(&self, other: &Rect) -> bool {
        self.xmin <= other.xmax
            && self.xmax >= other.xmin
            && self.ymin <= other.ymax
            && self.ymax >= other.ymin
    }

    /// Rectangle expanded by `d` in every direction (the snap-tolerance window).
    pub fn buffer(&self, d: f64) -> Rect {
        Rect {
            xmin: self.xmin - d,
            ymin: self.ymin - d,
            xmax: self.xmax + d,
            ymax: self.ymax + d,
        }
    }
}

/// A directed polyline: an ordered sequence of at least two distinct
/// coordinates.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Polyline {
    pub coords: Vec<Point>,
}

impl Polyline {
    pub fn new(coords: Vec<Point>) -> Self {
        Self { coords }
    }

    pub fn first(&self) -> Point {
        self.coords[0]
    }

    pub fn last(&self) -> Point {
        self.coords[self.coords.len() - 1]
    }

    pub fn bounding_rect(&self) -> Rect {
        let mut rect = Rect::from_point(self.coords[0]);
        for p in &self.coords[1..] {
            rect.expand(p);
        }
        rect
    }

    /// Sum of segment lengths.
    pub fn length(&self) -> f64 {
        self.coords
            .windows(2)
            .map(|w| w[0].distance_to(&w[1]))
            .sum()
    }

    pub fn straight_line_distance(&self) -> f64 {
        self.first().distance_to(&self.last())
    }

    /// Ratio of along-line length to straight-line distance, clamped to >= 1.
    pub fn sinuosity(&self) -> f64 {
        let straight = self.straight_line_distance();
        if straight <= 0.0 {
            return 1.0;
        }
        (self.length() / straight).max(1.0)
    }

    /// Minimum distance from `p` to any segment of this polyline.
    pub fn distance_to_point(&self, p: &Point) -> f64 {
        self.coords
            .windows(2)
            .map(|w| point_segment_distance(p, &w[0], &w[1]))
            .fold(f64::INFINITY, f64::min)
    }

    /// Curvilinear coordinate (distance along the line from its first
    /// coordinate) of the closest point on the line to `p`.
    pub fn project(&self, p: &Point) -> f64 {
        let mut best_dist = f64::INFINITY;
        let mut best_s = 0.0;
        let mut cumulative = 0.0;
        for w in self.coords.windows(2) {
            let (a, b) = (w[0], w[1]);
            let seg_len = a.distance_to(&b);
            let (t, dist) = project_onto_segment(p, &a, &b);
            if dist < best_dist {
                best_dist = dist;
                best_s = cumulative + t * seg_len;
            }
            cumulative += seg_len;
        }
        best_s
    }

    /// Point at curvilinear distance `s` along the line, clamped to
    /// `[0, length]`.
    pub fn interpolate(&self, s: f64) -> Point {
        let total = self.length();
        let s = s.clamp(0.0, total);
        let mut cumulative = 0.0;
        for w in self.coords.windows(2) {
            let (a, b) = (w[0], w[1]);
            let seg_len = a.distance_to(&b);
            if seg_len <= 0.0 {
                continue;
            }
            if cumulative + seg_len >= s || w == self.coords.windows(2).last().unwrap() {
                let t = ((s - cumulative) / seg_len).clamp(0.0, 1.0);
                return Point::new(a.x + t * (b.x - a.x), a.y + t * (b.y - a.y));
            }
            cumulative += seg_len;
        }
        self.last()
    }

    /// Splits this polyline at one or more ascending curvilinear positions,
    /// inserting an exact interpolated vertex at each cut so every
    /// sub-polyline's endpoints are precise. Positions must be sorted
    /// ascending and lie within `[0, length]`; callers (the cutter) are
    /// responsible for validating monotonicity before calling this.
    pub fn cut_at(&self, positions: &[f64]) -> Vec<Polyline> {
        if positions.is_empty() {
            return vec![self.clone()];
        }

        let mut result = Vec::with_capacity(positions.len() + 1);
        let mut current: Vec<Point> = vec![self.first()];
        let mut cumulative = 0.0;
        let mut pos_idx = 0;

        for w in self.coords.windows(2) {
            let (a, b) = (w[0], w[1]);
            let seg_len = a.distance_to(&b);
            let seg_start = cumulative;
            let seg_end = cumulative + seg_len;

            while pos_idx < positions.len() && positions[pos_idx] <= seg_end {
                let s = positions[pos_idx].max(seg_start);
                let t = if seg_len > 0.0 {
                    ((s - seg_start) / seg_len).clamp(0.0, 1.0)
                } else {
                    0.0
                };
                let cut_point = Point::new(a.x + t * (b.x - a.x), a.y + t * (b.y - a.y));
                current.push(cut_point);
                result.push(Polyline::new(current.clone()));
                current = vec![cut_point];
                pos_idx += 1;
            }

            current.push(b);
            cumulative = seg_end;
        }

        result.push(Polyline::new(current));
        result
    }
}

/// Returns `(t, distance)` where `t` in `[0, 1]` is the parametric position
/// of the closest point on segment `a`-`b` to `p`, and `distance` is the
/// Euclidean distance from `p` to that closest point.
fn project_onto_segment(p: &Point, a: &Point, b: &Point) -> (f64, f64) {
    let dx = b.x - a.x;
    let dy = b.y - a.y;
    let len_sq = dx * dx + dy * dy;
    let t = if len_sq <= 0.0 {
        0.0
    } else {
        (((p.x - a.x) * dx + (p.y - a.y) * dy) / len_sq).clamp(0.0, 1.0)
    };
    let closest = Point::new(a.x + t * dx, a.y + t * dy);
    (t, p.distance_to(&closest))
}

fn point_segment_distance(p: &Point, a: &Point, b: &Point) -> f64 {
    project_onto_segment(p, a, b).1
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    fn line(coords: &[(f64, f64)]) -> Polyline {
        Polyline::new(coords.iter().map(|&(x, y)| Point::new(x, y)).collect())
    }

    #[test]
    fn straight_line_length_and_sinuosity() {
        let l = line(&[(0.0, 0.0), (100.0, 0.0)]);
        assert_relative_eq!(l.length(), 100.0);
        assert_relative_eq!(l.sinuosity(), 1.0);
    }

    #[test]
    fn sinuosity_clamped_to_one_when_straight_distance_zero() {
        let l = line(&[(0.0, 0.0), (10.0, 0.0), (0.0, 0.0)]);
        assert_relative_eq!(l.sinuosity(), 1.0);
    }

    #[test]
    fn project_and_interpolate_round_trip() {
        let l = line(&[(0.0, 0.0), (100.0, 0.0)]);
        let p = Point::new(40.0, 5.0);
        let s = l.project(&p);
        assert_relative_eq!(s, 40.0);
        let back = l.interpolate(s);
        assert_relative_eq!(back.x, 40.0);
        assert_relative_eq!(back.y, 0.0);
    }

    #[test]
    fn distance_to_point_is_perpendicular_distance() {
        let l = line(&[(0.0, 0.0), (100.0, 0.0)]);
        let p = Point::new(40.0, 5.0);
        assert_relative_eq!(l.distance_to_point(&p), 5.0);
    }

    #[test]
    fn cut_at_single_position_splits_into_two() {
        let l = line(&[(0.0, 0.0), (100.0, 0.0)]);
        let parts = l.cut_at(&[40.0]);
        assert_eq!(parts.len(), 2);
        assert_relative_eq!(parts[0].length(), 40.0);
        assert_relative_eq!(parts[1].length(), 60.0);
        assert_relative_eq!(parts[0].length() + parts[1].length(), l.length());
    }

    #[test]
    fn cut_at_two_positions_splits_into_three() {
        let l = line(&[(0.0, 0.0), (300.0, 0.0)]);
        let parts = l.cut_at(&[100.0, 200.0]);
        assert_eq!(parts.len(), 3);
        assert_relative_eq!(parts[0].length(), 100.0);
        assert_relative_eq!(parts[1].length(), 100.0);
        assert_relative_eq!(parts[2].length(), 100.0);
    }

    #[test]
    fn cut_at_no_positions_returns_whole_line() {
        let l = line(&[(0.0, 0.0), (100.0, 0.0)]);
        let parts = l.cut_at(&[]);
        assert_eq!(parts.len(), 1);
        assert_eq!(parts[0], l);
    }

    #[test]
    fn rect_buffer_and_intersects() {
        let r = Rect::from_point(Point::new(0.0, 0.0));
        let buffered = r.buffer(10.0);
        assert_eq!(buffered.xmin, -10.0);
        assert_eq!(buffered.xmax, 10.0);
        let other = Rect::from_point(Point::new(5.0, 5.0));
        assert!(buffered.intersects(&other));
    }
}
