//! Randomized tear lines drawn over the pack, one per tap.
//!
//! Paths live in a normalized 100x100 space and always run from one edge to
//! the opposite one. The exact geometry comes from the injected random source.

use std::fmt::Write as _;

use rand::Rng;

pub const TEAR_SPACE: f64 = 100.0;
pub const TEAR_SEGMENTS: usize = 8;
const EDGE_BAND_MIN: f64 = 10.0;
const EDGE_BAND_MAX: f64 = 90.0;
const JAGGEDNESS: f64 = 7.5;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TearOrientation {
    Horizontal,
    Vertical,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TearPoint {
    pub x: f64,
    pub y: f64,
}

impl TearPoint {
    fn lerp(self, to: TearPoint, t: f64) -> TearPoint {
        TearPoint {
            x: self.x + (to.x - self.x) * t,
            y: self.y + (to.y - self.y) * t,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct TearPath {
    /// Zero-based tap that produced this path.
    pub ordinal: usize,
    pub orientation: TearOrientation,
    /// Edge start point, the jagged interior vertices, then the edge end point.
    pub points: Vec<TearPoint>,
}

impl TearPath {
    pub fn start(&self) -> TearPoint {
        self.points[0]
    }

    pub fn end(&self) -> TearPoint {
        self.points[self.points.len() - 1]
    }

    /// Points between the two edge points, each one displaced by noise.
    pub fn jagged_vertices(&self) -> &[TearPoint] {
        &self.points[1..self.points.len() - 1]
    }

    pub fn to_svg_path(&self) -> String {
        let mut out = String::with_capacity(self.points.len() * 16);
        for (index, point) in self.points.iter().enumerate() {
            let command = if index == 0 { "M" } else { " L" };
            let _ = write!(out, "{command} {:.2} {:.2}", point.x, point.y);
        }
        out
    }
}

/// Builds the tear for tap `ordinal`. The ordinal is recorded on the path but
/// does not influence the geometry.
pub fn generate_tear_path<R: Rng + ?Sized>(ordinal: usize, rng: &mut R) -> TearPath {
    let orientation = if rng.gen_bool(0.5) {
        TearOrientation::Horizontal
    } else {
        TearOrientation::Vertical
    };
    let start_offset = rng.gen_range(EDGE_BAND_MIN..=EDGE_BAND_MAX);
    let end_offset = rng.gen_range(EDGE_BAND_MIN..=EDGE_BAND_MAX);

    let (start, end) = match orientation {
        TearOrientation::Horizontal => (
            TearPoint {
                x: 0.0,
                y: start_offset,
            },
            TearPoint {
                x: TEAR_SPACE,
                y: end_offset,
            },
        ),
        TearOrientation::Vertical => (
            TearPoint {
                x: start_offset,
                y: 0.0,
            },
            TearPoint {
                x: end_offset,
                y: TEAR_SPACE,
            },
        ),
    };

    let mut points = Vec::with_capacity(TEAR_SEGMENTS + 1);
    points.push(start);
    for step in 1..TEAR_SEGMENTS {
        let base = start.lerp(end, step as f64 / TEAR_SEGMENTS as f64);
        points.push(TearPoint {
            x: base.x + rng.gen_range(-JAGGEDNESS..=JAGGEDNESS),
            y: base.y + rng.gen_range(-JAGGEDNESS..=JAGGEDNESS),
        });
    }
    points.push(end);

    TearPath {
        ordinal,
        orientation,
        points,
    }
}

#[cfg(test)]
#[path = "tests/tear_tests.rs"]
mod tests;
