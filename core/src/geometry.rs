//! Planar polygon helpers used to derive areas, widths and travel distances.

use glam::DVec2;
use serde::{Deserialize, Serialize};

const EDGE_TOLERANCE: f64 = 1e-9;

/// Outline encoding accepted in building descriptions.
///
/// Two shapes occur in the wild: an object carrying a `points` list of
/// `{"x", "y"}` records, and a bare ring of `[x, y]` pairs whose last vertex
/// repeats the first.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Outline {
    /// Object form with explicit point records.
    Points {
        /// Vertices in drawing order.
        points: Vec<OutlinePoint>,
    },
    /// Closed ring of coordinate pairs.
    Ring(Vec<[f64; 2]>),
}

/// Single vertex of an [`Outline::Points`] outline.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct OutlinePoint {
    /// Horizontal coordinate in metres.
    pub x: f64,
    /// Vertical coordinate in metres.
    pub y: f64,
}

impl Outline {
    /// Extracts the polygon vertices, dropping the closing vertex of rings.
    #[must_use]
    pub fn vertices(&self) -> Vec<DVec2> {
        match self {
            Self::Points { points } => points.iter().map(|p| DVec2::new(p.x, p.y)).collect(),
            Self::Ring(ring) => {
                let open = ring.len().saturating_sub(1);
                ring[..open].iter().map(|&[x, y]| DVec2::new(x, y)).collect()
            }
        }
    }
}

/// Simple polygon described by its vertices in drawing order.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct Polygon {
    vertices: Vec<DVec2>,
}

impl Polygon {
    /// Creates a polygon from the provided vertices.
    #[must_use]
    pub fn new(vertices: Vec<DVec2>) -> Self {
        Self { vertices }
    }

    /// Vertices in drawing order.
    #[must_use]
    pub fn vertices(&self) -> &[DVec2] {
        &self.vertices
    }

    /// Absolute area computed with the shoelace formula.
    #[must_use]
    pub fn area(&self) -> f64 {
        let twice: f64 = self.edges().map(|(a, b)| a.perp_dot(b)).sum();
        (0.5 * twice).abs()
    }

    /// Arithmetic mean of the vertices.
    ///
    /// This is the reference point used for centre-to-centre travel distances,
    /// not the area-weighted centroid.
    #[must_use]
    pub fn centroid(&self) -> DVec2 {
        if self.vertices.is_empty() {
            return DVec2::ZERO;
        }
        let sum: DVec2 = self.vertices.iter().copied().sum();
        sum / self.vertices.len() as f64
    }

    /// Length of the longest edge of the closed ring.
    #[must_use]
    pub fn max_edge_length(&self) -> f64 {
        self.edges()
            .map(|(a, b)| a.distance(b))
            .fold(0.0, f64::max)
    }

    /// Reports whether the point lies inside the polygon or on its boundary.
    #[must_use]
    pub fn contains(&self, point: DVec2) -> bool {
        let mut inside = false;
        for (a, b) in self.edges() {
            if (a.distance(point) + point.distance(b) - a.distance(b)).abs() <= EDGE_TOLERANCE {
                return true;
            }
            if (a.y > point.y) != (b.y > point.y)
                && point.x < (b.x - a.x) * (point.y - a.y) / (b.y - a.y) + a.x
            {
                inside = !inside;
            }
        }
        inside
    }

    fn edges(&self) -> impl Iterator<Item = (DVec2, DVec2)> + '_ {
        let count = self.vertices.len();
        (0..count).map(move |index| (self.vertices[index], self.vertices[(index + 1) % count]))
    }
}

/// Euclidean distance between two reference points.
#[must_use]
pub fn distance(a: DVec2, b: DVec2) -> f64 {
    a.distance(b)
}
