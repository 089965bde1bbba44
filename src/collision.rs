//! Geometric overlap tests between vehicle footprints.

use crate::math::{cross, heading_vector, rot90, LineSegment2d, Point2d};
use crate::VehicleId;
use cgmath::prelude::*;
use itertools::Itertools;

/// The rectangle occupied by a vehicle.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Footprint {
    /// The vehicle the footprint belongs to.
    pub id: VehicleId,
    /// The centre of the rectangle.
    pub centre: Point2d,
    /// The corners, anti-clockwise from front-left when the heading is zero.
    pub corners: [Point2d; 4],
    /// The length of the rectangle's diagonal.
    pub diagonal: f64,
}

impl Footprint {
    /// Computes the footprint of a vehicle from its centre, heading and dimensions.
    pub fn new(id: VehicleId, centre: Point2d, heading: f64, length: f64, width: f64) -> Self {
        let long = 0.5 * length * heading_vector(heading);
        let lat = 0.5 * width * rot90(heading_vector(heading));
        Self {
            id,
            centre,
            corners: [
                centre + long + lat,
                centre - long + lat,
                centre - long - lat,
                centre + long - lat,
            ],
            diagonal: length.hypot(width),
        }
    }

    /// The four edges of the rectangle.
    pub fn edges(&self) -> [LineSegment2d; 4] {
        let c = &self.corners;
        [0, 1, 2, 3].map(|i| LineSegment2d::from_ends(c[i], c[(i + 1) % 4]))
    }

    /// Whether `point` lies inside or on the rectangle.
    pub fn contains(&self, point: Point2d) -> bool {
        let c = &self.corners;
        let sides = [0, 1, 2, 3].map(|i| cross(c[(i + 1) % 4] - c[i], point - c[i]));
        sides.iter().all(|s| *s >= 0.0) || sides.iter().all(|s| *s <= 0.0)
    }

    /// Whether this footprint overlaps `other`.
    /// A footprint never collides with another of the same vehicle.
    pub fn collides(&self, other: &Footprint) -> bool {
        if self.id == other.id {
            return false;
        }

        // Broad phase
        if self.centre.distance(other.centre) > self.diagonal + other.diagonal {
            return false;
        }

        let edges = other.edges();
        let crossing = self
            .edges()
            .iter()
            .any(|a| edges.iter().any(|b| a.intersects(b)));

        // One rectangle may lie entirely inside the other
        crossing || other.contains(self.corners[0]) || self.contains(other.corners[0])
    }
}

/// Finds every pair of overlapping footprints.
///
/// Each colliding pair is reported once, as `(lower ID, higher ID)`,
/// and the result is sorted.
pub fn detect_collisions(footprints: &[Footprint]) -> Vec<(VehicleId, VehicleId)> {
    footprints
        .iter()
        .tuple_combinations()
        .filter(|(a, b)| a.collides(b))
        .map(|(a, b)| if a.id < b.id { (a.id, b.id) } else { (b.id, a.id) })
        .sorted()
        .dedup()
        .collect()
}
