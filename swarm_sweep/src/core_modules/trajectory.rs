// THEORY:
// The `trajectory` module is the path generator. Each agent owns one `Trajectory`,
// a small state machine that produces the agent's next position every time the
// frame loop asks for it.
//
// Key architectural principles:
// 1.  **Boustrophedon Sweep**: The agent starts at the strip's north-west corner and
//     moves east. When it would overshoot an edge it is clamped to that edge, drops
//     one row (a fixed pitch in degrees of latitude) and reverses direction. The
//     result is the familiar lawnmower pattern.
// 2.  **Lazy and Deterministic**: Nothing is precomputed. The same bounds and speed
//     always produce the same sequence, one point per call.
// 3.  **Idempotent Terminal State**: Once the sweep reaches the strip's southern
//     edge, every further call returns the same terminal point. A finished agent
//     that is stepped again does not drift.
// 4.  **Fair Speeds**: Speeds are normalized against the largest strip so that
//     every agent finishes in comparable wall-clock time regardless of its area.

use crate::core_modules::region::{BoundingRegion, LatLng, SubRegion};
use serde::Deserialize;

/// Default latitude drop between two sweep rows, in degrees.
pub const DEFAULT_ROW_PITCH: f64 = 0.0005;

/// Lateral direction of travel along a row.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Direction {
    East,
    West,
}

impl Direction {
    /// `+1.0` for east, `-1.0` for west.
    pub fn sign(self) -> f64 {
        match self {
            Direction::East => 1.0,
            Direction::West => -1.0,
        }
    }
}

/// Bounds for the per-tick longitude step, in degrees per tick.
#[derive(Debug, Clone, Copy, PartialEq, Deserialize)]
#[serde(default)]
pub struct SpeedProfile {
    pub min_speed: f64,
    pub max_speed: f64,
}

impl Default for SpeedProfile {
    fn default() -> Self {
        Self {
            min_speed: 0.00005,
            max_speed: 0.0005,
        }
    }
}

impl SpeedProfile {
    /// Linear interpolation between `min_speed` and `max_speed` by area ratio.
    pub fn normalized(&self, area: f64, largest_area: f64) -> f64 {
        if largest_area <= 0.0 {
            return self.min_speed;
        }
        if area >= largest_area {
            return self.max_speed;
        }
        let ratio = (area / largest_area).clamp(0.0, 1.0);
        self.min_speed + (self.max_speed - self.min_speed) * ratio
    }

    /// Speeds for a whole partition, in strip order.
    ///
    /// The largest strip always receives exactly `max_speed`.
    pub fn speeds_for(&self, strips: &[SubRegion]) -> Vec<f64> {
        let largest_area = strips.iter().map(SubRegion::area).fold(0.0, f64::max);
        strips
            .iter()
            .map(|strip| self.normalized(strip.area(), largest_area))
            .collect()
    }
}

/// The stepping state of one agent's sweep.
#[derive(Debug, Clone, PartialEq)]
pub struct Trajectory {
    bounds: BoundingRegion,
    speed: f64,
    row_pitch: f64,
    lat: f64,
    lng: f64,
    direction: Direction,
}

impl Trajectory {
    /// Starts a sweep at the north-west corner heading east.
    pub fn new(bounds: BoundingRegion, speed: f64, row_pitch: f64) -> Self {
        let start = bounds.top_left();
        Self {
            bounds,
            speed,
            row_pitch,
            lat: start.lat,
            lng: start.lng,
            direction: Direction::East,
        }
    }

    /// Advances one tick and returns the new position.
    pub fn step(&mut self) -> LatLng {
        if self.is_complete() {
            return LatLng::new(self.bounds.lat_min(), self.lng);
        }

        self.lng += self.direction.sign() * self.speed;

        if self.lng > self.bounds.lng_max() {
            self.lng = self.bounds.lng_max();
            self.next_row(Direction::West);
        } else if self.lng < self.bounds.lng_min() {
            self.lng = self.bounds.lng_min();
            self.next_row(Direction::East);
        }

        self.position()
    }

    fn next_row(&mut self, direction: Direction) {
        // Never report a point south of the strip.
        self.lat = (self.lat - self.row_pitch).max(self.bounds.lat_min());
        self.direction = direction;
    }

    /// True once the sweep has reached the southern edge.
    pub fn is_complete(&self) -> bool {
        self.lat <= self.bounds.lat_min()
    }

    pub fn position(&self) -> LatLng {
        LatLng::new(self.lat, self.lng)
    }

    pub fn direction(&self) -> Direction {
        self.direction
    }

    pub fn speed(&self) -> f64 {
        self.speed
    }

    pub fn bounds(&self) -> &BoundingRegion {
        &self.bounds
    }
}
