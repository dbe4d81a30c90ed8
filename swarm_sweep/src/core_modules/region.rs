// THEORY:
// The `region` module is the geometric foundation of the sweep engine. It owns the
// two shapes every other layer talks about: the `BoundingRegion` the user drew and
// the `SubRegion` strips each agent is assigned.
//
// Key architectural principles:
// 1.  **Valid by Construction**: A `BoundingRegion` can only be built through
//     constructors that normalize and validate it. Degenerate or inverted bounds are
//     rejected here, before any agent exists, so the frame loop never has to cope
//     with a zero-area strip or a NaN speed.
// 2.  **Strip Partitioning**: Like the grid manager slicing a frame into chunks, the
//     `partition` function slices the longitude span into N equal-width vertical
//     strips. Every strip shares the full latitude span, strips are ordered west to
//     east, and adjacent strips share their boundary exactly.
// 3.  **Flat-Earth Area**: Areas are plain `height * width` in square degrees. They
//     are only ever compared against each other (for speed normalization), so no
//     geodesic correction is applied.

use crate::error::ScanError;
use serde::{Deserialize, Serialize};

/// A geographic point in floating-point degrees.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct LatLng {
    pub lat: f64,
    pub lng: f64,
}

impl LatLng {
    pub const fn new(lat: f64, lng: f64) -> Self {
        Self { lat, lng }
    }
}

/// An axis-aligned rectangle in latitude/longitude space.
///
/// Invariant: `lat_min < lat_max`, `lng_min < lng_max`, all values finite.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct BoundingRegion {
    lat_min: f64,
    lat_max: f64,
    lng_min: f64,
    lng_max: f64,
}

impl BoundingRegion {
    /// Builds a region from explicit bounds, rejecting inverted or degenerate input.
    pub fn new(lat_min: f64, lat_max: f64, lng_min: f64, lng_max: f64) -> Result<Self, ScanError> {
        if ![lat_min, lat_max, lng_min, lng_max].iter().all(|v| v.is_finite()) {
            return Err(ScanError::invalid_region("bounds must be finite"));
        }
        if lat_min > lat_max || lng_min > lng_max {
            return Err(ScanError::invalid_region(format!(
                "inverted bounds lat [{lat_min}, {lat_max}] lng [{lng_min}, {lng_max}]"
            )));
        }
        if lat_max - lat_min <= 0.0 {
            return Err(ScanError::invalid_region("zero height"));
        }
        if lng_max - lng_min <= 0.0 {
            return Err(ScanError::invalid_region("zero width"));
        }
        Ok(Self { lat_min, lat_max, lng_min, lng_max })
    }

    /// Builds a region from two opposite corners captured in any order.
    pub fn from_corners(a: LatLng, b: LatLng) -> Result<Self, ScanError> {
        Self::new(a.lat.min(b.lat), a.lat.max(b.lat), a.lng.min(b.lng), a.lng.max(b.lng))
    }

    pub fn lat_min(&self) -> f64 {
        self.lat_min
    }

    pub fn lat_max(&self) -> f64 {
        self.lat_max
    }

    pub fn lng_min(&self) -> f64 {
        self.lng_min
    }

    pub fn lng_max(&self) -> f64 {
        self.lng_max
    }

    /// Longitude span in degrees.
    pub fn width(&self) -> f64 {
        self.lng_max - self.lng_min
    }

    /// Latitude span in degrees.
    pub fn height(&self) -> f64 {
        self.lat_max - self.lat_min
    }

    /// Rectangular area in square degrees.
    pub fn area(&self) -> f64 {
        self.height() * self.width()
    }

    /// The north-west corner, where every sweep starts.
    pub fn top_left(&self) -> LatLng {
        LatLng::new(self.lat_max, self.lng_min)
    }

    pub fn center(&self) -> LatLng {
        LatLng::new(
            (self.lat_min + self.lat_max) / 2.0,
            (self.lng_min + self.lng_max) / 2.0,
        )
    }

    pub fn contains(&self, point: LatLng) -> bool {
        point.lat >= self.lat_min
            && point.lat <= self.lat_max
            && point.lng >= self.lng_min
            && point.lng <= self.lng_max
    }

    /// Expands every side by `ratio` times the corresponding extent.
    pub fn pad(&self, ratio: f64) -> Self {
        let dlat = self.height() * ratio.max(0.0);
        let dlng = self.width() * ratio.max(0.0);
        Self {
            lat_min: self.lat_min - dlat,
            lat_max: self.lat_max + dlat,
            lng_min: self.lng_min - dlng,
            lng_max: self.lng_max + dlng,
        }
    }
}

/// One agent's exclusive vertical strip of the parent region.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct SubRegion {
    /// Position of this strip, counted from the west edge.
    pub index: usize,
    /// The strip's own bounds; latitude span equals the parent's.
    pub bounds: BoundingRegion,
}

impl SubRegion {
    pub fn area(&self) -> f64 {
        self.bounds.area()
    }
}

/// Splits `region` into `n` equal-width, gap-free strips ordered west to east.
pub fn partition(region: &BoundingRegion, n: usize) -> Result<Vec<SubRegion>, ScanError> {
    if n < 1 {
        return Err(ScanError::invalid_region("cannot partition into zero strips"));
    }

    let strip_width = region.width() / n as f64;
    let mut strips = Vec::with_capacity(n);

    for i in 0..n {
        let lng_min = region.lng_min + i as f64 * strip_width;
        // The last strip ends on the parent's edge so rounding never leaves a sliver.
        let lng_max = if i + 1 == n {
            region.lng_max
        } else {
            region.lng_min + (i + 1) as f64 * strip_width
        };
        let bounds = BoundingRegion::new(region.lat_min, region.lat_max, lng_min, lng_max)?;
        strips.push(SubRegion { index: i, bounds });
    }

    Ok(strips)
}

#[cfg(test)]
mod tests {
    use super::*;

    const EPSILON: f64 = 1e-12;

    fn region(lat_min: f64, lat_max: f64, lng_min: f64, lng_max: f64) -> BoundingRegion {
        BoundingRegion::new(lat_min, lat_max, lng_min, lng_max).expect("valid region")
    }

    #[test]
    fn test_partition_is_contiguous_for_every_agent_count() {
        let parent = region(-12.25, 47.5, 3.1, 19.77);
        for n in 1..=5 {
            let strips = partition(&parent, n).expect("partition");
            assert_eq!(strips.len(), n);

            assert_eq!(strips[0].bounds.lng_min(), parent.lng_min());
            assert_eq!(strips[n - 1].bounds.lng_max(), parent.lng_max());

            for pair in strips.windows(2) {
                // Shared edges: no gap, no overlap.
                assert_eq!(pair[0].bounds.lng_max(), pair[1].bounds.lng_min());
                assert!(pair[0].index < pair[1].index);
            }

            let total: f64 = strips.iter().map(|s| s.bounds.width()).sum();
            assert!((total - parent.width()).abs() < EPSILON, "n={n}: {total}");

            for strip in &strips {
                assert_eq!(strip.bounds.lat_min(), parent.lat_min());
                assert_eq!(strip.bounds.lat_max(), parent.lat_max());
            }
        }
    }

    #[test]
    fn test_two_strip_scenario() {
        let parent = region(0.0, 1.0, 0.0, 2.0);
        let strips = partition(&parent, 2).unwrap();
        assert_eq!((strips[0].bounds.lng_min(), strips[0].bounds.lng_max()), (0.0, 1.0));
        assert_eq!((strips[1].bounds.lng_min(), strips[1].bounds.lng_max()), (1.0, 2.0));
        assert!((strips[0].area() - 1.0).abs() < EPSILON);
        assert!((strips[1].area() - 1.0).abs() < EPSILON);
    }

    #[test]
    fn test_four_strip_scenario_has_equal_speeds() {
        let parent = region(0.0, 1.0, 0.0, 4.0);
        let strips = partition(&parent, 4).unwrap();
        let edges: Vec<(f64, f64)> = strips.iter().map(|s| (s.bounds.lng_min(), s.bounds.lng_max())).collect();
        assert_eq!(edges, vec![(0.0, 1.0), (1.0, 2.0), (2.0, 3.0), (3.0, 4.0)]);

        let speeds = crate::core_modules::trajectory::SpeedProfile::default().speeds_for(&strips);
        assert!(speeds.iter().all(|s| (s - 0.0005).abs() < 1e-12), "{speeds:?}");
    }

    #[test]
    fn test_partition_rejects_zero_strips() {
        let parent = region(0.0, 1.0, 0.0, 1.0);
        assert!(matches!(partition(&parent, 0), Err(ScanError::InvalidRegion(_))));
    }

    #[test]
    fn test_degenerate_and_inverted_regions_are_rejected() {
        assert!(BoundingRegion::new(1.0, 1.0, 0.0, 2.0).is_err());
        assert!(BoundingRegion::new(0.0, 1.0, 2.0, 2.0).is_err());
        assert!(BoundingRegion::new(2.0, 1.0, 0.0, 2.0).is_err());
        assert!(BoundingRegion::new(0.0, f64::NAN, 0.0, 2.0).is_err());
        assert!(BoundingRegion::new(0.0, 1.0, f64::NEG_INFINITY, 2.0).is_err());
    }

    #[test]
    fn test_corners_normalize_in_any_order() {
        let forward = BoundingRegion::from_corners(LatLng::new(1.0, 1.0), LatLng::new(5.0, 5.0)).unwrap();
        let reverse = BoundingRegion::from_corners(LatLng::new(5.0, 5.0), LatLng::new(1.0, 1.0)).unwrap();
        assert_eq!(forward, reverse);
        assert_eq!(reverse.lat_min(), 1.0);
        assert_eq!(reverse.lat_max(), 5.0);
        assert_eq!(reverse.lng_min(), 1.0);
        assert_eq!(reverse.lng_max(), 5.0);

        // Mixed diagonal: north-east click first, south-west second.
        let mixed = BoundingRegion::from_corners(LatLng::new(1.0, 5.0), LatLng::new(5.0, 1.0)).unwrap();
        assert_eq!(mixed, forward);
    }

    #[test]
    fn test_pad_and_center() {
        let r = region(0.0, 10.0, 0.0, 20.0);
        let padded = r.pad(0.05);
        assert!((padded.lat_min() + 0.5).abs() < EPSILON);
        assert!((padded.lat_max() - 10.5).abs() < EPSILON);
        assert!((padded.lng_min() + 1.0).abs() < EPSILON);
        assert!((padded.lng_max() - 21.0).abs() < EPSILON);
        assert_eq!(r.center(), LatLng::new(5.0, 10.0));
        assert_eq!(r.top_left(), LatLng::new(10.0, 0.0));
        assert!(r.contains(LatLng::new(5.0, 5.0)));
        assert!(!r.contains(LatLng::new(11.0, 5.0)));
    }
}
