//! Screen projection for the map view.
//!
//! The sweep engine only ever asks one question of the map: where on screen does
//! this coordinate land? `Projector` is that seam. `Viewport` is the headless
//! implementation: a spherical Web-Mercator view with 256 px tiles, the projection
//! used by slippy-map libraries, so coverage rasters line up with real map tiles.

use crate::core_modules::region::{BoundingRegion, LatLng};
use std::f64::consts::PI;

const TILE_SIZE: f64 = 256.0;
/// Latitude limit of the square Mercator world.
pub const MAX_LATITUDE: f64 = 85.051_128_779_806_59;

/// A point in container pixels, origin at the top-left of the view.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct ScreenPoint {
    pub x: f64,
    pub y: f64,
}

/// Anything that can map geographic coordinates onto the drawing surface.
pub trait Projector {
    /// Container-pixel position of `point`.
    fn project(&self, point: LatLng) -> ScreenPoint;

    /// Size of the drawing surface in pixels.
    fn size(&self) -> (u32, u32);
}

/// A Web-Mercator view: center, zoom level and container size.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Viewport {
    center: LatLng,
    zoom: f64,
    width: u32,
    height: u32,
    max_zoom: f64,
}

impl Viewport {
    pub fn new(center: LatLng, zoom: f64, width: u32, height: u32, max_zoom: f64) -> Self {
        Self {
            center,
            zoom: zoom.clamp(0.0, max_zoom),
            width,
            height,
            max_zoom,
        }
    }

    pub fn center(&self) -> LatLng {
        self.center
    }

    pub fn zoom(&self) -> f64 {
        self.zoom
    }

    pub fn set_view(&mut self, center: LatLng, zoom: f64) {
        self.center = center;
        self.zoom = zoom.clamp(0.0, self.max_zoom);
    }

    pub fn resize(&mut self, width: u32, height: u32) {
        self.width = width;
        self.height = height;
    }

    /// Centers on `region` at the largest whole zoom level that shows all of it
    /// after padding each side by `padding` times its extent.
    pub fn fit_bounds(&mut self, region: &BoundingRegion, padding: f64) {
        let padded = region.pad(padding);
        let north_west = world_point(LatLng::new(padded.lat_max(), padded.lng_min()), 0.0);
        let south_east = world_point(LatLng::new(padded.lat_min(), padded.lng_max()), 0.0);

        let dx = (south_east.x - north_west.x).abs();
        let dy = (south_east.y - north_west.y).abs();

        let zoom = if dx <= 0.0 || dy <= 0.0 || self.width == 0 || self.height == 0 {
            self.max_zoom
        } else {
            let scale = (self.width as f64 / dx).min(self.height as f64 / dy);
            scale.log2().floor()
        };

        let middle = ScreenPoint {
            x: (north_west.x + south_east.x) / 2.0,
            y: (north_west.y + south_east.y) / 2.0,
        };
        self.set_view(unproject_world(middle, 0.0), zoom);
    }

    /// Inverse of `project`.
    pub fn unproject(&self, point: ScreenPoint) -> LatLng {
        let origin = self.pixel_origin();
        unproject_world(
            ScreenPoint {
                x: point.x + origin.x,
                y: point.y + origin.y,
            },
            self.zoom,
        )
    }

    fn pixel_origin(&self) -> ScreenPoint {
        let center = world_point(self.center, self.zoom);
        ScreenPoint {
            x: center.x - self.width as f64 / 2.0,
            y: center.y - self.height as f64 / 2.0,
        }
    }
}

impl Projector for Viewport {
    fn project(&self, point: LatLng) -> ScreenPoint {
        let world = world_point(point, self.zoom);
        let origin = self.pixel_origin();
        ScreenPoint {
            x: world.x - origin.x,
            y: world.y - origin.y,
        }
    }

    fn size(&self) -> (u32, u32) {
        (self.width, self.height)
    }
}

fn scale(zoom: f64) -> f64 {
    TILE_SIZE * 2f64.powf(zoom)
}

/// Absolute world-pixel position at `zoom`.
fn world_point(point: LatLng, zoom: f64) -> ScreenPoint {
    let lat = point.lat.clamp(-MAX_LATITUDE, MAX_LATITUDE).to_radians();
    let s = scale(zoom);
    ScreenPoint {
        x: (point.lng + 180.0) / 360.0 * s,
        y: (1.0 - (lat.tan() + 1.0 / lat.cos()).ln() / PI) / 2.0 * s,
    }
}

fn unproject_world(point: ScreenPoint, zoom: f64) -> LatLng {
    let s = scale(zoom);
    let lng = point.x / s * 360.0 - 180.0;
    let lat = (PI * (1.0 - 2.0 * point.y / s)).sinh().atan().to_degrees();
    LatLng::new(lat, lng)
}
