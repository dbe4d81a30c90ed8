// THEORY:
// The `coverage` module is the renderer of scanned area. It owns a persistent RGBA
// raster the size of the current view and paints a translucent rectangle onto it
// for every agent on every tick.
//
// Key architectural principles:
// 1.  **Accumulation by Blending**: Each tick repaints the rectangle from the
//     agent's strip anchor to its current position with a low alpha. Rectangles are
//     composited source-over, so areas swept early are painted many times and end
//     up more opaque than fresh ones. Nothing is ever erased by a tick.
// 2.  **Screen Space Only**: The overlay knows pixels, not degrees. Callers project
//     geographic points first and hand over `ScreenRect`s.
// 3.  **Canvas Semantics**: Resizing reallocates the raster and therefore clears it,
//     exactly like resizing an HTML canvas. Out-of-bounds rectangles are clipped.

use crate::core_modules::viewport::ScreenPoint;
use image::codecs::png::PngEncoder;
use image::{ExtendedColorType, ImageEncoder, ImageError, Pixel, Rgba, RgbaImage};
use std::path::Path;

/// An axis-aligned rectangle in screen pixels, normalized so `x0 <= x1`, `y0 <= y1`.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ScreenRect {
    pub x0: f64,
    pub y0: f64,
    pub x1: f64,
    pub y1: f64,
}

impl ScreenRect {
    /// Builds the rectangle spanned by two opposite corners in any order.
    pub fn from_corners(a: ScreenPoint, b: ScreenPoint) -> Self {
        Self {
            x0: a.x.min(b.x),
            y0: a.y.min(b.y),
            x1: a.x.max(b.x),
            y1: a.y.max(b.y),
        }
    }

    pub fn width(&self) -> f64 {
        self.x1 - self.x0
    }

    pub fn height(&self) -> f64 {
        self.y1 - self.y0
    }

    pub fn is_empty(&self) -> bool {
        self.width() <= 0.0 || self.height() <= 0.0 || !self.width().is_finite() || !self.height().is_finite()
    }
}

/// The accumulating translucent coverage layer.
pub struct CoverageOverlay {
    canvas: RgbaImage,
}

impl CoverageOverlay {
    pub fn new(width: u32, height: u32) -> Self {
        Self {
            canvas: RgbaImage::new(width, height),
        }
    }

    pub fn width(&self) -> u32 {
        self.canvas.width()
    }

    pub fn height(&self) -> u32 {
        self.canvas.height()
    }

    /// Reallocates the raster for a new view size. Existing coverage is dropped.
    pub fn resize(&mut self, width: u32, height: u32) {
        self.canvas = RgbaImage::new(width, height);
    }

    /// Erases all coverage, keeping the current size.
    pub fn clear(&mut self) {
        for pixel in self.canvas.pixels_mut() {
            *pixel = Rgba([0, 0, 0, 0]);
        }
    }

    /// Alpha-blends `color` over every pixel the rectangle touches.
    /// Returns the number of pixels painted after clipping.
    pub fn paint(&mut self, rect: ScreenRect, color: Rgba<u8>) -> u64 {
        if rect.is_empty() || color[3] == 0 {
            return 0;
        }

        let (width, height) = (self.canvas.width() as f64, self.canvas.height() as f64);
        let x_start = rect.x0.floor().clamp(0.0, width) as u32;
        let x_end = rect.x1.ceil().clamp(0.0, width) as u32;
        let y_start = rect.y0.floor().clamp(0.0, height) as u32;
        let y_end = rect.y1.ceil().clamp(0.0, height) as u32;

        let mut painted = 0u64;
        for y in y_start..y_end {
            for x in x_start..x_end {
                self.canvas.get_pixel_mut(x, y).blend(&color);
                painted += 1;
            }
        }
        painted
    }

    /// Number of pixels carrying any coverage at all.
    pub fn covered_pixels(&self) -> usize {
        self.canvas.pixels().filter(|p| p[3] > 0).count()
    }

    pub fn is_empty(&self) -> bool {
        self.canvas.pixels().all(|p| p[3] == 0)
    }

    pub fn pixel(&self, x: u32, y: u32) -> Option<Rgba<u8>> {
        (x < self.canvas.width() && y < self.canvas.height()).then(|| *self.canvas.get_pixel(x, y))
    }

    pub fn image(&self) -> &RgbaImage {
        &self.canvas
    }

    /// Writes the overlay as an RGBA PNG.
    pub fn save_png(&self, path: impl AsRef<Path>) -> Result<(), ImageError> {
        write_png(&self.canvas, path)
    }
}

/// Encodes a coverage raster as an RGBA PNG at `path`.
pub fn write_png(raster: &RgbaImage, path: impl AsRef<Path>) -> Result<(), ImageError> {
    let output = std::fs::File::create(path)?;
    let encoder = PngEncoder::new(output);
    encoder.write_image(raster.as_raw(), raster.width(), raster.height(), ExtendedColorType::Rgba8)?;
    Ok(())
}
