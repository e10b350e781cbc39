//! Synthetic graph rendering.
//!
//! [`GraphCanvas`] draws datasheet-style plots with known data: white
//! background, dark axes just outside the plot area, optional light grid,
//! anti-aliased curves in data coordinates, dots and legend swatches. Tests
//! and the CLI `synth` command use it to build inputs with exact ground truth.
//!
//! ```rust,ignore
//! use curve_extract::{GraphCalibration, GraphCanvas};
//!
//! let cal = GraphCalibration::linear(0.0, 10.0, 0.0, 10.0);
//! let mut canvas = GraphCanvas::new(800, 600, cal);
//! canvas.draw_axes();
//! canvas.draw_polyline(&[(0.0, 0.0), (10.0, 10.0)], rgb::RGB8::new(255, 0, 0), 2.0);
//! let png = canvas.to_png()?;
//! ```

use rgb::{RGB8, RGBA8};

use crate::calibration::{GraphCalibration, PixelBounds};
#[cfg(feature = "decode")]
use crate::error::Result;
use crate::mapper::CoordinateMapper;
use crate::raster::RasterImage;

const WHITE: RGB8 = RGB8::new(255, 255, 255);
const AXIS: RGB8 = RGB8::new(0, 0, 0);
const GRID: RGB8 = RGB8::new(225, 225, 225);

/// Default plot area: 10% margins, wider on the left and bottom for labels.
fn default_bounds(width: usize, height: usize) -> PixelBounds {
    PixelBounds::new(
        width * 3 / 40,
        height / 15,
        width.saturating_sub(width / 40 + 1),
        height.saturating_sub(height / 10 + 1),
    )
}

/// In-memory RGB canvas for rendering test graphs.
#[derive(Debug, Clone)]
pub struct GraphCanvas {
    width: usize,
    height: usize,
    mapper: CoordinateMapper,
    pixels: Vec<RGB8>,
}

impl GraphCanvas {
    /// White canvas. The plot area comes from `calibration.pixel_bounds`,
    /// or default margins when absent.
    #[must_use]
    pub fn new(width: usize, height: usize, calibration: GraphCalibration) -> Self {
        let bounds = calibration
            .pixel_bounds
            .unwrap_or_else(|| default_bounds(width, height))
            .clamp_to(width, height);
        Self {
            width,
            height,
            mapper: CoordinateMapper::new(calibration, bounds),
            pixels: vec![WHITE; width * height],
        }
    }

    /// Plot area in pixels.
    #[must_use]
    pub fn plot_area(&self) -> PixelBounds {
        self.mapper.bounds()
    }

    /// Mapper between the canvas pixels and data space.
    #[must_use]
    pub fn mapper(&self) -> &CoordinateMapper {
        &self.mapper
    }

    /// Overwrite one pixel; out-of-canvas positions are ignored.
    pub fn set_pixel(&mut self, col: usize, row: usize, color: RGB8) {
        if col < self.width && row < self.height {
            self.pixels[row * self.width + col] = color;
        }
    }

    fn blend(&mut self, col: usize, row: usize, color: RGB8, coverage: f64) {
        if col >= self.width || row >= self.height || coverage <= 0.0 {
            return;
        }
        let a = coverage.min(1.0);
        let idx = row * self.width + col;
        let bg = self.pixels[idx];
        let mix = |c: u8, b: u8| (f64::from(c) * a + f64::from(b) * (1.0 - a)).round() as u8;
        self.pixels[idx] = RGB8::new(mix(color.r, bg.r), mix(color.g, bg.g), mix(color.b, bg.b));
    }

    /// Fill a pixel rectangle (inclusive corners).
    pub fn fill_rect(&mut self, rect: PixelBounds, color: RGB8) {
        for row in rect.y0..=rect.y1 {
            for col in rect.x0..=rect.x1 {
                self.set_pixel(col, row, color);
            }
        }
    }

    /// Two-pixel black axes just outside the left and bottom edges of the plot area.
    pub fn draw_axes(&mut self) {
        let b = self.plot_area();
        let left = PixelBounds::new(b.x0.saturating_sub(2), b.y0, b.x0.saturating_sub(1), b.y1 + 2);
        let bottom = PixelBounds::new(b.x0.saturating_sub(2), b.y1 + 1, b.x1, b.y1 + 2);
        self.fill_rect(left, AXIS);
        self.fill_rect(bottom, AXIS);
    }

    /// Light gray grid with `divisions` cells per axis.
    pub fn draw_grid(&mut self, divisions: usize) {
        let b = self.plot_area();
        for i in 1..divisions {
            let col = b.x0 + (b.x1 - b.x0) * i / divisions;
            let row = b.y0 + (b.y1 - b.y0) * i / divisions;
            self.fill_rect(PixelBounds::new(col, b.y0, col, b.y1), GRID);
            self.fill_rect(PixelBounds::new(b.x0, row, b.x1, row), GRID);
        }
    }

    /// Anti-aliased line of `thickness` pixels between two pixel positions.
    pub fn draw_pixel_segment(&mut self, from: (f64, f64), to: (f64, f64), color: RGB8, thickness: f64) {
        let half = thickness / 2.0;
        let reach = half + 1.0;
        let col_lo = (from.0.min(to.0) - reach).floor().max(0.0) as usize;
        let col_hi = (from.0.max(to.0) + reach).ceil().max(0.0) as usize;
        let row_lo = (from.1.min(to.1) - reach).floor().max(0.0) as usize;
        let row_hi = (from.1.max(to.1) + reach).ceil().max(0.0) as usize;
        for row in row_lo..=row_hi.min(self.height.saturating_sub(1)) {
            for col in col_lo..=col_hi.min(self.width.saturating_sub(1)) {
                let d = segment_distance((col as f64, row as f64), from, to);
                self.blend(col, row, color, half + 0.5 - d);
            }
        }
    }

    /// Polyline through data-space points.
    pub fn draw_polyline(&mut self, points: &[(f64, f64)], color: RGB8, thickness: f64) {
        let pixels: Vec<(f64, f64)> = points.iter().map(|&(x, y)| self.mapper.to_pixel(x, y)).collect();
        if let [only] = pixels.as_slice() {
            self.draw_pixel_segment(*only, *only, color, thickness);
        }
        for pair in pixels.windows(2) {
            self.draw_pixel_segment(pair[0], pair[1], color, thickness);
        }
    }

    /// Sample `f` at `samples` evenly spaced x values in `[x_from, x_to]` and
    /// draw the resulting polyline.
    pub fn draw_function(
        &mut self,
        f: impl Fn(f64) -> f64,
        x_from: f64,
        x_to: f64,
        samples: usize,
        color: RGB8,
        thickness: f64,
    ) {
        let n = samples.max(2);
        let points: Vec<(f64, f64)> = (0..n)
            .map(|i| {
                let x = x_from + (x_to - x_from) * i as f64 / (n - 1) as f64;
                (x, f(x))
            })
            .collect();
        self.draw_polyline(&points, color, thickness);
    }

    /// Filled dot centred on a data-space point.
    pub fn draw_dot(&mut self, x: f64, y: f64, radius: f64, color: RGB8) {
        let center = self.mapper.to_pixel(x, y);
        self.draw_pixel_segment(center, center, color, radius * 2.0);
    }

    /// Solid legend swatch in pixel coordinates.
    pub fn draw_swatch(&mut self, col: usize, row: usize, width: usize, height: usize, color: RGB8) {
        if width == 0 || height == 0 {
            return;
        }
        self.fill_rect(PixelBounds::new(col, row, col + width - 1, row + height - 1), color);
    }

    /// Finish rendering.
    #[must_use]
    pub fn into_image(self) -> RasterImage {
        let pixels: Vec<RGBA8> = self.pixels.iter().map(|p| RGBA8::new(p.r, p.g, p.b, 255)).collect();
        RasterImage::from_img(imgref::ImgVec::new(pixels, self.width, self.height))
    }

    /// Encode as PNG.
    #[cfg(feature = "decode")]
    pub fn to_png(&self) -> Result<Vec<u8>> {
        let raw: Vec<u8> = self.pixels.iter().flat_map(|p| [p.r, p.g, p.b]).collect();
        let buffer = image::RgbImage::from_raw(self.width as u32, self.height as u32, raw).ok_or(
            crate::Error::DimensionMismatch {
                expected: self.width * self.height * 3,
                actual: self.pixels.len() * 3,
            },
        )?;
        let mut out = std::io::Cursor::new(Vec::new());
        buffer
            .write_to(&mut out, image::ImageFormat::Png)
            .map_err(|e| crate::Error::ImageDecode(e.to_string()))?;
        Ok(out.into_inner())
    }
}

/// Distance from `p` to the segment `a`-`b`.
fn segment_distance(p: (f64, f64), a: (f64, f64), b: (f64, f64)) -> f64 {
    let (dx, dy) = (b.0 - a.0, b.1 - a.1);
    let len2 = dx * dx + dy * dy;
    let t = if len2 == 0.0 {
        0.0
    } else {
        (((p.0 - a.0) * dx + (p.1 - a.1) * dy) / len2).clamp(0.0, 1.0)
    };
    let (cx, cy) = (a.0 + t * dx, a.1 + t * dy);
    ((p.0 - cx).powi(2) + (p.1 - cy).powi(2)).sqrt()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::calibration::detect_plot_area;

    #[test]
    fn test_axes_frame_the_plot_area() {
        let mut canvas = GraphCanvas::new(400, 300, GraphCalibration::linear(0.0, 1.0, 0.0, 1.0));
        canvas.draw_axes();
        canvas.draw_grid(4);
        let area = canvas.plot_area();
        let img = canvas.into_image();
        assert_eq!(detect_plot_area(&img), Some(area));
    }

    #[test]
    fn test_polyline_hits_expected_pixels() {
        let cal = GraphCalibration::linear(0.0, 10.0, 0.0, 10.0).with_bounds(PixelBounds::new(10, 10, 109, 109));
        let mut canvas = GraphCanvas::new(120, 120, cal);
        canvas.draw_polyline(&[(0.0, 5.0), (10.0, 5.0)], RGB8::new(255, 0, 0), 2.0);
        let img = canvas.into_image();
        // y = 5 sits at row 59.5; rows 59 and 60 are fully covered.
        assert_eq!(img.rgb(50, 59), RGB8::new(255, 0, 0));
        assert_eq!(img.rgb(50, 60), RGB8::new(255, 0, 0));
        assert_eq!(img.rgb(50, 40), WHITE);
    }

    #[test]
    fn test_edges_are_blended() {
        let mut canvas = GraphCanvas::new(40, 40, GraphCalibration::linear(0.0, 1.0, 0.0, 1.0));
        canvas.draw_pixel_segment((5.0, 20.3), (35.0, 20.3), RGB8::new(0, 0, 255), 1.0);
        let img = canvas.into_image();
        let edge = img.rgb(20, 21);
        assert!(edge.r > 0 && edge.r < 255, "{edge:?}");
        assert_eq!(edge.b, 255);
    }

    #[test]
    fn test_swatch_and_dot() {
        let mut canvas = GraphCanvas::new(50, 50, GraphCalibration::linear(0.0, 1.0, 0.0, 1.0));
        canvas.draw_swatch(2, 2, 4, 3, RGB8::new(0, 200, 0));
        canvas.draw_dot(0.5, 0.5, 0.5, RGB8::new(255, 0, 0));
        let center = canvas.mapper().to_pixel(0.5, 0.5);
        let img = canvas.into_image();
        assert_eq!(img.rgb(5, 4), RGB8::new(0, 200, 0));
        assert_eq!(img.rgb(6, 4), WHITE);
        let dot = img.rgb(center.0.round() as usize, center.1.round() as usize);
        assert!(dot.r == 255 && dot.g < 255);
    }

    #[cfg(feature = "decode")]
    #[test]
    fn test_png_roundtrip() {
        let mut canvas = GraphCanvas::new(64, 48, GraphCalibration::linear(0.0, 1.0, 0.0, 1.0));
        canvas.draw_axes();
        let png = canvas.to_png().unwrap();
        let decoded = RasterImage::decode(&png).unwrap();
        assert_eq!((decoded.width(), decoded.height()), (64, 48));
    }
}
