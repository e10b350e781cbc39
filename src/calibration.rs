//! Graph calibration and plot-area detection.
//!
//! A [`GraphCalibration`] ties the data range of each axis to a pixel
//! rectangle ([`PixelBounds`]). The rectangle is either supplied by the caller
//! or recovered from the image by [`detect_plot_area`].

use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};
use crate::raster::RasterImage;

/// Axis scale.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AxisScale {
    /// Values grow linearly with pixel position.
    #[default]
    Linear,
    /// Values grow exponentially with pixel position (decades are evenly spaced).
    Log,
}

impl std::str::FromStr for AxisScale {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "linear" | "lin" => Ok(Self::Linear),
            "log" | "logarithmic" => Ok(Self::Log),
            other => Err(Error::calibration(format!("unknown axis scale '{other}'"))),
        }
    }
}

/// Inclusive pixel rectangle of the plot area.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct PixelBounds {
    /// Left column (maps to `x_min`).
    pub x0: usize,
    /// Top row (maps to `y_max`).
    pub y0: usize,
    /// Right column (maps to `x_max`).
    pub x1: usize,
    /// Bottom row (maps to `y_min`).
    pub y1: usize,
}

impl PixelBounds {
    /// Create bounds from two corners.
    #[must_use]
    pub fn new(x0: usize, y0: usize, x1: usize, y1: usize) -> Self {
        Self { x0, y0, x1, y1 }
    }

    /// Bounds covering a whole `width` x `height` image.
    #[must_use]
    pub fn full(width: usize, height: usize) -> Self {
        Self::new(0, 0, width.saturating_sub(1), height.saturating_sub(1))
    }

    /// Number of pixel columns.
    #[must_use]
    pub fn columns(&self) -> usize {
        self.x1.saturating_sub(self.x0) + 1
    }

    /// Number of pixel rows.
    #[must_use]
    pub fn rows(&self) -> usize {
        self.y1.saturating_sub(self.y0) + 1
    }

    /// Number of pixels covered.
    #[must_use]
    pub fn area(&self) -> usize {
        self.columns() * self.rows()
    }

    /// Whether `(x, y)` lies inside the bounds.
    #[must_use]
    pub fn contains(&self, x: usize, y: usize) -> bool {
        (self.x0..=self.x1).contains(&x) && (self.y0..=self.y1).contains(&y)
    }

    /// Intersect with a `width` x `height` image.
    #[must_use]
    pub fn clamp_to(&self, width: usize, height: usize) -> Self {
        let max_x = width.saturating_sub(1);
        let max_y = height.saturating_sub(1);
        let x1 = self.x1.min(max_x);
        let y1 = self.y1.min(max_y);
        Self::new(self.x0.min(x1), self.y0.min(y1), x1, y1)
    }

    /// Whether the rectangle spans at least two pixels on each axis.
    #[must_use]
    pub fn is_valid(&self) -> bool {
        self.x1 > self.x0 && self.y1 > self.y0
    }
}

/// Data ranges and scales of a graph.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GraphCalibration {
    /// Data value at the left edge of the plot area.
    pub x_min: f64,
    /// Data value at the right edge of the plot area.
    pub x_max: f64,
    /// Data value at the bottom edge of the plot area.
    pub y_min: f64,
    /// Data value at the top edge of the plot area.
    pub y_max: f64,
    /// Horizontal axis scale.
    #[serde(default)]
    pub x_scale: AxisScale,
    /// Vertical axis scale.
    #[serde(default)]
    pub y_scale: AxisScale,
    /// Plot area in pixels; detected from the image when absent.
    #[serde(default)]
    pub pixel_bounds: Option<PixelBounds>,
}

impl GraphCalibration {
    /// Linear calibration without explicit pixel bounds.
    #[must_use]
    pub fn linear(x_min: f64, x_max: f64, y_min: f64, y_max: f64) -> Self {
        Self {
            x_min,
            x_max,
            y_min,
            y_max,
            x_scale: AxisScale::Linear,
            y_scale: AxisScale::Linear,
            pixel_bounds: None,
        }
    }

    /// Set the axis scales.
    #[must_use]
    pub fn with_scales(mut self, x_scale: AxisScale, y_scale: AxisScale) -> Self {
        self.x_scale = x_scale;
        self.y_scale = y_scale;
        self
    }

    /// Set the plot-area pixel bounds.
    #[must_use]
    pub fn with_bounds(mut self, bounds: PixelBounds) -> Self {
        self.pixel_bounds = Some(bounds);
        self
    }

    /// Check the invariants: finite values, `min < max`, positive log bounds,
    /// and a non-degenerate pixel rectangle when one is given.
    pub fn validate(&self) -> Result<()> {
        validate_axis("x", self.x_min, self.x_max, self.x_scale)?;
        validate_axis("y", self.y_min, self.y_max, self.y_scale)?;
        if let Some(b) = self.pixel_bounds {
            if !b.is_valid() {
                return Err(Error::calibration(format!(
                    "pixel bounds ({}, {}, {}, {}) must span at least two pixels per axis",
                    b.x0, b.y0, b.x1, b.y1
                )));
            }
        }
        Ok(())
    }
}

fn validate_axis(axis: &str, min: f64, max: f64, scale: AxisScale) -> Result<()> {
    if !min.is_finite() || !max.is_finite() {
        return Err(Error::calibration(format!("{axis} range must be finite")));
    }
    if min >= max {
        return Err(Error::calibration(format!(
            "{axis}_min ({min}) must be less than {axis}_max ({max})"
        )));
    }
    if scale == AxisScale::Log && min <= 0.0 {
        return Err(Error::calibration(format!(
            "log {axis} axis requires positive bounds, got {axis}_min = {min}"
        )));
    }
    Ok(())
}

/// Fraction of the image a dark run must span to count as an axis or frame line.
const LINE_FRACTION: f64 = 0.5;

fn is_axis_ink(image: &RasterImage, x: usize, y: usize) -> bool {
    let c = image.hsv(x, y);
    c.v < 0.4 && c.s < 0.35
}

/// Longest dark run as `(start, end, len)`.
fn longest_run(len: usize, is_dark: impl Fn(usize) -> bool) -> (usize, usize, usize) {
    let mut best = (0, 0, 0);
    let mut start = None;
    for i in 0..=len {
        let dark = i < len && is_dark(i);
        match (dark, start) {
            (true, None) => start = Some(i),
            (false, Some(s)) => {
                if i - s > best.2 {
                    best = (s, i - 1, i - s);
                }
                start = None;
            }
            _ => {}
        }
    }
    best
}

/// Group consecutive indices into `(first, last)` line bands.
fn bands(indices: &[usize]) -> Vec<(usize, usize)> {
    let mut out: Vec<(usize, usize)> = Vec::new();
    for &i in indices {
        match out.last_mut() {
            Some(band) if band.1 + 1 == i => band.1 = i,
            _ => out.push((i, i)),
        }
    }
    out
}

/// Locate the plot area from the image's axis lines.
///
/// Looks for long dark horizontal and vertical lines. The left-most vertical
/// band is the y axis and the bottom-most horizontal band is the x axis; a
/// second band on the opposite side is treated as a frame. Returns the
/// rectangle just inside those lines, or `None` when either axis is missing.
#[must_use]
pub fn detect_plot_area(image: &RasterImage) -> Option<PixelBounds> {
    let width = image.width();
    let height = image.height();
    if width < 3 || height < 3 {
        return None;
    }

    let row_runs: Vec<(usize, usize, usize)> = (0..height)
        .map(|y| longest_run(width, |x| is_axis_ink(image, x, y)))
        .collect();
    let col_runs: Vec<(usize, usize, usize)> = (0..width)
        .map(|x| longest_run(height, |y| is_axis_ink(image, x, y)))
        .collect();

    let min_h = (width as f64 * LINE_FRACTION) as usize;
    let min_v = (height as f64 * LINE_FRACTION) as usize;
    let h_lines: Vec<usize> = (0..height).filter(|&y| row_runs[y].2 >= min_h.max(2)).collect();
    let v_lines: Vec<usize> = (0..width).filter(|&x| col_runs[x].2 >= min_v.max(2)).collect();

    let h_bands = bands(&h_lines);
    let v_bands = bands(&v_lines);
    let (&left, &bottom) = (v_bands.first()?, h_bands.last()?);

    let x0 = left.1 + 1;
    let y1 = bottom.0.checked_sub(1)?;
    let x1 = match v_bands.last() {
        Some(&right) if right != left => right.0.checked_sub(1)?,
        _ => row_runs[bottom.0].1,
    };
    let y0 = match h_bands.first() {
        Some(&top) if top != bottom => top.1 + 1,
        _ => col_runs[left.0].0,
    };

    let bounds = PixelBounds::new(x0, y0, x1, y1);
    if bounds.is_valid() {
        tracing::debug!(?bounds, "detected plot area");
        Some(bounds)
    } else {
        None
    }
}
