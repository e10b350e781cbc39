//! Pixel-to-data coordinate mapping.
//!
//! The plot-area rectangle is the reference frame: its left/right columns map
//! to `x_min`/`x_max` and its bottom/top rows map to `y_min`/`y_max`. Log axes
//! interpolate in log space, so the pixel midpoint of a `[1, 1000]` axis maps
//! to `sqrt(1000)`, not `500.5`.

use crate::calibration::{AxisScale, GraphCalibration, PixelBounds};
use crate::curve::{Curve, CurvePoint};
use crate::tracer::{PixelTrace, TraceAxis};

/// Maps pixel positions inside a plot area to data values and back.
#[derive(Debug, Clone)]
pub struct CoordinateMapper {
    calibration: GraphCalibration,
    bounds: PixelBounds,
}

fn value_at(fraction: f64, min: f64, max: f64, scale: AxisScale) -> f64 {
    match scale {
        AxisScale::Linear => min + fraction * (max - min),
        AxisScale::Log => (min.ln() + fraction * (max.ln() - min.ln())).exp(),
    }
}

fn fraction_of(value: f64, min: f64, max: f64, scale: AxisScale) -> f64 {
    match scale {
        AxisScale::Linear => (value - min) / (max - min),
        AxisScale::Log => (value.ln() - min.ln()) / (max.ln() - min.ln()),
    }
}

impl CoordinateMapper {
    /// Create a mapper. The calibration is expected to be validated and the
    /// bounds to span at least two pixels on each axis.
    #[must_use]
    pub fn new(calibration: GraphCalibration, bounds: PixelBounds) -> Self {
        Self { calibration, bounds }
    }

    /// Plot-area rectangle.
    #[must_use]
    pub fn bounds(&self) -> PixelBounds {
        self.bounds
    }

    /// Axis calibration.
    #[must_use]
    pub fn calibration(&self) -> &GraphCalibration {
        &self.calibration
    }

    /// Horizontal position as a fraction of the plot width (0 at `x0`).
    #[must_use]
    pub fn x_fraction(&self, col: f64) -> f64 {
        (col - self.bounds.x0 as f64) / (self.bounds.x1 - self.bounds.x0) as f64
    }

    /// Vertical position as a fraction of the plot height, 0 at the bottom row.
    /// Pixel rows grow downward while data grows upward.
    #[must_use]
    pub fn y_fraction(&self, row: f64) -> f64 {
        (self.bounds.y1 as f64 - row) / (self.bounds.y1 - self.bounds.y0) as f64
    }

    /// Map a pixel position to data coordinates.
    #[must_use]
    pub fn to_data(&self, col: f64, row: f64) -> (f64, f64) {
        let c = &self.calibration;
        (
            value_at(self.x_fraction(col), c.x_min, c.x_max, c.x_scale),
            value_at(self.y_fraction(row), c.y_min, c.y_max, c.y_scale),
        )
    }

    /// Map data coordinates to a (fractional) pixel position.
    #[must_use]
    pub fn to_pixel(&self, x: f64, y: f64) -> (f64, f64) {
        let c = &self.calibration;
        let b = &self.bounds;
        let fx = fraction_of(x, c.x_min, c.x_max, c.x_scale);
        let fy = fraction_of(y, c.y_min, c.y_max, c.y_scale);
        (
            b.x0 as f64 + fx * (b.x1 - b.x0) as f64,
            b.y1 as f64 - fy * (b.y1 - b.y0) as f64,
        )
    }

    /// Convert a pixel trace into a data-space curve.
    ///
    /// Column traces come out sorted by x; row traces keep their scan order.
    /// A point closer than `epsilon` to the last kept point is dropped, with
    /// distance measured on the normalized axes (fraction of each axis span,
    /// in log space for log axes). `epsilon` is capped at half a pixel of the
    /// longer axis, so neighbouring scan lines always survive on wide plots.
    #[must_use]
    pub fn map_trace(&self, trace: &PixelTrace, name: &str, color: &str, epsilon: f64) -> Curve {
        let b = self.bounds;
        let longest = (b.x1 - b.x0).max(b.y1 - b.y0).max(1) as f64;
        let epsilon = epsilon.min(0.5 / longest);
        let mut mapped: Vec<(f64, f64, CurvePoint)> = trace
            .points()
            .map(|p| {
                let (x, y) = self.to_data(p.col, p.row);
                (
                    self.x_fraction(p.col),
                    self.y_fraction(p.row),
                    CurvePoint {
                        x,
                        y,
                        confidence: p.confidence,
                    },
                )
            })
            .collect();

        if trace.axis == TraceAxis::Columns {
            mapped.sort_by(|a, b| a.2.x.total_cmp(&b.2.x));
        }

        let mut points = Vec::with_capacity(mapped.len());
        let mut last: Option<(f64, f64)> = None;
        for (fx, fy, point) in mapped {
            if let Some((lx, ly)) = last {
                if ((fx - lx).powi(2) + (fy - ly).powi(2)).sqrt() < epsilon {
                    continue;
                }
            }
            last = Some((fx, fy));
            points.push(point);
        }

        Curve {
            name: name.to_string(),
            color: color.to_string(),
            points,
        }
    }
}
