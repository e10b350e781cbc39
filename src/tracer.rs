//! Column-by-column curve tracing over a mask.
//!
//! For every column of the plot area the tracer picks one y estimate: the
//! centroid of the mask run closest to the previously accepted point. This
//! keeps the trace on its own curve when a legend swatch or label leaks into
//! the same column. Short gaps are bridged by linear interpolation, long gaps
//! split the trace into segments, and each segment is smoothed with a
//! centered moving average.
//!
//! Near-vertical curves are traced row by row instead, with the roles of the
//! axes swapped.

use serde::{Deserialize, Serialize};

use crate::calibration::PixelBounds;
use crate::cancel::CancellationToken;
use crate::error::Result;
use crate::raster::{Mask, Run};

/// Confidence of a point chosen among several runs in its column.
const AMBIGUOUS_CONFIDENCE: f32 = 0.75;
/// Confidence of a gap-filling point.
const INTERPOLATED_CONFIDENCE: f32 = 0.5;

/// Scan direction requested by the caller.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Orientation {
    /// Columns, unless the ink is much taller than wide.
    #[default]
    Auto,
    /// Always scan columns.
    Columns,
    /// Always scan rows.
    Rows,
}

/// Scan direction actually used for a trace.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TraceAxis {
    /// One point per column.
    Columns,
    /// One point per row.
    Rows,
}

/// Tracer parameters.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TraceConfig {
    /// Moving-average window, forced odd. 0 or 1 disables smoothing.
    pub smoothing_window: usize,
    /// Longest gap bridged by interpolation; longer gaps start a new segment.
    pub max_gap_pixels: usize,
    /// Scan direction.
    pub orientation: Orientation,
}

impl Default for TraceConfig {
    fn default() -> Self {
        Self {
            smoothing_window: 13,
            max_gap_pixels: 12,
            orientation: Orientation::Auto,
        }
    }
}

/// A traced sample in pixel space.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct PixelPoint {
    /// Column (fractional after smoothing when tracing rows).
    pub col: f64,
    /// Row (fractional after smoothing when tracing columns).
    pub row: f64,
    /// Confidence in `[0, 1]`.
    pub confidence: f32,
    /// Whether the point fills a gap rather than being measured.
    pub interpolated: bool,
}

/// Output of the tracer for one mask.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PixelTrace {
    /// Scan direction used.
    pub axis: TraceAxis,
    /// Continuous segments in scan order.
    pub segments: Vec<Vec<PixelPoint>>,
    /// Number of scan positions in the plot area.
    pub span: usize,
    /// Mean absolute second difference of the unsmoothed estimates.
    pub roughness: f64,
}

impl PixelTrace {
    /// Trace with no points.
    #[must_use]
    pub fn empty(axis: TraceAxis, span: usize) -> Self {
        Self {
            axis,
            segments: Vec::new(),
            span,
            roughness: 0.0,
        }
    }

    /// All points in scan order.
    pub fn points(&self) -> impl Iterator<Item = &PixelPoint> {
        self.segments.iter().flatten()
    }

    /// Total number of points.
    #[must_use]
    pub fn len(&self) -> usize {
        self.segments.iter().map(Vec::len).sum()
    }

    /// Whether the trace has no points.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Number of measured (non-interpolated) points.
    #[must_use]
    pub fn measured(&self) -> usize {
        self.points().filter(|p| !p.interpolated).count()
    }
}

/// Traces one curve through a mask.
#[derive(Debug, Clone, Default)]
pub struct CurveTracer {
    config: TraceConfig,
}

impl CurveTracer {
    /// Create a tracer.
    #[must_use]
    pub fn new(config: TraceConfig) -> Self {
        Self { config }
    }

    /// Tracer configuration.
    #[must_use]
    pub fn config(&self) -> &TraceConfig {
        &self.config
    }

    /// Trace the mask inside `bounds`.
    ///
    /// An empty mask gives an empty trace. The only error is
    /// [`Error::Cancelled`](crate::Error::Cancelled), checked once per scan position.
    pub fn trace(&self, mask: &Mask, bounds: PixelBounds, cancel: &CancellationToken) -> Result<PixelTrace> {
        let bounds = bounds.clamp_to(mask.width(), mask.height());
        let axis = self.resolve_axis(mask, bounds);
        let (first, last) = match axis {
            TraceAxis::Columns => (bounds.x0, bounds.x1),
            TraceAxis::Rows => (bounds.y0, bounds.y1),
        };
        let span = last - first + 1;

        let mut segments: Vec<Vec<f64>> = Vec::new();
        let mut meta: Vec<Vec<(usize, f32, bool)>> = Vec::new();
        let mut values: Vec<f64> = Vec::new();
        let mut info: Vec<(usize, f32, bool)> = Vec::new();
        let mut previous: Option<(usize, f64)> = None;

        for pos in first..=last {
            cancel.check()?;
            let runs = match axis {
                TraceAxis::Columns => mask.column_runs(pos, bounds.y0, bounds.y1),
                TraceAxis::Rows => mask.row_runs(pos, bounds.x0, bounds.x1),
            };
            if runs.is_empty() {
                continue;
            }

            let chosen = choose_run(&runs, previous.map(|(_, v)| v));
            let value = chosen.centroid();
            let confidence = if runs.len() == 1 { 1.0 } else { AMBIGUOUS_CONFIDENCE };

            if let Some((prev_pos, prev_value)) = previous {
                let gap = pos - prev_pos - 1;
                if gap > self.config.max_gap_pixels {
                    segments.push(std::mem::take(&mut values));
                    meta.push(std::mem::take(&mut info));
                } else {
                    let step = (value - prev_value) / (pos - prev_pos) as f64;
                    for (k, q) in (prev_pos + 1..pos).enumerate() {
                        values.push(prev_value + step * (k + 1) as f64);
                        info.push((q, INTERPOLATED_CONFIDENCE, true));
                    }
                }
            }

            values.push(value);
            info.push((pos, confidence, false));
            previous = Some((pos, value));
        }
        if !values.is_empty() {
            segments.push(values);
            meta.push(info);
        }

        let roughness = roughness(&segments);
        let window = self.config.smoothing_window;
        let traced = segments
            .iter()
            .zip(&meta)
            .map(|(seg, info)| {
                let smoothed = moving_average(seg, window);
                smoothed
                    .into_iter()
                    .zip(info)
                    .map(|(v, &(pos, confidence, interpolated))| {
                        let (col, row) = match axis {
                            TraceAxis::Columns => (pos as f64, v),
                            TraceAxis::Rows => (v, pos as f64),
                        };
                        PixelPoint {
                            col,
                            row,
                            confidence,
                            interpolated,
                        }
                    })
                    .collect()
            })
            .collect();

        Ok(PixelTrace {
            axis,
            segments: traced,
            span,
            roughness,
        })
    }

    fn resolve_axis(&self, mask: &Mask, bounds: PixelBounds) -> TraceAxis {
        match self.config.orientation {
            Orientation::Columns => TraceAxis::Columns,
            Orientation::Rows => TraceAxis::Rows,
            Orientation::Auto => match mask.bounding_box() {
                Some(ink) if ink.rows() > 2 * ink.columns() && bounds.rows() > 1 => TraceAxis::Rows,
                _ => TraceAxis::Columns,
            },
        }
    }
}

/// Run closest to `previous`, or the longest run when there is no previous
/// point. Ties go to the earliest (topmost / leftmost) run.
fn choose_run(runs: &[Run], previous: Option<f64>) -> Run {
    let mut best = runs[0];
    for run in &runs[1..] {
        let better = match previous {
            Some(prev) => (run.centroid() - prev).abs() < (best.centroid() - prev).abs(),
            None => run.len() > best.len(),
        };
        if better {
            best = *run;
        }
    }
    best
}

/// Centered moving average. The window shrinks symmetrically near the ends
/// so that straight lines pass through unchanged.
#[must_use]
pub fn moving_average(values: &[f64], window: usize) -> Vec<f64> {
    let half = window.max(1) / 2;
    if half == 0 {
        return values.to_vec();
    }
    let n = values.len();
    (0..n)
        .map(|i| {
            let h = half.min(i).min(n - 1 - i);
            let slice = &values[i - h..=i + h];
            slice.iter().sum::<f64>() / slice.len() as f64
        })
        .collect()
}

fn roughness(segments: &[Vec<f64>]) -> f64 {
    let mut total = 0.0;
    let mut count = 0usize;
    for seg in segments {
        for w in seg.windows(3) {
            total += (w[2] - 2.0 * w[1] + w[0]).abs();
            count += 1;
        }
    }
    if count == 0 { 0.0 } else { total / count as f64 }
}
