//! Confidence scoring for traced curves.
//!
//! A trace is scored on three components, each in `[0, 1]`:
//!
//! | Component | Measures |
//! |-----------|----------|
//! | coverage | fraction of plot columns with a measured point |
//! | density | points per plot column, capped at 1 |
//! | smoothness | `1 / (1 + mean |second difference|)` of the raw estimates |
//!
//! Jagged traces usually mean background noise or a neighbouring curve
//! leaked into the mask, so smoothness pulls such traces below the
//! acceptance threshold even when coverage is complete.

use serde::{Deserialize, Serialize};

use crate::tracer::PixelTrace;

/// Relative weights of the quality components.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct QualityWeights {
    /// Weight of x-range coverage.
    pub coverage: f64,
    /// Weight of point density.
    pub density: f64,
    /// Weight of smoothness.
    pub smoothness: f64,
}

impl Default for QualityWeights {
    fn default() -> Self {
        Self {
            coverage: 0.45,
            density: 0.25,
            smoothness: 0.30,
        }
    }
}

/// Quality of one trace.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct CurveQuality {
    /// Fraction of scan positions with a measured point.
    pub coverage: f64,
    /// Points per scan position, capped at 1.
    pub density: f64,
    /// Inverse roughness.
    pub smoothness: f64,
    /// Weighted combination in `[0, 1]`.
    pub score: f64,
}

/// Scores traces and result sets.
#[derive(Debug, Clone, Default)]
pub struct QualityScorer {
    weights: QualityWeights,
}

impl QualityScorer {
    /// Create a scorer with custom weights.
    #[must_use]
    pub fn new(weights: QualityWeights) -> Self {
        Self { weights }
    }

    /// Score one trace. Empty traces score 0.
    #[must_use]
    pub fn score_trace(&self, trace: &PixelTrace) -> CurveQuality {
        if trace.is_empty() || trace.span == 0 {
            return CurveQuality::default();
        }
        let span = trace.span as f64;
        let coverage = (trace.measured() as f64 / span).min(1.0);
        let density = (trace.len() as f64 / span).min(1.0);
        let smoothness = 1.0 / (1.0 + trace.roughness);

        let w = self.weights;
        let total = w.coverage + w.density + w.smoothness;
        let score = if total > 0.0 {
            (w.coverage * coverage + w.density * density + w.smoothness * smoothness) / total
        } else {
            0.0
        };

        CurveQuality {
            coverage,
            density,
            smoothness,
            score: score.clamp(0.0, 1.0),
        }
    }

    /// Score a result set: the mean score of its non-empty traces, 0 if none.
    #[must_use]
    pub fn score_result<'a>(&self, qualities: impl IntoIterator<Item = &'a CurveQuality>) -> f64 {
        let scores: Vec<f64> = qualities
            .into_iter()
            .filter(|q| q.density > 0.0)
            .map(|q| q.score)
            .collect();
        if scores.is_empty() {
            0.0
        } else {
            scores.iter().sum::<f64>() / scores.len() as f64
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tracer::{PixelPoint, TraceAxis};

    fn trace(rows: &[f64], span: usize, roughness: f64) -> PixelTrace {
        PixelTrace {
            axis: TraceAxis::Columns,
            segments: vec![
                rows.iter()
                    .enumerate()
                    .map(|(i, &row)| PixelPoint {
                        col: i as f64,
                        row,
                        confidence: 1.0,
                        interpolated: false,
                    })
                    .collect(),
            ],
            span,
            roughness,
        }
    }

    #[test]
    fn test_perfect_trace_scores_one() {
        let t = trace(&vec![10.0; 100], 100, 0.0);
        let q = QualityScorer::default().score_trace(&t);
        assert!((q.coverage - 1.0).abs() < 1e-12);
        assert!((q.smoothness - 1.0).abs() < 1e-12);
        assert!((q.score - 1.0).abs() < 1e-12);
    }

    #[test]
    fn test_partial_coverage_lowers_score() {
        let t = trace(&vec![10.0; 50], 100, 0.0);
        let q = QualityScorer::default().score_trace(&t);
        assert!((q.coverage - 0.5).abs() < 1e-12);
        assert!((q.score - (0.45 * 0.5 + 0.25 * 0.5 + 0.30)).abs() < 1e-12);
    }

    #[test]
    fn test_rough_trace_penalized() {
        let smooth = QualityScorer::default().score_trace(&trace(&vec![10.0; 100], 100, 0.0));
        let rough = QualityScorer::default().score_trace(&trace(&vec![10.0; 100], 100, 9.0));
        assert!((rough.smoothness - 0.1).abs() < 1e-12);
        assert!(rough.score < smooth.score);
    }

    #[test]
    fn test_empty_trace_scores_zero() {
        let q = QualityScorer::default().score_trace(&PixelTrace::empty(TraceAxis::Columns, 100));
        assert_eq!(q, CurveQuality::default());
    }

    #[test]
    fn test_result_score_ignores_empty_curves() {
        let scorer = QualityScorer::default();
        let good = scorer.score_trace(&trace(&vec![10.0; 100], 100, 0.0));
        let empty = CurveQuality::default();
        assert!((scorer.score_result([&good, &empty]) - 1.0).abs() < 1e-12);
        assert_eq!(scorer.score_result([&empty]), 0.0);
        assert_eq!(scorer.score_result(std::iter::empty()), 0.0);
    }
}
