//! Extracted curves in data space.

use serde::{Deserialize, Serialize};

/// One data-space sample.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct CurvePoint {
    /// X value in data units.
    pub x: f64,
    /// Y value in data units.
    pub y: f64,
    /// Confidence in `[0, 1]`; lower for interpolated or ambiguous samples.
    pub confidence: f32,
}

/// An extracted curve. Points are sorted by x, or kept in trace order for
/// near-vertical curves.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Curve {
    /// Colour name the curve was extracted for.
    pub name: String,
    /// Representative colour as `#rrggbb`.
    pub color: String,
    /// Samples.
    pub points: Vec<CurvePoint>,
}

impl Curve {
    /// Curve with no points, used for colours that produced no ink.
    #[must_use]
    pub fn empty(name: impl Into<String>, color: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            color: color.into(),
            points: Vec::new(),
        }
    }

    /// Number of points.
    #[must_use]
    pub fn len(&self) -> usize {
        self.points.len()
    }

    /// Whether the curve has no points.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.points.is_empty()
    }

    /// Minimum and maximum x, `None` when empty.
    #[must_use]
    pub fn x_range(&self) -> Option<(f64, f64)> {
        self.points.iter().fold(None, |acc, p| match acc {
            None => Some((p.x, p.x)),
            Some((lo, hi)) => Some((lo.min(p.x), hi.max(p.x))),
        })
    }

    /// Mean point confidence, 0 when empty.
    #[must_use]
    pub fn mean_confidence(&self) -> f32 {
        if self.points.is_empty() {
            return 0.0;
        }
        self.points.iter().map(|p| p.confidence).sum::<f32>() / self.points.len() as f32
    }

    /// Linearly interpolated y at `x`, for curves sorted by x.
    #[must_use]
    pub fn y_at(&self, x: f64) -> Option<f64> {
        let idx = self.points.partition_point(|p| p.x < x);
        match (idx.checked_sub(1).and_then(|i| self.points.get(i)), self.points.get(idx)) {
            (_, Some(hi)) if (hi.x - x).abs() < f64::EPSILON => Some(hi.y),
            (Some(lo), Some(hi)) => {
                let t = (x - lo.x) / (hi.x - lo.x);
                Some(lo.y + t * (hi.y - lo.y))
            }
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn curve(points: &[(f64, f64)]) -> Curve {
        Curve {
            name: "red".to_string(),
            color: "#ff0000".to_string(),
            points: points
                .iter()
                .map(|&(x, y)| CurvePoint { x, y, confidence: 0.5 })
                .collect(),
        }
    }

    #[test]
    fn test_x_range_and_confidence() {
        let c = curve(&[(1.0, 2.0), (3.0, 4.0), (2.0, 0.0)]);
        assert_eq!(c.x_range(), Some((1.0, 3.0)));
        assert!((c.mean_confidence() - 0.5).abs() < f32::EPSILON);
        let e = Curve::empty("blue", "#0000ff");
        assert!(e.is_empty());
        assert_eq!(e.x_range(), None);
        assert_eq!(e.mean_confidence(), 0.0);
    }

    #[test]
    fn test_y_at_interpolates() {
        let c = curve(&[(0.0, 0.0), (2.0, 4.0), (4.0, 4.0)]);
        assert!((c.y_at(1.0).unwrap() - 2.0).abs() < 1e-12);
        assert!((c.y_at(2.0).unwrap() - 4.0).abs() < 1e-12);
        assert!((c.y_at(0.0).unwrap()).abs() < 1e-12);
        assert_eq!(c.y_at(-1.0), None);
        assert_eq!(c.y_at(5.0), None);
    }
}
