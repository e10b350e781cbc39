//! Request and response types.
//!
//! These mirror the transport-agnostic interface of the engine: a request
//! carries encoded image bytes plus [`ExtractionOptions`], and every request
//! ends in either an [`ExtractionResult`] or a flat [`ExtractionResponse`]
//! suitable for JSON transport.

use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::calibration::{GraphCalibration, PixelBounds};
use crate::curve::Curve;
use crate::error::Error;
use crate::strategy::{AttemptReport, LadderState};

fn default_profile() -> String {
    "auto".to_string()
}

fn default_min_size() -> u32 {
    1000
}

/// Per-request parameters. Defaults reproduce the legacy algorithm.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExtractionOptions {
    /// Colour names or `#rrggbb` values. `None` (or empty) detects colours.
    #[serde(default)]
    pub selected_colors: Option<Vec<String>>,

    /// Axis ranges and scales, optionally with the plot area.
    pub calibration: GraphCalibration,

    /// Strategy mode: `legacy`, `optimized`, `auto` or `enhanced`.
    #[serde(default = "default_profile")]
    pub profile: String,

    /// Hue tolerance in degrees (0-60).
    #[serde(default)]
    pub color_tolerance: u8,

    /// Minimum blob size in pixels.
    #[serde(default = "default_min_size")]
    pub min_size: u32,
}

impl ExtractionOptions {
    /// Options with default parameters for a calibration.
    #[must_use]
    pub fn new(calibration: GraphCalibration) -> Self {
        Self {
            selected_colors: None,
            calibration,
            profile: default_profile(),
            color_tolerance: 0,
            min_size: default_min_size(),
        }
    }

    /// Restrict extraction to these colours.
    #[must_use]
    pub fn with_colors<I, S>(mut self, colors: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.selected_colors = Some(colors.into_iter().map(Into::into).collect());
        self
    }

    /// Set the strategy mode.
    #[must_use]
    pub fn with_profile(mut self, profile: impl Into<String>) -> Self {
        self.profile = profile.into();
        self
    }

    /// Set the colour tolerance.
    #[must_use]
    pub fn with_tolerance(mut self, tolerance: u8) -> Self {
        self.color_tolerance = tolerance;
        self
    }

    /// Set the minimum blob size.
    #[must_use]
    pub fn with_min_size(mut self, min_size: u32) -> Self {
        self.min_size = min_size;
        self
    }
}

/// Encoded image plus options.
#[derive(Debug, Clone)]
pub struct ExtractionRequest {
    /// PNG, JPEG, BMP or GIF bytes.
    pub image: Vec<u8>,
    /// Parameters.
    pub options: ExtractionOptions,
}

impl ExtractionRequest {
    /// Create a request.
    #[must_use]
    pub fn new(image: Vec<u8>, options: ExtractionOptions) -> Self {
        Self { image, options }
    }
}

/// Terminal output of one request.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExtractionResult {
    /// Curves of the returned attempt.
    pub curves: Vec<Curve>,

    /// Profile that produced the curves.
    pub profile_used: String,

    /// Result-level quality in `[0, 1]`.
    pub quality_score: f64,

    /// Wall time spent on the request.
    #[serde(with = "duration_millis")]
    pub processing_time: Duration,

    /// Whether the quality met the acceptance threshold.
    pub accepted: bool,

    /// `Done` or `Failed`.
    pub state: LadderState,

    /// Plot area used by the returned attempt.
    pub plot_area: PixelBounds,

    /// Every attempt of the ladder in order.
    pub attempts: Vec<AttemptReport>,
}

impl ExtractionResult {
    /// Points over all curves.
    #[must_use]
    pub fn total_points(&self) -> usize {
        self.curves.iter().map(Curve::len).sum()
    }

    /// Whether the ladder ended in `Done`.
    #[must_use]
    pub fn is_success(&self) -> bool {
        self.state == LadderState::Done
    }

    /// Curve by name.
    #[must_use]
    pub fn curve(&self, name: &str) -> Option<&Curve> {
        self.curves.iter().find(|c| c.name == name)
    }
}

/// Flat response for transport.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExtractionResponse {
    /// `true` when the ladder ended in `Done`.
    pub success: bool,
    /// Extracted curves.
    pub curves: Vec<Curve>,
    /// Points over all curves.
    pub total_points: u32,
    /// Wall time in milliseconds.
    pub processing_time_ms: u32,
    /// Profile that produced the curves, empty on early errors.
    pub profile_used: String,
    /// Result-level quality.
    pub quality_score: f32,
    /// Human-readable failure reason.
    pub error: Option<String>,
    /// Stable failure code, see [`Error::code`].
    pub error_code: Option<String>,
    /// Attempt diagnostics.
    #[serde(default)]
    pub attempts: Vec<AttemptReport>,
}

impl ExtractionResponse {
    /// Response for a completed ladder run.
    #[must_use]
    pub fn from_result(result: ExtractionResult) -> Self {
        let success = result.is_success();
        let total_points = u32::try_from(result.total_points()).unwrap_or(u32::MAX);
        let (error, error_code) = if success {
            (None, None)
        } else {
            (
                Some("no strategy profile produced a usable curve".to_string()),
                Some("failed".to_string()),
            )
        };
        Self {
            success,
            total_points,
            processing_time_ms: millis_u32(result.processing_time),
            profile_used: result.profile_used,
            quality_score: result.quality_score as f32,
            error,
            error_code,
            curves: result.curves,
            attempts: result.attempts,
        }
    }

    /// Response for a request that ended in an error.
    #[must_use]
    pub fn from_error(error: &Error, elapsed: Duration) -> Self {
        Self {
            success: false,
            curves: Vec::new(),
            total_points: 0,
            processing_time_ms: millis_u32(elapsed),
            profile_used: String::new(),
            quality_score: 0.0,
            error: Some(error.to_string()),
            error_code: Some(error.code().to_string()),
            attempts: Vec::new(),
        }
    }
}

fn millis_u32(d: Duration) -> u32 {
    u32::try_from(d.as_millis()).unwrap_or(u32::MAX)
}

// Duration as integer milliseconds
pub(crate) mod duration_millis {
    use serde::{Deserialize, Deserializer, Serialize, Serializer};
    use std::time::Duration;

    pub fn serialize<S>(duration: &Duration, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        duration.as_millis().serialize(serializer)
    }

    pub fn deserialize<'de, D>(deserializer: D) -> Result<Duration, D::Error>
    where
        D: Deserializer<'de>,
    {
        let millis = u64::deserialize(deserializer)?;
        Ok(Duration::from_millis(millis))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::curve::CurvePoint;

    #[test]
    fn test_options_defaults_from_json() {
        let json = r#"{"calibration": {"x_min": 0, "x_max": 5, "y_min": 1, "y_max": 1000, "y_scale": "log"}}"#;
        let options: ExtractionOptions = serde_json::from_str(json).unwrap();
        assert_eq!(options.profile, "auto");
        assert_eq!(options.color_tolerance, 0);
        assert_eq!(options.min_size, 1000);
        assert!(options.selected_colors.is_none());
        assert_eq!(options.calibration.y_scale, crate::AxisScale::Log);
    }

    #[test]
    fn test_response_from_failed_result() {
        let result = ExtractionResult {
            curves: Vec::new(),
            profile_used: "auto_color".to_string(),
            quality_score: 0.0,
            processing_time: Duration::from_millis(42),
            accepted: false,
            state: LadderState::Failed,
            plot_area: PixelBounds::new(0, 0, 9, 9),
            attempts: Vec::new(),
        };
        let response = ExtractionResponse::from_result(result);
        assert!(!response.success);
        assert_eq!(response.processing_time_ms, 42);
        assert_eq!(response.error_code.as_deref(), Some("failed"));
    }

    #[test]
    fn test_response_from_done_result() {
        let mut curve = Curve::empty("blue", "#1f77b4");
        curve.points.push(CurvePoint {
            x: 1.0,
            y: 2.0,
            confidence: 1.0,
        });
        let result = ExtractionResult {
            curves: vec![curve],
            profile_used: "legacy".to_string(),
            quality_score: 0.9,
            processing_time: Duration::from_millis(5),
            accepted: true,
            state: LadderState::Done,
            plot_area: PixelBounds::new(0, 0, 9, 9),
            attempts: Vec::new(),
        };
        let json = serde_json::to_value(&result).unwrap();
        assert_eq!(json["processing_time"], 5);
        assert_eq!(json["state"], "done");

        let response = ExtractionResponse::from_result(result);
        assert!(response.success);
        assert_eq!(response.total_points, 1);
        assert!(response.error.is_none());
    }

    #[test]
    fn test_response_from_error() {
        let response = ExtractionResponse::from_error(&Error::calibration("x_min >= x_max"), Duration::ZERO);
        assert!(!response.success);
        assert_eq!(response.error_code.as_deref(), Some("invalid_calibration"));
        assert!(response.error.unwrap().contains("x_min >= x_max"));
    }
}
