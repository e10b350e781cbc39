//! Report types for extraction runs.
//!
//! Reports wrap [`ExtractionResult`]s with the image they came from so that
//! single runs and batches can be written to JSON and CSV.

use std::path::PathBuf;

use serde::{Deserialize, Serialize};

use crate::error::Error;
use crate::request::ExtractionResult;

/// Result of extracting one image.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExtractionReport {
    /// Image name or identifier.
    pub name: String,

    /// Path to the source image.
    pub source_path: Option<PathBuf>,

    /// Image dimensions.
    pub width: u32,
    pub height: u32,

    /// Extraction outcome.
    pub result: ExtractionResult,

    /// When this report was generated.
    #[serde(with = "chrono_serde")]
    pub timestamp: chrono::DateTime<chrono::Utc>,
}

impl ExtractionReport {
    /// Create a new report.
    #[must_use]
    pub fn new(name: impl Into<String>, width: u32, height: u32, result: ExtractionResult) -> Self {
        Self {
            name: name.into(),
            source_path: None,
            width,
            height,
            result,
            timestamp: chrono::Utc::now(),
        }
    }

    /// Record the source path.
    #[must_use]
    pub fn with_source(mut self, path: impl Into<PathBuf>) -> Self {
        self.source_path = Some(path.into());
        self
    }
}

/// A batch item that ended in an error.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BatchFailure {
    /// Image name or identifier.
    pub name: String,
    /// Error message.
    pub error: String,
    /// Stable error code.
    pub error_code: String,
}

/// Aggregate numbers for a batch.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct BatchSummary {
    /// Items in the batch.
    pub images: usize,
    /// Items whose ladder ended in `Done`.
    pub succeeded: usize,
    /// Items that met the acceptance threshold.
    pub accepted: usize,
    /// Items that errored or ended in `Failed`.
    pub failed: usize,
    /// Points across all curves.
    pub total_points: usize,
    /// Mean quality over items with a result.
    pub mean_quality: f64,
}

/// Reports for a batch of images.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BatchReport {
    /// Batch name.
    pub name: String,

    /// Items that produced a result.
    pub reports: Vec<ExtractionReport>,

    /// Items that errored.
    pub failures: Vec<BatchFailure>,

    /// When this report was generated.
    #[serde(with = "chrono_serde")]
    pub timestamp: chrono::DateTime<chrono::Utc>,

    /// Configuration used for this batch.
    pub config_summary: String,
}

impl BatchReport {
    /// Create an empty batch report.
    #[must_use]
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            reports: Vec::new(),
            failures: Vec::new(),
            timestamp: chrono::Utc::now(),
            config_summary: String::new(),
        }
    }

    /// Add a completed item.
    pub fn push_report(&mut self, report: ExtractionReport) {
        self.reports.push(report);
    }

    /// Add an item that errored.
    pub fn push_failure(&mut self, name: impl Into<String>, error: &Error) {
        self.failures.push(BatchFailure {
            name: name.into(),
            error: error.to_string(),
            error_code: error.code().to_string(),
        });
    }

    /// Aggregate the batch.
    #[must_use]
    pub fn summary(&self) -> BatchSummary {
        let succeeded = self.reports.iter().filter(|r| r.result.is_success()).count();
        let quality_sum: f64 = self.reports.iter().map(|r| r.result.quality_score).sum();
        BatchSummary {
            images: self.reports.len() + self.failures.len(),
            succeeded,
            accepted: self.reports.iter().filter(|r| r.result.accepted).count(),
            failed: self.failures.len() + self.reports.len() - succeeded,
            total_points: self.reports.iter().map(|r| r.result.total_points()).sum(),
            mean_quality: if self.reports.is_empty() {
                0.0
            } else {
                quality_sum / self.reports.len() as f64
            },
        }
    }
}

mod chrono_serde {
    use chrono::{DateTime, Utc};
    use serde::{Deserialize, Deserializer, Serialize, Serializer};

    pub fn serialize<S>(dt: &DateTime<Utc>, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        dt.to_rfc3339().serialize(serializer)
    }

    pub fn deserialize<'de, D>(deserializer: D) -> Result<DateTime<Utc>, D::Error>
    where
        D: Deserializer<'de>,
    {
        let s = String::deserialize(deserializer)?;
        DateTime::parse_from_rfc3339(&s)
            .map(|dt| dt.with_timezone(&Utc))
            .map_err(serde::de::Error::custom)
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use super::*;
    use crate::calibration::PixelBounds;
    use crate::curve::{Curve, CurvePoint};
    use crate::strategy::LadderState;

    fn result(state: LadderState, accepted: bool, points: usize, quality: f64) -> ExtractionResult {
        let mut curve = Curve::empty("red", "#ff0000");
        curve.points = (0..points)
            .map(|i| CurvePoint {
                x: i as f64,
                y: 1.0,
                confidence: 1.0,
            })
            .collect();
        ExtractionResult {
            curves: vec![curve],
            profile_used: "legacy".to_string(),
            quality_score: quality,
            processing_time: Duration::from_millis(3),
            accepted,
            state,
            plot_area: PixelBounds::new(0, 0, 99, 99),
            attempts: Vec::new(),
        }
    }

    #[test]
    fn test_batch_summary() {
        let mut batch = BatchReport::new("datasheets");
        batch.push_report(ExtractionReport::new("a.png", 100, 100, result(LadderState::Done, true, 10, 0.9)));
        batch.push_report(ExtractionReport::new("b.png", 100, 100, result(LadderState::Done, false, 5, 0.5)));
        batch.push_report(ExtractionReport::new("c.png", 100, 100, result(LadderState::Failed, false, 0, 0.1)));
        batch.push_failure("d.png", &Error::ImageDecode("truncated".to_string()));

        let s = batch.summary();
        assert_eq!(s.images, 4);
        assert_eq!(s.succeeded, 2);
        assert_eq!(s.accepted, 1);
        assert_eq!(s.failed, 2);
        assert_eq!(s.total_points, 15);
        assert!((s.mean_quality - 0.5).abs() < 1e-12);
        assert_eq!(batch.failures[0].error_code, "image_decode");
    }

    #[test]
    fn test_report_json_roundtrip_keeps_timestamp() {
        let report = ExtractionReport::new("a.png", 800, 600, result(LadderState::Done, true, 2, 0.8)).with_source("/tmp/a.png");
        let json = serde_json::to_string(&report).unwrap();
        let back: ExtractionReport = serde_json::from_str(&json).unwrap();
        assert_eq!(back.timestamp, report.timestamp);
        assert_eq!(back.result, report.result);
        assert_eq!(back.source_path, Some(PathBuf::from("/tmp/a.png")));
    }
}
