//! Error types for curve extraction.

use thiserror::Error;

/// Result type alias for curve-extract operations.
pub type Result<T> = std::result::Result<T, Error>;

/// Errors that can occur during curve extraction.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum Error {
    /// Calibration values cannot describe a valid graph.
    #[error("Invalid calibration: {reason}")]
    InvalidCalibration {
        /// What is wrong with the calibration.
        reason: String,
    },

    /// No colour bin in the image reached the minimum pixel count.
    #[error("Insufficient color signal: no color cluster reached {threshold} pixels")]
    InsufficientColorSignal {
        /// Pixel count a cluster needed to be reported.
        threshold: usize,
    },

    /// The caller cancelled the request or its deadline passed.
    #[error("Extraction cancelled")]
    Cancelled,

    /// Image bytes could not be decoded.
    #[error("Image decode failed: {0}")]
    ImageDecode(String),

    /// Unknown strategy profile name.
    #[error("Invalid profile: {0} (expected legacy, optimized, auto or enhanced)")]
    InvalidProfile(String),

    /// Colour name that is neither a palette name nor a `#rrggbb` value.
    #[error("Unknown color: {0}")]
    UnknownColor(String),

    /// Colour tolerance outside the supported range.
    #[error("Invalid color tolerance: {0} (expected 0-60)")]
    InvalidTolerance(u8),

    /// Raw pixel buffer does not match the declared dimensions.
    #[error("Dimension mismatch: expected {expected} bytes, got {actual}")]
    DimensionMismatch {
        /// Expected buffer length.
        expected: usize,
        /// Actual buffer length.
        actual: usize,
    },

    /// I/O error wrapper.
    #[error(transparent)]
    Io(#[from] std::io::Error),

    /// JSON serialization/deserialization error.
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// CSV error.
    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),
}

impl Error {
    /// Whether the strategy ladder may continue with the next profile.
    #[must_use]
    pub fn is_recoverable(&self) -> bool {
        matches!(self, Self::InsufficientColorSignal { .. })
    }

    /// Stable short code for responses and logs.
    #[must_use]
    pub fn code(&self) -> &'static str {
        match self {
            Self::InvalidCalibration { .. } => "invalid_calibration",
            Self::InsufficientColorSignal { .. } => "insufficient_color_signal",
            Self::Cancelled => "cancelled",
            Self::ImageDecode(_) => "image_decode",
            Self::InvalidProfile(_) => "invalid_profile",
            Self::UnknownColor(_) => "unknown_color",
            Self::InvalidTolerance(_) => "invalid_tolerance",
            Self::DimensionMismatch { .. } => "dimension_mismatch",
            Self::Io(_) => "io",
            Self::Json(_) => "json",
            Self::Csv(_) => "csv",
        }
    }

    pub(crate) fn calibration(reason: impl Into<String>) -> Self {
        Self::InvalidCalibration {
            reason: reason.into(),
        }
    }
}
