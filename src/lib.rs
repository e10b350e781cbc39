//! # curve-extract
//!
//! Curve extraction from datasheet graph images.
//!
//! Given a raster graph (PNG/JPEG screenshot or scan) and its axis
//! calibration, this library finds the coloured curves, traces them
//! column by column, and maps them to data coordinates. Extraction runs as
//! a ladder of progressively more permissive profiles until one produces an
//! acceptable result.
//!
//! ## Quick Start
//!
//! ```rust,ignore
//! use curve_extract::{CurveExtractor, EngineConfig, ExtractionOptions, ExtractionRequest, GraphCalibration};
//!
//! let config = EngineConfig::builder()
//!     .acceptance_threshold(0.6)
//!     .build();
//! let extractor = CurveExtractor::new(config);
//!
//! let options = ExtractionOptions::new(GraphCalibration::linear(0.0, 5.0, 0.0, 100.0))
//!     .with_colors(["red", "blue"])
//!     .with_profile("auto");
//!
//! let response = extractor.respond(&ExtractionRequest::new(png_bytes, options));
//! println!("{} points from {}", response.total_points, response.profile_used);
//! ```
//!
//! ## Modules
//!
//! - [`error`]: Error types for the library
//! - [`raster`]: Decoded images and binary masks
//! - [`color`]: HSV conversion, the named palette, colour analysis and k-means discovery
//! - [`mask`]: Per-colour masks with connected-component filtering
//! - [`calibration`]: Axis calibration and plot-area detection
//! - [`tracer`]: Column-by-column curve tracing
//! - [`mapper`]: Pixel to data coordinate mapping
//! - [`quality`]: Trace and result scoring
//! - [`curve`]: Extracted data series
//! - [`cancel`]: Cooperative cancellation and time limits
//! - [`profile`]: Parameter bundles for the strategy ladder
//! - [`strategy`]: The strategy ladder state machine
//! - [`engine`]: The request pipeline
//! - [`report`] / [`export`]: Reports, CSV and JSON output
//! - [`synth`]: Synthetic graph rendering for tests and demos

pub mod calibration;
pub mod cancel;
pub mod color;
pub mod curve;
pub mod engine;
pub mod error;
pub mod export;
pub mod mapper;
pub mod mask;
pub mod profile;
pub mod quality;
pub mod raster;
pub mod report;
pub mod request;
pub mod strategy;
pub mod synth;
pub mod tracer;

// Re-export commonly used types
pub use calibration::{AxisScale, GraphCalibration, PixelBounds, detect_plot_area};
pub use cancel::CancellationToken;
pub use color::{ColorAnalyzer, ColorCluster, Hsv, NamedColor};
pub use curve::{Curve, CurvePoint};
pub use engine::{CurveExtractor, EngineConfig, EngineConfigBuilder};
pub use error::{Error, Result};
pub use mapper::CoordinateMapper;
pub use mask::{ColorTarget, MaskBuilder};
pub use profile::{ExtractionProfile, SmoothingWindows};
pub use quality::{CurveQuality, QualityScorer, QualityWeights};
pub use raster::{Mask, RasterImage};
pub use report::{BatchReport, BatchSummary, ExtractionReport};
pub use request::{ExtractionOptions, ExtractionRequest, ExtractionResponse, ExtractionResult};
pub use strategy::{AttemptReport, LadderState, Orchestrator, StrategyMode};
pub use synth::GraphCanvas;
pub use tracer::{CurveTracer, Orientation, TraceConfig};
