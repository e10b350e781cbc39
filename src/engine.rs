//! The extraction engine.
//!
//! [`CurveExtractor`] ties the pipeline together for one request:
//!
//! 1. validate the calibration and parse the request (fatal errors here)
//! 2. decode the image (fails fast on malformed bytes)
//! 3. walk the strategy ladder; each attempt resolves the plot area, picks
//!    colour targets, then masks, traces, scores and maps every target
//! 4. return the accepted (or best) attempt with per-attempt diagnostics
//!
//! Requests share nothing, so [`CurveExtractor::extract_batch`] simply runs
//! them on the rayon pool.

use std::time::{Duration, Instant};

use rayon::prelude::*;
use serde::{Deserialize, Serialize};

use crate::calibration::{GraphCalibration, PixelBounds, detect_plot_area};
use crate::cancel::CancellationToken;
use crate::color::kmeans::{discover_colors, merge_similar_hues};
use crate::color::{AnalyzerConfig, ClusteringConfig, ColorAnalyzer, ColorCluster};
use crate::error::{Error, Result};
use crate::mapper::CoordinateMapper;
use crate::mask::{ColorTarget, MAX_TOLERANCE, MaskBuilder};
use crate::profile::ExtractionProfile;
use crate::quality::{QualityScorer, QualityWeights};
use crate::raster::RasterImage;
use crate::request::{ExtractionOptions, ExtractionRequest, ExtractionResponse, ExtractionResult};
use crate::strategy::{AttemptOutcome, LadderState, Orchestrator, StrategyMode};
use crate::tracer::{CurveTracer, Orientation, TraceConfig};

/// Engine-wide settings shared by all requests.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    /// Minimum quality for an attempt to end the ladder.
    pub acceptance_threshold: f64,

    /// Near-duplicate distance as a fraction of the normalized axis span.
    pub dedup_epsilon: f64,

    /// Most curves extracted per attempt when colours are detected.
    pub max_curves: usize,

    /// Tracer scan direction.
    pub orientation: Orientation,

    /// Palette histogram settings.
    pub analyzer: AnalyzerConfig,

    /// K-means settings for the auto-color stage.
    pub clustering: ClusteringConfig,

    /// Quality component weights.
    pub quality: QualityWeights,

    /// Per-request time limit in milliseconds.
    pub timeout_ms: Option<u64>,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            acceptance_threshold: 0.6,
            dedup_epsilon: 0.001,
            max_curves: 8,
            orientation: Orientation::Auto,
            analyzer: AnalyzerConfig::default(),
            clustering: ClusteringConfig::default(),
            quality: QualityWeights::default(),
            timeout_ms: None,
        }
    }
}

impl EngineConfig {
    /// Create a new configuration builder.
    #[must_use]
    pub fn builder() -> EngineConfigBuilder {
        EngineConfigBuilder::default()
    }

    /// Per-request time limit.
    #[must_use]
    pub fn timeout(&self) -> Option<Duration> {
        self.timeout_ms.map(Duration::from_millis)
    }
}

/// Builder for [`EngineConfig`].
#[derive(Debug, Default)]
pub struct EngineConfigBuilder {
    acceptance_threshold: Option<f64>,
    dedup_epsilon: Option<f64>,
    max_curves: Option<usize>,
    orientation: Option<Orientation>,
    analyzer: Option<AnalyzerConfig>,
    clustering: Option<ClusteringConfig>,
    quality: Option<QualityWeights>,
    timeout: Option<Duration>,
}

impl EngineConfigBuilder {
    /// Set the acceptance threshold.
    #[must_use]
    pub fn acceptance_threshold(mut self, threshold: f64) -> Self {
        self.acceptance_threshold = Some(threshold);
        self
    }

    /// Set the near-duplicate distance.
    #[must_use]
    pub fn dedup_epsilon(mut self, epsilon: f64) -> Self {
        self.dedup_epsilon = Some(epsilon);
        self
    }

    /// Set the maximum number of detected curves.
    #[must_use]
    pub fn max_curves(mut self, max: usize) -> Self {
        self.max_curves = Some(max);
        self
    }

    /// Set the tracer scan direction.
    #[must_use]
    pub fn orientation(mut self, orientation: Orientation) -> Self {
        self.orientation = Some(orientation);
        self
    }

    /// Set the colour analyzer configuration.
    #[must_use]
    pub fn analyzer(mut self, analyzer: AnalyzerConfig) -> Self {
        self.analyzer = Some(analyzer);
        self
    }

    /// Set the k-means configuration.
    #[must_use]
    pub fn clustering(mut self, clustering: ClusteringConfig) -> Self {
        self.clustering = Some(clustering);
        self
    }

    /// Set the quality weights.
    #[must_use]
    pub fn quality(mut self, weights: QualityWeights) -> Self {
        self.quality = Some(weights);
        self
    }

    /// Set the per-request time limit.
    #[must_use]
    pub fn timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }

    /// Build the configuration.
    #[must_use]
    pub fn build(self) -> EngineConfig {
        let defaults = EngineConfig::default();
        EngineConfig {
            acceptance_threshold: self.acceptance_threshold.unwrap_or(defaults.acceptance_threshold),
            dedup_epsilon: self.dedup_epsilon.unwrap_or(defaults.dedup_epsilon),
            max_curves: self.max_curves.unwrap_or(defaults.max_curves),
            orientation: self.orientation.unwrap_or(defaults.orientation),
            analyzer: self.analyzer.unwrap_or(defaults.analyzer),
            clustering: self.clustering.unwrap_or(defaults.clustering),
            quality: self.quality.unwrap_or(defaults.quality),
            timeout_ms: self
                .timeout
                .map(|t| u64::try_from(t.as_millis()).unwrap_or(u64::MAX))
                .or(defaults.timeout_ms),
        }
    }
}

/// Validated form of [`ExtractionOptions`].
#[derive(Debug, Clone)]
struct RequestPlan {
    mode: StrategyMode,
    targets: Vec<ColorTarget>,
    calibration: GraphCalibration,
    color_tolerance: u8,
    min_size: u32,
}

impl RequestPlan {
    fn from_options(options: &ExtractionOptions) -> Result<Self> {
        options.calibration.validate()?;
        if options.color_tolerance > MAX_TOLERANCE {
            return Err(Error::InvalidTolerance(options.color_tolerance));
        }
        let mode = options.profile.parse()?;
        let targets = options
            .selected_colors
            .iter()
            .flatten()
            .map(|c| c.parse())
            .collect::<Result<Vec<ColorTarget>>>()?;
        Ok(Self {
            mode,
            targets,
            calibration: options.calibration.clone(),
            color_tolerance: options.color_tolerance,
            min_size: options.min_size,
        })
    }
}

/// Extracts curves from graph images.
///
/// # Example
///
/// ```rust,ignore
/// use curve_extract::{CurveExtractor, EngineConfig, ExtractionOptions, ExtractionRequest, GraphCalibration};
///
/// let extractor = CurveExtractor::new(EngineConfig::default());
/// let options = ExtractionOptions::new(GraphCalibration::linear(0.0, 5.0, 0.0, 100.0))
///     .with_colors(["blue"]);
/// let result = extractor.extract(&ExtractionRequest::new(png_bytes, options))?;
/// for curve in &result.curves {
///     println!("{}: {} points", curve.name, curve.len());
/// }
/// ```
#[derive(Debug, Clone, Default)]
pub struct CurveExtractor {
    config: EngineConfig,
    analyzer: ColorAnalyzer,
    scorer: QualityScorer,
}

impl CurveExtractor {
    /// Create an extractor.
    #[must_use]
    pub fn new(config: EngineConfig) -> Self {
        Self {
            analyzer: ColorAnalyzer::new(config.analyzer.clone()),
            scorer: QualityScorer::new(config.quality),
            config,
        }
    }

    /// Engine configuration.
    #[must_use]
    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    /// Run one request to completion.
    pub fn extract(&self, request: &ExtractionRequest) -> Result<ExtractionResult> {
        self.extract_with_token(request, &CancellationToken::new())
    }

    /// Run one request, polling `cancel` at every ladder state and scan position.
    pub fn extract_with_token(
        &self,
        request: &ExtractionRequest,
        cancel: &CancellationToken,
    ) -> Result<ExtractionResult> {
        let start = Instant::now();
        let plan = RequestPlan::from_options(&request.options)?;
        let image = RasterImage::decode(&request.image)?;
        tracing::debug!(
            width = image.width(),
            height = image.height(),
            mode = %plan.mode,
            "decoded request image"
        );
        self.run(&image, &plan, cancel, start)
    }

    /// Run on an already decoded image.
    pub fn extract_image(
        &self,
        image: &RasterImage,
        options: &ExtractionOptions,
        cancel: &CancellationToken,
    ) -> Result<ExtractionResult> {
        let start = Instant::now();
        let plan = RequestPlan::from_options(options)?;
        self.run(image, &plan, cancel, start)
    }

    /// Run one request and flatten the outcome into a response. Errors become
    /// `success = false` with the error message and code set.
    #[must_use]
    pub fn respond(&self, request: &ExtractionRequest) -> ExtractionResponse {
        self.respond_with_token(request, &CancellationToken::new())
    }

    /// [`respond`](Self::respond) with a cancellation token.
    #[must_use]
    pub fn respond_with_token(&self, request: &ExtractionRequest, cancel: &CancellationToken) -> ExtractionResponse {
        let start = Instant::now();
        match self.extract_with_token(request, cancel) {
            Ok(result) => ExtractionResponse::from_result(result),
            Err(e) => {
                tracing::warn!(error = %e, code = e.code(), "extraction failed");
                ExtractionResponse::from_error(&e, start.elapsed())
            }
        }
    }

    /// Run independent requests in parallel. Results keep the input order.
    #[must_use]
    pub fn extract_batch(&self, requests: &[ExtractionRequest]) -> Vec<Result<ExtractionResult>> {
        requests.par_iter().map(|r| self.extract(r)).collect()
    }

    /// Palette clusters of an image, inside `region` or the detected plot area.
    pub fn analyze_colors(&self, image: &RasterImage, region: Option<PixelBounds>) -> Result<Vec<ColorCluster>> {
        let region = region.unwrap_or_else(|| detect_plot_area(image).unwrap_or_else(|| image.full_bounds()));
        self.analyzer.analyze(image, region)
    }

    fn run(
        &self,
        image: &RasterImage,
        plan: &RequestPlan,
        cancel: &CancellationToken,
        start: Instant,
    ) -> Result<ExtractionResult> {
        let cancel = match self.config.timeout() {
            Some(timeout) => cancel.child_with_timeout(timeout.saturating_sub(start.elapsed())),
            None => cancel.clone(),
        };
        let orchestrator = Orchestrator::new(
            plan.mode,
            self.config.acceptance_threshold,
            plan.color_tolerance,
            plan.min_size,
        );
        let ladder = orchestrator.run(&cancel, |state, profile| {
            self.attempt(image, plan, state, profile, &cancel)
        })?;

        let (profile_used, outcome) = match ladder.best {
            Some((profile, outcome)) => (profile.name, outcome),
            None => (
                ladder.attempts.last().map(|a| a.profile.clone()).unwrap_or_default(),
                AttemptOutcome {
                    curves: Vec::new(),
                    quality: 0.0,
                    plot_area: self.plot_area(image, &plan.calibration, true),
                },
            ),
        };

        let result = ExtractionResult {
            curves: outcome.curves,
            profile_used,
            quality_score: outcome.quality,
            processing_time: start.elapsed(),
            accepted: ladder.accepted,
            state: ladder.state,
            plot_area: outcome.plot_area,
            attempts: ladder.attempts,
        };
        tracing::info!(
            state = ?result.state,
            profile = %result.profile_used,
            curves = result.curves.len(),
            points = result.total_points(),
            quality = result.quality_score,
            elapsed_ms = result.processing_time.as_millis() as u64,
            "extraction finished"
        );
        Ok(result)
    }

    /// Plot area: caller bounds first, then detection, then the whole image.
    fn plot_area(&self, image: &RasterImage, calibration: &GraphCalibration, detect: bool) -> PixelBounds {
        if let Some(bounds) = calibration.pixel_bounds {
            return bounds.clamp_to(image.width(), image.height());
        }
        if detect {
            if let Some(bounds) = detect_plot_area(image) {
                return bounds;
            }
        }
        image.full_bounds()
    }

    fn targets(
        &self,
        image: &RasterImage,
        plan: &RequestPlan,
        profile: &ExtractionProfile,
        region: PixelBounds,
    ) -> Result<(Vec<ColorTarget>, bool)> {
        if profile.auto_color_clustering {
            // Clusters closer than the mask band would trace the same ink twice.
            let band = f32::from(profile.color_tolerance).max(self.config.clustering.merge_hue_distance);
            let clusters = merge_similar_hues(discover_colors(image, region, &self.config.clustering)?, band);
            let targets = clusters
                .into_iter()
                .take(self.config.max_curves)
                .map(ColorTarget::Cluster)
                .collect();
            return Ok((targets, false));
        }
        if !plan.targets.is_empty() {
            return Ok((plan.targets.clone(), true));
        }
        let clusters = self.analyzer.analyze(image, region)?;
        let targets = clusters
            .into_iter()
            .take(self.config.max_curves)
            .map(ColorTarget::Cluster)
            .collect();
        Ok((targets, false))
    }

    fn attempt(
        &self,
        image: &RasterImage,
        plan: &RequestPlan,
        state: LadderState,
        profile: &ExtractionProfile,
        cancel: &CancellationToken,
    ) -> Result<AttemptOutcome> {
        let plot_area = self.plot_area(image, &plan.calibration, profile.auto_detect_plot_area);
        if !plot_area.is_valid() {
            return Err(Error::calibration(format!(
                "plot area ({}, {}, {}, {}) is smaller than 2x2 pixels",
                plot_area.x0, plot_area.y0, plot_area.x1, plot_area.y1
            )));
        }
        let (targets, explicit) = self.targets(image, plan, profile, plot_area)?;
        let builder = MaskBuilder::new(profile.color_tolerance, profile.min_blob_size)?;
        let mapper = CoordinateMapper::new(plan.calibration.clone(), plot_area);

        let mut curves = Vec::with_capacity(targets.len());
        let mut qualities = Vec::with_capacity(targets.len());
        for target in &targets {
            cancel.check()?;
            let mask = builder.build(image, target, plot_area);
            let tracer = CurveTracer::new(TraceConfig {
                smoothing_window: profile.smoothing.window_for(&target.palette_name()),
                max_gap_pixels: profile.max_gap_pixels,
                orientation: self.config.orientation,
            });
            let trace = tracer.trace(&mask, plot_area, cancel)?;
            let quality = self.scorer.score_trace(&trace);
            let curve = mapper.map_trace(&trace, &target.name(), &target.hex(), self.config.dedup_epsilon);
            tracing::debug!(
                ?state,
                color = %curve.name,
                points = curve.len(),
                segments = trace.segments.len(),
                score = quality.score,
                "traced curve"
            );
            // Requested colours are always reported, detected ones only when they traced.
            if explicit || !curve.is_empty() {
                curves.push(curve);
                qualities.push(quality);
            }
        }

        Ok(AttemptOutcome {
            quality: self.scorer.score_result(&qualities),
            curves,
            plot_area,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::calibration::AxisScale;
    use crate::synth::GraphCanvas;
    use rgb::RGB8;

    const RED: RGB8 = RGB8::new(255, 0, 0);
    const ORANGE: RGB8 = RGB8::new(255, 140, 0);
    const BLUE: RGB8 = RGB8::new(31, 119, 180);

    fn bounds() -> PixelBounds {
        PixelBounds::new(60, 40, 739, 539)
    }

    fn canvas(calibration: GraphCalibration) -> GraphCanvas {
        let mut canvas = GraphCanvas::new(800, 600, calibration.with_bounds(bounds()));
        canvas.draw_axes();
        canvas.draw_grid(5);
        canvas
    }

    fn options(calibration: GraphCalibration) -> ExtractionOptions {
        ExtractionOptions::new(calibration.with_bounds(bounds()))
    }

    #[test]
    fn test_round_trip_within_one_percent() {
        let cal = GraphCalibration::linear(0.0, 10.0, 0.0, 10.0);
        let mut c = canvas(cal.clone());
        c.draw_polyline(&[(0.0, 0.0), (10.0, 10.0)], RED, 2.0);
        let image = c.into_image();

        let opts = options(cal).with_colors(["red"]).with_profile("legacy");
        let result = CurveExtractor::default()
            .extract_image(&image, &opts, &CancellationToken::new())
            .unwrap();
        assert_eq!(result.state, LadderState::Done);
        assert!(result.accepted);
        let curve = result.curve("red").unwrap();
        assert!(curve.len() > 600);
        for x in [0.5, 1.0, 2.5, 5.0, 7.5, 9.0, 9.5] {
            let y = curve.y_at(x).unwrap();
            assert!((y - x).abs() <= 0.01 * 10.0, "x={x} y={y}");
        }
    }

    #[test]
    fn test_log_axis_curve() {
        let cal = GraphCalibration::linear(0.0, 1.0, 1.0, 1000.0).with_scales(AxisScale::Linear, AxisScale::Log);
        let mut c = canvas(cal.clone());
        // A straight pixel line on a log axis is y = 1000^x.
        c.draw_function(|x| 1000f64.powf(x), 0.0, 1.0, 200, BLUE, 2.0);
        let image = c.into_image();

        let opts = options(cal).with_colors(["blue"]).with_profile("legacy");
        let result = CurveExtractor::default()
            .extract_image(&image, &opts, &CancellationToken::new())
            .unwrap();
        let curve = result.curve("blue").unwrap();
        let mid = curve.y_at(0.5).unwrap();
        assert!((mid - 31.62).abs() < 31.62 * 0.02, "mid = {mid}");
    }

    #[test]
    fn test_idempotent() {
        let cal = GraphCalibration::linear(0.0, 10.0, 0.0, 10.0);
        let mut c = canvas(cal.clone());
        c.draw_function(|x| 5.0 + 3.0 * (x / 2.0).sin(), 0.0, 10.0, 300, BLUE, 2.0);
        c.draw_function(|x| 0.5 + 0.1 * x, 0.0, 10.0, 50, RED, 3.0);
        let image = c.into_image();

        let extractor = CurveExtractor::default();
        let opts = options(cal);
        let a = extractor.extract_image(&image, &opts, &CancellationToken::new()).unwrap();
        let b = extractor.extract_image(&image, &opts, &CancellationToken::new()).unwrap();
        assert_eq!(a.curves, b.curves);
        assert_eq!(a.quality_score, b.quality_score);
        assert_eq!(a.curves.len(), 2);
    }

    #[test]
    fn test_optimized_never_worse_than_legacy() {
        let cal = GraphCalibration::linear(0.0, 10.0, 0.0, 10.0);
        let mut c = canvas(cal.clone());
        // Hue 18: in the orange bin, 3 degrees past red's bin edge.
        c.draw_function(|x| 2.0 + 0.5 * x, 0.0, 10.0, 20, RGB8::new(255, 77, 0), 2.0);
        let image = c.into_image();
        let extractor = CurveExtractor::default();

        let legacy = extractor
            .extract_image(&image, &options(cal.clone()).with_colors(["red"]).with_profile("legacy"), &CancellationToken::new())
            .unwrap();
        let optimized = extractor
            .extract_image(&image, &options(cal).with_colors(["red"]).with_profile("optimized"), &CancellationToken::new())
            .unwrap();
        assert!(legacy.quality_score < 0.6);
        assert!(optimized.quality_score >= legacy.quality_score);
        assert!(optimized.accepted);
        assert_eq!(optimized.attempts[0].profile, "legacy");
        assert!(optimized.attempts.len() > 1);
    }

    #[test]
    fn test_single_pixel_dot_does_not_crash() {
        let cal = GraphCalibration::linear(0.0, 10.0, 0.0, 10.0);
        let mut c = canvas(cal.clone());
        c.set_pixel(300, 300, RED);
        let image = c.into_image();
        let extractor = CurveExtractor::default();

        for min_size in [1, 1000] {
            let opts = options(cal.clone()).with_colors(["red"]).with_min_size(min_size);
            let result = extractor.extract_image(&image, &opts, &CancellationToken::new()).unwrap();
            assert!(result.curves.iter().all(|c| c.len() <= 1));
        }
        let undirected = extractor
            .extract_image(&image, &options(cal), &CancellationToken::new())
            .unwrap();
        assert_eq!(undirected.state, LadderState::Failed);
        assert!(undirected.attempts.iter().any(|a| a.error.is_some()));
    }

    #[test]
    fn test_adjacent_hues_do_not_cross_contaminate() {
        let cal = GraphCalibration::linear(0.0, 10.0, 0.0, 10.0);
        let mut c = canvas(cal.clone());
        c.draw_function(|x| 7.0 + 0.1 * x, 0.0, 10.0, 20, RED, 2.0);
        c.draw_function(|x| 3.0 - 0.1 * x, 0.0, 10.0, 20, ORANGE, 2.0);
        let image = c.into_image();
        let extractor = CurveExtractor::default();

        let strict = options(cal.clone()).with_colors(["red", "orange"]).with_profile("legacy");
        let result = extractor.extract_image(&image, &strict, &CancellationToken::new()).unwrap();
        let red = result.curve("red").unwrap();
        let orange = result.curve("orange").unwrap();
        assert!(red.points.iter().all(|p| p.y > 6.0));
        assert!(orange.points.iter().all(|p| p.y < 4.0));

        // A wide band makes red pick up orange ink: the documented trade-off.
        let wide = options(cal).with_colors(["red"]).with_profile("legacy").with_tolerance(40);
        let builder = MaskBuilder::new(wide.color_tolerance, 0).unwrap();
        let mask = builder.build(&image, &"red".parse().unwrap(), bounds());
        let (_, orange_row) = CoordinateMapper::new(wide.calibration.clone(), bounds()).to_pixel(5.0, 2.5);
        assert!(mask.get(400, orange_row.round() as usize));
    }

    #[test]
    fn test_blue_diagonal_scenario() {
        let cal = GraphCalibration::linear(0.0, 5.0, 0.0, 100.0);
        let mut c = canvas(cal.clone());
        c.draw_polyline(&[(0.0, 5.0), (5.0, 95.0)], BLUE, 2.0);
        let area = c.plot_area();
        let image = c.into_image();

        // No bounds and no colours: the plot area and the curve colour are detected.
        let opts = ExtractionOptions::new(cal);
        let result = CurveExtractor::default()
            .extract_image(&image, &opts, &CancellationToken::new())
            .unwrap();
        assert_eq!(result.plot_area, area);
        assert_eq!(result.curves.len(), 1);
        let curve = &result.curves[0];
        assert_eq!(curve.name, "blue");
        let width = area.columns() as f64;
        assert!((curve.len() as f64 - width).abs() < width * 0.05, "{} points", curve.len());
        assert!(curve.mean_confidence() > 0.7);
        assert!(result.quality_score > 0.7);
    }

    #[test]
    fn test_absent_color_falls_through_to_clustering() {
        let cal = GraphCalibration::linear(0.0, 5.0, 0.0, 100.0);
        let mut c = canvas(cal.clone());
        c.draw_polyline(&[(0.0, 5.0), (5.0, 95.0)], BLUE, 2.0);
        let image = c.into_image();

        let opts = options(cal).with_colors(["green"]);
        let result = CurveExtractor::default()
            .extract_image(&image, &opts, &CancellationToken::new())
            .unwrap();
        let last = result.attempts.last().unwrap();
        assert_eq!(last.state, LadderState::AutoColorClustering);
        assert_eq!(result.profile_used, "auto_color");
        assert!(result.accepted);
        assert_eq!(result.curves.len(), 1, "{:?}", result.curves.iter().map(|c| &c.name).collect::<Vec<_>>());
        assert_eq!(result.curves[0].name, "blue");
        let width = bounds().columns();
        assert!(result.total_points() <= width, "{} points", result.total_points());
    }

    #[test]
    fn test_invalid_calibration_is_fatal() {
        let request = ExtractionRequest::new(Vec::new(), ExtractionOptions::new(GraphCalibration::linear(5.0, 1.0, 0.0, 1.0)));
        let err = CurveExtractor::default().extract(&request).unwrap_err();
        assert!(matches!(err, Error::InvalidCalibration { .. }));
    }

    #[test]
    fn test_malformed_image_fails_fast() {
        let request = ExtractionRequest::new(vec![1, 2, 3], ExtractionOptions::new(GraphCalibration::linear(0.0, 1.0, 0.0, 1.0)));
        let response = CurveExtractor::default().respond(&request);
        assert!(!response.success);
        assert_eq!(response.error_code.as_deref(), Some("image_decode"));
        assert!(response.attempts.is_empty());
    }

    #[test]
    fn test_unknown_color_and_profile_rejected() {
        let image = canvas(GraphCalibration::linear(0.0, 1.0, 0.0, 1.0)).into_image();
        let extractor = CurveExtractor::default();
        let cal = GraphCalibration::linear(0.0, 1.0, 0.0, 1.0);
        let err = extractor
            .extract_image(&image, &options(cal.clone()).with_colors(["chartreuse"]), &CancellationToken::new())
            .unwrap_err();
        assert!(matches!(err, Error::UnknownColor(_)));
        let err = extractor
            .extract_image(&image, &options(cal).with_profile("fast"), &CancellationToken::new())
            .unwrap_err();
        assert!(matches!(err, Error::InvalidProfile(_)));
    }

    #[test]
    fn test_cancelled_request() {
        let cal = GraphCalibration::linear(0.0, 10.0, 0.0, 10.0);
        let mut c = canvas(cal.clone());
        c.draw_polyline(&[(0.0, 0.0), (10.0, 10.0)], RED, 2.0);
        let image = c.into_image();
        let token = CancellationToken::new();
        token.cancel();
        let err = CurveExtractor::default()
            .extract_image(&image, &options(cal.clone()), &token)
            .unwrap_err();
        assert!(matches!(err, Error::Cancelled));

        let timed = CurveExtractor::new(EngineConfig::builder().timeout(Duration::ZERO).build());
        let err = timed
            .extract_image(&image, &options(cal), &CancellationToken::new())
            .unwrap_err();
        assert!(matches!(err, Error::Cancelled));
    }

    #[cfg(feature = "decode")]
    #[test]
    fn test_batch_keeps_order() {
        let cal = GraphCalibration::linear(0.0, 10.0, 0.0, 10.0);
        let mut c = canvas(cal.clone());
        c.draw_polyline(&[(0.0, 0.0), (10.0, 10.0)], RED, 2.0);
        let png = c.to_png().unwrap();
        let requests = vec![
            ExtractionRequest::new(png.clone(), options(cal.clone()).with_colors(["red"])),
            ExtractionRequest::new(vec![0, 1], options(cal.clone())),
            ExtractionRequest::new(png, options(cal).with_colors(["red"])),
        ];
        let results = CurveExtractor::default().extract_batch(&requests);
        assert_eq!(results.len(), 3);
        assert!(results[0].is_ok());
        assert!(matches!(results[1], Err(Error::ImageDecode(_))));
        assert_eq!(results[0].as_ref().unwrap().curves, results[2].as_ref().unwrap().curves);
    }

    #[test]
    fn test_config_builder_and_json() {
        let config = EngineConfig::builder()
            .acceptance_threshold(0.8)
            .max_curves(3)
            .timeout(Duration::from_secs(2))
            .build();
        assert_eq!(config.acceptance_threshold, 0.8);
        assert_eq!(config.max_curves, 3);
        assert_eq!(config.timeout(), Some(Duration::from_secs(2)));
        assert_eq!(config.dedup_epsilon, 0.001);

        let parsed: EngineConfig = serde_json::from_str(r#"{"acceptance_threshold": 0.5}"#).unwrap();
        assert_eq!(parsed.acceptance_threshold, 0.5);
        assert_eq!(parsed.max_curves, 8);
    }
}
