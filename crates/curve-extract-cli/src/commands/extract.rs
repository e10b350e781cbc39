//! Single-image extraction command.

use std::time::Duration;

use anyhow::{Context, Result, bail};
use curve_extract::export::{write_curves_csv, write_report_json};
use curve_extract::{
    AxisScale, CancellationToken, CurveExtractor, EngineConfig, ExtractionOptions, ExtractionReport,
    GraphCalibration, LadderState, RasterImage,
};

use super::{parse_bounds, parse_range};
use crate::ExtractArgs;

/// Merge the options file with command-line flags.
fn build_options(args: &ExtractArgs) -> Result<ExtractionOptions> {
    let mut options = match &args.options {
        Some(path) => {
            let text = std::fs::read_to_string(path)
                .with_context(|| format!("Failed to read options {}", path.display()))?;
            serde_json::from_str(&text).with_context(|| format!("Failed to parse options {}", path.display()))?
        }
        None => {
            let (Some(x), Some(y)) = (&args.x_range, &args.y_range) else {
                bail!("--x-range and --y-range are required without --options");
            };
            let (x_min, x_max) = parse_range(x)?;
            let (y_min, y_max) = parse_range(y)?;
            ExtractionOptions::new(GraphCalibration::linear(x_min, x_max, y_min, y_max))
        }
    };

    let cal = &mut options.calibration;
    if let Some(x) = &args.x_range {
        (cal.x_min, cal.x_max) = parse_range(x)?;
    }
    if let Some(y) = &args.y_range {
        (cal.y_min, cal.y_max) = parse_range(y)?;
    }
    if args.x_log {
        cal.x_scale = AxisScale::Log;
    }
    if args.y_log {
        cal.y_scale = AxisScale::Log;
    }
    if let Some(b) = &args.bounds {
        cal.pixel_bounds = Some(parse_bounds(b)?);
    }
    if !args.colors.is_empty() {
        options.selected_colors = Some(args.colors.clone());
    }
    if let Some(profile) = &args.profile {
        options.profile.clone_from(profile);
    }
    if let Some(tolerance) = args.tolerance {
        options.color_tolerance = tolerance;
    }
    if let Some(min_size) = args.min_size {
        options.min_size = min_size;
    }
    Ok(options)
}

pub fn run(args: ExtractArgs, config: EngineConfig, verbose: bool) -> Result<()> {
    let options = build_options(&args)?;
    if verbose {
        eprintln!("Loading image: {}", args.image.display());
    }
    let bytes = std::fs::read(&args.image).with_context(|| format!("Failed to read {}", args.image.display()))?;
    let image = RasterImage::decode(&bytes).with_context(|| format!("Failed to decode {}", args.image.display()))?;

    let token = match args.timeout_ms {
        Some(ms) => CancellationToken::with_timeout(Duration::from_millis(ms)),
        None => CancellationToken::new(),
    };
    let extractor = CurveExtractor::new(config);
    let result = extractor
        .extract_image(&image, &options, &token)
        .context("Extraction failed")?;

    println!(
        "{} via {} (quality {:.3}{}) in {} ms",
        if result.state == LadderState::Done { "Done" } else { "Failed" },
        result.profile_used,
        result.quality_score,
        if result.accepted { "" } else { ", below threshold" },
        result.processing_time.as_millis()
    );
    let b = result.plot_area;
    println!("Plot area: ({}, {}) - ({}, {})", b.x0, b.y0, b.x1, b.y1);
    println!("{:-<60}", "");
    for curve in &result.curves {
        let range = curve
            .x_range()
            .map(|(lo, hi)| format!("x {lo:.4} .. {hi:.4}"))
            .unwrap_or_else(|| "empty".to_string());
        println!(
            "{:<12} {:<8} {:>6} points  {}  confidence {:.2}",
            curve.name,
            curve.color,
            curve.len(),
            range,
            curve.mean_confidence()
        );
    }
    if verbose {
        println!();
        println!("Attempts:");
        for a in &result.attempts {
            println!(
                "  {:<24} curves {:>2}  points {:>6}  quality {:.3}{}",
                a.profile,
                a.curve_count,
                a.total_points,
                a.quality,
                a.error.as_deref().map(|e| format!("  ({e})")).unwrap_or_default()
            );
        }
    }

    if let Some(path) = &args.csv {
        write_curves_csv(path, &result.curves).with_context(|| format!("Failed to write {}", path.display()))?;
        println!("Wrote {}", path.display());
    }
    if let Some(path) = &args.json {
        let name = args
            .image
            .file_name()
            .map_or_else(|| args.image.display().to_string(), |n| n.to_string_lossy().into_owned());
        let report = ExtractionReport::new(name, image.width() as u32, image.height() as u32, result)
            .with_source(&args.image);
        write_report_json(path, &report).with_context(|| format!("Failed to write {}", path.display()))?;
        println!("Wrote {}", path.display());
    }

    Ok(())
}
