//! Batch extraction over a JSON manifest.

use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use curve_extract::export::{write_batch_csv, write_report_json};
use curve_extract::{
    BatchReport, CancellationToken, CurveExtractor, EngineConfig, ExtractionOptions, ExtractionReport, RasterImage,
};
use rayon::prelude::*;
use serde::Deserialize;

/// One manifest entry.
#[derive(Debug, Deserialize)]
struct ManifestEntry {
    /// Image path, relative to the manifest's directory.
    image: PathBuf,
    options: ExtractionOptions,
}

fn load_manifest(path: &Path) -> Result<Vec<ManifestEntry>> {
    let text = std::fs::read_to_string(path).with_context(|| format!("Failed to read manifest {}", path.display()))?;
    let mut entries: Vec<ManifestEntry> =
        serde_json::from_str(&text).with_context(|| format!("Failed to parse manifest {}", path.display()))?;
    let base = path.parent().unwrap_or_else(|| Path::new("."));
    for entry in &mut entries {
        if entry.image.is_relative() {
            entry.image = base.join(&entry.image);
        }
    }
    Ok(entries)
}

fn display_name(path: &Path) -> String {
    path.file_name()
        .map_or_else(|| path.display().to_string(), |n| n.to_string_lossy().into_owned())
}

fn extract_one(extractor: &CurveExtractor, entry: &ManifestEntry) -> curve_extract::Result<ExtractionReport> {
    let bytes = std::fs::read(&entry.image)?;
    let image = RasterImage::decode(&bytes)?;
    let result = extractor.extract_image(&image, &entry.options, &CancellationToken::new())?;
    Ok(
        ExtractionReport::new(display_name(&entry.image), image.width() as u32, image.height() as u32, result)
            .with_source(&entry.image),
    )
}

pub fn run(
    manifest: PathBuf,
    output: Option<PathBuf>,
    csv: Option<PathBuf>,
    config: EngineConfig,
    verbose: bool,
) -> Result<()> {
    let entries = load_manifest(&manifest)?;
    println!("Processing {} images", entries.len());

    let config_summary = format!(
        "threshold {:.2}, max_curves {}, dedup {}",
        config.acceptance_threshold, config.max_curves, config.dedup_epsilon
    );
    let extractor = CurveExtractor::new(config);
    let outcomes: Vec<_> = entries
        .par_iter()
        .map(|entry| (display_name(&entry.image), extract_one(&extractor, entry)))
        .collect();

    let mut batch = BatchReport::new(display_name(&manifest));
    batch.config_summary = config_summary;
    for (name, outcome) in outcomes {
        match outcome {
            Ok(report) => {
                if verbose {
                    println!(
                        "  {:<32} {:<24} {:>3} curves  quality {:.3}",
                        name,
                        report.result.profile_used,
                        report.result.curves.len(),
                        report.result.quality_score
                    );
                }
                batch.push_report(report);
            }
            Err(e) => {
                eprintln!("  {name}: {e}");
                batch.push_failure(name, &e);
            }
        }
    }

    let summary = batch.summary();
    println!();
    println!("Images:    {}", summary.images);
    println!("Succeeded: {}", summary.succeeded);
    println!("Accepted:  {}", summary.accepted);
    println!("Failed:    {}", summary.failed);
    println!("Points:    {}", summary.total_points);
    println!("Quality:   {:.3} mean", summary.mean_quality);

    if let Some(path) = &output {
        write_report_json(path, &batch).with_context(|| format!("Failed to write {}", path.display()))?;
        println!("Wrote {}", path.display());
    }
    if let Some(path) = &csv {
        write_batch_csv(path, &batch).with_context(|| format!("Failed to write {}", path.display()))?;
        println!("Wrote {}", path.display());
    }
    Ok(())
}
