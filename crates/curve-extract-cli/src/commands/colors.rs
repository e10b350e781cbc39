//! Colour listing command.

use std::path::PathBuf;

use anyhow::{Context, Result};
use curve_extract::{CurveExtractor, EngineConfig, RasterImage};

use super::parse_bounds;

pub fn run(image: PathBuf, bounds: Option<String>, config: EngineConfig, verbose: bool) -> Result<()> {
    let region = bounds.as_deref().map(parse_bounds).transpose()?;
    let bytes = std::fs::read(&image).with_context(|| format!("Failed to read {}", image.display()))?;
    let raster = RasterImage::decode(&bytes).with_context(|| format!("Failed to decode {}", image.display()))?;
    if verbose {
        eprintln!("Image: {}x{}", raster.width(), raster.height());
    }

    let extractor = CurveExtractor::new(config);
    let clusters = extractor
        .analyze_colors(&raster, region)
        .context("Colour analysis failed")?;

    println!(
        "{:<10} {:<8} {:>8} {:>7} {:>6} {:>6}",
        "Color", "Hex", "Pixels", "Hue", "Sat", "Val"
    );
    println!("{:-<50}", "");
    for c in &clusters {
        println!(
            "{:<10} {:<8} {:>8} {:>7.1} {:>6.2} {:>6.2}",
            c.name,
            c.hex(),
            c.pixel_count,
            c.centroid_hsv.h,
            c.centroid_hsv.s,
            c.centroid_hsv.v
        );
    }
    Ok(())
}
