//! Subcommands and shared argument parsing.

pub mod batch;
pub mod colors;
pub mod extract;
pub mod synth;

use std::path::Path;

use anyhow::{Context, Result, bail};
use curve_extract::{EngineConfig, PixelBounds};

/// Load the engine configuration, or defaults when no file is given.
pub fn load_config(path: Option<&Path>) -> Result<EngineConfig> {
    let Some(path) = path else {
        return Ok(EngineConfig::default());
    };
    let text = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read config {}", path.display()))?;
    serde_json::from_str(&text).with_context(|| format!("Failed to parse config {}", path.display()))
}

/// Parse `"min,max"`.
pub fn parse_range(s: &str) -> Result<(f64, f64)> {
    let parts: Vec<&str> = s.split(',').map(str::trim).collect();
    let [min, max] = parts.as_slice() else {
        bail!("Expected a range as min,max, got {s:?}");
    };
    Ok((
        min.parse().with_context(|| format!("Invalid range start {min:?}"))?,
        max.parse().with_context(|| format!("Invalid range end {max:?}"))?,
    ))
}

/// Parse `"x0,y0,x1,y1"`.
pub fn parse_bounds(s: &str) -> Result<PixelBounds> {
    let values = s
        .split(',')
        .map(|v| v.trim().parse::<usize>())
        .collect::<std::result::Result<Vec<_>, _>>()
        .with_context(|| format!("Invalid bounds {s:?}"))?;
    let [x0, y0, x1, y1] = values.as_slice() else {
        bail!("Expected bounds as x0,y0,x1,y1, got {s:?}");
    };
    Ok(PixelBounds::new(*x0, *y0, *x1, *y1))
}
