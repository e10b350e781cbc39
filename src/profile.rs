//! Named parameter bundles for the strategy ladder.
//!
//! Each rung of the ladder runs the same pipeline with a different
//! [`ExtractionProfile`]. The legacy profile reproduces the caller's
//! parameters as given; the enhanced levels relax tolerance and blob size
//! step by step but never tighten what the caller asked for.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};
use crate::mask::MAX_TOLERANCE;

/// Default smoothing window for colours without an override.
pub const DEFAULT_SMOOTHING_WINDOW: usize = 13;

/// Moving-average window per curve colour.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SmoothingWindows {
    /// Window for colours not listed in `per_color`.
    pub default: usize,
    /// Overrides keyed by palette name.
    #[serde(default)]
    pub per_color: BTreeMap<String, usize>,
}

impl Default for SmoothingWindows {
    fn default() -> Self {
        Self::legacy()
    }
}

impl SmoothingWindows {
    /// Uniform window for every colour.
    #[must_use]
    pub fn uniform(window: usize) -> Self {
        Self {
            default: window,
            per_color: BTreeMap::new(),
        }
    }

    /// Wider windows for reds, which anti-alias worst on datasheet scans.
    #[must_use]
    pub fn legacy() -> Self {
        let per_color = [("red", 21), ("pink", 21), ("orange", 17)]
            .into_iter()
            .map(|(name, w)| (name.to_string(), w))
            .collect();
        Self {
            default: DEFAULT_SMOOTHING_WINDOW,
            per_color,
        }
    }

    /// Add or replace an override.
    #[must_use]
    pub fn with(mut self, color: &str, window: usize) -> Self {
        self.per_color.insert(color.to_ascii_lowercase(), window);
        self
    }

    /// Odd window for a colour name. Suffixed cluster names (`"red-2"`) use
    /// their base colour.
    #[must_use]
    pub fn window_for(&self, color: &str) -> usize {
        let key = color.to_ascii_lowercase();
        let base = key.split('-').next().unwrap_or(&key);
        let window = self
            .per_color
            .get(&key)
            .or_else(|| self.per_color.get(base))
            .copied()
            .unwrap_or(self.default);
        window.max(1) | 1
    }
}

/// Parameters for one attempt of the pipeline.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExtractionProfile {
    /// Profile name reported in results.
    pub name: String,
    /// Hue tolerance in degrees (0-60).
    pub color_tolerance: u8,
    /// Connected components smaller than this are dropped.
    pub min_blob_size: u32,
    /// Smoothing windows per colour.
    pub smoothing: SmoothingWindows,
    /// Longest gap bridged by interpolation.
    pub max_gap_pixels: usize,
    /// Detect the plot area from axis lines when the caller gave no bounds.
    pub auto_detect_plot_area: bool,
    /// Discover curve colours with k-means instead of the palette.
    pub auto_color_clustering: bool,
}

impl ExtractionProfile {
    /// Caller parameters as given.
    #[must_use]
    pub fn legacy(color_tolerance: u8, min_size: u32) -> Self {
        Self {
            name: "legacy".to_string(),
            color_tolerance,
            min_blob_size: min_size,
            smoothing: SmoothingWindows::legacy(),
            max_gap_pixels: 12,
            auto_detect_plot_area: true,
            auto_color_clustering: false,
        }
    }

    fn relaxed(name: &str, tolerance: u8, min_blob: u32, color_tolerance: u8, min_size: u32) -> Self {
        Self {
            name: name.to_string(),
            color_tolerance: color_tolerance.max(tolerance).min(MAX_TOLERANCE),
            min_blob_size: min_size.min(min_blob),
            smoothing: SmoothingWindows::legacy(),
            max_gap_pixels: 12,
            auto_detect_plot_area: true,
            auto_color_clustering: false,
        }
    }

    /// Slight widening: tolerance at least 10, blobs down to 500 px.
    #[must_use]
    pub fn enhanced_conservative(color_tolerance: u8, min_size: u32) -> Self {
        Self::relaxed("enhanced_conservative", 10, 500, color_tolerance, min_size)
    }

    /// Tolerance at least 25, blobs down to 200 px.
    #[must_use]
    pub fn enhanced_relaxed(color_tolerance: u8, min_size: u32) -> Self {
        Self::relaxed("enhanced_relaxed", 25, 200, color_tolerance, min_size)
    }

    /// Tolerance at least 45, blobs down to 50 px, longer gap bridging.
    #[must_use]
    pub fn enhanced_very_relaxed(color_tolerance: u8, min_size: u32) -> Self {
        Self {
            max_gap_pixels: 24,
            ..Self::relaxed("enhanced_very_relaxed", 45, 50, color_tolerance, min_size)
        }
    }

    /// K-means colour discovery with a moderate band around each cluster.
    #[must_use]
    pub fn auto_color(color_tolerance: u8, min_size: u32) -> Self {
        Self {
            auto_color_clustering: true,
            ..Self::relaxed("auto_color", 20, 100, color_tolerance, min_size)
        }
    }

    /// Check the tolerance range.
    pub fn validate(&self) -> Result<()> {
        if self.color_tolerance > MAX_TOLERANCE {
            return Err(Error::InvalidTolerance(self.color_tolerance));
        }
        if self.name.is_empty() {
            return Err(Error::InvalidProfile("profile name is empty".to_string()));
        }
        Ok(())
    }
}
