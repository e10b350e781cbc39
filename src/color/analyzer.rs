//! Per-image colour histogram over the named palette.

use rgb::RGB8;
use serde::{Deserialize, Serialize};

use crate::calibration::PixelBounds;
use crate::color::{ChromaFloor, Hsv, NamedColor, circular_mean_hue, classify};
use crate::error::{Error, Result};
use crate::raster::RasterImage;

/// A group of pixels sharing one curve colour.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ColorCluster {
    /// Display name (`"red"`, or `"blue-2"` for a second discovered blue).
    pub name: String,
    /// Palette bin, `None` for clusters discovered by k-means.
    pub named: Option<NamedColor>,
    /// Colour to report for this cluster.
    pub representative: RGB8,
    /// Pixels assigned to the cluster.
    pub pixel_count: usize,
    /// Mean colour of the member pixels.
    pub centroid_hsv: Hsv,
}

impl ColorCluster {
    /// Cluster for a palette colour with no measured pixels.
    #[must_use]
    pub fn from_named(color: NamedColor) -> Self {
        let representative = color.representative();
        Self {
            name: color.name().to_string(),
            named: Some(color),
            representative,
            pixel_count: 0,
            centroid_hsv: Hsv::from_rgb(representative),
        }
    }

    /// Hex string of the representative colour, e.g. `#e61919`.
    #[must_use]
    pub fn hex(&self) -> String {
        format!(
            "#{:02x}{:02x}{:02x}",
            self.representative.r, self.representative.g, self.representative.b
        )
    }
}

/// Configuration for [`ColorAnalyzer`].
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AnalyzerConfig {
    /// Floor separating ink from neutrals.
    pub floor: ChromaFloor,
    /// Minimum cluster size as a fraction of the analysed area.
    pub min_fraction: f64,
    /// Lower bound on the cluster size threshold in pixels.
    pub min_pixels: usize,
}

impl Default for AnalyzerConfig {
    fn default() -> Self {
        Self {
            floor: ChromaFloor::default(),
            min_fraction: 0.0005,
            min_pixels: 20,
        }
    }
}

impl AnalyzerConfig {
    /// Pixel count a bin must reach for a region of `area` pixels.
    #[must_use]
    pub fn threshold(&self, area: usize) -> usize {
        ((area as f64 * self.min_fraction).round() as usize).max(self.min_pixels)
    }
}

#[derive(Default, Clone, Copy)]
struct BinAccumulator {
    count: usize,
    sum_sin: f64,
    sum_cos: f64,
    sum_s: f64,
    sum_v: f64,
}

/// Quantizes image colours into named palette clusters.
#[derive(Debug, Clone, Default)]
pub struct ColorAnalyzer {
    config: AnalyzerConfig,
}

impl ColorAnalyzer {
    /// Create an analyzer with the given configuration.
    #[must_use]
    pub fn new(config: AnalyzerConfig) -> Self {
        Self { config }
    }

    /// Analyzer configuration.
    #[must_use]
    pub fn config(&self) -> &AnalyzerConfig {
        &self.config
    }

    /// Cluster the pixels inside `region` by palette bin.
    ///
    /// Returns clusters sorted by descending pixel count (ties by name), or
    /// [`Error::InsufficientColorSignal`] when no bin reaches the threshold.
    pub fn analyze(&self, image: &RasterImage, region: PixelBounds) -> Result<Vec<ColorCluster>> {
        let region = region.clamp_to(image.width(), image.height());
        let mut bins = [BinAccumulator::default(); NamedColor::ALL.len()];

        for y in region.y0..=region.y1 {
            for x in region.x0..=region.x1 {
                let c = image.hsv(x, y);
                let Some(color) = classify(c, &self.config.floor) else {
                    continue;
                };
                let bin = &mut bins[bin_index(color)];
                let rad = f64::from(c.h).to_radians();
                bin.count += 1;
                bin.sum_sin += rad.sin();
                bin.sum_cos += rad.cos();
                bin.sum_s += f64::from(c.s);
                bin.sum_v += f64::from(c.v);
            }
        }

        let threshold = self.config.threshold(region.area());
        let mut clusters: Vec<ColorCluster> = NamedColor::ALL
            .into_iter()
            .zip(bins)
            .filter(|(_, bin)| bin.count >= threshold)
            .map(|(color, bin)| {
                let n = bin.count as f64;
                let hue = circular_mean_hue(bin.sum_sin, bin.sum_cos).unwrap_or(color.hue());
                let centroid = Hsv::new(hue, (bin.sum_s / n) as f32, (bin.sum_v / n) as f32);
                ColorCluster {
                    name: color.name().to_string(),
                    named: Some(color),
                    representative: centroid.to_rgb(),
                    pixel_count: bin.count,
                    centroid_hsv: centroid,
                }
            })
            .collect();

        if clusters.is_empty() {
            return Err(Error::InsufficientColorSignal { threshold });
        }

        clusters.sort_by(|a, b| b.pixel_count.cmp(&a.pixel_count).then_with(|| a.name.cmp(&b.name)));
        tracing::debug!(
            clusters = clusters.len(),
            threshold,
            "color analysis complete"
        );
        Ok(clusters)
    }
}

fn bin_index(color: NamedColor) -> usize {
    NamedColor::ALL
        .iter()
        .position(|c| *c == color)
        .unwrap_or_default()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn image_with_blocks(blocks: &[(RGB8, usize)]) -> RasterImage {
        // 100 px wide, each block fills `rows` full rows.
        let width = 100;
        let height = 100;
        let mut data = vec![255u8; width * height * 3];
        let mut row = 0;
        for (color, rows) in blocks {
            for y in row..row + rows {
                for x in 0..width {
                    let i = (y * width + x) * 3;
                    data[i] = color.r;
                    data[i + 1] = color.g;
                    data[i + 2] = color.b;
                }
            }
            row += rows;
        }
        RasterImage::from_rgb8(&data, width, height).unwrap()
    }

    #[test]
    fn test_clusters_sorted_by_count() {
        let img = image_with_blocks(&[
            (RGB8::new(20, 60, 220), 5),
            (RGB8::new(230, 25, 25), 10),
            (RGB8::new(20, 160, 40), 2),
        ]);
        let clusters = ColorAnalyzer::default()
            .analyze(&img, img.full_bounds())
            .unwrap();
        let names: Vec<&str> = clusters.iter().map(|c| c.name.as_str()).collect();
        assert_eq!(names, vec!["red", "blue", "green"]);
        assert_eq!(clusters[0].pixel_count, 1000);
        assert_eq!(clusters[2].pixel_count, 200);
        assert_eq!(clusters[0].named, Some(NamedColor::Red));
    }

    #[test]
    fn test_threshold_scales_with_area() {
        let config = AnalyzerConfig::default();
        assert_eq!(config.threshold(100), 20);
        assert_eq!(config.threshold(800 * 600), 240);
    }

    #[test]
    fn test_small_bins_filtered() {
        // 1 row = 100 px, threshold for 10_000 px is 20, so one row survives
        // but a 10-pixel speck would not.
        let mut img_data = vec![255u8; 100 * 100 * 3];
        for x in 0..10 {
            let i = x * 3;
            img_data[i] = 230;
            img_data[i + 1] = 25;
            img_data[i + 2] = 25;
        }
        let img = RasterImage::from_rgb8(&img_data, 100, 100).unwrap();
        let err = ColorAnalyzer::default()
            .analyze(&img, img.full_bounds())
            .unwrap_err();
        assert!(matches!(err, Error::InsufficientColorSignal { threshold: 20 }));
    }

    #[test]
    fn test_grayscale_image_has_no_signal() {
        let img = image_with_blocks(&[(RGB8::new(0, 0, 0), 30), (RGB8::new(128, 128, 128), 30)]);
        let result = ColorAnalyzer::default().analyze(&img, img.full_bounds());
        assert!(matches!(result, Err(Error::InsufficientColorSignal { .. })));
    }

    #[test]
    fn test_region_restricts_analysis() {
        let img = image_with_blocks(&[(RGB8::new(230, 25, 25), 10), (RGB8::new(20, 60, 220), 10)]);
        let clusters = ColorAnalyzer::default()
            .analyze(&img, PixelBounds::new(0, 10, 99, 99))
            .unwrap();
        assert_eq!(clusters.len(), 1);
        assert_eq!(clusters[0].name, "blue");
    }

    #[test]
    fn test_centroid_hue_wraps_around_zero() {
        // Reds on both sides of 0 degrees average near 0, not 180.
        let img = image_with_blocks(&[(RGB8::new(255, 0, 20), 5), (RGB8::new(255, 20, 0), 5)]);
        let clusters = ColorAnalyzer::default()
            .analyze(&img, img.full_bounds())
            .unwrap();
        assert_eq!(clusters.len(), 1);
        let h = clusters[0].centroid_hsv.h;
        assert!(!(5.0..=355.0).contains(&h), "hue {h}");
    }

    #[test]
    fn test_cluster_hex() {
        let cluster = ColorCluster::from_named(NamedColor::Red);
        assert_eq!(cluster.hex(), "#e61919");
    }
}
