//! Unsupervised curve-colour discovery.
//!
//! Chromatic pixels are embedded as `(s*cos h, s*sin h, v)` so that hue wraps
//! around correctly, then grouped with `kmeans_colors`. The generator is
//! seeded from the config, so repeated runs produce identical clusters.
//! Clusters whose hues are too close to yield different masks are merged.

use std::collections::BTreeMap;

use kmeans_colors::{Calculate, get_kmeans};
use rand::Rng;
use serde::{Deserialize, Serialize};

use crate::calibration::PixelBounds;
use crate::color::{ChromaFloor, ColorCluster, Hsv, circular_mean_hue, hue_distance, nearest_named};
use crate::error::{Error, Result};
use crate::raster::RasterImage;

/// How the number of clusters is chosen.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum KSelection {
    /// Always use this many clusters (capped by the number of samples).
    Fixed(usize),
    /// Elbow heuristic over `1..=max_k`.
    Elbow {
        /// Largest k considered.
        max_k: usize,
        /// Stop adding clusters once the inertia gain drops below this
        /// fraction of the single-cluster inertia.
        ratio: f64,
    },
}

impl Default for KSelection {
    fn default() -> Self {
        Self::Elbow {
            max_k: 6,
            ratio: 0.05,
        }
    }
}

/// Configuration for auto-color clustering.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ClusteringConfig {
    /// How k is chosen.
    pub k: KSelection,
    /// Floor for pixels to be sampled. Looser than the analyzer's so that
    /// faint curves still contribute.
    pub floor: ChromaFloor,
    /// Upper bound on sampled pixels.
    pub max_samples: usize,
    /// Iteration limit per k-means run.
    pub max_iterations: usize,
    /// Centroid movement below which a run has converged.
    pub convergence: f32,
    /// Random seed for centroid initialisation.
    pub seed: u64,
    /// Clusters holding less than this fraction of the samples are dropped.
    pub min_cluster_fraction: f64,
    /// Clusters whose mean hues are at most this many degrees apart are merged.
    pub merge_hue_distance: f32,
}

impl Default for ClusteringConfig {
    fn default() -> Self {
        Self {
            k: KSelection::default(),
            floor: ChromaFloor {
                min_saturation: 0.2,
                min_value: 0.15,
            },
            max_samples: 20_000,
            max_iterations: 50,
            convergence: 1e-6,
            seed: 0,
            min_cluster_fraction: 0.02,
            merge_hue_distance: 15.0,
        }
    }
}

/// A pixel in the hue-wrapping embedding.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
struct HueChroma {
    a: f32,
    b: f32,
    v: f32,
}

impl From<Hsv> for HueChroma {
    fn from(c: Hsv) -> Self {
        let rad = c.h.to_radians();
        Self {
            a: c.s * rad.cos(),
            b: c.s * rad.sin(),
            v: c.v,
        }
    }
}

impl Calculate for HueChroma {
    fn get_closest_centroid(buffer: &[Self], centroids: &[Self], indices: &mut Vec<u8>) {
        indices.extend(buffer.iter().map(|p| nearest(centroids, p)));
    }

    fn recalculate_centroids(rng: &mut impl Rng, buf: &[Self], centroids: &mut [Self], indices: &[u8]) {
        for (idx, cent) in centroids.iter_mut().enumerate() {
            let (mut a, mut b, mut v, mut count) = (0.0f64, 0.0f64, 0.0f64, 0u32);
            for (p, _) in buf.iter().zip(indices).filter(|(_, j)| usize::from(**j) == idx) {
                a += f64::from(p.a);
                b += f64::from(p.b);
                v += f64::from(p.v);
                count += 1;
            }
            *cent = if count == 0 {
                Self::create_random(&mut *rng)
            } else {
                let n = f64::from(count);
                Self {
                    a: (a / n) as f32,
                    b: (b / n) as f32,
                    v: (v / n) as f32,
                }
            };
        }
    }

    fn check_loop(centroids: &[Self], old_centroids: &[Self]) -> f32 {
        centroids
            .iter()
            .zip(old_centroids)
            .map(|(c, o)| Self::difference(c, o))
            .sum()
    }

    fn create_random(rng: &mut impl Rng) -> Self {
        Hsv::new(
            rng.random_range(0.0..360.0),
            rng.random_range(0.0..=1.0),
            rng.random_range(0.0..=1.0),
        )
        .into()
    }

    fn difference(c1: &Self, c2: &Self) -> f32 {
        (c1.a - c2.a).powi(2) + (c1.b - c2.b).powi(2) + (c1.v - c2.v).powi(2)
    }
}

fn nearest(centroids: &[HueChroma], p: &HueChroma) -> u8 {
    let mut best = 0;
    let mut best_d = f32::MAX;
    for (i, c) in centroids.iter().enumerate() {
        let d = HueChroma::difference(p, c);
        if d < best_d {
            best = i;
            best_d = d;
        }
    }
    best as u8
}

/// Outcome of one k-means run.
#[derive(Debug, Clone)]
struct KMeansFit {
    centroids: Vec<HueChroma>,
    indices: Vec<u8>,
    inertia: f64,
}

fn fit(samples: &[HueChroma], k: usize, config: &ClusteringConfig) -> KMeansFit {
    let result = get_kmeans(k, config.max_iterations, config.convergence, false, samples, config.seed);
    let inertia = samples
        .iter()
        .zip(&result.indices)
        .map(|(p, &i)| f64::from(HueChroma::difference(p, &result.centroids[usize::from(i)])))
        .sum();
    KMeansFit {
        centroids: result.centroids,
        indices: result.indices,
        inertia,
    }
}

fn choose_fit(samples: &[HueChroma], config: &ClusteringConfig) -> KMeansFit {
    // Indices are u8 inside kmeans_colors.
    let cap = samples.len().min(usize::from(u8::MAX));
    match config.k {
        KSelection::Fixed(k) => fit(samples, k.clamp(1, cap), config),
        KSelection::Elbow { max_k, ratio } => {
            let max_k = max_k.clamp(1, cap);
            let mut current = fit(samples, 1, config);
            let total = current.inertia;
            if total <= f64::EPSILON {
                return current;
            }
            for k in 2..=max_k {
                let candidate = fit(samples, k, config);
                if current.inertia - candidate.inertia < ratio * total {
                    break;
                }
                current = candidate;
            }
            current
        }
    }
}

fn centroid_of<'a>(weighted: impl IntoIterator<Item = (&'a Hsv, f64)>) -> Option<Hsv> {
    let (mut sin, mut cos, mut s, mut v, mut total) = (0.0, 0.0, 0.0, 0.0, 0.0);
    let mut first = None;
    for (c, w) in weighted {
        if first.is_none() {
            first = Some(c.h);
        }
        let rad = f64::from(c.h).to_radians();
        sin += w * rad.sin();
        cos += w * rad.cos();
        s += w * f64::from(c.s);
        v += w * f64::from(c.v);
        total += w;
    }
    let first = first?;
    if total <= 0.0 {
        return None;
    }
    let hue = circular_mean_hue(sin, cos).unwrap_or(first);
    Some(Hsv::new(hue, (s / total) as f32, (v / total) as f32))
}

fn cluster_at(centroid: Hsv, pixel_count: usize) -> ColorCluster {
    ColorCluster {
        name: nearest_named(centroid).name().to_string(),
        named: None,
        representative: centroid.to_rgb(),
        pixel_count,
        centroid_hsv: centroid,
    }
}

/// Merge clusters whose mean hues are within `max_distance` degrees, largest
/// first. Hue-only masks cannot tell such clusters apart, so each would trace
/// the same curve. Names are reassigned afterwards.
#[must_use]
pub fn merge_similar_hues(clusters: Vec<ColorCluster>, max_distance: f32) -> Vec<ColorCluster> {
    let mut ordered = clusters;
    sort_clusters(&mut ordered);
    let mut merged: Vec<ColorCluster> = Vec::with_capacity(ordered.len());
    for cluster in ordered {
        let close = merged
            .iter_mut()
            .find(|m| hue_distance(m.centroid_hsv.h, cluster.centroid_hsv.h) <= max_distance);
        match close {
            Some(m) => {
                let weights = [
                    (&m.centroid_hsv, m.pixel_count as f64),
                    (&cluster.centroid_hsv, cluster.pixel_count as f64),
                ];
                let centroid = centroid_of(weights).unwrap_or(m.centroid_hsv);
                *m = cluster_at(centroid, m.pixel_count + cluster.pixel_count);
            }
            None => merged.push(cluster),
        }
    }
    for m in &mut merged {
        if m.named.is_none() {
            m.name = nearest_named(m.centroid_hsv).name().to_string();
        }
    }
    sort_clusters(&mut merged);
    dedupe_names(&mut merged);
    merged
}

fn sort_clusters(clusters: &mut [ColorCluster]) {
    clusters.sort_by(|a, b| {
        b.pixel_count
            .cmp(&a.pixel_count)
            .then_with(|| a.centroid_hsv.h.total_cmp(&b.centroid_hsv.h))
    });
}

/// Discover curve colours inside `region` without a caller-supplied palette.
///
/// Returns clusters sorted by descending pixel count. Fails with
/// [`Error::InsufficientColorSignal`] when the region holds no chromatic pixels.
pub fn discover_colors(
    image: &RasterImage,
    region: PixelBounds,
    config: &ClusteringConfig,
) -> Result<Vec<ColorCluster>> {
    let region = region.clamp_to(image.width(), image.height());
    let mut pixels: Vec<Hsv> = Vec::new();
    for y in region.y0..=region.y1 {
        for x in region.x0..=region.x1 {
            let c = image.hsv(x, y);
            if config.floor.is_chromatic(c) {
                pixels.push(c);
            }
        }
    }

    let min_samples = ((1.0 / config.min_cluster_fraction.max(1e-6)).ceil() as usize).max(1);
    if pixels.len() < min_samples {
        return Err(Error::InsufficientColorSignal {
            threshold: min_samples,
        });
    }

    let stride = pixels.len().div_ceil(config.max_samples.max(1));
    let sampled: Vec<Hsv> = pixels.iter().step_by(stride).copied().collect();
    let features: Vec<HueChroma> = sampled.iter().map(|&c| c.into()).collect();
    let fitted = choose_fit(&features, config);
    tracing::debug!(
        k = fitted.centroids.len(),
        samples = features.len(),
        inertia = fitted.inertia,
        "k-means color discovery"
    );

    let min_members = (features.len() as f64 * config.min_cluster_fraction).ceil() as usize;
    let mut groups: Vec<Vec<Hsv>> = vec![Vec::new(); fitted.centroids.len()];
    for (c, &i) in sampled.iter().zip(&fitted.indices) {
        groups[usize::from(i)].push(*c);
    }

    let clusters: Vec<ColorCluster> = groups
        .into_iter()
        .filter(|g| !g.is_empty() && g.len() >= min_members)
        .filter_map(|members| {
            let centroid = centroid_of(members.iter().map(|c| (c, 1.0)))?;
            Some(cluster_at(centroid, members.len() * stride))
        })
        .collect();

    if clusters.is_empty() {
        return Err(Error::InsufficientColorSignal {
            threshold: min_members,
        });
    }
    Ok(merge_similar_hues(clusters, config.merge_hue_distance))
}

fn dedupe_names(clusters: &mut [ColorCluster]) {
    let mut seen: BTreeMap<String, usize> = BTreeMap::new();
    for cluster in clusters {
        let count = seen.entry(cluster.name.clone()).or_insert(0);
        *count += 1;
        if *count > 1 {
            cluster.name = format!("{}-{}", cluster.name, count);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rgb::RGB8;

    fn striped(colors: &[(RGB8, usize)]) -> RasterImage {
        let width = 60;
        let height = 60;
        let mut data = vec![255u8; width * height * 3];
        let mut row = 0;
        for (color, rows) in colors {
            for y in row..row + rows {
                for x in 0..width {
                    let i = (y * width + x) * 3;
                    data[i..i + 3].copy_from_slice(&[color.r, color.g, color.b]);
                }
            }
            row += rows;
        }
        RasterImage::from_rgb8(&data, width, height).unwrap()
    }

    #[test]
    fn test_elbow_finds_two_colors() {
        let img = striped(&[(RGB8::new(230, 25, 25), 6), (RGB8::new(20, 60, 220), 4)]);
        let clusters = discover_colors(&img, img.full_bounds(), &ClusteringConfig::default()).unwrap();
        assert_eq!(clusters.len(), 2);
        assert_eq!(clusters[0].name, "red");
        assert_eq!(clusters[1].name, "blue");
        assert!(clusters.iter().all(|c| c.named.is_none()));
        assert_eq!(clusters[0].pixel_count, 360);
    }

    #[test]
    fn test_fixed_k_is_capped() {
        let img = striped(&[(RGB8::new(20, 160, 40), 5)]);
        let config = ClusteringConfig {
            k: KSelection::Fixed(4),
            ..ClusteringConfig::default()
        };
        // All samples are identical, so seeding stops after one centroid.
        let clusters = discover_colors(&img, img.full_bounds(), &config).unwrap();
        assert_eq!(clusters.len(), 1);
        assert_eq!(clusters[0].name, "green");
    }

    #[test]
    fn test_duplicate_names_get_suffix() {
        let img = striped(&[(RGB8::new(20, 60, 220), 6), (RGB8::new(100, 140, 255), 6)]);
        let config = ClusteringConfig {
            k: KSelection::Fixed(2),
            merge_hue_distance: 0.0,
            ..ClusteringConfig::default()
        };
        let clusters = discover_colors(&img, img.full_bounds(), &config).unwrap();
        let names: Vec<&str> = clusters.iter().map(|c| c.name.as_str()).collect();
        assert_eq!(names, vec!["blue", "blue-2"]);
    }

    #[test]
    fn test_shades_of_one_ink_merge() {
        // Full-strength matplotlib blue and its half tint over white share a hue.
        let img = striped(&[(RGB8::new(31, 119, 180), 6), (RGB8::new(152, 187, 217), 6)]);
        let split = ClusteringConfig {
            k: KSelection::Fixed(2),
            ..ClusteringConfig::default()
        };
        let clusters = discover_colors(&img, img.full_bounds(), &split).unwrap();
        assert_eq!(clusters.len(), 1);
        assert_eq!(clusters[0].name, "blue");
        assert_eq!(clusters[0].pixel_count, 720);
    }

    #[test]
    fn test_merge_keeps_distinct_hues() {
        let cluster = |h: f32, pixel_count: usize| cluster_at(Hsv::new(h, 0.8, 0.8), pixel_count);
        let merged = merge_similar_hues(vec![cluster(230.0, 10), cluster(0.0, 50), cluster(220.0, 30), cluster(355.0, 5)], 15.0);
        assert_eq!(merged.len(), 2);
        assert_eq!(merged[0].pixel_count, 55);
        assert_eq!(merged[1].pixel_count, 40);
        assert!(hue_distance(merged[1].centroid_hsv.h, 222.5) < 0.5);
        assert_eq!(merged[1].name, "blue");
    }

    #[test]
    fn test_no_chromatic_pixels() {
        let img = striped(&[(RGB8::new(0, 0, 0), 10)]);
        let result = discover_colors(&img, img.full_bounds(), &ClusteringConfig::default());
        assert!(matches!(result, Err(Error::InsufficientColorSignal { .. })));
    }

    #[test]
    fn test_deterministic() {
        let img = striped(&[
            (RGB8::new(230, 25, 25), 4),
            (RGB8::new(20, 160, 40), 4),
            (RGB8::new(20, 60, 220), 4),
        ]);
        let config = ClusteringConfig::default();
        let a = discover_colors(&img, img.full_bounds(), &config).unwrap();
        let b = discover_colors(&img, img.full_bounds(), &config).unwrap();
        assert_eq!(a, b);
        assert_eq!(a.len(), 3);
    }
}
