//! Colour masks for individual curves.
//!
//! A pixel belongs to a curve's mask when its hue matches the target colour.
//! With tolerance 0 the match is strict palette-bin membership, which keeps
//! neighbouring hues (red and orange, blue and cyan) apart. Raising the
//! tolerance widens the accepted hue band around the target, which recovers
//! faded or off-palette curves at the risk of merging adjacent hues.
//!
//! After colour matching, connected components smaller than `min_size`
//! pixels are removed to drop noise specks, text and legend swatches.

use std::str::FromStr;

use rgb::RGB8;

use crate::calibration::PixelBounds;
use crate::color::{ChromaFloor, ColorCluster, Hsv, NamedColor, nearest_named};
use crate::error::{Error, Result};
use crate::raster::{Mask, RasterImage};

/// Largest supported colour tolerance, in degrees of hue.
pub const MAX_TOLERANCE: u8 = 60;

/// Hue band used for clusters that have no palette bin.
const UNBINNED_BAND: f32 = 15.0;

/// Colour a mask is built for.
#[derive(Debug, Clone, PartialEq)]
pub enum ColorTarget {
    /// A palette colour by name.
    Named(NamedColor),
    /// A cluster found by the analyzer or by k-means.
    Cluster(ColorCluster),
    /// An explicit RGB colour.
    Rgb(RGB8),
}

impl FromStr for ColorTarget {
    type Err = Error;

    /// Parse `"red"` or `"#rrggbb"`.
    fn from_str(s: &str) -> Result<Self> {
        let trimmed = s.trim();
        if let Some(hex) = trimmed.strip_prefix('#') {
            if hex.len() != 6 || !hex.bytes().all(|b| b.is_ascii_hexdigit()) {
                return Err(Error::UnknownColor(s.to_string()));
            }
            let channel = |i: usize| {
                u8::from_str_radix(&hex[i..i + 2], 16).map_err(|_| Error::UnknownColor(s.to_string()))
            };
            return Ok(Self::Rgb(RGB8::new(channel(0)?, channel(2)?, channel(4)?)));
        }
        trimmed.parse().map(Self::Named)
    }
}

impl ColorTarget {
    /// Name reported for curves built from this target.
    #[must_use]
    pub fn name(&self) -> String {
        match self {
            Self::Named(c) => c.name().to_string(),
            Self::Cluster(c) => c.name.clone(),
            Self::Rgb(c) => rgb_hex(*c),
        }
    }

    /// Representative colour.
    #[must_use]
    pub fn rgb(&self) -> RGB8 {
        match self {
            Self::Named(c) => c.representative(),
            Self::Cluster(c) => c.representative,
            Self::Rgb(c) => *c,
        }
    }

    /// Representative colour as `#rrggbb`.
    #[must_use]
    pub fn hex(&self) -> String {
        rgb_hex(self.rgb())
    }

    /// Hue of the target colour.
    #[must_use]
    pub fn hue(&self) -> f32 {
        match self {
            Self::Named(c) => c.hue(),
            Self::Cluster(c) => c.centroid_hsv.h,
            Self::Rgb(c) => Hsv::from_rgb(*c).h,
        }
    }

    /// Palette bin matched at tolerance 0.
    #[must_use]
    pub fn bin(&self) -> Option<NamedColor> {
        match self {
            Self::Named(c) => Some(*c),
            Self::Cluster(c) => c.named,
            Self::Rgb(c) => Some(nearest_named(Hsv::from_rgb(*c))),
        }
    }

    /// Smoothing lookup key: the palette name when there is one.
    #[must_use]
    pub fn palette_name(&self) -> String {
        match self {
            Self::Cluster(c) if c.named.is_none() => nearest_named(c.centroid_hsv).name().to_string(),
            other => other.bin().map_or_else(|| other.name(), |b| b.name().to_string()),
        }
    }
}

fn rgb_hex(c: RGB8) -> String {
    format!("#{:02x}{:02x}{:02x}", c.r, c.g, c.b)
}

/// Hue range accepted around a centre, possibly asymmetric.
#[derive(Debug, Clone, Copy)]
struct HueWindow {
    centre: f32,
    below: f32,
    above: f32,
}

impl HueWindow {
    fn contains(self, h: f32) -> bool {
        let offset = (h - self.centre + 540.0).rem_euclid(360.0) - 180.0;
        if offset < 0.0 {
            -offset <= self.below
        } else {
            offset <= self.above
        }
    }
}

/// Builds binary masks for colour targets.
#[derive(Debug, Clone)]
pub struct MaskBuilder {
    tolerance: u8,
    min_size: u32,
    floor: ChromaFloor,
}

impl MaskBuilder {
    /// Create a builder. Tolerance above [`MAX_TOLERANCE`] is rejected.
    pub fn new(tolerance: u8, min_size: u32) -> Result<Self> {
        if tolerance > MAX_TOLERANCE {
            return Err(Error::InvalidTolerance(tolerance));
        }
        Ok(Self {
            tolerance,
            min_size,
            floor: ChromaFloor::default(),
        })
    }

    /// Override the chroma floor.
    #[must_use]
    pub fn with_floor(mut self, floor: ChromaFloor) -> Self {
        self.floor = floor;
        self
    }

    /// Hue tolerance in degrees.
    #[must_use]
    pub fn tolerance(&self) -> u8 {
        self.tolerance
    }

    /// Minimum component size in pixels.
    #[must_use]
    pub fn min_size(&self) -> u32 {
        self.min_size
    }

    fn accepts(&self, c: Hsv, bin: Option<NamedColor>, window: Option<HueWindow>) -> bool {
        if !self.floor.is_chromatic(c) {
            return false;
        }
        bin.is_some_and(|b| nearest_named(c) == b) || window.is_some_and(|w| w.contains(c.h))
    }

    /// Extra hues accepted for `target`. A palette bin grows outward from its
    /// own edges by the tolerance; an unbinned colour gets a band around its hue.
    fn window(&self, target: &ColorTarget) -> Option<HueWindow> {
        let tolerance = f32::from(self.tolerance);
        match target.bin() {
            Some(_) if self.tolerance == 0 => None,
            Some(bin) => {
                let (below, above) = bin.hue_edges();
                Some(HueWindow {
                    centre: bin.hue(),
                    below: below + tolerance,
                    above: above + tolerance,
                })
            }
            None => {
                let band = tolerance.max(UNBINNED_BAND);
                Some(HueWindow {
                    centre: target.hue(),
                    below: band,
                    above: band,
                })
            }
        }
    }

    /// Build the mask of `target` inside `region`.
    #[must_use]
    pub fn build(&self, image: &RasterImage, target: &ColorTarget, region: PixelBounds) -> Mask {
        let region = region.clamp_to(image.width(), image.height());
        let bin = target.bin();
        let window = self.window(target);

        let mut mask = Mask::new(image.width(), image.height());
        for y in region.y0..=region.y1 {
            for x in region.x0..=region.x1 {
                if self.accepts(image.hsv(x, y), bin, window) {
                    mask.set(x, y, true);
                }
            }
        }

        let removed = remove_small_components(&mut mask, region, self.min_size as usize);
        tracing::debug!(
            target = %target.name(),
            tolerance = self.tolerance,
            kept = mask.count(),
            removed,
            "built mask"
        );
        mask
    }
}

/// Clear 8-connected components with fewer than `min_size` pixels.
/// Returns the number of pixels cleared.
pub fn remove_small_components(mask: &mut Mask, region: PixelBounds, min_size: usize) -> usize {
    if min_size <= 1 {
        return 0;
    }
    let width = mask.width();
    let mut visited = vec![false; width * mask.height()];
    let mut stack: Vec<(usize, usize)> = Vec::new();
    let mut component: Vec<(usize, usize)> = Vec::new();
    let mut removed = 0;

    for y in region.y0..=region.y1 {
        for x in region.x0..=region.x1 {
            if visited[y * width + x] || !mask.get(x, y) {
                continue;
            }
            component.clear();
            visited[y * width + x] = true;
            stack.push((x, y));
            while let Some((cx, cy)) = stack.pop() {
                component.push((cx, cy));
                for ny in cy.saturating_sub(1)..=(cy + 1).min(region.y1) {
                    for nx in cx.saturating_sub(1)..=(cx + 1).min(region.x1) {
                        if ny < region.y0 || nx < region.x0 {
                            continue;
                        }
                        let idx = ny * width + nx;
                        if !visited[idx] && mask.get(nx, ny) {
                            visited[idx] = true;
                            stack.push((nx, ny));
                        }
                    }
                }
            }
            if component.len() < min_size {
                removed += component.len();
                for &(px, py) in &component {
                    mask.set(px, py, false);
                }
            }
        }
    }
    removed
}

#[cfg(test)]
mod tests {
    use super::*;

    /// 40x20 image: rows 2-4 red, rows 8-10 orange, rows 14-16 a red-orange
    /// hue 12 degrees off red.
    fn bands_image() -> RasterImage {
        let (w, h) = (40, 20);
        let mut data = vec![255u8; w * h * 3];
        let mut fill = |rows: std::ops::RangeInclusive<usize>, c: [u8; 3]| {
            for y in rows {
                for x in 0..w {
                    let i = (y * w + x) * 3;
                    data[i..i + 3].copy_from_slice(&c);
                }
            }
        };
        fill(2..=4, [255, 0, 0]);
        fill(8..=10, [255, 140, 0]);
        fill(14..=16, [255, 51, 0]);
        RasterImage::from_rgb8(&data, w, h).unwrap()
    }

    fn rows_in(mask: &Mask) -> Vec<usize> {
        (0..mask.height()).filter(|&y| mask.get(0, y)).collect()
    }

    #[test]
    fn test_parse_targets() {
        assert_eq!("red".parse::<ColorTarget>().unwrap(), ColorTarget::Named(NamedColor::Red));
        assert_eq!(
            "#1f77b4".parse::<ColorTarget>().unwrap(),
            ColorTarget::Rgb(RGB8::new(0x1f, 0x77, 0xb4))
        );
        assert!("#12345".parse::<ColorTarget>().is_err());
        assert!("#zzzzzz".parse::<ColorTarget>().is_err());
        assert!("chartreuse".parse::<ColorTarget>().is_err());
    }

    #[test]
    fn test_parse_rejects_non_ascii_hex() {
        // Six bytes, but the accented character straddles a channel boundary.
        assert!(matches!("#a\u{e9}bcd".parse::<ColorTarget>(), Err(Error::UnknownColor(_))));
        assert!(matches!("#+1+2+3".parse::<ColorTarget>(), Err(Error::UnknownColor(_))));
    }

    #[test]
    fn test_rejects_large_tolerance() {
        assert!(matches!(MaskBuilder::new(61, 0), Err(Error::InvalidTolerance(61))));
        assert!(MaskBuilder::new(60, 0).is_ok());
    }

    #[test]
    fn test_strict_mode_separates_adjacent_hues() {
        let img = bands_image();
        let builder = MaskBuilder::new(0, 0).unwrap();
        let red = builder.build(&img, &ColorTarget::Named(NamedColor::Red), img.full_bounds());
        assert_eq!(rows_in(&red), vec![2, 3, 4, 14, 15, 16]);
        let orange = builder.build(&img, &ColorTarget::Named(NamedColor::Orange), img.full_bounds());
        assert_eq!(rows_in(&orange), vec![8, 9, 10]);
    }

    #[test]
    fn test_tolerance_widens_band() {
        let img = bands_image();
        let wide = MaskBuilder::new(40, 0).unwrap();
        let red = wide.build(&img, &ColorTarget::Named(NamedColor::Red), img.full_bounds());
        assert_eq!(rows_in(&red), vec![2, 3, 4, 8, 9, 10, 14, 15, 16]);
    }

    #[test]
    fn test_small_tolerance_grows_past_bin_edge() {
        // Hue 18 sits in the orange bin, 3 degrees past red's upper edge.
        let (w, h) = (30, 10);
        let mut data = vec![255u8; w * h * 3];
        for y in 4..=5 {
            for x in 0..w {
                let i = (y * w + x) * 3;
                data[i..i + 3].copy_from_slice(&[255, 77, 0]);
            }
        }
        let img = RasterImage::from_rgb8(&data, w, h).unwrap();
        let count = |tolerance: u8| {
            MaskBuilder::new(tolerance, 0)
                .unwrap()
                .build(&img, &ColorTarget::Named(NamedColor::Red), img.full_bounds())
                .count()
        };
        assert_eq!(count(0), 0);
        assert_eq!(count(2), 0);
        assert_eq!(count(5), 60);
        assert_eq!(count(10), 60);
    }

    #[test]
    fn test_rgb_target_uses_its_bin() {
        let img = bands_image();
        let builder = MaskBuilder::new(0, 0).unwrap();
        let mask = builder.build(&img, &"#ff8c00".parse().unwrap(), img.full_bounds());
        assert_eq!(rows_in(&mask), vec![8, 9, 10]);
    }

    #[test]
    fn test_unbinned_cluster_uses_minimum_band() {
        let img = bands_image();
        let cluster = ColorCluster {
            name: "red".to_string(),
            named: None,
            representative: RGB8::new(255, 0, 0),
            pixel_count: 0,
            centroid_hsv: Hsv::new(0.0, 1.0, 1.0),
        };
        let mask = MaskBuilder::new(0, 0)
            .unwrap()
            .build(&img, &ColorTarget::Cluster(cluster), img.full_bounds());
        // Hue 12 is inside the 15 degree band, orange at ~33 is not.
        assert_eq!(rows_in(&mask), vec![2, 3, 4, 14, 15, 16]);
    }

    #[test]
    fn test_region_limits_mask() {
        let img = bands_image();
        let mask = MaskBuilder::new(0, 0)
            .unwrap()
            .build(&img, &ColorTarget::Named(NamedColor::Red), PixelBounds::new(0, 0, 39, 9));
        assert_eq!(rows_in(&mask), vec![2, 3, 4]);
    }

    #[test]
    fn test_small_components_removed() {
        let mut mask = Mask::new(20, 20);
        for x in 0..15 {
            mask.set(x, 5, true);
        }
        mask.set(18, 18, true);
        mask.set(17, 17, true);
        let removed = remove_small_components(&mut mask, PixelBounds::full(20, 20), 10);
        assert_eq!(removed, 2);
        assert_eq!(mask.count(), 15);
        assert!(!mask.get(18, 18));
    }

    #[test]
    fn test_diagonal_pixels_are_connected() {
        let mut mask = Mask::new(10, 10);
        for i in 0..10 {
            mask.set(i, i, true);
        }
        let removed = remove_small_components(&mut mask, PixelBounds::full(10, 10), 10);
        assert_eq!(removed, 0);
        assert_eq!(mask.count(), 10);
    }
}
