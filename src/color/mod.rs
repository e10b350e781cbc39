//! Colour spaces, the named curve palette, and colour discovery.
//!
//! Datasheet curves are told apart by hue. Hue survives anti-aliasing and
//! JPEG banding far better than raw RGB distance, so everything downstream
//! works in HSV:
//!
//! - [`Hsv`]: conversion and circular hue distance
//! - [`NamedColor`] / [`classify`]: nearest-hue palette assignment
//! - [`analyzer`]: per-image colour histogram into [`ColorCluster`]s
//! - [`kmeans`]: unsupervised colour discovery for the auto-color stage

pub mod analyzer;
pub mod kmeans;

use std::fmt;
use std::str::FromStr;

use rgb::RGB8;
use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};

pub use analyzer::{AnalyzerConfig, ColorAnalyzer, ColorCluster};
pub use kmeans::{ClusteringConfig, KSelection};

/// Colour in HSV space. Hue in degrees `[0, 360)`, saturation and value in `[0, 1]`.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Hsv {
    /// Hue in degrees.
    pub h: f32,
    /// Saturation.
    pub s: f32,
    /// Value (brightness).
    pub v: f32,
}

impl Hsv {
    /// Create a new HSV colour, normalizing hue into `[0, 360)`.
    #[must_use]
    pub fn new(h: f32, s: f32, v: f32) -> Self {
        Self {
            h: h.rem_euclid(360.0),
            s: s.clamp(0.0, 1.0),
            v: v.clamp(0.0, 1.0),
        }
    }

    /// Convert from 8-bit RGB.
    #[must_use]
    pub fn from_rgb(c: RGB8) -> Self {
        let r = f32::from(c.r) / 255.0;
        let g = f32::from(c.g) / 255.0;
        let b = f32::from(c.b) / 255.0;
        let max = r.max(g).max(b);
        let min = r.min(g).min(b);
        let delta = max - min;

        let h = if delta <= f32::EPSILON {
            0.0
        } else if max == r {
            60.0 * ((g - b) / delta).rem_euclid(6.0)
        } else if max == g {
            60.0 * ((b - r) / delta + 2.0)
        } else {
            60.0 * ((r - g) / delta + 4.0)
        };
        let s = if max <= f32::EPSILON { 0.0 } else { delta / max };

        Self::new(h, s, max)
    }

    /// Convert back to 8-bit RGB.
    #[must_use]
    pub fn to_rgb(self) -> RGB8 {
        let c = self.v * self.s;
        let hp = self.h / 60.0;
        let x = c * (1.0 - (hp.rem_euclid(2.0) - 1.0).abs());
        let (r, g, b) = match hp as u32 {
            0 => (c, x, 0.0),
            1 => (x, c, 0.0),
            2 => (0.0, c, x),
            3 => (0.0, x, c),
            4 => (x, 0.0, c),
            _ => (c, 0.0, x),
        };
        let m = self.v - c;
        let to_u8 = |f: f32| ((f + m) * 255.0).round().clamp(0.0, 255.0) as u8;
        RGB8::new(to_u8(r), to_u8(g), to_u8(b))
    }
}

/// Circular distance between two hues in degrees, in `[0, 180]`.
///
/// ```
/// use curve_extract::color::hue_distance;
///
/// assert!((hue_distance(359.0, 1.0) - 2.0).abs() < 1e-4);
/// assert!((hue_distance(90.0, 270.0) - 180.0).abs() < 1e-4);
/// ```
#[must_use]
pub fn hue_distance(a: f32, b: f32) -> f32 {
    let d = (a - b).abs().rem_euclid(360.0);
    d.min(360.0 - d)
}

/// Circular mean of hues weighted by count, `None` when the inputs cancel out.
#[must_use]
pub fn circular_mean_hue(sum_sin: f64, sum_cos: f64) -> Option<f32> {
    if sum_sin.abs() < 1e-9 && sum_cos.abs() < 1e-9 {
        return None;
    }
    Some((sum_sin.atan2(sum_cos).to_degrees() as f32).rem_euclid(360.0))
}

/// Named curve colours recognised by the palette.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum NamedColor {
    Red,
    Orange,
    Yellow,
    Green,
    Cyan,
    Blue,
    Purple,
    Magenta,
    Pink,
    Brown,
}

/// Hue centres used for nearest-hue assignment. Brown has no hue bin of its
/// own; it is carved out of the warm bins by value.
const HUE_CENTERS: [(NamedColor, f32); 9] = [
    (NamedColor::Red, 0.0),
    (NamedColor::Orange, 30.0),
    (NamedColor::Yellow, 58.0),
    (NamedColor::Green, 120.0),
    (NamedColor::Cyan, 182.0),
    (NamedColor::Blue, 225.0),
    (NamedColor::Purple, 272.0),
    (NamedColor::Magenta, 300.0),
    (NamedColor::Pink, 332.0),
];

const BROWN_HUE: f32 = 20.0;

/// Hues below and above [`BROWN_HUE`] eligible for the brown carve-out.
const BROWN_HUES: (f32, f32) = (12.0, 30.0);

impl NamedColor {
    /// All palette colours.
    pub const ALL: [Self; 10] = [
        Self::Red,
        Self::Orange,
        Self::Yellow,
        Self::Green,
        Self::Cyan,
        Self::Blue,
        Self::Purple,
        Self::Magenta,
        Self::Pink,
        Self::Brown,
    ];

    /// Lowercase name.
    #[must_use]
    pub fn name(self) -> &'static str {
        match self {
            Self::Red => "red",
            Self::Orange => "orange",
            Self::Yellow => "yellow",
            Self::Green => "green",
            Self::Cyan => "cyan",
            Self::Blue => "blue",
            Self::Purple => "purple",
            Self::Magenta => "magenta",
            Self::Pink => "pink",
            Self::Brown => "brown",
        }
    }

    /// Hue centre of the bin in degrees.
    #[must_use]
    pub fn hue(self) -> f32 {
        match self {
            Self::Brown => BROWN_HUE,
            other => HUE_CENTERS
                .iter()
                .find(|(c, _)| *c == other)
                .map_or(0.0, |(_, h)| *h),
        }
    }

    /// Half-widths of the bin below and above its hue centre, in degrees.
    #[must_use]
    pub fn hue_edges(self) -> (f32, f32) {
        let Some(i) = HUE_CENTERS.iter().position(|(c, _)| *c == self) else {
            // Brown spans the warm hues of its carve-out.
            return BROWN_HUES;
        };
        let n = HUE_CENTERS.len();
        let hue = HUE_CENTERS[i].1;
        let below = HUE_CENTERS[(i + n - 1) % n].1;
        let above = HUE_CENTERS[(i + 1) % n].1;
        (hue_distance(hue, below) / 2.0, hue_distance(hue, above) / 2.0)
    }

    /// Typical rendering of this colour on a datasheet.
    #[must_use]
    pub fn representative(self) -> RGB8 {
        match self {
            Self::Red => RGB8::new(230, 25, 25),
            Self::Orange => RGB8::new(255, 140, 0),
            Self::Yellow => RGB8::new(235, 210, 0),
            Self::Green => RGB8::new(20, 160, 40),
            Self::Cyan => RGB8::new(0, 190, 200),
            Self::Blue => RGB8::new(20, 60, 220),
            Self::Purple => RGB8::new(130, 50, 200),
            Self::Magenta => RGB8::new(220, 0, 220),
            Self::Pink => RGB8::new(255, 80, 170),
            Self::Brown => RGB8::new(140, 80, 40),
        }
    }
}

impl fmt::Display for NamedColor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for NamedColor {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        let lower = s.trim().to_ascii_lowercase();
        Self::ALL
            .into_iter()
            .find(|c| c.name() == lower)
            .ok_or_else(|| Error::UnknownColor(s.to_string()))
    }
}

/// Saturation/value floor separating curve ink from gray, black and white.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ChromaFloor {
    /// Minimum saturation for a pixel to count as coloured.
    pub min_saturation: f32,
    /// Minimum value for a pixel to count as coloured.
    pub min_value: f32,
}

impl Default for ChromaFloor {
    fn default() -> Self {
        Self {
            min_saturation: 0.25,
            min_value: 0.2,
        }
    }
}

impl ChromaFloor {
    /// Whether the colour clears both floors.
    #[must_use]
    pub fn is_chromatic(&self, c: Hsv) -> bool {
        c.s >= self.min_saturation && c.v >= self.min_value
    }
}

/// Palette bin of a colour, ignoring the chroma floor.
#[must_use]
pub fn nearest_named(c: Hsv) -> NamedColor {
    let mut best = NamedColor::Red;
    let mut best_dist = f32::MAX;
    for (color, hue) in HUE_CENTERS {
        let d = hue_distance(c.h, hue);
        if d < best_dist {
            best = color;
            best_dist = d;
        }
    }

    // Dark, moderately saturated orange-ish hues read as brown. Dark pure reds stay red.
    let warm = (BROWN_HUE - BROWN_HUES.0..=BROWN_HUE + BROWN_HUES.1).contains(&c.h);
    if warm && c.v < 0.62 && c.s < 0.85 {
        return NamedColor::Brown;
    }
    best
}

/// Palette bin of a pixel, `None` for gray, black, white and background.
#[must_use]
pub fn classify(c: Hsv, floor: &ChromaFloor) -> Option<NamedColor> {
    floor.is_chromatic(c).then(|| nearest_named(c))
}
