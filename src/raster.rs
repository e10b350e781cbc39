//! Raster images and binary masks.
//!
//! A [`RasterImage`] is decoded once per request and never mutated; every
//! later stage derives new data ([`Mask`]s, traces) from it.

use imgref::ImgVec;
use rgb::{RGB8, RGBA8};

use crate::calibration::PixelBounds;
use crate::color::Hsv;
use crate::error::{Error, Result};

/// Pixels with alpha below this are treated as background.
const ALPHA_THRESHOLD: u8 = 128;

/// Immutable RGBA8 image.
#[derive(Clone)]
pub struct RasterImage {
    pixels: ImgVec<RGBA8>,
}

impl std::fmt::Debug for RasterImage {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RasterImage")
            .field("width", &self.width())
            .field("height", &self.height())
            .finish()
    }
}

impl RasterImage {
    /// Decode PNG, JPEG, BMP or GIF bytes.
    ///
    /// Fails fast with [`Error::ImageDecode`] before any extraction work.
    #[cfg(feature = "decode")]
    pub fn decode(bytes: &[u8]) -> Result<Self> {
        if bytes.is_empty() {
            return Err(Error::ImageDecode("empty image buffer".to_string()));
        }
        let decoded =
            image::load_from_memory(bytes).map_err(|e| Error::ImageDecode(e.to_string()))?;
        let rgba = decoded.to_rgba8();
        let width = rgba.width() as usize;
        let height = rgba.height() as usize;
        Self::from_rgba8(rgba.into_raw(), width, height)
    }

    /// Decoding is unavailable without the `decode` feature.
    #[cfg(not(feature = "decode"))]
    pub fn decode(_bytes: &[u8]) -> Result<Self> {
        Err(Error::ImageDecode(
            "built without the `decode` feature".to_string(),
        ))
    }

    /// Wrap an existing imgref buffer.
    #[must_use]
    pub fn from_img(pixels: ImgVec<RGBA8>) -> Self {
        Self { pixels }
    }

    /// Build from packed RGB8 bytes in row-major order.
    pub fn from_rgb8(data: &[u8], width: usize, height: usize) -> Result<Self> {
        let expected = width * height * 3;
        if data.len() != expected {
            return Err(Error::DimensionMismatch {
                expected,
                actual: data.len(),
            });
        }
        let buf = data
            .chunks_exact(3)
            .map(|c| RGBA8::new(c[0], c[1], c[2], 255))
            .collect();
        Ok(Self {
            pixels: ImgVec::new(buf, width, height),
        })
    }

    /// Build from packed RGBA8 bytes in row-major order.
    pub fn from_rgba8(data: Vec<u8>, width: usize, height: usize) -> Result<Self> {
        let expected = width * height * 4;
        if data.len() != expected {
            return Err(Error::DimensionMismatch {
                expected,
                actual: data.len(),
            });
        }
        let buf = data
            .chunks_exact(4)
            .map(|c| RGBA8::new(c[0], c[1], c[2], c[3]))
            .collect();
        Ok(Self {
            pixels: ImgVec::new(buf, width, height),
        })
    }

    /// Image width in pixels.
    #[must_use]
    pub fn width(&self) -> usize {
        self.pixels.width()
    }

    /// Image height in pixels.
    #[must_use]
    pub fn height(&self) -> usize {
        self.pixels.height()
    }

    /// Number of pixels.
    #[must_use]
    pub fn area(&self) -> usize {
        self.width() * self.height()
    }

    /// Raw pixel at `(x, y)`.
    #[must_use]
    pub fn pixel(&self, x: usize, y: usize) -> RGBA8 {
        self.pixels.buf()[y * self.pixels.stride() + x]
    }

    /// Pixel colour without alpha; transparent pixels read as white.
    #[must_use]
    pub fn rgb(&self, x: usize, y: usize) -> RGB8 {
        let p = self.pixel(x, y);
        if p.a < ALPHA_THRESHOLD {
            RGB8::new(255, 255, 255)
        } else {
            RGB8::new(p.r, p.g, p.b)
        }
    }

    /// Pixel colour in HSV.
    #[must_use]
    pub fn hsv(&self, x: usize, y: usize) -> Hsv {
        Hsv::from_rgb(self.rgb(x, y))
    }

    /// Bounds covering the whole image.
    #[must_use]
    pub fn full_bounds(&self) -> PixelBounds {
        PixelBounds::full(self.width(), self.height())
    }
}

/// Binary mask of pixels believed to belong to one curve.
#[derive(Debug, Clone)]
pub struct Mask {
    bits: ImgVec<bool>,
}

/// Contiguous run of set pixels along one column or row, inclusive.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Run {
    /// First set index.
    pub start: usize,
    /// Last set index.
    pub end: usize,
}

impl Run {
    /// Number of pixels in the run.
    #[must_use]
    pub fn len(&self) -> usize {
        self.end - self.start + 1
    }

    /// Runs always hold at least one pixel.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        false
    }

    /// Midpoint of the run.
    #[must_use]
    pub fn centroid(&self) -> f64 {
        (self.start + self.end) as f64 / 2.0
    }
}

impl Mask {
    /// Create an empty mask.
    #[must_use]
    pub fn new(width: usize, height: usize) -> Self {
        Self {
            bits: ImgVec::new(vec![false; width * height], width, height),
        }
    }

    /// Mask width.
    #[must_use]
    pub fn width(&self) -> usize {
        self.bits.width()
    }

    /// Mask height.
    #[must_use]
    pub fn height(&self) -> usize {
        self.bits.height()
    }

    /// Whether `(x, y)` is set. Out-of-range coordinates read as unset.
    #[must_use]
    pub fn get(&self, x: usize, y: usize) -> bool {
        x < self.width() && y < self.height() && self.bits.buf()[y * self.bits.stride() + x]
    }

    /// Set or clear `(x, y)`.
    pub fn set(&mut self, x: usize, y: usize, value: bool) {
        let stride = self.bits.stride();
        self.bits.buf_mut()[y * stride + x] = value;
    }

    /// Number of set pixels.
    #[must_use]
    pub fn count(&self) -> usize {
        self.bits.buf().iter().filter(|&&b| b).count()
    }

    /// Tight bounds around all set pixels, `None` when empty.
    #[must_use]
    pub fn bounding_box(&self) -> Option<PixelBounds> {
        let mut bounds: Option<PixelBounds> = None;
        for y in 0..self.height() {
            for x in 0..self.width() {
                if !self.get(x, y) {
                    continue;
                }
                bounds = Some(match bounds {
                    None => PixelBounds::new(x, y, x, y),
                    Some(b) => PixelBounds::new(b.x0.min(x), b.y0.min(y), b.x1.max(x), b.y1.max(y)),
                });
            }
        }
        bounds
    }

    /// Runs of set pixels in column `x`, restricted to rows `y0..=y1`.
    #[must_use]
    pub fn column_runs(&self, x: usize, y0: usize, y1: usize) -> Vec<Run> {
        collect_runs(y0, y1, |y| self.get(x, y))
    }

    /// Runs of set pixels in row `y`, restricted to columns `x0..=x1`.
    #[must_use]
    pub fn row_runs(&self, y: usize, x0: usize, x1: usize) -> Vec<Run> {
        collect_runs(x0, x1, |x| self.get(x, y))
    }
}

fn collect_runs(from: usize, to: usize, is_set: impl Fn(usize) -> bool) -> Vec<Run> {
    let mut runs = Vec::new();
    let mut start: Option<usize> = None;
    for i in from..=to {
        match (is_set(i), start) {
            (true, None) => start = Some(i),
            (false, Some(s)) => {
                runs.push(Run { start: s, end: i - 1 });
                start = None;
            }
            _ => {}
        }
    }
    if let Some(s) = start {
        runs.push(Run { start: s, end: to });
    }
    runs
}
