//! Validated 8-bit RGB raster images.

use palette::Srgb;
use thiserror::Error;

/// Reasons an image is rejected before it enters the pipeline.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum RasterError {
    /// Width or height is zero.
    #[error("image has no pixels ({width}x{height})")]
    Empty { width: u32, height: u32 },

    /// The pixel buffer does not match the declared dimensions.
    #[error("expected {expected} pixels for {width}x{height}, got {actual}")]
    DimensionMismatch {
        width: u32,
        height: u32,
        expected: usize,
        actual: usize,
    },
}

/// An immutable grid of RGB pixels in row-major order.
///
/// Construction guarantees `width * height == pixels.len() > 0`.
#[derive(Debug, Clone, PartialEq)]
pub struct RasterImage {
    width: u32,
    height: u32,
    pixels: Vec<Srgb<u8>>,
}

impl RasterImage {
    /// Creates an image from row-major pixels.
    pub fn new(width: u32, height: u32, pixels: Vec<Srgb<u8>>) -> Result<Self, RasterError> {
        if width == 0 || height == 0 {
            return Err(RasterError::Empty { width, height });
        }

        let expected = width as usize * height as usize;
        if pixels.len() != expected {
            return Err(RasterError::DimensionMismatch {
                width,
                height,
                expected,
                actual: pixels.len(),
            });
        }

        Ok(Self {
            width,
            height,
            pixels,
        })
    }

    /// Creates an image from a packed `[r, g, b, r, g, b, ...]` buffer.
    pub fn from_rgb_bytes(width: u32, height: u32, bytes: &[u8]) -> Result<Self, RasterError> {
        let expected = width as usize * height as usize;
        if bytes.len() % 3 != 0 {
            return Err(RasterError::DimensionMismatch {
                width,
                height,
                expected,
                actual: bytes.len() / 3,
            });
        }

        let pixels = bytes
            .chunks_exact(3)
            .map(|px| Srgb::new(px[0], px[1], px[2]))
            .collect();
        Self::new(width, height, pixels)
    }

    /// Creates an image where every pixel has the same color.
    pub fn filled(width: u32, height: u32, color: Srgb<u8>) -> Result<Self, RasterError> {
        Self::new(width, height, vec![color; width as usize * height as usize])
    }

    pub fn width(&self) -> u32 {
        self.width
    }

    pub fn height(&self) -> u32 {
        self.height
    }

    /// Number of pixels, always greater than zero.
    pub fn pixel_count(&self) -> usize {
        self.pixels.len()
    }

    pub fn pixels(&self) -> &[Srgb<u8>] {
        &self.pixels
    }

    /// Returns the pixel at `(x, y)`, or `None` when out of bounds.
    pub fn pixel(&self, x: u32, y: u32) -> Option<Srgb<u8>> {
        if x >= self.width || y >= self.height {
            return None;
        }
        self.pixels
            .get(y as usize * self.width as usize + x as usize)
            .copied()
    }
}

impl TryFrom<image::RgbImage> for RasterImage {
    type Error = RasterError;

    fn try_from(buffer: image::RgbImage) -> Result<Self, Self::Error> {
        let (width, height) = buffer.dimensions();
        Self::from_rgb_bytes(width, height, buffer.as_raw())
    }
}
