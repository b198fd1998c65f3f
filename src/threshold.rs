//! Black/white classification of a rendered raster.
//!
//! Every output format is derived from the same [`Bitmap`], so a page looks
//! identical whichever endpoint the display fetches.

use tracing::debug;

use crate::error::Error;
use crate::raster::Raster;

/// Brightness cutoff. Pixels strictly brighter than this are white.
pub const THRESHOLD: u8 = 128;

/// Classify one RGBA pixel: `true` for white, `false` for black.
///
/// Equivalent to `(r + g + b) / 3 > 128` in exact arithmetic, evaluated on
/// the channel sum so fractional means such as 128.33 still count as white.
///
/// ```
/// use homedash::threshold::is_white;
///
/// assert!(!is_white([128, 128, 128, 255]));
/// assert!(is_white([129, 129, 129, 255]));
/// ```
pub fn is_white([r, g, b, _]: [u8; 4]) -> bool {
    u16::from(r) + u16::from(g) + u16::from(b) > 3 * u16::from(THRESHOLD)
}

/// A 1-bit image: one class per pixel, row-major.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Bitmap {
    width: u32,
    height: u32,
    white: Vec<bool>,
}

impl Bitmap {
    /// Threshold every pixel of `raster`.
    ///
    /// # Errors
    ///
    /// - [`Error::EmptyRaster`] if either dimension is zero
    /// - [`Error::PixelUnavailable`] if the raster cannot return a pixel
    pub fn from_raster<R: Raster + ?Sized>(raster: &R) -> Result<Self, Error> {
        let (width, height) = (raster.width(), raster.height());
        if width == 0 || height == 0 {
            return Err(Error::EmptyRaster { width, height });
        }

        let mut white = Vec::with_capacity(width as usize * height as usize);
        for y in 0..height {
            for x in 0..width {
                let rgba = raster
                    .pixel(x, y)
                    .ok_or(Error::PixelUnavailable { x, y })?;
                white.push(is_white(rgba));
            }
        }

        let bitmap = Self {
            width,
            height,
            white,
        };
        debug!(
            width,
            height,
            white = bitmap.white_count(),
            "Thresholded raster"
        );
        Ok(bitmap)
    }

    /// Width in pixels.
    pub fn width(&self) -> u32 {
        self.width
    }

    /// Height in pixels.
    pub fn height(&self) -> u32 {
        self.height
    }

    /// Class of the pixel at `(x, y)`, `None` outside the bitmap.
    pub fn is_white(&self, x: u32, y: u32) -> Option<bool> {
        if x >= self.width || y >= self.height {
            return None;
        }
        self.white
            .get(y as usize * self.width as usize + x as usize)
            .copied()
    }

    /// All classes in row-major order.
    pub fn pixels(&self) -> &[bool] {
        &self.white
    }

    /// Iterate rows top to bottom.
    pub fn rows(&self) -> impl Iterator<Item = &[bool]> {
        self.white.chunks(self.width as usize)
    }

    /// Number of white pixels.
    pub fn white_count(&self) -> usize {
        self.white.iter().filter(|w| **w).count()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::{Rgba, RgbaImage};

    /// Raster that loses one pixel.
    struct Holey;

    impl Raster for Holey {
        fn width(&self) -> u32 {
            2
        }
        fn height(&self) -> u32 {
            2
        }
        fn pixel(&self, x: u32, y: u32) -> Option<[u8; 4]> {
            if (x, y) == (1, 1) {
                None
            } else {
                Some([255, 255, 255, 255])
            }
        }
    }

    #[test]
    fn test_threshold_boundary() {
        assert!(!is_white([128, 128, 128, 255]));
        assert!(is_white([129, 129, 129, 255]));
        // Mean 128.33 is above the cutoff
        assert!(is_white([129, 128, 128, 255]));
        assert!(!is_white([0, 0, 0, 255]));
        assert!(is_white([255, 255, 255, 255]));
    }

    #[test]
    fn test_alpha_ignored() {
        assert!(is_white([255, 255, 255, 0]));
        assert!(!is_white([0, 0, 0, 0]));
    }

    #[test]
    fn test_no_channel_weighting() {
        // Pure red, green and blue all have mean 85
        assert!(!is_white([255, 0, 0, 255]));
        assert!(!is_white([0, 255, 0, 255]));
        assert!(!is_white([0, 0, 255, 255]));
        // Any two full channels average 170
        assert!(is_white([255, 255, 0, 255]));
    }

    #[test]
    fn test_from_raster() {
        let img = RgbaImage::from_fn(3, 2, |x, y| {
            if (x + y) % 2 == 0 {
                Rgba([255, 255, 255, 255])
            } else {
                Rgba([0, 0, 0, 255])
            }
        });
        let bitmap = Bitmap::from_raster(&img).unwrap();

        assert_eq!(bitmap.width(), 3);
        assert_eq!(bitmap.height(), 2);
        assert_eq!(bitmap.pixels(), &[true, false, true, false, true, false]);
        assert_eq!(bitmap.is_white(1, 1), Some(true));
        assert_eq!(bitmap.is_white(3, 0), None);
        assert_eq!(bitmap.white_count(), 3);
        assert_eq!(bitmap.rows().count(), 2);
    }

    #[test]
    fn test_empty_raster_rejected() {
        let img = RgbaImage::new(0, 5);
        assert!(matches!(
            Bitmap::from_raster(&img),
            Err(Error::EmptyRaster {
                width: 0,
                height: 5
            })
        ));
    }

    #[test]
    fn test_unavailable_pixel_rejected() {
        assert!(matches!(
            Bitmap::from_raster(&Holey),
            Err(Error::PixelUnavailable { x: 1, y: 1 })
        ));
    }

    #[test]
    fn test_single_pixel() {
        let img = RgbaImage::from_pixel(1, 1, Rgba([200, 200, 200, 255]));
        let bitmap = Bitmap::from_raster(&img).unwrap();
        assert_eq!(bitmap.pixels(), &[true]);
    }
}
