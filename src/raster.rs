//! Pixel access for rendered pages.
//!
//! The capture backend produces an RGBA raster; everything downstream only
//! needs its dimensions and a per-pixel color lookup.

use image::RgbaImage;

/// A decoded image with queryable dimensions and RGBA pixels.
pub trait Raster {
    /// Width in pixels.
    fn width(&self) -> u32;

    /// Height in pixels.
    fn height(&self) -> u32;

    /// RGBA color at `(x, y)`, or `None` if the pixel cannot be read.
    fn pixel(&self, x: u32, y: u32) -> Option<[u8; 4]>;
}

impl Raster for RgbaImage {
    fn width(&self) -> u32 {
        self.dimensions().0
    }

    fn height(&self) -> u32 {
        self.dimensions().1
    }

    fn pixel(&self, x: u32, y: u32) -> Option<[u8; 4]> {
        self.get_pixel_checked(x, y).map(|p| p.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::Rgba;

    #[test]
    fn test_rgba_image_raster() {
        let img = RgbaImage::from_fn(3, 2, |x, y| Rgba([x as u8, y as u8, 7, 255]));

        assert_eq!(Raster::width(&img), 3);
        assert_eq!(Raster::height(&img), 2);
        assert_eq!(img.pixel(2, 1), Some([2, 1, 7, 255]));
        assert_eq!(img.pixel(3, 0), None);
        assert_eq!(img.pixel(0, 2), None);
    }
}
