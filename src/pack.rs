//! Binary layouts for 1-bit bitmaps.
//!
//! Two layouts are produced from the same [`Bitmap`]:
//!
//! | Layout | Header | Row padding | Bit set for |
//! |--------|--------|-------------|-------------|
//! | raw bit field | none | none, rows continue mid-byte | white |
//! | PBM (P4) | `P4\n{w} {h}\n` | each row starts on a byte | black |
//!
//! Both are MSB-first: the leftmost pixel of a byte group is bit 7.
//! The polarity differs between the two. Consumers must pick the one that
//! matches their panel.

use std::io::Cursor;

use image::{GrayImage, ImageFormat, Luma};
use tracing::debug;

use crate::error::Error;
use crate::threshold::Bitmap;

/// Pack a bitmap into a row-major bit field, white = 1.
///
/// The buffer is `ceil(width * height / 8)` bytes. Pixel `(x, y)` is bit
/// `y * width + x`; rows are not padded, so a row may end mid-byte. Unused
/// trailing bits of the last byte are zero.
///
/// ```
/// use homedash::pack::pack_bits;
/// use homedash::threshold::Bitmap;
/// use image::{Rgba, RgbaImage};
///
/// let img = RgbaImage::from_fn(2, 2, |x, y| {
///     if x == y { Rgba([255, 255, 255, 255]) } else { Rgba([0, 0, 0, 255]) }
/// });
/// let bitmap = Bitmap::from_raster(&img).unwrap();
/// assert_eq!(pack_bits(&bitmap), vec![0b1001_0000]);
/// ```
pub fn pack_bits(bitmap: &Bitmap) -> Vec<u8> {
    let pixels = bitmap.pixels();
    let mut bits = vec![0u8; pixels.len().div_ceil(8)];

    for (index, _) in pixels.iter().enumerate().filter(|(_, white)| **white) {
        bits[index / 8] |= 0x80 >> (index % 8);
    }

    debug!(bytes = bits.len(), "Packed raw bit field");
    bits
}

/// PBM P4 header for the given dimensions.
pub fn pbm_header(width: u32, height: u32) -> String {
    format!("P4\n{} {}\n", width, height)
}

/// Pack a bitmap as a binary PBM (P4) file, black = 1.
///
/// Each row occupies `ceil(width / 8)` bytes and starts on a fresh byte.
/// The payload follows the header's final newline directly.
///
/// ```
/// use homedash::pack::pack_pbm;
/// use homedash::threshold::Bitmap;
/// use image::{Rgba, RgbaImage};
///
/// let img = RgbaImage::from_pixel(3, 1, Rgba([0, 0, 0, 255]));
/// let bitmap = Bitmap::from_raster(&img).unwrap();
/// assert_eq!(pack_pbm(&bitmap), b"P4\n3 1\n\xe0".to_vec());
/// ```
pub fn pack_pbm(bitmap: &Bitmap) -> Vec<u8> {
    let header = pbm_header(bitmap.width(), bitmap.height());
    let bytes_per_row = (bitmap.width() as usize).div_ceil(8);
    let total = header.len() + bytes_per_row * bitmap.height() as usize;

    let mut pbm = Vec::with_capacity(total);
    pbm.extend_from_slice(header.as_bytes());
    pbm.resize(total, 0);

    let payload = &mut pbm[header.len()..];
    for (row, line) in bitmap.rows().zip(payload.chunks_mut(bytes_per_row)) {
        for (x, _) in row.iter().enumerate().filter(|(_, white)| !**white) {
            line[x / 8] |= 0x80 >> (x % 8);
        }
    }

    debug!(
        bytes = pbm.len(),
        header = header.len(),
        bytes_per_row,
        "Packed PBM"
    );
    pbm
}

/// Encode a bitmap as a greyscale PNG with pixels 0 (black) or 255 (white).
///
/// # Errors
///
/// Returns [`Error::Image`] if the PNG encoder fails.
pub fn encode_png(bitmap: &Bitmap) -> Result<Vec<u8>, Error> {
    let grey = GrayImage::from_fn(bitmap.width(), bitmap.height(), |x, y| {
        match bitmap.is_white(x, y) {
            Some(true) => Luma([255]),
            _ => Luma([0]),
        }
    });

    let mut png = Vec::new();
    grey.write_to(&mut Cursor::new(&mut png), ImageFormat::Png)?;

    debug!(bytes = png.len(), "Encoded thresholded PNG");
    Ok(png)
}

/// Dimensions recovered from a binary PBM buffer.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PbmHeader {
    /// Image width in pixels
    pub width: u32,
    /// Image height in pixels
    pub height: u32,
    /// Offset of the first payload byte
    pub header_len: usize,
}

impl PbmHeader {
    /// Parse the header of a P4 buffer and check the payload length.
    ///
    /// Accepts arbitrary whitespace and `#` comments between the header
    /// tokens. Exactly one whitespace byte separates the height from the
    /// payload.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Pbm`] if the magic, dimensions or payload size are
    /// wrong.
    ///
    /// ```
    /// use homedash::pack::PbmHeader;
    ///
    /// let header = PbmHeader::parse(b"P4\n# dashboard\n9 2\n\0\0\0\0").unwrap();
    /// assert_eq!((header.width, header.height), (9, 2));
    /// assert_eq!(header.payload_len(), 4);
    /// ```
    pub fn parse(data: &[u8]) -> Result<Self, Error> {
        let separated = matches!(data.get(2), Some(b) if b.is_ascii_whitespace() || *b == b'#');
        if !data.starts_with(b"P4") || !separated {
            return Err(Error::Pbm("missing P4 magic".to_string()));
        }
        let mut pos = 2;

        let width = parse_dimension(data, &mut pos, "width")?;
        let height = parse_dimension(data, &mut pos, "height")?;

        match data.get(pos) {
            Some(b) if b.is_ascii_whitespace() => pos += 1,
            _ => return Err(Error::Pbm("expected whitespace after height".to_string())),
        }

        let header = Self {
            width,
            height,
            header_len: pos,
        };
        let available = data.len() - pos;
        if available < header.payload_len() {
            return Err(Error::Pbm(format!(
                "payload is {} bytes, expected {}",
                available,
                header.payload_len()
            )));
        }

        Ok(header)
    }

    /// Bytes per padded row.
    pub fn bytes_per_row(&self) -> usize {
        (self.width as usize).div_ceil(8)
    }

    /// Expected payload size in bytes.
    pub fn payload_len(&self) -> usize {
        self.bytes_per_row() * self.height as usize
    }
}

/// Skip whitespace and comments, then read one positive decimal number.
fn parse_dimension(data: &[u8], pos: &mut usize, name: &str) -> Result<u32, Error> {
    loop {
        match data.get(*pos) {
            Some(b) if b.is_ascii_whitespace() => *pos += 1,
            Some(b'#') => {
                while data.get(*pos).is_some_and(|b| *b != b'\n') {
                    *pos += 1;
                }
            }
            _ => break,
        }
    }

    let start = *pos;
    while data.get(*pos).is_some_and(u8::is_ascii_digit) {
        *pos += 1;
    }

    let value = std::str::from_utf8(&data[start..*pos])
        .ok()
        .and_then(|s| s.parse::<u32>().ok())
        .ok_or_else(|| Error::Pbm(format!("invalid {}", name)))?;
    if value == 0 {
        return Err(Error::Pbm(format!("{} must be positive", name)));
    }
    Ok(value)
}
