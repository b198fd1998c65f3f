//! From rendered HTML to display-ready bytes.
//!
//! ```rust,ignore
//! use homedash::pipeline::{OutputFormat, Pipeline};
//! use homedash::render::{ChromeBackend, RenderConfig};
//!
//! let backend = ChromeBackend::launch(RenderConfig::default()).await?;
//! let pipeline = Pipeline::new(backend);
//!
//! let rendered = pipeline.render(&html, OutputFormat::Pbm).await?;
//! assert_eq!(rendered.content_type(), "application/octet-stream");
//! ```

use std::fmt;
use std::future::Future;
use std::str::FromStr;

use image::RgbaImage;

use crate::error::Error;
use crate::pack::{encode_png, pack_bits, pack_pbm};
use crate::threshold::Bitmap;
use crate::{DISPLAY_HEIGHT, DISPLAY_WIDTH};

/// Something that turns an HTML page into a raster screenshot.
///
/// Implementations own whatever process or connection they need and must
/// be safe to call from concurrent requests.
pub trait Capture: Send + Sync {
    /// Render `html` into a `width` x `height` RGBA raster.
    fn capture(
        &self,
        html: &str,
        width: u32,
        height: u32,
    ) -> impl Future<Output = Result<RgbaImage, Error>> + Send;
}

/// Binary representations the dashboard can be served in.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OutputFormat {
    /// Thresholded greyscale PNG
    Png,
    /// Raw row-major bit field, white = 1, no header
    Bits,
    /// Binary PBM (P4), black = 1
    Pbm,
}

impl OutputFormat {
    /// HTTP content type for the format.
    pub fn content_type(self) -> &'static str {
        match self {
            OutputFormat::Png => "image/png",
            OutputFormat::Bits | OutputFormat::Pbm => "application/octet-stream",
        }
    }

    /// File extension, without the dot.
    pub fn extension(self) -> &'static str {
        match self {
            OutputFormat::Png => "png",
            OutputFormat::Bits => "bits",
            OutputFormat::Pbm => "pbm",
        }
    }
}

impl fmt::Display for OutputFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.extension())
    }
}

impl FromStr for OutputFormat {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "png" => Ok(OutputFormat::Png),
            "bits" => Ok(OutputFormat::Bits),
            "pbm" => Ok(OutputFormat::Pbm),
            other => Err(Error::Config(format!("unknown output format '{}'", other))),
        }
    }
}

/// Encoded dashboard image.
#[derive(Debug, Clone)]
pub struct Rendered {
    /// Format of `body`
    pub format: OutputFormat,
    /// Encoded bytes
    pub body: Vec<u8>,
}

impl Rendered {
    /// HTTP content type of the body.
    pub fn content_type(&self) -> &'static str {
        self.format.content_type()
    }
}

/// Encode a thresholded bitmap in the requested format.
///
/// # Errors
///
/// Only PNG encoding can fail.
pub fn encode(bitmap: &Bitmap, format: OutputFormat) -> Result<Vec<u8>, Error> {
    match format {
        OutputFormat::Png => encode_png(bitmap),
        OutputFormat::Bits => Ok(pack_bits(bitmap)),
        OutputFormat::Pbm => Ok(pack_pbm(bitmap)),
    }
}

/// Capture, threshold and pack, in that order, once per call.
///
/// The pipeline keeps no state between calls apart from the backend it was
/// given.
#[derive(Debug)]
pub struct Pipeline<C> {
    backend: C,
}

impl<C: Capture> Pipeline<C> {
    /// Create a pipeline around a ready capture backend.
    pub fn new(backend: C) -> Self {
        Self { backend }
    }

    /// Borrow the capture backend.
    pub fn backend(&self) -> &C {
        &self.backend
    }

    /// Give the backend back, e.g. to release it on shutdown.
    pub fn into_backend(self) -> C {
        self.backend
    }

    /// Render `html` on the display canvas and encode it as `format`.
    ///
    /// # Errors
    ///
    /// Capture failures are returned as-is; nothing is retried.
    pub async fn render(&self, html: &str, format: OutputFormat) -> Result<Rendered, Error> {
        let raster = self
            .backend
            .capture(html, DISPLAY_WIDTH, DISPLAY_HEIGHT)
            .await?;
        let bitmap = Bitmap::from_raster(&raster)?;
        let body = encode(&bitmap, format)?;

        tracing::info!(
            "Rendered {}x{} dashboard as {} ({} bytes)",
            bitmap.width(),
            bitmap.height(),
            format,
            body.len()
        );
        Ok(Rendered { format, body })
    }
}
