//! Error types for homedash.

use thiserror::Error;

/// Errors produced while fetching readings or rendering the dashboard.
#[derive(Debug, Error)]
pub enum Error {
    /// Raster has a zero dimension
    #[error("Raster must be at least 1x1, got {width}x{height}")]
    EmptyRaster {
        /// Raster width
        width: u32,
        /// Raster height
        height: u32,
    },

    /// Raster reported a pixel inside its bounds that it could not return
    #[error("Pixel ({x}, {y}) is not accessible")]
    PixelUnavailable {
        /// Column
        x: u32,
        /// Row
        y: u32,
    },

    /// PBM buffer could not be parsed
    #[error("Malformed PBM: {0}")]
    Pbm(String),

    /// Image decoding or encoding failed
    #[error("Image error: {0}")]
    Image(String),

    /// Chrome is missing, failed, or produced no usable screenshot
    #[error("Chrome capture failed: {0}")]
    Chrome(String),

    /// File I/O failed
    #[error("I/O error: {0}")]
    Io(String),

    /// HTTP request failed (network error, timeout, etc.)
    #[error("HTTP request failed: {0}")]
    Request(String),

    /// Home Assistant rejected the access token
    #[error("Home Assistant rejected the access token")]
    Unauthorized,

    /// Home Assistant returned an error status code
    #[error("API returned error status {status}: {body}")]
    Api {
        /// HTTP status code
        status: u16,
        /// Response body
        body: String,
    },

    /// Missing or invalid configuration
    #[error("Configuration error: {0}")]
    Config(String),

    /// JSON serialization error
    #[error("JSON serialization error: {0}")]
    Serialization(String),
}

impl Error {
    /// Whether the error came from talking to Home Assistant.
    pub fn is_upstream(&self) -> bool {
        matches!(
            self,
            Error::Request(_) | Error::Unauthorized | Error::Api { .. }
        )
    }
}

impl From<serde_json::Error> for Error {
    fn from(err: serde_json::Error) -> Self {
        Error::Serialization(err.to_string())
    }
}

impl From<image::ImageError> for Error {
    fn from(err: image::ImageError) -> Self {
        Error::Image(err.to_string())
    }
}

#[cfg(feature = "hass")]
impl From<reqwest::Error> for Error {
    fn from(err: reqwest::Error) -> Self {
        Error::Request(err.to_string())
    }
}
