//! # homedash
//!
//! A Home Assistant sensor dashboard rendered for 1-bit e-paper displays.
//!
//! The dashboard is an ordinary HTML page. For the display it is captured in
//! headless Chrome, reduced to black and white and packed into one of three
//! binary formats the firmware can consume:
//! - Raw bit field, MSB first, white = 1, no header
//! - Binary PBM (P4), black = 1
//! - Thresholded greyscale PNG, for inspection in a browser
//!
//! ## Quick Start (axum)
//!
//! ```rust,ignore
//! use std::sync::Arc;
//! use homedash::{server, AppState, ChromeBackend, HassClient, Layout, Pipeline, RenderConfig};
//!
//! let backend = ChromeBackend::launch(RenderConfig::default()).await?;
//! let state = Arc::new(AppState::new(
//!     HassClient::new("http://homeassistant.local:8123", token),
//!     Pipeline::new(backend),
//!     Layout::default(),
//!     chrono_tz::Europe::Berlin,
//!     "http://localhost:3000/assets",
//! ));
//!
//! let listener = tokio::net::TcpListener::bind("0.0.0.0:3000").await?;
//! axum::serve(listener, server::router(state, None)).await?;
//! ```
//!
//! ## Packing without a browser
//!
//! The threshold and packing stages work on any [`Raster`]:
//!
//! ```
//! use homedash::{pack_pbm, Bitmap};
//! use image::{Rgba, RgbaImage};
//!
//! let image = RgbaImage::from_pixel(8, 1, Rgba([0, 0, 0, 255]));
//! let bitmap = Bitmap::from_raster(&image).unwrap();
//!
//! assert_eq!(pack_pbm(&bitmap), b"P4\n8 1\n\xff");
//! ```
//!
//! ## Display Dimensions
//!
//! The panel is 480x800 pixels in portrait orientation. Every capture uses
//! exactly that canvas, so a full frame is 48000 bytes of payload.
//!
//! ## Feature Flags
//!
//! - `render` - Capture pipeline and the Chrome headless backend
//! - `hass` - Home Assistant REST client
//! - `axum` - Router and handlers serving the dashboard
//! - `server` - Everything the `homedash` binary needs
//! - `full` - All features (default)

mod error;

pub mod config;
pub mod dashboard;
pub mod pack;
pub mod raster;
pub mod sensor;
pub mod template;
pub mod threshold;

pub use config::{Config, Layout, RoomLayout};
pub use dashboard::Dashboard;
pub use error::Error;
pub use pack::{encode_png, pack_bits, pack_pbm, pbm_header, PbmHeader};
pub use raster::Raster;
pub use threshold::{Bitmap, THRESHOLD};

/// Display width in pixels
pub const DISPLAY_WIDTH: u32 = 480;

/// Display height in pixels
pub const DISPLAY_HEIGHT: u32 = 800;

// Optional modules
#[cfg(feature = "render")]
pub mod pipeline;
#[cfg(feature = "render")]
pub mod render;
#[cfg(feature = "render")]
pub use pipeline::{Capture, OutputFormat, Pipeline, Rendered};
#[cfg(feature = "render")]
pub use render::{ChromeBackend, RenderConfig};

#[cfg(feature = "hass")]
pub mod hass;
#[cfg(feature = "hass")]
pub use hass::HassClient;

#[cfg(feature = "axum")]
pub mod server;
#[cfg(feature = "axum")]
pub use server::AppState;

/// Payload size in bytes of one packed frame of `width` x `height`.
///
/// Rows are padded to whole bytes.
///
/// # Example
///
/// ```
/// use homedash::{frame_bytes, DISPLAY_HEIGHT, DISPLAY_WIDTH};
///
/// assert_eq!(frame_bytes(DISPLAY_WIDTH, DISPLAY_HEIGHT), 48_000);
/// assert_eq!(frame_bytes(10, 2), 4);
/// ```
pub fn frame_bytes(width: u32, height: u32) -> usize {
    (width as usize).div_ceil(8) * height as usize
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_constants() {
        assert_eq!(DISPLAY_WIDTH, 480);
        assert_eq!(DISPLAY_HEIGHT, 800);
        // Whole bytes per row on the real panel
        assert_eq!(DISPLAY_WIDTH % 8, 0);
    }

    #[test]
    fn test_frame_bytes() {
        assert_eq!(frame_bytes(480, 800), 48_000);
        assert_eq!(frame_bytes(1, 1), 1);
        assert_eq!(frame_bytes(9, 3), 6);
        assert_eq!(frame_bytes(0, 10), 0);
    }
}
