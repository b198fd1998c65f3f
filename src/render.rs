//! Headless Chrome capture backend.
//!
//! Renders dashboard HTML to a screenshot and decodes it into an RGBA
//! raster for the [`Pipeline`](crate::pipeline::Pipeline).
//!
//! # Requirements
//!
//! - Google Chrome or Chromium must be installed
//!
//! # Lifecycle
//!
//! Launch the backend once at startup, share it through the pipeline, and
//! release it after the server has stopped:
//!
//! ```rust,ignore
//! use homedash::render::{ChromeBackend, RenderConfig};
//!
//! let backend = ChromeBackend::launch(RenderConfig::default()).await?;
//! // ... serve requests ...
//! backend.shutdown().await?;
//! ```

use std::future::Future;
use std::io;
use std::path::{Path, PathBuf};

use image::{ImageFormat, RgbaImage};
use tokio::process::Command;
use tokio::sync::Mutex;

use crate::error::Error;
use crate::pipeline::Capture;

/// Extra window height so Chrome never draws a scrollbar into the canvas.
const SCROLLBAR_MARGIN: u32 = 100;

const HTML_FILE: &str = "render.html";
const SCREENSHOT_FILE: &str = "screenshot.png";
const CHROME_DATA_DIR: &str = "chrome-data";

/// Configuration for the Chrome backend.
#[derive(Debug, Clone)]
pub struct RenderConfig {
    /// Path to Chrome executable (default: `$CHROME_PATH` or "google-chrome")
    pub chrome_path: String,

    /// Directory for temporary files (default: "/tmp/homedash")
    pub temp_dir: PathBuf,

    /// Virtual time Chrome waits for fonts and stylesheets, in ms (default: 5000)
    pub virtual_time_budget_ms: u32,
}

impl Default for RenderConfig {
    fn default() -> Self {
        Self {
            chrome_path: std::env::var("CHROME_PATH")
                .unwrap_or_else(|_| "google-chrome".to_string()),
            temp_dir: PathBuf::from("/tmp/homedash"),
            virtual_time_budget_ms: 5000,
        }
    }
}

impl RenderConfig {
    /// Create config with custom Chrome path.
    pub fn with_chrome_path(mut self, path: impl Into<String>) -> Self {
        self.chrome_path = path.into();
        self
    }

    /// Create config with custom temp directory.
    pub fn with_temp_dir(mut self, path: impl Into<PathBuf>) -> Self {
        self.temp_dir = path.into();
        self
    }

    /// Set how long Chrome may wait for page resources.
    pub fn with_virtual_time_budget(mut self, millis: u32) -> Self {
        self.virtual_time_budget_ms = millis;
        self
    }
}

/// Chrome headless screenshot backend.
///
/// Captures share one set of temp files, so they run one at a time.
#[derive(Debug)]
pub struct ChromeBackend {
    config: RenderConfig,
    version: String,
    owns_temp_dir: bool,
    lock: Mutex<()>,
}

impl ChromeBackend {
    /// Prepare the temp directory and check that Chrome can be started.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Io`] if the temp directory cannot be created and
    /// [`Error::Chrome`] if the browser does not run.
    pub async fn launch(config: RenderConfig) -> Result<Self, Error> {
        let owns_temp_dir = !tokio::fs::try_exists(&config.temp_dir)
            .await
            .unwrap_or(false);
        tokio::fs::create_dir_all(config.temp_dir.join(CHROME_DATA_DIR))
            .await
            .map_err(|e| Error::Io(format!("Failed to create temp dir: {}", e)))?;

        let version = match chrome_version(&config.chrome_path).await {
            Ok(version) => version,
            Err(e) => {
                if let Err(cleanup) = remove_temp_files(&config.temp_dir, owns_temp_dir).await {
                    tracing::warn!("Failed to clean up temp files: {}", cleanup);
                }
                return Err(e);
            }
        };
        tracing::info!("Capture backend ready: {}", version);

        Ok(Self {
            config,
            version,
            owns_temp_dir,
            lock: Mutex::new(()),
        })
    }

    /// Browser version reported at launch.
    pub fn version(&self) -> &str {
        &self.version
    }

    /// Backend configuration.
    pub fn config(&self) -> &RenderConfig {
        &self.config
    }

    /// Release the backend and remove the files it created.
    ///
    /// Anything else in the temp directory is left alone. The directory
    /// itself is removed only if `launch` created it.
    pub async fn shutdown(self) -> Result<(), Error> {
        remove_temp_files(&self.config.temp_dir, self.owns_temp_dir)
            .await
            .map_err(|e| Error::Io(format!("Failed to remove temp files: {}", e)))?;
        tracing::info!("Capture backend released");
        Ok(())
    }

    async fn screenshot(&self, html: &str, width: u32, height: u32) -> Result<RgbaImage, Error> {
        let _guard = self.lock.lock().await;

        let html_path = self.config.temp_dir.join(HTML_FILE);
        let screenshot_path = self.config.temp_dir.join(SCREENSHOT_FILE);
        let chrome_data_dir = self.config.temp_dir.join(CHROME_DATA_DIR);

        tokio::fs::write(&html_path, html)
            .await
            .map_err(|e| Error::Io(format!("Failed to write HTML: {}", e)))?;

        // A leftover screenshot would hide a failed run
        ignore_missing(tokio::fs::remove_file(&screenshot_path).await)
            .map_err(|e| Error::Io(format!("Failed to remove old screenshot: {}", e)))?;

        let html_url = format!("file://{}", html_path.display());

        let output = Command::new(&self.config.chrome_path)
            .arg("--headless=new")
            .arg("--no-sandbox")
            .arg("--disable-gpu")
            .arg("--disable-dev-shm-usage")
            .arg("--disable-software-rasterizer")
            .arg("--no-first-run")
            .arg("--disable-extensions")
            .arg("--disable-background-networking")
            .arg("--force-device-scale-factor=1")
            .arg("--hide-scrollbars")
            .arg("--default-background-color=ffffffff")
            .arg(format!(
                "--virtual-time-budget={}",
                self.config.virtual_time_budget_ms
            ))
            .arg(format!("--user-data-dir={}", chrome_data_dir.display()))
            .arg(format!("--window-size={},{}", width, height + SCROLLBAR_MARGIN))
            .arg(format!("--screenshot={}", screenshot_path.display()))
            .arg(&html_url)
            .output()
            .await
            .map_err(|e| Error::Chrome(format!("Failed to run Chrome: {}", e)))?;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            tracing::warn!("Chrome stderr: {}", stderr);
        }

        if !tokio::fs::try_exists(&screenshot_path)
            .await
            .unwrap_or(false)
        {
            return Err(Error::Chrome(
                "Chrome did not create screenshot".to_string(),
            ));
        }

        let png = tokio::fs::read(&screenshot_path)
            .await
            .map_err(|e| Error::Io(format!("Failed to read screenshot: {}", e)))?;
        tracing::debug!("Chrome screenshot: {} bytes", png.len());

        decode_screenshot(&png, width, height)
    }
}

impl Capture for ChromeBackend {
    fn capture(
        &self,
        html: &str,
        width: u32,
        height: u32,
    ) -> impl Future<Output = Result<RgbaImage, Error>> + Send {
        self.screenshot(html, width, height)
    }
}

async fn chrome_version(chrome_path: &str) -> Result<String, Error> {
    let output = Command::new(chrome_path)
        .arg("--version")
        .output()
        .await
        .map_err(|e| Error::Chrome(format!("Failed to run {}: {}", chrome_path, e)))?;
    if !output.status.success() {
        return Err(Error::Chrome(format!(
            "{} --version exited with {}",
            chrome_path, output.status
        )));
    }
    Ok(String::from_utf8_lossy(&output.stdout).trim().to_string())
}

/// Remove the page, the screenshot and the Chrome profile from `temp_dir`.
async fn remove_temp_files(temp_dir: &Path, remove_dir: bool) -> io::Result<()> {
    for file in [HTML_FILE, SCREENSHOT_FILE] {
        ignore_missing(tokio::fs::remove_file(temp_dir.join(file)).await)?;
    }
    ignore_missing(tokio::fs::remove_dir_all(temp_dir.join(CHROME_DATA_DIR)).await)?;

    if remove_dir {
        // Fails if someone else put files there; those stay
        if let Err(e) = tokio::fs::remove_dir(temp_dir).await {
            tracing::debug!("Keeping temp dir {}: {}", temp_dir.display(), e);
        }
    }
    Ok(())
}

fn ignore_missing(result: io::Result<()>) -> io::Result<()> {
    match result {
        Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(()),
        other => other,
    }
}

/// Decode a PNG screenshot and crop it to `width` x `height` from the top left.
///
/// # Errors
///
/// Returns [`Error::Image`] for undecodable data and [`Error::Chrome`] if
/// the screenshot is smaller than the canvas.
pub fn decode_screenshot(png: &[u8], width: u32, height: u32) -> Result<RgbaImage, Error> {
    let full = image::load_from_memory_with_format(png, ImageFormat::Png)?.to_rgba8();
    let (full_width, full_height) = full.dimensions();

    if full_width < width || full_height < height {
        return Err(Error::Chrome(format!(
            "screenshot is {}x{}, canvas needs {}x{}",
            full_width, full_height, width, height
        )));
    }

    Ok(image::imageops::crop_imm(&full, 0, 0, width, height).to_image())
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::Rgba;
    use std::io::Cursor;

    fn png_of(img: &RgbaImage) -> Vec<u8> {
        let mut png = Vec::new();
        img.write_to(&mut Cursor::new(&mut png), ImageFormat::Png)
            .unwrap();
        png
    }

    #[test]
    fn test_render_config_defaults() {
        let config = RenderConfig::default();
        assert_eq!(config.temp_dir, PathBuf::from("/tmp/homedash"));
        assert_eq!(config.virtual_time_budget_ms, 5000);
    }

    #[test]
    fn test_config_builder() {
        let config = RenderConfig::default()
            .with_chrome_path("/usr/bin/chromium")
            .with_temp_dir("/var/tmp/homedash")
            .with_virtual_time_budget(1000);

        assert_eq!(config.chrome_path, "/usr/bin/chromium");
        assert_eq!(config.temp_dir, PathBuf::from("/var/tmp/homedash"));
        assert_eq!(config.virtual_time_budget_ms, 1000);
    }

    #[test]
    fn test_decode_screenshot_crops_margin() {
        let img = RgbaImage::from_fn(4, 6, |_, y| {
            if y < 3 {
                Rgba([255, 255, 255, 255])
            } else {
                Rgba([0, 0, 0, 255])
            }
        });
        let raster = decode_screenshot(&png_of(&img), 4, 3).unwrap();

        assert_eq!(raster.dimensions(), (4, 3));
        assert!(raster.pixels().all(|p| p.0 == [255, 255, 255, 255]));
    }

    #[test]
    fn test_decode_screenshot_too_small() {
        let img = RgbaImage::new(4, 2);
        let err = decode_screenshot(&png_of(&img), 4, 3).unwrap_err();
        assert!(matches!(err, Error::Chrome(_)));
    }

    #[test]
    fn test_decode_garbage() {
        let err = decode_screenshot(b"not a png", 1, 1).unwrap_err();
        assert!(matches!(err, Error::Image(_)));
    }

    fn scratch_dir(name: &str) -> PathBuf {
        let dir = std::env::temp_dir().join(format!("homedash-{}-{}", name, std::process::id()));
        let _ = std::fs::remove_dir_all(&dir);
        dir
    }

    #[tokio::test]
    async fn test_launch_without_chrome() {
        let dir = scratch_dir("launch");
        let config = RenderConfig::default()
            .with_chrome_path("/nonexistent/chrome-for-homedash")
            .with_temp_dir(&dir);

        let err = ChromeBackend::launch(config).await.unwrap_err();
        assert!(matches!(err, Error::Chrome(_)));

        // The directory launch created is gone again
        assert!(!dir.exists());
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_shutdown_keeps_foreign_files() {
        let dir = scratch_dir("shared-tmp");
        std::fs::create_dir_all(&dir).unwrap();
        std::fs::write(dir.join("unrelated.txt"), "keep me").unwrap();

        let config = RenderConfig::default()
            .with_chrome_path("/bin/echo")
            .with_temp_dir(&dir);
        let backend = ChromeBackend::launch(config).await.unwrap();
        assert!(dir.join(CHROME_DATA_DIR).is_dir());

        backend.shutdown().await.unwrap();

        assert!(dir.join("unrelated.txt").exists());
        assert!(!dir.join(CHROME_DATA_DIR).exists());
        let _ = std::fs::remove_dir_all(&dir);
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_shutdown_removes_own_dir() {
        let dir = scratch_dir("own-tmp");

        let config = RenderConfig::default()
            .with_chrome_path("/bin/echo")
            .with_temp_dir(&dir);
        let backend = ChromeBackend::launch(config).await.unwrap();
        backend.shutdown().await.unwrap();

        assert!(!dir.exists());
    }

    /// Shell script standing in for Chrome: copies `fixture` to the
    /// `--screenshot=` path while the fixture exists.
    #[cfg(unix)]
    fn fake_chrome(dir: &Path, fixture: &Path) -> PathBuf {
        use std::os::unix::fs::PermissionsExt;

        let script = dir.join("fake-chrome.sh");
        let body = format!(
            r#"#!/bin/sh
for arg in "$@"; do
    case "$arg" in
        --version) echo "Fake Chrome 1.0"; exit 0 ;;
        --screenshot=*) [ -f "{fixture}" ] && cp "{fixture}" "${{arg#--screenshot=}}" ;;
    esac
done
exit 0
"#,
            fixture = fixture.display()
        );
        std::fs::write(&script, body).unwrap();
        std::fs::set_permissions(&script, std::fs::Permissions::from_mode(0o755)).unwrap();
        script
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_capture_with_fake_chrome() {
        let base = scratch_dir("fake-chrome");
        std::fs::create_dir_all(&base).unwrap();

        // Taller than the canvas, like a real screenshot with the margin
        let frame = RgbaImage::from_fn(4, 3 + SCROLLBAR_MARGIN, |_, y| {
            if y < 3 {
                Rgba([255, 255, 255, 255])
            } else {
                Rgba([0, 0, 0, 255])
            }
        });
        let fixture = base.join("frame.png");
        std::fs::write(&fixture, png_of(&frame)).unwrap();
        let chrome = fake_chrome(&base, &fixture);

        let temp_dir = base.join("tmp");
        let config = RenderConfig::default()
            .with_chrome_path(chrome.display().to_string())
            .with_temp_dir(&temp_dir);
        let backend = ChromeBackend::launch(config).await.unwrap();
        assert_eq!(backend.version(), "Fake Chrome 1.0");

        let (first, second) = tokio::join!(
            backend.capture("<p>one</p>", 4, 3),
            backend.capture("<p>two</p>", 4, 3)
        );
        for raster in [first.unwrap(), second.unwrap()] {
            assert_eq!(raster.dimensions(), (4, 3));
            assert!(raster.pixels().all(|p| p.0 == [255, 255, 255, 255]));
        }
        let page = std::fs::read_to_string(temp_dir.join(HTML_FILE)).unwrap();
        assert!(page == "<p>one</p>" || page == "<p>two</p>");

        // Without a fresh screenshot the previous one must not be reused
        std::fs::remove_file(&fixture).unwrap();
        let err = backend.capture("<p>three</p>", 4, 3).await.unwrap_err();
        assert!(matches!(err, Error::Chrome(_)));

        backend.shutdown().await.unwrap();
        assert!(!temp_dir.exists());
        assert!(chrome.exists());

        let _ = std::fs::remove_dir_all(&base);
    }
}
