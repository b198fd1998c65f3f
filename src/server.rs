//! Axum integration: dashboard routes and shared state.
//!
//! | Endpoint | Content type | Body |
//! |----------|--------------|------|
//! | `/` | `text/html` | dashboard page |
//! | `/dashboard.png` | `image/png` | thresholded greyscale PNG |
//! | `/dashboard.bits` | `application/octet-stream` | raw bit field, white = 1 |
//! | `/dashboard.pbm` | `application/octet-stream` | PBM P4, black = 1 |
//! | `/health` | `text/plain` | `ok` |
//! | `/assets/*` | by extension | static files |
//!
//! # Example
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
//! let app = server::router(state, Some("assets".as_ref()));
//! ```

use std::collections::HashMap;
use std::path::Path;
use std::sync::Arc;

use axum::extract::State;
use axum::http::{header, StatusCode};
use axum::response::{Html, IntoResponse, Response};
use axum::routing::get;
use axum::Router;
use chrono::{Duration, Utc};
use chrono_tz::Tz;
use tower_http::services::ServeDir;
use tower_http::trace::TraceLayer;

use crate::config::Layout;
use crate::dashboard::Dashboard;
use crate::error::Error;
use crate::hass::HassClient;
use crate::pipeline::{Capture, OutputFormat, Pipeline};
use crate::template::render_html;

/// State shared by all handlers.
#[derive(Debug)]
pub struct AppState<C> {
    /// Home Assistant client
    pub hass: HassClient,
    /// Capture pipeline owning the backend
    pub pipeline: Pipeline<C>,
    /// Entities to show
    pub layout: Layout,
    /// Timezone for the date line and sun times
    pub timezone: Tz,
    /// URL prefix of the static assets, as seen by the browser
    pub asset_base: String,
}

impl<C: Capture> AppState<C> {
    /// Create the state.
    pub fn new(
        hass: HassClient,
        pipeline: Pipeline<C>,
        layout: Layout,
        timezone: Tz,
        asset_base: impl Into<String>,
    ) -> Self {
        Self {
            hass,
            pipeline,
            layout,
            timezone,
            asset_base: asset_base.into(),
        }
    }

    /// Fetch readings and build the current dashboard.
    ///
    /// Failing to fetch history only drops the min/max values.
    pub async fn dashboard(&self) -> Result<Dashboard, Error> {
        let states = self.hass.states().await?;

        let history = if self.layout.history_hours == 0 {
            HashMap::new()
        } else {
            let end = Utc::now();
            let start = end - Duration::hours(i64::from(self.layout.history_hours));
            match self
                .hass
                .history(&self.layout.history_entity_ids(), start, end)
                .await
            {
                Ok(history) => history,
                Err(e) => {
                    tracing::warn!("History unavailable, showing current values only: {}", e);
                    HashMap::new()
                }
            }
        };

        let now = Utc::now().with_timezone(&self.timezone);
        Ok(Dashboard::build(&self.layout, &states, &history, &now))
    }

    /// Current dashboard as an HTML page.
    pub async fn page(&self) -> Result<String, Error> {
        let dashboard = self.dashboard().await?;
        Ok(render_html(&dashboard, &self.asset_base))
    }

    async fn image(&self, format: OutputFormat) -> Result<Response, Error> {
        let html = self.page().await?;
        let rendered = self.pipeline.render(&html, format).await?;

        Ok((
            [
                (header::CONTENT_TYPE, rendered.content_type()),
                (header::CACHE_CONTROL, "no-cache"),
            ],
            rendered.body,
        )
            .into_response())
    }
}

impl IntoResponse for Error {
    fn into_response(self) -> Response {
        let status = if self.is_upstream() {
            StatusCode::BAD_GATEWAY
        } else {
            StatusCode::INTERNAL_SERVER_ERROR
        };
        tracing::error!("Request failed: {}", self);
        (status, self.to_string()).into_response()
    }
}

/// Build the router. Static assets are served only when `assets_dir` is given.
pub fn router<C>(state: Arc<AppState<C>>, assets_dir: Option<&Path>) -> Router
where
    C: Capture + 'static,
{
    let mut app = Router::new()
        .route("/", get(index::<C>))
        .route("/dashboard.png", get(png::<C>))
        .route("/dashboard.bits", get(bits::<C>))
        .route("/dashboard.pbm", get(pbm::<C>))
        .route("/health", get(|| async { "ok" }));

    if let Some(dir) = assets_dir {
        app = app.nest_service("/assets", ServeDir::new(dir));
    }

    app.layer(TraceLayer::new_for_http()).with_state(state)
}

/// GET / - Dashboard page
async fn index<C: Capture>(State(state): State<Arc<AppState<C>>>) -> Result<Html<String>, Error> {
    Ok(Html(state.page().await?))
}

/// GET /dashboard.png
async fn png<C: Capture>(State(state): State<Arc<AppState<C>>>) -> Result<Response, Error> {
    state.image(OutputFormat::Png).await
}

/// GET /dashboard.bits
async fn bits<C: Capture>(State(state): State<Arc<AppState<C>>>) -> Result<Response, Error> {
    state.image(OutputFormat::Bits).await
}

/// GET /dashboard.pbm
async fn pbm<C: Capture>(State(state): State<Arc<AppState<C>>>) -> Result<Response, Error> {
    state.image(OutputFormat::Pbm).await
}
