//! Home Assistant REST API client.

use std::collections::HashMap;
use std::time::Duration;

use chrono::{DateTime, SecondsFormat, Utc};
use serde::Deserialize;

use crate::error::Error;
use crate::sensor::{EntityState, HistoryPoint};

/// Request timeout for Home Assistant calls.
pub const DEFAULT_TIMEOUT_SECS: u64 = 10;

/// History entry as returned with `minimal_response`: only the first entry
/// of each entity carries the entity id.
#[derive(Debug, Deserialize)]
struct RawHistoryEntry {
    #[serde(default)]
    entity_id: Option<String>,
    state: String,
    #[serde(default)]
    last_changed: Option<DateTime<Utc>>,
}

/// Client for the Home Assistant REST API.
///
/// # Example
///
/// ```rust,no_run
/// use homedash::hass::HassClient;
///
/// # async fn example() -> Result<(), homedash::Error> {
/// let client = HassClient::new("http://homeassistant.local:8123", "long-lived-token");
///
/// for state in client.states().await? {
///     println!("{} = {}", state.entity_id, state.state);
/// }
/// # Ok(())
/// # }
/// ```
#[derive(Debug, Clone)]
pub struct HassClient {
    http: reqwest::Client,
    base_url: String,
    token: String,
}

impl HassClient {
    /// Create a client for the instance at `base_url` using a long-lived access token.
    pub fn new(base_url: impl Into<String>, token: impl Into<String>) -> Self {
        let http = reqwest::Client::builder()
            .timeout(Duration::from_secs(DEFAULT_TIMEOUT_SECS))
            .build()
            .unwrap_or_else(|_| reqwest::Client::new());

        Self {
            http,
            base_url: base_url.into().trim_end_matches('/').to_string(),
            token: token.into(),
        }
    }

    /// Set a custom HTTP client.
    #[must_use]
    pub fn with_http_client(mut self, http: reqwest::Client) -> Self {
        self.http = http;
        self
    }

    /// Base URL without trailing slash.
    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    /// Fetch the current state of every entity.
    ///
    /// # Errors
    ///
    /// - [`Error::Request`] if the request fails
    /// - [`Error::Unauthorized`] if the token is rejected
    /// - [`Error::Api`] on any other error status
    pub async fn states(&self) -> Result<Vec<EntityState>, Error> {
        let url = format!("{}/api/states", self.base_url);
        let states: Vec<EntityState> = self.get_json(&url).await?;

        tracing::debug!("Fetched {} entity states", states.len());
        Ok(states)
    }

    /// Fetch the state history of `entity_ids` between `start` and `end`.
    ///
    /// Entities without recorded history are absent from the result.
    pub async fn history(
        &self,
        entity_ids: &[&str],
        start: DateTime<Utc>,
        end: DateTime<Utc>,
    ) -> Result<HashMap<String, Vec<HistoryPoint>>, Error> {
        if entity_ids.is_empty() {
            return Ok(HashMap::new());
        }

        let url = self.history_url(entity_ids, start, end);
        let raw: Vec<Vec<RawHistoryEntry>> = self.get_json(&url).await?;
        let history = group_history(raw);

        tracing::debug!(
            "Fetched history for {} of {} entities",
            history.len(),
            entity_ids.len()
        );
        Ok(history)
    }

    fn history_url(
        &self,
        entity_ids: &[&str],
        start: DateTime<Utc>,
        end: DateTime<Utc>,
    ) -> String {
        let start = start.to_rfc3339_opts(SecondsFormat::Secs, false);
        let start: String = form_urlencoded::byte_serialize(start.as_bytes()).collect();

        let query = form_urlencoded::Serializer::new(String::new())
            .append_pair("filter_entity_id", &entity_ids.join(","))
            .append_pair("end_time", &end.to_rfc3339_opts(SecondsFormat::Secs, false))
            .finish();

        format!(
            "{}/api/history/period/{}?{}&minimal_response&no_attributes",
            self.base_url, start, query
        )
    }

    async fn get_json<T: serde::de::DeserializeOwned>(&self, url: &str) -> Result<T, Error> {
        let response = self
            .http
            .get(url)
            .bearer_auth(&self.token)
            .header("Content-Type", "application/json")
            .send()
            .await?;

        if response.status() == reqwest::StatusCode::UNAUTHORIZED {
            return Err(Error::Unauthorized);
        }

        if !response.status().is_success() {
            let status = response.status().as_u16();
            let body = response.text().await.unwrap_or_default();
            return Err(Error::Api { status, body });
        }

        Ok(response.json().await?)
    }
}

/// Key each entity's history by the id carried on its first entry.
fn group_history(raw: Vec<Vec<RawHistoryEntry>>) -> HashMap<String, Vec<HistoryPoint>> {
    raw.into_iter()
        .filter_map(|entries| {
            let entity_id = entries.first()?.entity_id.clone()?;
            let points = entries
                .into_iter()
                .map(|e| HistoryPoint {
                    state: e.state,
                    last_changed: e.last_changed,
                })
                .collect();
            Some((entity_id, points))
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::extract::Path;
    use axum::http::{HeaderMap, StatusCode};
    use axum::routing::get;
    use axum::{Json, Router};
    use chrono::TimeZone;
    use serde_json::{json, Value};

    async fn mock_states(headers: HeaderMap) -> Result<Json<Value>, StatusCode> {
        match headers.get("Authorization").and_then(|v| v.to_str().ok()) {
            Some("Bearer secret") => Ok(Json(json!([
                {"entity_id": "sensor.temperatur_bad_temperature", "state": "22.0", "attributes": {}},
                {"entity_id": "weather.forecast_home", "state": "rainy", "attributes": {"temperature": 11.0}}
            ]))),
            _ => Err(StatusCode::UNAUTHORIZED),
        }
    }

    async fn mock_history(Path(start): Path<String>) -> Json<Value> {
        assert!(start.starts_with("2026-10-13T"));
        Json(json!([
            [
                {"entity_id": "sensor.temperatur_bad_temperature", "state": "21.0", "last_changed": "2026-10-13T10:00:00+00:00"},
                {"state": "23.5", "last_changed": "2026-10-13T14:00:00+00:00"}
            ]
        ]))
    }

    async fn spawn_mock() -> String {
        let app = Router::new()
            .route("/api/states", get(mock_states))
            .route("/api/history/period/{start}", get(mock_history))
            .route(
                "/broken/api/states",
                get(|| async { (StatusCode::BAD_GATEWAY, "upstream down") }),
            );
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move { axum::serve(listener, app).await.unwrap() });
        format!("http://{}", addr)
    }

    #[test]
    fn test_base_url_trimmed() {
        let client = HassClient::new("http://ha.local:8123/", "token");
        assert_eq!(client.base_url(), "http://ha.local:8123");
    }

    #[test]
    fn test_history_url() {
        let client = HassClient::new("http://ha.local:8123", "token");
        let start = Utc.with_ymd_and_hms(2026, 10, 13, 8, 0, 0).unwrap();
        let end = Utc.with_ymd_and_hms(2026, 10, 14, 8, 0, 0).unwrap();
        let url = client.history_url(&["sensor.a", "sensor.b"], start, end);

        assert!(url.starts_with(
            "http://ha.local:8123/api/history/period/2026-10-13T08%3A00%3A00%2B00%3A00?"
        ));
        assert!(url.contains("filter_entity_id=sensor.a%2Csensor.b"));
        assert!(url.contains("end_time=2026-10-14T08%3A00%3A00%2B00%3A00"));
        assert!(url.ends_with("&minimal_response&no_attributes"));
    }

    #[test]
    fn test_group_history() {
        let raw: Vec<Vec<RawHistoryEntry>> = serde_json::from_value(json!([
            [
                {"entity_id": "sensor.a", "state": "1"},
                {"state": "2"}
            ],
            [],
            [
                {"state": "orphan"}
            ]
        ]))
        .unwrap();

        let history = group_history(raw);
        assert_eq!(history.len(), 1);
        let states: Vec<&str> = history["sensor.a"].iter().map(|p| p.state.as_str()).collect();
        assert_eq!(states, vec!["1", "2"]);
    }

    #[tokio::test]
    async fn test_states_against_mock() {
        let base = spawn_mock().await;
        let states = HassClient::new(&base, "secret").states().await.unwrap();

        assert_eq!(states.len(), 2);
        assert_eq!(states[1].entity_id, "weather.forecast_home");
    }

    #[tokio::test]
    async fn test_unauthorized() {
        let base = spawn_mock().await;
        let err = HassClient::new(&base, "wrong").states().await.unwrap_err();
        assert!(matches!(err, Error::Unauthorized));
    }

    #[tokio::test]
    async fn test_api_error_status() {
        let base = spawn_mock().await;
        let err = HassClient::new(format!("{}/broken", base), "secret")
            .states()
            .await
            .unwrap_err();

        match err {
            Error::Api { status, body } => {
                assert_eq!(status, 502);
                assert_eq!(body, "upstream down");
            }
            other => panic!("unexpected error {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_history_against_mock() {
        let base = spawn_mock().await;
        let end = Utc.with_ymd_and_hms(2026, 10, 14, 8, 0, 0).unwrap();
        let start = end - chrono::Duration::hours(24);

        let history = HassClient::new(&base, "secret")
            .history(&["sensor.temperatur_bad_temperature"], start, end)
            .await
            .unwrap();

        let points = &history["sensor.temperatur_bad_temperature"];
        assert_eq!(points.len(), 2);
        assert_eq!(points[1].state, "23.5");
    }

    #[tokio::test]
    async fn test_history_without_entities() {
        let client = HassClient::new("http://127.0.0.1:9", "secret");
        let now = Utc::now();
        assert!(client.history(&[], now, now).await.unwrap().is_empty());
    }
}
