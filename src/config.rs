//! Runtime configuration: environment settings and the dashboard layout.
//!
//! # Environment
//!
//! | Variable | Default | Purpose |
//! |----------|---------|---------|
//! | `HA_URL` | required | Home Assistant base URL |
//! | `HA_TOKEN` | required | Long-lived access token |
//! | `PORT` | `3000` | HTTP listen port |
//! | `CHROME_PATH` | `google-chrome` | Browser executable |
//! | `DASHBOARD_LAYOUT` | built-in | Path to a layout YAML file |
//! | `TIMEZONE` | `Europe/Berlin` | Timezone for dates and sun times |
//! | `PUBLIC_URL` | `http://localhost:{PORT}` | Base URL the browser loads assets from |
//! | `ASSETS_DIR` | `assets` | Directory served under `/assets` |
//!
//! # Layout (YAML)
//!
//! ```yaml
//! weather_entity: weather.forecast_home
//! sun_entity: sun.sun
//! history_hours: 24
//! rooms:
//!   - name: Wohnzimmer
//!     temperature: sensor.temperatur_wohnzimmer_temperature
//!     humidity: sensor.temperatur_wohnzimmer_humidity
//!   - temperature: sensor.temperatur_bad_temperature
//!     humidity: sensor.temperatur_bad_humidity
//!     battery: sensor.temperatur_bad_battery
//! ```

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use chrono_tz::Tz;
use serde::Deserialize;

use crate::Error;

/// Sensors shown by the built-in layout.
pub const DEFAULT_ENTITIES: [&str; 6] = [
    "sensor.temperatur_wohnzimmer_temperature",
    "sensor.temperatur_wohnzimmer_humidity",
    "sensor.temperatur_bad_temperature",
    "sensor.temperatur_bad_humidity",
    "sensor.temperatur_balkon_temperature",
    "sensor.temperatur_balkon_humidity",
];

/// Default weather entity.
pub const DEFAULT_WEATHER_ENTITY: &str = "weather.forecast_home";

/// Default sun entity.
pub const DEFAULT_SUN_ENTITY: &str = "sun.sun";

const DEFAULT_PORT: u16 = 3000;
const DEFAULT_TIMEZONE: Tz = chrono_tz::Europe::Berlin;
const DEFAULT_HISTORY_HOURS: u32 = 24;

/// Process settings read from the environment.
#[derive(Debug, Clone)]
pub struct Config {
    /// Home Assistant base URL (`HA_URL`)
    pub hass_url: String,

    /// Long-lived access token (`HA_TOKEN`)
    pub hass_token: String,

    /// Listen port (`PORT`, default: 3000)
    pub port: u16,

    /// Browser binary override (`CHROME_PATH`)
    pub chrome_path: Option<String>,

    /// YAML layout file (`DASHBOARD_LAYOUT`), built-in layout when unset
    pub layout_path: Option<PathBuf>,

    /// Timezone for dates and sun times (`TIMEZONE`, default: Europe/Berlin)
    pub timezone: Tz,

    /// Base URL the browser loads assets from (`PUBLIC_URL`)
    pub public_url: String,

    /// Static files directory (`ASSETS_DIR`, default: "assets")
    pub assets_dir: PathBuf,
}

impl Config {
    /// Read the configuration from environment variables.
    pub fn from_env() -> Result<Self, Error> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Read the configuration through an arbitrary key lookup.
    ///
    /// Empty values count as unset.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, Error>
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());
        let require =
            |key: &str| get(key).ok_or_else(|| Error::Config(format!("{} is not set", key)));

        let port = match get("PORT") {
            Some(v) => v
                .parse()
                .map_err(|_| Error::Config(format!("PORT '{}' is not a port number", v)))?,
            None => DEFAULT_PORT,
        };

        let timezone = match get("TIMEZONE") {
            Some(v) => v
                .parse()
                .map_err(|_| Error::Config(format!("unknown timezone '{}'", v)))?,
            None => DEFAULT_TIMEZONE,
        };

        Ok(Self {
            hass_url: require("HA_URL")?,
            hass_token: require("HA_TOKEN")?,
            port,
            chrome_path: get("CHROME_PATH"),
            layout_path: get("DASHBOARD_LAYOUT").map(PathBuf::from),
            timezone,
            public_url: get("PUBLIC_URL")
                .map(|v| v.trim_end_matches('/').to_string())
                .unwrap_or_else(|| format!("http://localhost:{}", port)),
            assets_dir: get("ASSETS_DIR")
                .map(PathBuf::from)
                .unwrap_or_else(|| PathBuf::from("assets")),
        })
    }

    /// Load the configured layout file, or the built-in layout.
    pub fn layout(&self) -> Result<Layout, Error> {
        match &self.layout_path {
            Some(path) => Layout::load(path),
            None => Ok(Layout::default()),
        }
    }
}

/// Which entities the dashboard shows.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct Layout {
    /// Weather forecast entity for the header icon
    #[serde(default = "default_weather_entity")]
    pub weather_entity: String,

    /// Sun entity for sunrise/sunset, `None` to hide
    #[serde(default = "default_sun_entity")]
    pub sun_entity: Option<String>,

    /// Window for min/max values, 0 disables history
    #[serde(default = "default_history_hours")]
    pub history_hours: u32,

    /// Rooms, in display order
    pub rooms: Vec<RoomLayout>,
}

/// Sensors of a single room.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct RoomLayout {
    /// Display name; derived from the entity id when absent
    #[serde(default)]
    pub name: Option<String>,
    pub temperature: String,
    pub humidity: String,
    #[serde(default)]
    pub battery: Option<String>,
}

fn default_weather_entity() -> String {
    DEFAULT_WEATHER_ENTITY.to_string()
}

fn default_sun_entity() -> Option<String> {
    Some(DEFAULT_SUN_ENTITY.to_string())
}

fn default_history_hours() -> u32 {
    DEFAULT_HISTORY_HOURS
}

impl Default for Layout {
    fn default() -> Self {
        Self::from_entity_ids(DEFAULT_ENTITIES)
    }
}

impl Layout {
    /// Load a layout from a YAML file.
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self, Error> {
        let content = std::fs::read_to_string(path.as_ref()).map_err(|e| {
            Error::Config(format!(
                "Failed to read layout file '{}': {}",
                path.as_ref().display(),
                e
            ))
        })?;
        Self::from_yaml(&content)
    }

    /// Parse a layout from a YAML string.
    pub fn from_yaml(yaml: &str) -> Result<Self, Error> {
        serde_yaml::from_str(yaml).map_err(|e| Error::Config(format!("Invalid layout YAML: {}", e)))
    }

    /// Group `sensor.<prefix>_<room>_<kind>` ids into rooms.
    ///
    /// Rooms appear in order of first mention. Ids without a room segment,
    /// or rooms lacking a temperature or humidity sensor, are skipped.
    ///
    /// ```
    /// use homedash::config::Layout;
    ///
    /// let layout = Layout::from_entity_ids([
    ///     "sensor.temperatur_keller_temperature",
    ///     "sensor.temperatur_keller_humidity",
    /// ]);
    /// assert_eq!(layout.rooms[0].label(), "Keller");
    /// ```
    pub fn from_entity_ids<'a>(ids: impl IntoIterator<Item = &'a str>) -> Self {
        let mut order: Vec<&str> = Vec::new();
        let mut kinds: BTreeMap<&str, BTreeMap<&str, &str>> = BTreeMap::new();

        for id in ids {
            let Some((room, kind)) = room_and_kind(id) else {
                continue;
            };
            if !kinds.contains_key(room) {
                order.push(room);
            }
            kinds.entry(room).or_default().insert(kind, id);
        }

        let rooms = order
            .into_iter()
            .filter_map(|room| {
                let sensors = kinds.get(room)?;
                Some(RoomLayout {
                    name: None,
                    temperature: sensors.get("temperature")?.to_string(),
                    humidity: sensors.get("humidity")?.to_string(),
                    battery: sensors.get("battery").map(|s| s.to_string()),
                })
            })
            .collect();

        Self {
            weather_entity: default_weather_entity(),
            sun_entity: default_sun_entity(),
            history_hours: DEFAULT_HISTORY_HOURS,
            rooms,
        }
    }

    /// Every entity the layout reads.
    pub fn entity_ids(&self) -> Vec<&str> {
        let mut ids = vec![self.weather_entity.as_str()];
        ids.extend(self.sun_entity.as_deref());
        for room in &self.rooms {
            ids.push(&room.temperature);
            ids.push(&room.humidity);
            ids.extend(room.battery.as_deref());
        }
        ids
    }

    /// Entities whose history feeds the min/max display.
    pub fn history_entity_ids(&self) -> Vec<&str> {
        self.rooms.iter().map(|r| r.temperature.as_str()).collect()
    }
}

impl RoomLayout {
    /// Display name: the configured name or the capitalized room segment.
    pub fn label(&self) -> String {
        if let Some(name) = &self.name {
            return name.clone();
        }
        let room = room_and_kind(&self.temperature)
            .map(|(room, _)| room)
            .unwrap_or(&self.temperature);
        capitalize(room)
    }
}

/// Split `sensor.temperatur_bad_temperature` into `("bad", "temperature")`.
fn room_and_kind(entity_id: &str) -> Option<(&str, &str)> {
    let (_, object_id) = entity_id.split_once('.')?;
    let mut parts = object_id.split('_');
    let _prefix = parts.next()?;
    let room = parts.next().filter(|s| !s.is_empty())?;
    let kind = parts.next().filter(|s| !s.is_empty())?;
    Some((room, kind))
}

fn capitalize(s: &str) -> String {
    let mut chars = s.chars();
    match chars.next() {
        Some(first) => first.to_uppercase().chain(chars).collect(),
        None => String::new(),
    }
}
