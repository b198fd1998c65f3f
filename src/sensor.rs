//! Typed sensor readings from Home Assistant entity states.

use chrono::{DateTime, Utc};
use serde::Deserialize;
use serde_json::{Map, Value};

/// Magnus coefficient a (dimensionless).
const MAGNUS_A: f64 = 17.625;

/// Magnus coefficient b (°C).
const MAGNUS_B: f64 = 243.04;

/// One entity as returned by `GET /api/states`.
#[derive(Debug, Clone, Deserialize)]
pub struct EntityState {
    /// Entity id, e.g. `sensor.temperatur_bad_temperature`
    pub entity_id: String,

    /// Raw state string
    pub state: String,

    /// Entity attributes
    #[serde(default)]
    pub attributes: Map<String, Value>,

    /// When the state last changed
    #[serde(default)]
    pub last_changed: Option<DateTime<Utc>>,
}

impl EntityState {
    /// Create a state with no attributes.
    pub fn new(entity_id: impl Into<String>, state: impl Into<String>) -> Self {
        Self {
            entity_id: entity_id.into(),
            state: state.into(),
            attributes: Map::new(),
            last_changed: None,
        }
    }

    /// Add an attribute.
    #[must_use]
    pub fn with_attribute(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        self.attributes.insert(key.into(), value.into());
        self
    }

    /// Domain part of the entity id (`sensor`, `weather`, `sun`, ...).
    pub fn domain(&self) -> &str {
        self.entity_id
            .split_once('.')
            .map(|(domain, _)| domain)
            .unwrap_or("")
    }

    /// State parsed as a finite number.
    pub fn numeric_state(&self) -> Option<f64> {
        parse_numeric(&self.state)
    }

    fn attribute_str(&self, key: &str) -> Option<&str> {
        self.attributes.get(key).and_then(Value::as_str)
    }

    fn attribute_f64(&self, key: &str) -> Option<f64> {
        self.attributes.get(key).and_then(Value::as_f64)
    }

    fn attribute_time(&self, key: &str) -> Option<DateTime<Utc>> {
        self.attribute_str(key)
            .and_then(|s| DateTime::parse_from_rfc3339(s).ok())
            .map(|dt| dt.with_timezone(&Utc))
    }
}

/// Weather states reported by Home Assistant weather entities.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WeatherCondition {
    /// `clear-night`
    ClearNight,
    /// `cloudy`
    Cloudy,
    /// `fog`
    Fog,
    /// `hail`
    Hail,
    /// `lightning`
    Lightning,
    /// `lightning-rainy`
    LightningRainy,
    /// `partlycloudy`
    PartlyCloudy,
    /// `pouring`
    Pouring,
    /// `rainy`
    Rainy,
    /// `snowy`
    Snowy,
    /// `snowy-rainy`
    SnowyRainy,
    /// `sunny`
    Sunny,
    /// `windy`
    Windy,
    /// `windy-variant`
    WindyVariant,
    /// `exceptional`
    Exceptional,
    /// Anything else, including `unavailable`
    Unknown,
}

impl WeatherCondition {
    /// Map a weather entity state. Unrecognized states become `Unknown`.
    pub fn from_state(state: &str) -> Self {
        match state {
            "clear-night" => Self::ClearNight,
            "cloudy" => Self::Cloudy,
            "fog" => Self::Fog,
            "hail" => Self::Hail,
            "lightning" => Self::Lightning,
            "lightning-rainy" => Self::LightningRainy,
            "partlycloudy" => Self::PartlyCloudy,
            "pouring" => Self::Pouring,
            "rainy" => Self::Rainy,
            "snowy" => Self::Snowy,
            "snowy-rainy" => Self::SnowyRainy,
            "sunny" => Self::Sunny,
            "windy" => Self::Windy,
            "windy-variant" => Self::WindyVariant,
            "exceptional" => Self::Exceptional,
            _ => Self::Unknown,
        }
    }

    /// Font Awesome icon class.
    pub fn icon(self) -> &'static str {
        match self {
            Self::ClearNight => "fa-moon",
            Self::Cloudy => "fa-cloud",
            Self::Fog => "fa-smog",
            Self::Hail => "fa-cloud-meatball",
            Self::Lightning => "fa-bolt",
            Self::LightningRainy => "fa-cloud-bolt",
            Self::PartlyCloudy => "fa-cloud-sun",
            Self::Pouring => "fa-cloud-showers-heavy",
            Self::Rainy => "fa-cloud-rain",
            Self::Snowy => "fa-snowflake",
            Self::SnowyRainy => "fa-cloud-snow",
            Self::Sunny => "fa-sun",
            Self::Windy | Self::WindyVariant => "fa-wind",
            Self::Exceptional => "fa-exclamation-triangle",
            Self::Unknown => "fa-question",
        }
    }
}

/// A reading the dashboard knows how to show.
#[derive(Debug, Clone, PartialEq)]
pub enum SensorReading {
    /// Air temperature
    Temperature { celsius: f64 },
    /// Relative humidity
    Humidity { percent: f64 },
    /// Sensor battery level
    Battery { percent: f64 },
    /// Forecast entity
    Weather {
        condition: WeatherCondition,
        temperature: Option<f64>,
    },
    /// `sun.sun` entity
    SunEvent {
        above_horizon: bool,
        next_rising: Option<DateTime<Utc>>,
        next_setting: Option<DateTime<Utc>>,
    },
}

impl SensorReading {
    /// Interpret an entity state.
    ///
    /// Sensors are classified by their `device_class` attribute, falling back
    /// to the entity id suffix. Unavailable or non-numeric sensor states
    /// give `None`.
    ///
    /// ```
    /// use homedash::sensor::{EntityState, SensorReading};
    ///
    /// let state = EntityState::new("sensor.temperatur_bad_humidity", "61.5");
    /// assert_eq!(
    ///     SensorReading::from_state(&state),
    ///     Some(SensorReading::Humidity { percent: 61.5 })
    /// );
    /// ```
    pub fn from_state(state: &EntityState) -> Option<Self> {
        match state.domain() {
            "weather" => Some(Self::Weather {
                condition: WeatherCondition::from_state(&state.state),
                temperature: state.attribute_f64("temperature"),
            }),
            "sun" => Some(Self::SunEvent {
                above_horizon: state.state == "above_horizon",
                next_rising: state.attribute_time("next_rising"),
                next_setting: state.attribute_time("next_setting"),
            }),
            "sensor" => {
                let value = state.numeric_state()?;
                let class = state
                    .attribute_str("device_class")
                    .or_else(|| state.entity_id.rsplit('_').next())?;
                match class {
                    "temperature" => Some(Self::Temperature { celsius: value }),
                    "humidity" => Some(Self::Humidity { percent: value }),
                    "battery" => Some(Self::Battery { percent: value }),
                    _ => None,
                }
            }
            _ => None,
        }
    }

    /// Numeric value for scalar readings.
    pub fn value(&self) -> Option<f64> {
        match self {
            Self::Temperature { celsius } => Some(*celsius),
            Self::Humidity { percent } | Self::Battery { percent } => Some(*percent),
            Self::Weather { temperature, .. } => *temperature,
            Self::SunEvent { .. } => None,
        }
    }
}

/// Dew point in °C from temperature (°C) and relative humidity (%).
///
/// Uses the Magnus approximation. Returns `None` when humidity is not
/// positive or an input is not finite.
///
/// ```
/// use homedash::sensor::dew_point;
///
/// let dp = dew_point(20.0, 50.0).unwrap();
/// assert!((dp - 9.26).abs() < 0.01);
/// ```
pub fn dew_point(celsius: f64, humidity_percent: f64) -> Option<f64> {
    if !celsius.is_finite() || !humidity_percent.is_finite() || humidity_percent <= 0.0 {
        return None;
    }
    let alpha = (MAGNUS_A * celsius) / (MAGNUS_B + celsius) + (humidity_percent / 100.0).ln();
    let dew = (MAGNUS_B * alpha) / (MAGNUS_A - alpha);
    dew.is_finite().then_some(dew)
}

/// One historical state of an entity.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct HistoryPoint {
    /// Raw state string
    pub state: String,
    /// When the state was entered
    #[serde(default)]
    pub last_changed: Option<DateTime<Utc>>,
}

/// Minimum and maximum over a window.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Extremes {
    /// Lowest value seen
    pub min: f64,
    /// Highest value seen
    pub max: f64,
}

impl Extremes {
    /// Min and max of the finite values, `None` if there are none.
    pub fn from_values(values: impl IntoIterator<Item = f64>) -> Option<Self> {
        values
            .into_iter()
            .filter(|v| v.is_finite())
            .fold(None, |acc, v| match acc {
                None => Some(Self { min: v, max: v }),
                Some(e) => Some(Self {
                    min: e.min.min(v),
                    max: e.max.max(v),
                }),
            })
    }
}

/// Extremes of the numeric states in a history, ignoring `unavailable` etc.
pub fn numeric_extremes(history: &[HistoryPoint]) -> Option<Extremes> {
    Extremes::from_values(history.iter().filter_map(|p| parse_numeric(&p.state)))
}

fn parse_numeric(state: &str) -> Option<f64> {
    state
        .trim()
        .parse::<f64>()
        .ok()
        .filter(|v| v.is_finite())
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_entity_state_parsing() {
        let json = r#"{
            "entity_id": "sensor.temperatur_bad_temperature",
            "state": "22.4",
            "attributes": {"device_class": "temperature", "unit_of_measurement": "°C"},
            "last_changed": "2026-10-14T08:15:00.123456+00:00"
        }"#;
        let state: EntityState = serde_json::from_str(json).unwrap();

        assert_eq!(state.domain(), "sensor");
        assert_eq!(state.numeric_state(), Some(22.4));
        assert!(state.last_changed.is_some());
        assert_eq!(
            SensorReading::from_state(&state),
            Some(SensorReading::Temperature { celsius: 22.4 })
        );
    }

    #[test]
    fn test_device_class_wins_over_suffix() {
        let state = EntityState::new("sensor.bad_extra", "80")
            .with_attribute("device_class", "battery");
        assert_eq!(
            SensorReading::from_state(&state),
            Some(SensorReading::Battery { percent: 80.0 })
        );
    }

    #[test]
    fn test_unavailable_sensor() {
        let state = EntityState::new("sensor.temperatur_bad_temperature", "unavailable");
        assert_eq!(SensorReading::from_state(&state), None);

        let state = EntityState::new("sensor.power_meter", "42");
        assert_eq!(SensorReading::from_state(&state), None);
    }

    #[test]
    fn test_weather_reading() {
        let state = EntityState::new("weather.forecast_home", "partlycloudy")
            .with_attribute("temperature", 14.5);
        let reading = SensorReading::from_state(&state).unwrap();

        assert_eq!(
            reading,
            SensorReading::Weather {
                condition: WeatherCondition::PartlyCloudy,
                temperature: Some(14.5),
            }
        );
        assert_eq!(reading.value(), Some(14.5));
    }

    #[test]
    fn test_sun_reading() {
        let state = EntityState::new("sun.sun", "below_horizon")
            .with_attribute("next_rising", "2026-10-15T05:31:12.000000+00:00")
            .with_attribute("next_setting", json!("2026-10-14T16:38:40+00:00"));

        match SensorReading::from_state(&state).unwrap() {
            SensorReading::SunEvent {
                above_horizon,
                next_rising,
                next_setting,
            } => {
                assert!(!above_horizon);
                assert_eq!(next_rising.unwrap().to_rfc3339(), "2026-10-15T05:31:12+00:00");
                assert_eq!(next_setting.unwrap().to_rfc3339(), "2026-10-14T16:38:40+00:00");
            }
            other => panic!("unexpected reading {:?}", other),
        }
    }

    #[test]
    fn test_weather_icons() {
        assert_eq!(WeatherCondition::from_state("sunny").icon(), "fa-sun");
        assert_eq!(WeatherCondition::from_state("clear-night").icon(), "fa-moon");
        assert_eq!(WeatherCondition::from_state("windy-variant").icon(), "fa-wind");
        assert_eq!(WeatherCondition::from_state("tornado"), WeatherCondition::Unknown);
        assert_eq!(WeatherCondition::Unknown.icon(), "fa-question");
    }

    #[test]
    fn test_dew_point() {
        assert!((dew_point(20.0, 50.0).unwrap() - 9.26).abs() < 0.01);
        assert!((dew_point(25.0, 100.0).unwrap() - 25.0).abs() < 1e-6);
        assert!(dew_point(0.0, 80.0).unwrap() < 0.0);
        assert_eq!(dew_point(20.0, 0.0), None);
        assert_eq!(dew_point(f64::NAN, 50.0), None);
    }

    #[test]
    fn test_extremes() {
        let extremes = Extremes::from_values([3.0, -1.5, f64::NAN, 7.25]).unwrap();
        assert_eq!(extremes, Extremes { min: -1.5, max: 7.25 });
        assert_eq!(Extremes::from_values(Vec::new()), None);
    }

    #[test]
    fn test_numeric_extremes_skips_unavailable() {
        let history: Vec<HistoryPoint> = serde_json::from_value(json!([
            {"state": "19.5", "last_changed": "2026-10-13T09:00:00+00:00"},
            {"state": "unavailable"},
            {"state": "23.1"},
            {"state": "21.0"}
        ]))
        .unwrap();

        assert_eq!(
            numeric_extremes(&history),
            Some(Extremes { min: 19.5, max: 23.1 })
        );
    }
}
