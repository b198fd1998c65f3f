//! Dashboard view model assembled from Home Assistant readings.

use std::collections::HashMap;

use chrono::{DateTime, Datelike, NaiveTime, TimeZone};

use crate::config::{Layout, RoomLayout};
use crate::sensor::{
    dew_point, numeric_extremes, EntityState, Extremes, HistoryPoint, SensorReading,
    WeatherCondition,
};

/// Battery level below which a room shows a warning.
pub const LOW_BATTERY_PERCENT: f64 = 20.0;

const WEEKDAYS: [&str; 7] = [
    "Sonntag",
    "Montag",
    "Dienstag",
    "Mittwoch",
    "Donnerstag",
    "Freitag",
    "Samstag",
];

const MONTHS: [&str; 12] = [
    "Januar",
    "Februar",
    "März",
    "April",
    "Mai",
    "Juni",
    "Juli",
    "August",
    "September",
    "Oktober",
    "November",
    "Dezember",
];

/// German long date without year, e.g. "Dienstag, 14. Oktober".
///
/// ```
/// use chrono::NaiveDate;
/// use homedash::dashboard::german_date;
///
/// let date = NaiveDate::from_ymd_opt(2026, 3, 2).unwrap();
/// assert_eq!(german_date(&date), "Montag, 2. März");
/// ```
pub fn german_date<D: Datelike>(date: &D) -> String {
    let weekday = WEEKDAYS[date.weekday().num_days_from_sunday() as usize];
    let month = MONTHS[date.month0() as usize];
    format!("{}, {}. {}", weekday, date.day(), month)
}

/// Everything shown for one room.
#[derive(Debug, Clone, PartialEq)]
pub struct RoomView {
    pub label: String,
    pub temperature: Option<f64>,
    pub humidity: Option<f64>,
    pub dew_point: Option<f64>,
    pub battery: Option<f64>,
    /// Temperature min/max over the history window
    pub temperature_range: Option<Extremes>,
}

impl RoomView {
    /// Whether the room's sensor battery needs replacing.
    pub fn battery_low(&self) -> bool {
        self.battery.is_some_and(|b| b < LOW_BATTERY_PERCENT)
    }
}

/// Next sunrise and sunset in local time.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SunTimes {
    pub above_horizon: bool,
    pub sunrise: Option<NaiveTime>,
    pub sunset: Option<NaiveTime>,
}

/// The complete page content.
#[derive(Debug, Clone, PartialEq)]
pub struct Dashboard {
    pub date: String,
    pub weather: WeatherCondition,
    pub outside_temperature: Option<f64>,
    pub sun: Option<SunTimes>,
    pub rooms: Vec<RoomView>,
}

impl Dashboard {
    /// Build the dashboard for `now` from current states and optional history.
    ///
    /// Entities the layout names but Home Assistant did not report are shown
    /// as missing values.
    pub fn build<Tz: TimeZone>(
        layout: &Layout,
        states: &[EntityState],
        history: &HashMap<String, Vec<HistoryPoint>>,
        now: &DateTime<Tz>,
    ) -> Self {
        let readings: HashMap<&str, SensorReading> = states
            .iter()
            .filter_map(|s| Some((s.entity_id.as_str(), SensorReading::from_state(s)?)))
            .collect();

        let (weather, outside_temperature) = match readings.get(layout.weather_entity.as_str()) {
            Some(SensorReading::Weather {
                condition,
                temperature,
            }) => (*condition, *temperature),
            _ => (WeatherCondition::Unknown, None),
        };

        let sun = layout
            .sun_entity
            .as_deref()
            .and_then(|id| readings.get(id))
            .and_then(|reading| match reading {
                SensorReading::SunEvent {
                    above_horizon,
                    next_rising,
                    next_setting,
                } => {
                    let tz = now.timezone();
                    let local = |t: &DateTime<chrono::Utc>| t.with_timezone(&tz).time();
                    Some(SunTimes {
                        above_horizon: *above_horizon,
                        sunrise: next_rising.as_ref().map(local),
                        sunset: next_setting.as_ref().map(local),
                    })
                }
                _ => None,
            });

        let rooms = layout
            .rooms
            .iter()
            .map(|room| room_view(room, &readings, history))
            .collect();

        let dashboard = Self {
            date: german_date(&now.date_naive()),
            weather,
            outside_temperature,
            sun,
            rooms,
        };
        tracing::debug!(
            rooms = dashboard.rooms.len(),
            weather = ?dashboard.weather,
            "Built dashboard"
        );
        dashboard
    }
}

fn room_view(
    room: &RoomLayout,
    readings: &HashMap<&str, SensorReading>,
    history: &HashMap<String, Vec<HistoryPoint>>,
) -> RoomView {
    let scalar = |id: &str| readings.get(id).and_then(SensorReading::value);

    let temperature = scalar(&room.temperature);
    let humidity = scalar(&room.humidity);
    let dew_point = temperature
        .zip(humidity)
        .and_then(|(t, h)| dew_point(t, h));

    RoomView {
        label: room.label(),
        temperature,
        humidity,
        dew_point,
        battery: room.battery.as_deref().and_then(scalar),
        temperature_range: history
            .get(&room.temperature)
            .and_then(|points| numeric_extremes(points)),
    }
}
