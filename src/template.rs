//! HTML page for the 480x800 e-paper canvas.
//!
//! Black on white only: anything grey ends up on one side of the threshold
//! anyway, so the stylesheet avoids it.

use crate::dashboard::{Dashboard, RoomView, SunTimes};
use crate::{DISPLAY_HEIGHT, DISPLAY_WIDTH};

const MISSING: &str = "--";

/// Render the dashboard page.
///
/// `asset_base` is the URL prefix under which `fontawesome/css/all.min.css`
/// is served, e.g. `http://localhost:3000/assets`.
pub fn render_html(dashboard: &Dashboard, asset_base: &str) -> String {
    let mut rooms = String::new();
    for room in &dashboard.rooms {
        render_room(&mut rooms, room);
    }

    let outside = dashboard
        .outside_temperature
        .map(|t| format!(r#"<span class="outside">{}°C</span>"#, fmt1(t)))
        .unwrap_or_default();
    let sun = dashboard.sun.as_ref().map(render_sun).unwrap_or_default();

    format!(
        r#"<!DOCTYPE html>
<html>
<head>
    <meta charset="UTF-8">
    <link rel="stylesheet" href="{asset_base}/fontawesome/css/all.min.css">
    <style>
        html, body {{
            width: {width}px;
            height: {height}px;
            margin: 0;
        }}
        body {{
            font-family: sans-serif;
            background-color: white;
            color: black;
            padding: 20px;
            box-sizing: border-box;
            font-size: 16px;
            overflow: hidden;
        }}
        .date {{
            font-size: 24px;
            font-weight: bold;
            margin-bottom: 10px;
            display: flex;
            align-items: center;
            justify-content: space-evenly;
        }}
        .weather-icon {{ font-size: 60px; }}
        .sun {{
            display: flex;
            justify-content: center;
            gap: 24px;
            font-size: 18px;
            margin-bottom: 10px;
        }}
        .room {{
            padding: 15px;
            border-bottom: 2px solid black;
        }}
        .room:last-child {{ border-bottom: none; }}
        .room-title {{
            font-size: 24px;
            font-weight: bold;
            text-align: center;
        }}
        .sensor-row {{
            display: flex;
            justify-content: space-between;
            margin-bottom: 8px;
            align-items: center;
        }}
        .sensor-value {{
            font-weight: bold;
            font-size: 48px;
            display: flex;
            align-items: center;
            gap: 8px;
        }}
        .detail {{
            font-weight: bold;
            font-size: 20px;
            display: flex;
            align-items: center;
            gap: 8px;
        }}
        .sensor-icon {{ font-size: 70%; }}
    </style>
</head>
<body>
    <div class="date">
        <i class="fas {weather_icon} weather-icon"></i>
        {date}
        {outside}
    </div>
    {sun}
    {rooms}
</body>
</html>"#,
        asset_base = escape(asset_base.trim_end_matches('/')),
        width = DISPLAY_WIDTH,
        height = DISPLAY_HEIGHT,
        weather_icon = dashboard.weather.icon(),
        date = escape(&dashboard.date),
        outside = outside,
        sun = sun,
        rooms = rooms,
    )
}

fn render_room(out: &mut String, room: &RoomView) {
    let battery = if room.battery_low() {
        format!(
            r#"<span class="detail"><i class="fas fa-battery-quarter"></i>{}%</span>"#,
            room.battery.map(fmt0).unwrap_or_default()
        )
    } else {
        String::new()
    };
    let range = room
        .temperature_range
        .map(|r| {
            format!(
                r#"<span class="detail"><i class="fas fa-arrow-down"></i>{}°C <i class="fas fa-arrow-up"></i>{}°C</span>"#,
                fmt1(r.min),
                fmt1(r.max)
            )
        })
        .unwrap_or_default();

    out.push_str(&format!(
        r#"
    <div class="room">
        <div class="room-title">{label}</div>
        <div class="sensor-row">
            <span class="sensor-value"><i class="fas fa-temperature-three-quarters sensor-icon"></i>{temperature}°C</span>
            <span class="sensor-value"><i class="fas fa-droplet sensor-icon"></i>{humidity}%</span>
        </div>
        <div class="sensor-row">
            <span class="detail"><i class="fas fa-water"></i>{dew_point}°C</span>
            {range}
            {battery}
        </div>
    </div>"#,
        label = escape(&room.label),
        temperature = room.temperature.map(fmt1).unwrap_or_else(|| MISSING.to_string()),
        humidity = room.humidity.map(fmt0).unwrap_or_else(|| MISSING.to_string()),
        dew_point = room.dew_point.map(fmt1).unwrap_or_else(|| MISSING.to_string()),
        range = range,
        battery = battery,
    ));
}

fn render_sun(sun: &SunTimes) -> String {
    let time = |t: Option<chrono::NaiveTime>| {
        t.map(|t| t.format("%H:%M").to_string())
            .unwrap_or_else(|| MISSING.to_string())
    };
    format!(
        r#"<div class="sun"><span><i class="fas fa-sun"></i> {}</span><span><i class="fas fa-moon"></i> {}</span></div>"#,
        time(sun.sunrise),
        time(sun.sunset)
    )
}

fn fmt1(v: f64) -> String {
    format!("{:.1}", v)
}

fn fmt0(v: f64) -> String {
    format!("{:.0}", v)
}

/// Escape text for HTML element content and attribute values.
pub fn escape(s: &str) -> String {
    let mut escaped = String::with_capacity(s.len());
    for c in s.chars() {
        match c {
            '&' => escaped.push_str("&amp;"),
            '<' => escaped.push_str("&lt;"),
            '>' => escaped.push_str("&gt;"),
            '"' => escaped.push_str("&quot;"),
            '\'' => escaped.push_str("&#39;"),
            _ => escaped.push(c),
        }
    }
    escaped
}
