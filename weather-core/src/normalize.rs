use chrono::{DateTime, FixedOffset, NaiveDateTime};
use std::collections::HashMap;

use crate::model::{ForecastDaySummary, ForecastInterval, Temperature};

/// Round to the nearest integer, halves going up (`2.5 -> 3`, `-2.5 -> -2`).
pub fn round_half_up(value: f64) -> f64 {
    (value + 0.5).floor()
}

/// Metres to whole kilometres. Zero or missing visibility is unknown.
pub fn visibility_km(meters: Option<f64>) -> Option<f64> {
    meters
        .filter(|m| *m > 0.0)
        .map(|m| round_half_up(m / 1000.0))
}

/// Epoch seconds shifted into the location's offset (seconds east of UTC).
pub fn local_time(epoch_secs: i64, utc_offset_secs: i32) -> Option<DateTime<FixedOffset>> {
    let offset = FixedOffset::east_opt(utc_offset_secs)?;
    DateTime::from_timestamp(epoch_secs, 0).map(|dt| dt.with_timezone(&offset))
}

/// `6:05 AM` style clock string.
pub fn clock_time(time: &DateTime<FixedOffset>) -> String {
    time.format("%-I:%M %p").to_string()
}

/// Parse an upstream `dt_txt` value such as `2024-05-01 12:00:00`.
pub fn parse_local_timestamp(text: &str) -> Option<NaiveDateTime> {
    NaiveDateTime::parse_from_str(text.trim(), "%Y-%m-%d %H:%M:%S").ok()
}

/// Coarse condition derived from an OpenWeather icon code (`"10d"`, `"01n"`, ...).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Condition {
    Clear,
    FewClouds,
    Clouds,
    Rain,
    Thunderstorm,
    Snow,
    Mist,
    Unknown,
}

impl Condition {
    pub fn from_icon(code: &str) -> Self {
        match code.get(..2) {
            Some("01") => Condition::Clear,
            Some("02") => Condition::FewClouds,
            Some("03") | Some("04") => Condition::Clouds,
            Some("09") | Some("10") => Condition::Rain,
            Some("11") => Condition::Thunderstorm,
            Some("13") => Condition::Snow,
            Some("50") => Condition::Mist,
            _ => Condition::Unknown,
        }
    }

    pub fn emoji(&self) -> &'static str {
        match self {
            Condition::Clear => "☀️",
            Condition::FewClouds => "🌤️",
            Condition::Clouds => "☁️",
            Condition::Rain => "🌧️",
            Condition::Thunderstorm => "⛈️",
            Condition::Snow => "❄️",
            Condition::Mist => "🌫️",
            Condition::Unknown => "❓",
        }
    }
}

pub fn icon_url(code: &str) -> String {
    format!("https://openweathermap.org/img/wn/{code}@2x.png")
}

/// Group intervals by calendar date, one summary per date in date order.
///
/// Min/max fold over every interval of the date (using the interval's own
/// min/max when present). The first interval of a date supplies the
/// description and icon.
pub fn daily_summaries(intervals: &[ForecastInterval]) -> Vec<ForecastDaySummary> {
    let mut summaries: Vec<ForecastDaySummary> = Vec::new();
    let mut index_by_date = HashMap::new();

    for interval in intervals {
        let low = round_half_up(interval.temp_min.unwrap_or(interval.temperature.value));
        let high = round_half_up(interval.temp_max.unwrap_or(interval.temperature.value));
        let unit = interval.temperature.unit;

        match index_by_date.get(&interval.date()).copied() {
            Some(idx) => {
                let summary: &mut ForecastDaySummary = &mut summaries[idx];
                summary.min_temperature.value = summary.min_temperature.value.min(low);
                summary.max_temperature.value = summary.max_temperature.value.max(high);
            }
            None => {
                index_by_date.insert(interval.date(), summaries.len());
                summaries.push(ForecastDaySummary {
                    date: interval.date(),
                    min_temperature: Temperature::new(low, unit),
                    max_temperature: Temperature::new(high, unit),
                    description: interval.description.clone(),
                    icon: interval.icon.clone(),
                });
            }
        }
    }

    summaries.sort_by_key(|s| s.date);
    summaries
}
