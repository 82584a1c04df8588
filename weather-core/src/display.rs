use chrono::{DateTime, FixedOffset};
use serde::Serialize;

use crate::{
    model::{CombinedWeather, Forecast, ForecastDaySummary, ForecastInterval, WeatherObservation},
    normalize::{Condition, clock_time},
};

const UNKNOWN: &str = "Unknown";

fn visibility(km: Option<f64>) -> String {
    km.map_or_else(|| UNKNOWN.to_string(), |km| format!("{km} km"))
}

fn clock(time: Option<&DateTime<FixedOffset>>) -> String {
    time.map_or_else(|| UNKNOWN.to_string(), clock_time)
}

/// `Moderate (5)` style label, or `Not available`.
pub fn uv_label(index: Option<f64>) -> String {
    let Some(index) = index else {
        return "Not available".to_string();
    };
    let level = match index {
        i if i < 3.0 => "Low",
        i if i < 6.0 => "Moderate",
        i if i < 8.0 => "High",
        i if i < 11.0 => "Very High",
        _ => "Extreme",
    };
    format!("{level} ({index})")
}

fn icon_emoji(icon: Option<&str>) -> &'static str {
    icon.map_or(Condition::Unknown, Condition::from_icon).emoji()
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ObservationView {
    pub city: String,
    pub temperature: String,
    pub description: String,
    pub feels_like: String,
    pub humidity: String,
    pub wind_speed: String,
    pub pressure: String,
    pub visibility: String,
    pub uv_index: String,
    pub sunrise: String,
    pub sunset: String,
    pub icon: String,
}

impl From<&WeatherObservation> for ObservationView {
    fn from(obs: &WeatherObservation) -> Self {
        Self {
            city: obs.city.clone(),
            temperature: obs.temperature.to_string(),
            description: obs.description.clone(),
            feels_like: format!("Feels like {}", obs.feels_like),
            humidity: format!("{}%", obs.humidity_pct),
            wind_speed: obs.wind_speed.to_string(),
            pressure: format!("{} hPa", obs.pressure_hpa),
            visibility: visibility(obs.visibility_km),
            uv_index: uv_label(obs.uv_index),
            sunrise: clock(obs.sunrise.as_ref()),
            sunset: clock(obs.sunset.as_ref()),
            icon: icon_emoji(obs.icon.as_deref()).to_string(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ForecastIntervalView {
    pub date_time: String,
    pub temperature: String,
    pub description: String,
    pub feels_like: String,
    pub humidity: String,
    pub wind_speed: String,
    pub pressure: String,
    pub visibility: String,
    pub icon: String,
}

impl From<&ForecastInterval> for ForecastIntervalView {
    fn from(interval: &ForecastInterval) -> Self {
        Self {
            date_time: interval.date_time.format("%Y-%m-%d %H:%M").to_string(),
            temperature: interval.temperature.to_string(),
            description: interval.description.clone(),
            feels_like: format!("Feels like {}", interval.feels_like),
            humidity: format!("{}%", interval.humidity_pct),
            wind_speed: interval.wind_speed.to_string(),
            pressure: format!("{} hPa", interval.pressure_hpa),
            visibility: visibility(interval.visibility_km),
            icon: icon_emoji(interval.icon.as_deref()).to_string(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DaySummaryView {
    pub date: String,
    pub min_temperature: String,
    pub max_temperature: String,
    pub description: String,
    pub icon: String,
}

impl From<&ForecastDaySummary> for DaySummaryView {
    fn from(day: &ForecastDaySummary) -> Self {
        Self {
            date: day.date.format("%a %Y-%m-%d").to_string(),
            min_temperature: day.min_temperature.to_string(),
            max_temperature: day.max_temperature.to_string(),
            description: day.description.clone(),
            icon: icon_emoji(day.icon.as_deref()).to_string(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ForecastView {
    pub city: String,
    pub intervals: Vec<ForecastIntervalView>,
    pub daily_summaries: Vec<DaySummaryView>,
}

impl From<&Forecast> for ForecastView {
    fn from(forecast: &Forecast) -> Self {
        Self {
            city: forecast.city.clone(),
            intervals: forecast.intervals.iter().map(Into::into).collect(),
            daily_summaries: forecast.daily_summaries.iter().map(Into::into).collect(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CombinedView {
    pub city: String,
    pub current: ObservationView,
    pub forecast: ForecastView,
    pub last_updated: String,
}

impl From<&CombinedWeather> for CombinedView {
    fn from(combined: &CombinedWeather) -> Self {
        Self {
            city: combined.city.clone(),
            current: (&combined.current).into(),
            forecast: (&combined.forecast).into(),
            last_updated: combined.last_updated.to_rfc3339(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        model::{Speed, Temperature, Units},
        normalize::local_time,
    };
    use chrono::Utc;

    fn observation() -> WeatherObservation {
        let units = Units::Metric;
        WeatherObservation {
            city: "Paris".to_string(),
            temperature: Temperature::new(22.0, units.temperature_unit()),
            feels_like: Temperature::new(24.0, units.temperature_unit()),
            description: "Partly Cloudy".to_string(),
            humidity_pct: 65,
            wind_speed: Speed::new(3.5, units.speed_unit()),
            pressure_hpa: 1013.0,
            visibility_km: Some(10.0),
            uv_index: None,
            // 2024-01-01 06:30 and 19:45 UTC
            sunrise: local_time(1_704_090_600, 0),
            sunset: local_time(1_704_138_300, 0),
            icon: Some("02d".to_string()),
            observed_at: Utc::now(),
        }
    }

    #[test]
    fn renders_observation_strings() {
        let view = ObservationView::from(&observation());

        assert_eq!(view.temperature, "22°C");
        assert_eq!(view.feels_like, "Feels like 24°C");
        assert_eq!(view.humidity, "65%");
        assert_eq!(view.wind_speed, "3.5 m/s");
        assert_eq!(view.pressure, "1013 hPa");
        assert_eq!(view.visibility, "10 km");
        assert_eq!(view.uv_index, "Not available");
        assert_eq!(view.sunrise, "6:30 AM");
        assert_eq!(view.sunset, "7:45 PM");
    }

    #[test]
    fn missing_values_render_as_unknown() {
        let mut obs = observation();
        obs.visibility_km = None;
        obs.sunrise = None;
        obs.icon = None;

        let view = ObservationView::from(&obs);

        assert_eq!(view.visibility, "Unknown");
        assert_eq!(view.sunrise, "Unknown");
        assert_eq!(view.icon, Condition::Unknown.emoji());
    }

    #[test]
    fn uv_labels() {
        assert_eq!(uv_label(Some(5.0)), "Moderate (5)");
        assert_eq!(uv_label(Some(1.0)), "Low (1)");
        assert_eq!(uv_label(Some(11.0)), "Extreme (11)");
    }
}
