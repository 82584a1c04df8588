use chrono::{DateTime, FixedOffset, NaiveDate, NaiveDateTime, Utc};
use serde::{Deserialize, Serialize};
use std::{fmt, str::FromStr};

/// Measurement system requested from the provider.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Units {
    #[default]
    Metric,
    Imperial,
}

impl Units {
    pub fn as_str(&self) -> &'static str {
        match self {
            Units::Metric => "metric",
            Units::Imperial => "imperial",
        }
    }

    pub fn temperature_unit(&self) -> TemperatureUnit {
        match self {
            Units::Metric => TemperatureUnit::Celsius,
            Units::Imperial => TemperatureUnit::Fahrenheit,
        }
    }

    pub fn speed_unit(&self) -> SpeedUnit {
        match self {
            Units::Metric => SpeedUnit::MetersPerSecond,
            Units::Imperial => SpeedUnit::MilesPerHour,
        }
    }
}

impl fmt::Display for Units {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Units {
    type Err = anyhow::Error;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.trim().to_lowercase().as_str() {
            "metric" => Ok(Units::Metric),
            "imperial" => Ok(Units::Imperial),
            _ => Err(anyhow::anyhow!(
                "Unknown units '{value}'. Supported units: metric, imperial."
            )),
        }
    }
}

/// A single lookup. Built fresh per call; the city is trimmed on construction.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WeatherRequest {
    pub city: String,
    pub units: Units,
    pub lang: String,
}

impl WeatherRequest {
    pub fn new(city: impl AsRef<str>) -> Self {
        Self {
            city: city.as_ref().trim().to_string(),
            units: Units::default(),
            lang: "en".to_string(),
        }
    }

    pub fn with_units(mut self, units: Units) -> Self {
        self.units = units;
        self
    }

    pub fn with_lang(mut self, lang: impl Into<String>) -> Self {
        let lang = lang.into();
        if !lang.trim().is_empty() {
            self.lang = lang.trim().to_string();
        }
        self
    }

    pub fn has_city(&self) -> bool {
        !self.city.trim().is_empty()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TemperatureUnit {
    Celsius,
    Fahrenheit,
}

impl TemperatureUnit {
    pub fn symbol(&self) -> &'static str {
        match self {
            TemperatureUnit::Celsius => "°C",
            TemperatureUnit::Fahrenheit => "°F",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Temperature {
    pub value: f64,
    pub unit: TemperatureUnit,
}

impl Temperature {
    pub fn new(value: f64, unit: TemperatureUnit) -> Self {
        Self { value, unit }
    }
}

impl fmt::Display for Temperature {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}{}", self.value, self.unit.symbol())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum SpeedUnit {
    #[serde(rename = "m/s")]
    MetersPerSecond,
    #[serde(rename = "mph")]
    MilesPerHour,
}

impl SpeedUnit {
    pub fn symbol(&self) -> &'static str {
        match self {
            SpeedUnit::MetersPerSecond => "m/s",
            SpeedUnit::MilesPerHour => "mph",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Speed {
    pub value: f64,
    pub unit: SpeedUnit,
}

impl Speed {
    pub fn new(value: f64, unit: SpeedUnit) -> Self {
        Self { value, unit }
    }
}

impl fmt::Display for Speed {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {}", self.value, self.unit.symbol())
    }
}

/// Normalized current-conditions snapshot.
///
/// Values are typed; display strings are produced by [`crate::display`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WeatherObservation {
    pub city: String,
    pub temperature: Temperature,
    pub feels_like: Temperature,
    pub description: String,
    pub humidity_pct: u8,
    pub wind_speed: Speed,
    pub pressure_hpa: f64,
    /// Rounded kilometres; `None` when the upstream omits visibility.
    pub visibility_km: Option<f64>,
    /// `None` when the upstream tier does not report it.
    pub uv_index: Option<f64>,
    /// Provider-local sunrise, carrying the location's UTC offset.
    pub sunrise: Option<DateTime<FixedOffset>>,
    pub sunset: Option<DateTime<FixedOffset>>,
    pub icon: Option<String>,
    pub observed_at: DateTime<Utc>,
}

/// One upstream time slice of a forecast.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ForecastInterval {
    /// Upstream-provided local timestamp.
    pub date_time: NaiveDateTime,
    pub temperature: Temperature,
    pub feels_like: Temperature,
    /// Lowest temperature reported for the slice, when the upstream gives one.
    pub temp_min: Option<f64>,
    pub temp_max: Option<f64>,
    pub description: String,
    pub humidity_pct: u8,
    pub wind_speed: Speed,
    pub pressure_hpa: f64,
    pub visibility_km: Option<f64>,
    pub icon: Option<String>,
}

impl ForecastInterval {
    pub fn date(&self) -> NaiveDate {
        self.date_time.date()
    }
}

/// Per-date aggregate derived from forecast intervals.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ForecastDaySummary {
    pub date: NaiveDate,
    pub min_temperature: Temperature,
    pub max_temperature: Temperature,
    /// Description of the first interval seen for this date.
    pub description: String,
    pub icon: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Forecast {
    pub city: String,
    pub intervals: Vec<ForecastInterval>,
    pub daily_summaries: Vec<ForecastDaySummary>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CombinedWeather {
    pub city: String,
    pub current: WeatherObservation,
    pub forecast: Forecast,
    pub last_updated: DateTime<Utc>,
}

impl CombinedWeather {
    pub fn new(current: WeatherObservation, forecast: Forecast) -> Self {
        Self {
            city: current.city.clone(),
            current,
            forecast,
            last_updated: Utc::now(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn request_trims_city_and_defaults() {
        let req = WeatherRequest::new("  Paris  ");

        assert_eq!(req.city, "Paris");
        assert_eq!(req.units, Units::Metric);
        assert_eq!(req.lang, "en");
        assert!(req.has_city());
    }

    #[test]
    fn blank_lang_keeps_default() {
        let req = WeatherRequest::new("Oslo").with_lang("   ");
        assert_eq!(req.lang, "en");

        let req = WeatherRequest::new("Oslo").with_lang("no");
        assert_eq!(req.lang, "no");
    }

    #[test]
    fn whitespace_city_has_no_city() {
        assert!(!WeatherRequest::new(" \t ").has_city());
    }

    #[test]
    fn units_parse_case_insensitive() {
        assert_eq!("Imperial".parse::<Units>().unwrap(), Units::Imperial);
        assert_eq!("metric".parse::<Units>().unwrap(), Units::Metric);

        let err = "kelvin".parse::<Units>().unwrap_err();
        assert!(err.to_string().contains("Unknown units"));
    }

    #[test]
    fn measurements_display_with_unit_symbol() {
        let t = Temperature::new(22.0, Units::Metric.temperature_unit());
        assert_eq!(t.to_string(), "22°C");

        let t = Temperature::new(-3.0, Units::Imperial.temperature_unit());
        assert_eq!(t.to_string(), "-3°F");

        let s = Speed::new(3.5, Units::Metric.speed_unit());
        assert_eq!(s.to_string(), "3.5 m/s");

        let s = Speed::new(7.0, Units::Imperial.speed_unit());
        assert_eq!(s.to_string(), "7 mph");
    }
}
