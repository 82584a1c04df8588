use anyhow::{Context, Result};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use reqwest::{Client, StatusCode};
use serde::{Deserialize, de::DeserializeOwned};
use std::time::Duration;
use tracing::{debug, warn};

use crate::{
    envelope::{ResponseEnvelope, WeatherError},
    error::FetchError,
    model::{
        CombinedWeather, Forecast, ForecastInterval, Speed, Temperature, Units,
        WeatherObservation, WeatherRequest,
    },
    normalize::{daily_summaries, local_time, parse_local_timestamp, round_half_up, visibility_km},
    provider::{combine, validate_request},
};

use super::WeatherProvider;

pub const DEFAULT_BASE_URL: &str = "https://api.openweathermap.org/data/2.5";
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(10);

#[derive(Debug, Clone)]
pub struct OpenWeatherProvider {
    api_key: String,
    base_url: String,
    timeout: Duration,
    http: Client,
}

#[derive(Debug, Clone)]
pub struct OpenWeatherBuilder {
    api_key: String,
    base_url: String,
    timeout: Duration,
}

impl OpenWeatherBuilder {
    pub fn base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into().trim_end_matches('/').to_string();
        self
    }

    pub fn timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn build(self) -> Result<OpenWeatherProvider> {
        let http = Client::builder()
            .timeout(self.timeout)
            .build()
            .context("Failed to build HTTP client for OpenWeather")?;

        Ok(OpenWeatherProvider {
            api_key: self.api_key,
            base_url: self.base_url,
            timeout: self.timeout,
            http,
        })
    }
}

impl OpenWeatherProvider {
    pub fn builder(api_key: impl Into<String>) -> OpenWeatherBuilder {
        OpenWeatherBuilder {
            api_key: api_key.into(),
            base_url: DEFAULT_BASE_URL.to_string(),
            timeout: DEFAULT_TIMEOUT,
        }
    }

    pub fn new(api_key: impl Into<String>) -> Result<Self> {
        Self::builder(api_key).build()
    }

    /// Validation and availability, checked before any network call.
    fn precheck(&self, request: &WeatherRequest) -> Result<(), WeatherError> {
        validate_request(request)?;
        if !self.is_available() {
            return Err(WeatherError::unavailable(self.name()));
        }
        Ok(())
    }

    async fn fetch<T: DeserializeOwned>(
        &self,
        endpoint: &str,
        request: &WeatherRequest,
    ) -> Result<T, FetchError> {
        let url = format!("{}/{endpoint}", self.base_url);
        debug!(%url, city = %request.city, units = %request.units, "requesting OpenWeather");

        let res = self
            .http
            .get(&url)
            .query(&[
                ("q", request.city.as_str()),
                ("appid", self.api_key.as_str()),
                ("units", request.units.as_str()),
                ("lang", request.lang.as_str()),
            ])
            .send()
            .await
            .map_err(|e| FetchError::from_transport(e, self.timeout))?;

        let status = res.status();
        let body = res
            .text()
            .await
            .map_err(|e| FetchError::from_transport(e, self.timeout))?;

        if !status.is_success() {
            return Err(api_error(status, &body));
        }

        serde_json::from_str(&body).map_err(|e| FetchError::Decode(e.to_string()))
    }

    async fn fetch_current(&self, request: &WeatherRequest) -> Result<WeatherObservation, FetchError> {
        let parsed: OwCurrentResponse = self.fetch("weather", request).await?;
        Ok(parsed.into_observation(request.units))
    }

    async fn fetch_forecast(&self, request: &WeatherRequest) -> Result<Forecast, FetchError> {
        let parsed: OwForecastResponse = self.fetch("forecast", request).await?;
        parsed.into_forecast(request.units)
    }
}

/// Best-effort read of the `{cod, message}` error body.
fn api_error(status: StatusCode, body: &str) -> FetchError {
    let parsed = serde_json::from_str::<OwError>(body).ok();

    let upstream_code = parsed.as_ref().and_then(|e| match &e.cod {
        Some(serde_json::Value::String(s)) => Some(s.clone()),
        Some(serde_json::Value::Number(n)) => Some(n.to_string()),
        _ => None,
    });

    let status_text = status.canonical_reason().unwrap_or("Unknown").to_string();
    let message = parsed
        .and_then(|e| e.message)
        .filter(|m| !m.trim().is_empty())
        .unwrap_or_else(|| format!("HTTP {}: {status_text}", status.as_u16()));

    FetchError::Api {
        status: status.as_u16(),
        status_text,
        message,
        upstream_code,
    }
}

#[derive(Debug, Deserialize)]
struct OwError {
    #[serde(default)]
    cod: Option<serde_json::Value>,
    #[serde(default)]
    message: Option<String>,
}

#[derive(Debug, Deserialize)]
struct OwMain {
    temp: f64,
    feels_like: f64,
    #[serde(default)]
    temp_min: Option<f64>,
    #[serde(default)]
    temp_max: Option<f64>,
    humidity: u8,
    pressure: f64,
}

#[derive(Debug, Deserialize)]
struct OwWeather {
    description: String,
    #[serde(default)]
    icon: Option<String>,
}

#[derive(Debug, Deserialize)]
struct OwWind {
    speed: f64,
}

#[derive(Debug, Default, Deserialize)]
struct OwSys {
    #[serde(default)]
    sunrise: Option<i64>,
    #[serde(default)]
    sunset: Option<i64>,
}

#[derive(Debug, Deserialize)]
struct OwCurrentResponse {
    name: String,
    #[serde(default)]
    dt: Option<i64>,
    /// Shift in seconds from UTC.
    #[serde(default)]
    timezone: Option<i32>,
    main: OwMain,
    #[serde(default)]
    weather: Vec<OwWeather>,
    wind: OwWind,
    #[serde(default)]
    visibility: Option<f64>,
    #[serde(default)]
    sys: OwSys,
}

#[derive(Debug, Deserialize)]
struct OwCity {
    name: String,
    #[serde(default)]
    timezone: Option<i32>,
}

#[derive(Debug, Deserialize)]
struct OwForecastEntry {
    #[serde(default)]
    dt: Option<i64>,
    #[serde(default)]
    dt_txt: Option<String>,
    main: OwMain,
    #[serde(default)]
    weather: Vec<OwWeather>,
    wind: OwWind,
    #[serde(default)]
    visibility: Option<f64>,
}

#[derive(Debug, Deserialize)]
struct OwForecastResponse {
    city: OwCity,
    list: Vec<OwForecastEntry>,
}

fn describe(weather: &[OwWeather]) -> (String, Option<String>) {
    weather
        .first()
        .map(|w| (w.description.clone(), w.icon.clone()))
        .unwrap_or_else(|| ("Unknown".to_string(), None))
}

impl OwCurrentResponse {
    fn into_observation(self, units: Units) -> WeatherObservation {
        let offset = self.timezone.unwrap_or(0);
        let (description, icon) = describe(&self.weather);
        let temp_unit = units.temperature_unit();

        WeatherObservation {
            city: self.name,
            temperature: Temperature::new(round_half_up(self.main.temp), temp_unit),
            feels_like: Temperature::new(round_half_up(self.main.feels_like), temp_unit),
            description,
            humidity_pct: self.main.humidity,
            wind_speed: Speed::new(self.wind.speed, units.speed_unit()),
            pressure_hpa: self.main.pressure,
            visibility_km: visibility_km(self.visibility),
            // Not part of the free tier.
            uv_index: None,
            sunrise: self.sys.sunrise.and_then(|ts| local_time(ts, offset)),
            sunset: self.sys.sunset.and_then(|ts| local_time(ts, offset)),
            icon,
            observed_at: self
                .dt
                .and_then(|ts| DateTime::<Utc>::from_timestamp(ts, 0))
                .unwrap_or_else(Utc::now),
        }
    }
}

impl OwForecastResponse {
    fn into_forecast(self, units: Units) -> Result<Forecast, FetchError> {
        let offset = self.city.timezone.unwrap_or(0);
        let temp_unit = units.temperature_unit();

        let mut intervals = self
            .list
            .into_iter()
            .map(|entry| -> Result<ForecastInterval, FetchError> {
                let date_time = entry
                    .dt_txt
                    .as_deref()
                    .and_then(parse_local_timestamp)
                    .or_else(|| {
                        entry
                            .dt
                            .and_then(|ts| local_time(ts, offset))
                            .map(|t| t.naive_local())
                    })
                    .ok_or_else(|| {
                        FetchError::Decode("forecast entry without a usable timestamp".into())
                    })?;
                let (description, icon) = describe(&entry.weather);

                Ok(ForecastInterval {
                    date_time,
                    temperature: Temperature::new(round_half_up(entry.main.temp), temp_unit),
                    feels_like: Temperature::new(round_half_up(entry.main.feels_like), temp_unit),
                    temp_min: entry.main.temp_min,
                    temp_max: entry.main.temp_max,
                    description,
                    humidity_pct: entry.main.humidity,
                    wind_speed: Speed::new(entry.wind.speed, units.speed_unit()),
                    pressure_hpa: entry.main.pressure,
                    visibility_km: visibility_km(entry.visibility),
                    icon,
                })
            })
            .collect::<Result<Vec<_>, _>>()?;
        intervals.sort_by_key(|i| i.date_time);

        Ok(Forecast {
            city: self.city.name,
            daily_summaries: daily_summaries(&intervals),
            intervals,
        })
    }
}

#[async_trait]
impl WeatherProvider for OpenWeatherProvider {
    fn name(&self) -> &str {
        "OpenWeatherMap"
    }

    fn is_available(&self) -> bool {
        !self.api_key.trim().is_empty()
    }

    fn supports_forecast(&self) -> bool {
        true
    }

    async fn get_weather(&self, request: &WeatherRequest) -> ResponseEnvelope<WeatherObservation> {
        if let Err(err) = self.precheck(request) {
            return ResponseEnvelope::fail(err);
        }

        self.fetch_current(request)
            .await
            .map_err(|err| {
                warn!(city = %request.city, error = %err, "OpenWeather current lookup failed");
                WeatherError::from(err)
            })
            .into()
    }

    async fn get_forecast(&self, request: &WeatherRequest) -> ResponseEnvelope<Forecast> {
        if let Err(err) = self.precheck(request) {
            return ResponseEnvelope::fail(err);
        }

        self.fetch_forecast(request)
            .await
            .map_err(|err| {
                warn!(city = %request.city, error = %err, "OpenWeather forecast lookup failed");
                WeatherError::from(err)
            })
            .into()
    }

    async fn get_combined_weather(
        &self,
        request: &WeatherRequest,
    ) -> ResponseEnvelope<CombinedWeather> {
        if let Err(err) = self.precheck(request) {
            return ResponseEnvelope::fail(err);
        }

        combine(self.get_weather(request), self.get_forecast(request)).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::envelope::ErrorCode;

    const CURRENT: &str = r#"{
        "name": "Paris",
        "dt": 1704099600,
        "timezone": 3600,
        "main": { "temp": 21.6, "feels_like": 23.5, "humidity": 65, "pressure": 1013 },
        "weather": [ { "description": "broken clouds", "main": "Clouds", "icon": "04d" } ],
        "wind": { "speed": 3.6 },
        "visibility": 9500,
        "sys": { "sunrise": 1704094200, "sunset": 1704124800 }
    }"#;

    #[test]
    fn normalizes_current_conditions() {
        let parsed: OwCurrentResponse = serde_json::from_str(CURRENT).unwrap();
        let obs = parsed.into_observation(Units::Metric);

        assert_eq!(obs.city, "Paris");
        assert_eq!(obs.temperature.to_string(), "22°C");
        assert_eq!(obs.feels_like.to_string(), "24°C");
        assert_eq!(obs.wind_speed.to_string(), "3.6 m/s");
        assert_eq!(obs.humidity_pct, 65);
        assert_eq!(obs.pressure_hpa, 1013.0);
        assert_eq!(obs.visibility_km, Some(10.0));
        assert_eq!(obs.uv_index, None);
        assert_eq!(obs.icon.as_deref(), Some("04d"));
        // 07:30 UTC shifted by +1h
        let sunrise = obs.sunrise.unwrap();
        assert_eq!(sunrise.format("%H:%M").to_string(), "08:30");
        assert_eq!(obs.observed_at.timestamp(), 1_704_099_600);
    }

    #[test]
    fn imperial_units_tag_measurements() {
        let parsed: OwCurrentResponse = serde_json::from_str(CURRENT).unwrap();
        let obs = parsed.into_observation(Units::Imperial);

        assert_eq!(obs.temperature.to_string(), "22°F");
        assert_eq!(obs.wind_speed.to_string(), "3.6 mph");
    }

    #[test]
    fn missing_optional_fields_fall_back() {
        let parsed: OwCurrentResponse = serde_json::from_str(
            r#"{
                "name": "Nowhere",
                "main": { "temp": 1.0, "feels_like": 0.4, "humidity": 90, "pressure": 990 },
                "weather": [],
                "wind": { "speed": 0 }
            }"#,
        )
        .unwrap();
        let obs = parsed.into_observation(Units::Metric);

        assert_eq!(obs.description, "Unknown");
        assert_eq!(obs.visibility_km, None);
        assert_eq!(obs.sunrise, None);
        assert_eq!(obs.icon, None);
    }

    #[test]
    fn forecast_falls_back_to_epoch_when_dt_txt_missing() {
        let parsed: OwForecastResponse = serde_json::from_str(
            r#"{
                "city": { "name": "Oslo", "timezone": 0 },
                "list": [
                    { "dt": 1704067200,
                      "main": { "temp": -4.4, "feels_like": -9, "humidity": 80, "pressure": 1001 },
                      "weather": [ { "description": "snow", "icon": "13n" } ],
                      "wind": { "speed": 5.1 } }
                ]
            }"#,
        )
        .unwrap();

        let forecast = parsed.into_forecast(Units::Metric).unwrap();

        assert_eq!(forecast.city, "Oslo");
        assert_eq!(forecast.intervals[0].date().to_string(), "2024-01-01");
        assert_eq!(forecast.daily_summaries.len(), 1);
        assert_eq!(forecast.daily_summaries[0].min_temperature.value, -4.0);
    }

    #[test]
    fn forecast_intervals_are_chronological() {
        let parsed: OwForecastResponse = serde_json::from_str(
            r#"{
                "city": { "name": "Oslo", "timezone": 0 },
                "list": [
                    { "dt_txt": "2024-01-02 03:00:00",
                      "main": { "temp": 3, "feels_like": 1, "humidity": 80, "pressure": 1001 },
                      "wind": { "speed": 1 } },
                    { "dt_txt": "2024-01-01 21:00:00",
                      "main": { "temp": 1, "feels_like": 0, "humidity": 80, "pressure": 1001 },
                      "wind": { "speed": 1 } },
                    { "dt_txt": "2024-01-02 00:00:00",
                      "main": { "temp": 2, "feels_like": 0, "humidity": 80, "pressure": 1001 },
                      "wind": { "speed": 1 } }
                ]
            }"#,
        )
        .unwrap();

        let forecast = parsed.into_forecast(Units::Metric).unwrap();

        let stamps: Vec<String> = forecast
            .intervals
            .iter()
            .map(|i| i.date_time.format("%d %H").to_string())
            .collect();
        assert_eq!(stamps, ["01 21", "02 00", "02 03"]);
        assert_eq!(forecast.daily_summaries.len(), 2);
    }

    #[test]
    fn forecast_entry_without_timestamp_is_a_decode_error() {
        let parsed: OwForecastResponse = serde_json::from_str(
            r#"{
                "city": { "name": "Oslo" },
                "list": [
                    { "main": { "temp": 1, "feels_like": 1, "humidity": 80, "pressure": 1001 },
                      "wind": { "speed": 1 } }
                ]
            }"#,
        )
        .unwrap();

        assert!(matches!(
            parsed.into_forecast(Units::Metric),
            Err(FetchError::Decode(_))
        ));
    }

    #[test]
    fn api_error_prefers_upstream_message() {
        let err = api_error(
            StatusCode::NOT_FOUND,
            r#"{"cod":"404","message":"city not found"}"#,
        );
        let err = WeatherError::from(err);

        assert_eq!(err.code, ErrorCode::ApiError);
        assert_eq!(err.message, "city not found");
        assert_eq!(err.details.unwrap()["upstream_code"], "404");
    }

    #[test]
    fn api_error_synthesizes_message_from_status() {
        let err = WeatherError::from(api_error(StatusCode::BAD_GATEWAY, "<html>oops</html>"));

        assert_eq!(err.message, "HTTP 502: Bad Gateway");
        assert_eq!(err.details.unwrap()["status"], 502);
    }

    #[test]
    fn availability_follows_api_key() {
        assert!(!OpenWeatherProvider::new("").unwrap().is_available());
        assert!(!OpenWeatherProvider::new("  ").unwrap().is_available());
        assert!(OpenWeatherProvider::new("KEY").unwrap().is_available());
    }

    #[tokio::test]
    async fn blank_city_is_rejected_before_anything_else() {
        let provider = OpenWeatherProvider::new("").unwrap();

        for city in ["", "   ", "\t\n"] {
            let req = WeatherRequest::new(city);
            assert_eq!(
                provider.get_weather(&req).await.error_code(),
                Some(ErrorCode::InvalidCity)
            );
            assert_eq!(
                provider.get_forecast(&req).await.error_code(),
                Some(ErrorCode::InvalidCity)
            );
            assert_eq!(
                provider.get_combined_weather(&req).await.error_code(),
                Some(ErrorCode::InvalidCity)
            );
        }
    }

    #[tokio::test]
    async fn unavailable_is_reported_without_touching_the_network() {
        // Nothing listens on the discard port; a real request would be a NETWORK_ERROR.
        let provider = OpenWeatherProvider::builder("")
            .base_url("http://127.0.0.1:9")
            .build()
            .unwrap();

        let env = provider.get_weather(&WeatherRequest::new("Paris")).await;
        assert_eq!(env.error_code(), Some(ErrorCode::ProviderUnavailable));

        let env = provider.get_combined_weather(&WeatherRequest::new("Paris")).await;
        assert_eq!(env.error_code(), Some(ErrorCode::ProviderUnavailable));
    }
}
