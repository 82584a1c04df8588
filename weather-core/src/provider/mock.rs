use async_trait::async_trait;
use chrono::{DateTime, FixedOffset, NaiveTime, Utc};
use std::time::Duration;

use crate::{
    envelope::ResponseEnvelope,
    model::{Speed, Temperature, Units, WeatherObservation, WeatherRequest},
    normalize::round_half_up,
    provider::validate_request,
};

use super::WeatherProvider;

/// Offline provider returning a canned observation after a fixed delay.
#[derive(Debug, Clone)]
pub struct MockProvider {
    latency: Duration,
}

impl Default for MockProvider {
    fn default() -> Self {
        Self::with_latency(Duration::from_secs(1))
    }
}

impl MockProvider {
    pub fn with_latency(latency: Duration) -> Self {
        Self { latency }
    }
}

/// First letter upper-cased, the rest lower-cased.
pub fn capitalize_city(city: &str) -> String {
    let mut chars = city.chars();
    match chars.next() {
        Some(first) => first.to_uppercase().chain(chars.flat_map(char::to_lowercase)).collect(),
        None => String::new(),
    }
}

fn celsius_to_fahrenheit(c: f64) -> f64 {
    c * 9.0 / 5.0 + 32.0
}

fn today_at(hour: u32, minute: u32) -> Option<DateTime<FixedOffset>> {
    let time = NaiveTime::from_hms_opt(hour, minute, 0)?;
    Some(Utc::now().date_naive().and_time(time).and_utc().fixed_offset())
}

fn canned_observation(city: &str, units: Units) -> WeatherObservation {
    let (temp, feels_like, wind) = match units {
        Units::Metric => (22.0, 24.0, 3.3),
        Units::Imperial => (
            round_half_up(celsius_to_fahrenheit(22.0)),
            round_half_up(celsius_to_fahrenheit(24.0)),
            7.4,
        ),
    };

    WeatherObservation {
        city: capitalize_city(city),
        temperature: Temperature::new(temp, units.temperature_unit()),
        feels_like: Temperature::new(feels_like, units.temperature_unit()),
        description: "Partly Cloudy".to_string(),
        humidity_pct: 65,
        wind_speed: Speed::new(wind, units.speed_unit()),
        pressure_hpa: 1013.0,
        visibility_km: Some(10.0),
        uv_index: Some(5.0),
        sunrise: today_at(6, 30),
        sunset: today_at(19, 45),
        icon: Some("02d".to_string()),
        observed_at: Utc::now(),
    }
}

#[async_trait]
impl WeatherProvider for MockProvider {
    fn name(&self) -> &str {
        "Mock Weather Provider"
    }

    fn is_available(&self) -> bool {
        true
    }

    async fn get_weather(&self, request: &WeatherRequest) -> ResponseEnvelope<WeatherObservation> {
        if !self.latency.is_zero() {
            tokio::time::sleep(self.latency).await;
        }

        if let Err(err) = validate_request(request) {
            return ResponseEnvelope::fail(err);
        }

        ResponseEnvelope::ok(canned_observation(request.city.trim(), request.units))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::envelope::ErrorCode;

    fn provider() -> MockProvider {
        MockProvider::with_latency(Duration::ZERO)
    }

    #[test]
    fn capitalizes_first_letter_only() {
        assert_eq!(capitalize_city("paris"), "Paris");
        assert_eq!(capitalize_city("NEW YORK"), "New york");
        assert_eq!(capitalize_city("écija"), "Écija");
        assert_eq!(capitalize_city(""), "");
    }

    #[tokio::test]
    async fn returns_capitalized_trimmed_city() {
        for (input, expected) in [("  Paris  ", "Paris"), ("lONDON", "London"), ("oslo", "Oslo")] {
            let env = provider().get_weather(&WeatherRequest::new(input)).await;

            let data = env.data().expect("mock always succeeds for non-blank cities");
            assert_eq!(data.city, expected);
        }
    }

    #[tokio::test]
    async fn metric_observation_matches_canned_values() {
        let env = provider().get_weather(&WeatherRequest::new("Paris")).await;
        let data = env.data().unwrap();

        assert_eq!(data.temperature.to_string(), "22°C");
        assert_eq!(data.feels_like.to_string(), "24°C");
        assert_eq!(data.humidity_pct, 65);
        assert_eq!(data.description, "Partly Cloudy");
    }

    #[tokio::test]
    async fn imperial_observation_is_converted() {
        let req = WeatherRequest::new("Paris").with_units(Units::Imperial);
        let env = provider().get_weather(&req).await;
        let data = env.data().unwrap();

        assert_eq!(data.temperature.to_string(), "72°F");
        assert_eq!(data.wind_speed.to_string(), "7.4 mph");
    }

    #[tokio::test]
    async fn blank_city_is_invalid() {
        for city in ["", "   ", "\t"] {
            let env = provider().get_weather(&WeatherRequest::new(city)).await;
            assert_eq!(env.error_code(), Some(ErrorCode::InvalidCity));
        }
    }

    #[tokio::test]
    async fn blank_city_is_invalid_for_forecast_and_combined_too() {
        let p = provider();
        let req = WeatherRequest::new("   ");

        assert_eq!(p.get_forecast(&req).await.error_code(), Some(ErrorCode::InvalidCity));
        assert_eq!(
            p.get_combined_weather(&req).await.error_code(),
            Some(ErrorCode::InvalidCity)
        );
    }

    #[tokio::test]
    async fn forecast_is_unsupported() {
        let p = provider();
        assert!(!p.supports_forecast());

        let req = WeatherRequest::new("Paris");
        assert_eq!(p.get_forecast(&req).await.error_code(), Some(ErrorCode::Unsupported));
        assert_eq!(
            p.get_combined_weather(&req).await.error_code(),
            Some(ErrorCode::Unsupported)
        );
    }

    #[tokio::test(start_paused = true)]
    async fn simulates_latency() {
        let p = MockProvider::with_latency(Duration::from_millis(1000));
        let started = tokio::time::Instant::now();

        let env = p.get_weather(&WeatherRequest::new("Rome")).await;

        assert!(env.success());
        assert!(started.elapsed() >= Duration::from_millis(1000));
    }
}
