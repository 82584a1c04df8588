use crate::{
    Config,
    envelope::{ResponseEnvelope, WeatherError},
    model::{CombinedWeather, Forecast, WeatherObservation, WeatherRequest},
    provider::{mock::MockProvider, openweather::OpenWeatherProvider},
};
use async_trait::async_trait;
use std::{convert::TryFrom, fmt::Debug, future::Future, sync::Arc, time::Duration};
use tracing::info;

pub mod mock;
pub mod openweather;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ProviderId {
    Mock,
    OpenWeather,
}

impl ProviderId {
    pub fn as_str(&self) -> &'static str {
        match self {
            ProviderId::Mock => "mock",
            ProviderId::OpenWeather => "openweather",
        }
    }

    pub const fn all() -> &'static [ProviderId] {
        &[ProviderId::Mock, ProviderId::OpenWeather]
    }

    pub fn requires_api_key(&self) -> bool {
        matches!(self, ProviderId::OpenWeather)
    }
}

impl std::fmt::Display for ProviderId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl TryFrom<&str> for ProviderId {
    type Error = anyhow::Error;

    fn try_from(value: &str) -> Result<Self, Self::Error> {
        let lower = value.to_lowercase();

        match lower.as_str() {
            "mock" => Ok(ProviderId::Mock),
            "openweather" | "remote" => Ok(ProviderId::OpenWeather),
            _ => Err(anyhow::anyhow!(
                "Unknown provider '{value}'. Supported providers: mock, openweather."
            )),
        }
    }
}

/// A pluggable upstream weather source.
///
/// Forecast support is declared through [`WeatherProvider::supports_forecast`];
/// providers without it keep the default `get_forecast`, which answers `UNSUPPORTED`.
#[async_trait]
pub trait WeatherProvider: Send + Sync + Debug {
    fn name(&self) -> &str;

    fn is_available(&self) -> bool;

    fn supports_forecast(&self) -> bool {
        false
    }

    async fn get_weather(&self, request: &WeatherRequest) -> ResponseEnvelope<WeatherObservation>;

    async fn get_forecast(&self, request: &WeatherRequest) -> ResponseEnvelope<Forecast> {
        if let Err(err) = validate_request(request) {
            return ResponseEnvelope::fail(err);
        }
        ResponseEnvelope::fail(WeatherError::unsupported(self.name(), "forecasts"))
    }

    /// Current conditions and forecast fetched concurrently.
    async fn get_combined_weather(
        &self,
        request: &WeatherRequest,
    ) -> ResponseEnvelope<CombinedWeather> {
        if let Err(err) = validate_request(request) {
            return ResponseEnvelope::fail(err);
        }
        if !self.supports_forecast() {
            return ResponseEnvelope::fail(WeatherError::unsupported(
                self.name(),
                "combined weather",
            ));
        }
        combine(self.get_weather(request), self.get_forecast(request)).await
    }
}

/// Join both lookups, failing with whichever error arrives first.
///
/// The sibling lookup is dropped as soon as one side fails.
pub async fn combine<C, F>(current: C, forecast: F) -> ResponseEnvelope<CombinedWeather>
where
    C: Future<Output = ResponseEnvelope<WeatherObservation>>,
    F: Future<Output = ResponseEnvelope<Forecast>>,
{
    let joined = futures::future::try_join(
        async { current.await.into_result() },
        async { forecast.await.into_result() },
    )
    .await;

    joined
        .map(|(current, forecast)| CombinedWeather::new(current, forecast))
        .into()
}

/// Shared request check run by every provider before doing any work.
pub fn validate_request(request: &WeatherRequest) -> Result<(), WeatherError> {
    if request.has_city() {
        Ok(())
    } else {
        Err(WeatherError::invalid_city())
    }
}

/// Construct a provider from config and explicit ProviderId.
///
/// OpenWeather without an API key is still built; it reports itself unavailable.
pub fn provider_from_config(
    id: ProviderId,
    config: &Config,
) -> anyhow::Result<Arc<dyn WeatherProvider>> {
    let provider: Arc<dyn WeatherProvider> = match id {
        ProviderId::Mock => Arc::new(MockProvider::with_latency(Duration::from_millis(
            config.mock_latency_ms,
        ))),
        ProviderId::OpenWeather => {
            let api_key = config.provider_api_key(id).unwrap_or_default();
            let mut provider = OpenWeatherProvider::builder(api_key)
                .timeout(Duration::from_secs(config.request_timeout_secs));
            if let Some(base_url) = config.provider_base_url(id) {
                provider = provider.base_url(base_url);
            }
            Arc::new(provider.build()?)
        }
    };

    info!(provider = provider.name(), available = provider.is_available(), "provider selected");
    Ok(provider)
}

/// Construct the default provider from config, using `default_provider` field.
pub fn default_provider_from_config(config: &Config) -> anyhow::Result<Arc<dyn WeatherProvider>> {
    let id = config.default_provider_id()?;
    provider_from_config(id, config)
}
