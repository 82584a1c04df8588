use futures::FutureExt;
use serde_json::json;
use std::{any::Any, fmt, future::Future, panic::AssertUnwindSafe, sync::Arc};
use tracing::{debug, error, warn};

use crate::{
    envelope::{ErrorCode, ResponseEnvelope, WeatherError},
    model::{CombinedWeather, Forecast, Units, WeatherObservation, WeatherRequest},
    provider::WeatherProvider,
    rate_limit::{RateLimitConfig, RateLimitStatus, RateLimiter},
    validation::{self, CityValidator},
};

/// Lookup kind; each has its own rate-limit budget per city.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Operation {
    Current,
    Forecast,
    Combined,
}

impl Operation {
    fn key_prefix(&self) -> &'static str {
        match self {
            Operation::Current => "current:",
            Operation::Forecast => "forecast:",
            Operation::Combined => "combined:",
        }
    }

    fn needs_forecast(&self) -> bool {
        !matches!(self, Operation::Current)
    }

    pub fn rate_limit_key(&self, city: &str) -> String {
        format!("{}{}", self.key_prefix(), city.trim().to_lowercase())
    }
}

pub struct WeatherService {
    provider: Option<Arc<dyn WeatherProvider>>,
    limiter: Arc<RateLimiter>,
    rate_limit: RateLimitConfig,
    city_validator: CityValidator,
}

impl fmt::Debug for WeatherService {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("WeatherService")
            .field("provider", &self.provider_name())
            .field("rate_limit", &self.rate_limit)
            .finish_non_exhaustive()
    }
}

impl WeatherService {
    pub fn new(provider: Arc<dyn WeatherProvider>, limiter: Arc<RateLimiter>) -> Self {
        Self {
            provider: Some(provider),
            limiter,
            rate_limit: RateLimitConfig::default(),
            city_validator: validation::non_blank(),
        }
    }

    /// A service that answers every lookup with `NO_PROVIDER`.
    pub fn without_provider(limiter: Arc<RateLimiter>) -> Self {
        Self {
            provider: None,
            limiter,
            rate_limit: RateLimitConfig::default(),
            city_validator: validation::non_blank(),
        }
    }

    pub fn with_rate_limit(mut self, rate_limit: RateLimitConfig) -> Self {
        self.rate_limit = rate_limit;
        self
    }

    pub fn with_city_validator(mut self, validator: CityValidator) -> Self {
        self.city_validator = validator;
        self
    }

    pub fn is_available(&self) -> bool {
        self.provider.as_ref().is_some_and(|p| p.is_available())
    }

    pub fn provider_name(&self) -> &str {
        self.provider.as_ref().map_or("None", |p| p.name())
    }

    pub fn supports_forecast(&self) -> bool {
        self.provider.as_ref().is_some_and(|p| p.supports_forecast())
    }

    /// Remaining budget for a lookup, without consuming it.
    pub fn rate_limit_status(&self, operation: Operation, city: &str) -> RateLimitStatus {
        self.limiter
            .status(&operation.rate_limit_key(city), &self.rate_limit)
    }

    pub async fn fetch_current(
        &self,
        city: &str,
        units: Units,
        lang: &str,
    ) -> ResponseEnvelope<WeatherObservation> {
        self.dispatch(Operation::Current, city, units, lang, |provider, request| async move {
            provider.get_weather(&request).await
        })
        .await
    }

    pub async fn fetch_forecast(
        &self,
        city: &str,
        units: Units,
        lang: &str,
    ) -> ResponseEnvelope<Forecast> {
        self.dispatch(Operation::Forecast, city, units, lang, |provider, request| async move {
            provider.get_forecast(&request).await
        })
        .await
    }

    pub async fn fetch_combined(
        &self,
        city: &str,
        units: Units,
        lang: &str,
    ) -> ResponseEnvelope<CombinedWeather> {
        self.dispatch(Operation::Combined, city, units, lang, |provider, request| async move {
            provider.get_combined_weather(&request).await
        })
        .await
    }

    fn admit(&self, operation: Operation, request: &WeatherRequest) -> Result<(), WeatherError> {
        let key = operation.rate_limit_key(&request.city);
        let Err(status) = self.limiter.try_admit(&key, &self.rate_limit) else {
            return Ok(());
        };

        let retry_secs = status.ms_until_reset.div_ceil(1000);
        warn!(%key, retry_after_ms = status.ms_until_reset, "lookup rate limited");

        Err(WeatherError::new(
            ErrorCode::RateLimited,
            format!("Too many requests. Please try again in {retry_secs} seconds."),
        )
        .with_details(json!({
            "retry_after_ms": status.ms_until_reset,
            "limit": self.rate_limit.max_requests,
            "window_ms": self.rate_limit.window_ms,
        })))
    }

    /// Gatekeeping shared by every lookup kind, in order: provider presence,
    /// availability, capability, city predicate, rate limit.
    fn prepare(
        &self,
        operation: Operation,
        city: &str,
        units: Units,
        lang: &str,
    ) -> Result<(Arc<dyn WeatherProvider>, WeatherRequest), WeatherError> {
        let provider = self.provider.clone().ok_or_else(|| {
            WeatherError::new(ErrorCode::NoProvider, "No weather provider available")
        })?;

        if !provider.is_available() {
            return Err(WeatherError::new(
                ErrorCode::ProviderUnavailable,
                format!("Weather provider {} is not available", provider.name()),
            ));
        }

        if operation.needs_forecast() && !provider.supports_forecast() {
            let capability = match operation {
                Operation::Combined => "combined weather",
                _ => "forecasts",
            };
            return Err(WeatherError::unsupported(provider.name(), capability));
        }

        let request = WeatherRequest::new(city).with_units(units).with_lang(lang);
        if !(self.city_validator)(&request.city) {
            return Err(WeatherError::invalid_city());
        }

        self.admit(operation, &request)?;
        Ok((provider, request))
    }

    async fn dispatch<T, F, Fut>(
        &self,
        operation: Operation,
        city: &str,
        units: Units,
        lang: &str,
        call: F,
    ) -> ResponseEnvelope<T>
    where
        F: FnOnce(Arc<dyn WeatherProvider>, WeatherRequest) -> Fut,
        Fut: Future<Output = ResponseEnvelope<T>>,
    {
        // Covers the injected city validator as well as the provider call.
        let guarded = AssertUnwindSafe(async {
            let (provider, request) = match self.prepare(operation, city, units, lang) {
                Ok(ready) => ready,
                Err(err) => {
                    debug!(?operation, code = %err.code, "lookup rejected before provider call");
                    return ResponseEnvelope::fail(err);
                }
            };
            call(provider, request).await
        });

        match guarded.catch_unwind().await {
            Ok(envelope) => envelope,
            Err(panic) => {
                let message = panic_message(panic.as_ref());
                error!(?operation, %message, "weather lookup panicked");
                ResponseEnvelope::fail(WeatherError::new(ErrorCode::ServiceError, message))
            }
        }
    }
}

fn panic_message(payload: &(dyn Any + Send)) -> String {
    payload
        .downcast_ref::<&str>()
        .map(|s| s.to_string())
        .or_else(|| payload.downcast_ref::<String>().cloned())
        .unwrap_or_else(|| "Failed to fetch weather data".to_string())
}
