//! Core library for the `weather` CLI.
//!
//! This crate defines:
//! - Configuration & credentials handling
//! - Abstraction over weather providers (mock and OpenWeather)
//! - Shared domain models (requests, observations, forecasts)
//! - The response envelope and its error taxonomy
//! - Per-key rate limiting and the [`WeatherService`] that ties it all together
//!
//! It is used by `weather-cli`, but can also be reused by other binaries or services.

pub mod config;
pub mod display;
pub mod envelope;
pub mod error;
pub mod model;
pub mod normalize;
pub mod provider;
pub mod rate_limit;
pub mod service;
pub mod validation;

pub use config::{Config, ProviderConfig};
pub use envelope::{ErrorCode, ResponseEnvelope, WeatherError};
pub use model::{
    CombinedWeather, Forecast, ForecastDaySummary, ForecastInterval, Units, WeatherObservation,
    WeatherRequest,
};
pub use provider::{ProviderId, WeatherProvider};
pub use rate_limit::{RateLimitConfig, RateLimitStatus, RateLimiter};
pub use service::{Operation, WeatherService};
