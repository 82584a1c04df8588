use std::sync::Arc;

use anyhow::{Context, Result};
use clap::{Args, Parser, Subcommand};
use inquire::{CustomUserError, Password, PasswordDisplayMode, validator::Validation};
use tracing::{info, warn};
use weather_core::{
    Config, ProviderId, RateLimiter, Units, WeatherProvider, WeatherService,
    provider::{default_provider_from_config, provider_from_config},
};

use crate::output;

/// Top-level CLI struct.
#[derive(Debug, Parser)]
#[command(name = "weather", version, about = "Weather CLI")]
pub struct Cli {
    /// Log progress to stderr.
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// Use this provider instead of the configured default.
    #[arg(long, global = true)]
    pub provider: Option<String>,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Debug, Subcommand)]
pub enum Command {
    /// Configure credentials for a provider and make it the default.
    Configure {
        /// Provider short name, e.g. "mock" or "openweather".
        provider: String,
    },

    /// List known providers and whether they are configured.
    Providers,

    /// Show current conditions for a city.
    Current(LookupArgs),

    /// Show the multi-day forecast for a city.
    Forecast(LookupArgs),

    /// Show current conditions and the forecast together.
    Combined(LookupArgs),
}

#[derive(Debug, Args)]
pub struct LookupArgs {
    /// City name, e.g. "Paris" or "New York".
    pub city: String,

    /// "metric" or "imperial".
    #[arg(long, default_value = "metric", value_parser = parse_units)]
    pub units: Units,

    /// Language code for condition descriptions.
    #[arg(long, default_value = "en")]
    pub lang: String,

    /// Print the raw response envelope as JSON.
    #[arg(long)]
    pub json: bool,
}

fn parse_units(value: &str) -> Result<Units, String> {
    value.parse::<Units>().map_err(|e| e.to_string())
}

impl Cli {
    pub async fn run(self) -> Result<()> {
        match &self.command {
            Command::Configure { provider } => configure(provider),
            Command::Providers => list_providers(),
            Command::Current(args) => {
                let service = self.service()?;
                let envelope = service.fetch_current(&args.city, args.units, &args.lang).await;
                output::emit(envelope, args.json, output::print_observation)
            }
            Command::Forecast(args) => {
                let service = self.service()?;
                let envelope = service.fetch_forecast(&args.city, args.units, &args.lang).await;
                output::emit(envelope, args.json, output::print_forecast)
            }
            Command::Combined(args) => {
                let service = self.service()?;
                let envelope = service.fetch_combined(&args.city, args.units, &args.lang).await;
                output::emit(envelope, args.json, output::print_combined)
            }
        }
    }

    /// Wire the service from config; no usable provider yields a service that
    /// answers `NO_PROVIDER`.
    fn service(&self) -> Result<WeatherService> {
        let config = Config::load()?;
        let limiter = Arc::new(RateLimiter::new());

        let service = match self.select_provider(&config)? {
            Some(provider) => WeatherService::new(provider, limiter),
            None => WeatherService::without_provider(limiter),
        };
        Ok(service.with_rate_limit(config.rate_limit))
    }

    fn select_provider(&self, config: &Config) -> Result<Option<Arc<dyn WeatherProvider>>> {
        if let Some(name) = &self.provider {
            let id = ProviderId::try_from(name.as_str())?;
            return provider_from_config(id, config).map(Some);
        }

        match default_provider_from_config(config) {
            Ok(provider) => Ok(Some(provider)),
            Err(err) => {
                warn!(error = %err, "no usable default provider");
                Ok(None)
            }
        }
    }
}

fn configure(provider: &str) -> Result<()> {
    let id = ProviderId::try_from(provider)?;
    let mut config = Config::load()?;

    if id.requires_api_key() {
        let api_key = Password::new(&format!("API key for {id}:"))
            .with_display_mode(PasswordDisplayMode::Masked)
            .without_confirmation()
            .with_validator(|input: &str| -> Result<Validation, CustomUserError> {
                if input.trim().is_empty() {
                    Ok(Validation::Invalid("API key cannot be empty".into()))
                } else {
                    Ok(Validation::Valid)
                }
            })
            .prompt()
            .context("Failed to read API key")?;

        config.upsert_provider_api_key(id, api_key.trim().to_string());
    }

    config.set_default_provider(id);
    config.save()?;
    info!(provider = %id, "configuration saved");

    println!("Provider '{id}' configured and set as default.");
    println!("Config file: {}", Config::config_file_path()?.display());
    Ok(())
}

fn list_providers() -> Result<()> {
    let config = Config::load()?;
    let default = config.default_provider_id().ok();

    for &id in ProviderId::all() {
        let marker = if default == Some(id) { "*" } else { " " };
        let state = if config.is_provider_configured(id) {
            "configured"
        } else {
            "needs API key"
        };
        println!("{marker} {:<12} {state}", id.as_str());
    }
    Ok(())
}
