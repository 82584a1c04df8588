use anyhow::{Result, anyhow};
use serde::Serialize;
use weather_core::{
    CombinedWeather, ErrorCode, Forecast, ResponseEnvelope, WeatherError, WeatherObservation,
    display::{CombinedView, DaySummaryView, ForecastView, ObservationView},
};

/// Print the envelope as JSON or via `render`; a failed lookup becomes an error.
pub fn emit<T: Serialize>(
    envelope: ResponseEnvelope<T>,
    json: bool,
    render: impl FnOnce(&T),
) -> Result<()> {
    if json {
        println!("{}", serde_json::to_string_pretty(&envelope)?);
    }

    match envelope.into_result() {
        Ok(data) => {
            if !json {
                render(&data);
            }
            Ok(())
        }
        Err(err) => Err(failure(err)),
    }
}

fn failure(err: WeatherError) -> anyhow::Error {
    match err.code {
        ErrorCode::NoProvider | ErrorCode::ProviderUnavailable => anyhow!(
            "{err}\nHint: run `weather configure <provider>` (e.g. `weather configure openweather`) first."
        ),
        _ => anyhow!("{err}"),
    }
}

fn observation_lines(view: &ObservationView) -> Vec<String> {
    vec![
        format!("{} {}  {}", view.icon, view.temperature, view.description),
        format!("  {}", view.feels_like),
        format!("  Humidity:   {}", view.humidity),
        format!("  Wind:       {}", view.wind_speed),
        format!("  Pressure:   {}", view.pressure),
        format!("  Visibility: {}", view.visibility),
        format!("  UV index:   {}", view.uv_index),
        format!("  Sunrise:    {}", view.sunrise),
        format!("  Sunset:     {}", view.sunset),
    ]
}

fn day_line(day: &DaySummaryView) -> String {
    format!(
        "  {}  {} {} / {}  {}",
        day.date, day.icon, day.min_temperature, day.max_temperature, day.description
    )
}

fn forecast_lines(view: &ForecastView) -> Vec<String> {
    let mut lines = vec![format!("Forecast for {}", view.city)];
    if view.daily_summaries.is_empty() {
        lines.push("  No forecast data".to_string());
    }
    lines.extend(view.daily_summaries.iter().map(day_line));
    lines
}

pub fn print_observation(obs: &WeatherObservation) {
    let view = ObservationView::from(obs);
    println!("Current weather in {}", view.city);
    for line in observation_lines(&view) {
        println!("{line}");
    }
}

pub fn print_forecast(forecast: &Forecast) {
    for line in forecast_lines(&ForecastView::from(forecast)) {
        println!("{line}");
    }
}

pub fn print_combined(combined: &CombinedWeather) {
    let view = CombinedView::from(combined);
    println!("Weather in {}", view.city);
    for line in observation_lines(&view.current) {
        println!("{line}");
    }
    println!();
    for line in forecast_lines(&view.forecast) {
        println!("{line}");
    }
    println!();
    println!("Last updated: {}", view.last_updated);
}
