use serde_json::json;
use std::time::Duration;
use thiserror::Error;

use crate::envelope::{ErrorCode, WeatherError};

#[derive(Debug, Error)]
pub enum FetchError {
    /// Upstream answered with a non-success status.
    #[error("{message}")]
    Api {
        status: u16,
        status_text: String,
        message: String,
        upstream_code: Option<String>,
    },

    #[error("request timed out after {0:?}")]
    Timeout(Duration),

    #[error("network error: {0}")]
    Network(#[source] reqwest::Error),

    /// Upstream answered 2xx with a body we could not understand.
    #[error("malformed upstream response: {0}")]
    Decode(String),
}

impl FetchError {
    pub fn from_transport(err: reqwest::Error, timeout: Duration) -> Self {
        if err.is_timeout() {
            FetchError::Timeout(timeout)
        } else {
            FetchError::Network(err)
        }
    }
}

impl From<FetchError> for WeatherError {
    fn from(err: FetchError) -> Self {
        let message = err.to_string();
        match err {
            FetchError::Api {
                status,
                status_text,
                upstream_code,
                ..
            } => WeatherError::new(ErrorCode::ApiError, message).with_details(json!({
                "status": status,
                "status_text": status_text,
                "upstream_code": upstream_code,
            })),
            FetchError::Timeout(after) => WeatherError::new(ErrorCode::NetworkError, message)
                .with_details(json!({
                    "timeout": true,
                    "timeout_ms": after.as_millis() as u64,
                })),
            FetchError::Network(source) => WeatherError::new(ErrorCode::NetworkError, message)
                .with_details(json!({
                    "timeout": false,
                    "connect": source.is_connect(),
                })),
            FetchError::Decode(_) => WeatherError::new(ErrorCode::ApiError, message)
                .with_details(json!({ "reason": "decode" })),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn api_error_keeps_upstream_message_and_status() {
        let err: WeatherError = FetchError::Api {
            status: 404,
            status_text: "Not Found".into(),
            message: "city not found".into(),
            upstream_code: Some("404".into()),
        }
        .into();

        assert_eq!(err.code, ErrorCode::ApiError);
        assert_eq!(err.message, "city not found");

        let details = err.details.unwrap();
        assert_eq!(details["status"], 404);
        assert_eq!(details["upstream_code"], "404");
    }

    #[test]
    fn timeout_maps_to_network_error_with_subcode() {
        let err: WeatherError = FetchError::Timeout(Duration::from_secs(10)).into();

        assert_eq!(err.code, ErrorCode::NetworkError);
        assert!(err.code.is_retryable());
        assert_eq!(err.details.unwrap()["timeout"], true);
    }

    #[test]
    fn decode_maps_to_api_error() {
        let err: WeatherError = FetchError::Decode("missing field `main`".into()).into();

        assert_eq!(err.code, ErrorCode::ApiError);
        assert!(err.message.contains("missing field"));
    }
}
