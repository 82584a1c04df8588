use serde::{Deserialize, Deserializer, Serialize, Serializer};
use serde_json::Value;
use std::fmt;

/// Failure tag carried by [`WeatherError`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ErrorCode {
    InvalidCity,
    ProviderUnavailable,
    NoProvider,
    Unsupported,
    RateLimited,
    ApiError,
    NetworkError,
    ServiceError,
}

impl ErrorCode {
    pub fn as_str(&self) -> &'static str {
        match self {
            ErrorCode::InvalidCity => "INVALID_CITY",
            ErrorCode::ProviderUnavailable => "PROVIDER_UNAVAILABLE",
            ErrorCode::NoProvider => "NO_PROVIDER",
            ErrorCode::Unsupported => "UNSUPPORTED",
            ErrorCode::RateLimited => "RATE_LIMITED",
            ErrorCode::ApiError => "API_ERROR",
            ErrorCode::NetworkError => "NETWORK_ERROR",
            ErrorCode::ServiceError => "SERVICE_ERROR",
        }
    }

    /// Whether a caller may reasonably retry the same request later.
    pub fn is_retryable(&self) -> bool {
        matches!(self, ErrorCode::RateLimited | ErrorCode::NetworkError)
    }
}

impl fmt::Display for ErrorCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WeatherError {
    pub message: String,
    pub code: ErrorCode,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub details: Option<Value>,
}

impl WeatherError {
    pub fn new(code: ErrorCode, message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            code,
            details: None,
        }
    }

    pub fn with_details(mut self, details: Value) -> Self {
        self.details = Some(details);
        self
    }

    pub fn invalid_city() -> Self {
        Self::new(ErrorCode::InvalidCity, "City name is required")
    }

    pub fn unavailable(provider: &str) -> Self {
        Self::new(
            ErrorCode::ProviderUnavailable,
            format!("{provider} provider is not available. Please check API key configuration."),
        )
    }

    pub fn unsupported(provider: &str, capability: &str) -> Self {
        Self::new(
            ErrorCode::Unsupported,
            format!("{provider} does not support {capability}"),
        )
    }
}

impl fmt::Display for WeatherError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[{}] {}", self.code, self.message)
    }
}

impl std::error::Error for WeatherError {}

/// Either data or an error, never both and never neither.
///
/// Serialized as `{ "success": bool, "data": T | null, "error": WeatherError | null }`.
#[derive(Debug, Clone, PartialEq)]
pub struct ResponseEnvelope<T> {
    inner: Result<T, WeatherError>,
}

impl<T> ResponseEnvelope<T> {
    pub fn ok(data: T) -> Self {
        Self { inner: Ok(data) }
    }

    pub fn fail(error: WeatherError) -> Self {
        Self { inner: Err(error) }
    }

    pub fn success(&self) -> bool {
        self.inner.is_ok()
    }

    pub fn data(&self) -> Option<&T> {
        self.inner.as_ref().ok()
    }

    pub fn error(&self) -> Option<&WeatherError> {
        self.inner.as_ref().err()
    }

    pub fn error_code(&self) -> Option<ErrorCode> {
        self.error().map(|e| e.code)
    }

    pub fn into_result(self) -> Result<T, WeatherError> {
        self.inner
    }

    pub fn map<U>(self, f: impl FnOnce(T) -> U) -> ResponseEnvelope<U> {
        ResponseEnvelope {
            inner: self.inner.map(f),
        }
    }
}

impl<T> From<Result<T, WeatherError>> for ResponseEnvelope<T> {
    fn from(inner: Result<T, WeatherError>) -> Self {
        Self { inner }
    }
}

#[derive(Serialize)]
struct EnvelopeRef<'a, T> {
    success: bool,
    data: Option<&'a T>,
    error: Option<&'a WeatherError>,
}

#[derive(Deserialize)]
struct RawEnvelope<T> {
    success: bool,
    data: Option<T>,
    error: Option<WeatherError>,
}

impl<T: Serialize> Serialize for ResponseEnvelope<T> {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        EnvelopeRef {
            success: self.success(),
            data: self.data(),
            error: self.error(),
        }
        .serialize(serializer)
    }
}

impl<'de, T: Deserialize<'de>> Deserialize<'de> for ResponseEnvelope<T> {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let raw = RawEnvelope::<T>::deserialize(deserializer)?;
        match (raw.success, raw.data, raw.error) {
            (true, Some(data), None) => Ok(Self::ok(data)),
            (false, None, Some(error)) => Ok(Self::fail(error)),
            (success, data, error) => Err(serde::de::Error::custom(format!(
                "inconsistent envelope: success={success}, data present={}, error present={}",
                data.is_some(),
                error.is_some()
            ))),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn ok_envelope_has_only_data() {
        let env = ResponseEnvelope::ok(5);

        assert!(env.success());
        assert_eq!(env.data(), Some(&5));
        assert!(env.error().is_none());
    }

    #[test]
    fn failed_envelope_has_only_error() {
        let env: ResponseEnvelope<u8> = ResponseEnvelope::fail(WeatherError::invalid_city());

        assert!(!env.success());
        assert!(env.data().is_none());
        assert_eq!(env.error_code(), Some(ErrorCode::InvalidCity));
    }

    #[test]
    fn serializes_to_success_data_error_shape() {
        let env = ResponseEnvelope::ok("sunny");
        assert_eq!(
            serde_json::to_value(&env).unwrap(),
            json!({ "success": true, "data": "sunny", "error": null })
        );

        let env: ResponseEnvelope<String> = ResponseEnvelope::fail(
            WeatherError::new(ErrorCode::RateLimited, "slow down")
                .with_details(json!({ "retry_after_ms": 1500 })),
        );
        assert_eq!(
            serde_json::to_value(&env).unwrap(),
            json!({
                "success": false,
                "data": null,
                "error": {
                    "message": "slow down",
                    "code": "RATE_LIMITED",
                    "details": { "retry_after_ms": 1500 }
                }
            })
        );
    }

    #[test]
    fn deserialize_rejects_inconsistent_envelopes() {
        let both = json!({
            "success": true,
            "data": 1,
            "error": { "message": "x", "code": "API_ERROR" }
        });
        assert!(serde_json::from_value::<ResponseEnvelope<u32>>(both).is_err());

        let neither = json!({ "success": false, "data": null, "error": null });
        assert!(serde_json::from_value::<ResponseEnvelope<u32>>(neither).is_err());

        let good = json!({ "success": false, "error": { "message": "x", "code": "API_ERROR" } });
        let env: ResponseEnvelope<u32> = serde_json::from_value(good).unwrap();
        assert_eq!(env.error_code(), Some(ErrorCode::ApiError));
    }

    #[test]
    fn retryable_codes() {
        assert!(ErrorCode::RateLimited.is_retryable());
        assert!(ErrorCode::NetworkError.is_retryable());
        assert!(!ErrorCode::InvalidCity.is_retryable());
        assert!(!ErrorCode::Unsupported.is_retryable());
    }
}
