//! Rate abstractions, validation and display formatting

use crate::core::error::FetchError;
use async_trait::async_trait;
use serde_json::Value;

/// Text shown when a cycle produced no rate.
pub const FAILURE_TEXT: &str = "?";

/// One remote source able to yield a USD to RUB rate.
#[async_trait]
pub trait RateProvider: Send + Sync {
    fn name(&self) -> &str;

    /// Fetches and validates a single rate. Implementations must not retry
    /// internally; retries happen across cycles.
    async fn fetch_rate(&self) -> Result<f64, FetchError>;
}

/// The accepted rate of a cycle and the provider that produced it.
#[derive(Debug, Clone, PartialEq)]
pub struct RateReading {
    pub rate: f64,
    pub provider: String,
}

/// Outcome of one provider invocation within a cycle.
#[derive(Debug, Clone, PartialEq)]
pub struct FetchAttempt {
    pub provider: String,
    pub outcome: Result<f64, FetchError>,
}

/// Accepts a rate iff it is a finite number strictly greater than zero.
pub fn accept_rate(provider: &str, value: f64) -> Result<f64, FetchError> {
    if value.is_nan() {
        return Err(FetchError::parse(provider, "rate is NaN"));
    }
    if !value.is_finite() {
        return Err(FetchError::parse(provider, format!("rate {value} is not finite")));
    }
    if value <= 0.0 {
        return Err(FetchError::parse(
            provider,
            format!("rate {value} is not positive"),
        ));
    }
    Ok(value)
}

/// Coerces a JSON value to a float and validates it with [`accept_rate`].
///
/// Numbers are taken as-is; strings are parsed after trimming, so `"91.5"`
/// is accepted while `"abc"`, `null` or objects are not.
pub fn coerce_rate(provider: &str, value: &Value) -> Result<f64, FetchError> {
    let number = match value {
        Value::Number(n) => n
            .as_f64()
            .ok_or_else(|| FetchError::parse(provider, format!("{n} is not a float")))?,
        Value::String(s) => s
            .trim()
            .parse::<f64>()
            .map_err(|_| FetchError::parse(provider, format!("'{s}' is not numeric")))?,
        other => {
            return Err(FetchError::parse(
                provider,
                format!("expected a number, found {other}"),
            ));
        }
    };
    accept_rate(provider, number)
}

/// Renders a rate with two decimals and a comma separator, e.g. `91,23`.
pub fn format_rate(rate: f64) -> String {
    format!("{rate:.2}").replace('.', ",")
}

/// Panel text for a successful cycle.
pub fn format_display_text(rate: f64) -> String {
    format!("USD = {} RUB", format_rate(rate))
}
