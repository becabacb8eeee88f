use anyhow::{Context, Result};
use async_trait::async_trait;
use reqwest::header::{HeaderMap, HeaderName, HeaderValue};
use serde_json::Value;
use std::time::Duration;
use tracing::{debug, instrument};

use crate::core::config::ProviderConfig;
use crate::core::error::FetchError;
use crate::core::rate::{RateProvider, coerce_rate};

const USER_AGENT: &str = concat!("usd-rub-indicator/", env!("CARGO_PKG_VERSION"));

/// Fetches a JSON document over HTTP and extracts the rate from the first
/// configured JSON pointer present in the body.
pub struct JsonRateProvider {
    name: String,
    url: String,
    fields: Vec<String>,
    client: reqwest::Client,
}

impl JsonRateProvider {
    pub fn new(
        name: &str,
        url: &str,
        fields: &[&str],
        headers: &[(&str, &str)],
        timeout: Duration,
    ) -> Result<Self> {
        let mut header_map = HeaderMap::new();
        for (key, value) in headers {
            let header_name = HeaderName::from_bytes(key.as_bytes())
                .with_context(|| format!("Invalid header name '{key}' for provider {name}"))?;
            let header_value = HeaderValue::from_str(value)
                .with_context(|| format!("Invalid value for header '{key}' for provider {name}"))?;
            header_map.insert(header_name, header_value);
        }

        let client = reqwest::Client::builder()
            .user_agent(USER_AGENT)
            .default_headers(header_map)
            .timeout(timeout)
            .build()
            .with_context(|| format!("Failed to build HTTP client for provider {name}"))?;

        Ok(JsonRateProvider {
            name: name.to_string(),
            url: url.to_string(),
            fields: fields.iter().map(|f| f.to_string()).collect(),
            client,
        })
    }

    pub fn from_config(config: &ProviderConfig, timeout: Duration) -> Result<Self> {
        let fields: Vec<&str> = config.fields.iter().map(String::as_str).collect();
        let headers: Vec<(&str, &str)> = config
            .headers
            .iter()
            .map(|(k, v)| (k.as_str(), v.as_str()))
            .collect();
        Self::new(&config.name, &config.url, &fields, &headers, timeout)
    }

    fn extract(&self, body: &Value) -> Result<f64, FetchError> {
        let (field, value) = self
            .fields
            .iter()
            .find_map(|field| body.pointer(field).map(|value| (field, value)))
            .ok_or_else(|| {
                FetchError::parse(
                    &self.name,
                    format!("none of the fields {:?} found in response", self.fields),
                )
            })?;
        debug!(%field, %value, "Extracted rate field");
        coerce_rate(&self.name, value)
    }
}

#[async_trait]
impl RateProvider for JsonRateProvider {
    fn name(&self) -> &str {
        &self.name
    }

    #[instrument(name = "JsonRateFetch", skip(self), fields(provider = %self.name))]
    async fn fetch_rate(&self) -> Result<f64, FetchError> {
        debug!("Requesting rate from {}", self.url);

        let response = self.client.get(&self.url).send().await.map_err(|e| {
            if e.is_timeout() {
                FetchError::network(&self.name, format!("request to {} timed out", self.url))
            } else {
                FetchError::network(&self.name, format!("request to {} failed: {e}", self.url))
            }
        })?;

        let status = response.status();
        if !status.is_success() {
            return Err(FetchError::network(&self.name, format!("HTTP error: {status}")));
        }

        let text = response
            .text()
            .await
            .map_err(|e| FetchError::network(&self.name, format!("failed to read body: {e}")))?;

        let body: Value = serde_json::from_str(&text)
            .map_err(|e| FetchError::parse(&self.name, format!("invalid JSON response: {e}")))?;

        self.extract(&body)
    }
}
