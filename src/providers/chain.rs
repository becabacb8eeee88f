use anyhow::Result;
use tracing::{debug, error, warn};

use crate::core::config::AppConfig;
use crate::core::error::CycleError;
use crate::core::rate::{FetchAttempt, RateProvider, RateReading};
use crate::providers::http_json::JsonRateProvider;

/// Providers tried in registration order; the first valid rate wins.
///
/// Order is fixed for every cycle. There is no round-robin, so a healthy
/// first provider is always the one queried.
pub struct ProviderChain {
    providers: Vec<Box<dyn RateProvider>>,
}

impl ProviderChain {
    pub fn new(providers: Vec<Box<dyn RateProvider>>) -> Self {
        ProviderChain { providers }
    }

    pub fn from_config(config: &AppConfig) -> Result<Self> {
        let timeout = config.request_timeout();
        let providers = config
            .providers
            .iter()
            .map(|p| {
                JsonRateProvider::from_config(p, timeout)
                    .map(|provider| Box::new(provider) as Box<dyn RateProvider>)
            })
            .collect::<Result<Vec<_>>>()?;
        Ok(ProviderChain::new(providers))
    }

    pub fn len(&self) -> usize {
        self.providers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.providers.is_empty()
    }

    pub fn provider_names(&self) -> Vec<&str> {
        self.providers.iter().map(|p| p.name()).collect()
    }

    pub async fn fetch_rate(&self) -> Result<RateReading, CycleError> {
        let mut attempts: Vec<FetchAttempt> = Vec::with_capacity(self.providers.len());

        for provider in &self.providers {
            let name = provider.name();
            debug!(provider = %name, "Trying rate provider");

            match provider.fetch_rate().await {
                Ok(rate) => {
                    debug!(
                        provider = %name,
                        rate,
                        failed_before = attempts.len(),
                        "Provider returned a valid rate"
                    );
                    return Ok(RateReading {
                        rate,
                        provider: name.to_string(),
                    });
                }
                Err(e) => {
                    warn!(provider = %name, error = %e, "Provider failed, trying next provider");
                    attempts.push(FetchAttempt {
                        provider: name.to_string(),
                        outcome: Err(e),
                    });
                }
            }
        }

        let err = CycleError::AllProvidersExhausted { attempts };
        error!(error = %err, "All rate providers failed");
        Err(err)
    }
}


#[cfg(test)]
mod tests {
    use super::test_support::ScriptedProvider;
    use super::*;
    use crate::core::error::FetchError;
    use std::sync::atomic::Ordering;
    use std::time::Duration;
    use wiremock::matchers::{method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    #[tokio::test]
    async fn test_first_success_wins_and_later_providers_are_skipped() {
        let a = ScriptedProvider::failing("a");
        let b = ScriptedProvider::ok("b", 88.0);
        let c = ScriptedProvider::ok("c", 99.0);
        let (a_calls, b_calls, c_calls) = (a.calls.clone(), b.calls.clone(), c.calls.clone());

        let chain = ProviderChain::new(vec![Box::new(a), Box::new(b), Box::new(c)]);
        let reading = chain.fetch_rate().await.unwrap();

        assert_eq!(
            reading,
            RateReading {
                rate: 88.0,
                provider: "b".to_string()
            }
        );
        assert_eq!(a_calls.load(Ordering::SeqCst), 1);
        assert_eq!(b_calls.load(Ordering::SeqCst), 1);
        assert_eq!(c_calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_order_is_fixed_across_cycles() {
        let a = ScriptedProvider::ok("a", 90.0);
        let b = ScriptedProvider::ok("b", 91.0);
        let b_calls = b.calls.clone();
        let chain = ProviderChain::new(vec![Box::new(a), Box::new(b)]);

        for _ in 0..3 {
            assert_eq!(chain.fetch_rate().await.unwrap().provider, "a");
        }
        assert_eq!(b_calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_all_failing_reports_last_reason() {
        let a = ScriptedProvider::failing("a");
        let b = ScriptedProvider::new("b", vec![Err(FetchError::parse("b", "rate 0 is not positive"))]);
        let chain = ProviderChain::new(vec![Box::new(a), Box::new(b)]);

        let err = chain.fetch_rate().await.unwrap_err();
        assert_eq!(
            err,
            CycleError::AllProvidersExhausted {
                attempts: vec![
                    FetchAttempt {
                        provider: "a".to_string(),
                        outcome: Err(FetchError::network("a", "connection refused")),
                    },
                    FetchAttempt {
                        provider: "b".to_string(),
                        outcome: Err(FetchError::parse("b", "rate 0 is not positive")),
                    },
                ],
            }
        );
        assert_eq!(
            err.last_failure(),
            Some(&FetchError::parse("b", "rate 0 is not positive"))
        );
    }

    #[tokio::test]
    async fn test_empty_chain_is_exhausted() {
        let chain = ProviderChain::new(vec![]);
        assert!(chain.is_empty());
        let err = chain.fetch_rate().await.unwrap_err();
        assert_eq!(err, CycleError::AllProvidersExhausted { attempts: vec![] });
    }

    async fn mount(server: &MockServer, route: &str, response: ResponseTemplate) {
        Mock::given(method("GET"))
            .and(path(route))
            .respond_with(response)
            .mount(server)
            .await;
    }

    fn http_chain(server: &MockServer, timeout: Duration) -> ProviderChain {
        let provider = |name: &str, route: &str, fields: &[&str]| -> Box<dyn RateProvider> {
            Box::new(
                JsonRateProvider::new(
                    name,
                    &format!("{}{}", server.uri(), route),
                    fields,
                    &[],
                    timeout,
                )
                .unwrap(),
            )
        };
        ProviderChain::new(vec![
            provider("a", "/a", &["/rates/RUB"]),
            provider("b", "/b", &["/rates/RUB"]),
            provider("c", "/c", &["/rub", "/RUB"]),
        ])
    }

    #[tokio::test]
    async fn test_timeout_falls_through_to_next_provider() {
        let server = MockServer::start().await;
        mount(
            &server,
            "/a",
            ResponseTemplate::new(200)
                .set_body_string(r#"{"rates": {"RUB": 91.23}}"#)
                .set_delay(Duration::from_millis(500)),
        )
        .await;
        mount(
            &server,
            "/b",
            ResponseTemplate::new(200).set_body_string(r#"{"rates": {"RUB": 88.0}}"#),
        )
        .await;
        Mock::given(method("GET"))
            .and(path("/c"))
            .respond_with(ResponseTemplate::new(200).set_body_string(r#"{"rub": 1.0}"#))
            .expect(0)
            .mount(&server)
            .await;

        let chain = http_chain(&server, Duration::from_millis(100));
        let reading = chain.fetch_rate().await.unwrap();
        assert_eq!(reading.rate, 88.0);
        assert_eq!(reading.provider, "b");
    }

    #[tokio::test]
    async fn test_all_http_providers_malformed() {
        let server = MockServer::start().await;
        for route in ["/a", "/b", "/c"] {
            mount(&server, route, ResponseTemplate::new(200).set_body_string("not json")).await;
        }

        let chain = http_chain(&server, Duration::from_secs(10));
        let err = chain.fetch_rate().await.unwrap_err();
        match err {
            CycleError::AllProvidersExhausted { ref attempts } => {
                let providers: Vec<&str> = attempts.iter().map(|a| a.provider.as_str()).collect();
                assert_eq!(providers, vec!["a", "b", "c"]);
                assert!(attempts.iter().all(|a| matches!(a.outcome, Err(FetchError::Parse { .. }))));
                assert_eq!(err.last_failure().map(|e| e.provider()), Some("c"));
            }
            other => panic!("Unexpected error: {other:?}"),
        }
    }

    #[test]
    fn test_from_config_registers_providers_in_order() {
        let chain = ProviderChain::from_config(&AppConfig::default()).unwrap();
        assert_eq!(
            chain.provider_names(),
            vec!["open-er-api", "exchangerate-api", "coingecko"]
        );
        assert_eq!(chain.len(), 3);
    }
}
