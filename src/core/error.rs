//! Error types for rate fetching and update cycles.

use crate::core::rate::FetchAttempt;
use thiserror::Error;

/// A single provider failed to yield a usable rate.
///
/// Both variants are recoverable: the chain falls through to the next
/// provider.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum FetchError {
    /// Connection failure, timeout or non-success status code.
    #[error("Network error from {provider}: {message}")]
    Network { provider: String, message: String },

    /// The body was not JSON, or the rate field was missing, non-numeric,
    /// NaN or not strictly positive.
    #[error("Parse error from {provider}: {message}")]
    Parse { provider: String, message: String },
}

impl FetchError {
    pub fn network(provider: &str, message: impl Into<String>) -> Self {
        FetchError::Network {
            provider: provider.to_string(),
            message: message.into(),
        }
    }

    pub fn parse(provider: &str, message: impl Into<String>) -> Self {
        FetchError::Parse {
            provider: provider.to_string(),
            message: message.into(),
        }
    }

    pub fn provider(&self) -> &str {
        match self {
            FetchError::Network { provider, .. } | FetchError::Parse { provider, .. } => provider,
        }
    }
}

/// Why an update cycle ended without a rate.
///
/// The scheduler treats every variant the same way (show the failure text,
/// re-arm with the degraded interval); they differ only in how they are
/// logged.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum CycleError {
    /// Every registered provider failed. Carries one attempt per provider,
    /// in the order they were tried.
    #[error("No provider available after {} attempt(s){}", .attempts.len(), last_reason(.attempts))]
    AllProvidersExhausted { attempts: Vec<FetchAttempt> },

    /// Anything else that went wrong during the cycle, such as a panic
    /// inside a provider.
    #[error("Unexpected error during update cycle: {0}")]
    Unexpected(String),
}

impl CycleError {
    /// The last recorded provider failure, if any provider was tried.
    pub fn last_failure(&self) -> Option<&FetchError> {
        match self {
            CycleError::AllProvidersExhausted { attempts } => attempts
                .iter()
                .rev()
                .find_map(|attempt| attempt.outcome.as_ref().err()),
            CycleError::Unexpected(_) => None,
        }
    }
}

fn last_reason(attempts: &[FetchAttempt]) -> String {
    match attempts.iter().rev().find_map(|a| a.outcome.as_ref().err()) {
        Some(e) => format!(": {e}"),
        None => String::new(),
    }
}
