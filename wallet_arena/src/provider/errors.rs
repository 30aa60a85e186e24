//! Error types for balance snapshot providers

use thiserror::Error;

/// Result type for provider operations
pub type ProviderResult<T> = Result<T, ProviderError>;

/// One failed provider in a failover chain
#[derive(Debug, Clone)]
pub struct ProviderAttempt {
    /// Provider name
    pub provider: String,
    /// Error the provider returned
    pub error: String,
}

/// Balance provider errors
#[derive(Debug, Error)]
pub enum ProviderError {
    /// Provider could not be reached or returned a non-success response
    #[error("Provider {provider} unreachable: {message}")]
    Unreachable { provider: String, message: String },

    /// Provider responded but the payload could not be interpreted
    #[error("Provider {provider} returned malformed response: {message}")]
    MalformedResponse { provider: String, message: String },

    /// Address failed validation before any provider was contacted
    #[error("Invalid wallet address: {0}")]
    InvalidAddress(String),

    /// Every provider in the failover chain failed
    #[error("All balance providers failed: {}", format_attempts(attempts))]
    AllProvidersFailed { attempts: Vec<ProviderAttempt> },
}

fn format_attempts(attempts: &[ProviderAttempt]) -> String {
    attempts
        .iter()
        .map(|a| format!("{}: {}", a.provider, a.error))
        .collect::<Vec<_>>()
        .join("; ")
}
