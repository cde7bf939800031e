//! Error types for the domsync system
//!
//! Adapter-level failures (`ProviderUnavailable`, `ProviderApi`, `Parse`,
//! `Config`) are recoverable: adapters log them and hand back an empty or
//! unknown-valued result instead of propagating them to the scheduler.
//! Everything else is a genuine failure of the local system.

use thiserror::Error;

/// Result type alias for domsync operations
pub type Result<T> = std::result::Result<T, Error>;

/// Core error type for the domsync system
#[derive(Error, Debug)]
pub enum Error {
    /// Upstream unreachable, timed out, or answered with a non-200 status
    #[error("Provider unavailable ({provider}): {message}")]
    ProviderUnavailable {
        /// Provider name
        provider: String,
        /// Error message
        message: String,
    },

    /// Well-formed response carrying a non-success result code
    #[error("Provider API error ({provider}): result code {code}")]
    ProviderApi {
        /// Provider name
        provider: String,
        /// Result code reported by the provider
        code: String,
    },

    /// A field or document could not be parsed
    #[error("Parse error: {0}")]
    Parse(String),

    /// Missing credentials, missing file, or invalid configuration
    #[error("Configuration error: {0}")]
    Config(String),

    /// Task store-related errors
    #[error("Task store error: {0}")]
    TaskStore(String),

    /// Domain sink (persistence collaborator) errors
    #[error("Domain sink error: {0}")]
    DomainSink(String),

    /// Task or domain not found
    #[error("Not found: {0}")]
    NotFound(String),

    /// I/O errors
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON serialization/deserialization errors
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// Generic error with context
    #[error("{0}")]
    Other(String),
}

impl Error {
    /// Create a provider-unavailable error
    pub fn unavailable(provider: impl Into<String>, message: impl Into<String>) -> Self {
        Self::ProviderUnavailable {
            provider: provider.into(),
            message: message.into(),
        }
    }

    /// Create a provider API error from a result code
    pub fn provider_api(provider: impl Into<String>, code: impl Into<String>) -> Self {
        Self::ProviderApi {
            provider: provider.into(),
            code: code.into(),
        }
    }

    /// Create a parse error
    pub fn parse(msg: impl Into<String>) -> Self {
        Self::Parse(msg.into())
    }

    /// Create a configuration error
    pub fn config(msg: impl Into<String>) -> Self {
        Self::Config(msg.into())
    }

    /// Create a task store error
    pub fn task_store(msg: impl Into<String>) -> Self {
        Self::TaskStore(msg.into())
    }

    /// Create a domain sink error
    pub fn domain_sink(msg: impl Into<String>) -> Self {
        Self::DomainSink(msg.into())
    }

    /// Create a "not found" error
    pub fn not_found(msg: impl Into<String>) -> Self {
        Self::NotFound(msg.into())
    }

    /// Whether this error belongs to the adapter-level taxonomy, which is
    /// logged and degraded rather than propagated
    pub fn is_recoverable(&self) -> bool {
        matches!(
            self,
            Self::ProviderUnavailable { .. } | Self::ProviderApi { .. } | Self::Parse(_) | Self::Config(_)
        )
    }
}

/// Helper for converting anyhow::Error to our Error type
impl From<anyhow::Error> for Error {
    fn from(err: anyhow::Error) -> Self {
        Self::Other(err.to_string())
    }
}
