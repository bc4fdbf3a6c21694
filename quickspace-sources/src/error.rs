use thiserror::Error;

use crate::adapter::SourceKind;

/// Errors returned by provider implementations
///
/// Providers are external collaborators; these variants describe what an
/// implementation can report back to an adapter.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ProviderError {
    /// The backing service is not present on this device
    #[error("Provider unavailable: {0}")]
    Unavailable(String),

    /// Callback or observer registration was rejected
    #[error("Registration rejected: {0}")]
    Registration(String),

    /// A pull query failed
    #[error("Query failed: {0}")]
    Query(String),
}

/// Errors that can occur inside a source adapter
///
/// None of these are fatal to the aggregation core. Adapters log them and
/// degrade to "field absent" or "stale value retained".
#[derive(Error, Debug)]
pub enum SourceError {
    /// No provider was injected for this source
    #[error("No {0} provider present")]
    ProviderUnavailable(SourceKind),

    /// The provider is switched off and its contribution should be cleared
    #[error("{0} provider is disabled")]
    ProviderDisabled(SourceKind),

    /// A pull query failed; prior state is retained
    #[error("Transient {kind} query failure: {message}")]
    TransientQueryFailure { kind: SourceKind, message: String },

    /// Subscribing to the provider failed
    #[error("Failed to register with {kind} provider: {source}")]
    Registration {
        kind: SourceKind,
        #[source]
        source: ProviderError,
    },

    /// The dispatch queue behind the sink has shut down
    #[error("Dispatch queue has been closed")]
    QueueClosed,
}

/// Result type for source adapter operations
pub type Result<T> = std::result::Result<T, SourceError>;
