use thiserror::Error;

/// Errors that can occur in the quickspace state core
#[derive(Error, Debug)]
pub enum StateError {
    /// The dispatch queue thread could not be spawned
    #[error("Failed to spawn dispatch queue: {0}")]
    WorkerSpawn(#[from] std::io::Error),

    /// The dispatch queue has shut down
    #[error("Dispatch queue has been closed")]
    QueueClosed,

    /// Configuration could not be parsed
    #[error("Invalid configuration: {0}")]
    Config(#[from] serde_json::Error),

    /// Error surfaced by a source adapter
    #[error("Source error: {0}")]
    Source(#[from] quickspace_sources::SourceError),
}

/// Result type for state core operations
pub type Result<T> = std::result::Result<T, StateError>;
