use std::error::Error as StdError;

/// Boxed cause carried by collaborator failures.
pub type BoxedCause = Box<dyn StdError + Send + Sync>;

/// Custom error type for proxy-cache operations.
#[derive(Debug, thiserror::Error)]
pub enum ProxyCacheError {
    #[error("invalid read request: {0}")]
    InvalidArgument(String),

    #[error("offset {0} is outside the store's addressable range")]
    InvalidOffset(u64),

    #[error("cannot append to a completed store")]
    StoreCompleted,

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("failed to open source: {0}")]
    SourceOpen(#[source] BoxedCause),

    #[error("failed to read from source: {0}")]
    SourceRead(#[source] BoxedCause),

    #[error("failed to close source: {0}")]
    SourceClose(#[source] BoxedCause),

    #[error("interrupted by shutdown")]
    Interrupted,

    #[error("reading source failed {0} consecutive times")]
    SourceAttemptsExhausted(usize),
}

impl ProxyCacheError {
    /// Whether this failure is expected fallout of a shutdown rather than a
    /// genuine error.
    pub fn is_interruption(&self) -> bool {
        matches!(self, ProxyCacheError::Interrupted)
    }
}

/// Result of a proxy-cache operation.
pub type Result<T> = std::result::Result<T, ProxyCacheError>;
