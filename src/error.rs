use thiserror::Error;

/// Failures the engine's callers need to tell apart.
///
/// Transient chain I/O errors inside the schedulers never surface here —
/// they are logged and retried on the next tick. This type covers the
/// synchronous entry points (start/stop, one-off analysis, watchlist edits).
#[derive(Debug, Error)]
pub enum EngineError {
    #[error("invalid address '{0}'")]
    InvalidAddress(String),

    #[error("invalid transaction hash '{0}'")]
    InvalidHash(String),

    #[error("chain unavailable: {0}")]
    ChainUnavailable(String),

    #[error("transaction not found: {0}")]
    TransactionNotFound(String),

    #[error("storage error: {0}")]
    Storage(String),
}

pub type EngineResult<T> = Result<T, EngineError>;
