//! Error types shared by the alerting engine and its collaborators

use std::time::Duration;

/// Failure of a single evaluation attempt
///
/// Every variant is retryable by the result loop; the variant only changes
/// the description written when retries are exhausted.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum EvalError {
    #[error("Timeout after {0:?}")]
    Timeout(Duration),

    #[error("{0}")]
    Query(String),

    #[error("Invalid rule: {0}")]
    InvalidRule(String),

    #[error("Executor stopped without producing a result")]
    Aborted,
}

/// Engine lifecycle and queue errors
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum EngineError {
    #[error("Engine already started")]
    AlreadyStarted,

    #[error("Engine is shutting down")]
    ShuttingDown,

    #[error("Job queue closed")]
    QueueClosed,
}

/// Rule source errors
#[derive(Debug, thiserror::Error)]
pub enum RuleSourceError {
    #[error("Failed to read rules: {0}")]
    Io(#[from] std::io::Error),

    #[error("Failed to parse rules: {0}")]
    Parse(#[from] serde_json::Error),
}

/// State sink errors
#[derive(Debug, thiserror::Error)]
pub enum SinkError {
    #[error("Failed to persist alert state: {0}")]
    Persist(String),
}

/// Synthetic tick errors
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum TickError {
    #[error("Tick {next} is not after previous tick {previous}")]
    NotMonotonic {
        previous: chrono::DateTime<chrono::Utc>,
        next: chrono::DateTime<chrono::Utc>,
    },

    #[error("Ticker dropped")]
    Closed,
}
