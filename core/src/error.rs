use crate::types::{CustomerId, InterventionId};
use thiserror::Error;

#[derive(Error, Debug)]
pub enum AgentError {
    #[error("Database error: {0}")]
    Database(#[from] rusqlite::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("Scoring failed: {0}")]
    Scoring(String),

    #[error("Pattern retrieval failed: {0}")]
    Retrieval(String),

    #[error("Strategy advisor unavailable: {0}")]
    AdvisorUnavailable(String),

    #[error("Malformed intervention plan: {0}")]
    InvalidPlan(String),

    #[error("Notification failed: {0}")]
    Notification(#[from] NotificationError),

    #[error("Customer {id} not found")]
    CustomerNotFound { id: CustomerId },

    #[error("Intervention {id} not found")]
    InterventionNotFound { id: InterventionId },

    #[error("Customer {id} already has an active intervention")]
    ActiveInterventionExists { id: CustomerId },

    #[error("Embedding dimension mismatch: expected {expected}, got {actual}")]
    DimensionMismatch { expected: usize, actual: usize },

    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

pub type AgentResult<T> = Result<T, AgentError>;

/// Errors raised by a notification channel.
///
/// `Declined` is a reported failure: the engine records it as a failed step
/// and runs self-correction, using `reason` to pick the correction.
/// `Transport` is an unexpected fault: the step is logged for manual review.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum NotificationError {
    #[error("delivery declined: {reason}")]
    Declined { reason: String },

    #[error("transport failure: {0}")]
    Transport(String),
}
