//! Domain errors for the percolator.

use thiserror::Error;
use uuid::Uuid;

/// Coarse classification of a [`DomainError`].
///
/// Callers that only need to decide between "retry later", "fix the request"
/// and "give up" branch on this instead of matching every variant.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    NotFound,
    InvalidState,
    Conflict,
    ResourceExhausted,
    BudgetExceeded,
    Validation,
    Internal,
}

/// Domain-level errors that can occur in the percolator.
#[derive(Debug, Error)]
pub enum DomainError {
    #[error("Blueprint not found: {0}")]
    BlueprintNotFound(Uuid),

    #[error("Hole not found: {0}")]
    HoleNotFound(Uuid),

    #[error("Hole {hole_id} does not belong to blueprint {blueprint_id}")]
    HoleOwnershipMismatch { hole_id: Uuid, blueprint_id: Uuid },

    #[error("Invalid state transition from {from} to {to}: {reason}")]
    InvalidStateTransition { from: String, to: String, reason: String },

    #[error("Hole {hole_id} is not open (status: {status})")]
    HoleNotOpen { hole_id: Uuid, status: String },

    #[error("Blueprint {0} is already percolating")]
    AlreadyPercolating(Uuid),

    #[error("Maximum concurrent percolations ({limit}) reached")]
    ConcurrencyLimitReached { limit: usize },

    #[error("Budget exceeded for {resource}: attempted {attempted}, limit {limit}")]
    BudgetExceeded {
        resource: String,
        attempted: u64,
        limit: u64,
    },

    #[error("Validation failed: {0}")]
    ValidationFailed(String),

    #[error("Database error: {0}")]
    DatabaseError(String),

    #[error("Serialization error: {0}")]
    SerializationError(String),
}

impl DomainError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::BlueprintNotFound(_) | Self::HoleNotFound(_) => ErrorKind::NotFound,
            Self::InvalidStateTransition { .. } | Self::HoleNotOpen { .. } => {
                ErrorKind::InvalidState
            }
            Self::AlreadyPercolating(_) => ErrorKind::Conflict,
            Self::ConcurrencyLimitReached { .. } => ErrorKind::ResourceExhausted,
            Self::BudgetExceeded { .. } => ErrorKind::BudgetExceeded,
            Self::HoleOwnershipMismatch { .. } | Self::ValidationFailed(_) => {
                ErrorKind::Validation
            }
            Self::DatabaseError(_) | Self::SerializationError(_) => ErrorKind::Internal,
        }
    }

    /// Whether the same call may succeed later without changing the request.
    pub fn is_retryable(&self) -> bool {
        matches!(
            self.kind(),
            ErrorKind::Conflict | ErrorKind::ResourceExhausted
        )
    }
}

pub type DomainResult<T> = Result<T, DomainError>;

impl From<sqlx::Error> for DomainError {
    fn from(err: sqlx::Error) -> Self {
        DomainError::DatabaseError(err.to_string())
    }
}

impl From<serde_json::Error> for DomainError {
    fn from(err: serde_json::Error) -> Self {
        DomainError::SerializationError(err.to_string())
    }
}
