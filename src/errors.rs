use rust_decimal::Decimal;
use sea_orm::error::DbErr;
use thiserror::Error;

use crate::services::consumption::LineFailure;
use crate::services::scheduling::AllocationConflict;

/// Error type returned by every service operation.
///
/// Expected failure conditions are expressed as typed variants; nothing in
/// the service layer panics for them. Idempotent replays are successes and
/// never surface here.
#[derive(Debug, Error)]
pub enum ServiceError {
    #[error("Validation error: {0}")]
    Validation(String),

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Conflict: {0}")]
    Conflict(String),

    #[error("Scheduling conflict: {} overlapping allocation(s)", conflicts.len())]
    SchedulingConflict { conflicts: Vec<AllocationConflict> },

    #[error("Insufficient resource: available {available}, required {required}")]
    InsufficientResource {
        available: Decimal,
        required: Decimal,
    },

    #[error("Material consumption failed for all {} outstanding line(s)", failures.len())]
    ConsumptionFailed { failures: Vec<LineFailure> },

    #[error("Concurrent modification: {0}")]
    Concurrency(String),

    #[error("Database error: {0}")]
    Database(DbErr),

    #[error("Event error: {0}")]
    Event(String),
}

impl ServiceError {
    /// Wraps a database error, classifying lock-wait and busy conditions as
    /// retryable `Concurrency` errors per the store's lock-timeout policy.
    pub fn db(err: DbErr) -> Self {
        let message = err.to_string();
        let lowered = message.to_lowercase();
        if lowered.contains("database is locked")
            || lowered.contains("lock timeout")
            || lowered.contains("could not obtain lock")
            || lowered.contains("deadlock")
        {
            ServiceError::Concurrency(message)
        } else {
            ServiceError::Database(err)
        }
    }

    pub fn is_retryable(&self) -> bool {
        matches!(self, ServiceError::Concurrency(_))
    }
}

impl From<validator::ValidationErrors> for ServiceError {
    fn from(err: validator::ValidationErrors) -> Self {
        ServiceError::Validation(err.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn busy_database_classifies_as_concurrency() {
        let err = ServiceError::db(DbErr::Custom("database is locked".into()));
        assert!(matches!(err, ServiceError::Concurrency(_)));
        assert!(err.is_retryable());
    }

    #[test]
    fn other_db_errors_stay_database_errors() {
        let err = ServiceError::db(DbErr::Custom("syntax error".into()));
        assert!(matches!(err, ServiceError::Database(_)));
        assert!(!err.is_retryable());
    }
}
