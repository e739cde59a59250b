use crate::database::DatabaseError;
use rust_decimal::Decimal;
use sqlx::Error as SqlxError;
use thiserror::Error;
use uuid::Uuid;

/// Application-level error types.
///
/// Every financial rejection is a typed domain variant with a stable error
/// code; callers never see a partial success.
#[derive(Error, Debug)]
pub enum AppError {
    /// Requested amount is zero or negative
    #[error("Amount must be positive (got {0})")]
    InvalidAmount(Decimal),

    /// Debit exceeds the available wallet or merchant balance
    #[error("Insufficient balance: available {available}, required {required}")]
    InsufficientBalance { available: Decimal, required: Decimal },

    /// Goal withdrawal exceeds the goal's saved amount
    #[error("Insufficient goal balance: available {available}, required {required}")]
    InsufficientGoalBalance { available: Decimal, required: Decimal },

    /// Funding attempted on a goal that is not ACTIVE
    #[error("Goal {0} is not active")]
    GoalNotActive(Uuid),

    /// Redemption attempted on a goal that is not COMPLETED or has no product
    #[error("Goal is not redeemable: {0}")]
    NotRedeemable(String),

    /// Missing entity, or entity not owned by the caller
    #[error("Resource not found: {0}")]
    NotFound(String),

    /// Duplicate reference, or transaction already in a terminal state
    #[error("Already processed: {0}")]
    AlreadyProcessed(String),

    /// Transient storage-level conflict; the whole unit is safe to retry
    #[error("Storage conflict: {0}")]
    StorageConflict(String),

    /// Validation errors outside the amount rules
    #[error("Validation error: {0}")]
    Validation(String),

    /// Database-related errors
    #[error("Database error: {0}")]
    Database(#[from] DatabaseError),

    /// SQLx database errors
    #[error("SQL error: {0}")]
    Sqlx(SqlxError),

    /// Configuration errors
    #[error("Configuration error: {0}")]
    Config(String),

    /// Serialization/deserialization errors
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

/// Result type alias for application errors
pub type AppResult<T> = Result<T, AppError>;

impl AppError {
    /// Stable machine-readable code for API consumers
    pub fn code(&self) -> &'static str {
        match self {
            AppError::InvalidAmount(_) => "INVALID_AMOUNT",
            AppError::InsufficientBalance { .. } => "INSUFFICIENT_BALANCE",
            AppError::InsufficientGoalBalance { .. } => "INSUFFICIENT_GOAL_BALANCE",
            AppError::GoalNotActive(_) => "GOAL_NOT_ACTIVE",
            AppError::NotRedeemable(_) => "NOT_REDEEMABLE",
            AppError::NotFound(_) => "NOT_FOUND",
            AppError::AlreadyProcessed(_) => "ALREADY_PROCESSED",
            AppError::StorageConflict(_) => "STORAGE_CONFLICT",
            AppError::Validation(_) => "VALIDATION_ERROR",
            AppError::Config(_) => "CONFIG_ERROR",
            AppError::Database(_) | AppError::Sqlx(_) => "DATABASE_ERROR",
            AppError::Serialization(_) => "SERIALIZATION_ERROR",
        }
    }

    /// Get HTTP status code for the error
    pub fn status_code(&self) -> u16 {
        match self {
            AppError::NotFound(_) => 404,
            AppError::AlreadyProcessed(_) => 409,
            AppError::StorageConflict(_) => 409,
            AppError::InvalidAmount(_)
            | AppError::InsufficientBalance { .. }
            | AppError::InsufficientGoalBalance { .. }
            | AppError::GoalNotActive(_)
            | AppError::NotRedeemable(_)
            | AppError::Validation(_) => 400,
            _ => 500,
        }
    }

    /// Check if error is a not found error
    pub fn is_not_found(&self) -> bool {
        matches!(self, AppError::NotFound(_))
    }

    /// Check if the whole unit of work is safe to retry
    pub fn is_retryable(&self) -> bool {
        matches!(self, AppError::StorageConflict(_))
    }
}

/// Repository-specific error types
#[derive(Error, Debug)]
pub enum RepositoryError {
    /// Database query error
    #[error("Query error: {0}")]
    Query(SqlxError),

    /// Record not found
    #[error("Record not found: {0}")]
    NotFound(String),

    /// Duplicate record (unique constraint)
    #[error("Duplicate record: {0}")]
    Duplicate(String),

    /// Constraint violation
    #[error("Constraint violation: {0}")]
    ConstraintViolation(String),

    /// Serialization failure or deadlock; retryable as a whole unit
    #[error("Transient conflict: {0}")]
    Conflict(String),
}

impl From<RepositoryError> for AppError {
    fn from(err: RepositoryError) -> Self {
        match err {
            RepositoryError::NotFound(msg) => AppError::NotFound(msg),
            RepositoryError::Query(e) => AppError::Sqlx(e),
            RepositoryError::Duplicate(msg) => AppError::AlreadyProcessed(msg),
            RepositoryError::ConstraintViolation(msg) => AppError::Validation(msg),
            RepositoryError::Conflict(msg) => AppError::StorageConflict(msg),
        }
    }
}

impl From<SqlxError> for RepositoryError {
    fn from(err: SqlxError) -> Self {
        match &err {
            SqlxError::RowNotFound => RepositoryError::NotFound("Record not found".to_string()),
            SqlxError::Database(db_err) => {
                // Check for common PostgreSQL error codes
                let code = db_err.code().map(|c| c.to_string());
                match code.as_deref() {
                    // Unique violation
                    Some("23505") => RepositoryError::Duplicate(db_err.message().to_string()),
                    // Foreign key / check constraint violations
                    Some("23503") | Some("23514") => {
                        RepositoryError::ConstraintViolation(db_err.message().to_string())
                    }
                    // Serialization failure / deadlock detected
                    Some("40001") | Some("40P01") => {
                        RepositoryError::Conflict(db_err.message().to_string())
                    }
                    _ => RepositoryError::Query(err),
                }
            }
            _ => RepositoryError::Query(err),
        }
    }
}

impl From<SqlxError> for AppError {
    fn from(err: SqlxError) -> Self {
        AppError::from(RepositoryError::from(err))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal::Decimal;

    #[test]
    fn test_domain_error_codes_are_stable() {
        assert_eq!(AppError::InvalidAmount(Decimal::ZERO).code(), "INVALID_AMOUNT");
        assert_eq!(
            AppError::InsufficientBalance {
                available: Decimal::ZERO,
                required: Decimal::ONE,
            }
            .code(),
            "INSUFFICIENT_BALANCE"
        );
        assert_eq!(AppError::NotFound("goal".into()).code(), "NOT_FOUND");
        assert_eq!(AppError::AlreadyProcessed("ref".into()).code(), "ALREADY_PROCESSED");
    }

    #[test]
    fn test_status_codes() {
        assert_eq!(AppError::NotFound("x".into()).status_code(), 404);
        assert_eq!(AppError::InvalidAmount(Decimal::ZERO).status_code(), 400);
        assert_eq!(AppError::AlreadyProcessed("x".into()).status_code(), 409);
    }

    #[test]
    fn test_only_conflicts_are_retryable() {
        assert!(AppError::StorageConflict("serialization".into()).is_retryable());
        assert!(!AppError::NotFound("x".into()).is_retryable());
        assert!(!AppError::InvalidAmount(Decimal::ZERO).is_retryable());
    }
}
