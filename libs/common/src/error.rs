//! Custom error types for the common library
//!
//! Every store adapter (PostgreSQL or in-memory) reports failures through
//! [`DatabaseError`], so services can tell uniqueness conflicts apart from
//! everything else without inspecting driver messages.

use sqlx::Error as SqlxError;
use thiserror::Error;

/// Custom error type for database operations
#[derive(Error, Debug)]
pub enum DatabaseError {
    /// Error occurred during database connection
    #[error("Database connection error: {0}")]
    Connection(#[source] SqlxError),

    /// Error occurred during database query execution
    #[error("Database query error: {0}")]
    Query(#[source] SqlxError),

    /// Error occurred during database migration
    #[error("Database migration error: {0}")]
    Migration(String),

    /// Configuration error
    #[error("Database configuration error: {0}")]
    Configuration(String),

    /// A unique constraint rejected the write
    #[error("duplicate key value violates unique constraint \"{constraint}\"")]
    UniqueViolation { constraint: String },

    /// A check, foreign-key or not-null constraint rejected the write
    #[error("{message}")]
    IntegrityViolation { constraint: String, message: String },
}

impl DatabaseError {
    /// Build a unique-violation error for the named constraint
    pub fn unique(constraint: impl Into<String>) -> Self {
        Self::UniqueViolation {
            constraint: constraint.into(),
        }
    }

    /// Name of the violated constraint, if this is a uniqueness conflict
    pub fn violated_constraint(&self) -> Option<&str> {
        match self {
            Self::UniqueViolation { constraint } => Some(constraint),
            _ => None,
        }
    }

    /// Whether a store constraint of any kind rejected the write
    pub fn is_integrity(&self) -> bool {
        matches!(
            self,
            Self::UniqueViolation { .. } | Self::IntegrityViolation { .. }
        )
    }
}

impl From<SqlxError> for DatabaseError {
    fn from(err: SqlxError) -> Self {
        if let Some(db_err) = err.as_database_error() {
            if db_err.is_unique_violation() {
                let constraint = db_err.constraint().unwrap_or("unknown").to_string();
                return DatabaseError::UniqueViolation { constraint };
            }
            if db_err.is_check_violation() || db_err.is_foreign_key_violation() {
                return DatabaseError::IntegrityViolation {
                    constraint: db_err.constraint().unwrap_or("unknown").to_string(),
                    message: db_err.message().to_string(),
                };
            }
        }

        DatabaseError::Query(err)
    }
}

/// Type alias for Result with DatabaseError
pub type DatabaseResult<T> = Result<T, DatabaseError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn unique_violation_exposes_constraint() {
        let err = DatabaseError::unique("users_email_key");
        assert_eq!(err.violated_constraint(), Some("users_email_key"));
        assert_eq!(
            err.to_string(),
            "duplicate key value violates unique constraint \"users_email_key\""
        );
    }

    #[test]
    fn non_database_sqlx_errors_map_to_query() {
        let err = DatabaseError::from(SqlxError::RowNotFound);
        assert!(matches!(err, DatabaseError::Query(_)));
        assert_eq!(err.violated_constraint(), None);
        assert!(!err.is_integrity());
    }

    #[test]
    fn integrity_violations_are_not_uniqueness_conflicts() {
        let err = DatabaseError::IntegrityViolation {
            constraint: "vibes_timer_positive".to_string(),
            message: "new row violates check constraint \"vibes_timer_positive\"".to_string(),
        };
        assert!(err.is_integrity());
        assert_eq!(err.violated_constraint(), None);
    }
}
