//! Error types for vibe operations

use common::{
    envelope::ApiError,
    error::DatabaseError,
    validation::{FieldErrors, Presentation},
};
use thiserror::Error;

use crate::models::VibeStatus;

/// Failure of a vibe operation
#[derive(Error, Debug)]
pub enum VibeError {
    #[error("{0}")]
    Validation(FieldErrors),

    #[error("Cannot change a {from} vibe to {to}.")]
    InvalidTransition { from: VibeStatus, to: VibeStatus },

    #[error("Vibe not found.")]
    NotFound,

    #[error("No running vibe found.")]
    NoRunningVibe,

    #[error(transparent)]
    Store(#[from] DatabaseError),
}

impl From<VibeError> for ApiError {
    fn from(err: VibeError) -> Self {
        let errors = err.to_string();
        match err {
            VibeError::Validation(fields) => ApiError::validation(&fields, Presentation::FieldPairs),
            VibeError::InvalidTransition { .. } => ApiError::bad_request("Validation Error", errors),
            VibeError::NotFound | VibeError::NoRunningVibe => ApiError::not_found("Not Found", errors),
            VibeError::Store(e) if e.is_integrity() => ApiError::bad_request("Database Error", errors),
            VibeError::Store(_) => ApiError::unexpected(errors),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::StatusCode;
    use common::validation::FieldError;

    #[test]
    fn zero_duration_renders_as_field_pair() {
        let err = VibeError::Validation(FieldErrors::single("timer_seconds", FieldError::ZeroDuration));
        assert_eq!(
            ApiError::from(err),
            ApiError::bad_request("Validation Error", "timer_seconds: Timer duration cannot be zero.")
        );
    }

    #[test]
    fn integrity_errors_are_database_errors() {
        let err = VibeError::Store(DatabaseError::IntegrityViolation {
            constraint: "vibes_timer_positive".to_string(),
            message: "violates check constraint".to_string(),
        });
        let api = ApiError::from(err);
        assert_eq!(api.status_code(), StatusCode::BAD_REQUEST);
        assert_eq!(api, ApiError::bad_request("Database Error", "violates check constraint"));
    }

    #[test]
    fn other_store_errors_are_unexpected() {
        let err = VibeError::Store(DatabaseError::Migration("boom".to_string()));
        assert_eq!(ApiError::from(err).status_code(), StatusCode::INTERNAL_SERVER_ERROR);
    }
}
