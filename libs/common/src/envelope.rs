//! Uniform response envelope and the HTTP-facing error type
//!
//! Every response either service produces, successful or not, has the shape
//! `{status, message, data?, token?, errors?}`.

use axum::{
    Json,
    extract::rejection::{JsonRejection, QueryRejection},
    http::StatusCode,
    response::{IntoResponse, Response},
};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use thiserror::Error;
use tracing::error;

use crate::validation::{FieldErrors, Presentation};

/// Response envelope shared by every endpoint
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Envelope {
    pub status: bool,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data: Option<Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub token: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub errors: Option<String>,
}

impl Envelope {
    /// Successful envelope without a payload
    pub fn success(message: impl Into<String>) -> Self {
        Self {
            status: true,
            message: message.into(),
            data: None,
            token: None,
            errors: None,
        }
    }

    /// Failed envelope carrying a human-readable error sentence
    pub fn failure(message: impl Into<String>, errors: impl Into<String>) -> Self {
        Self {
            status: false,
            message: message.into(),
            data: None,
            token: None,
            errors: Some(errors.into()),
        }
    }

    /// Attach a payload; a payload that fails to serialize is logged and
    /// left out
    pub fn with_data(mut self, data: impl Serialize) -> Self {
        match serde_json::to_value(data) {
            Ok(value) => self.data = Some(value),
            Err(e) => error!("Failed to serialize response data: {}", e),
        }
        self
    }

    /// Attach a session token
    pub fn with_token(mut self, token: impl Into<String>) -> Self {
        self.token = Some(token.into());
        self
    }

    /// Pair the envelope with a status code
    pub fn respond(self, status: StatusCode) -> Response {
        (status, Json(self)).into_response()
    }
}

/// Error type returned by every handler
///
/// Each variant fixes the HTTP status; `message` is the short envelope
/// message and `errors` the detailed sentence.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum ApiError {
    /// Validation or integrity failure (400)
    #[error("{message}: {errors}")]
    BadRequest { message: String, errors: String },

    /// Authentication failure (401)
    #[error("{message}: {errors}")]
    Unauthorized { message: String, errors: String },

    /// Authorization failure (403)
    #[error("{message}: {errors}")]
    Forbidden { message: String, errors: String },

    /// Referenced resource does not exist (404)
    #[error("{message}: {errors}")]
    NotFound { message: String, errors: String },

    /// Caller exceeded an attempt budget (429)
    #[error("{message}: {errors}")]
    TooManyRequests { message: String, errors: String },

    /// Anything unclassified (500)
    #[error("{message}: {errors}")]
    Internal { message: String, errors: String },
}

impl ApiError {
    /// Field validation failure rendered with the given presentation
    pub fn validation(errors: &FieldErrors, presentation: Presentation) -> Self {
        Self::bad_request("Validation Error", errors.render(presentation))
    }

    pub fn bad_request(message: impl Into<String>, errors: impl Into<String>) -> Self {
        Self::BadRequest {
            message: message.into(),
            errors: errors.into(),
        }
    }

    pub fn unauthorized(message: impl Into<String>, errors: impl Into<String>) -> Self {
        Self::Unauthorized {
            message: message.into(),
            errors: errors.into(),
        }
    }

    pub fn forbidden(message: impl Into<String>, errors: impl Into<String>) -> Self {
        Self::Forbidden {
            message: message.into(),
            errors: errors.into(),
        }
    }

    pub fn not_found(message: impl Into<String>, errors: impl Into<String>) -> Self {
        Self::NotFound {
            message: message.into(),
            errors: errors.into(),
        }
    }

    pub fn too_many_requests(message: impl Into<String>, errors: impl Into<String>) -> Self {
        Self::TooManyRequests {
            message: message.into(),
            errors: errors.into(),
        }
    }

    /// Unclassified failure; the underlying message is passed through as-is
    pub fn unexpected(err: impl std::fmt::Display) -> Self {
        Self::Internal {
            message: "Unexpected Error".to_string(),
            errors: err.to_string(),
        }
    }

    /// HTTP status code for this error
    pub fn status_code(&self) -> StatusCode {
        match self {
            ApiError::BadRequest { .. } => StatusCode::BAD_REQUEST,
            ApiError::Unauthorized { .. } => StatusCode::UNAUTHORIZED,
            ApiError::Forbidden { .. } => StatusCode::FORBIDDEN,
            ApiError::NotFound { .. } => StatusCode::NOT_FOUND,
            ApiError::TooManyRequests { .. } => StatusCode::TOO_MANY_REQUESTS,
            ApiError::Internal { .. } => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status_code();
        let envelope = match self {
            ApiError::BadRequest { message, errors }
            | ApiError::Unauthorized { message, errors }
            | ApiError::Forbidden { message, errors }
            | ApiError::NotFound { message, errors }
            | ApiError::TooManyRequests { message, errors }
            | ApiError::Internal { message, errors } => Envelope::failure(message, errors),
        };

        envelope.respond(status)
    }
}

impl From<JsonRejection> for ApiError {
    fn from(rejection: JsonRejection) -> Self {
        Self::bad_request("Validation Error", rejection.body_text())
    }
}

impl From<QueryRejection> for ApiError {
    fn from(rejection: QueryRejection) -> Self {
        Self::bad_request("Validation Error", rejection.body_text())
    }
}

/// Type alias for API results
pub type ApiResult<T> = Result<T, ApiError>;

#[cfg(test)]
mod tests {
    use super::*;
    use crate::validation::FieldError;

    #[test]
    fn success_envelope_omits_empty_fields() {
        let body = serde_json::to_value(
            Envelope::success("Login successful").with_token("abc"),
        )
        .unwrap();

        assert_eq!(
            body,
            serde_json::json!({"status": true, "message": "Login successful", "token": "abc"})
        );
    }

    #[test]
    fn failure_envelope_carries_errors() {
        let body = serde_json::to_value(Envelope::failure("Account Suspended", "This account is suspended.")).unwrap();
        assert_eq!(body["status"], false);
        assert_eq!(body["errors"], "This account is suspended.");
        assert!(body.get("data").is_none());
    }

    #[test]
    fn unserializable_data_is_left_out() {
        let mut by_pair = std::collections::HashMap::new();
        by_pair.insert((1, 2), "non-string keys do not map to JSON");
        let envelope = Envelope::success("ok").with_data(by_pair);
        assert!(envelope.data.is_none());
        assert!(envelope.status);
    }

    #[test]
    fn validation_error_is_a_bad_request() {
        let errors = FieldErrors::single("password", FieldError::WeakPassword { min_length: 6 });
        let err = ApiError::validation(&errors, Presentation::Sentence);
        assert_eq!(err.status_code(), StatusCode::BAD_REQUEST);
        assert_eq!(
            err,
            ApiError::bad_request(
                "Validation Error",
                "Ensure this field has at least 6 characters."
            )
        );
    }

    #[test]
    fn status_codes_follow_taxonomy() {
        assert_eq!(ApiError::unauthorized("a", "b").status_code(), StatusCode::UNAUTHORIZED);
        assert_eq!(ApiError::forbidden("a", "b").status_code(), StatusCode::FORBIDDEN);
        assert_eq!(ApiError::not_found("a", "b").status_code(), StatusCode::NOT_FOUND);
        assert_eq!(
            ApiError::unexpected("boom").status_code(),
            StatusCode::INTERNAL_SERVER_ERROR
        );
    }
}
