//! Error types for account operations

use common::{
    envelope::ApiError,
    error::DatabaseError,
    session::SessionError,
    validation::{FieldError, FieldErrors, Presentation},
};
use thiserror::Error;

use crate::avatar::AvatarError;
use crate::repositories::{EMAIL_CONSTRAINT, EXTERNAL_ID_CONSTRAINT, USERNAME_CONSTRAINT};

/// Failure of an account operation
#[derive(Error, Debug)]
pub enum AccountError {
    #[error("{0}")]
    Validation(FieldErrors),

    /// Unique constraint hit at write time; `message` is the envelope message
    /// of the operation that lost the race
    #[error("A user with this {field} already exists.")]
    IntegrityConflict {
        field: &'static str,
        message: &'static str,
    },

    #[error("Incorrect email or password.")]
    InvalidCredentials,

    #[error("Invalid Apple ID.")]
    UnknownIdentity,

    #[error("This account is suspended.")]
    AccountSuspended,

    #[error("This account has been deleted.")]
    AccountDeleted,

    #[error("Too many failed login attempts. Try again later.")]
    TooManyAttempts,

    #[error("Username or email is required to identify the user.")]
    MissingIdentifier,

    #[error("User not found.")]
    UserNotFound,

    #[error("You do not have permission to perform this action.")]
    PermissionDenied,

    #[error("Current password is incorrect.")]
    PasswordMismatch,

    #[error("Password hashing failed: {0}")]
    Hashing(String),

    #[error(transparent)]
    Avatar(#[from] AvatarError),

    #[error(transparent)]
    Session(#[from] SessionError),

    #[error(transparent)]
    Store(DatabaseError),
}

impl AccountError {
    /// Map a store error, turning unique violations into conflicts reported
    /// under `message`
    pub fn from_store(err: DatabaseError, message: &'static str) -> Self {
        match err.violated_constraint() {
            Some(constraint) => AccountError::IntegrityConflict {
                field: conflict_field(constraint),
                message,
            },
            None => AccountError::Store(err),
        }
    }

    /// Convert into the HTTP error, rendering validation failures with
    /// `presentation`
    pub fn into_api(self, presentation: Presentation) -> ApiError {
        let errors = self.to_string();
        match self {
            AccountError::Validation(fields) => ApiError::validation(&fields, presentation),
            AccountError::IntegrityConflict { message, .. } => ApiError::bad_request(message, errors),
            AccountError::InvalidCredentials | AccountError::UnknownIdentity => {
                ApiError::unauthorized("Invalid credentials", errors)
            }
            AccountError::AccountSuspended => ApiError::forbidden("Account Suspended", errors),
            AccountError::AccountDeleted => ApiError::forbidden("Account Deleted", errors),
            AccountError::TooManyAttempts => ApiError::too_many_requests("Too Many Attempts", errors),
            AccountError::MissingIdentifier => ApiError::bad_request("Validation Error", errors),
            AccountError::UserNotFound => ApiError::not_found("Not Found", errors),
            AccountError::PermissionDenied => ApiError::forbidden("Permission denied", errors),
            AccountError::PasswordMismatch => ApiError::bad_request("Password doesn't match!", errors),
            AccountError::Avatar(AvatarError::InvalidImage) => ApiError::validation(
                &FieldErrors::single("avatar", FieldError::Malformed(errors)),
                presentation,
            ),
            AccountError::Session(SessionError::NoActiveSession) => {
                ApiError::bad_request("Token missing", errors)
            }
            AccountError::Hashing(_)
            | AccountError::Avatar(_)
            | AccountError::Session(_)
            | AccountError::Store(_) => ApiError::unexpected(errors),
        }
    }
}

impl From<DatabaseError> for AccountError {
    fn from(err: DatabaseError) -> Self {
        AccountError::Store(err)
    }
}

impl From<AccountError> for ApiError {
    fn from(err: AccountError) -> Self {
        err.into_api(Presentation::Sentence)
    }
}

fn conflict_field(constraint: &str) -> &'static str {
    match constraint {
        USERNAME_CONSTRAINT => "username",
        EMAIL_CONSTRAINT => "email",
        EXTERNAL_ID_CONSTRAINT => "apple id",
        _ => "identity",
    }
}
