//! Input validation utilities

use common::validation::{FieldError, FieldErrors};
use regex::Regex;
use std::sync::OnceLock;

use crate::models::Role;

/// Minimum accepted password length
pub const MIN_PASSWORD_LENGTH: usize = 6;

/// Maximum username length
pub const MAX_USERNAME_LENGTH: usize = 150;

/// Maximum first/last name length
pub const MAX_NAME_LENGTH: usize = 150;

/// Maximum length of the free-text profile fields and the external id
pub const MAX_PROFILE_TEXT_LENGTH: usize = 255;

/// Reject values longer than `max_length` characters
pub fn validate_length(value: &str, max_length: usize) -> Result<(), FieldError> {
    if value.chars().count() > max_length {
        return Err(FieldError::TooLong { max_length });
    }
    Ok(())
}

/// Record `TooLong` for a supplied value over `max_length`, returning the
/// value only when it fits
pub fn bounded<'a>(
    errors: &mut FieldErrors,
    field: &str,
    value: Option<&'a str>,
    max_length: usize,
) -> Option<&'a str> {
    let value = value?;
    check(errors, field, validate_length(value, max_length)).map(|_| value)
}

/// Length checks for the optional profile text fields
pub fn check_profile_text(errors: &mut FieldErrors, fields: [(&str, Option<&str>); 5]) {
    for (field, value) in fields {
        bounded(errors, field, value, MAX_PROFILE_TEXT_LENGTH);
    }
}

/// Validate username
pub fn validate_username(username: &str) -> Result<(), FieldError> {
    if username.chars().count() > MAX_USERNAME_LENGTH {
        return Err(FieldError::TooLong {
            max_length: MAX_USERNAME_LENGTH,
        });
    }

    static USERNAME_REGEX: OnceLock<Regex> = OnceLock::new();
    let regex = USERNAME_REGEX
        .get_or_init(|| Regex::new(r"^[\w.@+-]+$").expect("Failed to compile username regex"));

    if !regex.is_match(username) {
        return Err(FieldError::Malformed(
            "Enter a valid username. This value may contain only letters, numbers, and @/./+/-/_ characters."
                .to_string(),
        ));
    }

    Ok(())
}

/// Validate email
pub fn validate_email(email: &str) -> Result<(), FieldError> {
    if email.len() > 254 {
        return Err(FieldError::TooLong { max_length: 254 });
    }

    static EMAIL_REGEX: OnceLock<Regex> = OnceLock::new();
    let regex = EMAIL_REGEX.get_or_init(|| {
        Regex::new(r"^[a-zA-Z0-9._%+-]+@[a-zA-Z0-9.-]+\.[a-zA-Z]{2,}$")
            .expect("Failed to compile email regex")
    });

    if !regex.is_match(email) {
        return Err(FieldError::InvalidEmail);
    }

    Ok(())
}

/// Validate password strength
pub fn validate_password(password: &str) -> Result<(), FieldError> {
    if password.chars().count() < MIN_PASSWORD_LENGTH {
        return Err(FieldError::WeakPassword {
            min_length: MIN_PASSWORD_LENGTH,
        });
    }

    Ok(())
}

/// Parse a role choice
pub fn validate_role(role: &str) -> Result<Role, FieldError> {
    role.parse().map_err(|_| FieldError::InvalidChoice {
        value: role.to_string(),
    })
}

/// Record `Required` or `Blank` for a mandatory text field, returning the
/// value only when it is usable
pub fn required<'a>(errors: &mut FieldErrors, field: &str, value: Option<&'a str>) -> Option<&'a str> {
    match value {
        None => {
            errors.add(field, FieldError::Required);
            None
        }
        Some(v) if v.trim().is_empty() => {
            errors.add(field, FieldError::Blank);
            None
        }
        Some(v) => Some(v),
    }
}

/// Record `Blank` for an optional field that was supplied empty
pub fn not_blank<'a>(errors: &mut FieldErrors, field: &str, value: Option<&'a str>) -> Option<&'a str> {
    match value {
        Some(v) if v.trim().is_empty() => {
            errors.add(field, FieldError::Blank);
            None
        }
        other => other,
    }
}

/// Run a field rule and record its failure
pub fn check<T>(errors: &mut FieldErrors, field: &str, result: Result<T, FieldError>) -> Option<T> {
    match result {
        Ok(value) => Some(value),
        Err(error) => {
            errors.add(field, error);
            None
        }
    }
}
