//! Credential validation: registration checks, password hashing and login
//! authentication

use argon2::{Argon2, PasswordHash, PasswordHasher, PasswordVerifier, password_hash::SaltString};
use common::validation::{FieldError, FieldErrors};
use serde::Deserialize;
use tracing::{info, warn};

use crate::{
    error::AccountError,
    models::{Account, NewAccount, NewProfile, Role},
    repositories::AccountRepository,
    validation::{
        MAX_NAME_LENGTH, MAX_PROFILE_TEXT_LENGTH, bounded, check, check_profile_text, not_blank,
        required, validate_email, validate_password, validate_role, validate_username,
    },
};

/// Registration request body
#[derive(Debug, Clone, Default, Deserialize)]
pub struct RegisterRequest {
    pub username: Option<String>,
    pub email: Option<String>,
    pub password: Option<String>,
    pub first_name: Option<String>,
    pub last_name: Option<String>,
    pub role: Option<String>,
    pub country: Option<String>,
    pub city: Option<String>,
    pub zip_code: Option<String>,
    pub address: Option<String>,
    pub phone: Option<String>,
    pub apple_id: Option<String>,
    pub is_apple_user: Option<bool>,
}

/// Login request body
#[derive(Debug, Clone, Default, Deserialize)]
pub struct LoginRequest {
    pub email: Option<String>,
    pub password: Option<String>,
    pub apple_id: Option<String>,
}

/// How a login request authenticates; exactly one mode per request
#[derive(Debug, Clone, PartialEq)]
pub enum LoginMode {
    ExternalIdentity(String),
    Password { email: String, password: String },
}

impl LoginMode {
    /// Throttling key for this login attempt
    pub fn throttle_key(&self) -> String {
        match self {
            LoginMode::ExternalIdentity(id) => format!("apple:{}", id),
            LoginMode::Password { email, .. } => format!("login:{}", email.to_lowercase()),
        }
    }
}

/// Hash a password with argon2 and a fresh salt
pub fn hash_password(password: &str) -> Result<String, AccountError> {
    let salt = SaltString::generate(&mut rand::thread_rng());
    let argon2 = Argon2::default();
    argon2
        .hash_password(password.as_bytes(), &salt)
        .map(|hash| hash.to_string())
        .map_err(|e| AccountError::Hashing(e.to_string()))
}

/// Check a password against a stored hash; unusable or corrupt hashes never
/// verify
pub fn verify_password(password_hash: &str, password: &str) -> bool {
    let Ok(parsed_hash) = PasswordHash::new(password_hash) else {
        return false;
    };

    Argon2::default()
        .verify_password(password.as_bytes(), &parsed_hash)
        .is_ok()
}

fn optional(value: &Option<String>) -> Option<String> {
    value
        .as_deref()
        .map(str::trim)
        .filter(|v| !v.is_empty())
        .map(str::to_string)
}

/// Validate a registration request and build the account to insert
///
/// Uniqueness is pre-checked here; the store constraints still decide races.
pub async fn validate_registration(
    accounts: &dyn AccountRepository,
    request: &RegisterRequest,
) -> Result<NewAccount, AccountError> {
    let mut errors = FieldErrors::new();

    let username = required(&mut errors, "username", request.username.as_deref())
        .and_then(|u| check(&mut errors, "username", validate_username(u)).map(|_| u));
    let email = required(&mut errors, "email", request.email.as_deref())
        .and_then(|e| check(&mut errors, "email", validate_email(e)).map(|_| e));
    let password = required(&mut errors, "password", request.password.as_deref())
        .and_then(|p| check(&mut errors, "password", validate_password(p)).map(|_| p));

    if let Some(username) = username {
        if accounts.username_exists(username).await? {
            errors.add("username", FieldError::DuplicateIdentity { field: "username" });
        }
    }
    if let Some(email) = email {
        if accounts.email_exists(email).await? {
            errors.add("email", FieldError::DuplicateIdentity { field: "email" });
        }
    }

    let first_name = not_blank(&mut errors, "first_name", request.first_name.as_deref());
    let first_name = bounded(&mut errors, "first_name", first_name, MAX_NAME_LENGTH);
    let last_name = not_blank(&mut errors, "last_name", request.last_name.as_deref());
    let last_name = bounded(&mut errors, "last_name", last_name, MAX_NAME_LENGTH);
    check_profile_text(
        &mut errors,
        [
            ("country", request.country.as_deref()),
            ("city", request.city.as_deref()),
            ("zip_code", request.zip_code.as_deref()),
            ("address", request.address.as_deref()),
            ("phone", request.phone.as_deref()),
        ],
    );

    let role = match request.role.as_deref() {
        Some(role) => check(&mut errors, "role", validate_role(role)),
        None => Some(Role::default()),
    };

    let external_id = optional(&request.apple_id);
    if let Some(external_id) = &external_id {
        bounded(&mut errors, "apple_id", Some(external_id), MAX_PROFILE_TEXT_LENGTH);
        if accounts.find_by_external_id(external_id).await?.is_some() {
            errors.add("apple_id", FieldError::DuplicateIdentity { field: "apple id" });
        }
    }

    let (Some(username), Some(email), Some(password), Some(role), true) =
        (username, email, password, role, errors.is_empty())
    else {
        warn!("Registration rejected: {}", errors);
        return Err(AccountError::Validation(errors));
    };

    Ok(NewAccount {
        username: username.to_string(),
        email: Some(email.to_string()),
        password_hash: hash_password(password)?,
        first_name: first_name.unwrap_or_default().to_string(),
        last_name: last_name.unwrap_or_default().to_string(),
        profile: NewProfile {
            role,
            country: request.country.clone(),
            city: request.city.clone(),
            zip_code: request.zip_code.clone(),
            address: request.address.clone(),
            phone: request.phone.clone(),
            external_id,
            is_external_only: request.is_apple_user.unwrap_or(false),
        },
    })
}

/// Decide which login mode a request uses
pub fn login_mode(request: &LoginRequest) -> Result<LoginMode, AccountError> {
    if let Some(apple_id) = optional(&request.apple_id) {
        return Ok(LoginMode::ExternalIdentity(apple_id));
    }

    let mut errors = FieldErrors::new();
    let email = required(&mut errors, "email", request.email.as_deref());
    let password = required(&mut errors, "password", request.password.as_deref());

    match (email, password) {
        (Some(email), Some(password)) => Ok(LoginMode::Password {
            email: email.trim().to_string(),
            password: password.to_string(),
        }),
        _ => Err(AccountError::Validation(errors)),
    }
}

/// Resolve a login to its account
pub async fn authenticate(
    accounts: &dyn AccountRepository,
    mode: &LoginMode,
) -> Result<Account, AccountError> {
    match mode {
        LoginMode::ExternalIdentity(external_id) => accounts
            .find_by_external_id(external_id)
            .await?
            .ok_or(AccountError::UnknownIdentity),
        LoginMode::Password { email, password } => {
            let account = accounts
                .find_by_email(email)
                .await?
                .ok_or(AccountError::InvalidCredentials)?;

            if !account.user.has_usable_password()
                || !verify_password(&account.user.password_hash, password)
            {
                return Err(AccountError::InvalidCredentials);
            }

            info!("Authenticated user: {}", account.user.username);
            Ok(account)
        }
    }
}
