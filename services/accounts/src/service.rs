//! Account operations
//!
//! Every operation that acts on behalf of a logged-in user takes the caller
//! as an explicit [`AuthUser`].

use std::sync::Arc;

use common::{middleware::AuthUser, session::SessionIssuer, validation::FieldErrors};
use serde::Deserialize;
use tracing::{info, warn};

use crate::{
    avatar::{AvatarStore, AvatarUpload},
    credentials::{self, LoginRequest, RegisterRequest},
    error::AccountError,
    models::{
        Account, AccountChanges, AccountSummary, NewAccount, NewProfile, Role,
        user::UNUSABLE_PASSWORD,
    },
    rate_limiter::RateLimiter,
    repositories::AccountRepository,
    status,
    validation::{
        MAX_NAME_LENGTH, MAX_PROFILE_TEXT_LENGTH, bounded, check, check_profile_text, not_blank,
        required, validate_email, validate_password, validate_role, validate_username,
    },
};

/// Successful register/login: who logged in and their session token
#[derive(Debug, Clone)]
pub struct SignedIn {
    pub account: AccountSummary,
    pub token: String,
}

/// External-identity request body
#[derive(Debug, Clone, Default, Deserialize)]
pub struct AppleLoginRequest {
    pub apple_id: Option<String>,
    pub email: Option<String>,
    pub first_name: Option<String>,
    pub last_name: Option<String>,
}

/// Result of the external-identity flow
#[derive(Debug, Clone)]
pub struct AppleSignIn {
    pub signed_in: SignedIn,
    /// Whether a new account was created
    pub registered: bool,
}

/// Profile update form; the target is identified by `username`, else `email`
#[derive(Debug, Clone, Default)]
pub struct ProfileUpdate {
    pub username: Option<String>,
    pub email: Option<String>,
    pub first_name: Option<String>,
    pub last_name: Option<String>,
    pub role: Option<String>,
    pub country: Option<String>,
    pub city: Option<String>,
    pub zip_code: Option<String>,
    pub address: Option<String>,
    pub phone: Option<String>,
    pub avatar: Option<AvatarUpload>,
}

impl ProfileUpdate {
    /// Set a text field by its form name; unknown names are ignored
    pub fn set(&mut self, field: &str, value: String) {
        let slot = match field {
            "username" => &mut self.username,
            "email" => &mut self.email,
            "first_name" => &mut self.first_name,
            "last_name" => &mut self.last_name,
            "role" => &mut self.role,
            "country" => &mut self.country,
            "city" => &mut self.city,
            "zip_code" => &mut self.zip_code,
            "address" => &mut self.address,
            "phone" => &mut self.phone,
            _ => return,
        };
        *slot = Some(value);
    }
}

/// Change-password request body
#[derive(Debug, Clone, Default, Deserialize)]
pub struct ChangePasswordRequest {
    pub current_password: Option<String>,
    pub new_password: Option<String>,
}

/// Account operations over the identity store and session issuer
#[derive(Clone)]
pub struct AccountService {
    accounts: Arc<dyn AccountRepository>,
    sessions: SessionIssuer,
    avatars: AvatarStore,
    limiter: RateLimiter,
}

impl AccountService {
    pub fn new(
        accounts: Arc<dyn AccountRepository>,
        sessions: SessionIssuer,
        avatars: AvatarStore,
        limiter: RateLimiter,
    ) -> Self {
        Self {
            accounts,
            sessions,
            avatars,
            limiter,
        }
    }

    pub fn sessions(&self) -> &SessionIssuer {
        &self.sessions
    }

    /// Register an account and sign it in
    pub async fn register(&self, request: &RegisterRequest) -> Result<SignedIn, AccountError> {
        let new_account = credentials::validate_registration(self.accounts.as_ref(), request).await?;

        let account = self
            .accounts
            .create(&new_account)
            .await
            .map_err(|e| AccountError::from_store(e, "Duplicate user"))?;

        info!("Registered user: {}", account.user.username);
        self.sign_in(&account).await
    }

    /// Log in with an external identity or an email/password pair
    pub async fn login(&self, request: &LoginRequest) -> Result<SignedIn, AccountError> {
        let mode = credentials::login_mode(request)?;
        let key = mode.throttle_key();

        if self.limiter.is_blocked(&key).await {
            warn!("Login blocked for {}", key);
            return Err(AccountError::TooManyAttempts);
        }

        let account = match credentials::authenticate(self.accounts.as_ref(), &mode).await {
            Ok(account) => account,
            Err(err @ (AccountError::InvalidCredentials | AccountError::UnknownIdentity)) => {
                self.limiter.record_failure(&key).await;
                return Err(err);
            }
            Err(err) => return Err(err),
        };

        self.limiter.reset(&key).await;
        self.activate(&account).await?;
        self.sign_in(&account).await
    }

    /// Log in with an external identity, creating the account on first use
    pub async fn apple_login(&self, request: &AppleLoginRequest) -> Result<AppleSignIn, AccountError> {
        let mut errors = FieldErrors::new();
        let apple_id = required(&mut errors, "apple_id", request.apple_id.as_deref()).map(str::trim);
        let apple_id = bounded(&mut errors, "apple_id", apple_id, MAX_PROFILE_TEXT_LENGTH);
        bounded(&mut errors, "first_name", request.first_name.as_deref(), MAX_NAME_LENGTH);
        bounded(&mut errors, "last_name", request.last_name.as_deref(), MAX_NAME_LENGTH);
        let email = request
            .email
            .as_deref()
            .filter(|e| !e.trim().is_empty())
            .and_then(|e| check(&mut errors, "email", validate_email(e)).map(|_| e));
        let Some(apple_id) = apple_id.filter(|_| errors.is_empty()) else {
            return Err(AccountError::Validation(errors));
        };

        if let Some(account) = self.accounts.find_by_external_id(apple_id).await? {
            self.activate(&account).await?;
            return Ok(AppleSignIn {
                signed_in: self.sign_in(&account).await?,
                registered: false,
            });
        }

        let new_account = NewAccount {
            username: format!("apple_{}", apple_id.chars().take(10).collect::<String>()),
            email: email.map(str::to_string),
            password_hash: UNUSABLE_PASSWORD.to_string(),
            first_name: request.first_name.clone().unwrap_or_default(),
            last_name: request.last_name.clone().unwrap_or_default(),
            profile: NewProfile {
                external_id: Some(apple_id.to_string()),
                is_external_only: true,
                ..NewProfile::default()
            },
        };

        let account = self
            .accounts
            .create(&new_account)
            .await
            .map_err(|e| AccountError::from_store(e, "Duplicate entry"))?;

        info!("Registered external-identity user: {}", account.user.username);
        Ok(AppleSignIn {
            signed_in: self.sign_in(&account).await?,
            registered: true,
        })
    }

    /// Revoke the caller's token and mark them logged out; returns the
    /// caller's username
    pub async fn logout(&self, caller: &AuthUser) -> Result<String, AccountError> {
        let account = self
            .accounts
            .find_by_id(caller.user_id)
            .await?
            .ok_or(AccountError::UserNotFound)?;

        self.sessions.revoke(caller.user_id).await?;

        let next = status::on_logout(account.profile.status);
        if !self.accounts.set_status(caller.user_id, next).await? {
            warn!("No profile to mark logged out for user: {}", caller.user_id);
        }

        info!("User logged out: {}", account.user.username);
        Ok(account.user.username)
    }

    /// Update the account identified in the form
    ///
    /// Callers may update themselves; updating someone else, or changing a
    /// role, requires the admin role.
    pub async fn update_profile(
        &self,
        caller: &AuthUser,
        update: &ProfileUpdate,
    ) -> Result<Account, AccountError> {
        let username = update.username.as_deref().filter(|u| !u.trim().is_empty());
        let email = update.email.as_deref().filter(|e| !e.trim().is_empty());

        let target = match (username, email) {
            (Some(username), _) => self.accounts.find_by_username(username).await?,
            (None, Some(email)) => self.accounts.find_by_email(email).await?,
            (None, None) => return Err(AccountError::MissingIdentifier),
        }
        .ok_or(AccountError::UserNotFound)?;

        let caller_account = self
            .accounts
            .find_by_id(caller.user_id)
            .await?
            .ok_or(AccountError::UserNotFound)?;
        let is_admin = caller_account.profile.role == Role::Admin;

        if target.id() != caller.user_id && !is_admin {
            warn!(
                "User {} denied update of {}",
                caller.user_id, target.user.username
            );
            return Err(AccountError::PermissionDenied);
        }

        let mut changes = self.profile_changes(update)?;
        if changes.role.is_some() && !is_admin {
            return Err(AccountError::PermissionDenied);
        }

        if let Some(upload) = &update.avatar {
            changes.avatar = Some(self.avatars.save(upload).await?);
        }

        let updated = self
            .accounts
            .update(target.id(), &changes)
            .await
            .map_err(|e| AccountError::from_store(e, "Duplicate user"))
            .and_then(|account| account.ok_or(AccountError::UserNotFound));

        let account = match updated {
            Ok(account) => account,
            Err(err) => {
                if let Some(avatar) = &changes.avatar {
                    self.avatars.discard(avatar).await;
                }
                return Err(err);
            }
        };

        info!("Updated profile for user: {}", account.user.username);
        Ok(account)
    }

    /// Replace the caller's password after checking the current one
    pub async fn change_password(
        &self,
        caller: &AuthUser,
        request: &ChangePasswordRequest,
    ) -> Result<(), AccountError> {
        let mut errors = FieldErrors::new();
        let current = required(&mut errors, "current_password", request.current_password.as_deref());
        let new = required(&mut errors, "new_password", request.new_password.as_deref())
            .and_then(|p| check(&mut errors, "new_password", validate_password(p)).map(|_| p));
        let (Some(current), Some(new)) = (current, new) else {
            return Err(AccountError::Validation(errors));
        };

        let account = self
            .accounts
            .find_by_id(caller.user_id)
            .await?
            .ok_or(AccountError::UserNotFound)?;

        if !account.user.has_usable_password()
            || !credentials::verify_password(&account.user.password_hash, current)
        {
            return Err(AccountError::PasswordMismatch);
        }

        let password_hash = credentials::hash_password(new)?;
        self.accounts
            .set_password_hash(caller.user_id, &password_hash)
            .await?;

        info!("Changed password for user: {}", account.user.username);
        Ok(())
    }

    /// Validate the editable fields of a profile update
    fn profile_changes(&self, update: &ProfileUpdate) -> Result<AccountChanges, AccountError> {
        let mut errors = FieldErrors::new();

        let username = update
            .username
            .as_deref()
            .filter(|u| !u.trim().is_empty())
            .and_then(|u| check(&mut errors, "username", validate_username(u)).map(|_| u));
        let email = update
            .email
            .as_deref()
            .filter(|e| !e.trim().is_empty())
            .and_then(|e| check(&mut errors, "email", validate_email(e)).map(|_| e));
        let first_name = not_blank(&mut errors, "first_name", update.first_name.as_deref());
        let first_name = bounded(&mut errors, "first_name", first_name, MAX_NAME_LENGTH);
        let last_name = not_blank(&mut errors, "last_name", update.last_name.as_deref());
        let last_name = bounded(&mut errors, "last_name", last_name, MAX_NAME_LENGTH);
        check_profile_text(
            &mut errors,
            [
                ("country", update.country.as_deref()),
                ("city", update.city.as_deref()),
                ("zip_code", update.zip_code.as_deref()),
                ("address", update.address.as_deref()),
                ("phone", update.phone.as_deref()),
            ],
        );
        let role = update
            .role
            .as_deref()
            .and_then(|r| check(&mut errors, "role", validate_role(r)));

        if !errors.is_empty() {
            return Err(AccountError::Validation(errors));
        }

        Ok(AccountChanges {
            username: username.map(str::to_string),
            email: email.map(str::to_string),
            first_name: first_name.map(str::to_string),
            last_name: last_name.map(str::to_string),
            role,
            country: update.country.clone(),
            city: update.city.clone(),
            zip_code: update.zip_code.clone(),
            address: update.address.clone(),
            phone: update.phone.clone(),
            avatar: None,
        })
    }

    /// Apply the login transition; suspended and deleted accounts are
    /// rejected without any write
    async fn activate(&self, account: &Account) -> Result<(), AccountError> {
        let current = account.profile.status;
        let next = status::on_login(current).inspect_err(|e| {
            warn!("Login refused for {}: {}", account.user.username, e);
        })?;

        if next != current {
            self.accounts.set_status(account.id(), next).await?;
        }
        Ok(())
    }

    async fn sign_in(&self, account: &Account) -> Result<SignedIn, AccountError> {
        let token = self.sessions.issue(account.id()).await?;
        Ok(SignedIn {
            account: account.summary(),
            token: token.key,
        })
    }
}

