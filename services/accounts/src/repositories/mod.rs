//! Repositories for account persistence
//!
//! [`AccountRepository`] is the seam between the account operations and the
//! store. The PostgreSQL adapter is used by the service binary; the
//! in-memory adapter backs tests and local experiments.

use async_trait::async_trait;
use common::error::DatabaseResult;
use uuid::Uuid;

use crate::models::{Account, AccountChanges, AccountStatus, NewAccount};

pub mod memory;
pub mod postgres;

pub use memory::MemoryAccountRepository;
pub use postgres::PgAccountRepository;

/// Unique constraint on `users.username`
pub const USERNAME_CONSTRAINT: &str = "users_username_key";
/// Unique constraint on `users.email`
pub const EMAIL_CONSTRAINT: &str = "users_email_key";
/// Unique constraint on `profiles.external_id`
pub const EXTERNAL_ID_CONSTRAINT: &str = "profiles_external_id_key";

/// Account persistence
#[async_trait]
pub trait AccountRepository: Send + Sync {
    async fn username_exists(&self, username: &str) -> DatabaseResult<bool>;

    async fn email_exists(&self, email: &str) -> DatabaseResult<bool>;

    /// Create the user and its profile atomically
    async fn create(&self, account: &NewAccount) -> DatabaseResult<Account>;

    async fn find_by_id(&self, id: Uuid) -> DatabaseResult<Option<Account>>;

    async fn find_by_username(&self, username: &str) -> DatabaseResult<Option<Account>>;

    async fn find_by_email(&self, email: &str) -> DatabaseResult<Option<Account>>;

    /// Exact lookup on the profile's external identity
    async fn find_by_external_id(&self, external_id: &str) -> DatabaseResult<Option<Account>>;

    /// Write the profile status; `false` when the account has no profile
    async fn set_status(&self, id: Uuid, status: AccountStatus) -> DatabaseResult<bool>;

    async fn set_password_hash(&self, id: Uuid, password_hash: &str) -> DatabaseResult<bool>;

    /// Apply a partial update to user and profile in one transaction
    async fn update(&self, id: Uuid, changes: &AccountChanges) -> DatabaseResult<Option<Account>>;
}
