//! Profile status machine
//!
//! ```text
//! active ──login──▶ active        suspended ──login──▶ rejected
//! logged_out ──login──▶ active    deleted ──login──▶ rejected
//! any ──logout──▶ logged_out
//! ```

use crate::{error::AccountError, models::AccountStatus};

/// Status an account moves to on a successful login, or the rejection
pub fn on_login(status: AccountStatus) -> Result<AccountStatus, AccountError> {
    match status {
        AccountStatus::Active | AccountStatus::LoggedOut => Ok(AccountStatus::Active),
        AccountStatus::Suspended => Err(AccountError::AccountSuspended),
        AccountStatus::Deleted => Err(AccountError::AccountDeleted),
    }
}

/// Status an account moves to on logout
pub fn on_logout(_status: AccountStatus) -> AccountStatus {
    AccountStatus::LoggedOut
}
