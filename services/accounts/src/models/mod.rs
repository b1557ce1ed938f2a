//! Account models: the user record, its profile, and the aggregate owning both

pub mod account;
pub mod profile;
pub mod user;

// Re-export for convenience
pub use account::{Account, AccountChanges, AccountSummary, NewAccount};
pub use profile::{AccountStatus, NewProfile, Profile, Role};
pub use user::User;
