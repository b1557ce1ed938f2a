//! Account aggregate: a user and its profile, created and destroyed together

use serde::Serialize;
use uuid::Uuid;

use super::{NewProfile, Profile, Role, User};

/// A user together with its profile
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Account {
    pub user: User,
    pub profile: Profile,
}

impl Account {
    pub fn id(&self) -> Uuid {
        self.user.id
    }

    /// Public identity returned in response envelopes
    pub fn summary(&self) -> AccountSummary {
        AccountSummary {
            username: self.user.username.clone(),
            email: self.user.email.clone(),
        }
    }
}

/// Username and email, as returned after register/login
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct AccountSummary {
    pub username: String,
    pub email: Option<String>,
}

/// Everything needed to create an account in one transaction
#[derive(Debug, Clone, PartialEq)]
pub struct NewAccount {
    pub username: String,
    pub email: Option<String>,
    pub password_hash: String,
    pub first_name: String,
    pub last_name: String,
    pub profile: NewProfile,
}

/// Partial update of an account; `None` leaves a field untouched
#[derive(Debug, Clone, Default, PartialEq)]
pub struct AccountChanges {
    pub username: Option<String>,
    pub email: Option<String>,
    pub first_name: Option<String>,
    pub last_name: Option<String>,
    pub role: Option<Role>,
    pub country: Option<String>,
    pub city: Option<String>,
    pub zip_code: Option<String>,
    pub address: Option<String>,
    pub phone: Option<String>,
    pub avatar: Option<String>,
}
