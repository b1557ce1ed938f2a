//! In-memory account repository
//!
//! Enforces the same uniqueness rules as the PostgreSQL schema and reports
//! violations with the same constraint names.

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use chrono::Utc;
use common::error::{DatabaseError, DatabaseResult};
use tokio::sync::Mutex;
use uuid::Uuid;

use super::{AccountRepository, EMAIL_CONSTRAINT, EXTERNAL_ID_CONSTRAINT, USERNAME_CONSTRAINT};
use crate::models::{Account, AccountChanges, AccountStatus, NewAccount, Profile, User};

#[derive(Debug, Clone, Default)]
pub struct MemoryAccountRepository {
    accounts: Arc<Mutex<HashMap<Uuid, Account>>>,
}

impl MemoryAccountRepository {
    pub fn new() -> Self {
        Self::default()
    }
}

fn check_unique(
    accounts: &HashMap<Uuid, Account>,
    except: Option<Uuid>,
    username: Option<&str>,
    email: Option<&str>,
    external_id: Option<&str>,
) -> DatabaseResult<()> {
    for account in accounts.values().filter(|a| Some(a.id()) != except) {
        if username.is_some_and(|u| account.user.username == u) {
            return Err(DatabaseError::unique(USERNAME_CONSTRAINT));
        }
        if email.is_some() && account.user.email.as_deref() == email {
            return Err(DatabaseError::unique(EMAIL_CONSTRAINT));
        }
        if external_id.is_some() && account.profile.external_id.as_deref() == external_id {
            return Err(DatabaseError::unique(EXTERNAL_ID_CONSTRAINT));
        }
    }
    Ok(())
}

#[async_trait]
impl AccountRepository for MemoryAccountRepository {
    async fn username_exists(&self, username: &str) -> DatabaseResult<bool> {
        let accounts = self.accounts.lock().await;
        Ok(accounts.values().any(|a| a.user.username == username))
    }

    async fn email_exists(&self, email: &str) -> DatabaseResult<bool> {
        let accounts = self.accounts.lock().await;
        Ok(accounts
            .values()
            .any(|a| a.user.email.as_deref() == Some(email)))
    }

    async fn create(&self, account: &NewAccount) -> DatabaseResult<Account> {
        let mut accounts = self.accounts.lock().await;
        check_unique(
            &accounts,
            None,
            Some(&account.username),
            account.email.as_deref(),
            account.profile.external_id.as_deref(),
        )?;

        let id = Uuid::new_v4();
        let now = Utc::now();
        let profile = &account.profile;
        let created = Account {
            user: User {
                id,
                username: account.username.clone(),
                email: account.email.clone(),
                password_hash: account.password_hash.clone(),
                first_name: account.first_name.clone(),
                last_name: account.last_name.clone(),
                created_at: now,
                updated_at: now,
            },
            profile: Profile {
                user_id: id,
                role: profile.role,
                country: profile.country.clone(),
                city: profile.city.clone(),
                zip_code: profile.zip_code.clone(),
                address: profile.address.clone(),
                phone: profile.phone.clone(),
                avatar: None,
                external_id: profile.external_id.clone(),
                is_external_only: profile.is_external_only,
                status: AccountStatus::Active,
            },
        };

        accounts.insert(id, created.clone());
        Ok(created)
    }

    async fn find_by_id(&self, id: Uuid) -> DatabaseResult<Option<Account>> {
        let accounts = self.accounts.lock().await;
        Ok(accounts.get(&id).cloned())
    }

    async fn find_by_username(&self, username: &str) -> DatabaseResult<Option<Account>> {
        let accounts = self.accounts.lock().await;
        Ok(accounts
            .values()
            .find(|a| a.user.username == username)
            .cloned())
    }

    async fn find_by_email(&self, email: &str) -> DatabaseResult<Option<Account>> {
        let accounts = self.accounts.lock().await;
        Ok(accounts
            .values()
            .find(|a| a.user.email.as_deref() == Some(email))
            .cloned())
    }

    async fn find_by_external_id(&self, external_id: &str) -> DatabaseResult<Option<Account>> {
        let accounts = self.accounts.lock().await;
        Ok(accounts
            .values()
            .find(|a| a.profile.external_id.as_deref() == Some(external_id))
            .cloned())
    }

    async fn set_status(&self, id: Uuid, status: AccountStatus) -> DatabaseResult<bool> {
        let mut accounts = self.accounts.lock().await;
        Ok(match accounts.get_mut(&id) {
            Some(account) => {
                account.profile.status = status;
                true
            }
            None => false,
        })
    }

    async fn set_password_hash(&self, id: Uuid, password_hash: &str) -> DatabaseResult<bool> {
        let mut accounts = self.accounts.lock().await;
        Ok(match accounts.get_mut(&id) {
            Some(account) => {
                account.user.password_hash = password_hash.to_string();
                account.user.updated_at = Utc::now();
                true
            }
            None => false,
        })
    }

    async fn update(&self, id: Uuid, changes: &AccountChanges) -> DatabaseResult<Option<Account>> {
        let mut accounts = self.accounts.lock().await;
        check_unique(
            &accounts,
            Some(id),
            changes.username.as_deref(),
            changes.email.as_deref(),
            None,
        )?;

        let Some(account) = accounts.get_mut(&id) else {
            return Ok(None);
        };

        let user = &mut account.user;
        if let Some(username) = &changes.username {
            user.username = username.clone();
        }
        if let Some(email) = &changes.email {
            user.email = Some(email.clone());
        }
        if let Some(first_name) = &changes.first_name {
            user.first_name = first_name.clone();
        }
        if let Some(last_name) = &changes.last_name {
            user.last_name = last_name.clone();
        }
        user.updated_at = Utc::now();

        let profile = &mut account.profile;
        if let Some(role) = changes.role {
            profile.role = role;
        }
        for (slot, value) in [
            (&mut profile.country, &changes.country),
            (&mut profile.city, &changes.city),
            (&mut profile.zip_code, &changes.zip_code),
            (&mut profile.address, &changes.address),
            (&mut profile.phone, &changes.phone),
            (&mut profile.avatar, &changes.avatar),
        ] {
            if value.is_some() {
                *slot = value.clone();
            }
        }

        Ok(Some(account.clone()))
    }
}
