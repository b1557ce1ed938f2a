//! PostgreSQL account repository

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use common::error::DatabaseResult;
use sqlx::{PgPool, Row, postgres::PgRow};
use tracing::info;
use uuid::Uuid;

use super::AccountRepository;
use crate::models::{Account, AccountChanges, AccountStatus, NewAccount, Profile, User};

const SELECT_ACCOUNT: &str = r#"
    SELECT u.id, u.username, u.email, u.password_hash, u.first_name, u.last_name,
           u.created_at, u.updated_at,
           p.role, p.country, p.city, p.zip_code, p.address, p.phone, p.avatar,
           p.external_id, p.is_external_only, p.status
    FROM users u
    JOIN profiles p ON p.user_id = u.id
"#;

/// Account repository
#[derive(Clone)]
pub struct PgAccountRepository {
    pool: PgPool,
}

impl PgAccountRepository {
    /// Create a new account repository
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    async fn find_one(&self, condition: &str, value: &str) -> DatabaseResult<Option<Account>> {
        let sql = format!("{} WHERE {} = $1", SELECT_ACCOUNT, condition);
        let row = sqlx::query(&sql)
            .bind(value)
            .fetch_optional(&self.pool)
            .await?;

        row.map(|row| account_from_row(&row)).transpose()
    }
}

fn decode_error(message: String) -> sqlx::Error {
    sqlx::Error::Decode(message.into())
}

fn account_from_row(row: &PgRow) -> DatabaseResult<Account> {
    let role: String = row.get("role");
    let status: String = row.get("status");

    let user = User {
        id: row.get("id"),
        username: row.get("username"),
        email: row.get("email"),
        password_hash: row.get("password_hash"),
        first_name: row.get("first_name"),
        last_name: row.get("last_name"),
        created_at: row.get("created_at"),
        updated_at: row.get("updated_at"),
    };

    let profile = Profile {
        user_id: user.id,
        role: role
            .parse()
            .map_err(|_| decode_error(format!("unknown role: {}", role)))?,
        country: row.get("country"),
        city: row.get("city"),
        zip_code: row.get("zip_code"),
        address: row.get("address"),
        phone: row.get("phone"),
        avatar: row.get("avatar"),
        external_id: row.get("external_id"),
        is_external_only: row.get("is_external_only"),
        status: status
            .parse()
            .map_err(|_| decode_error(format!("unknown account status: {}", status)))?,
    };

    Ok(Account { user, profile })
}

#[async_trait]
impl AccountRepository for PgAccountRepository {
    async fn username_exists(&self, username: &str) -> DatabaseResult<bool> {
        let exists: bool =
            sqlx::query_scalar("SELECT EXISTS (SELECT 1 FROM users WHERE username = $1)")
                .bind(username)
                .fetch_one(&self.pool)
                .await?;
        Ok(exists)
    }

    async fn email_exists(&self, email: &str) -> DatabaseResult<bool> {
        let exists: bool =
            sqlx::query_scalar("SELECT EXISTS (SELECT 1 FROM users WHERE email = $1)")
                .bind(email)
                .fetch_one(&self.pool)
                .await?;
        Ok(exists)
    }

    async fn create(&self, account: &NewAccount) -> DatabaseResult<Account> {
        info!("Creating new account: {}", account.username);

        let id = Uuid::new_v4();
        let mut tx = self.pool.begin().await?;

        let row = sqlx::query(
            r#"
            INSERT INTO users (id, username, email, password_hash, first_name, last_name)
            VALUES ($1, $2, $3, $4, $5, $6)
            RETURNING created_at, updated_at
            "#,
        )
        .bind(id)
        .bind(&account.username)
        .bind(&account.email)
        .bind(&account.password_hash)
        .bind(&account.first_name)
        .bind(&account.last_name)
        .fetch_one(&mut *tx)
        .await?;

        let profile = &account.profile;
        sqlx::query(
            r#"
            INSERT INTO profiles
                (user_id, role, country, city, zip_code, address, phone, external_id, is_external_only, status)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10)
            "#,
        )
        .bind(id)
        .bind(profile.role.as_str())
        .bind(&profile.country)
        .bind(&profile.city)
        .bind(&profile.zip_code)
        .bind(&profile.address)
        .bind(&profile.phone)
        .bind(&profile.external_id)
        .bind(profile.is_external_only)
        .bind(AccountStatus::Active.as_str())
        .execute(&mut *tx)
        .await?;

        tx.commit().await?;

        let created_at: DateTime<Utc> = row.get("created_at");
        let updated_at: DateTime<Utc> = row.get("updated_at");

        Ok(Account {
            user: User {
                id,
                username: account.username.clone(),
                email: account.email.clone(),
                password_hash: account.password_hash.clone(),
                first_name: account.first_name.clone(),
                last_name: account.last_name.clone(),
                created_at,
                updated_at,
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
        })
    }

    async fn find_by_id(&self, id: Uuid) -> DatabaseResult<Option<Account>> {
        let sql = format!("{} WHERE u.id = $1", SELECT_ACCOUNT);
        let row = sqlx::query(&sql)
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;

        row.map(|row| account_from_row(&row)).transpose()
    }

    async fn find_by_username(&self, username: &str) -> DatabaseResult<Option<Account>> {
        self.find_one("u.username", username).await
    }

    async fn find_by_email(&self, email: &str) -> DatabaseResult<Option<Account>> {
        self.find_one("u.email", email).await
    }

    async fn find_by_external_id(&self, external_id: &str) -> DatabaseResult<Option<Account>> {
        self.find_one("p.external_id", external_id).await
    }

    async fn set_status(&self, id: Uuid, status: AccountStatus) -> DatabaseResult<bool> {
        let result = sqlx::query("UPDATE profiles SET status = $2 WHERE user_id = $1")
            .bind(id)
            .bind(status.as_str())
            .execute(&self.pool)
            .await?;

        Ok(result.rows_affected() > 0)
    }

    async fn set_password_hash(&self, id: Uuid, password_hash: &str) -> DatabaseResult<bool> {
        let result = sqlx::query(
            "UPDATE users SET password_hash = $2, updated_at = NOW() WHERE id = $1",
        )
        .bind(id)
        .bind(password_hash)
        .execute(&self.pool)
        .await?;

        Ok(result.rows_affected() > 0)
    }

    async fn update(&self, id: Uuid, changes: &AccountChanges) -> DatabaseResult<Option<Account>> {
        info!("Updating account: {}", id);

        let mut tx = self.pool.begin().await?;

        let updated = sqlx::query(
            r#"
            UPDATE users
            SET username = COALESCE($2, username),
                email = COALESCE($3, email),
                first_name = COALESCE($4, first_name),
                last_name = COALESCE($5, last_name),
                updated_at = NOW()
            WHERE id = $1
            "#,
        )
        .bind(id)
        .bind(&changes.username)
        .bind(&changes.email)
        .bind(&changes.first_name)
        .bind(&changes.last_name)
        .execute(&mut *tx)
        .await?;

        if updated.rows_affected() == 0 {
            return Ok(None);
        }

        sqlx::query(
            r#"
            UPDATE profiles
            SET role = COALESCE($2, role),
                country = COALESCE($3, country),
                city = COALESCE($4, city),
                zip_code = COALESCE($5, zip_code),
                address = COALESCE($6, address),
                phone = COALESCE($7, phone),
                avatar = COALESCE($8, avatar)
            WHERE user_id = $1
            "#,
        )
        .bind(id)
        .bind(changes.role.map(|role| role.as_str()))
        .bind(&changes.country)
        .bind(&changes.city)
        .bind(&changes.zip_code)
        .bind(&changes.address)
        .bind(&changes.phone)
        .bind(&changes.avatar)
        .execute(&mut *tx)
        .await?;

        tx.commit().await?;

        self.find_by_id(id).await
    }
}
