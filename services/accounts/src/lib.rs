//! Accounts service: registration, login, external-identity sign-in,
//! logout, profile updates and password changes

pub mod avatar;
pub mod config;
pub mod credentials;
pub mod error;
pub mod models;
pub mod rate_limiter;
pub mod repositories;
pub mod routes;
pub mod service;
pub mod status;
pub mod validation;

use sqlx::PgPool;

pub use error::AccountError;
pub use routes::create_router;
pub use service::AccountService;

/// Application state shared across handlers
#[derive(Clone)]
pub struct AppState {
    pub service: AccountService,
    /// Pool used by the health check; absent when running on in-memory stores
    pub db_pool: Option<PgPool>,
}
