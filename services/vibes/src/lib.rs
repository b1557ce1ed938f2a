//! Vibes service: timed mood posts with history, status updates and expiry

pub mod config;
pub mod error;
pub mod lifecycle;
pub mod models;
pub mod repositories;
pub mod routes;
pub mod sweeper;

use common::session::SessionIssuer;
use sqlx::PgPool;

pub use error::VibeError;
pub use lifecycle::VibeLifecycle;
pub use routes::create_router;

/// Application state shared across handlers
#[derive(Clone)]
pub struct AppState {
    pub lifecycle: VibeLifecycle,
    pub sessions: SessionIssuer,
    /// Pool used by the health check; absent when running on in-memory stores
    pub db_pool: Option<PgPool>,
}
