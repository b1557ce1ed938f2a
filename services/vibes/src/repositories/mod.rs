//! Repositories for vibe persistence

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use common::error::DatabaseResult;
use uuid::Uuid;

use crate::models::{NewVibe, Vibe, VibeFilter, VibeStatus};

pub mod memory;
pub mod postgres;

pub use memory::MemoryVibeRepository;
pub use postgres::PgVibeRepository;

/// Vibe persistence; every read is scoped to one owner
#[async_trait]
pub trait VibeRepository: Send + Sync {
    /// Insert one vibe
    async fn insert(&self, vibe: &NewVibe) -> DatabaseResult<Vibe>;

    /// The owner's vibes matching `filter`, newest first
    async fn history(&self, user_id: Uuid, filter: &VibeFilter) -> DatabaseResult<Vec<Vibe>>;

    async fn find_for_user(&self, user_id: Uuid, id: i64) -> DatabaseResult<Option<Vibe>>;

    /// The owner's newest active vibe that has not reached its end time
    async fn latest_running(&self, user_id: Uuid, now: DateTime<Utc>) -> DatabaseResult<Option<Vibe>>;

    /// Move an active vibe to `status` and deactivate it; `None` if the vibe
    /// is missing, foreign or no longer active
    async fn close(&self, user_id: Uuid, id: i64, status: VibeStatus) -> DatabaseResult<Option<Vibe>>;

    /// Expire active vibes whose end time has passed, for one owner or for
    /// everyone; returns how many were expired
    async fn expire_due(&self, now: DateTime<Utc>, user_id: Option<Uuid>) -> DatabaseResult<u64>;
}
