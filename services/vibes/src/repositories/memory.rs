//! In-memory vibe repository

use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use common::error::DatabaseResult;
use tokio::sync::Mutex;
use uuid::Uuid;

use super::VibeRepository;
use crate::models::{NewVibe, Vibe, VibeFilter, VibeStatus};

#[derive(Debug, Default)]
struct Store {
    next_id: i64,
    vibes: Vec<Vibe>,
}

#[derive(Debug, Clone, Default)]
pub struct MemoryVibeRepository {
    store: Arc<Mutex<Store>>,
}

impl MemoryVibeRepository {
    pub fn new() -> Self {
        Self::default()
    }
}

fn newest_first(vibes: &mut [Vibe]) {
    vibes.sort_by(|a, b| b.created_at.cmp(&a.created_at).then(b.id.cmp(&a.id)));
}

#[async_trait]
impl VibeRepository for MemoryVibeRepository {
    async fn insert(&self, vibe: &NewVibe) -> DatabaseResult<Vibe> {
        let mut store = self.store.lock().await;
        store.next_id += 1;

        let created = Vibe {
            id: store.next_id,
            user_id: vibe.user_id,
            mood_bucket: vibe.mood_bucket,
            mood_slider: vibe.mood_slider,
            mood_text: vibe.mood_text.clone(),
            latitude: vibe.latitude,
            longitude: vibe.longitude,
            address: vibe.address.clone(),
            timer_seconds: vibe.timer_seconds,
            start_time: vibe.start_time,
            end_time: vibe.end_time,
            created_at: Utc::now(),
            is_active: true,
            status: VibeStatus::Active,
        };

        store.vibes.push(created.clone());
        Ok(created)
    }

    async fn history(&self, user_id: Uuid, filter: &VibeFilter) -> DatabaseResult<Vec<Vibe>> {
        let store = self.store.lock().await;
        let mut vibes: Vec<Vibe> = store
            .vibes
            .iter()
            .filter(|v| v.user_id == user_id && filter.matches(v))
            .cloned()
            .collect();
        newest_first(&mut vibes);
        Ok(vibes)
    }

    async fn find_for_user(&self, user_id: Uuid, id: i64) -> DatabaseResult<Option<Vibe>> {
        let store = self.store.lock().await;
        Ok(store
            .vibes
            .iter()
            .find(|v| v.id == id && v.user_id == user_id)
            .cloned())
    }

    async fn latest_running(&self, user_id: Uuid, now: DateTime<Utc>) -> DatabaseResult<Option<Vibe>> {
        let store = self.store.lock().await;
        let mut running: Vec<Vibe> = store
            .vibes
            .iter()
            .filter(|v| v.user_id == user_id && v.is_active && v.end_time > now)
            .cloned()
            .collect();
        newest_first(&mut running);
        Ok(running.into_iter().next())
    }

    async fn close(&self, user_id: Uuid, id: i64, status: VibeStatus) -> DatabaseResult<Option<Vibe>> {
        let mut store = self.store.lock().await;
        let Some(vibe) = store
            .vibes
            .iter_mut()
            .find(|v| v.id == id && v.user_id == user_id && v.is_active)
        else {
            return Ok(None);
        };

        vibe.status = status;
        vibe.is_active = false;
        Ok(Some(vibe.clone()))
    }

    async fn expire_due(&self, now: DateTime<Utc>, user_id: Option<Uuid>) -> DatabaseResult<u64> {
        let mut store = self.store.lock().await;
        let mut expired = 0;
        for vibe in store.vibes.iter_mut().filter(|v| {
            v.is_active && v.end_time <= now && user_id.is_none_or(|id| v.user_id == id)
        }) {
            vibe.status = VibeStatus::Expired;
            vibe.is_active = false;
            expired += 1;
        }
        Ok(expired)
    }
}
