//! Vibe model: a timed mood post with a location

use chrono::{DateTime, Utc};
use rust_decimal::{Decimal, prelude::ToPrimitive};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::fmt;
use std::str::FromStr;
use uuid::Uuid;

/// Mood category
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MoodBucket {
    Lighthearted,
    UpForAnything,
    Deep,
}

impl MoodBucket {
    pub fn as_str(&self) -> &'static str {
        match self {
            MoodBucket::Lighthearted => "lighthearted",
            MoodBucket::UpForAnything => "up_for_anything",
            MoodBucket::Deep => "deep",
        }
    }
}

impl FromStr for MoodBucket {
    type Err = ();

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "lighthearted" => Ok(MoodBucket::Lighthearted),
            "up_for_anything" => Ok(MoodBucket::UpForAnything),
            "deep" => Ok(MoodBucket::Deep),
            _ => Err(()),
        }
    }
}

/// Vibe lifecycle status
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum VibeStatus {
    Active,
    Expired,
    Cancelled,
}

impl VibeStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            VibeStatus::Active => "active",
            VibeStatus::Expired => "expired",
            VibeStatus::Cancelled => "cancelled",
        }
    }
}

impl FromStr for VibeStatus {
    type Err = ();

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "active" => Ok(VibeStatus::Active),
            "expired" => Ok(VibeStatus::Expired),
            "cancelled" => Ok(VibeStatus::Cancelled),
            _ => Err(()),
        }
    }
}

impl fmt::Display for VibeStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Vibe entity
#[derive(Debug, Clone, PartialEq)]
pub struct Vibe {
    pub id: i64,
    pub user_id: Uuid,
    pub mood_bucket: MoodBucket,
    pub mood_slider: f64,
    pub mood_text: String,
    pub latitude: Decimal,
    pub longitude: Decimal,
    pub address: String,
    pub timer_seconds: i32,
    pub start_time: DateTime<Utc>,
    pub end_time: DateTime<Utc>,
    pub created_at: DateTime<Utc>,
    pub is_active: bool,
    pub status: VibeStatus,
}

/// A validated vibe ready to insert
#[derive(Debug, Clone, PartialEq)]
pub struct NewVibe {
    pub user_id: Uuid,
    pub mood_bucket: MoodBucket,
    pub mood_slider: f64,
    pub mood_text: String,
    pub latitude: Decimal,
    pub longitude: Decimal,
    pub address: String,
    pub timer_seconds: i32,
    pub start_time: DateTime<Utc>,
    pub end_time: DateTime<Utc>,
}

/// Vibe as returned in response envelopes
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct VibeView {
    pub id: i64,
    pub mood_bucket: MoodBucket,
    pub mood_slider: f64,
    pub mood_text: String,
    pub latitude: f64,
    pub longitude: f64,
    pub address: String,
    pub timer_seconds: i32,
    pub start_time: DateTime<Utc>,
    pub end_time: DateTime<Utc>,
    pub created_at: DateTime<Utc>,
    pub status: VibeStatus,
    pub is_active: bool,
}

impl From<&Vibe> for VibeView {
    fn from(vibe: &Vibe) -> Self {
        Self {
            id: vibe.id,
            mood_bucket: vibe.mood_bucket,
            mood_slider: vibe.mood_slider,
            mood_text: vibe.mood_text.clone(),
            latitude: vibe.latitude.to_f64().unwrap_or_default(),
            longitude: vibe.longitude.to_f64().unwrap_or_default(),
            address: vibe.address.clone(),
            timer_seconds: vibe.timer_seconds,
            start_time: vibe.start_time,
            end_time: vibe.end_time,
            created_at: vibe.created_at,
            status: vibe.status,
            is_active: vibe.is_active,
        }
    }
}

/// Create-vibe request body
///
/// Numeric fields are kept as raw JSON so that a wrong type is reported
/// against its field instead of rejecting the whole body.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct CreateVibeRequest {
    pub mood_bucket: Option<String>,
    pub mood_slider: Option<Value>,
    pub mood_text: Option<String>,
    pub latitude: Option<Value>,
    pub longitude: Option<Value>,
    pub address: Option<String>,
    pub hours: Option<Value>,
    pub minutes: Option<Value>,
    pub seconds: Option<Value>,
}

/// Raw vibe-history query parameters
#[derive(Debug, Clone, Default, Deserialize)]
pub struct HistoryParams {
    pub status: Option<String>,
    pub is_active: Option<String>,
    pub mood_bucket: Option<String>,
    pub start_after: Option<String>,
    pub end_before: Option<String>,
}

/// Parsed history filters; every filter is optional and they combine with AND
#[derive(Debug, Clone, Default, PartialEq)]
pub struct VibeFilter {
    pub status: Option<String>,
    pub is_active: Option<bool>,
    pub mood_bucket: Option<String>,
    pub start_after: Option<DateTime<Utc>>,
    pub end_before: Option<DateTime<Utc>>,
}

impl VibeFilter {
    /// Whether `vibe` passes every filter
    pub fn matches(&self, vibe: &Vibe) -> bool {
        self.status.as_deref().is_none_or(|s| vibe.status.as_str() == s)
            && self.is_active.is_none_or(|a| vibe.is_active == a)
            && self
                .mood_bucket
                .as_deref()
                .is_none_or(|m| vibe.mood_bucket.as_str() == m)
            && self.start_after.is_none_or(|t| vibe.start_time >= t)
            && self.end_before.is_none_or(|t| vibe.end_time <= t)
    }
}

/// Status-update request body
#[derive(Debug, Clone, Default, Deserialize)]
pub struct UpdateStatusRequest {
    pub status: Option<String>,
}
