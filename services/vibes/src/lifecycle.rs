//! Vibe lifecycle: validation, timer computation, history filters and
//! status transitions
//!
//! A vibe is `active` from creation until it is cancelled by its owner or
//! its end time passes, at which point it becomes `expired`. Expiry is
//! applied lazily before every read of the owner's vibes, and periodically
//! for everyone by the sweeper.

use std::sync::Arc;

use chrono::{DateTime, Duration, NaiveDate, NaiveDateTime, SubsecRound, Utc};
use common::{
    middleware::AuthUser,
    validation::{FieldError, FieldErrors},
};
use rust_decimal::Decimal;
use serde_json::Value;
use tracing::{info, warn};
use uuid::Uuid;

use crate::{
    error::VibeError,
    models::{
        CreateVibeRequest, HistoryParams, MoodBucket, NewVibe, UpdateStatusRequest, Vibe,
        VibeFilter, VibeStatus,
    },
    repositories::VibeRepository,
};

pub const MAX_MOOD_TEXT_LENGTH: usize = 150;
pub const MAX_ADDRESS_LENGTH: usize = 255;
/// Decimal places kept for coordinates
pub const COORDINATE_SCALE: u32 = 14;

const INVALID_NUMBER: &str = "A valid number is required.";
const INVALID_INTEGER: &str = "A valid integer is required.";
const NULL_VALUE: &str = "This field may not be null.";

/// Total timer length in seconds; zero is rejected
pub fn timer_seconds(hours: i64, minutes: i64, seconds: i64) -> Result<i32, FieldError> {
    let total = hours * 3600 + minutes * 60 + seconds;
    if total <= 0 {
        return Err(FieldError::ZeroDuration);
    }
    i32::try_from(total).map_err(|_| FieldError::OutOfRange {
        min: 1.0,
        max: f64::from(i32::MAX),
    })
}

fn number(errors: &mut FieldErrors, field: &str, value: Option<&Value>) -> Option<f64> {
    let parsed = match value {
        None => Err(FieldError::Required),
        Some(Value::Null) => Err(FieldError::Malformed(NULL_VALUE.to_string())),
        Some(Value::Number(n)) => n.as_f64().ok_or(FieldError::Malformed(INVALID_NUMBER.to_string())),
        Some(Value::String(s)) => s
            .trim()
            .parse::<f64>()
            .map_err(|_| FieldError::Malformed(INVALID_NUMBER.to_string())),
        Some(_) => Err(FieldError::Malformed(INVALID_NUMBER.to_string())),
    }
    .and_then(|n| {
        if n.is_finite() {
            Ok(n)
        } else {
            Err(FieldError::Malformed(INVALID_NUMBER.to_string()))
        }
    });

    match parsed {
        Ok(n) => Some(n),
        Err(error) => {
            errors.add(field, error);
            None
        }
    }
}

fn integer(errors: &mut FieldErrors, field: &str, value: Option<&Value>) -> Option<i64> {
    let parsed = match value {
        None => Err(FieldError::Required),
        Some(Value::Null) => Err(FieldError::Malformed(NULL_VALUE.to_string())),
        Some(Value::Number(n)) => n
            .as_i64()
            .or_else(|| n.as_f64().filter(|f| f.fract() == 0.0).map(|f| f as i64))
            .ok_or(FieldError::Malformed(INVALID_INTEGER.to_string())),
        Some(Value::String(s)) => s
            .trim()
            .parse::<i64>()
            .map_err(|_| FieldError::Malformed(INVALID_INTEGER.to_string())),
        Some(_) => Err(FieldError::Malformed(INVALID_INTEGER.to_string())),
    };

    match parsed {
        Ok(n) => Some(n),
        Err(error) => {
            errors.add(field, error);
            None
        }
    }
}

/// Numeric value with an inclusive range check
trait Bounded: PartialOrd + Copy {
    fn as_f64(self) -> f64;
}

impl Bounded for f64 {
    fn as_f64(self) -> f64 {
        self
    }
}

impl Bounded for i64 {
    fn as_f64(self) -> f64 {
        self as f64
    }
}

fn in_range<T: Bounded>(
    errors: &mut FieldErrors,
    field: &str,
    value: Option<T>,
    min: T,
    max: T,
) -> Option<T> {
    let value = value?;
    if value < min || value > max {
        errors.add(
            field,
            FieldError::OutOfRange {
                min: min.as_f64(),
                max: max.as_f64(),
            },
        );
        return None;
    }
    Some(value)
}

fn coordinate(errors: &mut FieldErrors, field: &str, value: Option<f64>) -> Option<Decimal> {
    let value = value?;
    match Decimal::try_from(value) {
        Ok(decimal) => Some(decimal.round_dp(COORDINATE_SCALE)),
        Err(_) => {
            errors.add(field, FieldError::Malformed(INVALID_NUMBER.to_string()));
            None
        }
    }
}

fn bounded_text(errors: &mut FieldErrors, field: &str, value: &str, max_length: usize) -> bool {
    if value.chars().count() > max_length {
        errors.add(field, FieldError::TooLong { max_length });
        return false;
    }
    true
}

/// Validate a create request and stamp its timer starting at `now`
pub fn validate_new_vibe(
    user_id: Uuid,
    request: &CreateVibeRequest,
    now: DateTime<Utc>,
) -> Result<NewVibe, VibeError> {
    let mut errors = FieldErrors::new();

    let mood_bucket = match request.mood_bucket.as_deref() {
        None => {
            errors.add("mood_bucket", FieldError::Required);
            None
        }
        Some(value) => match value.parse::<MoodBucket>() {
            Ok(bucket) => Some(bucket),
            Err(()) => {
                errors.add(
                    "mood_bucket",
                    FieldError::InvalidChoice {
                        value: value.to_string(),
                    },
                );
                None
            }
        },
    };

    let mood_slider = number(&mut errors, "mood_slider", request.mood_slider.as_ref());
    let mood_slider = in_range(&mut errors, "mood_slider", mood_slider, 0.0, 1.0);

    let mood_text = match request.mood_text.as_deref() {
        None => {
            errors.add("mood_text", FieldError::Required);
            None
        }
        Some(text) if text.trim().is_empty() => {
            errors.add("mood_text", FieldError::Blank);
            None
        }
        Some(text) => bounded_text(&mut errors, "mood_text", text, MAX_MOOD_TEXT_LENGTH).then_some(text),
    };

    let latitude = number(&mut errors, "latitude", request.latitude.as_ref());
    let latitude = in_range(&mut errors, "latitude", latitude, -90.0, 90.0);
    let latitude = coordinate(&mut errors, "latitude", latitude);
    let longitude = number(&mut errors, "longitude", request.longitude.as_ref());
    let longitude = in_range(&mut errors, "longitude", longitude, -180.0, 180.0);
    let longitude = coordinate(&mut errors, "longitude", longitude);

    let address = request.address.as_deref().unwrap_or_default();
    let address_ok = bounded_text(&mut errors, "address", address, MAX_ADDRESS_LENGTH);

    let hours = integer(&mut errors, "hours", request.hours.as_ref());
    let hours = in_range(&mut errors, "hours", hours, 0, 23);
    let minutes = integer(&mut errors, "minutes", request.minutes.as_ref());
    let minutes = in_range(&mut errors, "minutes", minutes, 0, 59);
    let seconds = integer(&mut errors, "seconds", request.seconds.as_ref());
    let seconds = in_range(&mut errors, "seconds", seconds, 0, 59);

    let timer = match (hours, minutes, seconds) {
        (Some(h), Some(m), Some(s)) => match timer_seconds(h, m, s) {
            Ok(total) => Some(total),
            Err(error) => {
                errors.add("timer_seconds", error);
                None
            }
        },
        _ => None,
    };

    let (
        Some(mood_bucket),
        Some(mood_slider),
        Some(mood_text),
        Some(latitude),
        Some(longitude),
        true,
        Some(timer_seconds),
        true,
    ) = (
        mood_bucket,
        mood_slider,
        mood_text,
        latitude,
        longitude,
        address_ok,
        timer,
        errors.is_empty(),
    )
    else {
        return Err(VibeError::Validation(errors));
    };

    let start_time = now.trunc_subsecs(6);
    let end_time = start_time + Duration::seconds(i64::from(timer_seconds));

    Ok(NewVibe {
        user_id,
        mood_bucket,
        mood_slider,
        mood_text: mood_text.to_string(),
        latitude,
        longitude,
        address: address.to_string(),
        timer_seconds,
        start_time,
        end_time,
    })
}

/// Parse a timestamp given as RFC 3339, or as a naive date/time taken as UTC
pub fn parse_timestamp(value: &str) -> Option<DateTime<Utc>> {
    let value = value.trim();

    // A `+` offset arrives as a space when the query string was not encoded
    for candidate in [value.to_string(), value.replace(' ', "+")] {
        if let Ok(parsed) = DateTime::parse_from_rfc3339(&candidate) {
            return Some(parsed.with_timezone(&Utc));
        }
    }

    for format in ["%Y-%m-%dT%H:%M:%S%.f", "%Y-%m-%d %H:%M:%S%.f", "%Y-%m-%dT%H:%M"] {
        if let Ok(naive) = NaiveDateTime::parse_from_str(value, format) {
            return Some(naive.and_utc());
        }
    }

    NaiveDate::parse_from_str(value, "%Y-%m-%d")
        .ok()
        .and_then(|date| date.and_hms_opt(0, 0, 0))
        .map(|naive| naive.and_utc())
}

/// Turn raw history parameters into filters; unusable values are ignored
pub fn parse_filter(params: &HistoryParams) -> VibeFilter {
    let non_empty = |value: &Option<String>| {
        value
            .as_deref()
            .map(str::trim)
            .filter(|v| !v.is_empty())
            .map(str::to_string)
    };

    VibeFilter {
        status: non_empty(&params.status),
        is_active: match params.is_active.as_deref() {
            Some("true") => Some(true),
            Some("false") => Some(false),
            _ => None,
        },
        mood_bucket: non_empty(&params.mood_bucket),
        start_after: params.start_after.as_deref().and_then(parse_timestamp),
        end_before: params.end_before.as_deref().and_then(parse_timestamp),
    }
}

/// Parse the requested status of a status update
pub fn requested_status(request: &UpdateStatusRequest) -> Result<VibeStatus, VibeError> {
    let value = match request.status.as_deref() {
        None => return Err(VibeError::Validation(FieldErrors::single("status", FieldError::Required))),
        Some(value) => value,
    };

    value.parse().map_err(|()| {
        VibeError::Validation(FieldErrors::single(
            "status",
            FieldError::InvalidChoice {
                value: value.to_string(),
            },
        ))
    })
}

/// Allowed owner-driven transitions: an active vibe may expire or be
/// cancelled; nothing else moves
pub fn check_transition(from: VibeStatus, to: VibeStatus) -> Result<(), VibeError> {
    match (from, to) {
        (VibeStatus::Active, VibeStatus::Expired | VibeStatus::Cancelled) => Ok(()),
        _ => Err(VibeError::InvalidTransition { from, to }),
    }
}

/// Vibe operations for authenticated callers
#[derive(Clone)]
pub struct VibeLifecycle {
    vibes: Arc<dyn VibeRepository>,
}

impl VibeLifecycle {
    pub fn new(vibes: Arc<dyn VibeRepository>) -> Self {
        Self { vibes }
    }

    /// Create a vibe for the caller, starting its timer at `now`
    pub async fn create(
        &self,
        caller: &AuthUser,
        request: &CreateVibeRequest,
        now: DateTime<Utc>,
    ) -> Result<Vibe, VibeError> {
        let new_vibe = validate_new_vibe(caller.user_id, request, now).inspect_err(|e| {
            warn!("Vibe rejected for user {}: {}", caller.user_id, e);
        })?;

        let vibe = self.vibes.insert(&new_vibe).await?;
        info!(
            "Created vibe {} for user {} ({}s)",
            vibe.id, caller.user_id, vibe.timer_seconds
        );
        Ok(vibe)
    }

    /// The caller's vibes matching the filters, newest first
    pub async fn history(
        &self,
        caller: &AuthUser,
        params: &HistoryParams,
        now: DateTime<Utc>,
    ) -> Result<Vec<Vibe>, VibeError> {
        self.expire_for(caller, now).await?;
        let filter = parse_filter(params);
        Ok(self.vibes.history(caller.user_id, &filter).await?)
    }

    /// The caller's newest vibe that is still running
    pub async fn current(&self, caller: &AuthUser, now: DateTime<Utc>) -> Result<Vibe, VibeError> {
        self.expire_for(caller, now).await?;
        self.vibes
            .latest_running(caller.user_id, now)
            .await?
            .ok_or(VibeError::NoRunningVibe)
    }

    /// Expire or cancel one of the caller's active vibes
    pub async fn update_status(
        &self,
        caller: &AuthUser,
        vibe_id: i64,
        request: &UpdateStatusRequest,
        now: DateTime<Utc>,
    ) -> Result<Vibe, VibeError> {
        let target = requested_status(request)?;
        self.expire_for(caller, now).await?;

        let vibe = self
            .vibes
            .find_for_user(caller.user_id, vibe_id)
            .await?
            .ok_or(VibeError::NotFound)?;
        check_transition(vibe.status, target)?;

        let updated = self
            .vibes
            .close(caller.user_id, vibe_id, target)
            .await?
            .ok_or(VibeError::InvalidTransition {
                from: vibe.status,
                to: target,
            })?;

        info!("Vibe {} moved to {}", vibe_id, target);
        Ok(updated)
    }

    /// Expire every vibe whose end time has passed
    pub async fn sweep(&self, now: DateTime<Utc>) -> Result<u64, VibeError> {
        Ok(self.vibes.expire_due(now, None).await?)
    }

    async fn expire_for(&self, caller: &AuthUser, now: DateTime<Utc>) -> Result<(), VibeError> {
        let expired = self.vibes.expire_due(now, Some(caller.user_id)).await?;
        if expired > 0 {
            info!("Expired {} vibes for user {}", expired, caller.user_id);
        }
        Ok(())
    }
}
