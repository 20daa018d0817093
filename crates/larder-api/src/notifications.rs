use axum::{
    Extension, Json,
    extract::{Path, State},
};
use chrono::{DateTime, TimeDelta, Utc};
use tracing::{debug, info, warn};
use uuid::Uuid;

use larder_db::Database;
use larder_db::models::ExpiryCandidate;
use larder_types::api::{Claims, ExpiryScanResponse, ExpiryScanStats, StatusMessage};
use larder_types::events::GatewayEvent;
use larder_types::models::{Notification, NotificationKind};

use crate::error::{ApiError, blocking, parse_id};
use crate::mailer::{self, Mailer};
use crate::state::{AppState, AppStateInner};
use crate::suggestions::suggestions_for;

/// Bounds for a user's `daysBeforeExpiry` preference.
pub const MIN_WARNING_DAYS: u32 = 1;
pub const MAX_WARNING_DAYS: u32 = 30;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExpiryStatus {
    /// Whole days left, rounded up.
    Expiring { days_left: i64 },
    Expired,
}

/// Where an item stands relative to `now` for an owner who wants warnings
/// `window_days` ahead. `None` means it is not due for a notice yet.
pub fn expiry_status(expiry: DateTime<Utc>, now: DateTime<Utc>, window_days: u32) -> Option<ExpiryStatus> {
    if expiry <= now {
        return Some(ExpiryStatus::Expired);
    }
    let window = window_days.clamp(MIN_WARNING_DAYS, MAX_WARNING_DAYS);
    if expiry > now + TimeDelta::days(i64::from(window)) {
        return None;
    }
    const DAY_MS: i64 = 24 * 60 * 60 * 1000;
    let remaining = (expiry - now).num_milliseconds();
    Some(ExpiryStatus::Expiring {
        days_left: (remaining + DAY_MS - 1) / DAY_MS,
    })
}

fn notice_for(candidate: &ExpiryCandidate, status: ExpiryStatus, now: DateTime<Utc>) -> Notification {
    let item = &candidate.item;
    let (kind, message) = match status {
        ExpiryStatus::Expired => (NotificationKind::Expired, format!("{} has expired!", item.name)),
        ExpiryStatus::Expiring { days_left } => (
            NotificationKind::Warning,
            format!("{} will expire in {}", item.name, mailer::plural_days(days_left)),
        ),
    };

    Notification {
        id: Uuid::new_v4(),
        user_id: item.user_id,
        food_item_id: item.id,
        message,
        kind,
        is_read: false,
        suggestions: suggestions_for(&item.category, &item.name),
        created_at: now,
    }
}

/// One pass over all stock. Returns the stats and the notifications that were
/// newly written and should be pushed in-app.
fn scan(db: &Database, outbox: &dyn Mailer, now: DateTime<Utc>) -> anyhow::Result<(ExpiryScanStats, Vec<Notification>)> {
    let horizon = now + TimeDelta::days(i64::from(MAX_WARNING_DAYS));
    let mut stats = ExpiryScanStats::default();
    let mut push = Vec::new();

    for candidate in db.expiry_candidates(horizon)? {
        let prefs = candidate.preferences;
        let Some(status) = expiry_status(candidate.item.expiry_date, now, prefs.days_before_expiry) else {
            continue;
        };
        match status {
            ExpiryStatus::Expired => stats.expired_items += 1,
            ExpiryStatus::Expiring { .. } => stats.expiring_items += 1,
        }

        let notice = notice_for(&candidate, status, now);
        if !db.insert_notification_once(&notice)? {
            continue;
        }
        stats.notifications_created += 1;

        if prefs.email {
            let days_left = match status {
                ExpiryStatus::Expired => 0,
                ExpiryStatus::Expiring { days_left } => days_left,
            };
            let email = mailer::expiry_email(&candidate.owner_email, &candidate.item, days_left, &notice.suggestions);
            match outbox.send(&email) {
                Ok(()) => stats.emails_sent += 1,
                Err(e) => warn!("Failed to send expiry email to {}: {:#}", candidate.owner_email, e),
            }
        }
        if prefs.in_app {
            push.push(notice);
        }
    }

    Ok((stats, push))
}

/// Create expiry notifications for every user and push them to online
/// clients. Shared by the daily scheduler and the cron endpoint.
pub async fn run_expiry_scan(state: &AppStateInner) -> anyhow::Result<ExpiryScanStats> {
    let db = state.db.clone();
    let outbox = state.mailer.clone();
    let now = larder_db::now();

    let (stats, push) = tokio::task::spawn_blocking(move || scan(&db, outbox.as_ref(), now)).await??;

    for notice in push {
        let user_id = notice.user_id;
        let delivered = state
            .dispatcher
            .emit_to_room(user_id, GatewayEvent::Notification(notice))
            .await;
        debug!("Notification pushed to {} connection(s) of {}", delivered, user_id);
    }

    info!(
        "Expiry scan: {} expiring, {} expired, {} notifications, {} emails",
        stats.expiring_items, stats.expired_items, stats.notifications_created, stats.emails_sent
    );
    Ok(stats)
}

/// `POST /notifications/check-expiry`, cron key only.
pub async fn check_expiry(State(state): State<AppState>) -> Result<Json<ExpiryScanResponse>, ApiError> {
    let stats = run_expiry_scan(&state).await?;
    Ok(Json(ExpiryScanResponse {
        message: "Expiry check completed".into(),
        stats,
    }))
}

pub async fn list(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
) -> Result<Json<Vec<Notification>>, ApiError> {
    let db = state.db.clone();
    Ok(Json(blocking(move || db.list_notifications(claims.sub)).await?))
}

pub async fn mark_read(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
    Path(id): Path<String>,
) -> Result<Json<Notification>, ApiError> {
    let id = parse_id(&id)?;
    let db = state.db.clone();
    let notice = blocking(move || db.mark_notification_read(claims.sub, id))
        .await?
        .ok_or_else(|| ApiError::not_found("Notification not found"))?;
    Ok(Json(notice))
}

pub async fn mark_all_read(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
) -> Result<Json<StatusMessage>, ApiError> {
    let db = state.db.clone();
    let n = blocking(move || db.mark_all_notifications_read(claims.sub)).await?;
    Ok(Json(StatusMessage::new(format!("{n} notification(s) marked as read"))))
}

pub async fn delete(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
    Path(id): Path<String>,
) -> Result<Json<StatusMessage>, ApiError> {
    let id = parse_id(&id)?;
    let db = state.db.clone();
    if !blocking(move || db.delete_notification(claims.sub, id)).await? {
        return Err(ApiError::not_found("Notification not found"));
    }
    Ok(Json(StatusMessage::new("Notification deleted")))
}
