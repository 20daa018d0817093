use anyhow::Result;
use chrono::{DateTime, Utc};
use rusqlite::{Connection, Row};
use uuid::Uuid;

use larder_types::models::{Notification, NotificationPreferences};

use super::OptionalExt;
use super::food::map_food;
use crate::Database;
use crate::codec::{get_id, get_json, get_kind, get_ts, ts};
use crate::models::ExpiryCandidate;

const NOTIFICATION_COLUMNS: &str =
    "id, user_id, food_item_id, message, kind, is_read, suggestions, created_at";

impl Database {
    /// Live, non-wasted items expiring at or before `horizon`, with the
    /// owner's email and notification settings.
    pub fn expiry_candidates(&self, horizon: DateTime<Utc>) -> Result<Vec<ExpiryCandidate>> {
        self.with_conn(|conn| {
            let mut stmt = conn.prepare(
                "SELECT f.id, f.user_id, f.name, f.category, f.shelf_life, f.m_date,
                        f.expiry_date, f.is_wasted, f.wasted_at, f.created_at,
                        u.email, u.notify_email, u.notify_in_app, u.days_before_expiry
                 FROM food_items f
                 JOIN users u ON u.id = f.user_id
                 WHERE f.is_wasted = 0 AND f.expiry_date <= ?1
                 ORDER BY f.expiry_date",
            )?;
            let rows = stmt
                .query_map([ts(horizon)], |row| {
                    Ok(ExpiryCandidate {
                        item: map_food(row)?,
                        owner_email: row.get(10)?,
                        preferences: NotificationPreferences {
                            email: row.get(11)?,
                            in_app: row.get(12)?,
                            days_before_expiry: row.get(13)?,
                        },
                    })
                })?
                .collect::<std::result::Result<Vec<_>, _>>()?;
            Ok(rows)
        })
    }

    /// Insert a notification unless the same (user, item, kind) warning or
    /// expiry notice already exists. Returns whether a row was written.
    pub fn insert_notification_once(&self, n: &Notification) -> Result<bool> {
        let suggestions = serde_json::to_string(&n.suggestions)?;
        self.with_conn(|conn| {
            let inserted = conn.execute(
                "INSERT OR IGNORE INTO notifications
                    (id, user_id, food_item_id, message, kind, is_read, suggestions, created_at)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)",
                rusqlite::params![
                    n.id.to_string(),
                    n.user_id.to_string(),
                    n.food_item_id.to_string(),
                    n.message,
                    n.kind.as_str(),
                    n.is_read,
                    suggestions,
                    ts(n.created_at),
                ],
            )?;
            Ok(inserted == 1)
        })
    }

    pub fn list_notifications(&self, user_id: Uuid) -> Result<Vec<Notification>> {
        self.with_conn(|conn| {
            let mut stmt = conn.prepare(&format!(
                "SELECT {NOTIFICATION_COLUMNS} FROM notifications
                 WHERE user_id = ?1
                 ORDER BY created_at DESC, rowid DESC"
            ))?;
            let rows = stmt
                .query_map([user_id.to_string()], map_notification)?
                .collect::<std::result::Result<Vec<_>, _>>()?;
            Ok(rows)
        })
    }

    pub fn mark_notification_read(&self, user_id: Uuid, id: Uuid) -> Result<Option<Notification>> {
        self.with_conn(|conn| {
            let n = conn.execute(
                "UPDATE notifications SET is_read = 1 WHERE id = ?1 AND user_id = ?2",
                (id.to_string(), user_id.to_string()),
            )?;
            if n == 0 {
                return Ok(None);
            }
            query_notification(conn, user_id, id)
        })
    }

    pub fn mark_all_notifications_read(&self, user_id: Uuid) -> Result<u64> {
        self.with_conn(|conn| {
            let n = conn.execute(
                "UPDATE notifications SET is_read = 1 WHERE user_id = ?1 AND is_read = 0",
                [user_id.to_string()],
            )?;
            Ok(n as u64)
        })
    }

    pub fn delete_notification(&self, user_id: Uuid, id: Uuid) -> Result<bool> {
        self.with_conn(|conn| {
            let n = conn.execute(
                "DELETE FROM notifications WHERE id = ?1 AND user_id = ?2",
                (id.to_string(), user_id.to_string()),
            )?;
            Ok(n == 1)
        })
    }
}

fn query_notification(conn: &Connection, user_id: Uuid, id: Uuid) -> Result<Option<Notification>> {
    let mut stmt = conn.prepare(&format!(
        "SELECT {NOTIFICATION_COLUMNS} FROM notifications WHERE id = ?1 AND user_id = ?2"
    ))?;
    stmt.query_row((id.to_string(), user_id.to_string()), map_notification)
        .optional()
}

fn map_notification(row: &Row<'_>) -> rusqlite::Result<Notification> {
    Ok(Notification {
        id: get_id(row, 0)?,
        user_id: get_id(row, 1)?,
        food_item_id: get_id(row, 2)?,
        message: row.get(3)?,
        kind: get_kind(row, 4)?,
        is_read: row.get(5)?,
        suggestions: get_json(row, 6)?,
        created_at: get_ts(row, 7)?,
    })
}
