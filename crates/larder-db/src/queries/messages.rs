use anyhow::Result;
use rusqlite::Row;
use uuid::Uuid;

use larder_types::models::ChatMessage;

use super::OptionalExt;
use crate::Database;
use crate::codec::{get_id, get_ts, ts};

const MESSAGE_COLUMNS: &str = "id, sender_id, recipient_id, text, created_at";

impl Database {
    pub fn insert_message(&self, msg: &ChatMessage) -> Result<()> {
        self.with_conn(|conn| {
            conn.execute(
                "INSERT INTO messages (id, sender_id, recipient_id, text, created_at)
                 VALUES (?1, ?2, ?3, ?4, ?5)",
                (
                    msg.id.to_string(),
                    msg.sender_id.to_string(),
                    msg.recipient_id.to_string(),
                    &msg.text,
                    ts(msg.timestamp),
                ),
            )?;
            Ok(())
        })
    }

    /// Visible messages between two users, oldest first.
    pub fn conversation(&self, user_id: Uuid, partner_id: Uuid) -> Result<Vec<ChatMessage>> {
        self.with_conn(|conn| {
            let mut stmt = conn.prepare(&format!(
                "SELECT {MESSAGE_COLUMNS} FROM messages
                 WHERE deleted = 0
                   AND ((sender_id = ?1 AND recipient_id = ?2)
                     OR (sender_id = ?2 AND recipient_id = ?1))
                 ORDER BY created_at, rowid"
            ))?;
            let rows = stmt
                .query_map((user_id.to_string(), partner_id.to_string()), map_message)?
                .collect::<std::result::Result<Vec<_>, _>>()?;
            Ok(rows)
        })
    }

    /// Every visible message the user sent or received, newest first.
    pub fn messages_for_user(&self, user_id: Uuid) -> Result<Vec<ChatMessage>> {
        self.with_conn(|conn| {
            let mut stmt = conn.prepare(&format!(
                "SELECT {MESSAGE_COLUMNS} FROM messages
                 WHERE deleted = 0 AND (sender_id = ?1 OR recipient_id = ?1)
                 ORDER BY created_at DESC, rowid DESC"
            ))?;
            let rows = stmt
                .query_map([user_id.to_string()], map_message)?
                .collect::<std::result::Result<Vec<_>, _>>()?;
            Ok(rows)
        })
    }

    pub fn get_message(&self, id: Uuid) -> Result<Option<ChatMessage>> {
        self.with_conn(|conn| {
            conn.query_row(
                &format!("SELECT {MESSAGE_COLUMNS} FROM messages WHERE id = ?1 AND deleted = 0"),
                [id.to_string()],
                map_message,
            )
            .optional()
        })
    }

    /// Hide a message. Only its sender may do this.
    pub fn soft_delete_message(&self, sender_id: Uuid, id: Uuid) -> Result<bool> {
        self.with_conn(|conn| {
            let n = conn.execute(
                "UPDATE messages SET deleted = 1
                 WHERE id = ?1 AND sender_id = ?2 AND deleted = 0",
                (id.to_string(), sender_id.to_string()),
            )?;
            Ok(n == 1)
        })
    }

    /// Hide every message exchanged between the pair, in both directions.
    pub fn clear_conversation(&self, user_id: Uuid, partner_id: Uuid) -> Result<u64> {
        self.with_conn(|conn| {
            let n = conn.execute(
                "UPDATE messages SET deleted = 1
                 WHERE deleted = 0
                   AND ((sender_id = ?1 AND recipient_id = ?2)
                     OR (sender_id = ?2 AND recipient_id = ?1))",
                (user_id.to_string(), partner_id.to_string()),
            )?;
            Ok(n as u64)
        })
    }
}

fn map_message(row: &Row<'_>) -> rusqlite::Result<ChatMessage> {
    Ok(ChatMessage {
        id: get_id(row, 0)?,
        sender_id: get_id(row, 1)?,
        recipient_id: get_id(row, 2)?,
        text: row.get(3)?,
        timestamp: get_ts(row, 4)?,
    })
}
