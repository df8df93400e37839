use anyhow::{Result, anyhow};
use rusqlite::{Connection, Row};

use super::OptionalExt;
use crate::models::{ContactRow, MessageRow};
use crate::{Database, now_timestamp};

// JOIN users to fetch sender_username in a single query
const MESSAGE_SELECT: &str = "SELECT m.id, m.sender_id, u.username, m.recipient_id, m.body,
            m.created_at, m.read, m.edited, m.attachment_id
     FROM messages m
     LEFT JOIN users u ON m.sender_id = u.id";

impl Database {
    /// Persist a message and return the stored row.
    pub fn insert_message(
        &self,
        id: &str,
        sender_id: &str,
        recipient_id: &str,
        body: &str,
        attachment_id: Option<&str>,
    ) -> Result<MessageRow> {
        self.with_conn_mut(|conn| {
            conn.execute(
                "INSERT INTO messages (id, sender_id, recipient_id, body, created_at, attachment_id)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
                rusqlite::params![id, sender_id, recipient_id, body, now_timestamp(), attachment_id],
            )?;
            query_message(conn, id)?.ok_or_else(|| anyhow!("Message vanished after insert: {}", id))
        })
    }

    pub fn get_message(&self, id: &str) -> Result<Option<MessageRow>> {
        self.with_conn(|conn| query_message(conn, id))
    }

    /// Both directions of the conversation between two users, oldest first.
    pub fn get_conversation(&self, user_id: &str, other_id: &str) -> Result<Vec<MessageRow>> {
        self.with_conn(|conn| {
            let sql = format!(
                "{MESSAGE_SELECT}
                 WHERE (m.sender_id = ?1 AND m.recipient_id = ?2)
                    OR (m.sender_id = ?2 AND m.recipient_id = ?1)
                 ORDER BY m.created_at, m.rowid"
            );
            let mut stmt = conn.prepare(&sql)?;
            let rows = stmt
                .query_map([user_id, other_id], map_message)?
                .collect::<std::result::Result<Vec<_>, _>>()?;
            Ok(rows)
        })
    }

    /// Replace the body of a message owned by `sender_id` and flag it edited.
    /// Returns the updated row, or `None` when no such message belongs to the sender.
    pub fn edit_message(&self, id: &str, sender_id: &str, body: &str) -> Result<Option<MessageRow>> {
        self.with_conn_mut(|conn| {
            let n = conn.execute(
                "UPDATE messages SET body = ?1, edited = 1 WHERE id = ?2 AND sender_id = ?3",
                (body, id, sender_id),
            )?;
            if n == 0 {
                return Ok(None);
            }
            query_message(conn, id)
        })
    }

    pub fn delete_message(&self, id: &str) -> Result<bool> {
        self.with_conn_mut(|conn| {
            let n = conn.execute("DELETE FROM messages WHERE id = ?1", [id])?;
            Ok(n > 0)
        })
    }

    /// Mark everything `other_id` sent to `reader_id` as read. Returns how many
    /// messages changed.
    pub fn mark_conversation_read(&self, reader_id: &str, other_id: &str) -> Result<u32> {
        self.with_conn_mut(|conn| {
            let n = conn.execute(
                "UPDATE messages SET read = 1
                 WHERE sender_id = ?1 AND recipient_id = ?2 AND read = 0",
                (other_id, reader_id),
            )?;
            Ok(n as u32)
        })
    }

    pub fn unread_count(&self, user_id: &str) -> Result<u32> {
        self.with_conn(|conn| {
            Ok(conn.query_row(
                "SELECT COUNT(*) FROM messages WHERE recipient_id = ?1 AND read = 0",
                [user_id],
                |row| row.get(0),
            )?)
        })
    }

    /// Every other user with their unread count and the time of the latest
    /// message exchanged with `user_id`. Most recent interaction first; users
    /// never talked to come last, by username.
    pub fn list_contacts(&self, user_id: &str) -> Result<Vec<ContactRow>> {
        self.with_conn(|conn| {
            let mut stmt = conn.prepare(
                "SELECT u.id, u.username,
                    (SELECT COUNT(*) FROM messages m
                      WHERE m.sender_id = u.id AND m.recipient_id = ?1 AND m.read = 0) AS unread,
                    (SELECT MAX(m.created_at) FROM messages m
                      WHERE (m.sender_id = u.id AND m.recipient_id = ?1)
                         OR (m.sender_id = ?1 AND m.recipient_id = u.id)) AS last_at
                 FROM users u
                 WHERE u.id != ?1
                 ORDER BY last_at IS NULL, last_at DESC, u.username",
            )?;
            let rows = stmt
                .query_map([user_id], |row| {
                    Ok(ContactRow {
                        user_id: row.get(0)?,
                        username: row.get(1)?,
                        unread: row.get(2)?,
                        last_interaction: row.get(3)?,
                    })
                })?
                .collect::<std::result::Result<Vec<_>, _>>()?;
            Ok(rows)
        })
    }

    /// True when `user_id` sent or received a message carrying `file_id`.
    pub fn file_shared_with(&self, file_id: &str, user_id: &str) -> Result<bool> {
        self.with_conn(|conn| {
            Ok(conn.query_row(
                "SELECT EXISTS(SELECT 1 FROM messages
                  WHERE attachment_id = ?1 AND (sender_id = ?2 OR recipient_id = ?2))",
                [file_id, user_id],
                |row| row.get(0),
            )?)
        })
    }
}

fn query_message(conn: &Connection, id: &str) -> Result<Option<MessageRow>> {
    let sql = format!("{MESSAGE_SELECT} WHERE m.id = ?1");
    let mut stmt = conn.prepare(&sql)?;
    stmt.query_row([id], map_message).optional()
}

fn map_message(row: &Row<'_>) -> rusqlite::Result<MessageRow> {
    Ok(MessageRow {
        id: row.get(0)?,
        sender_id: row.get(1)?,
        sender_username: row
            .get::<_, Option<String>>(2)?
            .unwrap_or_else(|| "unknown".to_string()),
        recipient_id: row.get(3)?,
        body: row.get(4)?,
        created_at: row.get(5)?,
        read: row.get(6)?,
        edited: row.get(7)?,
        attachment_id: row.get(8)?,
    })
}
