use anyhow::Result;
use rusqlite::{Connection, Row};

use super::OptionalExt;
use crate::models::{NewNotification, NotificationRow};
use crate::{Database, now_timestamp};

impl Database {
    pub fn insert_notification(&self, n: &NewNotification) -> Result<()> {
        self.with_conn_mut(|conn| insert_notification(conn, n))
    }

    pub fn get_notification(&self, id: &str) -> Result<Option<NotificationRow>> {
        self.with_conn(|conn| {
            conn.query_row(
                "SELECT id, user_id, title, body, read, created_at FROM notifications WHERE id = ?1",
                [id],
                map_notification,
            )
            .optional()
        })
    }

    pub fn list_notifications(&self, user_id: &str) -> Result<Vec<NotificationRow>> {
        self.with_conn(|conn| {
            let mut stmt = conn.prepare(
                "SELECT id, user_id, title, body, read, created_at FROM notifications
                 WHERE user_id = ?1
                 ORDER BY created_at DESC, rowid DESC",
            )?;
            let rows = stmt
                .query_map([user_id], map_notification)?
                .collect::<std::result::Result<Vec<_>, _>>()?;
            Ok(rows)
        })
    }

    /// Only the owner can mark a notification read.
    pub fn mark_notification_read(&self, id: &str, user_id: &str) -> Result<bool> {
        self.with_conn_mut(|conn| {
            let n = conn.execute(
                "UPDATE notifications SET read = 1 WHERE id = ?1 AND user_id = ?2",
                (id, user_id),
            )?;
            Ok(n > 0)
        })
    }
}

pub(super) fn insert_notification(conn: &Connection, n: &NewNotification) -> Result<()> {
    conn.execute(
        "INSERT INTO notifications (id, user_id, title, body, created_at) VALUES (?1, ?2, ?3, ?4, ?5)",
        (&n.id, &n.user_id, &n.title, &n.body, now_timestamp()),
    )?;
    Ok(())
}

fn map_notification(row: &Row<'_>) -> rusqlite::Result<NotificationRow> {
    Ok(NotificationRow {
        id: row.get(0)?,
        user_id: row.get(1)?,
        title: row.get(2)?,
        body: row.get(3)?,
        read: row.get(4)?,
        created_at: row.get(5)?,
    })
}
