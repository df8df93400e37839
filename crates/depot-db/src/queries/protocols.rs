use anyhow::Result;
use rusqlite::Row;

use super::OptionalExt;
use crate::models::ProtocolRow;
use crate::{Database, now_timestamp};

const PROTOCOL_COLUMNS: &str = "id, number, kind, date, store_id, responsible, status, created_at, \
     created_by, confirmed_name, confirmed_by, confirmed_at";

impl Database {
    #[allow(clippy::too_many_arguments)]
    pub fn insert_protocol(
        &self,
        id: &str,
        number: &str,
        kind: Option<&str>,
        date: &str,
        store_id: Option<&str>,
        responsible: Option<&str>,
        created_by: &str,
    ) -> Result<()> {
        self.with_conn_mut(|conn| {
            conn.execute(
                "INSERT INTO protocols (id, number, kind, date, store_id, responsible, created_at, created_by)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)",
                rusqlite::params![id, number, kind, date, store_id, responsible, now_timestamp(), created_by],
            )?;
            Ok(())
        })
    }

    pub fn get_protocol(&self, id: &str) -> Result<Option<ProtocolRow>> {
        self.with_conn(|conn| {
            let sql = format!("SELECT {PROTOCOL_COLUMNS} FROM protocols WHERE id = ?1");
            conn.query_row(&sql, [id], map_protocol).optional()
        })
    }

    pub fn list_protocols(&self) -> Result<Vec<ProtocolRow>> {
        self.with_conn(|conn| {
            let sql = format!(
                "SELECT {PROTOCOL_COLUMNS} FROM protocols ORDER BY created_at DESC, rowid DESC"
            );
            let mut stmt = conn.prepare(&sql)?;
            let rows = stmt
                .query_map([], map_protocol)?
                .collect::<std::result::Result<Vec<_>, _>>()?;
            Ok(rows)
        })
    }

    /// pending -> confirmed, recording who received the batch. Returns `false`
    /// if the protocol was already finalized.
    pub fn confirm_protocol(&self, id: &str, confirmed_name: &str, user_id: &str) -> Result<bool> {
        self.with_conn_mut(|conn| {
            let n = conn.execute(
                "UPDATE protocols
                 SET status = 'confirmed', confirmed_name = ?1, confirmed_by = ?2, confirmed_at = ?3
                 WHERE id = ?4 AND status = 'pending'",
                (confirmed_name, user_id, now_timestamp(), id),
            )?;
            Ok(n > 0)
        })
    }
}

fn map_protocol(row: &Row<'_>) -> rusqlite::Result<ProtocolRow> {
    Ok(ProtocolRow {
        id: row.get(0)?,
        number: row.get(1)?,
        kind: row.get(2)?,
        date: row.get(3)?,
        store_id: row.get(4)?,
        responsible: row.get(5)?,
        status: row.get(6)?,
        created_at: row.get(7)?,
        created_by: row.get(8)?,
        confirmed_name: row.get(9)?,
        confirmed_by: row.get(10)?,
        confirmed_at: row.get(11)?,
    })
}
