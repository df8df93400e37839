use anyhow::Result;
use rusqlite::Row;

use super::OptionalExt;
use crate::models::MovementRow;
use crate::{Database, now_timestamp};

impl Database {
    pub fn insert_movement(&self, id: &str, kind: &str, date: &str, protocol: &str) -> Result<()> {
        self.with_conn_mut(|conn| {
            conn.execute(
                "INSERT INTO stock_movements (id, kind, date, protocol, created_at)
                 VALUES (?1, ?2, ?3, ?4, ?5)",
                (id, kind, date, protocol, now_timestamp()),
            )?;
            Ok(())
        })
    }

    pub fn get_movement(&self, id: &str) -> Result<Option<MovementRow>> {
        self.with_conn(|conn| {
            conn.query_row(
                "SELECT id, kind, date, protocol, created_at FROM stock_movements WHERE id = ?1",
                [id],
                map_movement,
            )
            .optional()
        })
    }

    /// Movements newest first, optionally only entries or exits.
    pub fn list_movements(&self, kind: Option<&str>) -> Result<Vec<MovementRow>> {
        self.with_conn(|conn| {
            let mut stmt = conn.prepare(
                "SELECT id, kind, date, protocol, created_at FROM stock_movements
                 WHERE (?1 IS NULL OR kind = ?1)
                 ORDER BY date DESC, created_at DESC",
            )?;
            let rows = stmt
                .query_map([kind], map_movement)?
                .collect::<std::result::Result<Vec<_>, _>>()?;
            Ok(rows)
        })
    }
}

fn map_movement(row: &Row<'_>) -> rusqlite::Result<MovementRow> {
    Ok(MovementRow {
        id: row.get(0)?,
        kind: row.get(1)?,
        date: row.get(2)?,
        protocol: row.get(3)?,
        created_at: row.get(4)?,
    })
}
