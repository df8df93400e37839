use anyhow::Result;
use rusqlite::Row;

use super::OptionalExt;
use crate::models::{NewTransfer, TransferFilter, TransferRow};
use crate::{Database, now_timestamp};

const TRANSFER_COLUMNS: &str = "id, kind, origin_store_id, destination_store_id, product_name, \
     brand, quantity, supplier, responsible, picked_up_by, document_number, notes, \
     transfer_number, load_size, status, route_id, courier_id, date, created_at, created_by, \
     confirmed_at, confirmed_by";

impl Database {
    pub fn insert_transfer(&self, t: &NewTransfer) -> Result<()> {
        self.with_conn_mut(|conn| {
            conn.execute(
                "INSERT INTO transfers (id, kind, origin_store_id, destination_store_id,
                     product_name, brand, quantity, supplier, responsible, picked_up_by,
                     document_number, notes, transfer_number, load_size, status, courier_id,
                     date, created_at, created_by)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13, ?14,
                         'pending', ?15, ?16, ?17, ?18)",
                rusqlite::params![
                    t.id,
                    t.kind,
                    t.origin_store_id,
                    t.destination_store_id,
                    t.product_name,
                    t.brand,
                    t.quantity,
                    t.supplier,
                    t.responsible,
                    t.picked_up_by,
                    t.document_number,
                    t.notes,
                    t.transfer_number,
                    t.load_size,
                    t.courier_id,
                    t.date,
                    now_timestamp(),
                    t.created_by,
                ],
            )?;
            Ok(())
        })
    }

    pub fn get_transfer(&self, id: &str) -> Result<Option<TransferRow>> {
        self.with_conn(|conn| {
            let sql = format!("SELECT {TRANSFER_COLUMNS} FROM transfers WHERE id = ?1");
            conn.query_row(&sql, [id], map_transfer).optional()
        })
    }

    /// Transfers not yet assigned to a route, newest first.
    pub fn list_unrouted_transfers(&self, filter: &TransferFilter<'_>) -> Result<Vec<TransferRow>> {
        self.with_conn(|conn| {
            let sql = format!(
                "SELECT {TRANSFER_COLUMNS} FROM transfers
                 WHERE route_id IS NULL
                   AND (?1 IS NULL OR load_size = ?1)
                   AND (?2 IS NULL OR status = ?2)
                   AND (?3 IS NULL OR origin_store_id = ?3 OR destination_store_id = ?3)
                 ORDER BY created_at DESC, rowid DESC"
            );
            let mut stmt = conn.prepare(&sql)?;
            let rows = stmt
                .query_map(
                    rusqlite::params![filter.load_size, filter.status, filter.store_id],
                    map_transfer,
                )?
                .collect::<std::result::Result<Vec<_>, _>>()?;
            Ok(rows)
        })
    }

    pub fn list_route_transfers(&self, route_id: &str) -> Result<Vec<TransferRow>> {
        self.with_conn(|conn| {
            let sql = format!(
                "SELECT {TRANSFER_COLUMNS} FROM transfers WHERE route_id = ?1 ORDER BY created_at"
            );
            let mut stmt = conn.prepare(&sql)?;
            let rows = stmt
                .query_map([route_id], map_transfer)?
                .collect::<std::result::Result<Vec<_>, _>>()?;
            Ok(rows)
        })
    }

    /// Returns `false` once the transfer is confirmed (or gone).
    pub fn set_picked_up_by(&self, id: &str, picked_up_by: Option<&str>) -> Result<bool> {
        self.with_conn_mut(|conn| {
            let n = conn.execute(
                "UPDATE transfers SET picked_up_by = ?1 WHERE id = ?2 AND status != 'confirmed'",
                rusqlite::params![picked_up_by, id],
            )?;
            Ok(n > 0)
        })
    }

    /// pending -> in_transit. `courier_id` replaces the assigned courier when given.
    pub fn pick_up_transfer(&self, id: &str, courier_id: Option<&str>) -> Result<bool> {
        self.with_conn_mut(|conn| {
            let n = conn.execute(
                "UPDATE transfers SET status = 'in_transit', courier_id = COALESCE(?1, courier_id)
                 WHERE id = ?2 AND status = 'pending'",
                rusqlite::params![courier_id, id],
            )?;
            Ok(n > 0)
        })
    }

    /// in_transit -> confirmed.
    pub fn receive_transfer(&self, id: &str, user_id: &str) -> Result<bool> {
        self.with_conn_mut(|conn| {
            let n = conn.execute(
                "UPDATE transfers SET status = 'confirmed', confirmed_at = ?1, confirmed_by = ?2
                 WHERE id = ?3 AND status = 'in_transit'",
                (now_timestamp(), user_id, id),
            )?;
            Ok(n > 0)
        })
    }

    /// Any non-final status -> confirmed. Returns `false` if already confirmed.
    pub fn confirm_transfer(&self, id: &str, user_id: &str) -> Result<bool> {
        self.with_conn_mut(|conn| {
            let n = conn.execute(
                "UPDATE transfers SET status = 'confirmed', confirmed_at = ?1, confirmed_by = ?2
                 WHERE id = ?3 AND status != 'confirmed'",
                (now_timestamp(), user_id, id),
            )?;
            Ok(n > 0)
        })
    }

    pub fn delete_transfer(&self, id: &str) -> Result<bool> {
        self.with_conn_mut(|conn| {
            let n = conn.execute("DELETE FROM transfers WHERE id = ?1", [id])?;
            Ok(n > 0)
        })
    }
}

fn map_transfer(row: &Row<'_>) -> rusqlite::Result<TransferRow> {
    Ok(TransferRow {
        id: row.get(0)?,
        kind: row.get(1)?,
        origin_store_id: row.get(2)?,
        destination_store_id: row.get(3)?,
        product_name: row.get(4)?,
        brand: row.get(5)?,
        quantity: row.get(6)?,
        supplier: row.get(7)?,
        responsible: row.get(8)?,
        picked_up_by: row.get(9)?,
        document_number: row.get(10)?,
        notes: row.get(11)?,
        transfer_number: row.get(12)?,
        load_size: row.get(13)?,
        status: row.get(14)?,
        route_id: row.get(15)?,
        courier_id: row.get(16)?,
        date: row.get(17)?,
        created_at: row.get(18)?,
        created_by: row.get(19)?,
        confirmed_at: row.get(20)?,
        confirmed_by: row.get(21)?,
    })
}
