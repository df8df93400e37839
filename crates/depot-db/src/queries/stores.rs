use anyhow::Result;
use rusqlite::Row;

use depot_types::api::StoreRequest;

use super::OptionalExt;
use crate::models::{StoreRow, StoreStopRow};
use crate::Database;

const STORE_COLUMNS: &str = "id, user_id, name, city, state, postal_code, district, number, \
     complement, address, latitude, longitude, active";

impl Database {
    pub fn insert_store(&self, id: &str, store: &StoreRequest) -> Result<()> {
        self.with_conn_mut(|conn| {
            conn.execute(
                "INSERT INTO stores (id, name, city, state, postal_code, district, number,
                                     complement, address, latitude, longitude, active)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12)",
                rusqlite::params![
                    id,
                    store.name,
                    store.city,
                    store.state,
                    store.postal_code,
                    store.district,
                    store.number,
                    store.complement,
                    store.address,
                    store.latitude,
                    store.longitude,
                    store.active,
                ],
            )?;
            Ok(())
        })
    }

    pub fn update_store(&self, id: &str, store: &StoreRequest) -> Result<bool> {
        self.with_conn_mut(|conn| {
            let n = conn.execute(
                "UPDATE stores SET name = ?2, city = ?3, state = ?4, postal_code = ?5,
                        district = ?6, number = ?7, complement = ?8, address = ?9,
                        latitude = ?10, longitude = ?11, active = ?12
                 WHERE id = ?1",
                rusqlite::params![
                    id,
                    store.name,
                    store.city,
                    store.state,
                    store.postal_code,
                    store.district,
                    store.number,
                    store.complement,
                    store.address,
                    store.latitude,
                    store.longitude,
                    store.active,
                ],
            )?;
            Ok(n > 0)
        })
    }

    pub fn get_store(&self, id: &str) -> Result<Option<StoreRow>> {
        self.with_conn(|conn| {
            let sql = format!("SELECT {STORE_COLUMNS} FROM stores WHERE id = ?1");
            conn.query_row(&sql, [id], map_store).optional()
        })
    }

    /// Stores ordered by name, optionally only active (or inactive) ones.
    pub fn list_stores(&self, active: Option<bool>) -> Result<Vec<StoreRow>> {
        self.with_conn(|conn| {
            let sql = format!(
                "SELECT {STORE_COLUMNS} FROM stores
                 WHERE (?1 IS NULL OR active = ?1)
                 ORDER BY name"
            );
            let mut stmt = conn.prepare(&sql)?;
            let rows = stmt
                .query_map([active], map_store)?
                .collect::<std::result::Result<Vec<_>, _>>()?;
            Ok(rows)
        })
    }

    /// Every stop that visits `store_id`, newest route date first.
    pub fn list_stops_for_store(&self, store_id: &str) -> Result<Vec<StoreStopRow>> {
        self.with_conn(|conn| {
            let mut stmt = conn.prepare(
                "SELECT p.id, p.route_id, r.date, r.status, p.position, p.status, p.collected_at
                 FROM stops p
                 JOIN routes r ON r.id = p.route_id
                 WHERE p.store_id = ?1
                 ORDER BY r.date DESC, r.created_at DESC, p.position",
            )?;
            let rows = stmt
                .query_map([store_id], |row| {
                    Ok(StoreStopRow {
                        id: row.get(0)?,
                        route_id: row.get(1)?,
                        route_date: row.get(2)?,
                        route_status: row.get(3)?,
                        position: row.get(4)?,
                        status: row.get(5)?,
                        collected_at: row.get(6)?,
                    })
                })?
                .collect::<std::result::Result<Vec<_>, _>>()?;
            Ok(rows)
        })
    }
}

fn map_store(row: &Row<'_>) -> rusqlite::Result<StoreRow> {
    Ok(StoreRow {
        id: row.get(0)?,
        user_id: row.get(1)?,
        name: row.get(2)?,
        city: row.get(3)?,
        state: row.get(4)?,
        postal_code: row.get(5)?,
        district: row.get(6)?,
        number: row.get(7)?,
        complement: row.get(8)?,
        address: row.get(9)?,
        latitude: row.get(10)?,
        longitude: row.get(11)?,
        active: row.get(12)?,
    })
}
