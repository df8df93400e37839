use std::collections::HashSet;

use anyhow::Result;
use rusqlite::{Connection, Row, Transaction};
use uuid::Uuid;

use super::OptionalExt;
use crate::models::{NewNotification, NewRoute, RouteBuild, RouteRow, StopRow};
use crate::{Database, now_timestamp};

const ROUTE_SELECT: &str = "SELECT r.id, r.name, r.date, r.courier_id, u.username, r.status, r.created_at,
            (SELECT COUNT(*) FROM stops p WHERE p.route_id = r.id),
            (SELECT COUNT(*) FROM stops p WHERE p.route_id = r.id AND p.status = 'collected')
     FROM routes r
     LEFT JOIN users u ON u.id = r.courier_id";

const STOP_SELECT: &str = "SELECT p.id, p.route_id, p.store_id, s.name, p.position, p.status,
            p.visited, p.collected_at, p.notes
     FROM stops p
     JOIN stores s ON s.id = p.store_id";

impl Database {
    /// Create a route with one stop per store (positions 1..n) and, when
    /// given, the courier's notification, all in one transaction.
    pub fn create_route(
        &self,
        route: &NewRoute,
        store_ids: &[String],
        notification: Option<&NewNotification>,
    ) -> Result<()> {
        self.with_conn_mut(|conn| {
            let tx = conn.transaction()?;
            insert_route(&tx, route)?;
            for (index, store_id) in store_ids.iter().enumerate() {
                insert_stop(&tx, &route.id, store_id, index as i64 + 1)?;
            }
            if let Some(n) = notification {
                super::notifications::insert_notification(&tx, n)?;
            }
            tx.commit()?;
            Ok(())
        })
    }

    /// Routes on `date`, optionally only those driven by `courier_id`.
    pub fn list_routes(&self, date: &str, courier_id: Option<&str>) -> Result<Vec<RouteRow>> {
        self.with_conn(|conn| {
            let sql = format!(
                "{ROUTE_SELECT}
                 WHERE r.date = ?1 AND (?2 IS NULL OR r.courier_id = ?2)
                 ORDER BY r.date, r.created_at"
            );
            let mut stmt = conn.prepare(&sql)?;
            let rows = stmt
                .query_map(rusqlite::params![date, courier_id], map_route)?
                .collect::<std::result::Result<Vec<_>, _>>()?;
            Ok(rows)
        })
    }

    pub fn get_route(&self, id: &str) -> Result<Option<RouteRow>> {
        self.with_conn(|conn| {
            let sql = format!("{ROUTE_SELECT} WHERE r.id = ?1");
            conn.query_row(&sql, [id], map_route).optional()
        })
    }

    pub fn list_stops(&self, route_id: &str) -> Result<Vec<StopRow>> {
        self.with_conn(|conn| {
            let sql = format!("{STOP_SELECT} WHERE p.route_id = ?1 ORDER BY p.position, p.rowid");
            let mut stmt = conn.prepare(&sql)?;
            let rows = stmt
                .query_map([route_id], map_stop)?
                .collect::<std::result::Result<Vec<_>, _>>()?;
            Ok(rows)
        })
    }

    pub fn get_stop(&self, id: &str) -> Result<Option<StopRow>> {
        self.with_conn(|conn| {
            let sql = format!("{STOP_SELECT} WHERE p.id = ?1");
            conn.query_row(&sql, [id], map_stop).optional()
        })
    }

    /// Append a stop after the current last one. Returns the new stop id.
    pub fn add_stop(&self, route_id: &str, store_id: &str) -> Result<String> {
        self.with_conn_mut(|conn| {
            let tx = conn.transaction()?;
            let last: i64 = tx.query_row(
                "SELECT COALESCE(MAX(position), 0) FROM stops WHERE route_id = ?1",
                [route_id],
                |row| row.get(0),
            )?;
            let id = insert_stop(&tx, route_id, store_id, last + 1)?;
            tx.commit()?;
            Ok(id)
        })
    }

    /// Give the route's stops positions 1..n following `ids`. Returns `false`
    /// (and changes nothing) unless `ids` is exactly the set of the route's stops.
    pub fn reorder_stops(&self, route_id: &str, ids: &[String]) -> Result<bool> {
        self.with_conn_mut(|conn| {
            let tx = conn.transaction()?;
            let current = stop_ids(&tx, route_id)?;
            let requested: HashSet<&str> = ids.iter().map(String::as_str).collect();

            if requested.len() != ids.len()
                || current.len() != ids.len()
                || !current.iter().all(|id| requested.contains(id.as_str()))
            {
                return Ok(false);
            }

            for (index, id) in ids.iter().enumerate() {
                tx.execute(
                    "UPDATE stops SET position = ?1 WHERE id = ?2 AND route_id = ?3",
                    rusqlite::params![index as i64 + 1, id, route_id],
                )?;
            }
            tx.commit()?;
            Ok(true)
        })
    }

    pub fn collect_stop(&self, id: &str) -> Result<bool> {
        self.with_conn_mut(|conn| {
            let n = conn.execute(
                "UPDATE stops SET status = 'collected', visited = 1, collected_at = ?1 WHERE id = ?2",
                (now_timestamp(), id),
            )?;
            Ok(n > 0)
        })
    }

    /// Put unrouted transfers on a new route and add one stop per distinct
    /// store, in order of first appearance (origin, then destination).
    pub fn build_route_from_transfers(
        &self,
        route: &NewRoute,
        transfer_ids: &[String],
    ) -> Result<RouteBuild> {
        self.with_conn_mut(|conn| {
            let tx = conn.transaction()?;

            let mut stores: Vec<String> = Vec::new();
            for transfer_id in transfer_ids {
                let found: Option<(Option<String>, Option<String>, Option<String>)> = tx
                    .query_row(
                        "SELECT origin_store_id, destination_store_id, route_id
                         FROM transfers WHERE id = ?1",
                        [transfer_id],
                        |row| Ok((row.get(0)?, row.get(1)?, row.get(2)?)),
                    )
                    .optional()?;

                let Some((origin, destination, current_route)) = found else {
                    return Ok(RouteBuild::MissingTransfer(transfer_id.clone()));
                };
                if current_route.is_some() {
                    return Ok(RouteBuild::AlreadyRouted(transfer_id.clone()));
                }

                for store in [origin, destination].into_iter().flatten() {
                    if !stores.contains(&store) {
                        stores.push(store);
                    }
                }
            }

            insert_route(&tx, route)?;
            for transfer_id in transfer_ids {
                tx.execute(
                    "UPDATE transfers SET route_id = ?1 WHERE id = ?2",
                    (&route.id, transfer_id),
                )?;
            }
            for (index, store_id) in stores.iter().enumerate() {
                insert_stop(&tx, &route.id, store_id, index as i64 + 1)?;
            }

            tx.commit()?;
            Ok(RouteBuild::Created {
                stops: stores.len(),
            })
        })
    }
}

fn insert_route(tx: &Transaction<'_>, route: &NewRoute) -> Result<()> {
    tx.execute(
        "INSERT INTO routes (id, name, date, courier_id, status, created_at)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
        rusqlite::params![
            route.id,
            route.name,
            route.date,
            route.courier_id,
            route.status,
            now_timestamp(),
        ],
    )?;
    Ok(())
}

fn insert_stop(tx: &Transaction<'_>, route_id: &str, store_id: &str, position: i64) -> Result<String> {
    let id = Uuid::new_v4().to_string();
    tx.execute(
        "INSERT INTO stops (id, route_id, store_id, position) VALUES (?1, ?2, ?3, ?4)",
        rusqlite::params![id, route_id, store_id, position],
    )?;
    Ok(id)
}

fn stop_ids(conn: &Connection, route_id: &str) -> Result<Vec<String>> {
    let mut stmt = conn.prepare("SELECT id FROM stops WHERE route_id = ?1")?;
    let ids = stmt
        .query_map([route_id], |row| row.get::<_, String>(0))?
        .collect::<std::result::Result<Vec<_>, _>>()?;
    Ok(ids)
}

fn map_route(row: &Row<'_>) -> rusqlite::Result<RouteRow> {
    Ok(RouteRow {
        id: row.get(0)?,
        name: row.get(1)?,
        date: row.get(2)?,
        courier_id: row.get(3)?,
        courier_username: row.get(4)?,
        status: row.get(5)?,
        created_at: row.get(6)?,
        total_stops: row.get(7)?,
        collected_stops: row.get(8)?,
    })
}

fn map_stop(row: &Row<'_>) -> rusqlite::Result<StopRow> {
    Ok(StopRow {
        id: row.get(0)?,
        route_id: row.get(1)?,
        store_id: row.get(2)?,
        store_name: row.get(3)?,
        position: row.get(4)?,
        status: row.get(5)?,
        visited: row.get(6)?,
        collected_at: row.get(7)?,
        notes: row.get(8)?,
    })
}
