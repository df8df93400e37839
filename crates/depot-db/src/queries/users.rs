use anyhow::Result;
use rusqlite::{Connection, Row};

use super::OptionalExt;
use crate::models::{NewUser, UserRow};
use crate::{Database, now_timestamp};

const USER_COLUMNS: &str = "u.id, u.username, u.password, u.email, u.first_name, u.last_name, \
     u.phone, u.role, u.is_active, u.created_at, s.id";

impl Database {
    /// Insert a user and optionally link an unclaimed store to it, atomically.
    /// Returns `false` (and writes nothing) when the store is missing or
    /// already linked to someone else.
    pub fn create_user(&self, user: &NewUser<'_>, link_store: Option<&str>) -> Result<bool> {
        self.with_conn_mut(|conn| {
            let tx = conn.transaction()?;
            tx.execute(
                "INSERT INTO users (id, username, password, email, first_name, last_name, phone, role, is_active, created_at)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10)",
                rusqlite::params![
                    user.id,
                    user.username,
                    user.password_hash,
                    user.email,
                    user.first_name,
                    user.last_name,
                    user.phone,
                    user.role,
                    user.is_active,
                    now_timestamp(),
                ],
            )?;

            if let Some(store_id) = link_store {
                let linked = tx.execute(
                    "UPDATE stores SET user_id = ?1 WHERE id = ?2 AND user_id IS NULL",
                    (user.id, store_id),
                )?;
                if linked == 0 {
                    return Ok(false);
                }
            }

            tx.commit()?;
            Ok(true)
        })
    }

    pub fn get_user_by_username(&self, username: &str) -> Result<Option<UserRow>> {
        self.with_conn(|conn| query_user(conn, "u.username = ?1", username))
    }

    pub fn get_user_by_id(&self, id: &str) -> Result<Option<UserRow>> {
        self.with_conn(|conn| query_user(conn, "u.id = ?1", id))
    }

    pub fn list_users(&self) -> Result<Vec<UserRow>> {
        self.with_conn(|conn| {
            let sql = format!(
                "SELECT {USER_COLUMNS} FROM users u LEFT JOIN stores s ON s.user_id = u.id
                 ORDER BY u.username"
            );
            let mut stmt = conn.prepare(&sql)?;
            let rows = stmt
                .query_map([], map_user)?
                .collect::<std::result::Result<Vec<_>, _>>()?;
            Ok(rows)
        })
    }

    pub fn count_users(&self) -> Result<i64> {
        self.with_conn(|conn| Ok(conn.query_row("SELECT COUNT(*) FROM users", [], |r| r.get(0))?))
    }

    /// Write back the editable profile columns of `user`. A user leaving the
    /// store role gives up its store in the same transaction.
    pub fn update_user(&self, user: &UserRow) -> Result<bool> {
        self.with_conn_mut(|conn| {
            let tx = conn.transaction()?;
            let n = tx.execute(
                "UPDATE users SET username = ?1, email = ?2, first_name = ?3, last_name = ?4,
                        phone = ?5, role = ?6, is_active = ?7
                 WHERE id = ?8",
                rusqlite::params![
                    user.username,
                    user.email,
                    user.first_name,
                    user.last_name,
                    user.phone,
                    user.role,
                    user.is_active,
                    user.id,
                ],
            )?;
            release_store_unless_store_role(&tx, &user.id, &user.role)?;
            tx.commit()?;
            Ok(n > 0)
        })
    }

    /// Flip the active flag. Returns the new value, or `None` if the user is gone.
    pub fn toggle_user_active(&self, id: &str) -> Result<Option<bool>> {
        self.with_conn_mut(|conn| {
            conn.query_row(
                "UPDATE users SET is_active = 1 - is_active WHERE id = ?1 RETURNING is_active",
                [id],
                |row| row.get(0),
            )
            .optional()
        })
    }

    /// Change the role, unlinking the user's store unless the new role is `store`.
    pub fn set_user_role(&self, id: &str, role: &str) -> Result<bool> {
        self.with_conn_mut(|conn| {
            let tx = conn.transaction()?;
            let n = tx.execute("UPDATE users SET role = ?1 WHERE id = ?2", (role, id))?;
            release_store_unless_store_role(&tx, id, role)?;
            tx.commit()?;
            Ok(n > 0)
        })
    }

    pub fn set_user_password(&self, id: &str, password_hash: Option<&str>) -> Result<bool> {
        self.with_conn_mut(|conn| {
            let n = conn.execute(
                "UPDATE users SET password = ?1 WHERE id = ?2",
                rusqlite::params![password_hash, id],
            )?;
            Ok(n > 0)
        })
    }

    // -- Password resets --

    pub fn create_password_reset(&self, token: &str, user_id: &str, expires_at: &str) -> Result<()> {
        self.with_conn_mut(|conn| {
            conn.execute(
                "INSERT INTO password_resets (token, user_id, expires_at) VALUES (?1, ?2, ?3)",
                (token, user_id, expires_at),
            )?;
            Ok(())
        })
    }

    /// Spend a reset token and set the new password hash. Returns `false` for
    /// unknown, used or expired tokens.
    pub fn consume_password_reset(&self, token: &str, password_hash: &str) -> Result<bool> {
        self.with_conn_mut(|conn| {
            let tx = conn.transaction()?;
            let user_id: Option<String> = tx
                .query_row(
                    "SELECT user_id FROM password_resets
                     WHERE token = ?1 AND used = 0 AND expires_at > ?2",
                    (token, now_timestamp()),
                    |row| row.get(0),
                )
                .optional()?;

            let Some(user_id) = user_id else {
                return Ok(false);
            };

            tx.execute("UPDATE users SET password = ?1 WHERE id = ?2", (password_hash, &user_id))?;
            tx.execute("UPDATE password_resets SET used = 1 WHERE token = ?1", [token])?;
            tx.commit()?;
            Ok(true)
        })
    }
}

fn release_store_unless_store_role(conn: &Connection, user_id: &str, role: &str) -> Result<()> {
    if role != "store" {
        conn.execute("UPDATE stores SET user_id = NULL WHERE user_id = ?1", [user_id])?;
    }
    Ok(())
}

fn query_user(conn: &Connection, predicate: &str, value: &str) -> Result<Option<UserRow>> {
    let sql = format!(
        "SELECT {USER_COLUMNS} FROM users u LEFT JOIN stores s ON s.user_id = u.id WHERE {predicate}"
    );
    let mut stmt = conn.prepare(&sql)?;
    stmt.query_row([value], map_user).optional()
}

fn map_user(row: &Row<'_>) -> rusqlite::Result<UserRow> {
    Ok(UserRow {
        id: row.get(0)?,
        username: row.get(1)?,
        password: row.get(2)?,
        email: row.get(3)?,
        first_name: row.get(4)?,
        last_name: row.get(5)?,
        phone: row.get(6)?,
        role: row.get(7)?,
        is_active: row.get(8)?,
        created_at: row.get(9)?,
        store_id: row.get(10)?,
    })
}
