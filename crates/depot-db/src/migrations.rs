use anyhow::Result;
use rusqlite::Connection;
use tracing::info;

/// Each version's schema and its version row commit together.
pub fn run(conn: &Connection) -> Result<()> {
    conn.execute_batch("CREATE TABLE IF NOT EXISTS schema_version (version INTEGER NOT NULL);")?;

    let version: i64 =
        conn.query_row("SELECT COALESCE(MAX(version), 0) FROM schema_version", [], |r| r.get(0))?;

    if version < 1 {
        info!("Running migration v1 (users, chat, files)");
        let tx = conn.unchecked_transaction()?;
        tx.execute_batch(
            "
            CREATE TABLE users (
                id          TEXT PRIMARY KEY,
                username    TEXT NOT NULL UNIQUE,
                password    TEXT,
                email       TEXT NOT NULL DEFAULT '',
                first_name  TEXT NOT NULL DEFAULT '',
                last_name   TEXT NOT NULL DEFAULT '',
                phone       TEXT,
                role        TEXT NOT NULL,
                is_active   INTEGER NOT NULL DEFAULT 1,
                created_at  TEXT NOT NULL
            );

            CREATE TABLE files (
                id            TEXT PRIMARY KEY,
                uploader_id   TEXT NOT NULL REFERENCES users(id) ON DELETE CASCADE,
                filename      TEXT NOT NULL,
                content_type  TEXT NOT NULL,
                size          INTEGER NOT NULL,
                sha256        TEXT NOT NULL,
                created_at    TEXT NOT NULL
            );

            CREATE TABLE messages (
                id             TEXT PRIMARY KEY,
                sender_id      TEXT NOT NULL REFERENCES users(id) ON DELETE CASCADE,
                recipient_id   TEXT NOT NULL REFERENCES users(id) ON DELETE CASCADE,
                body           TEXT NOT NULL,
                created_at     TEXT NOT NULL,
                read           INTEGER NOT NULL DEFAULT 0,
                edited         INTEGER NOT NULL DEFAULT 0,
                attachment_id  TEXT REFERENCES files(id) ON DELETE SET NULL
            );

            CREATE INDEX idx_messages_pair
                ON messages(sender_id, recipient_id, created_at);

            CREATE INDEX idx_messages_unread
                ON messages(recipient_id, read);

            CREATE TABLE password_resets (
                token       TEXT PRIMARY KEY,
                user_id     TEXT NOT NULL REFERENCES users(id) ON DELETE CASCADE,
                expires_at  TEXT NOT NULL,
                used        INTEGER NOT NULL DEFAULT 0
            );

            INSERT INTO schema_version (version) VALUES (1);
            ",
        )?;
        tx.commit()?;
    }

    if version < 2 {
        info!("Running migration v2 (logistics)");
        let tx = conn.unchecked_transaction()?;
        tx.execute_batch(
            "
            CREATE TABLE stores (
                id           TEXT PRIMARY KEY,
                user_id      TEXT UNIQUE REFERENCES users(id) ON DELETE SET NULL,
                name         TEXT NOT NULL,
                city         TEXT NOT NULL,
                state        TEXT NOT NULL DEFAULT 'SP',
                postal_code  TEXT NOT NULL DEFAULT '00000-000',
                district     TEXT NOT NULL DEFAULT 'Centro',
                number       TEXT NOT NULL DEFAULT 'S/N',
                complement   TEXT,
                address      TEXT NOT NULL,
                latitude     REAL,
                longitude    REAL,
                active       INTEGER NOT NULL DEFAULT 1
            );

            CREATE TABLE routes (
                id          TEXT PRIMARY KEY,
                name        TEXT,
                date        TEXT NOT NULL,
                courier_id  TEXT REFERENCES users(id) ON DELETE SET NULL,
                status      TEXT NOT NULL DEFAULT 'open',
                created_at  TEXT NOT NULL
            );

            CREATE INDEX idx_routes_date ON routes(date);

            CREATE TABLE stops (
                id            TEXT PRIMARY KEY,
                route_id      TEXT NOT NULL REFERENCES routes(id) ON DELETE CASCADE,
                store_id      TEXT NOT NULL REFERENCES stores(id) ON DELETE CASCADE,
                position      INTEGER NOT NULL DEFAULT 0,
                status        TEXT NOT NULL DEFAULT 'pending',
                visited       INTEGER NOT NULL DEFAULT 0,
                collected_at  TEXT,
                notes         TEXT
            );

            CREATE INDEX idx_stops_route ON stops(route_id, position);

            CREATE TABLE transfers (
                id                    TEXT PRIMARY KEY,
                kind                  TEXT NOT NULL,
                origin_store_id       TEXT REFERENCES stores(id) ON DELETE RESTRICT,
                destination_store_id  TEXT REFERENCES stores(id) ON DELETE RESTRICT,
                product_name          TEXT,
                brand                 TEXT,
                quantity              INTEGER NOT NULL DEFAULT 0,
                supplier              TEXT,
                responsible           TEXT,
                picked_up_by          TEXT,
                document_number       TEXT,
                notes                 TEXT,
                transfer_number       TEXT NOT NULL,
                load_size             TEXT NOT NULL DEFAULT 'small',
                status                TEXT NOT NULL DEFAULT 'pending',
                route_id              TEXT REFERENCES routes(id) ON DELETE SET NULL,
                courier_id            TEXT REFERENCES users(id) ON DELETE SET NULL,
                date                  TEXT NOT NULL,
                created_at            TEXT NOT NULL,
                created_by            TEXT REFERENCES users(id) ON DELETE SET NULL,
                confirmed_at          TEXT,
                confirmed_by          TEXT REFERENCES users(id) ON DELETE SET NULL
            );

            CREATE INDEX idx_transfers_route ON transfers(route_id);

            CREATE TABLE protocols (
                id              TEXT PRIMARY KEY,
                number          TEXT NOT NULL UNIQUE,
                kind            TEXT,
                date            TEXT NOT NULL,
                store_id        TEXT REFERENCES stores(id) ON DELETE CASCADE,
                responsible     TEXT,
                status          TEXT NOT NULL DEFAULT 'pending',
                created_at      TEXT NOT NULL,
                created_by      TEXT REFERENCES users(id) ON DELETE SET NULL,
                confirmed_name  TEXT,
                confirmed_by    TEXT REFERENCES users(id) ON DELETE SET NULL,
                confirmed_at    TEXT
            );

            CREATE TABLE stock_movements (
                id          TEXT PRIMARY KEY,
                kind        TEXT NOT NULL,
                date        TEXT NOT NULL,
                protocol    TEXT NOT NULL DEFAULT '',
                created_at  TEXT NOT NULL
            );

            CREATE TABLE notifications (
                id          TEXT PRIMARY KEY,
                user_id     TEXT NOT NULL REFERENCES users(id) ON DELETE CASCADE,
                title       TEXT NOT NULL,
                body        TEXT NOT NULL,
                read        INTEGER NOT NULL DEFAULT 0,
                created_at  TEXT NOT NULL
            );

            CREATE INDEX idx_notifications_user ON notifications(user_id, created_at);

            INSERT INTO schema_version (version) VALUES (2);
            ",
        )?;
        tx.commit()?;
    }

    info!("Database migrations complete");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn version(conn: &Connection) -> i64 {
        conn.query_row("SELECT COALESCE(MAX(version), 0) FROM schema_version", [], |r| r.get(0))
            .unwrap()
    }

    #[test]
    fn rerunning_is_a_no_op() {
        let conn = Connection::open_in_memory().unwrap();
        run(&conn).unwrap();
        run(&conn).unwrap();
        assert_eq!(version(&conn), 2);
    }

    #[test]
    fn failed_migration_leaves_no_partial_schema() {
        let conn = Connection::open_in_memory().unwrap();
        run(&conn).unwrap();
        conn.execute_batch(
            "DROP TABLE notifications; DROP TABLE stock_movements; DROP TABLE protocols;
             DROP TABLE transfers; DROP TABLE stops; DROP TABLE routes; DROP TABLE stores;
             DELETE FROM schema_version WHERE version = 2;
             CREATE TABLE idx_notifications_user (x INTEGER);",
        )
        .unwrap();

        // The last index of v2 now collides with a table of the same name
        assert!(run(&conn).is_err());
        assert_eq!(version(&conn), 1);
        let stores: i64 = conn
            .query_row(
                "SELECT COUNT(*) FROM sqlite_master WHERE type = 'table' AND name = 'stores'",
                [],
                |r| r.get(0),
            )
            .unwrap();
        assert_eq!(stores, 0);
    }
}
