use anyhow::Result;

use super::OptionalExt;
use crate::models::FileRow;
use crate::Database;

impl Database {
    pub fn insert_file(&self, file: &FileRow) -> Result<()> {
        self.with_conn_mut(|conn| {
            conn.execute(
                "INSERT INTO files (id, uploader_id, filename, content_type, size, sha256, created_at)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)",
                rusqlite::params![
                    file.id,
                    file.uploader_id,
                    file.filename,
                    file.content_type,
                    file.size,
                    file.sha256,
                    file.created_at,
                ],
            )?;
            Ok(())
        })
    }

    pub fn get_file(&self, id: &str) -> Result<Option<FileRow>> {
        self.with_conn(|conn| {
            conn.query_row(
                "SELECT id, uploader_id, filename, content_type, size, sha256, created_at
                 FROM files WHERE id = ?1",
                [id],
                |row| {
                    Ok(FileRow {
                        id: row.get(0)?,
                        uploader_id: row.get(1)?,
                        filename: row.get(2)?,
                        content_type: row.get(3)?,
                        size: row.get(4)?,
                        sha256: row.get(5)?,
                        created_at: row.get(6)?,
                    })
                },
            )
            .optional()
        })
    }
}
