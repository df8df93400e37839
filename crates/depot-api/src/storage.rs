use std::path::PathBuf;

use anyhow::Result;
use sha2::{Digest, Sha256};
use tokio::fs;
use tokio::io::AsyncWriteExt;
use tracing::info;

/// On-disk attachment storage. Each file is kept flat at `{dir}/{file_id}`.
pub struct Storage {
    dir: PathBuf,
}

impl Storage {
    pub async fn new(dir: PathBuf) -> Result<Self> {
        fs::create_dir_all(&dir).await?;
        info!("Upload directory: {}", dir.display());
        Ok(Self { dir })
    }

    /// Path to the file for a given id. Ids are UUIDs, never user input.
    pub fn file_path(&self, file_id: &str) -> PathBuf {
        self.dir.join(file_id)
    }

    /// Write the whole file and return its SHA-256 as lowercase hex.
    pub async fn write(&self, file_id: &str, data: &[u8]) -> Result<String> {
        let digest = hex::encode(Sha256::digest(data));

        let path = self.file_path(file_id);
        let mut file = fs::File::create(&path).await?;
        file.write_all(data).await?;
        file.flush().await?;

        Ok(digest)
    }

    pub async fn read(&self, file_id: &str) -> Result<Vec<u8>> {
        Ok(fs::read(self.file_path(file_id)).await?)
    }

    pub async fn remove(&self, file_id: &str) -> Result<()> {
        fs::remove_file(self.file_path(file_id)).await?;
        Ok(())
    }
}
