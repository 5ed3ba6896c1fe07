use std::{
    io::ErrorKind,
    path::{Path, PathBuf},
};

use chrono::NaiveDate;
use fs4::tokio::AsyncFileExt;
use serde::{Deserialize, Serialize};
use tokio::{
    fs::File,
    io::{AsyncReadExt, AsyncWriteExt},
};
use tracing::{debug, info, warn};

use crate::error::CursorError;

/// On-disk layout of the cursor file.
#[derive(Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct CursorEntity {
    /// Last local calendar day whose rows have all been appended.
    pub last_synced_date: NaiveDate,
}

/// Keeps the sync watermark in a small json file.
pub struct CursorStore {
    path: PathBuf,
}

impl CursorStore {
    pub fn new(path: PathBuf) -> Self {
        Self { path }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Returns the stored watermark. A missing, unreadable or corrupted file means there is no
    /// watermark, so the next run starts from the full history.
    pub async fn read(&self) -> Option<NaiveDate> {
        match self.read_inner().await {
            Ok(v) => v.map(|v| v.last_synced_date),
            Err(e) => {
                warn!("Ignoring unusable cursor {:?}: {e}", self.path);
                None
            }
        }
    }

    async fn read_inner(&self) -> Result<Option<CursorEntity>, CursorError> {
        let mut file = match File::open(&self.path).await {
            Ok(v) => v,
            Err(e) if e.kind() == ErrorKind::NotFound => {
                debug!("No cursor at {:?}", self.path);
                return Ok(None);
            }
            Err(e) => Err(e)?,
        };

        file.lock_shared()?;
        let mut contents = String::new();
        let read = file.read_to_string(&mut contents).await;
        file.unlock_async().await?;
        read?;

        Ok(Some(serde_json::from_str(&contents)?))
    }

    /// Replaces the stored watermark with `date`.
    pub async fn write(&self, date: NaiveDate) -> Result<(), CursorError> {
        if let Some(parent) = self.path.parent().filter(|v| !v.as_os_str().is_empty()) {
            tokio::fs::create_dir_all(parent).await?;
        }

        let mut buffer = serde_json::to_vec_pretty(&CursorEntity {
            last_synced_date: date,
        })?;
        buffer.push(b'\n');

        let mut file = File::options()
            .write(true)
            .create(true)
            .truncate(false)
            .open(&self.path)
            .await?;

        // Truncate only once the lock is held so a concurrent reader never sees an empty file.
        file.lock_exclusive()?;
        let result = Self::write_with_file(&mut file, &buffer).await;
        file.unlock_async().await?;
        result?;

        info!("Cursor advanced to {date}");
        Ok(())
    }

    async fn write_with_file(file: &mut File, buffer: &[u8]) -> Result<(), CursorError> {
        file.set_len(0).await?;
        file.write_all(buffer).await?;
        file.flush().await?;
        file.sync_all().await?;
        Ok(())
    }
}
