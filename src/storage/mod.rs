//! Storage abstractions for snapshot persistence.
//!
//! Every collection lives in one snapshot file that is rewritten wholesale
//! on each flush. Collections that are checkpointed also keep a backup
//! snapshot, written less often, which is read when the primary is damaged.
//!
//! ## Directory Structure
//!
//! ```text
//! storage/
//! ├── config.toml
//! ├── manifest.toml
//! ├── hashtag_canadapoli.jsonl.zst
//! ├── fetched_election_videos.jsonl.zst
//! ├── backup_fetched_election_videos.jsonl.zst
//! ├── romania_collection.csv
//! └── mp4s/
//!     └── 7482681319927893281.mp4
//! ```

pub mod codec;
pub mod local;

use async_trait::async_trait;

use crate::error::{AppError, Result};
use crate::table::{self, Table};

// Re-export for convenience
pub use local::LocalStorage;

/// Trait for snapshot storage backends.
///
/// Keys are paths relative to the backend's root.
#[async_trait]
pub trait SnapshotStorage: Send + Sync {
    /// Read raw bytes, `None` if the key does not exist.
    async fn read_bytes(&self, key: &str) -> Result<Option<Vec<u8>>>;

    /// Replace the bytes at `key`. Readers never observe a partial write.
    async fn write_bytes(&self, key: &str, bytes: &[u8]) -> Result<()>;

    /// File names directly inside `dir`; empty if it does not exist.
    async fn list(&self, dir: &str) -> Result<Vec<String>>;

    /// Read one snapshot, `None` if the key does not exist.
    async fn read_table(&self, key: &str) -> Result<Option<Table>> {
        match self.read_bytes(key).await? {
            Some(bytes) => Ok(Some(codec::decode(&bytes, key)?)),
            None => Ok(None),
        }
    }

    /// Encode and replace a snapshot.
    async fn write_table(&self, key: &str, table: &Table) -> Result<()> {
        let bytes = codec::encode(table, key)?;
        self.write_bytes(key, &bytes).await
    }

    /// Read and merge any number of snapshots. Missing keys are skipped.
    async fn load(&self, keys: &[String]) -> Result<Table> {
        let mut merged = Table::new();
        for key in keys {
            match self.read_table(key).await? {
                Some(table) => merged = table::merge(merged, table),
                None => log::debug!("Snapshot {} not found, skipping", key),
            }
        }
        Ok(merged)
    }

    /// Read a primary snapshot, falling back to its backup.
    ///
    /// A missing primary without a backup is an empty table. A damaged
    /// primary with no readable backup is an error, so a later flush cannot
    /// overwrite the damaged file with less data.
    async fn load_with_backup(&self, primary: &str, backup: Option<&str>) -> Result<Table> {
        let damaged = match self.read_table(primary).await {
            Ok(Some(table)) => return Ok(table),
            Ok(None) => None,
            Err(e) => {
                log::warn!("Snapshot {} unreadable: {}", primary, e);
                Some(e)
            }
        };

        if let Some(backup) = backup {
            match self.read_table(backup).await {
                Ok(Some(table)) => {
                    log::warn!(
                        "Restored {} rows for {} from backup {}",
                        table.len(),
                        primary,
                        backup
                    );
                    return Ok(table);
                }
                Ok(None) => {}
                Err(e) => log::warn!("Backup snapshot {} unreadable: {}", backup, e),
            }
        }

        match damaged {
            Some(e) => Err(AppError::snapshot(
                primary,
                format!("no usable backup after: {e}"),
            )),
            None => Ok(Table::new()),
        }
    }
}
