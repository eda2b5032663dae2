//! Snapshot storage on the local filesystem.
//!
//! ## Storage Layout
//!
//! ```text
//! {root}/
//! ├── config.toml                 # Crawler Configuration
//! ├── manifest.toml               # Collection Manifest
//! ├── *.jsonl.zst                 # Snapshots (primary and backup)
//! ├── *_collection.csv            # Account Seed Lists
//! └── mp4s/                       # Downloaded Payloads
//! ```
//!
//! All writes go to `<file>.tmp` first and are renamed into place.

use std::ffi::OsString;
use std::path::{Path, PathBuf};

use async_trait::async_trait;
use tokio::io::AsyncWriteExt;

use crate::error::{AppError, Result};
use crate::storage::SnapshotStorage;

/// Local filesystem storage backend.
#[derive(Debug, Clone)]
pub struct LocalStorage {
    root_dir: PathBuf,
}

impl LocalStorage {
    /// Storage rooted at the crawl's storage directory.
    pub fn new(root_dir: impl Into<PathBuf>) -> Self {
        Self {
            root_dir: root_dir.into(),
        }
    }

    pub fn root(&self) -> &Path {
        &self.root_dir
    }

    /// Filesystem path of a snapshot key.
    pub fn path(&self, key: &str) -> PathBuf {
        self.root_dir.join(key)
    }

    /// Ensure parent directory exists.
    async fn ensure_dir(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            tokio::fs::create_dir_all(parent).await?;
        }
        Ok(())
    }

    fn temp_path(path: &Path) -> PathBuf {
        let mut tmp: OsString = path.as_os_str().to_owned();
        tmp.push(".tmp");
        PathBuf::from(tmp)
    }
}

#[async_trait]
impl SnapshotStorage for LocalStorage {
    async fn read_bytes(&self, key: &str) -> Result<Option<Vec<u8>>> {
        let path = self.path(key);
        match tokio::fs::read(&path).await {
            Ok(bytes) => Ok(Some(bytes)),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(None),
            Err(e) => Err(AppError::Io(e)),
        }
    }

    /// Write bytes atomically (write to temp, then rename).
    async fn write_bytes(&self, key: &str, bytes: &[u8]) -> Result<()> {
        let path = self.path(key);
        self.ensure_dir(&path).await?;

        let tmp = Self::temp_path(&path);
        let mut file = tokio::fs::File::create(&tmp).await?;
        file.write_all(bytes).await?;
        file.flush().await?;
        file.sync_all().await?;
        drop(file);

        tokio::fs::rename(&tmp, &path).await?;
        Ok(())
    }

    async fn list(&self, dir: &str) -> Result<Vec<String>> {
        let path = self.path(dir);
        let mut entries = match tokio::fs::read_dir(&path).await {
            Ok(entries) => entries,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(Vec::new()),
            Err(e) => return Err(AppError::Io(e)),
        };

        let mut names = Vec::new();
        while let Some(entry) = entries.next_entry().await? {
            if entry.file_type().await?.is_file() {
                if let Some(name) = entry.file_name().to_str() {
                    names.push(name.to_string());
                }
            }
        }
        names.sort();
        Ok(names)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::Record;
    use crate::table::Table;
    use serde_json::json;
    use tempfile::TempDir;

    fn sample(ids: &[&str]) -> Table {
        ids.iter()
            .map(|id| Record::from_value(json!({"id": id, "desc": "carney"})).unwrap())
            .collect()
    }

    #[tokio::test]
    async fn test_write_and_read() {
        let tmp = TempDir::new().unwrap();
        let storage = LocalStorage::new(tmp.path());

        storage.write_bytes("nested/test.txt", b"hello").await.unwrap();
        let data = storage.read_bytes("nested/test.txt").await.unwrap();
        assert_eq!(data, Some(b"hello".to_vec()));
        assert!(!storage.path("nested/test.txt.tmp").exists());
    }

    #[tokio::test]
    async fn test_read_nonexistent() {
        let tmp = TempDir::new().unwrap();
        let storage = LocalStorage::new(tmp.path());

        assert!(storage.read_bytes("nope.txt").await.unwrap().is_none());
        assert!(storage.read_table("nope.jsonl.zst").await.unwrap().is_none());
        assert!(storage.list("missing_dir").await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_table_overwrite() {
        let tmp = TempDir::new().unwrap();
        let storage = LocalStorage::new(tmp.path());

        storage.write_table("v.jsonl.zst", &sample(&["1", "2"])).await.unwrap();
        storage.write_table("v.jsonl.zst", &sample(&["3"])).await.unwrap();

        let loaded = storage.read_table("v.jsonl.zst").await.unwrap().unwrap();
        assert_eq!(loaded.len(), 1);
        assert_eq!(loaded.rows()[0].id().as_deref(), Some("3"));
    }

    #[tokio::test]
    async fn test_load_merges_existing_files() {
        let tmp = TempDir::new().unwrap();
        let storage = LocalStorage::new(tmp.path());

        storage.write_table("a.jsonl.zst", &sample(&["1"])).await.unwrap();
        storage.write_table("b.jsonl.zst", &sample(&["2", "3"])).await.unwrap();

        let keys = vec![
            "a.jsonl.zst".to_string(),
            "missing.jsonl.zst".to_string(),
            "b.jsonl.zst".to_string(),
        ];
        let merged = storage.load(&keys).await.unwrap();
        assert_eq!(merged.len(), 3);
    }

    #[tokio::test]
    async fn test_backup_fallback_on_damaged_primary() {
        let tmp = TempDir::new().unwrap();
        let storage = LocalStorage::new(tmp.path());

        storage.write_bytes("p.jsonl.zst", b"garbage").await.unwrap();
        storage.write_table("bk.jsonl.zst", &sample(&["1", "2"])).await.unwrap();

        let table = storage
            .load_with_backup("p.jsonl.zst", Some("bk.jsonl.zst"))
            .await
            .unwrap();
        assert_eq!(table.len(), 2);
    }

    #[tokio::test]
    async fn test_damaged_primary_without_backup_is_error() {
        let tmp = TempDir::new().unwrap();
        let storage = LocalStorage::new(tmp.path());

        storage.write_bytes("p.jsonl.zst", b"garbage").await.unwrap();
        let result = storage.load_with_backup("p.jsonl.zst", Some("bk.jsonl.zst")).await;
        assert!(matches!(result, Err(AppError::Snapshot { .. })));
    }

    #[tokio::test]
    async fn test_missing_primary_is_empty() {
        let tmp = TempDir::new().unwrap();
        let storage = LocalStorage::new(tmp.path());

        let table = storage.load_with_backup("p.jsonl.zst", None).await.unwrap();
        assert!(table.is_empty());
    }

    #[tokio::test]
    async fn test_list_files() {
        let tmp = TempDir::new().unwrap();
        let storage = LocalStorage::new(tmp.path());

        storage.write_bytes("mp4s/2.mp4", b"b").await.unwrap();
        storage.write_bytes("mp4s/1.mp4", b"a").await.unwrap();

        let names = storage.list("mp4s").await.unwrap();
        assert_eq!(names, vec!["1.mp4".to_string(), "2.mp4".to_string()]);
    }
}
