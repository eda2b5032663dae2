// src/config.rs

//! Configuration loading utilities.
//!
//! Both files live in the storage directory: `config.toml` for crawler
//! settings and `manifest.toml` for the collection list.

use std::path::Path;

use crate::error::{AppError, Result};
use crate::models::{Config, Manifest};

pub const CONFIG_FILE: &str = "config.toml";
pub const MANIFEST_FILE: &str = "manifest.toml";

/// Load configuration, falling back to defaults when the file is missing
/// or unreadable.
pub fn load_config(storage_dir: &Path) -> Config {
    Config::load_or_default(storage_dir.join(CONFIG_FILE))
}

/// Load the manifest, falling back to an empty one.
pub fn load_manifest(storage_dir: &Path) -> Manifest {
    Manifest::load_or_default(storage_dir.join(MANIFEST_FILE))
}

/// Load and validate both config and manifest.
pub fn load_all(storage_dir: &Path) -> Result<(Config, Manifest)> {
    let config = load_config(storage_dir);
    config
        .validate()
        .map_err(|e| AppError::config(format!("Invalid config: {e}")))?;

    let manifest = load_manifest(storage_dir);
    manifest
        .validate()
        .map_err(|e| AppError::config(format!("Invalid manifest: {e}")))?;

    Ok((config, manifest))
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_load_all_defaults_when_missing() {
        let dir = TempDir::new().unwrap();
        let (config, manifest) = load_all(dir.path()).unwrap();
        assert_eq!(config.checkpoint.save_threshold, 10);
        assert!(manifest.collections.is_empty());
    }

    #[test]
    fn test_load_all_rejects_invalid_manifest() {
        let dir = TempDir::new().unwrap();
        std::fs::write(
            dir.path().join(MANIFEST_FILE),
            r#"
            [[collections]]
            name = "romania"
            kind = "accounts"
            path = "romania_videos.jsonl.zst"
            "#,
        )
        .unwrap();
        assert!(load_all(dir.path()).is_err());
    }
}
