// src/pipeline/validate.rs

//! Configuration validation and storage status.

use std::path::Path;

use crate::config::load_all;
use crate::error::Result;
use crate::models::{Config, Manifest};
use crate::storage::SnapshotStorage;
use crate::utils::log;

/// Validate configuration and manifest using load_all.
pub fn run_validate(storage_dir: &Path) -> Result<()> {
    log::header("Validating configuration");

    match load_all(storage_dir) {
        Ok((config, manifest)) => {
            log::success("Config OK");
            log::sub_item(&format!("User agent: {}", config.crawler.user_agent));
            log::sub_item(&format!("Timeout: {}s", config.crawler.timeout_secs));
            log::sub_item(&format!(
                "Keywords: {}",
                config.topic.normalized_keywords().len()
            ));
            log::sub_item(&format!(
                "Checkpoint every {} / backup every {}",
                config.checkpoint.save_threshold, config.checkpoint.backup_threshold
            ));

            log::success("Manifest OK");
            log::sub_item(&format!("Collections: {}", manifest.collections.len()));
            Ok(())
        }
        Err(e) => {
            log::error(&format!("Validation failed: {e}"));
            Err(e)
        }
    }
}

/// Row count of one snapshot, for display.
async fn describe(storage: &dyn SnapshotStorage, key: &str) -> String {
    match storage.read_table(key).await {
        Ok(Some(table)) => format!("{} rows", table.len()),
        Ok(None) => "not found".to_string(),
        Err(e) => format!("unreadable ({e})"),
    }
}

/// Show every snapshot the crawler knows about.
pub async fn run_info(config: &Config, manifest: &Manifest, storage: &dyn SnapshotStorage) -> Result<()> {
    log::header("Storage status");

    for collection in &manifest.collections {
        log::info(&format!(
            "{} ({:?}): {}",
            collection.name,
            collection.kind,
            describe(storage, &collection.path).await
        ));
        if let Some(backup) = &collection.backup {
            log::sub_item(&format!("backup: {}", describe(storage, backup).await));
        }
    }

    let related = &config.related;
    for (label, key) in [
        ("fetched", &related.fetched),
        ("related", &related.related),
        ("backup fetched", &related.backup_fetched),
        ("backup related", &related.backup_related),
    ] {
        log::info(&format!("{label}: {}", describe(storage, key).await));
    }

    let payloads = storage.list(&config.download.output_dir).await?;
    log::info(&format!(
        "{}: {} files",
        config.download.output_dir,
        payloads.len()
    ));
    Ok(())
}
