// src/pipeline/download.rs

//! Video payload download.

use std::collections::HashSet;
use std::time::Duration;

use crate::error::{AppError, Result};
use crate::models::{Collection, Config, Manifest, Record};
use crate::pipeline::collect::load_collection;
use crate::services::ScrapeClient;
use crate::storage::SnapshotStorage;
use crate::table::Table;
use crate::utils::log as console;

const PAYLOAD_SUFFIX: &str = ".mp4";

/// Totals of a download run.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DownloadSummary {
    pub pending: usize,
    pub downloaded: usize,
    pub failed: usize,
}

/// Ids that already have a payload among `file_names`. Leftover temp files
/// do not count.
pub fn saved_ids(file_names: &[String]) -> HashSet<String> {
    file_names
        .iter()
        .filter_map(|name| name.strip_suffix(PAYLOAD_SUFFIX))
        .filter(|stem| !stem.is_empty())
        .map(str::to_string)
        .collect()
}

/// Videos that still need a payload: not saved yet and with a positive
/// duration.
pub fn pending_videos(videos: Table, saved: &HashSet<String>) -> Vec<Record> {
    videos
        .into_iter()
        .filter(|v| v.id().is_some_and(|id| !saved.contains(&id)))
        .filter(|v| v.video_duration().is_some_and(|d| d > 0.0))
        .collect()
}

pub fn payload_key(output_dir: &str, video_id: &str) -> String {
    format!("{output_dir}/{video_id}{PAYLOAD_SUFFIX}")
}

/// Sequentially download payloads, sleeping `delay` after each success.
pub async fn download_payloads(
    client: &dyn ScrapeClient,
    storage: &dyn SnapshotStorage,
    videos: &[Record],
    output_dir: &str,
    batch_size: usize,
    delay: Duration,
) -> DownloadSummary {
    let mut summary = DownloadSummary {
        pending: videos.len(),
        ..DownloadSummary::default()
    };

    for (batch_no, batch) in videos.chunks(batch_size.max(1)).enumerate() {
        for video in batch {
            let Some(id) = video.id() else {
                continue;
            };
            let saved = match client.video_bytes(video).await {
                Ok(bytes) => storage.write_bytes(&payload_key(output_dir, &id), &bytes).await,
                Err(e) => Err(e),
            };
            match saved {
                Ok(()) => {
                    summary.downloaded += 1;
                    if !delay.is_zero() {
                        tokio::time::sleep(delay).await;
                    }
                }
                Err(e) => {
                    summary.failed += 1;
                    log::error!("Download of {} failed: {}", id, e);
                }
            }
        }
        console::info(&format!(
            "Batch {}: {}/{} downloaded, {} failed",
            batch_no + 1,
            summary.downloaded,
            summary.pending,
            summary.failed
        ));
    }
    summary
}

/// Download payloads for one collection.
///
/// Uses `name`, else `download.collection` from the config.
pub async fn run_download(
    config: &Config,
    manifest: &Manifest,
    storage: &dyn SnapshotStorage,
    client: &dyn ScrapeClient,
    name: Option<&str>,
) -> Result<DownloadSummary> {
    let name = name
        .or(config.download.collection.as_deref())
        .ok_or_else(|| AppError::config("no collection to download; set download.collection"))?;
    let collection: &Collection = manifest
        .find(name)
        .ok_or_else(|| AppError::config(format!("collection '{name}' is not in the manifest")))?;
    console::header(&format!("Downloading payloads for {}", collection.name));

    let output_dir = config.download.output_dir.as_str();
    let saved = saved_ids(&storage.list(output_dir).await?);
    let videos = load_collection(storage, collection).await?.dedupe_by_id();
    let total = videos.len();
    let pending = pending_videos(videos, &saved);
    console::info(&format!(
        "{} videos, {} already saved, {} to download",
        total,
        saved.len(),
        pending.len()
    ));

    let summary = download_payloads(
        client,
        storage,
        &pending,
        output_dir,
        config.download.batch_size,
        Duration::from_millis(config.download.batch_delay_ms),
    )
    .await;

    console::summary(
        "Download complete",
        &[
            ("Downloaded", summary.downloaded.to_string()),
            ("Failed", summary.failed.to_string()),
        ],
    );
    Ok(summary)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_saved_ids() {
        let names = vec![
            "7301.mp4".to_string(),
            "7302.mp4.tmp".to_string(),
            ".mp4".to_string(),
        ];
        let ids = saved_ids(&names);
        assert!(ids.contains("7301"));
        assert_eq!(ids.len(), 1);
    }

    #[test]
    fn test_pending_videos_filters_saved_and_zero_duration() {
        let videos = Table::from_rows(
            [
                json!({"id": "1", "video": {"duration": 12}}),
                json!({"id": "2", "video": {"duration": 0}}),
                json!({"id": "3", "video": {"duration": 8}}),
                json!({"id": "4"}),
            ]
            .into_iter()
            .filter_map(Record::from_value)
            .collect(),
        );
        let saved = HashSet::from(["3".to_string()]);
        let pending = pending_videos(videos, &saved);
        let ids: Vec<_> = pending.iter().filter_map(Record::id).collect();
        assert_eq!(ids, vec!["1"]);
    }

    #[test]
    fn test_payload_key() {
        assert_eq!(payload_key("mp4s", "7301"), "mp4s/7301.mp4");
    }
}
