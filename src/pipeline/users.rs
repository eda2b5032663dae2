// src/pipeline/users.rs

//! Account collection.
//!
//! For every handle in the seed lists of `accounts` collections, pages the
//! account's videos newest first and stops once it reaches videos older than
//! the newest one already stored for that account.

use std::collections::{HashMap, HashSet};

use chrono::{NaiveDate, NaiveTime, Utc};
use futures::StreamExt;

use crate::error::{AppError, Result};
use crate::models::{Collection, CollectionKind, Config, Manifest, Record, UsersConfig};
use crate::pipeline::checkpoint::{Checkpoint, FlushPlan};
use crate::pipeline::collect::load_collection;
use crate::services::{ScrapeClient, user_videos};
use crate::storage::SnapshotStorage;
use crate::table::{self, Table};
use crate::utils::log as console;
use crate::utils::normalize_handle;

/// An account to collect, with the collection it belongs to.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SeedAccount {
    pub handle: String,
    pub collection: String,
}

/// Totals of a user collection run.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct UsersSummary {
    pub accounts: usize,
    pub skipped: usize,
    pub below_min_followers: usize,
    pub videos: usize,
}

/// Read handles from a CSV seed list with a header row.
pub fn parse_seed_list(bytes: &[u8], handle_column: &str) -> Result<Vec<String>> {
    let mut reader = csv::ReaderBuilder::new()
        .has_headers(true)
        .flexible(true)
        .from_reader(bytes);

    let column = reader
        .headers()?
        .iter()
        .position(|h| h.trim() == handle_column)
        .ok_or_else(|| AppError::validation(format!("seed list has no '{handle_column}' column")))?;

    let mut handles = Vec::new();
    for row in reader.records() {
        let row = row?;
        if let Some(handle) = row.get(column).and_then(normalize_handle) {
            handles.push(handle);
        }
    }
    Ok(handles)
}

/// Newest creation time among the stored non-pinned videos of `handle`.
pub fn high_water_mark(videos: &Table, handle: &str) -> Option<i64> {
    videos
        .iter()
        .filter(|v| !v.is_pinned())
        .filter(|v| v.author_id().as_deref() == Some(handle))
        .filter_map(Record::create_time)
        .max()
}

fn epoch_seconds(date: NaiveDate) -> i64 {
    date.and_time(NaiveTime::MIN).and_utc().timestamp()
}

/// Page an account's videos until one older than `since` turns up.
///
/// Pinned videos are kept whatever their age. A page error ends paging and
/// keeps what was collected so far.
pub async fn collect_account_videos(
    client: &dyn ScrapeClient,
    handle: &str,
    since: i64,
    max_videos: usize,
) -> Vec<Record> {
    let mut videos = Vec::new();
    let mut stream = std::pin::pin!(user_videos(client, handle));

    while videos.len() < max_videos {
        let Some(item) = stream.next().await else {
            break;
        };
        let video = match item {
            Ok(video) => video,
            Err(e) => {
                log::warn!("Stopped paging @{} after {} videos: {}", handle, videos.len(), e);
                break;
            }
        };
        if !video.is_pinned() && video.create_time().is_some_and(|t| t < since) {
            break;
        }
        videos.push(video);
    }
    videos
}

struct CollectionState {
    collection: Collection,
    videos: Table,
    checkpoint: Checkpoint,
}

/// Collects new videos for every seeded account.
pub struct UserCollector<'a> {
    client: &'a dyn ScrapeClient,
    storage: &'a dyn SnapshotStorage,
    settings: UsersConfig,
    backup_threshold: usize,
    collections: HashMap<String, CollectionState>,
    summary: UsersSummary,
}

impl<'a> UserCollector<'a> {
    pub fn new(
        client: &'a dyn ScrapeClient,
        storage: &'a dyn SnapshotStorage,
        settings: UsersConfig,
        backup_threshold: usize,
    ) -> Self {
        Self {
            client,
            storage,
            settings,
            backup_threshold,
            collections: HashMap::new(),
            summary: UsersSummary::default(),
        }
    }

    /// Load an accounts collection and return its seeded handles.
    pub async fn open(&mut self, collection: &Collection) -> Result<Vec<SeedAccount>> {
        let seed_list = collection.seed_list.as_deref().ok_or_else(|| {
            AppError::validation(format!("collection '{}' has no seed_list", collection.name))
        })?;
        let bytes = self.storage.read_bytes(seed_list).await?.ok_or_else(|| {
            AppError::validation(format!("seed list {seed_list} not found"))
        })?;
        let handles = parse_seed_list(&bytes, &self.settings.handle_column)?;

        let videos = load_collection(self.storage, collection).await?.dedupe_by_id();
        self.collections.insert(
            collection.name.clone(),
            CollectionState {
                collection: collection.clone(),
                videos,
                // Every account with new videos is written straight away.
                checkpoint: Checkpoint::new(1, self.backup_threshold),
            },
        );

        Ok(handles
            .into_iter()
            .map(|handle| SeedAccount {
                handle,
                collection: collection.name.clone(),
            })
            .collect())
    }

    pub fn videos(&self, collection: &str) -> Option<&Table> {
        self.collections.get(collection).map(|state| &state.videos)
    }

    pub fn summary(&self) -> &UsersSummary {
        &self.summary
    }

    /// Collect one account. Returns the number of videos merged.
    pub async fn collect(&mut self, account: &SeedAccount) -> Result<usize> {
        self.summary.accounts += 1;
        let handle = account.handle.as_str();

        let user = match self.client.user_detail(handle).await {
            Ok(user) => user,
            Err(e) => {
                log::warn!("Skipping account @{}: {}", handle, e);
                self.summary.skipped += 1;
                return Ok(0);
            }
        };
        if let Some(min) = self.settings.min_followers {
            let followers = user.follower_count().unwrap_or(0);
            if followers < min {
                log::info!("Skipping @{}: {} followers is below {}", handle, followers, min);
                self.summary.below_min_followers += 1;
                return Ok(0);
            }
        }

        let state = self.collections.get(&account.collection).ok_or_else(|| {
            AppError::validation(format!("collection '{}' is not open", account.collection))
        })?;
        let since = high_water_mark(&state.videos, handle)
            .unwrap_or_else(|| epoch_seconds(self.settings.default_since));

        let mut videos =
            collect_account_videos(self.client, handle, since, self.settings.max_videos).await;
        if videos.is_empty() {
            log::debug!("No new videos for @{}", handle);
            return Ok(0);
        }

        let now = Utc::now();
        for video in &mut videos {
            video.tag_scraped(now);
        }
        let count = videos.len();
        self.summary.videos += count;
        log::info!("Collected {} videos from @{}", count, handle);

        let storage = self.storage;
        let state = self.collections.get_mut(&account.collection).ok_or_else(|| {
            AppError::validation(format!("collection '{}' is not open", account.collection))
        })?;
        let existing = std::mem::take(&mut state.videos);
        state.videos = table::merge(existing, Table::from_rows(videos)).dedupe_by_id();

        let plan = state.checkpoint.record(count);
        let mut written = FlushPlan::default();
        if plan.primary {
            storage
                .write_table(&state.collection.path, &state.videos)
                .await?;
            written.primary = true;
        }
        if plan.backup {
            storage
                .write_table(&state.collection.backup_key(), &state.videos)
                .await?;
            written.backup = true;
        }
        state.checkpoint.flushed(written);
        Ok(count)
    }
}

/// Run account collection over every `accounts` collection in the manifest.
pub async fn run_users(
    config: &Config,
    manifest: &Manifest,
    storage: &dyn SnapshotStorage,
    client: &dyn ScrapeClient,
) -> Result<UsersSummary> {
    console::header("Account collection");

    let mut collector = UserCollector::new(
        client,
        storage,
        config.users.clone(),
        config.checkpoint.backup_threshold,
    );

    let mut accounts = Vec::new();
    let mut seen = HashSet::new();
    for collection in manifest.of_kind(CollectionKind::Accounts) {
        let seeded = collector.open(collection).await?;
        console::info(&format!(
            "{}: {} seeded accounts",
            collection.name,
            seeded.len()
        ));
        accounts.extend(seeded.into_iter().filter(|a| seen.insert(a.handle.clone())));
    }

    let delay = config.crawl_settings().batch_delay;
    for account in &accounts {
        collector.collect(account).await?;
        if !delay.is_zero() {
            tokio::time::sleep(delay).await;
        }
    }

    let summary = collector.summary().clone();
    console::summary(
        "Account collection complete",
        &[
            ("Accounts", summary.accounts.to_string()),
            ("Skipped", summary.skipped.to_string()),
            ("Below follower minimum", summary.below_min_followers.to_string()),
            ("New videos", summary.videos.to_string()),
        ],
    );
    Ok(summary)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn video(id: &str, author: &str, create_time: i64, pinned: bool) -> Record {
        Record::from_value(json!({
            "id": id,
            "author": { "uniqueId": author },
            "createTime": create_time,
            "isPinnedItem": pinned,
        }))
        .unwrap()
    }

    #[test]
    fn test_parse_seed_list() {
        let csv = "Name,Tiktok\nCBC,@cbcnews\nGlobal, globalnews \nNone,\n";
        let handles = parse_seed_list(csv.as_bytes(), "Tiktok").unwrap();
        assert_eq!(handles, vec!["cbcnews", "globalnews"]);
    }

    #[test]
    fn test_parse_seed_list_missing_column() {
        assert!(parse_seed_list(b"Name\nCBC\n", "Tiktok").is_err());
    }

    #[test]
    fn test_high_water_mark_ignores_pinned_and_other_authors() {
        let videos = Table::from_rows(vec![
            video("1", "cbcnews", 100, false),
            video("2", "cbcnews", 500, true),
            video("3", "cbcnews", 300, false),
            video("4", "globalnews", 900, false),
        ]);
        assert_eq!(high_water_mark(&videos, "cbcnews"), Some(300));
        assert_eq!(high_water_mark(&videos, "ctvnews"), None);
    }

    #[test]
    fn test_default_since_is_midnight_utc() {
        let date = NaiveDate::from_ymd_opt(2022, 1, 1).unwrap();
        assert_eq!(epoch_seconds(date), 1_640_995_200);
    }
}
