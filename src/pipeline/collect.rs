// src/pipeline/collect.rs

//! Hashtag and search collectors, plus collection loading shared by the
//! other pipelines.

use std::collections::HashSet;

use chrono::Utc;

use crate::error::{AppError, Result};
use crate::models::{Collection, CollectionKind, Manifest, Record};
use crate::services::ScrapeClient;
use crate::storage::SnapshotStorage;
use crate::table::{self, Table};
use crate::utils::log as console;

/// Default number of videos requested per collector run.
pub const DEFAULT_COUNT: usize = 1000;

/// Counts of one collector run.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CollectSummary {
    pub fetched: usize,
    pub added: usize,
    pub total: usize,
}

/// Load a collection, falling back to its backup snapshot.
pub async fn load_collection(storage: &dyn SnapshotStorage, collection: &Collection) -> Result<Table> {
    storage
        .load_with_backup(&collection.path, collection.backup.as_deref())
        .await
}

/// Load and merge several collections. Unreadable ones are logged and
/// skipped.
pub async fn load_collections<'c>(
    storage: &dyn SnapshotStorage,
    collections: impl IntoIterator<Item = &'c Collection>,
) -> Table {
    let mut merged = Table::new();
    for collection in collections {
        match load_collection(storage, collection).await {
            Ok(rows) => merged = table::merge(merged, rows),
            Err(e) => log::warn!("Skipping collection {}: {}", collection.name, e),
        }
    }
    merged
}

/// Stamp `incoming`, merge it into the collection's snapshot, dedupe by id
/// and write the result back.
pub async fn merge_into_collection(
    storage: &dyn SnapshotStorage,
    collection: &Collection,
    incoming: Vec<Record>,
) -> Result<CollectSummary> {
    let fetched = incoming.len();
    let now = Utc::now();
    let incoming: Table = incoming
        .into_iter()
        .map(|mut record| {
            record.tag_scraped(now);
            record
        })
        .collect();

    let existing = load_collection(storage, collection).await?;
    let known: HashSet<String> = existing.ids();
    let merged = table::merge(existing, incoming).dedupe_by_id();
    let added = merged
        .iter()
        .filter_map(Record::id)
        .filter(|id| !known.contains(id))
        .count();

    storage.write_table(&collection.path, &merged).await?;
    Ok(CollectSummary {
        fetched,
        added,
        total: merged.len(),
    })
}

/// Fetch up to `count` videos listed under a hashtag into its collection.
pub async fn run_hashtag(
    manifest: &Manifest,
    storage: &dyn SnapshotStorage,
    client: &dyn ScrapeClient,
    name: &str,
    count: usize,
) -> Result<CollectSummary> {
    let name = name.trim().trim_start_matches('#');
    if name.is_empty() {
        return Err(AppError::validation("hashtag name is empty"));
    }
    console::header(&format!("Hashtag #{name}"));

    let collection = manifest.resolve(CollectionKind::Hashtag, name);
    let videos = client.hashtag_videos(name, count).await?;
    let summary = merge_into_collection(storage, &collection, videos).await?;
    report(&collection, &summary);
    Ok(summary)
}

/// Fetch up to `count` videos returned by a search query into its
/// collection.
pub async fn run_search(
    manifest: &Manifest,
    storage: &dyn SnapshotStorage,
    client: &dyn ScrapeClient,
    query: &str,
    count: usize,
) -> Result<CollectSummary> {
    let query = query.trim();
    if query.is_empty() {
        return Err(AppError::validation("search query is empty"));
    }
    console::header(&format!("Search \"{query}\""));

    let collection = manifest.resolve(CollectionKind::Search, query);
    let videos = client.search_videos(query, count).await?;
    let summary = merge_into_collection(storage, &collection, videos).await?;
    report(&collection, &summary);
    Ok(summary)
}

fn report(collection: &Collection, summary: &CollectSummary) {
    console::success(&format!(
        "Saved {} videos to {}",
        summary.total, collection.path
    ));
    console::sub_item(&format!("Fetched: {}", summary.fetched));
    console::sub_item(&format!("New: {}", summary.added));
}
