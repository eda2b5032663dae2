//! Scripted scraping client and fixtures shared by the integration tests.

#![allow(dead_code)]

use std::collections::{BTreeSet, HashMap, HashSet};
use std::sync::Mutex;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use serde_json::{Value, json};

use vidcrawl::error::{AppError, Result};
use vidcrawl::models::{CrawlSettings, Record};
use vidcrawl::services::{ScrapeClient, VideoPage};
use vidcrawl::storage::{LocalStorage, SnapshotStorage};

/// Video record as the platform lists it.
pub fn video(id: &str, author: &str, desc: &str) -> Record {
    record(json!({
        "id": id,
        "desc": desc,
        "author": { "uniqueId": author, "nickname": author },
        "authorStats": { "followerCount": 1000, "videoCount": 10 },
        "stats": { "playCount": 5, "commentCount": 1 },
        "video": { "duration": 15, "playAddr": format!("https://cdn.example/{id}.mp4") },
    }))
}

/// Account video with a creation time and pin flag.
pub fn account_video(id: &str, author: &str, create_time: i64, pinned: bool) -> Record {
    record(json!({
        "id": id,
        "desc": "post",
        "author": { "uniqueId": author },
        "createTime": create_time,
        "isPinnedItem": pinned,
    }))
}

pub fn user(handle: &str, followers: u64) -> Record {
    record(json!({
        "user": { "uniqueId": handle, "secUid": format!("sec-{handle}") },
        "stats": { "followerCount": followers, "videoCount": 3 },
    }))
}

pub fn record(value: Value) -> Record {
    Record::from_value(value).expect("fixture must be an object")
}

pub fn settings(keywords: &[&str]) -> CrawlSettings {
    CrawlSettings {
        keywords: keywords.iter().map(|k| k.to_string()).collect::<BTreeSet<_>>(),
        text_column: "desc".to_string(),
        checkpoint_threshold: 10,
        backup_threshold: 100,
        batch_delay: Duration::ZERO,
    }
}

/// In-memory client answering from scripted data. Anything not scripted
/// fails like a missing page would.
#[derive(Default)]
pub struct MockClient {
    details: HashMap<String, Record>,
    related: HashMap<String, Vec<Record>>,
    failing: HashSet<String>,
    users: HashMap<String, Record>,
    pages: HashMap<String, Vec<Vec<Record>>>,
    payloads: HashMap<String, Vec<u8>>,
    listings: HashMap<String, Vec<Record>>,
    calls: Mutex<Vec<String>>,
}

impl MockClient {
    pub fn new() -> Self {
        Self::default()
    }

    /// Script a fetchable video and the videos listed next to it.
    pub fn with_video(mut self, detail: Record, related: Vec<Record>) -> Self {
        let id = detail.id().expect("fixture video has an id");
        self.details.insert(id.clone(), detail);
        self.related.insert(id, related);
        self
    }

    pub fn with_failure(mut self, video_id: &str) -> Self {
        self.failing.insert(video_id.to_string());
        self
    }

    pub fn with_user(mut self, handle: &str, detail: Record, pages: Vec<Vec<Record>>) -> Self {
        self.users.insert(handle.to_string(), detail);
        self.pages.insert(handle.to_string(), pages);
        self
    }

    pub fn with_payload(mut self, video_id: &str, bytes: &[u8]) -> Self {
        self.payloads.insert(video_id.to_string(), bytes.to_vec());
        self
    }

    pub fn with_listing(mut self, key: &str, videos: Vec<Record>) -> Self {
        self.listings.insert(key.to_string(), videos);
        self
    }

    pub fn calls(&self) -> Vec<String> {
        self.calls.lock().expect("calls lock").clone()
    }

    pub fn count_calls(&self, prefix: &str) -> usize {
        self.calls().iter().filter(|c| c.starts_with(prefix)).count()
    }

    fn log(&self, call: String) {
        self.calls.lock().expect("calls lock").push(call);
    }

    fn missing(context: &str, key: &str) -> AppError {
        AppError::fetch(context, format!("{key} is not available"))
    }
}

#[async_trait]
impl ScrapeClient for MockClient {
    async fn video_detail(&self, author_id: &str, video_id: &str) -> Result<Record> {
        self.log(format!("detail:{author_id}/{video_id}"));
        if self.failing.contains(video_id) {
            return Err(AppError::fetch("video detail", "captcha required"));
        }
        self.details
            .get(video_id)
            .cloned()
            .ok_or_else(|| Self::missing("video detail", video_id))
    }

    async fn related_videos(&self, video_id: &str) -> Result<Vec<Record>> {
        self.log(format!("related:{video_id}"));
        Ok(self.related.get(video_id).cloned().unwrap_or_default())
    }

    async fn user_detail(&self, handle: &str) -> Result<Record> {
        self.log(format!("user:{handle}"));
        self.users
            .get(handle)
            .cloned()
            .ok_or_else(|| Self::missing("user detail", handle))
    }

    async fn user_videos_page(&self, handle: &str, cursor: &str) -> Result<VideoPage> {
        self.log(format!("page:{handle}:{cursor}"));
        let pages = self
            .pages
            .get(handle)
            .ok_or_else(|| Self::missing("user videos", handle))?;
        let index: usize = cursor
            .parse()
            .map_err(|_| AppError::validation(format!("bad cursor {cursor}")))?;
        let items = pages.get(index).cloned().unwrap_or_default();
        Ok(VideoPage {
            items,
            cursor: (index + 1).to_string(),
            has_more: index + 1 < pages.len(),
        })
    }

    async fn video_bytes(&self, video: &Record) -> Result<Vec<u8>> {
        let id = video.id().unwrap_or_default();
        self.log(format!("bytes:{id}"));
        self.payloads
            .get(&id)
            .cloned()
            .ok_or_else(|| Self::missing("video bytes", &id))
    }

    async fn hashtag_videos(&self, name: &str, count: usize) -> Result<Vec<Record>> {
        self.log(format!("hashtag:{name}"));
        let mut videos = self.listings.get(name).cloned().unwrap_or_default();
        videos.truncate(count);
        Ok(videos)
    }

    async fn search_videos(&self, query: &str, count: usize) -> Result<Vec<Record>> {
        self.log(format!("search:{query}"));
        let mut videos = self.listings.get(query).cloned().unwrap_or_default();
        videos.truncate(count);
        Ok(videos)
    }
}

/// Local storage whose next `failures` writes fail.
pub struct FlakyStorage {
    inner: LocalStorage,
    failures: AtomicUsize,
}

impl FlakyStorage {
    pub fn new(inner: LocalStorage) -> Self {
        Self {
            inner,
            failures: AtomicUsize::new(0),
        }
    }

    pub fn fail_next_writes(&self, count: usize) {
        self.failures.store(count, Ordering::SeqCst);
    }

    pub fn inner(&self) -> &LocalStorage {
        &self.inner
    }
}

#[async_trait]
impl SnapshotStorage for FlakyStorage {
    async fn read_bytes(&self, key: &str) -> Result<Option<Vec<u8>>> {
        self.inner.read_bytes(key).await
    }

    async fn write_bytes(&self, key: &str, bytes: &[u8]) -> Result<()> {
        let failing = self
            .failures
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1))
            .is_ok();
        if failing {
            return Err(AppError::Io(std::io::Error::other("disk full")));
        }
        self.inner.write_bytes(key, bytes).await
    }

    async fn list(&self, dir: &str) -> Result<Vec<String>> {
        self.inner.list(dir).await
    }
}
