//! Fetch queue for the related-video crawl.

use std::collections::{HashSet, VecDeque};

use crate::models::Record;
use crate::pipeline::KeywordFilter;

/// A video waiting for its detail and related-video fetch.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct QueueEntry {
    pub author_id: String,
    pub video_id: String,
    /// Text the topic filter is evaluated against.
    pub text: Option<String>,
}

impl QueueEntry {
    pub fn new(author_id: impl Into<String>, video_id: impl Into<String>) -> Self {
        Self {
            author_id: author_id.into(),
            video_id: video_id.into(),
            text: None,
        }
    }

    /// Entry for a record; `None` if it lacks an id or an author.
    pub fn from_record(record: &Record, filter: &KeywordFilter) -> Option<Self> {
        Some(Self {
            author_id: record.author_id()?,
            video_id: record.id()?,
            text: record.text(filter.column()).map(str::to_string),
        })
    }
}

/// FIFO worklist of videos to fetch.
///
/// Each id is queued at most once at a time, and an id that has been popped
/// is never admitted again for the rest of the run.
#[derive(Debug, Default)]
pub struct FetchQueue {
    entries: VecDeque<QueueEntry>,
    queued: HashSet<String>,
    attempted: HashSet<String>,
}

impl FetchQueue {
    pub fn new() -> Self {
        Self::default()
    }

    /// Build a queue from entries, keeping the first entry per id.
    pub fn from_entries(entries: impl IntoIterator<Item = QueueEntry>) -> Self {
        let mut queue = Self::new();
        for entry in entries {
            queue.push(entry);
        }
        queue
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn peek_next(&self) -> Option<&QueueEntry> {
        self.entries.front()
    }

    /// Remove the head entry. Its id will not be admitted again this run.
    pub fn pop(&mut self) -> Option<QueueEntry> {
        let entry = self.entries.pop_front()?;
        self.queued.remove(&entry.video_id);
        self.attempted.insert(entry.video_id.clone());
        Some(entry)
    }

    pub fn contains(&self, video_id: &str) -> bool {
        self.queued.contains(video_id)
    }

    fn push(&mut self, entry: QueueEntry) -> bool {
        if self.attempted.contains(&entry.video_id) || self.queued.contains(&entry.video_id) {
            return false;
        }
        self.queued.insert(entry.video_id.clone());
        self.entries.push_back(entry);
        true
    }

    /// Admit discovered records.
    ///
    /// A record is queued only if it has an id and an author, is not already
    /// fetched, not already queued or attempted, and matches the topic filter.
    /// Returns the number of entries added.
    pub fn enqueue_discovered<'a>(
        &mut self,
        records: impl IntoIterator<Item = &'a Record>,
        fetched: &HashSet<String>,
        filter: &KeywordFilter,
    ) -> usize {
        let mut added = 0;
        for record in records {
            if !filter.matches(record) {
                continue;
            }
            let Some(entry) = QueueEntry::from_record(record, filter) else {
                continue;
            };
            if fetched.contains(&entry.video_id) {
                continue;
            }
            if self.push(entry) {
                added += 1;
            }
        }
        added
    }

    /// Drop queued entries whose text no longer matches.
    pub fn retain_matching(&mut self, filter: &KeywordFilter) {
        let queued = &mut self.queued;
        self.entries.retain(|entry| {
            let keep = filter.matches_text(entry.text.as_deref());
            if !keep {
                queued.remove(&entry.video_id);
            }
            keep
        });
    }

    /// Drop queued entries for ids that have been fetched.
    pub fn exclude(&mut self, ids: &HashSet<String>) {
        let queued = &mut self.queued;
        self.entries.retain(|entry| {
            let keep = !ids.contains(&entry.video_id);
            if !keep {
                queued.remove(&entry.video_id);
            }
            keep
        });
    }

    pub fn iter(&self) -> impl Iterator<Item = &QueueEntry> {
        self.entries.iter()
    }
}
