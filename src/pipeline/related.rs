// src/pipeline/related.rs

//! Related-video crawl.
//!
//! Starting from hashtag seeds, each step fetches one queued video and the
//! videos the platform lists next to it, keeps those that match the topic
//! keywords, and queues them in turn. Two stores are maintained: fetched
//! videos (full detail) and related videos (discovered, not yet fetched).

use std::collections::HashSet;
use std::mem;

use chrono::Utc;

use crate::error::{AppError, Result};
use crate::models::{CollectionKind, Config, CrawlSettings, Manifest, Record, RelatedConfig};
use crate::pipeline::checkpoint::{Checkpoint, FlushPlan};
use crate::pipeline::collect::load_collections;
use crate::pipeline::{FetchQueue, KeywordFilter, QueueEntry};
use crate::services::ScrapeClient;
use crate::storage::SnapshotStorage;
use crate::table::{self, Table};
use crate::utils::log as console;

/// Where the crawler is in its iteration protocol.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CrawlPhase {
    Idle,
    Fetching,
    Merging,
    Checkpointing,
    /// Queue exhausted
    Done,
    /// Setup failed; no step will run
    Aborted,
}

/// Result of a single step.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StepOutcome {
    /// Head entry fetched and merged.
    Merged {
        video_id: String,
        related: usize,
        flushed: FlushPlan,
    },
    /// Head entry abandoned after a fetch error.
    Skipped { video_id: String, reason: String },
    /// Nothing left to fetch.
    Done,
}

/// Totals of a crawl run.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CrawlSummary {
    pub processed: usize,
    pub skipped: usize,
    pub related_merged: usize,
    pub primary_flushes: usize,
    pub backup_flushes: usize,
    pub fetched_total: usize,
    pub related_total: usize,
}

/// Resumable related-video crawler.
pub struct RelatedCrawler<'a> {
    client: &'a dyn ScrapeClient,
    storage: &'a dyn SnapshotStorage,
    settings: CrawlSettings,
    keys: RelatedConfig,
    filter: KeywordFilter,
    fetched: Table,
    related: Table,
    queue: FetchQueue,
    checkpoint: Checkpoint,
    phase: CrawlPhase,
    summary: CrawlSummary,
}

impl<'a> RelatedCrawler<'a> {
    pub fn new(
        client: &'a dyn ScrapeClient,
        storage: &'a dyn SnapshotStorage,
        settings: CrawlSettings,
        keys: RelatedConfig,
    ) -> Self {
        let filter = KeywordFilter::with_column(
            settings.keywords.iter().cloned(),
            settings.text_column.clone(),
        );
        let checkpoint = Checkpoint::new(settings.checkpoint_threshold, settings.backup_threshold);
        Self {
            client,
            storage,
            settings,
            keys,
            filter,
            fetched: Table::new(),
            related: Table::new(),
            queue: FetchQueue::new(),
            checkpoint,
            phase: CrawlPhase::Idle,
            summary: CrawlSummary::default(),
        }
    }

    /// Load both stores (with backup fallback) and build the initial queue
    /// from `seeds` and the related store.
    ///
    /// A store that cannot be restored leaves the crawler `Aborted`.
    pub async fn load(&mut self, seeds: &Table) -> Result<()> {
        let stores = self.load_stores().await;
        let (fetched, related) = match stores {
            Ok(stores) => stores,
            Err(e) => {
                self.phase = CrawlPhase::Aborted;
                return Err(e);
            }
        };
        self.fetched = fetched;
        self.related = related;
        self.seed_queue(seeds);
        Ok(())
    }

    async fn load_stores(&self) -> Result<(Table, Table)> {
        let fetched = self
            .storage
            .load_with_backup(&self.keys.fetched, Some(self.keys.backup_fetched.as_str()))
            .await?;
        let related = self
            .storage
            .load_with_backup(&self.keys.related, Some(self.keys.backup_related.as_str()))
            .await?;
        Ok((fetched.dedupe_by_id(), related.dedupe_by_id()))
    }

    /// Admit seeds and stored related videos that are not fetched yet.
    pub fn seed_queue(&mut self, seeds: &Table) {
        let fetched_ids = self.fetched.ids();
        self.related.exclude_ids(&fetched_ids);
        self.queue.enqueue_discovered(
            seeds.iter().chain(self.related.iter()),
            &fetched_ids,
            &self.filter,
        );
    }

    pub fn phase(&self) -> CrawlPhase {
        self.phase
    }

    pub fn queue(&self) -> &FetchQueue {
        &self.queue
    }

    pub fn fetched(&self) -> &Table {
        &self.fetched
    }

    pub fn related(&self) -> &Table {
        &self.related
    }

    pub fn summary(&self) -> &CrawlSummary {
        &self.summary
    }

    /// Process the head of the queue.
    ///
    /// Fetch failures skip the entry and are not errors. Errors are returned
    /// only for the final flush when the queue runs out, or when stepping an
    /// aborted crawler.
    pub async fn step(&mut self) -> Result<StepOutcome> {
        match self.phase {
            CrawlPhase::Done => return Ok(StepOutcome::Done),
            CrawlPhase::Aborted => {
                return Err(AppError::validation("crawl was aborted during setup"));
            }
            _ => {}
        }

        let Some(head) = self.queue.peek_next().cloned() else {
            self.finish().await?;
            return Ok(StepOutcome::Done);
        };

        self.phase = CrawlPhase::Fetching;
        let (video, related) = match self.fetch(&head).await {
            Ok(fetched) => fetched,
            Err(e) => {
                self.queue.pop();
                self.summary.skipped += 1;
                self.phase = CrawlPhase::Idle;
                log::warn!("Skipping video {}: {}", head.video_id, e);
                return Ok(StepOutcome::Skipped {
                    video_id: head.video_id,
                    reason: e.to_string(),
                });
            }
        };

        self.phase = CrawlPhase::Merging;
        let new_related = self.filter.apply(Table::from_rows(related));
        let merged = new_related.len();
        self.merge(video, new_related);

        self.phase = CrawlPhase::Checkpointing;
        let plan = self.checkpoint.record(merged);
        let flushed = self.flush(plan).await;

        self.summary.processed += 1;
        self.summary.related_merged += merged;
        self.phase = CrawlPhase::Idle;
        log::info!(
            "{} fetched, {} related, {} queued",
            self.fetched.len(),
            self.related.len(),
            self.queue.len()
        );

        Ok(StepOutcome::Merged {
            video_id: head.video_id,
            related: merged,
            flushed,
        })
    }

    /// Step until the queue is exhausted.
    pub async fn run(&mut self) -> Result<CrawlSummary> {
        loop {
            match self.step().await? {
                StepOutcome::Done => break,
                StepOutcome::Merged { .. } | StepOutcome::Skipped { .. } => {
                    if !self.settings.batch_delay.is_zero() {
                        tokio::time::sleep(self.settings.batch_delay).await;
                    }
                }
            }
        }
        Ok(self.summary.clone())
    }

    async fn fetch(&self, head: &QueueEntry) -> Result<(Record, Vec<Record>)> {
        let mut video = self
            .client
            .video_detail(&head.author_id, &head.video_id)
            .await?;
        let mut related = self.client.related_videos(&head.video_id).await?;
        if related.is_empty() {
            return Err(AppError::fetch(
                "related videos",
                format!("no related videos found for {}", head.video_id),
            ));
        }

        let now = Utc::now();
        video.tag_scraped(now);
        for record in &mut related {
            record.tag_scraped(now);
        }
        Ok((video, related))
    }

    /// Merge one fetched video and its matching related videos, then pop the
    /// head and admit the newly discovered videos.
    fn merge(&mut self, video: Record, new_related: Table) {
        let fetched = mem::take(&mut self.fetched);
        self.fetched = table::merge(fetched, Table::from_rows(vec![video])).dedupe_by_id();
        let related = mem::take(&mut self.related);
        self.related = table::merge(related, new_related.clone()).dedupe_by_id();

        // Pop before re-filtering so a non-matching head cannot take the
        // next entry down with it.
        self.queue.pop();

        self.filter.retain(&mut self.fetched);
        self.filter.retain(&mut self.related);
        self.queue.retain_matching(&self.filter);

        let fetched_ids: HashSet<String> = self.fetched.ids();
        self.queue
            .enqueue_discovered(new_related.iter(), &fetched_ids, &self.filter);

        self.related.exclude_ids(&fetched_ids);
        self.queue.exclude(&fetched_ids);
    }

    /// Write the snapshots a plan calls for. A failed write is logged and
    /// the counters are kept so the next step retries it.
    async fn flush(&mut self, plan: FlushPlan) -> FlushPlan {
        let mut written = FlushPlan::default();
        if plan.primary {
            match self.write_pair(&self.keys.fetched, &self.keys.related).await {
                Ok(()) => {
                    written.primary = true;
                    self.summary.primary_flushes += 1;
                }
                Err(e) => log::error!("Checkpoint write failed: {}", e),
            }
        }
        if plan.backup {
            match self
                .write_pair(&self.keys.backup_fetched, &self.keys.backup_related)
                .await
            {
                Ok(()) => {
                    written.backup = true;
                    self.summary.backup_flushes += 1;
                }
                Err(e) => log::error!("Backup write failed: {}", e),
            }
        }
        self.checkpoint.flushed(written);
        written
    }

    async fn write_pair(&self, fetched_key: &str, related_key: &str) -> Result<()> {
        self.storage.write_table(fetched_key, &self.fetched).await?;
        self.storage.write_table(related_key, &self.related).await
    }

    async fn finish(&mut self) -> Result<()> {
        self.write_pair(&self.keys.fetched, &self.keys.related).await?;
        self.checkpoint.flushed(FlushPlan {
            primary: true,
            backup: false,
        });
        self.summary.primary_flushes += 1;
        self.summary.fetched_total = self.fetched.len();
        self.summary.related_total = self.related.len();
        self.phase = CrawlPhase::Done;
        Ok(())
    }
}

/// Run the related-video crawl seeded from every hashtag collection.
pub async fn run_related(
    config: &Config,
    manifest: &Manifest,
    storage: &dyn SnapshotStorage,
    client: &dyn ScrapeClient,
) -> Result<CrawlSummary> {
    console::header("Related video crawl");

    let hashtags: Vec<_> = manifest.of_kind(CollectionKind::Hashtag).collect();
    let seeds = load_collections(storage, hashtags.iter().copied())
        .await
        .dedupe_by_id();
    console::info(&format!(
        "Loaded {} seed videos from {} hashtag collections",
        seeds.len(),
        hashtags.len()
    ));

    let mut crawler = RelatedCrawler::new(
        client,
        storage,
        config.crawl_settings(),
        config.related.clone(),
    );
    crawler.load(&seeds).await?;
    console::info(&format!(
        "Resuming with {} fetched, {} related, {} queued",
        crawler.fetched().len(),
        crawler.related().len(),
        crawler.queue().len()
    ));

    let summary = crawler.run().await?;

    console::summary(
        "Related crawl complete",
        &[
            ("Processed", summary.processed.to_string()),
            ("Skipped", summary.skipped.to_string()),
            ("Related merged", summary.related_merged.to_string()),
            ("Fetched videos", summary.fetched_total.to_string()),
            ("Related videos", summary.related_total.to_string()),
            ("Checkpoints", summary.primary_flushes.to_string()),
            ("Backups", summary.backup_flushes.to_string()),
        ],
    );
    Ok(summary)
}
