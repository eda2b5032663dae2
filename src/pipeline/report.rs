// src/pipeline/report.rs

//! Reports over the stored collections.
//!
//! - accounts: leaderboard of accounts posting topic videos (CSV)
//! - stats: per-account totals over the fetched related-crawl store
//! - timeline: fortnightly share of AI-labelled videos (CSV)

use std::cmp::Reverse;
use std::collections::BTreeMap;

use chrono::{DateTime, Datelike, NaiveDate, Utc};
use serde::Serialize;
use serde_json::Value;

use crate::error::{AppError, Result};
use crate::models::record::as_u64;
use crate::models::{AiLabel, Config, Manifest, Record};
use crate::pipeline::KeywordFilter;
use crate::pipeline::collect::load_collections;
use crate::storage::SnapshotStorage;
use crate::table::{self, Table};
use crate::utils::log as console;

/// z-score of a two-sided 95% interval.
const Z_95: f64 = 1.959_964;

/// One leaderboard row.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AccountRow {
    pub unique_id: String,
    pub election_video_count: usize,
    pub nickname: Option<String>,
    pub signature: Option<String>,
    pub follower_count: Option<u64>,
    pub video_count: Option<u64>,
}

/// Per-account totals.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct AccountStats {
    pub unique_id: String,
    pub video_count: u64,
    pub follower_count: u64,
    pub play_count: u64,
    pub comment_count: u64,
}

/// Metric an account ranking is sorted by.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StatMetric {
    VideoCount,
    FollowerCount,
    PlayCount,
    CommentCount,
}

impl StatMetric {
    pub const ALL: [StatMetric; 4] = [
        StatMetric::VideoCount,
        StatMetric::FollowerCount,
        StatMetric::PlayCount,
        StatMetric::CommentCount,
    ];

    pub fn name(&self) -> &'static str {
        match self {
            StatMetric::VideoCount => "videoCount",
            StatMetric::FollowerCount => "followerCount",
            StatMetric::PlayCount => "playCount",
            StatMetric::CommentCount => "commentCount",
        }
    }

    fn value(&self, stats: &AccountStats) -> u64 {
        match self {
            StatMetric::VideoCount => stats.video_count,
            StatMetric::FollowerCount => stats.follower_count,
            StatMetric::PlayCount => stats.play_count,
            StatMetric::CommentCount => stats.comment_count,
        }
    }
}

/// One fortnight of the AI-label timeline.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TimelineRow {
    pub window_start: NaiveDate,
    pub total: usize,
    pub platform_tagged: usize,
    pub user_tagged: usize,
    pub platform_percent: f64,
    pub user_percent: f64,
    pub platform_ci_lower: f64,
    pub platform_ci_upper: f64,
    pub user_ci_lower: f64,
    pub user_ci_upper: f64,
}

fn text_field(video: &Record, path: &[&str]) -> Option<String> {
    video.field(path).and_then(Value::as_str).map(str::to_string)
}

fn count_field(video: &Record, path: &[&str]) -> Option<u64> {
    video.field(path).and_then(as_u64)
}

/// Group topic videos by author into leaderboard rows, most videos first.
pub fn account_leaderboard(videos: &Table, filter: &KeywordFilter, limit: usize) -> Vec<AccountRow> {
    let mut rows: BTreeMap<String, AccountRow> = BTreeMap::new();

    for video in videos.iter().filter(|v| filter.matches(v)) {
        let Some(handle) = video.author_id() else {
            continue;
        };
        let row = rows.entry(handle.clone()).or_insert_with(|| AccountRow {
            unique_id: handle,
            election_video_count: 0,
            nickname: None,
            signature: None,
            follower_count: None,
            video_count: None,
        });
        row.election_video_count += 1;
        if row.nickname.is_none() {
            row.nickname = text_field(video, &["author", "nickname"]);
        }
        if row.signature.is_none() {
            row.signature = text_field(video, &["author", "signature"]);
        }
        row.follower_count = row
            .follower_count
            .max(count_field(video, &["authorStats", "followerCount"]));
        row.video_count = row
            .video_count
            .max(count_field(video, &["authorStats", "videoCount"]));
    }

    let mut rows: Vec<AccountRow> = rows.into_values().collect();
    // Stable sort keeps handles ascending among equal counts.
    rows.sort_by_key(|row| Reverse(row.election_video_count));
    rows.truncate(limit);
    rows
}

/// Per-account totals over topic videos.
pub fn account_stats(videos: &Table, filter: &KeywordFilter) -> Vec<AccountStats> {
    let mut accounts: BTreeMap<String, AccountStats> = BTreeMap::new();

    for video in videos.iter().filter(|v| filter.matches(v)) {
        let Some(handle) = video.author_id() else {
            continue;
        };
        let stats = accounts.entry(handle.clone()).or_insert_with(|| AccountStats {
            unique_id: handle,
            ..AccountStats::default()
        });
        stats.video_count += 1;
        stats.follower_count = stats
            .follower_count
            .max(count_field(video, &["authorStats", "followerCount"]).unwrap_or(0));
        stats.play_count += count_field(video, &["stats", "playCount"]).unwrap_or(0);
        stats.comment_count += count_field(video, &["stats", "commentCount"]).unwrap_or(0);
    }

    accounts.into_values().collect()
}

/// The `n` accounts ranking highest on `metric`.
pub fn top_accounts(stats: &[AccountStats], metric: StatMetric, n: usize) -> Vec<&AccountStats> {
    let mut ranked: Vec<&AccountStats> = stats.iter().collect();
    ranked.sort_by_key(|s| Reverse(metric.value(s)));
    ranked.truncate(n);
    ranked
}

/// Monday 1970-01-05, the origin fortnight windows are aligned to.
const WINDOW_ORIGIN_SECS: i64 = 4 * 86_400;
const WINDOW_SECS: i64 = 14 * 86_400;

/// Start of the fortnight containing `at`.
pub fn fortnight_start(at: DateTime<Utc>) -> NaiveDate {
    let offset = (at.timestamp() - WINDOW_ORIGIN_SECS).div_euclid(WINDOW_SECS);
    DateTime::<Utc>::from_timestamp(WINDOW_ORIGIN_SECS + offset * WINDOW_SECS, 0)
        .map(|start| start.date_naive())
        .unwrap_or_else(|| at.date_naive())
}

/// Normal-approximation 95% interval of a proportion, in percent.
pub fn proportion_interval(successes: usize, total: usize) -> (f64, f64) {
    if total == 0 {
        return (0.0, 0.0);
    }
    let n = total as f64;
    let p = successes as f64 / n;
    let half = Z_95 * (p * (1.0 - p) / n).sqrt();
    (
        ((p - half) * 100.0).clamp(0.0, 100.0),
        ((p + half) * 100.0).clamp(0.0, 100.0),
    )
}

fn percent(part: usize, total: usize) -> f64 {
    if total == 0 {
        0.0
    } else {
        part as f64 / total as f64 * 100.0
    }
}

/// Fortnightly AI-label counts for videos created in or after `since_year`.
pub fn ai_timeline(videos: &Table, since_year: i32) -> Vec<TimelineRow> {
    let mut windows: BTreeMap<NaiveDate, (usize, usize, usize)> = BTreeMap::new();

    for video in videos.iter() {
        let Some(created) = video
            .create_time()
            .and_then(|t| DateTime::<Utc>::from_timestamp(t, 0))
        else {
            continue;
        };
        if created.year() < since_year {
            continue;
        }
        let counts = windows.entry(fortnight_start(created)).or_default();
        counts.0 += 1;
        match video.ai_label() {
            AiLabel::PlatformTagged => counts.1 += 1,
            AiLabel::UserTagged => counts.2 += 1,
            AiLabel::Untagged => {}
        }
    }

    windows
        .into_iter()
        .map(|(window_start, (total, platform, user))| {
            let (platform_ci_lower, platform_ci_upper) = proportion_interval(platform, total);
            let (user_ci_lower, user_ci_upper) = proportion_interval(user, total);
            TimelineRow {
                window_start,
                total,
                platform_tagged: platform,
                user_tagged: user,
                platform_percent: percent(platform, total),
                user_percent: percent(user, total),
                platform_ci_lower,
                platform_ci_upper,
                user_ci_lower,
                user_ci_upper,
            }
        })
        .collect()
}

/// Serialize rows as CSV with a header row.
pub fn to_csv<T: Serialize>(rows: &[T]) -> Result<Vec<u8>> {
    let mut writer = csv::Writer::from_writer(Vec::new());
    for row in rows {
        writer.serialize(row)?;
    }
    writer
        .into_inner()
        .map_err(|e| AppError::Io(e.into_error()))
}

/// Every collection plus both related-crawl stores, deduped by id.
pub async fn load_report_sources(
    config: &Config,
    manifest: &Manifest,
    storage: &dyn SnapshotStorage,
) -> Table {
    let mut merged = load_collections(storage, &manifest.collections).await;
    let stores = [
        (&config.related.fetched, &config.related.backup_fetched),
        (&config.related.related, &config.related.backup_related),
    ];
    for (primary, backup) in stores {
        match storage.load_with_backup(primary, Some(backup.as_str())).await {
            Ok(rows) => merged = table::merge(merged, rows),
            Err(e) => log::warn!("Skipping {}: {}", primary, e),
        }
    }
    merged.dedupe_by_id()
}

fn topic_filter(config: &Config) -> KeywordFilter {
    KeywordFilter::with_column(
        config.topic.normalized_keywords(),
        config.topic.text_column.clone(),
    )
}

/// Write the account leaderboard CSV.
pub async fn run_accounts_report(
    config: &Config,
    manifest: &Manifest,
    storage: &dyn SnapshotStorage,
) -> Result<Vec<AccountRow>> {
    console::header("Account leaderboard");

    let videos = load_report_sources(config, manifest, storage).await;
    let rows = account_leaderboard(&videos, &topic_filter(config), config.report.accounts_limit);
    storage
        .write_bytes(&config.report.accounts_file, &to_csv(&rows)?)
        .await?;

    console::success(&format!(
        "Wrote {} accounts to {}",
        rows.len(),
        config.report.accounts_file
    ));
    for row in rows.iter().take(config.report.top_n) {
        console::sub_item(&format!("{}: {}", row.unique_id, row.election_video_count));
    }
    Ok(rows)
}

/// Print the top accounts of the fetched store by each metric.
pub async fn run_stats_report(config: &Config, storage: &dyn SnapshotStorage) -> Result<Vec<AccountStats>> {
    console::header("Account stats");

    let videos = storage
        .load_with_backup(&config.related.fetched, Some(config.related.backup_fetched.as_str()))
        .await?
        .dedupe_by_id();
    let stats = account_stats(&videos, &topic_filter(config));

    for metric in StatMetric::ALL {
        let top = top_accounts(&stats, metric, config.report.top_n);
        console::summary(
            metric.name(),
            &top.iter()
                .map(|s| (s.unique_id.as_str(), metric.value(s).to_string()))
                .collect::<Vec<_>>(),
        );
    }
    Ok(stats)
}

/// Write the AI-label timeline CSV.
pub async fn run_timeline_report(
    config: &Config,
    manifest: &Manifest,
    storage: &dyn SnapshotStorage,
) -> Result<Vec<TimelineRow>> {
    console::header("AI-label timeline");

    let videos = load_report_sources(config, manifest, storage).await;
    let rows = ai_timeline(&videos, config.report.timeline_since_year);
    storage
        .write_bytes(&config.report.timeline_file, &to_csv(&rows)?)
        .await?;

    console::success(&format!(
        "Wrote {} fortnights to {}",
        rows.len(),
        config.report.timeline_file
    ));
    Ok(rows)
}
