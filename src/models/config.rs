//! Application configuration structures.

use std::collections::BTreeSet;
use std::fs;
use std::path::Path;
use std::time::Duration;

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

use crate::error::{AppError, Result};

/// Root application configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    /// HTTP and request pacing settings
    #[serde(default)]
    pub crawler: CrawlerConfig,

    /// Topic keywords for filtering
    #[serde(default)]
    pub topic: TopicConfig,

    /// Flush thresholds
    #[serde(default)]
    pub checkpoint: CheckpointConfig,

    /// Related-video crawl snapshot keys
    #[serde(default)]
    pub related: RelatedConfig,

    /// Account collection settings
    #[serde(default)]
    pub users: UsersConfig,

    /// Video payload download settings
    #[serde(default)]
    pub download: DownloadConfig,

    /// Report outputs
    #[serde(default)]
    pub report: ReportConfig,
}

impl Config {
    /// Load configuration from a TOML file.
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let content = fs::read_to_string(path)?;
        Ok(toml::from_str(&content)?)
    }

    /// Load configuration or return default if loading fails.
    pub fn load_or_default(path: impl AsRef<Path>) -> Self {
        Self::load(&path).unwrap_or_else(|e| {
            log::warn!(
                "Config load failed from {:?}: {}. Using defaults.",
                path.as_ref(),
                e
            );
            Self::default()
        })
    }

    /// Validate configuration values for basic sanity.
    pub fn validate(&self) -> Result<()> {
        if self.crawler.user_agent.trim().is_empty() {
            return Err(AppError::validation("crawler.user_agent is empty"));
        }
        if self.crawler.timeout_secs == 0 {
            return Err(AppError::validation("crawler.timeout_secs must be > 0"));
        }
        if self.topic.keywords.iter().all(|k| k.trim().is_empty()) {
            return Err(AppError::validation("topic.keywords is empty"));
        }
        if self.topic.text_column.trim().is_empty() {
            return Err(AppError::validation("topic.text_column is empty"));
        }
        if self.checkpoint.save_threshold == 0 {
            return Err(AppError::validation(
                "checkpoint.save_threshold must be > 0",
            ));
        }
        if self.checkpoint.backup_threshold <= self.checkpoint.save_threshold {
            return Err(AppError::validation(
                "checkpoint.backup_threshold must be greater than checkpoint.save_threshold",
            ));
        }
        if self.users.handle_column.trim().is_empty() {
            return Err(AppError::validation("users.handle_column is empty"));
        }
        if self.users.max_videos == 0 {
            return Err(AppError::validation("users.max_videos must be > 0"));
        }
        if self.download.batch_size == 0 {
            return Err(AppError::validation("download.batch_size must be > 0"));
        }
        if self.report.top_n == 0 {
            return Err(AppError::validation("report.top_n must be > 0"));
        }
        Ok(())
    }

    /// Settings the crawl loops run with.
    pub fn crawl_settings(&self) -> CrawlSettings {
        CrawlSettings {
            keywords: self.topic.normalized_keywords(),
            text_column: self.topic.text_column.clone(),
            checkpoint_threshold: self.checkpoint.save_threshold,
            backup_threshold: self.checkpoint.backup_threshold,
            batch_delay: Duration::from_millis(self.crawler.request_delay_ms),
        }
    }
}

/// Explicit parameters for a crawl loop.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CrawlSettings {
    /// Lower-cased topic keywords
    pub keywords: BTreeSet<String>,
    /// Column the keywords are matched against
    pub text_column: String,
    /// Merged records between primary snapshot flushes
    pub checkpoint_threshold: usize,
    /// Merged records between backup snapshot flushes
    pub backup_threshold: usize,
    /// Pause after each successful fetch
    pub batch_delay: Duration,
}

impl Default for CrawlSettings {
    fn default() -> Self {
        Config::default().crawl_settings()
    }
}

/// HTTP client and request pacing settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CrawlerConfig {
    /// User-Agent header for HTTP requests
    #[serde(default = "defaults::user_agent")]
    pub user_agent: String,

    /// Request timeout in seconds
    #[serde(default = "defaults::timeout")]
    pub timeout_secs: u64,

    /// Delay after each successful fetch in milliseconds
    #[serde(default = "defaults::request_delay")]
    pub request_delay_ms: u64,

    /// Platform web origin
    #[serde(default = "defaults::base_url")]
    pub base_url: String,

    /// Session token cookie, if one is available
    #[serde(default)]
    pub ms_token: Option<String>,
}

impl Default for CrawlerConfig {
    fn default() -> Self {
        Self {
            user_agent: defaults::user_agent(),
            timeout_secs: defaults::timeout(),
            request_delay_ms: defaults::request_delay(),
            base_url: defaults::base_url(),
            ms_token: None,
        }
    }
}

/// Topic keyword settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TopicConfig {
    /// Substrings matched case-insensitively against the text column
    #[serde(default = "defaults::keywords")]
    pub keywords: Vec<String>,

    /// Column holding the text to match
    #[serde(default = "defaults::text_column")]
    pub text_column: String,
}

impl TopicConfig {
    pub fn normalized_keywords(&self) -> BTreeSet<String> {
        self.keywords
            .iter()
            .map(|k| k.trim().to_lowercase())
            .filter(|k| !k.is_empty())
            .collect()
    }
}

impl Default for TopicConfig {
    fn default() -> Self {
        Self {
            keywords: defaults::keywords(),
            text_column: defaults::text_column(),
        }
    }
}

/// Snapshot flush thresholds, counted in merged records.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CheckpointConfig {
    #[serde(default = "defaults::save_threshold")]
    pub save_threshold: usize,

    #[serde(default = "defaults::backup_threshold")]
    pub backup_threshold: usize,
}

impl Default for CheckpointConfig {
    fn default() -> Self {
        Self {
            save_threshold: defaults::save_threshold(),
            backup_threshold: defaults::backup_threshold(),
        }
    }
}

/// Snapshot keys used by the related-video crawl.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RelatedConfig {
    /// Videos whose detail has been fetched
    #[serde(default = "defaults::fetched")]
    pub fetched: String,

    /// Matching related videos discovered but not yet fetched
    #[serde(default = "defaults::related")]
    pub related: String,

    #[serde(default = "defaults::backup_fetched")]
    pub backup_fetched: String,

    #[serde(default = "defaults::backup_related")]
    pub backup_related: String,
}

impl Default for RelatedConfig {
    fn default() -> Self {
        Self {
            fetched: defaults::fetched(),
            related: defaults::related(),
            backup_fetched: defaults::backup_fetched(),
            backup_related: defaults::backup_related(),
        }
    }
}

/// Account collection settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UsersConfig {
    /// Seed list column holding account handles
    #[serde(default = "defaults::handle_column")]
    pub handle_column: String,

    /// Oldest creation date collected for accounts with no stored videos
    #[serde(default = "defaults::default_since")]
    pub default_since: NaiveDate,

    /// Upper bound on videos paged per account
    #[serde(default = "defaults::max_videos")]
    pub max_videos: usize,

    /// Skip accounts with fewer followers
    #[serde(default)]
    pub min_followers: Option<u64>,
}

impl Default for UsersConfig {
    fn default() -> Self {
        Self {
            handle_column: defaults::handle_column(),
            default_since: defaults::default_since(),
            max_videos: defaults::max_videos(),
            min_followers: None,
        }
    }
}

/// Video payload download settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DownloadConfig {
    /// Manifest collection to download payloads for
    #[serde(default)]
    pub collection: Option<String>,

    /// Directory (relative to storage) for `<id>.mp4` files
    #[serde(default = "defaults::output_dir")]
    pub output_dir: String,

    /// Videos per progress batch
    #[serde(default = "defaults::batch_size")]
    pub batch_size: usize,

    /// Pause after each downloaded payload in milliseconds
    #[serde(default = "defaults::request_delay")]
    pub batch_delay_ms: u64,
}

impl Default for DownloadConfig {
    fn default() -> Self {
        Self {
            collection: None,
            output_dir: defaults::output_dir(),
            batch_size: defaults::batch_size(),
            batch_delay_ms: defaults::request_delay(),
        }
    }
}

/// Report output settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReportConfig {
    #[serde(default = "defaults::accounts_file")]
    pub accounts_file: String,

    /// Rows kept in the account leaderboard
    #[serde(default = "defaults::accounts_limit")]
    pub accounts_limit: usize,

    #[serde(default = "defaults::timeline_file")]
    pub timeline_file: String,

    /// First creation year included in the AI-label timeline
    #[serde(default = "defaults::timeline_since_year")]
    pub timeline_since_year: i32,

    /// Accounts listed per metric in the stats report
    #[serde(default = "defaults::top_n")]
    pub top_n: usize,
}

impl Default for ReportConfig {
    fn default() -> Self {
        Self {
            accounts_file: defaults::accounts_file(),
            accounts_limit: defaults::accounts_limit(),
            timeline_file: defaults::timeline_file(),
            timeline_since_year: defaults::timeline_since_year(),
            top_n: defaults::top_n(),
        }
    }
}

mod defaults {
    use chrono::NaiveDate;

    // Crawler defaults
    pub fn user_agent() -> String {
        "Mozilla/5.0 (X11; Linux x86_64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/129.0.0.0 Safari/537.36".into()
    }
    pub fn timeout() -> u64 {
        30
    }
    pub fn request_delay() -> u64 {
        1000
    }
    pub fn base_url() -> String {
        "https://www.tiktok.com".into()
    }

    // Topic defaults
    pub fn keywords() -> Vec<String> {
        [
            "canadapoli",
            "cdnpolitics",
            "elbowsup",
            "canadaelection",
            "51ststate",
            "poilievre",
            "carney",
            "jagmeet",
            "bernier",
            "blanchet",
            "cdnpoli",
        ]
        .into_iter()
        .map(String::from)
        .collect()
    }
    pub fn text_column() -> String {
        "desc".into()
    }

    // Checkpoint defaults
    pub fn save_threshold() -> usize {
        10
    }
    pub fn backup_threshold() -> usize {
        100
    }

    // Related crawl defaults
    pub fn fetched() -> String {
        "fetched_election_videos.jsonl.zst".into()
    }
    pub fn related() -> String {
        "related_election_videos.jsonl.zst".into()
    }
    pub fn backup_fetched() -> String {
        "backup_fetched_election_videos.jsonl.zst".into()
    }
    pub fn backup_related() -> String {
        "backup_related_election_videos.jsonl.zst".into()
    }

    // Account defaults
    pub fn handle_column() -> String {
        "Tiktok".into()
    }
    pub fn default_since() -> NaiveDate {
        NaiveDate::from_ymd_opt(2022, 1, 1).unwrap_or_default()
    }
    pub fn max_videos() -> usize {
        1000
    }

    // Download defaults
    pub fn output_dir() -> String {
        "mp4s".into()
    }
    pub fn batch_size() -> usize {
        20
    }

    // Report defaults
    pub fn accounts_file() -> String {
        "election_accounts.csv".into()
    }
    pub fn accounts_limit() -> usize {
        200
    }
    pub fn timeline_file() -> String {
        "ai_timeline.csv".into()
    }
    pub fn timeline_since_year() -> i32 {
        2025
    }
    pub fn top_n() -> usize {
        10
    }
}
