// src/models/mod.rs

//! Domain models for the crawler application.

pub mod config;
pub mod manifest;
pub mod record;

// Re-export all public types
pub use config::{
    CheckpointConfig, Config, CrawlSettings, CrawlerConfig, DownloadConfig, RelatedConfig,
    ReportConfig, TopicConfig, UsersConfig,
};
pub use manifest::{Collection, CollectionKind, Manifest};
pub use record::{AiLabel, Record};
