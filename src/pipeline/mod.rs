//! Pipeline entry points for crawler operations.
//!
//! - `run_related`: keyword-filtered related-video crawl from hashtag seeds
//! - `run_users`: incremental collection of seeded accounts' videos
//! - `run_download`: video payload download for one collection
//! - `run_hashtag` / `run_search`: collectors feeding the collections
//! - `report`: leaderboard, stats and AI-label timeline exports

pub mod checkpoint;
pub mod collect;
pub mod download;
pub mod filter;
pub mod queue;
pub mod related;
pub mod report;
pub mod users;
pub mod validate;

pub use checkpoint::{Checkpoint, FlushPlan};
pub use collect::{run_hashtag, run_search};
pub use download::run_download;
pub use filter::KeywordFilter;
pub use queue::{FetchQueue, QueueEntry};
pub use related::{CrawlPhase, CrawlSummary, RelatedCrawler, StepOutcome, run_related};
pub use users::{UserCollector, run_users};
pub use validate::{run_info, run_validate};
