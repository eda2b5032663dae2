//! vidcrawl CLI
//!
//! Every command works inside one storage directory holding `config.toml`,
//! `manifest.toml`, the snapshots and the seed lists.

use std::path::PathBuf;

use clap::{Parser, Subcommand};
use vidcrawl::{
    config,
    error::Result,
    pipeline::{self, collect, report},
    services::WebClient,
    storage::LocalStorage,
};

/// vidcrawl - short-video metadata crawler
#[derive(Parser, Debug)]
#[command(
    name = "vidcrawl",
    version,
    about = "Resumable short-video metadata crawler"
)]
struct Cli {
    /// Path to storage directory containing config, manifest and snapshots
    #[arg(short, long, default_value = "storage")]
    storage_dir: PathBuf,

    /// Enable verbose logging
    #[arg(short, long)]
    verbose: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Crawl related videos from the hashtag collections
    Related,

    /// Collect new videos of the seeded accounts
    Users,

    /// Download video payloads of a collection
    Download {
        /// Collection name (default: download.collection)
        #[arg(long)]
        collection: Option<String>,
    },

    /// Collect videos listed under a hashtag
    Hashtag {
        name: String,

        #[arg(long, default_value_t = collect::DEFAULT_COUNT)]
        count: usize,
    },

    /// Collect videos returned by a search query
    Search {
        query: String,

        #[arg(long, default_value_t = collect::DEFAULT_COUNT)]
        count: usize,
    },

    /// Produce a report
    Report {
        #[command(subcommand)]
        kind: ReportKind,
    },

    /// Validate configuration files
    Validate,

    /// Show snapshot status
    Info,
}

#[derive(Subcommand, Debug)]
enum ReportKind {
    /// Leaderboard of accounts posting topic videos
    Accounts,
    /// Top accounts of the fetched store by each metric
    Stats,
    /// Fortnightly share of AI-labelled videos
    Timeline,
}

/// Initialize logging based on verbosity flag.
fn init_logging(verbose: bool) {
    let level = if verbose { "debug" } else { "info" };
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(level))
        .format_timestamp_secs()
        .init();
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    init_logging(cli.verbose);

    if let Command::Validate = cli.command {
        return pipeline::run_validate(&cli.storage_dir);
    }

    let (config, manifest) = config::load_all(&cli.storage_dir)?;
    log::info!("Loaded configuration from {}", cli.storage_dir.display());
    let storage = LocalStorage::new(&cli.storage_dir);

    match cli.command {
        Command::Related => {
            let client = WebClient::new(&config.crawler)?;
            pipeline::run_related(&config, &manifest, &storage, &client).await?;
        }

        Command::Users => {
            let client = WebClient::new(&config.crawler)?;
            pipeline::run_users(&config, &manifest, &storage, &client).await?;
        }

        Command::Download { collection } => {
            let client = WebClient::new(&config.crawler)?;
            pipeline::run_download(&config, &manifest, &storage, &client, collection.as_deref())
                .await?;
        }

        Command::Hashtag { name, count } => {
            let client = WebClient::new(&config.crawler)?;
            pipeline::run_hashtag(&manifest, &storage, &client, &name, count).await?;
        }

        Command::Search { query, count } => {
            let client = WebClient::new(&config.crawler)?;
            pipeline::run_search(&manifest, &storage, &client, &query, count).await?;
        }

        Command::Report { kind } => match kind {
            ReportKind::Accounts => {
                report::run_accounts_report(&config, &manifest, &storage).await?;
            }
            ReportKind::Stats => {
                report::run_stats_report(&config, &storage).await?;
            }
            ReportKind::Timeline => {
                report::run_timeline_report(&config, &manifest, &storage).await?;
            }
        },

        Command::Validate => {}

        Command::Info => {
            log::info!("Storage directory: {}", cli.storage_dir.display());
            pipeline::run_info(&config, &manifest, &storage).await?;
        }
    }

    Ok(())
}
