//! Service layer for the crawler application.
//!
//! - `ScrapeClient`: the seam every crawl loop fetches through
//! - `WebClient`: the live implementation over the platform's web pages
//! - `extract`: parsing of embedded page data and list bodies

mod client;
pub mod extract;
mod web;

pub use client::{ScrapeClient, VideoPage, user_videos};
pub use web::WebClient;
