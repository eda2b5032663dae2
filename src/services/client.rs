//! Scraping client seam.

use std::collections::VecDeque;

use async_trait::async_trait;
use futures::stream::{self, Stream};

use crate::error::Result;
use crate::models::Record;

/// One page of an account's videos.
#[derive(Debug, Clone, Default)]
pub struct VideoPage {
    pub items: Vec<Record>,
    /// Cursor to request the following page with
    pub cursor: String,
    pub has_more: bool,
}

/// Everything the crawl loops need from the platform.
///
/// Every call is fallible and none retry on their own.
#[async_trait]
pub trait ScrapeClient: Send + Sync {
    /// Full detail of one video.
    async fn video_detail(&self, author_id: &str, video_id: &str) -> Result<Record>;

    /// Videos the platform recommends next to `video_id`.
    async fn related_videos(&self, video_id: &str) -> Result<Vec<Record>>;

    /// Profile and stats of an account.
    async fn user_detail(&self, handle: &str) -> Result<Record>;

    /// One page of an account's videos, newest first. The first page is
    /// requested with cursor `"0"`.
    async fn user_videos_page(&self, handle: &str, cursor: &str) -> Result<VideoPage>;

    /// Raw video payload.
    async fn video_bytes(&self, video: &Record) -> Result<Vec<u8>>;

    /// Up to `count` videos listed under a hashtag.
    async fn hashtag_videos(&self, name: &str, count: usize) -> Result<Vec<Record>>;

    /// Up to `count` videos returned by a search query.
    async fn search_videos(&self, query: &str, count: usize) -> Result<Vec<Record>>;
}

/// Lazily page through an account's videos, newest first.
///
/// Pages are requested only as the stream is polled, so a consumer that stops
/// early never fetches the rest. A page error is yielded once and ends the
/// stream.
pub fn user_videos<'a, C>(
    client: &'a C,
    handle: &'a str,
) -> impl Stream<Item = Result<Record>> + Send + 'a
where
    C: ScrapeClient + ?Sized,
{
    struct Pager {
        cursor: String,
        buffer: VecDeque<Record>,
        exhausted: bool,
    }

    let start = Pager {
        cursor: "0".to_string(),
        buffer: VecDeque::new(),
        exhausted: false,
    };

    stream::unfold(start, move |mut pager| async move {
        loop {
            if let Some(item) = pager.buffer.pop_front() {
                return Some((Ok(item), pager));
            }
            if pager.exhausted {
                return None;
            }
            match client.user_videos_page(handle, &pager.cursor).await {
                Ok(page) => {
                    pager.exhausted = !page.has_more || page.items.is_empty();
                    pager.cursor = page.cursor;
                    pager.buffer.extend(page.items);
                }
                Err(e) => {
                    pager.exhausted = true;
                    return Some((Err(e), pager));
                }
            }
        }
    })
}
