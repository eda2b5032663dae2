// src/services/web.rs

//! Scraping client backed by the platform's public web pages and JSON
//! endpoints.

use std::collections::HashMap;
use std::sync::Mutex;

use async_trait::async_trait;
use reqwest::Client;
use reqwest::header::{RANGE, REFERER};
use serde_json::Value;
use url::Url;

use crate::error::{AppError, Result};
use crate::models::{CrawlerConfig, Record};
use crate::models::record::key_text;
use crate::services::{ScrapeClient, VideoPage, extract};
use crate::utils::http::create_async_client;

/// Web application id sent with every JSON request.
const APP_ID: &str = "1988";
const RELATED_COUNT: &str = "16";
const POSTS_PAGE_SIZE: &str = "35";
const LIST_PAGE_SIZE: usize = 30;

/// Live client for the platform.
pub struct WebClient {
    client: Client,
    base_url: Url,
    ms_token: Option<String>,
    /// Handle -> secUid, filled by profile lookups
    sec_uids: Mutex<HashMap<String, String>>,
}

impl WebClient {
    /// Build the client. Fails when the HTTP client cannot be constructed.
    pub fn new(config: &CrawlerConfig) -> Result<Self> {
        let client = create_async_client(config)?;
        let base_url = Url::parse(&config.base_url)?;
        Ok(Self {
            client,
            base_url,
            ms_token: config.ms_token.clone().filter(|t| !t.is_empty()),
            sec_uids: Mutex::new(HashMap::new()),
        })
    }

    fn page_url(&self, path: &str) -> Result<Url> {
        Ok(self.base_url.join(path)?)
    }

    fn api_url(&self, path: &str, params: &[(&str, &str)]) -> Result<Url> {
        let mut url = self.base_url.join(path)?;
        {
            let mut query = url.query_pairs_mut();
            query.append_pair("aid", APP_ID);
            for (key, value) in params {
                query.append_pair(key, value);
            }
            if let Some(token) = &self.ms_token {
                query.append_pair("msToken", token);
            }
        }
        Ok(url)
    }

    async fn get_text(&self, url: Url, context: &str) -> Result<String> {
        let response = self.client.get(url).send().await?;
        let status = response.status();
        if !status.is_success() {
            return Err(AppError::fetch(context, format!("HTTP {status}")));
        }
        Ok(response.text().await?)
    }

    async fn get_json(&self, url: Url, context: &str) -> Result<Value> {
        let text = self.get_text(url, context).await?;
        if text.trim().is_empty() {
            return Err(AppError::fetch(context, "empty response body"));
        }
        Ok(serde_json::from_str(&text)?)
    }

    fn cached_sec_uid(&self, handle: &str) -> Option<String> {
        self.sec_uids
            .lock()
            .ok()
            .and_then(|cache| cache.get(handle).cloned())
    }

    fn remember_sec_uid(&self, handle: &str, user: &Record) {
        let Some(sec_uid) = user.field(&["user", "secUid"]).and_then(key_text) else {
            return;
        };
        if let Ok(mut cache) = self.sec_uids.lock() {
            cache.insert(handle.to_string(), sec_uid);
        }
    }

    async fn sec_uid(&self, handle: &str) -> Result<String> {
        if let Some(sec_uid) = self.cached_sec_uid(handle) {
            return Ok(sec_uid);
        }
        self.user_detail(handle).await?;
        self.cached_sec_uid(handle)
            .ok_or_else(|| AppError::extract(format!("profile of @{handle} has no secUid")))
    }

    /// Page a list endpoint until `count` records are collected or the
    /// endpoint runs dry.
    async fn collect_list(
        &self,
        path: &str,
        params: &[(&str, &str)],
        cursor_param: &str,
        count: usize,
        context: &str,
    ) -> Result<Vec<Record>> {
        let page_size = LIST_PAGE_SIZE.to_string();
        let mut cursor = "0".to_string();
        let mut records = Vec::new();

        while records.len() < count {
            let mut query = params.to_vec();
            query.push(("count", page_size.as_str()));
            query.push((cursor_param, cursor.as_str()));

            let body = self.get_json(self.api_url(path, &query)?, context).await?;
            let page = extract::item_list(&body, context)?;
            let exhausted = !page.has_more || page.items.is_empty();
            records.extend(page.items);
            if exhausted {
                break;
            }
            cursor = page.cursor;
        }

        records.truncate(count);
        Ok(records)
    }
}

#[async_trait]
impl ScrapeClient for WebClient {
    async fn video_detail(&self, author_id: &str, video_id: &str) -> Result<Record> {
        let url = self.page_url(&format!("@{author_id}/video/{video_id}"))?;
        let html = self.get_text(url, "video detail").await?;
        extract::video_detail(&html)
    }

    async fn related_videos(&self, video_id: &str) -> Result<Vec<Record>> {
        let url = self.api_url(
            "api/related/item_list/",
            &[("itemID", video_id), ("count", RELATED_COUNT)],
        )?;
        let body = self.get_json(url, "related videos").await?;
        Ok(extract::item_list(&body, "related videos")?.items)
    }

    async fn user_detail(&self, handle: &str) -> Result<Record> {
        let url = self.page_url(&format!("@{handle}"))?;
        let html = self.get_text(url, "user detail").await?;
        let user = extract::user_detail(&html)?;
        self.remember_sec_uid(handle, &user);
        Ok(user)
    }

    async fn user_videos_page(&self, handle: &str, cursor: &str) -> Result<VideoPage> {
        let sec_uid = self.sec_uid(handle).await?;
        let url = self.api_url(
            "api/post/item_list/",
            &[
                ("secUid", sec_uid.as_str()),
                ("cursor", cursor),
                ("count", POSTS_PAGE_SIZE),
            ],
        )?;
        let body = self.get_json(url, "user videos").await?;
        extract::item_list(&body, "user videos")
    }

    async fn video_bytes(&self, video: &Record) -> Result<Vec<u8>> {
        let id = video
            .id()
            .ok_or_else(|| AppError::validation("video record has no id"))?;

        // Visiting the page refreshes the media address and the cookies it needs.
        let fresh = match video.author_id() {
            Some(author) => match self.video_detail(&author, &id).await {
                Ok(detail) => Some(detail),
                Err(e) => {
                    log::debug!("Detail refresh for {} failed: {}", id, e);
                    None
                }
            },
            None => None,
        };
        let address = fresh
            .as_ref()
            .and_then(extract::media_address)
            .or_else(|| extract::media_address(video))
            .ok_or_else(|| AppError::extract(format!("video {id} has no media address")))?;

        let response = self
            .client
            .get(&address)
            .header(REFERER, self.base_url.as_str())
            .header(RANGE, "bytes=0-")
            .send()
            .await?;
        let status = response.status();
        if !status.is_success() {
            return Err(AppError::fetch("video bytes", format!("HTTP {status}")));
        }
        let bytes = response.bytes().await?;
        if bytes.is_empty() {
            return Err(AppError::fetch("video bytes", "empty payload"));
        }
        Ok(bytes.to_vec())
    }

    async fn hashtag_videos(&self, name: &str, count: usize) -> Result<Vec<Record>> {
        let url = self.api_url("api/challenge/detail/", &[("challengeName", name)])?;
        let detail = self.get_json(url, "hashtag detail").await?;
        extract::check_status(&detail, "hashtag detail")?;
        let challenge_id = detail
            .pointer("/challengeInfo/challenge/id")
            .and_then(key_text)
            .ok_or_else(|| AppError::extract(format!("hashtag #{name} not found")))?;

        self.collect_list(
            "api/challenge/item_list/",
            &[("challengeID", challenge_id.as_str())],
            "cursor",
            count,
            "hashtag videos",
        )
        .await
    }

    async fn search_videos(&self, query: &str, count: usize) -> Result<Vec<Record>> {
        self.collect_list(
            "api/search/item/full/",
            &[("keyword", query)],
            "offset",
            count,
            "search videos",
        )
        .await
    }
}
