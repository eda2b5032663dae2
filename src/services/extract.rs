//! Pulls records out of platform pages and API bodies.
//!
//! Video and profile pages embed their state as JSON in a rehydration
//! `<script>` element. List endpoints answer with `itemList`/`item_list`
//! bodies and a cursor.

use scraper::{Html, Selector};
use serde_json::Value;

use crate::error::{AppError, Result};
use crate::models::Record;
use crate::models::record::key_text;
use crate::services::VideoPage;

const REHYDRATION_SELECTOR: &str = "script#__UNIVERSAL_DATA_FOR_REHYDRATION__";
const DEFAULT_SCOPE: &str = "__DEFAULT_SCOPE__";
const VIDEO_DETAIL_KEY: &str = "webapp.video-detail";
const USER_DETAIL_KEY: &str = "webapp.user-detail";

// Markers around the video detail object when the script cannot be located.
const VIDEO_DETAIL_START: &str = "\"webapp.video-detail\":";
const VIDEO_DETAIL_END: &str = ",\"webapp.a-b\":";

/// The `__DEFAULT_SCOPE__` object embedded in a page.
pub fn default_scope(html: &str) -> Result<Value> {
    let document = Html::parse_document(html);
    let selector = Selector::parse(REHYDRATION_SELECTOR)
        .map_err(|e| AppError::selector(REHYDRATION_SELECTOR, format!("{e:?}")))?;

    let script = document
        .select(&selector)
        .next()
        .ok_or_else(|| AppError::extract("rehydration script not found in page"))?;
    let text: String = script.text().collect();

    let mut data: Value = serde_json::from_str(text.trim())?;
    data.get_mut(DEFAULT_SCOPE)
        .map(Value::take)
        .ok_or_else(|| AppError::extract(format!("{DEFAULT_SCOPE} missing from rehydration data")))
}

/// Video record from a video page.
pub fn video_detail(html: &str) -> Result<Record> {
    let detail = match default_scope(html) {
        Ok(mut scope) => scope.get_mut(VIDEO_DETAIL_KEY).map(Value::take),
        Err(e) => {
            log::debug!("Falling back to marker extraction: {}", e);
            None
        }
    };
    let detail = match detail {
        Some(detail) => detail,
        None => slice_video_detail(html)?,
    };

    check_status(&detail, "video detail")?;
    detail
        .pointer("/itemInfo/itemStruct")
        .cloned()
        .and_then(Record::from_value)
        .ok_or_else(|| AppError::extract("video detail has no itemInfo.itemStruct"))
}

/// Account record (`user` plus `stats`) from a profile page.
pub fn user_detail(html: &str) -> Result<Record> {
    let mut scope = default_scope(html)?;
    let detail = scope
        .get_mut(USER_DETAIL_KEY)
        .map(Value::take)
        .ok_or_else(|| AppError::extract(format!("{USER_DETAIL_KEY} missing from page")))?;

    check_status(&detail, "user detail")?;
    detail
        .get("userInfo")
        .cloned()
        .and_then(Record::from_value)
        .ok_or_else(|| AppError::extract("user detail has no userInfo"))
}

fn slice_video_detail(html: &str) -> Result<Value> {
    let start = html
        .find(VIDEO_DETAIL_START)
        .ok_or_else(|| AppError::extract("video detail marker not found in page"))?
        + VIDEO_DETAIL_START.len();
    let rest = &html[start..];
    let end = rest
        .find(VIDEO_DETAIL_END)
        .ok_or_else(|| AppError::extract("video detail end marker not found in page"))?;
    Ok(serde_json::from_str(&rest[..end])?)
}

/// Fail when the platform reports a non-zero status code.
pub fn check_status(body: &Value, context: &str) -> Result<()> {
    let code = body
        .get("statusCode")
        .or_else(|| body.get("status_code"))
        .and_then(Value::as_i64)
        .unwrap_or(0);
    if code == 0 {
        Ok(())
    } else {
        let message = body
            .get("statusMsg")
            .or_else(|| body.get("status_msg"))
            .and_then(Value::as_str)
            .unwrap_or("no message");
        Err(AppError::fetch(
            context,
            format!("platform status {code}: {message}"),
        ))
    }
}

/// Records and paging state of a list endpoint body.
pub fn item_list(body: &Value, context: &str) -> Result<VideoPage> {
    check_status(body, context)?;

    let items = body
        .get("itemList")
        .or_else(|| body.get("item_list"))
        .and_then(Value::as_array)
        .map(|items| items.iter().cloned().filter_map(Record::from_value).collect())
        .unwrap_or_default();
    let cursor = body
        .get("cursor")
        .and_then(key_text)
        .unwrap_or_else(|| "0".to_string());
    let has_more = match body.get("hasMore").or_else(|| body.get("has_more")) {
        Some(Value::Bool(more)) => *more,
        Some(Value::Number(n)) => n.as_i64().unwrap_or(0) != 0,
        _ => false,
    };

    Ok(VideoPage {
        items,
        cursor,
        has_more,
    })
}

/// Media address of a video record: the download address, else the play address.
pub fn media_address(video: &Record) -> Option<String> {
    ["downloadAddr", "playAddr"]
        .into_iter()
        .filter_map(|key| video.field(&["video", key]))
        .filter_map(Value::as_str)
        .find(|addr| !addr.is_empty())
        .map(str::to_string)
}
