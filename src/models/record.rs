//! Video record data structure.
//!
//! Records are kept exactly as the platform returns them: a JSON object with
//! nested `author`, `authorStats`, `stats` and `video` structures. Columns the
//! crawler relies on are read through typed accessors; everything else rides
//! along untouched so snapshots never lose fields.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// Unique key column.
pub const ID: &str = "id";
/// Free-text description column.
pub const DESC: &str = "desc";
/// Scrape timestamp column added by the crawler.
pub const SCRAPE_DATE: &str = "scrape_date";

/// A single fetched item (video, or user detail for account lookups).
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Record(Map<String, Value>);

impl Record {
    pub fn new() -> Self {
        Self(Map::new())
    }

    /// Wrap a JSON value, returning `None` unless it is an object.
    pub fn from_value(value: Value) -> Option<Self> {
        match value {
            Value::Object(map) => Some(Self(map)),
            _ => None,
        }
    }

    pub fn get(&self, column: &str) -> Option<&Value> {
        self.0.get(column)
    }

    /// Walk nested objects, e.g. `["author", "uniqueId"]`.
    pub fn field(&self, path: &[&str]) -> Option<&Value> {
        let (first, rest) = path.split_first()?;
        let mut value = self.0.get(*first)?;
        for key in rest {
            value = value.as_object()?.get(*key)?;
        }
        Some(value)
    }

    pub fn insert(&mut self, column: impl Into<String>, value: Value) -> Option<Value> {
        self.0.insert(column.into(), value)
    }

    pub fn remove(&mut self, column: &str) -> Option<Value> {
        self.0.remove(column)
    }

    pub fn columns(&self) -> impl Iterator<Item = &String> {
        self.0.keys()
    }

    pub fn as_map(&self) -> &Map<String, Value> {
        &self.0
    }

    pub fn as_map_mut(&mut self) -> &mut Map<String, Value> {
        &mut self.0
    }

    pub fn into_map(self) -> Map<String, Value> {
        self.0
    }

    /// Key text of a column, used for dedupe and membership checks.
    pub fn key(&self, column: &str) -> Option<String> {
        self.0.get(column).and_then(key_text)
    }

    pub fn id(&self) -> Option<String> {
        self.key(ID)
    }

    /// Account handle of the author.
    ///
    /// Accepts the derived `author_id` column, the nested `author.uniqueId`,
    /// or a bare string `author` as some list endpoints return.
    pub fn author_id(&self) -> Option<String> {
        self.key("author_id")
            .or_else(|| self.field(&["author", "uniqueId"]).and_then(key_text))
            .or_else(|| self.0.get("author").and_then(Value::as_str).map(str::to_string))
    }

    pub fn text(&self, column: &str) -> Option<&str> {
        self.0.get(column).and_then(Value::as_str)
    }

    pub fn desc(&self) -> Option<&str> {
        self.text(DESC)
    }

    /// Creation time in epoch seconds.
    pub fn create_time(&self) -> Option<i64> {
        self.0.get("createTime").and_then(as_i64)
    }

    pub fn scrape_date(&self) -> Option<DateTime<Utc>> {
        self.text(SCRAPE_DATE)
            .and_then(|s| DateTime::parse_from_rfc3339(s).ok())
            .map(|dt| dt.with_timezone(&Utc))
    }

    /// Stamp the record with the time it was scraped.
    pub fn tag_scraped(&mut self, at: DateTime<Utc>) {
        self.0
            .insert(SCRAPE_DATE.to_string(), Value::String(at.to_rfc3339()));
    }

    /// Whether the item is pinned on its author's profile.
    pub fn is_pinned(&self) -> bool {
        match self.0.get("isPinnedItem") {
            Some(Value::Bool(pinned)) => *pinned,
            Some(Value::String(s)) => s.eq_ignore_ascii_case("true"),
            _ => false,
        }
    }

    pub fn ai_label(&self) -> AiLabel {
        AiLabel::from_value(self.0.get("aigcLabelType"))
    }

    /// Follower count from whichever stats structure the record carries.
    pub fn follower_count(&self) -> Option<u64> {
        self.field(&["authorStats", "followerCount"])
            .or_else(|| self.field(&["stats", "followerCount"]))
            .or_else(|| self.0.get("followerCount"))
            .and_then(as_u64)
    }

    /// Video duration in seconds, if the record has video metadata.
    pub fn video_duration(&self) -> Option<f64> {
        self.field(&["video", "duration"]).and_then(|v| match v {
            Value::Number(n) => n.as_f64(),
            Value::String(s) => s.parse().ok(),
            _ => None,
        })
    }
}

impl From<Map<String, Value>> for Record {
    fn from(map: Map<String, Value>) -> Self {
        Self(map)
    }
}

/// AI-generated content label attached by the platform or the uploader.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AiLabel {
    Untagged,
    /// Code "1": the uploader declared the content AI-generated.
    UserTagged,
    /// Code "2": the platform flagged the content as AI-generated.
    PlatformTagged,
}

impl AiLabel {
    pub fn from_value(value: Option<&Value>) -> Self {
        match value.and_then(key_text).as_deref() {
            Some("1") => AiLabel::UserTagged,
            Some("2") => AiLabel::PlatformTagged,
            _ => AiLabel::Untagged,
        }
    }
}

/// Text form of a scalar used as a key. Numbers compare by decimal text.
pub fn key_text(value: &Value) -> Option<String> {
    match value {
        Value::String(s) => Some(s.clone()),
        Value::Number(n) => Some(n.to_string()),
        Value::Bool(b) => Some(b.to_string()),
        _ => None,
    }
}

pub(crate) fn as_i64(value: &Value) -> Option<i64> {
    match value {
        Value::Number(n) => n.as_i64().or_else(|| n.as_f64().map(|f| f as i64)),
        Value::String(s) => s.trim().parse().ok(),
        _ => None,
    }
}

pub(crate) fn as_u64(value: &Value) -> Option<u64> {
    match value {
        Value::Number(n) => n.as_u64().or_else(|| n.as_f64().map(|f| f.max(0.0) as u64)),
        Value::String(s) => s.trim().parse().ok(),
        _ => None,
    }
}
