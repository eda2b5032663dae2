//! Keyword/hashtag topic filter.

use std::collections::BTreeSet;

use crate::models::Record;
use crate::table::Table;

/// Case-insensitive substring match against a set of topic keywords.
///
/// A text matches when its lower-cased form contains any keyword. Missing
/// text never matches, and an empty keyword set matches nothing.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct KeywordFilter {
    keywords: BTreeSet<String>,
    column: String,
}

impl KeywordFilter {
    /// Build a filter over the `desc` column.
    pub fn new<I, S>(keywords: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        Self::with_column(keywords, crate::models::record::DESC)
    }

    pub fn with_column<I, S>(keywords: I, column: impl Into<String>) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let keywords = keywords
            .into_iter()
            .map(|k| k.as_ref().trim().to_lowercase())
            .filter(|k| !k.is_empty())
            .collect();
        Self {
            keywords,
            column: column.into(),
        }
    }

    pub fn keywords(&self) -> &BTreeSet<String> {
        &self.keywords
    }

    pub fn column(&self) -> &str {
        &self.column
    }

    pub fn matches_text(&self, text: Option<&str>) -> bool {
        let Some(text) = text else {
            return false;
        };
        let lowered = text.to_lowercase();
        self.keywords.iter().any(|k| lowered.contains(k.as_str()))
    }

    pub fn matches(&self, record: &Record) -> bool {
        self.matches_text(record.text(&self.column))
    }

    /// Rows of `table` whose text matches.
    pub fn apply(&self, table: Table) -> Table {
        table.into_iter().filter(|r| self.matches(r)).collect()
    }

    pub fn retain(&self, table: &mut Table) {
        table.retain(|r| self.matches(r));
    }
}
