//! In-memory tables of records with schema-relaxed merging.
//!
//! A `Table` is an ordered list of [`Record`]s. Columns are the union of the
//! keys present in any row; a row that lacks a column simply has no value for
//! it. [`merge`] concatenates two tables and reconciles conflicting column
//! kinds, [`Table::dedupe`] keeps one row per key.

mod schema;

use std::collections::{HashMap, HashSet};

use chrono::{DateTime, Utc};

use crate::models::{Record, record};

pub use schema::{ColumnKind, Schema, SchemaConflict};

/// An ordered collection of records.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Table {
    rows: Vec<Record>,
}

impl Table {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_rows(rows: Vec<Record>) -> Self {
        Self { rows }
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    pub fn rows(&self) -> &[Record] {
        &self.rows
    }

    pub fn iter(&self) -> std::slice::Iter<'_, Record> {
        self.rows.iter()
    }

    /// Union of column names across all rows.
    pub fn columns(&self) -> HashSet<String> {
        self.rows
            .iter()
            .flat_map(|row| row.columns().cloned())
            .collect()
    }

    pub fn schema(&self) -> Schema {
        Schema::infer(&self.rows)
    }

    /// Key values of the `id` column.
    pub fn ids(&self) -> HashSet<String> {
        self.rows.iter().filter_map(Record::id).collect()
    }

    pub fn retain(&mut self, keep: impl FnMut(&Record) -> bool) {
        self.rows.retain(keep);
    }

    /// Drop rows whose id is in `ids`.
    pub fn exclude_ids(&mut self, ids: &HashSet<String>) {
        if ids.is_empty() {
            return;
        }
        self.rows
            .retain(|row| row.id().is_none_or(|id| !ids.contains(&id)));
    }

    /// Keep one row per value of `key`.
    ///
    /// The survivor is the row with the latest scrape timestamp; ties go to
    /// the row seen last. It takes the position of the key's first occurrence.
    /// Rows without a key value are treated as one group.
    pub fn dedupe(self, key: &str) -> Table {
        let mut slots: HashMap<Option<String>, usize> = HashMap::new();
        let mut kept: Vec<Record> = Vec::with_capacity(self.rows.len());

        for row in self.rows {
            let value = row.key(key);
            match slots.get(&value) {
                Some(&slot) => {
                    if newer_or_equal(&row, &kept[slot]) {
                        kept[slot] = row;
                    }
                }
                None => {
                    slots.insert(value, kept.len());
                    kept.push(row);
                }
            }
        }

        Table { rows: kept }
    }

    /// Convenience for `dedupe("id")`.
    pub fn dedupe_by_id(self) -> Table {
        self.dedupe(record::ID)
    }
}

impl From<Vec<Record>> for Table {
    fn from(rows: Vec<Record>) -> Self {
        Self::from_rows(rows)
    }
}

impl FromIterator<Record> for Table {
    fn from_iter<I: IntoIterator<Item = Record>>(iter: I) -> Self {
        Self::from_rows(iter.into_iter().collect())
    }
}

impl IntoIterator for Table {
    type Item = Record;
    type IntoIter = std::vec::IntoIter<Record>;

    fn into_iter(self) -> Self::IntoIter {
        self.rows.into_iter()
    }
}

impl<'a> IntoIterator for &'a Table {
    type Item = &'a Record;
    type IntoIter = std::slice::Iter<'a, Record>;

    fn into_iter(self) -> Self::IntoIter {
        self.rows.iter()
    }
}

fn newer_or_equal(candidate: &Record, current: &Record) -> bool {
    let stamp = |r: &Record| r.scrape_date().unwrap_or(DateTime::<Utc>::MIN_UTC);
    stamp(candidate) >= stamp(current)
}

/// Concatenate two tables, reconciling column kinds.
///
/// The relaxed path widens compatible scalars. When the two schemas carry an
/// irreconcilable column (nested against scalar), the row-wise path infers
/// one schema over every row of both tables and renders scalar conflicts as
/// text. Nested values are never rewritten.
/// The result always has `existing.len() + incoming.len()` rows and the union
/// of both column sets.
pub fn merge(existing: Table, incoming: Table) -> Table {
    if incoming.is_empty() {
        return existing;
    }
    if existing.is_empty() {
        return incoming;
    }

    let schema = match existing.schema().relaxed_union(&incoming.schema()) {
        Ok(schema) => schema,
        Err(conflict) => {
            log::debug!(
                "Schema conflict on column '{}' ({:?} vs {:?}); merging row-wise",
                conflict.column,
                conflict.left,
                conflict.right
            );
            Schema::infer(existing.rows.iter().chain(incoming.rows.iter()))
        }
    };

    let mut rows = existing.rows;
    rows.extend(incoming.rows);
    for row in &mut rows {
        schema.coerce(row);
    }
    Table { rows }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use serde_json::{Value, json};

    fn row(value: Value) -> Record {
        Record::from_value(value).unwrap()
    }

    fn table(values: Vec<Value>) -> Table {
        values.into_iter().map(row).collect()
    }

    #[test]
    fn test_merge_diagonal_columns() {
        let a = table(vec![json!({"id": "1", "desc": "a"}), json!({"id": "2", "desc": "b"})]);
        let b = table(vec![json!({"id": "3", "aigcLabelType": "1"})]);

        let merged = merge(a, b);

        assert_eq!(merged.len(), 3);
        let columns = merged.columns();
        assert!(columns.contains("desc"));
        assert!(columns.contains("aigcLabelType"));
        assert!(merged.rows()[2].get("desc").is_none());
    }

    #[test]
    fn test_merge_falls_back_on_nested_conflict() {
        let a = table(vec![json!({"id": "1", "author": {"uniqueId": "alice"}})]);
        let b = table(vec![
            json!({"id": "2", "author": "bob"}),
            json!({"id": "3", "stats": {"playCount": 4}}),
        ]);

        let merged = merge(a, b);

        assert_eq!(merged.len(), 3);
        assert_eq!(merged.columns().len(), 3);
        assert_eq!(merged.rows()[1].get("author"), Some(&json!("bob")));
        assert!(merged.rows()[0].get("author").unwrap().is_object());
    }

    #[test]
    fn test_author_survives_nested_conflict_and_later_merge() {
        let stored = table(vec![
            json!({"id": "1", "author": {"uniqueId": "alice", "nickname": "alice"}}),
            json!({"id": "2", "author": {"uniqueId": "bob", "nickname": "bob"}}),
        ]);
        let listed = table(vec![json!({"id": "3", "author": "carol"})]);
        let merged = merge(stored, listed);

        let fresh = table(vec![json!({"id": "4", "author": {"uniqueId": "dave"}})]);
        let merged = merge(merged, fresh);

        let authors: Vec<_> = merged.iter().filter_map(Record::author_id).collect();
        assert_eq!(authors, vec!["alice", "bob", "carol", "dave"]);
    }

    #[test]
    fn test_merge_with_empty_side() {
        let a = table(vec![json!({"id": "1"})]);
        assert_eq!(merge(a.clone(), Table::new()), a);
        assert_eq!(merge(Table::new(), a.clone()), a);
    }

    #[test]
    fn test_dedupe_latest_scrape_wins() {
        let early = Utc.with_ymd_and_hms(2025, 4, 1, 0, 0, 0).unwrap();
        let late = Utc.with_ymd_and_hms(2025, 4, 2, 0, 0, 0).unwrap();

        let mut first = row(json!({"id": "1", "desc": "new"}));
        first.tag_scraped(late);
        let mut second = row(json!({"id": "1", "desc": "old"}));
        second.tag_scraped(early);
        let other = row(json!({"id": "2"}));

        let deduped = Table::from_rows(vec![first, other, second]).dedupe_by_id();

        assert_eq!(deduped.len(), 2);
        assert_eq!(deduped.rows()[0].desc(), Some("new"));
        assert_eq!(deduped.rows()[1].id().as_deref(), Some("2"));
    }

    #[test]
    fn test_dedupe_tie_keeps_last_seen() {
        let t = table(vec![
            json!({"id": "1", "desc": "first"}),
            json!({"id": "1", "desc": "second"}),
        ]);
        let deduped = t.dedupe_by_id();
        assert_eq!(deduped.len(), 1);
        assert_eq!(deduped.rows()[0].desc(), Some("second"));
    }

    #[test]
    fn test_self_merge_then_dedupe_is_idempotent() {
        let a = table(vec![
            json!({"id": "1", "desc": "x"}),
            json!({"id": "2", "desc": "y"}),
            json!({"id": "2", "desc": "z"}),
        ]);
        let once = a.clone().dedupe_by_id();
        let twice = merge(a.clone(), a).dedupe_by_id();
        assert_eq!(once, twice);
    }

    #[test]
    fn test_exclude_ids() {
        let mut t = table(vec![json!({"id": "1"}), json!({"id": "2"}), json!({"desc": "no id"})]);
        t.exclude_ids(&HashSet::from(["1".to_string()]));
        assert_eq!(t.len(), 2);
        assert!(!t.ids().contains("1"));
    }
}
