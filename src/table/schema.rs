//! Column kinds and schema reconciliation.
//!
//! Two supertype rules exist. The relaxed rule widens compatible scalars and
//! refuses to mix nested and scalar columns; the unified rule always succeeds
//! by collapsing any conflict to text. Coercion only ever rewrites scalars:
//! a list or struct value is kept as it is whatever the column kind.

use std::collections::BTreeMap;

use serde_json::Value;

use crate::models::Record;

/// Kind of a top-level column value.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum ColumnKind {
    Null,
    Bool,
    Int,
    Float,
    Str,
    List,
    Struct,
}

impl ColumnKind {
    pub fn of(value: &Value) -> Self {
        match value {
            Value::Null => ColumnKind::Null,
            Value::Bool(_) => ColumnKind::Bool,
            Value::Number(n) if n.is_f64() => ColumnKind::Float,
            Value::Number(_) => ColumnKind::Int,
            Value::String(_) => ColumnKind::Str,
            Value::Array(_) => ColumnKind::List,
            Value::Object(_) => ColumnKind::Struct,
        }
    }

    fn is_scalar(self) -> bool {
        matches!(
            self,
            ColumnKind::Bool | ColumnKind::Int | ColumnKind::Float | ColumnKind::Str
        )
    }

    /// Relaxed supertype, or `None` when the kinds cannot be reconciled.
    pub fn relaxed(self, other: Self) -> Option<Self> {
        use ColumnKind::*;
        match (self, other) {
            (a, b) if a == b => Some(a),
            (Null, x) | (x, Null) => Some(x),
            (Int, Float) | (Float, Int) => Some(Float),
            (Bool, Int) | (Int, Bool) => Some(Int),
            (a, b) if a.is_scalar() && b.is_scalar() => Some(Str),
            _ => None,
        }
    }

    /// Total supertype: conflicts fall back to text.
    pub fn unified(self, other: Self) -> Self {
        self.relaxed(other).unwrap_or(ColumnKind::Str)
    }
}

/// Two tables disagree on a column in a way the relaxed rule rejects.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SchemaConflict {
    pub column: String,
    pub left: ColumnKind,
    pub right: ColumnKind,
}

/// Column name to kind, in column-name order.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Schema {
    columns: BTreeMap<String, ColumnKind>,
}

impl Schema {
    /// Infer the schema of a set of rows with the total rule.
    pub fn infer<'a>(rows: impl IntoIterator<Item = &'a Record>) -> Self {
        let mut columns: BTreeMap<String, ColumnKind> = BTreeMap::new();
        for row in rows {
            for (name, value) in row.as_map() {
                let kind = ColumnKind::of(value);
                columns
                    .entry(name.clone())
                    .and_modify(|existing| *existing = existing.unified(kind))
                    .or_insert(kind);
            }
        }
        Self { columns }
    }

    /// Union two schemas with the relaxed rule.
    pub fn relaxed_union(&self, other: &Schema) -> Result<Schema, SchemaConflict> {
        let mut columns = self.columns.clone();
        for (name, &right) in &other.columns {
            match columns.get(name).copied() {
                Some(left) => {
                    let kind = left.relaxed(right).ok_or_else(|| SchemaConflict {
                        column: name.clone(),
                        left,
                        right,
                    })?;
                    columns.insert(name.clone(), kind);
                }
                None => {
                    columns.insert(name.clone(), right);
                }
            }
        }
        Ok(Schema { columns })
    }

    pub fn get(&self, column: &str) -> Option<ColumnKind> {
        self.columns.get(column).copied()
    }

    /// Rewrite a row's scalar values so they match the schema.
    ///
    /// Absent columns stay absent and nested values stay verbatim.
    pub fn coerce(&self, row: &mut Record) {
        for (name, value) in row.as_map_mut().iter_mut() {
            if let Some(kind) = self.columns.get(name) {
                coerce_value(value, *kind);
            }
        }
    }
}

fn coerce_value(value: &mut Value, kind: ColumnKind) {
    let current = ColumnKind::of(value);
    if current == kind || !current.is_scalar() {
        return;
    }
    let replacement = match (kind, &*value) {
        (ColumnKind::Float, Value::Number(n)) => n
            .as_f64()
            .and_then(serde_json::Number::from_f64)
            .map(Value::Number),
        (ColumnKind::Int, Value::Bool(b)) => Some(Value::from(i64::from(*b))),
        (ColumnKind::Str, Value::String(_)) => None,
        (ColumnKind::Str, Value::Number(n)) => Some(Value::String(n.to_string())),
        (ColumnKind::Str, Value::Bool(b)) => Some(Value::String(b.to_string())),
        _ => None,
    };
    if let Some(replacement) = replacement {
        *value = replacement;
    }
}
