//! Snapshot encoding: zstd-compressed JSON Lines.

use std::io::Write;

use crate::error::{AppError, Result};
use crate::models::Record;
use crate::table::Table;

/// zstd compression level for snapshot files.
const LEVEL: i32 = 3;

/// Encode a table, one JSON object per line.
pub fn encode(table: &Table, label: &str) -> Result<Vec<u8>> {
    let mut lines = Vec::new();
    for row in table {
        serde_json::to_writer(&mut lines, row)?;
        lines.push(b'\n');
    }

    let mut encoder = zstd::stream::Encoder::new(Vec::new(), LEVEL)
        .map_err(|e| AppError::snapshot(label, e))?;
    encoder
        .write_all(&lines)
        .map_err(|e| AppError::snapshot(label, e))?;
    encoder.finish().map_err(|e| AppError::snapshot(label, e))
}

/// Decode a snapshot. Any truncation or malformed line is an error.
pub fn decode(bytes: &[u8], label: &str) -> Result<Table> {
    let raw = zstd::decode_all(bytes).map_err(|e| AppError::snapshot(label, e))?;
    let text = std::str::from_utf8(&raw).map_err(|e| AppError::snapshot(label, e))?;

    let mut rows = Vec::new();
    for (line_no, line) in text.lines().enumerate() {
        if line.trim().is_empty() {
            continue;
        }
        let row: Record = serde_json::from_str(line)
            .map_err(|e| AppError::snapshot(label, format!("line {}: {}", line_no + 1, e)))?;
        rows.push(row);
    }
    Ok(Table::from_rows(rows))
}
