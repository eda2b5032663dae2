// src/utils/log.rs

//! Console run reports.
//!
//! Diagnostics go through the `log` facade. This module prints the
//! human-facing side of a run: section headers, progress lines and closing
//! summaries. Output follows the facade's level, so `RUST_LOG=warn` keeps a
//! run quiet.

use chrono::Local;
use log::Level;

const RULE_WIDTH: usize = 60;

fn enabled(level: Level) -> bool {
    level <= log::max_level()
}

fn stamp(level: Level, message: &str) -> String {
    format!(
        "[{}] [{:<5}] {}",
        Local::now().format("%Y-%m-%d %H:%M:%S"),
        level,
        message
    )
}

fn out(message: &str) {
    if enabled(Level::Info) {
        println!("{}", stamp(Level::Info, message));
    }
}

pub fn info(message: &str) {
    out(message);
}

pub fn error(message: &str) {
    if enabled(Level::Error) {
        eprintln!("{}", stamp(Level::Error, message));
    }
}

/// Shown whatever the level.
pub fn success(message: &str) {
    println!("{}", stamp(Level::Info, message));
}

pub fn header(title: &str) {
    let rule = "═".repeat(RULE_WIDTH);
    out(&rule);
    out(&format!("  {title}"));
    out(&rule);
}

/// Indented detail line under the previous message.
pub fn sub_item(message: &str) {
    out(&format!("    {message}"));
}

/// Titled block of `label: value` lines.
pub fn summary(title: &str, items: &[(&str, String)]) {
    if !enabled(Level::Info) {
        return;
    }
    println!();
    out(&format!("[SUMMARY] {title}"));
    for (label, value) in items {
        out(&format!("    {label}: {value}"));
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_stamp_pads_level() {
        let line = stamp(Level::Info, "3 fetched");
        assert!(line.ends_with("[INFO ] 3 fetched"));
        assert!(line.starts_with('['));
    }
}
