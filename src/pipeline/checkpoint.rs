//! Save and backup counters for periodic snapshot flushes.

/// What a checkpoint decided to flush after recording progress.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct FlushPlan {
    pub primary: bool,
    pub backup: bool,
}

impl FlushPlan {
    pub fn any(&self) -> bool {
        self.primary || self.backup
    }
}

/// Tracks records merged since the last primary flush and the last backup.
///
/// A flush is due once a counter reaches its threshold; the counter resets
/// when the flush is acknowledged.
#[derive(Debug, Clone)]
pub struct Checkpoint {
    save_threshold: usize,
    backup_threshold: usize,
    since_save: usize,
    since_backup: usize,
}

impl Checkpoint {
    pub fn new(save_threshold: usize, backup_threshold: usize) -> Self {
        Self {
            save_threshold: save_threshold.max(1),
            backup_threshold: backup_threshold.max(1),
            since_save: 0,
            since_backup: 0,
        }
    }

    /// Count `merged` new records and report which flushes are due.
    pub fn record(&mut self, merged: usize) -> FlushPlan {
        self.since_save += merged;
        self.since_backup += merged;
        FlushPlan {
            primary: self.since_save >= self.save_threshold,
            backup: self.since_backup >= self.backup_threshold,
        }
    }

    /// Reset the counters for the flushes that were written.
    pub fn flushed(&mut self, plan: FlushPlan) {
        if plan.primary {
            self.since_save = 0;
        }
        if plan.backup {
            self.since_backup = 0;
        }
    }
}
