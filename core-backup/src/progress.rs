//! Upload run counters and the periodic progress snapshot derived from them.

use core_async::time::Instant;
use std::time::Duration;

/// Counters owned by one upload run.
#[derive(Debug, Clone)]
pub struct UploadStats {
    pub total_files: u64,
    pub uploaded_files: u64,
    pub skipped_files: u64,
    pub failed_files: u64,
    pub files_since_last_report: u64,
    pub start_time: Instant,
    pub last_report_at: Instant,
}

/// Point-in-time view emitted every progress interval.
#[derive(Debug, Clone, PartialEq)]
pub struct ProgressSnapshot {
    pub uploaded_files: u64,
    pub skipped_files: u64,
    pub failed_files: u64,
    pub total_files: u64,
    /// Share of the total now stored remotely, uploaded or skipped, 0-100.
    pub percent: u8,
    pub elapsed: Duration,
    /// Files per minute since the previous report.
    pub rate_per_minute: f64,
    /// `None` while nothing moved in the last interval.
    pub eta: Option<Duration>,
}

impl UploadStats {
    pub fn new(total_files: u64) -> Self {
        let now = Instant::now();
        Self {
            total_files,
            uploaded_files: 0,
            skipped_files: 0,
            failed_files: 0,
            files_since_last_report: 0,
            start_time: now,
            last_report_at: now,
        }
    }

    pub fn record_uploaded(&mut self) {
        self.uploaded_files += 1;
        self.files_since_last_report += 1;
    }

    pub fn record_skipped(&mut self) {
        self.skipped_files += 1;
    }

    pub fn record_failed(&mut self) {
        self.failed_files += 1;
    }

    /// Files stored remotely, whether by this run or an earlier one.
    pub fn done(&self) -> u64 {
        self.uploaded_files + self.skipped_files
    }

    /// Files with a final outcome so far.
    pub fn settled(&self) -> u64 {
        self.uploaded_files + self.skipped_files + self.failed_files
    }

    pub fn remaining(&self) -> u64 {
        self.total_files.saturating_sub(self.settled())
    }

    /// Build a snapshot and start a new reporting window at `now`.
    pub fn take_snapshot(&mut self, now: Instant) -> ProgressSnapshot {
        let window = now.saturating_duration_since(self.last_report_at);
        let rate_per_minute = per_minute(self.files_since_last_report, window);

        let eta = if rate_per_minute > 0.0 {
            Some(Duration::from_secs_f64(
                self.remaining() as f64 / rate_per_minute * 60.0,
            ))
        } else {
            None
        };

        let snapshot = ProgressSnapshot {
            uploaded_files: self.uploaded_files,
            skipped_files: self.skipped_files,
            failed_files: self.failed_files,
            total_files: self.total_files,
            percent: percent(self.done(), self.total_files),
            elapsed: now.saturating_duration_since(self.start_time),
            rate_per_minute,
            eta,
        };

        self.files_since_last_report = 0;
        self.last_report_at = now;
        snapshot
    }

    /// Upload rate over the whole run.
    pub fn average_rate_per_minute(&self, now: Instant) -> f64 {
        per_minute(
            self.uploaded_files,
            now.saturating_duration_since(self.start_time),
        )
    }
}

fn per_minute(count: u64, window: Duration) -> f64 {
    let minutes = window.as_secs_f64() / 60.0;
    if minutes > 0.0 {
        count as f64 / minutes
    } else {
        0.0
    }
}

fn percent(done: u64, total: u64) -> u8 {
    if total == 0 {
        return 100;
    }
    ((done.min(total) as f64 / total as f64) * 100.0) as u8
}
