//! Download progress accounting.

use std::time::{Duration, Instant};

const MIB: f64 = 1024.0 * 1024.0;

/// Point-in-time copy of a run's download totals.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ProgressSnapshot {
    pub bytes_total: u64,
    pub files_count: u64,
    /// Time of the first byte-progress event of the run.
    pub started_at: Option<Instant>,
    pub last_update_at: Option<Instant>,
}

impl ProgressSnapshot {
    /// Time since the first download, or zero if none yet.
    #[must_use]
    pub fn elapsed_at(&self, now: Instant) -> Duration {
        self.started_at
            .map_or(Duration::ZERO, |start| now.saturating_duration_since(start))
    }

    /// Average bytes per second up to `now`; zero if no time has passed.
    #[must_use]
    #[allow(clippy::cast_precision_loss)]
    pub fn rate_at(&self, now: Instant) -> f64 {
        let elapsed = self.elapsed_at(now).as_secs_f64();
        if elapsed <= 0.0 {
            return 0.0;
        }
        self.bytes_total as f64 / elapsed
    }

    #[must_use]
    pub fn rate(&self) -> f64 {
        self.rate_at(Instant::now())
    }
}

/// Running totals derived from byte-progress events.
///
/// Owned by one controller and reset at the start of every run. The totals
/// are kept after a run ends until the next reset.
#[derive(Debug, Default)]
pub struct ProgressAccumulator {
    snapshot: ProgressSnapshot,
}

impl ProgressAccumulator {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Record one finished file of `bytes` bytes.
    pub fn record(&mut self, bytes: u64) {
        self.record_at(bytes, Instant::now());
    }

    /// Record one finished file at a given instant.
    pub fn record_at(&mut self, bytes: u64, now: Instant) {
        let snapshot = &mut self.snapshot;
        if snapshot.started_at.is_none() {
            snapshot.started_at = Some(now);
        }
        snapshot.bytes_total = snapshot.bytes_total.saturating_add(bytes);
        snapshot.files_count = snapshot.files_count.saturating_add(1);
        snapshot.last_update_at = Some(now);
    }

    pub fn reset(&mut self) {
        self.snapshot = ProgressSnapshot::default();
    }

    #[must_use]
    pub fn snapshot(&self) -> ProgressSnapshot {
        self.snapshot
    }
}

/// Render a byte count as MB, or GB from 1024 MB upwards.
#[must_use]
#[allow(clippy::cast_precision_loss)]
pub fn format_size(bytes: u64) -> String {
    let mb = bytes as f64 / MIB;
    if mb >= 1024.0 {
        format!("{:.2} GB", mb / 1024.0)
    } else {
        format!("{mb:.1} MB")
    }
}

#[must_use]
pub fn format_rate(bytes_per_sec: f64) -> String {
    format!("{:.2} MB/s", bytes_per_sec / MIB)
}

/// Render a duration as `HH:MM:SS`.
#[must_use]
pub fn format_elapsed(elapsed: Duration) -> String {
    let secs = elapsed.as_secs();
    let (h, rem) = (secs / 3600, secs % 3600);
    let (m, s) = (rem / 60, rem % 60);
    format!("{h:02}:{m:02}:{s:02}")
}
