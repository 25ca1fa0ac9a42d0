//! Pipeline counters.
//!
//! Lock-free atomics, shared between the pipeline and whoever reports on it
//! (the supervisor at shutdown, the batch driver at the end of a run).

use crate::pipeline::FailureKind;
use serde::Serialize;
use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};

#[derive(Debug, Default)]
pub struct PipelineStats {
    detected: AtomicU64,
    processed: AtomicU64,
    ignored: AtomicU64,
    decode_failures: AtomicU64,
    validation_failures: AtomicU64,
    render_failures: AtomicU64,
    archive_failures: AtomicU64,
}

impl PipelineStats {
    pub fn new() -> Self {
        Self::default()
    }

    #[inline]
    pub fn inc_detected(&self) {
        self.detected.fetch_add(1, Ordering::Relaxed);
    }

    #[inline]
    pub fn inc_processed(&self) {
        self.processed.fetch_add(1, Ordering::Relaxed);
    }

    #[inline]
    pub fn inc_ignored(&self) {
        self.ignored.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_failure(&self, kind: FailureKind) {
        let counter = match kind {
            FailureKind::Decode => &self.decode_failures,
            FailureKind::Validation => &self.validation_failures,
            FailureKind::Render => &self.render_failures,
            FailureKind::Archive => &self.archive_failures,
        };
        counter.fetch_add(1, Ordering::Relaxed);
    }

    pub fn snapshot(&self) -> StatsSnapshot {
        StatsSnapshot {
            detected: self.detected.load(Ordering::Relaxed),
            processed: self.processed.load(Ordering::Relaxed),
            ignored: self.ignored.load(Ordering::Relaxed),
            decode_failures: self.decode_failures.load(Ordering::Relaxed),
            validation_failures: self.validation_failures.load(Ordering::Relaxed),
            render_failures: self.render_failures.load(Ordering::Relaxed),
            archive_failures: self.archive_failures.load(Ordering::Relaxed),
        }
    }
}

/// Point-in-time copy of [`PipelineStats`]
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct StatsSnapshot {
    pub detected: u64,
    pub processed: u64,
    pub ignored: u64,
    pub decode_failures: u64,
    pub validation_failures: u64,
    pub render_failures: u64,
    pub archive_failures: u64,
}

impl StatsSnapshot {
    pub fn failed(&self) -> u64 {
        self.decode_failures + self.validation_failures + self.render_failures + self.archive_failures
    }
}

impl fmt::Display for StatsSnapshot {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} detected, {} processed, {} failed (decode {}, validation {}, render {}, archive {})",
            self.detected,
            self.processed,
            self.failed(),
            self.decode_failures,
            self.validation_failures,
            self.render_failures,
            self.archive_failures
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_counts() {
        let stats = PipelineStats::new();
        stats.inc_detected();
        stats.inc_detected();
        stats.inc_processed();
        stats.record_failure(FailureKind::Validation);
        stats.inc_ignored();

        let snap = stats.snapshot();
        assert_eq!(snap.detected, 2);
        assert_eq!(snap.processed, 1);
        assert_eq!(snap.validation_failures, 1);
        assert_eq!(snap.failed(), 1);
        assert_eq!(snap.ignored, 1);
        assert!(snap.to_string().starts_with("2 detected, 1 processed, 1 failed"));
    }
}
