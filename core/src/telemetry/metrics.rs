use std::sync::Mutex;

use serde::Serialize;

/// Counters describing how refresh chains ended.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct RefreshCounts {
    pub started: usize,
    pub applied: usize,
    pub failed: usize,
    pub superseded: usize,
}

pub struct RefreshMetrics {
    inner: Mutex<RefreshCounts>,
}

impl RefreshMetrics {
    pub fn new() -> Self {
        Self {
            inner: Mutex::new(RefreshCounts::default()),
        }
    }

    pub fn record_started(&self) {
        self.update(|counts| counts.started += 1);
    }

    pub fn record_applied(&self) {
        self.update(|counts| counts.applied += 1);
    }

    pub fn record_failed(&self) {
        self.update(|counts| counts.failed += 1);
    }

    /// A result was dropped because a newer chain or a removal overtook it.
    pub fn record_superseded(&self) {
        self.update(|counts| counts.superseded += 1);
    }

    pub fn snapshot(&self) -> RefreshCounts {
        if let Ok(counts) = self.inner.lock() {
            *counts
        } else {
            RefreshCounts::default()
        }
    }

    fn update(&self, apply: impl FnOnce(&mut RefreshCounts)) {
        if let Ok(mut counts) = self.inner.lock() {
            apply(&mut counts);
        }
    }
}

impl Default for RefreshMetrics {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn snapshot_reflects_recorded_events() {
        let metrics = RefreshMetrics::new();
        metrics.record_started();
        metrics.record_started();
        metrics.record_applied();
        metrics.record_superseded();
        assert_eq!(
            metrics.snapshot(),
            RefreshCounts {
                started: 2,
                applied: 1,
                failed: 0,
                superseded: 1
            }
        );
    }
}
