use chrono::NaiveDate;
use serde::Serialize;

use crate::model::{AnomalyInterval, AnomalyKind};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct AnomalySpan {
    pub start: NaiveDate,
    pub end: NaiveDate,
}

/// Renderer-ready anomaly markers: single-day lines and multi-day bands.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct AnomalyOverlay {
    pub points: Vec<NaiveDate>,
    pub ranges: Vec<AnomalySpan>,
}

impl AnomalyOverlay {
    pub fn len(&self) -> usize {
        self.points.len() + self.ranges.len()
    }

    pub fn is_empty(&self) -> bool {
        self.points.is_empty() && self.ranges.is_empty()
    }
}

pub struct AnomalyClassifier;

impl AnomalyClassifier {
    /// Splits intervals into point and range markers. Overlaps are not merged
    /// and input order is kept within each partition.
    pub fn classify(intervals: &[AnomalyInterval]) -> AnomalyOverlay {
        let mut overlay = AnomalyOverlay::default();
        for interval in intervals {
            match interval.kind() {
                AnomalyKind::Point => overlay.points.push(interval.start()),
                AnomalyKind::Range => overlay.ranges.push(AnomalySpan {
                    start: interval.start(),
                    end: interval.end(),
                }),
            }
        }
        overlay
    }
}
