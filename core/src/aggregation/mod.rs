pub mod anomaly;
pub mod date;
pub mod merge;
#[cfg(test)]
mod strategies;
pub mod weekly;

pub use anomaly::{AnomalyClassifier, AnomalyOverlay, AnomalySpan};
pub use date::DateAggregator;
pub use merge::SourceMerger;
pub use weekly::{WeekCell, WeeklyBucketizer};
