//! Time-series aggregation and anomaly-overlay core for the Tor user-count
//! dashboard.
//!
//! Daily per-country user counts are fetched from relay and bridge sources,
//! merged and summed by date, re-bucketed onto an ISO week grid for heatmaps,
//! and paired with externally detected anomaly intervals split into point and
//! range markers. The [`orchestrator`] keeps every target's series current as
//! the global filter changes.

pub mod aggregation;
pub mod model;
pub mod orchestrator;
pub mod prelude;
pub mod source;
pub mod telemetry;

pub use orchestrator::{Orchestrator, RefreshOutcome};
pub use prelude::{DashboardError, DashboardResult, FetchError, ValidationError};
pub use source::{SourceBatch, SourceFetcher, SourceQuery};
