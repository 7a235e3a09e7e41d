use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

use crate::model::TargetId;

/// Malformed operator input, rejected before any fetch is issued.
#[derive(thiserror::Error, Debug, Clone, PartialEq, Eq)]
pub enum ValidationError {
    #[error("a target needs at least one country")]
    EmptyCountries,
    #[error("invalid country code: {0:?}")]
    InvalidCountry(String),
    #[error("target name {0:?} must be at least 3 characters")]
    NameTooShort(String),
    #[error("degenerate date range: {start} is after {end}")]
    DegenerateRange { start: NaiveDate, end: NaiveDate },
    #[error("anomaly interval starts at {start} but ends at {end}")]
    InvalidInterval { start: NaiveDate, end: NaiveDate },
}

/// Failure of a single source fetch (network, HTTP status or payload decode).
#[derive(thiserror::Error, Debug, Clone, PartialEq, Eq)]
pub enum FetchError {
    #[error("transport error: {0}")]
    Transport(String),
    #[error("upstream returned {status} for {url}")]
    Status { status: u16, url: String },
    #[error("malformed payload: {0}")]
    Decode(String),
    #[error("malformed csv: {0}")]
    Csv(String),
    #[error("unsupported request: {0}")]
    Unsupported(String),
}

impl From<reqwest::Error> for FetchError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_decode() {
            FetchError::Decode(err.to_string())
        } else {
            FetchError::Transport(err.to_string())
        }
    }
}

/// Common error type for dashboard operations.
#[derive(thiserror::Error, Debug, Clone, PartialEq, Eq)]
pub enum DashboardError {
    #[error(transparent)]
    Fetch(#[from] FetchError),
    #[error(transparent)]
    Validation(#[from] ValidationError),
    #[error("merge inconsistency: {0}")]
    MergeInconsistency(String),
    #[error("unknown target {0}")]
    UnknownTarget(TargetId),
}

pub type DashboardResult<T> = Result<T, DashboardError>;
pub type FetchResult<T> = Result<T, FetchError>;

/// Coarse classification of a refresh failure, kept alongside its message.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FailureKind {
    Fetch,
    Validation,
    MergeInconsistency,
    UnknownTarget,
}

/// Captured cause of a failed refresh, stored on the target.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RefreshFailure {
    pub kind: FailureKind,
    pub message: String,
}

impl From<&DashboardError> for RefreshFailure {
    fn from(err: &DashboardError) -> Self {
        let kind = match err {
            DashboardError::Fetch(_) => FailureKind::Fetch,
            DashboardError::Validation(_) => FailureKind::Validation,
            DashboardError::MergeInconsistency(_) => FailureKind::MergeInconsistency,
            DashboardError::UnknownTarget(_) => FailureKind::UnknownTarget,
        };
        Self {
            kind,
            message: err.to_string(),
        }
    }
}
