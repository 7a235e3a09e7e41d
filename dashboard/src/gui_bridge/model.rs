use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use torwatchcore::aggregation::{AnomalyClassifier, AnomalyOverlay, WeekCell, WeeklyBucketizer};
use torwatchcore::model::{
    CountryCode, Filter, Record, Sensitivity, Series, SourceType, Target, TargetId, TargetState,
};

/// Renderer-ready view of one target.
#[derive(Debug, Clone, Serialize)]
pub struct TargetView {
    pub id: TargetId,
    pub name: String,
    pub countries: Vec<CountryCode>,
    pub sensitivity: Sensitivity,
    pub status: TargetState,
    pub series: Series,
    pub breakdown: Vec<Record>,
    pub weekly: Vec<WeekCell>,
    pub overlay: AnomalyOverlay,
}

impl From<&Target> for TargetView {
    fn from(target: &Target) -> Self {
        Self {
            id: target.id,
            name: target.spec.name.clone(),
            countries: target.spec.countries.iter().cloned().collect(),
            sensitivity: target.spec.sensitivity,
            status: target.state.clone(),
            series: target.series.clone(),
            breakdown: target.breakdown.clone(),
            weekly: WeeklyBucketizer::bucketize(&target.series),
            overlay: AnomalyClassifier::classify(&target.anomalies),
        }
    }
}

impl TargetView {
    pub fn total_users(&self) -> u64 {
        self.series.iter().map(|point| point.count).sum()
    }
}

/// Body of `POST /targets`.
#[derive(Debug, Clone, Deserialize)]
pub struct NewTarget {
    #[serde(default)]
    pub name: Option<String>,
    pub countries: Vec<String>,
    #[serde(default)]
    pub sensitivity: Sensitivity,
}

/// Wire shape of the global filter for `GET`/`PUT /filter`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct FilterView {
    pub source_type: SourceType,
    pub from: NaiveDate,
    pub to: NaiveDate,
}

impl From<Filter> for FilterView {
    fn from(filter: Filter) -> Self {
        Self {
            source_type: filter.source_type,
            from: filter.range.start(),
            to: filter.range.end(),
        }
    }
}
