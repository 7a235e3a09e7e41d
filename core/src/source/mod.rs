//! Retrieval of raw per-country daily records from upstream metric sources.
//!
//! Every fetcher normalizes its wire shape into [`SourceBatch`] so the
//! aggregation stages never see JSON or CSV.

pub mod api;
pub mod portal;
pub mod wire;

use std::collections::BTreeSet;

use futures::future::BoxFuture;

use crate::model::{AnomalyInterval, CountryCode, DateRange, Record, Sensitivity, Source, SourceType};
use crate::prelude::{FetchResult, ValidationError};

pub use api::{ApiClient, ApiConfig};
pub use portal::{PortalClient, PortalConfig};

/// How the upstream encoded its dates.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DateFormat {
    /// `YYYY-MM-DD`
    Plain,
    /// RFC 3339 timestamps, reduced to the UTC calendar day.
    Timestamp,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SourceQuery {
    pub source_type: SourceType,
    pub countries: BTreeSet<CountryCode>,
    pub range: DateRange,
    pub sensitivity: Sensitivity,
}

impl SourceQuery {
    pub fn new(
        source_type: SourceType,
        countries: BTreeSet<CountryCode>,
        range: DateRange,
        sensitivity: Sensitivity,
    ) -> Result<Self, ValidationError> {
        if countries.is_empty() {
            return Err(ValidationError::EmptyCountries);
        }
        Ok(Self {
            source_type,
            countries,
            range,
            sensitivity,
        })
    }

    /// Same query narrowed to one concrete upstream category.
    pub fn for_source(&self, source: Source) -> Self {
        Self {
            source_type: source.into(),
            ..self.clone()
        }
    }

    /// Comma separated country list, e.g. `ru,us`.
    pub fn countries_param(&self) -> String {
        self.countries
            .iter()
            .map(CountryCode::as_str)
            .collect::<Vec<_>>()
            .join(",")
    }
}

/// Normalized result of one fetch.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SourceBatch {
    pub records: Vec<Record>,
    pub anomalies: Vec<AnomalyInterval>,
    /// Encoding of the record dates; `None` when the batch carried no records.
    pub date_format: Option<DateFormat>,
}

/// Boundary to an upstream metric source.
pub trait SourceFetcher: Send + Sync {
    fn name(&self) -> &str;

    /// Whether `SourceType::All` can be requested directly instead of being
    /// assembled from separate relay and bridge fetches.
    fn merges_server_side(&self) -> bool {
        false
    }

    fn fetch<'a>(&'a self, query: &'a SourceQuery) -> BoxFuture<'a, FetchResult<SourceBatch>>;
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;

    fn query() -> SourceQuery {
        let countries = ["us", "ru"]
            .iter()
            .map(|code| CountryCode::new(code).unwrap())
            .collect();
        let range = DateRange::new(
            NaiveDate::from_ymd_opt(2024, 1, 1).unwrap(),
            NaiveDate::from_ymd_opt(2024, 1, 31).unwrap(),
        )
        .unwrap();
        SourceQuery::new(SourceType::All, countries, range, Sensitivity::High).unwrap()
    }

    #[test]
    fn countries_param_is_sorted_csv() {
        assert_eq!(query().countries_param(), "ru,us");
    }

    #[test]
    fn narrowing_keeps_everything_but_source() {
        let narrowed = query().for_source(Source::Bridge);
        assert_eq!(narrowed.source_type, SourceType::Bridge);
        assert_eq!(narrowed.sensitivity, Sensitivity::High);
        assert_eq!(narrowed.countries.len(), 2);
    }

    #[test]
    fn empty_country_set_is_rejected() {
        let base = query();
        let err = SourceQuery::new(
            SourceType::Relay,
            BTreeSet::new(),
            base.range,
            Sensitivity::Low,
        )
        .unwrap_err();
        assert_eq!(err, ValidationError::EmptyCountries);
    }
}
