use chrono::{DateTime, NaiveDate, Utc};
use serde::Deserialize;

use crate::model::{AnomalyInterval, CountryCode, Record};
use crate::prelude::{FetchError, FetchResult};
use crate::source::{DateFormat, SourceBatch};

/// Body of `GET /v1/metrics/{relays,bridges,all}`.
#[derive(Debug, Deserialize)]
pub struct MetricsResponse {
    #[serde(default)]
    pub metrics: Vec<WireMetric>,
    #[serde(default)]
    pub anomalies: Vec<WireAnomaly>,
}

#[derive(Debug, Deserialize)]
pub struct WireMetric {
    pub date: String,
    pub users: u64,
    pub country: String,
}

#[derive(Debug, Deserialize)]
pub struct WireAnomaly {
    pub interval: WireInterval,
}

#[derive(Debug, Deserialize)]
pub struct WireInterval {
    pub start: String,
    pub end: String,
}

/// Decodes and normalizes a JSON metrics body.
pub fn parse_metrics_response(body: &[u8]) -> FetchResult<SourceBatch> {
    let response: MetricsResponse =
        serde_json::from_slice(body).map_err(|err| FetchError::Decode(err.to_string()))?;
    normalize(response)
}

/// Each section must be consistently encoded on its own. Only the metric
/// dates decide the batch encoding, since anomaly bounds are never summed.
pub fn normalize(response: MetricsResponse) -> FetchResult<SourceBatch> {
    let mut metric_encoding = EncodingTracker::default();
    let mut anomaly_encoding = EncodingTracker::default();

    let records = response
        .metrics
        .into_iter()
        .map(|metric| {
            let date = metric_encoding.parse(&metric.date)?;
            let country = CountryCode::new(&metric.country)
                .map_err(|err| FetchError::Decode(err.to_string()))?;
            Ok(Record::new(date, country, metric.users))
        })
        .collect::<FetchResult<Vec<_>>>()?;

    let anomalies = response
        .anomalies
        .into_iter()
        .map(|anomaly| {
            let start = anomaly_encoding.parse(&anomaly.interval.start)?;
            let end = anomaly_encoding.parse(&anomaly.interval.end)?;
            AnomalyInterval::new(start, end).map_err(|err| FetchError::Decode(err.to_string()))
        })
        .collect::<FetchResult<Vec<_>>>()?;

    Ok(SourceBatch {
        records,
        anomalies,
        date_format: metric_encoding.seen,
    })
}

/// Parses one wire date, reporting which encoding it used.
pub fn parse_date(raw: &str) -> FetchResult<(NaiveDate, DateFormat)> {
    let raw = raw.trim();
    if let Ok(date) = NaiveDate::parse_from_str(raw, "%Y-%m-%d") {
        return Ok((date, DateFormat::Plain));
    }
    DateTime::parse_from_rfc3339(raw)
        .map(|ts| (ts.with_timezone(&Utc).date_naive(), DateFormat::Timestamp))
        .map_err(|_| FetchError::Decode(format!("unrecognized date {raw:?}")))
}

#[derive(Default)]
struct EncodingTracker {
    seen: Option<DateFormat>,
}

impl EncodingTracker {
    fn parse(&mut self, raw: &str) -> FetchResult<NaiveDate> {
        let (date, format) = parse_date(raw)?;
        match self.seen {
            Some(seen) if seen != format => Err(FetchError::Decode(format!(
                "mixed date encodings in one response ({seen:?} then {format:?})"
            ))),
            _ => {
                self.seen = Some(format);
                Ok(date)
            }
        }
    }
}
