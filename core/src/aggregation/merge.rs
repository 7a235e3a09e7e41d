use crate::aggregation::date::DateAggregator;
use crate::model::{Record, Series, SeriesPoint};
use crate::prelude::{DashboardError, DashboardResult};
use crate::source::{DateFormat, SourceBatch};

/// Combines the output of several source fetches by summing counts per date.
pub struct SourceMerger;

impl SourceMerger {
    /// Sums records sharing a `(date, country)` key across every input.
    pub fn merge_records(inputs: &[&[Record]]) -> Vec<Record> {
        let combined: Vec<Record> = inputs
            .iter()
            .flat_map(|records| records.iter().cloned())
            .collect();
        DateAggregator::by_date_and_country(&combined)
    }

    /// Sums series points sharing a date; a date missing from an input counts as zero.
    pub fn merge_series(inputs: &[&[SeriesPoint]]) -> Series {
        DateAggregator::sum_points(
            inputs
                .iter()
                .flat_map(|points| points.iter().map(|point| (point.date, point.count))),
        )
    }

    /// Merges relay and bridge batches for the combined view. Batches whose
    /// upstream used different date encodings cannot be lined up safely.
    pub fn merge_batches(batches: Vec<SourceBatch>) -> DashboardResult<SourceBatch> {
        let mut date_format: Option<DateFormat> = None;
        for batch in &batches {
            match (date_format, batch.date_format) {
                (Some(seen), Some(current)) if seen != current => {
                    return Err(DashboardError::MergeInconsistency(format!(
                        "sources disagree on date encoding ({seen:?} vs {current:?})"
                    )));
                }
                (None, current) => date_format = current,
                _ => {}
            }
        }

        let record_sets: Vec<&[Record]> = batches.iter().map(|b| b.records.as_slice()).collect();
        let records = Self::merge_records(&record_sets);
        let anomalies = batches
            .iter()
            .flat_map(|batch| batch.anomalies.iter().copied())
            .collect();

        Ok(SourceBatch {
            records,
            anomalies,
            date_format,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::aggregation::strategies;
    use crate::model::{AnomalyInterval, CountryCode};
    use chrono::NaiveDate;
    use proptest::prelude::*;

    fn day(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    fn record(date: NaiveDate, country: &str, count: u64) -> Record {
        Record::new(date, CountryCode::new(country).unwrap(), count)
    }

    #[test]
    fn relay_and_bridge_series_sum_by_date() {
        let relay = vec![SeriesPoint::new(day(2024, 1, 1), 5)];
        let bridge = vec![
            SeriesPoint::new(day(2024, 1, 1), 2),
            SeriesPoint::new(day(2024, 1, 2), 1),
        ];
        assert_eq!(
            SourceMerger::merge_series(&[&relay, &bridge]),
            vec![
                SeriesPoint::new(day(2024, 1, 1), 7),
                SeriesPoint::new(day(2024, 1, 2), 1)
            ]
        );
    }

    #[test]
    fn merge_matches_aggregating_the_concatenation() {
        let a = vec![
            record(day(2024, 1, 1), "ru", 5),
            record(day(2024, 1, 3), "us", 4),
        ];
        let b = vec![
            record(day(2024, 1, 1), "us", 2),
            record(day(2024, 1, 2), "ru", 1),
            record(day(2024, 1, 3), "us", 9),
        ];
        let merged = SourceMerger::merge_records(&[&a, &b]);
        let concatenated: Vec<Record> = a.iter().chain(b.iter()).cloned().collect();
        assert_eq!(
            DateAggregator::by_date(&merged),
            DateAggregator::by_date(&concatenated)
        );
        let swapped = SourceMerger::merge_records(&[&b, &a]);
        assert_eq!(merged, swapped);
    }

    #[test]
    fn batches_keep_every_anomaly() {
        let relay = SourceBatch {
            records: vec![record(day(2024, 2, 1), "ru", 10)],
            anomalies: vec![AnomalyInterval::point(day(2024, 2, 1))],
            date_format: Some(DateFormat::Plain),
        };
        let bridge = SourceBatch {
            records: vec![record(day(2024, 2, 1), "ru", 3)],
            anomalies: vec![AnomalyInterval::point(day(2024, 2, 1))],
            date_format: None,
        };
        let merged = SourceMerger::merge_batches(vec![relay, bridge]).unwrap();
        assert_eq!(merged.records, vec![record(day(2024, 2, 1), "ru", 13)]);
        assert_eq!(merged.anomalies.len(), 2);
        assert_eq!(merged.date_format, Some(DateFormat::Plain));
    }

    #[test]
    fn mismatched_date_encodings_are_reported() {
        let relay = SourceBatch {
            date_format: Some(DateFormat::Plain),
            ..SourceBatch::default()
        };
        let bridge = SourceBatch {
            date_format: Some(DateFormat::Timestamp),
            ..SourceBatch::default()
        };
        let err = SourceMerger::merge_batches(vec![relay, bridge]).unwrap_err();
        assert!(matches!(err, DashboardError::MergeInconsistency(_)));
    }

    proptest! {
        #[test]
        fn merging_commutes_with_aggregation(a in strategies::records(), b in strategies::records()) {
            let merged = SourceMerger::merge_records(&[&a, &b]);
            let concatenated: Vec<Record> = a.iter().chain(b.iter()).cloned().collect();
            prop_assert_eq!(
                DateAggregator::by_date(&merged),
                DateAggregator::by_date(&concatenated)
            );
            prop_assert_eq!(&merged, &DateAggregator::by_date_and_country(&concatenated));

            let swapped = SourceMerger::merge_records(&[&b, &a]);
            prop_assert_eq!(merged, swapped);
        }
    }
}
