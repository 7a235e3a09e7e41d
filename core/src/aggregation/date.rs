use std::collections::BTreeMap;

use chrono::NaiveDate;

use crate::model::{CountryCode, Record, Series, SeriesPoint};

/// Groups observations by calendar day and sums their counts.
pub struct DateAggregator;

impl DateAggregator {
    /// Collapses the country dimension: one point per distinct date, ascending.
    pub fn by_date(records: &[Record]) -> Series {
        Self::sum_points(records.iter().map(|record| (record.date, record.count)))
    }

    /// Keeps country as a series dimension; ordered by date, then country.
    pub fn by_date_and_country(records: &[Record]) -> Vec<Record> {
        let mut totals: BTreeMap<(NaiveDate, &CountryCode), u64> = BTreeMap::new();
        for record in records {
            let slot = totals.entry((record.date, &record.country)).or_default();
            *slot = slot.saturating_add(record.count);
        }
        totals
            .into_iter()
            .map(|((date, country), count)| Record::new(date, country.clone(), count))
            .collect()
    }

    /// Re-aggregates series points; a no-op on a series that already has unique dates.
    pub fn collapse(points: &[SeriesPoint]) -> Series {
        Self::sum_points(points.iter().map(|point| (point.date, point.count)))
    }

    pub(crate) fn sum_points(points: impl IntoIterator<Item = (NaiveDate, u64)>) -> Series {
        let mut totals: BTreeMap<NaiveDate, u64> = BTreeMap::new();
        for (date, count) in points {
            let slot = totals.entry(date).or_default();
            *slot = slot.saturating_add(count);
        }
        totals
            .into_iter()
            .map(|(date, count)| SeriesPoint::new(date, count))
            .collect()
    }
}
