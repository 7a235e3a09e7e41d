use std::collections::BTreeMap;

use chrono::{Datelike, Duration, NaiveDate};
use serde::Serialize;

use crate::model::SeriesPoint;

/// One heatmap cell: an ISO week (by its Monday) and a weekday index.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct WeekCell {
    pub week_start: NaiveDate,
    /// 0 = Monday .. 6 = Sunday.
    pub weekday: u8,
    pub count: u64,
}

/// Re-projects a daily series onto a week/weekday grid for heatmaps.
pub struct WeeklyBucketizer;

impl WeeklyBucketizer {
    pub fn week_start(date: NaiveDate) -> NaiveDate {
        date - Duration::days(i64::from(Self::weekday_index(date)))
    }

    pub fn weekday_index(date: NaiveDate) -> u8 {
        date.weekday().num_days_from_monday() as u8
    }

    /// Emits one cell per non-empty `(week_start, weekday)` pair, ordered by
    /// week then weekday.
    pub fn bucketize(series: &[SeriesPoint]) -> Vec<WeekCell> {
        let mut cells: BTreeMap<(NaiveDate, u8), u64> = BTreeMap::new();
        for point in series {
            let key = (Self::week_start(point.date), Self::weekday_index(point.date));
            let slot = cells.entry(key).or_default();
            *slot = slot.saturating_add(point.count);
        }
        cells
            .into_iter()
            .map(|((week_start, weekday), count)| WeekCell {
                week_start,
                weekday,
                count,
            })
            .collect()
    }
}
