use chrono::{Duration, NaiveDate};
use proptest::prelude::*;

use crate::model::{AnomalyInterval, CountryCode, Record, SeriesPoint};

const COUNTRIES: [&str; 5] = ["ru", "us", "de", "ir", "cn"];

fn epoch() -> NaiveDate {
    NaiveDate::from_ymd_opt(2023, 12, 25).unwrap()
}

/// Dates within a bounded window so that generated inputs collide often.
pub fn date() -> impl Strategy<Value = NaiveDate> {
    (0i64..120).prop_map(|offset| epoch() + Duration::days(offset))
}

pub fn country() -> impl Strategy<Value = CountryCode> {
    prop::sample::select(COUNTRIES.to_vec()).prop_map(|code| CountryCode::new(code).unwrap())
}

pub fn record() -> impl Strategy<Value = Record> {
    (date(), country(), 0u64..1_000_000)
        .prop_map(|(date, country, count)| Record::new(date, country, count))
}

pub fn records() -> impl Strategy<Value = Vec<Record>> {
    prop::collection::vec(record(), 0..64)
}

pub fn series() -> impl Strategy<Value = Vec<SeriesPoint>> {
    prop::collection::vec(
        (date(), 0u64..1_000_000).prop_map(|(date, count)| SeriesPoint::new(date, count)),
        0..64,
    )
}

pub fn interval() -> impl Strategy<Value = AnomalyInterval> {
    (date(), 0i64..10).prop_map(|(start, len)| {
        AnomalyInterval::new(start, start + Duration::days(len)).unwrap()
    })
}

pub fn intervals() -> impl Strategy<Value = Vec<AnomalyInterval>> {
    prop::collection::vec(interval(), 0..32)
}
