use chrono::Datelike;
use futures::future::BoxFuture;
use futures::FutureExt;
use rand::{rngs::StdRng, Rng, SeedableRng};
use serde::{Deserialize, Serialize};
use std::f64::consts::PI;
use torwatchcore::model::{AnomalyInterval, CountryCode, Record, Sensitivity, Source, SourceType};
use torwatchcore::prelude::FetchResult;
use torwatchcore::source::{DateFormat, SourceBatch, SourceFetcher, SourceQuery};

/// Configuration for generating synthetic daily user counts.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct GeneratorConfig {
    pub seed: u64,
    /// Typical relay users per country and day; bridges see a fifth of it.
    pub base_users: u64,
    /// Relative amplitude of the weekly rhythm.
    pub weekly_swing: f64,
    /// Relative amplitude of the day-to-day jitter.
    pub noise: f64,
    /// Chance that an anomaly starts on a given day at medium sensitivity.
    pub anomaly_rate: f64,
    /// Multiplier applied to counts inside an anomaly.
    pub spike: f64,
}

impl GeneratorConfig {
    /// Rejects non-finite tuning values, which the sampler cannot draw from.
    pub fn validate(&self) -> anyhow::Result<()> {
        for (field, value) in [
            ("weekly_swing", self.weekly_swing),
            ("noise", self.noise),
            ("anomaly_rate", self.anomaly_rate),
            ("spike", self.spike),
        ] {
            anyhow::ensure!(value.is_finite(), "synthetic.{field} must be finite, got {value}");
        }
        Ok(())
    }
}

impl Default for GeneratorConfig {
    fn default() -> Self {
        Self {
            seed: 0,
            base_users: 20_000,
            weekly_swing: 0.15,
            noise: 0.05,
            anomaly_rate: 0.02,
            spike: 2.5,
        }
    }
}

/// Offline stand-in for the metrics backend. Deterministic for a given seed
/// and query, and merges relay and bridge itself like the real `all` endpoint.
pub struct SyntheticSource {
    config: GeneratorConfig,
}

impl SyntheticSource {
    pub fn new(config: GeneratorConfig) -> Self {
        Self { config }
    }

    fn source_base(&self, source: Source) -> f64 {
        match source {
            Source::Relay => self.config.base_users as f64,
            Source::Bridge => self.config.base_users as f64 / 5.0,
        }
    }

    fn sensitivity_factor(sensitivity: Sensitivity) -> f64 {
        match sensitivity {
            Sensitivity::Low => 0.5,
            Sensitivity::Medium => 1.0,
            Sensitivity::High => 2.0,
        }
    }

    fn anomalies(&self, query: &SourceQuery) -> Vec<AnomalyInterval> {
        let mut rng = StdRng::seed_from_u64(self.config.seed ^ query_key(query));
        let rate = (self.config.anomaly_rate * Self::sensitivity_factor(query.sensitivity))
            .clamp(0.0, 1.0);

        let mut anomalies = Vec::new();
        let mut days = query.range.iter_days();
        while let Some(start) = days.next() {
            if !rng.gen_bool(rate) {
                continue;
            }
            let extra_days = if rng.gen_bool(0.5) { 0 } else { rng.gen_range(1..4) };
            let mut end = start;
            for _ in 0..extra_days {
                match days.next() {
                    Some(day) => end = day,
                    None => break,
                }
            }
            // Bounds come from an ascending day iterator, so start <= end holds.
            if let Ok(interval) = AnomalyInterval::new(start, end) {
                anomalies.push(interval);
            }
        }
        anomalies
    }

    fn country_records(
        &self,
        source: Source,
        country: &CountryCode,
        query: &SourceQuery,
        anomalies: &[AnomalyInterval],
    ) -> Vec<Record> {
        let mut rng = StdRng::seed_from_u64(
            self.config.seed ^ text_key(country.as_str()) ^ text_key(&format!("{source:?}")),
        );
        let country_scale = 0.5 + (text_key(country.as_str()) % 100) as f64 / 100.0;
        let base = self.source_base(source) * country_scale;

        query
            .range
            .iter_days()
            .map(|date| {
                let weekday = date.weekday().num_days_from_monday() as f64;
                let rhythm = 1.0 + self.config.weekly_swing * (2.0 * PI * weekday / 7.0).sin();
                let jitter = if self.config.noise > 0.0 {
                    rng.gen_range(-self.config.noise..self.config.noise)
                } else {
                    0.0
                };
                let spike = if anomalies
                    .iter()
                    .any(|a| a.start() <= date && date <= a.end())
                {
                    self.config.spike
                } else {
                    1.0
                };
                let count = (base * rhythm * (1.0 + jitter) * spike).max(0.0).round() as u64;
                Record::new(date, country.clone(), count)
            })
            .collect()
    }

    pub fn build_batch(&self, query: &SourceQuery) -> SourceBatch {
        let anomalies = self.anomalies(query);
        let mut records = Vec::new();
        for source in query.source_type.sources() {
            for country in &query.countries {
                records.extend(self.country_records(*source, country, query, &anomalies));
            }
        }

        let date_format = (!records.is_empty()).then_some(DateFormat::Plain);
        SourceBatch {
            records,
            anomalies,
            date_format,
        }
    }
}

impl SourceFetcher for SyntheticSource {
    fn name(&self) -> &str {
        "synthetic"
    }

    fn merges_server_side(&self) -> bool {
        true
    }

    fn fetch<'a>(&'a self, query: &'a SourceQuery) -> BoxFuture<'a, FetchResult<SourceBatch>> {
        let batch = self.build_batch(query);
        async move { Ok(batch) }.boxed()
    }
}

/// Stable FNV-1a hash; `DefaultHasher` output may change between releases.
fn text_key(text: &str) -> u64 {
    text.bytes().fold(0xcbf2_9ce4_8422_2325, |hash, byte| {
        (hash ^ u64::from(byte)).wrapping_mul(0x0100_0000_01b3)
    })
}

fn query_key(query: &SourceQuery) -> u64 {
    let source = match query.source_type {
        SourceType::Relay => "relay",
        SourceType::Bridge => "bridge",
        SourceType::All => "all",
    };
    text_key(&format!(
        "{}|{}|{}",
        source,
        query.countries_param(),
        query.sensitivity.as_param()
    ))
}
