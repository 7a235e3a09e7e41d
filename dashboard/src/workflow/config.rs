use anyhow::Context;
use chrono::{NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use std::fs;
use std::net::SocketAddr;
use std::path::Path;
use torwatchcore::model::{DateRange, Filter, Sensitivity, SourceType, TargetSpec};
use torwatchcore::source::{ApiConfig, PortalConfig};

use crate::generator::profile::GeneratorConfig;

/// Where target data comes from.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize, clap::ValueEnum)]
#[serde(rename_all = "snake_case")]
pub enum Backend {
    /// JSON metrics backend (`/v1/metrics/...`)
    #[default]
    Api,
    /// Legacy per-country CSV exports from the metrics portal
    Portal,
    /// Seeded offline generator
    Synthetic,
}

#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct FilterConfig {
    pub source_type: SourceType,
    pub from: Option<NaiveDate>,
    pub to: Option<NaiveDate>,
}

#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct TargetConfig {
    pub name: Option<String>,
    pub countries: Vec<String>,
    pub sensitivity: Sensitivity,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DashboardConfig {
    pub backend: Backend,
    pub api: ApiConfig,
    pub portal: PortalConfig,
    pub synthetic: GeneratorConfig,
    pub filter: FilterConfig,
    pub targets: Vec<TargetConfig>,
    pub bind: SocketAddr,
}

impl Default for DashboardConfig {
    fn default() -> Self {
        Self {
            backend: Backend::default(),
            api: ApiConfig::default(),
            portal: PortalConfig::default(),
            synthetic: GeneratorConfig::default(),
            filter: FilterConfig::default(),
            targets: Vec::new(),
            bind: SocketAddr::from(([127, 0, 0, 1], 9000)),
        }
    }
}

impl DashboardConfig {
    pub fn load<P: AsRef<Path>>(path: P) -> anyhow::Result<Self> {
        let path_ref = path.as_ref();
        let contents = fs::read_to_string(path_ref)
            .with_context(|| format!("reading dashboard config {}", path_ref.display()))?;
        let config: DashboardConfig = serde_yaml::from_str(&contents)
            .with_context(|| format!("parsing dashboard config {}", path_ref.display()))?;
        config
            .synthetic
            .validate()
            .with_context(|| format!("invalid dashboard config {}", path_ref.display()))?;
        Ok(config)
    }

    /// Missing bounds default to the year leading up to today.
    pub fn to_filter(&self) -> anyhow::Result<Filter> {
        let to = self.filter.to.unwrap_or_else(|| Utc::now().date_naive());
        let range = match self.filter.from {
            Some(from) => DateRange::new(from, to).context("invalid filter range")?,
            None => DateRange::trailing_year(to),
        };
        Ok(Filter::new(self.filter.source_type, range))
    }

    pub fn target_specs(&self) -> anyhow::Result<Vec<TargetSpec>> {
        self.targets
            .iter()
            .enumerate()
            .map(|(idx, target)| {
                TargetSpec::new(
                    target.name.as_deref(),
                    &target.countries,
                    target.sensitivity,
                )
                .with_context(|| format!("invalid target #{} in config", idx + 1))
            })
            .collect()
    }
}
