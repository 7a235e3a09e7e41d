use std::fmt;
use std::str::FromStr;

use chrono::{Months, NaiveDate, Utc};
use serde::{Deserialize, Serialize};

use crate::prelude::ValidationError;

/// Concrete upstream metric category.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Source {
    Relay,
    Bridge,
}

/// Source selection of the dashboard. `All` is relay plus bridge summed by date.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SourceType {
    #[default]
    Relay,
    Bridge,
    All,
}

impl SourceType {
    /// Upstream categories that have to be fetched to build this view.
    pub fn sources(self) -> &'static [Source] {
        match self {
            SourceType::Relay => &[Source::Relay],
            SourceType::Bridge => &[Source::Bridge],
            SourceType::All => &[Source::Relay, Source::Bridge],
        }
    }
}

impl From<Source> for SourceType {
    fn from(source: Source) -> Self {
        match source {
            Source::Relay => SourceType::Relay,
            Source::Bridge => SourceType::Bridge,
        }
    }
}

impl FromStr for SourceType {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "relay" | "relays" => Ok(SourceType::Relay),
            "bridge" | "bridges" => Ok(SourceType::Bridge),
            "all" => Ok(SourceType::All),
            other => Err(format!("unknown source type {other:?}")),
        }
    }
}

impl fmt::Display for SourceType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            SourceType::Relay => "relay",
            SourceType::Bridge => "bridge",
            SourceType::All => "all",
        };
        f.write_str(name)
    }
}

/// Forwarded to the anomaly-detection service; controls its analysis window.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Sensitivity {
    Low,
    #[default]
    Medium,
    High,
}

impl Sensitivity {
    pub fn as_param(self) -> &'static str {
        match self {
            Sensitivity::Low => "LOW",
            Sensitivity::Medium => "MEDIUM",
            Sensitivity::High => "HIGH",
        }
    }
}

impl FromStr for Sensitivity {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_uppercase().as_str() {
            "LOW" => Ok(Sensitivity::Low),
            "MEDIUM" => Ok(Sensitivity::Medium),
            "HIGH" => Ok(Sensitivity::High),
            other => Err(format!("unknown sensitivity {other:?}")),
        }
    }
}

#[derive(Deserialize)]
struct RawRange {
    start: NaiveDate,
    end: NaiveDate,
}

/// Inclusive calendar-day range with `start <= end`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "RawRange")]
pub struct DateRange {
    start: NaiveDate,
    end: NaiveDate,
}

impl DateRange {
    pub fn new(start: NaiveDate, end: NaiveDate) -> Result<Self, ValidationError> {
        if start > end {
            return Err(ValidationError::DegenerateRange { start, end });
        }
        Ok(Self { start, end })
    }

    /// The year leading up to `end`.
    pub fn trailing_year(end: NaiveDate) -> Self {
        let start = end.checked_sub_months(Months::new(12)).unwrap_or(end);
        Self { start, end }
    }

    pub fn start(&self) -> NaiveDate {
        self.start
    }

    pub fn end(&self) -> NaiveDate {
        self.end
    }

    pub fn contains(&self, date: NaiveDate) -> bool {
        self.start <= date && date <= self.end
    }

    pub fn iter_days(&self) -> impl Iterator<Item = NaiveDate> {
        let end = self.end;
        self.start.iter_days().take_while(move |day| *day <= end)
    }
}

impl TryFrom<RawRange> for DateRange {
    type Error = ValidationError;

    fn try_from(raw: RawRange) -> Result<Self, Self::Error> {
        Self::new(raw.start, raw.end)
    }
}

impl Default for DateRange {
    fn default() -> Self {
        Self::trailing_year(Utc::now().date_naive())
    }
}

/// Global refresh trigger: changing either field refreshes every target.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct Filter {
    pub source_type: SourceType,
    pub range: DateRange,
}

impl Filter {
    pub fn new(source_type: SourceType, range: DateRange) -> Self {
        Self { source_type, range }
    }
}
