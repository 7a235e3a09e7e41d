use std::collections::BTreeSet;
use std::fmt;

use serde::{Deserialize, Serialize};

use crate::model::filter::Sensitivity;
use crate::model::record::{AnomalyInterval, CountryCode, Record, Series};
use crate::prelude::{RefreshFailure, ValidationError};

const MIN_NAME_LEN: usize = 3;

/// Stable store-assigned identifier; never reused within a store.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct TargetId(pub u64);

impl fmt::Display for TargetId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// Operator-supplied definition of a target.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TargetSpec {
    pub name: String,
    pub countries: BTreeSet<CountryCode>,
    pub sensitivity: Sensitivity,
}

impl TargetSpec {
    /// Validates raw form input. Without a name, the country codes are joined
    /// into one (`"RU, US"`); an explicit name needs at least three characters.
    pub fn new<I, S>(
        name: Option<&str>,
        countries: I,
        sensitivity: Sensitivity,
    ) -> Result<Self, ValidationError>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let countries = countries
            .into_iter()
            .map(|code| CountryCode::new(code.as_ref()))
            .collect::<Result<BTreeSet<_>, _>>()?;
        if countries.is_empty() {
            return Err(ValidationError::EmptyCountries);
        }

        let name = match name.map(str::trim).filter(|name| !name.is_empty()) {
            Some(name) if name.chars().count() < MIN_NAME_LEN => {
                return Err(ValidationError::NameTooShort(name.to_string()));
            }
            Some(name) => name.to_string(),
            None => countries
                .iter()
                .map(|code| code.as_str().to_ascii_uppercase())
                .collect::<Vec<_>>()
                .join(", "),
        };

        Ok(Self {
            name,
            countries,
            sensitivity,
        })
    }
}

/// Refresh lifecycle of a target.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "state", rename_all = "snake_case")]
pub enum TargetState {
    Stale,
    Fetching,
    Ready,
    Failed(RefreshFailure),
}

impl TargetState {
    pub fn is_failed(&self) -> bool {
        matches!(self, TargetState::Failed(_))
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct Target {
    pub id: TargetId,
    pub spec: TargetSpec,
    pub state: TargetState,
    /// Bumped each time a refresh chain starts; results from older chains are dropped.
    pub generation: u64,
    pub series: Series,
    /// Per-country series, ordered by date then country.
    pub breakdown: Vec<Record>,
    pub anomalies: Vec<AnomalyInterval>,
}

impl Target {
    pub fn new(id: TargetId, spec: TargetSpec) -> Self {
        Self {
            id,
            spec,
            state: TargetState::Stale,
            generation: 0,
            series: Vec::new(),
            breakdown: Vec::new(),
            anomalies: Vec::new(),
        }
    }

    pub fn name(&self) -> &str {
        &self.spec.name
    }

    pub(crate) fn clear_data(&mut self) {
        self.series.clear();
        self.breakdown.clear();
        self.anomalies.clear();
    }
}
