use std::collections::BTreeMap;

use serde::Serialize;

use crate::model::{AnomalyInterval, Filter, Record, Series, Target, TargetId, TargetSpec, TargetState};
use crate::prelude::{DashboardResult, RefreshFailure};
use crate::source::SourceQuery;

/// How one refresh chain ended.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum RefreshOutcome {
    Applied,
    Failed(RefreshFailure),
    /// A newer chain started for the target before this one resolved.
    Superseded,
    /// The target was deleted while the chain was in flight.
    Removed,
}

/// Aggregated data ready to be applied to a target.
#[derive(Debug, Clone, Default)]
pub struct RefreshData {
    pub series: Series,
    pub breakdown: Vec<Record>,
    pub anomalies: Vec<AnomalyInterval>,
}

/// Captured at chain start; the result is applied only if `generation` is still current.
#[derive(Debug, Clone)]
pub struct RefreshTicket {
    pub id: TargetId,
    pub generation: u64,
    pub query: SourceQuery,
}

/// Explicit target store; every mutation goes through these transitions.
#[derive(Debug, Default)]
pub struct TargetStore {
    filter: Filter,
    targets: BTreeMap<TargetId, Target>,
    next_id: u64,
}

impl TargetStore {
    pub fn new(filter: Filter) -> Self {
        Self {
            filter,
            targets: BTreeMap::new(),
            next_id: 0,
        }
    }

    pub fn filter(&self) -> Filter {
        self.filter
    }

    pub fn set_filter(&mut self, filter: Filter) {
        self.filter = filter;
    }

    pub fn insert(&mut self, spec: TargetSpec) -> TargetId {
        self.next_id += 1;
        let id = TargetId(self.next_id);
        self.targets.insert(id, Target::new(id, spec));
        id
    }

    pub fn remove(&mut self, id: TargetId) -> Option<Target> {
        self.targets.remove(&id)
    }

    pub fn get(&self, id: TargetId) -> Option<&Target> {
        self.targets.get(&id)
    }

    pub fn ids(&self) -> Vec<TargetId> {
        self.targets.keys().copied().collect()
    }

    pub fn failed_ids(&self) -> Vec<TargetId> {
        self.targets
            .values()
            .filter(|target| target.state.is_failed())
            .map(|target| target.id)
            .collect()
    }

    pub fn targets(&self) -> Vec<Target> {
        self.targets.values().cloned().collect()
    }

    /// STALE/READY/FAILED -> FETCHING. Previous data is cleared, not kept.
    pub fn begin_refresh(&mut self, id: TargetId) -> Option<RefreshTicket> {
        let filter = self.filter;
        let target = self.targets.get_mut(&id)?;
        target.generation += 1;
        target.state = TargetState::Fetching;
        target.clear_data();

        Some(RefreshTicket {
            id,
            generation: target.generation,
            query: SourceQuery {
                source_type: filter.source_type,
                countries: target.spec.countries.clone(),
                range: filter.range,
                sensitivity: target.spec.sensitivity,
            },
        })
    }

    /// FETCHING -> READY | FAILED, unless the ticket has been overtaken.
    pub fn complete_refresh(
        &mut self,
        ticket: &RefreshTicket,
        result: DashboardResult<RefreshData>,
    ) -> RefreshOutcome {
        let Some(target) = self.targets.get_mut(&ticket.id) else {
            return RefreshOutcome::Removed;
        };
        if target.generation != ticket.generation {
            return RefreshOutcome::Superseded;
        }

        match result {
            Ok(data) => {
                target.series = data.series;
                target.breakdown = data.breakdown;
                target.anomalies = data.anomalies;
                target.state = TargetState::Ready;
                RefreshOutcome::Applied
            }
            Err(err) => {
                let failure = RefreshFailure::from(&err);
                target.state = TargetState::Failed(failure.clone());
                RefreshOutcome::Failed(failure)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{Sensitivity, SeriesPoint};
    use crate::prelude::{DashboardError, FailureKind, FetchError};
    use chrono::NaiveDate;

    fn spec() -> TargetSpec {
        TargetSpec::new(Some("Russia"), ["ru"], Sensitivity::Medium).unwrap()
    }

    fn data(count: u64) -> RefreshData {
        RefreshData {
            series: vec![SeriesPoint::new(
                NaiveDate::from_ymd_opt(2024, 1, 1).unwrap(),
                count,
            )],
            ..RefreshData::default()
        }
    }

    #[test]
    fn ids_are_never_reused() {
        let mut store = TargetStore::default();
        let first = store.insert(spec());
        store.remove(first);
        let second = store.insert(spec());
        assert_ne!(first, second);
    }

    #[test]
    fn duplicate_names_are_distinct_targets() {
        let mut store = TargetStore::default();
        let a = store.insert(spec());
        let b = store.insert(spec());
        assert_ne!(a, b);
        assert_eq!(store.targets().len(), 2);
    }

    #[test]
    fn begin_clears_previous_data() {
        let mut store = TargetStore::default();
        let id = store.insert(spec());
        let ticket = store.begin_refresh(id).unwrap();
        store.complete_refresh(&ticket, Ok(data(3)));
        assert_eq!(store.get(id).unwrap().series.len(), 1);

        store.begin_refresh(id).unwrap();
        let target = store.get(id).unwrap();
        assert_eq!(target.state, TargetState::Fetching);
        assert!(target.series.is_empty());
    }

    #[test]
    fn overtaken_ticket_is_ignored() {
        let mut store = TargetStore::default();
        let id = store.insert(spec());
        let stale = store.begin_refresh(id).unwrap();
        let fresh = store.begin_refresh(id).unwrap();

        assert_eq!(store.complete_refresh(&fresh, Ok(data(50))), RefreshOutcome::Applied);
        assert_eq!(
            store.complete_refresh(&stale, Ok(data(1))),
            RefreshOutcome::Superseded
        );
        assert_eq!(store.get(id).unwrap().series[0].count, 50);
    }

    #[test]
    fn failure_is_recorded_on_the_target() {
        let mut store = TargetStore::default();
        let id = store.insert(spec());
        let ticket = store.begin_refresh(id).unwrap();
        let err = DashboardError::from(FetchError::Transport("refused".into()));
        let outcome = store.complete_refresh(&ticket, Err(err));
        assert!(matches!(outcome, RefreshOutcome::Failed(ref f) if f.kind == FailureKind::Fetch));
        assert!(store.get(id).unwrap().state.is_failed());
        assert_eq!(store.failed_ids(), vec![id]);
    }

    #[test]
    fn removed_target_drops_result() {
        let mut store = TargetStore::default();
        let id = store.insert(spec());
        let ticket = store.begin_refresh(id).unwrap();
        store.remove(id);
        assert_eq!(
            store.complete_refresh(&ticket, Ok(data(1))),
            RefreshOutcome::Removed
        );
    }
}
