//! Owns the targets and re-runs fetch, merge and aggregate for each of them
//! whenever the global filter changes.
//!
//! Every target refreshes in its own chain. Chains run concurrently on the
//! caller's task; the store lock is never held across an await point, and a
//! chain only writes back if its generation is still the target's current one.

pub mod store;

use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use futures::future::join_all;

use crate::aggregation::{DateAggregator, SourceMerger};
use crate::model::{DateRange, Filter, Source, SourceType, Target, TargetId, TargetSpec};
use crate::prelude::{DashboardError, DashboardResult};
use crate::source::{SourceFetcher, SourceQuery};
use crate::telemetry::{LogManager, RefreshCounts, RefreshMetrics};

pub use store::{RefreshData, RefreshOutcome, RefreshTicket, TargetStore};

#[derive(Clone)]
pub struct Orchestrator {
    store: Arc<Mutex<TargetStore>>,
    fetcher: Arc<dyn SourceFetcher>,
    metrics: Arc<RefreshMetrics>,
    logger: LogManager,
}

impl Orchestrator {
    pub fn new(fetcher: Arc<dyn SourceFetcher>, filter: Filter) -> Self {
        Self {
            store: Arc::new(Mutex::new(TargetStore::new(filter))),
            fetcher,
            metrics: Arc::new(RefreshMetrics::new()),
            logger: LogManager::new("orchestrator"),
        }
    }

    fn store(&self) -> MutexGuard<'_, TargetStore> {
        self.store.lock().unwrap_or_else(PoisonError::into_inner)
    }

    pub fn filter(&self) -> Filter {
        self.store().filter()
    }

    pub fn targets(&self) -> Vec<Target> {
        self.store().targets()
    }

    pub fn target(&self, id: TargetId) -> Option<Target> {
        self.store().get(id).cloned()
    }

    pub fn metrics(&self) -> RefreshCounts {
        self.metrics.snapshot()
    }

    /// Inserts a new target and refreshes it right away. A failed fetch leaves
    /// the target in the failed state; it is still part of the store.
    pub async fn add_target(&self, spec: TargetSpec) -> TargetId {
        let id = self.store().insert(spec);
        self.logger.record(&format!("added target {id}"));
        self.run_chain(id).await;
        id
    }

    pub fn remove_target(&self, id: TargetId) -> Option<Target> {
        let removed = self.store().remove(id);
        if removed.is_some() {
            self.logger.record(&format!("removed target {id}"));
        }
        removed
    }

    pub async fn set_filter(&self, filter: Filter) -> Vec<(TargetId, RefreshOutcome)> {
        self.store().set_filter(filter);
        self.logger.record(&format!(
            "filter set to {} {}..{}",
            filter.source_type,
            filter.range.start(),
            filter.range.end()
        ));
        self.refresh_all().await
    }

    pub async fn set_source_type(&self, source_type: SourceType) -> Vec<(TargetId, RefreshOutcome)> {
        let filter = Filter {
            source_type,
            ..self.filter()
        };
        self.set_filter(filter).await
    }

    pub async fn set_range(&self, range: DateRange) -> Vec<(TargetId, RefreshOutcome)> {
        let filter = Filter {
            range,
            ..self.filter()
        };
        self.set_filter(filter).await
    }

    /// Refreshes every target concurrently; outcomes are listed by target id.
    pub async fn refresh_all(&self) -> Vec<(TargetId, RefreshOutcome)> {
        let ids = self.store().ids();
        self.refresh_many(ids).await
    }

    pub async fn refresh_target(&self, id: TargetId) -> DashboardResult<RefreshOutcome> {
        self.run_chain(id)
            .await
            .ok_or(DashboardError::UnknownTarget(id))
    }

    /// Retry affordance for a single target, whatever its current state.
    pub async fn retry(&self, id: TargetId) -> DashboardResult<RefreshOutcome> {
        self.refresh_target(id).await
    }

    pub async fn retry_failed(&self) -> Vec<(TargetId, RefreshOutcome)> {
        let ids = self.store().failed_ids();
        self.refresh_many(ids).await
    }

    async fn refresh_many(&self, ids: Vec<TargetId>) -> Vec<(TargetId, RefreshOutcome)> {
        let chains = ids.into_iter().map(|id| async move {
            self.run_chain(id).await.map(|outcome| (id, outcome))
        });
        join_all(chains).await.into_iter().flatten().collect()
    }

    /// One causal chain: begin, fetch, aggregate, apply-if-current.
    async fn run_chain(&self, id: TargetId) -> Option<RefreshOutcome> {
        let ticket = self.store().begin_refresh(id)?;
        self.metrics.record_started();
        self.logger.detail(&format!(
            "refreshing {} generation {} ({})",
            id, ticket.generation, ticket.query.source_type
        ));

        let result = self.fetch_aggregated(&ticket.query).await;
        let outcome = self.store().complete_refresh(&ticket, result);

        match &outcome {
            RefreshOutcome::Applied => self.metrics.record_applied(),
            RefreshOutcome::Failed(failure) => {
                self.metrics.record_failed();
                self.logger
                    .warn(&format!("refresh of {} failed: {}", id, failure.message));
            }
            RefreshOutcome::Superseded | RefreshOutcome::Removed => {
                self.metrics.record_superseded();
                self.logger.detail(&format!(
                    "dropped generation {} result for {}: {:?}",
                    ticket.generation, id, outcome
                ));
            }
        }
        Some(outcome)
    }

    async fn fetch_aggregated(&self, query: &SourceQuery) -> DashboardResult<RefreshData> {
        let batch = if query.source_type == SourceType::All && !self.fetcher.merges_server_side() {
            let relay_query = query.for_source(Source::Relay);
            let bridge_query = query.for_source(Source::Bridge);
            let (relay, bridge) = futures::try_join!(
                self.fetcher.fetch(&relay_query),
                self.fetcher.fetch(&bridge_query)
            )?;
            SourceMerger::merge_batches(vec![relay, bridge])?
        } else {
            self.fetcher.fetch(query).await?
        };

        Ok(RefreshData {
            series: DateAggregator::by_date(&batch.records),
            breakdown: DateAggregator::by_date_and_country(&batch.records),
            anomalies: batch.anomalies,
        })
    }
}
