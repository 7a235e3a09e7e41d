use crate::generator::profile::SyntheticSource;
use crate::workflow::config::{Backend, DashboardConfig};
use anyhow::Context;
use futures::future::join_all;
use std::sync::Arc;
use torwatchcore::model::{TargetId, TargetSpec};
use torwatchcore::source::{ApiClient, PortalClient, SourceFetcher};
use torwatchcore::Orchestrator;

pub fn build_fetcher(config: &DashboardConfig) -> anyhow::Result<Arc<dyn SourceFetcher>> {
    let fetcher: Arc<dyn SourceFetcher> = match config.backend {
        Backend::Api => Arc::new(
            ApiClient::new(config.api.clone()).context("building metrics API client")?,
        ),
        Backend::Portal => Arc::new(
            PortalClient::new(config.portal.clone()).context("building metrics portal client")?,
        ),
        Backend::Synthetic => {
            config.synthetic.validate()?;
            Arc::new(SyntheticSource::new(config.synthetic.clone()))
        }
    };
    Ok(fetcher)
}

/// Wires the configured source into an orchestrator and seeds its targets.
#[derive(Clone)]
pub struct Runner {
    orchestrator: Orchestrator,
}

impl Runner {
    pub fn new(config: &DashboardConfig) -> anyhow::Result<Self> {
        let fetcher = build_fetcher(config)?;
        log::info!("using {} source", fetcher.name());
        let filter = config.to_filter()?;
        Ok(Self {
            orchestrator: Orchestrator::new(fetcher, filter),
        })
    }

    pub fn orchestrator(&self) -> &Orchestrator {
        &self.orchestrator
    }

    /// Adds every target; their first refreshes run concurrently.
    pub async fn load_targets(&self, specs: Vec<TargetSpec>) -> Vec<TargetId> {
        join_all(
            specs
                .into_iter()
                .map(|spec| self.orchestrator.add_target(spec)),
        )
        .await
    }
}
