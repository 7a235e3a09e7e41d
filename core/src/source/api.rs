use std::time::Duration;

use futures::future::BoxFuture;
use futures::FutureExt;
use log::debug;
use serde::{Deserialize, Serialize};

use crate::model::{DateRange, SourceType};
use crate::prelude::{FetchError, FetchResult};
use crate::source::{wire, SourceBatch, SourceFetcher, SourceQuery};

/// Settings for the dashboard's metrics backend.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ApiConfig {
    pub base_url: String,
    pub timeout_secs: u64,
    /// Request `/v1/metrics/all` instead of merging relays and bridges locally.
    pub server_merge: bool,
}

impl Default for ApiConfig {
    fn default() -> Self {
        Self {
            base_url: "http://localhost:8080".into(),
            timeout_secs: 30,
            server_merge: true,
        }
    }
}

/// JSON client for `GET /v1/metrics/{relays,bridges,all}`.
pub struct ApiClient {
    client: reqwest::Client,
    config: ApiConfig,
}

impl ApiClient {
    pub fn new(config: ApiConfig) -> FetchResult<Self> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs.max(1)))
            .build()?;
        Ok(Self { client, config })
    }

    pub fn config(&self) -> &ApiConfig {
        &self.config
    }

    pub fn endpoint(&self, source_type: SourceType) -> String {
        let path = match source_type {
            SourceType::Relay => "relays",
            SourceType::Bridge => "bridges",
            SourceType::All => "all",
        };
        format!(
            "{}/v1/metrics/{}",
            self.config.base_url.trim_end_matches('/'),
            path
        )
    }

    async fn fetch_json(&self, query: &SourceQuery) -> FetchResult<SourceBatch> {
        if query.source_type == SourceType::All && !self.config.server_merge {
            return Err(FetchError::Unsupported(
                "server-side merge disabled; fetch relay and bridge separately".into(),
            ));
        }

        let url = self.endpoint(query.source_type);
        let (from, to) = range_bounds(&query.range);
        debug!("GET {} countries={} from={} to={}", url, query.countries_param(), from, to);

        let response = self
            .client
            .get(&url)
            .query(&[
                ("from", from),
                ("to", to),
                ("countries", query.countries_param()),
                ("sensitivity", query.sensitivity.as_param().to_string()),
            ])
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            return Err(FetchError::Status {
                status: status.as_u16(),
                url,
            });
        }

        let body = response.bytes().await?;
        wire::parse_metrics_response(&body)
    }
}

impl SourceFetcher for ApiClient {
    fn name(&self) -> &str {
        "api"
    }

    fn merges_server_side(&self) -> bool {
        self.config.server_merge
    }

    fn fetch<'a>(&'a self, query: &'a SourceQuery) -> BoxFuture<'a, FetchResult<SourceBatch>> {
        self.fetch_json(query).boxed()
    }
}

/// `from` at the start of the first day, `to` at the end of the last, both UTC.
fn range_bounds(range: &DateRange) -> (String, String) {
    (
        format!("{}T00:00:00Z", range.start()),
        format!("{}T23:59:59Z", range.end()),
    )
}
