use std::time::Duration;

use chrono::NaiveDate;
use futures::future::{try_join_all, BoxFuture};
use futures::FutureExt;
use log::debug;
use serde::{Deserialize, Serialize};

use crate::model::{CountryCode, DateRange, Record, Source, SourceType};
use crate::prelude::{FetchError, FetchResult};
use crate::source::{DateFormat, SourceBatch, SourceFetcher, SourceQuery};

/// Comment and header lines preceding the data rows of a portal export.
const PREAMBLE_ROWS: usize = 6;
const DATE_COLUMN: usize = 0;
const COUNT_COLUMN: usize = 2;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct PortalConfig {
    pub base_url: String,
    pub timeout_secs: u64,
}

impl Default for PortalConfig {
    fn default() -> Self {
        Self {
            base_url: "https://metrics.torproject.org".into(),
            timeout_secs: 30,
        }
    }
}

/// Legacy client reading per-country CSV exports from the public metrics portal.
/// The portal has no anomaly data and serves one country per request.
pub struct PortalClient {
    client: reqwest::Client,
    config: PortalConfig,
}

impl PortalClient {
    pub fn new(config: PortalConfig) -> FetchResult<Self> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs.max(1)))
            .build()?;
        Ok(Self { client, config })
    }

    pub fn csv_url(&self, source: Source) -> String {
        let kind = match source {
            Source::Relay => "relay",
            Source::Bridge => "bridge",
        };
        format!(
            "{}/userstats-{}-country.csv",
            self.config.base_url.trim_end_matches('/'),
            kind
        )
    }

    async fn fetch_country(
        &self,
        source: Source,
        country: &CountryCode,
        range: &DateRange,
    ) -> FetchResult<Vec<Record>> {
        let url = self.csv_url(source);
        debug!("GET {} country={}", url, country);

        let response = self
            .client
            .get(&url)
            .query(&[
                ("start", range.start().to_string()),
                ("end", range.end().to_string()),
                ("country", country.to_string()),
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

        let body = response.text().await?;
        parse_portal_csv(&body, country)
    }

    async fn fetch_csv(&self, query: &SourceQuery) -> FetchResult<SourceBatch> {
        let source = match query.source_type {
            SourceType::Relay => Source::Relay,
            SourceType::Bridge => Source::Bridge,
            SourceType::All => {
                return Err(FetchError::Unsupported(
                    "the metrics portal serves relay and bridge exports separately".into(),
                ))
            }
        };

        let per_country = try_join_all(
            query
                .countries
                .iter()
                .map(|country| self.fetch_country(source, country, &query.range)),
        )
        .await?;

        let records: Vec<Record> = per_country.into_iter().flatten().collect();
        let date_format = (!records.is_empty()).then_some(DateFormat::Plain);
        Ok(SourceBatch {
            records,
            anomalies: Vec::new(),
            date_format,
        })
    }
}

impl SourceFetcher for PortalClient {
    fn name(&self) -> &str {
        "portal"
    }

    fn fetch<'a>(&'a self, query: &'a SourceQuery) -> BoxFuture<'a, FetchResult<SourceBatch>> {
        self.fetch_csv(query).boxed()
    }
}

/// Parses a portal export, tagging every row with the requested country.
/// Rows with an empty count are days the portal has no estimate for.
pub fn parse_portal_csv(body: &str, country: &CountryCode) -> FetchResult<Vec<Record>> {
    let mut reader = csv::ReaderBuilder::new()
        .has_headers(false)
        .flexible(true)
        .from_reader(body.as_bytes());

    let mut records = Vec::new();
    for row in reader.records().skip(PREAMBLE_ROWS) {
        let row = row.map_err(|err| FetchError::Csv(err.to_string()))?;
        let raw_date = row.get(DATE_COLUMN).unwrap_or_default().trim();
        let raw_count = row.get(COUNT_COLUMN).unwrap_or_default().trim();
        if raw_count.is_empty() {
            continue;
        }

        let date = NaiveDate::parse_from_str(raw_date, "%Y-%m-%d")
            .map_err(|_| FetchError::Csv(format!("bad date {raw_date:?}")))?;
        let count = raw_count
            .parse::<u64>()
            .map_err(|_| FetchError::Csv(format!("bad count {raw_count:?} on {date}")))?;
        records.push(Record::new(date, country.clone(), count));
    }
    Ok(records)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::Sensitivity;
    use std::collections::HashMap;
    use std::net::SocketAddr;
    use warp::Filter;

    const EXPORT: &str = "\
# Tor Metrics portal export
# Estimated number of directly-connecting clients
# Generated for tests
# Columns below
#
date,country,users,lower,upper,frac
2024-01-01,ru,5000,4000,6000,90
2024-01-02,ru,,,,
2024-01-03,ru,5200,4100,6100,91
";

    fn ru() -> CountryCode {
        CountryCode::new("ru").unwrap()
    }

    #[test]
    fn skips_preamble_and_empty_counts() {
        let records = parse_portal_csv(EXPORT, &ru()).unwrap();
        assert_eq!(records.len(), 2);
        assert_eq!(records[0].count, 5000);
        assert_eq!(records[1].date, NaiveDate::from_ymd_opt(2024, 1, 3).unwrap());
        assert!(records.iter().all(|r| r.country == ru()));
    }

    #[test]
    fn rejects_garbage_counts() {
        let body = EXPORT.replace("5200", "lots");
        assert!(matches!(
            parse_portal_csv(&body, &ru()),
            Err(FetchError::Csv(_))
        ));
    }

    #[test]
    fn short_body_yields_nothing() {
        assert!(parse_portal_csv("# only\n# comments\n", &ru())
            .unwrap()
            .is_empty());
    }

    fn spawn_portal() -> SocketAddr {
        let route = warp::path!(String)
            .and(warp::query::<HashMap<String, String>>())
            .map(|file: String, params: HashMap<String, String>| {
                let country = params.get("country").cloned().unwrap_or_default();
                let users = if file.starts_with("userstats-bridge") { 10 } else { 100 };
                let mut body = String::from("#\n#\n#\n#\n#\ndate,country,users,lower,upper,frac\n");
                body.push_str(&format!(
                    "{},{},{},0,0,0\n",
                    params.get("start").cloned().unwrap_or_default(),
                    country,
                    users
                ));
                body
            });
        let (addr, server) = warp::serve(route).bind_ephemeral(([127, 0, 0, 1], 0));
        tokio::spawn(server);
        addr
    }

    #[tokio::test]
    async fn fetches_every_country_separately() {
        let addr = spawn_portal();
        let portal = PortalClient::new(PortalConfig {
            base_url: format!("http://{addr}"),
            timeout_secs: 5,
        })
        .unwrap();
        let range = DateRange::new(
            NaiveDate::from_ymd_opt(2024, 1, 1).unwrap(),
            NaiveDate::from_ymd_opt(2024, 1, 7).unwrap(),
        )
        .unwrap();
        let countries = ["ru", "ee"]
            .iter()
            .map(|code| CountryCode::new(code).unwrap())
            .collect();
        let query =
            SourceQuery::new(SourceType::Bridge, countries, range, Sensitivity::Low).unwrap();

        let batch = portal.fetch(&query).await.unwrap();
        assert_eq!(batch.records.len(), 2);
        assert!(batch.records.iter().all(|r| r.count == 10));
        assert!(batch.anomalies.is_empty());
        assert_eq!(batch.date_format, Some(DateFormat::Plain));

        let all = SourceQuery {
            source_type: SourceType::All,
            ..query
        };
        assert!(matches!(
            portal.fetch(&all).await,
            Err(FetchError::Unsupported(_))
        ));
    }
}
