use crate::gui_bridge::model::{FilterView, NewTarget, TargetView};
use serde_json::json;
use std::convert::Infallible;
use std::net::SocketAddr;
use torwatchcore::model::{DateRange, Filter, TargetId, TargetSpec};
use torwatchcore::{DashboardError, Orchestrator};
use warp::http::StatusCode;
use warp::reply::Response;
use warp::{Filter as _, Rejection, Reply};

fn error_reply(status: StatusCode, message: impl ToString) -> Response {
    warp::reply::with_status(
        warp::reply::json(&json!({ "error": message.to_string() })),
        status,
    )
    .into_response()
}

fn target_reply(orchestrator: &Orchestrator, id: TargetId, status: StatusCode) -> Response {
    match orchestrator.target(id) {
        Some(target) => {
            warp::reply::with_status(warp::reply::json(&TargetView::from(&target)), status)
                .into_response()
        }
        None => error_reply(StatusCode::NOT_FOUND, DashboardError::UnknownTarget(id)),
    }
}

async fn create_target(body: NewTarget, orchestrator: Orchestrator) -> Result<Response, Infallible> {
    let spec = match TargetSpec::new(body.name.as_deref(), &body.countries, body.sensitivity) {
        Ok(spec) => spec,
        Err(err) => return Ok(error_reply(StatusCode::BAD_REQUEST, err)),
    };
    let id = orchestrator.add_target(spec).await;
    Ok(target_reply(&orchestrator, id, StatusCode::CREATED))
}

async fn retry_target(id: u64, orchestrator: Orchestrator) -> Result<Response, Infallible> {
    let id = TargetId(id);
    match orchestrator.retry(id).await {
        Ok(_) => Ok(target_reply(&orchestrator, id, StatusCode::OK)),
        Err(err) => Ok(error_reply(StatusCode::NOT_FOUND, err)),
    }
}

async fn replace_filter(body: FilterView, orchestrator: Orchestrator) -> Result<Response, Infallible> {
    let range = match DateRange::new(body.from, body.to) {
        Ok(range) => range,
        Err(err) => return Ok(error_reply(StatusCode::BAD_REQUEST, err)),
    };
    let outcomes = orchestrator
        .set_filter(Filter::new(body.source_type, range))
        .await;
    let refreshed: Vec<_> = outcomes
        .into_iter()
        .map(|(id, outcome)| json!({ "id": id, "result": outcome }))
        .collect();
    Ok(warp::reply::json(&json!({
        "filter": FilterView::from(orchestrator.filter()),
        "refreshed": refreshed,
    }))
    .into_response())
}

/// HTTP surface over the target store for an external presentation layer.
pub fn routes(
    orchestrator: Orchestrator,
) -> impl warp::Filter<Extract = (impl Reply,), Error = Rejection> + Clone {
    let state = warp::any().map(move || orchestrator.clone());

    let list = warp::path!("targets")
        .and(warp::get())
        .and(state.clone())
        .map(|orchestrator: Orchestrator| {
            let views: Vec<TargetView> = orchestrator.targets().iter().map(TargetView::from).collect();
            warp::reply::json(&views).into_response()
        });

    let create = warp::path!("targets")
        .and(warp::post())
        .and(warp::body::json())
        .and(state.clone())
        .and_then(create_target);

    let delete = warp::path!("targets" / u64)
        .and(warp::delete())
        .and(state.clone())
        .map(|id: u64, orchestrator: Orchestrator| {
            match orchestrator.remove_target(TargetId(id)) {
                Some(_) => StatusCode::NO_CONTENT.into_response(),
                None => error_reply(StatusCode::NOT_FOUND, DashboardError::UnknownTarget(TargetId(id))),
            }
        });

    let retry = warp::path!("targets" / u64 / "retry")
        .and(warp::post())
        .and(state.clone())
        .and_then(retry_target);

    let get_filter = warp::path!("filter")
        .and(warp::get())
        .and(state.clone())
        .map(|orchestrator: Orchestrator| {
            warp::reply::json(&FilterView::from(orchestrator.filter())).into_response()
        });

    let put_filter = warp::path!("filter")
        .and(warp::put())
        .and(warp::body::json())
        .and(state.clone())
        .and_then(replace_filter);

    let metrics = warp::path!("metrics")
        .and(warp::get())
        .and(state)
        .map(|orchestrator: Orchestrator| warp::reply::json(&orchestrator.metrics()).into_response());

    list.or(create)
        .or(delete)
        .or(retry)
        .or(get_filter)
        .or(put_filter)
        .or(metrics)
}

/// Bridge that hosts the dashboard HTTP endpoint.
pub struct GuiBridge {
    orchestrator: Orchestrator,
}

impl GuiBridge {
    pub fn new(orchestrator: Orchestrator) -> Self {
        Self { orchestrator }
    }

    pub async fn serve(self, addr: SocketAddr) {
        log::info!("HTTP bridge listening on {}", addr);
        warp::serve(routes(self.orchestrator)).run(addr).await;
    }

    pub fn publish_status(&self, message: &str) {
        println!("[GUI] {}", message);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::generator::profile::{GeneratorConfig, SyntheticSource};
    use chrono::NaiveDate;
    use serde_json::Value;
    use std::sync::Arc;
    use torwatchcore::model::SourceType;

    fn orchestrator() -> Orchestrator {
        let range = DateRange::new(
            NaiveDate::from_ymd_opt(2024, 1, 1).unwrap(),
            NaiveDate::from_ymd_opt(2024, 1, 14).unwrap(),
        )
        .unwrap();
        Orchestrator::new(
            Arc::new(SyntheticSource::new(GeneratorConfig::default())),
            Filter::new(SourceType::Relay, range),
        )
    }

    fn body_json(body: &[u8]) -> Value {
        serde_json::from_slice(body).unwrap()
    }

    #[tokio::test]
    async fn create_list_and_delete_target() {
        let api = routes(orchestrator());

        let created = warp::test::request()
            .method("POST")
            .path("/targets")
            .json(&json!({ "countries": ["ru", "us"], "sensitivity": "HIGH" }))
            .reply(&api)
            .await;
        assert_eq!(created.status(), StatusCode::CREATED);
        let view = body_json(created.body());
        assert_eq!(view["name"], "RU, US");
        assert_eq!(view["status"]["state"], "ready");
        assert_eq!(view["series"].as_array().unwrap().len(), 14);
        assert_eq!(view["weekly"].as_array().unwrap().len(), 14);
        let id = view["id"].as_u64().unwrap();

        let listed = warp::test::request().path("/targets").reply(&api).await;
        assert_eq!(body_json(listed.body()).as_array().unwrap().len(), 1);

        let deleted = warp::test::request()
            .method("DELETE")
            .path(&format!("/targets/{id}"))
            .reply(&api)
            .await;
        assert_eq!(deleted.status(), StatusCode::NO_CONTENT);

        let missing = warp::test::request()
            .method("DELETE")
            .path(&format!("/targets/{id}"))
            .reply(&api)
            .await;
        assert_eq!(missing.status(), StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn invalid_target_is_rejected_before_fetching() {
        let orchestrator = orchestrator();
        let api = routes(orchestrator.clone());
        let response = warp::test::request()
            .method("POST")
            .path("/targets")
            .json(&json!({ "countries": [] }))
            .reply(&api)
            .await;
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        assert_eq!(orchestrator.metrics().started, 0);
    }

    #[tokio::test]
    async fn filter_change_refreshes_targets() {
        let orchestrator = orchestrator();
        let api = routes(orchestrator.clone());
        warp::test::request()
            .method("POST")
            .path("/targets")
            .json(&json!({ "name": "Germany", "countries": ["de"] }))
            .reply(&api)
            .await;

        let response = warp::test::request()
            .method("PUT")
            .path("/filter")
            .json(&json!({ "source_type": "all", "from": "2024-02-01", "to": "2024-02-29" }))
            .reply(&api)
            .await;
        assert_eq!(response.status(), StatusCode::OK);
        let body = body_json(response.body());
        assert_eq!(body["filter"]["source_type"], "all");
        assert_eq!(body["refreshed"][0]["result"]["outcome"], "applied");
        assert_eq!(orchestrator.targets()[0].series.len(), 29);

        let reversed = warp::test::request()
            .method("PUT")
            .path("/filter")
            .json(&json!({ "source_type": "relay", "from": "2024-03-01", "to": "2024-02-01" }))
            .reply(&api)
            .await;
        assert_eq!(reversed.status(), StatusCode::BAD_REQUEST);
        assert_eq!(orchestrator.filter().source_type, SourceType::All);
    }

    #[tokio::test]
    async fn retry_unknown_target_is_not_found() {
        let api = routes(orchestrator());
        let response = warp::test::request()
            .method("POST")
            .path("/targets/99/retry")
            .reply(&api)
            .await;
        assert_eq!(response.status(), StatusCode::NOT_FOUND);

        let metrics = warp::test::request().path("/metrics").reply(&api).await;
        assert_eq!(body_json(metrics.body())["started"], 0);
    }
}
