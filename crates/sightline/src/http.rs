use axum::extract::rejection::{JsonRejection, PathRejection, QueryRejection};
use axum::extract::{Path, Query, Request, State};
use axum::http::{HeaderValue, Method, StatusCode};
use axum::middleware::{self, Next};
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post};
use axum::{Json, Router};
use serde::Serialize;
use sightline_core::error::{Result, SightlineError};
use sightline_core::model::{
    ErrorDataResponse, IncidentListResponse, IssueListResponse, IssueResponse,
    ScenarioListResponse, ServiceMapResponse, SpanListResponse, SpanRawDataResponse,
};
use sightline_core::query::{
    ErrorDataRequest, IncidentListParams, IssueListParams, ScenarioListParams, ServiceMapParams,
    SpanListParams, StatusResponse,
};
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;
use tracing::{Instrument, Level, error};

use crate::service::IssueService;

const REQUEST_ID: &str = "x-request-id";

#[derive(Clone)]
pub struct AppState {
    pub service: IssueService,
    pub debug: bool,
}

pub fn router(state: AppState) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods([Method::GET, Method::POST, Method::OPTIONS])
        .allow_headers(Any);

    Router::new()
        .route("/v1/issues", get(list_issues))
        .route("/v1/issues/{issue_hash}", get(get_issue))
        .route("/v1/issues/{issue_hash}/incidents", get(list_issue_incidents))
        .route("/v1/incidents/{trace_id}/spans", get(list_spans))
        .route(
            "/v1/incidents/{trace_id}/spans/{span_id}/raw",
            get(get_span_raw_data),
        )
        .route("/v1/errors", post(get_error_data))
        .route("/v1/scenarios", get(list_scenarios))
        .route(
            "/v1/scenarios/{scenario_id}/incidents",
            get(list_scenario_incidents),
        )
        .route("/v1/service-map", get(service_map))
        .route("/v1/status", get(status))
        .layer(cors)
        .layer(
            TraceLayer::new_for_http()
                .on_request(tower_http::trace::DefaultOnRequest::new().level(Level::INFO))
                .on_response(tower_http::trace::DefaultOnResponse::new().level(Level::INFO)),
        )
        .layer(middleware::from_fn(request_id))
        .with_state(state)
}

/// Reuses the caller's `x-request-id` or mints one, scopes the request's
/// logs to it and echoes it on the response.
async fn request_id(req: Request, next: Next) -> Response {
    let id = req
        .headers()
        .get(REQUEST_ID)
        .and_then(|v| v.to_str().ok())
        .map_or_else(|| uuid::Uuid::new_v4().to_string(), ToOwned::to_owned);

    let span = tracing::info_span!("request", request_id = %id);
    let mut resp = next.run(req).instrument(span).await;
    if let Ok(value) = HeaderValue::from_str(&id) {
        resp.headers_mut().insert(REQUEST_ID, value);
    }
    resp
}

#[derive(Debug, Serialize)]
struct Envelope<T> {
    payload: Option<T>,
    error: Option<ErrorBody>,
}

#[derive(Debug, Serialize)]
struct ErrorBody {
    kind: &'static str,
    status: u16,
    message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    detail: Option<String>,
}

pub struct ApiError {
    err: SightlineError,
    debug: bool,
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status =
            StatusCode::from_u16(self.err.status()).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR);
        if status.is_server_error() {
            error!(kind = self.err.kind(), error = %self.err, "request failed");
        }

        // caller-facing problems keep their text, server faults stay generic
        let message = match &self.err {
            SightlineError::BadRequest(msg)
            | SightlineError::Parse(msg)
            | SightlineError::NotFound(msg) => msg.clone(),
            other => other.public_message().to_string(),
        };

        let body = Envelope::<()> {
            payload: None,
            error: Some(ErrorBody {
                kind: self.err.kind(),
                status: status.as_u16(),
                message,
                detail: self.debug.then(|| self.err.to_string()),
            }),
        };
        (status, Json(body)).into_response()
    }
}

type ApiResult<T> = std::result::Result<Json<Envelope<T>>, ApiError>;

fn reply<T: Serialize>(state: &AppState, result: Result<T>) -> ApiResult<T> {
    result
        .map(|payload| {
            Json(Envelope {
                payload: Some(payload),
                error: None,
            })
        })
        .map_err(|err| ApiError {
            err,
            debug: state.debug,
        })
}

type QueryArg<T> = std::result::Result<Query<T>, QueryRejection>;
type PathArg<T> = std::result::Result<Path<T>, PathRejection>;

fn query_arg<T>(arg: QueryArg<T>) -> Result<T> {
    arg.map(|Query(v)| v)
        .map_err(|rejection| SightlineError::BadRequest(rejection.body_text()))
}

fn path_arg<T>(arg: PathArg<T>) -> Result<T> {
    arg.map(|Path(v)| v)
        .map_err(|rejection| SightlineError::BadRequest(rejection.body_text()))
}

async fn list_issues(
    State(state): State<AppState>,
    params: QueryArg<IssueListParams>,
) -> ApiResult<IssueListResponse> {
    let result = async { state.service.list_issues(query_arg(params)?).await }.await;
    reply(&state, result)
}

async fn get_issue(
    State(state): State<AppState>,
    issue_hash: PathArg<String>,
) -> ApiResult<IssueResponse> {
    let result = async { state.service.get_issue(&path_arg(issue_hash)?).await }.await;
    reply(&state, result)
}

async fn list_issue_incidents(
    State(state): State<AppState>,
    issue_hash: PathArg<String>,
    params: QueryArg<IncidentListParams>,
) -> ApiResult<IncidentListResponse> {
    let result = async {
        let issue_hash = path_arg(issue_hash)?;
        state
            .service
            .list_issue_incidents(&issue_hash, query_arg(params)?)
            .await
    }
    .await;
    reply(&state, result)
}

async fn list_scenario_incidents(
    State(state): State<AppState>,
    scenario_id: PathArg<String>,
    params: QueryArg<IncidentListParams>,
) -> ApiResult<IncidentListResponse> {
    let result = async {
        let scenario_id = path_arg(scenario_id)?;
        state
            .service
            .list_scenario_incidents(&scenario_id, query_arg(params)?)
            .await
    }
    .await;
    reply(&state, result)
}

async fn list_spans(
    State(state): State<AppState>,
    trace_id: PathArg<String>,
    params: QueryArg<SpanListParams>,
) -> ApiResult<SpanListResponse> {
    let result = async {
        let trace_id = path_arg(trace_id)?;
        state
            .service
            .list_spans(&trace_id, query_arg(params)?)
            .await
    }
    .await;
    reply(&state, result)
}

async fn get_span_raw_data(
    State(state): State<AppState>,
    ids: PathArg<(String, String)>,
) -> ApiResult<SpanRawDataResponse> {
    let result = async {
        let (trace_id, span_id) = path_arg(ids)?;
        state.service.get_span_raw_data(&trace_id, &span_id).await
    }
    .await;
    reply(&state, result)
}

async fn get_error_data(
    State(state): State<AppState>,
    body: std::result::Result<Json<ErrorDataRequest>, JsonRejection>,
) -> ApiResult<ErrorDataResponse> {
    let result = match body {
        Ok(Json(req)) => state.service.get_error_data(req.error_ids).await,
        Err(rejection) => Err(SightlineError::BadRequest(rejection.body_text())),
    };
    reply(&state, result)
}

async fn list_scenarios(
    State(state): State<AppState>,
    params: QueryArg<ScenarioListParams>,
) -> ApiResult<ScenarioListResponse> {
    let result = async { state.service.list_scenarios(query_arg(params)?).await }.await;
    reply(&state, result)
}

async fn service_map(
    State(state): State<AppState>,
    params: QueryArg<ServiceMapParams>,
) -> ApiResult<ServiceMapResponse> {
    let result = async { state.service.service_map(query_arg(params)?).await }.await;
    reply(&state, result)
}

async fn status(State(state): State<AppState>) -> ApiResult<StatusResponse> {
    let result = state.service.status().await;
    reply(&state, result)
}
