use std::time::Duration;

use sightline_core::aggregate::VelocityUnit;
use sightline_core::config::Config;
use sightline_core::error::{Result, SightlineError};
use sightline_core::filter::{IncidentFilter, require_id, sanitize_ids};
use sightline_core::model::{
    ErrorDataResponse, IncidentListResponse, IssueDetails, IssueListResponse, IssueResponse,
    ScenarioListResponse, ServiceMapResponse, SpanListResponse, SpanRawDataResponse,
};
use sightline_core::query::{
    IncidentListParams, IssueListParams, ScenarioListParams, ServiceMapParams, SpanListParams,
    StatusResponse,
};
use sightline_core::time::parse_optional_start_time;
use sightline_store::Store;
use tracing::{error, instrument, warn};

#[derive(Debug, Clone, Copy)]
pub struct ServiceSettings {
    pub max_page_limit: u64,
    pub query_timeout: Duration,
    pub velocity_unit: VelocityUnit,
}

impl From<&Config> for ServiceSettings {
    fn from(cfg: &Config) -> Self {
        Self {
            max_page_limit: cfg.max_page_limit,
            query_timeout: cfg.query_timeout,
            velocity_unit: cfg.velocity_unit,
        }
    }
}

/// Validates requests, runs store lookups on the blocking pool under the
/// query timeout, and assembles responses.
#[derive(Clone)]
pub struct IssueService {
    store: Store,
    settings: ServiceSettings,
}

impl IssueService {
    pub fn new(store: Store, settings: ServiceSettings) -> Self {
        Self { store, settings }
    }

    #[instrument(skip(self))]
    pub async fn list_issues(&self, params: IssueListParams) -> Result<IssueListResponse> {
        let filter = params.filter()?;
        let page = params.page(self.settings.max_page_limit)?;
        let rows = self
            .run("list issues", move |store| store.list_issues(&filter, page))
            .await?;
        Ok(IssueListResponse::from_rows(rows, self.settings.velocity_unit))
    }

    #[instrument(skip(self))]
    pub async fn get_issue(&self, issue_hash: &str) -> Result<IssueResponse> {
        let issue_hash = require_id("issue hash", issue_hash)?;
        let lookup = issue_hash.clone();
        let rows = self
            .run("get issue", move |store| store.get_issue(&lookup))
            .await?;
        let row = rows
            .into_iter()
            .next()
            .ok_or_else(|| SightlineError::NotFound(format!("issue {issue_hash} not found")))?;
        Ok(IssueResponse {
            issue: IssueDetails::from_row(row, self.settings.velocity_unit),
        })
    }

    #[instrument(skip(self))]
    pub async fn list_issue_incidents(
        &self,
        issue_hash: &str,
        params: IncidentListParams,
    ) -> Result<IncidentListResponse> {
        let issue_hash = require_id("issue hash", issue_hash)?;
        let filter = IncidentFilter {
            issue_hash: Some(issue_hash),
            ..params.filter()?
        };
        self.list_incidents(filter, &params).await
    }

    #[instrument(skip(self))]
    pub async fn list_scenario_incidents(
        &self,
        scenario_id: &str,
        params: IncidentListParams,
    ) -> Result<IncidentListResponse> {
        let scenario_id = require_id("scenario id", scenario_id)?;
        let filter = IncidentFilter {
            scenario_id: Some(scenario_id),
            ..params.filter()?
        };
        self.list_incidents(filter, &params).await
    }

    async fn list_incidents(
        &self,
        filter: IncidentFilter,
        params: &IncidentListParams,
    ) -> Result<IncidentListResponse> {
        let page = params.page(self.settings.max_page_limit)?;
        let rows = self
            .run("list incidents", move |store| {
                store.list_incidents(&filter, page)
            })
            .await?;
        Ok(IncidentListResponse::from_rows(rows))
    }

    #[instrument(skip(self))]
    pub async fn list_spans(
        &self,
        trace_id: &str,
        params: SpanListParams,
    ) -> Result<SpanListResponse> {
        let trace_id = require_id("trace id", trace_id)?;
        let span_id = params.span_id();
        let page = params.page(self.settings.max_page_limit)?;
        let lookup = trace_id.clone();
        let rows = self
            .run("list spans", move |store| {
                store.list_spans(&lookup, span_id.as_deref(), page)
            })
            .await?;
        if rows.is_empty() {
            return Err(SightlineError::NotFound(format!(
                "no spans for trace {trace_id}"
            )));
        }
        Ok(SpanListResponse::from_rows(rows))
    }

    #[instrument(skip(self))]
    pub async fn get_span_raw_data(
        &self,
        trace_id: &str,
        span_id: &str,
    ) -> Result<SpanRawDataResponse> {
        let trace_id = require_id("trace id", trace_id)?;
        let span_id = require_id("span id", span_id)?;
        let (t, s) = (trace_id.clone(), span_id.clone());
        let rows = self
            .run("get span raw data", move |store| {
                store.get_span_raw_data(&t, &s)
            })
            .await?;
        if rows.is_empty() {
            return Err(SightlineError::NotFound(format!(
                "no raw data for span {span_id} in trace {trace_id}"
            )));
        }
        SpanRawDataResponse::from_rows(&rows).inspect_err(|e| {
            error!(error = %e, "raw payload could not be decoded");
        })
    }

    #[instrument(skip(self))]
    pub async fn get_error_data(&self, error_ids: Vec<String>) -> Result<ErrorDataResponse> {
        let ids = sanitize_ids(&error_ids);
        if ids.is_empty() {
            return Err(SightlineError::BadRequest(
                "error id list cannot be empty".to_string(),
            ));
        }
        let rows = self
            .run("get error data", move |store| store.get_error_data(&ids))
            .await?;
        ErrorDataResponse::from_rows(&rows).inspect_err(|e| {
            error!(error = %e, "stored error could not be decoded");
        })
    }

    #[instrument(skip(self))]
    pub async fn list_scenarios(&self, params: ScenarioListParams) -> Result<ScenarioListResponse> {
        let filter = params.filter()?;
        if filter.scenario_ids.is_empty() {
            return Err(SightlineError::BadRequest(
                "scenario id list cannot be empty".to_string(),
            ));
        }
        let rows = self
            .run("list scenarios", move |store| store.list_scenarios(&filter))
            .await?;
        Ok(ScenarioListResponse::from_rows(
            rows,
            self.settings.velocity_unit,
        ))
    }

    #[instrument(skip(self))]
    pub async fn service_map(&self, params: ServiceMapParams) -> Result<ServiceMapResponse> {
        let since = parse_optional_start_time(params.st.as_deref())?;
        let page = params.page(self.settings.max_page_limit)?;
        let rows = self
            .run("service map", move |store| store.service_map(since, page))
            .await?;
        Ok(ServiceMapResponse::from_rows(rows))
    }

    pub async fn status(&self) -> Result<StatusResponse> {
        self.run("status", |store| store.status()).await
    }

    async fn run<T, F>(&self, op: &'static str, f: F) -> Result<T>
    where
        F: FnOnce(&Store) -> Result<T> + Send + 'static,
        T: Send + 'static,
    {
        // one connection per call so a runaway statement can be cancelled
        // without stalling the others
        let (store, interrupt) = self.store.session()?;
        let task = tokio::task::spawn_blocking(move || f(&store));
        match tokio::time::timeout(self.settings.query_timeout, task).await {
            Ok(Ok(result)) => result,
            Ok(Err(e)) => {
                error!(op, error = %e, "query task failed");
                Err(SightlineError::Internal(format!("{op} task failed")))
            }
            Err(_) => {
                interrupt.interrupt();
                warn!(
                    op,
                    timeout_ms = self.settings.query_timeout.as_millis() as u64,
                    "query timed out"
                );
                Err(SightlineError::Db(format!("{op} timed out")))
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use testkit::{CHECKOUT_ISSUE, CORRUPT_TRACE, INVENTORY_ISSUE, seeded_store};

    use super::*;

    fn settings() -> ServiceSettings {
        ServiceSettings {
            max_page_limit: 100,
            query_timeout: Duration::from_secs(10),
            velocity_unit: VelocityUnit::Hour,
        }
    }

    fn service() -> IssueService {
        IssueService::new(seeded_store().unwrap(), settings())
    }

    fn page(offset: &str, limit: &str) -> IssueListParams {
        IssueListParams {
            offset: Some(offset.to_string()),
            limit: Some(limit.to_string()),
            ..IssueListParams::default()
        }
    }

    #[tokio::test]
    async fn known_issue_reports_true_total_and_five_samples() {
        let resp = service().get_issue(CHECKOUT_ISSUE).await.unwrap();
        assert_eq!(resp.issue.total_count, 7);
        assert_eq!(resp.issue.incidents.len(), 5);
        assert_eq!(resp.issue.incidents[0], "trace-06");
        assert_eq!(resp.issue.scenario_id, "4");
        assert!((resp.issue.velocity - 7.0 / 6.0).abs() < 1e-6);
    }

    #[tokio::test]
    async fn unknown_issue_is_not_found() {
        let err = service().get_issue("unknown-hash").await.unwrap_err();
        assert!(matches!(err, SightlineError::NotFound(_)));
        let err = service().get_issue("  ").await.unwrap_err();
        assert!(matches!(err, SightlineError::BadRequest(_)));
    }

    #[tokio::test]
    async fn pagination_is_validated_before_querying() {
        let svc = service();
        for (offset, limit) in [("0", "0"), ("-1", "10"), ("0", "101"), ("x", "10")] {
            let err = svc.list_issues(page(offset, limit)).await.unwrap_err();
            assert!(matches!(err, SightlineError::BadRequest(_)), "{offset}/{limit}");
        }
    }

    #[tokio::test]
    async fn total_records_is_stable_across_pages() {
        let svc = service();
        let first = svc.list_issues(page("0", "1")).await.unwrap();
        let second = svc.list_issues(page("1", "1")).await.unwrap();
        let past_end = svc.list_issues(page("5", "1")).await.unwrap();

        assert_eq!(first.issues.len(), 1);
        assert_eq!(first.issues[0].issue_hash, INVENTORY_ISSUE);
        assert_eq!(second.issues[0].issue_hash, CHECKOUT_ISSUE);
        assert_eq!(first.total_records, 2);
        assert_eq!(second.total_records, 2);
        assert!(past_end.issues.is_empty());
        assert_eq!(past_end.total_records, 0);
    }

    #[tokio::test]
    async fn blank_service_filter_equals_absent_filter() {
        let svc = service();
        let absent = svc.list_issues(IssueListParams::default()).await.unwrap();
        let blank = svc
            .list_issues(IssueListParams {
                services: Some(",".into()),
                scenario_ids: Some(String::new()),
                ..IssueListParams::default()
            })
            .await
            .unwrap();
        assert_eq!(absent, blank);

        let filtered = svc
            .list_issues(IssueListParams {
                services: Some("inventory-55d4c-q1w2e".into()),
                ..IssueListParams::default()
            })
            .await
            .unwrap();
        assert_eq!(filtered.issues.len(), 1);
        assert_eq!(filtered.issues[0].issue_hash, INVENTORY_ISSUE);
    }

    #[tokio::test]
    async fn incidents_for_issue_and_scenario() {
        let svc = service();
        let resp = svc
            .list_issue_incidents(
                CHECKOUT_ISSUE,
                IncidentListParams {
                    limit: Some("2".into()),
                    ..IncidentListParams::default()
                },
            )
            .await
            .unwrap();
        assert_eq!(resp.incidents.len(), 2);
        assert_eq!(resp.total_records, 7);
        assert_eq!(resp.incidents[0].incident_id, "trace-06");
        assert_eq!(resp.incidents[0].entry_service, "checkout");
        assert_eq!(resp.incidents[0].entry_path, "/v1/checkout");

        let resp = svc
            .list_scenario_incidents("9", IncidentListParams::default())
            .await
            .unwrap();
        assert_eq!(resp.total_records, 1);
        assert_eq!(resp.incidents[0].incident_id, "trace-10");

        let empty = svc
            .list_issue_incidents("unknown-hash", IncidentListParams::default())
            .await
            .unwrap();
        assert!(empty.incidents.is_empty());
        assert_eq!(empty.total_records, 0);
    }

    #[tokio::test]
    async fn spans_are_keyed_and_flagged() {
        let svc = service();
        let resp = svc
            .list_spans("trace-02", SpanListParams::default())
            .await
            .unwrap();
        assert_eq!(resp.spans.len(), 2);
        assert!(resp.spans["db"].error);
        assert!(!resp.spans["root"].error);
        assert_eq!(resp.spans["db"].parent_span_id, "root");

        let err = svc
            .list_spans("trace-99", SpanListParams::default())
            .await
            .unwrap_err();
        assert!(matches!(err, SightlineError::NotFound(_)));
    }

    #[tokio::test]
    async fn raw_data_decompresses_or_fails_whole() {
        let svc = service();
        let resp = svc.get_span_raw_data("trace-03", "db").await.unwrap();
        let details = &resp.span_raw_data_details["db"];
        assert_eq!(details.req_body, "{\"account\":\"a-17\"}");
        assert_eq!(details.resp_headers, "content-type: application/json");
        assert_eq!(details.protocol, "HTTP");

        let err = svc.get_span_raw_data(CORRUPT_TRACE, "db").await.unwrap_err();
        assert!(matches!(err, SightlineError::Internal(_)));

        let err = svc.get_span_raw_data("trace-03", "root").await.unwrap_err();
        assert!(matches!(err, SightlineError::NotFound(_)));
    }

    #[tokio::test]
    async fn error_data_is_a_partial_map() {
        let svc = service();
        let resp = svc
            .get_error_data(vec!["err-1".into(), "err-2".into(), "missing".into()])
            .await
            .unwrap();
        assert_eq!(resp.errors.len(), 2);
        assert!(resp.errors["err-1"].data.contains("Connection reset"));
        assert_eq!(resp.errors["err-2"].data, "");

        let err = svc.get_error_data(vec![" ".into()]).await.unwrap_err();
        assert!(matches!(err, SightlineError::BadRequest(_)));
    }

    #[tokio::test]
    async fn scenarios_require_ids() {
        let svc = service();
        let err = svc
            .list_scenarios(ScenarioListParams::default())
            .await
            .unwrap_err();
        assert!(matches!(err, SightlineError::BadRequest(_)));

        let resp = svc
            .list_scenarios(ScenarioListParams {
                scenario_ids: Some("4".into()),
                ..ScenarioListParams::default()
            })
            .await
            .unwrap();
        assert_eq!(resp.scenarios.len(), 1);
        assert_eq!(resp.scenarios[0].total_count, 7);
    }

    #[tokio::test]
    async fn service_map_uses_workload_names() {
        let resp = service()
            .service_map(ServiceMapParams::default())
            .await
            .unwrap();
        assert_eq!(resp.total_records, 4);
        assert!(
            resp.service_map
                .iter()
                .any(|e| e.source == "web" && e.destination == "checkout" && e.trace_count == 7)
        );
    }

    #[tokio::test]
    async fn timed_out_query_is_cancelled_and_store_stays_usable() {
        let store = seeded_store().unwrap();
        let impatient = IssueService::new(
            store.clone(),
            ServiceSettings {
                query_timeout: Duration::from_millis(200),
                ..settings()
            },
        );
        let svc = IssueService::new(store, settings());

        let heavy = sightline_store::sql::QueryBuilder::new(
            "SELECT COUNT(*) FROM range(100000000) a, range(100000000) b WHERE a.range + b.range = -1",
        )
        .build();
        let started = std::time::Instant::now();
        let err = impatient
            .run("heavy", move |store| {
                store.fetch("heavy", &heavy, |row| row.get::<_, i64>(0))
            })
            .await
            .unwrap_err();
        assert!(matches!(err, SightlineError::Db(ref msg) if msg == "heavy timed out"));

        let status = svc.status().await.unwrap();
        assert_eq!(status.issues_count, 2);
        let issue = impatient.get_issue(CHECKOUT_ISSUE).await.unwrap();
        assert_eq!(issue.issue.total_count, 7);
        assert!(started.elapsed() < Duration::from_secs(5));
    }

    #[tokio::test]
    async fn slow_queries_time_out_as_db_errors() {
        let svc = IssueService::new(
            sightline_store::Store::open_in_memory().unwrap(),
            ServiceSettings {
                query_timeout: Duration::from_millis(20),
                ..settings()
            },
        );
        let err = svc
            .run("sleepy", |_| {
                std::thread::sleep(Duration::from_millis(300));
                Ok(())
            })
            .await
            .unwrap_err();
        match err {
            SightlineError::Db(msg) => assert_eq!(msg, "sleepy timed out"),
            other => panic!("unexpected error: {other:?}"),
        }
    }
}
