use chrono::{DateTime, NaiveDateTime, Utc};
use duckdb::Row;
use duckdb::types::Type;
use sightline_core::error::Result;
use sightline_core::filter::{IncidentFilter, IssueFilter, Pagination};
use sightline_core::model::{
    ErrorDataRow, IncidentRow, IssueRow, RawDataRow, ScenarioRow, ServiceEdgeRow, SpanRow,
};

use crate::Store;
use crate::sql::{BuiltQuery, Predicate, QueryBuilder};

// An occurrence is a span tagged with an issue hash whose trace is an
// incident of that same issue.
const ISSUES_SQL: &str = r#"
WITH occurrences AS (
    SELECT i.issue_hash, i.issue_title, i.scenario_id, i.scenario_version,
           s.trace_id, s.source, s.destination, s.start_time
    FROM span s
    JOIN incident inc ON inc.trace_id = s.trace_id
    JOIN issue i ON i.issue_hash = inc.issue_hash
    WHERE list_contains(s.issue_hash_list, i.issue_hash)
      {filters}
),
traces AS (
    SELECT issue_hash, trace_id, MAX(start_time) AS seen_at
    FROM occurrences
    GROUP BY issue_hash, trace_id
),
recent AS (
    SELECT issue_hash,
           TO_JSON(LIST(trace_id ORDER BY seen_at DESC, trace_id))::VARCHAR AS incidents
    FROM traces
    GROUP BY issue_hash
)
SELECT o.issue_hash, o.issue_title, o.scenario_id, o.scenario_version,
       TO_JSON(list_sort(list_distinct(LIST(o.source))))::VARCHAR AS sources,
       TO_JSON(list_sort(list_distinct(LIST(o.destination))))::VARCHAR AS destinations,
       COUNT(DISTINCT o.trace_id) AS total_count,
       MIN(o.start_time) AS first_seen,
       MAX(o.start_time) AS last_seen,
       r.incidents,
       {total}
FROM occurrences o
JOIN recent r ON r.issue_hash = o.issue_hash
GROUP BY o.issue_hash, o.issue_title, o.scenario_id, o.scenario_version, r.incidents
ORDER BY last_seen DESC, o.issue_hash
{page}
"#;

const SCENARIOS_SQL: &str = r#"
WITH occurrences AS (
    SELECT i.scenario_id, i.scenario_version, s.trace_id, s.source, s.destination, s.start_time
    FROM span s
    JOIN incident inc ON inc.trace_id = s.trace_id
    JOIN issue i ON i.issue_hash = inc.issue_hash
    WHERE list_contains(s.issue_hash_list, i.issue_hash)
      {filters}
)
SELECT scenario_id, scenario_version,
       TO_JSON(list_sort(list_distinct(LIST(source))))::VARCHAR AS sources,
       TO_JSON(list_sort(list_distinct(LIST(destination))))::VARCHAR AS destinations,
       COUNT(DISTINCT trace_id) AS total_count,
       MIN(start_time) AS first_seen,
       MAX(start_time) AS last_seen
FROM occurrences
GROUP BY scenario_id, scenario_version
ORDER BY last_seen DESC, scenario_id, scenario_version
"#;

const INCIDENTS_SQL: &str = r#"
WITH scoped AS (
    SELECT inc.trace_id, MAX(inc.incident_collection_time) AS incident_collection_time
    FROM incident inc
    JOIN issue i ON i.issue_hash = inc.issue_hash
    WHERE TRUE
      {filters}
    GROUP BY inc.trace_id
)
SELECT sc.trace_id,
       COALESCE(root.service_name, root.source) AS entry_service,
       COALESCE(root.route, root.path) AS entry_path,
       root.start_time AS root_span_time,
       root.latency AS latency_ns,
       sc.incident_collection_time,
       root.protocol,
       {total}
FROM scoped sc
LEFT JOIN span root ON root.trace_id = sc.trace_id AND root.is_root
ORDER BY sc.incident_collection_time DESC, sc.trace_id
{page}
"#;

const SPANS_SQL: &str = r#"
SELECT s.trace_id, s.span_id, s.parent_span_id, s.is_root, s.kind, s.start_time, s.latency,
       s.source, s.destination, TO_JSON(s.workload_id_list)::VARCHAR, s.protocol,
       TO_JSON(s.issue_hash_list)::VARCHAR, s.request_payload_size, s.response_payload_size,
       s.method, s.route, s.scheme, s.path, s.query, s.status, s.metadata, s.username,
       s.source_ip, s.destination_ip, s.service_name, s.errors
FROM span s
WHERE TRUE
  {filters}
ORDER BY s.start_time DESC, s.span_id
{page}
"#;

const RAW_DATA_SQL: &str = r#"
SELECT r.span_id, s.protocol, r.req_headers, r.resp_headers, r.is_truncated, r.req_body, r.resp_body
FROM span_raw_data r
LEFT JOIN span s ON s.trace_id = r.trace_id AND s.span_id = r.span_id
WHERE TRUE
  {filters}
"#;

const ERROR_DATA_SQL: &str = r#"
SELECT e.id, e.data
FROM error_data e
WHERE TRUE
  {filters}
ORDER BY e.id
"#;

const SERVICE_MAP_SQL: &str = r#"
SELECT s.source, s.destination,
       COUNT(DISTINCT s.trace_id) AS trace_count,
       TO_JSON(list_sort(list_distinct(LIST(s.protocol))))::VARCHAR AS protocol_list,
       {total}
FROM span s
WHERE s.source IS NOT NULL AND s.destination IS NOT NULL
  {filters}
GROUP BY s.source, s.destination
ORDER BY MAX(s.start_time) DESC, s.source, s.destination
{page}
"#;

pub fn issues_query(filter: &IssueFilter, page: Option<Pagination>) -> BuiltQuery {
    let mut builder = QueryBuilder::new(ISSUES_SQL)
        .filter(Predicate::AnyOf(vec![
            Predicate::In("s.source", filter.services.clone()),
            Predicate::In("s.destination", filter.services.clone()),
        ]))
        .filter(Predicate::In("i.scenario_id", filter.scenario_ids.clone()))
        .filter_opt(
            filter
                .issue_hash
                .clone()
                .map(|h| Predicate::Eq("i.issue_hash", h)),
        )
        .filter_opt(filter.since.map(|t| Predicate::AtOrAfter("s.start_time", t)));
    if let Some(page) = page {
        builder = builder.with_total(true).page(page);
    }
    builder.build()
}

pub fn scenarios_query(filter: &IssueFilter) -> BuiltQuery {
    QueryBuilder::new(SCENARIOS_SQL)
        .filter(Predicate::In("i.scenario_id", filter.scenario_ids.clone()))
        .filter(Predicate::AnyOf(vec![
            Predicate::In("s.source", filter.services.clone()),
            Predicate::In("s.destination", filter.services.clone()),
        ]))
        .filter_opt(filter.since.map(|t| Predicate::AtOrAfter("s.start_time", t)))
        .build()
}

pub fn incidents_query(filter: &IncidentFilter, page: Pagination) -> BuiltQuery {
    QueryBuilder::new(INCIDENTS_SQL)
        .filter_opt(
            filter
                .issue_hash
                .clone()
                .map(|h| Predicate::Eq("inc.issue_hash", h)),
        )
        .filter_opt(
            filter
                .scenario_id
                .clone()
                .map(|id| Predicate::Eq("i.scenario_id", id)),
        )
        .filter_opt(
            filter
                .since
                .map(|t| Predicate::AtOrAfter("inc.incident_collection_time", t)),
        )
        .with_total(true)
        .page(page)
        .build()
}

pub fn spans_query(trace_id: &str, span_id: Option<&str>, page: Pagination) -> BuiltQuery {
    QueryBuilder::new(SPANS_SQL)
        .filter(Predicate::Eq("s.trace_id", trace_id.to_string()))
        .filter_opt(span_id.map(|id| Predicate::Eq("s.span_id", id.to_string())))
        .page(page)
        .build()
}

pub fn raw_data_query(trace_id: &str, span_id: &str) -> BuiltQuery {
    QueryBuilder::new(RAW_DATA_SQL)
        .filter(Predicate::Eq("r.trace_id", trace_id.to_string()))
        .filter(Predicate::Eq("r.span_id", span_id.to_string()))
        .build()
}

pub fn error_data_query(ids: &[String]) -> BuiltQuery {
    QueryBuilder::new(ERROR_DATA_SQL)
        .filter(Predicate::In("e.id", ids.to_vec()))
        .build()
}

pub fn service_map_query(since: Option<DateTime<Utc>>, page: Pagination) -> BuiltQuery {
    QueryBuilder::new(SERVICE_MAP_SQL)
        .filter_opt(since.map(|t| Predicate::AtOrAfter("s.start_time", t)))
        .with_total(true)
        .page(page)
        .build()
}

impl Store {
    pub fn list_issues(&self, filter: &IssueFilter, page: Pagination) -> Result<Vec<IssueRow>> {
        self.fetch("list issues", &issues_query(filter, Some(page)), map_issue)
    }

    pub fn get_issue(&self, issue_hash: &str) -> Result<Vec<IssueRow>> {
        let filter = IssueFilter {
            issue_hash: Some(issue_hash.to_string()),
            ..IssueFilter::default()
        };
        self.fetch("get issue", &issues_query(&filter, None), map_issue)
    }

    pub fn list_scenarios(&self, filter: &IssueFilter) -> Result<Vec<ScenarioRow>> {
        self.fetch("list scenarios", &scenarios_query(filter), |row| {
            Ok(ScenarioRow {
                scenario_id: row.get(0)?,
                scenario_version: row.get(1)?,
                sources: json_list(row, 2)?,
                destinations: json_list(row, 3)?,
                total_count: count(row, 4)?,
                first_seen: ts(row, 5)?,
                last_seen: ts(row, 6)?,
            })
        })
    }

    pub fn list_incidents(
        &self,
        filter: &IncidentFilter,
        page: Pagination,
    ) -> Result<Vec<IncidentRow>> {
        self.fetch("list incidents", &incidents_query(filter, page), |row| {
            Ok(IncidentRow {
                trace_id: row.get(0)?,
                entry_service: row.get(1)?,
                entry_path: row.get(2)?,
                root_span_time: opt_ts(row, 3)?,
                latency_ns: row.get(4)?,
                incident_collection_time: ts(row, 5)?,
                protocol: row.get(6)?,
                total_rows: count(row, 7)?,
            })
        })
    }

    pub fn list_spans(
        &self,
        trace_id: &str,
        span_id: Option<&str>,
        page: Pagination,
    ) -> Result<Vec<SpanRow>> {
        self.fetch("list spans", &spans_query(trace_id, span_id, page), |row| {
            Ok(SpanRow {
                trace_id: row.get(0)?,
                span_id: row.get(1)?,
                parent_span_id: row.get(2)?,
                is_root: row.get::<_, Option<bool>>(3)?.unwrap_or(false),
                kind: row.get(4)?,
                start_time: opt_ts(row, 5)?,
                latency: row.get(6)?,
                source: row.get(7)?,
                destination: row.get(8)?,
                workload_id_list: json_list(row, 9)?,
                protocol: row.get(10)?,
                issue_hash_list: json_list(row, 11)?,
                request_payload_size: row.get(12)?,
                response_payload_size: row.get(13)?,
                method: row.get(14)?,
                route: row.get(15)?,
                scheme: row.get(16)?,
                path: row.get(17)?,
                query: row.get(18)?,
                status: row.get(19)?,
                metadata: row.get(20)?,
                username: row.get(21)?,
                source_ip: row.get(22)?,
                destination_ip: row.get(23)?,
                service_name: row.get(24)?,
                errors: row.get(25)?,
            })
        })
    }

    pub fn get_span_raw_data(&self, trace_id: &str, span_id: &str) -> Result<Vec<RawDataRow>> {
        self.fetch(
            "get span raw data",
            &raw_data_query(trace_id, span_id),
            |row| {
                Ok(RawDataRow {
                    span_id: row.get(0)?,
                    protocol: row.get(1)?,
                    req_headers: row.get(2)?,
                    resp_headers: row.get(3)?,
                    is_truncated: row.get(4)?,
                    req_body: row.get(5)?,
                    resp_body: row.get(6)?,
                })
            },
        )
    }

    pub fn get_error_data(&self, ids: &[String]) -> Result<Vec<ErrorDataRow>> {
        if ids.is_empty() {
            return Ok(Vec::new());
        }
        self.fetch("get error data", &error_data_query(ids), |row| {
            Ok(ErrorDataRow {
                id: row.get(0)?,
                data: row.get(1)?,
            })
        })
    }

    pub fn service_map(
        &self,
        since: Option<DateTime<Utc>>,
        page: Pagination,
    ) -> Result<Vec<ServiceEdgeRow>> {
        self.fetch("service map", &service_map_query(since, page), |row| {
            Ok(ServiceEdgeRow {
                source: row.get(0)?,
                destination: row.get(1)?,
                trace_count: count(row, 2)?,
                protocol_list: json_list(row, 3)?,
                total_rows: count(row, 4)?,
            })
        })
    }
}

fn map_issue(row: &Row<'_>) -> duckdb::Result<IssueRow> {
    Ok(IssueRow {
        issue_hash: row.get(0)?,
        issue_title: row.get(1)?,
        scenario_id: row.get(2)?,
        scenario_version: row.get(3)?,
        sources: json_list(row, 4)?,
        destinations: json_list(row, 5)?,
        total_count: count(row, 6)?,
        first_seen: ts(row, 7)?,
        last_seen: ts(row, 8)?,
        incidents: json_list(row, 9)?,
        total_rows: count(row, 10)?,
    })
}

fn ts(row: &Row<'_>, idx: usize) -> duckdb::Result<DateTime<Utc>> {
    Ok(row.get::<_, NaiveDateTime>(idx)?.and_utc())
}

fn opt_ts(row: &Row<'_>, idx: usize) -> duckdb::Result<Option<DateTime<Utc>>> {
    Ok(row
        .get::<_, Option<NaiveDateTime>>(idx)?
        .map(|dt| dt.and_utc()))
}

fn count(row: &Row<'_>, idx: usize) -> duckdb::Result<u64> {
    Ok(row.get::<_, i64>(idx)?.max(0) as u64)
}

/// List columns come back as JSON text; a NULL list is an empty one.
fn json_list(row: &Row<'_>, idx: usize) -> duckdb::Result<Vec<String>> {
    let Some(raw) = row.get::<_, Option<String>>(idx)? else {
        return Ok(Vec::new());
    };
    serde_json::from_str::<Vec<Option<String>>>(&raw)
        .map(|items| items.into_iter().flatten().collect())
        .map_err(|e| duckdb::Error::FromSqlConversionFailure(idx, Type::Text, Box::new(e)))
}

#[cfg(test)]
mod tests {
    use chrono::{Duration, TimeZone};
    use sightline_core::filter::Pagination;
    use sightline_core::payload::compress_bytes;

    use super::*;
    use crate::seed::{IncidentSeed, IssueSeed};

    fn t0() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2026, 2, 1, 0, 0, 0).unwrap()
    }

    fn page(offset: u64, limit: u64) -> Pagination {
        Pagination { offset, limit }
    }

    fn span(trace: &str, id: &str, at: DateTime<Utc>, source: &str, issues: &[&str]) -> SpanRow {
        SpanRow {
            trace_id: trace.to_string(),
            span_id: id.to_string(),
            is_root: id.ends_with("root"),
            start_time: Some(at),
            latency: Some(1500.0),
            source: Some(source.to_string()),
            destination: Some("payments".to_string()),
            protocol: Some("HTTP".to_string()),
            service_name: Some(source.to_string()),
            path: Some("/checkout".to_string()),
            issue_hash_list: issues.iter().map(|s| s.to_string()).collect(),
            workload_id_list: vec!["w1".to_string()],
            ..SpanRow::default()
        }
    }

    // h1 occurs in 7 traces, one per hour; h2 in one trace two days later.
    fn seeded() -> Store {
        let store = Store::open_in_memory().unwrap();
        store
            .insert_issues(&[
                IssueSeed {
                    issue_hash: "h1".into(),
                    issue_title: "checkout returns 5xx".into(),
                    scenario_id: "4".into(),
                    scenario_version: "v2".into(),
                },
                IssueSeed {
                    issue_hash: "h2".into(),
                    issue_title: "slow inventory lookups".into(),
                    scenario_id: "9".into(),
                    scenario_version: "v1".into(),
                },
            ])
            .unwrap();

        let mut incidents = Vec::new();
        let mut spans = Vec::new();
        for i in 0..7 {
            let trace = format!("t{i}");
            let at = t0() + Duration::hours(i);
            incidents.push(IncidentSeed {
                trace_id: trace.clone(),
                issue_hash: "h1".into(),
                incident_collection_time: at,
            });
            spans.push(span(&trace, "root", at, &format!("web-{i}"), &[]));
            spans.push(span(&trace, "s1", at, &format!("web-{i}"), &["h1"]));
        }
        let late = t0() + Duration::days(2);
        incidents.push(IncidentSeed {
            trace_id: "t9".into(),
            issue_hash: "h2".into(),
            incident_collection_time: late,
        });
        spans.push(span("t9", "root", late, "inventory", &["h2"]));

        store.insert_incidents(&incidents).unwrap();
        store.insert_spans(&spans).unwrap();
        store
    }

    #[test]
    fn list_issues_orders_by_recency_with_window_total() {
        let store = seeded();
        let rows = store
            .list_issues(&IssueFilter::default(), page(0, 10))
            .unwrap();
        assert_eq!(rows.len(), 2);
        assert_eq!(rows[0].issue_hash, "h2");
        assert_eq!(rows[1].issue_hash, "h1");
        assert!(rows.iter().all(|r| r.total_rows == 2));
        assert_eq!(rows[1].total_count, 7);
        assert_eq!(rows[1].first_seen, t0());
        assert_eq!(rows[1].last_seen, t0() + Duration::hours(6));
    }

    #[test]
    fn total_rows_is_stable_across_offsets() {
        let store = seeded();
        let first = store
            .list_issues(&IssueFilter::default(), page(0, 1))
            .unwrap();
        let second = store
            .list_issues(&IssueFilter::default(), page(1, 1))
            .unwrap();
        assert_eq!(first.len(), 1);
        assert_eq!(second.len(), 1);
        assert_eq!(first[0].total_rows, second[0].total_rows);
        assert_ne!(first[0].issue_hash, second[0].issue_hash);
    }

    #[test]
    fn incidents_sample_is_most_recent_first() {
        let store = seeded();
        let rows = store.get_issue("h1").unwrap();
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0].incidents.len(), 7);
        assert_eq!(rows[0].incidents[0], "t6");
        assert_eq!(rows[0].incidents[6], "t0");
        assert_eq!(rows[0].destinations, vec!["payments"]);
        assert_eq!(rows[0].total_rows, 0);
    }

    #[test]
    fn unknown_issue_is_empty() {
        let store = seeded();
        assert!(store.get_issue("unknown-hash").unwrap().is_empty());
    }

    #[test]
    fn empty_filter_lists_match_absent_dimension() {
        let store = seeded();
        let absent = store
            .list_issues(&IssueFilter::default(), page(0, 10))
            .unwrap();
        let empty = store
            .list_issues(
                &IssueFilter {
                    services: Vec::new(),
                    scenario_ids: Vec::new(),
                    ..IssueFilter::default()
                },
                page(0, 10),
            )
            .unwrap();
        assert_eq!(absent, empty);
    }

    #[test]
    fn service_filter_matches_source_or_destination() {
        let store = seeded();
        let by_source = store
            .list_issues(
                &IssueFilter {
                    services: vec!["inventory".into()],
                    ..IssueFilter::default()
                },
                page(0, 10),
            )
            .unwrap();
        assert_eq!(by_source.len(), 1);
        assert_eq!(by_source[0].issue_hash, "h2");

        let by_destination = store
            .list_issues(
                &IssueFilter {
                    services: vec!["payments".into()],
                    scenario_ids: vec!["4".into()],
                    ..IssueFilter::default()
                },
                page(0, 10),
            )
            .unwrap();
        assert_eq!(by_destination.len(), 1);
        assert_eq!(by_destination[0].issue_hash, "h1");
    }

    #[test]
    fn since_filter_restricts_occurrences() {
        let store = seeded();
        let rows = store
            .list_issues(
                &IssueFilter {
                    since: Some(t0() + Duration::hours(5)),
                    ..IssueFilter::default()
                },
                page(0, 10),
            )
            .unwrap();
        let h1 = rows.iter().find(|r| r.issue_hash == "h1").unwrap();
        assert_eq!(h1.total_count, 2);
    }

    #[test]
    fn list_incidents_joins_root_span() {
        let store = seeded();
        let rows = store
            .list_incidents(
                &IncidentFilter {
                    issue_hash: Some("h1".into()),
                    ..IncidentFilter::default()
                },
                page(0, 3),
            )
            .unwrap();
        assert_eq!(rows.len(), 3);
        assert_eq!(rows[0].trace_id, "t6");
        assert_eq!(rows[0].total_rows, 7);
        assert_eq!(rows[0].entry_service.as_deref(), Some("web-6"));
        assert_eq!(rows[0].entry_path.as_deref(), Some("/checkout"));
        assert_eq!(rows[0].latency_ns, Some(1500.0));

        let by_scenario = store
            .list_incidents(
                &IncidentFilter {
                    scenario_id: Some("9".into()),
                    ..IncidentFilter::default()
                },
                page(0, 10),
            )
            .unwrap();
        assert_eq!(by_scenario.len(), 1);
        assert_eq!(by_scenario[0].trace_id, "t9");
    }

    #[test]
    fn list_spans_reads_list_columns() {
        let store = seeded();
        let rows = store.list_spans("t3", None, page(0, 10)).unwrap();
        assert_eq!(rows.len(), 2);
        let s1 = rows.iter().find(|r| r.span_id == "s1").unwrap();
        assert_eq!(s1.issue_hash_list, vec!["h1"]);
        assert_eq!(s1.workload_id_list, vec!["w1"]);
        let root = rows.iter().find(|r| r.span_id == "root").unwrap();
        assert!(root.is_root);
        assert!(root.issue_hash_list.is_empty());

        let one = store.list_spans("t3", Some("s1"), page(0, 10)).unwrap();
        assert_eq!(one.len(), 1);
        assert!(store.list_spans("nope", None, page(0, 10)).unwrap().is_empty());
    }

    #[test]
    fn raw_and_error_data_round_trip_blobs() {
        let store = seeded();
        let body = compress_bytes(b"{\"ok\":false}").unwrap();
        store
            .insert_raw_data(
                "t3",
                &[RawDataRow {
                    span_id: "s1".into(),
                    req_body: Some(body.clone()),
                    is_truncated: Some(false),
                    ..RawDataRow::default()
                }],
            )
            .unwrap();
        let rows = store.get_span_raw_data("t3", "s1").unwrap();
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0].req_body.as_deref(), Some(body.as_slice()));
        assert_eq!(rows[0].protocol.as_deref(), Some("HTTP"));
        assert!(rows[0].resp_body.is_none());

        store
            .insert_error_data(&[ErrorDataRow {
                id: "e1".into(),
                data: Some(body),
            }])
            .unwrap();
        let errors = store
            .get_error_data(&["e1".to_string(), "missing".to_string()])
            .unwrap();
        assert_eq!(errors.len(), 1);
        assert!(store.get_error_data(&[]).unwrap().is_empty());
    }

    #[test]
    fn scenarios_and_service_map() {
        let store = seeded();
        let scenarios = store
            .list_scenarios(&IssueFilter {
                scenario_ids: vec!["4".into(), "9".into()],
                ..IssueFilter::default()
            })
            .unwrap();
        assert_eq!(scenarios.len(), 2);
        assert_eq!(scenarios[0].scenario_id, "9");
        assert_eq!(scenarios[1].total_count, 7);

        let edges = store.service_map(None, page(0, 100)).unwrap();
        assert_eq!(edges.len(), 8);
        assert_eq!(edges[0].source, "inventory");
        assert!(edges.iter().all(|e| e.total_rows == 8));
        assert_eq!(edges[0].protocol_list, vec!["HTTP"]);
    }

    #[test]
    fn builder_output_drops_empty_dimensions() {
        let q = issues_query(&IssueFilter::default(), Some(page(0, 5)));
        assert!(q.params.is_empty());
        assert!(!q.sql.contains(" IN ("));
        assert!(q.sql.contains("COUNT(*) OVER ()"));

        let q = error_data_query(&["a".into(), "b".into()]);
        assert!(q.sql.contains("e.id IN (?, ?)"));
    }
}
