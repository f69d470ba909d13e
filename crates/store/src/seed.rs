use chrono::{DateTime, Utc};
use duckdb::params;
use sightline_core::error::{Result, SightlineError};
use sightline_core::model::{ErrorDataRow, RawDataRow, SpanRow};

use crate::Store;
use crate::sql::ts_param;

#[derive(Debug, Clone)]
pub struct IssueSeed {
    pub issue_hash: String,
    pub issue_title: String,
    pub scenario_id: String,
    pub scenario_version: String,
}

#[derive(Debug, Clone)]
pub struct IncidentSeed {
    pub trace_id: String,
    pub issue_hash: String,
    pub incident_collection_time: DateTime<Utc>,
}

/// Fixture loading for tests. Production data arrives through a separate
/// ingestion process.
impl Store {
    pub fn insert_issues(&self, issues: &[IssueSeed]) -> Result<()> {
        let mut conn = self.conn()?;
        let tx = conn
            .transaction()
            .map_err(|e| SightlineError::Db(format!("begin tx failed: {e}")))?;
        {
            let mut stmt = tx
                .prepare(
                    "INSERT OR REPLACE INTO issue (issue_hash, issue_title, scenario_id, scenario_version)
                     VALUES (?, ?, ?, ?)",
                )
                .map_err(|e| SightlineError::Db(format!("prepare insert issue failed: {e}")))?;
            for issue in issues {
                stmt.execute(params![
                    issue.issue_hash,
                    issue.issue_title,
                    issue.scenario_id,
                    issue.scenario_version,
                ])
                .map_err(|e| SightlineError::Db(format!("insert issue failed: {e}")))?;
            }
        }
        tx.commit()
            .map_err(|e| SightlineError::Db(format!("commit issues failed: {e}")))
    }

    pub fn insert_incidents(&self, incidents: &[IncidentSeed]) -> Result<()> {
        let mut conn = self.conn()?;
        let tx = conn
            .transaction()
            .map_err(|e| SightlineError::Db(format!("begin tx failed: {e}")))?;
        {
            let mut stmt = tx
                .prepare(
                    "INSERT OR REPLACE INTO incident (trace_id, issue_hash, incident_collection_time)
                     VALUES (?, ?, CAST(? AS TIMESTAMP))",
                )
                .map_err(|e| SightlineError::Db(format!("prepare insert incident failed: {e}")))?;
            for incident in incidents {
                stmt.execute(params![
                    incident.trace_id,
                    incident.issue_hash,
                    ts_param(incident.incident_collection_time),
                ])
                .map_err(|e| SightlineError::Db(format!("insert incident failed: {e}")))?;
            }
        }
        tx.commit()
            .map_err(|e| SightlineError::Db(format!("commit incidents failed: {e}")))
    }

    pub fn insert_spans(&self, spans: &[SpanRow]) -> Result<()> {
        let mut conn = self.conn()?;
        let tx = conn
            .transaction()
            .map_err(|e| SightlineError::Db(format!("begin tx failed: {e}")))?;
        {
            let mut stmt = tx
                .prepare(
                    "INSERT OR REPLACE INTO span
                     (trace_id, span_id, parent_span_id, is_root, kind, start_time, latency, source,
                      destination, workload_id_list, protocol, issue_hash_list, request_payload_size,
                      response_payload_size, method, route, scheme, path, query, status, metadata,
                      username, source_ip, destination_ip, service_name, errors)
                     VALUES (?, ?, ?, ?, ?, CAST(? AS TIMESTAMP), ?, ?, ?, CAST(CAST(? AS JSON) AS VARCHAR[]),
                             ?, CAST(CAST(? AS JSON) AS VARCHAR[]), ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)",
                )
                .map_err(|e| SightlineError::Db(format!("prepare insert span failed: {e}")))?;
            for span in spans {
                let start_time = span.start_time.map(ts_param).ok_or_else(|| {
                    SightlineError::Parse(format!("span {} has no start time", span.span_id))
                })?;
                stmt.execute(params![
                    span.trace_id,
                    span.span_id,
                    span.parent_span_id,
                    span.is_root,
                    span.kind,
                    start_time,
                    span.latency,
                    span.source,
                    span.destination,
                    json_list(&span.workload_id_list)?,
                    span.protocol,
                    json_list(&span.issue_hash_list)?,
                    span.request_payload_size,
                    span.response_payload_size,
                    span.method,
                    span.route,
                    span.scheme,
                    span.path,
                    span.query,
                    span.status,
                    span.metadata,
                    span.username,
                    span.source_ip,
                    span.destination_ip,
                    span.service_name,
                    span.errors,
                ])
                .map_err(|e| SightlineError::Db(format!("insert span failed: {e}")))?;
            }
        }
        tx.commit()
            .map_err(|e| SightlineError::Db(format!("commit spans failed: {e}")))
    }

    pub fn insert_raw_data(&self, trace_id: &str, rows: &[RawDataRow]) -> Result<()> {
        let mut conn = self.conn()?;
        let tx = conn
            .transaction()
            .map_err(|e| SightlineError::Db(format!("begin tx failed: {e}")))?;
        {
            let mut stmt = tx
                .prepare(
                    "INSERT OR REPLACE INTO span_raw_data
                     (trace_id, span_id, req_headers, resp_headers, is_truncated, req_body, resp_body)
                     VALUES (?, ?, ?, ?, ?, ?, ?)",
                )
                .map_err(|e| SightlineError::Db(format!("prepare insert raw data failed: {e}")))?;
            for row in rows {
                stmt.execute(params![
                    trace_id,
                    row.span_id,
                    row.req_headers,
                    row.resp_headers,
                    row.is_truncated,
                    row.req_body,
                    row.resp_body,
                ])
                .map_err(|e| SightlineError::Db(format!("insert raw data failed: {e}")))?;
            }
        }
        tx.commit()
            .map_err(|e| SightlineError::Db(format!("commit raw data failed: {e}")))
    }

    pub fn insert_error_data(&self, rows: &[ErrorDataRow]) -> Result<()> {
        let mut conn = self.conn()?;
        let tx = conn
            .transaction()
            .map_err(|e| SightlineError::Db(format!("begin tx failed: {e}")))?;
        {
            let mut stmt = tx
                .prepare("INSERT OR REPLACE INTO error_data (id, data) VALUES (?, ?)")
                .map_err(|e| SightlineError::Db(format!("prepare insert error failed: {e}")))?;
            for row in rows {
                stmt.execute(params![row.id, row.data])
                    .map_err(|e| SightlineError::Db(format!("insert error failed: {e}")))?;
            }
        }
        tx.commit()
            .map_err(|e| SightlineError::Db(format!("commit errors failed: {e}")))
    }
}

fn json_list(items: &[String]) -> Result<Option<String>> {
    if items.is_empty() {
        return Ok(None);
    }
    serde_json::to_string(items)
        .map(Some)
        .map_err(|e| SightlineError::Internal(format!("encode list failed: {e}")))
}
