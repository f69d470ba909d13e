use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct SpanRow {
    pub trace_id: String,
    pub span_id: String,
    pub parent_span_id: Option<String>,
    pub is_root: bool,
    pub kind: Option<String>,
    pub start_time: Option<DateTime<Utc>>,
    pub latency: Option<f64>,
    pub source: Option<String>,
    pub destination: Option<String>,
    pub workload_id_list: Vec<String>,
    pub protocol: Option<String>,
    pub issue_hash_list: Vec<String>,
    pub request_payload_size: Option<i64>,
    pub response_payload_size: Option<i64>,
    pub method: Option<String>,
    pub route: Option<String>,
    pub scheme: Option<String>,
    pub path: Option<String>,
    pub query: Option<String>,
    pub status: Option<i32>,
    pub metadata: Option<String>,
    pub username: Option<String>,
    pub source_ip: Option<String>,
    pub destination_ip: Option<String>,
    pub service_name: Option<String>,
    pub errors: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct SpanDetails {
    pub error: bool,
    pub trace_id: String,
    pub parent_span_id: String,
    pub span_id: String,
    pub is_root: bool,
    pub kind: String,
    pub start_time: Option<DateTime<Utc>>,
    pub latency: f64,
    pub source: String,
    pub destination: String,
    pub workload_id_list: Vec<String>,
    pub protocol: String,
    pub issue_hash_list: Vec<String>,
    pub request_payload_size: i64,
    pub response_payload_size: i64,
    pub method: String,
    pub route: String,
    pub scheme: String,
    pub path: String,
    pub query: String,
    pub status: i32,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub metadata: Option<String>,
    pub username: String,
    pub source_ip: String,
    pub destination_ip: String,
    pub service_name: String,
    pub errors: String,
}

impl From<SpanRow> for SpanDetails {
    fn from(row: SpanRow) -> Self {
        Self {
            // a span is flagged when at least one detected issue points at it
            error: !row.issue_hash_list.is_empty(),
            trace_id: row.trace_id,
            parent_span_id: row.parent_span_id.unwrap_or_default(),
            span_id: row.span_id,
            is_root: row.is_root,
            kind: row.kind.unwrap_or_default(),
            start_time: row.start_time,
            latency: row.latency.unwrap_or_default(),
            source: row.source.unwrap_or_default(),
            destination: row.destination.unwrap_or_default(),
            workload_id_list: row.workload_id_list,
            protocol: row.protocol.unwrap_or_default(),
            issue_hash_list: row.issue_hash_list,
            request_payload_size: row.request_payload_size.unwrap_or_default(),
            response_payload_size: row.response_payload_size.unwrap_or_default(),
            method: row.method.unwrap_or_default(),
            route: row.route.unwrap_or_default(),
            scheme: row.scheme.unwrap_or_default(),
            path: row.path.unwrap_or_default(),
            query: row.query.unwrap_or_default(),
            status: row.status.unwrap_or_default(),
            metadata: row.metadata,
            username: row.username.unwrap_or_default(),
            source_ip: row.source_ip.unwrap_or_default(),
            destination_ip: row.destination_ip.unwrap_or_default(),
            service_name: row.service_name.unwrap_or_default(),
            errors: row.errors.unwrap_or_default(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct SpanListResponse {
    pub spans: BTreeMap<String, SpanDetails>,
}

impl SpanListResponse {
    pub fn from_rows(rows: Vec<SpanRow>) -> Self {
        Self {
            spans: rows
                .into_iter()
                .map(|row| (row.span_id.clone(), SpanDetails::from(row)))
                .collect(),
        }
    }
}
