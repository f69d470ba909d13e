use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::aggregate::total_records;

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct IncidentRow {
    pub trace_id: String,
    pub entry_service: Option<String>,
    pub entry_path: Option<String>,
    pub root_span_time: Option<DateTime<Utc>>,
    pub latency_ns: Option<f64>,
    pub incident_collection_time: DateTime<Utc>,
    pub protocol: Option<String>,
    pub total_rows: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct IncidentDetail {
    pub incident_id: String,
    pub entry_service: String,
    pub entry_path: String,
    pub root_span_time: Option<DateTime<Utc>>,
    pub latency_ns: Option<f64>,
    pub incident_collection_time: DateTime<Utc>,
    pub protocol: String,
}

impl From<IncidentRow> for IncidentDetail {
    fn from(row: IncidentRow) -> Self {
        Self {
            incident_id: row.trace_id,
            entry_service: row.entry_service.unwrap_or_default(),
            entry_path: row.entry_path.unwrap_or_default(),
            root_span_time: row.root_span_time,
            latency_ns: row.latency_ns,
            incident_collection_time: row.incident_collection_time,
            protocol: row.protocol.unwrap_or_default(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct IncidentListResponse {
    #[serde(rename = "trace_det_list")]
    pub incidents: Vec<IncidentDetail>,
    pub total_records: u64,
}

impl IncidentListResponse {
    pub fn from_rows(rows: Vec<IncidentRow>) -> Self {
        let total_records = total_records(&rows, |r| r.total_rows);
        Self {
            incidents: rows.into_iter().map(IncidentDetail::from).collect(),
            total_records,
        }
    }
}
