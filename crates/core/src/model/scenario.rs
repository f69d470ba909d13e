use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::aggregate::{VelocityUnit, total_records, truncate_samples, velocity};

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ScenarioRow {
    pub scenario_id: String,
    pub scenario_version: String,
    pub sources: Vec<String>,
    pub destinations: Vec<String>,
    pub total_count: u64,
    pub first_seen: DateTime<Utc>,
    pub last_seen: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ScenarioDetails {
    pub scenario_id: String,
    pub scenario_version: String,
    pub sources: Vec<String>,
    pub destinations: Vec<String>,
    pub total_count: u64,
    pub velocity: f64,
    pub first_seen: DateTime<Utc>,
    pub last_seen: DateTime<Utc>,
}

impl ScenarioDetails {
    pub fn from_row(row: ScenarioRow, unit: VelocityUnit) -> Self {
        Self {
            velocity: velocity(row.total_count, row.first_seen, row.last_seen, unit),
            scenario_id: row.scenario_id,
            scenario_version: row.scenario_version,
            sources: truncate_samples(row.sources),
            destinations: truncate_samples(row.destinations),
            total_count: row.total_count,
            first_seen: row.first_seen,
            last_seen: row.last_seen,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ScenarioListResponse {
    pub scenarios: Vec<ScenarioDetails>,
}

impl ScenarioListResponse {
    pub fn from_rows(rows: Vec<ScenarioRow>, unit: VelocityUnit) -> Self {
        Self {
            scenarios: rows
                .into_iter()
                .map(|row| ScenarioDetails::from_row(row, unit))
                .collect(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ServiceEdgeRow {
    pub source: String,
    pub destination: String,
    pub trace_count: u64,
    pub protocol_list: Vec<String>,
    pub total_rows: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ServiceMapEntry {
    pub source: String,
    pub destination: String,
    pub trace_count: u64,
    pub protocol_list: Vec<String>,
}

impl From<ServiceEdgeRow> for ServiceMapEntry {
    fn from(row: ServiceEdgeRow) -> Self {
        Self {
            source: workload_name(&row.source),
            destination: workload_name(&row.destination),
            trace_count: row.trace_count,
            protocol_list: row.protocol_list,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ServiceMapResponse {
    pub service_map: Vec<ServiceMapEntry>,
    pub total_records: u64,
}

impl ServiceMapResponse {
    pub fn from_rows(rows: Vec<ServiceEdgeRow>) -> Self {
        let total_records = total_records(&rows, |r| r.total_rows);
        Self {
            service_map: rows.into_iter().map(ServiceMapEntry::from).collect(),
            total_records,
        }
    }
}

/// Drops the replica-set hash and pod suffix from a pod name, e.g.
/// `checkout-7d9f8c-x2x4z` becomes `checkout`.
pub fn workload_name(pod: &str) -> String {
    let parts: Vec<&str> = pod.split('-').collect();
    if parts.len() <= 2 {
        return pod.to_string();
    }
    parts[..parts.len() - 2].join("-")
}
