use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::aggregate::{VelocityUnit, total_records, truncate_samples, velocity};

/// One aggregated issue as scanned from the grouped issue query.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct IssueRow {
    pub issue_hash: String,
    pub issue_title: String,
    pub scenario_id: String,
    pub scenario_version: String,
    pub sources: Vec<String>,
    pub destinations: Vec<String>,
    pub total_count: u64,
    pub first_seen: DateTime<Utc>,
    pub last_seen: DateTime<Utc>,
    pub incidents: Vec<String>,
    pub total_rows: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct IssueDetails {
    pub issue_hash: String,
    pub issue_title: String,
    pub scenario_id: String,
    pub scenario_version: String,
    pub sources: Vec<String>,
    pub destinations: Vec<String>,
    pub total_count: u64,
    pub velocity: f64,
    pub first_seen: DateTime<Utc>,
    pub last_seen: DateTime<Utc>,
    pub incidents: Vec<String>,
}

impl IssueDetails {
    pub fn from_row(row: IssueRow, unit: VelocityUnit) -> Self {
        Self {
            velocity: velocity(row.total_count, row.first_seen, row.last_seen, unit),
            issue_hash: row.issue_hash,
            issue_title: row.issue_title,
            scenario_id: row.scenario_id,
            scenario_version: row.scenario_version,
            sources: truncate_samples(row.sources),
            destinations: truncate_samples(row.destinations),
            total_count: row.total_count,
            first_seen: row.first_seen,
            last_seen: row.last_seen,
            incidents: truncate_samples(row.incidents),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct IssueListResponse {
    pub issues: Vec<IssueDetails>,
    pub total_records: u64,
}

impl IssueListResponse {
    pub fn from_rows(rows: Vec<IssueRow>, unit: VelocityUnit) -> Self {
        let total_records = total_records(&rows, |r| r.total_rows);
        Self {
            issues: rows
                .into_iter()
                .map(|row| IssueDetails::from_row(row, unit))
                .collect(),
            total_records,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct IssueResponse {
    pub issue: IssueDetails,
}
