use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::{Result, SightlineError};

pub const DEFAULT_OFFSET: i64 = 0;
pub const DEFAULT_LIMIT: i64 = 50;

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub struct Pagination {
    pub offset: u64,
    pub limit: u64,
}

impl Pagination {
    pub fn new(offset: i64, limit: i64, max_limit: u64) -> Result<Self> {
        if offset < 0 {
            return Err(SightlineError::BadRequest(format!(
                "offset must be >= 0, got {offset}"
            )));
        }
        if limit < 1 {
            return Err(SightlineError::BadRequest(format!(
                "limit must be >= 1, got {limit}"
            )));
        }
        if limit as u64 > max_limit {
            return Err(SightlineError::BadRequest(format!(
                "limit must be <= {max_limit}, got {limit}"
            )));
        }
        Ok(Self {
            offset: offset as u64,
            limit: limit as u64,
        })
    }

    /// Validates the raw query-string values a handler extracts. Absent or
    /// blank values fall back to the defaults.
    pub fn parse(offset: Option<&str>, limit: Option<&str>, max_limit: u64) -> Result<Self> {
        let offset = parse_int("offset", offset)?.unwrap_or(DEFAULT_OFFSET);
        let limit = parse_int("limit", limit)?.unwrap_or(DEFAULT_LIMIT.min(max_limit as i64));
        Self::new(offset, limit, max_limit)
    }
}

fn parse_int(name: &str, raw: Option<&str>) -> Result<Option<i64>> {
    match raw.map(str::trim) {
        None | Some("") => Ok(None),
        Some(v) => v.parse::<i64>().map(Some).map_err(|_| {
            SightlineError::BadRequest(format!("{name} is not an integer: {v}"))
        }),
    }
}

/// Splits a comma-separated filter value, dropping blank entries. An empty
/// result means the dimension is absent.
pub fn parse_list(raw: Option<&str>) -> Vec<String> {
    raw.map(|v| {
        v.split(',')
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .map(str::to_string)
            .collect()
    })
    .unwrap_or_default()
}

pub fn sanitize_ids(ids: &[String]) -> Vec<String> {
    ids.iter()
        .map(|s| s.trim())
        .filter(|s| !s.is_empty())
        .map(str::to_string)
        .collect()
}

pub fn require_id(name: &str, value: &str) -> Result<String> {
    let trimmed = value.trim();
    if trimmed.is_empty() {
        return Err(SightlineError::BadRequest(format!("{name} cannot be empty")));
    }
    Ok(trimmed.to_string())
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct IssueFilter {
    pub services: Vec<String>,
    pub scenario_ids: Vec<String>,
    pub issue_hash: Option<String>,
    pub since: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct IncidentFilter {
    pub issue_hash: Option<String>,
    pub scenario_id: Option<String>,
    pub since: Option<DateTime<Utc>>,
}
