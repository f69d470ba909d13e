use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::Result;
use crate::filter::{IncidentFilter, IssueFilter, Pagination, parse_list};
use crate::time::parse_optional_start_time;

/// Query-string parameters of the issue list, as the handler receives them.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct IssueListParams {
    pub services: Option<String>,
    pub scenario_ids: Option<String>,
    pub st: Option<String>,
    pub offset: Option<String>,
    pub limit: Option<String>,
}

impl IssueListParams {
    pub fn filter(&self) -> Result<IssueFilter> {
        Ok(IssueFilter {
            services: parse_list(self.services.as_deref()),
            scenario_ids: parse_list(self.scenario_ids.as_deref()),
            issue_hash: None,
            since: parse_optional_start_time(self.st.as_deref())?,
        })
    }

    pub fn page(&self, max_limit: u64) -> Result<Pagination> {
        Pagination::parse(self.offset.as_deref(), self.limit.as_deref(), max_limit)
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct IncidentListParams {
    pub issue_hash: Option<String>,
    pub st: Option<String>,
    pub offset: Option<String>,
    pub limit: Option<String>,
}

impl IncidentListParams {
    pub fn filter(&self) -> Result<IncidentFilter> {
        Ok(IncidentFilter {
            issue_hash: self
                .issue_hash
                .as_deref()
                .map(str::trim)
                .filter(|s| !s.is_empty())
                .map(str::to_string),
            scenario_id: None,
            since: parse_optional_start_time(self.st.as_deref())?,
        })
    }

    pub fn page(&self, max_limit: u64) -> Result<Pagination> {
        Pagination::parse(self.offset.as_deref(), self.limit.as_deref(), max_limit)
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SpanListParams {
    pub span_id: Option<String>,
    pub offset: Option<String>,
    pub limit: Option<String>,
}

impl SpanListParams {
    pub fn span_id(&self) -> Option<String> {
        self.span_id
            .as_deref()
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .map(str::to_string)
    }

    pub fn page(&self, max_limit: u64) -> Result<Pagination> {
        Pagination::parse(self.offset.as_deref(), self.limit.as_deref(), max_limit)
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ScenarioListParams {
    pub scenario_ids: Option<String>,
    pub services: Option<String>,
    pub st: Option<String>,
}

impl ScenarioListParams {
    pub fn filter(&self) -> Result<IssueFilter> {
        Ok(IssueFilter {
            services: parse_list(self.services.as_deref()),
            scenario_ids: parse_list(self.scenario_ids.as_deref()),
            issue_hash: None,
            since: parse_optional_start_time(self.st.as_deref())?,
        })
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ServiceMapParams {
    pub st: Option<String>,
    pub offset: Option<String>,
    pub limit: Option<String>,
}

impl ServiceMapParams {
    pub fn page(&self, max_limit: u64) -> Result<Pagination> {
        Pagination::parse(self.offset.as_deref(), self.limit.as_deref(), max_limit)
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ErrorDataRequest {
    #[serde(default)]
    pub error_ids: Vec<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct StatusResponse {
    pub db_path: String,
    pub db_size_bytes: u64,
    pub issues_count: u64,
    pub incidents_count: u64,
    pub spans_count: u64,
    pub oldest_span: Option<DateTime<Utc>>,
    pub newest_span: Option<DateTime<Utc>>,
}
