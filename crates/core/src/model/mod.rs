pub mod incident;
pub mod issue;
pub mod raw;
pub mod scenario;
pub mod span;

pub use incident::{IncidentDetail, IncidentListResponse, IncidentRow};
pub use issue::{IssueDetails, IssueListResponse, IssueResponse, IssueRow};
pub use raw::{
    ErrorDataDetails, ErrorDataResponse, ErrorDataRow, RawDataRow, SpanRawDataDetails,
    SpanRawDataResponse,
};
pub use scenario::{
    ScenarioDetails, ScenarioListResponse, ScenarioRow, ServiceEdgeRow, ServiceMapEntry,
    ServiceMapResponse,
};
pub use span::{SpanDetails, SpanListResponse, SpanRow};
