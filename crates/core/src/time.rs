use std::time::Duration;

use chrono::{DateTime, Utc};

use crate::error::{Result, SightlineError};

pub fn parse_time_or_relative(input: &str) -> Result<DateTime<Utc>> {
    if let Ok(ts) = DateTime::parse_from_rfc3339(input) {
        return Ok(ts.with_timezone(&Utc));
    }

    if let Ok(duration) = humantime::parse_duration(input) {
        let delta = chrono::Duration::from_std(duration).map_err(|e| {
            SightlineError::BadRequest(format!("duration {input} is out of range: {e}"))
        })?;
        return Utc::now()
            .checked_sub_signed(delta)
            .ok_or_else(|| SightlineError::BadRequest(format!("duration {input} is out of range")));
    }

    Err(SightlineError::Parse(format!(
        "expected RFC3339 time or duration, got {input}"
    )))
}

/// Dashboard start times are negative offsets from now (`-30m`, `-12h`, `-7d`)
/// or absolute RFC3339 timestamps.
pub fn parse_start_time(input: &str) -> Result<DateTime<Utc>> {
    let input = input.trim();
    if input.is_empty() {
        return Err(SightlineError::BadRequest(
            "start time cannot be empty".to_string(),
        ));
    }

    if let Ok(ts) = DateTime::parse_from_rfc3339(input) {
        return Ok(ts.with_timezone(&Utc));
    }

    let Some(relative) = input.strip_prefix('-') else {
        return Err(SightlineError::BadRequest(format!(
            "start time should be a negative offset, got {input}"
        )));
    };
    parse_time_or_relative(relative)
}

pub fn parse_optional_start_time(input: Option<&str>) -> Result<Option<DateTime<Utc>>> {
    match input.map(str::trim) {
        None | Some("") => Ok(None),
        Some(v) => parse_start_time(v).map(Some),
    }
}

pub fn parse_duration_str(input: &str) -> Result<Duration> {
    humantime::parse_duration(input)
        .map_err(|e| SightlineError::Parse(format!("invalid duration {input}: {e}")))
}
