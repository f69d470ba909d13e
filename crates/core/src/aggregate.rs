use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::{Result, SightlineError};

pub const MAX_SAMPLES: usize = 5;

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "lowercase")]
pub enum VelocityUnit {
    Second,
    Minute,
    #[default]
    Hour,
    Day,
}

impl VelocityUnit {
    pub fn seconds(self) -> f64 {
        match self {
            Self::Second => 1.0,
            Self::Minute => 60.0,
            Self::Hour => 3_600.0,
            Self::Day => 86_400.0,
        }
    }
}

impl FromStr for VelocityUnit {
    type Err = SightlineError;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "s" | "sec" | "second" | "seconds" => Ok(Self::Second),
            "m" | "min" | "minute" | "minutes" => Ok(Self::Minute),
            "h" | "hour" | "hours" => Ok(Self::Hour),
            "d" | "day" | "days" => Ok(Self::Day),
            _ => Err(SightlineError::Parse(format!("unknown velocity unit: {s}"))),
        }
    }
}

/// Occurrences per unit of time between first and last sighting. The elapsed
/// time is floored at one unit, so a burst inside a single unit reports the
/// raw count instead of dividing by zero.
pub fn velocity(
    total_count: u64,
    first_seen: DateTime<Utc>,
    last_seen: DateTime<Utc>,
    unit: VelocityUnit,
) -> f64 {
    let elapsed_ms = (last_seen - first_seen).num_milliseconds().max(0) as f64;
    let elapsed = (elapsed_ms / 1000.0 / unit.seconds()).max(1.0);
    total_count as f64 / elapsed
}

pub fn truncate_samples(mut samples: Vec<String>) -> Vec<String> {
    samples.truncate(MAX_SAMPLES);
    samples
}

/// Rows of a paged query all carry the same windowed count; only the first
/// one is read.
pub fn total_records<T>(rows: &[T], total_of: impl Fn(&T) -> u64) -> u64 {
    rows.first().map(total_of).unwrap_or(0)
}
