use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::error::Result;
use crate::payload::decompress_text;

#[derive(Debug, Clone, Default, PartialEq)]
pub struct RawDataRow {
    pub span_id: String,
    pub protocol: Option<String>,
    pub req_headers: Option<Vec<u8>>,
    pub resp_headers: Option<Vec<u8>>,
    pub is_truncated: Option<bool>,
    pub req_body: Option<Vec<u8>>,
    pub resp_body: Option<Vec<u8>>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct SpanRawDataDetails {
    pub protocol: String,
    pub req_headers: String,
    pub resp_headers: String,
    pub is_truncated: bool,
    pub req_body: String,
    pub resp_body: String,
}

impl SpanRawDataDetails {
    pub fn from_row(row: &RawDataRow) -> Result<Self> {
        Ok(Self {
            protocol: row.protocol.clone().unwrap_or_default(),
            req_headers: decompress_text(row.req_headers.as_deref())?,
            resp_headers: decompress_text(row.resp_headers.as_deref())?,
            is_truncated: row.is_truncated.unwrap_or(false),
            req_body: decompress_text(row.req_body.as_deref())?,
            resp_body: decompress_text(row.resp_body.as_deref())?,
        })
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct SpanRawDataResponse {
    pub span_raw_data_details: BTreeMap<String, SpanRawDataDetails>,
}

impl SpanRawDataResponse {
    /// Any undecodable blob fails the whole response.
    pub fn from_rows(rows: &[RawDataRow]) -> Result<Self> {
        let mut details = BTreeMap::new();
        for row in rows {
            details.insert(row.span_id.clone(), SpanRawDataDetails::from_row(row)?);
        }
        Ok(Self {
            span_raw_data_details: details,
        })
    }
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct ErrorDataRow {
    pub id: String,
    pub data: Option<Vec<u8>>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ErrorDataDetails {
    pub id: String,
    pub data: String,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct ErrorDataResponse {
    pub errors: BTreeMap<String, ErrorDataDetails>,
}

impl ErrorDataResponse {
    pub fn from_rows(rows: &[ErrorDataRow]) -> Result<Self> {
        let mut errors = BTreeMap::new();
        for row in rows {
            let data = decompress_text(row.data.as_deref())?;
            errors.insert(
                row.id.clone(),
                ErrorDataDetails {
                    id: row.id.clone(),
                    data,
                },
            );
        }
        Ok(Self { errors })
    }
}
