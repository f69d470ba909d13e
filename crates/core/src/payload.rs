use std::io::{Read, Write};

use flate2::Compression;
use flate2::read::GzDecoder;
use flate2::write::GzEncoder;

use crate::error::{Result, SightlineError};

pub fn decompress_bytes(input: Option<&[u8]>) -> Result<Vec<u8>> {
    let Some(bytes) = input.filter(|b| !b.is_empty()) else {
        return Ok(Vec::new());
    };

    let mut out = Vec::new();
    GzDecoder::new(bytes)
        .read_to_end(&mut out)
        .map_err(|e| SightlineError::Internal(format!("gzip decompression failed: {e}")))?;
    Ok(out)
}

/// Captured payloads are not guaranteed to be UTF-8; invalid sequences are
/// replaced rather than rejected.
pub fn decompress_text(input: Option<&[u8]>) -> Result<String> {
    let bytes = decompress_bytes(input)?;
    Ok(match String::from_utf8(bytes) {
        Ok(text) => text,
        Err(e) => String::from_utf8_lossy(e.as_bytes()).into_owned(),
    })
}

pub fn compress_bytes(input: &[u8]) -> Result<Vec<u8>> {
    let mut encoder = GzEncoder::new(Vec::new(), Compression::default());
    encoder
        .write_all(input)
        .map_err(|e| SightlineError::Internal(format!("gzip compression failed: {e}")))?;
    encoder
        .finish()
        .map_err(|e| SightlineError::Internal(format!("gzip compression failed: {e}")))
}
