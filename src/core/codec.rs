// src/core/codec.rs
//! gzip+JSON encoding of download pages.
//!
//! The payload is stored and served as-is, so the transport only has to set
//! [`CONTENT_ENCODING`] and [`CONTENT_TYPE`] on the response.

use crate::core::types::Word;
use crate::error::{PageError, PageResult};
use bytes::Bytes;
use flate2::read::GzDecoder;
use flate2::write::GzEncoder;
use flate2::Compression;
use serde::{Deserialize, Serialize};
use std::io::{Read, Write};

pub const CONTENT_ENCODING: &str = "gzip";
pub const CONTENT_TYPE: &str = "application/json; charset=utf-8";

/// Fields shared by every response body.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StandardResponse {
    pub success: bool,
    pub error: String,
    pub at: String,
}

impl StandardResponse {
    pub fn new(at: impl Into<String>) -> Self {
        Self { success: true, error: String::new(), at: at.into() }
    }

    /// Stamped with the current UTC time.
    pub fn now() -> Self {
        Self::new(chrono::Utc::now().to_rfc3339())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DownloadResponse {
    pub count: usize,
    pub words: Vec<Word>,
    #[serde(flatten)]
    pub standard: StandardResponse,
}

impl DownloadResponse {
    pub fn new(words: Vec<Word>, standard: StandardResponse) -> Self {
        Self { count: words.len(), words, standard }
    }
}

/// Serializes the envelope to JSON and gzips it at the default level.
/// The same envelope always yields the same bytes.
pub fn encode_page(response: &DownloadResponse) -> PageResult<Bytes> {
    let json = serde_json::to_vec(response).map_err(|e| PageError::Encode(e.to_string()))?;

    let mut encoder = GzEncoder::new(Vec::with_capacity(json.len() / 2), Compression::default());
    encoder.write_all(&json).map_err(|e| PageError::Encode(e.to_string()))?;
    let compressed = encoder.finish().map_err(|e| PageError::Encode(e.to_string()))?;

    Ok(Bytes::from(compressed))
}

pub fn decode_page(payload: &[u8]) -> PageResult<DownloadResponse> {
    let mut json = Vec::new();
    GzDecoder::new(payload)
        .read_to_end(&mut json)
        .map_err(|e| PageError::Encode(e.to_string()))?;
    serde_json::from_slice(&json).map_err(|e| PageError::Encode(e.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample() -> DownloadResponse {
        let words = vec![Word::new(1, "അ"), Word::new(2, "ആ")];
        DownloadResponse::new(words, StandardResponse::new("2024-01-01T00:00:00+00:00"))
    }

    #[test]
    fn test_encoding_is_deterministic() {
        let a = encode_page(&sample()).unwrap();
        let b = encode_page(&sample()).unwrap();
        assert_eq!(a, b);
    }

    #[test]
    fn test_payload_is_gzip() {
        let payload = encode_page(&sample()).unwrap();
        assert_eq!(&payload[..2], &[0x1f, 0x8b]);
    }

    #[test]
    fn test_wire_field_names() {
        let payload = encode_page(&sample()).unwrap();
        let mut json = String::new();
        GzDecoder::new(&payload[..]).read_to_string(&mut json).unwrap();

        let value: serde_json::Value = serde_json::from_str(&json).unwrap();
        assert_eq!(value["count"], 2);
        assert_eq!(value["success"], true);
        assert_eq!(value["error"], "");
        assert_eq!(value["at"], "2024-01-01T00:00:00+00:00");
        assert_eq!(value["words"][1]["word"], "ആ");
    }

    #[test]
    fn test_decode_restores_envelope() {
        let payload = encode_page(&sample()).unwrap();
        assert_eq!(decode_page(&payload).unwrap(), sample());
    }

    #[test]
    fn test_decode_rejects_plain_json() {
        assert!(matches!(decode_page(b"{\"count\":0}"), Err(PageError::Encode(_))));
    }
}
