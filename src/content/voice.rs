//! Voice payloads
//!
//! Voice posts and comments arrive as base64 inside the JSON body. They are
//! validated here, stored base64-encoded on the document, and decoded back to
//! the exact original bytes when served.

use base64::{engine::general_purpose::STANDARD, Engine as _};
use serde::{Deserialize, Serialize};

use crate::types::{Result, ViviError};

/// Default upper bound on a decoded voice payload (10 MiB)
pub const DEFAULT_MAX_VOICE_BYTES: usize = 10 * 1024 * 1024;

/// Voice file as sent by the client
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct VoiceUpload {
    /// Base64 payload, optionally as a `data:<mime>;base64,` URL
    pub data: String,
    #[serde(default)]
    pub content_type: Option<String>,
    #[serde(default)]
    pub file_name: Option<String>,
}

/// Validated voice payload
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VoiceBlob {
    pub bytes: Vec<u8>,
    pub content_type: String,
    pub file_name: String,
}

/// Voice payload as persisted on a mirror document
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StoredVoice {
    /// Base64 (standard alphabet, padded)
    pub data: String,
    pub content_type: String,
    pub file_name: String,
    pub file_size: u64,
}

impl VoiceUpload {
    /// Decode and validate against the size limit
    pub fn into_blob(self, max_bytes: usize) -> Result<VoiceBlob> {
        let (inline_type, payload) = split_data_url(&self.data);
        let content_type = self
            .content_type
            .or(inline_type)
            .unwrap_or_default()
            .to_ascii_lowercase();

        if !content_type.starts_with("audio/") {
            return Err(ViviError::BadRequest(
                "Only audio files are allowed".to_string(),
            ));
        }

        // Reject before decoding anything absurdly large
        if payload.len() / 4 * 3 > max_bytes + 3 {
            return Err(too_large(max_bytes));
        }

        let bytes = STANDARD.decode(payload.trim())?;
        if bytes.is_empty() {
            return Err(ViviError::BadRequest("Voice file is empty".to_string()));
        }
        if bytes.len() > max_bytes {
            return Err(too_large(max_bytes));
        }

        Ok(VoiceBlob {
            bytes,
            content_type,
            file_name: self.file_name.unwrap_or_else(|| "voice".to_string()),
        })
    }
}

impl VoiceBlob {
    pub fn to_stored(&self) -> StoredVoice {
        StoredVoice {
            data: STANDARD.encode(&self.bytes),
            content_type: self.content_type.clone(),
            file_name: self.file_name.clone(),
            file_size: self.bytes.len() as u64,
        }
    }
}

impl StoredVoice {
    /// Original bytes
    pub fn decode(&self) -> Result<Vec<u8>> {
        STANDARD
            .decode(&self.data)
            .map_err(|e| ViviError::Internal(format!("Stored voice payload is corrupt: {}", e)))
    }
}

fn too_large(max_bytes: usize) -> ViviError {
    ViviError::PayloadTooLarge(format!("Voice file exceeds {} bytes", max_bytes))
}

/// `data:audio/webm;base64,AAAA` -> (Some("audio/webm"), "AAAA")
fn split_data_url(data: &str) -> (Option<String>, &str) {
    let Some(rest) = data.strip_prefix("data:") else {
        return (None, data);
    };
    match rest.split_once(',') {
        Some((header, payload)) => {
            let mime = header.trim_end_matches(";base64");
            let mime = (!mime.is_empty()).then(|| mime.to_string());
            (mime, payload)
        }
        None => (None, data),
    }
}

/// Parse an HTTP `Range` header against a payload of `total` bytes.
///
/// Supports `bytes=start-end`, `bytes=start-` and `bytes=-suffix`.
/// Returns `(start, end)` with `end` exclusive.
pub fn parse_range_header(range: &str, total: usize) -> Option<(usize, usize)> {
    let ranges = range.strip_prefix("bytes=")?;

    if let Some(suffix) = ranges.strip_prefix('-') {
        let suffix: usize = suffix.parse().ok()?;
        if suffix == 0 {
            return None;
        }
        return Some((total.saturating_sub(suffix), total));
    }

    let (start, end) = ranges.split_once('-')?;
    let start: usize = start.parse().ok()?;
    let end = if end.is_empty() {
        total
    } else {
        end.parse::<usize>().ok()?.saturating_add(1).min(total)
    };

    (start < end && start < total).then_some((start, end))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn upload(data: &str, content_type: &str) -> VoiceUpload {
        VoiceUpload {
            data: data.to_string(),
            content_type: Some(content_type.to_string()),
            file_name: Some("memo.webm".to_string()),
        }
    }

    #[test]
    fn test_round_trip_is_byte_identical() {
        let original: Vec<u8> = (0..=255u8).cycle().take(4099).collect();
        let blob = upload(&STANDARD.encode(&original), "audio/webm")
            .into_blob(DEFAULT_MAX_VOICE_BYTES)
            .unwrap();
        let stored = blob.to_stored();
        assert_eq!(stored.file_size, 4099);
        assert_eq!(stored.decode().unwrap(), original);
    }

    #[test]
    fn test_rejects_non_audio() {
        let err = upload(&STANDARD.encode(b"x"), "image/png")
            .into_blob(DEFAULT_MAX_VOICE_BYTES)
            .unwrap_err();
        assert_eq!(err.message(), "Only audio files are allowed");
    }

    #[test]
    fn test_enforces_limit() {
        let err = upload(&STANDARD.encode(vec![1u8; 64]), "audio/ogg")
            .into_blob(32)
            .unwrap_err();
        assert!(matches!(err, ViviError::PayloadTooLarge(_)));
    }

    #[test]
    fn test_accepts_data_url() {
        let data = format!("data:audio/mpeg;base64,{}", STANDARD.encode(b"id3"));
        let blob = VoiceUpload {
            data,
            content_type: None,
            file_name: None,
        }
        .into_blob(DEFAULT_MAX_VOICE_BYTES)
        .unwrap();
        assert_eq!(blob.content_type, "audio/mpeg");
        assert_eq!(blob.bytes, b"id3");
        assert_eq!(blob.file_name, "voice");
    }

    #[test]
    fn test_rejects_bad_base64_and_empty() {
        assert!(upload("***", "audio/webm").into_blob(1024).is_err());
        assert!(upload("", "audio/webm").into_blob(1024).is_err());
    }

    #[test]
    fn test_range_header() {
        assert_eq!(parse_range_header("bytes=0-99", 1000), Some((0, 100)));
        assert_eq!(parse_range_header("bytes=900-", 1000), Some((900, 1000)));
        assert_eq!(parse_range_header("bytes=-100", 1000), Some((900, 1000)));
        assert_eq!(parse_range_header("bytes=0-5000", 1000), Some((0, 1000)));
        assert_eq!(parse_range_header("bytes=1000-", 1000), None);
        assert_eq!(parse_range_header("items=0-1", 1000), None);
    }
}
