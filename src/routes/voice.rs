//! Voice payload serving with HTTP 206 Range support
//!
//! The ETag is the payload's content address. `If-None-Match` accepts any
//! address form (CID, `sha256-<hex>`, bare hex) that names the same bytes.

use bytes::Bytes;
use http_body_util::Full;
use hyper::header::{self, HeaderValue};
use hyper::Response;
use tracing::{debug, warn};

use crate::content::{
    content_address, parse_content_address, parse_range_header, sha256_tag, StoredVoice,
};
use crate::types::Result;

use super::request::ApiRequest;
use super::response::{bytes_response, not_modified, range_not_satisfiable};

/// Serve a stored voice payload, honouring `Range` and `If-None-Match`
pub fn serve_voice(req: &ApiRequest, voice: &StoredVoice) -> Result<Response<Full<Bytes>>> {
    let data = Bytes::from(voice.decode()?);
    let total = data.len();
    let etag = content_address(&data);

    if let Some(tag) = req.header(header::IF_NONE_MATCH.as_str()) {
        if matches_payload(tag, &data) {
            debug!(etag = %etag, "ETag match, returning 304");
            return Ok(not_modified(&etag));
        }
    }

    let mut response = match req.header(header::RANGE.as_str()) {
        None => {
            debug!(size = total, content_type = %voice.content_type, "Serving voice");
            bytes_response(&voice.content_type, data, None)
        }
        Some(range) => match parse_range_header(range, total) {
            Some((start, end)) => {
                debug!(start, end, total, "Serving partial voice");
                bytes_response(
                    &voice.content_type,
                    data.slice(start..end),
                    Some((start, end, total)),
                )
            }
            None => {
                warn!(range = %range, total, "Invalid range header");
                return Ok(range_not_satisfiable(total));
            }
        },
    };

    if let Ok(value) = HeaderValue::from_str(&format!("\"{}\"", etag)) {
        response.headers_mut().insert(header::ETAG, value);
    }
    Ok(response)
}

/// True when any tag in an `If-None-Match` list addresses `data`
fn matches_payload(header_value: &str, data: &[u8]) -> bool {
    let expected = sha256_tag(data);
    header_value
        .split(',')
        .map(|tag| tag.trim().trim_start_matches("W/").trim_matches('"'))
        .any(|tag| tag == "*" || parse_content_address(tag).is_ok_and(|t| t == expected))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_if_none_match_accepts_any_address_form() {
        let data = b"voice memo";
        let cid = content_address(data);
        let hex = sha256_tag(data).trim_start_matches("sha256-").to_string();

        assert!(matches_payload(&format!("\"{}\"", cid), data));
        assert!(matches_payload(&hex, data));
        assert!(matches_payload("\"other\", *", data));
        assert!(!matches_payload(&format!("\"{}\"", content_address(b"else")), data));
        assert!(!matches_payload("garbage", data));
    }
}
