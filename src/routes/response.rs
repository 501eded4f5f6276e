//! Response helpers shared by the route handlers

use bytes::Bytes;
use http_body_util::Full;
use hyper::header::{self, HeaderMap, HeaderValue};
use hyper::{Response, StatusCode};
use serde::Serialize;

use crate::types::ViviError;

/// Add the CORS headers every response carries
pub fn apply_cors(headers: &mut HeaderMap) {
    headers.insert(
        header::ACCESS_CONTROL_ALLOW_ORIGIN,
        HeaderValue::from_static("*"),
    );
    headers.insert(
        header::ACCESS_CONTROL_ALLOW_HEADERS,
        HeaderValue::from_static("*"),
    );
    headers.insert(
        header::ACCESS_CONTROL_ALLOW_METHODS,
        HeaderValue::from_static("GET, POST, PUT, DELETE, OPTIONS"),
    );
}

fn with_body(status: StatusCode, content_type: &'static str, body: Bytes) -> Response<Full<Bytes>> {
    let mut response = Response::new(Full::new(body));
    *response.status_mut() = status;
    let headers = response.headers_mut();
    headers.insert(header::CONTENT_TYPE, HeaderValue::from_static(content_type));
    apply_cors(headers);
    response
}

/// Serialize `value` as a JSON response
pub fn json_response<T: Serialize>(status: StatusCode, value: &T) -> Response<Full<Bytes>> {
    match serde_json::to_vec(value) {
        Ok(body) => with_body(status, "application/json", Bytes::from(body)),
        Err(e) => error_response(&ViviError::Internal(format!(
            "Failed to encode response: {}",
            e
        ))),
    }
}

pub fn ok_json<T: Serialize>(value: &T) -> Response<Full<Bytes>> {
    json_response(StatusCode::OK, value)
}

/// `{"error": message, "code": CODE}` with the error's status
pub fn error_response(err: &ViviError) -> Response<Full<Bytes>> {
    let body = serde_json::json!({
        "error": err.message(),
        "code": err.code(),
    });
    with_body(
        err.status_code(),
        "application/json",
        Bytes::from(body.to_string()),
    )
}

/// CORS preflight response
pub fn preflight_response() -> Response<Full<Bytes>> {
    let mut response = Response::new(Full::new(Bytes::new()));
    apply_cors(response.headers_mut());
    response
}

/// Not found response
pub fn not_found_response(path: &str) -> Response<Full<Bytes>> {
    let body = serde_json::json!({
        "error": "Not Found",
        "code": "NOT_FOUND",
        "path": path,
    });
    with_body(
        StatusCode::NOT_FOUND,
        "application/json",
        Bytes::from(body.to_string()),
    )
}

/// Binary response (voice payloads). `range` is `(start, end, total)` when
/// `data` is a partial slice, `end` exclusive.
pub fn bytes_response(
    content_type: &str,
    data: Bytes,
    range: Option<(usize, usize, usize)>,
) -> Response<Full<Bytes>> {
    let length = data.len();
    let mut response = Response::new(Full::new(data));
    let headers = response.headers_mut();
    apply_cors(headers);
    headers.insert(
        header::CONTENT_TYPE,
        HeaderValue::from_str(content_type)
            .unwrap_or_else(|_| HeaderValue::from_static("application/octet-stream")),
    );
    headers.insert(header::CONTENT_LENGTH, HeaderValue::from(length));
    headers.insert(header::ACCEPT_RANGES, HeaderValue::from_static("bytes"));

    if let Some((start, end, total)) = range {
        if let Ok(value) = HeaderValue::from_str(&format!("bytes {}-{}/{}", start, end - 1, total)) {
            headers.insert(header::CONTENT_RANGE, value);
        }
        *response.status_mut() = StatusCode::PARTIAL_CONTENT;
    }
    response
}

/// 304 for a voice payload the client already holds
pub fn not_modified(etag: &str) -> Response<Full<Bytes>> {
    let mut response = Response::new(Full::new(Bytes::new()));
    *response.status_mut() = StatusCode::NOT_MODIFIED;
    let headers = response.headers_mut();
    apply_cors(headers);
    if let Ok(value) = HeaderValue::from_str(&format!("\"{}\"", etag)) {
        headers.insert(header::ETAG, value);
    }
    response
}

/// 416 for a range that cannot be served
pub fn range_not_satisfiable(total: usize) -> Response<Full<Bytes>> {
    let body = serde_json::json!({
        "error": "Invalid range",
        "code": "RANGE_NOT_SATISFIABLE",
    });
    let mut response = with_body(
        StatusCode::RANGE_NOT_SATISFIABLE,
        "application/json",
        Bytes::from(body.to_string()),
    );
    if let Ok(value) = HeaderValue::from_str(&format!("bytes */{}", total)) {
        response.headers_mut().insert(header::CONTENT_RANGE, value);
    }
    response
}
