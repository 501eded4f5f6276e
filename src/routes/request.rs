//! Buffered API request
//!
//! The router reads the whole body (bounded) up front so handlers work on
//! plain bytes and stay independent of the connection's body type.

use bytes::Bytes;
use http_body_util::{BodyExt, LengthLimitError, Limited};
use hyper::body::Body;
use hyper::{HeaderMap, Method, Request};
use serde::de::DeserializeOwned;

use crate::auth::wallet_from_headers;
use crate::ledger::Address;
use crate::types::{Result, ViviError};

type BoxError = Box<dyn std::error::Error + Send + Sync>;

#[derive(Debug)]
pub struct ApiRequest {
    pub method: Method,
    pub path: String,
    pub query: Option<String>,
    pub headers: HeaderMap,
    pub body: Bytes,
}

impl ApiRequest {
    /// Split a hyper request and collect its body, refusing more than
    /// `limit` bytes
    pub async fn read<B>(req: Request<B>, limit: usize) -> Result<Self>
    where
        B: Body<Data = Bytes>,
        B::Error: Into<BoxError>,
    {
        let (parts, body) = req.into_parts();
        let body = read_body(body, limit).await?;
        Ok(Self {
            method: parts.method,
            path: parts.uri.path().to_string(),
            query: parts.uri.query().map(str::to_string),
            headers: parts.headers,
            body,
        })
    }

    /// Decode the body as JSON
    pub fn json<T: DeserializeOwned>(&self) -> Result<T> {
        if self.body.is_empty() {
            return Err(ViviError::BadRequest("Request body is required".to_string()));
        }
        serde_json::from_slice(&self.body)
            .map_err(|e| ViviError::BadRequest(format!("Invalid JSON: {}", e)))
    }

    /// Decode the query string
    pub fn query<T: DeserializeOwned + Default>(&self) -> Result<T> {
        match self.query.as_deref() {
            None | Some("") => Ok(T::default()),
            Some(q) => serde_urlencoded::from_str(q)
                .map_err(|e| ViviError::BadRequest(format!("Invalid query string: {}", e))),
        }
    }

    /// Caller's wallet claim
    pub fn wallet(&self) -> Result<Address> {
        wallet_from_headers(&self.headers)
    }

    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers.get(name).and_then(|v| v.to_str().ok())
    }
}

/// Collect a body, refusing anything over `limit` bytes
pub async fn read_body<B>(body: B, limit: usize) -> Result<Bytes>
where
    B: Body<Data = Bytes>,
    B::Error: Into<BoxError>,
{
    match Limited::new(body, limit).collect().await {
        Ok(collected) => Ok(collected.to_bytes()),
        Err(e) if e.is::<LengthLimitError>() => Err(ViviError::PayloadTooLarge(format!(
            "Request body exceeds {} bytes",
            limit
        ))),
        Err(e) => Err(ViviError::BadRequest(format!(
            "Failed to read request body: {}",
            e
        ))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use http_body_util::Full;

    fn request(uri: &str, body: &'static [u8]) -> Request<Full<Bytes>> {
        Request::builder()
            .method(Method::POST)
            .uri(uri)
            .header("x-wallet-address", "0x1111111111111111111111111111111111111111")
            .body(Full::new(Bytes::from_static(body)))
            .unwrap()
    }

    #[derive(Debug, Default, serde::Deserialize)]
    struct Paging {
        limit: Option<usize>,
    }

    #[tokio::test]
    async fn test_read_splits_request() {
        let req = ApiRequest::read(request("/api/posts?limit=5", b"{\"a\":1}"), 1024)
            .await
            .unwrap();
        assert_eq!(req.path, "/api/posts");
        assert_eq!(req.query::<Paging>().unwrap().limit, Some(5));
        assert_eq!(req.json::<serde_json::Value>().unwrap()["a"], 1);
        assert_eq!(
            req.wallet().unwrap().as_str(),
            "0x1111111111111111111111111111111111111111"
        );
    }

    #[tokio::test]
    async fn test_body_limit_and_bad_input() {
        let err = ApiRequest::read(request("/x", b"0123456789"), 4)
            .await
            .unwrap_err();
        assert!(matches!(err, ViviError::PayloadTooLarge(_)));

        let req = ApiRequest::read(request("/x?limit=abc", b""), 64).await.unwrap();
        assert!(req.query::<Paging>().is_err());
        assert!(matches!(
            req.json::<serde_json::Value>().unwrap_err(),
            ViviError::BadRequest(_)
        ));
    }
}
