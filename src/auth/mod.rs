//! Wallet header authentication
//!
//! Callers identify themselves with an `X-Wallet-Address` header. The claim is
//! taken at face value: it authorises mirror edits (creator-only updates,
//! deletes, bounty changes) and names the sender of ledger transactions.

use hyper::HeaderMap;

use crate::ledger::Address;
use crate::types::{Result, ViviError};

/// Header carrying the caller's wallet address
pub const WALLET_HEADER: &str = "x-wallet-address";

/// Extract the wallet claim from request headers
///
/// Returns `Unauthorized` when the header is missing or empty and
/// `BadRequest` when it is not an address.
pub fn wallet_from_headers(headers: &HeaderMap) -> Result<Address> {
    let raw = headers
        .get(WALLET_HEADER)
        .and_then(|v| v.to_str().ok())
        .map(str::trim)
        .filter(|v| !v.is_empty())
        .ok_or_else(|| ViviError::Unauthorized("No wallet address provided".to_string()))?;

    Address::parse(raw).map_err(|e| ViviError::BadRequest(e.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use hyper::header::HeaderValue;

    #[test]
    fn test_wallet_header_is_lowercased() {
        let mut headers = HeaderMap::new();
        headers.insert(
            WALLET_HEADER,
            HeaderValue::from_static("0xABCDEF0123456789ABCDEF0123456789ABCDEF01"),
        );
        let wallet = wallet_from_headers(&headers).unwrap();
        assert_eq!(wallet.as_str(), "0xabcdef0123456789abcdef0123456789abcdef01");
    }

    #[test]
    fn test_missing_or_bad_header() {
        let err = wallet_from_headers(&HeaderMap::new()).unwrap_err();
        assert!(matches!(err, ViviError::Unauthorized(_)));
        assert_eq!(err.message(), "No wallet address provided");

        let mut headers = HeaderMap::new();
        headers.insert(WALLET_HEADER, HeaderValue::from_static("alice"));
        assert!(matches!(
            wallet_from_headers(&headers).unwrap_err(),
            ViviError::BadRequest(_)
        ));
    }
}
