//! Error types for Vivi
//!
//! One error enum for the whole service. Every variant maps onto an HTTP
//! status so route handlers can bubble errors up with `?` and let the server
//! render them.

use hyper::StatusCode;

use crate::ledger::Revert;

/// Main error type for Vivi operations
#[derive(Debug, thiserror::Error)]
pub enum ViviError {
    #[error("Bad request: {0}")]
    BadRequest(String),

    #[error("Unauthorized: {0}")]
    Unauthorized(String),

    #[error("Forbidden: {0}")]
    Forbidden(String),

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Conflict: {0}")]
    Conflict(String),

    /// A ledger transaction reverted; the string is the revert reason
    #[error("Transaction reverted: {0}")]
    Reverted(String),

    #[error("Payload too large: {0}")]
    PayloadTooLarge(String),

    #[error("Database error: {0}")]
    Database(String),

    #[error("Internal error: {0}")]
    Internal(String),

    #[error("Configuration error: {0}")]
    Config(String),
}

impl ViviError {
    /// Convert error to HTTP status code
    pub fn status_code(&self) -> StatusCode {
        match self {
            Self::BadRequest(_) => StatusCode::BAD_REQUEST,
            Self::Unauthorized(_) => StatusCode::UNAUTHORIZED,
            Self::Forbidden(_) => StatusCode::FORBIDDEN,
            Self::NotFound(_) => StatusCode::NOT_FOUND,
            Self::Conflict(_) => StatusCode::CONFLICT,
            Self::Reverted(_) => StatusCode::UNPROCESSABLE_ENTITY,
            Self::PayloadTooLarge(_) => StatusCode::PAYLOAD_TOO_LARGE,
            Self::Database(_) => StatusCode::SERVICE_UNAVAILABLE,
            Self::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
            Self::Config(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    /// Stable machine-readable code for API clients
    pub fn code(&self) -> &'static str {
        match self {
            Self::BadRequest(_) => "BAD_REQUEST",
            Self::Unauthorized(_) => "UNAUTHORIZED",
            Self::Forbidden(_) => "FORBIDDEN",
            Self::NotFound(_) => "NOT_FOUND",
            Self::Conflict(_) => "CONFLICT",
            Self::Reverted(_) => "REVERTED",
            Self::PayloadTooLarge(_) => "PAYLOAD_TOO_LARGE",
            Self::Database(_) => "DATABASE_UNAVAILABLE",
            Self::Internal(_) => "INTERNAL",
            Self::Config(_) => "CONFIG",
        }
    }

    /// The message without the variant prefix, as shown to API clients
    pub fn message(&self) -> &str {
        match self {
            Self::BadRequest(m)
            | Self::Unauthorized(m)
            | Self::Forbidden(m)
            | Self::NotFound(m)
            | Self::Conflict(m)
            | Self::Reverted(m)
            | Self::PayloadTooLarge(m)
            | Self::Database(m)
            | Self::Internal(m)
            | Self::Config(m) => m,
        }
    }
}

impl From<Revert> for ViviError {
    fn from(revert: Revert) -> Self {
        Self::Reverted(revert.reason().to_string())
    }
}

impl From<std::io::Error> for ViviError {
    fn from(err: std::io::Error) -> Self {
        Self::Internal(err.to_string())
    }
}

impl From<serde_json::Error> for ViviError {
    fn from(err: serde_json::Error) -> Self {
        Self::BadRequest(format!("JSON error: {}", err))
    }
}

impl From<hyper::Error> for ViviError {
    fn from(err: hyper::Error) -> Self {
        Self::Internal(format!("HTTP error: {}", err))
    }
}

impl From<mongodb::error::Error> for ViviError {
    fn from(err: mongodb::error::Error) -> Self {
        if crate::db::is_duplicate_key(&err) {
            return Self::Conflict("Duplicate key".to_string());
        }
        Self::Database(err.to_string())
    }
}

impl From<base64::DecodeError> for ViviError {
    fn from(err: base64::DecodeError) -> Self {
        Self::BadRequest(format!("Invalid base64 payload: {}", err))
    }
}

/// Result type alias for Vivi operations
pub type Result<T> = std::result::Result<T, ViviError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_codes() {
        assert_eq!(
            ViviError::NotFound("post".into()).status_code(),
            StatusCode::NOT_FOUND
        );
        assert_eq!(
            ViviError::Reverted("Already liked this post".into()).status_code(),
            StatusCode::UNPROCESSABLE_ENTITY
        );
        assert_eq!(
            ViviError::Conflict("dup".into()).status_code(),
            StatusCode::CONFLICT
        );
    }

    #[test]
    fn test_revert_conversion_keeps_reason() {
        let err: ViviError = Revert::new("Post does not exist").into();
        assert_eq!(err.message(), "Post does not exist");
        assert_eq!(err.code(), "REVERTED");
    }
}
