//! Error types for Ashram

use hyper::StatusCode;

/// Main error type for Ashram operations
#[derive(Debug, thiserror::Error)]
pub enum AshramError {
    #[error("Bad request: {0}")]
    BadRequest(String),

    #[error("Missing identifier: {0}")]
    MissingIdentifier(&'static str),

    /// Payment signature mismatch. A client-trust failure: reject with no
    /// mutation and no support action (no money moved on our side).
    #[error("Payment signature verification failed")]
    SignatureMismatch,

    #[error("Unauthorized: {0}")]
    Unauthorized(String),

    #[error("Forbidden: {0}")]
    Forbidden(String),

    #[error("Not found: {0}")]
    NotFound(String),

    /// A concurrent writer changed the record between read and write.
    #[error("Stale read: {0}")]
    StaleRead(String),

    /// The payment gateway rejected a request with a definite answer.
    #[error("Payment gateway error: {0}")]
    Gateway(String),

    /// The payment gateway call ended without a definite answer (timeout,
    /// connection dropped mid-flight). Retrying blindly can double-charge.
    #[error("Payment gateway outcome unknown: {0}")]
    GatewayUnknown(String),

    #[error("Database error: {0}")]
    Database(String),

    /// Signature verified but the subscription grant did not commit.
    /// Money has moved at the gateway; needs manual reconciliation.
    #[error("Payment verified but activation failed: {0}")]
    Activation(String),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Authentication error: {0}")]
    Auth(String),

    #[error("Internal error: {0}")]
    Internal(String),
}

impl AshramError {
    /// Convert error to HTTP status code
    pub fn status_code(&self) -> StatusCode {
        match self {
            Self::BadRequest(_) => StatusCode::BAD_REQUEST,
            Self::MissingIdentifier(_) => StatusCode::BAD_REQUEST,
            Self::SignatureMismatch => StatusCode::BAD_REQUEST,
            Self::Unauthorized(_) => StatusCode::UNAUTHORIZED,
            Self::Forbidden(_) => StatusCode::FORBIDDEN,
            Self::NotFound(_) => StatusCode::NOT_FOUND,
            Self::StaleRead(_) => StatusCode::CONFLICT,
            Self::Gateway(_) => StatusCode::BAD_GATEWAY,
            Self::GatewayUnknown(_) => StatusCode::BAD_GATEWAY,
            Self::Database(_) => StatusCode::SERVICE_UNAVAILABLE,
            Self::Activation(_) => StatusCode::INTERNAL_SERVER_ERROR,
            Self::Config(_) => StatusCode::INTERNAL_SERVER_ERROR,
            Self::Auth(_) => StatusCode::UNAUTHORIZED,
            Self::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    /// Stable machine-readable code for clients that branch on failure
    /// kind rather than parsing the message
    pub fn code(&self) -> &'static str {
        match self {
            Self::BadRequest(_) => "bad_request",
            Self::MissingIdentifier(_) => "missing_identifier",
            Self::SignatureMismatch => "signature_mismatch",
            Self::Unauthorized(_) => "unauthorized",
            Self::Forbidden(_) => "forbidden",
            Self::NotFound(_) => "not_found",
            Self::StaleRead(_) => "stale_read",
            Self::Gateway(_) => "gateway",
            Self::GatewayUnknown(_) => "gateway_unknown",
            Self::Database(_) => "database",
            Self::Activation(_) => "activation",
            Self::Config(_) => "config",
            Self::Auth(_) => "auth",
            Self::Internal(_) => "internal",
        }
    }

    /// Convert to status code and body tuple for HTTP response
    pub fn into_status_code_and_body(self) -> (StatusCode, String) {
        let status = self.status_code();
        let body = self.to_string();
        (status, body)
    }
}

// Implement From conversions for common error types

impl From<std::io::Error> for AshramError {
    fn from(err: std::io::Error) -> Self {
        Self::Internal(err.to_string())
    }
}

impl From<serde_json::Error> for AshramError {
    fn from(err: serde_json::Error) -> Self {
        Self::BadRequest(format!("JSON error: {}", err))
    }
}

impl From<hyper::Error> for AshramError {
    fn from(err: hyper::Error) -> Self {
        Self::Internal(format!("HTTP error: {}", err))
    }
}

impl From<mongodb::error::Error> for AshramError {
    fn from(err: mongodb::error::Error) -> Self {
        Self::Database(err.to_string())
    }
}

impl From<bson::ser::Error> for AshramError {
    fn from(err: bson::ser::Error) -> Self {
        Self::Database(format!("BSON encode error: {}", err))
    }
}

impl From<jsonwebtoken::errors::Error> for AshramError {
    fn from(err: jsonwebtoken::errors::Error) -> Self {
        Self::Unauthorized(format!("JWT error: {}", err))
    }
}

impl From<reqwest::Error> for AshramError {
    fn from(err: reqwest::Error) -> Self {
        // A timed-out request may already have been processed by the
        // gateway; a failed connect never left this process.
        if err.is_timeout() {
            Self::GatewayUnknown(err.to_string())
        } else {
            Self::Gateway(err.to_string())
        }
    }
}

/// Result type alias for Ashram operations
pub type Result<T> = std::result::Result<T, AshramError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn status_and_code_stay_aligned() {
        assert_eq!(
            AshramError::SignatureMismatch.status_code(),
            StatusCode::BAD_REQUEST
        );
        assert_eq!(AshramError::SignatureMismatch.code(), "signature_mismatch");
        assert_eq!(
            AshramError::StaleRead("raced".into()).status_code(),
            StatusCode::CONFLICT
        );
        assert_eq!(
            AshramError::GatewayUnknown("timeout".into()).status_code(),
            StatusCode::BAD_GATEWAY
        );
        assert_eq!(AshramError::Activation("grant".into()).code(), "activation");
    }
}
