//! Error types module
//!
//! Every failure the grant subsystem can report is a [`GrantError`]. Local validation
//! failures (`InvalidRequest`, `InvalidContentType`) never involve an upstream call;
//! every upstream-origin variant carries an [`UpstreamContext`] naming the call and the
//! correlation id so it can be logged without re-deriving either.

use std::fmt;

use crate::correlation::CorrelationId;
use crate::models::{AssetCategory, TokenStatus};

/// Log level for error reporting
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogLevel {
    /// Expected errors like validation failures
    Debug,
    /// Recoverable or pending conditions
    Warn,
    /// Unexpected failures
    Error,
}

/// Metadata for error responses.
///
/// Lets the surrounding service map grant errors onto its own API taxonomy.
pub trait ErrorMetadata {
    /// HTTP status code hint
    fn http_status_code(&self) -> u16;

    /// Machine-readable error code (e.g., "UPSTREAM_REJECTED")
    fn error_code(&self) -> &'static str;

    /// Whether the same call may succeed if retried later
    fn is_recoverable(&self) -> bool;

    /// Client-facing message
    fn client_message(&self) -> String;

    fn log_level(&self) -> LogLevel;
}

/// Upstream endpoint involved in a failure.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum UpstreamCall {
    BulkUploadRequest,
    DownloadRequest,
    UploadCheck,
    Jwks,
    ObjectPut,
}

impl UpstreamCall {
    pub fn as_str(&self) -> &'static str {
        match self {
            UpstreamCall::BulkUploadRequest => "bulk_upload_request",
            UpstreamCall::DownloadRequest => "download_request",
            UpstreamCall::UploadCheck => "upload_check",
            UpstreamCall::Jwks => "jwks",
            UpstreamCall::ObjectPut => "object_put",
        }
    }
}

impl fmt::Display for UpstreamCall {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Which upstream call failed and under which correlation id.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UpstreamContext {
    pub call: UpstreamCall,
    pub correlation_id: CorrelationId,
}

impl UpstreamContext {
    pub fn new(call: UpstreamCall, correlation_id: CorrelationId) -> Self {
        Self {
            call,
            correlation_id,
        }
    }
}

impl fmt::Display for UpstreamContext {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} [request {}]", self.call, self.correlation_id)
    }
}

fn join_statuses(statuses: &[TokenStatus]) -> String {
    statuses
        .iter()
        .map(|s| s.to_string())
        .collect::<Vec<_>>()
        .join(", ")
}

#[derive(Debug, thiserror::Error)]
pub enum GrantError {
    #[error("Invalid request: {0}")]
    InvalidRequest(String),

    #[error("Invalid content type '{content_type}' for {category} upload '{identifier}'")]
    InvalidContentType {
        identifier: String,
        content_type: String,
        category: AssetCategory,
    },

    #[error("Invalid token: {0}")]
    InvalidToken(String),

    #[error("Token has no '{claim}' binding claim")]
    MissingBinding { claim: String },

    #[error("Upload not ready: {}", join_statuses(statuses))]
    NotReady { statuses: Vec<TokenStatus> },

    #[error("Upload denied: {}", join_statuses(statuses))]
    Denied { statuses: Vec<TokenStatus> },

    #[error("Upstream unavailable during {context}: {message}")]
    UpstreamUnavailable {
        context: UpstreamContext,
        message: String,
    },

    #[error("Upstream rejected {context}: {code}: {message}")]
    UpstreamRejected {
        context: UpstreamContext,
        code: String,
        message: String,
        http_status: Option<u16>,
    },

    #[error("Malformed upstream response from {context}: {message}")]
    DecodeFailure {
        context: UpstreamContext,
        message: String,
    },

    #[error("Configuration error: {0}")]
    Configuration(String),
}

pub type GrantResult<T> = Result<T, GrantError>;

/// Static metadata per variant: (http_status, error_code, recoverable, log_level).
fn grant_error_static_metadata(err: &GrantError) -> (u16, &'static str, bool, LogLevel) {
    match err {
        GrantError::InvalidRequest(_) => (400, "INVALID_REQUEST", false, LogLevel::Debug),
        GrantError::InvalidContentType { .. } => {
            (400, "INVALID_CONTENT_TYPE", false, LogLevel::Debug)
        }
        GrantError::InvalidToken(_) => (401, "INVALID_TOKEN", false, LogLevel::Warn),
        GrantError::MissingBinding { .. } => (502, "MISSING_BINDING", false, LogLevel::Error),
        GrantError::NotReady { .. } => (409, "UPLOAD_NOT_READY", true, LogLevel::Debug),
        GrantError::Denied { .. } => (403, "UPLOAD_DENIED", false, LogLevel::Warn),
        GrantError::UpstreamUnavailable { .. } => {
            (503, "UPSTREAM_UNAVAILABLE", true, LogLevel::Error)
        }
        GrantError::UpstreamRejected { .. } => (502, "UPSTREAM_REJECTED", false, LogLevel::Warn),
        GrantError::DecodeFailure { .. } => {
            (502, "UPSTREAM_DECODE_FAILURE", false, LogLevel::Error)
        }
        GrantError::Configuration(_) => (500, "CONFIGURATION_ERROR", false, LogLevel::Error),
    }
}

impl GrantError {
    pub fn unavailable(
        call: UpstreamCall,
        correlation_id: &CorrelationId,
        message: impl Into<String>,
    ) -> Self {
        GrantError::UpstreamUnavailable {
            context: UpstreamContext::new(call, correlation_id.clone()),
            message: message.into(),
        }
    }

    pub fn decode_failure(
        call: UpstreamCall,
        correlation_id: &CorrelationId,
        message: impl Into<String>,
    ) -> Self {
        GrantError::DecodeFailure {
            context: UpstreamContext::new(call, correlation_id.clone()),
            message: message.into(),
        }
    }

    /// Get the error type name for detailed error responses
    pub fn error_type(&self) -> &'static str {
        match self {
            GrantError::InvalidRequest(_) => "InvalidRequest",
            GrantError::InvalidContentType { .. } => "InvalidContentType",
            GrantError::InvalidToken(_) => "InvalidToken",
            GrantError::MissingBinding { .. } => "MissingBinding",
            GrantError::NotReady { .. } => "NotReady",
            GrantError::Denied { .. } => "Denied",
            GrantError::UpstreamUnavailable { .. } => "UpstreamUnavailable",
            GrantError::UpstreamRejected { .. } => "UpstreamRejected",
            GrantError::DecodeFailure { .. } => "DecodeFailure",
            GrantError::Configuration(_) => "Configuration",
        }
    }

    pub fn upstream_context(&self) -> Option<&UpstreamContext> {
        match self {
            GrantError::UpstreamUnavailable { context, .. }
            | GrantError::UpstreamRejected { context, .. }
            | GrantError::DecodeFailure { context, .. } => Some(context),
            _ => None,
        }
    }

    /// Whether retrying the same call can succeed.
    ///
    /// Transport failures and pending uploads are retryable. Structured rejections are
    /// retryable only when the authority's code is listed in `transient_codes`.
    pub fn is_retryable(&self, transient_codes: &[String]) -> bool {
        match self {
            GrantError::UpstreamUnavailable { .. } | GrantError::NotReady { .. } => true,
            GrantError::UpstreamRejected { code, .. } => {
                transient_codes.iter().any(|c| c.eq_ignore_ascii_case(code))
            }
            _ => false,
        }
    }
}

impl ErrorMetadata for GrantError {
    fn http_status_code(&self) -> u16 {
        grant_error_static_metadata(self).0
    }

    fn error_code(&self) -> &'static str {
        grant_error_static_metadata(self).1
    }

    fn is_recoverable(&self) -> bool {
        grant_error_static_metadata(self).2
    }

    fn log_level(&self) -> LogLevel {
        grant_error_static_metadata(self).3
    }

    fn client_message(&self) -> String {
        match self {
            GrantError::InvalidRequest(msg) => msg.clone(),
            GrantError::InvalidContentType { .. } => self.to_string(),
            GrantError::InvalidToken(_) => "Invalid or expired token".to_string(),
            GrantError::MissingBinding { .. } => {
                "Token issuer returned a malformed token".to_string()
            }
            GrantError::NotReady { .. } => "Upload is still being processed".to_string(),
            GrantError::Denied { .. } => "Upload was rejected".to_string(),
            GrantError::UpstreamUnavailable { .. } => "Upload authority unavailable".to_string(),
            GrantError::UpstreamRejected { message, .. } => message.clone(),
            GrantError::DecodeFailure { .. } => {
                "Upload authority returned a malformed response".to_string()
            }
            GrantError::Configuration(_) => "Internal server error".to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::UploadStatus;

    fn rejected(code: &str) -> GrantError {
        GrantError::UpstreamRejected {
            context: UpstreamContext::new(UpstreamCall::BulkUploadRequest, CorrelationId::nil()),
            code: code.to_string(),
            message: "quota exhausted".to_string(),
            http_status: Some(429),
        }
    }

    #[test]
    fn rejected_keeps_code_and_message_verbatim() {
        let err = rejected("QUOTA_EXCEEDED");
        let text = err.to_string();
        assert!(text.contains("QUOTA_EXCEEDED"));
        assert!(text.contains("quota exhausted"));
        assert!(text.contains("bulk_upload_request"));
        assert_eq!(err.client_message(), "quota exhausted");
        assert_eq!(err.error_code(), "UPSTREAM_REJECTED");
    }

    #[test]
    fn retryability_follows_transient_code_list() {
        let transient = vec!["TOO_MANY_REQUESTS".to_string()];
        assert!(!rejected("QUOTA_EXCEEDED").is_retryable(&transient));
        assert!(rejected("too_many_requests").is_retryable(&transient));
        assert!(
            GrantError::unavailable(UpstreamCall::UploadCheck, &CorrelationId::nil(), "timeout")
                .is_retryable(&[])
        );
        assert!(!GrantError::InvalidToken("bad".into()).is_retryable(&transient));
    }

    #[test]
    fn not_ready_and_denied_are_distinguishable() {
        let pending = GrantError::NotReady {
            statuses: vec![TokenStatus::new("a", UploadStatus::UploadOnMalwareScanning)],
        };
        let denied = GrantError::Denied {
            statuses: vec![TokenStatus::new("a", UploadStatus::UploadVirusDetected)],
        };
        assert!(pending.is_recoverable());
        assert!(!denied.is_recoverable());
        assert_ne!(pending.error_code(), denied.error_code());
        assert!(denied.to_string().contains("a=UPLOAD_VIRUS_DETECTED"));
    }

    #[test]
    fn upstream_context_only_on_upstream_errors() {
        let err =
            GrantError::decode_failure(UpstreamCall::Jwks, &CorrelationId::new("r1"), "bad json");
        let ctx = err.upstream_context().unwrap();
        assert_eq!(ctx.call, UpstreamCall::Jwks);
        assert_eq!(ctx.correlation_id.as_str(), "r1");
        assert!(GrantError::InvalidRequest("x".into()).upstream_context().is_none());
    }
}
