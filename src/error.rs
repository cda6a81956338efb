//! Provider errors.
//!
//! Remote failures are classified by HTTP status (see
//! [`ProviderError::from_status`]) so resources can treat a missing object,
//! a conflict and a throttled request differently.

use thiserror::Error;

use crate::schema::Diagnostic;

/// Everything that can go wrong while configuring the provider or managing
/// Lightdash objects.
#[derive(Debug, Error)]
pub enum ProviderError {
    /// The remote object does not exist (HTTP 404).
    #[error("Not found: {0}")]
    NotFound(String),

    /// Configuration or arguments failed a check.
    #[error("Validation failed: {0}")]
    Validation(String),

    /// The provider configuration cannot be used.
    #[error("Configuration error: {0}")]
    Configuration(String),

    /// Used before `configure` succeeded.
    #[error("Provider not configured: {0}")]
    NotConfigured(String),

    /// A resource, data source or function name the provider does not serve.
    #[error("Unknown {0}")]
    UnknownType(String),

    /// A composite import ID that does not match its template.
    #[error("Invalid resource ID: {0}")]
    InvalidId(String),

    /// JSON could not be encoded or decoded.
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// The request could not be sent or its body could not be read.
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    /// The object already exists (HTTP 409).
    #[error("Already exists: {0}")]
    AlreadyExists(String),

    /// The API token was rejected or lacks permission (HTTP 401/403).
    #[error("Permission denied: {0}")]
    PermissionDenied(String),

    /// Throttled (HTTP 429).
    #[error("Rate limited: {0}")]
    ResourceExhausted(String),

    /// Lightdash is down or failing (HTTP 5xx).
    #[error("Service unavailable: {0}")]
    Unavailable(String),

    /// The request timed out.
    #[error("Timed out: {0}")]
    DeadlineExceeded(String),

    /// Refused because of the object's current state.
    #[error("Failed precondition: {0}")]
    FailedPrecondition(String),

    /// Any other rejected request (HTTP 4xx).
    #[error("Invalid request: {0}")]
    InvalidRequest(String),
}

impl ProviderError {
    /// The message without the category prefix.
    pub fn message(&self) -> &str {
        match self {
            Self::NotFound(msg)
            | Self::Validation(msg)
            | Self::Configuration(msg)
            | Self::NotConfigured(msg)
            | Self::UnknownType(msg)
            | Self::InvalidId(msg)
            | Self::AlreadyExists(msg)
            | Self::PermissionDenied(msg)
            | Self::ResourceExhausted(msg)
            | Self::Unavailable(msg)
            | Self::DeadlineExceeded(msg)
            | Self::FailedPrecondition(msg)
            | Self::InvalidRequest(msg) => msg,
            Self::Serialization(_) => "invalid JSON (see Debug output)",
            Self::Http(_) => "request failed (see Debug output)",
        }
    }

    /// Whether the failed API call may succeed if sent again.
    pub fn is_retryable(&self) -> bool {
        match self {
            Self::ResourceExhausted(_) | Self::Unavailable(_) | Self::DeadlineExceeded(_) => true,
            Self::Http(err) => err.is_timeout() || err.is_connect() || err.is_request(),
            _ => false,
        }
    }

    /// Map an HTTP status returned by the Lightdash API to an error.
    pub fn from_status(status: u16, message: impl Into<String>) -> Self {
        let message = message.into();
        match status {
            401 | 403 => Self::PermissionDenied(message),
            404 => Self::NotFound(message),
            408 | 504 => Self::DeadlineExceeded(message),
            409 => Self::AlreadyExists(message),
            412 => Self::FailedPrecondition(message),
            429 => Self::ResourceExhausted(message),
            500..=599 => Self::Unavailable(message),
            _ => Self::InvalidRequest(message),
        }
    }
}

impl From<ProviderError> for Diagnostic {
    fn from(err: ProviderError) -> Self {
        match err {
            ProviderError::Validation(msg) => Diagnostic::error("Invalid configuration").with_detail(msg),
            ProviderError::InvalidId(msg) => Diagnostic::error("Invalid import ID").with_detail(msg),
            other => Diagnostic::error(other.to_string()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::schema::DiagnosticSeverity;

    #[test]
    fn test_display() {
        let err = ProviderError::NotFound("space 'space-123'".to_string());
        assert_eq!(err.to_string(), "Not found: space 'space-123'");

        let err = ProviderError::UnknownType("resource type 'lightdash_dashboard'".to_string());
        assert_eq!(err.to_string(), "Unknown resource type 'lightdash_dashboard'");
        assert_eq!(err.message(), "resource type 'lightdash_dashboard'");
    }

    #[test]
    fn test_from_status() {
        let cases = [
            (401, "PermissionDenied"),
            (403, "PermissionDenied"),
            (404, "NotFound"),
            (409, "AlreadyExists"),
            (429, "ResourceExhausted"),
            (502, "Unavailable"),
            (504, "DeadlineExceeded"),
            (400, "InvalidRequest"),
            (422, "InvalidRequest"),
        ];
        for (status, variant) in cases {
            let debug = format!("{:?}", ProviderError::from_status(status, "x"));
            assert!(debug.starts_with(variant), "{} mapped to {}", status, debug);
        }
    }

    #[test]
    fn test_is_retryable() {
        assert!(ProviderError::ResourceExhausted("slow down".into()).is_retryable());
        assert!(ProviderError::Unavailable("502".into()).is_retryable());
        assert!(!ProviderError::NotFound("gone".into()).is_retryable());
        assert!(!ProviderError::InvalidRequest("bad".into()).is_retryable());
    }

    #[test]
    fn test_serialization_message() {
        let err: ProviderError = serde_json::from_str::<u32>("nope").unwrap_err().into();
        assert_eq!(err.message(), "invalid JSON (see Debug output)");
        assert!(err.to_string().starts_with("Serialization error: "));
    }

    #[test]
    fn test_into_diagnostic() {
        let diag: Diagnostic = ProviderError::Unavailable("maintenance".into()).into();
        assert_eq!(diag.severity, DiagnosticSeverity::Error);
        assert_eq!(diag.summary, "Service unavailable: maintenance");

        let diag: Diagnostic =
            ProviderError::InvalidId("expected projects/{project_uuid}".into()).into();
        assert_eq!(diag.summary, "Invalid import ID");
        assert_eq!(diag.detail.as_deref(), Some("expected projects/{project_uuid}"));
    }
}
