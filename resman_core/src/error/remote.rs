//! Remote transport error types
//!
//! The remote transport rejects with a [`RemoteError`] carrying a structured
//! `code` (and optionally an HTTP-like `status`). Classification into an
//! [`ErrorKind`] only ever looks at those structured fields; the
//! human-readable `message` is for display.

use serde::{Deserialize, Serialize};
use std::fmt;
use thiserror::Error;

/// Taxonomy of remote failures
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorKind {
    /// Payload rejected by the server, field-level
    Validation,
    /// Authorization or permission failure
    Permission,
    /// Duplicate resource or constraint violation
    Conflict,
    /// Network, timeout or 5xx failure
    Transient,
    /// Anything the transport did not declare
    Unknown,
}

impl ErrorKind {
    /// Whether failures of this kind may be reissued
    pub fn is_retryable(self) -> bool {
        matches!(self, Self::Transient)
    }
}

impl fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Validation => "validation",
            Self::Permission => "permission",
            Self::Conflict => "conflict",
            Self::Transient => "transient",
            Self::Unknown => "unknown",
        };
        f.write_str(name)
    }
}

/// A single field-level rejection
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FieldError {
    pub field: String,
    pub message: String,
}

impl FieldError {
    /// Create a field error
    pub fn new(field: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            field: field.into(),
            message: message.into(),
        }
    }
}

impl fmt::Display for FieldError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.field, self.message)
    }
}

/// Typed rejection returned by the remote transport
#[derive(Error, Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[error("{code}: {message}")]
pub struct RemoteError {
    /// Machine-readable error code
    pub code: String,
    /// Human-readable message
    pub message: String,
    /// Transport status code, when the transport has one
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub status: Option<u16>,
    /// Field-level rejections
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub field_errors: Vec<FieldError>,
}

const VALIDATION_CODES: &[&str] = &[
    "validation_error",
    "invalid_payload",
    "invalid_field",
    "unprocessable",
    "bad_request",
];
const PERMISSION_CODES: &[&str] = &["permission_denied", "forbidden", "unauthorized"];
const CONFLICT_CODES: &[&str] = &["conflict", "duplicate", "already_exists"];
const TRANSIENT_CODES: &[&str] = &[
    "timeout",
    "network",
    "connection_reset",
    "unavailable",
    "rate_limited",
    "server_error",
    "internal",
];
const NOT_FOUND_CODES: &[&str] = &["not_found"];

impl RemoteError {
    /// Create a remote error from a code and message
    pub fn new(code: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            code: code.into(),
            message: message.into(),
            status: None,
            field_errors: Vec::new(),
        }
    }

    /// Attach a transport status code
    pub fn with_status(mut self, status: u16) -> Self {
        self.status = Some(status);
        self
    }

    /// Attach a field-level rejection
    pub fn with_field_error(mut self, field: impl Into<String>, message: impl Into<String>) -> Self {
        self.field_errors.push(FieldError::new(field, message));
        self
    }

    /// Create a validation error
    pub fn validation(message: impl Into<String>) -> Self {
        Self::new("validation_error", message).with_status(422)
    }

    /// Create a permission error
    pub fn permission(message: impl Into<String>) -> Self {
        Self::new("permission_denied", message).with_status(403)
    }

    /// Create a conflict error
    pub fn conflict(message: impl Into<String>) -> Self {
        Self::new("conflict", message).with_status(409)
    }

    /// Create a timeout error
    pub fn timeout(message: impl Into<String>) -> Self {
        Self::new("timeout", message)
    }

    /// Create a server-side (5xx) error
    pub fn server(status: u16, message: impl Into<String>) -> Self {
        Self::new("server_error", message).with_status(status)
    }

    /// Create a not-found error
    pub fn not_found(message: impl Into<String>) -> Self {
        Self::new("not_found", message).with_status(404)
    }

    /// Classify this error
    ///
    /// Rules apply in priority order: validation, permission, conflict,
    /// transient. A declared code wins over the status; an unrecognised code
    /// without a recognisable status is [`ErrorKind::Unknown`].
    pub fn kind(&self) -> ErrorKind {
        let code = self.code.to_ascii_lowercase();
        let code = code.as_str();

        if !self.field_errors.is_empty() || VALIDATION_CODES.contains(&code) {
            return ErrorKind::Validation;
        }
        if PERMISSION_CODES.contains(&code) {
            return ErrorKind::Permission;
        }
        if CONFLICT_CODES.contains(&code) {
            return ErrorKind::Conflict;
        }
        if TRANSIENT_CODES.contains(&code) {
            return ErrorKind::Transient;
        }

        match self.status {
            Some(400 | 422) => ErrorKind::Validation,
            Some(401 | 403) => ErrorKind::Permission,
            Some(409) => ErrorKind::Conflict,
            Some(408 | 429 | 500..=599) => ErrorKind::Transient,
            _ => ErrorKind::Unknown,
        }
    }

    /// Check if this error is transient and can be retried
    pub fn is_retryable(&self) -> bool {
        self.kind().is_retryable()
    }

    /// Check if this error indicates a permanent failure
    pub fn is_permanent(&self) -> bool {
        matches!(
            self.kind(),
            ErrorKind::Validation | ErrorKind::Permission | ErrorKind::Conflict
        )
    }

    /// Check if the server reported the target as missing
    pub fn is_not_found(&self) -> bool {
        NOT_FOUND_CODES.contains(&self.code.to_ascii_lowercase().as_str())
            || self.status == Some(404)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_constructor_kinds() {
        assert_eq!(RemoteError::validation("bad").kind(), ErrorKind::Validation);
        assert_eq!(RemoteError::permission("no").kind(), ErrorKind::Permission);
        assert_eq!(RemoteError::conflict("dup").kind(), ErrorKind::Conflict);
        assert_eq!(RemoteError::timeout("slow").kind(), ErrorKind::Transient);
        assert_eq!(RemoteError::server(503, "down").kind(), ErrorKind::Transient);
    }

    #[test]
    fn test_field_errors_force_validation() {
        let error = RemoteError::server(500, "oops").with_field_error("name", "required");
        assert_eq!(error.kind(), ErrorKind::Validation);
        assert!(!error.is_retryable());
    }

    #[test]
    fn test_code_wins_over_status() {
        let error = RemoteError::new("conflict", "duplicate name").with_status(500);
        assert_eq!(error.kind(), ErrorKind::Conflict);
    }

    #[test]
    fn test_status_fallback() {
        assert_eq!(
            RemoteError::new("E_WHATEVER", "x").with_status(401).kind(),
            ErrorKind::Permission
        );
        assert_eq!(
            RemoteError::new("E_WHATEVER", "x").with_status(429).kind(),
            ErrorKind::Transient
        );
        assert_eq!(
            RemoteError::new("E_WHATEVER", "x").with_status(400).kind(),
            ErrorKind::Validation
        );
    }

    #[test]
    fn test_message_text_is_ignored() {
        let error = RemoteError::new("mystery", "permission denied: timeout, duplicate");
        assert_eq!(error.kind(), ErrorKind::Unknown);
        assert!(!error.is_retryable());
        assert!(!error.is_permanent());
    }

    #[test]
    fn test_code_is_case_insensitive() {
        assert_eq!(
            RemoteError::new("PERMISSION_DENIED", "x").kind(),
            ErrorKind::Permission
        );
    }

    #[test]
    fn test_not_found() {
        assert!(RemoteError::not_found("gone").is_not_found());
        assert!(RemoteError::new("missing", "x").with_status(404).is_not_found());
        assert!(!RemoteError::timeout("x").is_not_found());
    }

    #[test]
    fn test_display() {
        let error = RemoteError::permission("Access denied");
        assert_eq!(error.to_string(), "permission_denied: Access denied");
        assert_eq!(ErrorKind::Transient.to_string(), "transient");
    }

    #[test]
    fn test_deserialize_minimal() {
        let error: RemoteError =
            serde_json::from_str(r#"{"code":"timeout","message":"slow"}"#).unwrap();
        assert_eq!(error.status, None);
        assert!(error.field_errors.is_empty());
        assert!(error.is_retryable());
    }
}
