use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

use crate::capabilities::HttpError;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorSeverity {
    Transient,
    Permanent,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorKind {
    Network,
    Timeout,
    IdentityMissing,
    RoleMismatch,
    NotFound,
    InvalidTransition,
    TransitionInFlight,
    ActiveRideExists,
    Conflict,
    Deserialization,
    Validation,
    Configuration,
}

impl ErrorKind {
    #[must_use]
    pub const fn code(self) -> &'static str {
        match self {
            Self::Network => "NETWORK_FAILURE",
            Self::Timeout => "TIMEOUT",
            Self::IdentityMissing => "IDENTITY_MISSING",
            Self::RoleMismatch => "ROLE_MISMATCH",
            Self::NotFound => "NOT_FOUND",
            Self::InvalidTransition => "INVALID_TRANSITION",
            Self::TransitionInFlight => "TRANSITION_IN_FLIGHT",
            Self::ActiveRideExists => "ACTIVE_RIDE_EXISTS",
            Self::Conflict => "CONFLICT",
            Self::Deserialization => "DESERIALIZATION_ERROR",
            Self::Validation => "VALIDATION_ERROR",
            Self::Configuration => "CONFIGURATION_ERROR",
        }
    }

    #[must_use]
    pub const fn default_severity(self) -> ErrorSeverity {
        match self {
            Self::Network | Self::Timeout | Self::Conflict | Self::TransitionInFlight => {
                ErrorSeverity::Transient
            }

            Self::IdentityMissing
            | Self::RoleMismatch
            | Self::NotFound
            | Self::InvalidTransition
            | Self::ActiveRideExists
            | Self::Deserialization
            | Self::Validation
            | Self::Configuration => ErrorSeverity::Permanent,
        }
    }

    #[must_use]
    pub const fn is_retryable(self) -> bool {
        matches!(self, Self::Network | Self::Timeout | Self::Conflict)
    }
}

/// The one error shape the presentation layer ever sees.
///
/// Every failure is recorded on the store that produced it; nothing is
/// thrown across the shell boundary.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct AppError {
    pub kind: ErrorKind,
    pub severity: ErrorSeverity,
    pub message: String,
    pub internal_message: Option<String>,
    pub context: BTreeMap<String, String>,
}

impl AppError {
    #[must_use]
    pub fn new(kind: ErrorKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            severity: kind.default_severity(),
            message: message.into(),
            internal_message: None,
            context: BTreeMap::new(),
        }
    }

    #[must_use]
    pub fn with_internal(mut self, internal: impl Into<String>) -> Self {
        self.internal_message = Some(internal.into());
        self
    }

    #[must_use]
    pub fn with_context(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.context.insert(key.into(), value.into());
        self
    }

    #[must_use]
    pub const fn code(&self) -> &'static str {
        self.kind.code()
    }

    #[must_use]
    pub const fn is_retryable(&self) -> bool {
        self.kind.is_retryable()
    }

    #[must_use]
    pub fn user_facing_message(&self) -> String {
        match self.kind {
            ErrorKind::Network => {
                "Unable to reach the server. Please check your connection and try again.".into()
            }
            ErrorKind::Timeout => "The request timed out. Please try again.".into(),
            ErrorKind::IdentityMissing => "Please sign in before accepting rides.".into(),
            ErrorKind::RoleMismatch => "Only drivers can accept ride requests.".into(),
            ErrorKind::NotFound => "This ride request is no longer available.".into(),
            ErrorKind::InvalidTransition => {
                "That action isn't available for this ride right now.".into()
            }
            ErrorKind::TransitionInFlight => "Hang on, we're still updating this ride.".into(),
            ErrorKind::ActiveRideExists => {
                "Finish your current ride before accepting another.".into()
            }
            ErrorKind::Conflict => {
                "This ride was changed elsewhere. Please refresh and try again.".into()
            }
            ErrorKind::Deserialization => {
                "We received an unexpected response. Please try again.".into()
            }
            ErrorKind::Validation | ErrorKind::Configuration => self.message.clone(),
        }
    }

    pub(crate) fn not_found(what: &str, id: &str) -> Self {
        Self::new(ErrorKind::NotFound, format!("{what} {id} not found"))
            .with_context("id", id.to_string())
    }

    pub(crate) fn from_http_status(status: u16, body: &[u8]) -> Self {
        let detail = String::from_utf8_lossy(body);
        let detail = detail.trim();
        // 409 means someone else changed the ride first.
        let kind = if status == 409 {
            ErrorKind::Conflict
        } else {
            ErrorKind::Network
        };
        let error = Self::new(kind, format!("HTTP error: {status}"))
            .with_context("http_status", status.to_string());
        if detail.is_empty() {
            error
        } else {
            error.with_internal(truncate(detail, 256))
        }
    }
}

impl std::fmt::Display for AppError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "[{}] {}", self.code(), self.message)?;
        if let Some(internal) = &self.internal_message {
            write!(f, " (internal: {internal})")?;
        }
        Ok(())
    }
}

impl std::error::Error for AppError {}

impl From<HttpError> for AppError {
    fn from(e: HttpError) -> Self {
        match &e {
            HttpError::Timeout { timeout_ms, request_id } => {
                AppError::new(ErrorKind::Timeout, "Request timed out")
                    .with_context("timeout_ms", timeout_ms.to_string())
                    .with_context("request_id", request_id.clone())
            }
            HttpError::HttpStatus { status, message, .. } => {
                AppError::from_http_status(*status, message.as_bytes())
            }
            HttpError::InvalidResponse { reason, .. } => {
                AppError::new(ErrorKind::Deserialization, "Malformed response").with_internal(reason)
            }
            HttpError::InvalidUrl { .. }
            | HttpError::InvalidHeader { .. }
            | HttpError::InvalidRequest { .. }
            | HttpError::SerializationError { .. } => {
                AppError::new(ErrorKind::Validation, e.to_string())
            }
            HttpError::ConnectionError { .. } | HttpError::Cancelled { .. } => {
                AppError::new(ErrorKind::Network, "Network error").with_internal(e.to_string())
            }
        }
    }
}

pub type AppResult<T> = Result<T, AppError>;

#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
pub struct UserFacingError {
    pub message: String,
    pub is_transient: bool,
    pub is_retryable: bool,
    pub error_code: String,
}

impl From<&AppError> for UserFacingError {
    fn from(e: &AppError) -> Self {
        Self {
            message: e.user_facing_message(),
            is_transient: e.severity == ErrorSeverity::Transient,
            is_retryable: e.is_retryable(),
            error_code: e.code().to_string(),
        }
    }
}

fn truncate(s: &str, max: usize) -> String {
    match s.char_indices().nth(max) {
        Some((idx, _)) => format!("{}...", &s[..idx]),
        None => s.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn status_errors_are_network_failures() {
        let err = AppError::from_http_status(500, b"boom");
        assert_eq!(err.kind, ErrorKind::Network);
        assert_eq!(err.context.get("http_status").map(String::as_str), Some("500"));
        assert_eq!(err.internal_message.as_deref(), Some("boom"));
        assert!(err.is_retryable());
    }

    #[test]
    fn conflict_status_is_conflict() {
        let err = AppError::from_http_status(409, b"");
        assert_eq!(err.kind, ErrorKind::Conflict);
        assert!(err.internal_message.is_none());
    }

    #[test]
    fn timeout_maps_to_transient_timeout() {
        let err: AppError = HttpError::Timeout {
            timeout_ms: 20_000,
            request_id: "req-1".into(),
        }
        .into();
        assert_eq!(err.kind, ErrorKind::Timeout);
        assert_eq!(err.severity, ErrorSeverity::Transient);
    }

    #[test]
    fn local_rejections_are_not_retryable() {
        for kind in [
            ErrorKind::IdentityMissing,
            ErrorKind::NotFound,
            ErrorKind::ActiveRideExists,
            ErrorKind::InvalidTransition,
        ] {
            assert!(!AppError::new(kind, "x").is_retryable(), "{kind:?}");
        }
    }

    #[test]
    fn user_facing_error_carries_code() {
        let err = AppError::new(ErrorKind::IdentityMissing, "driver id not found");
        let facing = UserFacingError::from(&err);
        assert_eq!(facing.error_code, "IDENTITY_MISSING");
        assert!(!facing.is_transient);
    }

    #[test]
    fn long_bodies_are_truncated() {
        let body = "x".repeat(1000);
        let err = AppError::from_http_status(502, body.as_bytes());
        let internal = err.internal_message.unwrap();
        assert!(internal.len() < 300);
        assert!(internal.ends_with("..."));
    }
}
