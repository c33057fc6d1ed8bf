//! Error taxonomy for the Tavor SDK.
//!
//! Transport failures are translated into [`TavorError`] exactly once, at the
//! HTTP boundary. Everything above that boundary only propagates.

use thiserror::Error;

/// Result alias used across the SDK.
pub type TavorResult<T> = Result<T, TavorError>;

/// Errors returned by every public SDK operation.
///
/// API errors are grouped by HTTP status:
/// ```ignore
/// match box_handle.run("make test", CommandOptions::default()).await {
///     Err(TavorError::RateLimit { .. }) => { /* back off */ }
///     Err(TavorError::CommandTimeout(_)) => { /* remote command keeps running */ }
///     Err(e) if e.is_api_error() => { /* inspect e.status_code() */ }
///     _ => {}
/// }
/// ```
#[derive(Debug, Error)]
pub enum TavorError {
    /// 401: missing or invalid API key.
    #[error("authentication failed: {message}")]
    Authentication { message: String },

    /// 403: key is valid but not allowed to do this.
    #[error("not authorized: {message}")]
    Authorization { message: String },

    /// 404 on a request not scoped to a box.
    #[error("not found: {message}")]
    NotFound { message: String },

    /// 404 on a box-scoped request.
    #[error("box {0} not found")]
    BoxNotFound(String),

    /// 400 or 422.
    #[error("validation failed ({status}): {message}")]
    Validation { status: u16, message: String },

    /// 409.
    #[error("conflict: {message}")]
    Conflict { message: String },

    /// 429.
    #[error("rate limited: {message}")]
    RateLimit { message: String },

    /// 5xx.
    #[error("server error ({status}): {message}")]
    Server { status: u16, message: String },

    /// Any other failure reported by the service, including responses that
    /// do not match the documented shape.
    #[error("service error: {0}")]
    Service(String),

    /// The request never produced an HTTP status (DNS, connect, TLS, reset).
    #[error("transport: {0}")]
    Transport(String),

    /// Local wait for a command exceeded, or the service reported a timeout.
    #[error("command timed out: {0}")]
    CommandTimeout(String),

    /// Local wait for box readiness exceeded.
    #[error("timed out: {0}")]
    Timeout(String),

    /// Box reached a terminal status other than `running` while waiting.
    #[error("box failed to start: {status}{}", .details.as_deref().map(|d| format!(" - {d}")).unwrap_or_default())]
    BoxStart {
        status: String,
        details: Option<String>,
    },

    /// Operation on a handle that was already stopped.
    #[error("box handle {0} is closed")]
    ClosedHandle(String),

    /// Invalid or incomplete client-side configuration.
    #[error("configuration: {0}")]
    Configuration(String),

    /// Server reported a status change the box state machine does not allow.
    #[error("invalid box transition from {from} to {to}")]
    InvalidTransition { from: String, to: String },

    /// Server reported a status string outside the known set.
    #[error("unexpected {kind} status '{value}'")]
    UnexpectedStatus { kind: &'static str, value: String },

    /// The command stream reported an error event.
    #[error("command error: {0}")]
    Command(String),
}

impl TavorError {
    /// Translate an HTTP error response into a typed error.
    ///
    /// The message comes from the JSON `error` field, then `message`, then the
    /// raw body, then the canonical reason for the status.
    pub fn from_response(status: u16, body: &str) -> Self {
        let message = error_message(status, body);
        match status {
            400 | 422 => TavorError::Validation { status, message },
            401 => TavorError::Authentication { message },
            403 => TavorError::Authorization { message },
            404 => TavorError::NotFound { message },
            409 => TavorError::Conflict { message },
            429 => TavorError::RateLimit { message },
            500..=599 => TavorError::Server { status, message },
            _ => TavorError::Service(format!("HTTP {status}: {message}")),
        }
    }

    /// Re-scope a generic 404 to the box the request targeted.
    pub fn for_box(self, box_id: &str) -> Self {
        match self {
            TavorError::NotFound { .. } => TavorError::BoxNotFound(box_id.to_string()),
            other => other,
        }
    }

    /// HTTP status behind this error, when it came from an API response.
    pub fn status_code(&self) -> Option<u16> {
        match self {
            TavorError::Authentication { .. } => Some(401),
            TavorError::Authorization { .. } => Some(403),
            TavorError::NotFound { .. } | TavorError::BoxNotFound(_) => Some(404),
            TavorError::Validation { status, .. } | TavorError::Server { status, .. } => {
                Some(*status)
            }
            TavorError::Conflict { .. } => Some(409),
            TavorError::RateLimit { .. } => Some(429),
            _ => None,
        }
    }

    pub fn is_api_error(&self) -> bool {
        self.status_code().is_some()
    }

    pub fn is_timeout(&self) -> bool {
        matches!(self, TavorError::CommandTimeout(_) | TavorError::Timeout(_))
    }
}

fn error_message(status: u16, body: &str) -> String {
    if let Ok(value) = serde_json::from_str::<serde_json::Value>(body) {
        for key in ["error", "message"] {
            if let Some(text) = value.get(key).and_then(|v| v.as_str())
                && !text.is_empty()
            {
                return text.to_string();
            }
        }
    }

    let trimmed = body.trim();
    if !trimmed.is_empty() {
        return trimmed.to_string();
    }

    reason_phrase(status).to_string()
}

fn reason_phrase(status: u16) -> &'static str {
    match status {
        400 => "Bad Request",
        401 => "Unauthorized",
        403 => "Forbidden",
        404 => "Not Found",
        409 => "Conflict",
        422 => "Unprocessable Entity",
        429 => "Too Many Requests",
        500..=599 => "Server Error",
        _ => "Request Failed",
    }
}
