//! REST routes, request bodies and wire records.
//!
//! Shared by the async and blocking clients. Wire records keep statuses as
//! raw strings so an unknown value becomes `UnexpectedStatus` rather than a
//! generic decode failure.

use crate::config::ClientConfig;
use crate::types::{BoxInfo, BoxStatus, ExposedPort};
use chrono::{DateTime, Utc};
use reqwest::header::{ACCEPT, HeaderMap, HeaderName, HeaderValue};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use tavor_shared::constants::api::{API_KEY_HEADER, BOXES_PATH};
use tavor_shared::errors::{TavorError, TavorResult};

pub(crate) const USER_AGENT: &str = concat!("tavor-rust/", env!("CARGO_PKG_VERSION"));

/// Route builders. Identifiers are percent-encoded.
pub(crate) mod paths {
    use super::BOXES_PATH;

    pub fn boxes() -> String {
        BOXES_PATH.to_string()
    }

    pub fn single(box_id: &str) -> String {
        format!("{}/{}", BOXES_PATH, urlencoding::encode(box_id))
    }

    pub fn command(box_id: &str, command_id: &str) -> String {
        format!(
            "{}/commands/{}",
            single(box_id),
            urlencoding::encode(command_id)
        )
    }

    pub fn pause(box_id: &str) -> String {
        format!("{}/pause", single(box_id))
    }

    pub fn resume(box_id: &str) -> String {
        format!("{}/resume", single(box_id))
    }

    pub fn expose_port(box_id: &str) -> String {
        format!("{}/expose_port", single(box_id))
    }
}

// ============================================================================
// REQUEST BODIES
// ============================================================================

#[derive(Debug, Serialize)]
pub(crate) struct QueueCommandRequest<'a> {
    pub command: &'a str,
    pub stream: bool,
}

#[derive(Debug, Serialize)]
pub(crate) struct ExposePortRequest {
    pub port: u16,
}

// ============================================================================
// RESPONSE RECORDS
// ============================================================================

#[derive(Debug, Deserialize)]
pub(crate) struct DataEnvelope<T> {
    pub data: T,
}

/// Body of `POST /api/v2/boxes`.
#[derive(Debug, Deserialize)]
pub(crate) struct CreatedBox {
    pub id: String,
    #[serde(default)]
    pub status: Option<String>,
}

impl CreatedBox {
    /// First status of the new handle: whatever the service reported, else `creating`.
    ///
    /// The box already exists at this point, so an unknown status must not
    /// lose its id; the first refresh validates the real status.
    pub fn initial_status(&self) -> BoxStatus {
        let Some(status) = self.status.as_deref() else {
            return BoxStatus::Creating;
        };
        status.parse().unwrap_or_else(|e| {
            tracing::warn!(box_id = %self.id, error = %e, "Unknown initial box status, assuming creating");
            BoxStatus::Creating
        })
    }
}

#[derive(Debug, Deserialize)]
pub(crate) struct BoxRecord {
    pub id: String,
    pub status: String,
    #[serde(default)]
    pub timeout: Option<u64>,
    #[serde(default)]
    pub created_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub details: Option<String>,
    #[serde(default)]
    pub hostname: Option<String>,
    #[serde(default)]
    pub metadata: Option<HashMap<String, serde_json::Value>>,
}

impl TryFrom<BoxRecord> for BoxInfo {
    type Error = TavorError;

    fn try_from(record: BoxRecord) -> Result<Self, Self::Error> {
        Ok(BoxInfo {
            status: record.status.parse()?,
            id: record.id,
            timeout: record.timeout,
            created_at: record.created_at,
            details: record.details,
            hostname: record.hostname,
            metadata: record.metadata.unwrap_or_default(),
        })
    }
}

#[derive(Debug, Deserialize)]
pub(crate) struct BoxList {
    #[serde(default)]
    pub data: Vec<BoxRecord>,
}

impl BoxList {
    pub fn into_infos(self) -> TavorResult<Vec<BoxInfo>> {
        self.data.into_iter().map(BoxInfo::try_from).collect()
    }
}

/// Body of a non-streaming `POST /api/v2/boxes/{id}`.
#[derive(Debug, Deserialize)]
pub(crate) struct QueuedCommand {
    pub id: String,
}

/// Body of `GET /api/v2/boxes/{id}/commands/{cmd_id}`.
#[derive(Debug, Clone, Deserialize)]
pub(crate) struct CommandRecord {
    pub id: String,
    #[serde(default)]
    pub command: Option<String>,
    pub status: String,
    #[serde(default)]
    pub stdout: Option<String>,
    #[serde(default)]
    pub stderr: Option<String>,
    #[serde(default)]
    pub created_at: Option<DateTime<Utc>>,
}

#[derive(Debug, Deserialize)]
pub(crate) struct ExposedPortRecord {
    pub proxy_port: u16,
    pub target_port: u16,
    pub expires_at: DateTime<Utc>,
}

impl From<ExposedPortRecord> for ExposedPort {
    fn from(record: ExposedPortRecord) -> Self {
        ExposedPort {
            proxy_port: record.proxy_port,
            target_port: record.target_port,
            expires_at: record.expires_at,
        }
    }
}

// ============================================================================
// HTTP PLUMBING
// ============================================================================

/// Headers sent with every request. The API key is marked sensitive so it
/// never shows up in `Debug` output.
pub(crate) fn default_headers(config: &ClientConfig) -> TavorResult<HeaderMap> {
    let mut api_key = HeaderValue::from_str(&config.api_key).map_err(|_| {
        TavorError::Configuration("API key contains characters not allowed in a header".into())
    })?;
    api_key.set_sensitive(true);
    let name = HeaderName::from_bytes(API_KEY_HEADER.as_bytes())
        .map_err(|e| TavorError::Configuration(format!("invalid header name: {}", e)))?;

    let mut headers = HeaderMap::new();
    headers.insert(name, api_key);
    headers.insert(ACCEPT, HeaderValue::from_static("application/json"));
    Ok(headers)
}

/// Failure before any HTTP status was received.
pub(crate) fn transport_error(err: reqwest::Error) -> TavorError {
    if err.is_timeout() {
        TavorError::Transport(format!("request timed out: {}", err))
    } else {
        TavorError::Transport(err.to_string())
    }
}

/// Typed error for a non-success status; box-scoped 404s name the box.
pub(crate) fn status_error(status: reqwest::StatusCode, body: &str, box_id: Option<&str>) -> TavorError {
    let err = TavorError::from_response(status.as_u16(), body);
    match box_id {
        Some(id) => err.for_box(id),
        None => err,
    }
}

/// Decode a successful response body.
pub(crate) fn decode<T: DeserializeOwned>(body: &[u8], what: &str) -> TavorResult<T> {
    serde_json::from_slice(body)
        .map_err(|e| TavorError::Service(format!("malformed {} response: {}", what, e)))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_paths_encode_identifiers() {
        assert_eq!(paths::boxes(), "/api/v2/boxes");
        assert_eq!(paths::single("box-1"), "/api/v2/boxes/box-1");
        assert_eq!(paths::single("a/b"), "/api/v2/boxes/a%2Fb");
        assert_eq!(
            paths::command("box-1", "cmd 2"),
            "/api/v2/boxes/box-1/commands/cmd%202"
        );
        assert_eq!(paths::pause("box-1"), "/api/v2/boxes/box-1/pause");
        assert_eq!(paths::resume("box-1"), "/api/v2/boxes/box-1/resume");
        assert_eq!(paths::expose_port("box-1"), "/api/v2/boxes/box-1/expose_port");
    }

    #[test]
    fn test_box_record_conversion() {
        let body = br#"{"data":{"id":"box-123","status":"running","timeout":3600,
            "created_at":"2024-01-01T00:00:00Z","details":null,"hostname":"box789.tavor.app"}}"#;
        let envelope: DataEnvelope<BoxRecord> = decode(body, "box").unwrap();
        let info = BoxInfo::try_from(envelope.data).unwrap();

        assert_eq!(info.id, "box-123");
        assert_eq!(info.status, BoxStatus::Running);
        assert_eq!(info.timeout, Some(3600));
        assert_eq!(info.hostname.as_deref(), Some("box789.tavor.app"));
        assert!(info.metadata.is_empty());
        assert_eq!(info.created_at.unwrap().timestamp(), 1_704_067_200);
    }

    #[test]
    fn test_box_record_unknown_status() {
        let record: BoxRecord = decode(br#"{"id":"b","status":"melting"}"#, "box").unwrap();
        assert!(matches!(
            BoxInfo::try_from(record),
            Err(TavorError::UnexpectedStatus { kind: "box", .. })
        ));
    }

    #[test]
    fn test_box_list_missing_data_is_empty() {
        let list: BoxList = decode(b"{}", "box list").unwrap();
        assert!(list.into_infos().unwrap().is_empty());
    }

    #[test]
    fn test_created_box_initial_status() {
        let created: CreatedBox = decode(br#"{"id":"b"}"#, "create").unwrap();
        assert_eq!(created.initial_status(), BoxStatus::Creating);

        let created: CreatedBox = decode(br#"{"id":"b","status":"queued"}"#, "create").unwrap();
        assert_eq!(created.initial_status(), BoxStatus::Queued);

        let created: CreatedBox = decode(br#"{"id":"b","status":"pending"}"#, "create").unwrap();
        assert_eq!(created.initial_status(), BoxStatus::Creating);
    }

    #[test]
    fn test_exposed_port_record() {
        let envelope: DataEnvelope<ExposedPortRecord> = decode(
            br#"{"data":{"proxy_port":40123,"target_port":8080,"expires_at":"2024-06-01T12:00:00Z"}}"#,
            "expose_port",
        )
        .unwrap();
        let port = ExposedPort::from(envelope.data);
        assert_eq!(port.proxy_port, 40123);
        assert_eq!(port.target_port, 8080);
        assert_eq!(port.expires_at.to_rfc3339(), "2024-06-01T12:00:00+00:00");
    }

    #[test]
    fn test_status_error_scoping() {
        let err = status_error(reqwest::StatusCode::NOT_FOUND, "", Some("box-9"));
        assert!(matches!(err, TavorError::BoxNotFound(ref id) if id == "box-9"));

        let err = status_error(reqwest::StatusCode::NOT_FOUND, r#"{"error":"gone"}"#, None);
        assert!(matches!(err, TavorError::NotFound { ref message } if message == "gone"));

        let err = status_error(reqwest::StatusCode::TOO_MANY_REQUESTS, "", Some("box-9"));
        assert!(matches!(err, TavorError::RateLimit { .. }));
    }

    #[test]
    fn test_default_headers_hide_api_key() {
        let config = ClientConfig::resolve(
            crate::ClientOptions::new().api_key("sk-tavor-secret"),
            &HashMap::new(),
        )
        .unwrap();
        let headers = default_headers(&config).unwrap();
        assert_eq!(headers.get(API_KEY_HEADER).unwrap(), "sk-tavor-secret");
        assert!(headers.get(API_KEY_HEADER).unwrap().is_sensitive());
        assert!(!format!("{:?}", headers).contains("sk-tavor-secret"));
    }

    #[test]
    fn test_malformed_body_is_service_error() {
        let err = decode::<QueuedCommand>(b"<html>", "command").unwrap_err();
        assert!(matches!(err, TavorError::Service(_)));
    }
}
