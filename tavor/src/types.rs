//! Core data types for boxes and commands.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;
use tavor_shared::errors::TavorError;

// Re-export status types from litebox module
pub use crate::litebox::{BoxState, BoxStatus};

/// Box identifier assigned by the service.
pub type BoxId = String;

/// Command identifier assigned by the service.
pub type CommandId = String;

// ============================================================================
// BOX
// ============================================================================

/// Public metadata about a box, as last reported by the service.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BoxInfo {
    pub id: BoxId,

    /// Current lifecycle status.
    pub status: BoxStatus,

    /// Seconds until the service terminates the box.
    pub timeout: Option<u64>,

    pub created_at: Option<DateTime<Utc>>,

    /// Diagnostic text, usually set when the box failed.
    pub details: Option<String>,

    /// Assigned once the box is running; used to derive public URLs.
    pub hostname: Option<String>,

    /// User-defined key/value pairs supplied at creation.
    pub metadata: HashMap<String, serde_json::Value>,
}

impl BoxInfo {
    /// Public URL routing to `port` inside the box.
    ///
    /// # Example
    ///
    /// ```
    /// # use tavor::{BoxInfo, BoxStatus};
    /// # let info = BoxInfo {
    /// #     id: "box-1".into(), status: BoxStatus::Running, timeout: None,
    /// #     created_at: None, details: None, hostname: Some("abc.example".into()),
    /// #     metadata: Default::default(),
    /// # };
    /// assert_eq!(info.public_url(8080).unwrap(), "https://8080-abc.example");
    /// ```
    pub fn public_url(&self, port: u16) -> Result<String, TavorError> {
        match self.hostname.as_deref() {
            Some(hostname) if !hostname.is_empty() => Ok(format!("https://{}-{}", port, hostname)),
            _ => Err(TavorError::Configuration(format!(
                "box {} has no hostname; ensure it is running and refreshed",
                self.id
            ))),
        }
    }
}

/// Resources requested for a new box.
///
/// Unset fields fall back to the client's box defaults (see
/// [`BoxDefaults`](crate::config::BoxDefaults)), then to the service's own.
///
/// # Examples
///
/// ```
/// use tavor::BoxConfig;
///
/// let config = BoxConfig::new()
///     .cpu(2)
///     .mib_ram(2048)
///     .timeout(3600)
///     .metadata("example", "sync");
/// ```
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct BoxConfig {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub cpu: Option<u32>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub mib_ram: Option<u64>,

    /// Lifetime in seconds.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub timeout: Option<u64>,

    #[serde(default, skip_serializing_if = "HashMap::is_empty")]
    pub metadata: HashMap<String, serde_json::Value>,
}

impl BoxConfig {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cpu(mut self, cpu: u32) -> Self {
        self.cpu = Some(cpu);
        self
    }

    pub fn mib_ram(mut self, mib_ram: u64) -> Self {
        self.mib_ram = Some(mib_ram);
        self
    }

    /// Set the box lifetime in seconds.
    pub fn timeout(mut self, secs: u64) -> Self {
        self.timeout = Some(secs);
        self
    }

    pub fn metadata(mut self, key: impl Into<String>, value: impl Into<serde_json::Value>) -> Self {
        self.metadata.insert(key.into(), value.into());
        self
    }
}

/// External mapping to a port inside a box.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExposedPort {
    /// Port reachable from outside.
    pub proxy_port: u16,
    /// Port inside the box.
    pub target_port: u16,
    pub expires_at: DateTime<Utc>,
}

// ============================================================================
// COMMAND
// ============================================================================

/// Status of a command inside a box.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CommandStatus {
    Queued,
    Running,
    Done,
    Failed,
    Error,
}

impl CommandStatus {
    /// Polling and streaming stop at the first terminal status.
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            CommandStatus::Done | CommandStatus::Failed | CommandStatus::Error
        )
    }

    /// Exit code when the service did not report one: 0 iff `done`.
    pub fn inferred_exit_code(&self) -> i32 {
        match self {
            CommandStatus::Done => 0,
            _ => 1,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            CommandStatus::Queued => "queued",
            CommandStatus::Running => "running",
            CommandStatus::Done => "done",
            CommandStatus::Failed => "failed",
            CommandStatus::Error => "error",
        }
    }
}

impl std::str::FromStr for CommandStatus {
    type Err = TavorError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "queued" => Ok(CommandStatus::Queued),
            "running" => Ok(CommandStatus::Running),
            "done" => Ok(CommandStatus::Done),
            "failed" => Ok(CommandStatus::Failed),
            "error" => Ok(CommandStatus::Error),
            other => Err(TavorError::UnexpectedStatus {
                kind: "command",
                value: other.to_string(),
            }),
        }
    }
}

impl fmt::Display for CommandStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Where a result's exit code came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ExitCodeSource {
    /// The service sent the exit code in a `status` stream event.
    Reported,
    /// Derived from `status`; always the case in polling mode.
    Inferred,
}

/// Final outcome of a command.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CommandResult {
    /// Empty when a stream closed before its `start` event.
    pub id: CommandId,
    pub command: String,
    /// Raw status as last reported; read alongside `exit_code_source`.
    pub status: CommandStatus,
    pub stdout: String,
    pub stderr: String,
    pub exit_code: i32,
    pub exit_code_source: ExitCodeSource,
    pub created_at: Option<DateTime<Utc>>,
}

impl CommandResult {
    /// Returns true if the exit code was 0.
    pub fn success(&self) -> bool {
        self.exit_code == 0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn info_with_hostname(hostname: Option<&str>) -> BoxInfo {
        BoxInfo {
            id: "box-1".into(),
            status: BoxStatus::Running,
            timeout: Some(600),
            created_at: None,
            details: None,
            hostname: hostname.map(String::from),
            metadata: HashMap::new(),
        }
    }

    #[test]
    fn test_public_url() {
        let info = info_with_hostname(Some("abc.example"));
        assert_eq!(info.public_url(8080).unwrap(), "https://8080-abc.example");
    }

    #[test]
    fn test_public_url_without_hostname() {
        let err = info_with_hostname(None).public_url(8080).unwrap_err();
        assert!(matches!(err, TavorError::Configuration(_)));

        let err = info_with_hostname(Some("")).public_url(80).unwrap_err();
        assert!(matches!(err, TavorError::Configuration(_)));
    }

    #[test]
    fn test_box_config_body_omits_unset_fields() {
        let body = serde_json::to_value(BoxConfig::new().cpu(2)).unwrap();
        assert_eq!(body, serde_json::json!({ "cpu": 2 }));

        let body = serde_json::to_value(
            BoxConfig::new()
                .mib_ram(2048)
                .timeout(3600)
                .metadata("language", "rust"),
        )
        .unwrap();
        assert_eq!(
            body,
            serde_json::json!({
                "mib_ram": 2048,
                "timeout": 3600,
                "metadata": { "language": "rust" }
            })
        );
    }

    #[test]
    fn test_command_status_terminal() {
        assert!(!CommandStatus::Queued.is_terminal());
        assert!(!CommandStatus::Running.is_terminal());
        assert!(CommandStatus::Done.is_terminal());
        assert!(CommandStatus::Failed.is_terminal());
        assert!(CommandStatus::Error.is_terminal());
    }

    #[test]
    fn test_inferred_exit_code() {
        assert_eq!(CommandStatus::Done.inferred_exit_code(), 0);
        assert_eq!(CommandStatus::Failed.inferred_exit_code(), 1);
        assert_eq!(CommandStatus::Error.inferred_exit_code(), 1);
        assert_eq!(CommandStatus::Running.inferred_exit_code(), 1);
    }

    #[test]
    fn test_command_status_from_str() {
        assert_eq!("done".parse::<CommandStatus>().unwrap(), CommandStatus::Done);
        assert!(matches!(
            "cancelled".parse::<CommandStatus>(),
            Err(TavorError::UnexpectedStatus { kind: "command", .. })
        ));
    }
}
