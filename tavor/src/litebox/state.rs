//! Box lifecycle status and state machine.
//!
//! The service owns the real state; the client only observes it by polling.
//! Every observation is checked against the transition table so an
//! impossible report (e.g. `stopped` → `running`) surfaces as an error
//! instead of being mistaken for progress.

use crate::types::BoxInfo;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tavor_shared::errors::{TavorError, TavorResult};

/// Lifecycle status of a box.
///
/// State machine:
/// ```text
/// creating → queued → provisioning → booting → running ⇄ paused
///      \________\___________\____________\________\________\→ stopped | failed | finished | error
/// ```
/// Boot phases only move forward but may be skipped between two polls.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BoxStatus {
    /// Accepted by the API, not yet scheduled.
    Creating,
    Queued,
    Provisioning,
    Booting,

    /// Box is up and accepting commands.
    Running,

    /// Suspended by an explicit pause; resumes back to Running.
    Paused,

    Stopped,
    Failed,
    Finished,
    Error,
}

impl BoxStatus {
    pub fn is_running(&self) -> bool {
        matches!(self, BoxStatus::Running)
    }

    pub fn is_paused(&self) -> bool {
        matches!(self, BoxStatus::Paused)
    }

    /// Check if the box can never run again.
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            BoxStatus::Stopped | BoxStatus::Failed | BoxStatus::Finished | BoxStatus::Error
        )
    }

    /// Position in the boot sequence, `None` outside of it.
    fn boot_rank(&self) -> Option<u8> {
        match self {
            BoxStatus::Creating => Some(0),
            BoxStatus::Queued => Some(1),
            BoxStatus::Provisioning => Some(2),
            BoxStatus::Booting => Some(3),
            BoxStatus::Running => Some(4),
            _ => None,
        }
    }

    /// Check if transition to target state is valid.
    pub fn can_transition_to(&self, target: BoxStatus) -> bool {
        use BoxStatus::*;

        if *self == target {
            return true;
        }
        if self.is_terminal() {
            return false;
        }
        if target.is_terminal() {
            return true;
        }

        match (self, target) {
            (Running, Paused) | (Paused, Running) => true,
            (from, to) => match (from.boot_rank(), to.boot_rank()) {
                // Running has the highest rank, so it never moves back into boot
                (Some(a), Some(b)) => b > a,
                _ => false,
            },
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            BoxStatus::Creating => "creating",
            BoxStatus::Queued => "queued",
            BoxStatus::Provisioning => "provisioning",
            BoxStatus::Booting => "booting",
            BoxStatus::Running => "running",
            BoxStatus::Paused => "paused",
            BoxStatus::Stopped => "stopped",
            BoxStatus::Failed => "failed",
            BoxStatus::Finished => "finished",
            BoxStatus::Error => "error",
        }
    }
}

impl std::str::FromStr for BoxStatus {
    type Err = TavorError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "creating" => Ok(BoxStatus::Creating),
            "queued" => Ok(BoxStatus::Queued),
            "provisioning" => Ok(BoxStatus::Provisioning),
            "booting" => Ok(BoxStatus::Booting),
            "running" => Ok(BoxStatus::Running),
            "paused" => Ok(BoxStatus::Paused),
            "stopped" => Ok(BoxStatus::Stopped),
            "failed" => Ok(BoxStatus::Failed),
            "finished" => Ok(BoxStatus::Finished),
            "error" => Ok(BoxStatus::Error),
            other => Err(TavorError::UnexpectedStatus {
                kind: "box",
                value: other.to_string(),
            }),
        }
    }
}

impl std::fmt::Display for BoxStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Client-side view of a box, replaced wholesale on every refresh.
#[derive(Debug, Clone)]
pub struct BoxState {
    /// Last status reported by the service.
    pub status: BoxStatus,
    /// Full record from the last refresh, `None` until the first one.
    pub info: Option<BoxInfo>,
    /// When the last observation was applied (UTC).
    pub last_updated: DateTime<Utc>,
}

impl BoxState {
    /// State for a handle whose first status came from the create response.
    pub fn new(status: BoxStatus) -> Self {
        Self {
            status,
            info: None,
            last_updated: Utc::now(),
        }
    }

    /// State for a handle attached to an already existing box.
    pub fn from_info(info: BoxInfo) -> Self {
        Self {
            status: info.status,
            info: Some(info),
            last_updated: Utc::now(),
        }
    }

    /// Record a successful stop request without another round trip.
    pub fn mark_stopped(&mut self) {
        if self.status.can_transition_to(BoxStatus::Stopped) {
            self.status = BoxStatus::Stopped;
            if let Some(info) = self.info.as_mut() {
                info.status = BoxStatus::Stopped;
            }
            self.last_updated = Utc::now();
        }
    }

    /// Apply a freshly fetched record.
    ///
    /// Returns error if the reported transition is not valid; the state is
    /// left unchanged in that case.
    pub fn observe(&mut self, info: BoxInfo) -> TavorResult<()> {
        if !self.status.can_transition_to(info.status) {
            return Err(TavorError::InvalidTransition {
                from: self.status.to_string(),
                to: info.status.to_string(),
            });
        }

        if self.status != info.status {
            tracing::debug!(
                box_id = %info.id,
                from = %self.status,
                to = %info.status,
                "Box status changed"
            );
        }

        self.status = info.status;
        self.info = Some(info);
        self.last_updated = Utc::now();
        Ok(())
    }

    pub fn hostname(&self) -> Option<&str> {
        self.info.as_ref().and_then(|info| info.hostname.as_deref())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    const ALL: [BoxStatus; 10] = [
        BoxStatus::Creating,
        BoxStatus::Queued,
        BoxStatus::Provisioning,
        BoxStatus::Booting,
        BoxStatus::Running,
        BoxStatus::Paused,
        BoxStatus::Stopped,
        BoxStatus::Failed,
        BoxStatus::Finished,
        BoxStatus::Error,
    ];

    fn info(status: BoxStatus) -> BoxInfo {
        BoxInfo {
            id: "box-1".into(),
            status,
            timeout: None,
            created_at: None,
            details: None,
            hostname: None,
            metadata: HashMap::new(),
        }
    }

    #[test]
    fn test_status_is_terminal() {
        assert!(!BoxStatus::Creating.is_terminal());
        assert!(!BoxStatus::Running.is_terminal());
        assert!(!BoxStatus::Paused.is_terminal());
        assert!(BoxStatus::Stopped.is_terminal());
        assert!(BoxStatus::Failed.is_terminal());
        assert!(BoxStatus::Finished.is_terminal());
        assert!(BoxStatus::Error.is_terminal());
    }

    #[test]
    fn test_boot_sequence_moves_forward() {
        assert!(BoxStatus::Creating.can_transition_to(BoxStatus::Queued));
        assert!(BoxStatus::Queued.can_transition_to(BoxStatus::Provisioning));
        assert!(BoxStatus::Provisioning.can_transition_to(BoxStatus::Booting));
        assert!(BoxStatus::Booting.can_transition_to(BoxStatus::Running));

        // Skipped phases between two polls
        assert!(BoxStatus::Queued.can_transition_to(BoxStatus::Running));
        assert!(BoxStatus::Creating.can_transition_to(BoxStatus::Booting));

        // Never backwards
        assert!(!BoxStatus::Booting.can_transition_to(BoxStatus::Queued));
        assert!(!BoxStatus::Running.can_transition_to(BoxStatus::Booting));
        assert!(!BoxStatus::Running.can_transition_to(BoxStatus::Creating));
    }

    #[test]
    fn test_pause_only_from_running() {
        assert!(BoxStatus::Running.can_transition_to(BoxStatus::Paused));
        assert!(BoxStatus::Paused.can_transition_to(BoxStatus::Running));

        assert!(!BoxStatus::Booting.can_transition_to(BoxStatus::Paused));
        assert!(!BoxStatus::Queued.can_transition_to(BoxStatus::Paused));
        assert!(!BoxStatus::Paused.can_transition_to(BoxStatus::Booting));
    }

    #[test]
    fn test_terminal_states_are_sinks() {
        for from in ALL.iter().filter(|s| s.is_terminal()) {
            for to in ALL {
                assert_eq!(
                    from.can_transition_to(to),
                    *from == to,
                    "{} -> {}",
                    from,
                    to
                );
            }
        }
    }

    #[test]
    fn test_everything_live_can_terminate() {
        for from in ALL.iter().filter(|s| !s.is_terminal()) {
            for to in ALL.iter().filter(|s| s.is_terminal()) {
                assert!(from.can_transition_to(*to), "{} -> {}", from, to);
            }
        }
    }

    #[test]
    fn test_status_round_trips_through_str() {
        for status in ALL {
            assert_eq!(status.as_str().parse::<BoxStatus>().unwrap(), status);
        }
    }

    #[test]
    fn test_unknown_status_rejected() {
        let err = "rebooting".parse::<BoxStatus>().unwrap_err();
        assert!(matches!(
            err,
            TavorError::UnexpectedStatus { kind: "box", ref value } if value == "rebooting"
        ));
    }

    #[test]
    fn test_observe_updates_state() {
        let mut state = BoxState::new(BoxStatus::Creating);
        assert!(state.info.is_none());

        state.observe(info(BoxStatus::Queued)).unwrap();
        assert_eq!(state.status, BoxStatus::Queued);

        let mut running = info(BoxStatus::Running);
        running.hostname = Some("abc.example".into());
        state.observe(running).unwrap();
        assert_eq!(state.status, BoxStatus::Running);
        assert_eq!(state.hostname(), Some("abc.example"));
    }

    #[test]
    fn test_mark_stopped_keeps_other_terminal_status() {
        let mut state = BoxState::from_info(info(BoxStatus::Running));
        state.mark_stopped();
        assert_eq!(state.status, BoxStatus::Stopped);
        assert_eq!(state.info.as_ref().unwrap().status, BoxStatus::Stopped);

        let mut state = BoxState::new(BoxStatus::Failed);
        state.mark_stopped();
        assert_eq!(state.status, BoxStatus::Failed);
    }

    #[test]
    fn test_observe_rejects_invalid_transition() {
        let mut state = BoxState::new(BoxStatus::Stopped);

        let err = state.observe(info(BoxStatus::Running)).unwrap_err();
        assert!(matches!(err, TavorError::InvalidTransition { .. }));
        assert_eq!(err.to_string(), "invalid box transition from stopped to running");

        // Unchanged
        assert_eq!(state.status, BoxStatus::Stopped);
        assert!(state.info.is_none());
    }
}
