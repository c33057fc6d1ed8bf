//! Shared constants for the Tavor REST API.
//!
//! These must match what the service expects on the wire.

/// HTTP API constants
pub mod api {
    /// Default service endpoint
    pub const DEFAULT_BASE_URL: &str = "https://api.tavor.dev";

    /// Header carrying the API key on every request
    pub const API_KEY_HEADER: &str = "X-API-Key";

    /// Prefix of every versioned route
    pub const BOXES_PATH: &str = "/api/v2/boxes";

    /// Content type of streaming command responses
    pub const EVENT_STREAM: &str = "text/event-stream";
}

/// Environment variable names read during configuration resolution.
pub mod envs {
    pub const API_KEY: &str = "TAVOR_API_KEY";
    pub const BASE_URL: &str = "TAVOR_BASE_URL";
    pub const BOX_CPU: &str = "TAVOR_BOX_CPU";
    pub const BOX_MIB_RAM: &str = "TAVOR_BOX_MIB_RAM";
    pub const BOX_TIMEOUT: &str = "TAVOR_BOX_TIMEOUT";
}

/// Timing defaults, in seconds.
pub mod defaults {
    /// Per-request timeout for non-streaming calls
    pub const REQUEST_TIMEOUT_SECS: u64 = 30;

    /// Lifetime requested for a new box when none is configured
    pub const BOX_TIMEOUT_SECS: u64 = 600;

    /// How long `wait_until_ready` waits before giving up
    pub const READY_TIMEOUT_SECS: u64 = 300;

    /// Interval between box status polls
    pub const READY_POLL_INTERVAL_SECS: u64 = 1;

    /// Interval between command status polls
    pub const COMMAND_POLL_INTERVAL_SECS: u64 = 1;
}

/// SSE event names emitted by the command stream.
pub mod events {
    pub const START: &str = "start";
    pub const OUTPUT: &str = "output";
    pub const STATUS: &str = "status";
    pub const END: &str = "end";
    pub const ERROR: &str = "error";
    pub const TIMEOUT: &str = "timeout";

    /// Name used when a record carries no `event:` field
    pub const DEFAULT: &str = "message";
}
