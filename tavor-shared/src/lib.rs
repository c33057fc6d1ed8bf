//! Tavor Shared - wire protocol for the Tavor SDK
//!
//! This crate contains the pieces every front end needs to speak the
//! Tavor REST API: the error taxonomy, API constants and the incremental
//! SSE frame parser used by streaming command execution.

pub mod constants;
pub mod errors;
pub mod sse;

pub use errors::{TavorError, TavorResult};
pub use sse::{SseEvent, SseEvents, SseParser};
