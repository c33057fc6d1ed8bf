//! Streaming-mode reconciliation of SSE events into a command result.
//!
//! [`StreamSession`] does no I/O. The async and blocking drivers push raw
//! body fragments into it and stop as soon as it yields a result or error.

use super::output::{OutputSink, OutputStream};
use crate::types::{CommandResult, CommandStatus, ExitCodeSource};
use serde_json::Value;
use tavor_shared::constants::events;
use tavor_shared::errors::{TavorError, TavorResult};
use tavor_shared::sse::{SseEvent, SseParser};

pub(crate) struct StreamSession {
    parser: SseParser,
    state: StreamState,
}

struct StreamState {
    command: String,
    command_id: Option<String>,
    status: CommandStatus,
    /// Authoritative exit code from a `status` event.
    exit_code: Option<i32>,
    stdout: OutputStream,
    stderr: OutputStream,
}

impl StreamSession {
    pub(crate) fn new(
        command: &str,
        on_stdout: Option<Box<dyn OutputSink>>,
        on_stderr: Option<Box<dyn OutputSink>>,
    ) -> Self {
        Self {
            parser: SseParser::new(),
            state: StreamState {
                command: command.to_string(),
                command_id: None,
                status: CommandStatus::Queued,
                exit_code: None,
                stdout: OutputStream::new(on_stdout),
                stderr: OutputStream::new(on_stderr),
            },
        }
    }

    /// Process one body fragment.
    ///
    /// Returns `Ok(Some(result))` once an `end` event finalizes the command;
    /// events after it in the same fragment are not processed.
    pub(crate) fn feed(&mut self, chunk: &[u8]) -> TavorResult<Option<CommandResult>> {
        for event in self.parser.feed_bytes(chunk) {
            if let Some(result) = self.state.apply(event)? {
                return Ok(Some(result));
            }
        }
        Ok(None)
    }

    /// Best-effort result for a stream that closed without an `end` event.
    pub(crate) fn finish(mut self) -> CommandResult {
        tracing::debug!(
            command_id = ?self.state.command_id,
            status = %self.state.status,
            pending = self.parser.has_pending(),
            stdout_lines = self.state.stdout.lines_delivered(),
            stderr_lines = self.state.stderr.lines_delivered(),
            "Command stream closed without end event"
        );
        self.state.result()
    }

    pub(crate) fn command_id(&self) -> Option<&str> {
        self.state.command_id.as_deref()
    }
}

impl StreamState {
    fn apply(&mut self, event: SseEvent) -> TavorResult<Option<CommandResult>> {
        let Some(payload) = decode_payload(&event) else {
            return Ok(None);
        };

        match event.event.as_str() {
            events::START => {
                self.command_id = str_field(&payload, "command_id")
                    .or_else(|| str_field(&payload, "id"))
                    .map(String::from);
                tracing::debug!(command_id = ?self.command_id, "Command stream started");
            }
            events::OUTPUT => {
                if let Some(text) = str_field(&payload, "stdout") {
                    self.stdout.push(text);
                }
                if let Some(text) = str_field(&payload, "stderr") {
                    self.stderr.push(text);
                }
            }
            events::STATUS => {
                if let Some(status) = str_field(&payload, "status") {
                    self.status = status.parse()?;
                }
                if let Some(code) = payload.get("exit_code").and_then(Value::as_i64) {
                    self.exit_code = i32::try_from(code).ok();
                }
            }
            events::END => {
                match str_field(&payload, "status") {
                    Some("error") => self.status = CommandStatus::Error,
                    Some("timeout") => {
                        return Err(TavorError::CommandTimeout(
                            "command timed out on the service".into(),
                        ));
                    }
                    _ => {}
                }
                return Ok(Some(self.result()));
            }
            events::ERROR => {
                let message = str_field(&payload, "error").unwrap_or("Unknown error");
                return Err(TavorError::Command(message.to_string()));
            }
            events::TIMEOUT => {
                return Err(TavorError::CommandTimeout(
                    "command timed out on the service".into(),
                ));
            }
            other => {
                tracing::trace!(event = other, "Ignoring unknown stream event");
            }
        }

        Ok(None)
    }

    fn result(&mut self) -> CommandResult {
        self.stdout.flush();
        self.stderr.flush();

        let (exit_code, exit_code_source) = match self.exit_code {
            Some(code) => (code, ExitCodeSource::Reported),
            None => (self.status.inferred_exit_code(), ExitCodeSource::Inferred),
        };

        CommandResult {
            id: self.command_id.clone().unwrap_or_default(),
            command: self.command.clone(),
            status: self.status,
            stdout: self.stdout.take(),
            stderr: self.stderr.take(),
            exit_code,
            exit_code_source,
            created_at: None,
        }
    }
}

/// JSON payload of an event; `None` (logged) when it does not decode.
fn decode_payload(event: &SseEvent) -> Option<Value> {
    if event.data.trim().is_empty() {
        return Some(Value::Object(Default::default()));
    }
    match serde_json::from_str(&event.data) {
        Ok(value) => Some(value),
        Err(e) => {
            tracing::warn!(
                event = %event.event,
                error = %e,
                "Skipping stream event with malformed JSON payload"
            );
            None
        }
    }
}

fn str_field<'a>(payload: &'a Value, key: &str) -> Option<&'a str> {
    payload.get(key).and_then(Value::as_str)
}
