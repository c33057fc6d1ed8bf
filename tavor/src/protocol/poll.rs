//! Polling-mode reconciliation.

use crate::api::CommandRecord;
use crate::types::{CommandResult, CommandStatus, ExitCodeSource};
use tavor_shared::errors::TavorResult;

/// Result for a fetched command record, `None` while it is still in flight.
///
/// Polling never sees an authoritative exit code, so it is always inferred
/// from the status.
pub(crate) fn reconcile(record: CommandRecord, command: &str) -> TavorResult<Option<CommandResult>> {
    let status: CommandStatus = record.status.parse()?;
    if !status.is_terminal() {
        return Ok(None);
    }

    Ok(Some(CommandResult {
        id: record.id,
        command: record.command.unwrap_or_else(|| command.to_string()),
        status,
        stdout: record.stdout.unwrap_or_default(),
        stderr: record.stderr.unwrap_or_default(),
        exit_code: status.inferred_exit_code(),
        exit_code_source: ExitCodeSource::Inferred,
        created_at: record.created_at,
    }))
}
