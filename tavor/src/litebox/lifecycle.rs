//! Box lifecycle management
//!
//! Handles refresh, readiness, pause/resume, stop, and scoped cleanup.

use super::{BoxHandle, BoxState, BoxStatus};
use crate::types::BoxInfo;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;
use tavor_shared::constants::defaults;
use tavor_shared::errors::{TavorError, TavorResult};
use tokio::time::Instant;

pub(crate) const READY_TIMEOUT: Duration = Duration::from_secs(defaults::READY_TIMEOUT_SECS);
pub(crate) const READY_POLL_INTERVAL: Duration =
    Duration::from_secs(defaults::READY_POLL_INTERVAL_SECS);

/// Fail with `ClosedHandle` once the box has been stopped.
pub(crate) fn ensure_open(id: &str, closed: &AtomicBool) -> TavorResult<()> {
    if closed.load(Ordering::SeqCst) {
        return Err(TavorError::ClosedHandle(id.to_string()));
    }
    Ok(())
}

/// Whether a freshly observed box can take commands.
///
/// `Ok(false)` means keep waiting; a terminal status is a start failure.
pub(crate) fn readiness(info: &BoxInfo) -> TavorResult<bool> {
    match info.status {
        BoxStatus::Running => Ok(true),
        status if status.is_terminal() => Err(TavorError::BoxStart {
            status: status.to_string(),
            details: info.details.clone(),
        }),
        _ => Ok(false),
    }
}

pub(crate) fn not_ready_error(id: &str, limit: Duration) -> TavorError {
    TavorError::Timeout(format!(
        "box {} not ready after {}s",
        id,
        limit.as_secs_f64()
    ))
}

/// Public URL from cached state; before the first refresh there is no hostname.
pub(crate) fn public_url(id: &str, state: &BoxState, port: u16) -> TavorResult<String> {
    match state.info.as_ref() {
        Some(info) => info.public_url(port),
        None => Err(TavorError::Configuration(format!(
            "box {} has no hostname; ensure it is running and refreshed",
            id
        ))),
    }
}

pub(super) async fn refresh(handle: &BoxHandle) -> TavorResult<BoxInfo> {
    ensure_open(&handle.id, &handle.closed)?;
    let info = handle.client.fetch_box(&handle.id).await?;
    handle.state.lock().observe(info.clone())?;
    Ok(info)
}

pub(super) async fn wait_until_ready(
    handle: &BoxHandle,
    timeout: Option<Duration>,
    poll_interval: Duration,
) -> TavorResult<()> {
    let started = Instant::now();
    loop {
        let info = refresh(handle).await?;
        if readiness(&info)? {
            tracing::debug!(box_id = %handle.id, "Box is running");
            return Ok(());
        }

        if let Some(limit) = timeout
            && started.elapsed() >= limit
        {
            return Err(not_ready_error(&handle.id, limit));
        }

        tracing::trace!(box_id = %handle.id, status = %info.status, "Waiting for box");
        tokio::time::sleep(poll_interval).await;
    }
}

pub(super) async fn pause(handle: &BoxHandle) -> TavorResult<()> {
    ensure_open(&handle.id, &handle.closed)?;
    handle.client.pause(&handle.id).await?;
    refresh(handle).await.map(|_| ())
}

pub(super) async fn resume(handle: &BoxHandle) -> TavorResult<()> {
    ensure_open(&handle.id, &handle.closed)?;
    handle.client.resume(&handle.id).await?;
    refresh(handle).await.map(|_| ())
}

/// Stop the box once. The handle only closes after the service accepted
/// the request, so a failed stop can be retried.
pub(super) async fn stop(handle: &BoxHandle) -> TavorResult<()> {
    if handle.closed.load(Ordering::SeqCst) {
        return Ok(());
    }

    handle.client.delete_box(&handle.id).await?;
    handle.closed.store(true, Ordering::SeqCst);
    handle.state.lock().mark_stopped();

    tracing::info!(box_id = %handle.id, "Box stopped");
    Ok(())
}

/// Stops the box if a scoped future is dropped before its own cleanup ran.
pub(crate) struct StopOnDrop {
    handle: Option<BoxHandle>,
}

impl StopOnDrop {
    pub(crate) fn new(handle: BoxHandle) -> Self {
        Self {
            handle: Some(handle),
        }
    }

    pub(crate) fn disarm(&mut self) {
        self.handle = None;
    }
}

impl Drop for StopOnDrop {
    fn drop(&mut self) {
        let Some(handle) = self.handle.take() else {
            return;
        };
        if handle.is_closed() {
            return;
        }

        match tokio::runtime::Handle::try_current() {
            Ok(runtime) => {
                tracing::debug!(box_id = %handle.id, "Scoped box dropped, stopping in background");
                runtime.spawn(async move {
                    if let Err(e) = handle.stop().await {
                        tracing::warn!(box_id = %handle.id, error = %e, "Failed to stop dropped box");
                    }
                });
            }
            Err(_) => {
                tracing::warn!(
                    box_id = %handle.id,
                    "Scoped box dropped outside a runtime; it stays up until its timeout"
                );
            }
        }
    }
}
