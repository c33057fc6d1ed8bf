//! Box handles - lifecycle and command execution for one remote box
//!
//! ## Architecture
//!
//! - `state`: Status enum and the transition table observations are checked against
//! - `lifecycle`: Refresh, readiness wait, pause/resume, stop and scoped cleanup
//! - `exec`: Command execution in polling or streaming mode

pub(crate) mod exec;
pub(crate) mod lifecycle;
mod state;

pub use exec::CommandOptions;
pub use state::{BoxState, BoxStatus};

pub(crate) use lifecycle::StopOnDrop;

use crate::client::ClientInner;
use crate::types::{BoxId, BoxInfo, CommandResult, ExposedPort};
use parking_lot::Mutex;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;
use tavor_shared::errors::TavorResult;

/// Handle to a remote box.
///
/// Clones share the cached state and the closed flag, so stopping any clone
/// closes all of them. A handle runs one command at a time; concurrent use of
/// clones needs external coordination.
#[derive(Clone)]
pub struct BoxHandle {
    id: BoxId,
    client: ClientInner,
    state: Arc<Mutex<BoxState>>,
    closed: Arc<AtomicBool>,
}

impl BoxHandle {
    /// Handle for a box that was just created.
    pub(crate) fn new(client: ClientInner, id: BoxId, status: BoxStatus) -> Self {
        Self::from_state(client, id, BoxState::new(status))
    }

    /// Handle for an existing box fetched by id.
    pub(crate) fn attach(client: ClientInner, info: BoxInfo) -> Self {
        Self::from_state(client, info.id.clone(), BoxState::from_info(info))
    }

    fn from_state(client: ClientInner, id: BoxId, state: BoxState) -> Self {
        Self {
            id,
            client,
            state: Arc::new(Mutex::new(state)),
            closed: Arc::new(AtomicBool::new(false)),
        }
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    /// Snapshot of the cached state. Never touches the network.
    pub fn state(&self) -> BoxState {
        self.state.lock().clone()
    }

    /// Cached record from the last refresh.
    pub fn info(&self) -> Option<BoxInfo> {
        self.state.lock().info.clone()
    }

    pub fn is_closed(&self) -> bool {
        self.closed.load(Ordering::SeqCst)
    }

    /// Re-fetch the box and return the new record.
    pub async fn refresh(&self) -> TavorResult<BoxInfo> {
        lifecycle::refresh(self).await
    }

    /// Refresh, then return the current status.
    pub async fn status(&self) -> TavorResult<BoxStatus> {
        Ok(self.refresh().await?.status)
    }

    /// Wait up to 300 seconds for the box to reach `running`, polling every
    /// second.
    pub async fn wait_until_ready(&self) -> TavorResult<()> {
        lifecycle::wait_until_ready(self, Some(lifecycle::READY_TIMEOUT), lifecycle::READY_POLL_INTERVAL)
            .await
    }

    /// [`wait_until_ready`](Self::wait_until_ready) with explicit timing.
    /// `None` waits without limit.
    pub async fn wait_until_ready_with(
        &self,
        timeout: Option<Duration>,
        poll_interval: Duration,
    ) -> TavorResult<()> {
        lifecycle::wait_until_ready(self, timeout, poll_interval).await
    }

    /// Run a shell command and wait for its final result.
    ///
    /// Waits for the box to be ready first. Output is streamed line by line
    /// when `options` carries a sink, otherwise the command is polled and
    /// its output arrives in the result only.
    ///
    /// A local timeout leaves the remote command running.
    ///
    /// # Examples
    ///
    /// ```rust,no_run
    /// # async fn example(sandbox: &tavor::BoxHandle) -> tavor::TavorResult<()> {
    /// use tavor::CommandOptions;
    /// use std::time::Duration;
    ///
    /// let result = sandbox
    ///     .run(
    ///         "cargo test",
    ///         CommandOptions::new()
    ///             .timeout(Duration::from_secs(600))
    ///             .on_stdout(|line: &str| println!("{}", line)),
    ///     )
    ///     .await?;
    /// println!("exit code {} ({:?})", result.exit_code, result.exit_code_source);
    /// # Ok(())
    /// # }
    /// ```
    pub async fn run(&self, command: &str, options: CommandOptions) -> TavorResult<CommandResult> {
        exec::run(self, command, options).await
    }

    /// Suspend the box, then refresh.
    pub async fn pause(&self) -> TavorResult<()> {
        lifecycle::pause(self).await
    }

    /// Resume a paused box, then refresh.
    pub async fn resume(&self) -> TavorResult<()> {
        lifecycle::resume(self).await
    }

    /// Stop the box. Calling it again is a no-op.
    pub async fn stop(&self) -> TavorResult<()> {
        lifecycle::stop(self).await
    }

    /// Alias for [`stop`](Self::stop).
    pub async fn close(&self) -> TavorResult<()> {
        self.stop().await
    }

    /// Public URL for `port` inside the box, from the cached hostname.
    ///
    /// Refresh first if the box only just became ready.
    pub fn public_url(&self, port: u16) -> TavorResult<String> {
        lifecycle::ensure_open(&self.id, &self.closed)?;
        lifecycle::public_url(&self.id, &self.state.lock(), port)
    }

    /// Expose `target_port` on a random external port.
    pub async fn expose_port(&self, target_port: u16) -> TavorResult<ExposedPort> {
        lifecycle::ensure_open(&self.id, &self.closed)?;
        self.client.expose_port(&self.id, target_port).await
    }
}

impl std::fmt::Debug for BoxHandle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BoxHandle")
            .field("id", &self.id)
            .field("status", &self.state.lock().status)
            .field("closed", &self.is_closed())
            .finish()
    }
}

// ============================================================================
// THREAD SAFETY ASSERTIONS
// ============================================================================

// Handles move into spawned tasks (scoped cleanup, user code)
const _: () = {
    const fn assert_send_sync<T: Send + Sync>() {}
    let _ = assert_send_sync::<BoxHandle>;
};
