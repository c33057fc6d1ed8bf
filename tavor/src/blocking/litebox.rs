use super::client::BlockingCore;
use crate::litebox::exec::{CommandOptions, command_timeout};
use crate::litebox::lifecycle::{self, READY_POLL_INTERVAL, READY_TIMEOUT};
use crate::litebox::{BoxState, BoxStatus};
use crate::protocol::{StreamSession, poll};
use crate::types::{BoxId, BoxInfo, CommandResult, ExposedPort};
use parking_lot::Mutex;
use std::io::Read;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::{Duration, Instant};
use tavor_shared::errors::{TavorError, TavorResult};

const READ_CHUNK: usize = 8 * 1024;

/// Blocking handle to a remote box.
///
/// Mirrors [`crate::BoxHandle`] operation for operation.
#[derive(Clone)]
pub struct BoxHandle {
    id: BoxId,
    client: Arc<BlockingCore>,
    state: Arc<Mutex<BoxState>>,
    closed: Arc<AtomicBool>,
}

impl BoxHandle {
    pub(crate) fn new(client: Arc<BlockingCore>, id: BoxId, status: BoxStatus) -> Self {
        Self {
            id,
            client,
            state: Arc::new(Mutex::new(BoxState::new(status))),
            closed: Arc::new(AtomicBool::new(false)),
        }
    }

    pub(crate) fn attach(client: Arc<BlockingCore>, info: BoxInfo) -> Self {
        Self {
            id: info.id.clone(),
            client,
            state: Arc::new(Mutex::new(BoxState::from_info(info))),
            closed: Arc::new(AtomicBool::new(false)),
        }
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn state(&self) -> BoxState {
        self.state.lock().clone()
    }

    pub fn info(&self) -> Option<BoxInfo> {
        self.state.lock().info.clone()
    }

    pub fn is_closed(&self) -> bool {
        self.closed.load(Ordering::SeqCst)
    }

    pub fn refresh(&self) -> TavorResult<BoxInfo> {
        lifecycle::ensure_open(&self.id, &self.closed)?;
        let info = self.client.fetch_box(&self.id)?;
        self.state.lock().observe(info.clone())?;
        Ok(info)
    }

    pub fn status(&self) -> TavorResult<BoxStatus> {
        Ok(self.refresh()?.status)
    }

    pub fn wait_until_ready(&self) -> TavorResult<()> {
        self.wait_until_ready_with(Some(READY_TIMEOUT), READY_POLL_INTERVAL)
    }

    pub fn wait_until_ready_with(
        &self,
        timeout: Option<Duration>,
        poll_interval: Duration,
    ) -> TavorResult<()> {
        let started = Instant::now();
        loop {
            let info = self.refresh()?;
            if lifecycle::readiness(&info)? {
                return Ok(());
            }

            if let Some(limit) = timeout
                && started.elapsed() >= limit
            {
                return Err(lifecycle::not_ready_error(&self.id, limit));
            }

            std::thread::sleep(poll_interval);
        }
    }

    pub fn run(&self, command: &str, options: CommandOptions) -> TavorResult<CommandResult> {
        lifecycle::ensure_open(&self.id, &self.closed)?;
        self.wait_until_ready()?;

        let plan = options.into_parts();
        match plan.sinks {
            Some((on_stdout, on_stderr)) => {
                let session = StreamSession::new(command, on_stdout, on_stderr);
                self.run_streaming(command, plan.timeout, session)
            }
            None => self.run_polling(command, plan.timeout, plan.poll_interval),
        }
    }

    fn run_polling(
        &self,
        command: &str,
        timeout: Option<Duration>,
        poll_interval: Duration,
    ) -> TavorResult<CommandResult> {
        let command_id = self.client.queue_command(&self.id, command)?;
        tracing::debug!(box_id = %self.id, %command_id, "Command queued");

        let started = Instant::now();
        loop {
            let record = self.client.fetch_command(&self.id, &command_id)?;
            if let Some(result) = poll::reconcile(record, command)? {
                return Ok(result);
            }

            if let Some(limit) = timeout
                && started.elapsed() >= limit
            {
                return Err(command_timeout(limit));
            }

            std::thread::sleep(poll_interval);
        }
    }

    fn run_streaming(
        &self,
        command: &str,
        timeout: Option<Duration>,
        mut session: StreamSession,
    ) -> TavorResult<CommandResult> {
        let started = Instant::now();
        // The request timeout fires as a transport error; report it as ours
        let expired = || timeout.filter(|limit| started.elapsed() >= *limit);

        let mut response = match self.client.open_command_stream(&self.id, command, timeout) {
            Ok(response) => response,
            Err(e @ TavorError::Transport(_)) => {
                return Err(expired().map(command_timeout).unwrap_or(e));
            }
            Err(e) => return Err(e),
        };

        let mut buf = vec![0u8; READ_CHUNK];
        loop {
            let n = match response.read(&mut buf) {
                Ok(n) => n,
                Err(e) if e.kind() == std::io::ErrorKind::Interrupted => continue,
                Err(e) => {
                    return Err(expired()
                        .map(command_timeout)
                        .unwrap_or_else(|| TavorError::Transport(e.to_string())));
                }
            };
            if n == 0 {
                return Ok(session.finish());
            }

            if let Some(result) = session.feed(&buf[..n])? {
                return Ok(result);
            }

            if let Some(limit) = expired() {
                tracing::debug!(box_id = %self.id, command_id = ?session.command_id(), "Command wait timed out");
                return Err(command_timeout(limit));
            }
        }
    }

    pub fn pause(&self) -> TavorResult<()> {
        lifecycle::ensure_open(&self.id, &self.closed)?;
        self.client.pause(&self.id)?;
        self.refresh().map(|_| ())
    }

    pub fn resume(&self) -> TavorResult<()> {
        lifecycle::ensure_open(&self.id, &self.closed)?;
        self.client.resume(&self.id)?;
        self.refresh().map(|_| ())
    }

    /// Stop the box. Calling it again is a no-op.
    pub fn stop(&self) -> TavorResult<()> {
        if self.closed.load(Ordering::SeqCst) {
            return Ok(());
        }

        self.client.delete_box(&self.id)?;
        self.closed.store(true, Ordering::SeqCst);
        self.state.lock().mark_stopped();

        tracing::info!(box_id = %self.id, "Box stopped");
        Ok(())
    }

    pub fn close(&self) -> TavorResult<()> {
        self.stop()
    }

    pub fn public_url(&self, port: u16) -> TavorResult<String> {
        lifecycle::ensure_open(&self.id, &self.closed)?;
        lifecycle::public_url(&self.id, &self.state.lock(), port)
    }

    pub fn expose_port(&self, target_port: u16) -> TavorResult<ExposedPort> {
        lifecycle::ensure_open(&self.id, &self.closed)?;
        self.client.expose_port(&self.id, target_port)
    }
}

impl std::fmt::Debug for BoxHandle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("blocking::BoxHandle")
            .field("id", &self.id)
            .field("status", &self.state.lock().status)
            .field("closed", &self.is_closed())
            .finish()
    }
}
