//! Command execution: options and async drivers.

use super::{BoxHandle, lifecycle};
use crate::api;
use crate::protocol::{OutputSink, StreamSession, poll};
use crate::types::CommandResult;
use futures::StreamExt;
use std::fmt;
use std::future::Future;
use std::time::Duration;
use tavor_shared::constants::defaults;
use tavor_shared::errors::{TavorError, TavorResult};
use tokio::time::Instant;

/// Options for one command run.
///
/// Registering either output sink switches the run to streaming mode.
///
/// # Examples
///
/// ```
/// use std::time::Duration;
/// use tavor::CommandOptions;
///
/// let polled = CommandOptions::new().timeout(Duration::from_secs(30));
/// assert!(!polled.is_streaming());
///
/// let streamed = CommandOptions::new().on_stdout(|line: &str| println!("{}", line));
/// assert!(streamed.is_streaming());
/// ```
pub struct CommandOptions {
    /// Local wait limit. `None` waits until the command finishes.
    pub timeout: Option<Duration>,

    /// Delay between status polls in polling mode.
    ///
    /// Default: 1 second
    pub poll_interval: Duration,

    on_stdout: Option<Box<dyn OutputSink>>,
    on_stderr: Option<Box<dyn OutputSink>>,
}

impl Default for CommandOptions {
    fn default() -> Self {
        Self {
            timeout: None,
            poll_interval: Duration::from_secs(defaults::COMMAND_POLL_INTERVAL_SECS),
            on_stdout: None,
            on_stderr: None,
        }
    }
}

impl CommandOptions {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }

    pub fn poll_interval(mut self, interval: Duration) -> Self {
        self.poll_interval = interval;
        self
    }

    /// Receive stdout line by line as it is produced.
    pub fn on_stdout(mut self, sink: impl OutputSink + 'static) -> Self {
        self.on_stdout = Some(Box::new(sink));
        self
    }

    /// Receive stderr line by line as it is produced.
    pub fn on_stderr(mut self, sink: impl OutputSink + 'static) -> Self {
        self.on_stderr = Some(Box::new(sink));
        self
    }

    pub fn is_streaming(&self) -> bool {
        self.on_stdout.is_some() || self.on_stderr.is_some()
    }

    pub(crate) fn into_parts(self) -> RunPlan {
        let streaming = self.is_streaming();
        RunPlan {
            timeout: self.timeout,
            poll_interval: self.poll_interval,
            sinks: streaming.then_some((self.on_stdout, self.on_stderr)),
        }
    }
}

impl fmt::Debug for CommandOptions {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CommandOptions")
            .field("timeout", &self.timeout)
            .field("poll_interval", &self.poll_interval)
            .field("on_stdout", &self.on_stdout.is_some())
            .field("on_stderr", &self.on_stderr.is_some())
            .finish()
    }
}

type Sinks = (Option<Box<dyn OutputSink>>, Option<Box<dyn OutputSink>>);

/// [`CommandOptions`] split for the drivers. `sinks` is set iff streaming.
pub(crate) struct RunPlan {
    pub timeout: Option<Duration>,
    pub poll_interval: Duration,
    pub sinks: Option<Sinks>,
}

pub(crate) fn command_timeout(limit: Duration) -> TavorError {
    TavorError::CommandTimeout(format!(
        "command did not finish within {}s",
        limit.as_secs_f64()
    ))
}

pub(super) async fn run(
    handle: &BoxHandle,
    command: &str,
    options: CommandOptions,
) -> TavorResult<CommandResult> {
    lifecycle::ensure_open(&handle.id, &handle.closed)?;
    handle.wait_until_ready().await?;

    let plan = options.into_parts();
    match plan.sinks {
        Some((on_stdout, on_stderr)) => {
            let session = StreamSession::new(command, on_stdout, on_stderr);
            run_streaming(handle, command, plan.timeout, session).await
        }
        None => run_polling(handle, command, plan.timeout, plan.poll_interval).await,
    }
}

async fn run_polling(
    handle: &BoxHandle,
    command: &str,
    timeout: Option<Duration>,
    poll_interval: Duration,
) -> TavorResult<CommandResult> {
    let command_id = handle.client.queue_command(&handle.id, command).await?;
    tracing::debug!(box_id = %handle.id, %command_id, "Command queued");

    let started = Instant::now();
    loop {
        let record = handle.client.fetch_command(&handle.id, &command_id).await?;
        if let Some(result) = poll::reconcile(record, command)? {
            tracing::debug!(
                box_id = %handle.id,
                %command_id,
                status = %result.status,
                "Command finished"
            );
            return Ok(result);
        }

        if let Some(limit) = timeout
            && started.elapsed() >= limit
        {
            return Err(command_timeout(limit));
        }

        tokio::time::sleep(poll_interval).await;
    }
}

async fn run_streaming(
    handle: &BoxHandle,
    command: &str,
    timeout: Option<Duration>,
    mut session: StreamSession,
) -> TavorResult<CommandResult> {
    let deadline = timeout.map(|limit| (Instant::now() + limit, limit));

    let response = within(deadline, handle.client.open_command_stream(&handle.id, command)).await??;
    let mut body = response.bytes_stream();

    loop {
        match within(deadline, body.next()).await? {
            Some(Ok(chunk)) => {
                if let Some(result) = session.feed(&chunk)? {
                    tracing::debug!(
                        box_id = %handle.id,
                        command_id = %result.id,
                        status = %result.status,
                        "Command finished"
                    );
                    return Ok(result);
                }
            }
            Some(Err(e)) => return Err(api::transport_error(e)),
            None => return Ok(session.finish()),
        }

        if let Some((at, limit)) = deadline
            && Instant::now() >= at
        {
            tracing::debug!(box_id = %handle.id, command_id = ?session.command_id(), "Command wait timed out");
            return Err(command_timeout(limit));
        }
    }
}

/// Await `fut` unless the deadline passes first.
async fn within<F: Future>(deadline: Option<(Instant, Duration)>, fut: F) -> TavorResult<F::Output> {
    match deadline {
        Some((at, limit)) => tokio::time::timeout_at(at, fut)
            .await
            .map_err(|_| command_timeout(limit)),
        None => Ok(fut.await),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let options = CommandOptions::default();
        assert_eq!(options.timeout, None);
        assert_eq!(options.poll_interval, Duration::from_secs(1));
        assert!(!options.is_streaming());
    }

    #[test]
    fn test_either_sink_selects_streaming() {
        let (tx, _rx) = std::sync::mpsc::channel::<String>();
        assert!(CommandOptions::new().on_stderr(tx).is_streaming());

        let plan = CommandOptions::new()
            .on_stdout(|_: &str| {})
            .poll_interval(Duration::from_millis(10))
            .into_parts();
        let (stdout, stderr) = plan.sinks.unwrap();
        assert!(stdout.is_some());
        assert!(stderr.is_none());
    }

    #[test]
    fn test_polling_plan_has_no_sinks() {
        let plan = CommandOptions::new()
            .timeout(Duration::from_secs(5))
            .into_parts();
        assert!(plan.sinks.is_none());
        assert_eq!(plan.timeout, Some(Duration::from_secs(5)));
    }

    #[test]
    fn test_debug_hides_sinks() {
        let rendered = format!("{:?}", CommandOptions::new().on_stdout(|_: &str| {}));
        assert!(rendered.contains("on_stdout: true"));
        assert!(rendered.contains("on_stderr: false"));
    }

    #[test]
    fn test_command_timeout_message() {
        let err = command_timeout(Duration::from_millis(1500));
        assert!(err.is_timeout());
        assert_eq!(err.to_string(), "command timed out: command did not finish within 1.5s");
    }
}
