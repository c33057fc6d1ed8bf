//! Async client facade.

use crate::api::{self, paths};
use crate::config::{ClientConfig, ClientOptions};
use crate::litebox::{BoxHandle, StopOnDrop};
use crate::types::{BoxConfig, BoxInfo, ExposedPort};
use futures::FutureExt;
use reqwest::{RequestBuilder, Response};
use serde::de::DeserializeOwned;
use std::future::Future;
use std::panic::AssertUnwindSafe;
use std::sync::Arc;
use tavor_shared::errors::{TavorError, TavorResult};

/// Entry point of the SDK.
///
/// Cheap to clone; clones share one connection pool.
///
/// # Example
///
/// ```rust,no_run
/// use tavor::{BoxConfig, ClientOptions, CommandOptions, TavorClient};
///
/// # async fn example() -> tavor::TavorResult<()> {
/// let client = TavorClient::new(ClientOptions::new())?;
/// let output = client
///     .with_box(BoxConfig::new().cpu(2), |sandbox| async move {
///         sandbox.run("echo hello", CommandOptions::new()).await
///     })
///     .await?;
/// assert_eq!(output.stdout, "hello\n");
/// # Ok(())
/// # }
/// ```
#[derive(Clone)]
pub struct TavorClient {
    inner: ClientInner,
}

pub(crate) type ClientInner = Arc<ClientCore>;

pub(crate) struct ClientCore {
    config: ClientConfig,
    http: reqwest::Client,
}

impl TavorClient {
    /// Create a client from explicit options, falling back to the process
    /// environment for anything unset.
    pub fn new(options: ClientOptions) -> TavorResult<Self> {
        Self::with_config(ClientConfig::from_env(options)?)
    }

    /// Create a client from an already resolved configuration.
    pub fn with_config(config: ClientConfig) -> TavorResult<Self> {
        // No client-wide timeout: command streams may outlive it.
        let http = reqwest::Client::builder()
            .default_headers(api::default_headers(&config)?)
            .user_agent(api::USER_AGENT)
            .build()
            .map_err(|e| TavorError::Configuration(format!("failed to build HTTP client: {}", e)))?;

        tracing::debug!(base_url = %config.base_url, "Tavor client created");

        Ok(Self {
            inner: Arc::new(ClientCore { config, http }),
        })
    }

    pub fn config(&self) -> &ClientConfig {
        &self.inner.config
    }

    /// Create a box. Unset fields of `config` take the client's box defaults.
    ///
    /// The box is usually still booting when this returns; commands wait for
    /// it automatically.
    pub async fn create_box(&self, config: BoxConfig) -> TavorResult<BoxHandle> {
        let body = self.inner.config.box_defaults.apply(config);
        let created: api::CreatedBox = self
            .inner
            .json(self.inner.post(&paths::boxes()).json(&body), None, "create box")
            .await?;
        let status = created.initial_status();

        tracing::info!(box_id = %created.id, %status, "Box created");
        Ok(BoxHandle::new(Arc::clone(&self.inner), created.id, status))
    }

    /// Attach to an existing box.
    pub async fn get_box(&self, box_id: &str) -> TavorResult<BoxHandle> {
        let info = self.inner.fetch_box(box_id).await?;
        Ok(BoxHandle::attach(Arc::clone(&self.inner), info))
    }

    /// Every box visible to the API key.
    pub async fn list_boxes(&self) -> TavorResult<Vec<BoxInfo>> {
        let list: api::BoxList = self
            .inner
            .json(self.inner.get(&paths::boxes()), None, "box list")
            .await?;
        list.into_infos()
    }

    /// Run `f` against a fresh box and stop the box afterwards.
    ///
    /// The box is stopped whether `f` returns, fails or panics; a panic is
    /// resumed once the box is gone. If the returned future is dropped
    /// before completion, the stop is spawned on the current runtime.
    ///
    /// A stop failure is returned only when `f` itself succeeded.
    pub async fn with_box<F, Fut, T>(&self, config: BoxConfig, f: F) -> TavorResult<T>
    where
        F: FnOnce(BoxHandle) -> Fut,
        Fut: Future<Output = TavorResult<T>>,
    {
        let handle = self.create_box(config).await?;
        let mut guard = StopOnDrop::new(handle.clone());

        let outcome = AssertUnwindSafe(f(handle.clone())).catch_unwind().await;
        let stopped = handle.stop().await;
        guard.disarm();

        if let Err(e) = &stopped
            && !matches!(outcome, Ok(Ok(_)))
        {
            tracing::warn!(box_id = %handle.id(), error = %e, "Failed to stop box during cleanup");
        }

        match outcome {
            Ok(Ok(value)) => stopped.map(|_| value),
            Ok(Err(e)) => Err(e),
            Err(panic) => std::panic::resume_unwind(panic),
        }
    }
}

impl std::fmt::Debug for TavorClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TavorClient")
            .field("config", &self.inner.config)
            .finish()
    }
}

// ============================================================================
// RAW API CALLS
// ============================================================================

impl ClientCore {
    fn get(&self, path: &str) -> RequestBuilder {
        self.http.get(self.config.url(path))
    }

    fn post(&self, path: &str) -> RequestBuilder {
        self.http.post(self.config.url(path))
    }

    /// Send with the configured request timeout and map failures.
    async fn send(&self, request: RequestBuilder, box_id: Option<&str>) -> TavorResult<Response> {
        let response = request
            .timeout(self.config.timeout)
            .send()
            .await
            .map_err(api::transport_error)?;
        check_status(response, box_id).await
    }

    async fn json<T: DeserializeOwned>(
        &self,
        request: RequestBuilder,
        box_id: Option<&str>,
        what: &str,
    ) -> TavorResult<T> {
        let response = self.send(request, box_id).await?;
        let body = response.bytes().await.map_err(api::transport_error)?;
        api::decode(&body, what)
    }

    pub(crate) async fn fetch_box(&self, box_id: &str) -> TavorResult<BoxInfo> {
        tracing::trace!(box_id, "Fetching box");
        let envelope: api::DataEnvelope<api::BoxRecord> = self
            .json(self.get(&paths::single(box_id)), Some(box_id), "box")
            .await?;
        BoxInfo::try_from(envelope.data)
    }

    pub(crate) async fn delete_box(&self, box_id: &str) -> TavorResult<()> {
        let request = self.http.delete(self.config.url(&paths::single(box_id)));
        self.send(request, Some(box_id)).await?;
        Ok(())
    }

    pub(crate) async fn queue_command(&self, box_id: &str, command: &str) -> TavorResult<String> {
        let body = api::QueueCommandRequest {
            command,
            stream: false,
        };
        let queued: api::QueuedCommand = self
            .json(self.post(&paths::single(box_id)).json(&body), Some(box_id), "queued command")
            .await?;
        Ok(queued.id)
    }

    pub(crate) async fn fetch_command(
        &self,
        box_id: &str,
        command_id: &str,
    ) -> TavorResult<api::CommandRecord> {
        self.json(self.get(&paths::command(box_id, command_id)), None, "command")
            .await
    }

    /// Open a streaming command request.
    ///
    /// No request timeout is set; the caller bounds every read instead.
    pub(crate) async fn open_command_stream(&self, box_id: &str, command: &str) -> TavorResult<Response> {
        let body = api::QueueCommandRequest {
            command,
            stream: true,
        };
        let response = self
            .post(&paths::single(box_id))
            .header(reqwest::header::ACCEPT, tavor_shared::constants::api::EVENT_STREAM)
            .json(&body)
            .send()
            .await
            .map_err(api::transport_error)?;
        check_status(response, Some(box_id)).await
    }

    pub(crate) async fn pause(&self, box_id: &str) -> TavorResult<()> {
        self.send(self.post(&paths::pause(box_id)), Some(box_id)).await?;
        Ok(())
    }

    pub(crate) async fn resume(&self, box_id: &str) -> TavorResult<()> {
        self.send(self.post(&paths::resume(box_id)), Some(box_id)).await?;
        Ok(())
    }

    pub(crate) async fn expose_port(&self, box_id: &str, port: u16) -> TavorResult<ExposedPort> {
        let request = self
            .post(&paths::expose_port(box_id))
            .json(&api::ExposePortRequest { port });
        let envelope: api::DataEnvelope<api::ExposedPortRecord> =
            self.json(request, Some(box_id), "expose_port").await?;
        Ok(envelope.data.into())
    }
}

async fn check_status(response: Response, box_id: Option<&str>) -> TavorResult<Response> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }
    // The body only refines the message; an unreadable one still maps by status
    let body = response.text().await.unwrap_or_default();
    tracing::debug!(status = status.as_u16(), box_id, "Request rejected");
    Err(api::status_error(status, &body, box_id))
}
