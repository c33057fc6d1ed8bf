use super::litebox::BoxHandle;
use crate::api::{self, paths};
use crate::config::{ClientConfig, ClientOptions};
use crate::types::{BoxConfig, BoxInfo, ExposedPort};
use reqwest::blocking::{RequestBuilder, Response};
use serde::de::DeserializeOwned;
use std::panic::AssertUnwindSafe;
use std::sync::Arc;
use std::time::Duration;
use tavor_shared::errors::{TavorError, TavorResult};

/// Blocking entry point of the SDK.
#[derive(Clone)]
pub struct TavorClient {
    inner: Arc<BlockingCore>,
}

pub(crate) struct BlockingCore {
    config: ClientConfig,
    http: reqwest::blocking::Client,
}

impl TavorClient {
    pub fn new(options: ClientOptions) -> TavorResult<Self> {
        Self::with_config(ClientConfig::from_env(options)?)
    }

    pub fn with_config(config: ClientConfig) -> TavorResult<Self> {
        // The blocking builder defaults to a 30s total timeout; requests set their own.
        let http = reqwest::blocking::Client::builder()
            .default_headers(api::default_headers(&config)?)
            .user_agent(api::USER_AGENT)
            .timeout(None::<Duration>)
            .build()
            .map_err(|e| TavorError::Configuration(format!("failed to build HTTP client: {}", e)))?;

        Ok(Self {
            inner: Arc::new(BlockingCore { config, http }),
        })
    }

    pub fn config(&self) -> &ClientConfig {
        &self.inner.config
    }

    pub fn create_box(&self, config: BoxConfig) -> TavorResult<BoxHandle> {
        let body = self.inner.config.box_defaults.apply(config);
        let created: api::CreatedBox =
            self.inner
                .json(self.inner.post(&paths::boxes()).json(&body), None, "create box")?;
        let status = created.initial_status();

        tracing::info!(box_id = %created.id, %status, "Box created");
        Ok(BoxHandle::new(Arc::clone(&self.inner), created.id, status))
    }

    pub fn get_box(&self, box_id: &str) -> TavorResult<BoxHandle> {
        let info = self.inner.fetch_box(box_id)?;
        Ok(BoxHandle::attach(Arc::clone(&self.inner), info))
    }

    pub fn list_boxes(&self) -> TavorResult<Vec<BoxInfo>> {
        let list: api::BoxList = self
            .inner
            .json(self.inner.get(&paths::boxes()), None, "box list")?;
        list.into_infos()
    }

    /// Run `f` against a fresh box and stop the box afterwards, including
    /// when `f` fails or panics.
    pub fn with_box<F, T>(&self, config: BoxConfig, f: F) -> TavorResult<T>
    where
        F: FnOnce(BoxHandle) -> TavorResult<T>,
    {
        let handle = self.create_box(config)?;

        let outcome = std::panic::catch_unwind(AssertUnwindSafe(|| f(handle.clone())));
        let stopped = handle.stop();

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
        f.debug_struct("blocking::TavorClient")
            .field("config", &self.inner.config)
            .finish()
    }
}

impl BlockingCore {
    fn get(&self, path: &str) -> RequestBuilder {
        self.http.get(self.config.url(path))
    }

    fn post(&self, path: &str) -> RequestBuilder {
        self.http.post(self.config.url(path))
    }

    fn send(&self, request: RequestBuilder, box_id: Option<&str>) -> TavorResult<Response> {
        let response = request
            .timeout(self.config.timeout)
            .send()
            .map_err(api::transport_error)?;
        check_status(response, box_id)
    }

    fn json<T: DeserializeOwned>(
        &self,
        request: RequestBuilder,
        box_id: Option<&str>,
        what: &str,
    ) -> TavorResult<T> {
        let body = self
            .send(request, box_id)?
            .bytes()
            .map_err(api::transport_error)?;
        api::decode(&body, what)
    }

    pub(crate) fn fetch_box(&self, box_id: &str) -> TavorResult<BoxInfo> {
        let envelope: api::DataEnvelope<api::BoxRecord> =
            self.json(self.get(&paths::single(box_id)), Some(box_id), "box")?;
        BoxInfo::try_from(envelope.data)
    }

    pub(crate) fn delete_box(&self, box_id: &str) -> TavorResult<()> {
        let request = self.http.delete(self.config.url(&paths::single(box_id)));
        self.send(request, Some(box_id)).map(|_| ())
    }

    pub(crate) fn queue_command(&self, box_id: &str, command: &str) -> TavorResult<String> {
        let body = api::QueueCommandRequest {
            command,
            stream: false,
        };
        let queued: api::QueuedCommand = self.json(
            self.post(&paths::single(box_id)).json(&body),
            Some(box_id),
            "queued command",
        )?;
        Ok(queued.id)
    }

    pub(crate) fn fetch_command(
        &self,
        box_id: &str,
        command_id: &str,
    ) -> TavorResult<api::CommandRecord> {
        self.json(self.get(&paths::command(box_id, command_id)), None, "command")
    }

    /// Open a streaming command request.
    ///
    /// `timeout` bounds the whole exchange, body included; `None` never
    /// times out.
    pub(crate) fn open_command_stream(
        &self,
        box_id: &str,
        command: &str,
        timeout: Option<Duration>,
    ) -> TavorResult<Response> {
        let body = api::QueueCommandRequest {
            command,
            stream: true,
        };
        let mut request = self
            .post(&paths::single(box_id))
            .header(reqwest::header::ACCEPT, tavor_shared::constants::api::EVENT_STREAM)
            .json(&body);
        if let Some(limit) = timeout {
            request = request.timeout(limit);
        }
        let response = request.send().map_err(api::transport_error)?;
        check_status(response, Some(box_id))
    }

    pub(crate) fn pause(&self, box_id: &str) -> TavorResult<()> {
        self.send(self.post(&paths::pause(box_id)), Some(box_id)).map(|_| ())
    }

    pub(crate) fn resume(&self, box_id: &str) -> TavorResult<()> {
        self.send(self.post(&paths::resume(box_id)), Some(box_id)).map(|_| ())
    }

    pub(crate) fn expose_port(&self, box_id: &str, port: u16) -> TavorResult<ExposedPort> {
        let request = self
            .post(&paths::expose_port(box_id))
            .json(&api::ExposePortRequest { port });
        let envelope: api::DataEnvelope<api::ExposedPortRecord> =
            self.json(request, Some(box_id), "expose_port")?;
        Ok(envelope.data.into())
    }
}

fn check_status(response: Response, box_id: Option<&str>) -> TavorResult<Response> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }
    let body = response.text().unwrap_or_default();
    tracing::debug!(status = status.as_u16(), box_id, "Request rejected");
    Err(api::status_error(status, &body, box_id))
}
