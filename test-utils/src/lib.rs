//! Scripted mock of the Tavor REST API for integration tests.
//!
//! ```ignore
//! let mock = MockTavor::start().await;
//! mock.mock_create("box-1", None).await;
//! mock.mock_box_statuses("box-1", &["queued", "running"]).await;
//! let client = mock.client();
//! ```

use serde_json::{Value, json};
use std::collections::HashMap;
use std::net::SocketAddr;
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;
use tavor::{ClientConfig, ClientOptions, TavorClient};
use tokio::io::{AsyncBufReadExt, AsyncReadExt, AsyncWriteExt, BufReader};
use tokio::net::{TcpListener, TcpStream};
use tokio::task::JoinHandle;
use wiremock::matchers::{body_partial_json, header, method, path};
use wiremock::{Mock, MockServer, Request, Respond, ResponseTemplate};

pub const API_KEY: &str = "sk-tavor-test";
pub const BOXES: &str = "/api/v2/boxes";

/// Serves a fixed sequence of responses, repeating the last one forever.
pub struct Scripted {
    responses: Vec<ResponseTemplate>,
    served: AtomicUsize,
}

impl Scripted {
    pub fn new(responses: Vec<ResponseTemplate>) -> Self {
        assert!(!responses.is_empty(), "script needs at least one response");
        Self {
            responses,
            served: AtomicUsize::new(0),
        }
    }
}

impl Respond for Scripted {
    fn respond(&self, _: &Request) -> ResponseTemplate {
        let index = self.served.fetch_add(1, Ordering::SeqCst);
        self.responses[index.min(self.responses.len() - 1)].clone()
    }
}

pub fn json_response(status: u16, body: Value) -> ResponseTemplate {
    ResponseTemplate::new(status).set_body_raw(body.to_string(), "application/json")
}

/// Box record as returned under `data`.
pub fn box_record(id: &str, status: &str) -> Value {
    json!({
        "id": id,
        "status": status,
        "timeout": 600,
        "created_at": "2024-01-01T00:00:00Z",
        "details": null,
        "hostname": null,
        "metadata": {}
    })
}

/// One SSE record.
pub fn sse_frame(event: &str, data: Value) -> String {
    format!("event: {}\ndata: {}\n\n", event, data)
}

pub fn box_path(id: &str) -> String {
    format!("{}/{}", BOXES, id)
}

/// A running [`MockServer`] with helpers for every Tavor route.
pub struct MockTavor {
    pub server: MockServer,
}

impl MockTavor {
    pub async fn start() -> Self {
        Self {
            server: MockServer::start().await,
        }
    }

    pub fn uri(&self) -> String {
        self.server.uri()
    }

    pub fn options(&self) -> ClientOptions {
        ClientOptions::new()
            .api_key(API_KEY)
            .base_url(self.uri())
            .timeout(Duration::from_secs(5))
    }

    /// Configuration resolved against an empty environment, so the host's
    /// `TAVOR_*` variables never leak into a test.
    pub fn config(&self) -> ClientConfig {
        ClientConfig::resolve(self.options(), &HashMap::new()).expect("valid mock config")
    }

    pub fn client(&self) -> TavorClient {
        TavorClient::with_config(self.config()).expect("client builds")
    }

    /// `POST /api/v2/boxes` answering with `id` (and `status` when given).
    pub async fn mock_create(&self, id: &str, status: Option<&str>) {
        let mut body = json!({ "id": id });
        if let Some(status) = status {
            body["status"] = json!(status);
        }
        Mock::given(method("POST"))
            .and(path(BOXES))
            .and(header("X-API-Key", API_KEY))
            .respond_with(json_response(200, body))
            .mount(&self.server)
            .await;
    }

    /// `GET /api/v2/boxes` listing `records`.
    pub async fn mock_list(&self, records: Vec<Value>) {
        Mock::given(method("GET"))
            .and(path(BOXES))
            .respond_with(json_response(200, json!({ "data": records })))
            .mount(&self.server)
            .await;
    }

    /// `GET /api/v2/boxes/{id}` walking through `statuses`.
    pub async fn mock_box_statuses(&self, id: &str, statuses: &[&str]) {
        let responses = statuses
            .iter()
            .map(|status| json_response(200, json!({ "data": box_record(id, status) })))
            .collect();
        self.mock_box_records(id, responses).await;
    }

    /// `GET /api/v2/boxes/{id}` serving full responses in order.
    pub async fn mock_box_records(&self, id: &str, responses: Vec<ResponseTemplate>) {
        Mock::given(method("GET"))
            .and(path(box_path(id)))
            .respond_with(Scripted::new(responses))
            .mount(&self.server)
            .await;
    }

    /// Running box with a hostname.
    pub async fn mock_running_box(&self, id: &str, hostname: &str) {
        let mut record = box_record(id, "running");
        record["hostname"] = json!(hostname);
        self.mock_box_records(id, vec![json_response(200, json!({ "data": record }))])
            .await;
    }

    pub async fn mock_delete(&self, id: &str) {
        Mock::given(method("DELETE"))
            .and(path(box_path(id)))
            .respond_with(ResponseTemplate::new(204))
            .mount(&self.server)
            .await;
    }

    /// `POST /api/v2/boxes/{id}/{action}` (pause, resume) answering 200.
    pub async fn mock_action(&self, id: &str, action: &str) {
        Mock::given(method("POST"))
            .and(path(format!("{}/{}", box_path(id), action)))
            .respond_with(ResponseTemplate::new(200))
            .mount(&self.server)
            .await;
    }

    /// Non-streaming `POST /api/v2/boxes/{id}` returning `command_id`.
    pub async fn mock_queue(&self, box_id: &str, command_id: &str) {
        Mock::given(method("POST"))
            .and(path(box_path(box_id)))
            .and(body_partial_json(json!({ "stream": false })))
            .respond_with(json_response(200, json!({ "id": command_id })))
            .mount(&self.server)
            .await;
    }

    /// `GET .../commands/{command_id}` serving `records` in order.
    pub async fn mock_command_records(&self, box_id: &str, command_id: &str, records: Vec<Value>) {
        let responses = records
            .into_iter()
            .map(|record| json_response(200, record))
            .collect();
        Mock::given(method("GET"))
            .and(path(format!("{}/commands/{}", box_path(box_id), command_id)))
            .respond_with(Scripted::new(responses))
            .mount(&self.server)
            .await;
    }

    /// Streaming `POST /api/v2/boxes/{id}` answering with a raw SSE body.
    pub async fn mock_stream(&self, box_id: &str, body: String) {
        self.mock_stream_response(
            box_id,
            ResponseTemplate::new(200).set_body_raw(body, "text/event-stream"),
        )
        .await;
    }

    pub async fn mock_stream_response(&self, box_id: &str, response: ResponseTemplate) {
        Mock::given(method("POST"))
            .and(path(box_path(box_id)))
            .and(body_partial_json(json!({ "stream": true })))
            .respond_with(response)
            .mount(&self.server)
            .await;
    }

    /// Any route answering `status` with a JSON error body.
    pub async fn mock_error(&self, http_method: &str, route: &str, status: u16, body: Value) {
        Mock::given(method(http_method))
            .and(path(route))
            .respond_with(json_response(status, body))
            .mount(&self.server)
            .await;
    }

    /// Number of received requests matching method and path.
    pub async fn requests(&self, http_method: &str, route: &str) -> usize {
        self.server
            .received_requests()
            .await
            .unwrap_or_default()
            .iter()
            .filter(|r| r.method.as_str() == http_method && r.url.path() == route)
            .count()
    }

    /// JSON bodies of received requests matching method and path.
    pub async fn request_bodies(&self, http_method: &str, route: &str) -> Vec<Value> {
        self.server
            .received_requests()
            .await
            .unwrap_or_default()
            .iter()
            .filter(|r| r.method.as_str() == http_method && r.url.path() == route)
            .filter_map(|r| serde_json::from_slice(&r.body).ok())
            .collect()
    }
}

/// Bare HTTP server for one running box whose command stream sends `head`,
/// stalls, and only then sends `tail`.
///
/// wiremock answers with whole bodies, so output that arrives before a
/// local timeout needs a server that can stop mid-body.
pub struct StalledStream {
    addr: SocketAddr,
    task: JoinHandle<()>,
}

struct StallScript {
    box_id: String,
    head: Vec<String>,
    tail: String,
    stall: Duration,
}

impl StalledStream {
    pub async fn start(box_id: &str, head: Vec<String>, tail: String, stall: Duration) -> Self {
        let listener = TcpListener::bind("127.0.0.1:0").await.expect("bind");
        let addr = listener.local_addr().expect("local addr");
        let script = Arc::new(StallScript {
            box_id: box_id.to_string(),
            head,
            tail,
            stall,
        });
        let task = tokio::spawn(async move {
            while let Ok((stream, _)) = listener.accept().await {
                tokio::spawn(serve_stalled(stream, Arc::clone(&script)));
            }
        });
        Self { addr, task }
    }

    pub fn uri(&self) -> String {
        format!("http://{}", self.addr)
    }

    pub fn client(&self) -> TavorClient {
        let options = ClientOptions::new()
            .api_key(API_KEY)
            .base_url(self.uri())
            .timeout(Duration::from_secs(5));
        let config = ClientConfig::resolve(options, &HashMap::new()).expect("valid config");
        TavorClient::with_config(config).expect("client builds")
    }
}

impl Drop for StalledStream {
    fn drop(&mut self) {
        self.task.abort();
    }
}

async fn serve_stalled(stream: TcpStream, script: Arc<StallScript>) {
    let mut reader = BufReader::new(stream);
    loop {
        let mut request_line = String::new();
        if reader.read_line(&mut request_line).await.unwrap_or(0) == 0 {
            return;
        }

        let mut content_length = 0;
        loop {
            let mut line = String::new();
            if reader.read_line(&mut line).await.unwrap_or(0) == 0 {
                return;
            }
            let line = line.trim_end();
            if line.is_empty() {
                break;
            }
            if let Some((name, value)) = line.split_once(':')
                && name.eq_ignore_ascii_case("content-length")
            {
                content_length = value.trim().parse().unwrap_or(0);
            }
        }
        let mut body = vec![0u8; content_length];
        if reader.read_exact(&mut body).await.is_err() {
            return;
        }

        let mut parts = request_line.split_whitespace();
        let method = parts.next().unwrap_or_default();
        let route = parts.next().unwrap_or_default();
        let out = reader.get_mut();

        let written = if route != box_path(&script.box_id) {
            write_json(out, 404, &json!({ "error": "Not found" })).await
        } else if method == "GET" {
            let record = box_record(&script.box_id, "running");
            write_json(out, 200, &json!({ "data": record })).await
        } else {
            write_stalled(out, &script).await
        };
        if written.is_err() {
            return;
        }
    }
}

async fn write_json(out: &mut TcpStream, status: u16, body: &Value) -> std::io::Result<()> {
    let body = body.to_string();
    let head = format!(
        "HTTP/1.1 {} X\r\ncontent-type: application/json\r\ncontent-length: {}\r\n\r\n",
        status,
        body.len()
    );
    out.write_all(head.as_bytes()).await?;
    out.write_all(body.as_bytes()).await?;
    out.flush().await
}

async fn write_stalled(out: &mut TcpStream, script: &StallScript) -> std::io::Result<()> {
    out.write_all(
        b"HTTP/1.1 200 OK\r\ncontent-type: text/event-stream\r\ntransfer-encoding: chunked\r\n\r\n",
    )
    .await?;
    for frame in &script.head {
        write_chunk(out, frame).await?;
    }
    tokio::time::sleep(script.stall).await;
    write_chunk(out, &script.tail).await?;
    out.write_all(b"0\r\n\r\n").await?;
    out.flush().await
}

async fn write_chunk(out: &mut TcpStream, data: &str) -> std::io::Result<()> {
    out.write_all(format!("{:x}\r\n{}\r\n", data.len(), data).as_bytes())
        .await?;
    out.flush().await
}

/// Run blocking client code off the async test runtime.
pub async fn blocking<F, T>(f: F) -> T
where
    F: FnOnce() -> T + Send + 'static,
    T: Send + 'static,
{
    tokio::task::spawn_blocking(f)
        .await
        .expect("blocking task panicked")
}
