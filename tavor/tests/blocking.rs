//! Integration tests for the blocking client.
//!
//! Blocking clients are built, used and dropped on `spawn_blocking` threads;
//! the mock server lives on the multi-threaded test runtime.

#![cfg(feature = "blocking")]

use serde_json::json;
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tavor::blocking::TavorClient as BlockingClient;
use tavor::{BoxConfig, BoxStatus, CommandOptions, CommandStatus, ExitCodeSource, TavorError};
use tavor_test_utils::{MockTavor, blocking, box_path, sse_frame};
use wiremock::ResponseTemplate;

#[tokio::test(flavor = "multi_thread")]
async fn blocking_lifecycle() {
    let mock = MockTavor::start().await;
    mock.mock_create("box-1", None).await;
    mock.mock_box_statuses("box-1", &["queued", "provisioning", "booting", "running"])
        .await;
    mock.mock_delete("box-1").await;
    let config = mock.config();

    let sandbox = blocking(move || {
        let client = BlockingClient::with_config(config).unwrap();
        let sandbox = client.create_box(BoxConfig::new()).unwrap();
        sandbox
            .wait_until_ready_with(Some(Duration::from_secs(5)), Duration::from_millis(10))
            .unwrap();
        assert_eq!(sandbox.state().status, BoxStatus::Running);

        sandbox.stop().unwrap();
        sandbox.stop().unwrap();
        sandbox
    })
    .await;

    assert!(sandbox.is_closed());
    assert_eq!(mock.requests("GET", &box_path("box-1")).await, 4);
    assert_eq!(mock.requests("DELETE", &box_path("box-1")).await, 1);

    let err = blocking(move || sandbox.refresh().unwrap_err()).await;
    assert!(matches!(err, TavorError::ClosedHandle(_)));
}

#[tokio::test(flavor = "multi_thread")]
async fn blocking_polling_run() {
    let mock = MockTavor::start().await;
    mock.mock_create("box-1", Some("running")).await;
    mock.mock_box_statuses("box-1", &["running"]).await;
    mock.mock_queue("box-1", "cmd-1").await;
    mock.mock_command_records(
        "box-1",
        "cmd-1",
        vec![
            json!({"id": "cmd-1", "status": "running"}),
            json!({"id": "cmd-1", "status": "done", "stdout": "hello\n"}),
        ],
    )
    .await;
    let config = mock.config();

    let result = blocking(move || {
        let client = BlockingClient::with_config(config).unwrap();
        let sandbox = client.create_box(BoxConfig::new()).unwrap();
        sandbox
            .run(
                "echo hello",
                CommandOptions::new().poll_interval(Duration::from_millis(10)),
            )
            .unwrap()
    })
    .await;

    assert_eq!(result.stdout, "hello\n");
    assert_eq!(result.exit_code, 0);
    assert_eq!(result.exit_code_source, ExitCodeSource::Inferred);
}

#[tokio::test(flavor = "multi_thread")]
async fn blocking_streaming_run() {
    let mock = MockTavor::start().await;
    mock.mock_create("box-1", Some("running")).await;
    mock.mock_box_statuses("box-1", &["running"]).await;
    let body = sse_frame("start", json!({"id": "cmd-s"}))
        + &sse_frame("output", json!({"stdout": "ab"}))
        + &sse_frame("output", json!({"stdout": "c\n"}))
        + &sse_frame("status", json!({"status": "done", "exit_code": 0}))
        + &sse_frame("end", json!({"status": "done"}));
    mock.mock_stream("box-1", body).await;
    let config = mock.config();

    let (tx, rx) = std::sync::mpsc::channel::<String>();
    let result = blocking(move || {
        let client = BlockingClient::with_config(config).unwrap();
        let sandbox = client.create_box(BoxConfig::new()).unwrap();
        sandbox
            .run("printf abc", CommandOptions::new().on_stdout(tx))
            .unwrap()
    })
    .await;

    assert_eq!(rx.iter().collect::<Vec<_>>(), vec!["abc"]);
    assert_eq!(result.id, "cmd-s");
    assert_eq!(result.status, CommandStatus::Done);
    assert_eq!(result.exit_code_source, ExitCodeSource::Reported);
}

#[tokio::test(flavor = "multi_thread")]
async fn blocking_streaming_local_timeout() {
    let mock = MockTavor::start().await;
    mock.mock_create("box-1", Some("running")).await;
    mock.mock_box_statuses("box-1", &["running"]).await;
    mock.mock_stream_response(
        "box-1",
        ResponseTemplate::new(200)
            .set_body_raw(sse_frame("end", json!({})), "text/event-stream")
            .set_delay(Duration::from_secs(5)),
    )
    .await;
    let config = mock.config();

    let lines = Arc::new(Mutex::new(Vec::<String>::new()));
    let sink_lines = Arc::clone(&lines);
    let err = blocking(move || {
        let client = BlockingClient::with_config(config).unwrap();
        let sandbox = client.create_box(BoxConfig::new()).unwrap();
        sandbox
            .run(
                "sleep 5",
                CommandOptions::new()
                    .timeout(Duration::from_millis(200))
                    .on_stdout(move |line: &str| sink_lines.lock().unwrap().push(line.to_string())),
            )
            .unwrap_err()
    })
    .await;

    assert!(matches!(err, TavorError::CommandTimeout(_)));
    assert!(lines.lock().unwrap().is_empty());
}

#[tokio::test(flavor = "multi_thread")]
async fn blocking_with_box_cleans_up() {
    let mock = MockTavor::start().await;
    mock.mock_create("box-1", None).await;
    mock.mock_delete("box-1").await;
    let config = mock.config();

    let err = blocking(move || {
        let client = BlockingClient::with_config(config).unwrap();
        client
            .with_box(BoxConfig::new(), |_sandbox| {
                Err::<(), _>(TavorError::Command("user failure".into()))
            })
            .unwrap_err()
    })
    .await;
    assert!(matches!(err, TavorError::Command(_)));
    assert_eq!(mock.requests("DELETE", &box_path("box-1")).await, 1);

    let config = mock.config();
    let joined = tokio::task::spawn_blocking(move || {
        let client = BlockingClient::with_config(config).unwrap();
        client.with_box(BoxConfig::new(), |_sandbox| -> tavor::TavorResult<()> {
            panic!("user code panicked")
        })
    })
    .await;
    assert!(joined.unwrap_err().is_panic());
    assert_eq!(mock.requests("DELETE", &box_path("box-1")).await, 2);
}

#[tokio::test(flavor = "multi_thread")]
async fn blocking_public_url_and_errors() {
    let mock = MockTavor::start().await;
    mock.mock_create("box-1", None).await;
    mock.mock_running_box("box-1", "abc.example").await;
    mock.mock_error("GET", &box_path("ghost"), 404, json!({})).await;
    let config = mock.config();

    let (url, missing) = blocking(move || {
        let client = BlockingClient::with_config(config).unwrap();
        let sandbox = client.create_box(BoxConfig::new()).unwrap();
        sandbox.refresh().unwrap();
        (sandbox.public_url(8080).unwrap(), client.get_box("ghost").unwrap_err())
    })
    .await;

    assert_eq!(url, "https://8080-abc.example");
    assert!(matches!(missing, TavorError::BoxNotFound(ref id) if id == "ghost"));
}

#[tokio::test(flavor = "multi_thread")]
async fn blocking_with_box_stops_box_with_unknown_initial_status() {
    let mock = MockTavor::start().await;
    mock.mock_create("box-1", Some("pending")).await;
    mock.mock_delete("box-1").await;
    let config = mock.config();

    let status = blocking(move || {
        let client = BlockingClient::with_config(config).unwrap();
        client
            .with_box(BoxConfig::new(), |sandbox| Ok(sandbox.state().status))
            .unwrap()
    })
    .await;

    assert_eq!(status, BoxStatus::Creating);
    assert_eq!(mock.requests("DELETE", &box_path("box-1")).await, 1);
}
