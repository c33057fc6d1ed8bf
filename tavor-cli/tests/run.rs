use predicates::prelude::*;
use serde_json::json;
use tavor_test_utils::{MockTavor, blocking, box_path, sse_frame};

mod common;

#[tokio::test(flavor = "multi_thread")]
async fn test_run_streams_and_stops() {
    let mock = MockTavor::start().await;
    mock.mock_create("box-1", Some("running")).await;
    mock.mock_box_statuses("box-1", &["running"]).await;
    mock.mock_delete("box-1").await;
    let body = sse_frame("start", json!({"command_id": "cmd-1"}))
        + &sse_frame("output", json!({"stdout": "hel"}))
        + &sse_frame("output", json!({"stdout": "lo\n", "stderr": "warn\n"}))
        + &sse_frame("status", json!({"status": "done", "exit_code": 0}))
        + &sse_frame("end", json!({"status": "done"}));
    mock.mock_stream("box-1", body).await;
    let mut cmd = common::tavor(&mock);

    blocking(move || {
        cmd.args(["run", "--cpu", "2", "--", "echo", "hello"])
            .assert()
            .success()
            .stdout("hello\n")
            .stderr(predicate::str::contains("warn"));
    })
    .await;

    let created = mock.request_bodies("POST", "/api/v2/boxes").await;
    assert_eq!(created[0]["cpu"], 2);
    let queued = mock.request_bodies("POST", &box_path("box-1")).await;
    assert_eq!(queued, vec![json!({"command": "echo hello", "stream": true})]);
    assert_eq!(mock.requests("DELETE", &box_path("box-1")).await, 1);
}

#[tokio::test(flavor = "multi_thread")]
async fn test_run_propagates_exit_code() {
    let mock = MockTavor::start().await;
    mock.mock_create("box-1", Some("running")).await;
    mock.mock_box_statuses("box-1", &["running"]).await;
    mock.mock_delete("box-1").await;
    let body = sse_frame("status", json!({"status": "failed", "exit_code": 3}))
        + &sse_frame("end", json!({"status": "failed"}));
    mock.mock_stream("box-1", body).await;
    let mut cmd = common::tavor(&mock);

    blocking(move || {
        cmd.args(["run", "--", "exit", "3"]).assert().code(3);
    })
    .await;
    assert_eq!(mock.requests("DELETE", &box_path("box-1")).await, 1);
}

#[tokio::test(flavor = "multi_thread")]
async fn test_run_keep_leaves_box() {
    let mock = MockTavor::start().await;
    mock.mock_create("box-1", Some("running")).await;
    mock.mock_box_statuses("box-1", &["running"]).await;
    mock.mock_delete("box-1").await;
    mock.mock_stream("box-1", sse_frame("end", json!({"status": "done"})))
        .await;
    let mut cmd = common::tavor(&mock);

    blocking(move || {
        cmd.args(["run", "--keep", "true"])
            .assert()
            .success()
            .stderr(predicate::str::contains("box-1"));
    })
    .await;
    assert_eq!(mock.requests("DELETE", &box_path("box-1")).await, 0);
}

#[tokio::test(flavor = "multi_thread")]
async fn test_exec_polling() {
    let mock = MockTavor::start().await;
    mock.mock_box_statuses("box-1", &["running"]).await;
    mock.mock_queue("box-1", "cmd-1").await;
    mock.mock_command_records(
        "box-1",
        "cmd-1",
        vec![
            json!({"id": "cmd-1", "status": "running"}),
            json!({"id": "cmd-1", "status": "failed", "stdout": "partial\n", "stderr": "boom\n"}),
        ],
    )
    .await;
    let mut cmd = common::tavor(&mock);

    blocking(move || {
        cmd.args(["exec", "--no-stream", "--poll-interval", "10", "box-1", "make", "test"])
            .assert()
            .code(1)
            .stdout("partial\n")
            .stderr(predicate::str::contains("boom"));
    })
    .await;

    let queued = mock.request_bodies("POST", &box_path("box-1")).await;
    assert_eq!(queued, vec![json!({"command": "make test", "stream": false})]);
    // exec never stops the box it attached to
    assert_eq!(mock.requests("DELETE", &box_path("box-1")).await, 0);
}

#[tokio::test(flavor = "multi_thread")]
async fn test_url_and_expose() {
    let mock = MockTavor::start().await;
    mock.mock_running_box("box-1", "abc.tavor.app").await;
    wiremock::Mock::given(wiremock::matchers::method("POST"))
        .and(wiremock::matchers::path(format!("{}/expose_port", box_path("box-1"))))
        .respond_with(tavor_test_utils::json_response(
            200,
            json!({"data": {"proxy_port": 40123, "target_port": 8080, "expires_at": "2030-01-01T00:00:00Z"}}),
        ))
        .mount(&mock.server)
        .await;
    let mut url = common::tavor(&mock);
    let mut expose = common::tavor(&mock);

    blocking(move || {
        url.args(["url", "box-1", "8080"])
            .assert()
            .success()
            .stdout("https://8080-abc.tavor.app\n");
        expose
            .args(["expose", "box-1", "8080"])
            .assert()
            .success()
            .stdout(predicate::str::contains("40123 -> 8080"));
    })
    .await;
}
