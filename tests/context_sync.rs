// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0

//! HTTP-boundary tests for `ContextManager::sync`'s callback mode (spec.md
//! §4.5, §8 scenario 5) and its retry-past-a-transient-failure behavior
//! (§4.2's "a polling exception inside an iteration is logged and the
//! iteration retries").

use std::time::Duration;

use agentbay_sdk::{Client, Config, SessionParams};
use serde_json::json;
use wiremock::{Mock, MockServer, Request, ResponseTemplate};

struct ActionIs(&'static str);

impl wiremock::Match for ActionIs {
    fn matches(&self, request: &Request) -> bool {
        serde_json::from_slice::<serde_json::Value>(&request.body)
            .ok()
            .and_then(|v| v.get("Action").and_then(|a| a.as_str()).map(str::to_string))
            .as_deref()
            == Some(self.0)
    }
}

fn ok(request_id: &str, data: serde_json::Value) -> ResponseTemplate {
    ResponseTemplate::new(200).set_body_json(json!({
        "success": true,
        "requestId": request_id,
        "data": data,
    }))
}

fn client_against(server: &MockServer) -> Client {
    let config = Config {
        api_key: "test-key".to_string(),
        endpoint: server.uri(),
        timeout_ms: 5_000,
        log_level: "error".to_string(),
    };
    Client::from_config(config).unwrap()
}

fn status_envelope(inner: &str) -> String {
    serde_json::to_string(&json!([{ "type": "data", "data": inner }])).unwrap()
}

async fn session_against(server: &MockServer) -> agentbay_sdk::Session {
    Mock::given(ActionIs("GetContext"))
        .respond_with(ok(
            "req-getctx",
            json!({ "contextId": "ctx-transfer-1", "context": { "id": "ctx-transfer-1", "name": "x" } }),
        ))
        .mount(server)
        .await;
    Mock::given(ActionIs("CreateMcpSession"))
        .respond_with(ok("req-create", json!({ "sessionId": "session-1" })))
        .mount(server)
        .await;
    // Consumed once, by `Client::create`'s own context-sync wait.
    Mock::given(ActionIs("GetContextInfo"))
        .respond_with(ok("req-info-create", json!({ "contextStatus": "" })))
        .up_to_n_times(1)
        .mount(server)
        .await;

    let client = client_against(server);
    client
        .create(SessionParams::new())
        .await
        .unwrap()
        .session
        .unwrap()
}

#[tokio::test]
async fn sync_callback_mode_retries_past_a_transient_poll_failure() {
    let server = MockServer::start().await;
    let session = session_against(&server).await;

    Mock::given(ActionIs("SyncContext"))
        .respond_with(ok("req-sync", json!({})))
        .mount(&server)
        .await;

    let terminal = status_envelope(
        &serde_json::to_string(&json!([
            {"contextId": "ctx-1", "path": "/mnt", "status": "Success", "taskType": "upload"}
        ]))
        .unwrap(),
    );

    // wiremock tries the most-recently-mounted matching mock first: the
    // unlimited terminal-success response is mounted first (lowest
    // priority), then the single-use transient failure (mounted last, so
    // it wins the first poll); once its one use is spent the next poll
    // falls through to the terminal response.
    Mock::given(ActionIs("GetContextInfo"))
        .respond_with(ok("req-info-terminal", json!({ "contextStatus": terminal })))
        .mount(&server)
        .await;
    Mock::given(ActionIs("GetContextInfo"))
        .respond_with(ResponseTemplate::new(500))
        .up_to_n_times(1)
        .mount(&server)
        .await;

    let (tx, rx) = tokio::sync::oneshot::channel();
    let callback: Box<dyn FnOnce(bool) + Send> = Box::new(move |success| {
        let _ = tx.send(success);
    });

    let result = session
        .context()
        .sync(
            Some("ctx-1"),
            Some("/mnt"),
            Some("upload"),
            Some(callback),
            5,
            Duration::from_millis(10),
        )
        .await
        .unwrap();

    // Callback mode returns as soon as the `SyncContext` RPC itself
    // succeeds, before the background poll has even started.
    assert!(result.success);

    let delivered = tokio::time::timeout(Duration::from_secs(2), rx)
        .await
        .expect("callback did not fire before timeout")
        .expect("callback sender dropped without sending");
    assert!(
        delivered,
        "callback should report success once the transient failure is retried past"
    );
}

#[tokio::test]
async fn sync_callback_mode_reports_false_on_exhausted_retries() {
    let server = MockServer::start().await;
    let session = session_against(&server).await;

    Mock::given(ActionIs("SyncContext"))
        .respond_with(ok("req-sync", json!({})))
        .mount(&server)
        .await;

    let in_progress = status_envelope(
        &serde_json::to_string(&json!([
            {"contextId": "ctx-1", "path": "/mnt", "status": "InProgress", "taskType": "upload"}
        ]))
        .unwrap(),
    );
    Mock::given(ActionIs("GetContextInfo"))
        .respond_with(ok("req-info-pending", json!({ "contextStatus": in_progress })))
        .mount(&server)
        .await;

    let (tx, rx) = tokio::sync::oneshot::channel();
    let callback: Box<dyn FnOnce(bool) + Send> = Box::new(move |success| {
        let _ = tx.send(success);
    });

    session
        .context()
        .sync(
            Some("ctx-1"),
            Some("/mnt"),
            Some("upload"),
            Some(callback),
            2,
            Duration::from_millis(10),
        )
        .await
        .unwrap();

    let delivered = tokio::time::timeout(Duration::from_secs(2), rx)
        .await
        .expect("callback did not fire before timeout")
        .expect("callback sender dropped without sending");
    assert!(!delivered, "retry budget exhaustion must report false, exactly once");
}

#[tokio::test]
async fn sync_synchronous_mode_blocks_until_terminal_success() {
    let server = MockServer::start().await;
    let session = session_against(&server).await;

    Mock::given(ActionIs("SyncContext"))
        .respond_with(ok("req-sync", json!({})))
        .mount(&server)
        .await;

    let terminal = status_envelope(
        &serde_json::to_string(&json!([
            {"contextId": "ctx-1", "path": "/mnt", "status": "Success", "taskType": "download"}
        ]))
        .unwrap(),
    );
    Mock::given(ActionIs("GetContextInfo"))
        .respond_with(ok("req-info", json!({ "contextStatus": terminal })))
        .mount(&server)
        .await;

    let result = session
        .context()
        .sync(
            Some("ctx-1"),
            Some("/mnt"),
            Some("download"),
            None,
            5,
            Duration::from_millis(10),
        )
        .await
        .unwrap();

    assert!(result.success);
}
