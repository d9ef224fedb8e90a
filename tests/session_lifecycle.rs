// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0

//! HTTP-boundary tests for `Client::create`/`delete` and the context-sync
//! wait loop it triggers (spec.md §4.1, §4.2), stubbing the managed RPC
//! endpoint with `wiremock` instead of a live service.

use agentbay_sdk::{Client, Config, SessionParams};
use serde_json::json;
use wiremock::{Mock, MockServer, Request, ResponseTemplate};

/// Matches a POST body whose `Action` field equals the given RPC name,
/// since every RPC in this wire protocol shares the single `/` path.
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

fn api_error(request_id: &str, code: &str, message: &str) -> ResponseTemplate {
    ResponseTemplate::new(200).set_body_json(json!({
        "success": false,
        "requestId": request_id,
        "code": code,
        "message": message,
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

/// Stub the `GetContext` / `CreateMcpSession` / `GetContextInfo` sequence
/// `Client::create` always issues (the implicit file-transfer context mount
/// guarantees `context_sync` is never empty, so the wait loop always polls
/// at least once). `GetContextInfo` reports an empty status on the first
/// poll, satisfying spec.md §4.2's "empty list" terminal case.
async fn stub_minimal_create(server: &MockServer) {
    Mock::given(ActionIs("GetContext"))
        .respond_with(ok(
            "req-getctx",
            json!({ "contextId": "ctx-transfer-1", "context": { "id": "ctx-transfer-1", "name": "file-transfer-context" } }),
        ))
        .mount(server)
        .await;

    Mock::given(ActionIs("CreateMcpSession"))
        .respond_with(ok(
            "req-create",
            json!({ "sessionId": "session-abc123", "resourceUrl": "https://resource.example/abc123" }),
        ))
        .mount(server)
        .await;

    Mock::given(ActionIs("GetContextInfo"))
        .respond_with(ok("req-info", json!({ "contextStatus": "" })))
        .mount(server)
        .await;
}

#[tokio::test]
async fn create_returns_session_with_nonempty_id() {
    let server = MockServer::start().await;
    stub_minimal_create(&server).await;
    let client = client_against(&server);

    let params = SessionParams::new().with_image_id("linux_latest");
    let result = client.create(params).await.unwrap();

    assert!(result.success);
    let session = result.session.unwrap();
    assert_eq!(session.session_id, "session-abc123");
    assert!(!session.session_id.is_empty());
}

#[tokio::test]
async fn create_surfaces_api_level_failure_without_materializing_a_session() {
    let server = MockServer::start().await;
    Mock::given(ActionIs("GetContext"))
        .respond_with(ok(
            "req-getctx",
            json!({ "contextId": "ctx-transfer-1", "context": { "id": "ctx-transfer-1", "name": "x" } }),
        ))
        .mount(&server)
        .await;
    Mock::given(ActionIs("CreateMcpSession"))
        .respond_with(api_error("req-create", "QuotaExceeded", "too many sessions"))
        .mount(&server)
        .await;
    let client = client_against(&server);

    let result = client.create(SessionParams::new()).await.unwrap();

    assert!(!result.success);
    assert!(result.session.is_none());
    assert_eq!(result.error_message.unwrap(), "[QuotaExceeded] too many sessions");
}

#[tokio::test]
async fn create_waits_for_in_progress_context_sync_before_returning() {
    let server = MockServer::start().await;
    Mock::given(ActionIs("GetContext"))
        .respond_with(ok(
            "req-getctx",
            json!({ "contextId": "ctx-transfer-1", "context": { "id": "ctx-transfer-1", "name": "x" } }),
        ))
        .mount(&server)
        .await;
    Mock::given(ActionIs("CreateMcpSession"))
        .respond_with(ok("req-create", json!({ "sessionId": "session-xyz" })))
        .mount(&server)
        .await;

    let in_progress = serde_json::to_string(&json!([
        {"contextId": "ctx-transfer-1", "path": "/temp/file-transfer", "status": "InProgress", "taskType": "upload"}
    ]))
    .unwrap();
    let terminal = serde_json::to_string(&json!([
        {"contextId": "ctx-transfer-1", "path": "/temp/file-transfer", "status": "Success", "taskType": "upload"}
    ]))
    .unwrap();
    let envelope = |inner: &str| {
        serde_json::to_string(&json!([{ "type": "data", "data": inner }])).unwrap()
    };

    // wiremock checks mocks in reverse registration order, so the
    // single-use "in progress" response (registered second) is tried
    // first on every poll; once its one use is spent, the match falls
    // through to this unlimited "terminal" response.
    Mock::given(ActionIs("GetContextInfo"))
        .respond_with(ok("req-info-2", json!({ "contextStatus": envelope(&terminal) })))
        .mount(&server)
        .await;
    Mock::given(ActionIs("GetContextInfo"))
        .respond_with(ok("req-info-1", json!({ "contextStatus": envelope(&in_progress) })))
        .up_to_n_times(1)
        .mount(&server)
        .await;

    let client = client_against(&server);
    let result = client.create(SessionParams::new()).await.unwrap();

    assert!(result.success);
    // A fresh info() call after create() returns must show nothing pending.
    let session = result.session.unwrap();
    let status = session.context().info().await.unwrap();
    assert!(status
        .data
        .unwrap()
        .iter()
        .all(|item| item.is_terminal()));
}

#[tokio::test]
async fn delete_removes_session_from_local_map_even_on_release_failure() {
    let server = MockServer::start().await;
    stub_minimal_create(&server).await;
    Mock::given(ActionIs("ReleaseMcpSession"))
        .respond_with(api_error("req-release", "InvalidMcpSession.NotFound", "gone"))
        .mount(&server)
        .await;

    let client = client_against(&server);
    let created = client.create(SessionParams::new()).await.unwrap();
    let session = created.session.unwrap();
    assert!(client.local_session(&session.session_id).is_some());

    let deleted = client.delete(&session, false).await.unwrap();
    assert!(!deleted.success);
    assert!(client.local_session(&session.session_id).is_none());
}

#[tokio::test]
async fn list_rejects_page_zero_without_any_rpc() {
    let server = MockServer::start().await;
    // No mocks registered at all: any RPC call would fail the test with a
    // 404 from wiremock's default "no matching mock" response.
    let client = client_against(&server);

    let result = client
        .list(&std::collections::HashMap::new(), 0, 10)
        .await
        .unwrap();

    assert!(!result.success);
    assert_eq!(result.error_message.unwrap(), "Page number must be >= 1");
}

#[tokio::test]
async fn pause_async_reaches_paused_after_a_tolerated_intermediate_status() {
    let server = MockServer::start().await;
    Mock::given(ActionIs("PauseSessionAsync"))
        .respond_with(ok("req-pause", json!({})))
        .mount(&server)
        .await;

    // Registered in reverse consumption order, per wiremock's
    // last-mounted-wins priority: PAUSED (unlimited, mounted first) is the
    // fallback once the single-use PAUSING response is spent.
    Mock::given(ActionIs("GetSession"))
        .respond_with(ok("req-get-2", json!({ "sessionId": "session-1", "status": "PAUSED" })))
        .mount(&server)
        .await;
    Mock::given(ActionIs("GetSession"))
        .respond_with(ok("req-get-1", json!({ "sessionId": "session-1", "status": "PAUSING" })))
        .up_to_n_times(1)
        .mount(&server)
        .await;

    let client = client_against(&server);
    let result = client.pause_async("session-1").await.unwrap();

    assert!(result.success);
    assert!(result.error_message.is_none());
}

#[tokio::test]
async fn resume_async_reaches_running() {
    let server = MockServer::start().await;
    Mock::given(ActionIs("ResumeSessionAsync"))
        .respond_with(ok("req-resume", json!({})))
        .mount(&server)
        .await;
    Mock::given(ActionIs("GetSession"))
        .respond_with(ok("req-get", json!({ "sessionId": "session-1", "status": "RUNNING" })))
        .mount(&server)
        .await;

    let client = client_against(&server);
    let result = client.resume_async("session-1").await.unwrap();

    assert!(result.success);
}

#[tokio::test]
async fn pause_async_captures_api_level_rejection_instead_of_throwing() {
    let server = MockServer::start().await;
    Mock::given(ActionIs("PauseSessionAsync"))
        .respond_with(api_error(
            "req-pause",
            "InvalidMcpSession.NotFound",
            "session has already been released",
        ))
        .mount(&server)
        .await;
    // No GetSession mock: the initial PauseSessionAsync rejection must be
    // captured into the result before any poll is attempted.

    let client = client_against(&server);
    let result = client.pause_async("session-1").await.unwrap();

    assert!(!result.success);
    assert!(result
        .error_message
        .unwrap()
        .contains("InvalidMcpSession.NotFound"));
}

#[tokio::test]
async fn resume_async_captures_api_level_rejection_mid_poll() {
    let server = MockServer::start().await;
    Mock::given(ActionIs("ResumeSessionAsync"))
        .respond_with(ok("req-resume", json!({})))
        .mount(&server)
        .await;
    Mock::given(ActionIs("GetSession"))
        .respond_with(api_error("req-get", "InvalidMcpSession.NotFound", "gone"))
        .mount(&server)
        .await;

    let client = client_against(&server);
    let result = client.resume_async("session-1").await.unwrap();

    assert!(!result.success);
    assert!(result.error_message.unwrap().contains("InvalidMcpSession.NotFound"));
}
