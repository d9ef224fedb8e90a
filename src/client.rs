// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0

//! The session lifecycle manager (spec.md §4.1) and the top-level
//! [`Client`] handle.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use dashmap::DashMap;
use serde_json::json;
use tracing::{debug, info, warn};

use crate::config::Config;
use crate::context::manager::{wait_all_terminal, DEFAULT_MAX_RETRIES, DEFAULT_RETRY_INTERVAL};
use crate::context::{ContextService, ContextSync};
use crate::error::{Error, Result};
use crate::rpc::{ApiResult, RpcClient};
use crate::session::params::{BROWSER_DATA_PATH, BROWSER_RECORD_PATH};
use crate::session::{GetSessionResponse, Session, SessionParams};
use crate::tool::McpTool;

/// Default poll cadence / deadline for `pauseAsync`/`resumeAsync` (§4.1).
const PAUSE_RESUME_POLL_INTERVAL: Duration = Duration::from_secs(2);
const PAUSE_RESUME_TIMEOUT: Duration = Duration::from_secs(600);

/// Entry point of the SDK. Holds the global [`ContextService`] and the map
/// of locally-known live [`Session`]s. Multiple `Client`s may coexist in one
/// process (Design Notes §9) — there is no process-wide singleton.
#[derive(Clone)]
pub struct Client {
    rpc: RpcClient,
    context_service: ContextService,
    sessions: Arc<DashMap<String, Session>>,
}

/// Outcome of `Client::create`.
pub struct CreateSessionResult {
    pub session: Option<Session>,
    pub request_id: String,
    pub success: bool,
    pub error_message: Option<String>,
}

/// Outcome of `Client::list`.
pub struct ListSessionResult {
    pub session_ids: Vec<String>,
    pub next_token: Option<String>,
    pub request_id: String,
}

/// Outcome of `Client::pauseAsync`/`resumeAsync`.
pub struct AsyncOpResult {
    pub success: bool,
    pub error_message: Option<String>,
    pub elapsed_ms: u64,
}

impl Client {
    /// Construct a client from an explicit API key / endpoint, falling back
    /// to environment/`.env` discovery for anything left `None` (spec.md
    /// §6). A missing API key is a fatal construction error.
    pub fn new(api_key: Option<String>, endpoint: Option<String>) -> Result<Self> {
        let config = Config::load(api_key, endpoint)?;
        Self::from_config(config)
    }

    pub fn from_config(config: Config) -> Result<Self> {
        let rpc = RpcClient::new(
            config.endpoint,
            config.api_key,
            Duration::from_millis(config.timeout_ms),
        )?;
        Ok(Self {
            context_service: ContextService::new(rpc.clone()),
            rpc,
            sessions: Arc::new(DashMap::new()),
        })
    }

    pub fn context_service(&self) -> &ContextService {
        &self.context_service
    }

    /// Caller-owned lookup into the locally-tracked session map; does not
    /// perform an RPC. Returns `None` if this `Client` never created or
    /// fetched a session with this id.
    pub fn local_session(&self, session_id: &str) -> Option<Session> {
        self.sessions.get(session_id).map(|s| s.clone())
    }

    /// Create a session from [`SessionParams`] (spec.md §4.1 step-by-step).
    pub async fn create(&self, mut params: SessionParams) -> Result<CreateSessionResult> {
        // Step 1: implicit file-transfer context, always present.
        let transfer_name = format!("file-transfer-context-{}", now_unix());
        let transfer_ctx = self.context_service.get(&transfer_name, true).await?;
        let transfer_ctx = match transfer_ctx.data {
            Some(ctx) => ctx,
            None => {
                return Ok(CreateSessionResult {
                    session: None,
                    request_id: transfer_ctx.request_id,
                    success: false,
                    error_message: transfer_ctx.error_message,
                })
            }
        };
        params
            .context_sync
            .push(ContextSync::new(transfer_ctx.id.clone(), "/temp/file-transfer"));

        // Step 2: optional browser-replay recording context.
        let mut record_context: Option<crate::context::Context> = None;
        if params.enable_browser_replay {
            let name = format!("record-{}", uuid::Uuid::new_v4());
            let ctx = self.context_service.get(&name, true).await?;
            if let Some(ctx) = ctx.data {
                params
                    .context_sync
                    .push(ContextSync::new(ctx.id.clone(), BROWSER_RECORD_PATH));
                record_context = Some(ctx);
            }
        }

        // Step 3: optional browser-context mount (upload-only).
        if let Some(browser) = &params.browser_context {
            if let Some(context_id) = &browser.context_id {
                params.context_sync.push(
                    ContextSync::new(context_id.clone(), BROWSER_DATA_PATH)
                        .with_policy(crate::context::sync_policy::upload_only_policy()),
                );
            }
        }

        // Step 4: submit.
        let envelope = self
            .rpc
            .call(
                "CreateMcpSession",
                json!({
                    "Labels": params.labels,
                    "ImageId": params.image_id,
                    "PersistenceDataList": params.context_sync,
                    "VpcResource": params.is_vpc,
                    "McpPolicyId": params.policy_id,
                }),
            )
            .await?;
        let request_id = envelope.request_id.clone();
        let envelope = match envelope.into_api_error() {
            Ok(e) => e,
            Err(e) => {
                return Ok(CreateSessionResult {
                    session: None,
                    request_id,
                    success: false,
                    error_message: Some(e.to_string()),
                })
            }
        };

        let session_id = envelope
            .data
            .get("sessionId")
            .and_then(|v| v.as_str())
            .unwrap_or_default()
            .to_string();
        if session_id.is_empty() {
            return Ok(CreateSessionResult {
                session: None,
                request_id,
                success: false,
                error_message: Some("server did not return a sessionId".to_string()),
            });
        }

        let resource_url = envelope.data.get("resourceUrl").and_then(|v| v.as_str()).map(str::to_string);
        let network_interface_ip = envelope
            .data
            .get("networkInterfaceIp")
            .and_then(|v| v.as_str())
            .map(str::to_string);
        let http_port = envelope.data.get("httpPort").and_then(|v| v.as_u64()).map(|v| v as u32);
        let token = envelope.data.get("token").and_then(|v| v.as_str()).map(str::to_string);
        let app_instance_id = envelope
            .data
            .get("appInstanceId")
            .and_then(|v| v.as_str())
            .map(str::to_string);

        // Step 6: rename the recording context, non-fatal on failure.
        if let (Some(ctx), Some(app_instance_id)) = (&record_context, &app_instance_id) {
            let mut renamed = ctx.clone();
            renamed.name = format!("browserreplay-{app_instance_id}");
            if let Err(e) = self.context_service.update(&renamed).await {
                warn!(error = %e, "failed to rename browser-replay context, continuing");
            }
        }

        // Step 7: VPC sessions eagerly cache the tool catalog.
        let mcp_tools = if params.is_vpc {
            match self.list_mcp_tools(params.image_id.as_deref()).await {
                Ok(tools) => tools,
                Err(e) => {
                    warn!(error = %e, "failed to list MCP tools for VPC session, continuing");
                    Vec::new()
                }
            }
        } else {
            Vec::new()
        };

        let session = Session::new(
            self.rpc.clone(),
            session_id.clone(),
            resource_url,
            params.image_id.clone(),
            params.is_vpc,
            network_interface_ip,
            http_port,
            token,
            params.enable_browser_replay,
            record_context.map(|c| c.id),
            Some(transfer_ctx.id),
            mcp_tools,
        );

        // Step 8: block until every mount's context-sync reaches terminal.
        if !params.context_sync.is_empty() {
            let outcome =
                wait_all_terminal(session.context(), DEFAULT_MAX_RETRIES, DEFAULT_RETRY_INTERVAL).await?;
            if outcome.timed_out {
                info!(session_id, "context-sync wait exhausted retries during create");
            }
        }

        self.sessions.insert(session_id, session.clone());

        Ok(CreateSessionResult {
            session: Some(session),
            request_id,
            success: true,
            error_message: None,
        })
    }

    /// Fetch a session directly from the server; does not register it in
    /// this client's local map (caller-owned).
    pub async fn get(&self, session_id: &str) -> Result<ApiResult<Session>> {
        let envelope = self
            .rpc
            .call("GetSession", json!({ "SessionId": session_id }))
            .await?;
        let request_id = envelope.request_id.clone();
        let envelope = match envelope.into_api_error() {
            Ok(e) => e,
            Err(Error::Api { code, message }) => {
                if Error::is_not_found_code(&code) {
                    info!(session_id, "session not found");
                } else {
                    warn!(session_id, code, message, "GetSession failed");
                }
                return Ok(ApiResult::err(format!("[{code}] {message}"), request_id));
            }
            Err(e) => return Ok(ApiResult::err(e.to_string(), request_id)),
        };

        let response: GetSessionResponse = serde_json::from_value(envelope.data)?;
        let session = Session::new(
            self.rpc.clone(),
            response.session_id,
            response.resource_url,
            None,
            response.vpc_resource,
            response.network_interface_ip,
            response.http_port,
            response.token,
            false,
            None,
            None,
            Vec::new(),
        );
        Ok(ApiResult::ok(session, request_id))
    }

    /// Forward-paged `list`: fetches pages `1..page-1` in sequence via
    /// `nextToken` chaining. Returns failure if an intermediate page can't
    /// be reached.
    pub async fn list(
        &self,
        labels: &HashMap<String, String>,
        page: u32,
        limit: u32,
    ) -> Result<ApiResult<ListSessionResult>> {
        if page < 1 {
            return Ok(ApiResult::err(
                "Page number must be >= 1",
                String::new(),
            ));
        }

        let mut next_token: Option<String> = None;
        let mut request_id = String::new();
        for current_page in 1..page {
            let result = self.list_by_labels(labels, limit, next_token.clone()).await?;
            request_id = result.request_id.clone();
            match result.data {
                Some(page_data) if page_data.next_token.is_some() => {
                    next_token = page_data.next_token;
                }
                _ => {
                    return Ok(ApiResult::err(
                        format!("Cannot reach page {current_page}: no further pages"),
                        request_id,
                    ))
                }
            }
        }

        let result = self.list_by_labels(labels, limit, next_token).await?;
        Ok(result)
    }

    /// Deprecated alias accepting pagination parameters directly.
    pub async fn list_by_labels(
        &self,
        labels: &HashMap<String, String>,
        max_results: u32,
        next_token: Option<String>,
    ) -> Result<ApiResult<ListSessionResult>> {
        let envelope = self
            .rpc
            .call(
                "ListSession",
                json!({ "Labels": labels, "MaxResults": max_results, "NextToken": next_token }),
            )
            .await?;
        let request_id = envelope.request_id.clone();
        let envelope = match envelope.into_api_error() {
            Ok(e) => e,
            Err(e) => return Ok(ApiResult::err(e.to_string(), request_id)),
        };

        let session_ids = envelope
            .data
            .get("data")
            .and_then(|v| v.as_array())
            .map(|arr| {
                arr.iter()
                    .filter_map(|v| v.get("sessionId").and_then(|s| s.as_str()).map(str::to_string))
                    .collect()
            })
            .unwrap_or_default();
        let next_token = envelope
            .data
            .get("nextToken")
            .and_then(|v| v.as_str())
            .map(str::to_string);

        Ok(ApiResult::ok(
            ListSessionResult {
                session_ids,
                next_token,
                request_id: request_id.clone(),
            },
            request_id,
        ))
    }

    /// Decision matrix per spec.md §4.1: optionally sync contexts before
    /// release; a sync failure does not abort deletion. The session is
    /// removed from the local map regardless of success.
    pub async fn delete(&self, session: &Session, sync_context: bool) -> Result<ApiResult<()>> {
        let should_sync = sync_context || session.enable_browser_replay;
        if should_sync {
            let (context_id, path) = if !sync_context && session.enable_browser_replay {
                (session.record_context_id.clone(), None)
            } else {
                (None, None)
            };
            let outcome = session
                .context()
                .sync(context_id.as_deref(), path, None, None, DEFAULT_MAX_RETRIES, DEFAULT_RETRY_INTERVAL)
                .await;
            if let Err(e) = outcome {
                warn!(error = %e, "context sync before delete failed, proceeding with release");
            }
        }

        let result = self
            .rpc
            .call("ReleaseMcpSession", json!({ "SessionId": session.session_id }))
            .await;

        self.sessions.remove(&session.session_id);

        let envelope = match result {
            Ok(e) => e,
            Err(e) => return Ok(ApiResult::err(e.to_string(), String::new())),
        };
        let request_id = envelope.request_id.clone();
        Ok(match envelope.into_api_error() {
            Ok(_) => ApiResult::ok((), request_id),
            Err(e) => ApiResult::err(e.to_string(), request_id),
        })
    }

    pub async fn pause_async(&self, session_id: &str) -> Result<AsyncOpResult> {
        self.transition(session_id, "PauseSessionAsync", &["RUNNING", "PAUSING"], "PAUSED")
            .await
    }

    pub async fn resume_async(&self, session_id: &str) -> Result<AsyncOpResult> {
        self.transition(session_id, "ResumeSessionAsync", &["PAUSED", "RESUMING"], "RUNNING")
            .await
    }

    async fn transition(
        &self,
        session_id: &str,
        action: &str,
        tolerated_intermediate: &[&str],
        terminal: &str,
    ) -> Result<AsyncOpResult> {
        let start = std::time::Instant::now();

        let envelope = self.rpc.call(action, json!({ "SessionId": session_id })).await?;
        if let Err(e) = envelope.into_api_error() {
            return Ok(AsyncOpResult {
                success: false,
                error_message: Some(e.to_string()),
                elapsed_ms: start.elapsed().as_millis() as u64,
            });
        }

        loop {
            let envelope = self
                .rpc
                .call("GetSession", json!({ "SessionId": session_id }))
                .await?;
            let envelope = match envelope.into_api_error() {
                Ok(e) => e,
                Err(e) => {
                    return Ok(AsyncOpResult {
                        success: false,
                        error_message: Some(e.to_string()),
                        elapsed_ms: start.elapsed().as_millis() as u64,
                    })
                }
            };
            let status = envelope
                .data
                .get("status")
                .and_then(|v| v.as_str())
                .unwrap_or_default();

            if status == terminal {
                return Ok(AsyncOpResult {
                    success: true,
                    error_message: None,
                    elapsed_ms: start.elapsed().as_millis() as u64,
                });
            }
            if !tolerated_intermediate.contains(&status) {
                warn!(session_id, status, action, "unexpected session status during transition");
            }

            if start.elapsed() >= PAUSE_RESUME_TIMEOUT {
                return Ok(AsyncOpResult {
                    success: false,
                    error_message: Some(format!("timed out waiting for status {terminal}")),
                    elapsed_ms: start.elapsed().as_millis() as u64,
                });
            }
            debug!(session_id, status, "polling for transition");
            tokio::time::sleep(PAUSE_RESUME_POLL_INTERVAL).await;
        }
    }

    pub(crate) async fn list_mcp_tools(&self, image_id: Option<&str>) -> Result<Vec<McpTool>> {
        let envelope = self
            .rpc
            .call("ListMcpTools", json!({ "ImageId": image_id }))
            .await?
            .into_api_error()?;
        let raw = envelope.data.as_str().unwrap_or("[]");
        Ok(serde_json::from_str(raw)?)
    }
}

fn now_unix() -> u64 {
    std::time::SystemTime::now()
        .duration_since(std::time::UNIX_EPOCH)
        .map(|d| d.as_secs())
        .unwrap_or(0)
}


#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn list_rejects_page_zero() {
        let client = Client::new(Some("k".to_string()), Some("127.0.0.1:1".to_string())).unwrap();
        let result = client.list(&HashMap::new(), 0, 10).await.unwrap();
        assert!(!result.success);
        assert_eq!(result.error_message.unwrap(), "Page number must be >= 1");
    }
}
