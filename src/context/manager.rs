// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0

//! Per-session context-sync status polling and on-demand sync (spec.md
//! §4.5, §4.2).

use std::time::{Duration, Instant};

use serde_json::json;
use tracing::{debug, info, warn};

use super::status::{parse_context_status, ContextStatusItem};
use crate::error::Result;
use crate::rpc::{ApiResult, RpcClient};

pub const DEFAULT_MAX_RETRIES: u32 = 150;
pub const DEFAULT_RETRY_INTERVAL: Duration = Duration::from_millis(1500);

/// A background sync's terminal outcome.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct WaitOutcome {
    /// `true` if every observed item (or the filtered subset) reached
    /// `Success`; `false` if any reached `Failed` or retries were
    /// exhausted before all items went terminal.
    pub all_success: bool,
    pub timed_out: bool,
}

/// Per-session handle for `GetContextInfo`/`SyncContext`.
#[derive(Clone)]
pub struct ContextManager {
    rpc: RpcClient,
    session_id: String,
}

impl ContextManager {
    pub(crate) fn new(rpc: RpcClient, session_id: String) -> Self {
        Self { rpc, session_id }
    }

    pub async fn info(&self) -> Result<ApiResult<Vec<ContextStatusItem>>> {
        self.info_with_params(None, None, None).await
    }

    pub async fn info_with_params(
        &self,
        context_id: Option<&str>,
        path: Option<&str>,
        task_type: Option<&str>,
    ) -> Result<ApiResult<Vec<ContextStatusItem>>> {
        let envelope = self
            .rpc
            .call(
                "GetContextInfo",
                json!({
                    "SessionId": self.session_id,
                    "ContextId": context_id,
                    "Path": path,
                    "TaskType": task_type,
                }),
            )
            .await?;
        let request_id = envelope.request_id.clone();
        let envelope = match envelope.into_api_error() {
            Ok(e) => e,
            Err(e) => return Ok(ApiResult::err(e.to_string(), request_id)),
        };

        let raw = envelope
            .data
            .get("contextStatus")
            .and_then(|v| v.as_str())
            .unwrap_or("");
        let items = parse_context_status(raw)?;
        Ok(ApiResult::ok(items, request_id))
    }

    /// Trigger `SyncContext` and, in synchronous mode (no `callback`), block
    /// until every sync-task item reaches a terminal state (or the list of
    /// sync tasks is empty, which is reported as immediate success). In
    /// callback mode, return as soon as the RPC itself succeeds and deliver
    /// the terminal outcome to `callback` exactly once from a detached
    /// task.
    pub async fn sync(
        &self,
        context_id: Option<&str>,
        path: Option<&str>,
        mode: Option<&str>,
        callback: Option<Box<dyn FnOnce(bool) + Send + 'static>>,
        max_retries: u32,
        retry_interval: Duration,
    ) -> Result<ApiResult<()>> {
        let envelope = self
            .rpc
            .call(
                "SyncContext",
                json!({
                    "SessionId": self.session_id,
                    "ContextId": context_id,
                    "Path": path,
                    "Mode": mode,
                }),
            )
            .await?;
        let request_id = envelope.request_id.clone();
        let envelope = match envelope.into_api_error() {
            Ok(e) => e,
            Err(e) => return Ok(ApiResult::err(e.to_string(), request_id)),
        };
        let _ = envelope;

        match callback {
            Some(cb) => {
                let manager = self.clone();
                let context_id = context_id.map(str::to_string);
                let path = path.map(str::to_string);
                tokio::spawn(async move {
                    let outcome = wait_sync_terminal(
                        &manager,
                        context_id.as_deref(),
                        path.as_deref(),
                        max_retries,
                        retry_interval,
                    )
                    .await;
                    let success = matches!(outcome, Ok(o) if o.all_success && !o.timed_out);
                    cb(success);
                });
                Ok(ApiResult::ok((), request_id))
            }
            None => {
                let outcome =
                    wait_sync_terminal(self, context_id, path, max_retries, retry_interval).await?;
                if outcome.all_success {
                    Ok(ApiResult::ok((), request_id))
                } else {
                    Ok(ApiResult::err("sync did not complete successfully", request_id))
                }
            }
        }
    }
}

/// Poll [`ContextManager::info`] until every item is terminal, the list is
/// empty, or `max_retries` is exhausted. Used by `Client::create`'s
/// context-mount wait and `Client::delete`'s pre-release sync wait — both
/// look at *all* items, unfiltered by task type.
pub async fn wait_all_terminal(
    manager: &ContextManager,
    max_retries: u32,
    retry_interval: Duration,
) -> Result<WaitOutcome> {
    poll_loop(manager, None, None, false, max_retries, retry_interval).await
}

/// Like [`wait_all_terminal`] but scoped to `context_id`/`path` and
/// restricted to `taskType ∈ {upload, download}` items, per the "polling
/// specifically for a sync completion" rule in spec.md §4.2. If no sync
/// tasks appear at all, completion is reported immediately.
pub async fn wait_sync_terminal(
    manager: &ContextManager,
    context_id: Option<&str>,
    path: Option<&str>,
    max_retries: u32,
    retry_interval: Duration,
) -> Result<WaitOutcome> {
    poll_loop(manager, context_id, path, true, max_retries, retry_interval).await
}

async fn poll_loop(
    manager: &ContextManager,
    context_id: Option<&str>,
    path: Option<&str>,
    sync_tasks_only: bool,
    max_retries: u32,
    retry_interval: Duration,
) -> Result<WaitOutcome> {
    let start = Instant::now();
    if max_retries == 0 {
        return Ok(WaitOutcome {
            all_success: true,
            timed_out: false,
        });
    }

    for attempt in 0..max_retries {
        let result = match manager.info_with_params(context_id, path, None).await {
            Ok(r) => r,
            Err(e) => {
                warn!(attempt, error = %e, "context-sync: poll iteration failed, retrying");
                tokio::time::sleep(retry_interval).await;
                continue;
            }
        };
        let mut items = result.data.unwrap_or_default();
        if sync_tasks_only {
            items.retain(ContextStatusItem::is_sync_task);
        }

        if items.is_empty() {
            debug!(attempt, "context-sync: no items to wait for");
            return Ok(WaitOutcome {
                all_success: true,
                timed_out: false,
            });
        }

        for item in items.iter().filter(|i| i.is_failed()) {
            warn!(
                path = %item.path,
                error = item.error_message.as_deref().unwrap_or(""),
                "context-sync item failed"
            );
        }

        if items.iter().all(ContextStatusItem::is_terminal) {
            let all_success = !items.iter().any(ContextStatusItem::is_failed);
            return Ok(WaitOutcome {
                all_success,
                timed_out: false,
            });
        }

        debug!(attempt, pending = items.len(), "context-sync: still running");
        tokio::time::sleep(retry_interval).await;
    }

    let elapsed_ms = start.elapsed().as_millis() as u64;
    info!(elapsed_ms, "context-sync wait exhausted retry budget");
    Ok(WaitOutcome {
        all_success: false,
        timed_out: true,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn max_retries_zero_returns_immediately_without_rpc() {
        // Constructing a ContextManager with an unreachable endpoint would
        // hang if `poll_loop` ever issued an RPC; max_retries=0 must short
        // circuit before doing so.
        let rpc = RpcClient::new(
            "127.0.0.1:1".to_string(),
            "k".to_string(),
            Duration::from_millis(50),
        )
        .unwrap();
        let manager = ContextManager::new(rpc, "sess-1".to_string());
        let outcome = wait_all_terminal(&manager, 0, Duration::from_millis(10))
            .await
            .unwrap();
        assert!(outcome.all_success);
        assert!(!outcome.timed_out);
    }
}
