// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0

//! Thin RPC transport over the managed API.
//!
//! Every RPC documented in spec.md §6 (`CreateMcpSession`, `GetSession`,
//! `SyncContext`, `ListMcpTools`, `CallMcpTool`, the context CRUD/file
//! family, …) goes through [`RpcClient::call`], which sends `Action` plus a
//! JSON parameter bag to the single managed endpoint with
//! `Authorization: Bearer <api_key>`, and unwraps the `{success, code,
//! message, requestId, data}` envelope all of them share. Per-RPC argument
//! shaping lives next to the component that needs it (`session`, `context`,
//! `tool`, …); this module only owns the envelope and the HTTP plumbing.

use std::time::Duration;

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::{Error, Result};

/// Raw wire envelope every managed RPC response shares.
#[derive(Debug, Clone, Deserialize)]
pub struct RpcEnvelope {
    #[serde(default)]
    pub success: bool,
    #[serde(default)]
    pub code: Option<String>,
    #[serde(default)]
    pub message: Option<String>,
    #[serde(rename = "requestId", default)]
    pub request_id: String,
    #[serde(default)]
    pub data: Value,
}

impl RpcEnvelope {
    /// Turn an unsuccessful envelope into an [`Error::Api`]; a no-op on
    /// success.
    pub fn into_api_error(self) -> Result<Self> {
        if self.success {
            return Ok(self);
        }
        let code = self.code.unwrap_or_else(|| "Unknown".to_string());
        let message = self.message.unwrap_or_else(|| "unknown error".to_string());
        Err(Error::Api { code, message })
    }
}

/// Uniform outcome envelope returned by most public SDK methods. Unlike
/// [`Error`], this is the "expected failure" channel: API rejections,
/// validation failures, and the like are reported here rather than thrown.
#[derive(Debug, Clone, Serialize)]
pub struct ApiResult<T> {
    pub success: bool,
    pub request_id: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error_message: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data: Option<T>,
}

impl<T> ApiResult<T> {
    pub fn ok(data: T, request_id: impl Into<String>) -> Self {
        Self {
            success: true,
            request_id: request_id.into(),
            error_message: None,
            data: Some(data),
        }
    }

    pub fn err(message: impl Into<String>, request_id: impl Into<String>) -> Self {
        Self {
            success: false,
            request_id: request_id.into(),
            error_message: Some(message.into()),
            data: None,
        }
    }
}

/// Transport-level client: one per [`crate::Client`]. Cheap to clone —
/// wraps a pooled `reqwest::Client`.
#[derive(Debug, Clone)]
pub struct RpcClient {
    http: reqwest::Client,
    endpoint: String,
    api_key: String,
}

impl RpcClient {
    pub fn new(endpoint: String, api_key: String, timeout: Duration) -> Result<Self> {
        let http = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| Error::Transport {
                message: format!("failed to build HTTP client: {e}"),
            })?;
        Ok(Self {
            http,
            endpoint,
            api_key,
        })
    }

    /// Invoke `action` with `params` and return the raw envelope
    /// (transport errors become `Err`; API-level `success=false` is
    /// returned as `Ok` for the caller to interpret — most callers should
    /// chain `.into_api_error()`).
    pub async fn call(&self, action: &str, params: Value) -> Result<RpcEnvelope> {
        // Production endpoints are bare hosts (`wuyingai.cn-shanghai.aliyuncs.com`)
        // and always go over TLS; tests point this at a local `wiremock` server
        // by passing a full `http://127.0.0.1:PORT` endpoint instead.
        let url = if self.endpoint.contains("://") {
            self.endpoint.clone()
        } else {
            format!("https://{}/", self.endpoint)
        };
        let body = serde_json::json!({
            "Action": action,
            "Params": params,
        });

        let response = self
            .http
            .post(&url)
            .bearer_auth(&self.api_key)
            .json(&body)
            .send()
            .await?;

        if !response.status().is_success() {
            let status = response.status();
            return Err(Error::Transport {
                message: format!("{action} returned HTTP {status}"),
            });
        }

        let envelope: RpcEnvelope = response.json().await?;
        Ok(envelope)
    }

    pub fn http(&self) -> &reqwest::Client {
        &self.http
    }
}

/// Retry wrapper for the two beta services (§7): transient
/// `ServiceUnavailable`/503 gets exponential backoff, 200ms then 400ms,
/// capped at 3 attempts total. Any other failure — including non-503
/// 5xx — propagates immediately (§9 Open Questions: only 503 is covered).
///
/// This expansion applies it to [`crate::context::ContextService`]'s
/// presigned-URL issuance, the closest analog in this spec's surface to a
/// standalone "volume service" (see SPEC_FULL.md §3).
pub async fn with_503_retry<T, F, Fut>(mut attempt: F) -> Result<T>
where
    F: FnMut() -> Fut,
    Fut: std::future::Future<Output = Result<T>>,
{
    let delays = [Duration::from_millis(200), Duration::from_millis(400)];
    let mut last_err = None;
    for delay in delays.iter().copied().chain(std::iter::once(Duration::ZERO)) {
        match attempt().await {
            Ok(v) => return Ok(v),
            Err(Error::Api { code, message }) if code == "ServiceUnavailable" => {
                last_err = Some(Error::Api { code, message });
                if delay > Duration::ZERO {
                    tokio::time::sleep(delay).await;
                }
            }
            Err(other) => return Err(other),
        }
    }
    Err(last_err.unwrap_or(Error::Transport {
        message: "retry budget exhausted".to_string(),
    }))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn retry_gives_up_after_three_attempts() {
        use std::sync::atomic::{AtomicUsize, Ordering};
        let attempts = AtomicUsize::new(0);
        let result: Result<()> = with_503_retry(|| {
            attempts.fetch_add(1, Ordering::SeqCst);
            async {
                Err(Error::Api {
                    code: "ServiceUnavailable".to_string(),
                    message: "busy".to_string(),
                })
            }
        })
        .await;
        assert!(result.is_err());
        assert_eq!(attempts.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn retry_does_not_apply_to_non_503_errors() {
        use std::sync::atomic::{AtomicUsize, Ordering};
        let attempts = AtomicUsize::new(0);
        let result: Result<()> = with_503_retry(|| {
            attempts.fetch_add(1, Ordering::SeqCst);
            async {
                Err(Error::Api {
                    code: "InvalidParameter".to_string(),
                    message: "bad".to_string(),
                })
            }
        })
        .await;
        assert!(result.is_err());
        assert_eq!(attempts.load(Ordering::SeqCst), 1);
    }
}
