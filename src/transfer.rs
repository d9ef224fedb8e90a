// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0

//! File-transfer coordinator (spec.md §4.6): presigned-URL upload/download
//! with optional post-transfer context-sync wait.

use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

use tracing::debug;

use crate::context::manager::{wait_sync_terminal, DEFAULT_RETRY_INTERVAL};
use crate::context::ContextService;
use crate::error::{Error, Result};
use crate::session::Session;

const DEFAULT_WAIT_TIMEOUT_RETRIES: u32 = 20; // ~30s at 1.5s/poll

/// `(bytes transferred so far, total bytes)`. The presigned PUT is a single
/// in-memory body today (no chunked streaming), so callers see exactly two
/// invocations — `(0, total)` then `(total, total)` — but the signature
/// accommodates a future chunked implementation without a breaking change.
pub type ProgressCallback = Arc<dyn Fn(u64, u64) + Send + Sync>;

#[derive(Clone)]
pub struct UploadOptions {
    pub content_type: Option<String>,
    pub wait: bool,
    pub wait_timeout: Duration,
    pub poll_interval: Duration,
    pub progress_cb: Option<ProgressCallback>,
}

impl Default for UploadOptions {
    fn default() -> Self {
        Self {
            content_type: None,
            wait: true,
            wait_timeout: Duration::from_secs(30),
            poll_interval: DEFAULT_RETRY_INTERVAL,
            progress_cb: None,
        }
    }
}

impl std::fmt::Debug for UploadOptions {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("UploadOptions")
            .field("content_type", &self.content_type)
            .field("wait", &self.wait)
            .field("wait_timeout", &self.wait_timeout)
            .field("poll_interval", &self.poll_interval)
            .field("progress_cb", &self.progress_cb.is_some())
            .finish()
    }
}

#[derive(Debug, Clone, Default)]
pub struct DownloadOptions {
    pub overwrite: bool,
    pub pre_sync: bool,
}

pub struct TransferResult {
    pub success: bool,
    pub url_request_id: String,
    pub sync_request_id: Option<String>,
    pub error_message: Option<String>,
}

fn context_key(remote_path: &str) -> String {
    remote_path.trim_start_matches('/').to_string()
}

fn retries_for_timeout(wait_timeout: Duration, poll_interval: Duration) -> u32 {
    let poll_ms = poll_interval.as_millis().max(1);
    ((wait_timeout.as_millis() / poll_ms) as u32).max(1)
}

/// Upload `local_path`'s bytes to `remote_path` inside `session`'s implicit
/// file-transfer context. `contexts` must be the [`ContextService`] of the
/// [`crate::Client`] that created `session` — presigned-URL issuance goes
/// through it (and its §7 beta 503-backoff) rather than a hand-rolled RPC.
pub async fn upload_file(
    session: &Session,
    contexts: &ContextService,
    local_path: &Path,
    remote_path: &str,
    options: UploadOptions,
) -> Result<TransferResult> {
    let context_id = session
        .file_transfer_context_id
        .clone()
        .ok_or_else(|| Error::validation("session has no file-transfer context"))?;
    let key = context_key(remote_path);

    let url_result = contexts.get_file_upload_url(&context_id, &key).await?;
    let url_request_id = url_result.request_id.clone();
    let url = url_result
        .data
        .ok_or_else(|| Error::api("InvalidResponse", url_result.error_message.unwrap_or_default()))?
        .url;

    let bytes = tokio::fs::read(local_path)
        .await
        .map_err(|e| Error::transport(format!("failed to read {}: {e}", local_path.display())))?;
    let total = bytes.len() as u64;
    if let Some(cb) = &options.progress_cb {
        cb(0, total);
    }

    let mut req = session.rpc().http().put(&url).body(bytes);
    if let Some(ct) = &options.content_type {
        req = req.header("Content-Type", ct.clone());
    }
    let response = req.send().await?;
    if !response.status().is_success() {
        return Ok(TransferResult {
            success: false,
            url_request_id,
            sync_request_id: None,
            error_message: Some(format!("upload PUT returned HTTP {}", response.status())),
        });
    }
    if let Some(cb) = &options.progress_cb {
        cb(total, total);
    }

    if !options.wait {
        return Ok(TransferResult {
            success: true,
            url_request_id,
            sync_request_id: None,
            error_message: None,
        });
    }

    let sync_result = session
        .context()
        .sync(
            Some(&context_id),
            Some(&key),
            Some("upload"),
            None,
            retries_for_timeout(options.wait_timeout, options.poll_interval),
            options.poll_interval,
        )
        .await?;

    Ok(TransferResult {
        success: sync_result.success,
        url_request_id,
        sync_request_id: Some(sync_result.request_id),
        error_message: sync_result.error_message,
    })
}

/// Download `remote_path` from `session`'s file-transfer context to
/// `local_path`. `contexts` must be the [`ContextService`] of the
/// [`crate::Client`] that created `session` (see [`upload_file`]).
pub async fn download_file(
    session: &Session,
    contexts: &ContextService,
    remote_path: &str,
    local_path: &Path,
    options: DownloadOptions,
) -> Result<TransferResult> {
    let context_id = session
        .file_transfer_context_id
        .clone()
        .ok_or_else(|| Error::validation("session has no file-transfer context"))?;
    let key = context_key(remote_path);

    let mut sync_request_id = None;
    if options.pre_sync {
        let outcome = wait_sync_terminal(
            session.context(),
            Some(&context_id),
            Some(&key),
            DEFAULT_WAIT_TIMEOUT_RETRIES,
            DEFAULT_RETRY_INTERVAL,
        )
        .await?;
        debug!(success = outcome.all_success, "pre-download sync wait complete");
    }

    let url_result = contexts.get_file_download_url(&context_id, &key).await?;
    let url_request_id = url_result.request_id.clone();
    let url = url_result
        .data
        .ok_or_else(|| Error::api("InvalidResponse", url_result.error_message.unwrap_or_default()))?
        .url;

    let response = session.rpc().http().get(&url).send().await?;
    if !response.status().is_success() {
        return Ok(TransferResult {
            success: false,
            url_request_id,
            sync_request_id,
            error_message: Some(format!("download GET returned HTTP {}", response.status())),
        });
    }
    let bytes = response.bytes().await?;

    if local_path.exists() && !options.overwrite {
        return Ok(TransferResult {
            success: false,
            url_request_id,
            sync_request_id,
            error_message: Some(format!("{} already exists", local_path.display())),
        });
    }
    if let Some(parent) = local_path.parent() {
        tokio::fs::create_dir_all(parent).await.ok();
    }
    tokio::fs::write(local_path, &bytes)
        .await
        .map_err(|e| Error::transport(format!("failed to write {}: {e}", local_path.display())))?;

    sync_request_id.get_or_insert_with(String::new);
    Ok(TransferResult {
        success: true,
        url_request_id,
        sync_request_id,
        error_message: None,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn context_key_strips_leading_slash() {
        assert_eq!(context_key("/a/b.txt"), "a/b.txt");
        assert_eq!(context_key("a/b.txt"), "a/b.txt");
    }

    #[test]
    fn retries_for_timeout_is_at_least_one() {
        assert_eq!(
            retries_for_timeout(Duration::from_millis(10), Duration::from_secs(5)),
            1
        );
        assert_eq!(
            retries_for_timeout(Duration::from_secs(30), Duration::from_millis(1500)),
            20
        );
    }
}
