// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0

//! Cooperative, cancellable directory watcher (spec.md §4.7).
//!
//! The server is authoritative for what counts as a change since the last
//! poll — this watcher deduplicates nothing across polls (see spec.md §9
//! Open Questions).

use std::time::Duration;

use serde::Deserialize;
use serde_json::json;
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

use crate::error::{Error, Result};
use crate::session::Session;

const MIN_INTERVAL_MS: u64 = 100;

#[derive(Debug, Clone, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum FileEventType {
    Create,
    Modify,
    Delete,
}

#[derive(Debug, Clone, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum PathType {
    File,
    Directory,
}

#[derive(Debug, Clone, Deserialize)]
pub struct FileChangeEvent {
    #[serde(rename = "eventType")]
    pub event_type: FileEventType,
    pub path: String,
    #[serde(rename = "pathType")]
    pub path_type: PathType,
}

/// Poll `getFileChange(path)` on `session` every `interval_ms`, invoking
/// `callback` synchronously with any non-empty delta. Exits on the next
/// loop boundary once `cancel` fires; the returned future always resolves,
/// never errors due to cancellation.
///
/// `interval_ms` must be `>= 100`; smaller values are rejected up front.
pub async fn watch_directory<F>(
    session: &Session,
    path: &str,
    mut callback: F,
    interval_ms: u64,
    cancel: CancellationToken,
) -> Result<()>
where
    F: FnMut(Vec<FileChangeEvent>) + Send,
{
    if interval_ms < MIN_INTERVAL_MS {
        return Err(Error::validation(format!(
            "intervalMs must be >= {MIN_INTERVAL_MS}, got {interval_ms}"
        )));
    }
    let interval = Duration::from_millis(interval_ms);

    loop {
        if cancel.is_cancelled() {
            return Ok(());
        }

        match fetch_changes(session, path).await {
            Ok(events) if !events.is_empty() => {
                debug!(path, count = events.len(), "directory change detected");
                // A callback panic would otherwise kill the watcher; a
                // caught unwind is as close as safe Rust gets to "catch the
                // exception, log, keep polling" without requiring `F:
                // UnwindSafe` from every caller.
                if let Err(panic) = std::panic::catch_unwind(std::panic::AssertUnwindSafe(|| {
                    callback(events)
                })) {
                    warn!(?panic, "watchDirectory callback panicked, continuing");
                }
            }
            Ok(_) => {}
            Err(e) => warn!(error = %e, "getFileChange failed, continuing"),
        }

        tokio::select! {
            _ = cancel.cancelled() => return Ok(()),
            _ = tokio::time::sleep(interval) => {}
        }
    }
}

async fn fetch_changes(session: &Session, path: &str) -> Result<Vec<FileChangeEvent>> {
    let result = session
        .dispatcher()
        .call_tool("getFileChange", json!({ "path": path }), false)
        .await?;
    if !result.success {
        return Err(Error::Tool {
            message: result.error_message.unwrap_or_default(),
        });
    }
    if result.data.trim().is_empty() {
        return Ok(Vec::new());
    }
    Ok(serde_json::from_str(&result.data)?)
}
