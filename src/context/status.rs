// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0

//! Context-sync status items and the nested JSON-in-JSON wire format they
//! arrive in.
//!
//! `GetContextInfo` returns `data.contextStatus` as a JSON *string* encoding
//! an array of `{type, data}` envelopes. Only envelopes with `type ==
//! "data"` carry anything; each such envelope's own `data` field is itself
//! a JSON-encoded array of [`ContextStatusItem`] that must be parsed a
//! second time. [`parse_context_status`] does both stages and concatenates
//! items from every `"data"` envelope, in order.

use serde::Deserialize;

/// A single upload/download task's status, as reported by the server.
#[derive(Debug, Clone, Deserialize, PartialEq, Eq)]
pub struct ContextStatusItem {
    #[serde(rename = "contextId")]
    pub context_id: String,
    pub path: String,
    pub status: String,
    #[serde(rename = "errorMessage", default)]
    pub error_message: Option<String>,
    #[serde(rename = "startTime", default)]
    pub start_time: Option<String>,
    #[serde(rename = "finishTime", default)]
    pub finish_time: Option<String>,
    #[serde(rename = "taskType", default)]
    pub task_type: Option<String>,
}

impl ContextStatusItem {
    pub fn is_terminal(&self) -> bool {
        matches!(self.status.as_str(), "Success" | "Failed")
    }

    pub fn is_failed(&self) -> bool {
        self.status == "Failed"
    }

    pub fn is_sync_task(&self) -> bool {
        matches!(self.task_type.as_deref(), Some("upload") | Some("download"))
    }
}

#[derive(Debug, Deserialize)]
struct OuterEnvelope {
    #[serde(rename = "type")]
    kind: String,
    data: String,
}

/// Parse the `data.contextStatus` wire string into a flat list of items.
/// An empty or absent string yields an empty list rather than an error —
/// "nothing to report" is a normal, not exceptional, outcome.
pub fn parse_context_status(raw: &str) -> crate::error::Result<Vec<ContextStatusItem>> {
    if raw.trim().is_empty() {
        return Ok(Vec::new());
    }
    let envelopes: Vec<OuterEnvelope> = serde_json::from_str(raw)?;
    let mut items = Vec::new();
    for envelope in envelopes {
        if envelope.kind != "data" {
            continue;
        }
        let inner: Vec<ContextStatusItem> = serde_json::from_str(&envelope.data)?;
        items.extend(inner);
    }
    Ok(items)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_nested_envelopes_in_order() {
        let inner_a = serde_json::to_string(&serde_json::json!([
            {"contextId": "ctx-1", "path": "/a", "status": "Success", "taskType": "upload"}
        ]))
        .unwrap();
        let inner_b = serde_json::to_string(&serde_json::json!([
            {"contextId": "ctx-1", "path": "/b", "status": "InProgress", "taskType": "download"}
        ]))
        .unwrap();
        let raw = serde_json::to_string(&serde_json::json!([
            {"type": "data", "data": inner_a},
            {"type": "heartbeat", "data": "[]"},
            {"type": "data", "data": inner_b},
        ]))
        .unwrap();

        let items = parse_context_status(&raw).unwrap();
        assert_eq!(items.len(), 2);
        assert_eq!(items[0].path, "/a");
        assert_eq!(items[1].path, "/b");
    }

    #[test]
    fn empty_string_is_empty_list() {
        assert!(parse_context_status("").unwrap().is_empty());
    }

    #[test]
    fn non_data_envelopes_are_skipped() {
        let raw = serde_json::to_string(&serde_json::json!([
            {"type": "ack", "data": "[]"},
        ]))
        .unwrap();
        assert!(parse_context_status(&raw).unwrap().is_empty());
    }

    #[test]
    fn terminal_and_sync_task_classification() {
        let item = ContextStatusItem {
            context_id: "c".into(),
            path: "/p".into(),
            status: "Failed".into(),
            error_message: Some("boom".into()),
            start_time: None,
            finish_time: None,
            task_type: Some("upload".into()),
        };
        assert!(item.is_terminal());
        assert!(item.is_failed());
        assert!(item.is_sync_task());

        let running = ContextStatusItem {
            status: "InProgress".into(),
            ..item
        };
        assert!(!running.is_terminal());
    }
}
