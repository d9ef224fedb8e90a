// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0

//! Global context CRUD and file operations (spec.md §4.4).
//!
//! A [`Context`] is a named persistent volume, global to the tenant,
//! addressable by `(contextId, filePath)` through presigned URLs. This
//! module owns [`ContextService`]; per-session sync status and the
//! `sync`/`info` RPCs live in [`manager`].

pub mod manager;
pub mod status;
pub mod sync_policy;

pub use manager::ContextManager;
pub use status::{parse_context_status, ContextStatusItem};
pub use sync_policy::{ContextSync, SyncPolicy};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::json;

use crate::error::{Error, Result};
use crate::rpc::{with_503_retry, ApiResult, RpcClient};

/// A named, tenant-global persistent volume.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Context {
    pub id: String,
    pub name: String,
    #[serde(rename = "createdAt", default)]
    pub created_at: Option<DateTime<Utc>>,
    #[serde(rename = "lastUsedAt", default)]
    pub last_used_at: Option<DateTime<Utc>>,
}

impl Context {
    fn minimal(id: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
            created_at: None,
            last_used_at: None,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct ListedFile {
    #[serde(rename = "fileId")]
    pub file_id: String,
    #[serde(rename = "fileName")]
    pub file_name: String,
    #[serde(rename = "filePath")]
    pub file_path: String,
    #[serde(rename = "fileType")]
    pub file_type: String,
    #[serde(rename = "gmtCreate", default)]
    pub gmt_create: Option<DateTime<Utc>>,
    #[serde(rename = "gmtModified", default)]
    pub gmt_modified: Option<DateTime<Utc>>,
    #[serde(default)]
    pub size: Option<u64>,
    #[serde(default)]
    pub status: Option<String>,
}

pub struct ListFilesResult {
    pub entries: Vec<ListedFile>,
    pub count: Option<u64>,
}

pub struct ListContextsResult {
    pub contexts: Vec<Context>,
    pub next_token: Option<String>,
    pub total_count: u64,
}

/// Client for the global `ListContexts`/`GetContext`/`ModifyContext`/
/// `DeleteContext` RPC family and the presigned-URL file operations.
#[derive(Clone)]
pub struct ContextService {
    rpc: RpcClient,
}

impl ContextService {
    pub(crate) fn new(rpc: RpcClient) -> Self {
        Self { rpc }
    }

    pub async fn list(
        &self,
        max_results: u32,
        next_token: Option<String>,
    ) -> Result<ApiResult<ListContextsResult>> {
        let envelope = self
            .rpc
            .call(
                "ListContexts",
                json!({ "MaxResults": max_results, "NextToken": next_token }),
            )
            .await?;
        let request_id = envelope.request_id.clone();
        let envelope = match envelope.into_api_error() {
            Ok(e) => e,
            Err(e) => return Ok(ApiResult::err(e.to_string(), request_id)),
        };

        let contexts: Vec<Context> =
            serde_json::from_value(envelope.data.get("contexts").cloned().unwrap_or_default())
                .unwrap_or_default();
        let next_token = envelope
            .data
            .get("nextToken")
            .and_then(|v| v.as_str())
            .map(str::to_string);
        let total_count = envelope
            .data
            .get("totalCount")
            .and_then(|v| v.as_u64())
            .unwrap_or(contexts.len() as u64);

        Ok(ApiResult::ok(
            ListContextsResult {
                contexts,
                next_token,
                total_count,
            },
            request_id,
        ))
    }

    /// `get(name, create=true)` is idempotent by name: two calls return the
    /// same `contextId`. If the server returns an id without full metadata,
    /// fall back to [`Self::list`] to hydrate `createdAt`/`lastUsedAt`; if
    /// that also fails, return a minimal `{id, name}` context.
    pub async fn get(&self, name: &str, create: bool) -> Result<ApiResult<Context>> {
        let envelope = self
            .rpc
            .call("GetContext", json!({ "Name": name, "AllowCreate": create }))
            .await?;
        let request_id = envelope.request_id.clone();
        let envelope = match envelope.into_api_error() {
            Ok(e) => e,
            Err(e) => return Ok(ApiResult::err(e.to_string(), request_id)),
        };

        let context_id = match envelope.data.get("contextId").and_then(|v| v.as_str()) {
            Some(id) => id.to_string(),
            None => {
                return Ok(ApiResult::err(
                    "server did not return a contextId",
                    request_id,
                ))
            }
        };

        if let Ok(context) = serde_json::from_value::<Context>(envelope.data.get("context").cloned().unwrap_or_default())
        {
            if !context.id.is_empty() {
                return Ok(ApiResult::ok(context, request_id));
            }
        }

        if let Ok(listed) = self.list(100, None).await {
            if let Some(data) = listed.data {
                if let Some(found) = data.contexts.into_iter().find(|c| c.name == name) {
                    return Ok(ApiResult::ok(found, request_id));
                }
            }
        }

        Ok(ApiResult::ok(Context::minimal(context_id, name), request_id))
    }

    pub async fn create(&self, name: &str) -> Result<ApiResult<Context>> {
        self.get(name, true).await
    }

    /// Only `name` is mutable; the server receives `{id, name}`.
    pub async fn update(&self, context: &Context) -> Result<ApiResult<()>> {
        let envelope = self
            .rpc
            .call(
                "ModifyContext",
                json!({ "Id": context.id, "Name": context.name }),
            )
            .await?;
        Ok(self.unit_result(envelope))
    }

    pub async fn delete(&self, context: &Context) -> Result<ApiResult<()>> {
        let envelope = self
            .rpc
            .call("DeleteContext", json!({ "Id": context.id }))
            .await?;
        Ok(self.unit_result(envelope))
    }

    fn unit_result(&self, envelope: crate::rpc::RpcEnvelope) -> ApiResult<()> {
        let request_id = envelope.request_id.clone();
        match envelope.into_api_error() {
            Ok(_) => ApiResult::ok((), request_id),
            Err(e) => ApiResult::err(e.to_string(), request_id),
        }
    }

    /// Retried on transient 503 per §7 (this expansion's resolution of the
    /// "volume service" open question — see SPEC_FULL.md §3).
    pub async fn get_file_upload_url(
        &self,
        context_id: &str,
        file_path: &str,
    ) -> Result<ApiResult<PresignedUrl>> {
        let request_id = std::cell::RefCell::new(String::new());
        let result = with_503_retry(|| async {
            let envelope = self
                .rpc
                .call(
                    "GetContextFileUploadUrl",
                    json!({ "ContextId": context_id, "FilePath": file_path }),
                )
                .await?;
            *request_id.borrow_mut() = envelope.request_id.clone();
            let envelope = envelope.into_api_error()?;
            parse_presigned_url(&envelope.data)
        })
        .await;

        Ok(match result {
            Ok(url) => ApiResult::ok(url, request_id.into_inner()),
            Err(e) => ApiResult::err(e.to_string(), request_id.into_inner()),
        })
    }

    pub async fn get_file_download_url(
        &self,
        context_id: &str,
        file_path: &str,
    ) -> Result<ApiResult<PresignedUrl>> {
        let request_id = std::cell::RefCell::new(String::new());
        let result = with_503_retry(|| async {
            let envelope = self
                .rpc
                .call(
                    "GetContextFileDownloadUrl",
                    json!({ "ContextId": context_id, "FilePath": file_path }),
                )
                .await?;
            *request_id.borrow_mut() = envelope.request_id.clone();
            let envelope = envelope.into_api_error()?;
            parse_presigned_url(&envelope.data)
        })
        .await;

        Ok(match result {
            Ok(url) => ApiResult::ok(url, request_id.into_inner()),
            Err(e) => ApiResult::err(e.to_string(), request_id.into_inner()),
        })
    }

    pub async fn delete_file(&self, context_id: &str, file_path: &str) -> Result<ApiResult<()>> {
        let envelope = self
            .rpc
            .call(
                "DeleteContextFile",
                json!({ "ContextId": context_id, "FilePath": file_path }),
            )
            .await?;
        Ok(self.unit_result(envelope))
    }

    pub async fn list_files(
        &self,
        context_id: &str,
        parent_folder_path: &str,
        page_number: u32,
        page_size: u32,
    ) -> Result<ApiResult<ListFilesResult>> {
        let envelope = self
            .rpc
            .call(
                "DescribeContextFiles",
                json!({
                    "ContextId": context_id,
                    "ParentFolderPath": parent_folder_path,
                    "PageNumber": page_number,
                    "PageSize": page_size,
                }),
            )
            .await?;
        let request_id = envelope.request_id.clone();
        let envelope = match envelope.into_api_error() {
            Ok(e) => e,
            Err(e) => return Ok(ApiResult::err(e.to_string(), request_id)),
        };
        let entries: Vec<ListedFile> =
            serde_json::from_value(envelope.data.get("entries").cloned().unwrap_or_default())
                .unwrap_or_default();
        let count = envelope.data.get("count").and_then(|v| v.as_u64());
        Ok(ApiResult::ok(ListFilesResult { entries, count }, request_id))
    }

    pub(crate) fn rpc(&self) -> &RpcClient {
        &self.rpc
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct PresignedUrl {
    pub url: String,
    #[serde(rename = "expireTime", default)]
    pub expire_time: Option<i64>,
}

fn parse_presigned_url(data: &serde_json::Value) -> Result<PresignedUrl> {
    let url = data
        .get("url")
        .and_then(|v| v.as_str())
        .ok_or_else(|| Error::api("InvalidResponse", "server did not return a url"))?
        .to_string();
    let expire_time = data.get("expireTime").and_then(|v| v.as_i64());
    Ok(PresignedUrl { url, expire_time })
}
