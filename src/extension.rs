// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0

//! Extension repository (spec.md §4.8): content-addressed browser-extension
//! storage inside a dedicated context.

use std::path::Path;

use chrono::{DateTime, Utc};
use rand::RngCore;
use serde::{Deserialize, Serialize};

use crate::context::ContextService;
use crate::error::{Error, Result};
use crate::session::params::EXTENSIONS_BASE_PATH;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Extension {
    pub id: String,
    pub name: String,
    #[serde(rename = "createdAt", default)]
    pub created_at: Option<DateTime<Utc>>,
}

/// Bundles extension ids with the context that holds them, attachable to a
/// browser session's [`crate::session::SessionParams`].
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExtensionOption {
    #[serde(rename = "contextId")]
    pub context_id: String,
    pub ids: Vec<String>,
}

/// Lazily initialized around a dedicated context: reuses a caller-supplied
/// `contextId` (auto-creating it if absent), or auto-creates
/// `extensions-<unix-seconds>` and tracks it as service-owned so
/// [`ExtensionService::cleanup`] knows whether to delete it.
pub struct ExtensionService {
    contexts: ContextService,
    context_id: String,
    owns_context: bool,
}

impl ExtensionService {
    pub async fn new(contexts: ContextService, context_id: Option<String>) -> Result<Self> {
        match context_id {
            Some(id) => {
                // Caller-supplied id: still routed through `get(create=true)`
                // so an id that doesn't yet exist is provisioned rather than
                // failing outright.
                let result = contexts.get(&id, true).await?;
                let ctx = result
                    .data
                    .ok_or_else(|| Error::validation(result.error_message.unwrap_or_default()))?;
                Ok(Self {
                    contexts,
                    context_id: ctx.id,
                    owns_context: false,
                })
            }
            None => {
                let name = format!("extensions-{}", now_unix());
                let result = contexts.create(&name).await?;
                let ctx = result
                    .data
                    .ok_or_else(|| Error::validation(result.error_message.unwrap_or_default()))?;
                Ok(Self {
                    contexts,
                    context_id: ctx.id,
                    owns_context: true,
                })
            }
        }
    }

    pub fn context_id(&self) -> &str {
        &self.context_id
    }

    /// Reject non-`.zip` before any upload.
    pub async fn create(&self, local_path: &Path) -> Result<Extension> {
        if local_path.extension().and_then(|e| e.to_str()) != Some("zip") {
            return Err(Error::validation(format!(
                "extension file must end in .zip, got {}",
                local_path.display()
            )));
        }

        let id = format!("ext_{}.zip", random_hex(16));
        let remote_path = format!("{EXTENSIONS_BASE_PATH}/{id}");

        let url_result = self
            .contexts
            .get_file_upload_url(&self.context_id, &remote_path)
            .await?;
        let url = url_result
            .data
            .ok_or_else(|| Error::validation(url_result.error_message.unwrap_or_default()))?
            .url;

        let bytes = tokio::fs::read(local_path)
            .await
            .map_err(|e| Error::transport(format!("failed to read {}: {e}", local_path.display())))?;
        let response = self.contexts.rpc().http().put(&url).body(bytes).send().await?;
        if !response.status().is_success() {
            return Err(Error::transport(format!(
                "extension upload returned HTTP {}",
                response.status()
            )));
        }

        Ok(Extension {
            id,
            name: local_path
                .file_name()
                .and_then(|n| n.to_str())
                .unwrap_or_default()
                .to_string(),
            created_at: Some(Utc::now()),
        })
    }

    pub async fn list(&self) -> Result<Vec<Extension>> {
        let result = self
            .contexts
            .list_files(&self.context_id, EXTENSIONS_BASE_PATH, 1, 100)
            .await?;
        let entries = result
            .data
            .ok_or_else(|| Error::validation(result.error_message.unwrap_or_default()))?
            .entries;
        Ok(entries
            .into_iter()
            .map(|e| Extension {
                id: e.file_name.clone(),
                name: e.file_name,
                created_at: e.gmt_create,
            })
            .collect())
    }

    /// Verifies `id` exists by listing first, then overwrites.
    pub async fn update(&self, id: &str, new_local_path: &Path) -> Result<Extension> {
        let existing = self.list().await?;
        if !existing.iter().any(|e| e.id == id) {
            return Err(Error::validation(format!("extension not found: {id}")));
        }

        let remote_path = format!("{EXTENSIONS_BASE_PATH}/{id}");
        let url_result = self
            .contexts
            .get_file_upload_url(&self.context_id, &remote_path)
            .await?;
        let url = url_result
            .data
            .ok_or_else(|| Error::validation(url_result.error_message.unwrap_or_default()))?
            .url;
        let bytes = tokio::fs::read(new_local_path)
            .await
            .map_err(|e| Error::transport(format!("failed to read {}: {e}", new_local_path.display())))?;
        let response = self.contexts.rpc().http().put(&url).body(bytes).send().await?;
        if !response.status().is_success() {
            return Err(Error::transport(format!(
                "extension update returned HTTP {}",
                response.status()
            )));
        }

        Ok(Extension {
            id: id.to_string(),
            name: id.to_string(),
            created_at: Some(Utc::now()),
        })
    }

    pub async fn delete(&self, id: &str) -> Result<()> {
        let remote_path = format!("{EXTENSIONS_BASE_PATH}/{id}");
        let result = self.contexts.delete_file(&self.context_id, &remote_path).await?;
        if !result.success {
            return Err(Error::validation(result.error_message.unwrap_or_default()));
        }
        Ok(())
    }

    pub fn create_extension_option(&self, ids: Vec<String>) -> ExtensionOption {
        ExtensionOption {
            context_id: self.context_id.clone(),
            ids,
        }
    }

    /// Deletes the underlying context only if this service auto-created it.
    pub async fn cleanup(&self) -> Result<()> {
        if !self.owns_context {
            return Ok(());
        }
        let ctx = crate::context::Context {
            id: self.context_id.clone(),
            name: String::new(),
            created_at: None,
            last_used_at: None,
        };
        self.contexts.delete(&ctx).await?;
        Ok(())
    }
}

fn now_unix() -> u64 {
    std::time::SystemTime::now()
        .duration_since(std::time::UNIX_EPOCH)
        .map(|d| d.as_secs())
        .unwrap_or(0)
}

fn random_hex(bytes: usize) -> String {
    let mut buf = vec![0u8; bytes];
    rand::rng().fill_bytes(&mut buf);
    hex::encode(buf)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn extension_id_shape() {
        let id = format!("ext_{}.zip", random_hex(16));
        assert!(id.starts_with("ext_"));
        assert!(id.ends_with(".zip"));
        assert_eq!(id.len(), "ext_".len() + 32 + ".zip".len());
    }

    #[tokio::test]
    async fn create_rejects_non_zip_before_any_upload() {
        let rpc = crate::rpc::RpcClient::new(
            "127.0.0.1:1".to_string(),
            "k".to_string(),
            std::time::Duration::from_millis(50),
        )
        .unwrap();
        let contexts = ContextService::new(rpc);
        let service = ExtensionService {
            contexts,
            context_id: "ctx-1".to_string(),
            owns_context: true,
        };
        let result = service.create(Path::new("/tmp/archive.tar.gz")).await;
        assert!(matches!(result, Err(Error::Validation { .. })));
    }
}
