// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0

//! Context-sync attachment descriptors and their policy builder.
//!
//! A [`ContextSync`] attaches a named [`super::Context`] to a session at a
//! mount path, with an optional nested [`SyncPolicy`] controlling upload,
//! download, delete, archive-extraction, and recycle behavior. The builder
//! rejects whitelist and recycle paths that contain shell-style wildcard
//! metacharacters — those must be exact directories.

use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};

const WILDCARD_CHARS: &[char] = &['*', '?', '[', ']'];

fn reject_wildcards(path: &str) -> Result<()> {
    if path.contains(WILDCARD_CHARS) {
        return Err(Error::validation(format!(
            "path must be an exact directory, not a pattern: {path}"
        )));
    }
    Ok(())
}

/// A mount attaching a persistent context to a session at `path`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ContextSync {
    #[serde(rename = "contextId")]
    pub context_id: String,
    pub path: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub policy: Option<SyncPolicy>,
}

impl ContextSync {
    pub fn new(context_id: impl Into<String>, path: impl Into<String>) -> Self {
        Self {
            context_id: context_id.into(),
            path: path.into(),
            policy: None,
        }
    }

    pub fn with_policy(mut self, policy: SyncPolicy) -> Self {
        self.policy = Some(policy);
        self
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct SyncPolicy {
    #[serde(rename = "uploadPolicy", skip_serializing_if = "Option::is_none")]
    pub upload_policy: Option<UploadPolicy>,
    #[serde(rename = "downloadPolicy", skip_serializing_if = "Option::is_none")]
    pub download_policy: Option<DownloadPolicy>,
    #[serde(rename = "deletePolicy", skip_serializing_if = "Option::is_none")]
    pub delete_policy: Option<DeletePolicy>,
    #[serde(rename = "extractPolicy", skip_serializing_if = "Option::is_none")]
    pub extract_policy: Option<ExtractPolicy>,
    #[serde(rename = "recyclePolicy", skip_serializing_if = "Option::is_none")]
    pub recycle_policy: Option<RecyclePolicy>,
    #[serde(rename = "bwList", skip_serializing_if = "Option::is_none")]
    pub bw_list: Option<BwList>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum UploadStrategy {
    UploadBeforeResourceRelease,
    Periodic,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum DownloadStrategy {
    DownloadAsync,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UploadPolicy {
    #[serde(rename = "autoUpload")]
    pub auto_upload: bool,
    #[serde(rename = "uploadStrategy")]
    pub upload_strategy: UploadStrategy,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub period: Option<u32>,
}

impl Default for UploadPolicy {
    fn default() -> Self {
        Self {
            auto_upload: true,
            upload_strategy: UploadStrategy::UploadBeforeResourceRelease,
            period: None,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DownloadPolicy {
    #[serde(rename = "autoDownload")]
    pub auto_download: bool,
    #[serde(rename = "downloadStrategy")]
    pub download_strategy: DownloadStrategy,
}

impl Default for DownloadPolicy {
    fn default() -> Self {
        Self {
            auto_download: true,
            download_strategy: DownloadStrategy::DownloadAsync,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct DeletePolicy {
    #[serde(rename = "syncLocalFile")]
    pub sync_local_file: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExtractPolicy {
    pub extract: bool,
    #[serde(rename = "deleteSrcFile")]
    pub delete_src_file: bool,
    #[serde(rename = "extractToCurrentFolder")]
    pub extract_to_current_folder: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RecycleLifecycle {
    SessionEnd,
    Periodic,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RecyclePolicy {
    pub lifecycle: RecycleLifecycle,
    pub paths: Vec<String>,
}

impl RecyclePolicy {
    pub fn new(lifecycle: RecycleLifecycle, paths: Vec<String>) -> Result<Self> {
        for p in &paths {
            reject_wildcards(p)?;
        }
        Ok(Self { lifecycle, paths })
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WhiteListEntry {
    pub path: String,
    #[serde(rename = "excludePaths", default, skip_serializing_if = "Vec::is_empty")]
    pub exclude_paths: Vec<String>,
}

impl WhiteListEntry {
    pub fn new(path: impl Into<String>) -> Result<Self> {
        let path = path.into();
        reject_wildcards(&path)?;
        Ok(Self {
            path,
            exclude_paths: Vec::new(),
        })
    }

    pub fn exclude(mut self, path: impl Into<String>) -> Result<Self> {
        let path = path.into();
        reject_wildcards(&path)?;
        self.exclude_paths.push(path);
        Ok(self)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct BwList {
    #[serde(rename = "whiteLists")]
    pub white_lists: Vec<WhiteListEntry>,
}

/// Minimal upload-only policy used for the implicit file-transfer and
/// browser-context mounts created by [`crate::session::SessionParams`].
pub fn upload_only_policy() -> SyncPolicy {
    SyncPolicy {
        upload_policy: Some(UploadPolicy::default()),
        download_policy: None,
        delete_policy: None,
        extract_policy: None,
        recycle_policy: None,
        bw_list: None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn whitelist_rejects_wildcards() {
        assert!(WhiteListEntry::new("/data/*").is_err());
        assert!(WhiteListEntry::new("/data?x").is_err());
        assert!(WhiteListEntry::new("/data[1]").is_err());
        assert!(WhiteListEntry::new("/data/exact").is_ok());
    }

    #[test]
    fn recycle_policy_rejects_wildcards() {
        let result = RecyclePolicy::new(
            RecycleLifecycle::SessionEnd,
            vec!["/tmp/*".to_string()],
        );
        assert!(result.is_err());
    }
}
