// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0

//! `SessionParams` builder — the input to `Client::create` (spec.md §4.1).

use std::collections::HashMap;

use crate::context::ContextSync;
use crate::error::{Error, Result};

/// Minimal upload-only mount for a browser session's extension/profile
/// directory (§4.1 step 3).
pub const BROWSER_DATA_PATH: &str = "/tmp/agentbay_browser";
pub const BROWSER_RECORD_PATH: &str = "/home/guest/record";
pub const EXTENSIONS_BASE_PATH: &str = "/tmp/extensions";

#[derive(Debug, Clone, Default)]
pub struct BrowserContext {
    pub context_id: Option<String>,
    pub extension_option: Option<crate::extension::ExtensionOption>,
}

/// Builder for `Client::create`'s input record.
#[derive(Debug, Clone, Default)]
pub struct SessionParams {
    pub labels: HashMap<String, String>,
    pub image_id: Option<String>,
    pub context_sync: Vec<ContextSync>,
    pub browser_context: Option<BrowserContext>,
    pub is_vpc: bool,
    pub policy_id: Option<String>,
    pub enable_browser_replay: bool,
}

impl SessionParams {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_image_id(mut self, image_id: impl Into<String>) -> Self {
        self.image_id = Some(image_id.into());
        self
    }

    pub fn with_label(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.labels.insert(key.into(), value.into());
        self
    }

    pub fn with_context_sync(mut self, sync: ContextSync) -> Self {
        self.context_sync.push(sync);
        self
    }

    pub fn with_browser_context(mut self, context: BrowserContext) -> Self {
        self.browser_context = Some(context);
        self
    }

    pub fn vpc(mut self, is_vpc: bool) -> Self {
        self.is_vpc = is_vpc;
        self
    }

    pub fn with_policy_id(mut self, policy_id: impl Into<String>) -> Self {
        self.policy_id = Some(policy_id.into());
        self
    }

    pub fn enable_browser_replay(mut self, enabled: bool) -> Self {
        self.enable_browser_replay = enabled;
        self
    }
}

/// Labels must be a non-empty mapping from non-empty string to non-empty
/// string — no arrays or exotic object types (spec.md §6).
pub fn validate_labels(labels: &HashMap<String, String>) -> Result<()> {
    if labels.is_empty() {
        return Err(Error::validation("labels must not be empty"));
    }
    for (k, v) in labels {
        if k.trim().is_empty() {
            return Err(Error::validation("label keys must not be empty"));
        }
        if v.trim().is_empty() {
            return Err(Error::validation(format!(
                "label value for key '{k}' must not be empty"
            )));
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rejects_empty_label_map() {
        assert!(validate_labels(&HashMap::new()).is_err());
    }

    #[test]
    fn rejects_empty_key_or_value() {
        let mut labels = HashMap::new();
        labels.insert("".to_string(), "v".to_string());
        assert!(validate_labels(&labels).is_err());

        let mut labels = HashMap::new();
        labels.insert("k".to_string(), "".to_string());
        assert!(validate_labels(&labels).is_err());
    }

    #[test]
    fn accepts_well_formed_labels() {
        let mut labels = HashMap::new();
        labels.insert("env".to_string(), "prod".to_string());
        assert!(validate_labels(&labels).is_ok());
    }
}
