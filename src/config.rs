// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0

//! Configuration loading.
//!
//! Precedence, high to low: an explicit [`Config`] passed to
//! [`crate::Client::new`], environment variables, a `.env` file discovered
//! by searching upward from the current directory (stopping at the first
//! `.env` found or the filesystem root), then built-in defaults.

use std::path::{Path, PathBuf};

use crate::error::{Error, Result};

const DEFAULT_ENDPOINT: &str = "wuyingai.cn-shanghai.aliyuncs.com";
const DEFAULT_TIMEOUT_MS: u64 = 60_000;

/// Resolved SDK configuration.
#[derive(Debug, Clone)]
pub struct Config {
    pub api_key: String,
    pub endpoint: String,
    pub timeout_ms: u64,
    pub log_level: String,
}

impl Config {
    /// Build a `Config` from explicit overrides, falling back to the
    /// environment and `.env` discovery for anything left `None`.
    pub fn load(api_key: Option<String>, endpoint: Option<String>) -> Result<Self> {
        load_dotenv_upward(&std::env::current_dir().unwrap_or_else(|_| PathBuf::from(".")));

        let api_key = api_key
            .or_else(|| std::env::var("AGENTBAY_API_KEY").ok())
            .ok_or_else(|| Error::Authentication {
                message: "no API key: pass one explicitly or set AGENTBAY_API_KEY".to_string(),
            })?;
        if api_key.trim().is_empty() {
            return Err(Error::Authentication {
                message: "API key is empty".to_string(),
            });
        }

        let endpoint = endpoint
            .or_else(|| std::env::var("AGENTBAY_ENDPOINT").ok())
            .unwrap_or_else(|| DEFAULT_ENDPOINT.to_string());

        let timeout_ms = std::env::var("AGENTBAY_TIMEOUT_MS")
            .ok()
            .and_then(|v| v.parse::<u64>().ok())
            .unwrap_or(DEFAULT_TIMEOUT_MS);

        let log_level = std::env::var("LOG_LEVEL").unwrap_or_else(|_| "info".to_string());

        Ok(Self {
            api_key,
            endpoint,
            timeout_ms,
            log_level,
        })
    }
}

/// Walk upward from `start`, loading the first `.env` found. A no-op if none
/// exists anywhere above `start`. Idempotent (dotenvy keeps existing process
/// env vars, so a second call is harmless).
fn load_dotenv_upward(start: &Path) {
    let mut dir = Some(start.to_path_buf());
    while let Some(d) = dir {
        let candidate = d.join(".env");
        if candidate.is_file() {
            let _ = dotenvy::from_path(&candidate);
            return;
        }
        dir = d.parent().map(Path::to_path_buf);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn missing_api_key_is_fatal() {
        std::env::remove_var("AGENTBAY_API_KEY");
        let result = Config::load(None, None);
        assert!(matches!(result, Err(Error::Authentication { .. })));
    }

    #[test]
    fn explicit_api_key_wins_over_env() {
        std::env::set_var("AGENTBAY_API_KEY", "env-key");
        let config = Config::load(Some("explicit-key".to_string()), None).unwrap();
        assert_eq!(config.api_key, "explicit-key");
        std::env::remove_var("AGENTBAY_API_KEY");
    }

    #[test]
    fn defaults_apply_when_unset() {
        std::env::remove_var("AGENTBAY_ENDPOINT");
        std::env::remove_var("AGENTBAY_TIMEOUT_MS");
        let config = Config::load(Some("k".to_string()), None).unwrap();
        assert_eq!(config.endpoint, DEFAULT_ENDPOINT);
        assert_eq!(config.timeout_ms, DEFAULT_TIMEOUT_MS);
    }
}
