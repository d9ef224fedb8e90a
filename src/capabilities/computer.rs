// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0

//! `sendKey` normalization (spec.md §6): the one tool-wrapper validation
//! rule pulled into normative scope. Callers may supply key names in any
//! case; the library normalizes to the table below and rejects anything
//! else before issuing a tool call.

use serde_json::json;

use crate::error::{Error, Result};
use crate::session::Session;

/// Special key names, normalized form indexed by lowercase input.
const SPECIAL_KEYS: &[&str] = &[
    "Ctrl", "Alt", "Shift", "Meta", "Tab", "Enter", "Escape", "Space", "Backspace", "Delete",
    "Home", "End", "PageUp", "PageDown", "Up", "Down", "Left", "Right", "Insert",
];

/// Normalize a caller-supplied key name: known special keys to their
/// canonical case, single letters to lowercase, `f1`..`f12` to uppercase
/// (`F1`..`F12`). Anything else is rejected.
pub fn normalize_key(key: &str) -> Result<String> {
    let lower = key.to_lowercase();

    if let Some(canonical) = SPECIAL_KEYS.iter().find(|k| k.to_lowercase() == lower) {
        return Ok((*canonical).to_string());
    }

    if lower.len() >= 2
        && lower.len() <= 3
        && lower.starts_with('f')
        && lower[1..].chars().all(|c| c.is_ascii_digit())
    {
        if let Ok(n) = lower[1..].parse::<u32>() {
            if (1..=12).contains(&n) {
                return Ok(lower.to_uppercase());
            }
        }
    }

    if lower.chars().count() == 1 && lower.chars().next().unwrap().is_ascii_alphabetic() {
        return Ok(lower);
    }

    Err(Error::validation(format!("unrecognized key name: {key}")))
}

pub async fn send_key(session: &Session, key: &str) -> Result<()> {
    let normalized = normalize_key(key)?;
    let result = session
        .dispatcher()
        .call_tool("send_key", json!({ "key": normalized }), false)
        .await?;
    if result.success {
        Ok(())
    } else {
        Err(Error::Tool {
            message: result.error_message.unwrap_or_default(),
        })
    }
}

pub async fn screenshot(session: &Session) -> Result<String> {
    let result = session
        .dispatcher()
        .call_tool("screenshot", json!({}), false)
        .await?;
    if result.success {
        Ok(result.data)
    } else {
        Err(Error::Tool {
            message: result.error_message.unwrap_or_default(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn normalizes_modifiers_and_case() {
        assert_eq!(normalize_key("ctrl").unwrap(), "Ctrl");
        assert_eq!(normalize_key("CTRL").unwrap(), "Ctrl");
        assert_eq!(normalize_key("tab").unwrap(), "Tab");
    }

    #[test]
    fn normalizes_letters_to_lowercase() {
        assert_eq!(normalize_key("A").unwrap(), "a");
        assert_eq!(normalize_key("z").unwrap(), "z");
    }

    #[test]
    fn normalizes_f_keys_to_uppercase() {
        assert_eq!(normalize_key("f1").unwrap(), "F1");
        assert_eq!(normalize_key("F12").unwrap(), "F12");
    }

    #[test]
    fn rejects_unknown_keys() {
        assert!(normalize_key("banana").is_err());
        assert!(normalize_key("f13").is_err());
    }
}
