// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0

//! Shell command execution and code-run wrappers.

use serde_json::json;

use crate::error::Result;
use crate::session::Session;

pub async fn shell(session: &Session, command: &str) -> Result<String> {
    let result = session
        .dispatcher()
        .call_tool("shell", json!({ "command": command }), false)
        .await?;
    into_data(result)
}

pub async fn run_code(session: &Session, language: &str, code: &str) -> Result<String> {
    let result = session
        .dispatcher()
        .call_tool("run_code", json!({ "language": language, "code": code }), false)
        .await?;
    into_data(result)
}

fn into_data(result: crate::tool::ToolResult) -> Result<String> {
    if result.success {
        Ok(result.data)
    } else {
        Err(crate::error::Error::Tool {
            message: result.error_message.unwrap_or_default(),
        })
    }
}
