// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0

//! Remote filesystem read/write wrappers.

use serde_json::json;

use crate::error::{Error, Result};
use crate::session::Session;

pub async fn read_file(session: &Session, path: &str) -> Result<String> {
    let result = session
        .dispatcher()
        .call_tool("read_file", json!({ "path": path }), false)
        .await?;
    if result.success {
        Ok(result.data)
    } else {
        Err(Error::Tool {
            message: result.error_message.unwrap_or_default(),
        })
    }
}

pub async fn write_file(session: &Session, path: &str, content: &str) -> Result<()> {
    let result = session
        .dispatcher()
        .call_tool("write_file", json!({ "path": path, "content": content }), false)
        .await?;
    if result.success {
        Ok(())
    } else {
        Err(Error::Tool {
            message: result.error_message.unwrap_or_default(),
        })
    }
}
