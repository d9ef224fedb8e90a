// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0

//! Tool-invocation dispatcher (spec.md §4.3).
//!
//! One entry point, [`ToolDispatcher::call_tool`], routes through the
//! managed `CallMcpTool` RPC for ordinary sessions or directly to a
//! per-session HTTP endpoint for VPC-isolated sessions, and normalizes both
//! response shapes into a single [`ToolResult`] envelope. The dispatcher
//! itself is schema-agnostic — it moves a `name` + JSON argument bag and
//! does not know what any particular tool expects; typed per-tool wrappers
//! live in [`crate::capabilities`].

use rand::RngCore;
use serde::Deserialize;
use serde_json::{json, Value};
use tracing::{debug, warn};

use crate::error::{Error, Result};
use crate::rpc::RpcClient;

/// A single remote capability, as enumerated by `ListMcpTools`.
#[derive(Debug, Clone, Deserialize)]
pub struct McpTool {
    pub name: String,
    #[serde(default)]
    pub description: String,
    #[serde(rename = "inputSchema", default)]
    pub input_schema: Value,
    /// Backend microservice hosting `tool`; the VPC routing key.
    pub server: String,
    pub tool: String,
}

/// VPC-only dispatch coordinates, present iff `Session::is_vpc`.
#[derive(Debug, Clone)]
pub struct VpcEndpoint {
    pub network_interface_ip: String,
    pub http_port: u32,
    pub token: String,
}

/// Uniform result envelope every `call_tool` invocation returns.
#[derive(Debug, Clone)]
pub struct ToolResult {
    pub success: bool,
    pub data: String,
    pub error_message: Option<String>,
    pub request_id: String,
}

/// Shared by every sub-service handle on a [`crate::Session`].
#[derive(Clone)]
pub struct ToolDispatcher {
    rpc: RpcClient,
    session_id: String,
    is_vpc: bool,
    vpc: Option<VpcEndpoint>,
    mcp_tools: Vec<McpTool>,
}

impl ToolDispatcher {
    pub(crate) fn new(
        rpc: RpcClient,
        session_id: String,
        is_vpc: bool,
        vpc: Option<VpcEndpoint>,
        mcp_tools: Vec<McpTool>,
    ) -> Self {
        Self {
            rpc,
            session_id,
            is_vpc,
            vpc,
            mcp_tools,
        }
    }

    pub fn mcp_tools(&self) -> &[McpTool] {
        &self.mcp_tools
    }

    pub async fn call_tool(&self, name: &str, args: Value, auto_gen_session: bool) -> Result<ToolResult> {
        let result = if self.is_vpc {
            self.call_via_vpc(name, args).await
        } else {
            self.call_via_managed(name, args, auto_gen_session).await
        };

        if let Ok(ref r) = result {
            if name == "run_code" {
                log_code_output(&r.data);
            }
        }
        result
    }

    async fn call_via_managed(
        &self,
        name: &str,
        args: Value,
        auto_gen_session: bool,
    ) -> Result<ToolResult> {
        let envelope = self
            .rpc
            .call(
                "CallMcpTool",
                json!({
                    "SessionId": self.session_id,
                    "Name": name,
                    "Args": args.to_string(),
                    "AutoGenSession": auto_gen_session,
                }),
            )
            .await?;

        let request_id = envelope.request_id.clone();
        let envelope = envelope.into_api_error()?;
        let (data, is_error) = extract_content(&envelope.data)?;

        Ok(normalize(data, is_error, request_id))
    }

    async fn call_via_vpc(&self, name: &str, args: Value) -> Result<ToolResult> {
        let server = self
            .mcp_tools
            .iter()
            .find(|t| t.name == name)
            .map(|t| t.server.clone())
            .ok_or_else(|| Error::validation(format!("Server not found for tool: {name}")))?;

        let vpc = self.vpc.as_ref().ok_or_else(|| {
            Error::validation("VPC session missing networkInterfaceIp/httpPort".to_string())
        })?;

        let request_id = format!("vpc-{}", random_hex(8));
        let args_json = args.to_string();
        let url = format!(
            "http://{}:{}/callTool",
            vpc.network_interface_ip, vpc.http_port
        );

        let response = self
            .rpc
            .http()
            .get(&url)
            .header("Content-Type", "application/x-www-form-urlencoded")
            .query(&[
                ("server", server.as_str()),
                ("tool", name),
                ("args", args_json.as_str()),
                ("token", vpc.token.as_str()),
                ("requestId", request_id.as_str()),
            ])
            .send()
            .await?;

        if !response.status().is_success() {
            return Err(Error::transport(format!(
                "VPC callTool returned HTTP {}",
                response.status()
            )));
        }

        let body: Value = response.json().await?;

        // The VPC path wraps the same content/isError shape one level
        // deeper: `responseData.data` is itself a JSON string encoding
        // `{result: {content, isError}}`.
        let wrapped = body
            .get("data")
            .and_then(|v| v.as_str())
            .ok_or_else(|| Error::transport("VPC response missing data string"))?;
        let wrapped: Value = serde_json::from_str(wrapped)?;
        let inner = wrapped.get("result").cloned().unwrap_or(wrapped);
        let (data, is_error) = extract_content(&inner)?;

        Ok(normalize(data, is_error, request_id))
    }
}

fn extract_content(data: &Value) -> Result<(String, bool)> {
    let content = data
        .get("content")
        .and_then(|v| v.as_array())
        .cloned()
        .unwrap_or_default();
    let is_error = data
        .get("isError")
        .and_then(|v| v.as_bool())
        .unwrap_or(false);

    if is_error {
        let joined = content
            .iter()
            .filter_map(|c| c.get("text").and_then(|t| t.as_str()))
            .collect::<Vec<_>>()
            .join("; ");
        Ok((joined, true))
    } else {
        let first = content
            .first()
            .and_then(|c| c.get("text"))
            .and_then(|t| t.as_str())
            .unwrap_or("")
            .to_string();
        Ok((first, false))
    }
}

fn normalize(data: String, is_error: bool, request_id: String) -> ToolResult {
    if is_error {
        ToolResult {
            success: false,
            data: String::new(),
            error_message: Some(data),
            request_id,
        }
    } else {
        ToolResult {
            success: true,
            data,
            error_message: None,
            request_id,
        }
    }
}

fn log_code_output(output: &str) {
    debug!(output, "run_code output");
}

/// `bytes` random bytes, hex-encoded. Used for the `vpc-<hex>` request id.
fn random_hex(bytes: usize) -> String {
    let mut buf = vec![0u8; bytes];
    rand::rng().fill_bytes(&mut buf);
    hex::encode(buf)
}

pub(crate) fn warn_non_fatal(context: &str, err: &Error) {
    warn!(context, error = %err, "non-fatal failure");
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn extract_content_joins_error_texts() {
        let data = json!({
            "content": [{"text": "permission denied"}, {"text": "file: /x"}],
            "isError": true,
        });
        let (text, is_error) = extract_content(&data).unwrap();
        assert!(is_error);
        assert_eq!(text, "permission denied; file: /x");
    }

    #[test]
    fn extract_content_takes_first_text_on_success() {
        let data = json!({
            "content": [{"text": "hi\n"}],
            "isError": false,
        });
        let (text, is_error) = extract_content(&data).unwrap();
        assert!(!is_error);
        assert_eq!(text, "hi\n");
    }

    #[test]
    fn extract_content_defaults_to_empty_string() {
        let data = json!({ "content": [], "isError": false });
        let (text, is_error) = extract_content(&data).unwrap();
        assert!(!is_error);
        assert_eq!(text, "");
    }

    #[test]
    fn success_never_carries_an_error_message() {
        let result = normalize("ok".to_string(), false, "req-1".to_string());
        assert!(result.success);
        assert!(result.error_message.is_none());
    }
}
