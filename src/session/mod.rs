// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0

//! The [`Session`] handle and its [`SessionParams`] builder (spec.md §3,
//! §4.1).
//!
//! Lifecycle operations (`create`, `get`, `list`, `delete`, `pause`,
//! `resume`) are methods on [`crate::Client`] — the manager that owns the
//! session map — not on `Session` itself; see Design Notes §9's guidance
//! against treating the client as a process-wide singleton with sessions
//! owning their own lifecycle.

pub mod params;

pub use params::{BrowserContext, SessionParams};

use serde::Deserialize;
use serde_json::json;

use crate::context::ContextManager;
use crate::error::{Error, Result};
use crate::rpc::{ApiResult, RpcClient};
use crate::tool::{McpTool, ToolDispatcher, VpcEndpoint};

/// A live MCP session. Once [`crate::Client::delete`] has been called, any
/// further operation through this handle is invalid — the spec imposes no
/// programmatic poisoning, so that invariant is the caller's to keep.
#[derive(Clone)]
pub struct Session {
    pub session_id: String,
    pub resource_url: Option<String>,
    pub image_id: Option<String>,
    pub is_vpc: bool,
    pub network_interface_ip: Option<String>,
    pub http_port: Option<u32>,
    pub token: Option<String>,
    pub enable_browser_replay: bool,
    pub record_context_id: Option<String>,
    pub file_transfer_context_id: Option<String>,

    dispatcher: ToolDispatcher,
    context_manager: ContextManager,
    rpc: RpcClient,
}

impl Session {
    #[allow(clippy::too_many_arguments)]
    pub(crate) fn new(
        rpc: RpcClient,
        session_id: String,
        resource_url: Option<String>,
        image_id: Option<String>,
        is_vpc: bool,
        network_interface_ip: Option<String>,
        http_port: Option<u32>,
        token: Option<String>,
        enable_browser_replay: bool,
        record_context_id: Option<String>,
        file_transfer_context_id: Option<String>,
        mcp_tools: Vec<McpTool>,
    ) -> Self {
        let vpc = if is_vpc {
            match (network_interface_ip.clone(), http_port, token.clone()) {
                (Some(ip), Some(port), Some(token)) => Some(VpcEndpoint {
                    network_interface_ip: ip,
                    http_port: port,
                    token,
                }),
                _ => None,
            }
        } else {
            None
        };

        let dispatcher = ToolDispatcher::new(rpc.clone(), session_id.clone(), is_vpc, vpc, mcp_tools);
        let context_manager = ContextManager::new(rpc.clone(), session_id.clone());

        Self {
            session_id,
            resource_url,
            image_id,
            is_vpc,
            network_interface_ip,
            http_port,
            token,
            enable_browser_replay,
            record_context_id,
            file_transfer_context_id,
            dispatcher,
            context_manager,
            rpc,
        }
    }

    pub fn dispatcher(&self) -> &ToolDispatcher {
        &self.dispatcher
    }

    pub fn context(&self) -> &ContextManager {
        &self.context_manager
    }

    pub(crate) fn rpc(&self) -> &RpcClient {
        &self.rpc
    }

    /// `setLabels` rejects anything but a non-empty string→string mapping.
    pub async fn set_labels(
        &self,
        labels: std::collections::HashMap<String, String>,
    ) -> Result<ApiResult<()>> {
        params::validate_labels(&labels)?;
        let envelope = self
            .rpc
            .call("SetLabel", json!({ "SessionId": self.session_id, "Labels": labels }))
            .await?;
        let request_id = envelope.request_id.clone();
        Ok(match envelope.into_api_error() {
            Ok(_) => ApiResult::ok((), request_id),
            Err(e) => ApiResult::err(e.to_string(), request_id),
        })
    }

    pub async fn get_labels(&self) -> Result<ApiResult<std::collections::HashMap<String, String>>> {
        let envelope = self
            .rpc
            .call("GetLabel", json!({ "SessionId": self.session_id }))
            .await?;
        let request_id = envelope.request_id.clone();
        let envelope = match envelope.into_api_error() {
            Ok(e) => e,
            Err(e) => return Ok(ApiResult::err(e.to_string(), request_id)),
        };
        let labels = serde_json::from_value(envelope.data.get("labels").cloned().unwrap_or_default())
            .unwrap_or_default();
        Ok(ApiResult::ok(labels, request_id))
    }

    /// `GetLink` — `port`, when supplied, must fall in `[30100, 30199]`.
    pub async fn get_link(
        &self,
        protocol_type: Option<&str>,
        port: Option<u32>,
    ) -> Result<ApiResult<String>> {
        if let Some(p) = port {
            if !(30100..=30199).contains(&p) {
                return Err(Error::validation(format!(
                    "port must be in [30100, 30199], got {p}"
                )));
            }
        }
        let envelope = self
            .rpc
            .call(
                "GetLink",
                json!({
                    "SessionId": self.session_id,
                    "ProtocolType": protocol_type,
                    "Port": port,
                }),
            )
            .await?;
        let request_id = envelope.request_id.clone();
        let envelope = match envelope.into_api_error() {
            Ok(e) => e,
            Err(e) => return Ok(ApiResult::err(e.to_string(), request_id)),
        };
        let link = envelope
            .data
            .get("link")
            .and_then(|v| v.as_str())
            .unwrap_or_default()
            .to_string();
        Ok(ApiResult::ok(link, request_id))
    }
}

#[derive(Debug, Clone, Deserialize)]
pub(crate) struct GetSessionResponse {
    #[serde(rename = "sessionId")]
    pub session_id: String,
    #[serde(rename = "resourceUrl", default)]
    pub resource_url: Option<String>,
    #[serde(default)]
    pub status: Option<String>,
    #[serde(rename = "vpcResource", default)]
    pub vpc_resource: bool,
    #[serde(rename = "networkInterfaceIp", default)]
    pub network_interface_ip: Option<String>,
    #[serde(rename = "httpPort", default)]
    pub http_port: Option<u32>,
    #[serde(default)]
    pub token: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    fn test_session() -> Session {
        let rpc = RpcClient::new("127.0.0.1:1".to_string(), "k".to_string(), Duration::from_millis(50))
            .unwrap();
        Session::new(
            rpc,
            "session-abc".to_string(),
            None,
            None,
            true,
            None,
            None,
            None,
            false,
            None,
            None,
            vec![],
        )
    }

    #[test]
    fn incomplete_vpc_config_leaves_dispatcher_without_endpoint() {
        // is_vpc=true but no ip/port/token supplied: Session::new must not
        // fabricate a VpcEndpoint, so later dispatch fails cleanly instead
        // of reaching an invalid address.
        let session = test_session();
        assert!(session.is_vpc);
        assert!(session.network_interface_ip.is_none());
    }

    #[tokio::test]
    async fn get_link_rejects_out_of_range_ports() {
        let session = test_session();
        assert!(session.get_link(None, Some(30099)).await.is_err());
        assert!(session.get_link(None, Some(30200)).await.is_err());
    }
}
