// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0

//! AgentBay Rust SDK
//!
//! Client-side control plane for the AgentBay managed cloud-session (MCP)
//! service. A program links this crate and drives remote sessions: create
//! one, attach persistent context volumes, upload/download files through
//! presigned URLs, invoke remote tools, watch a remote directory for
//! changes, pause/resume, then release.
//!
//! The entry point is [`Client`]; everything else hangs off a [`Client`] or
//! a [`session::Session`] it returns.

pub mod capabilities;
pub mod config;
pub mod context;
pub mod error;
pub mod extension;
pub mod rpc;
pub mod session;
pub mod tool;
pub mod transfer;
pub mod watcher;

mod client;

pub use client::Client;
pub use config::Config;
pub use error::{Error, Result};
pub use session::{Session, SessionParams};

/// Initialize a `tracing` subscriber from `RUST_LOG`/`LOG_LEVEL`, falling back
/// to `level`. Intended for binaries and tests embedding this SDK; library
/// code never installs a global subscriber itself.
pub fn init_tracing(level: &str) -> Result<()> {
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .or_else(|_| tracing_subscriber::EnvFilter::try_new(level))
        .map_err(|e| Error::Validation {
            message: format!("invalid log filter: {e}"),
        })?;

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .compact()
        .try_init()
        .map_err(|e| Error::Validation {
            message: format!("tracing already initialized: {e}"),
        })
}
