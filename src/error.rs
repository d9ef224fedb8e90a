// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0

//! Error taxonomy for the AgentBay SDK.
//!
//! Most public methods do not propagate [`Error`] on *expected* failures —
//! an API-level rejection, a tool returning `isError`, a client-side
//! validation failure — those are reported through a result envelope
//! (see [`crate::rpc::ApiResult`]) so callers can branch on `success`
//! without `match`ing an error type. [`Error`] is reserved for programming
//! errors (missing required constructor input) and unexpected transport
//! failures that a caller cannot reasonably recover from inline.

use thiserror::Error as ThisError;

pub type Result<T> = std::result::Result<T, Error>;

#[derive(Debug, ThisError)]
pub enum Error {
    /// Missing or invalid API key at construction time.
    #[error("authentication failure: {message}")]
    Authentication { message: String },

    /// Network error, timeout, or any failure below the HTTP/RPC layer.
    #[error("transport failure: {message}")]
    Transport { message: String },

    /// Well-formed response with `success=false`; carries the server's code.
    #[error("[{code}] {message}")]
    Api { code: String, message: String },

    /// `ReleaseMcpSession`/`GetSession` reported `InvalidMcpSession.NotFound`.
    #[error("session not found: {session_id}")]
    NotFound { session_id: String },

    /// Dispatcher returned `isError=true`.
    #[error("tool error: {message}")]
    Tool { message: String },

    /// Client-side precondition rejected before any RPC was issued.
    #[error("validation failure: {message}")]
    Validation { message: String },

    /// Polling exhausted its retry budget before reaching a terminal state.
    #[error("operation timed out after {elapsed_ms}ms")]
    Timeout { elapsed_ms: u64 },
}

impl Error {
    pub fn validation(message: impl Into<String>) -> Self {
        Error::Validation {
            message: message.into(),
        }
    }

    pub fn transport(message: impl Into<String>) -> Self {
        Error::Transport {
            message: message.into(),
        }
    }

    pub fn api(code: impl Into<String>, message: impl Into<String>) -> Self {
        Error::Api {
            code: code.into(),
            message: message.into(),
        }
    }

    /// `true` for the one API code the spec distinguishes from a generic
    /// [`Error::Api`] for logging purposes (info, no stack trace).
    pub fn is_not_found_code(code: &str) -> bool {
        code == "InvalidMcpSession.NotFound"
    }
}

impl From<reqwest::Error> for Error {
    fn from(e: reqwest::Error) -> Self {
        Error::Transport {
            message: e.to_string(),
        }
    }
}

impl From<serde_json::Error> for Error {
    fn from(e: serde_json::Error) -> Self {
        Error::Transport {
            message: format!("malformed JSON: {e}"),
        }
    }
}
