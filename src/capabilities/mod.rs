// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0

//! Thin, typed wrappers over [`crate::tool::ToolDispatcher::call_tool`].
//!
//! spec.md places the individual tool wrappers out of scope beyond the
//! dispatcher interface (§1); this module stays deliberately small — a
//! representative function per common capability, not a full per-tool API.
//! `sendKey`'s normalization table is the one piece of wrapper behavior
//! spec.md pulls into normative scope (§6), and is implemented in full.

pub mod command;
pub mod computer;
pub mod filesystem;
