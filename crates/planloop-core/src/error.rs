// Copyright (c) 2024-2026 Martin Schröder <info@swedishembedded.com>
//
// SPDX-License-Identifier: MIT
use planloop_model::BackendError;
use planloop_tools::SandboxError;
use thiserror::Error;

/// Errors that end a run.  Per-call tool failures never show up here; they
/// are reported as `functionCallError` events and the batch continues.
#[derive(Debug, Error)]
pub enum AgentError {
    #[error(transparent)]
    Backend(#[from] BackendError),

    #[error("decide reported failure: {0}")]
    DecideFailed(String),

    #[error("decide returned unknown phase {0:?}")]
    UnknownDecision(String),

    #[error("malformed tool call `{name}`: {reason}")]
    MalformedToolCall { name: String, reason: String },

    #[error("generated code failed: {0}")]
    Sandbox(#[from] SandboxError),
}
