// Copyright (c) 2024-2026 Martin Schröder <info@swedishembedded.com>
//
// SPDX-License-Identifier: MIT
use thiserror::Error;

/// Failure of a single dispatched task function.
///
/// These are absorbed per call by the agents and reported as events; they
/// never end a run on their own.
#[derive(Debug, Error)]
pub enum ToolError {
    #[error("unknown function: {0}")]
    UnknownFunction(String),

    #[error("invalid arguments for {name}: {reason}")]
    InvalidArguments { name: String, reason: String },

    #[error("no task is registered under short id {0}")]
    UnknownShortId(u32),

    #[error("task not found: {0}")]
    NotFound(String),

    #[error("invalid date '{0}' (expected YYYY-MM-DD)")]
    InvalidDate(String),

    #[error("task store error: {0}")]
    Store(String),
}

/// Failure of a generated script inside the sandbox.
#[derive(Debug, Error)]
pub enum SandboxError {
    #[error("script did not compile: {0}")]
    Compile(String),

    #[error("script failed: {0}")]
    Runtime(String),

    #[error("script exceeded the {0} ms time limit")]
    Timeout(u64),

    #[error("script produced more than {0} bytes of output")]
    OutputLimit(usize),

    #[error("sandbox worker failed: {0}")]
    Worker(String),
}
