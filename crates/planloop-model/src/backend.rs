// Copyright (c) 2024-2026 Martin Schröder <info@swedishembedded.com>
//
// SPDX-License-Identifier: MIT
use async_trait::async_trait;

use crate::{
    AssistantMessage, BackendError, CheckResultsRequest, DecideRequest, DecideResponse, PromptRequest,
    TaskResult, WriteCodeRequest, WriteCodeResponse,
};

/// The remote side of a planning run: one method per agent endpoint.
///
/// Implementations must not retry; a failed call is reported as-is and the
/// caller decides what to do with it.
#[async_trait]
pub trait AgentBackend: Send + Sync {
    /// Human-readable backend name for logs and status display.
    fn name(&self) -> &str;

    /// Ask which phase the next round should run.
    async fn decide(&self, req: &DecideRequest) -> Result<DecideResponse, BackendError>;

    /// Ask for information-gathering tool calls and/or free text.
    async fn gather(&self, req: &PromptRequest) -> Result<AssistantMessage, BackendError>;

    /// Ask for the action plan, one tool call per action.
    async fn build_plan(&self, req: &PromptRequest) -> Result<AssistantMessage, BackendError>;

    /// Ask which todo items the executed actions satisfied.
    async fn check_results(&self, req: &CheckResultsRequest) -> Result<Vec<TaskResult>, BackendError>;

    /// Ask for a script (and its pseudo-code) that completes the todo list.
    async fn write_code(&self, req: &WriteCodeRequest) -> Result<WriteCodeResponse, BackendError>;
}
