// Copyright (c) 2024-2026 Martin Schröder <info@swedishembedded.com>
//
// SPDX-License-Identifier: MIT
use std::sync::Arc;

use async_trait::async_trait;
use planloop_model::{AgentBackend, WriteCodeRequest};
use planloop_tools::{IdMapping, Sandbox};
use tracing::debug;

use super::{reported, CodeOutcome, ExecuteCodeAgent};
use crate::error::AgentError;
use crate::events::{AgentEventPayload, EventKind, RoundEmitter};
use crate::todo::TodoList;

/// Fetches a script from the write-code endpoint and runs it in the sandbox.
pub struct CodeRunner {
    backend: Arc<dyn AgentBackend>,
    sandbox: Sandbox,
}

impl CodeRunner {
    pub fn new(backend: Arc<dyn AgentBackend>, sandbox: Sandbox) -> Self {
        Self { backend, sandbox }
    }
}

#[async_trait]
impl ExecuteCodeAgent for CodeRunner {
    async fn execute_code(
        &self,
        context: &str,
        todo: &TodoList,
        mapping: &IdMapping,
        events: &RoundEmitter,
    ) -> Result<CodeOutcome, AgentError> {
        events
            .emit(
                EventKind::ExecuteCodeStart,
                AgentEventPayload { context: Some(context.to_string()), todo: Some(todo.clone()), ..Default::default() },
            )
            .await;

        let req = WriteCodeRequest { todo_list: todo.to_wire(), context: context.to_string() };
        let generated = match self.backend.write_code(&req).await {
            Ok(g) => g,
            Err(e) => return Err(reported(events, EventKind::ExecuteCodeError, e).await),
        };
        events
            .emit(
                EventKind::PseudoCode,
                AgentEventPayload { pseudo_code: Some(generated.pseudo_code.clone()), ..Default::default() },
            )
            .await;
        events
            .emit(EventKind::Code, AgentEventPayload { code: Some(generated.code.clone()), ..Default::default() })
            .await;

        debug!(bytes = generated.code.len(), "running generated code");
        let run = match self.sandbox.run(&generated.code, mapping.clone()).await {
            Ok(r) => r,
            Err(e) => return Err(reported(events, EventKind::ExecuteCodeError, e).await),
        };

        events
            .emit(
                EventKind::ExecuteCodeComplete,
                AgentEventPayload { new_info: Some(run.output.clone()), ..Default::default() },
            )
            .await;
        Ok(CodeOutcome { new_info: run.output, mapping: run.mapping })
    }
}
