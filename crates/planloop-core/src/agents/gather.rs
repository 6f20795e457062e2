// Copyright (c) 2024-2026 Martin Schröder <info@swedishembedded.com>
//
// SPDX-License-Identifier: MIT
use std::sync::Arc;

use async_trait::async_trait;
use planloop_model::{AgentBackend, PromptRequest};
use planloop_tools::{FunctionDispatcher, IdMapping};
use tracing::debug;

use super::{function_failed, reported, GatherAgent, GatherOutcome};
use crate::error::AgentError;
use crate::events::{AgentEventPayload, EventKind, RoundEmitter};
use crate::todo::TodoList;

/// Asks the gather endpoint what to look up, runs the lookups, and returns
/// their formatted results followed by the model's own text.
///
/// `new_info` starts with a newline when it is not empty so it reads as a
/// separate paragraph once appended to the context.
pub struct Gatherer {
    backend: Arc<dyn AgentBackend>,
    dispatcher: FunctionDispatcher,
}

impl Gatherer {
    pub fn new(backend: Arc<dyn AgentBackend>, dispatcher: FunctionDispatcher) -> Self {
        Self { backend, dispatcher }
    }
}

#[async_trait]
impl GatherAgent for Gatherer {
    async fn gather(
        &self,
        context: &str,
        todo: &TodoList,
        mapping: &IdMapping,
        events: &RoundEmitter,
    ) -> Result<GatherOutcome, AgentError> {
        events
            .emit(
                EventKind::GatherStart,
                AgentEventPayload { context: Some(context.to_string()), todo: Some(todo.clone()), ..Default::default() },
            )
            .await;

        let req = PromptRequest { context: context.to_string(), todo_list: todo.to_wire() };
        let msg = match self.backend.gather(&req).await {
            Ok(m) => m,
            Err(e) => return Err(reported(events, EventKind::GatherError, e).await),
        };
        debug!(tool_calls = msg.tool_calls.len(), "gather reply received");

        let mut mapping = mapping.clone();
        let mut parts: Vec<String> = Vec::new();
        for call in &msg.tool_calls {
            let name = call.function.name.as_str();
            events
                .emit(
                    EventKind::FunctionCall,
                    AgentEventPayload { function: Some(name.to_string()), ..Default::default() },
                )
                .await;
            let args = match call.function.parsed_arguments() {
                Ok(a) => a,
                Err(e) => {
                    function_failed(events, name, &format!("arguments are not valid JSON: {e}")).await;
                    continue;
                }
            };
            match self.dispatcher.execute_named(name, args.as_ref(), &mut mapping).await {
                Ok(out) => parts.push(out.summary),
                Err(e) => function_failed(events, name, &e.to_string()).await,
            }
        }
        if let Some(text) = msg.content.as_deref().map(str::trim).filter(|t| !t.is_empty()) {
            parts.push(text.to_string());
        }

        let new_info = if parts.is_empty() { String::new() } else { format!("\n{}", parts.join("\n")) };
        events
            .emit(
                EventKind::GatherComplete,
                AgentEventPayload { new_info: Some(new_info.clone()), ..Default::default() },
            )
            .await;
        Ok(GatherOutcome { new_info, mapping })
    }
}
