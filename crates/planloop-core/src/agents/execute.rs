// Copyright (c) 2024-2026 Martin Schröder <info@swedishembedded.com>
//
// SPDX-License-Identifier: MIT
use std::sync::Arc;

use async_trait::async_trait;
use planloop_model::{ActionPlanItem, AgentBackend, CheckResultsRequest, ExecutionResult, TaskResult};
use planloop_tools::{FunctionDispatcher, IdMapping};
use tracing::debug;

use super::{function_failed, reported, ExecuteAgent, ExecutionOutcome};
use crate::error::AgentError;
use crate::events::{AgentEventPayload, EventKind, RoundEmitter};
use crate::todo::TodoList;

/// Runs every planned action in order, then asks the check-results
/// endpoint which todo items the actions satisfied.
///
/// A failing action is recorded with `success: false` and the rest of the
/// plan still runs.  Mutations that succeeded stay applied even when the
/// check-results call fails afterwards.
pub struct Executor {
    backend: Arc<dyn AgentBackend>,
    dispatcher: FunctionDispatcher,
}

impl Executor {
    pub fn new(backend: Arc<dyn AgentBackend>, dispatcher: FunctionDispatcher) -> Self {
        Self { backend, dispatcher }
    }
}

#[async_trait]
impl ExecuteAgent for Executor {
    async fn execute(
        &self,
        todo: &TodoList,
        plan: &[ActionPlanItem],
        mapping: &IdMapping,
        events: &RoundEmitter,
    ) -> Result<ExecutionOutcome, AgentError> {
        events
            .emit(
                EventKind::ExecuteStart,
                AgentEventPayload { todo: Some(todo.clone()), plan: Some(plan.to_vec()), ..Default::default() },
            )
            .await;

        let mut mapping = mapping.clone();
        let mut actions = Vec::with_capacity(plan.len());
        for item in plan {
            events
                .emit(
                    EventKind::FunctionCall,
                    AgentEventPayload { function: Some(item.name.clone()), ..Default::default() },
                )
                .await;
            let result = match self.dispatcher.execute_named(&item.name, item.parameters.as_ref(), &mut mapping).await {
                Ok(out) => ExecutionResult { name: item.name.clone(), success: true, output: out.summary },
                Err(e) => {
                    function_failed(events, &item.name, &e.to_string()).await;
                    ExecutionResult { name: item.name.clone(), success: false, output: e.to_string() }
                }
            };
            actions.push(result);
        }
        debug!(
            actions = actions.len(),
            failed = actions.iter().filter(|a| !a.success).count(),
            "plan executed"
        );

        let req = CheckResultsRequest { todo_list: todo.to_wire(), execution_results: actions.clone() };
        let results = match self.backend.check_results(&req).await {
            Ok(r) => r,
            Err(e) => return Err(reported(events, EventKind::ExecuteError, e).await),
        };

        events
            .emit(
                EventKind::ExecuteComplete,
                AgentEventPayload {
                    execution_results: Some(actions.clone()),
                    results: Some(verdict_lines(&results)),
                    ..Default::default()
                },
            )
            .await;
        Ok(ExecutionOutcome { actions, results, mapping })
    }
}

fn verdict_lines(results: &[TaskResult]) -> String {
    results
        .iter()
        .map(|r| format!("{} {}", if r.passed() { "✓" } else { "✗" }, r.task))
        .collect::<Vec<_>>()
        .join("\n")
}
