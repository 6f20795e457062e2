// Copyright (c) 2024-2026 Martin Schröder <info@swedishembedded.com>
//
// SPDX-License-Identifier: MIT
use std::sync::Arc;

use async_trait::async_trait;
use planloop_model::{ActionPlanItem, AgentBackend, PromptRequest};
use tracing::debug;

use super::{reported, PlanAgent};
use crate::error::AgentError;
use crate::events::{AgentEventPayload, EventKind, RoundEmitter};
use crate::todo::TodoList;

/// Turns the plan endpoint's tool calls into an action plan, one item per
/// call, name and arguments unchanged.
pub struct Planner {
    backend: Arc<dyn AgentBackend>,
}

impl Planner {
    pub fn new(backend: Arc<dyn AgentBackend>) -> Self {
        Self { backend }
    }
}

#[async_trait]
impl PlanAgent for Planner {
    async fn build_plan(
        &self,
        context: &str,
        todo: &TodoList,
        events: &RoundEmitter,
    ) -> Result<Vec<ActionPlanItem>, AgentError> {
        events
            .emit(
                EventKind::PlanBuildStart,
                AgentEventPayload { context: Some(context.to_string()), todo: Some(todo.clone()), ..Default::default() },
            )
            .await;

        let req = PromptRequest { context: context.to_string(), todo_list: todo.to_wire() };
        let msg = match self.backend.build_plan(&req).await {
            Ok(m) => m,
            Err(e) => return Err(reported(events, EventKind::PlanBuildError, e).await),
        };

        let mut plan = Vec::with_capacity(msg.tool_calls.len());
        for call in msg.tool_calls {
            let parameters = match call.function.parsed_arguments() {
                Ok(p) => p,
                Err(e) => {
                    let err = AgentError::MalformedToolCall { name: call.function.name, reason: e.to_string() };
                    return Err(reported(events, EventKind::PlanBuildError, err).await);
                }
            };
            plan.push(ActionPlanItem::new(call.function.name, parameters));
        }
        debug!(actions = plan.len(), "plan built");

        events
            .emit(EventKind::PlanBuildComplete, AgentEventPayload { plan: Some(plan.clone()), ..Default::default() })
            .await;
        Ok(plan)
    }
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::AtomicU32;

    use planloop_model::{AssistantMessage, ScriptedBackend};
    use serde_json::json;
    use tokio::sync::mpsc;

    use super::*;

    fn emitter() -> (RoundEmitter, mpsc::Receiver<crate::events::AgentEvent>) {
        let (tx, rx) = mpsc::channel(16);
        (RoundEmitter::new(tx, Arc::new(AtomicU32::new(1))), rx)
    }

    #[tokio::test]
    async fn one_item_per_tool_call() {
        let backend = ScriptedBackend::new().plan(
            AssistantMessage::text("Two steps.")
                .with_tool_call("create_task", json!(r#"{"text":"gym","date":"2026-10-19"}"#))
                .with_tool_call("complete_task", json!({ "id": 2 })),
        );
        let (events, mut rx) = emitter();
        let plan = Planner::new(Arc::new(backend))
            .build_plan("ctx", &TodoList::from_tasks(["gym"]), &events)
            .await
            .unwrap();
        assert_eq!(
            plan,
            vec![
                ActionPlanItem::new("create_task", Some(json!({ "text": "gym", "date": "2026-10-19" }))),
                ActionPlanItem::new("complete_task", Some(json!({ "id": 2 }))),
            ]
        );
        assert_eq!(rx.recv().await.unwrap().kind, EventKind::PlanBuildStart);
        let done = rx.recv().await.unwrap();
        assert_eq!(done.kind, EventKind::PlanBuildComplete);
        assert_eq!(done.payload.plan.map(|p| p.len()), Some(2));
    }

    #[tokio::test]
    async fn no_tool_calls_is_an_empty_plan() {
        let backend = ScriptedBackend::new().plan(AssistantMessage::text("Nothing to do."));
        let (events, _rx) = emitter();
        let plan = Planner::new(Arc::new(backend)).build_plan("ctx", &TodoList::new(), &events).await.unwrap();
        assert!(plan.is_empty());
    }

    #[tokio::test]
    async fn malformed_arguments_fail_the_plan() {
        let backend = ScriptedBackend::new().plan(AssistantMessage::default().with_tool_call("create_task", json!("{oops")));
        let (events, mut rx) = emitter();
        let err = Planner::new(Arc::new(backend)).build_plan("ctx", &TodoList::new(), &events).await.unwrap_err();
        assert!(matches!(err, AgentError::MalformedToolCall { ref name, .. } if name == "create_task"));
        rx.recv().await.unwrap();
        assert_eq!(rx.recv().await.unwrap().kind, EventKind::PlanBuildError);
    }
}
