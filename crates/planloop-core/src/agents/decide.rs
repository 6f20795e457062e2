// Copyright (c) 2024-2026 Martin Schröder <info@swedishembedded.com>
//
// SPDX-License-Identifier: MIT
use std::sync::Arc;

use async_trait::async_trait;
use planloop_model::{ActionPlanItem, AgentBackend, DecideRequest};
use tracing::debug;

use super::{reported, DecideAgent, Decision};
use crate::error::AgentError;
use crate::events::{AgentEventPayload, EventKind, RoundEmitter};
use crate::phase::Phase;
use crate::todo::TodoList;

pub struct Decider {
    backend: Arc<dyn AgentBackend>,
}

impl Decider {
    pub fn new(backend: Arc<dyn AgentBackend>) -> Self {
        Self { backend }
    }
}

#[async_trait]
impl DecideAgent for Decider {
    async fn decide(
        &self,
        todo: &TodoList,
        plan: &[ActionPlanItem],
        context: &str,
        results: &str,
        events: &RoundEmitter,
    ) -> Result<Decision, AgentError> {
        events
            .emit(
                EventKind::DecideStart,
                AgentEventPayload {
                    context: Some(context.to_string()),
                    todo: Some(todo.clone()),
                    plan: Some(plan.to_vec()),
                    ..Default::default()
                },
            )
            .await;

        let req = DecideRequest {
            todo_list: todo.to_wire(),
            plan: plan.to_vec(),
            context: context.to_string(),
            results: results.to_string(),
        };
        debug!(backend = self.backend.name(), "requesting phase decision");
        let resp = match self.backend.decide(&req).await {
            Ok(r) => r,
            Err(e) => return Err(reported(events, EventKind::DecideError, e).await),
        };

        if !resp.success {
            let msg = resp.message.unwrap_or_else(|| "no message".into());
            return Err(reported(events, EventKind::DecideError, AgentError::DecideFailed(msg)).await);
        }
        let raw = resp.decision.unwrap_or_default();
        let phase = match raw.parse::<Phase>() {
            Ok(p) => p,
            Err(other) => return Err(reported(events, EventKind::DecideError, AgentError::UnknownDecision(other)).await),
        };
        let reason = resp.reason.unwrap_or_default();

        events
            .emit(
                EventKind::DecideComplete,
                AgentEventPayload { decision: Some(phase), reason: Some(reason.clone()), ..Default::default() },
            )
            .await;
        Ok(Decision { phase, reason })
    }
}
