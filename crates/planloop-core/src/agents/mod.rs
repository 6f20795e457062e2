// Copyright (c) 2024-2026 Martin Schröder <info@swedishembedded.com>
//
// SPDX-License-Identifier: MIT
//! The five sub-agents a round can delegate to.
//!
//! Each is a trait with a single async operation so the coordinator can be
//! driven by stubs in tests.  The remote-backed implementations wrap one
//! [`AgentBackend`] call each, dispatch any returned tool calls, and report
//! their lifecycle through the [`RoundEmitter`] they are handed.  They keep
//! no state between calls; everything they produce is returned to the
//! coordinator as a delta.

use std::sync::Arc;

use async_trait::async_trait;
use planloop_model::{ActionPlanItem, AgentBackend, ExecutionResult, TaskResult};
use planloop_tools::{FunctionDispatcher, IdMapping, Sandbox};

use crate::error::AgentError;
use crate::events::{AgentEventPayload, EventKind, RoundEmitter};
use crate::phase::Phase;
use crate::todo::TodoList;

mod decide;
mod execute;
mod execute_code;
mod gather;
mod plan;

pub use decide::Decider;
pub use execute::Executor;
pub use execute_code::CodeRunner;
pub use gather::Gatherer;
pub use plan::Planner;

#[derive(Debug, Clone, PartialEq)]
pub struct Decision {
    pub phase: Phase,
    pub reason: String,
}

#[derive(Debug, Clone)]
pub struct GatherOutcome {
    /// Text the coordinator appends to its context verbatim.
    pub new_info: String,
    pub mapping: IdMapping,
}

#[derive(Debug, Clone)]
pub struct ExecutionOutcome {
    /// One entry per planned action, in plan order.
    pub actions: Vec<ExecutionResult>,
    /// Per-task verdicts from the check-results call.
    pub results: Vec<TaskResult>,
    pub mapping: IdMapping,
}

#[derive(Debug, Clone)]
pub struct CodeOutcome {
    pub new_info: String,
    pub mapping: IdMapping,
}

#[async_trait]
pub trait DecideAgent: Send + Sync {
    async fn decide(
        &self,
        todo: &TodoList,
        plan: &[ActionPlanItem],
        context: &str,
        results: &str,
        events: &RoundEmitter,
    ) -> Result<Decision, AgentError>;
}

#[async_trait]
pub trait GatherAgent: Send + Sync {
    async fn gather(
        &self,
        context: &str,
        todo: &TodoList,
        mapping: &IdMapping,
        events: &RoundEmitter,
    ) -> Result<GatherOutcome, AgentError>;
}

#[async_trait]
pub trait PlanAgent: Send + Sync {
    async fn build_plan(
        &self,
        context: &str,
        todo: &TodoList,
        events: &RoundEmitter,
    ) -> Result<Vec<ActionPlanItem>, AgentError>;
}

#[async_trait]
pub trait ExecuteAgent: Send + Sync {
    async fn execute(
        &self,
        todo: &TodoList,
        plan: &[ActionPlanItem],
        mapping: &IdMapping,
        events: &RoundEmitter,
    ) -> Result<ExecutionOutcome, AgentError>;
}

#[async_trait]
pub trait ExecuteCodeAgent: Send + Sync {
    async fn execute_code(
        &self,
        context: &str,
        todo: &TodoList,
        mapping: &IdMapping,
        events: &RoundEmitter,
    ) -> Result<CodeOutcome, AgentError>;
}

/// The set of sub-agents a coordinator delegates to.
#[derive(Clone)]
pub struct Agents {
    pub decide: Arc<dyn DecideAgent>,
    pub gather: Arc<dyn GatherAgent>,
    pub plan: Arc<dyn PlanAgent>,
    pub execute: Arc<dyn ExecuteAgent>,
    pub execute_code: Arc<dyn ExecuteCodeAgent>,
}

impl Agents {
    /// All five agents talking to `backend`, dispatching tool calls through
    /// `dispatcher` and running generated code in `sandbox`.
    pub fn remote(backend: Arc<dyn AgentBackend>, dispatcher: FunctionDispatcher, sandbox: Sandbox) -> Self {
        Self {
            decide: Arc::new(Decider::new(backend.clone())),
            gather: Arc::new(Gatherer::new(backend.clone(), dispatcher.clone())),
            plan: Arc::new(Planner::new(backend.clone())),
            execute: Arc::new(Executor::new(backend.clone(), dispatcher)),
            execute_code: Arc::new(CodeRunner::new(backend, sandbox)),
        }
    }
}

/// Emit `kind` carrying the error text and hand the error back.
pub(crate) async fn reported(events: &RoundEmitter, kind: EventKind, err: impl Into<AgentError>) -> AgentError {
    let err = err.into();
    events
        .emit(kind, AgentEventPayload { error: Some(err.to_string()), ..Default::default() })
        .await;
    err
}

/// Report a per-call failure without ending the batch.
pub(crate) async fn function_failed(events: &RoundEmitter, function: &str, error: &str) {
    tracing::warn!(function, "tool call failed: {error}");
    events
        .emit(
            EventKind::FunctionCallError,
            AgentEventPayload { function: Some(function.to_string()), error: Some(error.to_string()), ..Default::default() },
        )
        .await;
}
