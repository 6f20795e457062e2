// Copyright (c) 2024-2026 Martin Schröder <info@swedishembedded.com>
//
// SPDX-License-Identifier: MIT
mod agents;
mod coordinator;
mod error;
mod events;
mod phase;
mod todo;

pub use agents::{
    Agents, CodeOutcome, CodeRunner, DecideAgent, Decider, Decision, ExecuteAgent, ExecuteCodeAgent,
    ExecutionOutcome, Executor, GatherAgent, GatherOutcome, Gatherer, PlanAgent, Planner,
};
pub use coordinator::{Coordinator, CoordinatorOptions, RunOutcome, RunSummary, StopHandle};
pub use error::AgentError;
pub use events::{AgentEvent, AgentEventPayload, EventKind, RoundEmitter};
pub use phase::Phase;
pub use todo::TodoList;
