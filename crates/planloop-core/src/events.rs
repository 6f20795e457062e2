// Copyright (c) 2024-2026 Martin Schröder <info@swedishembedded.com>
//
// SPDX-License-Identifier: MIT
use std::fmt;
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::Arc;

use serde::{Serialize, Serializer};
use tokio::sync::mpsc;
use tracing::trace;

use planloop_model::{ActionPlanItem, ExecutionResult};

use crate::phase::Phase;
use crate::todo::TodoList;

/// Every event the coordinator emits, named as consumers see them.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EventKind {
    RoundStart,
    PhaseDecision,
    RoundEnd,
    DecideStart,
    DecideComplete,
    DecideError,
    GatherStart,
    GatherComplete,
    GatherError,
    PlanBuildStart,
    PlanBuildComplete,
    PlanBuildError,
    ExecuteStart,
    ExecuteComplete,
    ExecuteError,
    ExecuteCodeStart,
    ExecuteCodeComplete,
    ExecuteCodeError,
    PseudoCode,
    Code,
    FunctionCall,
    FunctionCallError,
    Stop,
    Finished,
    Error,
}

impl EventKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            EventKind::RoundStart => "roundStart",
            EventKind::PhaseDecision => "phaseDecision",
            EventKind::RoundEnd => "roundEnd",
            EventKind::DecideStart => "decideStart",
            EventKind::DecideComplete => "decideComplete",
            EventKind::DecideError => "decideError",
            EventKind::GatherStart => "gatherStart",
            EventKind::GatherComplete => "gatherComplete",
            EventKind::GatherError => "gatherError",
            EventKind::PlanBuildStart => "planBuildStart",
            EventKind::PlanBuildComplete => "planBuildComplete",
            EventKind::PlanBuildError => "planBuildError",
            EventKind::ExecuteStart => "executeStart",
            EventKind::ExecuteComplete => "executeComplete",
            EventKind::ExecuteError => "executeError",
            EventKind::ExecuteCodeStart => "executeCodeStart",
            EventKind::ExecuteCodeComplete => "executeCodeComplete",
            EventKind::ExecuteCodeError => "executeCodeError",
            EventKind::PseudoCode => "pseudoCode",
            EventKind::Code => "code",
            EventKind::FunctionCall => "functionCall",
            EventKind::FunctionCallError => "functionCallError",
            EventKind::Stop => "STOP",
            EventKind::Finished => "finished",
            EventKind::Error => "error",
        }
    }

    /// `*Error`, `functionCallError` and `error`.
    pub fn is_error(&self) -> bool {
        matches!(
            self,
            EventKind::DecideError
                | EventKind::GatherError
                | EventKind::PlanBuildError
                | EventKind::ExecuteError
                | EventKind::ExecuteCodeError
                | EventKind::FunctionCallError
                | EventKind::Error
        )
    }
}

impl fmt::Display for EventKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl Serialize for EventKind {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(self.as_str())
    }
}

/// Round-stamped data carried by an event.  Which optional fields are set
/// depends on the event kind.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AgentEventPayload {
    pub round: u32,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub context: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub todo: Option<TodoList>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub plan: Option<Vec<ActionPlanItem>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub pseudo_code: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub code: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub decision: Option<Phase>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub reason: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub new_info: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub execution_results: Option<Vec<ExecutionResult>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    /// Results so far on `roundStart`; the per-task verdicts on `executeComplete`.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub results: Option<String>,
    /// Function name on `functionCall` / `functionCallError`.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub function: Option<String>,
}

/// Events emitted by the coordinator during a run.  Serializes as
/// `{"event": "<name>", ...payload}`.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct AgentEvent {
    #[serde(rename = "event")]
    pub kind: EventKind,
    #[serde(flatten)]
    pub payload: AgentEventPayload,
}

impl AgentEvent {
    pub fn round(&self) -> u32 {
        self.payload.round
    }
}

/// Sends events stamped with the coordinator's current round.
///
/// The round is read when the event is sent, not when the emitter was
/// handed out, so a sub-agent never has to know which round it runs in.
/// A closed channel is ignored.
#[derive(Debug, Clone)]
pub struct RoundEmitter {
    tx: mpsc::Sender<AgentEvent>,
    round: Arc<AtomicU32>,
}

impl RoundEmitter {
    pub fn new(tx: mpsc::Sender<AgentEvent>, round: Arc<AtomicU32>) -> Self {
        Self { tx, round }
    }

    pub fn round(&self) -> u32 {
        self.round.load(Ordering::SeqCst)
    }

    pub async fn emit(&self, kind: EventKind, mut payload: AgentEventPayload) {
        payload.round = self.round();
        trace!(event = %kind, round = payload.round, "emitting event");
        let _ = self.tx.send(AgentEvent { kind, payload }).await;
    }

    /// Emit an event that carries nothing but the round.
    pub async fn emit_bare(&self, kind: EventKind) {
        self.emit(kind, AgentEventPayload::default()).await;
    }
}

// ─── Unit tests ──────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;

    #[test]
    fn event_serializes_flat_with_camel_case_fields() {
        let ev = AgentEvent {
            kind: EventKind::PseudoCode,
            payload: AgentEventPayload {
                round: 3,
                pseudo_code: Some("list backlog".into()),
                ..Default::default()
            },
        };
        assert_eq!(
            serde_json::to_value(&ev).unwrap(),
            json!({ "event": "pseudoCode", "round": 3, "pseudoCode": "list backlog" })
        );
    }

    #[test]
    fn decision_serializes_as_phase_name() {
        let ev = AgentEvent {
            kind: EventKind::PhaseDecision,
            payload: AgentEventPayload {
                round: 1,
                decision: Some(Phase::BuildPlan),
                reason: Some("enough context".into()),
                ..Default::default()
            },
        };
        let v = serde_json::to_value(&ev).unwrap();
        assert_eq!(v["decision"], "build_plan");
        assert_eq!(v["event"], "phaseDecision");
    }

    #[test]
    fn stop_keeps_its_upper_case_name() {
        assert_eq!(EventKind::Stop.to_string(), "STOP");
        assert!(EventKind::GatherError.is_error());
        assert!(!EventKind::Finished.is_error());
    }

    #[tokio::test]
    async fn emitter_stamps_round_at_send_time() {
        let (tx, mut rx) = mpsc::channel(8);
        let round = Arc::new(AtomicU32::new(1));
        let emitter = RoundEmitter::new(tx, round.clone());
        emitter.emit_bare(EventKind::RoundStart).await;
        round.store(2, Ordering::SeqCst);
        emitter.emit_bare(EventKind::RoundStart).await;
        assert_eq!(rx.recv().await.unwrap().round(), 1);
        assert_eq!(rx.recv().await.unwrap().round(), 2);
    }

    #[tokio::test]
    async fn closed_channel_is_ignored() {
        let (tx, rx) = mpsc::channel(1);
        drop(rx);
        RoundEmitter::new(tx, Arc::new(AtomicU32::new(0))).emit_bare(EventKind::Finished).await;
    }
}
