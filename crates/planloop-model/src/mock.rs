// Copyright (c) 2024-2026 Martin Schröder <info@swedishembedded.com>
//
// SPDX-License-Identifier: MIT
use std::collections::VecDeque;
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use serde_json::Value;

use crate::{
    AgentBackend, AssistantMessage, BackendError, CheckResultsRequest, DecideRequest, DecideResponse, Endpoint,
    PromptRequest, TaskResult, WriteCodeRequest, WriteCodeResponse,
};

/// A request as seen by [`ScriptedBackend`], in call order.
#[derive(Debug, Clone, PartialEq)]
pub enum RecordedRequest {
    Decide(DecideRequest),
    Gather(PromptRequest),
    Plan(PromptRequest),
    CheckResults(CheckResultsRequest),
    WriteCode(WriteCodeRequest),
}

impl RecordedRequest {
    pub fn endpoint(&self) -> Endpoint {
        match self {
            RecordedRequest::Decide(_) => Endpoint::Decide,
            RecordedRequest::Gather(_) => Endpoint::Gather,
            RecordedRequest::Plan(_) => Endpoint::Plan,
            RecordedRequest::CheckResults(_) => Endpoint::CheckResults,
            RecordedRequest::WriteCode(_) => Endpoint::WriteCode,
        }
    }
}

enum Reply<T> {
    Ok(T),
    Fail { status: u16, body: String },
}

impl<T> Reply<T> {
    fn into_result(self, endpoint: Endpoint) -> Result<T, BackendError> {
        match self {
            Reply::Ok(v) => Ok(v),
            Reply::Fail { status, body } => Err(BackendError::Status { endpoint, status, body }),
        }
    }
}

type Queue<T> = Mutex<VecDeque<Reply<T>>>;

/// A pre-scripted backend.  Each endpoint has its own queue of replies;
/// every call pops the front of its queue, so tests spell out the exact
/// conversation without network access.  An empty queue is an
/// [`BackendError::Exhausted`] error, except for `decide` when a fallback
/// decision is set.
pub struct ScriptedBackend {
    name: String,
    decide: Queue<DecideResponse>,
    gather: Queue<AssistantMessage>,
    plan: Queue<AssistantMessage>,
    check: Queue<Vec<TaskResult>>,
    code: Queue<WriteCodeResponse>,
    fallback_decision: Option<DecideResponse>,
    /// Every request received, oldest first.
    pub requests: Arc<Mutex<Vec<RecordedRequest>>>,
}

impl Default for ScriptedBackend {
    fn default() -> Self {
        Self::new()
    }
}

impl ScriptedBackend {
    pub fn new() -> Self {
        Self {
            name: "scripted-mock".into(),
            decide: Mutex::default(),
            gather: Mutex::default(),
            plan: Mutex::default(),
            check: Mutex::default(),
            code: Mutex::default(),
            fallback_decision: None,
            requests: Arc::new(Mutex::new(Vec::new())),
        }
    }

    pub fn named(mut self, name: impl Into<String>) -> Self {
        self.name = name.into();
        self
    }

    pub fn decide(self, decision: impl Into<String>, reason: impl Into<String>) -> Self {
        self.decide_response(DecideResponse::new(decision, reason))
    }

    pub fn decide_response(self, resp: DecideResponse) -> Self {
        push(&self.decide, Reply::Ok(resp));
        self
    }

    /// Answer `decide` with this decision once the queue is empty.
    pub fn always_decide(mut self, decision: impl Into<String>, reason: impl Into<String>) -> Self {
        self.fallback_decision = Some(DecideResponse::new(decision, reason));
        self
    }

    pub fn gather(self, msg: AssistantMessage) -> Self {
        push(&self.gather, Reply::Ok(msg));
        self
    }

    pub fn plan(self, msg: AssistantMessage) -> Self {
        push(&self.plan, Reply::Ok(msg));
        self
    }

    pub fn check_results(self, results: Vec<TaskResult>) -> Self {
        push(&self.check, Reply::Ok(results));
        self
    }

    pub fn write_code(self, pseudo_code: impl Into<String>, code: impl Into<String>) -> Self {
        push(&self.code, Reply::Ok(WriteCodeResponse { pseudo_code: pseudo_code.into(), code: code.into() }));
        self
    }

    /// Queue an HTTP-style failure on `endpoint`.
    pub fn fail(self, endpoint: Endpoint, status: u16, body: impl Into<String>) -> Self {
        let body = body.into();
        match endpoint {
            Endpoint::Decide => push(&self.decide, Reply::Fail { status, body }),
            Endpoint::Gather => push(&self.gather, Reply::Fail { status, body }),
            Endpoint::Plan => push(&self.plan, Reply::Fail { status, body }),
            Endpoint::CheckResults => push(&self.check, Reply::Fail { status, body }),
            Endpoint::WriteCode => push(&self.code, Reply::Fail { status, body }),
        }
        self
    }

    /// Snapshot of the recorded requests.
    pub fn recorded(&self) -> Vec<RecordedRequest> {
        self.requests.lock().map(|r| r.clone()).unwrap_or_default()
    }

    /// How many requests `endpoint` has received.
    pub fn calls(&self, endpoint: Endpoint) -> usize {
        self.recorded().iter().filter(|r| r.endpoint() == endpoint).count()
    }

    /// Arguments of the last request, as JSON, for assertions in tests.
    pub fn last_request_json(&self) -> Option<Value> {
        let last = self.recorded().pop()?;
        match last {
            RecordedRequest::Decide(r) => serde_json::to_value(r).ok(),
            RecordedRequest::Gather(r) | RecordedRequest::Plan(r) => serde_json::to_value(r).ok(),
            RecordedRequest::CheckResults(r) => serde_json::to_value(r).ok(),
            RecordedRequest::WriteCode(r) => serde_json::to_value(r).ok(),
        }
    }

    fn record(&self, req: RecordedRequest) {
        if let Ok(mut log) = self.requests.lock() {
            log.push(req);
        }
    }
}

fn push<T>(queue: &Queue<T>, reply: Reply<T>) {
    if let Ok(mut q) = queue.lock() {
        q.push_back(reply);
    }
}

fn pop<T>(queue: &Queue<T>, endpoint: Endpoint) -> Result<T, BackendError> {
    let next = queue.lock().ok().and_then(|mut q| q.pop_front());
    next.ok_or(BackendError::Exhausted(endpoint))?.into_result(endpoint)
}

#[async_trait]
impl AgentBackend for ScriptedBackend {
    fn name(&self) -> &str {
        &self.name
    }

    async fn decide(&self, req: &DecideRequest) -> Result<DecideResponse, BackendError> {
        self.record(RecordedRequest::Decide(req.clone()));
        match (pop(&self.decide, Endpoint::Decide), &self.fallback_decision) {
            (Err(BackendError::Exhausted(_)), Some(fallback)) => Ok(fallback.clone()),
            (other, _) => other,
        }
    }

    async fn gather(&self, req: &PromptRequest) -> Result<AssistantMessage, BackendError> {
        self.record(RecordedRequest::Gather(req.clone()));
        pop(&self.gather, Endpoint::Gather)
    }

    async fn build_plan(&self, req: &PromptRequest) -> Result<AssistantMessage, BackendError> {
        self.record(RecordedRequest::Plan(req.clone()));
        pop(&self.plan, Endpoint::Plan)
    }

    async fn check_results(&self, req: &CheckResultsRequest) -> Result<Vec<TaskResult>, BackendError> {
        self.record(RecordedRequest::CheckResults(req.clone()));
        pop(&self.check, Endpoint::CheckResults)
    }

    async fn write_code(&self, req: &WriteCodeRequest) -> Result<WriteCodeResponse, BackendError> {
        self.record(RecordedRequest::WriteCode(req.clone()));
        pop(&self.code, Endpoint::WriteCode)
    }
}

// ─── Unit tests ──────────────────────────────────────────────────────────────
