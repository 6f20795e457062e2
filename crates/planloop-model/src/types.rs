// Copyright (c) 2024-2026 Martin Schröder <info@swedishembedded.com>
//
// SPDX-License-Identifier: MIT
use serde::{Deserialize, Deserializer, Serialize};
use serde_json::Value;

// ─── Shared pieces ───────────────────────────────────────────────────────────

/// One todo entry as it travels in `todo_list[]`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TodoEntry {
    pub task: String,
    pub done: bool,
}

impl TodoEntry {
    pub fn new(task: impl Into<String>, done: bool) -> Self {
        Self { task: task.into(), done }
    }
}

/// A planned action: a function name plus its arguments, and the result
/// once the action has run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ActionPlanItem {
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub parameters: Option<Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub result: Option<Value>,
}

impl ActionPlanItem {
    pub fn new(name: impl Into<String>, parameters: Option<Value>) -> Self {
        Self { name: name.into(), parameters, result: None }
    }
}

// ─── decide ──────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DecideRequest {
    pub todo_list: Vec<TodoEntry>,
    pub plan: Vec<ActionPlanItem>,
    pub context: String,
    pub results: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DecideResponse {
    #[serde(default)]
    pub decision: Option<String>,
    #[serde(default)]
    pub reason: Option<String>,
    /// Absent means the server did not report a failure.
    #[serde(default = "default_true")]
    pub success: bool,
    #[serde(default)]
    pub message: Option<String>,
}

fn default_true() -> bool {
    true
}

impl DecideResponse {
    pub fn new(decision: impl Into<String>, reason: impl Into<String>) -> Self {
        Self { decision: Some(decision.into()), reason: Some(reason.into()), success: true, message: None }
    }
}

// ─── gather / plan ───────────────────────────────────────────────────────────

/// Body of the gather and plan calls.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PromptRequest {
    pub context: String,
    pub todo_list: Vec<TodoEntry>,
}

/// Assistant message in chat-completions shape.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct AssistantMessage {
    #[serde(default)]
    pub content: Option<String>,
    #[serde(default, deserialize_with = "null_as_empty")]
    pub tool_calls: Vec<ToolCallRequest>,
}

impl AssistantMessage {
    pub fn text(content: impl Into<String>) -> Self {
        Self { content: Some(content.into()), tool_calls: Vec::new() }
    }

    pub fn with_tool_call(mut self, name: impl Into<String>, arguments: Value) -> Self {
        let id = format!("call_{}", self.tool_calls.len() + 1);
        self.tool_calls.push(ToolCallRequest {
            id: Some(id),
            function: FunctionCallRequest { name: name.into(), arguments },
        });
        self
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ToolCallRequest {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    pub function: FunctionCallRequest,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FunctionCallRequest {
    pub name: String,
    /// A JSON-encoded string in chat-completions replies; an object is
    /// accepted as well.
    #[serde(default)]
    pub arguments: Value,
}

impl FunctionCallRequest {
    /// Arguments as a JSON value.  Null and blank strings mean "no arguments".
    pub fn parsed_arguments(&self) -> Result<Option<Value>, serde_json::Error> {
        match &self.arguments {
            Value::Null => Ok(None),
            Value::String(s) if s.trim().is_empty() => Ok(None),
            Value::String(s) => serde_json::from_str::<Value>(s).map(|v| (!v.is_null()).then_some(v)),
            other => Ok(Some(other.clone())),
        }
    }
}

fn null_as_empty<'de, D, T>(de: D) -> Result<Vec<T>, D::Error>
where
    D: Deserializer<'de>,
    T: Deserialize<'de>,
{
    Ok(Option::<Vec<T>>::deserialize(de)?.unwrap_or_default())
}

// ─── check-results ───────────────────────────────────────────────────────────

/// Outcome of one dispatched action, sent back for checking.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExecutionResult {
    pub name: String,
    pub success: bool,
    pub output: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CheckResultsRequest {
    pub todo_list: Vec<TodoEntry>,
    pub execution_results: Vec<ExecutionResult>,
}

/// Verdict for one todo item.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TaskResult {
    pub task: String,
    #[serde(default)]
    pub result: Value,
}

impl TaskResult {
    pub fn new(task: impl Into<String>, passed: bool) -> Self {
        Self { task: task.into(), result: Value::Bool(passed) }
    }

    /// `false`, `null`, `0` and `""` count as not passed; anything else passes.
    pub fn passed(&self) -> bool {
        match &self.result {
            Value::Null => false,
            Value::Bool(b) => *b,
            Value::Number(n) => n.as_f64().is_some_and(|f| f != 0.0 && !f.is_nan()),
            Value::String(s) => !s.is_empty(),
            Value::Array(_) | Value::Object(_) => true,
        }
    }
}

// ─── write-code ──────────────────────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WriteCodeRequest {
    pub todo_list: Vec<TodoEntry>,
    pub context: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WriteCodeResponse {
    #[serde(default, alias = "pseudo_code")]
    pub pseudo_code: String,
    pub code: String,
}

// ─── Unit tests ──────────────────────────────────────────────────────────────
