// Copyright (c) 2024-2026 Martin Schröder <info@swedishembedded.com>
//
// SPDX-License-Identifier: MIT
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};

use crate::error::ToolError;

/// A task reference as the model writes it: a short handle or a long id.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum TaskRef {
    Short(u32),
    Long(String),
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
pub struct NoArgs {}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct DateArgs {
    pub date: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct RangeArgs {
    pub start_date: String,
    pub end_date: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct CreateArgs {
    pub text: String,
    #[serde(default)]
    pub date: Option<String>,
    #[serde(default)]
    pub start_time: Option<String>,
    #[serde(default)]
    pub duration_minutes: Option<u32>,
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct UpdateArgs {
    pub id: TaskRef,
    #[serde(default)]
    pub text: Option<String>,
    #[serde(default)]
    pub start_time: Option<String>,
    #[serde(default)]
    pub duration_minutes: Option<u32>,
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct CompleteArgs {
    pub id: TaskRef,
    #[serde(default = "yes")]
    pub completed: bool,
}

fn yes() -> bool {
    true
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct MoveArgs {
    pub id: TaskRef,
    /// Absent or null moves the task to the backlog.
    #[serde(default)]
    pub date: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct IdArgs {
    pub id: TaskRef,
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct ReorderArgs {
    #[serde(default)]
    pub date: Option<String>,
    pub ids: Vec<TaskRef>,
}

/// Every function the model may call against the task data.
///
/// Deserialized from `{"name": ..., "parameters": {...}}`, so an unknown
/// name or a malformed argument object is rejected before anything runs.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(tag = "name", content = "parameters", rename_all = "snake_case")]
pub enum TaskCall {
    GetTasks(DateArgs),
    GetTasksInRange(RangeArgs),
    GetBacklog(NoArgs),
    CreateTask(CreateArgs),
    UpdateTask(UpdateArgs),
    CompleteTask(CompleteArgs),
    MoveTask(MoveArgs),
    DeleteTask(IdArgs),
    ReorderTasks(ReorderArgs),
}

impl TaskCall {
    /// All function names, in declaration order.
    pub const NAMES: &'static [&'static str] = &[
        "get_tasks",
        "get_tasks_in_range",
        "get_backlog",
        "create_task",
        "update_task",
        "complete_task",
        "move_task",
        "delete_task",
        "reorder_tasks",
    ];

    /// Build a call from a function name and its JSON arguments.
    /// Missing or `null` arguments are treated as an empty object.
    pub fn parse(name: &str, parameters: Option<&Value>) -> Result<Self, ToolError> {
        if !Self::NAMES.contains(&name) {
            return Err(ToolError::UnknownFunction(name.to_string()));
        }
        let params = match parameters {
            None | Some(Value::Null) => json!({}),
            Some(v) => v.clone(),
        };
        serde_json::from_value(json!({ "name": name, "parameters": params })).map_err(|e| {
            ToolError::InvalidArguments { name: name.to_string(), reason: e.to_string() }
        })
    }

    pub fn name(&self) -> &'static str {
        match self {
            TaskCall::GetTasks(_) => "get_tasks",
            TaskCall::GetTasksInRange(_) => "get_tasks_in_range",
            TaskCall::GetBacklog(_) => "get_backlog",
            TaskCall::CreateTask(_) => "create_task",
            TaskCall::UpdateTask(_) => "update_task",
            TaskCall::CompleteTask(_) => "complete_task",
            TaskCall::MoveTask(_) => "move_task",
            TaskCall::DeleteTask(_) => "delete_task",
            TaskCall::ReorderTasks(_) => "reorder_tasks",
        }
    }

    /// Whether the call changes task data.
    pub fn is_mutation(&self) -> bool {
        !matches!(
            self,
            TaskCall::GetTasks(_) | TaskCall::GetTasksInRange(_) | TaskCall::GetBacklog(_)
        )
    }
}
