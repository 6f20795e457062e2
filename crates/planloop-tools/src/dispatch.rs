// Copyright (c) 2024-2026 Martin Schröder <info@swedishembedded.com>
//
// SPDX-License-Identifier: MIT
use std::sync::Arc;

use serde_json::Value;
use tracing::debug;

use crate::call::TaskCall;
use crate::error::ToolError;
use crate::format::{format_task, format_task_list, task_value};
use crate::mapping::IdMapping;
use crate::service::TaskService;
use crate::task::{parse_date, parse_time, NewTask, TaskPatch};

/// Result of one dispatched function.
#[derive(Debug, Clone)]
pub struct FunctionOutput {
    pub name: String,
    /// Human-readable text fed back into prompts.
    pub summary: String,
    /// Structured result (tasks use short handles), returned to scripts.
    pub data: Value,
}

/// Runs [`TaskCall`]s against a [`TaskService`].
///
/// Task references are resolved through the caller's [`IdMapping`]; every
/// task that appears in a result is registered there, so handles in the
/// summary text are always resolvable on a later call.
#[derive(Clone)]
pub struct FunctionDispatcher {
    service: Arc<dyn TaskService>,
}

impl FunctionDispatcher {
    pub fn new(service: Arc<dyn TaskService>) -> Self {
        Self { service }
    }

    pub fn service(&self) -> &Arc<dyn TaskService> {
        &self.service
    }

    /// Parse and run a call given by name, as it arrives from the model.
    pub async fn execute_named(
        &self,
        name: &str,
        parameters: Option<&Value>,
        mapping: &mut IdMapping,
    ) -> Result<FunctionOutput, ToolError> {
        let call = TaskCall::parse(name, parameters)?;
        self.execute(&call, mapping).await
    }

    pub async fn execute(&self, call: &TaskCall, mapping: &mut IdMapping) -> Result<FunctionOutput, ToolError> {
        debug!(function = call.name(), mutation = call.is_mutation(), "dispatching task function");
        let svc = &self.service;
        let (summary, data) = match call {
            TaskCall::GetTasks(a) => {
                let date = parse_date(&a.date)?;
                let tasks = svc.tasks_on(date).await?;
                let summary = format_task_list(&format!("Tasks on {date}:"), &tasks, mapping);
                let data = tasks.iter().map(|t| task_value(t, mapping)).collect();
                (summary, Value::Array(data))
            }
            TaskCall::GetTasksInRange(a) => {
                let start = parse_date(&a.start_date)?;
                let end = parse_date(&a.end_date)?;
                let tasks = svc.tasks_between(start, end).await?;
                let summary = format_task_list(&format!("Tasks from {start} to {end}:"), &tasks, mapping);
                let data = tasks.iter().map(|t| task_value(t, mapping)).collect();
                (summary, Value::Array(data))
            }
            TaskCall::GetBacklog(_) => {
                let tasks = svc.backlog().await?;
                let summary = format_task_list("Backlog:", &tasks, mapping);
                let data = tasks.iter().map(|t| task_value(t, mapping)).collect();
                (summary, Value::Array(data))
            }
            TaskCall::CreateTask(a) => {
                let new = NewTask {
                    text: a.text.clone(),
                    date: a.date.as_deref().map(parse_date).transpose()?,
                    start_time: a.start_time.as_deref().map(parse_time).transpose()?,
                    duration_minutes: a.duration_minutes,
                };
                let task = svc.create(new).await?;
                let handle = mapping.insert(&task.id);
                (format!("Created {}", format_task(&task, handle)), task_value(&task, mapping))
            }
            TaskCall::UpdateTask(a) => {
                let id = mapping.resolve(&a.id)?;
                let patch = TaskPatch {
                    text: a.text.clone(),
                    start_time: a.start_time.as_deref().map(parse_time).transpose()?,
                    duration_minutes: a.duration_minutes,
                    ..Default::default()
                };
                let task = svc.update(&id, patch).await?;
                let handle = mapping.insert(&task.id);
                (format!("Updated {}", format_task(&task, handle)), task_value(&task, mapping))
            }
            TaskCall::CompleteTask(a) => {
                let id = mapping.resolve(&a.id)?;
                let patch = TaskPatch { completed: Some(a.completed), ..Default::default() };
                let task = svc.update(&id, patch).await?;
                let handle = mapping.insert(&task.id);
                let verb = if a.completed { "Completed" } else { "Reopened" };
                (format!("{verb} {}", format_task(&task, handle)), task_value(&task, mapping))
            }
            TaskCall::MoveTask(a) => {
                let id = mapping.resolve(&a.id)?;
                let date = a.date.as_deref().map(parse_date).transpose()?;
                let task = svc.update(&id, TaskPatch { date: Some(date), ..Default::default() }).await?;
                let handle = mapping.insert(&task.id);
                let target = date.map(|d| d.to_string()).unwrap_or_else(|| "the backlog".into());
                (format!("Moved [{handle}] {} to {target}", task.text), task_value(&task, mapping))
            }
            TaskCall::DeleteTask(a) => {
                let id = mapping.resolve(&a.id)?;
                let task = svc.delete(&id).await?;
                let handle = mapping.insert(&task.id);
                (format!("Deleted [{handle}] {}", task.text), Value::Bool(true))
            }
            TaskCall::ReorderTasks(a) => {
                let date = a.date.as_deref().map(parse_date).transpose()?;
                let ids = a.ids.iter().map(|r| mapping.resolve(r)).collect::<Result<Vec<_>, _>>()?;
                let tasks = svc.reorder(date, &ids).await?;
                let heading = match date {
                    Some(d) => format!("New order for {d}:"),
                    None => "New backlog order:".to_string(),
                };
                let summary = format_task_list(&heading, &tasks, mapping);
                let data = tasks.iter().map(|t| task_value(t, mapping)).collect();
                (summary, Value::Array(data))
            }
        };
        Ok(FunctionOutput { name: call.name().to_string(), summary, data })
    }
}

// ─── Unit tests ──────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;
    use crate::service::InMemoryTaskStore;
    use crate::task::Task;

    fn dispatcher() -> (FunctionDispatcher, Arc<InMemoryTaskStore>) {
        let store = Arc::new(InMemoryTaskStore::new());
        (FunctionDispatcher::new(store.clone()), store)
    }

    #[tokio::test]
    async fn create_then_complete_by_handle() {
        let (d, store) = dispatcher();
        let mut m = IdMapping::new();
        let out = d
            .execute_named("create_task", Some(&json!({ "text": "buy milk", "date": "2026-10-19" })), &mut m)
            .await
            .unwrap();
        assert!(out.summary.contains("[1] buy milk"));
        assert_eq!(out.data["id"], 1);

        d.execute_named("complete_task", Some(&json!({ "id": 1 })), &mut m).await.unwrap();
        let tasks = store.snapshot().await;
        assert!(tasks[0].completed);
    }

    #[tokio::test]
    async fn listing_registers_every_task() {
        let (d, store) = dispatcher();
        for text in ["a", "b", "c"] {
            store.create(NewTask { text: text.into(), ..Default::default() }).await.unwrap();
        }
        let mut m = IdMapping::new();
        let out = d.execute_named("get_backlog", None, &mut m).await.unwrap();
        assert_eq!(m.len(), 3);
        assert_eq!(out.data.as_array().unwrap().len(), 3);
        assert!(out.summary.starts_with("Backlog:"));
    }

    #[tokio::test]
    async fn move_without_date_goes_to_backlog() {
        let (d, store) = dispatcher();
        let mut m = IdMapping::new();
        d.execute_named("create_task", Some(&json!({ "text": "x", "date": "2026-10-19" })), &mut m)
            .await
            .unwrap();
        let out = d.execute_named("move_task", Some(&json!({ "id": 1 })), &mut m).await.unwrap();
        assert!(out.summary.ends_with("to the backlog"));
        assert!(store.snapshot().await[0].in_backlog());
    }

    #[tokio::test]
    async fn numeric_long_id_passes_through() {
        let task = Task {
            id: "12345".into(),
            text: "renew passport".into(),
            date: None,
            start_time: None,
            duration_minutes: None,
            completed: false,
            position: 0,
        };
        let store = Arc::new(InMemoryTaskStore::with_tasks(vec![task]));
        let d = FunctionDispatcher::new(store.clone());
        let mut m = IdMapping::new();
        d.execute_named("delete_task", Some(&json!({ "id": "12345" })), &mut m).await.unwrap();
        assert!(store.snapshot().await.is_empty());
    }

    #[tokio::test]
    async fn unknown_handle_is_an_error() {
        let (d, _) = dispatcher();
        let mut m = IdMapping::new();
        let err = d.execute_named("delete_task", Some(&json!({ "id": 9 })), &mut m).await.unwrap_err();
        assert!(matches!(err, ToolError::UnknownShortId(9)));
    }

    #[tokio::test]
    async fn bad_date_is_an_error() {
        let (d, _) = dispatcher();
        let mut m = IdMapping::new();
        let err = d.execute_named("get_tasks", Some(&json!({ "date": "tomorrow" })), &mut m).await.unwrap_err();
        assert!(matches!(err, ToolError::InvalidDate(_)));
    }

    #[tokio::test]
    async fn reorder_by_handles() {
        let (d, _) = dispatcher();
        let mut m = IdMapping::new();
        for text in ["first", "second"] {
            d.execute_named("create_task", Some(&json!({ "text": text, "date": "2026-10-19" })), &mut m)
                .await
                .unwrap();
        }
        let out = d
            .execute_named("reorder_tasks", Some(&json!({ "date": "2026-10-19", "ids": [2, 1] })), &mut m)
            .await
            .unwrap();
        let lines: Vec<&str> = out.summary.lines().collect();
        assert!(lines[1].contains("second"));
        assert!(lines[2].contains("first"));
    }
}
