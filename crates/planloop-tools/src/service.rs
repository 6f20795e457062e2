// Copyright (c) 2024-2026 Martin Schröder <info@swedishembedded.com>
//
// SPDX-License-Identifier: MIT
use std::path::Path;

use anyhow::Context;
use async_trait::async_trait;
use chrono::NaiveDate;
use tokio::sync::Mutex;
use tracing::debug;

use crate::error::ToolError;
use crate::task::{NewTask, Task, TaskPatch};

/// The planner's task data, as seen by the agents.
///
/// Every function the model may call is ultimately served by one of these
/// operations.  Implementations apply mutations immediately; there is no
/// transaction spanning several calls.
#[async_trait]
pub trait TaskService: Send + Sync {
    /// Tasks scheduled on `date`, in display order.
    async fn tasks_on(&self, date: NaiveDate) -> Result<Vec<Task>, ToolError>;
    /// Tasks scheduled between `start` and `end` inclusive, ordered by date.
    async fn tasks_between(&self, start: NaiveDate, end: NaiveDate) -> Result<Vec<Task>, ToolError>;
    /// Unscheduled tasks, in display order.
    async fn backlog(&self) -> Result<Vec<Task>, ToolError>;
    async fn get(&self, id: &str) -> Result<Task, ToolError>;
    async fn create(&self, task: NewTask) -> Result<Task, ToolError>;
    async fn update(&self, id: &str, patch: TaskPatch) -> Result<Task, ToolError>;
    async fn delete(&self, id: &str) -> Result<Task, ToolError>;
    /// Reorder the tasks of one day (or the backlog when `date` is `None`).
    /// Ids not listed keep their relative order after the listed ones.
    async fn reorder(&self, date: Option<NaiveDate>, ids: &[String]) -> Result<Vec<Task>, ToolError>;
}

/// Process-local [`TaskService`] used by the CLI and the test suites.
#[derive(Default)]
pub struct InMemoryTaskStore {
    tasks: Mutex<Vec<Task>>,
}

impl InMemoryTaskStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_tasks(tasks: Vec<Task>) -> Self {
        Self { tasks: Mutex::new(tasks) }
    }

    /// Load a JSON array of tasks.
    pub fn from_json_file(path: impl AsRef<Path>) -> anyhow::Result<Self> {
        let path = path.as_ref();
        let text = std::fs::read_to_string(path)
            .with_context(|| format!("reading task seed file: {}", path.display()))?;
        let tasks: Vec<Task> = serde_json::from_str(&text)
            .with_context(|| format!("parsing task seed file: {}", path.display()))?;
        debug!(count = tasks.len(), path = %path.display(), "seeded task store");
        Ok(Self::with_tasks(tasks))
    }

    /// Copy of every task, for assertions and the CLI summary.
    pub async fn snapshot(&self) -> Vec<Task> {
        self.tasks.lock().await.clone()
    }

    fn next_position(tasks: &[Task], date: Option<NaiveDate>) -> u32 {
        tasks
            .iter()
            .filter(|t| t.date == date)
            .map(|t| t.position + 1)
            .max()
            .unwrap_or(0)
    }
}

fn sorted(mut tasks: Vec<Task>) -> Vec<Task> {
    tasks.sort_by(|a, b| a.date.cmp(&b.date).then(a.position.cmp(&b.position)));
    tasks
}

#[async_trait]
impl TaskService for InMemoryTaskStore {
    async fn tasks_on(&self, date: NaiveDate) -> Result<Vec<Task>, ToolError> {
        let tasks = self.tasks.lock().await;
        Ok(sorted(tasks.iter().filter(|t| t.date == Some(date)).cloned().collect()))
    }

    async fn tasks_between(&self, start: NaiveDate, end: NaiveDate) -> Result<Vec<Task>, ToolError> {
        if end < start {
            return Err(ToolError::InvalidArguments {
                name: "get_tasks_in_range".into(),
                reason: format!("end date {end} is before start date {start}"),
            });
        }
        let tasks = self.tasks.lock().await;
        Ok(sorted(
            tasks
                .iter()
                .filter(|t| t.date.is_some_and(|d| d >= start && d <= end))
                .cloned()
                .collect(),
        ))
    }

    async fn backlog(&self) -> Result<Vec<Task>, ToolError> {
        let tasks = self.tasks.lock().await;
        Ok(sorted(tasks.iter().filter(|t| t.in_backlog()).cloned().collect()))
    }

    async fn get(&self, id: &str) -> Result<Task, ToolError> {
        let tasks = self.tasks.lock().await;
        tasks
            .iter()
            .find(|t| t.id == id)
            .cloned()
            .ok_or_else(|| ToolError::NotFound(id.to_string()))
    }

    async fn create(&self, new: NewTask) -> Result<Task, ToolError> {
        if new.text.trim().is_empty() {
            return Err(ToolError::InvalidArguments {
                name: "create_task".into(),
                reason: "task text is empty".into(),
            });
        }
        let mut tasks = self.tasks.lock().await;
        let task = Task {
            id: uuid::Uuid::new_v4().to_string(),
            text: new.text,
            date: new.date,
            start_time: new.start_time,
            duration_minutes: new.duration_minutes,
            completed: false,
            position: Self::next_position(&tasks, new.date),
        };
        tasks.push(task.clone());
        Ok(task)
    }

    async fn update(&self, id: &str, patch: TaskPatch) -> Result<Task, ToolError> {
        let mut tasks = self.tasks.lock().await;
        let new_position = match patch.date {
            Some(date) => Some(Self::next_position(&tasks, date)),
            None => None,
        };
        let task = tasks
            .iter_mut()
            .find(|t| t.id == id)
            .ok_or_else(|| ToolError::NotFound(id.to_string()))?;
        let old_date = task.date;
        patch.apply(task);
        if let Some(pos) = new_position {
            if task.date != old_date {
                task.position = pos;
            }
        }
        Ok(task.clone())
    }

    async fn delete(&self, id: &str) -> Result<Task, ToolError> {
        let mut tasks = self.tasks.lock().await;
        let idx = tasks
            .iter()
            .position(|t| t.id == id)
            .ok_or_else(|| ToolError::NotFound(id.to_string()))?;
        Ok(tasks.remove(idx))
    }

    async fn reorder(&self, date: Option<NaiveDate>, ids: &[String]) -> Result<Vec<Task>, ToolError> {
        let mut tasks = self.tasks.lock().await;
        for id in ids {
            match tasks.iter().find(|t| &t.id == id) {
                Some(t) if t.date == date => {}
                Some(_) => {
                    return Err(ToolError::InvalidArguments {
                        name: "reorder_tasks".into(),
                        reason: format!("task {id} is not in the list being reordered"),
                    })
                }
                None => return Err(ToolError::NotFound(id.clone())),
            }
        }

        let mut current: Vec<Task> = sorted(tasks.iter().filter(|t| t.date == date).cloned().collect());
        current.sort_by_key(|t| ids.iter().position(|id| id == &t.id).unwrap_or(usize::MAX));
        for (pos, ordered) in current.iter_mut().enumerate() {
            ordered.position = pos as u32;
            if let Some(t) = tasks.iter_mut().find(|t| t.id == ordered.id) {
                t.position = pos as u32;
            }
        }
        Ok(current)
    }
}

// ─── Unit tests ──────────────────────────────────────────────────────────────
