// Copyright (c) 2024-2026 Martin Schröder <info@swedishembedded.com>
//
// SPDX-License-Identifier: MIT
use chrono::{NaiveDate, NaiveTime};
use serde::{Deserialize, Serialize};

use crate::error::ToolError;

/// A planner task.  Tasks without a date live in the backlog.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Task {
    pub id: String,
    pub text: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub date: Option<NaiveDate>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub start_time: Option<NaiveTime>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub duration_minutes: Option<u32>,
    #[serde(default)]
    pub completed: bool,
    /// Sort key within the task's day (or within the backlog).
    #[serde(default)]
    pub position: u32,
}

impl Task {
    pub fn in_backlog(&self) -> bool {
        self.date.is_none()
    }
}

/// Fields for a task that does not exist yet.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct NewTask {
    pub text: String,
    pub date: Option<NaiveDate>,
    pub start_time: Option<NaiveTime>,
    pub duration_minutes: Option<u32>,
}

/// Partial update; `None` leaves a field untouched.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TaskPatch {
    pub text: Option<String>,
    /// `Some(None)` moves the task to the backlog.
    pub date: Option<Option<NaiveDate>>,
    pub start_time: Option<NaiveTime>,
    pub duration_minutes: Option<u32>,
    pub completed: Option<bool>,
}

impl TaskPatch {
    pub fn apply(&self, task: &mut Task) {
        if let Some(text) = &self.text {
            task.text = text.clone();
        }
        if let Some(date) = self.date {
            task.date = date;
        }
        if let Some(t) = self.start_time {
            task.start_time = Some(t);
        }
        if let Some(d) = self.duration_minutes {
            task.duration_minutes = Some(d);
        }
        if let Some(c) = self.completed {
            task.completed = c;
        }
    }
}

pub(crate) fn parse_date(s: &str) -> Result<NaiveDate, ToolError> {
    NaiveDate::parse_from_str(s.trim(), "%Y-%m-%d").map_err(|_| ToolError::InvalidDate(s.to_string()))
}

pub(crate) fn parse_time(s: &str) -> Result<NaiveTime, ToolError> {
    let s = s.trim();
    NaiveTime::parse_from_str(s, "%H:%M")
        .or_else(|_| NaiveTime::parse_from_str(s, "%H:%M:%S"))
        .map_err(|_| ToolError::InvalidArguments {
            name: "start_time".into(),
            reason: format!("'{s}' is not a HH:MM time"),
        })
}
