// Copyright (c) 2024-2026 Martin Schröder <info@swedishembedded.com>
//
// SPDX-License-Identifier: MIT
use serde_json::{json, Value};

use crate::mapping::IdMapping;
use crate::task::Task;

/// One-line description of a task using its short handle.
pub fn format_task(task: &Task, handle: u32) -> String {
    let icon = if task.completed { "✓" } else { "○" };
    let mut line = format!("{icon} [{handle}] {}", task.text);
    match (task.date, task.start_time) {
        (Some(d), Some(t)) => line.push_str(&format!(" ({d} {})", t.format("%H:%M"))),
        (Some(d), None) => line.push_str(&format!(" ({d})")),
        (None, _) => line.push_str(" (backlog)"),
    }
    if let Some(m) = task.duration_minutes {
        line.push_str(&format!(" {m} min"));
    }
    line
}

/// Heading followed by one line per task.  New ids are registered in
/// `mapping` so the text and the mapping always agree.
pub fn format_task_list(heading: &str, tasks: &[Task], mapping: &mut IdMapping) -> String {
    if tasks.is_empty() {
        return format!("{heading} none");
    }
    let lines: Vec<String> = tasks
        .iter()
        .map(|t| format_task(t, mapping.insert(&t.id)))
        .collect();
    format!("{heading}\n{}", lines.join("\n"))
}

/// JSON view of a task with its long id replaced by the handle.
pub fn task_value(task: &Task, mapping: &mut IdMapping) -> Value {
    json!({
        "id": mapping.insert(&task.id),
        "text": task.text,
        "date": task.date.map(|d| d.to_string()),
        "start_time": task.start_time.map(|t| t.format("%H:%M").to_string()),
        "duration_minutes": task.duration_minutes,
        "completed": task.completed,
    })
}

#[cfg(test)]
mod tests {
    use chrono::{NaiveDate, NaiveTime};

    use super::*;

    fn task(id: &str, text: &str) -> Task {
        Task {
            id: id.into(),
            text: text.into(),
            date: Some(NaiveDate::from_ymd_opt(2026, 10, 19).unwrap()),
            start_time: Some(NaiveTime::from_hms_opt(9, 0, 0).unwrap()),
            duration_minutes: Some(30),
            completed: false,
            position: 0,
        }
    }

    #[test]
    fn formats_scheduled_task() {
        assert_eq!(format_task(&task("x", "standup"), 4), "○ [4] standup (2026-10-19 09:00) 30 min");
    }

    #[test]
    fn formats_backlog_task() {
        let mut t = task("x", "read book");
        t.date = None;
        t.duration_minutes = None;
        t.completed = true;
        assert_eq!(format_task(&t, 1), "✓ [1] read book (backlog)");
    }

    #[test]
    fn list_registers_handles() {
        let mut m = IdMapping::new();
        let text = format_task_list("Tasks:", &[task("a", "one"), task("b", "two")], &mut m);
        assert!(text.contains("[1] one"));
        assert!(text.contains("[2] two"));
        assert_eq!(m.short_id("b"), Some(2));
    }

    #[test]
    fn empty_list_says_none() {
        let mut m = IdMapping::new();
        assert_eq!(format_task_list("Backlog:", &[], &mut m), "Backlog: none");
    }

    #[test]
    fn value_uses_handle() {
        let mut m = IdMapping::new();
        m.insert("other");
        let v = task_value(&task("a", "one"), &mut m);
        assert_eq!(v["id"], 2);
        assert_eq!(v["start_time"], "09:00");
    }
}
