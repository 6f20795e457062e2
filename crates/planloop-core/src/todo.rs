// Copyright (c) 2024-2026 Martin Schröder <info@swedishembedded.com>
//
// SPDX-License-Identifier: MIT
use serde::ser::{Serialize, SerializeMap, Serializer};

use planloop_model::TodoEntry;

/// Task description → done flag.  Keys are never removed and a done flag
/// never goes back to false; both are enforced by the API.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TodoList {
    // Insertion order is kept so prompts and printed lists stay stable.
    items: Vec<(String, bool)>,
}

impl TodoList {
    pub fn new() -> Self {
        Self::default()
    }

    /// Open items, one per distinct description.
    pub fn from_tasks<I, S>(tasks: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let mut list = Self::new();
        for t in tasks {
            list.add(t);
        }
        list
    }

    /// Add an open item.  Returns false if the description is already present.
    pub fn add(&mut self, task: impl Into<String>) -> bool {
        self.insert(task, false)
    }

    /// Add an item with an explicit flag.  An existing item keeps its flag
    /// unless `done` upgrades it.
    pub fn insert(&mut self, task: impl Into<String>, done: bool) -> bool {
        let task = task.into();
        if let Some(entry) = self.items.iter_mut().find(|(t, _)| *t == task) {
            entry.1 |= done;
            return false;
        }
        self.items.push((task, done));
        true
    }

    /// Mark one item done.  Returns false when the description is unknown.
    pub fn mark_done(&mut self, task: &str) -> bool {
        match self.items.iter_mut().find(|(t, _)| t == task) {
            Some(entry) => {
                entry.1 = true;
                true
            }
            None => false,
        }
    }

    pub fn mark_all_done(&mut self) {
        for entry in &mut self.items {
            entry.1 = true;
        }
    }

    pub fn is_done(&self, task: &str) -> Option<bool> {
        self.items.iter().find(|(t, _)| t == task).map(|(_, d)| *d)
    }

    /// True when no item is open, including for an empty list.
    pub fn all_done(&self) -> bool {
        self.items.iter().all(|(_, d)| *d)
    }

    pub fn pending(&self) -> impl Iterator<Item = &str> {
        self.items.iter().filter(|(_, d)| !d).map(|(t, _)| t.as_str())
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, bool)> {
        self.items.iter().map(|(t, d)| (t.as_str(), *d))
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    /// `todo_list[]` as the agent endpoints expect it.
    pub fn to_wire(&self) -> Vec<TodoEntry> {
        self.items.iter().map(|(t, d)| TodoEntry::new(t.clone(), *d)).collect()
    }
}

/// Events carry the list as a `{ task: done }` object.
impl Serialize for TodoList {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(Some(self.items.len()))?;
        for (t, d) in &self.items {
            map.serialize_entry(t, d)?;
        }
        map.end()
    }
}
