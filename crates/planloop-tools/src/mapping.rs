// Copyright (c) 2024-2026 Martin Schröder <info@swedishembedded.com>
//
// SPDX-License-Identifier: MIT
//! Short integer handles for long task ids.
//!
//! Prompts refer to tasks as `[3]` instead of a 36-character UUID.  The
//! mapping is append-only: the first id seen gets 1, the next 2, and so on.
//! A handle is never reassigned, so a number the model saw in an earlier
//! round still names the same task.

use std::collections::{BTreeMap, HashMap};

use serde::{Deserialize, Serialize};

use crate::call::TaskRef;
use crate::error::ToolError;

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "BTreeMap<String, u32>", into = "BTreeMap<String, u32>")]
pub struct IdMapping {
    forward: HashMap<String, u32>,
    reverse: BTreeMap<u32, String>,
    next: u32,
}

impl IdMapping {
    pub fn new() -> Self {
        Self::default()
    }

    /// Return the handle for `id`, assigning the next free one if unseen.
    pub fn insert(&mut self, id: &str) -> u32 {
        if let Some(&n) = self.forward.get(id) {
            return n;
        }
        let n = self.next.max(1);
        self.next = n + 1;
        self.forward.insert(id.to_string(), n);
        self.reverse.insert(n, id.to_string());
        n
    }

    pub fn short_id(&self, id: &str) -> Option<u32> {
        self.forward.get(id).copied()
    }

    pub fn long_id(&self, short: u32) -> Option<&str> {
        self.reverse.get(&short).map(String::as_str)
    }

    /// Resolve a task reference from model output to a long id.
    ///
    /// Numbers are looked up as handles.  A numeric string is a handle only
    /// when that handle is assigned; otherwise it is taken as a long id, like
    /// any other string.
    pub fn resolve(&self, task: &TaskRef) -> Result<String, ToolError> {
        match task {
            TaskRef::Short(n) => self
                .long_id(*n)
                .map(str::to_string)
                .ok_or(ToolError::UnknownShortId(*n)),
            TaskRef::Long(s) => {
                let handle = s.trim().parse::<u32>().ok().and_then(|n| self.long_id(n));
                Ok(handle.map_or_else(|| s.clone(), str::to_string))
            }
        }
    }

    pub fn len(&self) -> usize {
        self.forward.len()
    }

    pub fn is_empty(&self) -> bool {
        self.forward.is_empty()
    }

    /// `(handle, long id)` pairs in handle order.
    pub fn iter(&self) -> impl Iterator<Item = (u32, &str)> {
        self.reverse.iter().map(|(n, id)| (*n, id.as_str()))
    }
}

impl TryFrom<BTreeMap<String, u32>> for IdMapping {
    type Error = String;

    fn try_from(pairs: BTreeMap<String, u32>) -> Result<Self, Self::Error> {
        let mut mapping = IdMapping::new();
        for (id, n) in pairs {
            if n == 0 {
                return Err(format!("handle 0 is reserved (id {id})"));
            }
            if let Some(other) = mapping.reverse.get(&n) {
                return Err(format!("handle {n} is assigned to both {other} and {id}"));
            }
            mapping.forward.insert(id.clone(), n);
            mapping.reverse.insert(n, id);
            mapping.next = mapping.next.max(n + 1);
        }
        Ok(mapping)
    }
}

impl From<IdMapping> for BTreeMap<String, u32> {
    fn from(mapping: IdMapping) -> Self {
        mapping.forward.into_iter().collect()
    }
}

// ─── Unit tests ──────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;

    fn assert_bijective(m: &IdMapping) {
        for (n, id) in m.iter() {
            assert_eq!(m.short_id(id), Some(n));
        }
        let mut handles: Vec<u32> = m.iter().map(|(n, _)| n).collect();
        handles.dedup();
        assert_eq!(handles.len(), m.len());
    }

    #[test]
    fn handles_follow_insertion_order() {
        let mut m = IdMapping::new();
        assert_eq!(m.insert("a"), 1);
        assert_eq!(m.insert("b"), 2);
        assert_eq!(m.insert("a"), 1);
        assert_eq!(m.insert("c"), 3);
        assert_bijective(&m);
    }

    #[test]
    fn reverse_is_exact_inverse_after_many_inserts() {
        let mut m = IdMapping::new();
        for i in 0..200 {
            m.insert(&format!("task-{}", i % 137));
        }
        assert_eq!(m.len(), 137);
        assert_bijective(&m);
        assert_eq!(m.long_id(1), Some("task-0"));
        assert_eq!(m.long_id(137), Some("task-136"));
    }

    #[test]
    fn resolve_accepts_numbers_and_numeric_strings() {
        let mut m = IdMapping::new();
        m.insert("uuid-1");
        assert_eq!(m.resolve(&TaskRef::Short(1)).unwrap(), "uuid-1");
        assert_eq!(m.resolve(&TaskRef::Long("1".into())).unwrap(), "uuid-1");
        assert_eq!(m.resolve(&TaskRef::Long("uuid-9".into())).unwrap(), "uuid-9");
        assert!(matches!(m.resolve(&TaskRef::Short(7)), Err(ToolError::UnknownShortId(7))));
    }

    #[test]
    fn unassigned_numeric_string_is_a_long_id() {
        let mut m = IdMapping::new();
        m.insert("uuid-1");
        assert_eq!(m.resolve(&TaskRef::Long("12345".into())).unwrap(), "12345");
        assert_eq!(m.resolve(&TaskRef::Long(" 1 ".into())).unwrap(), "uuid-1");
    }

    #[test]
    fn serializes_as_plain_object() {
        let mut m = IdMapping::new();
        m.insert("id1");
        let json = serde_json::to_value(&m).unwrap();
        assert_eq!(json, serde_json::json!({ "id1": 1 }));
    }

    #[test]
    fn deserialized_mapping_continues_numbering() {
        let m: IdMapping = serde_json::from_value(serde_json::json!({ "x": 4, "y": 2 })).unwrap();
        let mut m = m;
        assert_eq!(m.insert("z"), 5);
        assert_bijective(&m);
    }

    #[test]
    fn duplicate_handles_are_rejected() {
        let r: Result<IdMapping, _> = serde_json::from_value(serde_json::json!({ "x": 1, "y": 1 }));
        assert!(r.is_err());
    }
}
