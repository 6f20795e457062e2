// Copyright (c) 2024-2026 Martin Schröder <info@swedishembedded.com>
//
// SPDX-License-Identifier: MIT
/// YAML-configured scripted backend for offline runs and end-to-end tests.
///
/// Each endpoint lists its replies in call order.  A step is either a
/// reply in the endpoint's response shape or a `fail:` entry that turns
/// into an HTTP-style error.
///
/// # YAML format
///
/// ```yaml
/// default_decision:          # used once `decide` runs out of steps
///   decision: execute_code
///   reason: "nothing left to ask"
///
/// decide:
///   - decision: gather
///     reason: "need today's tasks"
///   - decision: build_plan
///     reason: "enough context"
///
/// gather:
///   - content: "Checked the calendar."
///     tool_calls:
///       - function:
///           name: get_tasks
///           arguments: { date: "2026-10-19" }
///
/// plan:
///   - tool_calls:
///       - function: { name: create_task, arguments: { text: "gym", date: "2026-10-19" } }
///
/// check_results:
///   - results:
///       - { task: "schedule gym", result: true }
///
/// write_code:
///   - pseudo_code: "create the task"
///     code: 'create_task(#{ text: "gym" })'
///   - fail: { status: 500, body: "model overloaded" }
/// ```
use std::path::Path;

use anyhow::Context;
use serde::Deserialize;
use tracing::debug;

use crate::{AssistantMessage, DecideResponse, Endpoint, ScriptedBackend, TaskResult, WriteCodeResponse};

// ─── YAML schema ─────────────────────────────────────────────────────────────

/// Root document.
#[derive(Debug, Default, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct MockScript {
    pub default_decision: Option<DecideResponse>,
    #[serde(default)]
    pub decide: Vec<Step<DecideResponse>>,
    #[serde(default)]
    pub gather: Vec<Step<AssistantMessage>>,
    #[serde(default)]
    pub plan: Vec<Step<AssistantMessage>>,
    #[serde(default)]
    pub check_results: Vec<Step<ResultsStep>>,
    #[serde(default)]
    pub write_code: Vec<Step<WriteCodeResponse>>,
}

/// One scripted reply.  `fail` is tried first so a failure entry is never
/// mistaken for a reply whose fields all have defaults.
#[derive(Debug, Deserialize)]
#[serde(untagged)]
pub enum Step<T> {
    Fail { fail: FailureDef },
    Reply(T),
}

#[derive(Debug, Deserialize)]
pub struct FailureDef {
    #[serde(default = "default_status")]
    pub status: u16,
    #[serde(default)]
    pub body: String,
}

fn default_status() -> u16 {
    500
}

#[derive(Debug, Deserialize)]
pub struct ResultsStep {
    pub results: Vec<TaskResult>,
}

// ─── Loading ─────────────────────────────────────────────────────────────────

impl ScriptedBackend {
    /// Load a backend from a YAML script file.
    pub fn from_yaml_file(path: impl AsRef<Path>) -> anyhow::Result<Self> {
        let path = path.as_ref();
        let text = std::fs::read_to_string(path)
            .with_context(|| format!("reading mock script file: {}", path.display()))?;
        Self::from_yaml(&text).with_context(|| format!("loading mock script {}", path.display()))
    }

    /// Load a backend from a YAML string.
    pub fn from_yaml(yaml: &str) -> anyhow::Result<Self> {
        let script: MockScript = serde_yaml::from_str(yaml).context("parsing mock script YAML")?;
        Ok(Self::from_script(script))
    }

    pub fn from_script(script: MockScript) -> Self {
        debug!(
            decide = script.decide.len(),
            gather = script.gather.len(),
            plan = script.plan.len(),
            check_results = script.check_results.len(),
            write_code = script.write_code.len(),
            "loaded mock script"
        );
        let mut b = ScriptedBackend::new().named("yaml-mock");
        for step in script.decide {
            b = match step {
                Step::Reply(r) => b.decide_response(r),
                Step::Fail { fail } => b.fail(Endpoint::Decide, fail.status, fail.body),
            };
        }
        for step in script.gather {
            b = match step {
                Step::Reply(m) => b.gather(m),
                Step::Fail { fail } => b.fail(Endpoint::Gather, fail.status, fail.body),
            };
        }
        for step in script.plan {
            b = match step {
                Step::Reply(m) => b.plan(m),
                Step::Fail { fail } => b.fail(Endpoint::Plan, fail.status, fail.body),
            };
        }
        for step in script.check_results {
            b = match step {
                Step::Reply(r) => b.check_results(r.results),
                Step::Fail { fail } => b.fail(Endpoint::CheckResults, fail.status, fail.body),
            };
        }
        for step in script.write_code {
            b = match step {
                Step::Reply(r) => b.write_code(r.pseudo_code, r.code),
                Step::Fail { fail } => b.fail(Endpoint::WriteCode, fail.status, fail.body),
            };
        }
        if let Some(d) = script.default_decision {
            b = b.always_decide(d.decision.unwrap_or_default(), d.reason.unwrap_or_default());
        }
        b
    }
}

// ─── Unit tests ──────────────────────────────────────────────────────────────
