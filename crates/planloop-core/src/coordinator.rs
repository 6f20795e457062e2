// Copyright (c) 2024-2026 Martin Schröder <info@swedishembedded.com>
//
// SPDX-License-Identifier: MIT
use std::sync::atomic::{AtomicBool, AtomicU32, Ordering};
use std::sync::Arc;

use chrono::{Local, NaiveDate};
use planloop_config::CoordinatorConfig;
use planloop_model::{ActionPlanItem, TaskResult};
use planloop_tools::IdMapping;
use serde::Serialize;
use tokio::sync::mpsc;
use tracing::{debug, info, warn};

use crate::agents::Agents;
use crate::error::AgentError;
use crate::events::{AgentEvent, AgentEventPayload, EventKind, RoundEmitter};
use crate::phase::Phase;
use crate::todo::TodoList;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CoordinatorOptions {
    /// Rounds a single run may take before it stops itself; 0 = unlimited.
    pub max_rounds: u32,
    /// Mark todo items one by one from the verdicts instead of all at once.
    pub partial_completion: bool,
}

impl Default for CoordinatorOptions {
    fn default() -> Self {
        Self::from(&CoordinatorConfig::default())
    }
}

impl From<&CoordinatorConfig> for CoordinatorOptions {
    fn from(cfg: &CoordinatorConfig) -> Self {
        Self { max_rounds: cfg.max_rounds, partial_completion: cfg.partial_completion }
    }
}

/// Why a run ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum RunOutcome {
    /// Every todo item is done.
    Completed,
    /// A stop was requested, by a [`StopHandle`] or by an `execute_code` round.
    Stopped,
    /// The round cap was reached.
    RoundLimit,
}

/// Final state of a run.
#[derive(Debug, Clone, Serialize)]
pub struct RunSummary {
    pub outcome: RunOutcome,
    /// Rounds taken by this run.
    pub rounds: u32,
    /// The coordinator's round counter when the run ended.
    pub last_round: u32,
    pub context: String,
    pub todo: TodoList,
    pub plan: Vec<ActionPlanItem>,
    pub results: Vec<String>,
}

/// Requests a cooperative stop from outside a running coordinator.
///
/// The flag is checked before each round; a sub-agent call already in
/// flight finishes and its events are still delivered.
#[derive(Debug, Clone)]
pub struct StopHandle {
    flag: Arc<AtomicBool>,
    events: RoundEmitter,
}

impl StopHandle {
    /// Emit `STOP` and prevent the next round from starting.  Only the first
    /// request emits an event.
    pub async fn stop(&self) {
        if !self.flag.swap(true, Ordering::SeqCst) {
            info!(round = self.events.round(), "stop requested");
            self.events.emit_bare(EventKind::Stop).await;
        }
    }

    pub fn is_stopped(&self) -> bool {
        self.flag.load(Ordering::SeqCst)
    }
}

/// Everything the coordinator owns during a run.  Phase handlers get it by
/// `&mut` and are the only writers.
#[derive(Debug, Clone, Default)]
struct RunState {
    context: String,
    todo: TodoList,
    plan: Vec<ActionPlanItem>,
    mapping: IdMapping,
    results: Vec<String>,
}

/// Drives the decide → delegate → commit loop until the todo list is done or
/// a stop is requested.
///
/// `run` takes `&mut self`, so one coordinator can never run twice at the
/// same time.
pub struct Coordinator {
    agents: Agents,
    options: CoordinatorOptions,
    state: RunState,
    round: Arc<AtomicU32>,
    stop: StopHandle,
    events: RoundEmitter,
}

impl Coordinator {
    /// `context` is the caller's text; today's date is appended to it.
    pub fn new(agents: Agents, context: &str, todo: TodoList, tx: mpsc::Sender<AgentEvent>) -> Self {
        Self::with_date(agents, context, todo, tx, Local::now().date_naive())
    }

    /// Like [`Coordinator::new`] with an explicit "today".
    pub fn with_date(
        agents: Agents,
        context: &str,
        todo: TodoList,
        tx: mpsc::Sender<AgentEvent>,
        today: NaiveDate,
    ) -> Self {
        let round = Arc::new(AtomicU32::new(0));
        let events = RoundEmitter::new(tx, round.clone());
        let stop = StopHandle { flag: Arc::new(AtomicBool::new(false)), events: events.clone() };
        Self {
            agents,
            options: CoordinatorOptions::default(),
            state: RunState {
                context: format!("{context}\nToday's date is {}.", today.format("%Y-%m-%d")),
                todo,
                ..Default::default()
            },
            round,
            stop,
            events,
        }
    }

    pub fn with_options(mut self, options: CoordinatorOptions) -> Self {
        self.options = options;
        self
    }

    /// Start from an existing identifier mapping instead of an empty one.
    pub fn with_mapping(mut self, mapping: IdMapping) -> Self {
        self.state.mapping = mapping;
        self
    }

    pub fn stop_handle(&self) -> StopHandle {
        self.stop.clone()
    }

    pub async fn stop(&self) {
        self.stop.stop().await;
    }

    pub fn is_stopped(&self) -> bool {
        self.stop.is_stopped()
    }

    /// Allow another `run` after a stop.
    pub fn reset_stop(&mut self) {
        self.stop.flag.store(false, Ordering::SeqCst);
    }

    pub fn round(&self) -> u32 {
        self.round.load(Ordering::SeqCst)
    }

    pub fn context(&self) -> &str {
        &self.state.context
    }

    pub fn todo(&self) -> &TodoList {
        &self.state.todo
    }

    pub fn plan(&self) -> &[ActionPlanItem] {
        &self.state.plan
    }

    pub fn mapping(&self) -> &IdMapping {
        &self.state.mapping
    }

    pub fn results(&self) -> &[String] {
        &self.state.results
    }

    /// Run rounds until every todo item is done or a stop is requested.
    ///
    /// A dispatch error emits `error` and ends the run with that error; no
    /// state from the failed sub-agent call is committed.
    pub async fn run(&mut self) -> Result<RunSummary, AgentError> {
        let mut rounds = 0u32;
        let mut hit_limit = false;

        while !self.state.todo.all_done() && !self.stop.is_stopped() {
            if self.options.max_rounds > 0 && rounds >= self.options.max_rounds {
                warn!(max_rounds = self.options.max_rounds, "round limit reached; stopping run");
                hit_limit = true;
                self.stop.stop().await;
                break;
            }

            let round = self.round.fetch_add(1, Ordering::SeqCst) + 1;
            rounds += 1;
            info!(round, pending = self.state.todo.pending().count(), "round started");
            self.events
                .emit(
                    EventKind::RoundStart,
                    AgentEventPayload {
                        context: Some(self.state.context.clone()),
                        todo: Some(self.state.todo.clone()),
                        plan: Some(self.state.plan.clone()),
                        results: Some(self.state.results.join("\n")),
                        ..Default::default()
                    },
                )
                .await;

            if let Err(e) = self.step().await {
                warn!(round, "round failed: {e}");
                self.events
                    .emit(
                        EventKind::Error,
                        AgentEventPayload {
                            error: Some(e.to_string()),
                            todo: Some(self.state.todo.clone()),
                            context: Some(self.state.context.clone()),
                            ..Default::default()
                        },
                    )
                    .await;
                return Err(e);
            }

            self.events.emit(EventKind::RoundEnd, self.snapshot()).await;
        }

        let outcome = if self.state.todo.all_done() {
            RunOutcome::Completed
        } else if hit_limit {
            RunOutcome::RoundLimit
        } else {
            RunOutcome::Stopped
        };
        info!(rounds, outcome = ?outcome, "run finished");
        self.events.emit(EventKind::Finished, self.snapshot()).await;

        Ok(RunSummary {
            outcome,
            rounds,
            last_round: self.round(),
            context: self.state.context.clone(),
            todo: self.state.todo.clone(),
            plan: self.state.plan.clone(),
            results: self.state.results.clone(),
        })
    }

    fn snapshot(&self) -> AgentEventPayload {
        AgentEventPayload {
            context: Some(self.state.context.clone()),
            todo: Some(self.state.todo.clone()),
            plan: Some(self.state.plan.clone()),
            ..Default::default()
        }
    }

    /// Decide, delegate, commit.
    async fn step(&mut self) -> Result<(), AgentError> {
        let agents = self.agents.clone();
        let events = &self.events;
        let state = &mut self.state;

        let decision = agents
            .decide
            .decide(&state.todo, &state.plan, &state.context, &state.results.join("\n"), events)
            .await?;
        info!(phase = %decision.phase, reason = %decision.reason, "phase decided");
        events
            .emit(
                EventKind::PhaseDecision,
                AgentEventPayload {
                    decision: Some(decision.phase),
                    reason: Some(decision.reason.clone()),
                    ..Default::default()
                },
            )
            .await;

        match decision.phase {
            Phase::Gather => {
                let out = agents.gather.gather(&state.context, &state.todo, &state.mapping, events).await?;
                state.context.push_str(&out.new_info);
                state.mapping = out.mapping;
            }
            Phase::BuildPlan => {
                state.plan = agents.plan.build_plan(&state.context, &state.todo, events).await?;
            }
            Phase::Execute => {
                let out = agents.execute.execute(&state.todo, &state.plan, &state.mapping, events).await?;
                state.mapping = out.mapping;
                state.results.extend(out.actions.into_iter().map(|a| a.output));
                apply_verdicts(&mut state.todo, &out.results, self.options.partial_completion);
                state.plan.clear();
            }
            Phase::ExecuteCode => {
                let out = agents.execute_code.execute_code(&state.context, &state.todo, &state.mapping, events).await?;
                state.mapping = out.mapping;
                state.results.push(out.new_info);
                state.plan.clear();
                self.stop.stop().await;
            }
        }
        Ok(())
    }
}

/// All-or-nothing by default: when every verdict passes the whole list is
/// marked done.  An empty verdict list passes.
fn apply_verdicts(todo: &mut TodoList, results: &[TaskResult], partial: bool) {
    if partial {
        for r in results.iter().filter(|r| r.passed()) {
            if !todo.mark_done(&r.task) {
                warn!(task = %r.task, "verdict for a task that is not on the todo list");
            }
        }
    } else if results.iter().all(TaskResult::passed) {
        if results.is_empty() {
            debug!("check-results returned no verdicts; marking every task done");
        }
        todo.mark_all_done();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn all_or_nothing_by_default() {
        let mut todo = TodoList::from_tasks(["a", "b"]);
        apply_verdicts(&mut todo, &[TaskResult::new("a", true), TaskResult::new("b", false)], false);
        assert!(!todo.all_done());
        assert_eq!(todo.is_done("a"), Some(false));

        apply_verdicts(&mut todo, &[TaskResult::new("a", true)], false);
        assert!(todo.all_done());
    }

    #[test]
    fn empty_verdicts_complete_everything() {
        let mut todo = TodoList::from_tasks(["a", "b"]);
        apply_verdicts(&mut todo, &[], false);
        assert!(todo.all_done());
    }

    #[test]
    fn empty_verdicts_change_nothing_in_partial_mode() {
        let mut todo = TodoList::from_tasks(["a"]);
        apply_verdicts(&mut todo, &[], true);
        assert_eq!(todo.is_done("a"), Some(false));
    }

    #[test]
    fn partial_completion_marks_individual_items() {
        let mut todo = TodoList::from_tasks(["a", "b"]);
        apply_verdicts(&mut todo, &[TaskResult::new("a", true), TaskResult::new("b", false)], true);
        assert_eq!(todo.is_done("a"), Some(true));
        assert_eq!(todo.is_done("b"), Some(false));
    }

    #[test]
    fn options_follow_config() {
        let cfg = CoordinatorConfig { max_rounds: 3, partial_completion: true, ..Default::default() };
        assert_eq!(CoordinatorOptions::from(&cfg), CoordinatorOptions { max_rounds: 3, partial_completion: true });
        assert_eq!(CoordinatorOptions::default().max_rounds, 25);
    }
}
