/// Integration tests for planloop's round loop using the scripted backend.
use std::process::{Command, Output, Stdio};
use std::sync::Arc;
use std::time::Duration;

use planloop_config::{BackendKind, Config};
use planloop_core::{AgentEvent, Agents, Coordinator, EventKind, RunOutcome, TodoList};
use planloop_model::{AgentBackend, Endpoint, ScriptedBackend};
use planloop_tools::{FunctionDispatcher, InMemoryTaskStore, Sandbox, SandboxLimits};
use serde_json::Value;
use tokio::sync::mpsc;

const PLAN_AND_EXECUTE: &str = r#"
decide:
  - decision: gather
    reason: "look at the backlog first"
  - decision: build_plan
    reason: "enough context"
  - decision: execute
    reason: "plan is ready"

gather:
  - content: "Backlog checked."
    tool_calls:
      - function:
          name: get_backlog
          arguments: {}

plan:
  - tool_calls:
      - function:
          name: create_task
          arguments: { text: "gym", date: "2026-10-20", start_time: "18:00" }

check_results:
  - results:
      - { task: "schedule gym", result: true }
"#;

/// Run the binary, failing the test instead of hanging if it does not exit.
fn output_within(mut cmd: Command, limit: Duration) -> Output {
    let child = cmd.stdout(Stdio::piped()).stderr(Stdio::piped()).spawn().unwrap();
    let (tx, rx) = std::sync::mpsc::channel();
    std::thread::spawn(move || {
        let _ = tx.send(child.wait_with_output());
    });
    rx.recv_timeout(limit)
        .unwrap_or_else(|_| panic!("planloop did not exit within {limit:?}"))
        .unwrap()
}

fn drain(rx: &mut mpsc::Receiver<AgentEvent>) -> Vec<AgentEvent> {
    let mut events = Vec::new();
    while let Ok(ev) = rx.try_recv() {
        events.push(ev);
    }
    events
}

#[tokio::test]
async fn scripted_run_plans_executes_and_completes() {
    let backend = Arc::new(ScriptedBackend::from_yaml(PLAN_AND_EXECUTE).unwrap());
    let store = Arc::new(InMemoryTaskStore::new());
    let dispatcher = FunctionDispatcher::new(store.clone());
    let sandbox = Sandbox::new(dispatcher.clone(), SandboxLimits::default());
    let agents = Agents::remote(backend.clone() as Arc<dyn AgentBackend>, dispatcher, sandbox);

    let (tx, mut rx) = mpsc::channel(1024);
    let mut coord = Coordinator::new(agents, "Plan my week.", TodoList::from_tasks(["schedule gym"]), tx);
    let summary = coord.run().await.unwrap();

    assert_eq!(summary.outcome, RunOutcome::Completed);
    assert_eq!(summary.rounds, 3);
    assert!(summary.context.contains("Backlog checked."));
    assert!(summary.plan.is_empty(), "plan is cleared once executed");
    assert_eq!(summary.results.len(), 1);

    let tasks = store.snapshot().await;
    assert_eq!(tasks.len(), 1);
    assert_eq!(tasks[0].text, "gym");

    assert_eq!(backend.calls(Endpoint::Decide), 3);
    assert_eq!(backend.calls(Endpoint::CheckResults), 1);
    assert_eq!(backend.calls(Endpoint::WriteCode), 0);

    let events = drain(&mut rx);
    let kinds: Vec<EventKind> = events.iter().map(|e| e.kind).collect();
    assert_eq!(kinds.first(), Some(&EventKind::RoundStart));
    assert_eq!(kinds.last(), Some(&EventKind::Finished));
    assert_eq!(kinds.iter().filter(|k| **k == EventKind::RoundStart).count(), 3);
    assert!(kinds.contains(&EventKind::ExecuteComplete));
    assert!(events.iter().all(|e| !e.kind.is_error()));
}

#[tokio::test]
async fn failing_check_keeps_the_todo_open_until_the_round_cap() {
    let script = r#"
default_decision: { decision: execute, reason: "try again" }
check_results:
  - results: [{ task: "a", result: false }]
  - results: [{ task: "a", result: "" }]
"#;
    let backend: Arc<dyn AgentBackend> = Arc::new(ScriptedBackend::from_yaml(script).unwrap());
    let store = Arc::new(InMemoryTaskStore::new());
    let dispatcher = FunctionDispatcher::new(store);
    let sandbox = Sandbox::new(dispatcher.clone(), SandboxLimits::default());
    let (tx, _rx) = mpsc::channel(1024);
    let mut coord = Coordinator::new(Agents::remote(backend, dispatcher, sandbox), "", TodoList::from_tasks(["a"]), tx)
        .with_options(planloop_core::CoordinatorOptions { max_rounds: 2, partial_completion: false });

    let summary = coord.run().await.unwrap();
    assert_eq!(summary.outcome, RunOutcome::RoundLimit);
    assert_eq!(summary.rounds, 2);
    assert_eq!(summary.todo.is_done("a"), Some(false));
}

#[test]
fn config_defaults_are_valid() {
    let cfg = Config::default();
    assert_eq!(cfg.backend.kind, BackendKind::Http);
    assert!(cfg.coordinator.max_rounds > 0);
    assert!(cfg.coordinator.event_buffer > 0);
    assert!(!cfg.coordinator.partial_completion);
}

#[test]
fn binary_runs_a_scripted_session_as_json() {
    let dir = tempfile::tempdir().unwrap();
    let script = dir.path().join("script.yaml");
    std::fs::write(&script, PLAN_AND_EXECUTE).unwrap();

    let mut cmd = Command::new(env!("CARGO_BIN_EXE_planloop"));
    cmd.current_dir(dir.path())
        .env("HOME", dir.path())
        .env("XDG_CONFIG_HOME", dir.path().join(".config"))
        .env("PLANLOOP_MOCK_SCRIPT", &script)
        .env_remove("PLANLOOP_BACKEND")
        .env_remove("PLANLOOP_BASE_URL")
        .args(["--backend", "mock", "--output-format", "json", "-t", "schedule gym", "-x", "Plan my week."]);
    let out = output_within(cmd, Duration::from_secs(30));
    assert!(out.status.success(), "stderr: {}", String::from_utf8_lossy(&out.stderr));

    let stdout = String::from_utf8(out.stdout).unwrap();
    let lines: Vec<Value> = stdout.lines().map(|l| serde_json::from_str(l).unwrap()).collect();
    assert_eq!(lines[0]["event"], "roundStart");
    assert_eq!(lines[0]["round"], 1);
    assert!(lines.iter().any(|l| l["event"] == "functionCall" && l["function"] == "create_task"));

    let summary = &lines.last().unwrap()["summary"];
    assert_eq!(summary["outcome"], "completed");
    assert_eq!(summary["rounds"], 3);
    assert_eq!(summary["todo"]["schedule gym"], true);
}

#[test]
fn binary_exits_non_zero_at_the_round_cap() {
    let dir = tempfile::tempdir().unwrap();
    let script = dir.path().join("script.yaml");
    let yaml = r#"
default_decision: { decision: gather, reason: "keep looking" }
gather:
  - content: "Nothing new."
  - content: "Still nothing."
"#;
    std::fs::write(&script, yaml).unwrap();

    let mut cmd = Command::new(env!("CARGO_BIN_EXE_planloop"));
    cmd.current_dir(dir.path())
        .env("HOME", dir.path())
        .env("XDG_CONFIG_HOME", dir.path().join(".config"))
        .env("PLANLOOP_MOCK_SCRIPT", &script)
        .env_remove("PLANLOOP_BACKEND")
        .args(["--backend", "mock", "--output-format", "json", "--max-rounds", "2", "-t", "a"]);
    let out = output_within(cmd, Duration::from_secs(30));
    assert!(!out.status.success());

    let stdout = String::from_utf8(out.stdout).unwrap();
    let last: Value = serde_json::from_str(stdout.lines().last().unwrap()).unwrap();
    assert_eq!(last["summary"]["outcome"], "round_limit");
    assert!(String::from_utf8_lossy(&out.stderr).contains("round limit"));
}

#[test]
fn binary_requires_a_task() {
    let dir = tempfile::tempdir().unwrap();
    let out = Command::new(env!("CARGO_BIN_EXE_planloop"))
        .current_dir(dir.path())
        .env("HOME", dir.path())
        .env("XDG_CONFIG_HOME", dir.path().join(".config"))
        .output()
        .unwrap();
    assert!(!out.status.success());
    assert!(String::from_utf8_lossy(&out.stderr).contains("--task"));
}

#[test]
fn binary_lists_functions() {
    let out = Command::new(env!("CARGO_BIN_EXE_planloop")).arg("functions").output().unwrap();
    assert!(out.status.success());
    let stdout = String::from_utf8(out.stdout).unwrap();
    assert!(stdout.lines().any(|l| l == "create_task"));
    assert_eq!(stdout.lines().count(), 9);
}

#[test]
fn binary_shows_the_effective_config() {
    let dir = tempfile::tempdir().unwrap();
    let mut cmd = Command::new(env!("CARGO_BIN_EXE_planloop"));
    cmd.current_dir(dir.path())
        .env("HOME", dir.path())
        .env("XDG_CONFIG_HOME", dir.path().join(".config"))
        .env_remove("PLANLOOP_BACKEND")
        .args(["--max-rounds", "7", "show-config"]);
    let out = output_within(cmd, Duration::from_secs(30));
    assert!(out.status.success(), "stderr: {}", String::from_utf8_lossy(&out.stderr));

    let stdout = String::from_utf8(out.stdout).unwrap();
    assert!(stdout.contains("backend:"));
    assert!(stdout.contains("max_rounds: 7"));
}
