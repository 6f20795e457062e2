// Copyright (c) 2024-2026 Martin Schröder <info@swedishembedded.com>
//
// SPDX-License-Identifier: MIT
mod cli;

use std::io::{self, Read, Write};
use std::sync::Arc;

use anyhow::{bail, Context};
use clap::Parser;
use serde_json::json;
use tokio::sync::mpsc;
use tracing::{info, warn};
use tracing_subscriber::{filter::EnvFilter, fmt, prelude::*};

use cli::{Cli, Commands, OutputFormatArg};
use planloop_config::Config;
use planloop_core::{AgentEvent, Agents, Coordinator, CoordinatorOptions, EventKind, RunOutcome, RunSummary, TodoList};
use planloop_model::AgentBackend;
use planloop_tools::{format_task_list, FunctionDispatcher, IdMapping, InMemoryTaskStore, Sandbox, SandboxLimits, TaskCall};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    init_logging(cli.verbose);

    // Handle subcommands first
    if let Some(cmd) = &cli.command {
        match cmd {
            Commands::Completions { shell } => {
                cli::print_completions(*shell);
                return Ok(());
            }
            Commands::ShowConfig => {
                let config = load_config(&cli)?;
                print!("{}", serde_yaml::to_string(&config).context("serializing config")?);
                return Ok(());
            }
            Commands::Functions => {
                for name in TaskCall::NAMES {
                    println!("{name}");
                }
                return Ok(());
            }
        }
    }

    let config = load_config(&cli)?;
    run(cli, config).await
}

/// Discovered config files, then `--config`, then command-line overrides.
fn load_config(cli: &Cli) -> anyhow::Result<Config> {
    let mut config = planloop_config::load(cli.config.as_deref())?;
    apply_overrides(cli, &mut config);
    Ok(config)
}

fn apply_overrides(cli: &Cli, config: &mut Config) {
    if let Some(kind) = cli.backend {
        config.backend.kind = kind;
    }
    if let Some(url) = &cli.base_url {
        config.backend.base_url = url.clone();
    }
    if let Some(n) = cli.max_rounds {
        config.coordinator.max_rounds = n;
    }
    if cli.partial_completion {
        config.coordinator.partial_completion = true;
    }
    if let Some(seed) = &cli.seed {
        config.store.seed_file = Some(seed.display().to_string());
    }
}

fn read_context(cli: &Cli) -> anyhow::Result<String> {
    match (&cli.context, &cli.context_file) {
        (Some(text), _) => Ok(text.clone()),
        (None, Some(path)) if path.as_os_str() == "-" => {
            let mut buf = String::new();
            io::stdin().read_to_string(&mut buf).context("reading context from stdin")?;
            Ok(buf.trim_end().to_string())
        }
        (None, Some(path)) => std::fs::read_to_string(path)
            .map(|s| s.trim_end().to_string())
            .with_context(|| format!("reading context file {}", path.display())),
        (None, None) => Ok(String::new()),
    }
}

async fn run(cli: Cli, config: Config) -> anyhow::Result<()> {
    if cli.tasks.is_empty() {
        bail!("nothing to do: pass at least one --task");
    }
    let context = read_context(&cli)?;

    let store = match config.store.seed_path() {
        Some(path) => InMemoryTaskStore::from_json_file(&path)?,
        None => InMemoryTaskStore::new(),
    };
    let store = Arc::new(store);
    let dispatcher = FunctionDispatcher::new(store.clone());
    let sandbox = Sandbox::new(dispatcher.clone(), SandboxLimits::from(&config.sandbox));
    let backend: Arc<dyn AgentBackend> = Arc::from(planloop_model::from_config(&config.backend)?);
    info!(backend = backend.name(), tasks = cli.tasks.len(), "starting run");

    let (tx, rx) = mpsc::channel(config.coordinator.event_buffer.max(1));
    let coordinator = Coordinator::new(
        Agents::remote(backend, dispatcher, sandbox),
        &context,
        TodoList::from_tasks(cli.tasks.iter().cloned()),
        tx,
    )
    .with_options(CoordinatorOptions::from(&config.coordinator));

    let format = cli.output_format;
    let (summary, mut mapping) = drive(coordinator, rx, format).await?;
    let tasks = store.snapshot().await;
    match format {
        OutputFormatArg::Json => {
            println!("{}", json!({ "summary": summary }));
        }
        OutputFormatArg::Text => {
            println!();
            print_summary(&summary);
            println!("{}", format_task_list("Tasks after the run:", &tasks, &mut mapping));
        }
    }

    if summary.outcome == RunOutcome::RoundLimit {
        bail!("round limit reached after {} rounds with work left", summary.rounds);
    }
    Ok(())
}

/// Run the coordinator to the end while printing its events.  Ctrl-C asks
/// for a stop at the next round boundary.
async fn drive(
    mut coordinator: Coordinator,
    rx: mpsc::Receiver<AgentEvent>,
    format: OutputFormatArg,
) -> anyhow::Result<(RunSummary, IdMapping)> {
    let stop = coordinator.stop_handle();
    let interrupt = tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            warn!("interrupt received; finishing the current round");
            stop.stop().await;
        }
    });

    let printer = tokio::spawn(print_events(rx, format));
    let result = coordinator.run().await;
    let mapping = coordinator.mapping().clone();

    // The printer ends once every sender is gone: the coordinator's and the
    // one inside the interrupt task's stop handle.
    interrupt.abort();
    let _ = interrupt.await;
    drop(coordinator);
    printer.await.context("event printer task failed")??;

    Ok((result?, mapping))
}

async fn print_events(mut rx: mpsc::Receiver<AgentEvent>, format: OutputFormatArg) -> anyhow::Result<()> {
    while let Some(ev) = rx.recv().await {
        let mut out = io::stdout().lock();
        match format {
            OutputFormatArg::Json => writeln!(out, "{}", serde_json::to_string(&ev)?)?,
            OutputFormatArg::Text => {
                if let Some(text) = describe(&ev) {
                    writeln!(out, "{text}")?;
                }
            }
        }
        out.flush()?;
    }
    Ok(())
}

/// Text-mode rendering.  Start events and `roundEnd` are left out; the
/// blocks that follow them carry the information.
fn describe(ev: &AgentEvent) -> Option<String> {
    let p = &ev.payload;
    let error = || p.error.as_deref().unwrap_or("unknown error");
    let text = match ev.kind {
        EventKind::RoundStart => format!("── round {} ──", p.round),
        EventKind::PhaseDecision => {
            let phase = p.decision.map(|d| d.to_string()).unwrap_or_default();
            match p.reason.as_deref().filter(|r| !r.is_empty()) {
                Some(reason) => format!("decision: {phase} ({reason})"),
                None => format!("decision: {phase}"),
            }
        }
        EventKind::FunctionCall => format!("  → {}", p.function.as_deref().unwrap_or("?")),
        EventKind::FunctionCallError => format!("  ✗ {}: {}", p.function.as_deref().unwrap_or("?"), error()),
        EventKind::GatherComplete => indent(p.new_info.as_deref()?.trim())?,
        EventKind::PlanBuildComplete => {
            let plan = p.plan.as_ref()?;
            if plan.is_empty() {
                "plan: (empty)".to_string()
            } else {
                let lines: Vec<String> = plan
                    .iter()
                    .map(|item| match &item.parameters {
                        Some(params) => format!("  - {} {params}", item.name),
                        None => format!("  - {}", item.name),
                    })
                    .collect();
                format!("plan:\n{}", lines.join("\n"))
            }
        }
        EventKind::ExecuteComplete => indent(p.results.as_deref()?)?,
        EventKind::PseudoCode => format!("pseudo-code:\n{}", indent(p.pseudo_code.as_deref()?)?),
        EventKind::Code => format!("code:\n{}", indent(p.code.as_deref()?)?),
        EventKind::ExecuteCodeComplete => indent(p.new_info.as_deref()?)?,
        EventKind::Stop => format!("stop requested in round {}", p.round),
        EventKind::Finished => format!("finished after round {}", p.round),
        kind if kind.is_error() => format!("{kind}: {}", error()),
        _ => return None,
    };
    Some(text)
}

fn indent(text: &str) -> Option<String> {
    if text.trim().is_empty() {
        return None;
    }
    Some(text.lines().map(|l| format!("  {l}")).collect::<Vec<_>>().join("\n"))
}

fn print_summary(summary: &RunSummary) {
    let outcome = match summary.outcome {
        RunOutcome::Completed => "all tasks done",
        RunOutcome::Stopped => "stopped",
        RunOutcome::RoundLimit => "round limit reached",
    };
    println!("Run {outcome} after {} round(s).", summary.rounds);
    for (task, done) in summary.todo.iter() {
        println!("  {} {task}", if done { "✓" } else { "○" });
    }
}

fn init_logging(verbosity: u8) {
    let level = match verbosity {
        0 => "warn",
        1 => "debug",
        _ => "trace",
    };
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(level));

    tracing_subscriber::registry()
        .with(fmt::layer().with_target(false).with_writer(std::io::stderr))
        .with(filter)
        .init();
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use planloop_core::{AgentEventPayload, Phase};
    use planloop_model::{ScriptedBackend, TaskResult};

    use super::*;

    fn event(kind: EventKind, payload: AgentEventPayload) -> AgentEvent {
        AgentEvent { kind, payload }
    }

    #[test]
    fn overrides_win_over_config() {
        let cli = Cli::try_parse_from([
            "planloop", "-t", "a", "--backend", "mock", "--max-rounds", "4", "--partial-completion",
        ])
        .unwrap();
        let mut config = Config::default();
        apply_overrides(&cli, &mut config);
        assert_eq!(config.backend.kind, planloop_config::BackendKind::Mock);
        assert_eq!(config.coordinator.max_rounds, 4);
        assert!(config.coordinator.partial_completion);
    }

    #[test]
    fn decision_line_includes_reason() {
        let ev = event(
            EventKind::PhaseDecision,
            AgentEventPayload { round: 2, decision: Some(Phase::Gather), reason: Some("need tasks".into()), ..Default::default() },
        );
        assert_eq!(describe(&ev).as_deref(), Some("decision: gather (need tasks)"));
    }

    #[test]
    fn quiet_events_are_skipped() {
        assert!(describe(&event(EventKind::RoundEnd, AgentEventPayload::default())).is_none());
        assert!(describe(&event(EventKind::GatherStart, AgentEventPayload::default())).is_none());
        let empty = AgentEventPayload { new_info: Some("  ".into()), ..Default::default() };
        assert!(describe(&event(EventKind::GatherComplete, empty)).is_none());
    }

    #[test]
    fn errors_show_their_event_name() {
        let ev = event(
            EventKind::GatherError,
            AgentEventPayload { error: Some("gather returned HTTP 500: boom".into()), ..Default::default() },
        );
        assert_eq!(describe(&ev).as_deref(), Some("gatherError: gather returned HTTP 500: boom"));
    }

    #[test]
    fn code_is_indented() {
        let ev = event(EventKind::Code, AgentEventPayload { code: Some("let a = 1;\nprint(a);".into()), ..Default::default() });
        assert_eq!(describe(&ev).as_deref(), Some("code:\n  let a = 1;\n  print(a);"));
    }

    #[tokio::test]
    async fn drive_returns_when_the_run_ends() {
        let backend: Arc<dyn AgentBackend> = Arc::new(
            ScriptedBackend::new()
                .decide("execute", "go")
                .check_results(vec![TaskResult::new("a", true)]),
        );
        let dispatcher = FunctionDispatcher::new(Arc::new(InMemoryTaskStore::new()));
        let sandbox = Sandbox::new(dispatcher.clone(), SandboxLimits::default());
        let (tx, rx) = mpsc::channel(16);
        let coordinator =
            Coordinator::new(Agents::remote(backend, dispatcher, sandbox), "", TodoList::from_tasks(["a"]), tx);

        let (summary, mapping) = tokio::time::timeout(Duration::from_secs(10), drive(coordinator, rx, OutputFormatArg::Json))
            .await
            .expect("event printer kept waiting after the run finished")
            .unwrap();
        assert_eq!(summary.outcome, RunOutcome::Completed);
        assert_eq!(summary.rounds, 1);
        assert!(mapping.is_empty());
    }
}
