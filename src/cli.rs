// Copyright (c) 2024-2026 Martin Schröder <info@swedishembedded.com>
//
// SPDX-License-Identifier: MIT
use clap::{CommandFactory, Parser, Subcommand, ValueEnum};
use clap_complete::{generate, Shell};
use planloop_config::BackendKind;
use std::path::PathBuf;

/// How run events are written to stdout.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, ValueEnum)]
pub enum OutputFormatArg {
    /// Human-readable progress, one block per event worth showing.
    #[default]
    Text,
    /// One JSON object per event (`{"event": ..., "round": ..., ...}`),
    /// followed by a final `{"summary": ...}` line.
    Json,
}

#[derive(Parser, Debug)]
#[command(
    name = "planloop",
    about = "Round-based planning agent for a personal task planner",
    version,
    long_about = None,
)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Option<Commands>,

    /// Todo item the run must complete. May be repeated:
    /// --task "schedule gym" --task "move dentist to Friday"
    #[arg(long = "task", short = 't', value_name = "TEXT")]
    pub tasks: Vec<String>,

    /// Initial context handed to the agents
    #[arg(long, short = 'x', value_name = "TEXT")]
    pub context: Option<String>,

    /// Read the initial context from a file ("-" reads stdin)
    #[arg(long, value_name = "PATH", conflicts_with = "context")]
    pub context_file: Option<PathBuf>,

    /// Backend answering the agent endpoints (overrides config)
    #[arg(long, short = 'b', value_enum, env = "PLANLOOP_BACKEND")]
    pub backend: Option<BackendKind>,

    /// Base URL of the agent endpoints (overrides config)
    #[arg(long, value_name = "URL", env = "PLANLOOP_BASE_URL")]
    pub base_url: Option<String>,

    /// Stop after this many rounds (0 = no limit). Overrides config.
    #[arg(long, value_name = "N")]
    pub max_rounds: Option<u32>,

    /// Mark todo items done one by one as their checks pass
    #[arg(long)]
    pub partial_completion: bool,

    /// JSON file with the tasks the in-memory store starts with
    #[arg(long, value_name = "PATH")]
    pub seed: Option<PathBuf>,

    /// Path to config file (layered on top of the discovered ones)
    #[arg(long, short = 'c')]
    pub config: Option<PathBuf>,

    /// Output format for run events (text | json)
    #[arg(long, value_enum, default_value = "text")]
    pub output_format: OutputFormatArg,

    /// Increase verbosity (-v = debug, -vv = trace)
    #[arg(long, short = 'v', action = clap::ArgAction::Count)]
    pub verbose: u8,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Generate shell completion script
    Completions {
        #[arg(value_enum)]
        shell: Shell,
    },
    /// Print the effective configuration and exit
    ShowConfig,
    /// List the task functions the agents and scripts may call
    Functions,
}

pub fn print_completions(shell: Shell) {
    let mut cmd = Cli::command();
    generate(shell, &mut cmd, "planloop", &mut std::io::stdout());
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn command_definition_is_consistent() {
        Cli::command().debug_assert();
    }

    #[test]
    fn tasks_repeat() {
        let cli = Cli::try_parse_from(["planloop", "-t", "a", "--task", "b", "--backend", "mock"]).unwrap();
        assert_eq!(cli.tasks, vec!["a", "b"]);
        assert_eq!(cli.backend, Some(BackendKind::Mock));
        assert_eq!(cli.output_format, OutputFormatArg::Text);
    }

    #[test]
    fn context_and_context_file_conflict() {
        let err = Cli::try_parse_from(["planloop", "--context", "x", "--context-file", "f.txt"]);
        assert!(err.is_err());
    }

    #[test]
    fn subcommands_parse() {
        let cli = Cli::try_parse_from(["planloop", "show-config"]).unwrap();
        assert!(matches!(cli.command, Some(Commands::ShowConfig)));
    }
}
