// Copyright (c) 2024-2026 Martin Schröder <info@swedishembedded.com>
//
// SPDX-License-Identifier: Apache-2.0
use std::path::PathBuf;

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub backend: BackendConfig,
    #[serde(default)]
    pub coordinator: CoordinatorConfig,
    #[serde(default)]
    pub sandbox: SandboxConfig,
    #[serde(default)]
    pub store: StoreConfig,
}

/// Which implementation answers the decide/gather/plan/check/write-code calls.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize, clap::ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum BackendKind {
    /// JSON over HTTP to the planner's agent endpoints
    #[default]
    Http,
    /// Canned responses read from a YAML script (offline runs and tests)
    Mock,
}

impl std::fmt::Display for BackendKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            BackendKind::Http => write!(f, "http"),
            BackendKind::Mock => write!(f, "mock"),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BackendConfig {
    #[serde(default)]
    pub kind: BackendKind,
    /// Base URL every endpoint path is appended to
    #[serde(default = "default_base_url")]
    pub base_url: String,
    /// Environment variable that holds the bearer token (read at runtime)
    pub api_key_env: Option<String>,
    /// Explicit bearer token; prefer api_key_env in config files to avoid
    /// secrets in version-controlled files
    pub api_key: Option<String>,
    /// Per-request timeout in seconds.  Unset means no deadline: a call that
    /// never answers stalls the run until it is stopped.
    pub request_timeout_secs: Option<u64>,
    #[serde(default)]
    pub endpoints: EndpointPaths,
    /// YAML script used when `kind = "mock"`.
    /// Can also be set via the PLANLOOP_MOCK_SCRIPT environment variable.
    pub mock_script_file: Option<String>,
}

fn default_base_url() -> String {
    "http://localhost:3000".into()
}

impl Default for BackendConfig {
    fn default() -> Self {
        Self {
            kind: BackendKind::Http,
            base_url: default_base_url(),
            api_key_env: None,
            api_key: None,
            request_timeout_secs: None,
            endpoints: EndpointPaths::default(),
            mock_script_file: None,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct EndpointPaths {
    pub decide: String,
    pub gather: String,
    pub plan: String,
    pub check_results: String,
    pub write_code: String,
}

impl Default for EndpointPaths {
    fn default() -> Self {
        Self {
            decide: "/api/agent/decide".into(),
            gather: "/api/agent/gather".into(),
            plan: "/api/agent/plan".into(),
            check_results: "/api/agent/check-results".into(),
            write_code: "/api/agent/write-code".into(),
        }
    }
}

fn default_max_rounds() -> u32 {
    25
}
fn default_event_buffer() -> usize {
    256
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CoordinatorConfig {
    /// Rounds after which the run stops itself (0 = no limit)
    #[serde(default = "default_max_rounds")]
    pub max_rounds: u32,
    /// Mark tasks done one by one from the check-results verdicts instead of
    /// requiring every verdict to be true before marking the whole list.
    #[serde(default)]
    pub partial_completion: bool,
    /// Capacity of the event channel handed to consumers
    #[serde(default = "default_event_buffer")]
    pub event_buffer: usize,
}

impl Default for CoordinatorConfig {
    fn default() -> Self {
        Self {
            max_rounds: default_max_rounds(),
            partial_completion: false,
            event_buffer: default_event_buffer(),
        }
    }
}

fn default_sandbox_timeout_ms() -> u64 {
    5_000
}
fn default_max_operations() -> u64 {
    1_000_000
}
fn default_max_output_bytes() -> usize {
    64 * 1024
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SandboxConfig {
    /// Wall-clock limit for one generated script
    #[serde(default = "default_sandbox_timeout_ms")]
    pub timeout_ms: u64,
    /// Interpreter operation budget (0 = unlimited)
    #[serde(default = "default_max_operations")]
    pub max_operations: u64,
    /// Captured print output beyond this size aborts the script
    #[serde(default = "default_max_output_bytes")]
    pub max_output_bytes: usize,
}

impl Default for SandboxConfig {
    fn default() -> Self {
        Self {
            timeout_ms: default_sandbox_timeout_ms(),
            max_operations: default_max_operations(),
            max_output_bytes: default_max_output_bytes(),
        }
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct StoreConfig {
    /// JSON file with initial tasks for the in-memory store (`~` is expanded)
    pub seed_file: Option<String>,
}

impl StoreConfig {
    pub fn seed_path(&self) -> Option<PathBuf> {
        self.seed_file
            .as_deref()
            .map(|p| PathBuf::from(shellexpand::tilde(p).into_owned()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_match_documented_values() {
        let cfg = Config::default();
        assert_eq!(cfg.backend.kind, BackendKind::Http);
        assert_eq!(cfg.backend.endpoints.decide, "/api/agent/decide");
        assert_eq!(cfg.coordinator.max_rounds, 25);
        assert!(!cfg.coordinator.partial_completion);
        assert_eq!(cfg.sandbox.timeout_ms, 5_000);
        assert!(cfg.backend.request_timeout_secs.is_none());
    }

    #[test]
    fn partial_tables_fill_in_defaults() {
        let cfg: Config = toml::from_str(
            r#"[backend.endpoints]
gather = "/v2/gather"

[sandbox]
timeout_ms = 250"#,
        )
        .unwrap();
        assert_eq!(cfg.backend.endpoints.gather, "/v2/gather");
        assert_eq!(cfg.backend.endpoints.plan, "/api/agent/plan");
        assert_eq!(cfg.sandbox.timeout_ms, 250);
        assert_eq!(cfg.sandbox.max_operations, 1_000_000);
    }

    #[test]
    fn backend_kind_parses_lowercase() {
        let cfg: Config = toml::from_str("[backend]\nkind = \"mock\"").unwrap();
        assert_eq!(cfg.backend.kind, BackendKind::Mock);
        assert_eq!(cfg.backend.kind.to_string(), "mock");
    }

    #[test]
    fn seed_path_expands_home() {
        let store = StoreConfig { seed_file: Some("~/tasks.json".into()) };
        let path = store.seed_path().unwrap();
        assert!(!path.to_string_lossy().starts_with('~'));
    }
}
