// Copyright (c) 2024-2026 Martin Schröder <info@swedishembedded.com>
//
// SPDX-License-Identifier: MIT
mod backend;
mod error;
mod http;
mod mock;
mod types;
mod yaml_mock;

pub use backend::AgentBackend;
pub use error::{BackendError, Endpoint};
pub use http::HttpBackend;
pub use mock::{RecordedRequest, ScriptedBackend};
pub use types::*;
pub use yaml_mock::{FailureDef, MockScript, ResultsStep, Step};

use anyhow::bail;
use planloop_config::{BackendConfig, BackendKind};

/// Environment variable that overrides `backend.mock_script_file`.
pub const MOCK_SCRIPT_ENV: &str = "PLANLOOP_MOCK_SCRIPT";

/// Construct a boxed [`AgentBackend`] from configuration.
///
/// - `http` → [`HttpBackend`]
/// - `mock` → [`ScriptedBackend`] loaded from the YAML script named by
///   `PLANLOOP_MOCK_SCRIPT` or `backend.mock_script_file`
pub fn from_config(cfg: &BackendConfig) -> anyhow::Result<Box<dyn AgentBackend>> {
    match cfg.kind {
        BackendKind::Http => Ok(Box::new(HttpBackend::from_config(cfg)?)),
        BackendKind::Mock => {
            // Prefer env var, then config field
            let script = std::env::var(MOCK_SCRIPT_ENV).ok().or_else(|| cfg.mock_script_file.clone());
            match script {
                Some(path) => Ok(Box::new(ScriptedBackend::from_yaml_file(path)?)),
                None => bail!("mock backend selected but no script given; set backend.mock_script_file or {MOCK_SCRIPT_ENV}"),
            }
        }
    }
}
