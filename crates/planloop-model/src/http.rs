// Copyright (c) 2024-2026 Martin Schröder <info@swedishembedded.com>
//
// SPDX-License-Identifier: MIT
use std::time::Duration;

use anyhow::Context;
use async_trait::async_trait;
use planloop_config::{BackendConfig, EndpointPaths};
use serde::{de::DeserializeOwned, Deserialize, Serialize};
use serde_json::Value;
use tracing::debug;

use crate::{
    AgentBackend, AssistantMessage, BackendError, CheckResultsRequest, DecideRequest, DecideResponse, Endpoint,
    PromptRequest, TaskResult, WriteCodeRequest, WriteCodeResponse,
};

/// Longest error body kept in a [`BackendError::Status`].
const MAX_ERROR_BODY: usize = 512;

/// JSON-over-HTTP driver for the planner's agent endpoints.
pub struct HttpBackend {
    base_url: String,
    paths: EndpointPaths,
    api_key: Option<String>,
    client: reqwest::Client,
}

impl HttpBackend {
    /// `timeout` of `None` leaves requests without a deadline.
    pub fn new(
        base_url: &str,
        paths: EndpointPaths,
        api_key: Option<String>,
        timeout: Option<Duration>,
    ) -> anyhow::Result<Self> {
        let mut builder = reqwest::Client::builder();
        if let Some(t) = timeout {
            builder = builder.timeout(t);
        }
        let client = builder.build().context("building HTTP client")?;
        Ok(Self {
            base_url: base_url.trim_end_matches('/').to_string(),
            paths,
            api_key,
            client,
        })
    }

    pub fn from_config(cfg: &BackendConfig) -> anyhow::Result<Self> {
        Self::new(
            &cfg.base_url,
            cfg.endpoints.clone(),
            resolve_api_key(cfg),
            cfg.request_timeout_secs.map(Duration::from_secs),
        )
    }

    pub fn url(&self, endpoint: Endpoint) -> String {
        let path = endpoint.path(&self.paths);
        if path.starts_with('/') {
            format!("{}{path}", self.base_url)
        } else {
            format!("{}/{path}", self.base_url)
        }
    }

    async fn post<Req, Resp>(&self, endpoint: Endpoint, body: &Req) -> Result<Resp, BackendError>
    where
        Req: Serialize + Sync,
        Resp: DeserializeOwned,
    {
        let url = self.url(endpoint);
        debug!(%endpoint, %url, "posting agent request");
        tracing::trace!(request_body = ?serde_json::to_value(body).ok(), "agent request body");

        let mut req = self.client.post(&url).json(body);
        if let Some(key) = &self.api_key {
            req = req.bearer_auth(key);
        }
        let resp = req.send().await.map_err(|source| BackendError::Transport { endpoint, source })?;
        let status = resp.status();
        let text = resp.text().await.map_err(|source| BackendError::Transport { endpoint, source })?;

        if !status.is_success() {
            return Err(BackendError::Status { endpoint, status: status.as_u16(), body: error_body(&text) });
        }
        debug!(%endpoint, status = status.as_u16(), bytes = text.len(), "agent response received");
        serde_json::from_str(&text).map_err(|e| BackendError::Decode { endpoint, reason: e.to_string() })
    }
}

pub(crate) fn resolve_api_key(cfg: &BackendConfig) -> Option<String> {
    if let Some(k) = &cfg.api_key {
        return Some(k.clone());
    }
    if let Some(env) = &cfg.api_key_env {
        return std::env::var(env).ok();
    }
    None
}

/// Prefer the server's `error`/`message` string over the raw body.
fn error_body(text: &str) -> String {
    let extracted = serde_json::from_str::<Value>(text).ok().and_then(|v| {
        ["error", "message"]
            .iter()
            .find_map(|k| v.get(*k).and_then(Value::as_str).map(str::to_string))
    });
    let mut body = extracted.unwrap_or_else(|| text.trim().to_string());
    if body.len() > MAX_ERROR_BODY {
        let mut cut = MAX_ERROR_BODY;
        while !body.is_char_boundary(cut) {
            cut -= 1;
        }
        body.truncate(cut);
        body.push('…');
    }
    body
}

#[derive(Deserialize)]
struct MessageEnvelope {
    message: Option<AssistantMessage>,
}

#[derive(Deserialize)]
struct ResultsEnvelope {
    results: Option<Vec<TaskResult>>,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct CodeEnvelope {
    #[serde(default)]
    pseudo_code: Option<String>,
    code: Option<String>,
}

#[async_trait]
impl AgentBackend for HttpBackend {
    fn name(&self) -> &str {
        "http"
    }

    async fn decide(&self, req: &DecideRequest) -> Result<DecideResponse, BackendError> {
        self.post(Endpoint::Decide, req).await
    }

    async fn gather(&self, req: &PromptRequest) -> Result<AssistantMessage, BackendError> {
        let env: MessageEnvelope = self.post(Endpoint::Gather, req).await?;
        env.message.ok_or(BackendError::MissingField { endpoint: Endpoint::Gather, field: "message" })
    }

    async fn build_plan(&self, req: &PromptRequest) -> Result<AssistantMessage, BackendError> {
        let env: MessageEnvelope = self.post(Endpoint::Plan, req).await?;
        env.message.ok_or(BackendError::MissingField { endpoint: Endpoint::Plan, field: "message" })
    }

    async fn check_results(&self, req: &CheckResultsRequest) -> Result<Vec<TaskResult>, BackendError> {
        let env: ResultsEnvelope = self.post(Endpoint::CheckResults, req).await?;
        env.results.ok_or(BackendError::MissingField { endpoint: Endpoint::CheckResults, field: "results" })
    }

    async fn write_code(&self, req: &WriteCodeRequest) -> Result<WriteCodeResponse, BackendError> {
        let env: CodeEnvelope = self.post(Endpoint::WriteCode, req).await?;
        let code = env.code.ok_or(BackendError::MissingField { endpoint: Endpoint::WriteCode, field: "code" })?;
        Ok(WriteCodeResponse { pseudo_code: env.pseudo_code.unwrap_or_default(), code })
    }
}

// ─── Unit tests ──────────────────────────────────────────────────────────────
