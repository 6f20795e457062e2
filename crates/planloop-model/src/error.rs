// Copyright (c) 2024-2026 Martin Schröder <info@swedishembedded.com>
//
// SPDX-License-Identifier: MIT
use std::fmt;

use planloop_config::EndpointPaths;
use thiserror::Error;

/// The five remote operations a planning run talks to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Endpoint {
    Decide,
    Gather,
    Plan,
    CheckResults,
    WriteCode,
}

impl Endpoint {
    pub const ALL: [Endpoint; 5] = [
        Endpoint::Decide,
        Endpoint::Gather,
        Endpoint::Plan,
        Endpoint::CheckResults,
        Endpoint::WriteCode,
    ];

    /// Configured path of this endpoint, relative to the backend base URL.
    pub fn path<'a>(&self, paths: &'a EndpointPaths) -> &'a str {
        match self {
            Endpoint::Decide => &paths.decide,
            Endpoint::Gather => &paths.gather,
            Endpoint::Plan => &paths.plan,
            Endpoint::CheckResults => &paths.check_results,
            Endpoint::WriteCode => &paths.write_code,
        }
    }
}

impl fmt::Display for Endpoint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Endpoint::Decide => "decide",
            Endpoint::Gather => "gather",
            Endpoint::Plan => "plan",
            Endpoint::CheckResults => "check-results",
            Endpoint::WriteCode => "write-code",
        };
        f.write_str(s)
    }
}

#[derive(Debug, Error)]
pub enum BackendError {
    #[error("{endpoint} returned HTTP {status}: {body}")]
    Status { endpoint: Endpoint, status: u16, body: String },

    #[error("{endpoint} request failed: {source}")]
    Transport {
        endpoint: Endpoint,
        #[source]
        source: reqwest::Error,
    },

    #[error("{endpoint} response could not be decoded: {reason}")]
    Decode { endpoint: Endpoint, reason: String },

    #[error("{endpoint} response is missing `{field}`")]
    MissingField { endpoint: Endpoint, field: &'static str },

    #[error("no scripted response left for {0}")]
    Exhausted(Endpoint),
}

impl BackendError {
    pub fn endpoint(&self) -> Endpoint {
        match self {
            BackendError::Status { endpoint, .. }
            | BackendError::Transport { endpoint, .. }
            | BackendError::Decode { endpoint, .. }
            | BackendError::MissingField { endpoint, .. } => *endpoint,
            BackendError::Exhausted(endpoint) => *endpoint,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn endpoint_names_match_wire_paths() {
        let paths = EndpointPaths::default();
        for ep in Endpoint::ALL {
            assert!(ep.path(&paths).ends_with(&ep.to_string()), "{ep}");
        }
    }

    #[test]
    fn status_error_mentions_endpoint_and_code() {
        let e = BackendError::Status { endpoint: Endpoint::Gather, status: 502, body: "bad gateway".into() };
        assert_eq!(e.to_string(), "gather returned HTTP 502: bad gateway");
        assert_eq!(e.endpoint(), Endpoint::Gather);
    }
}
