// Copyright (c) 2024-2026 Martin Schröder <info@swedishembedded.com>
//
// SPDX-License-Identifier: MIT
use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

/// The unit of work chosen for a round.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Phase {
    Gather,
    BuildPlan,
    Execute,
    ExecuteCode,
}

impl Phase {
    pub fn as_str(&self) -> &'static str {
        match self {
            Phase::Gather => "gather",
            Phase::BuildPlan => "build_plan",
            Phase::Execute => "execute",
            Phase::ExecuteCode => "execute_code",
        }
    }
}

impl fmt::Display for Phase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Phase {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "gather" => Ok(Phase::Gather),
            "build_plan" => Ok(Phase::BuildPlan),
            "execute" => Ok(Phase::Execute),
            "execute_code" => Ok(Phase::ExecuteCode),
            other => Err(other.to_string()),
        }
    }
}
