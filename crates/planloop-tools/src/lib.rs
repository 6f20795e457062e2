// Copyright (c) 2024-2026 Martin Schröder <info@swedishembedded.com>
//
// SPDX-License-Identifier: MIT
mod call;
mod dispatch;
mod error;
mod format;
mod mapping;
mod sandbox;
mod service;
mod task;

pub use call::{TaskCall, TaskRef};
pub use dispatch::{FunctionDispatcher, FunctionOutput};
pub use error::{SandboxError, ToolError};
pub use format::{format_task, format_task_list};
pub use mapping::IdMapping;
pub use sandbox::{Sandbox, SandboxLimits, SandboxRun};
pub use service::{InMemoryTaskStore, TaskService};
pub use task::{NewTask, Task, TaskPatch};
