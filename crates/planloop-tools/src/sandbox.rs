// Copyright (c) 2024-2026 Martin Schröder <info@swedishembedded.com>
//
// SPDX-License-Identifier: MIT
//! Restricted interpreter for model-written scripts.
//!
//! Scripts are Rhai.  The engine sees only the task functions (the same
//! names and argument objects as [`TaskCall`]) plus `print`/`debug`, whose
//! output is captured.  A script runs on the blocking pool and is cut off
//! when it exceeds the wall-clock limit, the operation budget or the output
//! cap.

use std::cell::{Cell, RefCell};
use std::rc::Rc;
use std::time::{Duration, Instant};

use planloop_config::SandboxConfig;
use rhai::{Dynamic, Engine, EvalAltResult};
use serde_json::Value;
use tokio::runtime::Handle;
use tracing::debug;

use crate::call::TaskCall;
use crate::dispatch::FunctionDispatcher;
use crate::error::SandboxError;
use crate::mapping::IdMapping;

const TERMINATE_TIMEOUT: &str = "timeout";
const TERMINATE_OUTPUT: &str = "output";

#[derive(Debug, Clone)]
pub struct SandboxLimits {
    pub timeout: Duration,
    pub max_operations: u64,
    pub max_output_bytes: usize,
}

impl Default for SandboxLimits {
    fn default() -> Self {
        Self::from(&SandboxConfig::default())
    }
}

impl From<&SandboxConfig> for SandboxLimits {
    fn from(cfg: &SandboxConfig) -> Self {
        Self {
            timeout: Duration::from_millis(cfg.timeout_ms),
            max_operations: cfg.max_operations,
            max_output_bytes: cfg.max_output_bytes,
        }
    }
}

/// Outcome of a script that ran to completion.
#[derive(Debug, Clone)]
pub struct SandboxRun {
    /// Captured `print`/`debug` lines, then the script's final value if any.
    pub output: String,
    /// The mapping after every task the script touched was registered.
    pub mapping: IdMapping,
}

#[derive(Clone)]
pub struct Sandbox {
    dispatcher: FunctionDispatcher,
    limits: SandboxLimits,
}

impl Sandbox {
    pub fn new(dispatcher: FunctionDispatcher, limits: SandboxLimits) -> Self {
        Self { dispatcher, limits }
    }

    pub fn limits(&self) -> &SandboxLimits {
        &self.limits
    }

    pub async fn run(&self, code: &str, mapping: IdMapping) -> Result<SandboxRun, SandboxError> {
        let handle = Handle::current();
        let dispatcher = self.dispatcher.clone();
        let limits = self.limits.clone();
        let code = code.to_string();
        let timeout = self.limits.timeout;

        let job = tokio::task::spawn_blocking(move || run_script(&handle, dispatcher, &limits, &code, mapping));

        // The progress callback stops pure computation; this catches a script
        // stuck inside a slow host call.  The worker thread is abandoned.
        match tokio::time::timeout(timeout + Duration::from_millis(250), job).await {
            Err(_) => Err(SandboxError::Timeout(timeout.as_millis() as u64)),
            Ok(Err(join)) => Err(SandboxError::Worker(join.to_string())),
            Ok(Ok(result)) => result,
        }
    }
}

struct Host {
    handle: Handle,
    dispatcher: FunctionDispatcher,
    mapping: RefCell<IdMapping>,
}

impl Host {
    fn call(&self, name: &str, args: Option<rhai::Map>) -> Result<Dynamic, Box<EvalAltResult>> {
        let params: Option<Value> = match args {
            Some(map) => Some(rhai::serde::from_dynamic(&Dynamic::from_map(map))?),
            None => None,
        };
        let mut mapping = self.mapping.borrow_mut();
        let out = self
            .handle
            .block_on(self.dispatcher.execute_named(name, params.as_ref(), &mut mapping))
            .map_err(|e| -> Box<EvalAltResult> { format!("{name}: {e}").into() })?;
        debug!(function = name, "sandbox host call");
        rhai::serde::to_dynamic(&out.data)
    }
}

fn run_script(
    handle: &Handle,
    dispatcher: FunctionDispatcher,
    limits: &SandboxLimits,
    code: &str,
    mapping: IdMapping,
) -> Result<SandboxRun, SandboxError> {
    let host = Rc::new(Host { handle: handle.clone(), dispatcher, mapping: RefCell::new(mapping) });
    let output = Rc::new(RefCell::new(String::new()));
    let overflow = Rc::new(Cell::new(false));

    let mut engine = Engine::new();
    engine.set_max_operations(limits.max_operations);
    engine.set_max_call_levels(32);
    engine.set_max_expr_depths(64, 32);
    engine.set_max_string_size(limits.max_output_bytes.max(1024));
    engine.disable_symbol("eval");

    for &name in TaskCall::NAMES {
        let h = host.clone();
        engine.register_fn(name, move |args: rhai::Map| h.call(name, Some(args)));
        let h = host.clone();
        engine.register_fn(name, move || h.call(name, None));
    }

    let (out, flag, max) = (output.clone(), overflow.clone(), limits.max_output_bytes);
    engine.on_print(move |s| append_line(&out, &flag, max, s));
    let (out, flag) = (output.clone(), overflow.clone());
    engine.on_debug(move |s, _src, _pos| append_line(&out, &flag, max, s));

    let started = Instant::now();
    let timeout = limits.timeout;
    let flag = overflow.clone();
    engine.on_progress(move |_ops| {
        if flag.get() {
            Some(Dynamic::from(TERMINATE_OUTPUT))
        } else if started.elapsed() > timeout {
            Some(Dynamic::from(TERMINATE_TIMEOUT))
        } else {
            None
        }
    });

    let ast = engine.compile(code).map_err(|e| SandboxError::Compile(e.to_string()))?;
    let value = engine.eval_ast::<Dynamic>(&ast).map_err(|e| match *e {
        EvalAltResult::ErrorTerminated(token, _) if token.to_string() == TERMINATE_OUTPUT => {
            SandboxError::OutputLimit(limits.max_output_bytes)
        }
        EvalAltResult::ErrorTerminated(..) => SandboxError::Timeout(timeout.as_millis() as u64),
        other => SandboxError::Runtime(other.to_string()),
    })?;

    if overflow.get() {
        return Err(SandboxError::OutputLimit(limits.max_output_bytes));
    }

    let mut text = output.borrow().clone();
    if !value.is_unit() {
        let rendered = rhai::serde::from_dynamic::<Value>(&value)
            .map(|v| match v {
                Value::String(s) => s,
                other => other.to_string(),
            })
            .unwrap_or_else(|_| value.to_string());
        text.push_str(&rendered);
    }
    debug!(elapsed_ms = started.elapsed().as_millis() as u64, bytes = text.len(), "sandbox script finished");

    // Closures registered on the engine hold clones of `host`.
    drop(engine);
    let mapping = Rc::try_unwrap(host)
        .map(|h| h.mapping.into_inner())
        .map_err(|_| SandboxError::Worker("host still borrowed after script finished".into()))?;
    Ok(SandboxRun { output: text.trim_end().to_string(), mapping })
}

fn append_line(out: &RefCell<String>, overflow: &Cell<bool>, max: usize, line: &str) {
    let mut buf = out.borrow_mut();
    if buf.len() + line.len() + 1 > max {
        overflow.set(true);
        return;
    }
    buf.push_str(line);
    buf.push('\n');
}

// ─── Unit tests ──────────────────────────────────────────────────────────────
