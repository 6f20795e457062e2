// Copyright (c) 2024-2026 Martin Schröder <info@swedishembedded.com>
//
// SPDX-License-Identifier: MIT
use std::path::{Path, PathBuf};

use anyhow::Context;
use tracing::debug;

use crate::Config;

/// Ordered list of config file locations searched from lowest to highest priority.
/// Later files override earlier ones.
fn config_search_paths() -> Vec<PathBuf> {
    let mut paths = Vec::new();

    // 1. System-wide default
    paths.push(PathBuf::from("/etc/planloop/config.toml"));

    // 2. XDG / home
    if let Some(home) = dirs::home_dir() {
        paths.push(home.join(".config/planloop/config.toml"));
    }
    if let Some(cfg) = dirs::config_dir() {
        let xdg = cfg.join("planloop/config.toml");
        if !paths.contains(&xdg) {
            paths.push(xdg);
        }
    }

    // 3. Workspace-local
    paths.push(PathBuf::from(".planloop/config.toml"));
    paths.push(PathBuf::from("planloop.toml"));

    paths
}

/// Load configuration by merging all discovered TOML files.
/// The `extra` argument may provide an explicit path (e.g. `--config` CLI flag).
pub fn load(extra: Option<&Path>) -> anyhow::Result<Config> {
    let mut merged = toml::Value::Table(toml::map::Map::new());

    for path in config_search_paths() {
        if path.is_file() {
            debug!(path = %path.display(), "loading config layer");
            merge_toml(&mut merged, read_layer(&path)?);
        }
    }

    if let Some(p) = extra {
        debug!(path = %p.display(), "loading explicit config");
        merge_toml(&mut merged, read_layer(p)?);
    }

    let config: Config = merged
        .try_into()
        .context("config files do not match the expected schema")?;
    Ok(config)
}

fn read_layer(path: &Path) -> anyhow::Result<toml::Value> {
    let text = std::fs::read_to_string(path)
        .with_context(|| format!("reading {}", path.display()))?;
    toml::from_str(&text).with_context(|| format!("parsing {}", path.display()))
}

/// Deep-merge `src` into `dst`; src wins on scalar conflicts.
fn merge_toml(dst: &mut toml::Value, src: toml::Value) {
    match (dst, src) {
        (toml::Value::Table(d), toml::Value::Table(s)) => {
            for (k, v) in s {
                match d.get_mut(&k) {
                    Some(existing) => merge_toml(existing, v),
                    None => {
                        d.insert(k, v);
                    }
                }
            }
        }
        (dst, src) => *dst = src,
    }
}

// ─── Unit tests ──────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;

    fn val(s: &str) -> toml::Value {
        toml::from_str(s).unwrap()
    }

    #[test]
    fn merge_scalar_src_wins() {
        let mut dst = val(r#"x = 1"#);
        let src = val(r#"x = 2"#);
        merge_toml(&mut dst, src);
        assert_eq!(dst["x"].as_integer(), Some(2));
    }

    #[test]
    fn merge_preserves_keys_not_in_src() {
        let mut dst = val("a = 1\nb = 2");
        let src = val(r#"b = 99"#);
        merge_toml(&mut dst, src);
        assert_eq!(dst["a"].as_integer(), Some(1));
        assert_eq!(dst["b"].as_integer(), Some(99));
    }

    #[test]
    fn merge_nested_tables() {
        let mut dst = val(r#"[backend]
kind = "http"
base_url = "http://a""#);
        let src = val(r#"[backend]
base_url = "http://b""#);
        merge_toml(&mut dst, src);
        assert_eq!(dst["backend"]["kind"].as_str(), Some("http"));
        assert_eq!(dst["backend"]["base_url"].as_str(), Some("http://b"));
    }

    #[test]
    fn load_fails_for_missing_explicit_path() {
        let result = load(Some(Path::new("/tmp/planloop_nonexistent_config_xyz.toml")));
        assert!(result.is_err());
    }

    #[test]
    fn load_explicit_file_overrides_defaults() {
        use std::io::Write;
        let mut f = tempfile::NamedTempFile::new().unwrap();
        writeln!(f, r#"[backend]
kind = "mock"
mock_script_file = "script.yaml"

[coordinator]
max_rounds = 3"#).unwrap();
        let cfg = load(Some(f.path())).unwrap();
        assert_eq!(cfg.backend.kind, crate::BackendKind::Mock);
        assert_eq!(cfg.backend.mock_script_file.as_deref(), Some("script.yaml"));
        assert_eq!(cfg.coordinator.max_rounds, 3);
        assert_eq!(cfg.sandbox.timeout_ms, 5_000);
    }

    #[test]
    fn load_rejects_wrong_types() {
        use std::io::Write;
        let mut f = tempfile::NamedTempFile::new().unwrap();
        writeln!(f, "[coordinator]\nmax_rounds = \"many\"").unwrap();
        assert!(load(Some(f.path())).is_err());
    }
}
