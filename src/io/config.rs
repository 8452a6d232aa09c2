//! Runner configuration stored in `hookrun.toml`.

use std::fs;
use std::path::Path;

use anyhow::{Context, Result, anyhow};
use regex::Regex;
use serde::{Deserialize, Serialize};

use crate::core::context::ContextKind;

/// Runner configuration (TOML).
///
/// This file is intended to be edited by humans and must remain stable and
/// automatable. Missing fields default to sensible values; a missing file is
/// equivalent to the defaults (no tasks, stash protection on).
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct HookConfig {
    pub stash: StashConfig,

    /// Stop executing remaining tasks after the first failure. Host-pipeline
    /// policy; the default is to run everything and report all failures.
    pub stop_on_failure: bool,

    /// Per-task wall-clock budget in seconds.
    pub task_timeout_secs: u64,

    /// Truncate captured task stdout/stderr beyond this many bytes.
    pub output_limit_bytes: usize,

    #[serde(rename = "task")]
    pub tasks: Vec<TaskConfig>,
}

/// Working-tree protection toggle. Immutable during a run.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct StashConfig {
    /// Stash unstaged/untracked changes around pre-commit task execution.
    pub enabled: bool,
}

impl Default for StashConfig {
    fn default() -> Self {
        Self { enabled: true }
    }
}

/// One configured external task.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct TaskConfig {
    pub name: String,

    /// Command tokens, e.g. `["cargo", "clippy", "--no-deps"]`.
    pub command: Vec<String>,

    /// File extensions (without the dot) that trigger this task. Empty means
    /// the task runs against every file in the context.
    #[serde(default)]
    pub triggered_by: Vec<String>,

    /// Regexes; matching paths are excluded from this task's file set.
    #[serde(default)]
    pub ignore_patterns: Vec<String>,

    /// Context kinds this task is eligible for. Defaults to all kinds.
    #[serde(default = "ContextKind::all")]
    pub contexts: Vec<ContextKind>,

    /// Append each eligible file as a discrete trailing argument.
    #[serde(default)]
    pub pass_files: bool,

    /// Append eligible files as one comma-joined token with this prefix,
    /// e.g. `"--filter="`. Mutually exclusive with `pass_files`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub files_flag: Option<String>,
}

impl Default for HookConfig {
    fn default() -> Self {
        Self {
            stash: StashConfig::default(),
            stop_on_failure: false,
            task_timeout_secs: 10 * 60,
            output_limit_bytes: 1_000_000,
            tasks: Vec::new(),
        }
    }
}

impl HookConfig {
    pub fn validate(&self) -> Result<()> {
        if self.task_timeout_secs == 0 {
            return Err(anyhow!("task_timeout_secs must be > 0"));
        }
        if self.output_limit_bytes == 0 {
            return Err(anyhow!("output_limit_bytes must be > 0"));
        }
        let mut names = Vec::new();
        for task in &self.tasks {
            if task.name.trim().is_empty() {
                return Err(anyhow!("task name must not be empty"));
            }
            if names.contains(&task.name.as_str()) {
                return Err(anyhow!("duplicate task name '{}'", task.name));
            }
            names.push(task.name.as_str());
            if task.command.is_empty() || task.command[0].trim().is_empty() {
                return Err(anyhow!(
                    "task '{}': command must be a non-empty array",
                    task.name
                ));
            }
            if task.contexts.is_empty() {
                return Err(anyhow!(
                    "task '{}': contexts must not be empty (omit the key for all)",
                    task.name
                ));
            }
            if task.pass_files && task.files_flag.is_some() {
                return Err(anyhow!(
                    "task '{}': pass_files and files_flag are mutually exclusive",
                    task.name
                ));
            }
            for pattern in &task.ignore_patterns {
                Regex::new(pattern).with_context(|| {
                    format!("task '{}': invalid ignore pattern `{pattern}`", task.name)
                })?;
            }
        }
        Ok(())
    }
}

/// Load config from a TOML file.
///
/// If the file is missing, returns `HookConfig::default()`.
pub fn load_config(path: &Path) -> Result<HookConfig> {
    if !path.exists() {
        let cfg = HookConfig::default();
        cfg.validate()?;
        return Ok(cfg);
    }
    let contents = fs::read_to_string(path).with_context(|| format!("read {}", path.display()))?;
    let cfg: HookConfig =
        toml::from_str(&contents).with_context(|| format!("parse {}", path.display()))?;
    cfg.validate()?;
    Ok(cfg)
}

/// Atomically write config to disk (temp file + rename).
pub fn write_config(path: &Path, cfg: &HookConfig) -> Result<()> {
    cfg.validate()?;
    let mut buf = toml::to_string_pretty(cfg).context("serialize config toml")?;
    buf.push('\n');
    write_atomic(path, &buf)
}

fn write_atomic(path: &Path, contents: &str) -> Result<()> {
    let parent = path
        .parent()
        .with_context(|| format!("config path missing parent {}", path.display()))?;
    if !parent.as_os_str().is_empty() {
        fs::create_dir_all(parent)
            .with_context(|| format!("create directory {}", parent.display()))?;
    }
    let tmp_path = path.with_extension("toml.tmp");
    fs::write(&tmp_path, contents)
        .with_context(|| format!("write temp config {}", tmp_path.display()))?;
    fs::rename(&tmp_path, path).with_context(|| format!("replace config {}", path.display()))?;
    Ok(())
}
