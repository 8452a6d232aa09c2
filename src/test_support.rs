//! Test-only fixtures: real git repositories and scripted collaborators.

use std::cell::RefCell;
use std::fs;
use std::path::{Path, PathBuf};
use std::process::Command;
use std::rc::Rc;

use anyhow::{Context, Result, anyhow, bail};
use tempfile::TempDir;

use crate::core::context::RunContext;
use crate::core::result::RunReport;
use crate::events::RunSubscriber;
use crate::io::git::Repository;

/// Temp directory with an initialized git repository.
pub struct TestRepo {
    dir: TempDir,
}

impl TestRepo {
    pub fn new() -> Result<Self> {
        let dir = tempfile::tempdir().context("create tempdir")?;
        let repo = Self { dir };
        repo.git(&["init", "--quiet"])?;
        repo.git(&["config", "user.email", "hookrun@test.invalid"])?;
        repo.git(&["config", "user.name", "hookrun tests"])?;
        repo.git(&["config", "commit.gpgsign", "false"])?;
        Ok(repo)
    }

    pub fn path(&self) -> &Path {
        self.dir.path()
    }

    pub fn write_file(&self, rel: &str, contents: &str) -> Result<()> {
        let path = self.path().join(rel);
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)
                .with_context(|| format!("create dir {}", parent.display()))?;
        }
        fs::write(&path, contents).with_context(|| format!("write {}", path.display()))
    }

    pub fn read_file(&self, rel: &str) -> Result<String> {
        let path = self.path().join(rel);
        fs::read_to_string(&path).with_context(|| format!("read {}", path.display()))
    }

    pub fn stage_all(&self) -> Result<()> {
        self.git(&["add", "-A"]).map(|_| ())
    }

    pub fn stage(&self, rel: &str) -> Result<()> {
        self.git(&["add", rel]).map(|_| ())
    }

    pub fn commit(&self, message: &str) -> Result<()> {
        self.git(&["commit", "--quiet", "-m", message]).map(|_| ())
    }

    pub fn stash_list(&self) -> Result<Vec<String>> {
        let out = self.git(&["stash", "list"])?;
        Ok(out.lines().map(str::to_string).collect())
    }

    /// Run a git command in the repo, failing on nonzero exit.
    pub fn git(&self, args: &[&str]) -> Result<String> {
        let output = Command::new("git")
            .args(args)
            .current_dir(self.path())
            .output()
            .with_context(|| format!("spawn git {}", args.join(" ")))?;
        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            return Err(anyhow!("git {} failed: {}", args.join(" "), stderr.trim()));
        }
        Ok(String::from_utf8_lossy(&output.stdout).to_string())
    }
}

/// In-memory [`Repository`] fake recording every `run` invocation.
///
/// Clones share the call log, so tests can keep a handle while the guard owns
/// the fake.
#[derive(Clone, Default)]
pub struct FakeRepository {
    pending: Vec<PathBuf>,
    untracked: Vec<PathBuf>,
    staged: Vec<PathBuf>,
    tracked: Vec<PathBuf>,
    fail_save: bool,
    fail_pop: bool,
    calls: Rc<RefCell<Vec<String>>>,
}

impl FakeRepository {
    pub fn with_changes(pending: Vec<PathBuf>, untracked: Vec<PathBuf>) -> Self {
        Self {
            pending,
            untracked,
            ..Self::default()
        }
    }

    pub fn failing_save(mut self) -> Self {
        self.fail_save = true;
        self
    }

    pub fn failing_pop(mut self) -> Self {
        self.fail_pop = true;
        self
    }

    /// Every recorded `run` invocation as `"subcommand arg arg ..."`.
    pub fn calls(&self) -> Vec<String> {
        self.calls.borrow().clone()
    }

    /// Recorded `stash` invocations only.
    pub fn stash_calls(&self) -> Vec<String> {
        self.calls()
            .into_iter()
            .filter(|call| call.starts_with("stash"))
            .collect()
    }
}

impl Repository for FakeRepository {
    fn run(&self, subcommand: &str, args: &[&str]) -> Result<String> {
        self.calls
            .borrow_mut()
            .push(format!("{subcommand} {}", args.join(" ")));
        if subcommand == "stash" {
            if self.fail_save && args.contains(&"save") {
                bail!("simulated stash save failure");
            }
            if self.fail_pop && args.contains(&"pop") {
                bail!("simulated stash pop failure");
            }
        }
        Ok(String::new())
    }

    fn pending_diff(&self) -> Result<Vec<PathBuf>> {
        Ok(self.pending.clone())
    }

    fn untracked_files(&self) -> Result<Vec<PathBuf>> {
        Ok(self.untracked.clone())
    }

    fn staged_files(&self) -> Result<Vec<PathBuf>> {
        Ok(self.staged.clone())
    }

    fn tracked_files(&self) -> Result<Vec<PathBuf>> {
        Ok(self.tracked.clone())
    }
}

/// Shared, ordered log of lifecycle dispatches.
pub type EventLog = Rc<RefCell<Vec<String>>>;

pub fn event_log() -> EventLog {
    Rc::new(RefCell::new(Vec::new()))
}

/// Subscriber that records which lifecycle hooks fired, in order.
pub struct RecordingSubscriber {
    name: String,
    log: EventLog,
    fail: bool,
}

impl RecordingSubscriber {
    pub fn new(name: &str, log: EventLog) -> Self {
        Self {
            name: name.to_string(),
            log,
            fail: false,
        }
    }

    /// Variant whose `after_run`/`on_error` hooks return an error after
    /// recording.
    pub fn failing(name: &str, log: EventLog) -> Self {
        Self {
            fail: true,
            ..Self::new(name, log)
        }
    }

    fn record(&self, hook: &str) {
        self.log.borrow_mut().push(format!("{}:{hook}", self.name));
    }
}

impl RunSubscriber for RecordingSubscriber {
    fn before_run(&mut self, _ctx: &RunContext) {
        self.record("before_run");
    }

    fn after_run(&mut self, _ctx: &RunContext, _report: &RunReport) -> Result<()> {
        self.record("after_run");
        if self.fail {
            bail!("{} after_run failed", self.name);
        }
        Ok(())
    }

    fn on_error(&mut self, _ctx: &RunContext) -> Result<()> {
        self.record("on_error");
        if self.fail {
            bail!("{} on_error failed", self.name);
        }
        Ok(())
    }
}
