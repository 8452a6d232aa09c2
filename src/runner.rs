//! Sequential task orchestration with stash-protected execution.
//!
//! Tasks run one at a time, in configuration order, each awaited to
//! completion before the next starts. Tasks may mutate shared state (the
//! working tree, generated caches), so concurrency would reintroduce exactly
//! the race the stash guard exists to prevent.

use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::{Context, Result};
use regex::Regex;
use tracing::{debug, info, instrument, warn};

use crate::core::command::CommandSpec;
use crate::core::context::{ContextKind, FileSet, RunContext};
use crate::core::result::{RunReport, TaskOutcome, TaskResult};
use crate::events::EventPipeline;
use crate::io::config::{HookConfig, TaskConfig};
use crate::io::process::run_spec;

/// A single quality-assurance task.
pub trait Task {
    fn name(&self) -> &str;

    /// Capability check: can this task run in the given context?
    fn can_run_in(&self, ctx: &RunContext) -> bool;

    /// Execute the task. A failing task is a `Failed` result, not an `Err`;
    /// `Err` is reserved for runner-level faults.
    fn run(&self, ctx: &RunContext) -> Result<TaskResult>;
}

/// Config-driven task that shells out to an external tool.
pub struct ExternalTask {
    name: String,
    command: Vec<String>,
    triggered_by: Vec<String>,
    ignore_patterns: Vec<Regex>,
    contexts: Vec<ContextKind>,
    pass_files: bool,
    files_flag: Option<String>,
    workdir: PathBuf,
    timeout: Duration,
    output_limit_bytes: usize,
}

impl ExternalTask {
    pub fn from_config(
        task: &TaskConfig,
        workdir: &Path,
        timeout: Duration,
        output_limit_bytes: usize,
    ) -> Result<Self> {
        let ignore_patterns = task
            .ignore_patterns
            .iter()
            .map(|pattern| {
                Regex::new(pattern).with_context(|| {
                    format!("task '{}': invalid ignore pattern `{pattern}`", task.name)
                })
            })
            .collect::<Result<Vec<_>>>()?;
        Ok(Self {
            name: task.name.clone(),
            command: task.command.clone(),
            triggered_by: task.triggered_by.clone(),
            ignore_patterns,
            contexts: task.contexts.clone(),
            pass_files: task.pass_files,
            files_flag: task.files_flag.clone(),
            workdir: workdir.to_path_buf(),
            timeout,
            output_limit_bytes,
        })
    }

    fn eligible_files(&self, ctx: &RunContext) -> FileSet {
        ctx.files()
            .with_extensions(&self.triggered_by)
            .reject_patterns(&self.ignore_patterns)
    }

    fn build_spec(&self, files: &FileSet) -> CommandSpec {
        let mut spec = CommandSpec::from_args(self.command.iter().cloned());
        let rendered: Vec<String> = files
            .iter()
            .map(|path| path.to_string_lossy().into_owned())
            .collect();
        if let Some(flag) = &self.files_flag {
            spec.push_comma_separated(flag, &rendered);
        } else if self.pass_files {
            for file in rendered {
                spec.push(file);
            }
        }
        spec
    }
}

impl Task for ExternalTask {
    fn name(&self) -> &str {
        &self.name
    }

    fn can_run_in(&self, ctx: &RunContext) -> bool {
        self.contexts.contains(&ctx.kind())
    }

    #[instrument(skip_all, fields(task = %self.name))]
    fn run(&self, ctx: &RunContext) -> Result<TaskResult> {
        let files = self.eligible_files(ctx);
        if files.is_empty() {
            debug!("no eligible files, skipping");
            return Ok(TaskResult::Skipped);
        }

        let spec = self.build_spec(&files);
        info!(files = files.len(), command = %spec.command_line(), "running task");

        let output = match run_spec(&spec, &self.workdir, self.timeout, self.output_limit_bytes) {
            Ok(output) => output,
            Err(err) => {
                // Launch failure is fatal for this task only; remaining tasks
                // still run.
                warn!(err = %err, "task process could not be launched");
                return Ok(TaskResult::Failed {
                    message: format!("failed to launch `{}`: {err:#}", spec.command_line()),
                });
            }
        };

        if output.timed_out {
            return Ok(TaskResult::Failed {
                message: format!(
                    "timed out after {}s\n{}",
                    self.timeout.as_secs(),
                    output.combined()
                ),
            });
        }
        if !output.success() {
            return Ok(TaskResult::Failed {
                message: output.combined(),
            });
        }
        Ok(TaskResult::Passed)
    }
}

/// Build the configured task list for a run.
pub fn tasks_from_config(cfg: &HookConfig, workdir: &Path) -> Result<Vec<Box<dyn Task>>> {
    cfg.tasks
        .iter()
        .map(|task| {
            ExternalTask::from_config(
                task,
                workdir,
                Duration::from_secs(cfg.task_timeout_secs),
                cfg.output_limit_bytes,
            )
            .map(|t| Box::new(t) as Box<dyn Task>)
        })
        .collect()
}

/// Policy knobs for a run, sourced from the host configuration.
#[derive(Debug, Clone, Default)]
pub struct RunOptions {
    pub stop_on_failure: bool,
}

/// Execute eligible tasks sequentially, bracketed by lifecycle events.
///
/// The stash guard subscribes to the pipeline, so a stash save strictly
/// precedes all task executions and exactly one pop attempt strictly follows
/// them on every exit path. A pop failure always propagates; when it races a
/// task error, the pop failure wins and carries the task error as context.
#[instrument(skip_all, fields(kind = ?ctx.kind(), files = ctx.files().len()))]
pub fn run_tasks(
    ctx: &RunContext,
    tasks: &[Box<dyn Task>],
    pipeline: &mut EventPipeline,
    options: &RunOptions,
) -> Result<RunReport> {
    pipeline.dispatch_before_run(ctx);

    let mut report = RunReport::default();
    let attempt = (|| -> Result<()> {
        for task in tasks {
            if !task.can_run_in(ctx) {
                debug!(task = task.name(), "task not eligible in this context");
                continue;
            }
            let result = task.run(ctx)?;
            let failed = result.is_failed();
            report.push(TaskOutcome {
                task: task.name().to_string(),
                result,
            });
            if failed && options.stop_on_failure {
                warn!(task = task.name(), "stopping on first failure");
                break;
            }
        }
        Ok(())
    })();

    match attempt {
        Ok(()) if !report.has_failures() => {
            pipeline.dispatch_after_run(ctx, &report)?;
            Ok(report)
        }
        Ok(()) => {
            pipeline.dispatch_on_error(ctx)?;
            Ok(report)
        }
        Err(err) => {
            if let Err(pop_err) = pipeline.dispatch_on_error(ctx) {
                return Err(pop_err.context(format!("while handling task error: {err:#}")));
            }
            Err(err)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::PathBuf;

    use anyhow::bail;

    use crate::test_support::{RecordingSubscriber, event_log};

    struct ScriptedTask {
        name: String,
        contexts: Vec<ContextKind>,
        result: Option<TaskResult>,
    }

    impl ScriptedTask {
        fn passing(name: &str) -> Self {
            Self {
                name: name.to_string(),
                contexts: ContextKind::all(),
                result: Some(TaskResult::Passed),
            }
        }

        fn failing(name: &str) -> Self {
            Self {
                result: Some(TaskResult::Failed {
                    message: format!("{name} broke"),
                }),
                ..Self::passing(name)
            }
        }

        fn erroring(name: &str) -> Self {
            Self {
                result: None,
                ..Self::passing(name)
            }
        }

        fn only_in(mut self, contexts: Vec<ContextKind>) -> Self {
            self.contexts = contexts;
            self
        }
    }

    impl Task for ScriptedTask {
        fn name(&self) -> &str {
            &self.name
        }

        fn can_run_in(&self, ctx: &RunContext) -> bool {
            self.contexts.contains(&ctx.kind())
        }

        fn run(&self, _ctx: &RunContext) -> Result<TaskResult> {
            match &self.result {
                Some(result) => Ok(result.clone()),
                None => bail!("{} blew up", self.name),
            }
        }
    }

    fn ctx(kind: ContextKind) -> RunContext {
        RunContext::new(kind, FileSet::new(vec![PathBuf::from("src/lib.rs")]))
    }

    fn boxed(tasks: Vec<ScriptedTask>) -> Vec<Box<dyn Task>> {
        tasks
            .into_iter()
            .map(|t| Box::new(t) as Box<dyn Task>)
            .collect()
    }

    #[test]
    fn runs_tasks_in_order_and_reports_all_results() {
        let tasks = boxed(vec![
            ScriptedTask::passing("lint"),
            ScriptedTask::failing("tests"),
            ScriptedTask::passing("fmt"),
        ]);
        let mut pipeline = EventPipeline::new();

        let report = run_tasks(
            &ctx(ContextKind::AdHoc),
            &tasks,
            &mut pipeline,
            &RunOptions::default(),
        )
        .expect("run");

        let names: Vec<_> = report.outcomes.iter().map(|o| o.task.as_str()).collect();
        assert_eq!(names, vec!["lint", "tests", "fmt"]);
        assert!(report.has_failures());
    }

    #[test]
    fn skips_tasks_not_eligible_for_the_context() {
        let tasks = boxed(vec![
            ScriptedTask::passing("everywhere"),
            ScriptedTask::passing("hook-only").only_in(vec![ContextKind::PreCommit]),
        ]);
        let mut pipeline = EventPipeline::new();

        let report = run_tasks(
            &ctx(ContextKind::AdHoc),
            &tasks,
            &mut pipeline,
            &RunOptions::default(),
        )
        .expect("run");

        let names: Vec<_> = report.outcomes.iter().map(|o| o.task.as_str()).collect();
        assert_eq!(names, vec!["everywhere"]);
    }

    #[test]
    fn stop_on_failure_halts_remaining_tasks() {
        let tasks = boxed(vec![
            ScriptedTask::failing("tests"),
            ScriptedTask::passing("fmt"),
        ]);
        let mut pipeline = EventPipeline::new();

        let report = run_tasks(
            &ctx(ContextKind::AdHoc),
            &tasks,
            &mut pipeline,
            &RunOptions {
                stop_on_failure: true,
            },
        )
        .expect("run");

        assert_eq!(report.outcomes.len(), 1);
        assert!(report.has_failures());
    }

    #[test]
    fn clean_run_dispatches_after_run() {
        let log = event_log();
        let mut pipeline = EventPipeline::new();
        pipeline.subscribe(Box::new(RecordingSubscriber::new("guard", log.clone())));
        let tasks = boxed(vec![ScriptedTask::passing("lint")]);

        run_tasks(
            &ctx(ContextKind::AdHoc),
            &tasks,
            &mut pipeline,
            &RunOptions::default(),
        )
        .expect("run");

        assert_eq!(
            log.borrow().as_slice(),
            ["guard:before_run", "guard:after_run"]
        );
    }

    #[test]
    fn failed_tasks_dispatch_on_error() {
        let log = event_log();
        let mut pipeline = EventPipeline::new();
        pipeline.subscribe(Box::new(RecordingSubscriber::new("guard", log.clone())));
        let tasks = boxed(vec![ScriptedTask::failing("tests")]);

        run_tasks(
            &ctx(ContextKind::AdHoc),
            &tasks,
            &mut pipeline,
            &RunOptions::default(),
        )
        .expect("run");

        assert_eq!(
            log.borrow().as_slice(),
            ["guard:before_run", "guard:on_error"]
        );
    }

    #[test]
    fn task_errors_still_dispatch_on_error_before_propagating() {
        let log = event_log();
        let mut pipeline = EventPipeline::new();
        pipeline.subscribe(Box::new(RecordingSubscriber::new("guard", log.clone())));
        let tasks = boxed(vec![ScriptedTask::erroring("broken")]);

        let err = run_tasks(
            &ctx(ContextKind::AdHoc),
            &tasks,
            &mut pipeline,
            &RunOptions::default(),
        )
        .unwrap_err();

        assert!(err.to_string().contains("broken blew up"));
        assert_eq!(
            log.borrow().as_slice(),
            ["guard:before_run", "guard:on_error"]
        );
    }

    #[test]
    fn pop_failure_wins_over_task_error() {
        let log = event_log();
        let mut pipeline = EventPipeline::new();
        pipeline.subscribe(Box::new(RecordingSubscriber::failing("guard", log.clone())));
        let tasks = boxed(vec![ScriptedTask::erroring("broken")]);

        let err = run_tasks(
            &ctx(ContextKind::AdHoc),
            &tasks,
            &mut pipeline,
            &RunOptions::default(),
        )
        .unwrap_err();

        let chain = format!("{err:#}");
        assert!(chain.contains("guard on_error failed"));
        assert!(chain.contains("broken blew up"));
    }
}
