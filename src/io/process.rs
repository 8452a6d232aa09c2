//! Synchronous child-process invocation with timeouts and bounded output.
//!
//! A task exiting nonzero is not an error here: callers inspect
//! [`ProcessOutput::success`] explicitly. Failing to even launch the process
//! (executable not found, permission denied) is the one error this module
//! raises.

use std::io::Read;
use std::path::Path;
use std::process::{Command, ExitStatus, Stdio};
use std::thread;
use std::time::Duration;

use anyhow::{Context, Result, anyhow};
use tracing::{debug, error, instrument, warn};
use wait_timeout::ChildExt;

use crate::core::command::CommandSpec;

/// Captured child process output.
#[derive(Debug)]
pub struct ProcessOutput {
    pub status: ExitStatus,
    pub stdout: Vec<u8>,
    pub stderr: Vec<u8>,
    pub stdout_truncated: usize,
    pub stderr_truncated: usize,
    pub timed_out: bool,
}

impl ProcessOutput {
    pub fn success(&self) -> bool {
        !self.timed_out && self.status.success()
    }

    pub fn exit_code(&self) -> Option<i32> {
        self.status.code()
    }

    /// Stdout followed by stderr as lossy UTF-8, with truncation notices.
    pub fn combined(&self) -> String {
        let mut buf = String::new();
        buf.push_str(&String::from_utf8_lossy(&self.stdout));
        if self.stdout_truncated > 0 {
            buf.push_str(&format!(
                "\n[stdout truncated {} bytes]\n",
                self.stdout_truncated
            ));
        }
        if !self.stderr.is_empty() {
            if !buf.is_empty() && !buf.ends_with('\n') {
                buf.push('\n');
            }
            buf.push_str(&String::from_utf8_lossy(&self.stderr));
        }
        if self.stderr_truncated > 0 {
            buf.push_str(&format!(
                "\n[stderr truncated {} bytes]\n",
                self.stderr_truncated
            ));
        }
        buf
    }
}

/// Run a command spec to completion, capturing stdout/stderr without risking
/// pipe deadlocks.
///
/// Output is read concurrently while the child runs. `output_limit_bytes`
/// bounds the amount of stdout/stderr stored in memory (bytes beyond this are
/// discarded while still draining the pipe). On timeout the child is killed
/// and the result is marked `timed_out`.
#[instrument(skip_all, fields(timeout_secs = timeout.as_secs(), output_limit_bytes))]
pub fn run_spec(
    spec: &CommandSpec,
    workdir: &Path,
    timeout: Duration,
    output_limit_bytes: usize,
) -> Result<ProcessOutput> {
    let argv = spec.argv()?;
    let (program, args) = argv
        .split_first()
        .ok_or_else(|| anyhow!("empty command"))?;

    let mut cmd = Command::new(program);
    cmd.args(args)
        .current_dir(workdir)
        .stdin(Stdio::null())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped());

    debug!(command = %spec.command_line(), "spawning task process");
    let mut child = match cmd.spawn() {
        Ok(child) => child,
        Err(e) => {
            error!(err = %e, program, "failed to spawn command");
            return Err(e).with_context(|| format!("spawn `{}`", spec.command_line()));
        }
    };

    let stdout = child
        .stdout
        .take()
        .ok_or_else(|| anyhow!("stdout was not piped"))?;
    let stderr = child
        .stderr
        .take()
        .ok_or_else(|| anyhow!("stderr was not piped"))?;

    let stdout_handle = thread::spawn(move || read_stream_limited(stdout, output_limit_bytes));
    let stderr_handle = thread::spawn(move || read_stream_limited(stderr, output_limit_bytes));

    let mut timed_out = false;
    let status = match child.wait_timeout(timeout).context("wait for command")? {
        Some(status) => status,
        None => {
            warn!(
                timeout_secs = timeout.as_secs(),
                "command timed out, killing"
            );
            timed_out = true;
            child.kill().context("kill command")?;
            child.wait().context("wait command after kill")?
        }
    };

    let (stdout, stdout_truncated) = join_output(stdout_handle).context("join stdout")?;
    let (stderr, stderr_truncated) = join_output(stderr_handle).context("join stderr")?;

    if stdout_truncated > 0 || stderr_truncated > 0 {
        warn!(stdout_truncated, stderr_truncated, "output truncated");
    }

    debug!(exit_code = ?status.code(), timed_out, "command finished");
    Ok(ProcessOutput {
        status,
        stdout,
        stderr,
        stdout_truncated,
        stderr_truncated,
        timed_out,
    })
}

fn join_output(handle: thread::JoinHandle<Result<(Vec<u8>, usize)>>) -> Result<(Vec<u8>, usize)> {
    match handle.join() {
        Ok(result) => result,
        Err(_) => Err(anyhow!("output reader thread panicked")),
    }
}

fn read_stream_limited<R: Read>(mut reader: R, limit: usize) -> Result<(Vec<u8>, usize)> {
    let mut buf = Vec::new();
    let mut truncated = 0usize;
    let mut chunk = [0u8; 8192];

    loop {
        let n = reader.read(&mut chunk).context("read output")?;
        if n == 0 {
            break;
        }
        let remaining = limit.saturating_sub(buf.len());
        if remaining > 0 {
            let keep = n.min(remaining);
            buf.extend_from_slice(&chunk[..keep]);
            truncated += n.saturating_sub(keep);
        } else {
            truncated += n;
        }
    }

    Ok((buf, truncated))
}

#[cfg(test)]
mod tests {
    use super::*;

    const TIMEOUT: Duration = Duration::from_secs(10);

    #[test]
    fn captures_output_of_successful_command() {
        let temp = tempfile::tempdir().expect("tempdir");
        let spec = CommandSpec::from_args(["sh", "-c", "echo out; echo err >&2"]);
        let output = run_spec(&spec, temp.path(), TIMEOUT, 10_000).expect("run");

        assert!(output.success());
        assert_eq!(String::from_utf8_lossy(&output.stdout), "out\n");
        assert_eq!(String::from_utf8_lossy(&output.stderr), "err\n");
        assert!(output.combined().contains("out"));
        assert!(output.combined().contains("err"));
    }

    #[test]
    fn nonzero_exit_is_not_an_error() {
        let temp = tempfile::tempdir().expect("tempdir");
        let spec = CommandSpec::from_args(["sh", "-c", "echo diagnostics; exit 3"]);
        let output = run_spec(&spec, temp.path(), TIMEOUT, 10_000).expect("run");

        assert!(!output.success());
        assert_eq!(output.exit_code(), Some(3));
        assert!(output.combined().contains("diagnostics"));
    }

    #[test]
    fn launch_failure_is_an_error() {
        let temp = tempfile::tempdir().expect("tempdir");
        let spec = CommandSpec::from_args(["definitely-not-an-executable-4173"]);
        let err = run_spec(&spec, temp.path(), TIMEOUT, 10_000).unwrap_err();
        assert!(err.to_string().contains("spawn"));
    }

    #[test]
    fn output_beyond_limit_is_truncated() {
        let temp = tempfile::tempdir().expect("tempdir");
        let spec = CommandSpec::from_args(["sh", "-c", "printf 'aaaaaaaaaa'"]);
        let output = run_spec(&spec, temp.path(), TIMEOUT, 4).expect("run");

        assert_eq!(output.stdout, b"aaaa");
        assert_eq!(output.stdout_truncated, 6);
        assert!(output.combined().contains("[stdout truncated 6 bytes]"));
    }

    #[test]
    fn timeout_kills_child_and_marks_result() {
        let temp = tempfile::tempdir().expect("tempdir");
        let spec = CommandSpec::from_args(["sh", "-c", "sleep 30"]);
        let output = run_spec(&spec, temp.path(), Duration::from_millis(200), 10_000).expect("run");

        assert!(output.timed_out);
        assert!(!output.success());
    }
}
