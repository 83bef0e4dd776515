//! External process execution
//!
//! [`CommandRunner`] is the seam between the orchestrator and the real
//! toolchain. [`SystemRunner`] spawns processes and blocks until they exit.

use std::process::Command;
use tracing::{debug, info};

use crate::error::{BuildError, Result};
use crate::steps::BuildStep;

/// Lines of stderr kept in a toolchain failure message
const STDERR_TAIL_LINES: usize = 20;

/// Captured result of a finished process
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CommandOutput {
    /// Exit code, `None` if the process was killed by a signal
    pub status: Option<i32>,
    pub stdout: String,
    pub stderr: String,
}

/// Runs one build step to completion
pub trait CommandRunner {
    /// Run `step`, returning its output on success
    ///
    /// A process that cannot be started or exits non-zero is reported as
    /// [`BuildError::Toolchain`].
    fn run(&self, step: &BuildStep) -> Result<CommandOutput>;
}

impl<R: CommandRunner + ?Sized> CommandRunner for &R {
    fn run(&self, step: &BuildStep) -> Result<CommandOutput> {
        (**self).run(step)
    }
}

/// Runs steps as real child processes
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemRunner;

impl CommandRunner for SystemRunner {
    fn run(&self, step: &BuildStep) -> Result<CommandOutput> {
        info!("Running: {}", step);

        let output = Command::new(&step.program)
            .args(&step.args)
            .envs(step.env.iter().map(|(k, v)| (k.as_str(), v.as_str())))
            .current_dir(&step.cwd)
            .output()
            .map_err(|e| BuildError::Toolchain {
                step: step.kind,
                message: format!("failed to start '{}': {}", step.program, e),
            })?;

        let captured = CommandOutput {
            status: output.status.code(),
            stdout: String::from_utf8_lossy(&output.stdout).into_owned(),
            stderr: String::from_utf8_lossy(&output.stderr).into_owned(),
        };

        for line in captured.stdout.lines() {
            debug!(step = %step.kind, "{}", line);
        }

        if output.status.success() {
            Ok(captured)
        } else {
            Err(failure(step, &captured))
        }
    }
}

/// Convert a non-zero exit into a toolchain error carrying the stderr tail
pub fn failure(step: &BuildStep, output: &CommandOutput) -> BuildError {
    let status = match output.status {
        Some(code) => format!("exit status {}", code),
        None => "terminated by signal".to_string(),
    };

    let lines: Vec<&str> = output.stderr.lines().collect();
    let tail = lines[lines.len().saturating_sub(STDERR_TAIL_LINES)..].join("\n");

    let message = if tail.is_empty() {
        format!("'{}' failed with {}", step.program, status)
    } else {
        format!("'{}' failed with {}:\n{}", step.program, status, tail)
    };

    BuildError::Toolchain {
        step: step.kind,
        message,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::steps::StepKind;
    use std::path::PathBuf;

    fn step(program: &str, args: &[&str]) -> BuildStep {
        BuildStep {
            kind: StepKind::Make,
            program: program.to_string(),
            args: args.iter().map(|s| s.to_string()).collect(),
            env: Vec::new(),
            cwd: std::env::temp_dir(),
        }
    }

    #[test]
    fn test_missing_program_is_toolchain_error() {
        let runner = SystemRunner;
        let err = runner
            .run(&step("definitely-not-a-real-build-tool-xyz", &[]))
            .unwrap_err();

        match err {
            BuildError::Toolchain { step, message } => {
                assert_eq!(step, StepKind::Make);
                assert!(message.contains("failed to start"));
            }
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[test]
    fn test_failure_message_keeps_stderr_tail() {
        let stderr: String = (0..50).map(|i| format!("line {}\n", i)).collect();
        let output = CommandOutput {
            status: Some(2),
            stdout: String::new(),
            stderr,
        };
        let err = failure(&step("make", &["-j4"]), &output);
        let msg = err.to_string();

        assert!(msg.contains("exit status 2"));
        assert!(msg.contains("line 49"));
        assert!(!msg.contains("line 29\n"));
        assert!(msg.contains("line 30"));
    }

    #[test]
    fn test_failure_without_stderr() {
        let output = CommandOutput {
            status: None,
            ..CommandOutput::default()
        };
        let msg = failure(&step("bash", &[]), &output).to_string();
        assert!(msg.contains("terminated by signal"));
    }

    #[cfg(unix)]
    #[test]
    fn test_runs_real_process() {
        let runner = SystemRunner;
        let mut s = step("sh", &["-c", "echo $GREETING; pwd"]);
        s.env.push(("GREETING".to_string(), "hello".to_string()));
        s.cwd = PathBuf::from("/");

        let output = runner.run(&s).unwrap();
        assert_eq!(output.status, Some(0));
        assert!(output.stdout.starts_with("hello"));
        assert!(output.stdout.contains('/'));

        let err = runner.run(&step("sh", &["-c", "echo boom >&2; exit 3"])).unwrap_err();
        assert!(err.to_string().contains("boom"));
    }
}
