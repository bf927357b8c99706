//! Running the external tools ksail drives (`docker`, `kind`, `k3d`).

use std::ffi::OsStr;
use std::io::{BufRead, BufReader, ErrorKind};

use duct::cmd;
use tracing::{debug, info};
use which::which;

use crate::error::{KsailError, Result};

/// Captured result of a finished tool invocation.
#[derive(Debug, Clone, Default)]
pub struct ToolOutput {
    pub success: bool,
    pub stdout: String,
    pub stderr: String,
}

/// Render `program arg1 arg2` for logs and error messages.
pub fn format_command<A: AsRef<OsStr>>(program: &str, args: &[A]) -> String {
    let mut rendered = program.to_string();
    for arg in args {
        rendered.push(' ');
        rendered.push_str(&arg.as_ref().to_string_lossy());
    }
    rendered
}

/// Run a tool to completion and capture both streams without judging the exit code.
pub fn run_tool<A: AsRef<OsStr>>(program: &str, args: &[A]) -> Result<ToolOutput> {
    let full_command = format_command(program, args);
    debug!("Running: {}", full_command);

    let output = cmd(program, args)
        .stdout_capture()
        .stderr_capture()
        .unchecked()
        .run()
        .map_err(|e| spawn_error(program, &full_command, e))?;

    Ok(ToolOutput {
        success: output.status.success(),
        stdout: String::from_utf8_lossy(&output.stdout).into_owned(),
        stderr: String::from_utf8_lossy(&output.stderr).into_owned(),
    })
}

/// Run a tool and return its stdout, failing with its stderr on a non-zero exit.
pub fn run_tool_checked<A: AsRef<OsStr>>(program: &str, args: &[A]) -> Result<String> {
    let output = run_tool(program, args)?;
    if output.success {
        Ok(output.stdout)
    } else {
        Err(KsailError::Command(format!(
            "{}: {}",
            format_command(program, args),
            output.stderr.trim()
        )))
    }
}

/// Stream a long-running tool's combined output through `tracing` line by line.
///
/// `kind create cluster` and friends take minutes; users see progress with
/// `--debug`, and the last lines are kept for the error message on failure.
pub fn stream_tool<A: AsRef<OsStr>>(program: &str, args: &[A]) -> Result<()> {
    let full_command = format_command(program, args);
    debug!("Streaming: {}", full_command);

    let reader = cmd(program, args)
        .stderr_to_stdout()
        .reader()
        .map_err(|e| spawn_error(program, &full_command, e))?;

    let mut tail: Vec<String> = Vec::new();
    for line in BufReader::new(reader).lines() {
        match line {
            Ok(line) => {
                info!(target: "ksail::tool", "{}", line);
                tail.push(line);
                if tail.len() > 20 {
                    tail.remove(0);
                }
            }
            // duct reports a non-zero exit as a read error once output is drained
            Err(e) => {
                return Err(KsailError::Command(format!(
                    "{} ({})\n{}",
                    full_command,
                    e,
                    tail.join("\n")
                )));
            }
        }
    }

    Ok(())
}

/// Checks if a command-line tool is available in the system's PATH.
pub fn is_tool_installed(tool_name: &str) -> bool {
    which(tool_name).is_ok()
}

/// Fail with a `Dependency` error when a required tool is missing.
pub fn ensure_tool(tool_name: &str) -> Result<()> {
    if is_tool_installed(tool_name) {
        Ok(())
    } else {
        Err(KsailError::Dependency(format!(
            "'{}' is not installed or not in PATH",
            tool_name
        )))
    }
}

fn spawn_error(program: &str, full_command: &str, err: std::io::Error) -> KsailError {
    if err.kind() == ErrorKind::NotFound {
        KsailError::Dependency(format!("'{}' is not installed or not in PATH", program))
    } else {
        KsailError::Command(format!("failed to run '{}': {}", full_command, err))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn formats_command_lines() {
        assert_eq!(
            format_command("kind", &["get", "clusters"]),
            "kind get clusters"
        );
        assert_eq!(format_command::<&str>("docker", &[]), "docker");
    }

    #[test]
    fn missing_tool_is_a_dependency_error() {
        let err = run_tool("ksail-definitely-not-a-real-binary", &["--version"])
            .expect_err("binary should not exist");
        assert!(matches!(err, KsailError::Dependency(_)));
        assert!(!is_tool_installed("ksail-definitely-not-a-real-binary"));
    }

    #[cfg(unix)]
    #[test]
    fn checked_run_reports_stderr() {
        let err = run_tool_checked("sh", &["-c", "echo boom >&2; exit 3"])
            .expect_err("non-zero exit should fail");
        assert!(err.to_string().contains("boom"));

        let out = run_tool_checked("sh", &["-c", "echo ok"]).expect("should succeed");
        assert_eq!(out.trim(), "ok");
    }
}
