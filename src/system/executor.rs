// src/system/executor.rs

use log::{debug, warn};
use std::io::{ErrorKind, Read};
use std::process::{Child, Command as StdCommand, Stdio};
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};
use thiserror::Error;

/// Failures running an external program.
#[derive(Error, Debug)]
pub enum ExecutionError {
    /// The command line could not be split.
    #[error("Command could not be parsed: {0}")]
    CommandParse(String),
    /// The command line is empty.
    #[error("No command specified to run.")]
    EmptyCommand,
    /// The program could not be started.
    #[error("Command '{0}' could not be executed: {1}")]
    CommandFailed(String, std::io::Error),
    /// The program exited with a failure status.
    #[error("Command '{command}' exited with a non-zero error code: {stderr}")]
    NonZeroExitStatus { command: String, stderr: String },
    /// The program printed something that is not UTF-8.
    #[error("Command '{command}' produced output that was not valid UTF-8")]
    InvalidUtf8Output {
        command: String,
        #[source]
        source: std::string::FromUtf8Error,
    },
    /// The program did not finish in time and was killed.
    #[error("Command '{command}' did not finish within {timeout:?} and was killed.")]
    TimedOut { command: String, timeout: Duration },
}

/// Splits a configured command line (`"caget -w 1"`) into program and arguments.
pub fn split_command_line(command_line: &str) -> Result<Vec<String>, ExecutionError> {
    let trimmed = command_line.trim();
    if trimmed.is_empty() {
        return Err(ExecutionError::EmptyCommand);
    }
    let parts = shlex::split(trimmed).ok_or_else(|| ExecutionError::CommandParse(trimmed.to_string()))?;
    if parts.is_empty() {
        return Err(ExecutionError::EmptyCommand);
    }
    Ok(parts)
}

/// Runs `argv` to completion and returns its trimmed standard output.
/// The child is killed once `timeout` elapses.
pub fn execute_and_capture_output(argv: &[String], timeout: Duration) -> Result<String, ExecutionError> {
    let Some((program, args)) = argv.split_first() else {
        return Err(ExecutionError::EmptyCommand);
    };
    let display = shlex::try_join(argv.iter().map(String::as_str)).unwrap_or_else(|_| argv.join(" "));

    let mut child = StdCommand::new(program)
        .args(args)
        .stdin(Stdio::null())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .spawn()
        .map_err(|e| ExecutionError::CommandFailed(display.clone(), e))?;

    // Drain both pipes on their own threads so a chatty child cannot block on a full pipe.
    let stdout = drain(child.stdout.take());
    let stderr = drain(child.stderr.take());

    let deadline = Instant::now() + timeout;
    let status = loop {
        match child.try_wait() {
            Ok(Some(status)) => break status,
            Ok(None) if Instant::now() >= deadline => {
                kill(&mut child);
                return Err(ExecutionError::TimedOut {
                    command: display,
                    timeout,
                });
            }
            Ok(None) => thread::sleep(Duration::from_millis(10)),
            Err(e) => {
                kill(&mut child);
                return Err(ExecutionError::CommandFailed(display, e));
            }
        }
    };

    let stdout = collect(stdout);
    let stderr = String::from_utf8_lossy(&collect(stderr)).trim().to_string();
    if !status.success() {
        return Err(ExecutionError::NonZeroExitStatus {
            command: display,
            stderr,
        });
    }
    if !stderr.is_empty() {
        debug!("'{}' wrote to stderr: {}", display, stderr);
    }

    String::from_utf8(stdout)
        .map(|s| s.trim().to_string())
        .map_err(|e| ExecutionError::InvalidUtf8Output {
            command: display,
            source: e,
        })
}

fn drain<R: Read + Send + 'static>(pipe: Option<R>) -> Option<JoinHandle<Vec<u8>>> {
    pipe.map(|mut pipe| {
        thread::spawn(move || {
            let mut buffer = Vec::new();
            if let Err(e) = pipe.read_to_end(&mut buffer) {
                if e.kind() != ErrorKind::BrokenPipe {
                    debug!("Failed to read child output: {}", e);
                }
            }
            buffer
        })
    })
}

fn collect(handle: Option<JoinHandle<Vec<u8>>>) -> Vec<u8> {
    handle.and_then(|h| h.join().ok()).unwrap_or_default()
}

fn kill(child: &mut Child) {
    debug!("Killing child process (PID: {})...", child.id());
    if let Err(e) = child.kill() {
        warn!("Failed to kill child process {}: {}", child.id(), e);
    }
    // Reap it so no zombie is left behind.
    child.wait().ok();
}

#[cfg(test)]
mod tests {
    use super::*;

    fn argv(parts: &[&str]) -> Vec<String> {
        parts.iter().map(|p| p.to_string()).collect()
    }

    #[test]
    fn test_split_command_line() {
        assert_eq!(
            split_command_line("caget -w '1.5'").unwrap(),
            vec!["caget", "-w", "1.5"]
        );
        assert!(matches!(split_command_line("  "), Err(ExecutionError::EmptyCommand)));
        assert!(matches!(
            split_command_line("caget 'open"),
            Err(ExecutionError::CommandParse(_))
        ));
    }

    #[test]
    fn test_missing_program_fails() {
        let result = execute_and_capture_output(
            &argv(&["definitely-not-a-real-program-ecmc"]),
            Duration::from_secs(1),
        );
        assert!(matches!(result, Err(ExecutionError::CommandFailed(..))));
        assert!(matches!(
            execute_and_capture_output(&[], Duration::from_secs(1)),
            Err(ExecutionError::EmptyCommand)
        ));
    }

    #[cfg(unix)]
    #[test]
    fn test_capture_stdout() {
        let out = execute_and_capture_output(&argv(&["sh", "-c", "echo ' 42 '"]), Duration::from_secs(5)).unwrap();
        assert_eq!(out, "42");
    }

    #[cfg(unix)]
    #[test]
    fn test_non_zero_exit_carries_stderr() {
        let result = execute_and_capture_output(
            &argv(&["sh", "-c", "echo oops >&2; exit 3"]),
            Duration::from_secs(5),
        );
        assert!(
            matches!(&result, Err(ExecutionError::NonZeroExitStatus { stderr, .. }) if stderr == "oops"),
            "{:?}",
            result
        );
    }

    #[cfg(unix)]
    #[test]
    fn test_timeout_kills_child() {
        let started = Instant::now();
        let result = execute_and_capture_output(&argv(&["sleep", "5"]), Duration::from_millis(100));
        assert!(matches!(result, Err(ExecutionError::TimedOut { .. })));
        assert!(started.elapsed() < Duration::from_secs(4));
    }
}
