//! External process execution with concurrent stream draining
//!
//! Signing tools can produce output on both stdout and stderr. Each stream
//! is drained line-by-line by its own task so that a full OS pipe buffer on
//! one stream can never stall the other or deadlock the child. Output is
//! streamed into caller-supplied sinks, never buffered wholesale.

use std::path::Path;
use std::process::Stdio;
use std::sync::{Arc, Mutex};

use tokio::io::{AsyncBufReadExt, AsyncRead, BufReader};
use tokio::process::Command;
use tracing::{debug, info, warn};

use crate::error::{Result, SignError};

/// Receives one line of subprocess output at a time.
pub trait LineSink: Send + Sync {
    fn accept(&self, line: &str);
}

/// Sink that accumulates lines in memory, for callers that need to
/// inspect a tool's (small) output after it exits.
#[derive(Debug, Default)]
pub struct CollectedOutput {
    lines: Mutex<Vec<String>>,
}

impl CollectedOutput {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    /// All collected lines joined with newlines.
    pub fn text(&self) -> String {
        self.lines.lock().expect("sink lock poisoned").join("\n")
    }
}

impl LineSink for CollectedOutput {
    fn accept(&self, line: &str) {
        self.lines
            .lock()
            .expect("sink lock poisoned")
            .push(line.to_string());
    }
}

/// Runs an external program and returns its exit code.
#[derive(Debug, Clone, Default)]
pub struct ProcessRunner {
    log_commands: bool,
}

impl ProcessRunner {
    /// `log_commands` controls whether full command lines and exit codes
    /// are logged. Command lines may contain credentials.
    pub fn new(log_commands: bool) -> Self {
        Self { log_commands }
    }

    /// Run `command` with `args`, draining stdout and stderr concurrently
    /// into the given sinks (discarded when `None`), and return the exit
    /// code after the process terminates.
    pub async fn run(
        &self,
        command: &Path,
        args: &[String],
        stdout_sink: Option<Arc<dyn LineSink>>,
        stderr_sink: Option<Arc<dyn LineSink>>,
    ) -> Result<i32> {
        if self.log_commands {
            info!(
                command = %command.display(),
                args = %args.join(" "),
                "executing"
            );
        }

        let mut child = Command::new(command)
            .args(args)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .spawn()
            .map_err(|source| SignError::Launch {
                command: command.display().to_string(),
                source,
            })?;

        let stdout = child.stdout.take();
        let stderr = child.stderr.take();
        let out_drain = tokio::spawn(drain(stdout, stdout_sink));
        let err_drain = tokio::spawn(drain(stderr, stderr_sink));

        // Both streams must be fully consumed before the exit code is
        // meaningful to the caller.
        let _ = out_drain.await;
        let _ = err_drain.await;

        let status = child.wait().await?;
        let code = status.code().unwrap_or(-1);
        if self.log_commands {
            debug!(code, "process exited");
        }
        Ok(code)
    }
}

/// Consume a child stream line-by-line, forwarding to `sink` if present.
async fn drain(stream: Option<impl AsyncRead + Unpin>, sink: Option<Arc<dyn LineSink>>) {
    let Some(stream) = stream else {
        return;
    };
    let mut lines = BufReader::new(stream).lines();
    loop {
        match lines.next_line().await {
            Ok(Some(line)) => {
                if let Some(sink) = &sink {
                    sink.accept(&line);
                }
            }
            Ok(None) => break,
            Err(err) => {
                // Non-UTF-8 output lands here; the rest of the stream
                // cannot be read line-wise, so collected output is partial.
                warn!(error = %err, "stopped draining process output");
                break;
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::PathBuf;

    fn args(list: &[&str]) -> Vec<String> {
        list.iter().map(|s| s.to_string()).collect()
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_captures_stdout_lines() {
        let runner = ProcessRunner::new(false);
        let out = CollectedOutput::new();
        let code = runner
            .run(
                Path::new("sh"),
                &args(&["-c", "echo one; echo two"]),
                Some(out.clone()),
                None,
            )
            .await
            .unwrap();
        assert_eq!(code, 0);
        assert_eq!(out.text(), "one\ntwo");
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_streams_are_drained_independently() {
        let runner = ProcessRunner::new(false);
        let out = CollectedOutput::new();
        let err = CollectedOutput::new();
        let code = runner
            .run(
                Path::new("sh"),
                &args(&["-c", "echo good; echo bad >&2"]),
                Some(out.clone()),
                Some(err.clone()),
            )
            .await
            .unwrap();
        assert_eq!(code, 0);
        assert_eq!(out.text(), "good");
        assert_eq!(err.text(), "bad");
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_nonzero_exit_code_is_returned() {
        let runner = ProcessRunner::new(false);
        let code = runner
            .run(Path::new("sh"), &args(&["-c", "exit 3"]), None, None)
            .await
            .unwrap();
        assert_eq!(code, 3);
    }

    #[tokio::test]
    async fn test_missing_executable_is_a_launch_error() {
        let runner = ProcessRunner::new(false);
        let missing = PathBuf::from("/no/such/signing-tool");
        let result = runner.run(&missing, &[], None, None).await;
        match result {
            Err(SignError::Launch { command, .. }) => {
                assert_eq!(command, missing.display().to_string());
            }
            other => panic!("expected launch error, got {other:?}"),
        }
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_non_utf8_output_does_not_hang_or_panic() {
        // Lines before the undecodable bytes are kept; the process is
        // still reaped and its exit code returned.
        let runner = ProcessRunner::new(false);
        let out = CollectedOutput::new();
        let code = runner
            .run(
                Path::new("sh"),
                &args(&["-c", "echo ok; printf '\\377\\376garbage\\n'"]),
                Some(out.clone()),
                None,
            )
            .await
            .unwrap();
        assert_eq!(code, 0);
        assert_eq!(out.text(), "ok");
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_large_output_does_not_deadlock() {
        // Fill well past a pipe buffer on both streams with no sinks.
        let runner = ProcessRunner::new(false);
        let script = "i=0; while [ $i -lt 20000 ]; do echo line$i; echo err$i >&2; i=$((i+1)); done";
        let code = runner
            .run(Path::new("sh"), &args(&["-c", script]), None, None)
            .await
            .unwrap();
        assert_eq!(code, 0);
    }
}
