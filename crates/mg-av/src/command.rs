//! Builder for executing external tool commands with timeout support.

use std::path::PathBuf;
use std::process::{ExitStatus, Stdio};
use std::time::Duration;

use tokio::process::Command;

/// Default command timeout: 5 minutes.
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(300);

/// Output captured from a tool execution.
#[derive(Debug, Clone)]
pub struct ToolOutput {
    /// Process exit status.
    pub status: ExitStatus,
    /// Captured standard output (lossy UTF-8).
    pub stdout: String,
    /// Captured standard error (lossy UTF-8).
    pub stderr: String,
}

/// A builder for constructing and executing external tool invocations.
///
/// Every invocation is a single attempt bounded by [`timeout`](Self::timeout);
/// a process that outlives it is killed.
///
/// # Example
///
/// ```no_run
/// use mg_av::ToolCommand;
/// use std::path::PathBuf;
///
/// # async fn example() -> mg_core::Result<()> {
/// let output = ToolCommand::new(PathBuf::from("ffmpeg"))
///     .arg("-hide_banner")
///     .arg("-version")
///     .execute()
///     .await?;
/// println!("{}", output.stdout);
/// # Ok(())
/// # }
/// ```
#[derive(Debug, Clone)]
pub struct ToolCommand {
    program: PathBuf,
    args: Vec<String>,
    timeout: Duration,
}

impl ToolCommand {
    /// Create a new command for the given program path.
    pub fn new(program: PathBuf) -> Self {
        Self {
            program,
            args: Vec::new(),
            timeout: DEFAULT_TIMEOUT,
        }
    }

    /// Append a single argument.
    pub fn arg(&mut self, s: impl Into<String>) -> &mut Self {
        self.args.push(s.into());
        self
    }

    /// Append multiple arguments.
    pub fn args(&mut self, iter: impl IntoIterator<Item = impl Into<String>>) -> &mut Self {
        self.args.extend(iter.into_iter().map(Into::into));
        self
    }

    /// Set the maximum execution time.
    pub fn timeout(&mut self, d: Duration) -> &mut Self {
        self.timeout = d;
        self
    }

    /// The arguments collected so far.
    pub fn get_args(&self) -> &[String] {
        &self.args
    }

    fn program_name(&self) -> String {
        self.program
            .file_name()
            .map(|n| n.to_string_lossy().to_string())
            .unwrap_or_else(|| self.program.to_string_lossy().to_string())
    }

    /// Execute the command and capture its output regardless of exit status.
    ///
    /// Useful for tools that report information on stderr and exit non-zero
    /// (e.g. `ffmpeg -i file` with no output).
    ///
    /// # Errors
    ///
    /// Returns [`mg_core::Error::Tool`] if the process cannot be spawned or
    /// times out.
    pub async fn output(&self) -> mg_core::Result<ToolOutput> {
        let program_name = self.program_name();

        let mut cmd = Command::new(&self.program);
        cmd.args(&self.args)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true);

        let child = cmd
            .spawn()
            .map_err(|e| mg_core::Error::tool(&program_name, format!("failed to spawn: {e}")))?;

        tracing::debug!(tool = %program_name, args = ?self.args, "Running external tool");

        // On timeout the wait future is dropped together with the child,
        // which kills the process.
        match tokio::time::timeout(self.timeout, child.wait_with_output()).await {
            Ok(Ok(output)) => Ok(ToolOutput {
                status: output.status,
                stdout: String::from_utf8_lossy(&output.stdout).to_string(),
                stderr: String::from_utf8_lossy(&output.stderr).to_string(),
            }),
            Ok(Err(e)) => Err(mg_core::Error::tool(
                program_name,
                format!("I/O error waiting for process: {e}"),
            )),
            Err(_elapsed) => Err(mg_core::Error::tool(
                program_name,
                format!("timed out after {:?}", self.timeout),
            )),
        }
    }

    /// Execute the command, capturing stdout and stderr.
    ///
    /// # Errors
    ///
    /// - Returns [`mg_core::Error::Tool`] if the process times out (message
    ///   includes the timeout duration).
    /// - Returns [`mg_core::Error::Tool`] if the process exits with a non-zero
    ///   status (message includes the tail of stderr).
    /// - Returns [`mg_core::Error::Tool`] if spawning the process fails.
    pub async fn execute(&self) -> mg_core::Result<ToolOutput> {
        let output = self.output().await?;
        if !output.status.success() {
            return Err(mg_core::Error::tool(
                self.program_name(),
                format!(
                    "exited with status {}: {}",
                    output.status,
                    stderr_tail(&output.stderr, 5)
                ),
            ));
        }
        Ok(output)
    }
}

/// Last `lines` non-empty lines of a tool's stderr. ffmpeg prints its banner
/// and stream listing first; the actual error is at the end.
fn stderr_tail(stderr: &str, lines: usize) -> String {
    let tail: Vec<&str> = stderr
        .lines()
        .filter(|l| !l.trim().is_empty())
        .rev()
        .take(lines)
        .collect();
    tail.into_iter().rev().collect::<Vec<_>>().join("\n")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn execute_echo() {
        // `echo` should be universally available.
        let output = ToolCommand::new(PathBuf::from("echo"))
            .arg("hello")
            .execute()
            .await;

        match output {
            Ok(out) => {
                assert!(out.status.success());
                assert!(out.stdout.trim().contains("hello"));
            }
            Err(_) => {
                // On some minimal environments echo may not exist; skip.
            }
        }
    }

    #[tokio::test]
    async fn execute_nonexistent_tool() {
        let result = ToolCommand::new(PathBuf::from("nonexistent_tool_xyz_12345"))
            .execute()
            .await;
        let err = result.unwrap_err().to_string();
        assert!(err.contains("failed to spawn"), "unexpected error: {err}");
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn non_zero_exit_is_error_but_output_is_not() {
        let mut cmd = ToolCommand::new(PathBuf::from("sh"));
        cmd.args(["-c", "echo oops >&2; exit 3"]);

        let err = cmd.execute().await.unwrap_err().to_string();
        assert!(err.contains("oops"), "unexpected error: {err}");

        let out = cmd.output().await.unwrap();
        assert!(!out.status.success());
        assert!(out.stderr.contains("oops"));
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn timeout_fires() {
        // `sleep 10` should be killed well before 10 seconds.
        let start = std::time::Instant::now();
        let result = ToolCommand::new(PathBuf::from("sleep"))
            .arg("10")
            .timeout(Duration::from_millis(100))
            .execute()
            .await;
        let err = result.unwrap_err().to_string();
        assert!(err.contains("timed out"), "unexpected error: {err}");
        assert!(start.elapsed() < Duration::from_secs(5));
    }

    #[test]
    fn stderr_tail_keeps_last_lines() {
        let stderr = "banner\n\nInput #0\nStream #0:0\nerror: bad\n";
        assert_eq!(stderr_tail(stderr, 2), "Stream #0:0\nerror: bad");
    }
}
