use async_trait::async_trait;
use std::time::Duration;

/// Longest stdout/stderr passed back to the model.
const MAX_RESPONSE_LEN: usize = 16_000;
const TRUNCATED_MESSAGE: &str = "<response clipped><NOTE>To save on context only part of this output has been shown to you.</NOTE>";

/// Captured result of one subprocess.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CommandOutput {
    /// Exit code, `None` when the process was killed by a signal.
    pub status: Option<i32>,
    pub stdout: String,
    pub stderr: String,
}

impl CommandOutput {
    pub fn success(&self) -> bool {
        self.status == Some(0)
    }

    /// Error text for the tool result: stderr, or a note about the exit status
    /// when the process failed silently.
    pub fn error_text(&self) -> Option<String> {
        let stderr = self.stderr.trim();
        if !stderr.is_empty() {
            return Some(truncate_output(stderr));
        }
        match self.status {
            Some(0) => None,
            Some(code) => Some(format!("exited with status {code}")),
            None => Some("terminated by signal".to_string()),
        }
    }

    /// Trimmed stdout, `None` when empty.
    pub fn output_text(&self) -> Option<String> {
        let stdout = self.stdout.trim();
        (!stdout.is_empty()).then(|| truncate_output(stdout))
    }
}

/// Runs OS commands on behalf of the desktop handle.
#[async_trait]
pub trait CommandRunner: Send + Sync {
    /// Run `program` with `args` to completion.
    ///
    /// Only a failure to start the process is an `Err`; a non-zero exit is
    /// reported through [`CommandOutput::status`].
    async fn run(&self, program: &str, args: &[String]) -> std::io::Result<CommandOutput>;
}

/// Spawns real processes with tokio.
#[derive(Debug, Clone, Default)]
pub struct NativeRunner {
    timeout: Option<Duration>,
}

impl NativeRunner {
    /// With `timeout` unset a hung command blocks the action indefinitely.
    pub fn new(timeout: Option<Duration>) -> Self {
        Self { timeout }
    }
}

#[async_trait]
impl CommandRunner for NativeRunner {
    async fn run(&self, program: &str, args: &[String]) -> std::io::Result<CommandOutput> {
        let mut command = tokio::process::Command::new(program);
        command.args(args).kill_on_drop(true);

        let output = match self.timeout {
            Some(limit) => tokio::time::timeout(limit, command.output())
                .await
                .map_err(|_| {
                    std::io::Error::new(
                        std::io::ErrorKind::TimedOut,
                        format!("{program} timed out after {}s", limit.as_secs()),
                    )
                })??,
            None => command.output().await?,
        };

        Ok(CommandOutput {
            status: output.status.code(),
            stdout: String::from_utf8_lossy(&output.stdout).into_owned(),
            stderr: String::from_utf8_lossy(&output.stderr).into_owned(),
        })
    }
}

/// Clip overly long command output, keeping the head.
pub fn truncate_output(content: &str) -> String {
    if content.chars().count() <= MAX_RESPONSE_LEN {
        return content.to_string();
    }
    let mut clipped: String = content.chars().take(MAX_RESPONSE_LEN).collect();
    clipped.push_str(TRUNCATED_MESSAGE);
    clipped
}
