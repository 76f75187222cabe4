//! Shared command execution with streaming output
//!
//! Runs external tools (docker, python3) and re-emits their output line by
//! line through tracing.

use anyhow::{Context, Result, bail};
use std::path::PathBuf;
use std::time::Duration;
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::process::Command;
use tracing::{info, warn};

/// Configuration for command execution
#[derive(Debug, Clone)]
pub struct CommandConfig {
    /// Command timeout (kills process if exceeded)
    pub timeout: Duration,
    /// Time to wait for streaming tasks to flush after command completes
    pub stream_flush_timeout: Duration,
}

impl CommandConfig {
    /// Dependency builds, including a first image pull (30 minute timeout)
    pub fn for_build() -> Self {
        Self {
            timeout: Duration::from_secs(1800),
            stream_flush_timeout: Duration::from_secs(5),
        }
    }

    /// Short housekeeping commands (2 minute timeout)
    pub fn for_housekeeping() -> Self {
        Self {
            timeout: Duration::from_secs(120),
            stream_flush_timeout: Duration::from_secs(2),
        }
    }

    /// Create with custom timeout, default stream flush timeout
    pub fn with_timeout_secs(timeout_secs: u64) -> Self {
        Self {
            timeout: Duration::from_secs(timeout_secs),
            stream_flush_timeout: Duration::from_secs(5),
        }
    }
}

/// A command line with its working directory and extra environment
#[derive(Debug, Clone)]
pub struct CommandSpec {
    pub program: String,
    pub args: Vec<String>,
    pub current_dir: Option<PathBuf>,
    pub envs: Vec<(String, String)>,
}

impl CommandSpec {
    pub fn new(program: impl Into<String>) -> Self {
        Self {
            program: program.into(),
            args: Vec::new(),
            current_dir: None,
            envs: Vec::new(),
        }
    }

    pub fn arg(mut self, arg: impl Into<String>) -> Self {
        self.args.push(arg.into());
        self
    }

    pub fn args<I, S>(mut self, args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.args.extend(args.into_iter().map(Into::into));
        self
    }

    pub fn current_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.current_dir = Some(dir.into());
        self
    }

    pub fn envs<I, K, V>(mut self, vars: I) -> Self
    where
        I: IntoIterator<Item = (K, V)>,
        K: Into<String>,
        V: Into<String>,
    {
        self.envs
            .extend(vars.into_iter().map(|(k, v)| (k.into(), v.into())));
        self
    }
}

/// Run a command and stream its output to the log
///
/// # Returns
/// * `Ok(true)` if command succeeded
/// * `Ok(false)` if command failed with non-zero exit
/// * `Err` if timeout, spawn failure, or other error
pub async fn run_command_streaming(spec: &CommandSpec, config: &CommandConfig) -> Result<bool> {
    info!(
        cmd = %spec.program,
        args = ?spec.args,
        timeout_secs = config.timeout.as_secs(),
        "Running command"
    );

    let mut command = Command::new(&spec.program);
    command
        .args(&spec.args)
        .envs(spec.envs.iter().map(|(k, v)| (k.as_str(), v.as_str())))
        .stdout(std::process::Stdio::piped())
        .stderr(std::process::Stdio::piped())
        .kill_on_drop(true);
    if let Some(dir) = &spec.current_dir {
        command.current_dir(dir);
    }

    let mut child = command
        .spawn()
        .with_context(|| format!("Failed to spawn command: {}", spec.program))?;

    let stdout = child.stdout.take().context("Failed to capture stdout")?;
    let stderr = child.stderr.take().context("Failed to capture stderr")?;

    let stdout_name = spec.program.clone();
    let stdout_handle = tokio::spawn(async move {
        let mut lines = BufReader::new(stdout).lines();
        while let Ok(Some(line)) = lines.next_line().await {
            info!(cmd = %stdout_name, "{line}");
        }
    });

    let stderr_name = spec.program.clone();
    let stderr_handle = tokio::spawn(async move {
        let mut lines = BufReader::new(stderr).lines();
        while let Ok(Some(line)) = lines.next_line().await {
            info!(cmd = %stderr_name, stream = "stderr", "{line}");
        }
    });

    // Wait for command with timeout
    let wait_result = tokio::time::timeout(config.timeout, child.wait()).await;

    let success = match wait_result {
        Ok(Ok(status)) => status.success(),
        Ok(Err(e)) => return Err(e).context("Failed waiting for command"),
        Err(_) => {
            warn!(
                cmd = %spec.program,
                timeout_secs = config.timeout.as_secs(),
                "Command timed out, killing process"
            );
            if let Err(e) = child.kill().await {
                warn!(error = %e, "Failed to kill timed-out process");
            }
            bail!(
                "Command '{}' timed out after {}s",
                spec.program,
                config.timeout.as_secs()
            );
        }
    };

    // Wait for streaming to finish with timeout
    let _ = tokio::time::timeout(config.stream_flush_timeout, stdout_handle).await;
    let _ = tokio::time::timeout(config.stream_flush_timeout, stderr_handle).await;

    Ok(success)
}

/// Run a command, failing on a non-zero exit
pub async fn run_command(spec: &CommandSpec, config: &CommandConfig) -> Result<()> {
    if !run_command_streaming(spec, config).await? {
        bail!("Command '{}' exited with a non-zero status", spec.program);
    }
    Ok(())
}
