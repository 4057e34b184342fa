//! Invocation of the external analysis tool

use std::ffi::OsString;
use std::path::{Path, PathBuf};
use std::process::Stdio;
use std::time::Duration;

use anyhow::{Context, Result};
use tokio::process::Command;
use tracing::{debug, info};
use trellis_core::RecomputeError;

/// File name of the analysis tool expected next to the trellis binary.
pub const DEFAULT_TOOL_NAME: &str = "draveur";

/// How to invoke the analysis tool
#[derive(Debug, Clone)]
pub struct ToolConfig {
    pub program: PathBuf,
    /// Extra arguments. Empty by default: the tool is normally run bare.
    pub args: Vec<OsString>,
    /// `None` waits forever.
    pub timeout: Option<Duration>,
}

impl ToolConfig {
    pub fn new(program: impl Into<PathBuf>) -> Self {
        ToolConfig {
            program: program.into(),
            args: Vec::new(),
            timeout: None,
        }
    }

    pub fn with_args<I, S>(mut self, args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<OsString>,
    {
        self.args = args.into_iter().map(Into::into).collect();
        self
    }

    pub fn with_timeout(mut self, timeout: Option<Duration>) -> Self {
        self.timeout = timeout;
        self
    }

    /// The install location of the tool: alongside the running executable.
    pub fn default_program() -> Result<PathBuf> {
        let exe = std::env::current_exe().context("cannot locate the running executable")?;
        let dir = exe
            .parent()
            .with_context(|| format!("executable {} has no parent directory", exe.display()))?;
        Ok(dir.join(DEFAULT_TOOL_NAME))
    }
}

/// Runs the tool to completion and classifies the outcome.
#[derive(Debug, Clone)]
pub struct ProcessRunner {
    config: ToolConfig,
}

impl ProcessRunner {
    pub fn new(config: ToolConfig) -> Self {
        ProcessRunner { config }
    }

    /// Run the tool with `dir` as its working directory and return its full stdout.
    pub async fn run(&self, dir: &Path) -> Result<String, RecomputeError> {
        let program = &self.config.program;
        info!("Running analysis tool {} in {}", program.display(), dir.display());

        let mut command = Command::new(program);
        command
            .args(&self.config.args)
            .current_dir(dir)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true);

        let child = command.spawn().map_err(|source| RecomputeError::Spawn {
            program: program.clone(),
            source,
        })?;

        // dropping the pending future on timeout kills the child
        let output = match self.config.timeout {
            Some(limit) => tokio::time::timeout(limit, child.wait_with_output())
                .await
                .map_err(|_| RecomputeError::Timeout { limit })?,
            None => child.wait_with_output().await,
        }
        .map_err(|source| RecomputeError::Collect {
            program: program.clone(),
            source,
        })?;

        let stderr = String::from_utf8_lossy(&output.stderr);
        if !output.status.success() {
            return Err(RecomputeError::ExternalTool {
                code: output.status.code(),
                stderr: stderr.trim_end().to_string(),
            });
        }
        if !stderr.trim().is_empty() {
            debug!("analysis tool stderr: {}", stderr.trim_end());
        }

        Ok(String::from_utf8_lossy(&output.stdout).into_owned())
    }
}
