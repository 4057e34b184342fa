//! Error taxonomy for a single recompute

use std::path::PathBuf;
use std::time::Duration;

use thiserror::Error;

/// Raised when the tool's stdout cannot be framed into documents.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("failed to parse tool output: {message}")]
pub struct ParseError {
    pub message: String,
    /// Text accumulated for the document that could not be decoded.
    pub buffer: String,
}

impl ParseError {
    pub fn new(message: impl Into<String>, buffer: impl Into<String>) -> Self {
        ParseError {
            message: message.into(),
            buffer: buffer.into(),
        }
    }
}

/// Every way one recompute can fail
#[derive(Error, Debug)]
pub enum RecomputeError {
    /// The executable could not be started at all
    #[error("failed to spawn {}: {source}", .program.display())]
    Spawn {
        program: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// The tool ran and exited unsuccessfully
    #[error("analysis tool exited with {}: {stderr}", describe_exit(.code))]
    ExternalTool { code: Option<i32>, stderr: String },

    /// The tool started but its exit status or output could not be collected
    #[error("failed to collect output of {}: {source}", .program.display())]
    Collect {
        program: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error(transparent)]
    Parse(#[from] ParseError),

    #[error("analysis tool did not finish within {}ms", .limit.as_millis())]
    Timeout { limit: Duration },

    /// The graph source panicked mid-run
    #[error("graph source panicked: {message}")]
    Panicked { message: String },
}

impl RecomputeError {
    /// Short machine-friendly label, used in logs.
    pub fn kind(&self) -> &'static str {
        match self {
            RecomputeError::Spawn { .. } => "spawn",
            RecomputeError::ExternalTool { .. } => "external_tool",
            RecomputeError::Collect { .. } => "collect",
            RecomputeError::Parse(_) => "parse",
            RecomputeError::Timeout { .. } => "timeout",
            RecomputeError::Panicked { .. } => "panic",
        }
    }
}

fn describe_exit(code: &Option<i32>) -> String {
    match code {
        Some(code) => format!("code {}", code),
        None => "no exit code (terminated by signal)".to_string(),
    }
}
