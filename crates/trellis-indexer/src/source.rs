//! Producers of a fresh graph for one recompute

use std::path::PathBuf;

use async_trait::async_trait;
use trellis_core::{Graph, RecomputeError, decode};

use crate::runner::ProcessRunner;

/// Something that can compute the whole graph from scratch.
#[async_trait]
pub trait GraphSource: Send + Sync {
    async fn compute(&self) -> Result<Graph, RecomputeError>;
}

/// Runs the analysis tool in the watched directory and frames its stdout.
#[derive(Debug, Clone)]
pub struct ToolSource {
    runner: ProcessRunner,
    root: PathBuf,
}

impl ToolSource {
    pub fn new(runner: ProcessRunner, root: impl Into<PathBuf>) -> Self {
        ToolSource {
            runner,
            root: root.into(),
        }
    }
}

#[async_trait]
impl GraphSource for ToolSource {
    async fn compute(&self) -> Result<Graph, RecomputeError> {
        let stdout = self.runner.run(&self.root).await?;
        Ok(decode(&stdout)?)
    }
}
