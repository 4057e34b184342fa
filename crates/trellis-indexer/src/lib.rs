//! Running the analysis tool and serializing recomputes

pub mod runner;
pub mod source;
pub mod coordinator;

#[cfg(any(test, feature = "test-utils"))]
pub mod testing;

pub use runner::{ProcessRunner, ToolConfig, DEFAULT_TOOL_NAME};
pub use source::{GraphSource, ToolSource};
pub use coordinator::{Phase, RecomputeCoordinator, RequestOutcome, Trigger};
