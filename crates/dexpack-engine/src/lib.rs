#![forbid(unsafe_code)]
//! The incremental build pipeline: content-addressed library cache, the
//! ordered build tasks, and the builder that runs them.

pub mod builder;
pub mod cache;
pub mod diagnostics;
pub mod error;
pub mod init;
pub mod output;
pub mod task;
pub mod toolset;

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::panic)]
pub(crate) mod testing;

pub use builder::{BuildResult, BuildState, BuildVariant, Builder, HaltHandle};
pub use cache::{CacheKey, CacheOutcome, ContentCacheIndex};
pub use diagnostics::{
    CollectingSink, DiagnosticCounts, DiagnosticSink, JsonLinesSink, SharedSink, StderrSink,
};
pub use error::{BuildFailure, EngineError};
pub use init::init_project;
pub use output::{BuildOutput, SharedBuffer};
pub use task::{clean_build_dir, ConvertReport, Task};
pub use toolset::Toolset;
