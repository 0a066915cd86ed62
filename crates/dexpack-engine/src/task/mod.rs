//! The ordered pipeline tasks and the context they share.

mod archive;
mod clean;
mod compile;
mod convert;
mod package;
mod resources;
mod sign;

use std::path::PathBuf;

use dexpack_config::{BuildKind, ProjectDescriptor};
use dexpack_tools::SigningKey;

use crate::builder::{BuildState, BuildVariant};
use crate::cache::ContentCacheIndex;
use crate::diagnostics::CountingSink;
use crate::error::EngineError;
use crate::output::BuildOutput;
use crate::toolset::Toolset;

pub use clean::clean_build_dir;
pub use convert::ConvertReport;

/// One step of a build. Tasks run in the order `Task::plan` gives, and a
/// failed task stops the pipeline.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Task {
    Clean,
    PackageResources,
    Compile,
    Convert,
    Archive,
    Package,
    Sign,
}

impl Task {
    pub fn name(self) -> &'static str {
        match self {
            Self::Clean => "clean",
            Self::PackageResources => "resources",
            Self::Compile => "compile",
            Self::Convert => "convert",
            Self::Archive => "archive",
            Self::Package => "package",
            Self::Sign => "sign",
        }
    }

    /// The state a builder reports while this task runs.
    pub fn state(self) -> BuildState {
        match self {
            Self::Clean => BuildState::Cleaning,
            Self::PackageResources => BuildState::PackagingResources,
            Self::Compile => BuildState::Compiling,
            Self::Convert => BuildState::Converting,
            Self::Archive => BuildState::Archiving,
            Self::Package => BuildState::Packaging,
            Self::Sign => BuildState::Signing,
        }
    }

    /// The tasks a `kind` build runs, in order.
    ///
    /// Resources are packaged before compiling so the generated resource
    /// identifiers class is on the source path.
    pub fn plan(kind: BuildKind) -> &'static [Task] {
        match kind {
            BuildKind::Application => &[
                Self::Clean,
                Self::PackageResources,
                Self::Compile,
                Self::Convert,
                Self::Package,
                Self::Sign,
            ],
            BuildKind::PlainArchive => &[Self::Clean, Self::Compile, Self::Convert, Self::Archive],
            BuildKind::LibraryArchive => &[Self::Clean, Self::Compile, Self::Archive],
        }
    }

    pub(crate) fn run(self, ctx: &mut TaskContext<'_>) -> Result<(), EngineError> {
        match self {
            Self::Clean => clean::run(ctx),
            Self::PackageResources => resources::run(ctx),
            Self::Compile => compile::run(ctx),
            Self::Convert => convert::run(ctx),
            Self::Archive => archive::run(ctx),
            Self::Package => package::run(ctx),
            Self::Sign => sign::run(ctx),
        }
    }
}

impl std::fmt::Display for Task {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.name())
    }
}

/// Everything a task reads or writes during one build.
pub(crate) struct TaskContext<'a> {
    pub(crate) project: &'a ProjectDescriptor,
    pub(crate) kind: BuildKind,
    pub(crate) variant: BuildVariant,
    pub(crate) tools: &'a Toolset,
    pub(crate) cache: &'a ContentCacheIndex,
    pub(crate) diagnostics: CountingSink<'a>,
    pub(crate) output: &'a mut BuildOutput,
    pub(crate) release_key: Option<&'a SigningKey>,
    /// Resolved application package name.
    pub(crate) package: Option<String>,
    pub(crate) convert: Option<ConvertReport>,
    /// The final artifact, once a task has produced it.
    pub(crate) produced: Option<PathBuf>,
}

impl TaskContext<'_> {
    /// Where this build's final output goes.
    pub(crate) fn output_path(&self) -> PathBuf {
        match self.kind {
            BuildKind::Application => self.project.apk_path(),
            BuildKind::PlainArchive | BuildKind::LibraryArchive => self.project.jar_path(),
        }
    }
}
