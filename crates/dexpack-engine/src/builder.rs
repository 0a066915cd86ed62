//! The build pipeline driver: validates configuration, then runs the planned
//! tasks in order, stopping at the first failure.

use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

use dexpack_config::{BuildKind, ProjectDescriptor};
use dexpack_tools::SigningKey;

use crate::cache::ContentCacheIndex;
use crate::diagnostics::{CountingSink, DiagnosticCounts, DiagnosticSink, StderrSink};
use crate::error::{BuildFailure, EngineError};
use crate::output::BuildOutput;
use crate::task::{ConvertReport, Task, TaskContext};
use crate::toolset::Toolset;

/// Debug builds sign with the well-known debug key; release builds need
/// caller-supplied credentials.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash)]
pub enum BuildVariant {
    #[default]
    Debug,
    Release,
}

impl BuildVariant {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Debug => "debug",
            Self::Release => "release",
        }
    }
}

impl std::fmt::Display for BuildVariant {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Where a builder is in its pipeline.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum BuildState {
    #[default]
    Idle,
    Cleaning,
    PackagingResources,
    Compiling,
    Converting,
    Archiving,
    Packaging,
    Signing,
    Done,
    Failed,
}

/// Requests that a running build stop before its next task. Cloneable and
/// usable from any thread.
#[derive(Debug, Clone, Default)]
pub struct HaltHandle(Arc<AtomicBool>);

impl HaltHandle {
    pub fn halt(&self) {
        self.0.store(true, Ordering::SeqCst);
    }

    pub fn is_halted(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }

    /// Clear a previous halt so the builder can run again.
    pub fn resume(&self) {
        self.0.store(false, Ordering::SeqCst);
    }
}

/// A successful build.
#[derive(Debug, Clone)]
pub struct BuildResult {
    pub output_path: PathBuf,
    pub duration: Duration,
    pub diagnostics: DiagnosticCounts,
    /// Library conversion summary, for kinds that convert.
    pub convert: Option<ConvertReport>,
}

/// Drives one project's builds.
///
/// Collaborators handed in with `with_tools` and `with_cache` are reused by
/// every build. Otherwise each build detects tools for its own variant and
/// opens the content cache afresh, so nothing carries over between runs.
pub struct Builder {
    project: ProjectDescriptor,
    kind: BuildKind,
    tools: Option<Toolset>,
    cache: Option<ContentCacheIndex>,
    sink: Box<dyn DiagnosticSink>,
    output: BuildOutput,
    release_key: Option<SigningKey>,
    state: BuildState,
    halt: HaltHandle,
}

impl Builder {
    pub fn new(project: ProjectDescriptor, kind: BuildKind) -> Self {
        Self {
            project,
            kind,
            tools: None,
            cache: None,
            sink: Box::new(StderrSink),
            output: BuildOutput::stdio(),
            release_key: None,
            state: BuildState::Idle,
            halt: HaltHandle::default(),
        }
    }

    /// A builder for the kind the project record declares.
    pub fn for_project(project: ProjectDescriptor) -> Self {
        let kind = project.kind();
        Self::new(project, kind)
    }

    /// Use these collaborators instead of detecting tools on disk.
    pub fn with_tools(mut self, tools: Toolset) -> Self {
        self.tools = Some(tools);
        self
    }

    pub fn with_cache(mut self, cache: ContentCacheIndex) -> Self {
        self.cache = Some(cache);
        self
    }

    pub fn with_sink(mut self, sink: impl DiagnosticSink + 'static) -> Self {
        self.sink = Box::new(sink);
        self
    }

    pub fn with_output(mut self, output: BuildOutput) -> Self {
        self.output = output;
        self
    }

    pub fn with_release_key(mut self, key: SigningKey) -> Self {
        self.release_key = Some(key);
        self
    }

    pub fn verbose(mut self, verbose: bool) -> Self {
        self.output.set_verbose(verbose);
        self
    }

    pub fn project(&self) -> &ProjectDescriptor {
        &self.project
    }

    pub fn kind(&self) -> BuildKind {
        self.kind
    }

    pub fn state(&self) -> BuildState {
        self.state
    }

    pub fn halt_handle(&self) -> HaltHandle {
        self.halt.clone()
    }

    /// Run the full pipeline for `variant`.
    ///
    /// Configuration problems are reported before any task runs, so the
    /// project's build outputs are untouched. After that the tasks run in
    /// order and the first failure stops the build.
    ///
    /// # Errors
    /// Returns a `BuildFailure` naming the failed task, or no task for a
    /// configuration problem.
    pub fn build(&mut self, variant: BuildVariant) -> Result<BuildResult, BuildFailure> {
        let injected_tools = self.tools.take();
        let injected_cache = self.cache.take();
        let result = self.run(variant, injected_tools.as_ref(), injected_cache.as_ref());
        self.tools = injected_tools;
        self.cache = injected_cache;
        result
    }

    fn run(
        &mut self,
        variant: BuildVariant,
        tools: Option<&Toolset>,
        cache: Option<&ContentCacheIndex>,
    ) -> Result<BuildResult, BuildFailure> {
        let start = Instant::now();
        self.state = BuildState::Idle;
        tracing::info!(
            project = self.project.name(),
            kind = self.kind.as_str(),
            variant = variant.as_str(),
            "build started"
        );

        let package = self
            .validate(variant)
            .map_err(|e| self.configuration_failure(e))?;

        // Detected tools bake in the variant, so they live for this build only.
        let detected;
        let tools = match tools {
            Some(tools) => tools,
            None => {
                detected = Toolset::detect(&self.project, self.kind, variant)
                    .map_err(|e| self.configuration_failure(e))?;
                &detected
            }
        };
        tools
            .require(self.kind)
            .map_err(|e| self.configuration_failure(e))?;

        let opened;
        let cache = match cache {
            Some(cache) => cache,
            None => {
                opened = ContentCacheIndex::open(&self.project.dexed_libs_dir())
                    .map_err(|e| self.configuration_failure(e))?;
                tracing::debug!(
                    entries = opened.len(),
                    dir = %opened.dir().display(),
                    "cache opened"
                );
                &opened
            }
        };

        let mut ctx = TaskContext {
            project: &self.project,
            kind: self.kind,
            variant,
            tools,
            cache,
            diagnostics: CountingSink::new(&mut *self.sink),
            output: &mut self.output,
            release_key: self.release_key.as_ref(),
            package,
            convert: None,
            produced: None,
        };

        for &task in Task::plan(self.kind) {
            if self.halt.is_halted() {
                self.state = BuildState::Failed;
                ctx.output.status("Halted", &format!("before `{task}`"));
                tracing::warn!(task = task.name(), "build halted");
                return Err(BuildFailure {
                    task: Some(task),
                    error: EngineError::Halted,
                });
            }

            self.state = task.state();
            tracing::debug!(task = task.name(), "task started");
            if let Err(error) = task.run(&mut ctx) {
                self.state = BuildState::Failed;
                tracing::error!(task = task.name(), error = %error, "task failed");
                ctx.output.flush();
                return Err(BuildFailure {
                    task: Some(task),
                    error,
                });
            }
        }

        let duration = start.elapsed();
        let output_path = ctx.produced.take().unwrap_or_else(|| ctx.output_path());
        ctx.output.status(
            "Finished",
            &format!(
                "{variant} {} `{}` in {:.2}s",
                self.kind,
                self.project.name(),
                duration.as_secs_f64()
            ),
        );
        ctx.output.flush();
        let diagnostics = ctx.diagnostics.counts;
        let convert = ctx.convert;
        self.state = BuildState::Done;

        tracing::info!(
            output = %output_path.display(),
            errors = diagnostics.errors,
            warnings = diagnostics.warnings,
            "build finished"
        );
        Ok(BuildResult {
            output_path,
            duration,
            diagnostics,
            convert,
        })
    }

    fn configuration_failure(&mut self, error: EngineError) -> BuildFailure {
        self.state = BuildState::Failed;
        tracing::error!(error = %error, "build configuration invalid");
        BuildFailure { task: None, error }
    }

    /// Check the configuration. Returns the resolved application package
    /// name.
    fn validate(&self, variant: BuildVariant) -> Result<Option<String>, EngineError> {
        let project = &self.project;
        let kind = self.kind;

        if kind == BuildKind::Application
            && variant == BuildVariant::Release
            && self.release_key.is_none()
        {
            return Err(EngineError::MissingReleaseKey);
        }

        if kind.requires_main_class() {
            let Some(main) = project.main_class() else {
                return Err(EngineError::MissingMainClass {
                    kind: kind.to_string(),
                });
            };
            if project.main_class_source().is_none() {
                return Err(EngineError::MissingEntrySource {
                    class: main.to_owned(),
                    roots: project
                        .source_roots()
                        .iter()
                        .map(|r| r.display().to_string())
                        .collect::<Vec<_>>()
                        .join(", "),
                });
            }
        }

        match kind {
            BuildKind::Application => project
                .resolve_package()?
                .map(Some)
                .ok_or(EngineError::MissingPackageName),
            BuildKind::PlainArchive | BuildKind::LibraryArchive => {
                Ok(project.package().map(str::to_owned))
            }
        }
    }
}

impl std::fmt::Debug for Builder {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Builder")
            .field("project", &self.project.name())
            .field("kind", &self.kind)
            .field("state", &self.state)
            .field("tools", &self.tools)
            .finish_non_exhaustive()
    }
}
