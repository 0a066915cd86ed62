//! Error types for dexpack-engine.

use crate::task::Task;

/// Errors produced by engine operations.
#[derive(Debug, thiserror::Error)]
pub enum EngineError {
    /// A filesystem operation failed.
    #[error("cannot access {path}: {source}")]
    Io {
        path: String,
        source: std::io::Error,
    },

    /// A utility operation failed.
    #[error("{0}")]
    Util(#[from] dexpack_util::error::UtilError),

    /// The project record or layout is invalid.
    #[error("{0}")]
    Project(#[from] dexpack_config::project::ProjectError),

    /// A manifest operation failed.
    #[error("{0}")]
    Manifest(#[from] dexpack_config::manifest::ManifestError),

    /// An external tool failed, or two containers define the same class.
    #[error("{0}")]
    Tool(#[from] dexpack_tools::ToolError),

    /// A project already exists at the target path.
    #[error("dexpack.toml already exists at {path} - cannot initialize over an existing project")]
    ProjectExists { path: String },

    /// The build kind needs an entry point but none is configured.
    #[error("{kind} builds need a main class - set `main-class` under [project]")]
    MissingMainClass { kind: String },

    /// The configured main class has no source file.
    #[error("source for main class {class} not found under {roots}")]
    MissingEntrySource { class: String, roots: String },

    /// An application build has no package name.
    #[error("no package name - set `package` under [project] or in AndroidManifest.xml")]
    MissingPackageName,

    /// A release application build was requested without release credentials.
    #[error("release builds need a signing key - add [signing] to dexpack.toml and supply the keystore passwords")]
    MissingReleaseKey,

    /// There is nothing to compile.
    #[error("no .java source files under {dirs}")]
    NoSources { dirs: String },

    /// The compiler exited unsuccessfully.
    #[error("compilation failed with {errors} error(s)")]
    CompilationFailed { errors: usize },

    /// A converter named its settings with something unusable as a directory.
    #[error("invalid converter settings key `{scope}` - use letters, digits, `-`, `_` or `.`")]
    InvalidCacheScope { scope: String },

    /// The build was halted before the next task started.
    #[error("build halted")]
    Halted,
}

impl EngineError {
    pub(crate) fn io(path: &std::path::Path, source: std::io::Error) -> Self {
        Self::Io {
            path: path.display().to_string(),
            source,
        }
    }

    /// Whether this error is a configuration problem rather than a task failure.
    pub fn is_configuration(&self) -> bool {
        matches!(
            self,
            Self::Project(_)
                | Self::Manifest(_)
                | Self::MissingMainClass { .. }
                | Self::MissingEntrySource { .. }
                | Self::MissingPackageName
                | Self::MissingReleaseKey
        )
    }
}

/// A failed build: the task that failed (`None` when configuration checks
/// failed before any task ran) and the cause.
#[derive(Debug)]
pub struct BuildFailure {
    pub task: Option<Task>,
    pub error: EngineError,
}

impl std::fmt::Display for BuildFailure {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self.task {
            Some(task) => write!(f, "task `{}` failed: {}", task.name(), self.error),
            None => write!(f, "{}", self.error),
        }
    }
}

impl std::error::Error for BuildFailure {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        Some(&self.error)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn failure_names_task() {
        let failure = BuildFailure {
            task: Some(Task::Compile),
            error: EngineError::CompilationFailed { errors: 2 },
        };
        assert_eq!(
            failure.to_string(),
            "task `compile` failed: compilation failed with 2 error(s)"
        );
    }

    #[test]
    fn configuration_failure_has_no_task() {
        let failure = BuildFailure {
            task: None,
            error: EngineError::MissingReleaseKey,
        };
        assert!(failure.error.is_configuration());
        assert!(failure.to_string().starts_with("release builds need a signing key"));
    }
}
