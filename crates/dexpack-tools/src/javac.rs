//! Java compiler invocation.

use std::path::{Path, PathBuf};
use std::process::Command;

use dexpack_util::process::{display_command, run_command_streaming};

use crate::diagnostic::{parse_line, Diagnostic, Severity};
use crate::error::ToolError;

/// Inputs to one whole-project compilation.
#[derive(Debug, Clone, Default)]
pub struct CompileRequest {
    /// Library archives followed by the bootstrap classpath.
    pub classpath: Vec<PathBuf>,
    /// Source roots searched for classes referenced by `sources`.
    pub sourcepath: Vec<PathBuf>,
    /// Directory receiving `.class` files.
    pub output_dir: PathBuf,
    /// Primary compilation units. The compiler pulls in the rest transitively.
    pub sources: Vec<PathBuf>,
    /// `-source`/`-target` level, e.g. `1.8`.
    pub java_version: String,
}

/// Outcome of a compilation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CompileOutcome {
    /// The compiler's own exit status was zero.
    pub success: bool,
    pub errors: usize,
    pub warnings: usize,
}

/// The compiler collaborator.
pub trait Compiler: Send + Sync {
    /// Compile `request`, handing every diagnostic to `on_diagnostic` as soon
    /// as the compiler emits it.
    ///
    /// # Errors
    /// Returns an error if the compiler cannot be started. A compilation with
    /// errors is reported through `CompileOutcome::success`, not as `Err`.
    fn compile(
        &self,
        request: &CompileRequest,
        on_diagnostic: &mut dyn FnMut(Diagnostic),
    ) -> Result<CompileOutcome, ToolError>;
}

/// Builder for a `javac` command line.
#[derive(Debug, Default)]
pub struct JavacCommand {
    classpath: Vec<PathBuf>,
    sourcepath: Vec<PathBuf>,
    output_dir: Option<PathBuf>,
    sources: Vec<PathBuf>,
    release_level: Option<String>,
}

impl JavacCommand {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn classpath(mut self, entries: &[PathBuf]) -> Self {
        self.classpath = entries.to_vec();
        self
    }

    pub fn sourcepath(mut self, roots: &[PathBuf]) -> Self {
        self.sourcepath = roots.to_vec();
        self
    }

    pub fn output_dir(mut self, dir: &Path) -> Self {
        self.output_dir = Some(dir.to_path_buf());
        self
    }

    pub fn sources(mut self, files: &[PathBuf]) -> Self {
        self.sources = files.to_vec();
        self
    }

    /// Set both `-source` and `-target`.
    pub fn java_version(mut self, version: &str) -> Self {
        self.release_level = Some(version.to_owned());
        self
    }

    /// Build the argument list without executing.
    ///
    /// # Errors
    /// Returns an error if no sources or no output directory are set.
    pub fn build_args(&self) -> Result<Vec<String>, ToolError> {
        if self.sources.is_empty() {
            return Err(ToolError::NoSources);
        }
        let Some(output_dir) = &self.output_dir else {
            return Err(ToolError::NoOutput {
                tool: "javac".to_owned(),
            });
        };

        let mut args = vec![
            "-d".to_owned(),
            output_dir.display().to_string(),
            "-encoding".to_owned(),
            "UTF-8".to_owned(),
            "-proc:none".to_owned(),
        ];

        if let Some(level) = &self.release_level {
            args.extend([
                "-source".to_owned(),
                level.clone(),
                "-target".to_owned(),
                level.clone(),
            ]);
        }

        if let Some(cp) = join_paths(&self.classpath) {
            args.push("-classpath".to_owned());
            args.push(cp);
        }
        if let Some(sp) = join_paths(&self.sourcepath) {
            args.push("-sourcepath".to_owned());
            args.push(sp);
        }

        for src in &self.sources {
            args.push(src.display().to_string());
        }
        Ok(args)
    }
}

fn join_paths(paths: &[PathBuf]) -> Option<String> {
    if paths.is_empty() {
        return None;
    }
    let sep = if cfg!(windows) { ";" } else { ":" };
    Some(
        paths
            .iter()
            .map(|p| p.display().to_string())
            .collect::<Vec<_>>()
            .join(sep),
    )
}

/// `javac` found on disk.
#[derive(Debug, Clone)]
pub struct Javac {
    program: PathBuf,
}

impl Javac {
    pub fn new(program: &Path) -> Self {
        Self {
            program: program.to_path_buf(),
        }
    }
}

impl Compiler for Javac {
    fn compile(
        &self,
        request: &CompileRequest,
        on_diagnostic: &mut dyn FnMut(Diagnostic),
    ) -> Result<CompileOutcome, ToolError> {
        let args = JavacCommand::new()
            .classpath(&request.classpath)
            .sourcepath(&request.sourcepath)
            .output_dir(&request.output_dir)
            .sources(&request.sources)
            .java_version(&request.java_version)
            .build_args()?;
        dexpack_util::fs::ensure_dir(&request.output_dir)?;

        let mut cmd = Command::new(&self.program);
        cmd.args(&args);
        tracing::debug!(command = %display_command(&cmd), "running javac");

        let mut errors = 0;
        let mut warnings = 0;
        let output = run_command_streaming(&mut cmd, |line| {
            if let Some(diagnostic) = parse_line(line) {
                match diagnostic.severity {
                    Severity::Error => errors += 1,
                    Severity::Warning => warnings += 1,
                    Severity::Info => {}
                }
                on_diagnostic(diagnostic);
            }
        })?;

        // javac prints some usage errors to stdout.
        for diagnostic in crate::diagnostic::parse_diagnostics(&output.stdout) {
            if diagnostic.is_error() {
                errors += 1;
            }
            on_diagnostic(diagnostic);
        }

        Ok(CompileOutcome {
            success: output.success,
            errors,
            warnings,
        })
    }
}
