//! Compile project sources to class files.

use std::path::PathBuf;

use dexpack_config::BuildKind;
use dexpack_tools::CompileRequest;
use dexpack_util::fs;

use super::TaskContext;
use crate::diagnostics::DiagnosticSink;
use crate::error::EngineError;

pub(super) fn run(ctx: &mut TaskContext<'_>) -> Result<(), EngineError> {
    let project = ctx.project;

    let mut classpath = project.library_jars()?;
    if let Some(platform) = ctx.tools.android_jar() {
        classpath.push(platform.to_path_buf());
    }

    let mut sourcepath = project.source_roots();
    if ctx.kind == BuildKind::Application {
        sourcepath.push(project.generated_source_dir());
    }

    let request = CompileRequest {
        classpath,
        sourcepath,
        output_dir: project.classes_dir(),
        sources: sources(ctx)?,
        java_version: project.build_settings().java_version.clone(),
    };

    ctx.output.status(
        "Compiling",
        &format!("{} ({} file(s))", project.name(), request.sources.len()),
    );
    for source in &request.sources {
        ctx.output.detail(&format!("  {}", source.display()));
    }

    let compiler = ctx.tools.compiler()?;
    let sink = &mut ctx.diagnostics;
    let outcome = compiler.compile(&request, &mut |diagnostic| sink.report(diagnostic))?;

    tracing::info!(
        success = outcome.success,
        errors = outcome.errors,
        warnings = outcome.warnings,
        "compile finished"
    );
    if !outcome.success {
        return Err(EngineError::CompilationFailed {
            errors: outcome.errors.max(1),
        });
    }
    Ok(())
}

/// The files handed to the compiler. An entry point pulls in what it uses
/// through the source path; a library, or a project without an entry point,
/// compiles every source file.
fn sources(ctx: &TaskContext<'_>) -> Result<Vec<PathBuf>, EngineError> {
    let project = ctx.project;
    if ctx.kind != BuildKind::LibraryArchive {
        if let Some(entry) = project.main_class_source() {
            return Ok(vec![entry]);
        }
    }

    let roots = project.source_roots();
    let mut files = Vec::new();
    for root in &roots {
        files.extend(fs::collect_files(root, "java")?);
    }
    if files.is_empty() {
        return Err(EngineError::NoSources {
            dirs: roots
                .iter()
                .map(|r| r.display().to_string())
                .collect::<Vec<_>>()
                .join(", "),
        });
    }
    Ok(files)
}
