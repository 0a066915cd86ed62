//! Convert project classes and third-party libraries to the device format and
//! merge them into one container.

use std::path::PathBuf;

use dexpack_tools::{CollisionPolicy, ToolError};
use dexpack_util::{archive, fs};
use rayon::prelude::*;

use super::TaskContext;
use crate::cache::CacheOutcome;
use crate::error::EngineError;

/// What the convert task did with third-party libraries.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ConvertReport {
    /// Libraries served from the content cache.
    pub hits: usize,
    /// Libraries converted during this build.
    pub converted: usize,
    /// Library containers merged into the project container.
    pub merged: usize,
}

pub(super) fn run(ctx: &mut TaskContext<'_>) -> Result<(), EngineError> {
    let project = ctx.project;
    let converter = ctx.tools.converter()?;
    let cache = ctx.cache;

    // Artifacts converted under other settings (variant, minimum API) are
    // never reused for this build.
    let scope = converter.settings_key();

    let libraries = project.library_jars()?;
    ctx.output.status(
        "Converting",
        &format!("{} ({} libraries)", project.name(), libraries.len()),
    );
    ctx.output.detail(&format!("{:>12} {}", "Settings", scope));

    // Libraries are independent of each other and of the project classes.
    let outcomes: Vec<(PathBuf, CacheOutcome)> = libraries
        .par_iter()
        .map(|lib| {
            let outcome = cache.get_or_convert(lib, &scope, |out| {
                converter.convert(lib, out).map_err(EngineError::from)
            })?;
            Ok::<_, EngineError>((lib.clone(), outcome))
        })
        .collect::<Result<_, EngineError>>()?;

    let mut report = ConvertReport::default();
    for (lib, outcome) in &outcomes {
        let verb = if outcome.is_hit() {
            report.hits += 1;
            "Fresh"
        } else {
            report.converted += 1;
            "Converted"
        };
        // Unpacked libraries all ship a `classes.jar`, so name them by path.
        let libs_dir = project.libs_dir();
        let name = lib.strip_prefix(&libs_dir).unwrap_or(lib).display();
        ctx.output.detail(&format!("{verb:>12} {name}"));
    }

    let classes_jar = project.classes_jar();
    let container = project.dexed_classes_container();
    let entries = archive::archive_dir(&project.classes_dir(), &classes_jar, &[])?;
    tracing::debug!(entries, jar = %classes_jar.display(), "project classes archived");
    fs::ensure_dir(&project.dexed_classes_dir())?;
    converter.convert(&classes_jar, &container)?;

    let merger = ctx.tools.merger();
    if !outcomes.is_empty() {
        let noun = if outcomes.len() == 1 { "library" } else { "libraries" };
        ctx.output.status(
            "Merging",
            &format!("{} {noun} into {}", outcomes.len(), project.name()),
        );
    }
    for (lib, outcome) in &outcomes {
        merger
            .merge(&container, outcome.path(), CollisionPolicy::Fail)
            .map_err(|e| match e {
                ToolError::Collision { symbol, .. } => ToolError::Collision {
                    symbol,
                    incoming: lib.display().to_string(),
                },
                other => other,
            })?;
        report.merged += 1;
    }

    tracing::info!(
        hits = report.hits,
        converted = report.converted,
        merged = report.merged,
        "conversion finished"
    );
    ctx.convert = Some(report);
    Ok(())
}
