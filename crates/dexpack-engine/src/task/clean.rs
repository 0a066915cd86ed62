//! Reset build outputs. The converted-library cache is never touched.

use dexpack_config::ProjectDescriptor;
use dexpack_util::fs;

use super::TaskContext;
use crate::error::EngineError;

pub(super) fn run(ctx: &mut TaskContext<'_>) -> Result<(), EngineError> {
    let project = ctx.project;
    ctx.output.status("Cleaning", project.name());

    for dir in [
        project.classes_dir(),
        project.generated_dir(),
        project.intermediates_dir(),
        project.dexed_classes_dir(),
    ] {
        fs::remove_dir_all_if_exists(&dir)?;
    }
    // A build that fails later must not leave the previous package looking current.
    fs::remove_file_if_exists(&ctx.output_path())?;

    // Recreates the directories removed above.
    project.create_layout()?;
    tracing::debug!(project = project.name(), "build outputs reset");
    Ok(())
}

/// Remove everything under the build directory except the converted-library
/// cache. Returns how many entries were removed.
///
/// # Errors
/// Returns an error if an entry cannot be removed.
pub fn clean_build_dir(project: &ProjectDescriptor) -> Result<usize, EngineError> {
    let build_dir = project.build_dir();
    let entries = match std::fs::read_dir(&build_dir) {
        Ok(entries) => entries,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(0),
        Err(source) => return Err(EngineError::io(&build_dir, source)),
    };

    let keep = project.dexed_libs_dir();
    let mut removed = 0;
    for entry in entries {
        let entry = entry.map_err(|source| EngineError::io(&build_dir, source))?;
        let path = entry.path();
        if path == keep {
            continue;
        }
        if path.is_dir() {
            fs::remove_dir_all_if_exists(&path)?;
        } else {
            fs::remove_file_if_exists(&path)?;
        }
        removed += 1;
    }
    Ok(removed)
}
