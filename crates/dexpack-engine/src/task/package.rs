//! Assemble the unsigned application package.

use dexpack_tools::AssembleRequest;

use super::TaskContext;
use crate::error::EngineError;

pub(super) fn run(ctx: &mut TaskContext<'_>) -> Result<(), EngineError> {
    let project = ctx.project;
    let request = AssembleRequest {
        container: project.dexed_classes_container(),
        resources: project.resources_package(),
        manifest: project.android_manifest(),
        output: project.unsigned_package(),
    };

    ctx.output.status("Packaging", project.name());
    ctx.tools.assembler()?.assemble(&request)?;
    tracing::debug!(output = %request.output.display(), "package assembled");
    Ok(())
}
