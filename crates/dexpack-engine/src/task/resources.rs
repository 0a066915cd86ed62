//! Compile resources into a resource table and generate the resource
//! identifiers source.

use dexpack_tools::ResourceRequest;

use super::TaskContext;
use crate::error::EngineError;

pub(super) fn run(ctx: &mut TaskContext<'_>) -> Result<(), EngineError> {
    let project = ctx.project;
    let res = project.res_dir();
    let assets = project.assets_dir();
    let libraries = project.resource_libraries()?;

    let request = ResourceRequest {
        manifest: project.android_manifest(),
        res_dirs: if res.is_dir() { vec![res] } else { Vec::new() },
        assets_dir: assets.is_dir().then_some(assets),
        library_res_dirs: libraries.iter().filter_map(|l| l.res_dir()).collect(),
        library_assets_dirs: libraries.iter().filter_map(|l| l.assets_dir()).collect(),
        extra_packages: libraries.iter().map(|l| l.package.clone()).collect(),
        generated_source_dir: project.generated_source_dir(),
        output: project.resources_package(),
        custom_package: ctx.package.clone(),
    };

    ctx.output
        .status("Packaging", &format!("{} resources", project.name()));
    for library in &libraries {
        ctx.output
            .detail(&format!("{:>12} {}", "Overlay", library.package));
    }
    ctx.tools.resource_packager()?.package_resources(&request)?;
    tracing::debug!(
        output = %request.output.display(),
        libraries = libraries.len(),
        "resources packaged"
    );
    Ok(())
}
