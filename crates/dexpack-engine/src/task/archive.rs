//! Pack compiled classes into a jar.

use dexpack_config::BuildKind;
use dexpack_util::{archive, fs};

use super::TaskContext;
use crate::error::EngineError;

const MANIFEST_ENTRY: &str = "META-INF/MANIFEST.MF";

/// Jar manifest text. Plain archives name their entry point; libraries don't.
fn jar_manifest(main_class: Option<&str>) -> String {
    let mut text = String::from("Manifest-Version: 1.0\r\nCreated-By: dexpack\r\n");
    if let Some(main) = main_class {
        text.push_str(&format!("Main-Class: {main}\r\n"));
    }
    text.push_str("\r\n");
    text
}

pub(super) fn run(ctx: &mut TaskContext<'_>) -> Result<(), EngineError> {
    let project = ctx.project;
    let output = ctx.output_path();
    let main_class = match ctx.kind {
        BuildKind::PlainArchive => project.main_class(),
        BuildKind::Application | BuildKind::LibraryArchive => None,
    };
    let manifest = jar_manifest(main_class);

    ctx.output.status("Archiving", project.name());
    let staging = output.with_extension("jar.partial");
    let written = archive::archive_dir(
        &project.classes_dir(),
        &staging,
        &[(MANIFEST_ENTRY, manifest.as_bytes())],
    );
    if let Err(e) = written {
        fs::remove_file_if_exists(&staging)?;
        return Err(e.into());
    }
    fs::rename(&staging, &output)?;

    tracing::info!(output = %output.display(), "archive written");
    ctx.produced = Some(output);
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn manifest_names_main_class() {
        let text = jar_manifest(Some("com.example.Main"));
        assert!(text.contains("Main-Class: com.example.Main\r\n"));
        assert!(text.starts_with("Manifest-Version: 1.0\r\n"));
    }

    #[test]
    fn library_manifest_has_no_entry_point() {
        assert!(!jar_manifest(None).contains("Main-Class"));
    }
}
