//! Package assembly: converted container + compiled resources + manifest.

use std::path::{Path, PathBuf};

use dexpack_util::archive::{
    read_entries, read_package_entries, write_package_entries, EntryStorage,
};

use crate::d8::Converter;
use crate::error::ToolError;

const MANIFEST_ENTRY: &str = "AndroidManifest.xml";

/// The compiled resource table. The platform maps it in place, so it must be
/// stored uncompressed and aligned whatever the resource packager did.
const RESOURCE_TABLE_ENTRY: &str = "resources.arsc";

/// Inputs to package assembly.
#[derive(Debug, Clone)]
pub struct AssembleRequest {
    /// The merged per-class container.
    pub container: PathBuf,
    /// The compiled resource table from the resource packager.
    pub resources: PathBuf,
    /// The raw manifest, used if the resource table does not carry one.
    pub manifest: PathBuf,
    /// Unsigned package to write.
    pub output: PathBuf,
}

/// The package assembler collaborator.
pub trait PackageAssembler: Send + Sync {
    /// # Errors
    /// Returns an error if an input is missing or a tool step fails.
    fn assemble(&self, request: &AssembleRequest) -> Result<(), ToolError>;
}

/// Assembles an installable package in-process, using `C` to turn the merged
/// per-class container into final `classes*.dex` files.
#[derive(Debug, Clone)]
pub struct ApkAssembler<C> {
    finalizer: C,
}

impl<C: Converter> ApkAssembler<C> {
    pub fn new(finalizer: C) -> Self {
        Self { finalizer }
    }
}

fn is_dex_entry(name: &str) -> bool {
    !name.contains('/') && name.starts_with("classes") && name.ends_with(".dex")
}

impl<C: Converter> PackageAssembler for ApkAssembler<C> {
    fn assemble(&self, request: &AssembleRequest) -> Result<(), ToolError> {
        for (what, path) in [
            ("converted classes", &request.container),
            ("compiled resources", &request.resources),
        ] {
            if !path.is_file() {
                return Err(ToolError::MissingInput {
                    what: what.to_owned(),
                    path: path.clone(),
                });
            }
        }

        let dex_zip = staging_path(&request.output, "dex.zip");
        self.finalizer.convert(&request.container, &dex_zip)?;
        let dex = read_entries(&dex_zip)?;
        dexpack_util::fs::remove_file_if_exists(&dex_zip)?;

        // Resource entries keep the storage the resource packager chose.
        let mut entries = read_package_entries(&request.resources)?;
        if let Some((storage, _)) = entries.get_mut(RESOURCE_TABLE_ENTRY) {
            *storage = EntryStorage::Stored;
        }
        let mut dex_count = 0;
        for (name, data) in dex {
            if is_dex_entry(&name) {
                entries.insert(name, (EntryStorage::Deflated, data));
                dex_count += 1;
            }
        }
        if dex_count == 0 {
            return Err(ToolError::MissingOutput {
                tool: "d8".to_owned(),
                path: PathBuf::from("classes.dex"),
            });
        }
        if !entries.contains_key(MANIFEST_ENTRY) {
            let manifest = std::fs::read(&request.manifest).map_err(|_| {
                ToolError::MissingInput {
                    what: "AndroidManifest.xml".to_owned(),
                    path: request.manifest.clone(),
                }
            })?;
            entries.insert(
                MANIFEST_ENTRY.to_owned(),
                (EntryStorage::Deflated, manifest),
            );
        }

        write_package_entries(&request.output, &entries)?;
        tracing::debug!(
            output = %request.output.display(),
            entries = entries.len(),
            dex_files = dex_count,
            "assembled package"
        );
        Ok(())
    }
}

fn staging_path(output: &Path, suffix: &str) -> PathBuf {
    let stem = output
        .file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_default();
    output.with_file_name(format!("{stem}.{suffix}"))
}
