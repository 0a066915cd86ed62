//! Resource packaging (`aapt package`).

use std::path::{Path, PathBuf};
use std::process::Command;

use dexpack_util::process::{display_command, run_command};

use crate::error::ToolError;

/// Inputs to the resource packager.
#[derive(Debug, Clone, Default)]
pub struct ResourceRequest {
    pub manifest: PathBuf,
    /// Resource directories that exist. May be empty.
    pub res_dirs: Vec<PathBuf>,
    pub assets_dir: Option<PathBuf>,
    /// Resource directories of Android libraries, overlaid after `res_dirs`
    /// so the project's own resources win.
    pub library_res_dirs: Vec<PathBuf>,
    pub library_assets_dirs: Vec<PathBuf>,
    /// Library packages that also get an `R` class, with the same ids as the
    /// project's.
    pub extra_packages: Vec<String>,
    /// Receives the generated `R.java`.
    pub generated_source_dir: PathBuf,
    /// The compiled resource table (`resources.ap_`).
    pub output: PathBuf,
    /// Overrides the package of the generated `R` class.
    pub custom_package: Option<String>,
}

/// The resource packager collaborator.
pub trait ResourcePackager: Send + Sync {
    /// Compile resources into `request.output` and generate `R` sources.
    ///
    /// # Errors
    /// Returns an error if the packager fails. Its output is carried verbatim.
    fn package_resources(&self, request: &ResourceRequest) -> Result<(), ToolError>;
}

/// `aapt` found on disk.
#[derive(Debug, Clone)]
pub struct Aapt {
    program: PathBuf,
    android_jar: Option<PathBuf>,
}

impl Aapt {
    pub fn new(program: &Path, android_jar: Option<&Path>) -> Self {
        Self {
            program: program.to_path_buf(),
            android_jar: android_jar.map(Path::to_path_buf),
        }
    }

    /// The `aapt` argument list for `request`.
    pub fn build_args(&self, request: &ResourceRequest) -> Vec<String> {
        let mut args = vec!["package".to_owned(), "-f".to_owned()];
        if !request.library_res_dirs.is_empty() || !request.library_assets_dirs.is_empty() {
            args.push("--auto-add-overlay".to_owned());
        }
        args.extend([
            "-m".to_owned(),
            "-J".to_owned(),
            request.generated_source_dir.display().to_string(),
            "-M".to_owned(),
            request.manifest.display().to_string(),
        ]);
        for dir in request.res_dirs.iter().chain(&request.library_res_dirs) {
            args.push("-S".to_owned());
            args.push(dir.display().to_string());
        }
        for dir in request.assets_dir.iter().chain(&request.library_assets_dirs) {
            args.push("-A".to_owned());
            args.push(dir.display().to_string());
        }
        if let Some(jar) = &self.android_jar {
            args.push("-I".to_owned());
            args.push(jar.display().to_string());
        }
        if let Some(package) = &request.custom_package {
            args.push("--custom-package".to_owned());
            args.push(package.clone());
        }
        if !request.extra_packages.is_empty() {
            args.push("--extra-packages".to_owned());
            args.push(request.extra_packages.join(":"));
        }
        args.push("-F".to_owned());
        args.push(request.output.display().to_string());
        args
    }
}

impl ResourcePackager for Aapt {
    fn package_resources(&self, request: &ResourceRequest) -> Result<(), ToolError> {
        if !request.manifest.is_file() {
            return Err(ToolError::MissingInput {
                what: "AndroidManifest.xml".to_owned(),
                path: request.manifest.clone(),
            });
        }
        dexpack_util::fs::ensure_dir(&request.generated_source_dir)?;
        if let Some(parent) = request.output.parent() {
            dexpack_util::fs::ensure_dir(parent)?;
        }

        let mut cmd = Command::new(&self.program);
        cmd.args(self.build_args(request));
        tracing::debug!(command = %display_command(&cmd), "running aapt");
        let result = run_command(&mut cmd)?;
        if !result.success {
            return Err(ToolError::failed("aapt", &result));
        }
        Ok(())
    }
}
