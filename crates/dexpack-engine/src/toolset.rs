//! The set of collaborators a build drives.

use std::path::{Path, PathBuf};

use dexpack_config::{BuildKind, ProjectDescriptor};
use dexpack_tools::detect::{debug_keystore, resolve_android_jar, resolve_tool, Tool};
use dexpack_tools::{
    Aapt, ApkAssembler, ApkSigner, ArchiveMerger, Compiler, ContainerMerger, Converter, Javac,
    PackageAssembler, ResourcePackager, Signer, ToolError, D8,
};

use crate::builder::BuildVariant;
use crate::error::EngineError;

/// Collaborators for one build. Slots a build kind never uses may stay empty.
pub struct Toolset {
    compiler: Option<Box<dyn Compiler>>,
    converter: Option<Box<dyn Converter>>,
    merger: Box<dyn ContainerMerger>,
    resources: Option<Box<dyn ResourcePackager>>,
    assembler: Option<Box<dyn PackageAssembler>>,
    signer: Option<Box<dyn Signer>>,
    android_jar: Option<PathBuf>,
    debug_keystore: Option<PathBuf>,
}

impl Default for Toolset {
    fn default() -> Self {
        Self {
            compiler: None,
            converter: None,
            merger: Box::new(ArchiveMerger),
            resources: None,
            assembler: None,
            signer: None,
            android_jar: None,
            debug_keystore: None,
        }
    }
}

fn missing(tool: &str) -> EngineError {
    EngineError::Tool(ToolError::NotFound {
        tool: tool.to_owned(),
        hint: "no implementation configured for this build".to_owned(),
    })
}

impl Toolset {
    pub fn new() -> Self {
        Self::default()
    }

    /// Resolve the real tools a `kind` build of `project` needs.
    ///
    /// Only the tools its build kind uses are required: a library archive
    /// needs just the compiler, a plain archive adds the converter, and an
    /// application needs everything.
    ///
    /// # Errors
    /// Returns an error naming the first required tool that cannot be found.
    pub fn detect(
        project: &ProjectDescriptor,
        kind: BuildKind,
        variant: BuildVariant,
    ) -> Result<Self, EngineError> {
        let configured = project.tools();

        let javac = resolve_tool(Tool::Javac, configured.javac.as_deref())?;
        let android_jar = match kind {
            BuildKind::Application => Some(resolve_android_jar(configured.android_jar.as_deref())?),
            BuildKind::PlainArchive | BuildKind::LibraryArchive => {
                resolve_android_jar(configured.android_jar.as_deref()).ok()
            }
        };

        let mut set = Self::new()
            .with_compiler(Javac::new(&javac))
            .with_android_jar(android_jar.as_deref());

        if kind == BuildKind::LibraryArchive {
            return Ok(set);
        }

        let d8_path = resolve_tool(Tool::D8, configured.d8.as_deref())?;
        let d8 = D8::new(&d8_path, project.build_settings().min_api)
            .android_jar(android_jar.as_deref())
            .release(variant == BuildVariant::Release);

        if kind == BuildKind::Application {
            let aapt = resolve_tool(Tool::Aapt, configured.aapt.as_deref())?;
            let apksigner = resolve_tool(Tool::ApkSigner, configured.apksigner.as_deref())?;
            set = set
                .with_resource_packager(Aapt::new(&aapt, android_jar.as_deref()))
                .with_assembler(ApkAssembler::new(d8.finalizing()))
                .with_signer(ApkSigner::new(&apksigner))
                .with_debug_keystore(&debug_keystore(configured.debug_keystore.as_deref())?);
        }
        Ok(set.with_converter(d8))
    }

    pub fn with_compiler(mut self, compiler: impl Compiler + 'static) -> Self {
        self.compiler = Some(Box::new(compiler));
        self
    }

    pub fn with_converter(mut self, converter: impl Converter + 'static) -> Self {
        self.converter = Some(Box::new(converter));
        self
    }

    pub fn with_merger(mut self, merger: impl ContainerMerger + 'static) -> Self {
        self.merger = Box::new(merger);
        self
    }

    pub fn with_resource_packager(mut self, packager: impl ResourcePackager + 'static) -> Self {
        self.resources = Some(Box::new(packager));
        self
    }

    pub fn with_assembler(mut self, assembler: impl PackageAssembler + 'static) -> Self {
        self.assembler = Some(Box::new(assembler));
        self
    }

    pub fn with_signer(mut self, signer: impl Signer + 'static) -> Self {
        self.signer = Some(Box::new(signer));
        self
    }

    pub fn with_android_jar(mut self, path: Option<&Path>) -> Self {
        self.android_jar = path.map(Path::to_path_buf);
        self
    }

    pub fn with_debug_keystore(mut self, path: &Path) -> Self {
        self.debug_keystore = Some(path.to_path_buf());
        self
    }

    /// # Errors
    /// Returns an error if no compiler is configured.
    pub fn compiler(&self) -> Result<&dyn Compiler, EngineError> {
        self.compiler.as_deref().ok_or_else(|| missing("compiler"))
    }

    /// # Errors
    /// Returns an error if no converter is configured.
    pub fn converter(&self) -> Result<&dyn Converter, EngineError> {
        self.converter.as_deref().ok_or_else(|| missing("converter"))
    }

    pub fn merger(&self) -> &dyn ContainerMerger {
        self.merger.as_ref()
    }

    /// # Errors
    /// Returns an error if no resource packager is configured.
    pub fn resource_packager(&self) -> Result<&dyn ResourcePackager, EngineError> {
        self.resources
            .as_deref()
            .ok_or_else(|| missing("resource packager"))
    }

    /// # Errors
    /// Returns an error if no package assembler is configured.
    pub fn assembler(&self) -> Result<&dyn PackageAssembler, EngineError> {
        self.assembler
            .as_deref()
            .ok_or_else(|| missing("package assembler"))
    }

    /// # Errors
    /// Returns an error if no signer is configured.
    pub fn signer(&self) -> Result<&dyn Signer, EngineError> {
        self.signer.as_deref().ok_or_else(|| missing("signer"))
    }

    /// The platform bootstrap classpath, when known.
    pub fn android_jar(&self) -> Option<&Path> {
        self.android_jar.as_deref()
    }

    /// # Errors
    /// Returns an error if no debug keystore is configured.
    pub fn debug_keystore(&self) -> Result<&Path, EngineError> {
        self.debug_keystore
            .as_deref()
            .ok_or_else(|| missing("debug keystore"))
    }

    /// Check that every collaborator `kind` needs is present.
    ///
    /// # Errors
    /// Returns an error naming the first missing collaborator.
    pub fn require(&self, kind: BuildKind) -> Result<(), EngineError> {
        self.compiler()?;
        if kind == BuildKind::LibraryArchive {
            return Ok(());
        }
        self.converter()?;
        if kind == BuildKind::Application {
            self.resource_packager()?;
            self.assembler()?;
            self.signer()?;
        }
        Ok(())
    }
}

impl std::fmt::Debug for Toolset {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Toolset")
            .field("compiler", &self.compiler.is_some())
            .field("converter", &self.converter.is_some())
            .field("resources", &self.resources.is_some())
            .field("assembler", &self.assembler.is_some())
            .field("signer", &self.signer.is_some())
            .field("android_jar", &self.android_jar)
            .field("debug_keystore", &self.debug_keystore)
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use dexpack_tools::{CompileOutcome, CompileRequest, Diagnostic};

    use super::*;

    struct NoopCompiler;

    impl Compiler for NoopCompiler {
        fn compile(
            &self,
            _request: &CompileRequest,
            _on_diagnostic: &mut dyn FnMut(Diagnostic),
        ) -> Result<CompileOutcome, ToolError> {
            Ok(CompileOutcome {
                success: true,
                errors: 0,
                warnings: 0,
            })
        }
    }

    #[test]
    fn empty_toolset_reports_missing_compiler() {
        let err = Toolset::new().require(BuildKind::LibraryArchive).unwrap_err();
        assert!(err.to_string().contains("compiler"), "{err}");
    }

    #[test]
    fn library_archive_needs_only_compiler() {
        let set = Toolset::new().with_compiler(NoopCompiler);
        set.require(BuildKind::LibraryArchive).unwrap();
        let err = set.require(BuildKind::PlainArchive).unwrap_err();
        assert!(err.to_string().contains("converter"), "{err}");
    }
}
