//! The Project Descriptor: a project's identity plus its fixed on-disk layout.
//!
//! ```text
//! <root>/<name>/
//!     dexpack.toml
//!     libs/                         third-party archives
//!     src/main/java/                source roots (configurable)
//!     src/main/res/
//!     src/main/AndroidManifest.xml
//!     build/
//!         classes/                  compiler output
//!         dexedLibs/                content cache of converted libraries
//!         dexedClasses/classes.zip  merged converted container
//!         generated/source/         generated `R` sources
//!         intermediates/            resource table, unsigned package, class jar
//!         output/<name>.apk
//!         output/jar/<name>.jar
//! ```
//!
//! Every build path is derived from the project directory, so the whole
//! `build/` tree can be deleted and recreated at any time.

use std::path::{Path, PathBuf};

use crate::manifest::{
    validate_qualified_name, BuildKind, BuildSettings, Manifest, ManifestError, Signing, Tools,
    MANIFEST_FILE,
};

const ANDROID_MANIFEST: &str = "AndroidManifest.xml";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProjectDescriptor {
    root: PathBuf,
    project_dir: PathBuf,
    name: String,
    kind: BuildKind,
    package: Option<String>,
    main_class: Option<String>,
    source_dirs: Vec<PathBuf>,
    libs_dir: PathBuf,
    build: BuildSettings,
    tools: Tools,
    signing: Option<Signing>,
}

impl ProjectDescriptor {
    /// Describe the project `<root>/<name>` with the default layout.
    pub fn new(root: &Path, name: &str) -> Self {
        Self::from_manifest(root, Manifest::new(name, BuildKind::default()))
    }

    /// Load the project whose `dexpack.toml` lives in `project_dir`.
    ///
    /// # Errors
    /// Returns an error if the record is missing or invalid, or if its name does
    /// not match the directory it lives in.
    pub fn open(project_dir: &Path) -> Result<Self, ProjectError> {
        let manifest_path = project_dir.join(MANIFEST_FILE);
        if !manifest_path.exists() {
            return Err(ProjectError::NoManifest {
                dir: project_dir.display().to_string(),
            });
        }
        let manifest = Manifest::from_path(&manifest_path)?;
        let root = project_dir
            .parent()
            .map(Path::to_path_buf)
            .unwrap_or_default();
        let mut descriptor = Self::from_manifest(&root, manifest);
        // The record may be opened through a directory whose name differs from
        // the project name (a renamed checkout). The directory wins for layout.
        descriptor.project_dir = project_dir.to_path_buf();
        Ok(descriptor)
    }

    /// Walk up from `start` to the nearest directory containing `dexpack.toml`.
    ///
    /// # Errors
    /// Returns an error if no ancestor holds a record, or the record is invalid.
    pub fn discover(start: &Path) -> Result<Self, ProjectError> {
        let mut dir = Some(start);
        while let Some(candidate) = dir {
            if candidate.join(MANIFEST_FILE).is_file() {
                return Self::open(candidate);
            }
            dir = candidate.parent();
        }
        Err(ProjectError::NoManifest {
            dir: start.display().to_string(),
        })
    }

    fn from_manifest(root: &Path, manifest: Manifest) -> Self {
        let project = manifest.project;
        Self {
            root: root.to_path_buf(),
            project_dir: root.join(&project.name),
            name: project.name,
            kind: project.kind,
            package: project.package,
            main_class: project.main_class,
            source_dirs: project.source_dirs,
            libs_dir: project.libs_dir,
            build: manifest.build,
            tools: manifest.tools,
            signing: manifest.signing,
        }
    }

    /// Snapshot the descriptor back into a persisted record.
    pub fn to_manifest(&self) -> Manifest {
        let mut manifest = Manifest::new(&self.name, self.kind);
        manifest.project.package.clone_from(&self.package);
        manifest.project.main_class.clone_from(&self.main_class);
        manifest.project.source_dirs.clone_from(&self.source_dirs);
        manifest.project.libs_dir.clone_from(&self.libs_dir);
        manifest.build = self.build.clone();
        manifest.tools = self.tools.clone();
        manifest.signing.clone_from(&self.signing);
        manifest
    }

    /// Persist the descriptor as `dexpack.toml` in the project directory.
    ///
    /// # Errors
    /// Returns an error if the record cannot be written.
    pub fn save(&self) -> Result<(), ProjectError> {
        dexpack_util::fs::ensure_dir(&self.project_dir)?;
        self.to_manifest().write_to(&self.manifest_path())?;
        Ok(())
    }

    // Setters. Only meaningful before the descriptor is handed to a build.

    /// Rename the project. The project directory follows the new name.
    ///
    /// # Errors
    /// Returns an error if the name is not path-safe.
    pub fn set_name(&mut self, name: &str) -> Result<(), ProjectError> {
        Manifest::new(name, self.kind).validate()?;
        self.name = name.to_owned();
        self.project_dir = self.root.join(name);
        Ok(())
    }

    /// # Errors
    /// Returns an error if `package` is not a dotted Java name.
    pub fn set_package(&mut self, package: &str) -> Result<(), ProjectError> {
        validate_qualified_name("package", package)?;
        self.package = Some(package.to_owned());
        Ok(())
    }

    /// # Errors
    /// Returns an error if `main_class` is not a dotted Java name.
    pub fn set_main_class(&mut self, main_class: &str) -> Result<(), ProjectError> {
        validate_qualified_name("main-class", main_class)?;
        self.main_class = Some(main_class.to_owned());
        Ok(())
    }

    pub fn set_kind(&mut self, kind: BuildKind) {
        self.kind = kind;
    }

    pub fn set_tools(&mut self, tools: Tools) {
        self.tools = tools;
    }

    pub fn set_signing(&mut self, signing: Option<Signing>) {
        self.signing = signing;
    }

    // Identity.

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn kind(&self) -> BuildKind {
        self.kind
    }

    pub fn main_class(&self) -> Option<&str> {
        self.main_class.as_deref()
    }

    /// The package name as recorded in `dexpack.toml`, without fallback.
    pub fn package(&self) -> Option<&str> {
        self.package.as_deref()
    }

    /// The package name, falling back to the `package` attribute of
    /// `AndroidManifest.xml` when the record does not set one.
    ///
    /// # Errors
    /// Returns an error if the Android manifest exists but cannot be parsed.
    pub fn resolve_package(&self) -> Result<Option<String>, ProjectError> {
        if let Some(package) = &self.package {
            return Ok(Some(package.clone()));
        }
        let manifest = self.android_manifest();
        if !manifest.is_file() {
            return Ok(None);
        }
        Ok(crate::android_manifest::read_package(&manifest)?)
    }

    pub fn build_settings(&self) -> &BuildSettings {
        &self.build
    }

    pub fn tools(&self) -> &Tools {
        &self.tools
    }

    pub fn signing(&self) -> Option<&Signing> {
        self.signing.as_ref()
    }

    // Source layout.

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn project_dir(&self) -> &Path {
        &self.project_dir
    }

    pub fn manifest_path(&self) -> PathBuf {
        self.project_dir.join(MANIFEST_FILE)
    }

    pub fn libs_dir(&self) -> PathBuf {
        self.project_dir.join(&self.libs_dir)
    }

    /// Unpacked Android libraries: directories directly under the libs
    /// directory that hold an `AndroidManifest.xml`. Sorted by path.
    ///
    /// # Errors
    /// Returns an error if the libs directory cannot be read, or a library
    /// manifest cannot be parsed or declares no package.
    pub fn resource_libraries(&self) -> Result<Vec<ResourceLibrary>, ProjectError> {
        let dirs = dexpack_util::fs::list_dirs(&self.libs_dir())?;
        dirs.into_iter()
            .filter(|dir| dir.join(ANDROID_MANIFEST).is_file())
            .map(|dir| {
                let manifest = dir.join(ANDROID_MANIFEST);
                let package = crate::android_manifest::read_package(&manifest)?.ok_or_else(
                    || ProjectError::LibraryWithoutPackage {
                        manifest: manifest.display().to_string(),
                    },
                )?;
                Ok(ResourceLibrary { dir, package })
            })
            .collect()
    }

    /// Every archive on the library classpath: `libs/*.jar` in name order,
    /// then the `classes.jar` of each unpacked Android library.
    ///
    /// # Errors
    /// Returns an error if the libs directory cannot be read or an unpacked
    /// library is malformed.
    pub fn library_jars(&self) -> Result<Vec<PathBuf>, ProjectError> {
        let mut jars = dexpack_util::fs::glob_files(&self.libs_dir(), "*.jar")?;
        jars.extend(
            self.resource_libraries()?
                .iter()
                .filter_map(ResourceLibrary::classes_jar),
        );
        Ok(jars)
    }

    /// Source roots in declaration order.
    pub fn source_roots(&self) -> Vec<PathBuf> {
        self.source_dirs
            .iter()
            .map(|dir| self.project_dir.join(dir))
            .collect()
    }

    fn src_main(&self) -> PathBuf {
        self.project_dir.join("src").join("main")
    }

    pub fn res_dir(&self) -> PathBuf {
        self.src_main().join("res")
    }

    pub fn assets_dir(&self) -> PathBuf {
        self.src_main().join("assets")
    }

    pub fn android_manifest(&self) -> PathBuf {
        self.src_main().join(ANDROID_MANIFEST)
    }

    /// The source file declaring the main class, searched across the source
    /// roots in order. `None` when no main class is set or no root holds it.
    pub fn main_class_source(&self) -> Option<PathBuf> {
        let main = self.main_class.as_deref()?;
        let relative = format!("{}.java", main.replace('.', "/"));
        self.source_roots()
            .into_iter()
            .map(|root| root.join(&relative))
            .find(|candidate| candidate.is_file())
    }

    // Build layout.

    pub fn build_dir(&self) -> PathBuf {
        self.project_dir.join("build")
    }

    pub fn classes_dir(&self) -> PathBuf {
        self.build_dir().join("classes")
    }

    /// Content cache of converted third-party libraries. Survives clean.
    pub fn dexed_libs_dir(&self) -> PathBuf {
        self.build_dir().join("dexedLibs")
    }

    pub fn dexed_classes_dir(&self) -> PathBuf {
        self.build_dir().join("dexedClasses")
    }

    /// The merged converted container for project classes plus libraries.
    pub fn dexed_classes_container(&self) -> PathBuf {
        self.dexed_classes_dir().join("classes.zip")
    }

    pub fn generated_dir(&self) -> PathBuf {
        self.build_dir().join("generated")
    }

    pub fn generated_source_dir(&self) -> PathBuf {
        self.generated_dir().join("source")
    }

    pub fn intermediates_dir(&self) -> PathBuf {
        self.build_dir().join("intermediates")
    }

    /// Compiled resource table produced by the resource packager.
    pub fn resources_package(&self) -> PathBuf {
        self.intermediates_dir().join("resources.ap_")
    }

    /// The assembled package before signing.
    pub fn unsigned_package(&self) -> PathBuf {
        self.intermediates_dir()
            .join(format!("{}-unsigned.apk", self.name))
    }

    /// Project classes packed into one archive for the converter.
    pub fn classes_jar(&self) -> PathBuf {
        self.intermediates_dir().join("classes.jar")
    }

    pub fn output_dir(&self) -> PathBuf {
        self.build_dir().join("output")
    }

    pub fn apk_path(&self) -> PathBuf {
        self.output_dir().join(format!("{}.apk", self.name))
    }

    pub fn jar_path(&self) -> PathBuf {
        self.output_dir().join("jar").join(format!("{}.jar", self.name))
    }

    /// The declared final output for this project's build kind.
    pub fn output_path(&self) -> PathBuf {
        match self.kind {
            BuildKind::Application => self.apk_path(),
            BuildKind::PlainArchive | BuildKind::LibraryArchive => self.jar_path(),
        }
    }

    /// Create the source and build directories. Safe to call repeatedly.
    ///
    /// # Errors
    /// Returns an error if a directory cannot be created.
    pub fn create_layout(&self) -> Result<(), ProjectError> {
        let mut dirs = vec![self.libs_dir()];
        dirs.extend(self.source_roots());
        dirs.extend([
            self.classes_dir(),
            self.dexed_libs_dir(),
            self.dexed_classes_dir(),
            self.generated_source_dir(),
            self.intermediates_dir(),
            self.output_dir(),
        ]);
        for dir in dirs {
            dexpack_util::fs::ensure_dir(&dir)?;
        }
        Ok(())
    }
}

/// An Android library unpacked under the libs directory:
///
/// ```text
/// libs/<name>/
///     AndroidManifest.xml   names the package of the library's `R` class
///     res/                  optional
///     assets/               optional
///     classes.jar           optional
/// ```
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResourceLibrary {
    pub dir: PathBuf,
    pub package: String,
}

impl ResourceLibrary {
    pub fn manifest(&self) -> PathBuf {
        self.dir.join(ANDROID_MANIFEST)
    }

    pub fn res_dir(&self) -> Option<PathBuf> {
        Some(self.dir.join("res")).filter(|d| d.is_dir())
    }

    pub fn assets_dir(&self) -> Option<PathBuf> {
        Some(self.dir.join("assets")).filter(|d| d.is_dir())
    }

    pub fn classes_jar(&self) -> Option<PathBuf> {
        Some(self.dir.join("classes.jar")).filter(|j| j.is_file())
    }
}

#[derive(Debug, thiserror::Error)]
pub enum ProjectError {
    #[error("no dexpack.toml found in {dir} - run `dexpack init` to create a project")]
    NoManifest { dir: String },
    #[error(transparent)]
    Manifest(#[from] ManifestError),
    #[error(transparent)]
    AndroidManifest(#[from] crate::android_manifest::AndroidManifestError),
    #[error("library manifest {manifest} declares no package - add a `package` attribute to <manifest>")]
    LibraryWithoutPackage { manifest: String },
    #[error(transparent)]
    Util(#[from] dexpack_util::error::UtilError),
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use std::fs;

    use super::*;

    #[test]
    fn layout_is_derived_from_root_and_name() {
        let p = ProjectDescriptor::new(Path::new("/work"), "hello");
        assert_eq!(p.project_dir(), Path::new("/work/hello"));
        assert_eq!(p.libs_dir(), PathBuf::from("/work/hello/libs"));
        assert_eq!(
            p.source_roots(),
            vec![PathBuf::from("/work/hello/src/main/java")]
        );
        assert_eq!(p.classes_dir(), PathBuf::from("/work/hello/build/classes"));
        assert_eq!(
            p.dexed_libs_dir(),
            PathBuf::from("/work/hello/build/dexedLibs")
        );
        assert_eq!(
            p.dexed_classes_container(),
            PathBuf::from("/work/hello/build/dexedClasses/classes.zip")
        );
        assert_eq!(
            p.generated_source_dir(),
            PathBuf::from("/work/hello/build/generated/source")
        );
        assert_eq!(
            p.apk_path(),
            PathBuf::from("/work/hello/build/output/hello.apk")
        );
        assert_eq!(
            p.jar_path(),
            PathBuf::from("/work/hello/build/output/jar/hello.jar")
        );
    }

    #[test]
    fn output_path_follows_kind() {
        let mut p = ProjectDescriptor::new(Path::new("/w"), "x");
        assert_eq!(p.output_path(), p.apk_path());
        p.set_kind(BuildKind::LibraryArchive);
        assert_eq!(p.output_path(), p.jar_path());
    }

    #[test]
    fn set_name_moves_project_dir() {
        let mut p = ProjectDescriptor::new(Path::new("/w"), "old");
        p.set_name("new").unwrap();
        assert_eq!(p.project_dir(), Path::new("/w/new"));
        assert_eq!(p.apk_path(), PathBuf::from("/w/new/build/output/new.apk"));
        assert!(p.set_name("a/b").is_err());
    }

    #[test]
    fn setters_validate_names() {
        let mut p = ProjectDescriptor::new(Path::new("/w"), "x");
        p.set_package("com.example").unwrap();
        p.set_main_class("com.example.Main").unwrap();
        assert!(p.set_package("com example").is_err());
        assert_eq!(p.package(), Some("com.example"));
        assert_eq!(p.main_class(), Some("com.example.Main"));
    }

    #[test]
    fn create_layout_is_idempotent() {
        let tmp = tempfile::tempdir().unwrap();
        let p = ProjectDescriptor::new(tmp.path(), "demo");
        p.create_layout().unwrap();
        p.create_layout().unwrap();
        assert!(p.classes_dir().is_dir());
        assert!(p.dexed_libs_dir().is_dir());
        assert!(p.source_roots().iter().all(|d| d.is_dir()));
    }

    #[test]
    fn save_then_open_round_trips() {
        let tmp = tempfile::tempdir().unwrap();
        let mut p = ProjectDescriptor::new(tmp.path(), "demo");
        p.set_kind(BuildKind::PlainArchive);
        p.set_main_class("demo.Main").unwrap();
        p.save().unwrap();

        let opened = ProjectDescriptor::open(&tmp.path().join("demo")).unwrap();
        assert_eq!(opened, p);
    }

    #[test]
    fn open_without_record_fails_with_hint() {
        let tmp = tempfile::tempdir().unwrap();
        let err = ProjectDescriptor::open(tmp.path()).unwrap_err().to_string();
        assert!(err.contains("dexpack init"), "error was: {err}");
    }

    #[test]
    fn discover_walks_up() {
        let tmp = tempfile::tempdir().unwrap();
        let p = ProjectDescriptor::new(tmp.path(), "demo");
        p.save().unwrap();
        let nested = p.project_dir().join("src").join("main");
        fs::create_dir_all(&nested).unwrap();

        let found = ProjectDescriptor::discover(&nested).unwrap();
        assert_eq!(found.project_dir(), p.project_dir());
    }

    #[test]
    fn main_class_source_searches_roots_in_order() {
        let tmp = tempfile::tempdir().unwrap();
        fs::create_dir_all(tmp.path().join("demo")).unwrap();
        fs::write(
            tmp.path().join("demo").join(MANIFEST_FILE),
            "[project]\nname = \"demo\"\nmain-class = \"a.Main\"\nsource-dirs = [\"one\", \"two\"]\n",
        )
        .unwrap();
        let p = ProjectDescriptor::open(&tmp.path().join("demo")).unwrap();
        assert!(p.main_class_source().is_none());

        let in_second = p.project_dir().join("two").join("a");
        fs::create_dir_all(&in_second).unwrap();
        fs::write(in_second.join("Main.java"), "package a;").unwrap();
        assert_eq!(p.main_class_source(), Some(in_second.join("Main.java")));
    }

    fn unpack_library(libs: &Path, name: &str, manifest: &str) -> PathBuf {
        let dir = libs.join(name);
        fs::create_dir_all(dir.join("res").join("values")).unwrap();
        fs::write(dir.join("AndroidManifest.xml"), manifest).unwrap();
        dir
    }

    #[test]
    fn unpacked_libraries_are_found_with_their_packages() {
        let tmp = tempfile::tempdir().unwrap();
        let p = ProjectDescriptor::new(tmp.path(), "demo");
        p.create_layout().unwrap();
        let libs = p.libs_dir();
        let widgets = unpack_library(&libs, "widgets", r#"<manifest package="org.widgets"/>"#);
        let charts = unpack_library(&libs, "charts", r#"<manifest package="org.charts"/>"#);
        fs::write(charts.join("classes.jar"), b"jar").unwrap();
        fs::create_dir(libs.join("notes")).unwrap();
        fs::write(libs.join("gson.jar"), b"jar").unwrap();

        let found = p.resource_libraries().unwrap();

        let packages: Vec<&str> = found.iter().map(|l| l.package.as_str()).collect();
        assert_eq!(packages, ["org.charts", "org.widgets"]);
        let last = found.last().unwrap();
        assert_eq!(last.dir, widgets);
        assert_eq!(last.res_dir(), Some(widgets.join("res")));
        assert_eq!(last.assets_dir(), None);
        assert_eq!(
            p.library_jars().unwrap(),
            vec![libs.join("gson.jar"), charts.join("classes.jar")]
        );
    }

    #[test]
    fn unpacked_library_without_package_is_rejected() {
        let tmp = tempfile::tempdir().unwrap();
        let p = ProjectDescriptor::new(tmp.path(), "demo");
        unpack_library(&p.libs_dir(), "bare", "<manifest/>");

        let err = p.resource_libraries().unwrap_err();
        assert!(matches!(err, ProjectError::LibraryWithoutPackage { .. }), "{err}");
    }

    #[test]
    fn resolve_package_falls_back_to_android_manifest() {
        let tmp = tempfile::tempdir().unwrap();
        let p = ProjectDescriptor::new(tmp.path(), "demo");
        assert_eq!(p.resolve_package().unwrap(), None);

        fs::create_dir_all(p.android_manifest().parent().unwrap()).unwrap();
        fs::write(
            p.android_manifest(),
            r#"<manifest xmlns:android="http://schemas.android.com/apk/res/android" package="com.example.demo"/>"#,
        )
        .unwrap();
        assert_eq!(
            p.resolve_package().unwrap().as_deref(),
            Some("com.example.demo")
        );
    }
}
