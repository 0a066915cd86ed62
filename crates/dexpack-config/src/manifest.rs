use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

/// File name of the persisted project record.
pub const MANIFEST_FILE: &str = "dexpack.toml";

/// The `dexpack.toml` project record.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub struct Manifest {
    pub project: Project,
    #[serde(default)]
    pub build: BuildSettings,
    #[serde(default)]
    pub tools: Tools,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub signing: Option<Signing>,
}

/// What a build produces.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum BuildKind {
    /// A signed, installable application package.
    #[default]
    #[serde(rename = "app")]
    Application,
    /// A runnable archive with a `Main-Class` entry and a converted container.
    #[serde(rename = "jar")]
    PlainArchive,
    /// A class archive for consumption by other projects.
    #[serde(rename = "lib")]
    LibraryArchive,
}

impl BuildKind {
    /// The spelling used in `dexpack.toml` and on the command line.
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Application => "app",
            Self::PlainArchive => "jar",
            Self::LibraryArchive => "lib",
        }
    }

    /// Whether this kind needs an entry-point class.
    pub fn requires_main_class(self) -> bool {
        matches!(self, Self::Application | Self::PlainArchive)
    }
}

impl std::fmt::Display for BuildKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for BuildKind {
    type Err = ManifestError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "app" => Ok(Self::Application),
            "jar" => Ok(Self::PlainArchive),
            "lib" => Ok(Self::LibraryArchive),
            other => Err(ManifestError::Invalid {
                message: format!("unknown build kind `{other}` - expected app, jar, or lib"),
            }),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub struct Project {
    pub name: String,
    #[serde(default)]
    pub kind: BuildKind,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub package: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub main_class: Option<String>,
    #[serde(default = "default_source_dirs")]
    pub source_dirs: Vec<PathBuf>,
    #[serde(default = "default_libs_dir")]
    pub libs_dir: PathBuf,
}

fn default_source_dirs() -> Vec<PathBuf> {
    vec![PathBuf::from("src/main/java")]
}

fn default_libs_dir() -> PathBuf {
    PathBuf::from("libs")
}

/// Compiler and converter settings.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub struct BuildSettings {
    #[serde(default = "default_java_version")]
    pub java_version: String,
    #[serde(default = "default_min_api")]
    pub min_api: u32,
}

fn default_java_version() -> String {
    "1.8".to_owned()
}

fn default_min_api() -> u32 {
    21
}

impl Default for BuildSettings {
    fn default() -> Self {
        Self {
            java_version: default_java_version(),
            min_api: default_min_api(),
        }
    }
}

/// Locations of the external tools. Unset entries are resolved at build time.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub struct Tools {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub javac: Option<PathBuf>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub d8: Option<PathBuf>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub aapt: Option<PathBuf>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub apksigner: Option<PathBuf>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub android_jar: Option<PathBuf>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub debug_keystore: Option<PathBuf>,
}

/// Release signing identity. Passwords are supplied at build time, never stored.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub struct Signing {
    pub keystore: PathBuf,
    pub alias: String,
}

impl Manifest {
    /// Create a minimal record for a new project.
    pub fn new(name: &str, kind: BuildKind) -> Self {
        Self {
            project: Project {
                name: name.to_owned(),
                kind,
                package: None,
                main_class: None,
                source_dirs: default_source_dirs(),
                libs_dir: default_libs_dir(),
            },
            build: BuildSettings::default(),
            tools: Tools::default(),
            signing: None,
        }
    }

    /// Read and parse a `dexpack.toml` from the given path.
    ///
    /// # Errors
    /// Returns an error if the file cannot be read, contains invalid TOML, or
    /// fails validation.
    pub fn from_path(path: &Path) -> Result<Self, ManifestError> {
        let content = std::fs::read_to_string(path).map_err(|e| ManifestError::Read {
            path: path.display().to_string(),
            source: e,
        })?;
        let manifest: Manifest = toml::from_str(&content).map_err(|e| ManifestError::Parse {
            path: path.display().to_string(),
            source: e,
        })?;
        manifest.validate()?;
        Ok(manifest)
    }

    /// Check field-level constraints that TOML typing cannot express.
    ///
    /// # Errors
    /// Returns an error naming the first invalid field.
    pub fn validate(&self) -> Result<(), ManifestError> {
        validate_name(&self.project.name)?;
        if self.project.source_dirs.is_empty() {
            return Err(ManifestError::Invalid {
                message: "`source-dirs` must list at least one directory".to_owned(),
            });
        }
        if let Some(main) = &self.project.main_class {
            validate_qualified_name("main-class", main)?;
        }
        if let Some(package) = &self.project.package {
            validate_qualified_name("package", package)?;
        }
        Ok(())
    }

    /// Serialize to human-readable TOML.
    ///
    /// # Errors
    /// Returns an error if serialization fails.
    pub fn to_toml(&self) -> Result<String, ManifestError> {
        toml::to_string_pretty(self).map_err(|source| ManifestError::Serialize { source })
    }

    /// Write the record to disk.
    ///
    /// Uses write-to-temp-then-rename so a crash never leaves a truncated record.
    ///
    /// # Errors
    /// Returns an error if serialization fails or the file cannot be written.
    pub fn write_to(&self, path: &Path) -> Result<(), ManifestError> {
        let content = self.to_toml()?;
        let tmp_path = path.with_extension("toml.tmp");
        std::fs::write(&tmp_path, &content).map_err(|e| ManifestError::Write {
            path: tmp_path.display().to_string(),
            source: e,
        })?;
        std::fs::rename(&tmp_path, path).map_err(|e| ManifestError::Write {
            path: path.display().to_string(),
            source: e,
        })?;
        Ok(())
    }
}

/// Project names become file names (`<name>.apk`), so keep them path-safe.
fn validate_name(name: &str) -> Result<(), ManifestError> {
    if name.is_empty()
        || !name
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_' || c == '.')
        || name.starts_with('.')
    {
        return Err(ManifestError::Invalid {
            message: format!(
                "invalid project name \"{name}\" - use letters, digits, `-`, `_`, and `.`"
            ),
        });
    }
    Ok(())
}

/// Validate a dotted Java name such as `com.example.Main`.
pub fn validate_qualified_name(field: &str, value: &str) -> Result<(), ManifestError> {
    let valid = !value.is_empty()
        && value.split('.').all(|segment| {
            let mut chars = segment.chars();
            chars
                .next()
                .is_some_and(|c| c.is_ascii_alphabetic() || c == '_' || c == '$')
                && chars.all(|c| c.is_ascii_alphanumeric() || c == '_' || c == '$')
        });
    if valid {
        Ok(())
    } else {
        Err(ManifestError::Invalid {
            message: format!("invalid `{field}` \"{value}\" - expected a dotted Java name"),
        })
    }
}

#[derive(Debug, thiserror::Error)]
pub enum ManifestError {
    #[error("cannot read {path}: {source}")]
    Read {
        path: String,
        source: std::io::Error,
    },
    #[error("invalid dexpack.toml at {path}: {source}")]
    Parse {
        path: String,
        source: toml::de::Error,
    },
    #[error("cannot serialize dexpack.toml: {source}")]
    Serialize { source: toml::ser::Error },
    #[error("cannot write {path}: {source}")]
    Write {
        path: String,
        source: std::io::Error,
    },
    #[error("{message}")]
    Invalid { message: String },
}
