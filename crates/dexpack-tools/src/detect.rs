//! Locating the external tools and SDK files.

use std::path::{Path, PathBuf};
use std::process::Command;

use crate::error::ToolError;

/// An external tool the pipeline can invoke.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Tool {
    Javac,
    D8,
    Aapt,
    ApkSigner,
}

impl Tool {
    pub const ALL: [Tool; 4] = [Tool::Javac, Tool::D8, Tool::Aapt, Tool::ApkSigner];

    pub fn name(self) -> &'static str {
        match self {
            Self::Javac => "javac",
            Self::D8 => "d8",
            Self::Aapt => "aapt",
            Self::ApkSigner => "apksigner",
        }
    }

    fn hint(self) -> &'static str {
        match self {
            Self::Javac => "install a JDK and add it to PATH, set JAVA_HOME, or set `tools.javac`",
            Self::D8 | Self::Aapt | Self::ApkSigner => {
                "install the Android SDK build-tools, set ANDROID_HOME, or set the path under [tools]"
            }
        }
    }

    /// Flag that makes the tool print its version.
    fn version_flag(self) -> &'static str {
        match self {
            Self::Javac | Self::D8 | Self::ApkSigner => "--version",
            Self::Aapt => "version",
        }
    }
}

/// A resolved tool and, if it answered, its version.
#[derive(Debug, Clone)]
pub struct ToolInfo {
    pub tool: Tool,
    pub path: PathBuf,
    pub version: Option<String>,
}

/// Locate `tool`.
///
/// Resolution order:
/// 1. `configured` (from `[tools]` in `dexpack.toml`), with `~/` expanded
/// 2. `$JAVA_HOME/bin/javac` for the compiler, or the newest
///    `$ANDROID_HOME/build-tools/<version>/` for the SDK tools
/// 3. `PATH`
///
/// # Errors
/// Returns an error if the tool cannot be found or is not executable.
pub fn resolve_tool(tool: Tool, configured: Option<&Path>) -> Result<PathBuf, ToolError> {
    let not_found = || ToolError::NotFound {
        tool: tool.name().to_owned(),
        hint: tool.hint().to_owned(),
    };

    if let Some(path) = configured {
        let expanded = dexpack_util::fs::expand_home(path)?;
        // A bare name such as "javac" is looked up on PATH.
        if expanded.components().count() == 1 && !expanded.is_file() {
            let name = expanded.display().to_string();
            let found = search_path(&name).ok_or_else(not_found)?;
            check_executable(tool, &found)?;
            return Ok(found);
        }
        if !expanded.is_file() {
            return Err(ToolError::NotFound {
                tool: tool.name().to_owned(),
                hint: format!("configured path {} does not exist", expanded.display()),
            });
        }
        check_executable(tool, &expanded)?;
        return Ok(expanded);
    }

    let from_home = match tool {
        Tool::Javac => std::env::var_os("JAVA_HOME")
            .map(|home| PathBuf::from(home).join("bin").join(exe_name(tool.name()))),
        Tool::D8 | Tool::Aapt | Tool::ApkSigner => android_home()
            .and_then(|sdk| newest_versioned_dir(&sdk.join("build-tools")))
            .map(|dir| dir.join(exe_name(tool.name()))),
    };
    if let Some(candidate) = from_home.filter(|p| p.is_file()) {
        check_executable(tool, &candidate)?;
        return Ok(candidate);
    }

    let found = search_path(tool.name()).ok_or_else(not_found)?;
    check_executable(tool, &found)?;
    Ok(found)
}

/// Locate the platform bootstrap classpath (`android.jar`).
///
/// Uses `configured` if given, otherwise the highest
/// `$ANDROID_HOME/platforms/android-<api>/android.jar`.
///
/// # Errors
/// Returns an error if no `android.jar` can be found.
pub fn resolve_android_jar(configured: Option<&Path>) -> Result<PathBuf, ToolError> {
    let candidate = match configured {
        Some(path) => Some(dexpack_util::fs::expand_home(path)?),
        None => android_home()
            .and_then(|sdk| newest_versioned_dir(&sdk.join("platforms")))
            .map(|dir| dir.join("android.jar")),
    };
    candidate
        .filter(|p| p.is_file())
        .ok_or_else(|| ToolError::NotFound {
            tool: "android.jar".to_owned(),
            hint: "install an Android SDK platform, set ANDROID_HOME, or set `tools.android-jar`"
                .to_owned(),
        })
}

/// The SDK debug keystore: `configured`, or `~/.android/debug.keystore`.
///
/// # Errors
/// Returns an error if the home directory is unknown.
pub fn debug_keystore(configured: Option<&Path>) -> Result<PathBuf, ToolError> {
    match configured {
        Some(path) => Ok(dexpack_util::fs::expand_home(path)?),
        None => Ok(dexpack_util::fs::home_dir()?
            .join(".android")
            .join("debug.keystore")),
    }
}

/// Resolve `tool` and ask it for its version.
///
/// # Errors
/// Returns an error if the tool cannot be resolved.
pub fn detect(tool: Tool, configured: Option<&Path>) -> Result<ToolInfo, ToolError> {
    let path = resolve_tool(tool, configured)?;
    let version = query_version(&path, tool.version_flag());
    Ok(ToolInfo {
        tool,
        path,
        version,
    })
}

fn query_version(path: &Path, flag: &str) -> Option<String> {
    let output = Command::new(path).arg(flag).output().ok()?;
    let stdout = String::from_utf8_lossy(&output.stdout);
    let stderr = String::from_utf8_lossy(&output.stderr);
    // Older javac versions print the version to stderr.
    parse_version(&stdout).or_else(|| parse_version(&stderr))
}

/// Pull a dotted version out of tool output.
///
/// Handles formats like:
/// - `javac 17.0.2`
/// - `javac 1.8.0_292`
/// - `Android Asset Packaging Tool, v0.2-8375675`
/// - `D8 8.0.40`
pub fn parse_version(raw: &str) -> Option<String> {
    raw.split_whitespace()
        .map(|token| token.trim_start_matches('v').trim_end_matches(','))
        .find(|token| is_version_like(token))
        .map(str::to_owned)
}

fn is_version_like(s: &str) -> bool {
    let core = s.split(['-', '_']).next().unwrap_or(s);
    let mut parts = core.split('.');
    let Some(major) = parts.next() else {
        return false;
    };
    let Some(minor) = parts.next() else {
        return false;
    };
    std::iter::once(major)
        .chain(std::iter::once(minor))
        .chain(parts)
        .all(|p| !p.is_empty() && p.chars().all(|c| c.is_ascii_digit()))
}

fn android_home() -> Option<PathBuf> {
    std::env::var_os("ANDROID_HOME")
        .or_else(|| std::env::var_os("ANDROID_SDK_ROOT"))
        .map(PathBuf::from)
}

/// The subdirectory of `dir` with the highest numeric version in its name
/// (`34.0.0` beats `9.1.0`; `android-34` beats `android-9`).
fn newest_versioned_dir(dir: &Path) -> Option<PathBuf> {
    let entries = std::fs::read_dir(dir).ok()?;
    entries
        .filter_map(Result::ok)
        .map(|e| e.path())
        .filter(|p| p.is_dir())
        .filter_map(|p| {
            let key = version_key(&p.file_name()?.to_string_lossy())?;
            Some((key, p))
        })
        .max_by(|a, b| a.0.cmp(&b.0))
        .map(|(_, p)| p)
}

fn version_key(name: &str) -> Option<Vec<u64>> {
    let numbers: Vec<u64> = name
        .split(|c: char| !c.is_ascii_digit())
        .filter(|s| !s.is_empty())
        .filter_map(|s| s.parse().ok())
        .collect();
    if numbers.is_empty() {
        None
    } else {
        Some(numbers)
    }
}

fn exe_name(name: &str) -> String {
    if cfg!(windows) {
        match name {
            "javac" | "aapt" => format!("{name}.exe"),
            _ => format!("{name}.bat"),
        }
    } else {
        name.to_owned()
    }
}

fn search_path(name: &str) -> Option<PathBuf> {
    let path_var = std::env::var_os("PATH")?;
    std::env::split_paths(&path_var)
        .map(|dir| dir.join(exe_name(name)))
        .find(|candidate| candidate.is_file())
}

fn check_executable(tool: Tool, path: &Path) -> Result<(), ToolError> {
    #[cfg(unix)]
    {
        use std::os::unix::fs::PermissionsExt;
        let not_executable = || ToolError::NotExecutable {
            tool: tool.name().to_owned(),
            path: path.to_path_buf(),
        };
        let metadata = std::fs::metadata(path).map_err(|_| not_executable())?;
        if metadata.permissions().mode() & 0o111 == 0 {
            return Err(not_executable());
        }
    }
    #[cfg(not(unix))]
    let _ = (tool, path);
    Ok(())
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use std::fs;

    use super::*;

    #[test]
    fn parse_version_formats() {
        assert_eq!(parse_version("javac 17.0.2").as_deref(), Some("17.0.2"));
        assert_eq!(
            parse_version("javac 1.8.0_292").as_deref(),
            Some("1.8.0_292")
        );
        assert_eq!(
            parse_version("Android Asset Packaging Tool, v0.2-8375675").as_deref(),
            Some("0.2-8375675")
        );
        assert_eq!(parse_version("D8 8.0.40").as_deref(), Some("8.0.40"));
        assert_eq!(parse_version("no version"), None);
        assert_eq!(parse_version(""), None);
    }

    #[test]
    fn version_like_rules() {
        assert!(is_version_like("1.8"));
        assert!(is_version_like("34.0.0"));
        assert!(!is_version_like("34"));
        assert!(!is_version_like("a.b"));
        assert!(!is_version_like("1..2"));
    }

    #[test]
    fn newest_versioned_dir_compares_numerically() {
        let tmp = tempfile::tempdir().unwrap();
        for name in ["9.1.0", "34.0.0", "30.0.3", "docs"] {
            fs::create_dir_all(tmp.path().join(name)).unwrap();
        }
        assert_eq!(
            newest_versioned_dir(tmp.path()).unwrap(),
            tmp.path().join("34.0.0")
        );

        let platforms = tmp.path().join("platforms");
        for name in ["android-9", "android-34", "android-28"] {
            fs::create_dir_all(platforms.join(name)).unwrap();
        }
        assert_eq!(
            newest_versioned_dir(&platforms).unwrap(),
            platforms.join("android-34")
        );
    }

    #[test]
    fn configured_missing_path_is_not_found() {
        let tmp = tempfile::tempdir().unwrap();
        let err = resolve_tool(Tool::D8, Some(&tmp.path().join("bin").join("d8"))).unwrap_err();
        let msg = err.to_string();
        assert!(msg.starts_with("d8 not found"), "{msg}");
        assert!(msg.contains("does not exist"), "{msg}");
    }

    #[cfg(unix)]
    #[test]
    fn configured_non_executable_is_rejected() {
        let tmp = tempfile::tempdir().unwrap();
        let path = tmp.path().join("aapt");
        fs::write(&path, b"").unwrap();
        let err = resolve_tool(Tool::Aapt, Some(&path)).unwrap_err();
        assert!(err.to_string().contains("not executable"));
    }

    #[cfg(unix)]
    #[test]
    fn configured_executable_resolves() {
        use std::os::unix::fs::PermissionsExt;

        let tmp = tempfile::tempdir().unwrap();
        let path = tmp.path().join("apksigner");
        fs::write(&path, b"#!/bin/sh\n").unwrap();
        fs::set_permissions(&path, fs::Permissions::from_mode(0o755)).unwrap();
        assert_eq!(resolve_tool(Tool::ApkSigner, Some(&path)).unwrap(), path);
    }

    #[test]
    fn android_jar_configured_must_exist() {
        let tmp = tempfile::tempdir().unwrap();
        let jar = tmp.path().join("android.jar");
        assert!(resolve_android_jar(Some(&jar)).is_err());
        fs::write(&jar, b"").unwrap();
        assert_eq!(resolve_android_jar(Some(&jar)).unwrap(), jar);
    }

    #[test]
    fn debug_keystore_prefers_configured() {
        let p = Path::new("/keys/debug.keystore");
        assert_eq!(debug_keystore(Some(p)).unwrap(), p);
    }

    #[test]
    fn not_found_messages_are_actionable() {
        let err = ToolError::NotFound {
            tool: "javac".to_owned(),
            hint: Tool::Javac.hint().to_owned(),
        };
        let msg = err.to_string();
        assert!(msg.contains("JAVA_HOME"));
        assert!(msg.contains("PATH"));
    }
}
