//! Filesystem utilities for dexpack.

use std::path::{Path, PathBuf};

use crate::error::UtilError;

/// Create a directory and all parent directories if they do not exist.
///
/// # Errors
/// Returns an error if the directory cannot be created.
pub fn ensure_dir(path: &Path) -> Result<(), UtilError> {
    std::fs::create_dir_all(path).map_err(|source| UtilError::io(path, source))
}

/// Remove a directory and all its contents. No error if the directory is absent.
///
/// # Errors
/// Returns an error if the directory exists but cannot be removed.
pub fn remove_dir_all_if_exists(path: &Path) -> Result<(), UtilError> {
    match std::fs::remove_dir_all(path) {
        Ok(()) => Ok(()),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
        Err(source) => Err(UtilError::io(path, source)),
    }
}

/// Remove a single file. No error if the file is absent.
///
/// # Errors
/// Returns an error if the file exists but cannot be removed.
pub fn remove_file_if_exists(path: &Path) -> Result<(), UtilError> {
    match std::fs::remove_file(path) {
        Ok(()) => Ok(()),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
        Err(source) => Err(UtilError::io(path, source)),
    }
}

/// Move `src` to `dest`, replacing any existing file at `dest`.
///
/// Both paths should live on the same filesystem so the move is atomic.
///
/// # Errors
/// Returns an error if the destination directory cannot be created or the
/// rename fails.
pub fn rename(src: &Path, dest: &Path) -> Result<(), UtilError> {
    if let Some(parent) = dest.parent() {
        ensure_dir(parent)?;
    }
    std::fs::rename(src, dest).map_err(|source| UtilError::io(dest, source))
}

/// Return the user's home directory.
///
/// Resolves via `HOME` (Unix) or `USERPROFILE` (Windows).
///
/// # Errors
/// Returns an error if neither environment variable is set.
pub fn home_dir() -> Result<PathBuf, UtilError> {
    std::env::var("HOME")
        .or_else(|_| std::env::var("USERPROFILE"))
        .map(PathBuf::from)
        .map_err(|_| UtilError::NoHomeDir)
}

/// Expand a leading `~/` against the home directory.
///
/// Paths without the prefix are returned unchanged.
///
/// # Errors
/// Returns an error if the path starts with `~/` and the home directory is unknown.
pub fn expand_home(path: &Path) -> Result<PathBuf, UtilError> {
    match path.strip_prefix("~") {
        Ok(rest) => Ok(home_dir()?.join(rest)),
        Err(_) => Ok(path.to_path_buf()),
    }
}

/// Collect all files with the given `extension` under `dir`, recursively, sorted by path.
///
/// A missing `dir` yields an empty list.
///
/// # Errors
/// Returns an error if `dir` exists but cannot be read.
pub fn collect_files(dir: &Path, extension: &str) -> Result<Vec<PathBuf>, UtilError> {
    let mut files = Vec::new();
    if !dir.exists() {
        return Ok(files);
    }
    collect_files_recursive(dir, extension, &mut files)?;
    files.sort();
    Ok(files)
}

fn collect_files_recursive(
    dir: &Path,
    extension: &str,
    out: &mut Vec<PathBuf>,
) -> Result<(), UtilError> {
    let entries = std::fs::read_dir(dir).map_err(|source| UtilError::io(dir, source))?;

    for entry in entries {
        let entry = entry.map_err(|source| UtilError::io(dir, source))?;
        let path = entry.path();

        if path.is_dir() {
            collect_files_recursive(&path, extension, out)?;
        } else if path
            .extension()
            .and_then(|e| e.to_str())
            .is_some_and(|e| e == extension)
        {
            out.push(path);
        }
    }

    Ok(())
}

/// List the directories directly inside `dir`, sorted.
///
/// A missing `dir` yields an empty list.
///
/// # Errors
/// Returns an error if `dir` exists but cannot be read.
pub fn list_dirs(dir: &Path) -> Result<Vec<PathBuf>, UtilError> {
    let entries = match std::fs::read_dir(dir) {
        Ok(entries) => entries,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(Vec::new()),
        Err(source) => return Err(UtilError::io(dir, source)),
    };
    let mut dirs = Vec::new();
    for entry in entries {
        let path = entry.map_err(|source| UtilError::io(dir, source))?.path();
        if path.is_dir() {
            dirs.push(path);
        }
    }
    dirs.sort();
    Ok(dirs)
}

/// List the regular files in `dir` matching a glob `pattern` (e.g. `"*.jar"`), sorted.
///
/// A missing `dir` yields an empty list.
///
/// # Errors
/// Returns an error if the pattern is invalid.
pub fn glob_files(dir: &Path, pattern: &str) -> Result<Vec<PathBuf>, UtilError> {
    if !dir.is_dir() {
        return Ok(Vec::new());
    }
    let full_pattern = dir.join(pattern).display().to_string();
    let mut paths: Vec<PathBuf> = glob::glob(&full_pattern)
        .map_err(|e| UtilError::GlobPattern {
            pattern: full_pattern.clone(),
            message: e.to_string(),
        })?
        .filter_map(Result::ok)
        .filter(|p| p.is_file())
        .collect();
    paths.sort();
    Ok(paths)
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use std::fs;

    use super::*;

    #[test]
    fn ensure_dir_creates_nested() {
        let tmp = tempfile::tempdir().unwrap();
        let nested = tmp.path().join("a").join("b").join("c");
        ensure_dir(&nested).unwrap();
        assert!(nested.is_dir());
    }

    #[test]
    fn remove_dir_all_if_exists_absent_is_ok() {
        let tmp = tempfile::tempdir().unwrap();
        remove_dir_all_if_exists(&tmp.path().join("nonexistent")).unwrap();
    }

    #[test]
    fn remove_file_if_exists_absent_is_ok() {
        let tmp = tempfile::tempdir().unwrap();
        remove_file_if_exists(&tmp.path().join("nothing.apk")).unwrap();
    }

    #[test]
    fn rename_replaces_existing() {
        let tmp = tempfile::tempdir().unwrap();
        let src = tmp.path().join("staging.apk");
        let dest = tmp.path().join("out").join("app.apk");
        fs::write(&src, b"new").unwrap();
        fs::create_dir_all(dest.parent().unwrap()).unwrap();
        fs::write(&dest, b"old").unwrap();

        rename(&src, &dest).unwrap();
        assert_eq!(fs::read(&dest).unwrap(), b"new");
        assert!(!src.exists());
    }

    #[test]
    fn expand_home_leaves_plain_paths() {
        let p = Path::new("/opt/keys/debug.keystore");
        assert_eq!(expand_home(p).unwrap(), p);
    }

    #[test]
    fn collect_files_finds_and_sorts() {
        let tmp = tempfile::tempdir().unwrap();
        let sub = tmp.path().join("com");
        fs::create_dir_all(&sub).unwrap();
        fs::write(sub.join("B.java"), b"").unwrap();
        fs::write(sub.join("A.java"), b"").unwrap();
        fs::write(tmp.path().join("C.java"), b"").unwrap();
        fs::write(tmp.path().join("readme.md"), b"").unwrap();

        let files = collect_files(tmp.path(), "java").unwrap();
        assert_eq!(files.len(), 3);
        for i in 0..files.len().saturating_sub(1) {
            assert!(files.get(i) <= files.get(i + 1));
        }
    }

    #[test]
    fn collect_files_missing_dir_is_empty() {
        let tmp = tempfile::tempdir().unwrap();
        let files = collect_files(&tmp.path().join("nope"), "java").unwrap();
        assert!(files.is_empty());
    }

    #[test]
    fn glob_files_matches_only_pattern() {
        let tmp = tempfile::tempdir().unwrap();
        fs::write(tmp.path().join("b.jar"), b"").unwrap();
        fs::write(tmp.path().join("a.jar"), b"").unwrap();
        fs::write(tmp.path().join("notes.txt"), b"").unwrap();

        let jars = glob_files(tmp.path(), "*.jar").unwrap();
        let names: Vec<_> = jars
            .iter()
            .map(|p| p.file_name().unwrap().to_str().unwrap().to_owned())
            .collect();
        assert_eq!(names, vec!["a.jar", "b.jar"]);
    }

    #[test]
    fn list_dirs_skips_files_and_sorts() {
        let tmp = tempfile::tempdir().unwrap();
        fs::create_dir_all(tmp.path().join("widgets").join("res")).unwrap();
        fs::create_dir(tmp.path().join("charts")).unwrap();
        fs::write(tmp.path().join("gson.jar"), b"j").unwrap();

        let dirs = list_dirs(tmp.path()).unwrap();
        assert_eq!(
            dirs,
            vec![tmp.path().join("charts"), tmp.path().join("widgets")]
        );
        assert!(list_dirs(&tmp.path().join("absent")).unwrap().is_empty());
    }

    #[test]
    fn glob_files_missing_dir_is_empty() {
        let tmp = tempfile::tempdir().unwrap();
        assert!(glob_files(&tmp.path().join("libs"), "*.jar")
            .unwrap()
            .is_empty());
    }
}
