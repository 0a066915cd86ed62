//! Content Cache Index: converted third-party libraries keyed by the
//! converter settings and the SHA-256 of the library archive.
//!
//! The cache root holds one directory per converter settings key (for
//! example `api21-debug`), each a directory of `<basename>-<digest>.<ext>`
//! files. The path is the whole record: an entry is valid exactly when the
//! settings match and the digest of a candidate archive matches. Names, paths
//! and timestamps of the input never matter. There is nothing to invalidate
//! and no manifest to flush.

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Mutex;
use std::time::{Duration, SystemTime};

use dexpack_util::hash::{is_sha256_hex, sha256_file, SHA256_HEX_LEN};

use crate::error::EngineError;

/// Extension of converted artifacts.
pub const ARTIFACT_EXT: &str = "zip";

const STAGING_PREFIX: &str = ".tmp-";

/// Staging files younger than this may belong to a conversion still running
/// in another process.
const STALE_STAGING_AGE: Duration = Duration::from_secs(60 * 60);

/// Identifies one converted artifact.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct CacheKey {
    /// The converter settings the artifact was produced under.
    pub scope: String,
    /// SHA-256 of the input archive.
    pub digest: String,
}

impl CacheKey {
    pub fn new(scope: &str, digest: &str) -> Self {
        Self {
            scope: scope.to_owned(),
            digest: digest.to_owned(),
        }
    }
}

/// Result of a cache lookup-or-convert.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CacheOutcome {
    /// An artifact with this digest already existed.
    Hit(PathBuf),
    /// The archive was converted and recorded.
    Converted(PathBuf),
}

impl CacheOutcome {
    pub fn path(&self) -> &Path {
        match self {
            Self::Hit(p) | Self::Converted(p) => p,
        }
    }

    pub fn is_hit(&self) -> bool {
        matches!(self, Self::Hit(_))
    }
}

/// A loaded cache directory.
///
/// Safe to share between threads: lookups and inserts go through an internal
/// lock, so two workers never write the same key's path.
#[derive(Debug)]
pub struct ContentCacheIndex {
    dir: PathBuf,
    entries: Mutex<HashMap<CacheKey, PathBuf>>,
    staging_seq: AtomicU64,
}

impl ContentCacheIndex {
    /// Open (creating if needed) the cache root and load the entries of every
    /// settings directory under it.
    ///
    /// Staging files an interrupted run left behind are removed once they are
    /// old enough that no live conversion can still own them. Files whose
    /// names do not follow `<basename>-<digest>.<ext>` are ignored, as is
    /// anything directly under the root.
    ///
    /// # Errors
    /// Returns an error if a directory cannot be created or read.
    pub fn open(dir: &Path) -> Result<Self, EngineError> {
        dexpack_util::fs::ensure_dir(dir)?;
        let mut entries = HashMap::new();

        let read = std::fs::read_dir(dir).map_err(|source| EngineError::io(dir, source))?;
        for entry in read {
            let entry = entry.map_err(|source| EngineError::io(dir, source))?;
            let path = entry.path();
            if !path.is_dir() {
                continue;
            }
            let Some(scope) = path.file_name().and_then(|n| n.to_str()) else {
                continue;
            };
            if is_valid_scope(scope) {
                load_scope(&path, scope, &mut entries)?;
            }
        }

        tracing::debug!(dir = %dir.display(), entries = entries.len(), "opened content cache");
        Ok(Self {
            dir: dir.to_path_buf(),
            entries: Mutex::new(entries),
            staging_seq: AtomicU64::new(0),
        })
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// The directory holding artifacts converted under `scope`.
    ///
    /// # Errors
    /// Returns an error if `scope` is not a plain directory name.
    pub fn scope_dir(&self, scope: &str) -> Result<PathBuf, EngineError> {
        if !is_valid_scope(scope) {
            return Err(EngineError::InvalidCacheScope {
                scope: scope.to_owned(),
            });
        }
        Ok(self.dir.join(scope))
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, HashMap<CacheKey, PathBuf>> {
        // A panic while holding the lock cannot leave the map half-updated:
        // every mutation is a single insert.
        self.entries
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner)
    }

    /// The artifact recorded for `digest` under `scope`, if any.
    pub fn lookup(&self, scope: &str, digest: &str) -> Option<PathBuf> {
        self.lock().get(&CacheKey::new(scope, digest)).cloned()
    }

    pub fn contains(&self, scope: &str, digest: &str) -> bool {
        self.lock().contains_key(&CacheKey::new(scope, digest))
    }

    pub fn len(&self) -> usize {
        self.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// All `(key, artifact)` pairs, sorted by artifact path.
    pub fn entries(&self) -> Vec<(CacheKey, PathBuf)> {
        let mut all: Vec<_> = self
            .lock()
            .iter()
            .map(|(k, p)| (k.clone(), p.clone()))
            .collect();
        all.sort_by(|a, b| a.1.cmp(&b.1));
        all
    }

    /// Return the artifact converted from `archive` under the converter
    /// settings `scope`, running `convert` only if none is recorded.
    ///
    /// `convert` receives a staging path to write; on success the staging file
    /// is renamed to `<scope>/<basename>-<digest>.zip`. If another worker
    /// recorded the same key meanwhile, the staging file is discarded and the
    /// existing artifact is returned as a hit.
    ///
    /// # Errors
    /// Returns an error if `scope` is invalid, the archive cannot be hashed,
    /// `convert` fails, or the artifact cannot be moved into place. A failed
    /// conversion leaves no entry behind.
    pub fn get_or_convert<F>(
        &self,
        archive: &Path,
        scope: &str,
        convert: F,
    ) -> Result<CacheOutcome, EngineError>
    where
        F: FnOnce(&Path) -> Result<(), EngineError>,
    {
        let scope_dir = self.scope_dir(scope)?;
        let key = CacheKey::new(scope, &sha256_file(archive)?);
        let recorded = self.lock().get(&key).cloned();
        if let Some(existing) = recorded {
            if existing.is_file() {
                tracing::debug!(archive = %archive.display(), scope, digest = %key.digest, "cache hit");
                return Ok(CacheOutcome::Hit(existing));
            }
            // Deleted behind our back; fall through and convert again.
            tracing::warn!(artifact = %existing.display(), "cached artifact vanished");
        }

        dexpack_util::fs::ensure_dir(&scope_dir)?;
        let staging = self.staging_path(&scope_dir, &key.digest);
        tracing::debug!(archive = %archive.display(), scope, digest = %key.digest, "cache miss");
        if let Err(e) = convert(&staging) {
            dexpack_util::fs::remove_file_if_exists(&staging)?;
            return Err(e);
        }
        if !staging.is_file() {
            return Err(EngineError::Tool(dexpack_tools::ToolError::MissingOutput {
                tool: "converter".to_owned(),
                path: staging,
            }));
        }

        let final_path = scope_dir.join(artifact_name(archive, &key.digest));
        let mut entries = self.lock();
        if let Some(existing) = entries.get(&key).filter(|p| p.is_file()) {
            let existing = existing.clone();
            drop(entries);
            dexpack_util::fs::remove_file_if_exists(&staging)?;
            return Ok(CacheOutcome::Hit(existing));
        }
        dexpack_util::fs::rename(&staging, &final_path)?;
        entries.insert(key, final_path.clone());
        Ok(CacheOutcome::Converted(final_path))
    }

    fn staging_path(&self, scope_dir: &Path, digest: &str) -> PathBuf {
        let seq = self.staging_seq.fetch_add(1, Ordering::Relaxed);
        let short = digest.get(..12).unwrap_or(digest);
        scope_dir.join(format!(
            "{STAGING_PREFIX}{short}-{}-{seq}.{ARTIFACT_EXT}",
            std::process::id()
        ))
    }
}

fn load_scope(
    dir: &Path,
    scope: &str,
    entries: &mut HashMap<CacheKey, PathBuf>,
) -> Result<(), EngineError> {
    let read = std::fs::read_dir(dir).map_err(|source| EngineError::io(dir, source))?;
    for entry in read {
        let entry = entry.map_err(|source| EngineError::io(dir, source))?;
        let path = entry.path();
        if !path.is_file() {
            continue;
        }
        let Some(name) = path.file_name().and_then(|n| n.to_str()) else {
            continue;
        };
        if name.starts_with(STAGING_PREFIX) {
            if is_stale(&path) {
                tracing::debug!(path = %path.display(), "removing stale staging file");
                dexpack_util::fs::remove_file_if_exists(&path)?;
            }
            continue;
        }
        if let Some(digest) = digest_from_name(name) {
            entries.insert(CacheKey::new(scope, digest), path);
        }
    }
    Ok(())
}

/// Whether a staging file was last written long enough ago to be abandoned.
/// A modification time in the future counts as fresh.
fn is_stale(path: &Path) -> bool {
    std::fs::metadata(path)
        .and_then(|m| m.modified())
        .ok()
        .and_then(|modified| SystemTime::now().duration_since(modified).ok())
        .is_some_and(|age| age >= STALE_STAGING_AGE)
}

/// Settings keys become directory names: no separators, no hidden names.
fn is_valid_scope(scope: &str) -> bool {
    !scope.is_empty()
        && !scope.starts_with('.')
        && scope
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || matches!(c, '-' | '_' | '.'))
}

/// `<archive-basename>-<digest>.zip`.
pub fn artifact_name(archive: &Path, digest: &str) -> String {
    let base = archive
        .file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_else(|| "lib".to_owned());
    format!("{base}-{digest}.{ARTIFACT_EXT}")
}

/// Extract the digest from a `<basename>-<digest>.<ext>` file name.
fn digest_from_name(name: &str) -> Option<&str> {
    let (stem, _ext) = name.rsplit_once('.')?;
    let start = stem.len().checked_sub(SHA256_HEX_LEN)?;
    let digest = stem.get(start..)?;
    let separator = stem.get(..start)?;
    if separator.ends_with('-') && separator.len() > 1 && is_sha256_hex(digest) {
        Some(digest)
    } else {
        None
    }
}
