//! Pairwise merging of bytecode containers.
//!
//! A container is a zip whose file entries are per-class artifacts. The symbol
//! of `com/example/Foo.dex` is `com.example.Foo`; directory entries and
//! `META-INF/` are not symbols and are never compared.

use std::collections::btree_map::Entry;
use std::path::Path;

use dexpack_util::archive::{read_entries, write_entries, Entries};

use crate::error::ToolError;

/// What to do when a symbol is present in both containers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum CollisionPolicy {
    /// Fail unless the two entries are byte-identical.
    #[default]
    Fail,
    /// Keep the accumulator's entry.
    KeepFirst,
}

/// Counts from one merge.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct MergeStats {
    /// Entries copied in from the incoming container.
    pub added: usize,
    /// Incoming entries already present with identical bytes.
    pub identical: usize,
}

/// The container merger collaborator.
pub trait ContainerMerger: Send + Sync {
    /// Fold `incoming` into `accumulator`, replacing the accumulator file.
    ///
    /// On error the accumulator is left untouched.
    ///
    /// # Errors
    /// Returns `ToolError::Collision` naming the first duplicate symbol under
    /// `CollisionPolicy::Fail`, or an error if either container is unreadable.
    fn merge(
        &self,
        accumulator: &Path,
        incoming: &Path,
        policy: CollisionPolicy,
    ) -> Result<MergeStats, ToolError>;
}

/// Map an entry name to the class symbol it defines.
pub fn symbol_of(entry: &str) -> Option<String> {
    if entry.ends_with('/') || entry.starts_with("META-INF/") {
        return None;
    }
    let stem = match entry.rsplit_once('.') {
        Some((stem, ext)) if !ext.contains('/') => stem,
        _ => entry,
    };
    Some(stem.replace('/', "."))
}

/// Union `incoming` into `acc` in memory.
///
/// # Errors
/// Returns `ToolError::Collision` under `CollisionPolicy::Fail` when a symbol
/// differs between the two.
pub fn merge_entries(
    acc: &mut Entries,
    incoming: Entries,
    policy: CollisionPolicy,
    incoming_name: &str,
) -> Result<MergeStats, ToolError> {
    let mut stats = MergeStats::default();
    for (name, data) in incoming {
        match acc.entry(name) {
            Entry::Vacant(slot) => {
                slot.insert(data);
                stats.added += 1;
            }
            Entry::Occupied(existing) => {
                if *existing.get() == data {
                    stats.identical += 1;
                    continue;
                }
                let Some(symbol) = symbol_of(existing.key()) else {
                    // Metadata entries do not define classes; first wins.
                    continue;
                };
                if policy == CollisionPolicy::Fail {
                    return Err(ToolError::Collision {
                        symbol,
                        incoming: incoming_name.to_owned(),
                    });
                }
            }
        }
    }
    Ok(stats)
}

/// In-process merger over zip containers.
#[derive(Debug, Clone, Copy, Default)]
pub struct ArchiveMerger;

impl ContainerMerger for ArchiveMerger {
    fn merge(
        &self,
        accumulator: &Path,
        incoming: &Path,
        policy: CollisionPolicy,
    ) -> Result<MergeStats, ToolError> {
        let mut acc = read_entries(accumulator)?;
        let other = read_entries(incoming)?;
        let stats = merge_entries(&mut acc, other, policy, &incoming.display().to_string())?;

        let staging = accumulator.with_extension("merging.zip");
        write_entries(
            &staging,
            acc.iter().map(|(k, v)| (k.as_str(), v.as_slice())),
        )?;
        dexpack_util::fs::rename(&staging, accumulator)?;
        tracing::debug!(
            accumulator = %accumulator.display(),
            incoming = %incoming.display(),
            added = stats.added,
            identical = stats.identical,
            "merged container"
        );
        Ok(stats)
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use std::collections::BTreeSet;

    use proptest::prelude::*;

    use super::*;

    fn container(dir: &Path, name: &str, classes: &[(&str, &[u8])]) -> std::path::PathBuf {
        let path = dir.join(name);
        write_entries(&path, classes.iter().copied()).unwrap();
        path
    }

    #[test]
    fn symbol_of_strips_extension_and_slashes() {
        assert_eq!(
            symbol_of("com/example/Foo.dex").as_deref(),
            Some("com.example.Foo")
        );
        assert_eq!(
            symbol_of("com/example/Foo$Inner.class").as_deref(),
            Some("com.example.Foo$Inner")
        );
        assert_eq!(symbol_of("com/example/"), None);
        assert_eq!(symbol_of("META-INF/MANIFEST.MF"), None);
        assert_eq!(symbol_of("a.b/Noext").as_deref(), Some("a.b.Noext"));
    }

    #[test]
    fn merge_disjoint_is_union() {
        let tmp = tempfile::tempdir().unwrap();
        let acc = container(tmp.path(), "acc.zip", &[("a/A.dex", b"A")]);
        let inc = container(tmp.path(), "inc.zip", &[("b/B.dex", b"B"), ("b/C.dex", b"C")]);

        let stats = ArchiveMerger
            .merge(&acc, &inc, CollisionPolicy::Fail)
            .unwrap();
        assert_eq!(stats, MergeStats { added: 2, identical: 0 });

        let merged = read_entries(&acc).unwrap();
        let names: Vec<_> = merged.keys().map(String::as_str).collect();
        assert_eq!(names, vec!["a/A.dex", "b/B.dex", "b/C.dex"]);
        assert!(!tmp.path().join("acc.merging.zip").exists());
    }

    #[test]
    fn collision_names_symbol_and_leaves_accumulator() {
        let tmp = tempfile::tempdir().unwrap();
        let acc = container(tmp.path(), "acc.zip", &[("com/x/X.dex", b"one")]);
        let before = std::fs::read(&acc).unwrap();
        let inc = container(tmp.path(), "lib-b.zip", &[("com/x/X.dex", b"two")]);

        let err = ArchiveMerger
            .merge(&acc, &inc, CollisionPolicy::Fail)
            .unwrap_err();
        match err {
            ToolError::Collision { symbol, incoming } => {
                assert_eq!(symbol, "com.x.X");
                assert!(incoming.ends_with("lib-b.zip"));
            }
            other => panic!("unexpected error: {other}"),
        }
        assert_eq!(std::fs::read(&acc).unwrap(), before);
    }

    #[test]
    fn identical_duplicate_passes_through() {
        let tmp = tempfile::tempdir().unwrap();
        let acc = container(tmp.path(), "acc.zip", &[("com/x/X.dex", b"same")]);
        let inc = container(tmp.path(), "inc.zip", &[("com/x/X.dex", b"same")]);

        let stats = ArchiveMerger
            .merge(&acc, &inc, CollisionPolicy::Fail)
            .unwrap();
        assert_eq!(stats, MergeStats { added: 0, identical: 1 });
        assert_eq!(read_entries(&acc).unwrap().len(), 1);
    }

    #[test]
    fn keep_first_retains_accumulator_entry() {
        let tmp = tempfile::tempdir().unwrap();
        let acc = container(tmp.path(), "acc.zip", &[("com/x/X.dex", b"first")]);
        let inc = container(tmp.path(), "inc.zip", &[("com/x/X.dex", b"second")]);

        ArchiveMerger
            .merge(&acc, &inc, CollisionPolicy::KeepFirst)
            .unwrap();
        let merged = read_entries(&acc).unwrap();
        assert_eq!(merged.get("com/x/X.dex").unwrap(), b"first");
    }

    #[test]
    fn differing_metadata_is_not_a_collision() {
        let mut acc = Entries::new();
        acc.insert("META-INF/MANIFEST.MF".to_owned(), b"a".to_vec());
        let mut inc = Entries::new();
        inc.insert("META-INF/MANIFEST.MF".to_owned(), b"b".to_vec());
        assert!(merge_entries(&mut acc, inc, CollisionPolicy::Fail, "x").is_ok());
    }

    #[test]
    fn merge_into_empty_container() {
        let tmp = tempfile::tempdir().unwrap();
        let acc = container(tmp.path(), "acc.zip", &[]);
        let inc = container(tmp.path(), "inc.zip", &[("a/A.dex", b"A")]);
        ArchiveMerger
            .merge(&acc, &inc, CollisionPolicy::Fail)
            .unwrap();
        assert_eq!(read_entries(&acc).unwrap().len(), 1);
    }

    fn class_set() -> impl Strategy<Value = BTreeSet<String>> {
        proptest::collection::btree_set("[a-c]/[A-Z][a-z]{0,3}", 0..12)
    }

    proptest! {
        #[test]
        fn disjoint_merge_is_order_independent_union(a in class_set(), b in class_set()) {
            let b: BTreeSet<String> = b.difference(&a).cloned().collect();
            let to_entries = |set: &BTreeSet<String>| -> Entries {
                set.iter().map(|n| (format!("{n}.dex"), n.as_bytes().to_vec())).collect()
            };

            let mut ab = to_entries(&a);
            merge_entries(&mut ab, to_entries(&b), CollisionPolicy::Fail, "b").unwrap();
            let mut ba = to_entries(&b);
            merge_entries(&mut ba, to_entries(&a), CollisionPolicy::Fail, "a").unwrap();

            prop_assert_eq!(&ab, &ba);
            let expected: BTreeSet<String> = a.union(&b).map(|n| format!("{n}.dex")).collect();
            let actual: BTreeSet<String> = ab.keys().cloned().collect();
            prop_assert_eq!(actual, expected);
        }

        #[test]
        fn disjoint_file_merge_is_order_independent(a in class_set(), b in class_set()) {
            let b: BTreeSet<String> = b.difference(&a).cloned().collect();
            let tmp = tempfile::tempdir().unwrap();
            let write = |name: &str, set: &BTreeSet<String>| {
                let entries: Vec<(String, Vec<u8>)> =
                    set.iter().map(|n| (format!("{n}.dex"), n.as_bytes().to_vec())).collect();
                let path = tmp.path().join(name);
                write_entries(&path, entries.iter().map(|(k, v)| (k.as_str(), v.as_slice()))).unwrap();
                path
            };

            let ab = write("ab.zip", &a);
            let b_only = write("b.zip", &b);
            ArchiveMerger.merge(&ab, &b_only, CollisionPolicy::Fail).unwrap();

            let ba = write("ba.zip", &b);
            let a_only = write("a.zip", &a);
            ArchiveMerger.merge(&ba, &a_only, CollisionPolicy::Fail).unwrap();

            prop_assert_eq!(std::fs::read(&ab).unwrap(), std::fs::read(&ba).unwrap());
        }
    }
}
