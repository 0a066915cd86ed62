//! Content digests used as cache keys.

use std::path::Path;

use sha2::{Digest, Sha256};

use crate::error::UtilError;

/// Length of a hex-encoded SHA-256 digest.
pub const SHA256_HEX_LEN: usize = 64;

/// Compute the SHA-256 hex digest of a byte slice.
pub fn sha256_bytes(data: &[u8]) -> String {
    let mut hasher = Sha256::new();
    hasher.update(data);
    format!("{:x}", hasher.finalize())
}

/// Compute the SHA-256 hex digest of a file using streaming reads.
///
/// Uses a 64 KiB buffer so large library archives are never loaded into
/// memory in one piece.
///
/// # Errors
/// Returns an error if the file cannot be opened or read.
pub fn sha256_file(path: &Path) -> Result<String, UtilError> {
    let file = std::fs::File::open(path).map_err(|source| UtilError::io(path, source))?;
    let mut reader = std::io::BufReader::new(file);
    let mut hasher = Sha256::new();
    let mut buf = vec![0u8; 64 * 1024];
    loop {
        let n = std::io::Read::read(&mut reader, &mut buf)
            .map_err(|source| UtilError::io(path, source))?;
        if n == 0 {
            break;
        }
        let Some(chunk) = buf.get(..n) else {
            break; // unreachable: n is bounded by buf.len()
        };
        hasher.update(chunk);
    }
    Ok(format!("{:x}", hasher.finalize()))
}

/// Whether `s` looks like a lowercase hex SHA-256 digest.
pub fn is_sha256_hex(s: &str) -> bool {
    s.len() == SHA256_HEX_LEN && s.chars().all(|c| matches!(c, '0'..='9' | 'a'..='f'))
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use std::fs;

    use proptest::prelude::*;

    use super::*;

    #[test]
    fn sha256_bytes_deterministic() {
        let a = sha256_bytes(b"hello");
        let b = sha256_bytes(b"hello");
        assert_eq!(a, b);
        assert_eq!(a.len(), SHA256_HEX_LEN);
    }

    #[test]
    fn sha256_bytes_empty() {
        let hash = sha256_bytes(b"");
        // Known SHA-256 of empty input
        assert_eq!(
            hash,
            "e3b0c44298fc1c149afbf4c8996fb92427ae41e4649b934ca495991b7852b855"
        );
    }

    #[test]
    fn sha256_file_matches_bytes() {
        let dir = tempfile::tempdir().unwrap();
        let file = dir.path().join("lib.jar");
        fs::write(&file, b"jar content").unwrap();

        let hash = sha256_file(&file).unwrap();
        assert_eq!(hash, sha256_bytes(b"jar content"));
    }

    #[test]
    fn sha256_file_ignores_name_and_location() {
        let dir = tempfile::tempdir().unwrap();
        let a = dir.path().join("a.jar");
        let nested = dir.path().join("moved");
        fs::create_dir_all(&nested).unwrap();
        let b = nested.join("renamed.jar");
        fs::write(&a, b"same bytes").unwrap();
        fs::write(&b, b"same bytes").unwrap();

        assert_eq!(sha256_file(&a).unwrap(), sha256_file(&b).unwrap());
    }

    #[test]
    fn sha256_file_spans_multiple_buffers() {
        let dir = tempfile::tempdir().unwrap();
        let file = dir.path().join("big.jar");
        let data = vec![7u8; 200 * 1024];
        fs::write(&file, &data).unwrap();

        assert_eq!(sha256_file(&file).unwrap(), sha256_bytes(&data));
    }

    #[test]
    fn sha256_file_missing() {
        let result = sha256_file(Path::new("/nonexistent/path/lib.jar"));
        assert!(result.is_err());
    }

    #[test]
    fn is_sha256_hex_accepts_digest() {
        assert!(is_sha256_hex(&sha256_bytes(b"x")));
    }

    #[test]
    fn is_sha256_hex_rejects_others() {
        assert!(!is_sha256_hex("abc"));
        assert!(!is_sha256_hex(&"G".repeat(SHA256_HEX_LEN)));
        assert!(!is_sha256_hex(&"A".repeat(SHA256_HEX_LEN)));
    }

    proptest! {
        #[test]
        fn single_byte_change_changes_digest(
            data in proptest::collection::vec(any::<u8>(), 1..512),
            index in any::<proptest::sample::Index>(),
        ) {
            let mut changed = data.clone();
            let i = index.index(changed.len());
            if let Some(byte) = changed.get_mut(i) {
                *byte = byte.wrapping_add(1);
            }
            prop_assert_ne!(sha256_bytes(&data), sha256_bytes(&changed));
        }
    }
}
