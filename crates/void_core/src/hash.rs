//! Content hashing
//!
//! All hashes are truncated SHA-256 digests. They must be stable across runs
//! and machines because they end up in meta files and compiled asset names.

use std::fmt;
use std::fs::File;
use std::io::{self, Read};
use std::path::Path;

use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

fn digest(data: &[u8]) -> [u8; 32] {
    let mut hasher = Sha256::new();
    hasher.update(data);
    let mut bytes = [0u8; 32];
    bytes.copy_from_slice(&hasher.finalize());
    bytes
}

fn first_u64(bytes: &[u8; 32]) -> u64 {
    let mut head = [0u8; 8];
    head.copy_from_slice(&bytes[..8]);
    u64::from_le_bytes(head)
}

/// Hash a human readable name into a 64-bit key
pub fn hash_str(name: &str) -> u64 {
    first_u64(&digest(name.as_bytes()))
}

/// 64-bit hash of a source file's bytes.
///
/// `FileHash::ZERO` marks a resource that was discovered but never imported.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct FileHash(pub u64);

impl FileHash {
    /// Hash of a resource that has never been imported
    pub const ZERO: FileHash = FileHash(0);

    /// Hash an in-memory buffer
    pub fn of_bytes(data: &[u8]) -> Self {
        FileHash(first_u64(&digest(data)))
    }

    /// Hash a file by streaming its contents
    pub fn of_file(path: &Path) -> io::Result<Self> {
        let mut file = File::open(path)?;
        let mut hasher = Sha256::new();
        let mut buffer = [0u8; 64 * 1024];
        loop {
            let read = file.read(&mut buffer)?;
            if read == 0 {
                break;
            }
            hasher.update(&buffer[..read]);
        }
        let mut bytes = [0u8; 32];
        bytes.copy_from_slice(&hasher.finalize());
        Ok(FileHash(first_u64(&bytes)))
    }

    /// Check if this is the never-imported placeholder
    pub fn is_zero(&self) -> bool {
        self.0 == 0
    }
}

impl fmt::Display for FileHash {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:016x}", self.0)
    }
}

/// 128-bit hash used for large payloads such as texture pixels
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Hash128(pub u128);

impl Hash128 {
    pub fn of_bytes(data: &[u8]) -> Self {
        let bytes = digest(data);
        let mut head = [0u8; 16];
        head.copy_from_slice(&bytes[..16]);
        Hash128(u128::from_le_bytes(head))
    }
}

impl fmt::Display for Hash128 {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:032x}", self.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_hashes_are_deterministic() {
        assert_eq!(hash_str("crate.glb/mesh/0"), hash_str("crate.glb/mesh/0"));
        assert_ne!(hash_str("a"), hash_str("b"));
        assert_eq!(FileHash::of_bytes(b"abc"), FileHash::of_bytes(b"abc"));
        assert_eq!(Hash128::of_bytes(b"abc"), Hash128::of_bytes(b"abc"));
    }

    #[test]
    fn test_file_hash_matches_bytes() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("data.bin");
        let data: Vec<u8> = (0..200_000u32).map(|i| (i % 251) as u8).collect();
        std::fs::write(&path, &data).unwrap();

        assert_eq!(FileHash::of_file(&path).unwrap(), FileHash::of_bytes(&data));
    }

    #[test]
    fn test_zero_placeholder() {
        assert!(FileHash::ZERO.is_zero());
        assert!(!FileHash::of_bytes(b"").is_zero());
    }
}
