//! Streaming content digests for local files

use crate::error::{Error, Result};
use md5::{Digest, Md5};
use std::path::Path;
use tokio::fs::File;
use tokio::io::AsyncReadExt;

/// Read buffer size used while hashing
const CHUNK_SIZE: usize = 64 * 1024;

/// Compute the lowercase hex MD5 of a file, reading it in chunks.
///
/// This is the digest S3-compatible providers store as the ETag of objects
/// uploaded in a single request.
pub async fn file_digest(path: &Path) -> Result<String> {
    let hash_err = |source| Error::Hash {
        path: path.to_path_buf(),
        source,
    };

    let mut file = File::open(path).await.map_err(hash_err)?;
    let mut hasher = Md5::new();
    let mut buffer = vec![0u8; CHUNK_SIZE];

    loop {
        let read = file.read(&mut buffer).await.map_err(hash_err)?;
        if read == 0 {
            break;
        }
        hasher.update(&buffer[..read]);
    }

    Ok(format!("{:x}", hasher.finalize()))
}

/// Digest of an in-memory buffer
pub fn bytes_digest(data: &[u8]) -> String {
    let mut hasher = Md5::new();
    hasher.update(data);
    format!("{:x}", hasher.finalize())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[tokio::test]
    async fn test_empty_file_digest() {
        let file = tempfile::NamedTempFile::new().unwrap();
        let digest = file_digest(file.path()).await.unwrap();
        assert_eq!(digest, "d41d8cd98f00b204e9800998ecf8427e");
    }

    #[tokio::test]
    async fn test_digest_matches_known_value() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        file.write_all(b"hello world").unwrap();
        let digest = file_digest(file.path()).await.unwrap();
        assert_eq!(digest, "5eb63bbbe01eeed093cb22bb8f5acdc3");
    }

    #[tokio::test]
    async fn test_multi_chunk_file_matches_in_memory_digest() {
        let data: Vec<u8> = (0..(CHUNK_SIZE * 3 + 17)).map(|i| (i % 251) as u8).collect();
        let mut file = tempfile::NamedTempFile::new().unwrap();
        file.write_all(&data).unwrap();

        let digest = file_digest(file.path()).await.unwrap();
        assert_eq!(digest, bytes_digest(&data));
    }

    #[tokio::test]
    async fn test_missing_file_is_hash_error() {
        let dir = tempfile::tempdir().unwrap();
        let err = file_digest(&dir.path().join("missing.html")).await.unwrap_err();
        assert!(matches!(err, Error::Hash { .. }));
        assert!(!err.is_fatal());
    }
}
