//! Content checksums used as the drift tripwire for registry entries.
//!
//! SHA-256 over the raw text, hex encoded. Changing the algorithm would mark
//! every stored entry stale on the next check, so it stays fixed.

use sha2::{Digest, Sha256};
use std::path::Path;

use crate::error::{ContextError, Result};

/// Hash raw bytes. Depends on content only.
pub fn hash_bytes(content: &[u8]) -> String {
    let mut hasher = Sha256::new();
    hasher.update(content);
    hex::encode(hasher.finalize())
}

/// Hash a string's UTF-8 bytes; equal to [`hash_bytes`] on the same bytes.
pub fn hash(content: &str) -> String {
    hash_bytes(content.as_bytes())
}

/// Read a file and hash its content. Targets may be any file, text or not.
pub async fn hash_file(path: &Path) -> Result<String> {
    let content = tokio::fs::read(path)
        .await
        .map_err(|e| ContextError::io(path, e))?;
    Ok(hash_bytes(&content))
}
