//! Document hashing.
//!
//! The registry stores a keccak-256 digest of the deed document next to the
//! external storage id; hashing happens client-side before submission. A zero
//! digest is accepted when no document accompanies the registration.

use alloy_primitives::{keccak256, B256};
use std::path::Path;

/// Keccak-256 digest of the document bytes.
pub fn hash_document(bytes: &[u8]) -> B256 {
    keccak256(bytes)
}

/// Reads and hashes a document file.
pub fn hash_document_file(path: impl AsRef<Path>) -> std::io::Result<B256> {
    Ok(hash_document(&std::fs::read(path)?))
}
