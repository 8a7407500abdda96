//! Content hashing utilities

use crate::types::SyncError;
use std::fs::File;
use std::io::Read;
use std::path::Path;

/// Lowercase hex BLAKE3 digest of file content
pub type ContentHash = String;

/// Hash an in-memory buffer
///
/// Used for bytes that were just uploaded or downloaded, so the record
/// matches exactly what crossed the wire.
pub fn hash_bytes(bytes: &[u8]) -> ContentHash {
    blake3::hash(bytes).to_hex().to_string()
}

/// Compute the BLAKE3 hash of a file
///
/// The file is streamed in 64KB chunks for memory efficiency.
///
/// # Example
/// ```no_run
/// use notesync::hash::compute_hash;
/// use std::path::Path;
///
/// let hash = compute_hash(Path::new("note.md"))?;
/// # Ok::<(), notesync::types::SyncError>(())
/// ```
pub fn compute_hash(file_path: &Path) -> Result<ContentHash, SyncError> {
    let mut file = File::open(file_path)?;
    let mut hasher = blake3::Hasher::new();
    let mut buffer = vec![0u8; 64 * 1024];

    loop {
        let bytes_read = file.read(&mut buffer)?;
        if bytes_read == 0 {
            break;
        }
        hasher.update(&buffer[..bytes_read]);
    }

    Ok(hasher.finalize().to_hex().to_string())
}

/// Whether a stored hash may stand in for re-reading a file of `size` bytes
pub fn is_reusable(stored_hash: &str, stored_size: u64, size: u64) -> bool {
    !stored_hash.is_empty() && stored_size == size
}
