//! Content-addressed cache key generation.

use sha2::{Digest, Sha256};

/// Compute the cache key for a sub-resource.
///
/// The key is a pure function of the source URL string: no content bytes,
/// no headers, no timestamps. Re-fetching the same URL always maps to the
/// same cache slot, and two URLs serving identical bytes are stored twice.
pub fn asset_key(url: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(url.as_bytes());
    hex::encode(hasher.finalize())
}
