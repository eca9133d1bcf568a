//! BLAKE3 helpers for query fingerprints.

use blake3::Hasher;

/// Full 256-bit fingerprint of a query string.
#[inline]
pub fn hash_query(query: &str) -> [u8; 32] {
    *blake3::hash(query.as_bytes()).as_bytes()
}

/// Computes a 64-bit hash of the input data using BLAKE3, truncated from 256 bits.
///
/// Used for deterministic seeds (stub embeddings) where collisions only cost a
/// slightly different vector, never a wrong cache answer. Use [`hash_query`] when
/// the value keys a cache.
#[inline]
pub fn hash_to_u64(data: &[u8]) -> u64 {
    let hash = blake3::hash(data);
    let mut bytes = [0u8; 8];
    bytes.copy_from_slice(&hash.as_bytes()[..8]);
    u64::from_le_bytes(bytes)
}

/// Fingerprint of a query scoped to the embedding model that will encode it.
///
/// Two models never share memoized vectors, even for identical text.
#[inline]
pub fn hash_model_query(model: &str, query: &str) -> [u8; 32] {
    let mut hasher = Hasher::new();
    hasher.update(model.as_bytes());
    hasher.update(b"|");
    hasher.update(query.as_bytes());
    *hasher.finalize().as_bytes()
}
