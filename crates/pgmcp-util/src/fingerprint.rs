//! Content-addressed fingerprinting for cache keys.
//!
//! Mirrors the PKCE challenge hashing used for OAuth: hash canonical bytes
//! with SHA-256 and render as lowercase hex so the digest is stable across
//! processes and architectures.

use sha2::{Digest, Sha256};

/// Compute a hex-encoded SHA-256 digest over an ordered sequence of byte
/// chunks, joined with a `\0` delimiter so `["ab", "c"]` and `["a", "bc"]`
/// never collide.
pub fn fingerprint<I, B>(chunks: I) -> String
where
    I: IntoIterator<Item = B>,
    B: AsRef<[u8]>,
{
    let mut hasher = Sha256::new();
    for (i, chunk) in chunks.into_iter().enumerate() {
        if i > 0 {
            hasher.update(b"\0");
        }
        hasher.update(chunk.as_ref());
    }
    hex::encode(hasher.finalize())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_deterministic() {
        let a = fingerprint(["hello", "world"]);
        let b = fingerprint(["hello", "world"]);
        assert_eq!(a, b);
    }

    #[test]
    fn test_delimiter_prevents_collision() {
        let a = fingerprint(["ab", "c"]);
        let b = fingerprint(["a", "bc"]);
        assert_ne!(a, b);
    }

    #[test]
    fn test_order_sensitive() {
        let a = fingerprint(["a", "b"]);
        let b = fingerprint(["b", "a"]);
        assert_ne!(a, b);
    }

    #[test]
    fn test_hex_output() {
        let digest = fingerprint(["x"]);
        assert_eq!(digest.len(), 64);
        assert!(digest.chars().all(|c| c.is_ascii_hexdigit()));
    }
}
