//! # Hashing Utilities
//!
//! SHA-256 helpers used for canonical transaction ids. The id is
//! `double_sha256(signable_bytes)`, the same construction Bitcoin uses for
//! txids.

use sha2::{Digest, Sha256};

/// Compute the SHA-256 hash of the input data.
///
/// # Example
///
/// ```
/// use orchard_protocol::crypto::sha256;
///
/// let hash = sha256(b"orchard");
/// assert_eq!(hash.len(), 32);
/// ```
pub fn sha256(data: &[u8]) -> [u8; 32] {
    let mut hasher = Sha256::new();
    hasher.update(data);
    let result = hasher.finalize();
    let mut output = [0u8; 32];
    output.copy_from_slice(&result);
    output
}

/// Compute `SHA-256(SHA-256(data))`.
///
/// This is the hash behind every canonical transaction id on the ledger.
pub fn double_sha256(data: &[u8]) -> [u8; 32] {
    sha256(&sha256(data))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sha256_known_vector() {
        // SHA-256("abc"), FIPS 180-2 appendix B.1.
        assert_eq!(
            hex::encode(sha256(b"abc")),
            "ba7816bf8f01cfea414140de5dae2223b00361a396177a9cb410ff61f20015ad"
        );
    }

    #[test]
    fn double_sha256_differs_from_single() {
        let data = b"redeem";
        assert_ne!(sha256(data), double_sha256(data));
        assert_eq!(double_sha256(data), sha256(&sha256(data)));
    }

    #[test]
    fn double_sha256_is_deterministic() {
        assert_eq!(double_sha256(b"stamp"), double_sha256(b"stamp"));
        assert_ne!(double_sha256(b"stamp"), double_sha256(b"basket"));
    }
}
