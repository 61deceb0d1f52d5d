//! Salted password digests.
//!
//! Each account carries a random per-user salt. The stored digest is the
//! BLAKE3 hash of the salt bytes followed by the password bytes, hex
//! encoded. Verification recomputes the digest and compares `blake3::Hash`
//! values, which is a constant-time comparison.

use rand::RngCore;

/// Generate a fresh 16-byte salt, hex encoded.
pub(crate) fn generate_salt() -> String {
    let mut bytes = [0u8; 16];
    rand::thread_rng().fill_bytes(&mut bytes);
    hex_encode(&bytes)
}

/// Compute the hex digest for a salt and password pair.
pub(crate) fn digest_password(salt: &str, password: &str) -> String {
    hash_password(salt, password).to_hex().to_string()
}

/// Check a candidate password against a stored digest.
pub(crate) fn verify_password(salt: &str, digest: &str, candidate: &str) -> bool {
    let Ok(stored) = blake3::Hash::from_hex(digest) else {
        return false;
    };
    hash_password(salt, candidate) == stored
}

fn hash_password(salt: &str, password: &str) -> blake3::Hash {
    let mut hasher = blake3::Hasher::new();
    hasher.update(salt.as_bytes());
    hasher.update(password.as_bytes());
    hasher.finalize()
}

fn hex_encode(bytes: &[u8]) -> String {
    bytes.iter().map(|b| format!("{b:02x}")).collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_digest_round_trip() {
        let salt = generate_salt();
        let digest = digest_password(&salt, "s3cret-password");

        assert!(verify_password(&salt, &digest, "s3cret-password"));
        assert!(!verify_password(&salt, &digest, "wrong-password"));
    }

    #[test]
    fn test_same_password_different_salts_differ() {
        let a = digest_password(&generate_salt(), "s3cret-password");
        let b = digest_password(&generate_salt(), "s3cret-password");
        assert_ne!(a, b);
    }

    #[test]
    fn test_malformed_digest_never_verifies() {
        assert!(!verify_password("aabb", "not-hex!", "anything"));
    }
}
