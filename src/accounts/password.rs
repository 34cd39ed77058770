//! Password hashing
//!
//! Stored form: `sha256$<iterations>$<salt hex>$<digest hex>`.

use rand::RngCore;
use sha2::{Digest, Sha256};

const SCHEME: &str = "sha256";
const ITERATIONS: u32 = 20_000;
const SALT_LEN: usize = 16;

/// Hashes `password` with a fresh random salt
pub fn hash_password(password: &str) -> String {
    let mut salt = [0u8; SALT_LEN];
    rand::thread_rng().fill_bytes(&mut salt);
    encode(password, &salt, ITERATIONS)
}

/// Checks `password` against a stored hash; malformed hashes never match
pub fn verify_password(password: &str, stored: &str) -> bool {
    let mut parts = stored.split('$');
    let (Some(scheme), Some(iterations), Some(salt), Some(digest), None) = (
        parts.next(),
        parts.next(),
        parts.next(),
        parts.next(),
        parts.next(),
    ) else {
        return false;
    };
    if scheme != SCHEME {
        return false;
    }
    let (Ok(iterations), Ok(salt), Ok(expected)) =
        (iterations.parse::<u32>(), hex::decode(salt), hex::decode(digest))
    else {
        return false;
    };

    constant_time_eq(&stretch(password, &salt, iterations), &expected)
}

fn encode(password: &str, salt: &[u8], iterations: u32) -> String {
    let digest = stretch(password, salt, iterations);
    format!(
        "{SCHEME}${iterations}${}${}",
        hex::encode(salt),
        hex::encode(digest)
    )
}

fn stretch(password: &str, salt: &[u8], iterations: u32) -> Vec<u8> {
    let mut digest = Sha256::new()
        .chain_update(salt)
        .chain_update(password.as_bytes())
        .finalize();
    for _ in 1..iterations {
        digest = Sha256::new()
            .chain_update(salt)
            .chain_update(digest)
            .finalize();
    }
    digest.to_vec()
}

fn constant_time_eq(a: &[u8], b: &[u8]) -> bool {
    if a.len() != b.len() {
        return false;
    }
    a.iter().zip(b).fold(0u8, |acc, (x, y)| acc | (x ^ y)) == 0
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_hash_and_verify() {
        let stored = hash_password("s3cret!");
        assert!(stored.starts_with("sha256$20000$"));
        assert!(verify_password("s3cret!", &stored));
        assert!(!verify_password("s3cret", &stored));
    }

    #[test]
    fn test_salts_differ() {
        assert_ne!(hash_password("same"), hash_password("same"));
    }

    #[test]
    fn test_known_vector_with_single_iteration() {
        let stored = encode("abc", b"", 1);
        // SHA-256("abc")
        assert_eq!(
            stored,
            "sha256$1$$ba7816bf8f01cfea414140de5dae2223b00361a396177a9cb410ff61f20015ad"
        );
        assert!(verify_password("abc", &stored));
    }

    #[test]
    fn test_malformed_hashes_rejected() {
        assert!(!verify_password("x", ""));
        assert!(!verify_password("x", "md5$1$00$00"));
        assert!(!verify_password("x", "sha256$many$00$00"));
        assert!(!verify_password("x", "sha256$1$zz$00"));
        assert!(!verify_password("x", "sha256$1$00$00$extra"));
    }
}
