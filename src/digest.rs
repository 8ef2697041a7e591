//! Raw digest contract
//!
//! The signer signs exactly 32 bytes, supplied as 64 hex characters with no
//! `0x` prefix. No framing or prefix is added; callers pre-hash their messages.

use sha2::{Digest, Sha256};

use crate::error::{Result, SignerError};

/// Number of hex characters in a 32-byte digest
pub const DIGEST_HEX_LEN: usize = 64;

/// Validate a hex digest before it is allowed anywhere near the network.
pub fn validate_digest(hex_digest: &str) -> Result<()> {
    let len = hex_digest.chars().count();
    if len != DIGEST_HEX_LEN {
        return Err(SignerError::InvalidDigestLength(len));
    }
    if !hex_digest.bytes().all(|b| b.is_ascii_hexdigit()) {
        return Err(SignerError::InvalidDigestEncoding);
    }
    Ok(())
}

/// SHA-256 a message and return the lowercase hex digest accepted by `sign_raw`.
pub fn hash_message(message: &[u8]) -> String {
    hex::encode(Sha256::digest(message))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_accepts_64_hex_chars() {
        assert!(validate_digest(&"a1".repeat(32)).is_ok());
        assert!(validate_digest(&"AB".repeat(32)).is_ok());
    }

    #[test]
    fn test_rejects_wrong_lengths() {
        for len in [0, 1, 63, 65, 66, 128] {
            let digest = "a".repeat(len);
            assert_eq!(
                validate_digest(&digest),
                Err(SignerError::InvalidDigestLength(len))
            );
        }
    }

    #[test]
    fn test_rejects_prefixed_digest() {
        // 0x + 62 hex chars is the right length but not valid hex
        let digest = format!("0x{}", "a".repeat(62));
        assert_eq!(validate_digest(&digest), Err(SignerError::InvalidDigestEncoding));
    }

    #[test]
    fn test_length_counts_characters_not_bytes() {
        let digest = "é".repeat(64);
        assert_eq!(validate_digest(&digest), Err(SignerError::InvalidDigestEncoding));
    }

    #[test]
    fn test_hash_message() {
        let digest = hash_message(b"Hello Flow");
        assert_eq!(digest.len(), DIGEST_HEX_LEN);
        assert!(validate_digest(&digest).is_ok());
        // sha256("") is well known
        assert_eq!(
            hash_message(b""),
            "e3b0c44298fc1c149afbf4c8996fb92427ae41e4649b934ca495991b7852b855"
        );
    }
}
