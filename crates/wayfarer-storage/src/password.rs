// Password hashing using Argon2id
// Decision: Use Argon2id with default parameters
// Decision: Reset tokens are random, stored only as a SHA-256 hash; the
// plaintext exists just long enough to be mailed out.

use anyhow::Result;
use argon2::{
    password_hash::{rand_core::OsRng, PasswordHash, PasswordHasher, PasswordVerifier, SaltString},
    Argon2,
};
use rand::Rng;
use sha2::{Digest, Sha256};

/// Hash a password using Argon2id
pub fn hash_password(password: &str) -> Result<String> {
    let salt = SaltString::generate(&mut OsRng);
    let argon2 = Argon2::default();

    let hash = argon2
        .hash_password(password.as_bytes(), &salt)
        .map_err(|e| anyhow::anyhow!("Failed to hash password: {}", e))?;

    Ok(hash.to_string())
}

/// Verify a password against a hash
pub fn verify_password(password: &str, hash: &str) -> Result<bool> {
    let parsed_hash = PasswordHash::new(hash)
        .map_err(|e| anyhow::anyhow!("Failed to parse password hash: {}", e))?;

    Ok(Argon2::default()
        .verify_password(password.as_bytes(), &parsed_hash)
        .is_ok())
}

/// A freshly generated password-reset token. `plain` goes out via email,
/// `hash` is what gets persisted.
#[derive(Debug)]
pub struct ResetToken {
    pub plain: String,
    pub hash: String,
}

/// Generate a password-reset token (32 random bytes, hex-encoded)
pub fn generate_reset_token() -> ResetToken {
    let mut rng = rand::thread_rng();
    let bytes: [u8; 32] = rng.gen();
    let plain = hex::encode(bytes);
    let hash = hash_reset_token(&plain);
    ResetToken { plain, hash }
}

/// Hash a reset token for storage/lookup
pub fn hash_reset_token(plain: &str) -> String {
    let hash = Sha256::digest(plain.as_bytes());
    hex::encode(hash)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_hash_and_verify() {
        let password = "my-secure-password-123!";
        let hash = hash_password(password).unwrap();

        assert!(verify_password(password, &hash).unwrap());
        assert!(!verify_password("wrong-password", &hash).unwrap());
    }

    #[test]
    fn test_different_hashes() {
        let password = "same-password";
        let hash1 = hash_password(password).unwrap();
        let hash2 = hash_password(password).unwrap();

        // Different salts, same verification result
        assert_ne!(hash1, hash2);
        assert!(verify_password(password, &hash1).unwrap());
        assert!(verify_password(password, &hash2).unwrap());
    }

    #[test]
    fn test_hash_format() {
        let hash = hash_password("test").unwrap();
        assert!(hash.starts_with("$argon2id$"));
    }

    #[test]
    fn test_reset_token() {
        let token = generate_reset_token();

        // 32 bytes -> 64 hex chars, plaintext never equals the stored hash
        assert_eq!(token.plain.len(), 64);
        assert_ne!(token.plain, token.hash);
        assert_eq!(hash_reset_token(&token.plain), token.hash);

        // SHA-256 hash is 64 hex chars
        assert_eq!(token.hash.len(), 64);
        assert!(token.hash.chars().all(|c| c.is_ascii_hexdigit()));
    }

    #[test]
    fn test_reset_tokens_unique() {
        let t1 = generate_reset_token();
        let t2 = generate_reset_token();
        assert_ne!(t1.plain, t2.plain);
        assert_ne!(t1.hash, t2.hash);
    }
}
