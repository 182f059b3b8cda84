// web-server/src/utils/token.rs
use rand::{thread_rng, Rng};
use rand::distributions::Alphanumeric;
use sha2::{Sha256, Digest};
use std::time::{SystemTime, UNIX_EPOCH};

/// Length of a sign-in nonce; 32 alphanumerics is ~190 bits of entropy
pub const NONCE_LENGTH: usize = 32;

/// Generate a cryptographically secure random token of specified length
pub fn generate_secure_token(length: usize) -> String {
    thread_rng()
        .sample_iter(&Alphanumeric)
        .take(length)
        .map(char::from)
        .collect()
}

/// Generate a sign-in nonce. EIP-4361 nonces are purely alphanumeric.
pub fn generate_nonce() -> String {
    generate_secure_token(NONCE_LENGTH)
}

/// Hex SHA-256 digest of `input`
pub fn hash_string(input: &str) -> String {
    hex::encode(Sha256::digest(input.as_bytes()))
}

/// Create an opaque id for sessions and sign-in attempts: 256 random bits
/// mixed with the clock, hex encoded
pub fn create_session_id() -> String {
    let nanos = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or_default()
        .as_nanos();
    let entropy: [u8; 32] = thread_rng().gen();

    hash_string(&format!("{}:{}", nanos, hex::encode(entropy)))
}
