/// Argon2id password hashing
use crate::error::{KbError, KbResult};
use argon2::{
    password_hash::{PasswordHash, SaltString},
    Argon2, PasswordHasher, PasswordVerifier,
};
use rand::RngCore;

/// Hash a password into a PHC string with a fresh random salt
pub fn hash_password(password: &str) -> KbResult<String> {
    let mut salt_bytes = [0u8; 16];
    rand::thread_rng().fill_bytes(&mut salt_bytes);

    let salt = SaltString::encode_b64(&salt_bytes)
        .map_err(|e| KbError::Internal(format!("Failed to encode salt: {}", e)))?;

    let phc = Argon2::default()
        .hash_password(password.as_bytes(), &salt)
        .map_err(|e| KbError::Internal(format!("Failed to hash password: {}", e)))?
        .to_string();

    Ok(phc)
}

/// Check a password against a stored PHC string.
///
/// An unparseable stored hash verifies as false.
pub fn verify_password(password: &str, hash: &str) -> bool {
    match PasswordHash::new(hash) {
        Ok(parsed) => Argon2::default()
            .verify_password(password.as_bytes(), &parsed)
            .is_ok(),
        Err(e) => {
            tracing::error!("Stored password hash is unreadable: {}", e);
            false
        }
    }
}
