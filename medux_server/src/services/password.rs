//! Password hashing and validation.
//!
//! Hashes use PBKDF2-HMAC-SHA256 and are stored as
//! `pbkdf2_sha256$<iterations>$<salt>$<base64 hash>`.

use base64::engine::general_purpose::STANDARD;
use base64::Engine;
use rand::distributions::Alphanumeric;
use rand::Rng;
use sha2::Sha256;
use subtle::ConstantTimeEq;

use super::error::ServiceError;

pub const ALGORITHM: &str = "pbkdf2_sha256";
pub const MIN_PASSWORD_LEN: usize = 8;
const SALT_LEN: usize = 22;

/// The parts of an encoded hash.
#[derive(Debug, PartialEq, Eq)]
struct Encoded<'a> {
    iterations: u32,
    salt: &'a str,
    hash: Vec<u8>,
}

fn decode(encoded: &str) -> Option<Encoded<'_>> {
    let mut parts = encoded.split('$');
    let algorithm = parts.next()?;
    let iterations = parts.next()?.parse().ok()?;
    let salt = parts.next()?;
    let hash = STANDARD.decode(parts.next()?).ok()?;
    if algorithm != ALGORITHM || parts.next().is_some() || salt.is_empty() {
        return None;
    }
    Some(Encoded {
        iterations,
        salt,
        hash,
    })
}

fn pbkdf2_sha256(password: &[u8], salt: &[u8], iterations: u32) -> [u8; 32] {
    let mut derived = [0u8; 32];
    pbkdf2::pbkdf2_hmac::<Sha256>(password, salt, iterations, &mut derived);
    derived
}

fn generate_salt() -> String {
    rand::thread_rng()
        .sample_iter(&Alphanumeric)
        .take(SALT_LEN)
        .map(char::from)
        .collect()
}

/// Encode `password` with an explicit salt.
pub fn encode(password: &str, salt: &str, iterations: u32) -> String {
    let hash = pbkdf2_sha256(password.as_bytes(), salt.as_bytes(), iterations);
    format!("{ALGORITHM}${iterations}${salt}${}", STANDARD.encode(hash))
}

/// Hash `password` with a fresh random salt.
pub fn hash_password(password: &str, iterations: u32) -> String {
    encode(password, &generate_salt(), iterations)
}

/// Check `password` against an encoded hash. Malformed hashes never match.
pub fn verify_password(password: &str, encoded: &str) -> bool {
    let Some(decoded) = decode(encoded) else {
        return false;
    };
    let candidate = pbkdf2_sha256(password.as_bytes(), decoded.salt.as_bytes(), decoded.iterations);
    candidate.as_slice().ct_eq(decoded.hash.as_slice()).into()
}

/// Whether a stored hash should be re-encoded with the current work factor.
pub fn needs_rehash(encoded: &str, iterations: u32) -> bool {
    !matches!(decode(encoded), Some(decoded) if decoded.iterations == iterations)
}

/// Reject weak passwords.
pub fn validate_password(password: &str, username: &str) -> Result<(), ServiceError> {
    if password.chars().count() < MIN_PASSWORD_LEN {
        return Err(ServiceError::Validation(format!(
            "This password is too short. It must contain at least {MIN_PASSWORD_LEN} characters."
        )));
    }
    if password.chars().all(|c| c.is_ascii_digit()) {
        return Err(ServiceError::Validation(
            "This password is entirely numeric.".to_string(),
        ));
    }
    if !username.is_empty() && password.to_lowercase().contains(&username.to_lowercase()) {
        return Err(ServiceError::Validation(
            "The password is too similar to the username.".to_string(),
        ));
    }
    Ok(())
}
