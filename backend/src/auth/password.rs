use actix_web::web;
use pbkdf2::password_hash::{self, PasswordHash, PasswordHasher, PasswordVerifier, SaltString};
use pbkdf2::{Algorithm, Params, Pbkdf2};
use rand::RngCore;

pub const DEFAULT_ITERATIONS: u32 = 600_000;
const SALT_LEN: usize = 16;
const HASH_LEN: usize = 32;

#[derive(Debug, thiserror::Error, PartialEq)]
pub enum PasswordError {
    #[error("Unsupported password hash format")]
    Format,
    #[error("Password hashing failed: {0}")]
    Hash(password_hash::Error),
    #[error("Password worker unavailable")]
    Worker,
}

/// PBKDF2-SHA256 in PHC string form, e.g. `$pbkdf2-sha256$i=600000,l=32$<salt>$<hash>`.
pub fn hash_password(password: &str, iterations: u32) -> Result<String, PasswordError> {
    let mut salt = [0u8; SALT_LEN];
    rand::rng().fill_bytes(&mut salt);
    let salt = SaltString::encode_b64(&salt).map_err(PasswordError::Hash)?;
    let params = Params {
        rounds: iterations,
        output_length: HASH_LEN,
    };

    Pbkdf2
        .hash_password_customized(
            password.as_bytes(),
            Some(Algorithm::Pbkdf2Sha256.ident()),
            None,
            params,
            &salt,
        )
        .map(|hash| hash.to_string())
        .map_err(PasswordError::Hash)
}

pub fn verify_password(password: &str, encoded: &str) -> Result<bool, PasswordError> {
    let parsed = PasswordHash::new(encoded).map_err(|_| PasswordError::Format)?;
    if parsed.algorithm != Algorithm::Pbkdf2Sha256.ident() {
        return Err(PasswordError::Format);
    }

    match Pbkdf2.verify_password(password.as_bytes(), &parsed) {
        Ok(()) => Ok(true),
        Err(password_hash::Error::Password) => Ok(false),
        Err(_) => Err(PasswordError::Format),
    }
}

/// Runs [`hash_password`] on the blocking pool so the worker keeps serving requests.
pub async fn hash_in_background(
    password: String,
    iterations: u32,
) -> Result<String, PasswordError> {
    web::block(move || hash_password(&password, iterations))
        .await
        .map_err(|_| PasswordError::Worker)?
}

pub async fn verify_in_background(
    password: String,
    encoded: String,
) -> Result<bool, PasswordError> {
    web::block(move || verify_password(&password, &encoded))
        .await
        .map_err(|_| PasswordError::Worker)?
}
