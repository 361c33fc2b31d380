//! Password hashing with Argon2id.
//!
//! Hashing and verification are CPU bound, so both run on the blocking pool.

use argon2::{
    password_hash::{PasswordHash, PasswordHasher, PasswordVerifier, SaltString},
    Algorithm, Argon2, Params, Version,
};
use rand::rngs::OsRng;

use crate::error::CodecError;

#[derive(Clone)]
pub struct CredentialCodec {
    argon2: Argon2<'static>,
}

impl Default for CredentialCodec {
    fn default() -> Self {
        Self::new()
    }
}

impl CredentialCodec {
    /// Argon2id v19 with the library's default cost (19 MiB, 2 passes, 1 lane).
    pub fn new() -> Self {
        Self {
            argon2: Argon2::new(Algorithm::Argon2id, Version::V0x13, Params::default()),
        }
    }

    /// Produces a salted PHC-format hash.
    pub async fn hash(&self, plaintext: &str) -> Result<String, CodecError> {
        let password = plaintext.to_string();
        let argon2 = self.argon2.clone();

        tokio::task::spawn_blocking(move || {
            let salt = SaltString::generate(&mut OsRng);
            argon2
                .hash_password(password.as_bytes(), &salt)
                .map(|hash| hash.to_string())
                .map_err(|e| CodecError::Hash(e.to_string()))
        })
        .await?
    }

    /// Returns `Ok(false)` on mismatch; errors are reserved for malformed
    /// hashes and task failures.
    pub async fn verify(&self, hash: &str, plaintext: &str) -> Result<bool, CodecError> {
        let hash = hash.to_string();
        let password = plaintext.to_string();
        let argon2 = self.argon2.clone();

        tokio::task::spawn_blocking(move || {
            let parsed =
                PasswordHash::new(&hash).map_err(|e| CodecError::MalformedHash(e.to_string()))?;
            match argon2.verify_password(password.as_bytes(), &parsed) {
                Ok(()) => Ok(true),
                Err(argon2::password_hash::Error::Password) => Ok(false),
                Err(e) => Err(CodecError::Hash(e.to_string())),
            }
        })
        .await?
    }
}
