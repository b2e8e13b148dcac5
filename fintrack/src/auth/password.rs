//! Password hashing with Argon2id.

use argon2::{
    Algorithm, Argon2, Params, Version,
    password_hash::{PasswordHash, PasswordHasher, PasswordVerifier, SaltString, rand_core::OsRng},
};

use super::errors::{AuthError, AuthResult};

/// Default number of Argon2 iterations
pub const DEFAULT_HASH_ROUNDS: u32 = 2;

/// Default Argon2 memory cost in KiB
pub const DEFAULT_HASH_MEMORY_KIB: u32 = Params::DEFAULT_M_COST;

/// One-way password hashing with a random salt per call
#[derive(Clone)]
pub struct PasswordHandler {
    argon2: Argon2<'static>,
}

impl PasswordHandler {
    /// Create a password handler
    ///
    /// # Arguments
    ///
    /// * `rounds` - Argon2 iteration count; higher values slow down both brute force and login
    /// * `memory_kib` - Argon2 memory cost in KiB
    ///
    /// # Errors
    ///
    /// * `AuthError::Configuration` - Parameters rejected by Argon2
    pub fn new(rounds: u32, memory_kib: u32) -> AuthResult<Self> {
        let params = Params::new(memory_kib, rounds, Params::DEFAULT_P_COST, None)
            .map_err(|e| AuthError::Configuration(format!("argon2 params: {e}")))?;

        Ok(Self {
            argon2: Argon2::new(Algorithm::Argon2id, Version::V0x13, params),
        })
    }

    /// Hash a password into a PHC string embedding salt and parameters
    pub fn hash(&self, password: &str) -> AuthResult<String> {
        let salt = SaltString::generate(&mut OsRng);

        Ok(self
            .argon2
            .hash_password(password.as_bytes(), &salt)
            .map_err(|_| AuthError::HashingFailed)?
            .to_string())
    }

    /// Check a password against a stored hash.
    ///
    /// Uses the salt and cost stored in `hash`, so hashes produced under an
    /// older cost setting still verify.
    pub fn verify(&self, password: &str, hash: &str) -> bool {
        let parsed_hash = match PasswordHash::new(hash) {
            Ok(parsed) => parsed,
            Err(e) => {
                log::warn!("Stored password hash is malformed: {e}");
                return false;
            }
        };

        self.argon2
            .verify_password(password.as_bytes(), &parsed_hash)
            .is_ok()
    }
}

impl Default for PasswordHandler {
    fn default() -> Self {
        Self {
            argon2: Argon2::default(),
        }
    }
}
