use subtle::ConstantTimeEq;

use crate::error::AuthError;

/// How passwords are stored and checked.
///
/// `hash` is applied once when a user is created and its output is what the
/// repository stores. `verify` receives a login attempt and that stored value,
/// and returns `Ok(false)` for a plain mismatch. Errors are reserved for
/// failures of the scheme itself, such as a corrupt stored hash.
pub trait PasswordVerifier: Send + Sync + 'static {
    fn hash(&self, password: &str) -> Result<String, AuthError>;

    fn verify(&self, attempt: &str, stored: &str) -> Result<bool, AuthError>;
}

/// Stores passwords as given. Only suitable for demos and tests.
#[derive(Debug, Clone, Copy, Default)]
pub struct PlaintextPasswords;

impl PasswordVerifier for PlaintextPasswords {
    fn hash(&self, password: &str) -> Result<String, AuthError> {
        Ok(password.to_owned())
    }

    fn verify(&self, attempt: &str, stored: &str) -> Result<bool, AuthError> {
        Ok(attempt.as_bytes().ct_eq(stored.as_bytes()).into())
    }
}

/// Argon2 hashes in the encoded (PHC) form.
#[derive(Clone)]
pub struct Argon2Passwords {
    /// Must be at least 8 bytes. If it changes, stored hashes still verify
    /// because the encoded form carries its own salt.
    salt: String,
}

impl Argon2Passwords {
    pub fn new(salt: impl Into<String>) -> Self {
        Self { salt: salt.into() }
    }
}

impl PasswordVerifier for Argon2Passwords {
    fn hash(&self, password: &str) -> Result<String, AuthError> {
        let encoded = argon2::hash_encoded(
            password.as_bytes(),
            self.salt.as_bytes(),
            &argon2::Config::default(),
        )?;
        Ok(encoded)
    }

    fn verify(&self, attempt: &str, stored: &str) -> Result<bool, AuthError> {
        Ok(argon2::verify_encoded(stored, attempt.as_bytes())?)
    }
}
