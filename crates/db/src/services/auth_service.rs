// Credential hashing and session tokens
use bcrypt::{DEFAULT_COST, hash, verify};
use sha2::{Digest, Sha256};
use uuid::Uuid;

pub const MIN_PASSWORD_LENGTH: usize = 6;

/// Stateless helpers for passwords and session tokens
pub struct AuthService;

impl AuthService {
    /// Hash a password using bcrypt
    pub fn hash_password(password: &str) -> Result<String, bcrypt::BcryptError> {
        hash(password, DEFAULT_COST)
    }

    /// Verify a password against a hash
    pub fn verify_password(password: &str, hash: &str) -> Result<bool, bcrypt::BcryptError> {
        verify(password, hash)
    }

    pub fn is_acceptable_password(password: &str) -> bool {
        password.chars().count() >= MIN_PASSWORD_LENGTH
    }

    /// New opaque session token handed to the client
    pub fn generate_session_id() -> String {
        Uuid::new_v4().to_string()
    }

    /// SHA-256 of a session token, hex encoded. This is what the sessions table stores.
    pub fn hash_session_token(token: &str) -> String {
        let mut hasher = Sha256::new();
        hasher.update(token.as_bytes());
        hex::encode(hasher.finalize())
    }
}
