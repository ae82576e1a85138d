/// Secure Token Generation
///
/// Opaque credentials are built from operating-system randomness:
/// - `SECRET_BYTES` random bytes, hex encoded in full (no truncation), so the
///   plaintext secret is always `2 * SECRET_BYTES` characters and carries
///   `8 * SECRET_BYTES` bits of entropy
/// - Hashed with SHA-256 before storage (never store plaintext)
/// - Presented on the wire as `"{id}|{secret}"`

use rand::rngs::OsRng;
use rand::RngCore;
use sha2::{Digest, Sha256};
use std::fmt;

use crate::error::{AppError, AuthError};

/// Default secret size: 20 bytes, i.e. 40 hex characters and 160 bits.
pub const SECRET_BYTES: usize = 20;

/// Smallest secret size the generator accepts.
pub const MIN_SECRET_BYTES: usize = 16;

/// Separator between the public id and the secret in a wire token
pub const WIRE_SEPARATOR: char = '|';

/// A freshly generated secret and its digest
pub struct SecureToken {
    pub plaintext: String,
    pub digest: String,
}

impl fmt::Debug for SecureToken {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SecureToken")
            .field("plaintext", &"[redacted]")
            .field("digest", &self.digest)
            .finish()
    }
}

/// Generate a new cryptographically secure secret of `byte_length` random bytes
///
/// # Errors
/// Returns `EntropySource` if the OS random source cannot supply every byte.
/// No token may be issued from partial entropy.
pub fn generate_secure_token(byte_length: usize) -> Result<SecureToken, AppError> {
    if byte_length < MIN_SECRET_BYTES {
        return Err(AppError::Internal(format!(
            "secret length {} is below the minimum of {} bytes",
            byte_length, MIN_SECRET_BYTES
        )));
    }

    let mut bytes = vec![0u8; byte_length];
    OsRng
        .try_fill_bytes(&mut bytes)
        .map_err(|e| AppError::EntropySource(e.to_string()))?;

    let plaintext = hex::encode(&bytes);
    let digest = hash_token(&plaintext);

    Ok(SecureToken { plaintext, digest })
}

/// Hash a token secret using SHA-256, hex encoded
pub fn hash_token(secret: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(secret.as_bytes());
    format!("{:x}", hasher.finalize())
}

/// Render the client-facing wire token
pub fn format_wire_token(id: i64, plaintext: &str) -> String {
    format!("{}{}{}", id, WIRE_SEPARATOR, plaintext)
}

/// Split a wire token into its record id and secret
///
/// The id must be a plain unsigned decimal that fits the id column. Only the
/// first separator splits; both segments must be non-empty.
pub fn parse_wire_token(token: &str) -> Result<(i64, &str), AuthError> {
    let (id, secret) = token
        .split_once(WIRE_SEPARATOR)
        .ok_or(AuthError::MalformedToken)?;

    if id.is_empty() || secret.is_empty() || !id.bytes().all(|b| b.is_ascii_digit()) {
        return Err(AuthError::MalformedToken);
    }

    let id = id
        .parse::<u64>()
        .ok()
        .and_then(|id| i64::try_from(id).ok())
        .ok_or(AuthError::MalformedToken)?;

    Ok((id, secret))
}
