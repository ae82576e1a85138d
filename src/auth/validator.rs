/// Token Validation
///
/// Recovers the record behind a presented wire token:
/// 1. Split `"{id}|{secret}"` and parse the id
/// 2. Look the record up by `(id, sha256(secret), kind)`
/// 3. Reject records whose expiry has passed
///
/// Validation only reads. Recording `last_used_at` is a separate best-effort
/// step ([`TokenValidator::touch`]).

use chrono::Utc;
use std::fmt;
use std::sync::Arc;

use crate::auth::token::{hash_token, parse_wire_token};
use crate::error::{AppError, AuthError};
use crate::models::{PersonalAccessToken, TokenKind, TokenUpdate};
use crate::store::TokenStore;

pub struct ValidatedToken {
    pub record: PersonalAccessToken,
    pub plaintext: String,
}

impl fmt::Debug for ValidatedToken {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ValidatedToken")
            .field("record", &self.record)
            .field("plaintext", &"[redacted]")
            .finish()
    }
}

#[derive(Clone)]
pub struct TokenValidator {
    store: Arc<dyn TokenStore>,
}

impl TokenValidator {
    pub fn new(store: Arc<dyn TokenStore>) -> Self {
        Self { store }
    }

    /// Validate a presented wire token against the expected kind
    ///
    /// # Errors
    /// - `MalformedToken` if the token does not split into a numeric id and a secret
    /// - `InvalidToken` if no record matches id, digest and kind together
    /// - `TokenExpired` if the matching record's expiry has passed
    pub async fn validate(
        &self,
        presented: &str,
        expected: TokenKind,
    ) -> Result<ValidatedToken, AppError> {
        let (id, secret) = parse_wire_token(presented)?;
        let digest = hash_token(secret);

        let record = self
            .store
            .find_by_id_digest_kind(id, &digest, expected)
            .await?
            .ok_or(AuthError::InvalidToken)?;

        if record.is_expired_at(Utc::now()) {
            tracing::info!(token_id = record.id, kind = %expected, "Expired token presented");
            return Err(AuthError::TokenExpired.into());
        }

        Ok(ValidatedToken {
            record,
            plaintext: secret.to_string(),
        })
    }

    /// Record that `record` was just used. Failures are logged and swallowed.
    pub async fn touch(&self, record: &PersonalAccessToken) {
        if let Err(e) = self
            .store
            .update_fields(record, TokenUpdate::touch(Utc::now()))
            .await
        {
            tracing::warn!(token_id = record.id, error = %e, "Failed to update token last_used_at");
        }
    }
}
