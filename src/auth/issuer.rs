/// Token Issuance
///
/// Creates refresh tokens and the access tokens linked to them. Each call
/// generates a fresh secret, persists its digest and only then renders the
/// wire token; a failed insert discards the secret.

use chrono::{Duration, Utc};
use std::fmt;
use std::sync::Arc;

use crate::auth::token::{format_wire_token, generate_secure_token};
use crate::configuration::AuthSettings;
use crate::error::AppError;
use crate::models::{NewPersonalAccessToken, PersonalAccessToken, TokenKind};
use crate::store::TokenStore;

/// A persisted record together with the wire token handed to the client
pub struct IssuedToken {
    pub record: PersonalAccessToken,
    pub wire_token: String,
}

impl fmt::Debug for IssuedToken {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("IssuedToken")
            .field("record", &self.record)
            .field("wire_token", &"[redacted]")
            .finish()
    }
}

/// A refresh token and the access token it spawned
#[derive(Debug)]
pub struct TokenPair {
    pub refresh: IssuedToken,
    pub access: IssuedToken,
}

#[derive(Clone)]
pub struct TokenIssuer {
    store: Arc<dyn TokenStore>,
    access_ttl: Duration,
    refresh_ttl: Duration,
    secret_bytes: usize,
}

impl TokenIssuer {
    pub fn new(store: Arc<dyn TokenStore>, settings: &AuthSettings) -> Self {
        Self {
            store,
            access_ttl: Duration::seconds(settings.access_token_expiry),
            refresh_ttl: Duration::seconds(settings.refresh_token_expiry),
            secret_bytes: settings.secret_bytes,
        }
    }

    /// Issue a long-lived refresh token; it never has a parent.
    pub async fn issue_refresh_token(&self, subject_id: i64) -> Result<IssuedToken, AppError> {
        let secret = generate_secure_token(self.secret_bytes)?;
        let expires_at = Utc::now() + self.refresh_ttl;

        let record = self
            .store
            .create(NewPersonalAccessToken::refresh(subject_id, secret.digest, expires_at))
            .await
            .map_err(|e| {
                tracing::error!(user_id = subject_id, error = %e, "Failed to persist refresh token");
                AppError::TokenCreation(e.to_string())
            })?;

        tracing::debug!(user_id = subject_id, token_id = record.id, "Refresh token issued");

        let wire_token = format_wire_token(record.id, &secret.plaintext);
        Ok(IssuedToken { record, wire_token })
    }

    /// Issue a short-lived access token parented to `parent`.
    ///
    /// # Errors
    /// `parent` must be a refresh token belonging to `subject_id`.
    pub async fn issue_access_token(
        &self,
        subject_id: i64,
        parent: &PersonalAccessToken,
    ) -> Result<IssuedToken, AppError> {
        if parent.kind != TokenKind::RefreshToken || parent.subject_id != subject_id {
            return Err(AppError::Internal(format!(
                "token {} cannot parent an access token for user {}",
                parent.id, subject_id
            )));
        }

        let secret = generate_secure_token(self.secret_bytes)?;
        let expires_at = Utc::now() + self.access_ttl;

        let record = self
            .store
            .create(NewPersonalAccessToken::access(
                subject_id,
                parent.id,
                secret.digest,
                expires_at,
            ))
            .await
            .map_err(|e| {
                tracing::error!(user_id = subject_id, error = %e, "Failed to persist access token");
                AppError::TokenCreation(e.to_string())
            })?;

        tracing::debug!(
            user_id = subject_id,
            token_id = record.id,
            parent_id = parent.id,
            "Access token issued"
        );

        let wire_token = format_wire_token(record.id, &secret.plaintext);
        Ok(IssuedToken { record, wire_token })
    }

    /// Refresh token first, then the access token linked to it.
    pub async fn issue_pair(&self, subject_id: i64) -> Result<TokenPair, AppError> {
        let refresh = self.issue_refresh_token(subject_id).await?;
        let access = self.issue_access_token(subject_id, &refresh.record).await?;
        Ok(TokenPair { refresh, access })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::auth::token::{hash_token, parse_wire_token};
    use crate::error::StoreError;
    use crate::models::TokenUpdate;
    use crate::store::InMemoryTokenStore;
    use async_trait::async_trait;

    struct FailingTokenStore;

    #[async_trait]
    impl TokenStore for FailingTokenStore {
        async fn create(
            &self,
            _token: NewPersonalAccessToken,
        ) -> Result<PersonalAccessToken, StoreError> {
            Err(StoreError::Connection("connection reset".to_string()))
        }

        async fn find_by_id_digest_kind(
            &self,
            _id: i64,
            _token_hash: &str,
            _kind: TokenKind,
        ) -> Result<Option<PersonalAccessToken>, StoreError> {
            Ok(None)
        }

        async fn delete(&self, _token: &PersonalAccessToken) -> Result<(), StoreError> {
            Ok(())
        }

        async fn delete_all_by_subject(&self, _subject_id: i64) -> Result<u64, StoreError> {
            Ok(0)
        }

        async fn update_fields(
            &self,
            _token: &PersonalAccessToken,
            _update: TokenUpdate,
        ) -> Result<(), StoreError> {
            Ok(())
        }
    }

    fn issuer(store: Arc<dyn TokenStore>) -> TokenIssuer {
        TokenIssuer::new(store, &AuthSettings::default())
    }

    #[tokio::test]
    async fn test_refresh_token_has_no_parent_and_lasts_seven_days() {
        let issuer = issuer(Arc::new(InMemoryTokenStore::new()));
        let before = Utc::now();

        let issued = issuer.issue_refresh_token(5).await.expect("issued");

        assert_eq!(issued.record.kind, TokenKind::RefreshToken);
        assert_eq!(issued.record.subject_id, 5);
        assert_eq!(issued.record.parent_id, None);
        let expires_at = issued.record.expires_at.expect("expiry set");
        assert!(expires_at >= before + Duration::days(7));
        assert!(expires_at <= Utc::now() + Duration::days(7));
    }

    #[tokio::test]
    async fn test_access_token_links_to_refresh_token() {
        let issuer = issuer(Arc::new(InMemoryTokenStore::new()));

        let pair = issuer.issue_pair(5).await.expect("issued");

        assert_eq!(pair.access.record.kind, TokenKind::AuthToken);
        assert_eq!(pair.access.record.parent_id, Some(pair.refresh.record.id));
        let expires_at = pair.access.record.expires_at.expect("expiry set");
        assert!(expires_at <= Utc::now() + Duration::hours(1));
        assert!(expires_at > Utc::now() + Duration::minutes(59));
    }

    #[tokio::test]
    async fn test_wire_token_carries_id_and_secret() {
        let issuer = issuer(Arc::new(InMemoryTokenStore::new()));

        let issued = issuer.issue_refresh_token(1).await.expect("issued");
        let (id, secret) = parse_wire_token(&issued.wire_token).expect("well formed");

        assert_eq!(id, issued.record.id);
        assert_eq!(secret.len(), 40);
        assert_eq!(hash_token(secret), issued.record.token_hash);
    }

    #[tokio::test]
    async fn test_access_token_requires_refresh_parent() {
        let issuer = issuer(Arc::new(InMemoryTokenStore::new()));
        let pair = issuer.issue_pair(1).await.expect("issued");

        let result = issuer.issue_access_token(1, &pair.access.record).await;
        assert!(matches!(result, Err(AppError::Internal(_))));

        let result = issuer.issue_access_token(2, &pair.refresh.record).await;
        assert!(matches!(result, Err(AppError::Internal(_))));
    }

    #[tokio::test]
    async fn test_persistence_failure_is_token_creation_error() {
        let issuer = issuer(Arc::new(FailingTokenStore));

        let result = issuer.issue_refresh_token(1).await;
        assert!(matches!(result, Err(AppError::TokenCreation(_))));
    }
}
