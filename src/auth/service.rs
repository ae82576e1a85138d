/// Authentication Service
///
/// Orchestrates the authentication flows over plain domain values. Cookies,
/// status codes and body parsing belong to the route layer.
///
/// # Security Notes
/// - Login fails the same way for an unknown email and a wrong password, and
///   spends one bcrypt verification either way
/// - A password change deletes every token the user holds before issuing
///   the replacement pair
/// - Refresh does not rotate the refresh token; it only mints a new access
///   token under it

use std::sync::Arc;

use crate::auth::issuer::{IssuedToken, TokenIssuer, TokenPair};
use crate::auth::password::PasswordHasher;
use crate::auth::validator::TokenValidator;
use crate::configuration::AuthSettings;
use crate::error::{AppError, AuthError, StoreError, ValidationError};
use crate::models::{PersonalAccessToken, TokenKind, User, UserUpdate};
use crate::store::{TokenStore, UserStore};

#[derive(Clone)]
pub struct AuthService {
    users: Arc<dyn UserStore>,
    tokens: Arc<dyn TokenStore>,
    issuer: TokenIssuer,
    validator: TokenValidator,
    hasher: PasswordHasher,
}

impl AuthService {
    pub fn new(
        users: Arc<dyn UserStore>,
        tokens: Arc<dyn TokenStore>,
        hasher: PasswordHasher,
        settings: &AuthSettings,
    ) -> Self {
        Self {
            issuer: TokenIssuer::new(tokens.clone(), settings),
            validator: TokenValidator::new(tokens.clone()),
            users,
            tokens,
            hasher,
        }
    }

    pub fn validator(&self) -> &TokenValidator {
        &self.validator
    }

    /// Check credentials and issue a linked refresh + access pair.
    pub async fn login(&self, email: &str, password: &str) -> Result<TokenPair, AppError> {
        let user = match self.users.find_by_email(email).await? {
            Some(user) => user,
            None => {
                self.hasher.verify_dummy(password).await?;
                tracing::warn!("Login attempt for unknown email");
                return Err(AuthError::InvalidCredentials.into());
            }
        };

        if !self.password_matches(&user, password).await {
            tracing::warn!(user_id = user.id, "Login attempt with wrong password");
            return Err(AuthError::InvalidCredentials.into());
        }

        let pair = self.issuer.issue_pair(user.id).await?;
        tracing::info!(user_id = user.id, "User logged in");
        Ok(pair)
    }

    /// Replace the password, revoke every outstanding token of the user and
    /// issue a fresh pair.
    pub async fn change_password(
        &self,
        user_id: i64,
        current_password: &str,
        new_password: &str,
        confirmation: &str,
    ) -> Result<TokenPair, AppError> {
        if new_password != confirmation {
            return Err(ValidationError::PasswordMismatch.into());
        }

        let user = self
            .users
            .find_by_id(user_id)
            .await?
            .ok_or(AuthError::InvalidToken)?;

        if !self.password_matches(&user, current_password).await {
            return Err(AuthError::CurrentPasswordIncorrect.into());
        }

        let password_hash = self.hasher.hash(new_password).await?;
        self.users
            .update_password_hash(user.id, &password_hash)
            .await?;

        let revoked = self.tokens.delete_all_by_subject(user.id).await?;
        tracing::info!(user_id = user.id, revoked, "Password changed, previous tokens revoked");

        self.issuer.issue_pair(user.id).await
    }

    /// Update name and email. An empty or missing email keeps the current one.
    pub async fn update_profile(
        &self,
        user: &User,
        name: &str,
        email: Option<&str>,
    ) -> Result<(), AppError> {
        let email = match email {
            Some(email) if !email.is_empty() => email,
            _ => user.email.as_str(),
        };

        if email != user.email {
            if let Some(other) = self.users.find_by_email(email).await? {
                if other.id != user.id {
                    return Err(AppError::EmailAlreadyUsed);
                }
            }
        }

        let update = UserUpdate {
            name: Some(name.to_string()),
            email: Some(email.to_string()),
        };

        match self.users.update_fields(user.id, update).await {
            Ok(()) => Ok(()),
            Err(StoreError::UniqueViolation(_)) => Err(AppError::EmailAlreadyUsed),
            Err(e) => Err(e.into()),
        }
    }

    /// Mint a new access token under a valid refresh token.
    ///
    /// The returned pair carries the presented refresh token unchanged.
    pub async fn refresh(&self, refresh_token: &str) -> Result<TokenPair, AppError> {
        let validated = self
            .validator
            .validate(refresh_token, TokenKind::RefreshToken)
            .await?;
        self.validator.touch(&validated.record).await;

        let subject_id = validated.record.subject_id;
        if self.users.find_by_id(subject_id).await?.is_none() {
            tracing::warn!(user_id = subject_id, "Refresh token for missing user");
            return Err(AuthError::InvalidToken.into());
        }

        let access = self
            .issuer
            .issue_access_token(subject_id, &validated.record)
            .await?;

        tracing::info!(
            user_id = subject_id,
            token_id = access.record.id,
            "Access token refreshed"
        );

        Ok(TokenPair {
            refresh: IssuedToken {
                record: validated.record,
                wire_token: refresh_token.to_string(),
            },
            access,
        })
    }

    /// Revoke the single token that authenticated the current request.
    pub async fn logout(&self, token: &PersonalAccessToken) -> Result<(), AppError> {
        self.tokens.delete(token).await?;
        tracing::info!(user_id = token.subject_id, token_id = token.id, "Token revoked");
        Ok(())
    }

    /// A stored hash bcrypt cannot parse counts as a mismatch, so a corrupt
    /// row never looks different from a wrong password.
    async fn password_matches(&self, user: &User, password: &str) -> bool {
        match self.hasher.verify(password, &user.password_hash).await {
            Ok(matches) => matches,
            Err(e) => {
                tracing::error!(user_id = user.id, error = %e, "Stored password hash is unusable");
                false
            }
        }
    }
}
