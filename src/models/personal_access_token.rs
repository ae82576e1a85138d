/// Personal Access Token records
///
/// Both kinds of credential live in one table. An `auth_token` always points
/// at the `refresh_token` that spawned it through `parent_id`; a
/// `refresh_token` never has a parent. The plaintext secret is never part of
/// a record, only its SHA-256 digest.

use chrono::{DateTime, Utc};
use serde::Serialize;
use std::fmt;
use std::str::FromStr;

/// Owner type stored alongside every token (shared with the Laravel schema).
pub const TOKENABLE_TYPE: &str = "App\\Models\\User";

/// Tokens are never scoped; every record carries the wildcard ability list.
pub const WILDCARD_ABILITIES: &str = r#"["*"]"#;

/// Discriminator stored in the `name` column
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum TokenKind {
    RefreshToken,
    AuthToken,
}

impl TokenKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            TokenKind::RefreshToken => "refresh_token",
            TokenKind::AuthToken => "auth_token",
        }
    }
}

impl fmt::Display for TokenKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for TokenKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "refresh_token" => Ok(TokenKind::RefreshToken),
            "auth_token" => Ok(TokenKind::AuthToken),
            other => Err(format!("unknown token kind: {}", other)),
        }
    }
}

/// A stored token record
#[derive(Debug, Clone, Serialize)]
pub struct PersonalAccessToken {
    pub id: i64,
    pub tokenable_type: String,
    /// Owning user
    pub subject_id: i64,
    pub kind: TokenKind,
    /// Hex SHA-256 of the plaintext secret
    #[serde(skip_serializing)]
    pub token_hash: String,
    pub abilities: String,
    pub parent_id: Option<i64>,
    pub last_used_at: Option<DateTime<Utc>>,
    pub expires_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl PersonalAccessToken {
    /// A record whose expiry lies strictly before `now` can never validate again.
    pub fn is_expired_at(&self, now: DateTime<Utc>) -> bool {
        matches!(self.expires_at, Some(expires_at) if expires_at < now)
    }
}

/// Insert payload for [`crate::store::TokenStore::create`].
///
/// Only constructible through [`NewPersonalAccessToken::refresh`] and
/// [`NewPersonalAccessToken::access`], so the parent linkage always matches
/// the kind.
#[derive(Debug, Clone)]
pub struct NewPersonalAccessToken {
    subject_id: i64,
    kind: TokenKind,
    token_hash: String,
    parent_id: Option<i64>,
    expires_at: DateTime<Utc>,
}

impl NewPersonalAccessToken {
    pub fn refresh(subject_id: i64, token_hash: String, expires_at: DateTime<Utc>) -> Self {
        Self {
            subject_id,
            kind: TokenKind::RefreshToken,
            token_hash,
            parent_id: None,
            expires_at,
        }
    }

    pub fn access(
        subject_id: i64,
        parent_id: i64,
        token_hash: String,
        expires_at: DateTime<Utc>,
    ) -> Self {
        Self {
            subject_id,
            kind: TokenKind::AuthToken,
            token_hash,
            parent_id: Some(parent_id),
            expires_at,
        }
    }

    pub fn subject_id(&self) -> i64 {
        self.subject_id
    }

    pub fn kind(&self) -> TokenKind {
        self.kind
    }

    pub fn token_hash(&self) -> &str {
        &self.token_hash
    }

    pub fn parent_id(&self) -> Option<i64> {
        self.parent_id
    }

    pub fn expires_at(&self) -> DateTime<Utc> {
        self.expires_at
    }
}

/// Partial update of a token record; `None` leaves the column untouched.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TokenUpdate {
    pub last_used_at: Option<DateTime<Utc>>,
    pub expires_at: Option<DateTime<Utc>>,
}

impl TokenUpdate {
    pub fn touch(now: DateTime<Utc>) -> Self {
        Self {
            last_used_at: Some(now),
            ..Self::default()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;

    fn record(expires_at: Option<DateTime<Utc>>) -> PersonalAccessToken {
        let now = Utc::now();
        PersonalAccessToken {
            id: 1,
            tokenable_type: TOKENABLE_TYPE.to_string(),
            subject_id: 7,
            kind: TokenKind::AuthToken,
            token_hash: "ab".repeat(32),
            abilities: WILDCARD_ABILITIES.to_string(),
            parent_id: Some(0),
            last_used_at: None,
            expires_at,
            created_at: now,
            updated_at: now,
        }
    }

    #[test]
    fn test_kind_round_trips_through_column_value() {
        for kind in [TokenKind::RefreshToken, TokenKind::AuthToken] {
            assert_eq!(kind.as_str().parse::<TokenKind>(), Ok(kind));
        }
        assert!("personal_token".parse::<TokenKind>().is_err());
    }

    #[test]
    fn test_expiry_check() {
        let now = Utc::now();
        assert!(!record(None).is_expired_at(now));
        assert!(!record(Some(now + Duration::hours(1))).is_expired_at(now));
        assert!(record(Some(now - Duration::seconds(1))).is_expired_at(now));
    }

    #[test]
    fn test_constructors_fix_parent_linkage() {
        let expires_at = Utc::now();
        let refresh = NewPersonalAccessToken::refresh(3, "h".to_string(), expires_at);
        assert_eq!(refresh.kind(), TokenKind::RefreshToken);
        assert_eq!(refresh.parent_id(), None);

        let access = NewPersonalAccessToken::access(3, 11, "h".to_string(), expires_at);
        assert_eq!(access.kind(), TokenKind::AuthToken);
        assert_eq!(access.parent_id(), Some(11));
    }

    #[test]
    fn test_digest_is_not_serialized() {
        let json = serde_json::to_value(record(None)).expect("serializable");
        assert!(json.get("token_hash").is_none());
        assert_eq!(json["kind"], "auth_token");
    }
}
