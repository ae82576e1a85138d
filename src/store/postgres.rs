/// Postgres-backed stores
///
/// Queries are plain runtime `sqlx::query*` calls against the shared pool.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::PgPool;

use super::{page_offset, TokenStore, UserStore};
use crate::error::StoreError;
use crate::models::{
    NewPersonalAccessToken, NewUser, PersonalAccessToken, TokenKind, TokenUpdate, User,
    UserUpdate, TOKENABLE_TYPE, WILDCARD_ABILITIES,
};

const TOKEN_COLUMNS: &str = "id, tokenable_type, tokenable_id, name, token, abilities, \
     parent_id, last_used_at, expires_at, created_at, updated_at";

const USER_COLUMNS: &str = "id, code, name, email, password, has_allow_notification, \
     notification_token, created_at, updated_at";

#[derive(sqlx::FromRow)]
struct TokenRow {
    id: i64,
    tokenable_type: String,
    tokenable_id: i64,
    name: String,
    token: String,
    abilities: String,
    parent_id: Option<i64>,
    last_used_at: Option<DateTime<Utc>>,
    expires_at: Option<DateTime<Utc>>,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl TryFrom<TokenRow> for PersonalAccessToken {
    type Error = StoreError;

    fn try_from(row: TokenRow) -> Result<Self, Self::Error> {
        Ok(PersonalAccessToken {
            id: row.id,
            tokenable_type: row.tokenable_type,
            subject_id: row.tokenable_id,
            kind: row.name.parse::<TokenKind>().map_err(StoreError::Query)?,
            token_hash: row.token,
            abilities: row.abilities,
            parent_id: row.parent_id,
            last_used_at: row.last_used_at,
            expires_at: row.expires_at,
            created_at: row.created_at,
            updated_at: row.updated_at,
        })
    }
}

#[derive(Clone)]
pub struct PgTokenStore {
    pool: PgPool,
}

impl PgTokenStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl TokenStore for PgTokenStore {
    async fn create(
        &self,
        token: NewPersonalAccessToken,
    ) -> Result<PersonalAccessToken, StoreError> {
        let now = Utc::now();
        let row = sqlx::query_as::<_, TokenRow>(&format!(
            r#"
            INSERT INTO personal_access_tokens
                (tokenable_type, tokenable_id, name, token, abilities, parent_id,
                 expires_at, created_at, updated_at)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $8)
            RETURNING {}
            "#,
            TOKEN_COLUMNS
        ))
        .bind(TOKENABLE_TYPE)
        .bind(token.subject_id())
        .bind(token.kind().as_str())
        .bind(token.token_hash())
        .bind(WILDCARD_ABILITIES)
        .bind(token.parent_id())
        .bind(token.expires_at())
        .bind(now)
        .fetch_one(&self.pool)
        .await?;

        row.try_into()
    }

    async fn find_by_id_digest_kind(
        &self,
        id: i64,
        token_hash: &str,
        kind: TokenKind,
    ) -> Result<Option<PersonalAccessToken>, StoreError> {
        let row = sqlx::query_as::<_, TokenRow>(&format!(
            "SELECT {} FROM personal_access_tokens WHERE id = $1 AND token = $2 AND name = $3",
            TOKEN_COLUMNS
        ))
        .bind(id)
        .bind(token_hash)
        .bind(kind.as_str())
        .fetch_optional(&self.pool)
        .await?;

        row.map(PersonalAccessToken::try_from).transpose()
    }

    async fn delete(&self, token: &PersonalAccessToken) -> Result<(), StoreError> {
        sqlx::query("DELETE FROM personal_access_tokens WHERE id = $1")
            .bind(token.id)
            .execute(&self.pool)
            .await?;

        Ok(())
    }

    async fn delete_all_by_subject(&self, subject_id: i64) -> Result<u64, StoreError> {
        let result = sqlx::query(
            "DELETE FROM personal_access_tokens WHERE tokenable_type = $1 AND tokenable_id = $2",
        )
        .bind(TOKENABLE_TYPE)
        .bind(subject_id)
        .execute(&self.pool)
        .await?;

        Ok(result.rows_affected())
    }

    async fn update_fields(
        &self,
        token: &PersonalAccessToken,
        update: TokenUpdate,
    ) -> Result<(), StoreError> {
        sqlx::query(
            r#"
            UPDATE personal_access_tokens
            SET last_used_at = COALESCE($1, last_used_at),
                expires_at = COALESCE($2, expires_at),
                updated_at = $3
            WHERE id = $4
            "#,
        )
        .bind(update.last_used_at)
        .bind(update.expires_at)
        .bind(Utc::now())
        .bind(token.id)
        .execute(&self.pool)
        .await?;

        Ok(())
    }
}

#[derive(Clone)]
pub struct PgUserStore {
    pool: PgPool,
}

impl PgUserStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl UserStore for PgUserStore {
    async fn find_by_email(&self, email: &str) -> Result<Option<User>, StoreError> {
        let user = sqlx::query_as::<_, User>(&format!(
            "SELECT {} FROM users WHERE email = $1 AND deleted_at IS NULL",
            USER_COLUMNS
        ))
        .bind(email)
        .fetch_optional(&self.pool)
        .await?;

        Ok(user)
    }

    async fn find_by_id(&self, id: i64) -> Result<Option<User>, StoreError> {
        let user = sqlx::query_as::<_, User>(&format!(
            "SELECT {} FROM users WHERE id = $1 AND deleted_at IS NULL",
            USER_COLUMNS
        ))
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;

        Ok(user)
    }

    async fn create(&self, user: NewUser) -> Result<User, StoreError> {
        let now = Utc::now();
        let created = sqlx::query_as::<_, User>(&format!(
            r#"
            INSERT INTO users (code, name, email, password, created_at, updated_at)
            VALUES ($1, $2, $3, $4, $5, $5)
            RETURNING {}
            "#,
            USER_COLUMNS
        ))
        .bind(user.code)
        .bind(user.name)
        .bind(user.email)
        .bind(user.password_hash)
        .bind(now)
        .fetch_one(&self.pool)
        .await?;

        Ok(created)
    }

    async fn update_password_hash(&self, id: i64, password_hash: &str) -> Result<(), StoreError> {
        sqlx::query("UPDATE users SET password = $1, updated_at = $2 WHERE id = $3")
            .bind(password_hash)
            .bind(Utc::now())
            .bind(id)
            .execute(&self.pool)
            .await?;

        Ok(())
    }

    async fn update_fields(&self, id: i64, update: UserUpdate) -> Result<(), StoreError> {
        if update.is_empty() {
            return Ok(());
        }

        sqlx::query(
            r#"
            UPDATE users
            SET name = COALESCE($1, name),
                email = COALESCE($2, email),
                updated_at = $3
            WHERE id = $4
            "#,
        )
        .bind(update.name)
        .bind(update.email)
        .bind(Utc::now())
        .bind(id)
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    async fn count(&self) -> Result<i64, StoreError> {
        let total =
            sqlx::query_scalar::<_, i64>("SELECT COUNT(*) FROM users WHERE deleted_at IS NULL")
                .fetch_one(&self.pool)
                .await?;

        Ok(total)
    }

    async fn find_page(&self, page: u32, per_page: u32) -> Result<Vec<User>, StoreError> {
        let users = sqlx::query_as::<_, User>(&format!(
            "SELECT {} FROM users WHERE deleted_at IS NULL ORDER BY id LIMIT $1 OFFSET $2",
            USER_COLUMNS
        ))
        .bind(i64::from(per_page))
        .bind(page_offset(page, per_page))
        .fetch_all(&self.pool)
        .await?;

        Ok(users)
    }
}
