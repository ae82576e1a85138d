//! Storage seams for the auth core.
//!
//! Every operation is a single stateless statement against the backing store;
//! nothing is cached in process. Handles are built once at startup and shared
//! behind `Arc<dyn ...>`.

use async_trait::async_trait;

use crate::error::StoreError;
use crate::models::{
    NewPersonalAccessToken, NewUser, PersonalAccessToken, TokenKind, TokenUpdate, User,
    UserUpdate,
};

mod memory;
mod postgres;

pub use memory::{InMemoryTokenStore, InMemoryUserStore};
pub use postgres::{PgTokenStore, PgUserStore};

#[async_trait]
pub trait TokenStore: Send + Sync {
    /// Insert a record; the store assigns `id` and the bookkeeping columns.
    async fn create(&self, token: NewPersonalAccessToken)
        -> Result<PersonalAccessToken, StoreError>;

    /// Primary-key lookup that only matches when digest and kind agree too.
    async fn find_by_id_digest_kind(
        &self,
        id: i64,
        token_hash: &str,
        kind: TokenKind,
    ) -> Result<Option<PersonalAccessToken>, StoreError>;

    /// Delete one record. Children of a deleted refresh token are orphaned,
    /// not deleted. Succeeds when the record is already gone.
    async fn delete(&self, token: &PersonalAccessToken) -> Result<(), StoreError>;

    /// Delete every record owned by `subject_id`, returning how many went.
    async fn delete_all_by_subject(&self, subject_id: i64) -> Result<u64, StoreError>;

    async fn update_fields(
        &self,
        token: &PersonalAccessToken,
        update: TokenUpdate,
    ) -> Result<(), StoreError>;
}

#[async_trait]
pub trait UserStore: Send + Sync {
    async fn find_by_email(&self, email: &str) -> Result<Option<User>, StoreError>;

    async fn find_by_id(&self, id: i64) -> Result<Option<User>, StoreError>;

    async fn create(&self, user: NewUser) -> Result<User, StoreError>;

    async fn update_password_hash(&self, id: i64, password_hash: &str) -> Result<(), StoreError>;

    async fn update_fields(&self, id: i64, update: UserUpdate) -> Result<(), StoreError>;

    async fn count(&self) -> Result<i64, StoreError>;

    /// One page of users ordered by id; `page` starts at 1.
    async fn find_page(&self, page: u32, per_page: u32) -> Result<Vec<User>, StoreError>;
}

/// Row offset of the first record on `page`.
pub(crate) fn page_offset(page: u32, per_page: u32) -> i64 {
    i64::from(page.saturating_sub(1)) * i64::from(per_page)
}
