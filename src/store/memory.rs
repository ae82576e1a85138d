/// In-process stores
///
/// Mirror the Postgres schema's constraints (serial ids, unique token digest,
/// unique email, `ON DELETE SET NULL` on `parent_id`) so the auth core behaves
/// the same against either backend. Backs the unit and HTTP test suites.

use async_trait::async_trait;
use chrono::Utc;
use parking_lot::Mutex;
use std::collections::BTreeMap;

use super::{page_offset, TokenStore, UserStore};
use crate::error::StoreError;
use crate::models::{
    NewPersonalAccessToken, NewUser, PersonalAccessToken, TokenKind, TokenUpdate, User,
    UserUpdate, TOKENABLE_TYPE, WILDCARD_ABILITIES,
};

struct Table<T> {
    next_id: i64,
    rows: BTreeMap<i64, T>,
}

impl<T> Default for Table<T> {
    fn default() -> Self {
        Self {
            next_id: 1,
            rows: BTreeMap::new(),
        }
    }
}

impl<T> Table<T> {
    fn allocate_id(&mut self) -> i64 {
        let id = self.next_id;
        self.next_id += 1;
        id
    }
}

#[derive(Default)]
pub struct InMemoryTokenStore {
    table: Mutex<Table<PersonalAccessToken>>,
}

impl InMemoryTokenStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of live records
    pub fn len(&self) -> usize {
        self.table.lock().rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Snapshot of one record regardless of digest or kind.
    pub fn get(&self, id: i64) -> Option<PersonalAccessToken> {
        self.table.lock().rows.get(&id).cloned()
    }
}

#[async_trait]
impl TokenStore for InMemoryTokenStore {
    async fn create(
        &self,
        token: NewPersonalAccessToken,
    ) -> Result<PersonalAccessToken, StoreError> {
        let mut table = self.table.lock();

        if table
            .rows
            .values()
            .any(|existing| existing.token_hash == token.token_hash())
        {
            return Err(StoreError::UniqueViolation(
                "personal_access_tokens.token".to_string(),
            ));
        }

        let now = Utc::now();
        let id = table.allocate_id();
        let record = PersonalAccessToken {
            id,
            tokenable_type: TOKENABLE_TYPE.to_string(),
            subject_id: token.subject_id(),
            kind: token.kind(),
            token_hash: token.token_hash().to_string(),
            abilities: WILDCARD_ABILITIES.to_string(),
            parent_id: token.parent_id(),
            last_used_at: None,
            expires_at: Some(token.expires_at()),
            created_at: now,
            updated_at: now,
        };
        table.rows.insert(id, record.clone());

        Ok(record)
    }

    async fn find_by_id_digest_kind(
        &self,
        id: i64,
        token_hash: &str,
        kind: TokenKind,
    ) -> Result<Option<PersonalAccessToken>, StoreError> {
        let table = self.table.lock();
        Ok(table
            .rows
            .get(&id)
            .filter(|record| record.token_hash == token_hash && record.kind == kind)
            .cloned())
    }

    async fn delete(&self, token: &PersonalAccessToken) -> Result<(), StoreError> {
        let mut table = self.table.lock();
        if table.rows.remove(&token.id).is_some() {
            for child in table.rows.values_mut() {
                if child.parent_id == Some(token.id) {
                    child.parent_id = None;
                }
            }
        }
        Ok(())
    }

    async fn delete_all_by_subject(&self, subject_id: i64) -> Result<u64, StoreError> {
        let mut table = self.table.lock();
        let before = table.rows.len();
        table.rows.retain(|_, record| record.subject_id != subject_id);
        Ok((before - table.rows.len()) as u64)
    }

    async fn update_fields(
        &self,
        token: &PersonalAccessToken,
        update: TokenUpdate,
    ) -> Result<(), StoreError> {
        let mut table = self.table.lock();
        if let Some(record) = table.rows.get_mut(&token.id) {
            if let Some(last_used_at) = update.last_used_at {
                record.last_used_at = Some(last_used_at);
            }
            if let Some(expires_at) = update.expires_at {
                record.expires_at = Some(expires_at);
            }
            record.updated_at = Utc::now();
        }
        Ok(())
    }
}

#[derive(Default)]
pub struct InMemoryUserStore {
    table: Mutex<Table<User>>,
}

impl InMemoryUserStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl UserStore for InMemoryUserStore {
    async fn find_by_email(&self, email: &str) -> Result<Option<User>, StoreError> {
        let table = self.table.lock();
        Ok(table.rows.values().find(|user| user.email == email).cloned())
    }

    async fn find_by_id(&self, id: i64) -> Result<Option<User>, StoreError> {
        Ok(self.table.lock().rows.get(&id).cloned())
    }

    async fn create(&self, user: NewUser) -> Result<User, StoreError> {
        let mut table = self.table.lock();

        if table.rows.values().any(|existing| existing.email == user.email) {
            return Err(StoreError::UniqueViolation("users.email".to_string()));
        }

        let now = Utc::now();
        let id = table.allocate_id();
        let created = User {
            id,
            code: user.code,
            name: user.name,
            email: user.email,
            password_hash: user.password_hash,
            has_allow_notification: Some(false),
            notification_token: None,
            created_at: now,
            updated_at: now,
        };
        table.rows.insert(id, created.clone());

        Ok(created)
    }

    async fn update_password_hash(&self, id: i64, password_hash: &str) -> Result<(), StoreError> {
        let mut table = self.table.lock();
        if let Some(user) = table.rows.get_mut(&id) {
            user.password_hash = password_hash.to_string();
            user.updated_at = Utc::now();
        }
        Ok(())
    }

    async fn update_fields(&self, id: i64, update: UserUpdate) -> Result<(), StoreError> {
        let mut table = self.table.lock();

        if let Some(email) = &update.email {
            if table
                .rows
                .values()
                .any(|other| other.id != id && &other.email == email)
            {
                return Err(StoreError::UniqueViolation("users.email".to_string()));
            }
        }

        if let Some(user) = table.rows.get_mut(&id) {
            if let Some(name) = update.name {
                user.name = name;
            }
            if let Some(email) = update.email {
                user.email = email;
            }
            user.updated_at = Utc::now();
        }
        Ok(())
    }

    async fn count(&self) -> Result<i64, StoreError> {
        Ok(self.table.lock().rows.len() as i64)
    }

    async fn find_page(&self, page: u32, per_page: u32) -> Result<Vec<User>, StoreError> {
        let offset = usize::try_from(page_offset(page, per_page))
            .map_err(|e| StoreError::Query(e.to_string()))?;
        let table = self.table.lock();
        Ok(table
            .rows
            .values()
            .skip(offset)
            .take(per_page as usize)
            .cloned()
            .collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;

    fn new_refresh(subject_id: i64, hash: &str) -> NewPersonalAccessToken {
        NewPersonalAccessToken::refresh(subject_id, hash.to_string(), Utc::now() + Duration::days(7))
    }

    #[tokio::test]
    async fn test_ids_increase_monotonically() {
        let store = InMemoryTokenStore::new();
        let first = store.create(new_refresh(1, "a")).await.unwrap();
        let second = store.create(new_refresh(1, "b")).await.unwrap();

        assert!(second.id > first.id);
        assert_eq!(first.abilities, WILDCARD_ABILITIES);
        assert_eq!(first.tokenable_type, TOKENABLE_TYPE);
    }

    #[tokio::test]
    async fn test_duplicate_digest_is_rejected() {
        let store = InMemoryTokenStore::new();
        store.create(new_refresh(1, "same")).await.unwrap();

        let result = store.create(new_refresh(2, "same")).await;
        assert!(matches!(result, Err(StoreError::UniqueViolation(_))));
    }

    #[tokio::test]
    async fn test_lookup_requires_full_triple() {
        let store = InMemoryTokenStore::new();
        let record = store.create(new_refresh(1, "digest")).await.unwrap();

        let found = store
            .find_by_id_digest_kind(record.id, "digest", TokenKind::RefreshToken)
            .await
            .unwrap();
        assert!(found.is_some());

        for (id, hash, kind) in [
            (record.id + 1, "digest", TokenKind::RefreshToken),
            (record.id, "other", TokenKind::RefreshToken),
            (record.id, "digest", TokenKind::AuthToken),
        ] {
            let found = store.find_by_id_digest_kind(id, hash, kind).await.unwrap();
            assert!(found.is_none());
        }
    }

    #[tokio::test]
    async fn test_deleting_parent_orphans_children() {
        let store = InMemoryTokenStore::new();
        let parent = store.create(new_refresh(1, "parent")).await.unwrap();
        let child = store
            .create(NewPersonalAccessToken::access(
                1,
                parent.id,
                "child".to_string(),
                Utc::now() + Duration::hours(1),
            ))
            .await
            .unwrap();

        store.delete(&parent).await.unwrap();
        // Idempotent
        store.delete(&parent).await.unwrap();

        let orphan = store.get(child.id).expect("child must survive");
        assert_eq!(orphan.parent_id, None);
    }

    #[tokio::test]
    async fn test_delete_all_by_subject_only_touches_subject() {
        let store = InMemoryTokenStore::new();
        store.create(new_refresh(1, "a")).await.unwrap();
        store.create(new_refresh(1, "b")).await.unwrap();
        store.create(new_refresh(2, "c")).await.unwrap();

        assert_eq!(store.delete_all_by_subject(1).await.unwrap(), 2);
        assert_eq!(store.delete_all_by_subject(1).await.unwrap(), 0);
        assert_eq!(store.len(), 1);
    }

    #[tokio::test]
    async fn test_user_pages() {
        let store = InMemoryUserStore::new();
        for i in 0..5 {
            store
                .create(NewUser {
                    code: None,
                    name: format!("User {}", i),
                    email: format!("user{}@example.com", i),
                    password_hash: "hash".to_string(),
                })
                .await
                .unwrap();
        }

        assert_eq!(store.count().await.unwrap(), 5);
        assert_eq!(store.find_page(1, 2).await.unwrap().len(), 2);
        assert_eq!(store.find_page(3, 2).await.unwrap().len(), 1);
        assert!(store.find_page(4, 2).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_user_email_stays_unique_on_update() {
        let store = InMemoryUserStore::new();
        let alice = store
            .create(NewUser {
                code: None,
                name: "Alice".to_string(),
                email: "alice@example.com".to_string(),
                password_hash: "hash".to_string(),
            })
            .await
            .unwrap();
        store
            .create(NewUser {
                code: None,
                name: "Bob".to_string(),
                email: "bob@example.com".to_string(),
                password_hash: "hash".to_string(),
            })
            .await
            .unwrap();

        let result = store
            .update_fields(
                alice.id,
                UserUpdate {
                    name: None,
                    email: Some("bob@example.com".to_string()),
                },
            )
            .await;
        assert!(matches!(result, Err(StoreError::UniqueViolation(_))));
    }
}
