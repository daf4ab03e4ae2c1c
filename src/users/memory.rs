//! In-memory `UserRepository` that enforces the same uniqueness rules as the
//! `users` table.

use std::sync::{
    atomic::{AtomicUsize, Ordering},
    Mutex,
};

use async_trait::async_trait;
use time::OffsetDateTime;
use uuid::Uuid;

use super::{
    repo::UserRepository,
    repo_types::{NewUser, User, UserChanges, UserFilters},
};
use crate::db::{Page, StoreError};

#[derive(Default)]
pub struct MemoryUserRepository {
    // insertion order; newest last
    rows: Mutex<Vec<User>>,
    writes: AtomicUsize,
}

impl MemoryUserRepository {
    pub fn write_count(&self) -> usize {
        self.writes.load(Ordering::SeqCst)
    }

    pub fn row_count(&self) -> usize {
        self.rows.lock().unwrap().len()
    }

    fn newest_first(&self, filters: UserFilters) -> Vec<User> {
        let rows = self.rows.lock().unwrap();
        rows.iter().rev().filter(|u| filters.matches(u)).cloned().collect()
    }
}

#[async_trait]
impl UserRepository for MemoryUserRepository {
    async fn find_by_id(&self, id: Uuid) -> Result<Option<User>, StoreError> {
        Ok(self.rows.lock().unwrap().iter().find(|u| u.id == id).cloned())
    }

    async fn find_by_external_id(&self, external_id: &str) -> Result<Option<User>, StoreError> {
        let rows = self.rows.lock().unwrap();
        Ok(rows.iter().find(|u| u.external_id == external_id).cloned())
    }

    async fn find_by_email(&self, email: &str) -> Result<Option<User>, StoreError> {
        Ok(self.rows.lock().unwrap().iter().find(|u| u.email == email).cloned())
    }

    async fn find_all(&self, filters: UserFilters, page: Page) -> Result<Vec<User>, StoreError> {
        Ok(self
            .newest_first(filters)
            .into_iter()
            .skip(page.offset.max(0) as usize)
            .take(page.limit.max(0) as usize)
            .collect())
    }

    async fn count(&self, filters: UserFilters) -> Result<i64, StoreError> {
        Ok(self.newest_first(filters).len() as i64)
    }

    async fn create(&self, user: NewUser) -> Result<User, StoreError> {
        let mut rows = self.rows.lock().unwrap();
        if rows.iter().any(|u| u.external_id == user.external_id) {
            return Err(StoreError::UniqueViolation("users_external_id_key".into()));
        }
        if rows.iter().any(|u| u.email == user.email) {
            return Err(StoreError::UniqueViolation("users_email_key".into()));
        }

        let now = OffsetDateTime::now_utc();
        let stored = User {
            id: Uuid::new_v4(),
            external_id: user.external_id,
            email: user.email,
            first_name: user.first_name,
            last_name: user.last_name,
            profile_picture: user.profile_picture,
            is_active: user.is_active.unwrap_or(true),
            created_at: now,
            updated_at: now,
        };
        rows.push(stored.clone());
        self.writes.fetch_add(1, Ordering::SeqCst);
        Ok(stored)
    }

    async fn update(&self, id: Uuid, changes: UserChanges) -> Result<Option<User>, StoreError> {
        if changes.is_empty() {
            return Err(StoreError::EmptyChangeset);
        }
        let mut rows = self.rows.lock().unwrap();
        self.writes.fetch_add(1, Ordering::SeqCst);
        let Some(user) = rows.iter_mut().find(|u| u.id == id) else {
            return Ok(None);
        };

        if let Some(v) = changes.first_name {
            user.first_name = Some(v);
        }
        if let Some(v) = changes.last_name {
            user.last_name = Some(v);
        }
        if let Some(v) = changes.profile_picture {
            user.profile_picture = Some(v);
        }
        if let Some(v) = changes.is_active {
            user.is_active = v;
        }
        user.updated_at = OffsetDateTime::now_utc();
        Ok(Some(user.clone()))
    }

    async fn delete(&self, id: Uuid) -> Result<Option<User>, StoreError> {
        let mut rows = self.rows.lock().unwrap();
        self.writes.fetch_add(1, Ordering::SeqCst);
        let idx = rows.iter().position(|u| u.id == id);
        Ok(idx.map(|i| rows.remove(i)))
    }
}
