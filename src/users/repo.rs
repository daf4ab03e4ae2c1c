use async_trait::async_trait;
use sqlx::PgPool;
use uuid::Uuid;

use super::repo_types::{NewUser, User, UserChanges, UserColumn, UserFilters};
use crate::{
    auth::Claims,
    db::{Page, RecordStore, StoreError},
};

/// Persistence for users. Absence is reported as `Ok(None)`; deciding that
/// it is an error belongs to the service.
#[async_trait]
pub trait UserRepository: Send + Sync {
    async fn find_by_id(&self, id: Uuid) -> Result<Option<User>, StoreError>;
    async fn find_by_external_id(&self, external_id: &str) -> Result<Option<User>, StoreError>;
    async fn find_by_email(&self, email: &str) -> Result<Option<User>, StoreError>;
    async fn find_all(&self, filters: UserFilters, page: Page) -> Result<Vec<User>, StoreError>;
    async fn count(&self, filters: UserFilters) -> Result<i64, StoreError>;
    async fn create(&self, user: NewUser) -> Result<User, StoreError>;
    async fn update(&self, id: Uuid, changes: UserChanges) -> Result<Option<User>, StoreError>;
    async fn delete(&self, id: Uuid) -> Result<Option<User>, StoreError>;

    async fn create_from_identity(&self, claims: &Claims) -> Result<User, StoreError> {
        let user = identity_payload(claims)?;
        self.create(user).await
    }

    /// Updates only first/last name and picture. Nothing left after
    /// filtering is an error and no write happens.
    async fn update_profile(
        &self,
        id: Uuid,
        changes: UserChanges,
    ) -> Result<Option<User>, StoreError> {
        let allowed = changes.profile_fields();
        if allowed.is_empty() {
            return Err(StoreError::EmptyChangeset);
        }
        self.update(id, allowed).await
    }

    async fn list_active(&self, page: Page) -> Result<Vec<User>, StoreError> {
        self.find_all(UserFilters::active(), page).await
    }

    async fn set_active(&self, id: Uuid, active: bool) -> Result<Option<User>, StoreError> {
        let changes = UserChanges {
            is_active: Some(active),
            ..Default::default()
        };
        self.update(id, changes).await
    }
}

/// Maps provider claims onto an insert payload. Without given/family name
/// the display name is split on whitespace: first token is the first name,
/// the rest (if any) the last name.
pub(crate) fn identity_payload(claims: &Claims) -> Result<NewUser, StoreError> {
    let email = claims
        .email
        .clone()
        .filter(|e| !e.is_empty())
        .ok_or_else(|| StoreError::NotNullViolation("identity has no email".into()))?;

    let non_empty = |v: &Option<String>| v.clone().filter(|s| !s.trim().is_empty());
    let mut tokens = claims.name.as_deref().unwrap_or_default().split_whitespace();
    let name_first = tokens.next().map(str::to_string);
    let name_rest = tokens.collect::<Vec<_>>().join(" ");

    Ok(NewUser {
        external_id: claims.sub.clone(),
        email,
        first_name: non_empty(&claims.given_name).or(name_first),
        last_name: non_empty(&claims.family_name)
            .or_else(|| Some(name_rest).filter(|s| !s.is_empty())),
        profile_picture: claims.picture.clone(),
        is_active: None,
    })
}

#[derive(Clone)]
pub struct PgUserRepository {
    store: RecordStore<User>,
}

impl PgUserRepository {
    pub fn new(db: PgPool) -> Self {
        Self {
            store: RecordStore::new(db),
        }
    }
}

#[async_trait]
impl UserRepository for PgUserRepository {
    async fn find_by_id(&self, id: Uuid) -> Result<Option<User>, StoreError> {
        self.store.find_by_id(id).await
    }

    async fn find_by_external_id(&self, external_id: &str) -> Result<Option<User>, StoreError> {
        self.store.find_one_by(UserColumn::ExternalId, external_id).await
    }

    async fn find_by_email(&self, email: &str) -> Result<Option<User>, StoreError> {
        self.store.find_one_by(UserColumn::Email, email).await
    }

    async fn find_all(&self, filters: UserFilters, page: Page) -> Result<Vec<User>, StoreError> {
        self.store.find_all(&filters.to_filters(), page).await
    }

    async fn count(&self, filters: UserFilters) -> Result<i64, StoreError> {
        self.store.count(&filters.to_filters()).await
    }

    async fn create(&self, user: NewUser) -> Result<User, StoreError> {
        self.store.create(user.into_changeset()).await
    }

    async fn update(&self, id: Uuid, changes: UserChanges) -> Result<Option<User>, StoreError> {
        self.store.update(id, changes.into_changeset()).await
    }

    async fn delete(&self, id: Uuid) -> Result<Option<User>, StoreError> {
        self.store.delete(id).await
    }
}
