use std::sync::Arc;

use tracing::info;
use uuid::Uuid;

use super::{
    dto::{PageInfo, Paginated},
    repo::UserRepository,
    repo_types::{NewUser, User, UserChanges, UserFilters},
};
use crate::{
    auth::Claims,
    db::{Page, StoreError},
    error::{AppError, AppResult},
};

#[derive(Clone)]
pub struct UserService {
    repo: Arc<dyn UserRepository>,
}

impl UserService {
    pub fn new(repo: Arc<dyn UserRepository>) -> Self {
        Self { repo }
    }

    pub async fn get_by_id(&self, id: Uuid) -> AppResult<User> {
        self.repo
            .find_by_id(id)
            .await
            .map_err(|e| AppError::store("Failed to get user", e))?
            .ok_or_else(AppError::user_not_found)
    }

    pub async fn get_by_external_id(&self, external_id: &str) -> AppResult<User> {
        self.repo
            .find_by_external_id(external_id)
            .await
            .map_err(|e| AppError::store("Failed to get user", e))?
            .ok_or_else(AppError::user_not_found)
    }

    pub async fn list_all(&self, filters: UserFilters, page: Page) -> AppResult<Paginated<User>> {
        let ctx = |e| AppError::store("Failed to get users", e);
        let data = self.repo.find_all(filters, page).await.map_err(ctx)?;
        let total = self.repo.count(filters).await.map_err(ctx)?;
        Ok(Paginated {
            pagination: PageInfo::new(page, data.len(), total),
            data,
        })
    }

    pub async fn list_active(&self, page: Page) -> AppResult<Paginated<User>> {
        let ctx = |e| AppError::store("Failed to get active users", e);
        let data = self.repo.list_active(page).await.map_err(ctx)?;
        let total = self.repo.count(UserFilters::active()).await.map_err(ctx)?;
        Ok(Paginated {
            pagination: PageInfo::new(page, data.len(), total),
            data,
        })
    }

    /// Direct create. A taken email is a conflict, never a silent return of
    /// the existing row.
    pub async fn create(&self, user: NewUser) -> AppResult<User> {
        let ctx = |e| AppError::store("Failed to create user", e);
        if self.repo.find_by_email(&user.email).await.map_err(ctx)?.is_some() {
            return Err(AppError::Conflict("User with this email already exists".into()));
        }
        let created = self.repo.create(user).await.map_err(ctx)?;
        info!(user_id = %created.id, "user created");
        Ok(created)
    }

    /// Returns the existing record for the token subject, creating it on
    /// first sight.
    pub async fn create_from_identity(&self, claims: &Claims) -> AppResult<User> {
        let ctx = |e| AppError::store("Failed to create user from identity", e);
        if let Some(existing) = self.repo.find_by_external_id(&claims.sub).await.map_err(ctx)? {
            return Ok(existing);
        }
        let created = self.repo.create_from_identity(claims).await.map_err(ctx)?;
        info!(user_id = %created.id, subject = %claims.sub, "user created from identity");
        Ok(created)
    }

    pub async fn update_profile(&self, id: Uuid, changes: UserChanges) -> AppResult<User> {
        self.repo
            .update_profile(id, changes)
            .await
            .map_err(|e| AppError::store("Failed to update user", e))?
            .ok_or_else(AppError::user_not_found)
    }

    pub async fn update(&self, id: Uuid, changes: UserChanges) -> AppResult<User> {
        if changes.is_empty() {
            return Err(AppError::store("Failed to update user", StoreError::EmptyChangeset));
        }
        self.repo
            .update(id, changes)
            .await
            .map_err(|e| AppError::store("Failed to update user", e))?
            .ok_or_else(AppError::user_not_found)
    }

    pub async fn delete(&self, id: Uuid) -> AppResult<User> {
        let deleted = self
            .repo
            .delete(id)
            .await
            .map_err(|e| AppError::store("Failed to delete user", e))?
            .ok_or_else(AppError::user_not_found)?;
        info!(user_id = %deleted.id, "user deleted");
        Ok(deleted)
    }

    pub async fn activate(&self, id: Uuid) -> AppResult<User> {
        self.set_active(id, true, "Failed to activate user").await
    }

    pub async fn deactivate(&self, id: Uuid) -> AppResult<User> {
        self.set_active(id, false, "Failed to deactivate user").await
    }

    async fn set_active(&self, id: Uuid, active: bool, context: &'static str) -> AppResult<User> {
        self.repo
            .set_active(id, active)
            .await
            .map_err(|e| AppError::store(context, e))?
            .ok_or_else(AppError::user_not_found)
    }
}
