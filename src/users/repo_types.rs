use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use time::OffsetDateTime;
use uuid::Uuid;

use crate::db::{Changeset, Column, Filters, Record};

/// User record in the database.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, FromRow)]
pub struct User {
    pub id: Uuid,
    pub external_id: String, // identity provider subject
    pub email: String,
    pub first_name: Option<String>,
    pub last_name: Option<String>,
    pub profile_picture: Option<String>,
    pub is_active: bool,
    #[serde(with = "time::serde::rfc3339")]
    pub created_at: OffsetDateTime,
    #[serde(with = "time::serde::rfc3339")]
    pub updated_at: OffsetDateTime,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UserColumn {
    ExternalId,
    Email,
    FirstName,
    LastName,
    ProfilePicture,
    IsActive,
}

impl Column for UserColumn {
    fn name(self) -> &'static str {
        match self {
            UserColumn::ExternalId => "external_id",
            UserColumn::Email => "email",
            UserColumn::FirstName => "first_name",
            UserColumn::LastName => "last_name",
            UserColumn::ProfilePicture => "profile_picture",
            UserColumn::IsActive => "is_active",
        }
    }
}

impl Record for User {
    type Column = UserColumn;
    const TABLE: &'static str = "users";
}

/// Insert payload; `is_active` falls back to the column default.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct NewUser {
    pub external_id: String,
    pub email: String,
    pub first_name: Option<String>,
    pub last_name: Option<String>,
    pub profile_picture: Option<String>,
    pub is_active: Option<bool>,
}

impl NewUser {
    pub(crate) fn into_changeset(self) -> Changeset<UserColumn> {
        Changeset::new()
            .set(UserColumn::ExternalId, self.external_id)
            .set(UserColumn::Email, self.email)
            .set_opt(UserColumn::FirstName, self.first_name)
            .set_opt(UserColumn::LastName, self.last_name)
            .set_opt(UserColumn::ProfilePicture, self.profile_picture)
            .set_opt(UserColumn::IsActive, self.is_active)
    }
}

/// Partial update. `None` leaves a column untouched.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct UserChanges {
    pub first_name: Option<String>,
    pub last_name: Option<String>,
    pub profile_picture: Option<String>,
    pub is_active: Option<bool>,
}

impl UserChanges {
    pub fn is_empty(&self) -> bool {
        self.first_name.is_none()
            && self.last_name.is_none()
            && self.profile_picture.is_none()
            && self.is_active.is_none()
    }

    /// Keeps only the fields a user may change on their own profile.
    pub fn profile_fields(self) -> Self {
        Self {
            is_active: None,
            ..self
        }
    }

    pub(crate) fn into_changeset(self) -> Changeset<UserColumn> {
        Changeset::new()
            .set_opt(UserColumn::FirstName, self.first_name)
            .set_opt(UserColumn::LastName, self.last_name)
            .set_opt(UserColumn::ProfilePicture, self.profile_picture)
            .set_opt(UserColumn::IsActive, self.is_active)
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct UserFilters {
    pub is_active: Option<bool>,
}

impl UserFilters {
    pub fn active() -> Self {
        Self {
            is_active: Some(true),
        }
    }

    pub(crate) fn to_filters(self) -> Filters<UserColumn> {
        Filters::new().eq(UserColumn::IsActive, self.is_active)
    }

    pub fn matches(&self, user: &User) -> bool {
        self.is_active.map_or(true, |v| user.is_active == v)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn user_serializes_timestamps_as_rfc3339() {
        let user = User {
            id: Uuid::nil(),
            external_id: "auth0|1".into(),
            email: "a@example.com".into(),
            first_name: Some("Ada".into()),
            last_name: None,
            profile_picture: None,
            is_active: true,
            created_at: time::macros::datetime!(2024-05-01 12:00 UTC),
            updated_at: time::macros::datetime!(2024-05-02 08:30 UTC),
        };

        let json = serde_json::to_value(&user).unwrap();
        assert_eq!(json["created_at"], "2024-05-01T12:00:00Z");
        assert_eq!(json["updated_at"], "2024-05-02T08:30:00Z");
        assert_eq!(json["external_id"], "auth0|1");
        assert!(json["last_name"].is_null());
    }

    #[test]
    fn profile_fields_drop_the_active_flag() {
        let changes = UserChanges {
            is_active: Some(false),
            ..Default::default()
        };
        assert!(!changes.is_empty());
        assert!(changes.profile_fields().is_empty());
    }

    #[test]
    fn unset_active_filter_matches_everyone() {
        assert!(UserFilters::default().to_filters().is_empty());
        assert!(!UserFilters::active().to_filters().is_empty());
    }
}
