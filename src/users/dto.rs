use axum::{
    response::{IntoResponse, Response},
    Json,
};
use lazy_static::lazy_static;
use regex::Regex;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use uuid::Uuid;

use super::repo_types::{NewUser, UserChanges, UserFilters};
use crate::{
    db::Page,
    error::{AppError, FieldError},
};

/// Success envelope: `{success: true, data, message?}`.
#[derive(Debug, Serialize)]
pub struct ApiResponse<T> {
    pub success: bool,
    pub data: T,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<&'static str>,
}

impl<T: Serialize> ApiResponse<T> {
    pub fn ok(data: T) -> Self {
        Self {
            success: true,
            data,
            message: None,
        }
    }

    pub fn with_message(data: T, message: &'static str) -> Self {
        Self {
            success: true,
            data,
            message: Some(message),
        }
    }
}

impl<T: Serialize> IntoResponse for ApiResponse<T> {
    fn into_response(self) -> Response {
        Json(self).into_response()
    }
}

#[derive(Debug, Serialize)]
pub struct Paginated<T> {
    pub data: Vec<T>,
    pub pagination: PageInfo,
}

#[derive(Debug, Clone, Copy, Serialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct PageInfo {
    pub total: i64,
    pub limit: i64,
    pub offset: i64,
    pub has_more: bool,
}

impl PageInfo {
    pub fn new(page: Page, returned: usize, total: i64) -> Self {
        Self {
            total,
            limit: page.limit,
            offset: page.offset,
            has_more: page.offset + (returned as i64) < total,
        }
    }
}

/// Raw query string; every field is validated by hand so failures come back
/// as field errors rather than a framework rejection.
#[derive(Debug, Default, Deserialize)]
pub struct ListQuery {
    pub limit: Option<String>,
    pub offset: Option<String>,
    pub is_active: Option<String>,
}

impl ListQuery {
    pub fn page(&self) -> Result<Page, AppError> {
        let mut errors = Vec::new();
        let page = self.collect_page(&mut errors);
        finish(page, errors)
    }

    pub fn page_and_filters(&self) -> Result<(Page, UserFilters), AppError> {
        let mut errors = Vec::new();
        let page = self.collect_page(&mut errors);
        let is_active = match self.is_active.as_deref() {
            None => None,
            Some(raw) => {
                let parsed = parse_bool(raw);
                if parsed.is_none() {
                    errors.push(FieldError::new(
                        "query",
                        "is_active",
                        "is_active must be a boolean",
                        Some(Value::String(raw.to_string())),
                    ));
                }
                parsed
            }
        };
        finish((page, UserFilters { is_active }), errors)
    }

    fn collect_page(&self, errors: &mut Vec<FieldError>) -> Page {
        let mut page = Page::default();
        if let Some(raw) = self.limit.as_deref() {
            match raw.trim().parse::<i64>() {
                Ok(v) if (1..=Page::MAX_LIMIT).contains(&v) => page.limit = v,
                _ => errors.push(FieldError::new(
                    "query",
                    "limit",
                    "Limit must be between 1 and 100",
                    Some(Value::String(raw.to_string())),
                )),
            }
        }
        if let Some(raw) = self.offset.as_deref() {
            match raw.trim().parse::<i64>() {
                Ok(v) if v >= 0 => page.offset = v,
                _ => errors.push(FieldError::new(
                    "query",
                    "offset",
                    "Offset must be a non-negative integer",
                    Some(Value::String(raw.to_string())),
                )),
            }
        }
        page
    }
}

fn finish<T>(value: T, errors: Vec<FieldError>) -> Result<T, AppError> {
    if errors.is_empty() {
        Ok(value)
    } else {
        Err(AppError::Validation(errors))
    }
}

/// Joins two independent checks so one response lists every rejected field.
/// Anything other than a validation failure wins as-is.
pub fn combine<A, B>(a: Result<A, AppError>, b: Result<B, AppError>) -> Result<(A, B), AppError> {
    match (a, b) {
        (Ok(a), Ok(b)) => Ok((a, b)),
        (Err(AppError::Validation(mut first)), Err(AppError::Validation(second))) => {
            first.extend(second);
            Err(AppError::Validation(first))
        }
        (Err(AppError::Validation(_)), Err(other)) => Err(other),
        (Err(e), _) | (_, Err(e)) => Err(e),
    }
}

fn parse_bool(raw: &str) -> Option<bool> {
    match raw {
        "true" | "1" => Some(true),
        "false" | "0" => Some(false),
        _ => None,
    }
}

pub fn parse_user_id(raw: &str) -> Result<Uuid, AppError> {
    Uuid::parse_str(raw).map_err(|_| {
        AppError::Validation(vec![FieldError::new(
            "params",
            "id",
            "Invalid user ID format",
            Some(Value::String(raw.to_string())),
        )])
    })
}

pub(crate) fn is_valid_email(email: &str) -> bool {
    lazy_static! {
        static ref EMAIL_RE: Regex = Regex::new(r"^[^@\s]+@[^@\s]+\.[^@\s]+$").unwrap();
    }
    EMAIL_RE.is_match(email)
}

fn is_valid_url(raw: &str) -> bool {
    match url::Url::parse(raw) {
        Ok(u) => matches!(u.scheme(), "http" | "https") && u.host_str().is_some(),
        Err(_) => false,
    }
}

/// Which body fields an update route accepts.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UpdateScope {
    /// `PUT /me`: names and picture; anything else is ignored.
    Profile,
    /// `PUT /:id`: also the active flag.
    Admin,
}

struct BodyReader<'a> {
    body: &'a Map<String, Value>,
    errors: Vec<FieldError>,
}

impl<'a> BodyReader<'a> {
    fn new(body: &'a Value) -> Result<Self, AppError> {
        let body = body
            .as_object()
            .ok_or_else(|| AppError::BadRequest("Request body must be a JSON object".into()))?;
        Ok(Self {
            body,
            errors: Vec::new(),
        })
    }

    fn body_ref(&self) -> &'a Map<String, Value> {
        self.body
    }

    fn reject(&mut self, field: &str, msg: &str, value: &Value) {
        self.errors
            .push(FieldError::new("body", field, msg, Some(value.clone())));
    }

    fn string(&mut self, field: &str, max: usize, msg: &str) -> Option<String> {
        let value = self.body_ref().get(field)?;
        match value.as_str() {
            Some(s) if (1..=max).contains(&s.chars().count()) => Some(s.to_string()),
            _ => {
                self.reject(field, msg, value);
                None
            }
        }
    }

    fn name(&mut self, field: &str, msg: &str) -> Option<String> {
        self.string(field, 100, msg)
    }

    fn url(&mut self, field: &str) -> Option<String> {
        let value = self.body_ref().get(field)?;
        match value.as_str() {
            Some(s) if is_valid_url(s) => Some(s.to_string()),
            _ => {
                self.reject(field, "Profile picture must be a valid URL", value);
                None
            }
        }
    }

    fn email(&mut self, field: &str) -> Option<String> {
        let Some(value) = self.body_ref().get(field) else {
            self.errors.push(FieldError::new("body", field, "Email is required", None));
            return None;
        };
        // Stored as given: both create paths must compare the same bytes.
        match value.as_str() {
            Some(s) if s.len() <= 255 && is_valid_email(s) => Some(s.to_string()),
            _ => {
                self.reject(field, "Email must be a valid email address", value);
                None
            }
        }
    }

    fn boolean(&mut self, field: &str) -> Option<bool> {
        let value = self.body_ref().get(field)?;
        match value.as_bool() {
            Some(b) => Some(b),
            None => {
                self.reject(field, "is_active must be a boolean", value);
                None
            }
        }
    }

    fn finish<T>(self, value: T) -> Result<T, AppError> {
        finish(value, self.errors)
    }
}

pub fn parse_user_changes(body: &Value, scope: UpdateScope) -> Result<UserChanges, AppError> {
    let mut r = BodyReader::new(body)?;
    let changes = UserChanges {
        first_name: r.name("first_name", "First name must be between 1 and 100 characters"),
        last_name: r.name("last_name", "Last name must be between 1 and 100 characters"),
        profile_picture: r.url("profile_picture"),
        is_active: match scope {
            UpdateScope::Admin => r.boolean("is_active"),
            UpdateScope::Profile => None,
        },
    };
    r.finish(changes)
}

pub fn parse_new_user(body: &Value) -> Result<NewUser, AppError> {
    let mut r = BodyReader::new(body)?;
    let external_id = if r.body.contains_key("external_id") {
        r.string(
            "external_id",
            255,
            "External ID must be between 1 and 255 characters",
        )
    } else {
        r.errors.push(FieldError::new(
            "body",
            "external_id",
            "External ID is required",
            None,
        ));
        None
    };
    let email = r.email("email");
    let first_name = r.name("first_name", "First name must be between 1 and 100 characters");
    let last_name = r.name("last_name", "Last name must be between 1 and 100 characters");
    let profile_picture = r.url("profile_picture");
    let is_active = r.boolean("is_active");

    let user = NewUser {
        external_id: external_id.unwrap_or_default(),
        email: email.unwrap_or_default(),
        first_name,
        last_name,
        profile_picture,
        is_active,
    };
    r.finish(user)
}
