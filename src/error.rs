use axum::{
    body::{to_bytes, Body},
    extract::{
        rejection::{JsonRejection, QueryRejection},
        Request, State,
    },
    http::{header, StatusCode},
    middleware::Next,
    response::{IntoResponse, Response},
    Json,
};
use serde::Serialize;
use serde_json::json;
use tracing::{error, warn};

use crate::{auth::AuthError, db::StoreError, state::AppState};

/// One rejected input, shaped like express-validator's field errors.
#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct FieldError {
    #[serde(rename = "type")]
    pub kind: &'static str,
    pub msg: String,
    pub path: String,
    pub location: &'static str,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub value: Option<serde_json::Value>,
}

impl FieldError {
    pub fn new(
        location: &'static str,
        path: impl Into<String>,
        msg: impl Into<String>,
        value: Option<serde_json::Value>,
    ) -> Self {
        Self {
            kind: "field",
            msg: msg.into(),
            path: path.into(),
            location,
            value,
        }
    }
}

#[derive(Debug, thiserror::Error)]
pub enum AppError {
    #[error("Validation failed")]
    Validation(Vec<FieldError>),
    #[error("{0}")]
    BadRequest(String),
    #[error("Invalid token or token expired")]
    Unauthorized,
    #[error("Request entity too large")]
    PayloadTooLarge,
    #[error("{0}")]
    NotFound(String),
    #[error("{0}")]
    Conflict(String),
    #[error("{context}: {source}")]
    Store {
        context: &'static str,
        #[source]
        source: StoreError,
    },
    #[error(transparent)]
    Internal(#[from] anyhow::Error),
}

pub type AppResult<T> = Result<T, AppError>;

impl AppError {
    pub fn store(context: &'static str, source: StoreError) -> Self {
        AppError::Store { context, source }
    }

    pub fn user_not_found() -> Self {
        AppError::NotFound("User not found".into())
    }

    pub fn status(&self) -> StatusCode {
        match self {
            AppError::Validation(_) | AppError::BadRequest(_) => StatusCode::BAD_REQUEST,
            AppError::Unauthorized => StatusCode::UNAUTHORIZED,
            AppError::PayloadTooLarge => StatusCode::PAYLOAD_TOO_LARGE,
            AppError::NotFound(_) => StatusCode::NOT_FOUND,
            AppError::Conflict(_) => StatusCode::CONFLICT,
            AppError::Store { source, .. } => match source {
                StoreError::UniqueViolation(_) => StatusCode::CONFLICT,
                StoreError::ForeignKeyViolation(_)
                | StoreError::NotNullViolation(_)
                | StoreError::EmptyChangeset => StatusCode::BAD_REQUEST,
                StoreError::Database(_) => StatusCode::INTERNAL_SERVER_ERROR,
            },
            AppError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    /// The `error` string sent to clients. Store failures never echo
    /// database text.
    fn client_message(&self) -> String {
        match self {
            AppError::Store { source, .. } => match source {
                StoreError::UniqueViolation(_) => "Resource already exists",
                StoreError::ForeignKeyViolation(_) => "Referenced resource does not exist",
                StoreError::NotNullViolation(_) => "Required field is missing",
                StoreError::EmptyChangeset => "No valid fields to update",
                StoreError::Database(_) => "Database error",
            }
            .to_string(),
            AppError::Internal(_) => "Internal Server Error".to_string(),
            other => other.to_string(),
        }
    }

    fn chain(&self) -> Vec<String> {
        let mut out = vec![self.to_string()];
        let mut cur = std::error::Error::source(self);
        while let Some(err) = cur {
            out.push(err.to_string());
            cur = err.source();
        }
        out
    }
}

impl From<AuthError> for AppError {
    fn from(err: AuthError) -> Self {
        tracing::debug!(error = %err, "authentication failed");
        AppError::Unauthorized
    }
}

impl From<JsonRejection> for AppError {
    fn from(rejection: JsonRejection) -> Self {
        if rejection.status() == StatusCode::PAYLOAD_TOO_LARGE {
            return AppError::PayloadTooLarge;
        }
        AppError::BadRequest(rejection.body_text())
    }
}

impl From<QueryRejection> for AppError {
    fn from(rejection: QueryRejection) -> Self {
        AppError::BadRequest(rejection.body_text())
    }
}

#[derive(Debug, Serialize)]
struct ErrorBody {
    success: bool,
    error: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    details: Option<Vec<FieldError>>,
}

/// Full error chain, attached to error responses for [`attach_error_stack`].
#[derive(Debug, Clone)]
pub struct ErrorStack(pub Vec<String>);

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let status = self.status();
        let stack = self.chain();
        if status.is_server_error() {
            error!(%status, error = ?stack, "request failed");
        } else {
            warn!(%status, error = %self, "request rejected");
        }

        let body = ErrorBody {
            success: false,
            error: self.client_message(),
            details: match self {
                AppError::Validation(details) => Some(details),
                _ => None,
            },
        };

        let mut res = (status, Json(body)).into_response();
        res.extensions_mut().insert(ErrorStack(stack));
        res
    }
}

/// Adds `stack` to error envelopes when running in development.
pub async fn attach_error_stack(State(state): State<AppState>, req: Request, next: Next) -> Response {
    let res = next.run(req).await;
    if !state.config.environment.is_development() {
        return res;
    }
    let Some(ErrorStack(stack)) = res.extensions().get::<ErrorStack>().cloned() else {
        return res;
    };

    let (mut parts, body) = res.into_parts();
    let bytes = match to_bytes(body, usize::MAX).await {
        Ok(b) => b,
        Err(e) => {
            error!(error = %e, "failed to buffer error body");
            return StatusCode::INTERNAL_SERVER_ERROR.into_response();
        }
    };
    let mut value: serde_json::Value = match serde_json::from_slice(&bytes) {
        Ok(v) => v,
        Err(_) => return Response::from_parts(parts, Body::from(bytes)),
    };
    if let Some(obj) = value.as_object_mut() {
        obj.insert("stack".into(), json!(stack));
    }
    parts.headers.remove(header::CONTENT_LENGTH);
    Response::from_parts(parts, Body::from(value.to_string()))
}
