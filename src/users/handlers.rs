use axum::{
    extract::{
        rejection::{JsonRejection, QueryRejection},
        Path, Query, State,
    },
    http::StatusCode,
    response::IntoResponse,
    routing::{get, patch},
    Json, Router,
};
use serde_json::Value;
use tracing::instrument;

use super::{
    dto::{
        combine, parse_new_user, parse_user_changes, parse_user_id, ApiResponse, ListQuery,
        Paginated, UpdateScope,
    },
    repo_types::User,
};
use crate::{auth::AuthUser, error::AppResult, state::AppState};

pub fn routes() -> Router<AppState> {
    Router::new()
        .route("/", get(list_users).post(create_user))
        .route("/active", get(list_active_users))
        .route("/me", get(get_me).post(sync_me).put(update_me))
        .route("/:id", get(get_user).put(update_user).delete(delete_user))
        .route("/:id/activate", patch(activate_user))
        .route("/:id/deactivate", patch(deactivate_user))
}

// --- collection ---

#[instrument(skip(state))]
pub async fn list_users(
    State(state): State<AppState>,
    query: Result<Query<ListQuery>, QueryRejection>,
) -> AppResult<ApiResponse<Paginated<User>>> {
    let Query(q) = query?;
    let (page, filters) = q.page_and_filters()?;
    let users = state.users.list_all(filters, page).await?;
    Ok(ApiResponse::ok(users))
}

#[instrument(skip(state))]
pub async fn list_active_users(
    State(state): State<AppState>,
    query: Result<Query<ListQuery>, QueryRejection>,
) -> AppResult<ApiResponse<Paginated<User>>> {
    let Query(q) = query?;
    let page = q.page()?;
    let users = state.users.list_active(page).await?;
    Ok(ApiResponse::ok(users))
}

#[instrument(skip(state, body))]
pub async fn create_user(
    State(state): State<AppState>,
    body: Result<Json<Value>, JsonRejection>,
) -> AppResult<impl IntoResponse> {
    let Json(body) = body?;
    let new_user = parse_new_user(&body)?;
    let user = state.users.create(new_user).await?;
    Ok((
        StatusCode::CREATED,
        ApiResponse::with_message(user, "User created successfully"),
    ))
}

// --- current user ---

#[instrument(skip(state, claims), fields(subject = %claims.sub))]
pub async fn get_me(
    State(state): State<AppState>,
    AuthUser(claims): AuthUser,
) -> AppResult<ApiResponse<User>> {
    let user = state.users.get_by_external_id(&claims.sub).await?;
    Ok(ApiResponse::ok(user))
}

#[instrument(skip(state, claims), fields(subject = %claims.sub))]
pub async fn sync_me(
    State(state): State<AppState>,
    AuthUser(claims): AuthUser,
) -> AppResult<ApiResponse<User>> {
    let user = state.users.create_from_identity(&claims).await?;
    Ok(ApiResponse::ok(user))
}

#[instrument(skip(state, claims, body), fields(subject = %claims.sub))]
pub async fn update_me(
    State(state): State<AppState>,
    AuthUser(claims): AuthUser,
    body: Result<Json<Value>, JsonRejection>,
) -> AppResult<ApiResponse<User>> {
    let Json(body) = body?;
    let changes = parse_user_changes(&body, UpdateScope::Profile)?;
    let current = state.users.get_by_external_id(&claims.sub).await?;
    let user = state.users.update_profile(current.id, changes).await?;
    Ok(ApiResponse::ok(user))
}

// --- by id ---

#[instrument(skip(state))]
pub async fn get_user(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> AppResult<ApiResponse<User>> {
    let id = parse_user_id(&id)?;
    let user = state.users.get_by_id(id).await?;
    Ok(ApiResponse::ok(user))
}

#[instrument(skip(state, body))]
pub async fn update_user(
    State(state): State<AppState>,
    Path(id): Path<String>,
    body: Result<Json<Value>, JsonRejection>,
) -> AppResult<ApiResponse<User>> {
    let Json(body) = body?;
    let (id, changes) = combine(
        parse_user_id(&id),
        parse_user_changes(&body, UpdateScope::Admin),
    )?;
    let user = state.users.update(id, changes).await?;
    Ok(ApiResponse::ok(user))
}

#[instrument(skip(state))]
pub async fn delete_user(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> AppResult<ApiResponse<User>> {
    let id = parse_user_id(&id)?;
    let user = state.users.delete(id).await?;
    Ok(ApiResponse::with_message(user, "User deleted successfully"))
}

#[instrument(skip(state))]
pub async fn activate_user(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> AppResult<ApiResponse<User>> {
    let id = parse_user_id(&id)?;
    let user = state.users.activate(id).await?;
    Ok(ApiResponse::with_message(user, "User activated successfully"))
}

#[instrument(skip(state))]
pub async fn deactivate_user(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> AppResult<ApiResponse<User>> {
    let id = parse_user_id(&id)?;
    let user = state.users.deactivate(id).await?;
    Ok(ApiResponse::with_message(user, "User deactivated successfully"))
}
