pub mod dto;
pub mod handlers;
#[cfg(test)]
pub(crate) mod memory;
pub mod repo;
pub mod repo_types;
pub mod services;

use axum::{middleware::from_fn_with_state, Router};

use crate::{auth::require_auth, routes::not_found::route_not_found, state::AppState};

pub use repo::{PgUserRepository, UserRepository};
pub use repo_types::{NewUser, User, UserChanges, UserFilters};
pub use services::UserService;

/// `/api/users`. Auth wraps the whole subtree, unmatched paths and methods
/// included, so anonymous callers always get 401.
pub fn router(state: AppState) -> Router<AppState> {
    handlers::routes()
        .method_not_allowed_fallback(route_not_found)
        .fallback(route_not_found)
        .layer(from_fn_with_state(state, require_auth))
}
