use axum::{
    extract::OriginalUri,
    http::{Method, StatusCode},
    response::{IntoResponse, Response},
    Json,
};
use serde_json::json;
use tracing::debug;

/// Fallback for unmatched paths and unsupported methods.
///
/// Reports the full request target, query string included, even when
/// reached from inside a nested router.
pub async fn route_not_found(method: Method, OriginalUri(uri): OriginalUri) -> Response {
    let target = uri.path_and_query().map_or(uri.path(), |pq| pq.as_str());
    debug!(%method, target, "no route");
    (
        StatusCode::NOT_FOUND,
        Json(json!({
            "success": false,
            "error": "Route not found",
            "message": format!("Cannot {} {}", method, target),
        })),
    )
        .into_response()
}
