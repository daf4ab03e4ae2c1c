use axum::{extract::State, Json};
use serde::Serialize;
use time::{format_description::well_known::Rfc3339, OffsetDateTime};

use crate::{error::AppResult, state::AppState};

#[derive(Debug, Serialize)]
pub struct Health {
    pub status: &'static str,
    pub timestamp: String,
    /// Seconds since the process built its state.
    pub uptime: f64,
}

pub async fn health(State(state): State<AppState>) -> AppResult<Json<Health>> {
    let timestamp = OffsetDateTime::now_utc()
        .format(&Rfc3339)
        .map_err(anyhow::Error::from)?;
    Ok(Json(Health {
        status: "OK",
        timestamp,
        uptime: state.started_at.elapsed().as_secs_f64(),
    }))
}
