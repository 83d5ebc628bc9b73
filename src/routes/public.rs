use axum::extract::State;
use axum::routing::get;
use axum::{Json, Router};
use rusqlite::Connection;
use serde_json::json;

use crate::db::models::Sponsor;
use crate::error::AppResult;
use crate::state::AppState;

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/api/sponsors", get(list_sponsors))
        .route("/healthz", get(healthz))
}

pub fn active_sponsors(conn: &Connection) -> Result<Vec<Sponsor>, rusqlite::Error> {
    let mut stmt = conn.prepare(&format!(
        "SELECT {} FROM sponsors WHERE active = 1 ORDER BY tier ASC, name ASC",
        Sponsor::COLUMNS
    ))?;
    let sponsors = stmt
        .query_map([], Sponsor::from_row)?
        .collect::<Result<Vec<_>, _>>()?;
    Ok(sponsors)
}

async fn list_sponsors(State(state): State<AppState>) -> AppResult<Json<serde_json::Value>> {
    let conn = state.db.get()?;
    let sponsors = active_sponsors(&conn)?;
    Ok(Json(json!({ "ok": true, "items": sponsors })))
}

async fn healthz() -> Json<serde_json::Value> {
    Json(json!({ "ok": true }))
}
