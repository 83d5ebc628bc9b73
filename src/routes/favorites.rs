use axum::extract::State;
use axum::routing::{get, post};
use axum::{Json, Router};
use rusqlite::{params, Connection};
use serde::Deserialize;
use serde_json::json;

use crate::db::models::Favorite;
use crate::error::{AppError, AppResult};
use crate::extractors::{AppJson, AppQuery, CurrentUser};
use crate::routes::stacks::SLUG_RE;
use crate::state::AppState;

pub const FAVORITE_KINDS: [&str; 3] = ["peptide", "stack", "article"];

#[derive(Deserialize)]
pub struct ListQuery {
    pub kind: Option<String>,
}

#[derive(Deserialize)]
pub struct StatusQuery {
    pub kind: String,
    pub slug: String,
}

#[derive(Deserialize)]
pub struct ToggleRequest {
    pub kind: String,
    pub slug: String,
    /// Desired state; omitted means flip the current one
    pub favorite: Option<bool>,
}

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/api/favorites", get(list_favorites))
        .route("/api/favorites/toggle", post(toggle_favorite))
        .route("/api/favorites/status", get(favorite_status))
}

fn parse_kind(raw: &str) -> AppResult<&'static str> {
    let kind = raw.trim().to_ascii_lowercase();
    FAVORITE_KINDS
        .into_iter()
        .find(|k| *k == kind)
        .ok_or_else(|| AppError::BadRequest(format!("Unknown favorite kind: {}", kind)))
}

fn parse_slug(raw: &str) -> AppResult<String> {
    let slug = raw.trim().to_ascii_lowercase();
    if !SLUG_RE.is_match(&slug) {
        return Err(AppError::BadRequest("Invalid slug".into()));
    }
    Ok(slug)
}

fn is_favorited(conn: &Connection, user_id: &str, kind: &str, slug: &str) -> Result<bool, rusqlite::Error> {
    conn.query_row(
        "SELECT COUNT(*) > 0 FROM favorites WHERE user_id = ?1 AND kind = ?2 AND slug = ?3",
        params![user_id, kind, slug],
        |r| r.get(0),
    )
}

/// Bring the row to `desired`; repeated calls leave exactly one or zero rows.
pub fn set_favorite(
    conn: &Connection,
    user_id: &str,
    kind: &str,
    slug: &str,
    desired: bool,
) -> Result<(), rusqlite::Error> {
    if desired {
        conn.execute(
            "INSERT OR IGNORE INTO favorites (id, user_id, kind, slug) VALUES (?1, ?2, ?3, ?4)",
            params![uuid::Uuid::now_v7().to_string(), user_id, kind, slug],
        )?;
    } else {
        conn.execute(
            "DELETE FROM favorites WHERE user_id = ?1 AND kind = ?2 AND slug = ?3",
            params![user_id, kind, slug],
        )?;
    }
    Ok(())
}

async fn list_favorites(
    State(state): State<AppState>,
    user: CurrentUser,
    AppQuery(query): AppQuery<ListQuery>,
) -> AppResult<Json<serde_json::Value>> {
    let kind = query.kind.as_deref().map(parse_kind).transpose()?;

    let conn = state.db.get()?;
    let mut stmt = conn.prepare(
        "SELECT id, kind, slug, created_at FROM favorites
         WHERE user_id = ?1 AND (?2 IS NULL OR kind = ?2)
         ORDER BY created_at DESC, id DESC",
    )?;
    let favorites = stmt
        .query_map(params![user.id, kind], |row| {
            Ok(Favorite {
                id: row.get(0)?,
                kind: row.get(1)?,
                slug: row.get(2)?,
                created_at: row.get(3)?,
            })
        })?
        .collect::<Result<Vec<_>, _>>()?;

    Ok(Json(json!({ "ok": true, "items": favorites })))
}

async fn toggle_favorite(
    State(state): State<AppState>,
    user: CurrentUser,
    AppJson(req): AppJson<ToggleRequest>,
) -> AppResult<Json<serde_json::Value>> {
    let kind = parse_kind(&req.kind)?;
    let slug = parse_slug(&req.slug)?;

    let conn = state.db.get()?;
    let desired = match req.favorite {
        Some(desired) => desired,
        None => !is_favorited(&conn, &user.id, kind, &slug)?,
    };
    set_favorite(&conn, &user.id, kind, &slug, desired)?;
    let favorited = is_favorited(&conn, &user.id, kind, &slug)?;

    Ok(Json(json!({ "ok": true, "kind": kind, "slug": slug, "favorited": favorited })))
}

async fn favorite_status(
    State(state): State<AppState>,
    user: CurrentUser,
    AppQuery(query): AppQuery<StatusQuery>,
) -> AppResult<Json<serde_json::Value>> {
    let kind = parse_kind(&query.kind)?;
    let slug = parse_slug(&query.slug)?;

    let conn = state.db.get()?;
    let favorited = is_favorited(&conn, &user.id, kind, &slug)?;
    Ok(Json(json!({ "ok": true, "favorited": favorited })))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db;

    #[test]
    fn parse_kind_accepts_allow_list_only() {
        assert_eq!(parse_kind(" Peptide ").unwrap(), "peptide");
        assert!(parse_kind("video").is_err());
    }

    #[test]
    fn set_favorite_is_idempotent() {
        let tmp = tempfile::tempdir().unwrap();
        let pool = db::create_pool(&tmp.path().join("fav.db")).unwrap();
        db::run_migrations(&pool).unwrap();
        let conn = pool.get().unwrap();
        conn.execute(
            "INSERT INTO profiles (id, email, password_hash) VALUES ('u1', 'u1@example.com', 'x')",
            [],
        )
        .unwrap();

        for _ in 0..3 {
            set_favorite(&conn, "u1", "peptide", "bpc-157", true).unwrap();
        }
        let count: i64 = conn
            .query_row("SELECT COUNT(*) FROM favorites", [], |r| r.get(0))
            .unwrap();
        assert_eq!(count, 1);

        set_favorite(&conn, "u1", "peptide", "bpc-157", false).unwrap();
        set_favorite(&conn, "u1", "peptide", "bpc-157", false).unwrap();
        assert!(!is_favorited(&conn, "u1", "peptide", "bpc-157").unwrap());
    }
}
